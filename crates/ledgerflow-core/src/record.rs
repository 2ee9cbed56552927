//! Audit records and their normalization from stream messages
//!
//! A [`MessageEnvelope`] is one framed message from the streaming source. The
//! [`Normalizer`] turns its JSON payload into an [`AuditRecord`] or a
//! [`Rejection`]; only records carrying a non-empty `message_id` survive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::store::PutRequest;

/// Label used for absent category and identifier fields
pub const UNKNOWN: &str = "UNKNOWN";

/// One framed message as delivered by the streaming source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Source partition
    #[serde(default)]
    pub partition: Option<i64>,
    /// Offset within the partition
    #[serde(default)]
    pub offset: Option<i64>,
    /// JSON-encoded payload
    #[serde(default)]
    pub value: String,
}

impl MessageEnvelope {
    /// Create an envelope for a payload
    pub fn new(partition: i64, offset: i64, value: impl Into<String>) -> Self {
        Self {
            partition: Some(partition),
            offset: Some(offset),
            value: value.into(),
        }
    }

    /// Position of this message for log lines
    pub fn position(&self) -> Position {
        Position {
            partition: self.partition,
            offset: self.offset,
        }
    }
}

/// Partition/offset pair rendered as `"unknown"` when missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Source partition
    pub partition: Option<i64>,
    /// Offset within the partition
    pub offset: Option<i64>,
}

fn fmt_or_unknown(v: Option<i64>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match v {
        Some(n) => write!(f, "{}", n),
        None => f.write_str("unknown"),
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("partition ")?;
        fmt_or_unknown(self.partition, f)?;
        f.write_str(", offset ")?;
        fmt_or_unknown(self.offset, f)
    }
}

/// Canonical record persisted by the bulk path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Globally unique id (primary key downstream)
    pub log_id: String,
    /// Category label
    pub transaction_type: String,
    /// Acting party
    pub actor_id: String,
    /// Affected party
    pub target_id: String,
    /// Event time, as supplied or ingestion time in Unix seconds
    pub timestamp: String,
}

impl AuditRecord {
    /// Item attributes as written to the key-value store
    pub fn into_item(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("log_id".to_string(), self.log_id),
            ("transaction_type".to_string(), self.transaction_type),
            ("actor_id".to_string(), self.actor_id),
            ("target_id".to_string(), self.target_id),
            ("timestamp".to_string(), self.timestamp),
        ])
    }

    /// Wrap as a put-request
    pub fn into_put_request(self) -> PutRequest {
        PutRequest::new(self.into_item())
    }
}

/// Why a message was skipped
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    /// `message_id` absent, null, non-string or empty
    #[error("missing message_id at {position}")]
    MissingId {
        /// Where the message came from
        position: Position,
    },

    /// Payload is not a JSON object
    #[error("invalid payload at {position}: {reason}")]
    InvalidPayload {
        /// Where the message came from
        position: Position,
        /// Decoder message
        reason: String,
    },
}

impl Rejection {
    /// Where the rejected message came from
    pub fn position(&self) -> Position {
        match self {
            Self::MissingId { position } | Self::InvalidPayload { position, .. } => *position,
        }
    }
}

/// Records that survived normalization plus what was skipped
#[derive(Debug, Default)]
pub struct Normalized {
    /// Accepted records in input order
    pub records: Vec<AuditRecord>,
    /// Skipped messages
    pub rejected: Vec<Rejection>,
}

/// Converts stream messages into [`AuditRecord`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Create a normalizer
    pub fn new() -> Self {
        Self
    }

    /// Normalize with the current wall clock as default timestamp
    pub fn normalize(&self, envelope: &MessageEnvelope) -> Result<AuditRecord, Rejection> {
        self.normalize_at(envelope, Utc::now())
    }

    /// Normalize with `now` as default timestamp
    pub fn normalize_at(
        &self,
        envelope: &MessageEnvelope,
        now: DateTime<Utc>,
    ) -> Result<AuditRecord, Rejection> {
        let position = envelope.position();

        let payload: Map<String, Value> = match serde_json::from_str(&envelope.value) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(Rejection::InvalidPayload {
                    position,
                    reason: format!("expected JSON object, got {}", json_kind(&other)),
                })
            }
            Err(e) => {
                return Err(Rejection::InvalidPayload {
                    position,
                    reason: e.to_string(),
                })
            }
        };

        let log_id = match payload.get("message_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => return Err(Rejection::MissingId { position }),
        };

        Ok(AuditRecord {
            log_id,
            transaction_type: text_field(&payload, "transaction_type")
                .unwrap_or_else(|| UNKNOWN.to_string()),
            actor_id: text_field(&payload, "actor_id").unwrap_or_else(|| UNKNOWN.to_string()),
            target_id: text_field(&payload, "target_id").unwrap_or_else(|| UNKNOWN.to_string()),
            timestamp: text_field(&payload, "timestamp").unwrap_or_else(|| unix_timestamp(now)),
        })
    }

    /// Normalize a sequence, logging and collecting rejections
    pub fn normalize_all<'a, I>(&self, envelopes: I) -> Normalized
    where
        I: IntoIterator<Item = &'a MessageEnvelope>,
    {
        let now = Utc::now();
        let mut out = Normalized::default();
        for envelope in envelopes {
            match self.normalize_at(envelope, now) {
                Ok(record) => out.records.push(record),
                Err(rejection) => {
                    let position = rejection.position();
                    warn!(
                        partition = ?position.partition,
                        offset = ?position.offset,
                        reason = %rejection,
                        "Skipping message"
                    );
                    out.rejected.push(rejection);
                }
            }
        }
        out
    }
}

/// Optional field as text; null counts as absent
fn text_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Unix seconds with microsecond fraction, e.g. `1712345678.123456`
pub fn unix_timestamp(now: DateTime<Utc>) -> String {
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}
