//! Invocation payloads
//!
//! Two shapes arrive at the pipeline:
//!
//! - [`StreamBatch`]: messages grouped by topic-partition, each carrying a
//!   JSON string value.
//! - [`ObjectNotification`]: an object-created notification naming the
//!   bucket and URL-encoded key of a transactions file.

use ledgerflow_core::record::MessageEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Streaming source batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamBatch {
    /// Messages keyed by `topic-partition`
    #[serde(default)]
    pub records: BTreeMap<String, Vec<MessageEnvelope>>,
}

impl StreamBatch {
    /// Single-group batch
    pub fn from_messages(group: impl Into<String>, messages: Vec<MessageEnvelope>) -> Self {
        Self {
            records: BTreeMap::from([(group.into(), messages)]),
        }
    }

    /// All envelopes, group by group
    pub fn envelopes(&self) -> impl Iterator<Item = &MessageEnvelope> {
        self.records.values().flatten()
    }

    /// Total message count
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// True when no group holds a message
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object-created notification
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObjectNotification {
    /// Notification entries; only the first is processed
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

/// One notification entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationRecord {
    /// Object reference
    pub s3: ObjectEntity,
}

/// Bucket and object of a notification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectEntity {
    /// Source bucket
    pub bucket: BucketRef,
    /// Source object
    pub object: ObjectRef,
}

/// Bucket reference
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BucketRef {
    /// Bucket name
    pub name: String,
}

/// Object reference
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectRef {
    /// URL-encoded object key
    pub key: String,
}

/// Resolved location of the file to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Bucket name
    pub bucket: String,
    /// Decoded object key
    pub key: String,
}

/// Malformed notification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// No notification entry
    #[error("notification contains no records")]
    NoRecords,

    /// Key is not valid percent-encoded UTF-8
    #[error("object key {key:?} cannot be decoded: {reason}")]
    InvalidKey {
        /// Raw key
        key: String,
        /// Decoder message
        reason: String,
    },
}

impl ObjectNotification {
    /// Notification for a single object, key given already encoded
    pub fn for_object(bucket: impl Into<String>, encoded_key: impl Into<String>) -> Self {
        Self {
            records: vec![NotificationRecord {
                s3: ObjectEntity {
                    bucket: BucketRef {
                        name: bucket.into(),
                    },
                    object: ObjectRef {
                        key: encoded_key.into(),
                    },
                },
            }],
        }
    }

    /// Bucket and decoded key of the first entry
    pub fn first_object(&self) -> Result<ObjectLocation, EventError> {
        let record = self.records.first().ok_or(EventError::NoRecords)?;
        Ok(ObjectLocation {
            bucket: record.s3.bucket.name.clone(),
            key: decode_object_key(&record.s3.object.key)?,
        })
    }
}

/// Undo notification key encoding: `+` is a space, then percent-decoding
pub fn decode_object_key(raw: &str) -> Result<String, EventError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| EventError::InvalidKey {
            key: raw.to_string(),
            reason: e.to_string(),
        })
}
