//! Monetary transaction rows for the relational path
//!
//! A transaction file is a UTF-8 JSON array of objects. Decoding is
//! all-or-nothing: one bad row aborts the file before anything is written.

use chrono::NaiveDateTime;
use ledgerflow_rdbc::Value;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Timestamp layout used in transaction files
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Column order of the insert statement
pub const COLUMNS: [&str; 6] = [
    "transaction_id",
    "client_id",
    "account_id",
    "amount",
    "status",
    "timestamp",
];

/// Why a transaction file could not be decoded
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Content is not UTF-8
    #[error("file is not valid UTF-8: {0}")]
    Utf8(String),

    /// Content is not a JSON array
    #[error("file is not a JSON array: {0}")]
    Json(String),

    /// A row is missing a field or has the wrong shape
    #[error("row {index}: {reason}")]
    Row {
        /// Zero-based row position
        index: usize,
        /// Decoder message
        reason: String,
    },

    /// A row's timestamp does not match [`TIMESTAMP_FORMAT`]
    #[error("row {index}: invalid timestamp '{value}'")]
    Timestamp {
        /// Zero-based row position
        index: usize,
        /// Offending text
        value: String,
    },
}

/// One row of the `monetary_transaction` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRow {
    /// Unique transaction id
    pub transaction_id: String,
    /// Owning client
    pub client_id: String,
    /// Debited or credited account
    pub account_id: String,
    /// Monetary amount
    pub amount: Decimal,
    /// Processing status
    pub status: String,
    /// Event time (UTC, second precision)
    pub timestamp: NaiveDateTime,
}

impl TransactionRow {
    /// Statement parameters in [`COLUMNS`] order
    pub fn params(&self) -> Vec<Value> {
        vec![
            Value::from(self.transaction_id.as_str()),
            Value::from(self.client_id.as_str()),
            Value::from(self.account_id.as_str()),
            Value::Decimal(self.amount),
            Value::from(self.status.as_str()),
            Value::DateTime(self.timestamp),
        ]
    }
}

/// Identifier written as either a JSON string or integer
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Id {
    Text(String),
    Number(i64),
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        match id {
            Id::Text(s) => s,
            Id::Number(n) => n.to_string(),
        }
    }
}

/// Amount written as either a JSON number or numeric string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Amount {
    Number(serde_json::Number),
    Text(String),
}

impl Amount {
    fn to_decimal(&self) -> Result<Decimal, String> {
        let text = match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| format!("invalid amount '{}': {}", text, e))
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    transaction_id: Id,
    client_id: Id,
    account_id: Id,
    amount: Amount,
    status: String,
    timestamp: String,
}

/// Decode a transaction file into rows
pub fn decode_transactions(bytes: &[u8]) -> Result<Vec<TransactionRow>, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::Utf8(e.to_string()))?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| decode_row(index, value))
        .collect()
}

fn decode_row(index: usize, value: serde_json::Value) -> Result<TransactionRow, DecodeError> {
    let raw: RawRow = serde_json::from_value(value).map_err(|e| DecodeError::Row {
        index,
        reason: e.to_string(),
    })?;

    let timestamp = NaiveDateTime::parse_from_str(&raw.timestamp, TIMESTAMP_FORMAT).map_err(
        |_| DecodeError::Timestamp {
            index,
            value: raw.timestamp.clone(),
        },
    )?;
    let amount = raw
        .amount
        .to_decimal()
        .map_err(|reason| DecodeError::Row { index, reason })?;

    Ok(TransactionRow {
        transaction_id: raw.transaction_id.into(),
        client_id: raw.client_id.into(),
        account_id: raw.account_id.into(),
        amount,
        status: raw.status,
        timestamp,
    })
}
