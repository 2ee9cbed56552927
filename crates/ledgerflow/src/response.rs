//! Invocation results
//!
//! Shapes are fixed by the callers that consume them: the bulk path answers
//! `{"status", "processed_logs"}`; the relational path answers `null` or an
//! HTTP-style `{"statusCode", "body"}` failure.

use serde::{Deserialize, Serialize};

/// Status reported by the bulk path
pub const SUCCESS: &str = "success";

/// Bulk path result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Always `"success"`; terminal write failures are reported out of band
    pub status: String,
    /// Records handed to the bulk writer
    pub processed_logs: usize,
}

impl BulkResponse {
    /// Successful response for `processed_logs` records
    pub fn success(processed_logs: usize) -> Self {
        Self {
            status: SUCCESS.to_string(),
            processed_logs,
        }
    }
}

/// Relational path failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-style status code
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Human-readable cause
    pub body: String,
}

impl ErrorResponse {
    /// Internal failure with the given body
    pub fn internal(body: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            body: body.into(),
        }
    }
}
