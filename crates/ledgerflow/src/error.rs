//! Pipeline errors
//!
//! Only the relational path can fail an invocation. Each variant maps to a
//! response body prefix so callers can tell storage, database and payload
//! failures apart.

use crate::event::EventError;
use crate::response::ErrorResponse;
use ledgerflow_core::error::CollaboratorError;
use ledgerflow_core::row_writer::RowWriteError;
use ledgerflow_core::transaction::DecodeError;
use thiserror::Error;

/// Error aborting a relational invocation
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Notification unusable
    #[error("invalid event: {0}")]
    Event(#[from] EventError),

    /// Object could not be read
    #[error("object fetch failed: {0}")]
    ObjectFetch(#[source] CollaboratorError),

    /// File content rejected before any write
    #[error("transactions file rejected: {0}")]
    Decode(#[from] DecodeError),

    /// Credentials unavailable
    #[error("credentials unavailable: {0}")]
    Secret(#[source] CollaboratorError),

    /// Connection or statement setup failed
    #[error(transparent)]
    Database(#[from] RowWriteError),
}

impl PipelineError {
    /// HTTP-style status for the response
    pub fn status_code(&self) -> u16 {
        500
    }

    /// Response body text
    pub fn body(&self) -> String {
        match self {
            Self::ObjectFetch(e) => format!("Error reading file from S3: {}", e),
            Self::Database(e) => format!("Database error: {}", e),
            other => format!("Unexpected error: {}", other),
        }
    }

    /// Failure response for this error
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status_code: self.status_code(),
            body: self.body(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_prefixes() {
        let fetch = PipelineError::ObjectFetch(CollaboratorError::NotFound("s3://b/k".into()));
        assert!(fetch.body().starts_with("Error reading file from S3: "));

        let decode = PipelineError::Decode(DecodeError::Json("expected value".into()));
        assert!(decode.body().starts_with("Unexpected error: "));

        let secret = PipelineError::Secret(CollaboratorError::AccessDenied("db".into()));
        assert_eq!(secret.to_response().status_code, 500);
        assert!(secret.body().contains("credentials unavailable"));
    }

    #[test]
    fn test_database_body() {
        let err = PipelineError::Database(RowWriteError::Connect(
            ledgerflow_rdbc::Error::connection("refused"),
        ));
        assert!(err.body().starts_with("Database error: "));
        assert!(err.body().contains("refused"));
    }
}
