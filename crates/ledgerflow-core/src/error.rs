//! Error types for ledgerflow-core
//!
//! Failures are split by blast radius. A [`StoreError`] affects one bulk-write
//! call and is retried; a [`CollaboratorError`] ends an invocation. [`Error`]
//! covers local setup: chunker limits and dead-letter persistence. Row-level
//! and record-level failures are outcome values, not errors (see
//! [`crate::row_writer::RowOutcome`] and [`crate::record::Rejection`]).

use thiserror::Error;

/// Result type alias for ledgerflow-core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ledgerflow-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error returned by a [`crate::store::KeyValueStore`] call as a whole
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Request rate or provisioned throughput exceeded
    #[error("throttled: {0}")]
    Throttled(String),

    /// Request never reached the store or the response was lost
    #[error("transport error: {0}")]
    Transport(String),

    /// Store rejected the request
    #[error("service error: {0}")]
    Service(String),
}

impl StoreError {
    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Throttled(_) => "throttled",
            Self::Transport(_) => "transport",
            Self::Service(_) => "service",
        }
    }
}

/// Error from an object store or secret resolver
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Requested object or secret does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller lacks permission
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Service or transport failure
    #[error("service error: {0}")]
    Service(String),

    /// Payload was retrieved but is unusable
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
