//! # ledgerflow
//!
//! Ingestion pipelines for the transaction ledger.
//!
//! ```text
//!  stream batch ──▶ Normalizer ──▶ Chunker ──▶ BulkWriter ──▶ key-value table
//!                       │                          │
//!                   rejected                  dead letters
//!
//!  object event ──▶ ObjectStore ──▶ decode ──▶ SecretResolver ──▶ RowWriter ──▶ SQL table
//!                                                                    │
//!                                                          integrity skips
//! ```
//!
//! The bulk path never fails an invocation: bad messages are skipped and
//! write failures that survive every retry are dead-lettered. The relational
//! path fails the invocation only for problems that affect the whole file
//! (fetch, decode, credentials, connection); individual rows that violate a
//! constraint are skipped.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod response;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{BulkConfig, DeadLetterConfig, PipelineConfig, RelationalConfig, RetryConfig};
    pub use crate::error::PipelineError;
    pub use crate::event::{ObjectLocation, ObjectNotification, StreamBatch};
    pub use crate::pipeline::{BulkPipeline, DatabaseTarget, RelationalPipeline};
    pub use crate::response::{BulkResponse, ErrorResponse};
}

pub use error::PipelineError;
