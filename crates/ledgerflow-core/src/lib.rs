//! # ledgerflow-core
//!
//! Reliable batched persistence under partial failure.
//!
//! Two write engines sit on top of a normalizer and a chunker:
//!
//! ```text
//!                      ┌──────────────┐   ≤25    ┌────────────┐
//!  MessageEnvelope ──▶ │  Normalizer  │ ──────▶  │ BulkWriter │ ──▶ KeyValueStore
//!                      └──────────────┘  chunks  └────────────┘
//!                             │ Rejection (logged, skipped)  │ exhausted
//!                                                            ▼
//!                                                     DeadLetterSink
//!
//!  transaction file ──decode──▶ TransactionRow ──▶ RowWriter ──▶ ConnectionFactory
//!                                                  (one tx per row)
//! ```
//!
//! ## Guarantees
//!
//! - A message without `message_id` never reaches a writer
//! - No chunk exceeds [`chunk::BATCH_LIMIT`] requests
//! - Unprocessed requests are retried or dead-lettered, never dropped
//! - A failing row never undoes rows committed before it
//!
//! The `testing` module provides scripted doubles for every seam.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod bulk;
pub mod chunk;
pub mod collab;
pub mod dead_letter;
pub mod error;
pub mod record;
pub mod retry;
pub mod row_writer;
pub mod store;
pub mod testing;
pub mod transaction;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bulk::{BulkWriteSummary, BulkWriter, ChunkOutcome};
    pub use crate::chunk::{Chunker, BATCH_LIMIT};
    pub use crate::collab::{DbCredentials, ObjectStore, SecretResolver};
    pub use crate::dead_letter::{DeadLetter, DeadLetterSink, FileDeadLetter, LogDeadLetter};
    pub use crate::error::{CollaboratorError, Error, Result, StoreError};
    pub use crate::record::{AuditRecord, MessageEnvelope, Normalized, Normalizer, Rejection};
    pub use crate::retry::{RetryPolicy, RetryState, Sleeper, TokioSleeper};
    pub use crate::row_writer::{RowOutcome, RowWriteError, RowWriteOutcome, RowWriter, SkipReason};
    pub use crate::store::{BatchWriteOutput, Item, KeyValueStore, PutRequest};
    pub use crate::transaction::{decode_transactions, DecodeError, TransactionRow};
}

pub use error::{Error, Result};
