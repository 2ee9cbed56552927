//! Bulk write engine with partial-failure retry
//!
//! Each chunk moves through a small state machine:
//!
//! ```text
//! PENDING ──submit──▶ SUBMITTED ──all accepted──▶ SUCCESS
//!    ▲                    │
//!    │   unprocessed ≠ ∅  │  (or transport error: whole chunk)
//!    └──sleep(backoff)────┤
//!                         └──budget spent──▶ EXHAUSTED ──▶ dead-letter sink
//! ```
//!
//! Only the subset the store reports as unprocessed is resubmitted, so a
//! record acknowledged in an earlier round is never written twice by this
//! engine. Chunks are processed one after another.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::chunk::Chunker;
use crate::dead_letter::{DeadLetter, DeadLetterSink, LogDeadLetter};
use crate::retry::{RetryPolicy, RetryState, Sleeper, TokioSleeper};
use crate::store::{KeyValueStore, PutRequest};

/// Final state of one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Every request was acknowledged
    Success {
        /// Store calls made
        attempts: u32,
        /// Requests acknowledged
        accepted: usize,
    },
    /// The retry budget ran out
    Exhausted {
        /// Store calls made
        attempts: u32,
        /// Requests acknowledged before giving up
        accepted: usize,
        /// Requests never acknowledged
        residual: Vec<PutRequest>,
    },
}

impl ChunkOutcome {
    /// Whether the chunk was fully persisted
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Store calls made for this chunk
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Requests acknowledged
    pub fn accepted(&self) -> usize {
        match self {
            Self::Success { accepted, .. } | Self::Exhausted { accepted, .. } => *accepted,
        }
    }
}

/// Totals across every chunk of one [`BulkWriter::write`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteSummary {
    /// Chunks processed
    pub chunks: usize,
    /// Requests handed to the engine
    pub submitted: usize,
    /// Requests acknowledged by the store
    pub accepted: usize,
    /// Requests reported as terminal failures
    pub failed: usize,
    /// Chunks that ran out of retries
    pub exhausted_chunks: usize,
}

impl BulkWriteSummary {
    /// Fold one chunk's outcome into the totals
    pub fn add(&mut self, outcome: &ChunkOutcome) {
        self.chunks += 1;
        self.accepted += outcome.accepted();
        if let ChunkOutcome::Exhausted { residual, .. } = outcome {
            self.failed += residual.len();
            self.exhausted_chunks += 1;
        }
    }

    /// Check if there were any failures
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Writes put-requests to a [`KeyValueStore`] chunk by chunk
pub struct BulkWriter {
    store: Arc<dyn KeyValueStore>,
    policy: RetryPolicy,
    chunker: Chunker,
    sleeper: Arc<dyn Sleeper>,
    dead_letter: Arc<dyn DeadLetterSink>,
    fallback: Arc<dyn DeadLetterSink>,
}

impl std::fmt::Debug for BulkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkWriter")
            .field("policy", &self.policy)
            .field("chunker", &self.chunker)
            .finish_non_exhaustive()
    }
}

impl BulkWriter {
    /// Writer with the default policy, chunk size, tokio timer and log sink
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
            chunker: Chunker::default(),
            sleeper: Arc::new(TokioSleeper),
            dead_letter: Arc::new(LogDeadLetter),
            fallback: Arc::new(LogDeadLetter),
        }
    }

    /// Set retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set chunker
    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Set dead-letter sink
    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = sink;
        self
    }

    /// Set the sink used when the dead-letter sink itself fails
    pub fn with_fallback_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.fallback = sink;
        self
    }

    /// Active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Chunk `requests` and write each chunk in turn
    pub async fn write(&self, table: &str, requests: Vec<PutRequest>) -> BulkWriteSummary {
        let mut summary = BulkWriteSummary {
            submitted: requests.len(),
            ..Default::default()
        };

        for chunk in self.chunker.into_chunks(requests) {
            let outcome = self.write_chunk(table, chunk).await;
            summary.add(&outcome);
        }

        info!(
            table = %table,
            chunks = summary.chunks,
            submitted = summary.submitted,
            accepted = summary.accepted,
            failed = summary.failed,
            "Bulk write finished"
        );
        summary
    }

    /// Write one chunk, resubmitting only unprocessed requests until the budget is spent
    pub async fn write_chunk(&self, table: &str, chunk: Vec<PutRequest>) -> ChunkOutcome {
        let mut pending = chunk;
        let mut state = RetryState::new(self.policy.clone());
        let mut attempts = 0u32;
        let mut accepted = 0usize;

        if pending.is_empty() {
            return ChunkOutcome::Success { attempts, accepted };
        }

        loop {
            attempts += 1;
            let last_error = match self.store.batch_write(table, &pending).await {
                Ok(mut output) => {
                    let unprocessed = output.take_unprocessed(table);
                    accepted += pending.len().saturating_sub(unprocessed.len());
                    if unprocessed.is_empty() {
                        debug!(table = %table, attempts, accepted, "Chunk written");
                        return ChunkOutcome::Success { attempts, accepted };
                    }
                    debug!(
                        table = %table,
                        attempt = attempts,
                        unprocessed = unprocessed.len(),
                        "Store left items unprocessed"
                    );
                    pending = unprocessed;
                    None
                }
                Err(e) => {
                    warn!(
                        table = %table,
                        attempt = attempts,
                        kind = e.kind(),
                        error = %e,
                        "Batch write failed, retrying whole chunk"
                    );
                    Some(e.to_string())
                }
            };

            let delay = state.record_failure();
            debug!(
                table = %table,
                attempt = attempts,
                backoff_ms = delay.as_millis() as u64,
                "Backing off"
            );
            self.sleeper.sleep(delay).await;

            if state.is_exhausted() {
                let letter = DeadLetter::new(table, attempts, pending.clone())
                    .with_last_error(last_error);
                self.report(&letter).await;
                return ChunkOutcome::Exhausted {
                    attempts,
                    accepted,
                    residual: pending,
                };
            }
        }
    }

    /// Hand a dead letter to the sink, falling back so the records always surface somewhere
    async fn report(&self, letter: &DeadLetter) {
        let Err(e) = self.dead_letter.report(letter).await else {
            return;
        };
        error!(
            table = %letter.table,
            count = letter.records.len(),
            error = %e,
            "Failed to report dead letter, using fallback sink"
        );

        if let Err(fallback) = self.fallback.report(letter).await {
            let keys: Vec<&str> = letter.records.iter().filter_map(PutRequest::key).collect();
            error!(
                table = %letter.table,
                error = %fallback,
                keys = ?keys,
                records = ?letter.records,
                "Fallback dead-letter sink failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_accumulates() {
        let mut summary = BulkWriteSummary::default();
        summary.add(&ChunkOutcome::Success {
            attempts: 1,
            accepted: 25,
        });
        summary.add(&ChunkOutcome::Exhausted {
            attempts: 5,
            accepted: 3,
            residual: vec![PutRequest::new(Default::default()); 7],
        });

        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.accepted, 28);
        assert_eq!(summary.failed, 7);
        assert_eq!(summary.exhausted_chunks, 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = ChunkOutcome::Success {
            attempts: 2,
            accepted: 10,
        };
        assert!(ok.is_success());
        assert_eq!(ok.attempts(), 2);
        assert_eq!(ok.accepted(), 10);
    }
}
