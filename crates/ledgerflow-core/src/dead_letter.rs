//! Terminal-failure reporting for exhausted chunks
//!
//! When a chunk uses up its retry budget the bulk writer hands the residual
//! requests to a [`DeadLetterSink`] and moves on. The default sink logs the
//! records; [`FileDeadLetter`] appends them as JSON lines for manual replay.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::Result;
use crate::store::PutRequest;

/// Residual chunk that could not be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Destination table
    pub table: String,
    /// Submissions made before giving up
    pub attempts: u32,
    /// When the chunk was given up on
    pub failed_at: DateTime<Utc>,
    /// Last transport error seen, if the final round failed outright
    pub last_error: Option<String>,
    /// Requests never acknowledged by the store
    pub records: Vec<PutRequest>,
}

impl DeadLetter {
    /// Build a report stamped with the current time
    pub fn new(table: impl Into<String>, attempts: u32, records: Vec<PutRequest>) -> Self {
        Self {
            table: table.into(),
            attempts,
            failed_at: Utc::now(),
            last_error: None,
            records,
        }
    }

    /// Attach the last transport error
    pub fn with_last_error(mut self, err: Option<String>) -> Self {
        self.last_error = err;
        self
    }
}

/// Destination for chunks that exhausted their retries
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Record a terminal failure
    async fn report(&self, letter: &DeadLetter) -> Result<()>;
}

/// Logs residual records at `error` level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDeadLetter;

#[async_trait]
impl DeadLetterSink for LogDeadLetter {
    async fn report(&self, letter: &DeadLetter) -> Result<()> {
        let records = serde_json::to_string(&letter.records)?;
        error!(
            table = %letter.table,
            attempts = letter.attempts,
            count = letter.records.len(),
            last_error = ?letter.last_error,
            records = %records,
            "Failed to write chunk after max retries"
        );
        Ok(())
    }
}

/// Appends one JSON line per dead letter to a file
#[derive(Debug)]
pub struct FileDeadLetter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDeadLetter {
    /// Append to `path`, creating it on first report
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeadLetterSink for FileDeadLetter {
    async fn report(&self, letter: &DeadLetter) -> Result<()> {
        let mut line = serde_json::to_vec(letter)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        info!(
            table = %letter.table,
            count = letter.records.len(),
            path = %self.path.display(),
            "Persisted dead letter"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Item, KEY_ATTRIBUTE};

    fn letter(ids: &[&str]) -> DeadLetter {
        let records = ids
            .iter()
            .map(|id| PutRequest::new(Item::from([(KEY_ATTRIBUTE.to_string(), id.to_string())])))
            .collect();
        DeadLetter::new("business_transactions", 5, records)
    }

    #[tokio::test]
    async fn test_log_sink_accepts_report() {
        LogDeadLetter.report(&letter(&["a", "b"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileDeadLetter::new(dir.path().join("dead-letter.jsonl"));

        sink.report(&letter(&["a"])).await.unwrap();
        sink.report(&letter(&["b", "c"])).await.unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let letters: Vec<DeadLetter> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(letters.len(), 2);
        assert_eq!(letters[0].records.len(), 1);
        assert_eq!(letters[1].records[1].key(), Some("c"));
        assert_eq!(letters[1].attempts, 5);
    }

    #[tokio::test]
    async fn test_file_sink_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileDeadLetter::new(dir.path().join("missing").join("dl.jsonl"));
        assert!(sink.report(&letter(&["a"])).await.is_err());
    }
}
