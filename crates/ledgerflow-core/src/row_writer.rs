//! Row write engine with per-row isolation
//!
//! One connection serves the whole batch. Every row runs in its own
//! transaction (`BEGIN`, `INSERT`, `COMMIT`), so a failing row is rolled back
//! alone and earlier commits stand. Integrity violations are expected on
//! replays and are skipped with a warning; anything else is skipped with an
//! error log. An error that ends the session (lost connection, rejected
//! login) stops the batch: the remaining rows are reported as skipped without
//! being attempted. The connection is closed once, after the last row.

use ledgerflow_rdbc::prelude::{Connection, ConnectionConfig, ConnectionFactory};
use ledgerflow_rdbc::security::insert_statement;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::transaction::{TransactionRow, COLUMNS};

/// Default destination table
pub const DEFAULT_TABLE: &str = "monetary_transaction";

/// Why a row was not inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Integrity constraint violation (duplicate key and similar)
    Integrity,
    /// Any other statement or transaction failure
    Other,
}

/// Result of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Row committed
    Inserted,
    /// Row rolled back and skipped
    Skipped {
        /// Classification
        reason: SkipReason,
        /// Driver message
        error: String,
    },
}

/// Row that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Transaction id of the row
    pub transaction_id: String,
    /// Classification
    pub reason: SkipReason,
    /// Driver message
    pub error: String,
}

/// Totals for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowWriteOutcome {
    /// Rows committed
    pub inserted: usize,
    /// Rows rolled back, in input order
    pub skipped: Vec<SkippedRow>,
}

impl RowWriteOutcome {
    fn record(&mut self, row: &TransactionRow, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Skipped { reason, error } => self.skipped.push(SkippedRow {
                transaction_id: row.transaction_id.clone(),
                reason,
                error,
            }),
        }
    }

    /// Rows skipped because of integrity violations
    pub fn integrity_skips(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.reason == SkipReason::Integrity)
            .count()
    }
}

/// Failures that stop the batch before any row is attempted
#[derive(Debug, Error)]
pub enum RowWriteError {
    /// The database session could not be opened
    #[error("database connection failed: {0}")]
    Connect(#[source] ledgerflow_rdbc::Error),

    /// Table name rejected
    #[error("invalid row writer configuration: {0}")]
    Config(#[source] ledgerflow_rdbc::Error),
}

/// Inserts [`TransactionRow`]s one transaction at a time
pub struct RowWriter {
    factory: Arc<dyn ConnectionFactory>,
    table: String,
    sql: String,
}

impl std::fmt::Debug for RowWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowWriter")
            .field("database", &self.factory.database_type())
            .field("table", &self.table)
            .finish()
    }
}

impl RowWriter {
    /// Writer targeting `table`; the name must be a plain SQL identifier
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        table: impl Into<String>,
    ) -> Result<Self, RowWriteError> {
        let table = table.into();
        let sql = insert_statement(&table, &COLUMNS).map_err(RowWriteError::Config)?;
        Ok(Self {
            factory,
            table,
            sql,
        })
    }

    /// Insert statement used for every row
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Open one connection, insert every row in isolation, close the connection
    pub async fn write(
        &self,
        config: &ConnectionConfig,
        rows: &[TransactionRow],
    ) -> Result<RowWriteOutcome, RowWriteError> {
        let conn = self.factory.connect(config).await.map_err(|e| {
            error!(host = %config.host, database = %config.database, error = %e, "Database connection failed");
            RowWriteError::Connect(e)
        })?;

        let mut outcome = RowWriteOutcome::default();
        let mut pending = rows.iter();
        let mut session_end = None;
        for row in pending.by_ref() {
            match self.write_row(conn.as_ref(), row).await {
                Ok(()) => outcome.record(row, RowOutcome::Inserted),
                Err(e) => {
                    let ends_session = e.category().ends_session();
                    let cause = e.to_string();
                    outcome.record(row, self.skip(row, e));
                    if ends_session {
                        session_end = Some(cause);
                        break;
                    }
                }
            }
        }

        if let Some(cause) = session_end {
            let remaining: Vec<_> = pending.collect();
            if !remaining.is_empty() {
                warn!(
                    remaining = remaining.len(),
                    error = %cause,
                    "Database session ended, skipping remaining transactions"
                );
            }
            for row in remaining {
                outcome.record(
                    row,
                    RowOutcome::Skipped {
                        reason: SkipReason::Other,
                        error: format!("not attempted, session ended: {}", cause),
                    },
                );
            }
        }

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close database connection");
        }

        info!(
            table = %self.table,
            rows = rows.len(),
            inserted = outcome.inserted,
            skipped = outcome.skipped.len(),
            "Row write finished"
        );
        Ok(outcome)
    }

    async fn write_row(
        &self,
        conn: &dyn Connection,
        row: &TransactionRow,
    ) -> ledgerflow_rdbc::Result<()> {
        let tx = conn.begin().await?;
        match tx.execute(&self.sql, &row.params()).await {
            Ok(_) => tx.commit().await,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(
                        transaction_id = %row.transaction_id,
                        error = %rollback,
                        "Rollback failed"
                    );
                }
                Err(e)
            }
        }
    }

    fn skip(&self, row: &TransactionRow, err: ledgerflow_rdbc::Error) -> RowOutcome {
        let reason = if err.is_constraint_violation() {
            warn!(
                transaction_id = %row.transaction_id,
                error = %err,
                "Skipping transaction due to integrity error"
            );
            SkipReason::Integrity
        } else {
            error!(
                transaction_id = %row.transaction_id,
                category = %err.category(),
                error = %err,
                "Error inserting transaction"
            );
            SkipReason::Other
        };
        RowOutcome::Skipped {
            reason,
            error: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerflow_rdbc::testing::MemoryDatabase;

    #[test]
    fn test_statement() {
        let writer = RowWriter::new(Arc::new(MemoryDatabase::new().factory()), DEFAULT_TABLE).unwrap();
        assert_eq!(
            writer.sql(),
            "INSERT INTO \"monetary_transaction\" (\"transaction_id\", \"client_id\", \"account_id\", \"amount\", \"status\", \"timestamp\") VALUES ($1, $2, $3, $4, $5, $6)"
        );
    }

    #[test]
    fn test_rejects_bad_table() {
        let factory = Arc::new(MemoryDatabase::new().factory());
        assert!(matches!(
            RowWriter::new(factory, "x; DROP TABLE y"),
            Err(RowWriteError::Config(_))
        ));
    }
}
