//! Tests for the row write engine

use ledgerflow_core::prelude::*;
use ledgerflow_core::row_writer::DEFAULT_TABLE;
use ledgerflow_rdbc::prelude::{ConnectionConfig, ErrorCategory};
use ledgerflow_rdbc::testing::MemoryDatabase;
use ledgerflow_rdbc::Value;
use std::sync::Arc;

fn rows(ids: &[&str]) -> Vec<TransactionRow> {
    let body = ids
        .iter()
        .map(|id| {
            format!(
                r#"{{"transaction_id":"{id}","client_id":"c-1","account_id":"a-1","amount":"10.00","status":"SETTLED","timestamp":"2024-04-05T10:00:00Z"}}"#
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    decode_transactions(format!("[{}]", body).as_bytes()).unwrap()
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new("localhost", "user_db")
}

fn writer(db: &MemoryDatabase) -> RowWriter {
    RowWriter::new(Arc::new(db.factory()), DEFAULT_TABLE).unwrap()
}

#[tokio::test]
async fn test_all_rows_inserted() {
    let db = MemoryDatabase::new();

    let outcome = writer(&db)
        .write(&config(), &rows(&["tx-1", "tx-2", "tx-3"]))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 3);
    assert!(outcome.skipped.is_empty());
    assert_eq!(db.committed_keys(), vec!["tx-1", "tx-2", "tx-3"]);
    assert_eq!(db.connect_count(), 1);
    assert_eq!(db.close_count(), 1);
    assert_eq!(db.commit_count(), 3);
}

#[tokio::test]
async fn test_integrity_violation_isolated_to_row() {
    let db = MemoryDatabase::new().with_row(vec![Value::from("tx-2")]);

    let outcome = writer(&db)
        .write(&config(), &rows(&["tx-1", "tx-2", "tx-3"]))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].transaction_id, "tx-2");
    assert_eq!(outcome.skipped[0].reason, SkipReason::Integrity);
    assert_eq!(db.committed_keys(), vec!["tx-2", "tx-1", "tx-3"]);
    assert_eq!(db.rollback_count(), 1);
    assert_eq!(db.close_count(), 1);
}

#[tokio::test]
async fn test_duplicate_within_file_skips_second() {
    let db = MemoryDatabase::new();

    let outcome = writer(&db)
        .write(&config(), &rows(&["tx-1", "tx-1", "tx-2"]))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.integrity_skips(), 1);
    assert_eq!(db.committed_keys(), vec!["tx-1", "tx-2"]);
}

#[tokio::test]
async fn test_other_error_skips_row_and_continues() {
    let db = MemoryDatabase::new().fail_key("tx-1");

    let outcome = writer(&db)
        .write(&config(), &rows(&["tx-1", "tx-2"]))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.skipped[0].reason, SkipReason::Other);
    assert_eq!(db.committed_keys(), vec!["tx-2"]);
    assert_eq!(db.close_count(), 1);
}

#[tokio::test]
async fn test_lost_session_stops_remaining_rows() {
    let db = MemoryDatabase::new().drop_connection_at("tx-2");

    let outcome = writer(&db)
        .write(&config(), &rows(&["tx-1", "tx-2", "tx-3", "tx-4"]))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 1);
    let skipped: Vec<_> = outcome
        .skipped
        .iter()
        .map(|s| s.transaction_id.as_str())
        .collect();
    assert_eq!(skipped, vec!["tx-2", "tx-3", "tx-4"]);
    assert!(outcome.skipped.iter().all(|s| s.reason == SkipReason::Other));
    assert!(outcome.skipped[2].error.starts_with("not attempted"));

    assert_eq!(db.committed_keys(), vec!["tx-1"]);
    assert_eq!(db.statements().len(), 2);
    assert_eq!(db.close_count(), 1);
}

#[tokio::test]
async fn test_rerun_skips_every_row() {
    let db = MemoryDatabase::new();
    let batch = rows(&["tx-1", "tx-2", "tx-3"]);
    let writer = writer(&db);

    writer.write(&config(), &batch).await.unwrap();
    let rerun = writer.write(&config(), &batch).await.unwrap();

    assert_eq!(rerun.inserted, 0);
    assert_eq!(rerun.integrity_skips(), 3);
    assert_eq!(db.committed_keys().len(), 3);
    assert_eq!(db.close_count(), 2);
}

#[tokio::test]
async fn test_connection_failure_is_distinct() {
    let db = MemoryDatabase::new().fail_connect("could not connect to server");

    let err = writer(&db)
        .write(&config(), &rows(&["tx-1"]))
        .await
        .unwrap_err();

    match err {
        RowWriteError::Connect(source) => {
            assert_eq!(source.category(), ErrorCategory::Connection)
        }
        other => panic!("expected connect error, got {other:?}"),
    }
    assert!(db.committed_keys().is_empty());
    assert_eq!(db.close_count(), 0);
}

#[tokio::test]
async fn test_empty_batch_still_closes() {
    let db = MemoryDatabase::new();
    let outcome = writer(&db).write(&config(), &[]).await.unwrap();
    assert_eq!(outcome, RowWriteOutcome::default());
    assert_eq!(db.connect_count(), 1);
    assert_eq!(db.close_count(), 1);
}

#[tokio::test]
async fn test_rows_bound_in_column_order() {
    let db = MemoryDatabase::new();
    writer(&db)
        .write(&config(), &rows(&["tx-9"]))
        .await
        .unwrap();

    let stored = db.rows();
    assert_eq!(stored[0][0], Value::from("tx-9"));
    assert_eq!(stored[0][1], Value::from("c-1"));
    assert_eq!(stored[0][4], Value::from("SETTLED"));
    assert!(db.statements()[0].starts_with("INSERT INTO \"monetary_transaction\""));
}
