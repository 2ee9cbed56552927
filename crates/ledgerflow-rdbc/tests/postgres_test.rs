//! PostgreSQL backend tests against a real server.
//!
//! Requires Docker. Run with `cargo test -p ledgerflow-rdbc -- --ignored`.

#![cfg(feature = "postgres")]

use ledgerflow_rdbc::postgres::PgConnectionFactory;
use ledgerflow_rdbc::prelude::*;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use secrecy::SecretString;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

async fn connect(host: &str, port: u16) -> Box<dyn Connection> {
    let config = ConnectionConfig::new(host, "postgres")
        .with_port(port)
        .with_credentials("postgres", SecretString::from("postgres".to_string()));

    let mut last_err = None;
    for _ in 0..30 {
        match PgConnectionFactory.connect(&config).await {
            Ok(conn) => return conn,
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
        }
    }
    panic!("PostgreSQL never became ready: {:?}", last_err);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unique_violation_maps_to_constraint() {
    let container = Postgres::default().start().await.unwrap();
    let host = container.get_host().await.unwrap().to_string();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let conn = connect(&host, port).await;

    conn.execute(
        "CREATE TABLE monetary_transaction (transaction_id TEXT PRIMARY KEY, amount NUMERIC)",
        &[],
    )
    .await
    .unwrap();

    let sql = insert_statement("monetary_transaction", &["transaction_id", "amount"]).unwrap();
    let params = [Value::from("tx-1"), Value::from(Decimal::new(1250, 2))];

    let tx = conn.begin().await.unwrap();
    assert_eq!(tx.execute(&sql, &params).await.unwrap(), 1);
    tx.commit().await.unwrap();

    let tx = conn.begin().await.unwrap();
    let err = tx.execute(&sql, &params).await.unwrap_err();
    assert!(err.is_constraint_violation(), "got {err:?}");
    tx.rollback().await.unwrap();

    assert!(conn.is_valid().await);
    conn.close().await.unwrap();
    assert!(!conn.is_valid().await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_text_values_coerce_into_typed_columns() {
    let container = Postgres::default().start().await.unwrap();
    let host = container.get_host().await.unwrap().to_string();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let conn = connect(&host, port).await;

    conn.execute(
        "CREATE TABLE monetary_transaction (
            transaction_id UUID PRIMARY KEY,
            client_id BIGINT NOT NULL,
            account_id TEXT NOT NULL,
            amount DOUBLE PRECISION NOT NULL,
            status TEXT NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL
        )",
        &[],
    )
    .await
    .unwrap();

    let columns = ["transaction_id", "client_id", "account_id", "amount", "status", "timestamp"];
    let sql = insert_statement("monetary_transaction", &columns).unwrap();
    let timestamp =
        NaiveDateTime::parse_from_str("2024-04-05T10:00:00Z", "%Y-%m-%dT%H:%M:%SZ").unwrap();
    let row = |id: &str| {
        [
            Value::from(id),
            Value::from("1001"),
            Value::from("acc-1"),
            Value::from(Decimal::new(12550, 2)),
            Value::from("SETTLED"),
            Value::from(timestamp),
        ]
    };

    let id = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";
    let tx = conn.begin().await.unwrap();
    assert_eq!(tx.execute(&sql, &row(id)).await.unwrap(), 1);
    tx.commit().await.unwrap();

    let matched = conn
        .execute(
            "UPDATE monetary_transaction SET status = 'CHECKED'
             WHERE transaction_id = '3f2504e0-4f89-11d3-9a0c-0305e82c3301'
               AND client_id = 1001 AND amount = 125.5
               AND timestamp = TIMESTAMP '2024-04-05 10:00:00'",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(matched, 1);

    let tx = conn.begin().await.unwrap();
    let err = tx.execute(&sql, &row(id)).await.unwrap_err();
    assert!(err.is_constraint_violation(), "got {err:?}");
    tx.rollback().await.unwrap();

    let tx = conn.begin().await.unwrap();
    let err = tx.execute(&sql, &row("tx-not-a-uuid")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Query, "got {err:?}");
    tx.rollback().await.unwrap();

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_failure_is_connection_error() {
    let config = ConnectionConfig::new("127.0.0.1", "user_db")
        .with_port(1)
        .with_connect_timeout(500);
    let err = PgConnectionFactory.connect(&config).await.err().unwrap();
    assert_eq!(err.category(), ErrorCategory::Connection);
}
