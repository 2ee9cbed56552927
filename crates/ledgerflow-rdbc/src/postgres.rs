//! PostgreSQL backend implementation for ledgerflow-rdbc
//!
//! Provides PostgreSQL-specific implementations:
//! - Connection with explicit transaction control
//! - Text-format parameters, so the server coerces values into whatever the
//!   target columns are declared as (`UUID`, `BIGINT`, `TIMESTAMPTZ`, ...)
//! - SQLSTATE classification (class 23 → [`Error::Constraint`])
//! - Connection factory driven by [`ConnectionConfig`]

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionConfig, ConnectionFactory, DatabaseType, Transaction};
use crate::error::{Error, Result};
use crate::types::Value;

/// Parameter sent in text format
///
/// The server parses the text with the input function of the parameter type
/// it inferred from the statement, exactly as it would a quoted literal.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TextParam(Option<String>);

impl From<&Value> for TextParam {
    fn from(value: &Value) -> Self {
        Self(value.to_sql_text())
    }
}

impl ToSql for TextParam {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match &self.0 {
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

/// Classify a driver error by SQLSTATE
fn map_pg_error(err: tokio_postgres::Error, sql: &str) -> Error {
    if let Some(db) = err.as_db_error() {
        let code = db.code().code();
        if code.starts_with("23") {
            return Error::constraint(db.constraint().unwrap_or(code), db.message());
        }
        if code.starts_with("28") {
            return Error::Authentication {
                message: db.message().to_string(),
            };
        }
        if code.starts_with("08") {
            return Error::connection_with_source(db.message().to_string(), err);
        }
        return Error::Query {
            message: db.message().to_string(),
            sql: Some(sql.to_string()),
            source: Some(Box::new(err)),
        };
    }

    if err.is_closed() {
        return Error::connection_with_source("connection is closed", err);
    }

    Error::Query {
        message: err.to_string(),
        sql: Some(sql.to_string()),
        source: Some(Box::new(err)),
    }
}

async fn execute_on(client: &tokio_postgres::Client, sql: &str, params: &[Value]) -> Result<u64> {
    let text_params: Vec<TextParam> = params.iter().map(TextParam::from).collect();
    let param_refs: Vec<&(dyn ToSql + Sync)> = text_params
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect();

    client
        .execute(sql, &param_refs)
        .await
        .map_err(|e| map_pg_error(e, sql))
}

async fn control(client: &tokio_postgres::Client, statement: &str) -> Result<()> {
    client
        .batch_execute(statement)
        .await
        .map_err(|e| match map_pg_error(e, statement) {
            Error::Query {
                message, source, ..
            } => Error::Transaction { message, source },
            other => other,
        })
}

/// PostgreSQL connection implementation
pub struct PgConnection {
    client: Arc<tokio_postgres::Client>,
    driver: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PgConnection {
    /// Create a new connection from a tokio-postgres client and its driver task
    pub fn new(client: tokio_postgres::Client, driver: JoinHandle<()>) -> Self {
        Self {
            client: Arc::new(client),
            driver: Mutex::new(Some(driver)),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the underlying client
    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::connection("connection is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_open()?;
        execute_on(&self.client, sql, params).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        control(&self.client, "BEGIN").await?;

        Ok(Box::new(PgTransaction {
            client: Arc::clone(&self.client),
        }))
    }

    async fn is_valid(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.client.simple_query("SELECT 1").await.is_ok()
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
        debug!("PostgreSQL connection closed");
        Ok(())
    }
}

/// PostgreSQL transaction
pub struct PgTransaction {
    client: Arc<tokio_postgres::Client>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        execute_on(&self.client, sql, params).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        control(&self.client, "COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        control(&self.client, "ROLLBACK").await
    }
}

/// PostgreSQL connection factory
#[derive(Debug, Clone, Default)]
pub struct PgConnectionFactory;

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .user(&config.user)
            .password(config.expose_password())
            .connect_timeout(config.connect_timeout());
        if let Some(name) = &config.application_name {
            pg.application_name(name);
        }

        let (client, connection) = pg.connect(tokio_postgres::NoTls).await.map_err(|e| {
            match e.as_db_error().map(|db| db.code().code().to_string()) {
                Some(code) if code.starts_with("28") => Error::Authentication {
                    message: e.to_string(),
                },
                _ => Error::connection_with_source(
                    format!("failed to connect to {}:{}", config.host, config.port),
                    e,
                ),
            }
        })?;

        // Spawn the connection handler
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "PostgreSQL connection error");
            }
        });

        debug!(host = %config.host, database = %config.database, "PostgreSQL connection established");
        Ok(Box::new(PgConnection::new(client, driver)))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_text_params_accept_any_column_type() {
        for ty in [Type::UUID, Type::INT8, Type::TIMESTAMPTZ, Type::FLOAT8, Type::NUMERIC, Type::TEXT] {
            assert!(<TextParam as ToSql>::accepts(&ty), "{ty}");
        }
    }

    #[test]
    fn test_text_param_encoding() {
        let amount = TextParam::from(&Value::Decimal(Decimal::new(1250, 2)));
        assert!(matches!(amount.encode_format(&Type::FLOAT8), Format::Text));

        let mut out = BytesMut::new();
        assert!(matches!(amount.to_sql(&Type::FLOAT8, &mut out), Ok(IsNull::No)));
        assert_eq!(&out[..], b"12.50");

        let mut out = BytesMut::new();
        let null = TextParam::from(&Value::Null);
        assert!(matches!(null.to_sql(&Type::UUID, &mut out), Ok(IsNull::Yes)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_factory_database_type() {
        assert_eq!(
            PgConnectionFactory.database_type(),
            DatabaseType::PostgreSQL
        );
    }
}
