//! In-memory database for testing relational writers
//!
//! [`MemoryDatabase`] behaves like a single table whose first bound parameter
//! is a unique key. Inserts inside a transaction are staged and only become
//! visible on commit, so per-row isolation can be asserted without a server.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerflow_rdbc::testing::MemoryDatabase;
//!
//! let db = MemoryDatabase::new();
//! let factory = db.factory();
//! // hand `factory` to the code under test, then:
//! assert_eq!(db.committed_keys(), vec!["tx-1".to_string()]);
//! assert_eq!(db.close_count(), 1);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::connection::{Connection, ConnectionConfig, ConnectionFactory, DatabaseType, Transaction};
use crate::error::{Error, Result};
use crate::types::Value;

#[derive(Debug, Default)]
struct State {
    rows: Vec<Vec<Value>>,
    statements: Vec<String>,
    failing_keys: HashSet<String>,
    dropping_keys: HashSet<String>,
    lost: bool,
    connect_failure: Option<String>,
    connects: usize,
    closes: usize,
    commits: usize,
    rollbacks: usize,
}

impl State {
    fn contains_key(&self, key: &str) -> bool {
        self.rows.iter().any(|row| key_of(row).as_deref() == Some(key))
    }
}

fn key_of(params: &[Value]) -> Option<String> {
    params
        .first()
        .map(|v| v.as_str().map_or_else(|| format!("{:?}", v), str::to_string))
}

/// Shared in-memory table with connection bookkeeping
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a committed row
    pub fn with_row(self, row: Vec<Value>) -> Self {
        self.state.lock().rows.push(row);
        self
    }

    /// Make every connection attempt fail with `message`
    pub fn fail_connect(self, message: impl Into<String>) -> Self {
        self.state.lock().connect_failure = Some(message.into());
        self
    }

    /// Make inserts whose key equals `key` fail with a non-constraint error
    pub fn fail_key(self, key: impl Into<String>) -> Self {
        self.state.lock().failing_keys.insert(key.into());
        self
    }

    /// Make the server drop the session when `key` is inserted
    ///
    /// Every later call on that session fails with a connection error. The
    /// next connect starts a fresh session.
    pub fn drop_connection_at(self, key: impl Into<String>) -> Self {
        self.state.lock().dropping_keys.insert(key.into());
        self
    }

    /// Factory handing out connections to this database
    pub fn factory(&self) -> MemoryConnectionFactory {
        MemoryConnectionFactory { db: self.clone() }
    }

    /// Committed rows in insertion order
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.state.lock().rows.clone()
    }

    /// Keys of committed rows in insertion order
    pub fn committed_keys(&self) -> Vec<String> {
        self.state.lock().rows.iter().filter_map(|r| key_of(r)).collect()
    }

    /// Every statement text executed, in order
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Number of successful connects
    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    /// Number of connection closes
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Number of committed transactions
    pub fn commit_count(&self) -> usize {
        self.state.lock().commits
    }

    /// Number of rolled back transactions
    pub fn rollback_count(&self) -> usize {
        self.state.lock().rollbacks
    }
}

/// Connection factory for [`MemoryDatabase`]
#[derive(Debug, Clone)]
pub struct MemoryConnectionFactory {
    db: MemoryDatabase,
}

#[async_trait]
impl ConnectionFactory for MemoryConnectionFactory {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let mut state = self.db.state.lock();
        if let Some(message) = &state.connect_failure {
            return Err(Error::connection(message.clone()));
        }
        state.connects += 1;
        state.lost = false;
        Ok(Box::new(MemoryConnection {
            db: self.db.clone(),
            closed: Mutex::new(false),
        }))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Memory
    }
}

/// Connection to a [`MemoryDatabase`]
#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
    closed: Mutex<bool>,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<()> {
        if *self.closed.lock() {
            return Err(Error::connection("connection is closed"));
        }
        if self.db.state.lock().lost {
            return Err(Error::connection("server closed the connection unexpectedly"));
        }
        Ok(())
    }
}

fn stage(db: &MemoryDatabase, staged: &[Vec<Value>], sql: &str, params: &[Value]) -> Result<()> {
    let mut state = db.state.lock();
    if state.lost {
        return Err(Error::connection("server closed the connection unexpectedly"));
    }
    state.statements.push(sql.to_string());

    let key = key_of(params).ok_or_else(|| Error::query_with_sql("no parameters bound", sql))?;
    if state.dropping_keys.contains(&key) {
        state.lost = true;
        return Err(Error::connection(format!(
            "server closed the connection while inserting {}",
            key
        )));
    }
    if state.failing_keys.contains(&key) {
        return Err(Error::query_with_sql(
            format!("injected failure for key {}", key),
            sql,
        ));
    }
    let staged_dup = staged.iter().any(|r| key_of(r).as_deref() == Some(key.as_str()));
    if staged_dup || state.contains_key(&key) {
        return Err(Error::constraint(
            "memory_pkey",
            format!("duplicate key value ({})", key),
        ));
    }
    Ok(())
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_open()?;
        stage(&self.db, &[], sql, params)?;
        let mut state = self.db.state.lock();
        state.rows.push(params.to_vec());
        Ok(1)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        Ok(Box::new(MemoryTransaction {
            db: self.db.clone(),
            staged: Mutex::new(Vec::new()),
        }))
    }

    async fn is_valid(&self) -> bool {
        !*self.closed.lock()
    }

    async fn close(&self) -> Result<()> {
        let mut closed = self.closed.lock();
        if !*closed {
            *closed = true;
            self.db.state.lock().closes += 1;
        }
        Ok(())
    }
}

/// Transaction staged against a [`MemoryDatabase`]
#[derive(Debug)]
pub struct MemoryTransaction {
    db: MemoryDatabase,
    staged: Mutex<Vec<Vec<Value>>>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut staged = self.staged.lock();
        stage(&self.db, &staged, sql, params)?;
        staged.push(params.to_vec());
        Ok(1)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let staged = std::mem::take(&mut *self.staged.lock());
        let mut state = self.db.state.lock();
        if state.lost {
            return Err(Error::connection("server closed the connection unexpectedly"));
        }
        state.rows.extend(staged);
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut state = self.db.state.lock();
        if state.lost {
            return Err(Error::connection("server closed the connection unexpectedly"));
        }
        state.rollbacks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("localhost", "user_db")
    }

    #[tokio::test]
    async fn test_commit_makes_rows_visible() {
        let db = MemoryDatabase::new();
        let conn = db.factory().connect(&config()).await.unwrap();

        let tx = conn.begin().await.unwrap();
        tx.execute("INSERT", &[Value::from("a")]).await.unwrap();
        assert!(db.committed_keys().is_empty());
        tx.commit().await.unwrap();

        assert_eq!(db.committed_keys(), vec!["a".to_string()]);
        assert_eq!(db.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_rows() {
        let db = MemoryDatabase::new();
        let conn = db.factory().connect(&config()).await.unwrap();

        let tx = conn.begin().await.unwrap();
        tx.execute("INSERT", &[Value::from("a")]).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(db.committed_keys().is_empty());
        assert_eq!(db.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_key_is_constraint_violation() {
        let db = MemoryDatabase::new().with_row(vec![Value::from("a")]);
        let conn = db.factory().connect(&config()).await.unwrap();

        let tx = conn.begin().await.unwrap();
        let err = tx.execute("INSERT", &[Value::from("a")]).await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let db = MemoryDatabase::new().fail_key("bad");
        let conn = db.factory().connect(&config()).await.unwrap();
        let tx = conn.begin().await.unwrap();
        let err = tx.execute("INSERT", &[Value::from("bad")]).await.unwrap_err();
        assert!(!err.is_constraint_violation());

        let down = MemoryDatabase::new().fail_connect("refused");
        let err = down.factory().connect(&config()).await.err().unwrap();
        assert_eq!(err.category(), crate::ErrorCategory::Connection);
        assert_eq!(down.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_session_fails_until_reconnect() {
        let db = MemoryDatabase::new().drop_connection_at("b");
        let conn = db.factory().connect(&config()).await.unwrap();

        let tx = conn.begin().await.unwrap();
        let err = tx.execute("INSERT", &[Value::from("b")]).await.unwrap_err();
        assert!(err.category().ends_session());
        assert!(tx.rollback().await.is_err());
        assert!(conn.begin().await.is_err());

        let fresh = db.factory().connect(&config()).await.unwrap();
        fresh.execute("INSERT", &[Value::from("a")]).await.unwrap();
        assert_eq!(db.committed_keys(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_close_is_counted_once() {
        let db = MemoryDatabase::new();
        let conn = db.factory().connect(&config()).await.unwrap();
        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(db.close_count(), 1);
        assert!(!conn.is_valid().await);
        assert!(conn.begin().await.is_err());
    }
}
