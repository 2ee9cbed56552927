//! # ledgerflow-rdbc
//!
//! Relational database connectivity for ledgerflow writers.
//!
//! This crate provides the session-level abstractions the row writer is built on:
//!
//! ```text
//! ConnectionFactory ──connect──▶ Connection ──begin──▶ Transaction
//!                                    │                   ├── execute
//!                                    │                   ├── commit
//!                                    └── close           └── rollback
//! ```
//!
//! ## Features
//!
//! - **Typed parameters**: [`Value`] covers the column types ledger rows bind
//! - **Error classification**: [`ErrorCategory`] separates constraint
//!   violations (row-scoped) from connection failures (session-scoped)
//! - **Identifier safety**: generated statements only accept validated names
//! - **Test database**: [`testing::MemoryDatabase`] with staged transactions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ledgerflow_rdbc::prelude::*;
//! use ledgerflow_rdbc::postgres::PgConnectionFactory;
//!
//! let config = ConnectionConfig::new("db.internal", "user_db")
//!     .with_credentials("ledger", password);
//! let conn = PgConnectionFactory.connect(&config).await?;
//!
//! let tx = conn.begin().await?;
//! tx.execute("INSERT INTO t (id) VALUES ($1)", &[Value::from("tx-1")]).await?;
//! tx.commit().await?;
//! conn.close().await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `postgres` (default) - PostgreSQL support via tokio-postgres

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod connection;
pub mod error;
pub mod security;
pub mod testing;
pub mod types;

// Backend implementations (conditionally compiled)
#[cfg(feature = "postgres")]
pub mod postgres;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::connection::{
        Connection, ConnectionConfig, ConnectionFactory, DatabaseType, Transaction,
    };
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::security::{insert_statement, validate_sql_identifier};
    pub use crate::types::Value;
}

// Re-export commonly used items at crate root
pub use error::{Error, ErrorCategory, Result};
pub use types::Value;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _value = Value::from("tx-1");
        let _config = ConnectionConfig::new("localhost", "user_db");
        let _sql = insert_statement("t", &["a"]).unwrap();
    }

    #[test]
    fn test_error_types() {
        let err = Error::connection("test error");
        assert!(err.category().ends_session());
        assert_eq!(err.category(), ErrorCategory::Connection);
    }
}
