//! Database errors
//!
//! Every failure carries an [`ErrorCategory`]. The row loader only needs two
//! answers from it: did this row break a constraint, and is the session still
//! usable afterwards.

use std::fmt;
use thiserror::Error;

/// Result alias for database calls
pub type Result<T> = std::result::Result<T, Error>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Session could not be opened or dropped mid-use
    Connection,
    /// Statement rejected by the server
    Query,
    /// BEGIN, COMMIT or ROLLBACK failed
    Transaction,
    /// Unique, foreign-key, check or not-null violation
    Constraint,
    /// Credentials refused
    Authentication,
    /// Invalid identifiers or settings, detected before any I/O
    Configuration,
}

impl ErrorCategory {
    /// Lower-case label used in log fields
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Query => "query",
            Self::Transaction => "transaction",
            Self::Constraint => "constraint",
            Self::Authentication => "authentication",
            Self::Configuration => "configuration",
        }
    }

    /// The session cannot be used for further statements
    pub const fn ends_session(self) -> bool {
        matches!(
            self,
            Self::Connection | Self::Authentication | Self::Configuration
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database error
#[derive(Error, Debug)]
pub enum Error {
    /// Session failure
    #[error("connection error: {message}")]
    Connection {
        /// Server or driver message
        message: String,
        /// Driver error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Statement failure other than a constraint violation
    #[error("query error: {message}")]
    Query {
        /// Server message
        message: String,
        /// Statement text
        sql: Option<String>,
        /// Driver error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Transaction control failure
    #[error("transaction error: {message}")]
    Transaction {
        /// Server message
        message: String,
        /// Driver error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Integrity violation (SQLSTATE class 23)
    #[error("constraint violation: {constraint_name} - {message}")]
    Constraint {
        /// Violated constraint, or the SQLSTATE when the server names none
        constraint_name: String,
        /// Server message
        message: String,
    },

    /// Login rejected (SQLSTATE class 28)
    #[error("authentication failed: {message}")]
    Authentication {
        /// Server message
        message: String,
    },

    /// Rejected before reaching the server
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong
        message: String,
    },
}

impl Error {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Transaction { .. } => ErrorCategory::Transaction,
            Self::Constraint { .. } => ErrorCategory::Constraint,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    /// True for integrity violations
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Constraint { .. })
    }

    /// Session failure without a driver source
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Session failure wrapping a driver error
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Statement failure for `sql`
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Integrity violation
    pub fn constraint(constraint_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Constraint {
            constraint_name: constraint_name.into(),
            message: message.into(),
        }
    }

    /// Settings rejected before any I/O
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
