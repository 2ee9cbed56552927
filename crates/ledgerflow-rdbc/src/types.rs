//! Value types for ledgerflow-rdbc
//!
//! The subset of SQL values the ledger writers bind as statement parameters.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// SQL value bound as a statement parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer (BIGINT)
    Int64(i64),
    /// 64-bit floating point (DOUBLE PRECISION)
    Float64(f64),
    /// Arbitrary precision decimal (NUMERIC, DECIMAL)
    Decimal(Decimal),
    /// Text string (VARCHAR, TEXT, CHAR)
    String(String),
    /// Timestamp without timezone (TIMESTAMP)
    DateTime(NaiveDateTime),
}

/// Timestamp layout sent to the server; the column type decides the zone
pub const TIMESTAMP_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

impl Value {
    /// Get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text form of the value as the server would parse it, `None` for NULL
    ///
    /// Binding in text form lets the server coerce into the declared column
    /// type, so a `TEXT` id binds equally into `UUID` or `BIGINT` columns.
    pub fn to_sql_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int64(n) => Some(n.to_string()),
            Self::Float64(n) => Some(n.to_string()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::DateTime(dt) => Some(dt.format(TIMESTAMP_TEXT_FORMAT).to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::from(Option::<String>::None), Value::Null);
        assert_eq!(Value::from(Some(7_i64)), Value::Int64(7));
    }

    #[test]
    fn test_sql_text() {
        assert_eq!(Value::Null.to_sql_text(), None);
        assert_eq!(Value::from(true).to_sql_text().as_deref(), Some("true"));
        assert_eq!(Value::from(-42_i64).to_sql_text().as_deref(), Some("-42"));
        assert_eq!(Value::from(1.5_f64).to_sql_text().as_deref(), Some("1.5"));
        assert_eq!(
            Value::from(Decimal::from_str("125.50").unwrap()).to_sql_text().as_deref(),
            Some("125.50")
        );
        assert_eq!(
            Value::from("3f2504e0-4f89-11d3-9a0c-0305e82c3301").to_sql_text().as_deref(),
            Some("3f2504e0-4f89-11d3-9a0c-0305e82c3301")
        );
    }

    #[test]
    fn test_timestamp_text() {
        let ts = NaiveDateTime::parse_from_str("2024-04-05T10:00:00Z", "%Y-%m-%dT%H:%M:%SZ").unwrap();
        assert_eq!(
            Value::from(ts).to_sql_text().as_deref(),
            Some("2024-04-05 10:00:00")
        );
        let precise = ts + chrono::Duration::microseconds(250);
        assert_eq!(
            Value::from(precise).to_sql_text().as_deref(),
            Some("2024-04-05 10:00:00.000250")
        );
    }
}
