//! Identifier validation for statements built from configuration.
//!
//! Table and column names cannot be bound as parameters, so every name that
//! reaches generated SQL goes through [`validate_sql_identifier`] and is then
//! double-quoted with [`quote_identifier`].

use crate::error::Error;

/// Validate a SQL identifier (table and column names).
///
/// - Must not be empty
/// - Maximum 63 characters (PostgreSQL `NAMEDATALEN - 1`)
/// - Must start with ASCII letter or underscore
/// - May only contain ASCII alphanumeric characters and underscores
///
/// # Examples
///
/// ```
/// use ledgerflow_rdbc::security::validate_sql_identifier;
///
/// assert!(validate_sql_identifier("monetary_transaction").is_ok());
/// assert!(validate_sql_identifier("x; DROP TABLE users--").is_err());
/// assert!(validate_sql_identifier("").is_err());
/// assert!(validate_sql_identifier("123abc").is_err());
/// ```
pub fn validate_sql_identifier(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::config("SQL identifier cannot be empty"));
    }

    if name.len() > 63 {
        return Err(Error::config(format!(
            "SQL identifier too long: {} chars (max 63)",
            name.len()
        )));
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => {
            return Err(Error::config(format!(
                "Invalid SQL identifier '{}': must start with a letter or underscore",
                name
            )));
        }
    }

    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(Error::config(format!(
                "Invalid SQL identifier '{}': contains invalid character '{}'",
                name, c
            )));
        }
    }

    Ok(())
}

/// Double-quote an identifier that already passed validation.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Build a parameterized `INSERT` for `table` and `columns` (`$1..$n` placeholders).
pub fn insert_statement(table: &str, columns: &[&str]) -> crate::Result<String> {
    validate_sql_identifier(table)?;
    if columns.is_empty() {
        return Err(Error::config("INSERT requires at least one column"));
    }
    for column in columns {
        validate_sql_identifier(column)?;
    }

    let column_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        column_list,
        placeholders
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_sql_identifier("a").is_ok());
        assert!(validate_sql_identifier("_private").is_ok());
        assert!(validate_sql_identifier("monetary_transaction").is_ok());
        assert!(validate_sql_identifier(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_sql_identifier("").is_err());
        assert!(validate_sql_identifier("9lives").is_err());
        assert!(validate_sql_identifier("my-table").is_err());
        assert!(validate_sql_identifier("a b").is_err());
        assert!(validate_sql_identifier("t\"; --").is_err());
        assert!(validate_sql_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_insert_statement() {
        let sql = insert_statement("monetary_transaction", &["transaction_id", "amount"]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"monetary_transaction\" (\"transaction_id\", \"amount\") VALUES ($1, $2)"
        );
    }

    #[test]
    fn test_insert_statement_rejects_bad_names() {
        assert!(insert_statement("t; drop", &["a"]).is_err());
        assert!(insert_statement("t", &["a", "b c"]).is_err());
        assert!(insert_statement("t", &[]).is_err());
    }
}
