//! Identifier validation and per-dialect quoting.
//!
//! SQL identifiers cannot be passed as parameters in prepared statements,
//! so every dynamically assembled query quotes them through this module.
//! Validation rejects empty names, embedded null bytes, and over-long
//! names before any quoting is applied.

use crate::core::catalog::Dialect;
use crate::error::{DriftError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - SQL Server: 128 characters
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for suspicious patterns.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DriftError::Identifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(DriftError::Identifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DriftError::Identifier(format!(
            "identifier exceeds {} bytes (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier for a dialect.
///
/// - SQLite, PostgreSQL: `"name"` with internal double quotes doubled
/// - MySQL: `` `name` `` with internal backticks doubled
/// - SQL Server: `[name]` with internal closing brackets doubled
pub fn quote_ident(dialect: Dialect, name: &str) -> String {
    match dialect {
        Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
        Dialect::Sqlserver => format!("[{}]", name.replace(']', "]]")),
    }
}

/// Qualify a table name with its schema, quoting both parts. An empty
/// schema (SQLite) yields just the quoted name.
pub fn qualify(dialect: Dialect, schema: &str, name: &str) -> String {
    if schema.is_empty() {
        quote_ident(dialect, name)
    } else {
        format!(
            "{}.{}",
            quote_ident(dialect, schema),
            quote_ident(dialect, name)
        )
    }
}

/// Render a string as a single-quoted SQL literal with internal quotes
/// doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("bad\0name").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_quote_ident_per_dialect() {
        assert_eq!(quote_ident(Dialect::Postgres, "users"), "\"users\"");
        assert_eq!(quote_ident(Dialect::Postgres, "we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_ident(Dialect::Mysql, "users"), "`users`");
        assert_eq!(quote_ident(Dialect::Mysql, "we`ird"), "`we``ird`");
        assert_eq!(quote_ident(Dialect::Sqlserver, "users"), "[users]");
        assert_eq!(quote_ident(Dialect::Sqlserver, "we]ird"), "[we]]ird]");
        assert_eq!(quote_ident(Dialect::Sqlite, "users"), "\"users\"");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(
            qualify(Dialect::Postgres, "public", "users"),
            "\"public\".\"users\""
        );
        assert_eq!(qualify(Dialect::Sqlite, "", "users"), "\"users\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("hello"), "'hello'");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }
}
