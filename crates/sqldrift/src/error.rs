//! Error types for the schema migration core.

use thiserror::Error;

/// Main error type for catalog, introspection, and subsetting operations.
#[derive(Error, Debug)]
pub enum DriftError {
    /// Dialect tag outside the supported set.
    #[error("Unsupported dialect: {0:?}")]
    UnsupportedDialect(String),

    /// A query template failed to render.
    #[error("Template {template} failed to render: {message}")]
    TemplateRender { template: String, message: String },

    /// A database query failed. Carries the rendered query and the
    /// template it came from so the failing SQL can be reproduced.
    #[error("Query from {template} failed: {message}\n  Query: {query}")]
    Query {
        template: String,
        query: String,
        message: String,
    },

    /// A result row could not be scanned into a catalog record.
    #[error("scanning {entity}: {message}")]
    Scan { entity: String, message: String },

    /// Closing a result stream failed after the rows were consumed.
    #[error("Closing rows: {0}")]
    RowsClose(String),

    /// A seed query is syntactically invalid.
    #[error("Invalid seed query: {message}\n  Query: {query}")]
    SeedSyntax { query: String, message: String },

    /// A seed query failed during execution.
    #[error("Seed query failed: {message}\n  Query: {query}")]
    Seed { query: String, message: String },

    /// A subsetted table has no primary key.
    #[error("Table {0} has no primary key - cannot subset without one")]
    NoPrimaryKey(String),

    /// Invalid DSN or connection string.
    #[error("Invalid DSN: {0}")]
    Dsn(String),

    /// Invalid identifier (empty, null byte, over-long).
    #[error("Invalid identifier: {0}")]
    Identifier(String),

    /// The operation was cancelled via its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error (DSN file sniffing).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriftError {
    /// Create a Query error from a template name, the rendered SQL, and
    /// the underlying driver message.
    pub fn query(
        template: impl Into<String>,
        query: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DriftError::Query {
            template: template.into(),
            query: query.into(),
            message: message.into(),
        }
    }

    /// Create a Scan error naming the entity kind being read.
    pub fn scan(entity: impl Into<String>, message: impl Into<String>) -> Self {
        DriftError::Scan {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a Seed error carrying the offending seed query.
    pub fn seed(query: impl Into<String>, message: impl Into<String>) -> Self {
        DriftError::Seed {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Create a SeedSyntax error carrying the offending seed query.
    pub fn seed_syntax(query: impl Into<String>, message: impl Into<String>) -> Self {
        DriftError::SeedSyntax {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration-core operations.
pub type Result<T> = std::result::Result<T, DriftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_carries_context() {
        let err = DriftError::query("postgres/columns", "SELECT 1", "connection reset");
        let msg = err.to_string();
        assert!(msg.contains("postgres/columns"));
        assert!(msg.contains("SELECT 1"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_scan_error_names_entity() {
        let err = DriftError::scan("Column", "expected text, got Bool");
        assert_eq!(
            err.to_string(),
            "scanning Column: expected text, got Bool"
        );
    }

    #[test]
    fn test_no_primary_key_names_table() {
        let err = DriftError::NoPrimaryKey("public.log".to_string());
        assert!(err.to_string().contains("public.log"));
    }
}
