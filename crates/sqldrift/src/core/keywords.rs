//! Keyword constants shared by the catalog model, introspector, and
//! migration planners.
//!
//! The exact spellings matter: constraint records store these strings and
//! consumers compare against them verbatim.

/// PRIMARY KEY constraint kind.
pub const PRIMARY_KEY: &str = "PRIMARY KEY";

/// FOREIGN KEY constraint kind.
pub const FOREIGN_KEY: &str = "FOREIGN KEY";

/// UNIQUE constraint kind.
pub const UNIQUE: &str = "UNIQUE";

/// CHECK constraint kind.
pub const CHECK: &str = "CHECK";

/// EXCLUDE constraint kind (Postgres only).
pub const EXCLUDE: &str = "EXCLUDE";

/// Index object kind.
pub const INDEX: &str = "INDEX";

/// Identity clause: GENERATED BY DEFAULT AS IDENTITY.
pub const GENERATED_BY_DEFAULT_AS_IDENTITY: &str = "GENERATED BY DEFAULT AS IDENTITY";

/// Identity clause: GENERATED ALWAYS AS IDENTITY.
pub const GENERATED_ALWAYS_AS_IDENTITY: &str = "GENERATED ALWAYS AS IDENTITY";

/// Identity clause: IDENTITY (SQL Server).
pub const IDENTITY: &str = "IDENTITY";

/// Foreign-key action: RESTRICT.
pub const RESTRICT: &str = "RESTRICT";

/// Foreign-key action: CASCADE.
pub const CASCADE: &str = "CASCADE";

/// Foreign-key action: NO ACTION.
///
/// NO ACTION is the default action and is normalized to the empty string
/// when stored on a constraint or column record.
pub const NO_ACTION: &str = "NO ACTION";

/// Foreign-key action: SET NULL.
pub const SET_NULL: &str = "SET NULL";

/// Foreign-key action: SET DEFAULT.
pub const SET_DEFAULT: &str = "SET DEFAULT";

/// Routine kind: PROCEDURE.
pub const PROCEDURE: &str = "PROCEDURE";

/// Routine kind: FUNCTION.
pub const FUNCTION: &str = "FUNCTION";

/// Normalize a foreign-key action for storage: NO ACTION is the default
/// and is stored as the empty string.
pub fn normalize_fk_rule(rule: &str) -> String {
    let upper = rule.trim().to_uppercase();
    if upper == NO_ACTION || upper.is_empty() {
        String::new()
    } else {
        upper
    }
}
