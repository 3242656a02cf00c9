//! Catalog model: the canonical, dialect-tagged representation of a
//! database schema.
//!
//! The tree is database -> schemas -> (tables, views, enums, domains,
//! routines) -> (columns, constraints, indexes, triggers). All records are
//! plain data with value semantics; mutation during introspection and
//! planning flows through [`CatalogCache`](super::cache::CatalogCache).
//!
//! Serialization omits empty strings, empty lists, and false booleans so
//! that a catalog round-trips structurally identical through JSON. The
//! `*_valid` bits distinguish "known empty" from "never populated" and do
//! serialize when set.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

fn is_false(v: &bool) -> bool {
    !*v
}

/// Supported SQL dialects.
///
/// Tags serialize as the exact lowercase strings `sqlite`, `postgres`,
/// `mysql`, `sqlserver`. The `oracle` tag is reserved: it parses in DSN
/// handling but is rejected by every core operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
    Sqlserver,
}

impl Dialect {
    /// The lowercase dialect tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
            Dialect::Sqlserver => "sqlserver",
        }
    }

    /// All supported dialects.
    pub fn all() -> [Dialect; 4] {
        [
            Dialect::Sqlite,
            Dialect::Postgres,
            Dialect::Mysql,
            Dialect::Sqlserver,
        ]
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            "sqlserver" => Ok(Dialect::Sqlserver),
            other => Err(DriftError::UnsupportedDialect(other.to_string())),
        }
    }
}

/// Complete in-memory representation of a database's schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Dialect tag.
    pub dialect: Dialect,

    /// Server version as an ordered sequence of integers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_nums: Vec<i64>,

    /// Database name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database_name: String,

    /// Current/default schema name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_schema: String,

    /// Default collation. `""` is ambiguous, hence the validity bit.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_collation: String,

    /// Whether `default_collation` was actually read.
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_collation_valid: bool,

    /// Installed extensions (Postgres).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,

    /// Whether `extensions` was actually read.
    #[serde(default, skip_serializing_if = "is_false")]
    pub extensions_valid: bool,

    /// Ordered list of schemas.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<SchemaDef>,
}

impl Catalog {
    /// Create an empty catalog for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    /// Serialize to the canonical JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a catalog from its JSON document.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// A named schema and the objects it owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    /// Schema name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableDef>,

    /// Whether the tables list was populated (known-empty vs unknown).
    #[serde(default, skip_serializing_if = "is_false")]
    pub tables_valid: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewDef>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub views_valid: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routines: Vec<RoutineDef>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub routines_valid: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumDef>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub enums_valid: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<DomainDef>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub domains_valid: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    /// Soft-delete flag: the record keeps its slot but is treated as
    /// absent by lookups and by the migration planner.
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

/// A table and everything it owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    /// Owning schema name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    /// Table name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// SQL-text fallback, used verbatim when present (SQLite virtual
    /// tables and other opaque DDL).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sql: String,

    /// SQLite virtual-table flag.
    #[serde(default, skip_serializing_if = "is_false")]
    pub virtual_table: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<TriggerDef>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl TableDef {
    /// The fully qualified `schema.table` name.
    pub fn full_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }
}

/// A view. Materialized views may own indexes and triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// View definition SQL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sql: String,

    /// Whether this is a materialized view (Postgres).
    #[serde(default, skip_serializing_if = "is_false")]
    pub materialized: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<TriggerDef>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

/// A column record.
///
/// `is_primary_key`, `is_unique`, and the `ref_*` foreign-key fields are
/// derived: they are populated only when the column is the sole
/// participant in the corresponding constraint. For composite constraints
/// the constraint record is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub table: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Normalized uppercase type name (e.g. "INT", "VARCHAR").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub col_type: String,

    /// Character length as a string; preserves "MAX" and absent-vs-zero.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub char_length: String,

    /// Numeric precision as a string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub precision: String,

    /// Numeric scale as a string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scale: String,

    /// Domain name (Postgres).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,

    /// Whether the type is an enum (Postgres).
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_enum: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub not_null: bool,

    /// Set only when this column is the sole member of the PK constraint.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_primary_key: bool,

    /// Set only when this column is the sole member of a UNIQUE constraint.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_unique: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_autoincrement: bool,

    /// Referenced schema; set only for single-column foreign keys.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ref_schema: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ref_table: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ref_column: String,

    /// ON UPDATE rule for the single-column FK; NO ACTION stored as "".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub update_rule: String,

    /// ON DELETE rule for the single-column FK; NO ACTION stored as "".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delete_rule: String,

    /// Identity clause: one of the identity keyword constants, or "".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identity: String,

    /// Literal column default with source-language escaping intact.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_value: String,

    /// MySQL ON UPDATE CURRENT_TIMESTAMP.
    #[serde(default, skip_serializing_if = "is_false")]
    pub on_update_current_timestamp: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_generated: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generated_expr: String,

    /// True for STORED generated columns, false for VIRTUAL.
    #[serde(default, skip_serializing_if = "is_false")]
    pub generated_stored: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collation: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

/// A table constraint.
///
/// `kind` is one of the constraint keyword constants. Update/delete rules
/// store NO ACTION as the empty string (it is the default).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDef {
    /// PRIMARY KEY, UNIQUE, FOREIGN KEY, CHECK, or EXCLUDE.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Constraint name; may be empty for SQLite anonymous constraints.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    /// Owning table.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub table: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ref_schema: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ref_table: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ref_columns: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub update_rule: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delete_rule: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub match_option: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub deferrable: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub initially_deferred: bool,

    /// CHECK expression text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub check_expr: String,

    /// EXCLUDE operator list (Postgres).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_operators: Vec<String>,

    /// EXCLUDE index access method (Postgres).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exclude_index_type: String,

    /// EXCLUDE predicate (Postgres).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exclude_predicate: String,

    /// SQL Server clustered constraint.
    #[serde(default, skip_serializing_if = "is_false")]
    pub clustered: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub not_valid: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

/// An index on a table or view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    /// Owning table or view name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub table: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Access method, e.g. "BTREE", "GIN".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub index_type: String,

    /// True when the owner is a view (materialized view index).
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_view_index: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,

    /// Key columns; each entry is an identifier or a parenthesized
    /// expression.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    /// INCLUDE (non-key) columns, parallel to nothing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_columns: Vec<String>,

    /// Per-key-column descending bits, parallel to `columns`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descending: Vec<bool>,

    /// Per-key-column Postgres operator classes, parallel to `columns`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opclasses: Vec<String>,

    /// Partial-index predicate.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub predicate: String,

    /// SQL-text fallback.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sql: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

/// A trigger on a table or view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    /// Owning table or view name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub table: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_view_trigger: bool,

    /// Full trigger SQL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sql: String,

    /// Free-form attributes (e.g. action timing and event manipulation
    /// for MySQL).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

/// A Postgres enum type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Ordered label sequence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

/// A Postgres domain type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Underlying type.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collation: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub not_null: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_value: String,

    /// Check-constraint names, parallel to `check_exprs`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub check_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub check_exprs: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

/// A stored routine (procedure or function).
///
/// For Postgres, `(schema, name, identity_args)` is the routine key so
/// overloads are distinct records; elsewhere `identity_args` is forced
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutineDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Postgres-only overload discriminator.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identity_args: String,

    /// PROCEDURE or FUNCTION.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Full routine SQL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sql: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dialect_tags_round_trip() {
        for d in Dialect::all() {
            assert_eq!(d.as_str().parse::<Dialect>().unwrap(), d);
        }
        assert!("oracle".parse::<Dialect>().is_err());
        assert!("".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_empty_catalog_round_trip() {
        let catalog = Catalog::new(Dialect::Sqlite);
        let json = catalog.to_json().unwrap();
        let parsed = Catalog::from_json(&json).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn test_serialization_omits_empty_fields() {
        let catalog = Catalog::new(Dialect::Postgres);
        let json = catalog.to_json().unwrap();
        assert!(!json.contains("version_nums"));
        assert!(!json.contains("schemas"));
        assert!(!json.contains("default_collation"));
        assert!(json.contains("\"dialect\": \"postgres\""));
    }

    #[test]
    fn test_validity_bits_survive_round_trip() {
        let mut catalog = Catalog::new(Dialect::Postgres);
        catalog.extensions_valid = true;
        catalog.schemas.push(SchemaDef {
            name: "public".to_string(),
            tables_valid: true,
            ..Default::default()
        });

        let json = catalog.to_json().unwrap();
        let parsed = Catalog::from_json(&json).unwrap();
        assert_eq!(parsed, catalog);
        assert!(parsed.extensions_valid);
        assert!(parsed.extensions.is_empty());
        assert!(parsed.schemas[0].tables_valid);
    }

    #[test]
    fn test_populated_catalog_round_trip() {
        let mut catalog = Catalog::new(Dialect::Mysql);
        catalog.database_name = "shop".to_string();
        catalog.current_schema = "shop".to_string();
        catalog.version_nums = vec![8, 0, 36];

        let mut schema = SchemaDef {
            name: "shop".to_string(),
            tables_valid: true,
            ..Default::default()
        };
        schema.tables.push(TableDef {
            schema: "shop".to_string(),
            name: "orders".to_string(),
            columns: vec![ColumnDef {
                schema: "shop".to_string(),
                table: "orders".to_string(),
                name: "id".to_string(),
                col_type: "BIGINT".to_string(),
                not_null: true,
                is_primary_key: true,
                is_autoincrement: true,
                ..Default::default()
            }],
            constraints: vec![ConstraintDef {
                kind: crate::core::keywords::PRIMARY_KEY.to_string(),
                name: "PRIMARY".to_string(),
                schema: "shop".to_string(),
                table: "orders".to_string(),
                columns: vec!["id".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        });
        catalog.schemas.push(schema);

        let json = catalog.to_json().unwrap();
        let parsed = Catalog::from_json(&json).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn test_table_full_name() {
        let t = TableDef {
            schema: "public".to_string(),
            name: "users".to_string(),
            ..Default::default()
        };
        assert_eq!(t.full_name(), "public.users");

        let t = TableDef {
            name: "users".to_string(),
            ..Default::default()
        };
        assert_eq!(t.full_name(), "users");
    }
}
