//! Type classes and dialect-aware literal rendering for seed results.
//!
//! Seed rows are scanned into holders chosen by the column's normalized
//! type, then rendered back into literal VALUES relations. The rendering
//! must preserve enough information for the receiving database to accept
//! the value (binary prefixes, boolean spellings, UTC timestamps).

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::core::catalog::Dialect;
use crate::core::executor::SqlValue;

/// Holder class for a scanned column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Binary,
    Bool,
    Float,
    Int,
    Timestamp,
    Text,
}

/// Pick the holder class for a normalized column type.
///
/// SQLite stores dynamically typed values, so every SQLite column scans
/// as text.
pub fn type_class(dialect: Dialect, col_type: &str) -> TypeClass {
    if dialect == Dialect::Sqlite {
        return TypeClass::Text;
    }
    let t = col_type.to_uppercase();
    let base = t.split('(').next().unwrap_or("").trim();

    if base.contains("BINARY") || base == "BYTEA" || base == "BLOB" || base == "IMAGE" {
        return TypeClass::Binary;
    }
    match base {
        "BOOLEAN" | "BOOL" => return TypeClass::Bool,
        // SQL Server BIT is a boolean; the Postgres bit string is not.
        "BIT" if dialect == Dialect::Sqlserver => return TypeClass::Bool,
        _ => {}
    }
    if base == "TINYINT" && t.starts_with("TINYINT(1)") {
        return TypeClass::Bool;
    }
    if matches!(
        base,
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT"
    ) {
        return TypeClass::Int;
    }
    if matches!(
        base,
        "NUMERIC"
            | "DECIMAL"
            | "REAL"
            | "FLOAT"
            | "DOUBLE"
            | "DOUBLE PRECISION"
            | "MONEY"
            | "SMALLMONEY"
    ) {
        return TypeClass::Float;
    }
    if matches!(
        base,
        "DATE"
            | "DATETIME"
            | "DATETIME2"
            | "SMALLDATETIME"
            | "TIMESTAMP"
            | "TIMESTAMPTZ"
            | "DATETIMEOFFSET"
    ) {
        return TypeClass::Timestamp;
    }
    TypeClass::Text
}

/// Coerce a scanned value into its holder class. Text values parse into
/// typed holders where the class calls for it; values that fail to parse
/// are kept as scanned.
pub fn coerce(value: SqlValue, class: TypeClass) -> SqlValue {
    let text = match &value {
        SqlValue::Text(s) => s.trim().to_string(),
        _ => return value,
    };
    match class {
        TypeClass::Int => text.parse::<i64>().map(SqlValue::Int).unwrap_or(value),
        TypeClass::Float => text.parse::<f64>().map(SqlValue::Float).unwrap_or(value),
        TypeClass::Bool => match text.as_str() {
            "1" | "t" | "true" | "TRUE" => SqlValue::Bool(true),
            "0" | "f" | "false" | "FALSE" => SqlValue::Bool(false),
            _ => value,
        },
        TypeClass::Timestamp => parse_timestamp(&text)
            .map(SqlValue::Timestamp)
            .unwrap_or(value),
        TypeClass::Binary | TypeClass::Text => value,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Render a scanned value as a SQL literal for a dialect.
pub fn render_literal(dialect: Dialect, value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => match dialect {
            Dialect::Postgres => if *b { "TRUE" } else { "FALSE" }.to_string(),
            _ => if *b { "1" } else { "0" }.to_string(),
        },
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => format!("{}", f),
        SqlValue::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            match dialect {
                Dialect::Postgres => format!("'\\x{}'", hex),
                Dialect::Sqlserver => format!("0x{}", hex),
                _ => format!("x'{}'", hex),
            }
        }
        SqlValue::Timestamp(ts) => {
            if ts.nanosecond() == 0 {
                format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S"))
            } else {
                format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.3f"))
            }
        }
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}
