//! Abstract query-and-scan database facility.
//!
//! The core never speaks a wire protocol. It hands SQL text to a
//! [`SqlExecutor`] and receives rows of typed [`SqlValue`] holders back.
//! Concrete executors (driver adapters, test fakes) live outside the
//! core; everything here is the seam they implement.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;

use crate::error::{DriftError, Result};

/// A scanned value from a result row.
///
/// Holders are dialect- and column-type-aware: binary columns scan into
/// `Bytes`, booleans and bit types into `Bool`, integer families into
/// `Int`, numerics into `Float`, temporal columns into `Timestamp`, and
/// everything else into `Text`. SQLite scans every column as `Text`
/// because it stores dynamically typed values.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Borrow the text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "Null",
            SqlValue::Bool(_) => "Bool",
            SqlValue::Int(_) => "Int",
            SqlValue::Float(_) => "Float",
            SqlValue::Bytes(_) => "Bytes",
            SqlValue::Timestamp(_) => "Timestamp",
            SqlValue::Text(_) => "Text",
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

/// One result row.
pub type SqlRow = Vec<SqlValue>;

/// Executes read-only SQL against a live database.
///
/// Cancelling the token must abort the in-flight query and surface
/// [`DriftError::Cancelled`]. Implementations return fully materialized
/// rows, so result streams are always finalized before this returns.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a query and return all rows.
    async fn query(&self, sql: &str, cancel: &CancellationToken) -> Result<Vec<SqlRow>>;
}

/// Typed field accessors used when scanning rows into catalog records.
///
/// Each accessor names the entity kind being read so a mismatch surfaces
/// as e.g. "scanning Column: field 3: expected Text, got Bool".
pub struct RowScanner<'a> {
    row: &'a SqlRow,
    entity: &'static str,
}

impl<'a> RowScanner<'a> {
    /// Wrap a row for scanning into records of the named entity kind.
    pub fn new(row: &'a SqlRow, entity: &'static str) -> Self {
        Self { row, entity }
    }

    fn field(&self, idx: usize) -> Result<&'a SqlValue> {
        self.row.get(idx).ok_or_else(|| {
            DriftError::scan(
                self.entity,
                format!("field {}: row has only {} fields", idx, self.row.len()),
            )
        })
    }

    /// Scan a non-null text field.
    pub fn text(&self, idx: usize) -> Result<String> {
        match self.field(idx)? {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(self.mismatch(idx, "Text", other)),
        }
    }

    /// Scan a nullable text field; NULL becomes the empty string.
    pub fn text_or_empty(&self, idx: usize) -> Result<String> {
        match self.field(idx)? {
            SqlValue::Null => Ok(String::new()),
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(self.mismatch(idx, "Text", other)),
        }
    }

    /// Scan a boolean field. Integer 0/1 and text forms are accepted
    /// because the dialects disagree on how booleans come back.
    pub fn boolean(&self, idx: usize) -> Result<bool> {
        match self.field(idx)? {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(i) => Ok(*i != 0),
            SqlValue::Text(s) => match s.as_str() {
                "1" | "t" | "true" | "TRUE" | "YES" | "yes" => Ok(true),
                "0" | "f" | "false" | "FALSE" | "NO" | "no" | "" => Ok(false),
                other => Err(DriftError::scan(
                    self.entity,
                    format!("field {}: {:?} is not a boolean", idx, other),
                )),
            },
            SqlValue::Null => Ok(false),
            other => Err(self.mismatch(idx, "Bool", other)),
        }
    }

    /// Scan an integer field. Text digits are accepted.
    pub fn integer(&self, idx: usize) -> Result<i64> {
        match self.field(idx)? {
            SqlValue::Int(i) => Ok(*i),
            SqlValue::Text(s) => s.parse::<i64>().map_err(|_| {
                DriftError::scan(
                    self.entity,
                    format!("field {}: {:?} is not an integer", idx, s),
                )
            }),
            SqlValue::Null => Ok(0),
            other => Err(self.mismatch(idx, "Int", other)),
        }
    }

    fn mismatch(&self, idx: usize, expected: &str, got: &SqlValue) -> DriftError {
        DriftError::scan(
            self.entity,
            format!(
                "field {}: expected {}, got {}",
                idx,
                expected,
                got.type_name()
            ),
        )
    }
}
