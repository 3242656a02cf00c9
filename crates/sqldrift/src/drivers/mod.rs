//! Dialect driver capabilities and DSN handling.
//!
//! The [`DriverRegistry`] maps each dialect to its capability record:
//! registration name, lock-timeout recognition, DSN preparation, and
//! error annotation. It is populated once at initialization and read
//! thereafter (readers-writers discipline), and is carried inside the
//! injected [`EngineContext`](crate::core::context::EngineContext)
//! rather than living in a global.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::core::catalog::Dialect;
use crate::error::{DriftError, Result};

/// First 16 bytes of every SQLite database file.
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\x00";

/// Capability record for one dialect.
#[derive(Clone)]
pub struct DriverInfo {
    /// Dialect this driver serves.
    pub dialect: Dialect,

    /// Driver registration name handed to the connection layer.
    pub driver_name: &'static str,

    /// Recognize a lock-timeout error message. Lock timeouts are
    /// surfaced unchanged so higher layers may retry.
    pub is_lock_timeout: fn(&str) -> bool,

    /// Preprocess a recognized DSN into the form the driver accepts.
    pub prepare_dsn: fn(&str) -> String,

    /// Annotate a query error message with dialect-specific position
    /// information (e.g. Postgres position -> line).
    pub annotate_error: fn(message: &str, query: &str) -> String,
}

impl std::fmt::Debug for DriverInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverInfo")
            .field("dialect", &self.dialect)
            .field("driver_name", &self.driver_name)
            .finish()
    }
}

/// Registry of dialect drivers.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: RwLock<HashMap<Dialect, Arc<DriverInfo>>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in drivers registered.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(DriverInfo {
            dialect: Dialect::Sqlite,
            driver_name: "sqlite3",
            is_lock_timeout: |msg| msg.contains("database is locked"),
            prepare_dsn: prepare_sqlite_dsn,
            annotate_error: |msg, _| msg.to_string(),
        });
        registry.register(DriverInfo {
            dialect: Dialect::Postgres,
            driver_name: "postgres",
            is_lock_timeout: |msg| {
                msg.contains("canceling statement due to lock timeout") || msg.contains("55P03")
            },
            prepare_dsn: |dsn| dsn.to_string(),
            annotate_error: annotate_postgres_error,
        });
        registry.register(DriverInfo {
            dialect: Dialect::Mysql,
            driver_name: "mysql",
            is_lock_timeout: |msg| {
                msg.contains("Lock wait timeout exceeded") || msg.contains("Error 1205")
            },
            prepare_dsn: prepare_mysql_dsn,
            annotate_error: |msg, _| msg.to_string(),
        });
        registry.register(DriverInfo {
            dialect: Dialect::Sqlserver,
            driver_name: "sqlserver",
            is_lock_timeout: |msg| {
                msg.contains("Lock request time out") || msg.contains("Error 1222")
            },
            prepare_dsn: |dsn| dsn.to_string(),
            annotate_error: annotate_sqlserver_error,
        });
        registry
    }

    /// Register (or replace) a driver.
    pub fn register(&self, info: DriverInfo) {
        self.drivers
            .write()
            .expect("driver registry poisoned")
            .insert(info.dialect, Arc::new(info));
    }

    /// Get a driver by dialect.
    pub fn get(&self, dialect: Dialect) -> Option<Arc<DriverInfo>> {
        self.drivers
            .read()
            .expect("driver registry poisoned")
            .get(&dialect)
            .cloned()
    }

    /// Get a driver by dialect, or fail with an unsupported-dialect error.
    pub fn require(&self, dialect: Dialect) -> Result<Arc<DriverInfo>> {
        self.get(dialect)
            .ok_or_else(|| DriftError::UnsupportedDialect(dialect.to_string()))
    }
}

fn prepare_sqlite_dsn(dsn: &str) -> String {
    dsn.strip_prefix("sqlite3:")
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn)
        .to_string()
}

fn prepare_mysql_dsn(dsn: &str) -> String {
    dsn.strip_prefix("mysql://").unwrap_or(dsn).to_string()
}

/// Translate a Postgres `position: N` into a line number against the
/// rendered query.
fn annotate_postgres_error(message: &str, query: &str) -> String {
    let Some(start) = message.find("position: ") else {
        return message.to_string();
    };
    let digits: String = message[start + "position: ".len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let Ok(pos) = digits.parse::<usize>() else {
        return message.to_string();
    };
    // Postgres positions are 1-based character offsets.
    let line = query
        .chars()
        .take(pos.saturating_sub(1))
        .filter(|&c| c == '\n')
        .count()
        + 1;
    format!("{} (line {})", message, line)
}

/// SQL Server errors already carry a line number; normalize its spelling.
fn annotate_sqlserver_error(message: &str, _query: &str) -> String {
    if let Some(start) = message.find("Line ") {
        let digits: String = message[start + "Line ".len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return format!("{} (line {})", message, digits);
        }
    }
    message.to_string()
}

/// Recognize a DSN and produce `(dialect, driver name, prepared DSN)`.
///
/// Recognition is by prefix (`sqlite:`, `sqlite3:`, `postgres://`,
/// `mysql://`, `sqlserver://`), by MySQL's `@tcp(`/`@unix(` markers, and
/// by the SQLite file suffixes `.sqlite`, `.sqlite3`, `.db`, `.db3`.
/// A `file:` prefix opens the named file: if it starts with the SQLite
/// 16-byte magic it is an SQLite database, otherwise the file contents
/// are re-parsed as a DSN. `oracle://` is a reserved tag without core
/// support and is rejected.
pub fn normalize_dsn(registry: &DriverRegistry, dsn: &str) -> Result<(Dialect, &'static str, String)> {
    let dialect = recognize_dialect(dsn)?;
    match dialect {
        Recognized::Dialect(dialect) => {
            let driver = registry.require(dialect)?;
            let prepared = (driver.prepare_dsn)(dsn);
            debug!(dialect = %dialect, "recognized DSN");
            Ok((dialect, driver.driver_name, prepared))
        }
        Recognized::File(path) => {
            let contents = fs::read(&path)?;
            if contents.len() >= SQLITE_MAGIC.len() && &contents[..SQLITE_MAGIC.len()] == SQLITE_MAGIC
            {
                let driver = registry.require(Dialect::Sqlite)?;
                debug!(path = %path, "file is an SQLite database");
                return Ok((Dialect::Sqlite, driver.driver_name, path));
            }
            let inner = String::from_utf8_lossy(&contents).trim().to_string();
            match recognize_dialect(&inner)? {
                Recognized::Dialect(dialect) => {
                    let driver = registry.require(dialect)?;
                    Ok((dialect, driver.driver_name, (driver.prepare_dsn)(&inner)))
                }
                Recognized::File(_) => Err(DriftError::Dsn(format!(
                    "DSN file {} points at another file",
                    path
                ))),
            }
        }
    }
}

enum Recognized {
    Dialect(Dialect),
    File(String),
}

fn recognize_dialect(dsn: &str) -> Result<Recognized> {
    if let Some(path) = dsn.strip_prefix("file:") {
        return Ok(Recognized::File(path.to_string()));
    }
    if dsn.starts_with("sqlite:") || dsn.starts_with("sqlite3:") {
        return Ok(Recognized::Dialect(Dialect::Sqlite));
    }
    if dsn.starts_with("postgres://") {
        return Ok(Recognized::Dialect(Dialect::Postgres));
    }
    if dsn.starts_with("mysql://") {
        return Ok(Recognized::Dialect(Dialect::Mysql));
    }
    if dsn.starts_with("sqlserver://") {
        return Ok(Recognized::Dialect(Dialect::Sqlserver));
    }
    if dsn.starts_with("oracle://") {
        return Err(DriftError::UnsupportedDialect("oracle".to_string()));
    }
    if dsn.contains("@tcp(") || dsn.contains("@unix(") {
        return Ok(Recognized::Dialect(Dialect::Mysql));
    }
    for suffix in [".sqlite", ".sqlite3", ".db", ".db3"] {
        if dsn.ends_with(suffix) {
            return Ok(Recognized::Dialect(Dialect::Sqlite));
        }
    }
    Err(DriftError::Dsn(format!("unrecognized DSN: {:?}", dsn)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builtins() {
        let registry = DriverRegistry::with_builtins();
        for dialect in Dialect::all() {
            assert!(registry.get(dialect).is_some());
        }
        assert_eq!(registry.require(Dialect::Mysql).unwrap().driver_name, "mysql");
    }

    #[test]
    fn test_dsn_prefixes() {
        let registry = DriverRegistry::with_builtins();
        let (d, name, prepared) = normalize_dsn(&registry, "sqlite:test.db").unwrap();
        assert_eq!(d, Dialect::Sqlite);
        assert_eq!(name, "sqlite3");
        assert_eq!(prepared, "test.db");

        let (d, _, prepared) =
            normalize_dsn(&registry, "postgres://u:p@localhost/app").unwrap();
        assert_eq!(d, Dialect::Postgres);
        assert_eq!(prepared, "postgres://u:p@localhost/app");

        let (d, _, prepared) = normalize_dsn(&registry, "mysql://u:p@localhost/app").unwrap();
        assert_eq!(d, Dialect::Mysql);
        assert_eq!(prepared, "u:p@localhost/app");

        let (d, _, _) = normalize_dsn(&registry, "sqlserver://sa@localhost?database=app").unwrap();
        assert_eq!(d, Dialect::Sqlserver);
    }

    #[test]
    fn test_dsn_markers_and_suffixes() {
        let registry = DriverRegistry::with_builtins();
        let (d, _, _) = normalize_dsn(&registry, "user:pass@tcp(localhost:3306)/app").unwrap();
        assert_eq!(d, Dialect::Mysql);

        for dsn in ["app.sqlite", "app.sqlite3", "app.db", "app.db3"] {
            let (d, _, _) = normalize_dsn(&registry, dsn).unwrap();
            assert_eq!(d, Dialect::Sqlite);
        }
    }

    #[test]
    fn test_dsn_rejects_oracle_and_garbage() {
        let registry = DriverRegistry::with_builtins();
        assert!(matches!(
            normalize_dsn(&registry, "oracle://scott@tiger"),
            Err(DriftError::UnsupportedDialect(_))
        ));
        assert!(matches!(
            normalize_dsn(&registry, "who knows"),
            Err(DriftError::Dsn(_))
        ));
    }

    #[test]
    fn test_file_dsn_sqlite_magic() {
        let dir = std::env::temp_dir();
        let db_path = dir.join("sqldrift_magic_test.db_nosuffix");
        let mut contents = SQLITE_MAGIC.to_vec();
        contents.extend_from_slice(&[0u8; 16]);
        fs::write(&db_path, contents).unwrap();

        let registry = DriverRegistry::with_builtins();
        let dsn = format!("file:{}", db_path.display());
        let (d, _, prepared) = normalize_dsn(&registry, &dsn).unwrap();
        assert_eq!(d, Dialect::Sqlite);
        assert_eq!(prepared, db_path.display().to_string());

        fs::remove_file(db_path).ok();
    }

    #[test]
    fn test_file_dsn_reparsed_as_dsn() {
        let dir = std::env::temp_dir();
        let dsn_path = dir.join("sqldrift_dsn_test.txt");
        fs::write(&dsn_path, "postgres://u@localhost/app\n").unwrap();

        let registry = DriverRegistry::with_builtins();
        let dsn = format!("file:{}", dsn_path.display());
        let (d, _, prepared) = normalize_dsn(&registry, &dsn).unwrap();
        assert_eq!(d, Dialect::Postgres);
        assert_eq!(prepared, "postgres://u@localhost/app");

        fs::remove_file(dsn_path).ok();
    }

    #[test]
    fn test_postgres_error_annotation() {
        let query = "SELECT 1\nFROM nope\nWHERE x";
        let annotated = annotate_postgres_error("syntax error at or near \"nope\", position: 15", query);
        assert!(annotated.ends_with("(line 2)"), "{}", annotated);

        // No position: unchanged.
        assert_eq!(annotate_postgres_error("boom", query), "boom");
    }

    #[test]
    fn test_lock_timeout_predicates() {
        let registry = DriverRegistry::with_builtins();
        let pg = registry.get(Dialect::Postgres).unwrap();
        assert!((pg.is_lock_timeout)("ERROR: canceling statement due to lock timeout"));
        assert!(!(pg.is_lock_timeout)("ERROR: relation does not exist"));

        let my = registry.get(Dialect::Mysql).unwrap();
        assert!((my.is_lock_timeout)("Error 1205: Lock wait timeout exceeded"));

        let ms = registry.get(Dialect::Sqlserver).unwrap();
        assert!((ms.is_lock_timeout)("Lock request time out period exceeded."));

        let lite = registry.get(Dialect::Sqlite).unwrap();
        assert!((lite.is_lock_timeout)("database is locked"));
    }
}
