//! Live-database introspection.
//!
//! The [`Introspector`] executes a prescribed sequence of read-only
//! queries against a [`SqlExecutor`] and populates a catalog through its
//! cache. Object kinds are processed in a fixed order that consumers may
//! rely on: extensions, enums, domains, routines, views, tables, then
//! columns, constraints, indexes, triggers, and finally the
//! single-column constraint post-pass.
//!
//! On error the catalog keeps whatever was populated before the failing
//! statement.

pub mod normalize;
pub mod queries;
mod scan;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::cache::CatalogCache;
use crate::core::catalog::{Catalog, Dialect};
use crate::core::context::EngineContext;
use crate::core::executor::{RowScanner, SqlExecutor, SqlRow};
use crate::error::{DriftError, Result};

use self::normalize::parse_version_nums;
use self::queries::RenderedQuery;

/// Introspectable object kinds, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Extensions,
    Enums,
    Domains,
    Routines,
    Views,
    Tables,
}

/// Introspection options. Every field is optional; an empty list means
/// "no filtering" for that axis.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Pre-known server version; probed when empty.
    pub version_nums: Vec<i64>,

    /// Include internal schemas (`information_schema`, `pg_catalog`, ...).
    pub include_system_catalogs: bool,

    /// Object kinds to read; empty means all.
    pub object_types: Vec<ObjectType>,

    /// Constraint kinds to keep (keyword constants); empty means all.
    pub constraint_types: Vec<String>,

    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub include_tables: Vec<String>,
    pub exclude_tables: Vec<String>,
    pub include_views: Vec<String>,
    pub exclude_views: Vec<String>,
    pub include_routines: Vec<String>,
    pub exclude_routines: Vec<String>,
    pub include_enums: Vec<String>,
    pub exclude_enums: Vec<String>,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
    pub include_extensions: Vec<String>,
    pub exclude_extensions: Vec<String>,
}

impl Filter {
    fn wants(&self, kind: ObjectType) -> bool {
        self.object_types.is_empty() || self.object_types.contains(&kind)
    }
}

/// Per-dialect reader producing a catalog from a live database.
pub struct Introspector<'a, E: SqlExecutor + ?Sized> {
    db: &'a E,
    ctx: &'a EngineContext,
    filter: Filter,
}

impl<'a, E: SqlExecutor + ?Sized> Introspector<'a, E> {
    pub fn new(db: &'a E, ctx: &'a EngineContext, filter: Filter) -> Self {
        Self { db, ctx, filter }
    }

    /// Run the full pipeline into the given cache. The cache keeps
    /// whatever was populated before a failure.
    pub async fn introspect(
        &self,
        cache: &mut CatalogCache,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let dialect = cache.dialect();
        info!(dialect = %dialect, "starting introspection");

        self.probe_version(cache, dialect, cancel).await?;
        self.probe_database_info(cache, dialect, cancel).await?;

        if dialect == Dialect::Postgres && self.filter.wants(ObjectType::Extensions) {
            let q = queries::extensions_query(self.ctx, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            let extensions = scan::scan_extensions(&rows)?;
            let catalog = cache.catalog_scalars_mut();
            catalog.extensions = extensions;
            catalog.extensions_valid = true;
        }

        if dialect == Dialect::Postgres && self.filter.wants(ObjectType::Enums) {
            let q = queries::enums_query(self.ctx, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            scan::scan_enums(cache, &rows)?;
        }

        if dialect == Dialect::Postgres && self.filter.wants(ObjectType::Domains) {
            let q = queries::domains_query(self.ctx, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            scan::scan_domains(cache, &rows)?;
        }

        if self.filter.wants(ObjectType::Routines) {
            if let Some(q) = queries::routines_query(self.ctx, dialect, &self.filter)? {
                let rows = self.run(dialect, &q, cancel).await?;
                scan::scan_routines(cache, dialect, &rows)?;
            }
        }

        if self.filter.wants(ObjectType::Views) {
            let q = queries::views_query(self.ctx, dialect, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            scan::scan_views(cache, dialect, &rows)?;
        }

        if self.filter.wants(ObjectType::Tables) {
            let q = queries::tables_query(self.ctx, dialect, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            scan::scan_tables(cache, dialect, &rows)?;

            let q = queries::columns_query(self.ctx, dialect, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            scan::scan_columns(cache, dialect, &rows)?;

            let q = queries::constraints_query(self.ctx, dialect, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            scan::scan_constraints(cache, dialect, &rows, &self.filter.constraint_types)?;

            let q = queries::indexes_query(self.ctx, dialect, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            scan::scan_indexes(cache, dialect, &rows)?;

            let q = queries::triggers_query(self.ctx, dialect, &self.filter)?;
            let rows = self.run(dialect, &q, cancel).await?;
            scan::scan_triggers(cache, dialect, &rows)?;

            scan::promote_single_column_constraints(cache);
        }

        info!(dialect = %dialect, "introspection complete");
        Ok(())
    }

    async fn probe_version(
        &self,
        cache: &mut CatalogCache,
        dialect: Dialect,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.filter.version_nums.is_empty() {
            cache.catalog_scalars_mut().version_nums = self.filter.version_nums.clone();
            return Ok(());
        }
        let q = RenderedQuery {
            template: "version",
            sql: queries::version_query(dialect).to_string(),
        };
        let rows = self.run(dialect, &q, cancel).await?;
        if let Some(row) = rows.first() {
            let version = RowScanner::new(row, "Version").text_or_empty(0)?;
            cache.catalog_scalars_mut().version_nums = parse_version_nums(&version);
        }
        Ok(())
    }

    async fn probe_database_info(
        &self,
        cache: &mut CatalogCache,
        dialect: Dialect,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let q = RenderedQuery {
            template: "database",
            sql: queries::database_info_query(dialect).to_string(),
        };
        let rows = self.run(dialect, &q, cancel).await?;
        if let Some(row) = rows.first() {
            let scanner = RowScanner::new(row, "Database");
            let catalog = cache.catalog_scalars_mut();
            catalog.database_name = scanner.text_or_empty(0)?;
            catalog.current_schema = scanner.text_or_empty(1)?;
            let collation = scanner.text_or_empty(2)?;
            if !collation.is_empty() {
                catalog.default_collation = collation;
                catalog.default_collation_valid = true;
            }
        }
        Ok(())
    }

    async fn run(
        &self,
        dialect: Dialect,
        q: &RenderedQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<SqlRow>> {
        if cancel.is_cancelled() {
            return Err(DriftError::Cancelled);
        }
        match self.db.query(&q.sql, cancel).await {
            Ok(rows) => Ok(rows),
            Err(err) => {
                let message = err.to_string();
                if let Ok(driver) = self.ctx.drivers.require(dialect) {
                    // Lock timeouts are surfaced unchanged so higher
                    // layers may retry.
                    if (driver.is_lock_timeout)(&message) {
                        return Err(err);
                    }
                    let annotated = (driver.annotate_error)(&message, &q.sql);
                    return Err(DriftError::query(q.template, q.sql.clone(), annotated));
                }
                Err(DriftError::query(q.template, q.sql.clone(), message))
            }
        }
    }
}

/// Convenience wrapper: introspect into a fresh catalog.
pub async fn introspect_catalog<E: SqlExecutor + ?Sized>(
    db: &E,
    ctx: &EngineContext,
    dialect: Dialect,
    filter: Filter,
    cancel: &CancellationToken,
) -> Result<Catalog> {
    let mut cache = CatalogCache::new(dialect);
    Introspector::new(db, ctx, filter)
        .introspect(&mut cache, cancel)
        .await?;
    Ok(cache.into_catalog())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::SqlValue;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    /// Answers each query with the rows of the first matching needle.
    struct ScriptedExecutor {
        responses: Vec<(&'static str, Vec<SqlRow>)>,
    }

    #[async_trait]
    impl SqlExecutor for ScriptedExecutor {
        async fn query(&self, sql: &str, _cancel: &CancellationToken) -> Result<Vec<SqlRow>> {
            for (needle, rows) in &self.responses {
                if sql.contains(needle) {
                    return Ok(rows.clone());
                }
            }
            Ok(Vec::new())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl SqlExecutor for FailingExecutor {
        async fn query(&self, _sql: &str, _cancel: &CancellationToken) -> Result<Vec<SqlRow>> {
            Err(DriftError::scan("Column", "connection reset by peer"))
        }
    }

    fn sqlite_executor() -> ScriptedExecutor {
        // Needle order matters: specific pragmas before the generic
        // sqlite_master shapes.
        ScriptedExecutor {
            responses: vec![
                ("sqlite_version()", vec![vec![text("3.45.1")]]),
                (
                    "SELECT 'main', 'main', ''",
                    vec![vec![text("main"), text("main"), text("")]],
                ),
                (
                    "pragma_table_xinfo",
                    vec![
                        vec![
                            text("t"),
                            text("id"),
                            text("integer"),
                            SqlValue::Int(1),
                            SqlValue::Int(0),
                            SqlValue::Null,
                        ],
                        vec![
                            text("t"),
                            text("name"),
                            text("text"),
                            SqlValue::Int(0),
                            SqlValue::Int(0),
                            SqlValue::Null,
                        ],
                    ],
                ),
                (
                    "pragma_foreign_key_list",
                    vec![vec![
                        text("t"),
                        text(""),
                        text("PRIMARY KEY"),
                        text("id"),
                        text(""),
                        text(""),
                        text(""),
                        text(""),
                        text(""),
                    ]],
                ),
                ("pragma_index_list", vec![]),
                ("type = 'trigger'", vec![]),
                ("type = 'view'", vec![]),
                (
                    "type = 'table'",
                    vec![vec![text("t"), text("CREATE TABLE t (id integer, name text)")]],
                ),
            ],
        }
    }

    #[tokio::test]
    async fn test_sqlite_pipeline_and_promotion() {
        let ctx = EngineContext::new();
        let cancel = CancellationToken::new();
        let db = sqlite_executor();

        let catalog = introspect_catalog(&db, &ctx, Dialect::Sqlite, Filter::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(catalog.version_nums, vec![3, 45, 1]);
        assert_eq!(catalog.database_name, "main");
        assert!(!catalog.default_collation_valid);

        let schema = &catalog.schemas[0];
        assert!(schema.tables_valid);
        let table = &schema.tables[0];
        assert_eq!(table.name, "t");

        // Scenario: single-column PK promotion.
        let id = &table.columns[0];
        assert_eq!(id.name, "id");
        assert!(id.is_primary_key);
        assert!(id.not_null);
        let name = &table.columns[1];
        assert!(!name.is_primary_key);
        assert!(!name.not_null);
    }

    #[tokio::test]
    async fn test_introspected_catalog_round_trips() {
        let ctx = EngineContext::new();
        let cancel = CancellationToken::new();
        let db = sqlite_executor();

        let catalog = introspect_catalog(&db, &ctx, Dialect::Sqlite, Filter::default(), &cancel)
            .await
            .unwrap();
        let parsed = Catalog::from_json(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[tokio::test]
    async fn test_postgres_extension_and_enum_validity() {
        let ctx = EngineContext::new();
        let cancel = CancellationToken::new();
        let db = ScriptedExecutor {
            responses: vec![
                ("server_version", vec![vec![text("16.2")]]),
                (
                    "current_database()",
                    vec![vec![text("app"), text("public"), text("en_US.UTF-8")]],
                ),
                ("pg_extension", vec![vec![text("pgcrypto")]]),
                (
                    "pg_enum",
                    vec![vec![
                        text("public"),
                        text("mood"),
                        text(r#"["sad", "ok", "happy"]"#),
                    ]],
                ),
            ],
        };

        let catalog = introspect_catalog(&db, &ctx, Dialect::Postgres, Filter::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(catalog.version_nums, vec![16, 2]);
        assert_eq!(catalog.database_name, "app");
        assert_eq!(catalog.current_schema, "public");
        assert!(catalog.default_collation_valid);
        assert_eq!(catalog.default_collation, "en_US.UTF-8");
        assert!(catalog.extensions_valid);
        assert_eq!(catalog.extensions, vec!["pgcrypto".to_string()]);

        let schema = &catalog.schemas[0];
        assert!(schema.enums_valid);
        assert_eq!(schema.enums[0].labels, vec!["sad", "ok", "happy"]);
    }

    #[tokio::test]
    async fn test_query_error_carries_template_and_sql() {
        let ctx = EngineContext::new();
        let cancel = CancellationToken::new();

        let mut cache = CatalogCache::new(Dialect::Postgres);
        let err = Introspector::new(&FailingExecutor, &ctx, Filter::default())
            .introspect(&mut cache, &cancel)
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("version"), "{}", msg);
        assert!(msg.contains("server_version"), "{}", msg);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_before_querying() {
        let ctx = EngineContext::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut cache = CatalogCache::new(Dialect::Sqlite);
        let err = Introspector::new(&sqlite_executor(), &ctx, Filter::default())
            .introspect(&mut cache, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DriftError::Cancelled));
    }

    #[tokio::test]
    async fn test_object_type_filter_skips_kinds() {
        let ctx = EngineContext::new();
        let cancel = CancellationToken::new();
        let db = sqlite_executor();

        let filter = Filter {
            object_types: vec![ObjectType::Views],
            ..Default::default()
        };
        let catalog = introspect_catalog(&db, &ctx, Dialect::Sqlite, filter, &cancel)
            .await
            .unwrap();
        // Tables were not requested, so none were read.
        assert!(catalog.schemas.is_empty());
    }

    #[tokio::test]
    async fn test_preknown_version_skips_probe() {
        let ctx = EngineContext::new();
        let cancel = CancellationToken::new();
        // A failing executor would abort on the version probe; with a
        // pre-known version the first statement is the database probe.
        let db = ScriptedExecutor {
            responses: vec![(
                "SELECT 'main', 'main', ''",
                vec![vec![text("main"), text("main"), text("")]],
            )],
        };

        let filter = Filter {
            version_nums: vec![3, 40, 0],
            object_types: vec![ObjectType::Views],
            ..Default::default()
        };
        let catalog = introspect_catalog(&db, &ctx, Dialect::Sqlite, filter, &cancel)
            .await
            .unwrap();
        assert_eq!(catalog.version_nums, vec![3, 40, 0]);
    }
}
