//! Dialect-and-kind introspection query templates.
//!
//! Each (dialect, object kind) pair has one SQL template, rendered
//! against the [`Filter`](super::Filter) and cached in parsed form in the
//! engine context. The row layout produced by every template is part of
//! the scanner contract and is documented above its body; the scanners in
//! [`scan`](super::scan) read fields by position.
//!
//! Filter fragments render into `{schemas}` / `{names}` placeholders as
//! `AND`-prefixed clauses, or to nothing when the filter leaves a list
//! empty.

use crate::core::catalog::Dialect;
use crate::core::context::EngineContext;
use crate::error::Result;

use super::Filter;

/// A rendered introspection query plus the template it came from, for
/// error context.
#[derive(Debug, Clone)]
pub struct RenderedQuery {
    pub template: &'static str,
    pub sql: String,
}

/// Render a list of identifiers as a comma-separated sequence of
/// single-quoted SQL literals with internal quotes doubled.
pub fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("'{}'", s.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",")
}

fn clause_in(column: &str, items: &[String]) -> String {
    if items.is_empty() {
        String::new()
    } else {
        format!(" AND {} IN ({})", column, quoted_list(items))
    }
}

fn clause_not_in(column: &str, items: &[&str]) -> String {
    if items.is_empty() {
        String::new()
    } else {
        let owned: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        format!(" AND {} NOT IN ({})", column, quoted_list(&owned))
    }
}

fn clause_not_in_owned(column: &str, items: &[String]) -> String {
    if items.is_empty() {
        String::new()
    } else {
        format!(" AND {} NOT IN ({})", column, quoted_list(items))
    }
}

/// System schemas excluded unless `include_system_catalogs` is set.
fn system_schemas(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::Sqlite => &[],
        Dialect::Postgres => &["pg_catalog", "information_schema", "pg_toast"],
        Dialect::Mysql => &["mysql", "information_schema", "performance_schema", "sys"],
        Dialect::Sqlserver => &["sys", "INFORMATION_SCHEMA"],
    }
}

/// Combined system + include/exclude schema clauses for one column.
fn schema_clauses(column: &str, dialect: Dialect, filter: &Filter) -> String {
    let mut out = String::new();
    if !filter.include_system_catalogs {
        out.push_str(&clause_not_in(column, system_schemas(dialect)));
    }
    out.push_str(&clause_in(column, &filter.include_schemas));
    out.push_str(&clause_not_in_owned(column, &filter.exclude_schemas));
    out
}

fn name_clauses(column: &str, include: &[String], exclude: &[String]) -> String {
    let mut out = clause_in(column, include);
    out.push_str(&clause_not_in_owned(column, exclude));
    out
}

fn render(
    ctx: &EngineContext,
    name: &'static str,
    body: &'static str,
    vars: &[(&str, String)],
) -> Result<RenderedQuery> {
    let template = ctx.templates.get(name, body)?;
    Ok(RenderedQuery {
        template: name,
        sql: template.render(vars)?,
    })
}

// ===== Probes =====

/// Version probe statement. One row, one text field.
pub fn version_query(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Sqlite => "SELECT sqlite_version()",
        Dialect::Postgres => "SHOW server_version",
        Dialect::Mysql => "SELECT VERSION()",
        Dialect::Sqlserver => "SELECT CAST(SERVERPROPERTY('ProductVersion') AS nvarchar(128))",
    }
}

/// Current database, current schema, default collation. One row, three
/// text fields. SQLite has no collation catalog; the third field comes
/// back empty and the validity bit stays unset.
pub fn database_info_query(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Sqlite => "SELECT 'main', 'main', ''",
        Dialect::Postgres => {
            "SELECT current_database(), current_schema(), \
             (SELECT datcollate FROM pg_catalog.pg_database WHERE datname = current_database())"
        }
        Dialect::Mysql => "SELECT DATABASE(), DATABASE(), @@collation_database",
        Dialect::Sqlserver => {
            "SELECT DB_NAME(), SCHEMA_NAME(), \
             CAST(DATABASEPROPERTYEX(DB_NAME(), 'Collation') AS nvarchar(128))"
        }
    }
}

// ===== Postgres-only object kinds =====

/// Row: (name). Postgres only.
const POSTGRES_EXTENSIONS: &str = "\
SELECT e.extname
FROM pg_catalog.pg_extension e
WHERE e.extname <> 'plpgsql'{names}
ORDER BY e.extname";

pub fn extensions_query(ctx: &EngineContext, filter: &Filter) -> Result<RenderedQuery> {
    render(
        ctx,
        "postgres/extensions",
        POSTGRES_EXTENSIONS,
        &[(
            "names",
            name_clauses(
                "e.extname",
                &filter.include_extensions,
                &filter.exclude_extensions,
            ),
        )],
    )
}

/// Row: (schema, name, labels JSON array). Postgres only.
const POSTGRES_ENUMS: &str = "\
SELECT n.nspname, t.typname,
       json_agg(e.enumlabel ORDER BY e.enumsortorder)
FROM pg_catalog.pg_type t
JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
JOIN pg_catalog.pg_enum e ON e.enumtypid = t.oid
WHERE t.typtype = 'e'{schemas}{names}
GROUP BY n.nspname, t.typname
ORDER BY n.nspname, t.typname";

pub fn enums_query(ctx: &EngineContext, filter: &Filter) -> Result<RenderedQuery> {
    render(
        ctx,
        "postgres/enums",
        POSTGRES_ENUMS,
        &[
            (
                "schemas",
                schema_clauses("n.nspname", Dialect::Postgres, filter),
            ),
            (
                "names",
                name_clauses("t.typname", &filter.include_enums, &filter.exclude_enums),
            ),
        ],
    )
}

/// Row: (schema, name, type, collation, not_null, default,
/// check names JSON, check exprs JSON). Postgres only.
const POSTGRES_DOMAINS: &str = "\
SELECT n.nspname, t.typname,
       pg_catalog.format_type(t.typbasetype, t.typtypmod),
       COALESCE(cl.collname, ''),
       t.typnotnull,
       COALESCE(t.typdefault, ''),
       COALESCE(json_agg(c.conname ORDER BY c.conname)
                FILTER (WHERE c.conname IS NOT NULL), '[]'),
       COALESCE(json_agg(pg_catalog.pg_get_constraintdef(c.oid) ORDER BY c.conname)
                FILTER (WHERE c.conname IS NOT NULL), '[]')
FROM pg_catalog.pg_type t
JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
LEFT JOIN pg_catalog.pg_collation cl ON cl.oid = t.typcollation
LEFT JOIN pg_catalog.pg_constraint c ON c.contypid = t.oid
WHERE t.typtype = 'd'{schemas}{names}
GROUP BY n.nspname, t.typname, t.typbasetype, t.typtypmod, cl.collname, t.typnotnull, t.typdefault
ORDER BY n.nspname, t.typname";

pub fn domains_query(ctx: &EngineContext, filter: &Filter) -> Result<RenderedQuery> {
    render(
        ctx,
        "postgres/domains",
        POSTGRES_DOMAINS,
        &[
            (
                "schemas",
                schema_clauses("n.nspname", Dialect::Postgres, filter),
            ),
            (
                "names",
                name_clauses("t.typname", &filter.include_domains, &filter.exclude_domains),
            ),
        ],
    )
}

// ===== Routines =====

/// Postgres row: (schema, name, identity args, kind, definition, comment).
const POSTGRES_ROUTINES: &str = "\
SELECT n.nspname, p.proname,
       pg_catalog.pg_get_function_identity_arguments(p.oid),
       CASE p.prokind WHEN 'p' THEN 'PROCEDURE' ELSE 'FUNCTION' END,
       pg_catalog.pg_get_functiondef(p.oid),
       COALESCE(obj_description(p.oid, 'pg_proc'), '')
FROM pg_catalog.pg_proc p
JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
WHERE p.prokind IN ('f', 'p'){schemas}{names}
ORDER BY n.nspname, p.proname";

/// MySQL row: (schema, name, kind, definition, comment).
const MYSQL_ROUTINES: &str = "\
SELECT r.routine_schema, r.routine_name, r.routine_type,
       COALESCE(r.routine_definition, ''),
       COALESCE(r.routine_comment, '')
FROM information_schema.routines r
WHERE r.routine_type IN ('PROCEDURE', 'FUNCTION'){schemas}{names}
ORDER BY r.routine_schema, r.routine_name";

/// SQL Server row: (schema, name, kind, definition).
const SQLSERVER_ROUTINES: &str = "\
SELECT s.name, o.name,
       CASE WHEN o.type = 'P' THEN 'PROCEDURE' ELSE 'FUNCTION' END,
       m.definition
FROM sys.objects o
JOIN sys.schemas s ON s.schema_id = o.schema_id
JOIN sys.sql_modules m ON m.object_id = o.object_id
WHERE o.type IN ('P', 'FN', 'IF', 'TF'){schemas}{names}
ORDER BY s.name, o.name";

/// SQLite has no stored routines; returns `None`.
pub fn routines_query(
    ctx: &EngineContext,
    dialect: Dialect,
    filter: &Filter,
) -> Result<Option<RenderedQuery>> {
    let (name, body, schema_col, name_col) = match dialect {
        Dialect::Sqlite => return Ok(None),
        Dialect::Postgres => ("postgres/routines", POSTGRES_ROUTINES, "n.nspname", "p.proname"),
        Dialect::Mysql => (
            "mysql/routines",
            MYSQL_ROUTINES,
            "r.routine_schema",
            "r.routine_name",
        ),
        Dialect::Sqlserver => ("sqlserver/routines", SQLSERVER_ROUTINES, "s.name", "o.name"),
    };
    render(
        ctx,
        name,
        body,
        &[
            ("schemas", schema_clauses(schema_col, dialect, filter)),
            (
                "names",
                name_clauses(name_col, &filter.include_routines, &filter.exclude_routines),
            ),
        ],
    )
    .map(Some)
}

// ===== Views =====

/// SQLite row: (name, sql).
const SQLITE_VIEWS: &str = "\
SELECT m.name, m.sql
FROM sqlite_master m
WHERE m.type = 'view' AND m.name NOT LIKE 'sqlite_%'{names}
ORDER BY m.name";

/// Postgres row: (schema, name, definition, materialized, comment).
const POSTGRES_VIEWS: &str = "\
SELECT n.nspname, c.relname,
       pg_catalog.pg_get_viewdef(c.oid, true),
       c.relkind = 'm',
       COALESCE(obj_description(c.oid, 'pg_class'), '')
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('v', 'm'){schemas}{names}
ORDER BY n.nspname, c.relname";

/// MySQL row: (schema, name, definition).
const MYSQL_VIEWS: &str = "\
SELECT v.table_schema, v.table_name, COALESCE(v.view_definition, '')
FROM information_schema.views v
WHERE 1 = 1{schemas}{names}
ORDER BY v.table_schema, v.table_name";

/// SQL Server row: (schema, name, definition).
const SQLSERVER_VIEWS: &str = "\
SELECT s.name, v.name, m.definition
FROM sys.views v
JOIN sys.schemas s ON s.schema_id = v.schema_id
JOIN sys.sql_modules m ON m.object_id = v.object_id
WHERE 1 = 1{schemas}{names}
ORDER BY s.name, v.name";

pub fn views_query(
    ctx: &EngineContext,
    dialect: Dialect,
    filter: &Filter,
) -> Result<RenderedQuery> {
    let (name, body, schema_col, name_col) = match dialect {
        Dialect::Sqlite => ("sqlite/views", SQLITE_VIEWS, "", "m.name"),
        Dialect::Postgres => ("postgres/views", POSTGRES_VIEWS, "n.nspname", "c.relname"),
        Dialect::Mysql => (
            "mysql/views",
            MYSQL_VIEWS,
            "v.table_schema",
            "v.table_name",
        ),
        Dialect::Sqlserver => ("sqlserver/views", SQLSERVER_VIEWS, "s.name", "v.name"),
    };
    let mut vars = vec![(
        "names",
        name_clauses(name_col, &filter.include_views, &filter.exclude_views),
    )];
    if !schema_col.is_empty() {
        vars.push(("schemas", schema_clauses(schema_col, dialect, filter)));
    }
    render(ctx, name, body, &vars)
}

// ===== Tables =====

/// SQLite row: (name, sql).
const SQLITE_TABLES: &str = "\
SELECT m.name, m.sql
FROM sqlite_master m
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'{names}
ORDER BY m.name";

/// Postgres row: (schema, name, comment).
const POSTGRES_TABLES: &str = "\
SELECT n.nspname, c.relname, COALESCE(obj_description(c.oid, 'pg_class'), '')
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('r', 'p'){schemas}{names}
ORDER BY n.nspname, c.relname";

/// MySQL row: (schema, name, comment).
const MYSQL_TABLES: &str = "\
SELECT t.table_schema, t.table_name, COALESCE(t.table_comment, '')
FROM information_schema.tables t
WHERE t.table_type = 'BASE TABLE'{schemas}{names}
ORDER BY t.table_schema, t.table_name";

/// SQL Server row: (schema, name, comment).
const SQLSERVER_TABLES: &str = "\
SELECT s.name, t.name,
       COALESCE(CAST(ep.value AS nvarchar(4000)), '')
FROM sys.tables t
JOIN sys.schemas s ON s.schema_id = t.schema_id
LEFT JOIN sys.extended_properties ep
       ON ep.major_id = t.object_id AND ep.minor_id = 0 AND ep.name = 'MS_Description'
WHERE t.is_ms_shipped = 0{schemas}{names}
ORDER BY s.name, t.name";

pub fn tables_query(
    ctx: &EngineContext,
    dialect: Dialect,
    filter: &Filter,
) -> Result<RenderedQuery> {
    let (name, body, schema_col, name_col) = match dialect {
        Dialect::Sqlite => ("sqlite/tables", SQLITE_TABLES, "", "m.name"),
        Dialect::Postgres => ("postgres/tables", POSTGRES_TABLES, "n.nspname", "c.relname"),
        Dialect::Mysql => (
            "mysql/tables",
            MYSQL_TABLES,
            "t.table_schema",
            "t.table_name",
        ),
        Dialect::Sqlserver => ("sqlserver/tables", SQLSERVER_TABLES, "s.name", "t.name"),
    };
    let mut vars = vec![(
        "names",
        name_clauses(name_col, &filter.include_tables, &filter.exclude_tables),
    )];
    if !schema_col.is_empty() {
        vars.push(("schemas", schema_clauses(schema_col, dialect, filter)));
    }
    render(ctx, name, body, &vars)
}

// ===== Columns =====

/// SQLite row: (table, name, type, not_null, hidden kind, default).
/// `hidden` is 2 for VIRTUAL generated and 3 for STORED generated.
const SQLITE_COLUMNS: &str = "\
SELECT m.name, p.name, p.type, p.\"notnull\", p.hidden, COALESCE(p.dflt_value, '')
FROM sqlite_master m
JOIN pragma_table_xinfo(m.name) p
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'{names}
ORDER BY m.name, p.cid";

/// Postgres row (15 fields): (schema, table, name, type, not_null,
/// default, is_enum, domain, precision, scale, identity, generated expr,
/// generated stored, collation, comment).
const POSTGRES_COLUMNS: &str = "\
SELECT n.nspname, c.relname, a.attname,
       pg_catalog.format_type(a.atttypid, a.atttypmod),
       a.attnotnull,
       CASE WHEN a.attgenerated = '' THEN COALESCE(pg_catalog.pg_get_expr(ad.adbin, ad.adrelid), '') ELSE '' END,
       t.typtype = 'e',
       CASE WHEN t.typtype = 'd' THEN t.typname ELSE '' END,
       COALESCE(information_schema._pg_numeric_precision(a.atttypid, a.atttypmod), 0),
       COALESCE(information_schema._pg_numeric_scale(a.atttypid, a.atttypmod), 0),
       CASE a.attidentity
            WHEN 'd' THEN 'GENERATED BY DEFAULT AS IDENTITY'
            WHEN 'a' THEN 'GENERATED ALWAYS AS IDENTITY'
            ELSE '' END,
       CASE WHEN a.attgenerated <> '' THEN COALESCE(pg_catalog.pg_get_expr(ad.adbin, ad.adrelid), '') ELSE '' END,
       a.attgenerated = 's',
       COALESCE(coll.collname, ''),
       COALESCE(col_description(c.oid, a.attnum), '')
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_type t ON t.oid = a.atttypid
LEFT JOIN pg_catalog.pg_attrdef ad ON ad.adrelid = c.oid AND ad.adnum = a.attnum
LEFT JOIN pg_catalog.pg_collation coll
       ON coll.oid = a.attcollation AND a.attcollation <> t.typcollation
WHERE c.relkind IN ('r', 'p') AND a.attnum > 0 AND NOT a.attisdropped{schemas}{names}
ORDER BY n.nspname, c.relname, a.attnum";

/// MySQL row (15 fields): (schema, table, name, type, not_null, default,
/// autoincrement, on update timestamp, char length, precision, scale,
/// generated expr, generated stored, collation, comment).
const MYSQL_COLUMNS: &str = "\
SELECT c.table_schema, c.table_name, c.column_name, c.column_type,
       c.is_nullable = 'NO',
       COALESCE(c.column_default, ''),
       c.extra LIKE '%auto_increment%',
       c.extra LIKE '%on update CURRENT_TIMESTAMP%',
       COALESCE(c.character_maximum_length, 0),
       COALESCE(c.numeric_precision, 0),
       COALESCE(c.numeric_scale, 0),
       COALESCE(c.generation_expression, ''),
       c.extra LIKE '%STORED GENERATED%',
       COALESCE(c.collation_name, ''),
       COALESCE(c.column_comment, '')
FROM information_schema.columns c
JOIN information_schema.tables t
     ON t.table_schema = c.table_schema AND t.table_name = c.table_name
WHERE t.table_type = 'BASE TABLE'{schemas}{names}
ORDER BY c.table_schema, c.table_name, c.ordinal_position";

/// SQL Server row (13 fields): (schema, table, name, type, not_null,
/// default, identity, char length, precision, scale, collation,
/// computed expr, comment).
const SQLSERVER_COLUMNS: &str = "\
SELECT s.name, t.name, c.name, ty.name,
       CASE WHEN c.is_nullable = 0 THEN 1 ELSE 0 END,
       COALESCE(dc.definition, ''),
       c.is_identity,
       CASE WHEN c.max_length = -1 THEN 'MAX'
            WHEN ty.name IN ('nchar', 'nvarchar') THEN CAST(c.max_length / 2 AS varchar(10))
            WHEN ty.name IN ('char', 'varchar', 'binary', 'varbinary') THEN CAST(c.max_length AS varchar(10))
            ELSE '' END,
       c.precision, c.scale,
       COALESCE(c.collation_name, ''),
       COALESCE(cc.definition, ''),
       COALESCE(CAST(ep.value AS nvarchar(4000)), '')
FROM sys.columns c
JOIN sys.tables t ON t.object_id = c.object_id
JOIN sys.schemas s ON s.schema_id = t.schema_id
JOIN sys.types ty ON ty.user_type_id = c.user_type_id
LEFT JOIN sys.default_constraints dc
       ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id
LEFT JOIN sys.computed_columns cc
       ON cc.object_id = c.object_id AND cc.column_id = c.column_id
LEFT JOIN sys.extended_properties ep
       ON ep.major_id = c.object_id AND ep.minor_id = c.column_id AND ep.name = 'MS_Description'
WHERE t.is_ms_shipped = 0{schemas}{names}
ORDER BY s.name, t.name, c.column_id";

pub fn columns_query(
    ctx: &EngineContext,
    dialect: Dialect,
    filter: &Filter,
) -> Result<RenderedQuery> {
    let (name, body, schema_col, name_col) = match dialect {
        Dialect::Sqlite => ("sqlite/columns", SQLITE_COLUMNS, "", "m.name"),
        Dialect::Postgres => ("postgres/columns", POSTGRES_COLUMNS, "n.nspname", "c.relname"),
        Dialect::Mysql => (
            "mysql/columns",
            MYSQL_COLUMNS,
            "c.table_schema",
            "c.table_name",
        ),
        Dialect::Sqlserver => ("sqlserver/columns", SQLSERVER_COLUMNS, "s.name", "t.name"),
    };
    let mut vars = vec![(
        "names",
        name_clauses(name_col, &filter.include_tables, &filter.exclude_tables),
    )];
    if !schema_col.is_empty() {
        vars.push(("schemas", schema_clauses(schema_col, dialect, filter)));
    }
    render(ctx, name, body, &vars)
}

// ===== Constraints =====

/// SQLite row (9 fields): (table, name, kind, columns CSV, ref table,
/// ref columns CSV, update rule, delete rule, check expr). Anonymous
/// constraints come back with an empty name.
const SQLITE_CONSTRAINTS: &str = "\
SELECT m.name, '', 'PRIMARY KEY',
       group_concat(p.name, ','), '', '', '', '', ''
FROM sqlite_master m
JOIN pragma_table_info(m.name) p ON p.pk > 0
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'{names}
GROUP BY m.name
UNION ALL
SELECT m.name, '', 'FOREIGN KEY',
       group_concat(f.\"from\", ','), f.\"table\",
       group_concat(f.\"to\", ','), f.on_update, f.on_delete, ''
FROM sqlite_master m
JOIN pragma_foreign_key_list(m.name) f
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'{names}
GROUP BY m.name, f.id, f.\"table\", f.on_update, f.on_delete
ORDER BY 1, 3";

/// Postgres row (18 fields): (schema, table, name, kind, columns JSON,
/// ref schema, ref table, ref columns JSON, update rule, delete rule,
/// deferrable, initially deferred, not valid, check expr,
/// exclude operators JSON, exclude index type, exclude predicate,
/// comment). Array-valued fields come back as JSON text.
const POSTGRES_CONSTRAINTS: &str = "\
SELECT n.nspname, cl.relname, con.conname,
       CASE con.contype
            WHEN 'p' THEN 'PRIMARY KEY'
            WHEN 'u' THEN 'UNIQUE'
            WHEN 'f' THEN 'FOREIGN KEY'
            WHEN 'c' THEN 'CHECK'
            WHEN 'x' THEN 'EXCLUDE'
            END,
       COALESCE((SELECT json_agg(a.attname ORDER BY k.ord)
                 FROM unnest(con.conkey) WITH ORDINALITY k(attnum, ord)
                 JOIN pg_catalog.pg_attribute a
                      ON a.attrelid = cl.oid AND a.attnum = k.attnum), '[]'),
       COALESCE(fn.nspname, ''),
       COALESCE(fcl.relname, ''),
       COALESCE((SELECT json_agg(a.attname ORDER BY k.ord)
                 FROM unnest(con.confkey) WITH ORDINALITY k(attnum, ord)
                 JOIN pg_catalog.pg_attribute a
                      ON a.attrelid = fcl.oid AND a.attnum = k.attnum), '[]'),
       CASE con.confupdtype
            WHEN 'r' THEN 'RESTRICT'
            WHEN 'c' THEN 'CASCADE'
            WHEN 'n' THEN 'SET NULL'
            WHEN 'd' THEN 'SET DEFAULT'
            ELSE '' END,
       CASE con.confdeltype
            WHEN 'r' THEN 'RESTRICT'
            WHEN 'c' THEN 'CASCADE'
            WHEN 'n' THEN 'SET NULL'
            WHEN 'd' THEN 'SET DEFAULT'
            ELSE '' END,
       con.condeferrable, con.condeferred, NOT con.convalidated,
       CASE WHEN con.contype = 'c'
            THEN pg_catalog.pg_get_constraintdef(con.oid, true) ELSE '' END,
       COALESCE((SELECT json_agg(o.oprname ORDER BY k.ord)
                 FROM unnest(con.conexclop) WITH ORDINALITY k(opr, ord)
                 JOIN pg_catalog.pg_operator o ON o.oid = k.opr), '[]'),
       COALESCE(am.amname, ''),
       COALESCE(pg_catalog.pg_get_expr(ix.indpred, ix.indrelid, true), ''),
       COALESCE(obj_description(con.oid, 'pg_constraint'), '')
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class cl ON cl.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = cl.relnamespace
LEFT JOIN pg_catalog.pg_class fcl ON fcl.oid = con.confrelid
LEFT JOIN pg_catalog.pg_namespace fn ON fn.oid = fcl.relnamespace
LEFT JOIN pg_catalog.pg_class icl ON icl.oid = con.conindid AND con.contype = 'x'
LEFT JOIN pg_catalog.pg_am am ON am.oid = icl.relam
LEFT JOIN pg_catalog.pg_index ix ON ix.indexrelid = con.conindid AND con.contype = 'x'
WHERE con.contype IN ('p', 'u', 'f', 'c', 'x'){schemas}{names}
ORDER BY n.nspname, cl.relname, con.conname";

/// MySQL row (11 fields): (schema, table, name, kind, columns CSV,
/// ref schema, ref table, ref columns CSV, update rule, delete rule,
/// check expr). Array-valued fields come back comma-joined.
const MYSQL_CONSTRAINTS: &str = "\
SELECT tc.table_schema, tc.table_name, tc.constraint_name, tc.constraint_type,
       COALESCE((SELECT group_concat(kcu.column_name ORDER BY kcu.ordinal_position)
                 FROM information_schema.key_column_usage kcu
                 WHERE kcu.constraint_schema = tc.constraint_schema
                   AND kcu.constraint_name = tc.constraint_name
                   AND kcu.table_schema = tc.table_schema
                   AND kcu.table_name = tc.table_name), ''),
       COALESCE((SELECT kcu.referenced_table_schema
                 FROM information_schema.key_column_usage kcu
                 WHERE kcu.constraint_schema = tc.constraint_schema
                   AND kcu.constraint_name = tc.constraint_name
                   AND kcu.table_name = tc.table_name
                   AND kcu.referenced_table_name IS NOT NULL LIMIT 1), ''),
       COALESCE((SELECT kcu.referenced_table_name
                 FROM information_schema.key_column_usage kcu
                 WHERE kcu.constraint_schema = tc.constraint_schema
                   AND kcu.constraint_name = tc.constraint_name
                   AND kcu.table_name = tc.table_name
                   AND kcu.referenced_table_name IS NOT NULL LIMIT 1), ''),
       COALESCE((SELECT group_concat(kcu.referenced_column_name ORDER BY kcu.ordinal_position)
                 FROM information_schema.key_column_usage kcu
                 WHERE kcu.constraint_schema = tc.constraint_schema
                   AND kcu.constraint_name = tc.constraint_name
                   AND kcu.table_name = tc.table_name), ''),
       COALESCE(rc.update_rule, ''),
       COALESCE(rc.delete_rule, ''),
       COALESCE(cc.check_clause, '')
FROM information_schema.table_constraints tc
LEFT JOIN information_schema.referential_constraints rc
       ON rc.constraint_schema = tc.constraint_schema
      AND rc.constraint_name = tc.constraint_name
      AND rc.table_name = tc.table_name
LEFT JOIN information_schema.check_constraints cc
       ON cc.constraint_schema = tc.constraint_schema
      AND cc.constraint_name = tc.constraint_name
WHERE tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY', 'CHECK'){schemas}{names}
ORDER BY tc.table_schema, tc.table_name, tc.constraint_name";

/// SQL Server row (13 fields): (schema, table, name, kind, columns CSV,
/// ref schema, ref table, ref columns CSV, update rule, delete rule,
/// clustered, not trusted, check expr).
const SQLSERVER_CONSTRAINTS: &str = "\
SELECT s.name, t.name, kc.name,
       CASE kc.type WHEN 'PK' THEN 'PRIMARY KEY' ELSE 'UNIQUE' END,
       (SELECT STRING_AGG(c.name, ',') WITHIN GROUP (ORDER BY ic.key_ordinal)
        FROM sys.index_columns ic
        JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
        WHERE ic.object_id = kc.parent_object_id AND ic.index_id = kc.unique_index_id),
       '', '', '', '', '',
       CASE WHEN i.type = 1 THEN 1 ELSE 0 END,
       0, ''
FROM sys.key_constraints kc
JOIN sys.tables t ON t.object_id = kc.parent_object_id
JOIN sys.schemas s ON s.schema_id = t.schema_id
JOIN sys.indexes i ON i.object_id = kc.parent_object_id AND i.index_id = kc.unique_index_id
WHERE t.is_ms_shipped = 0{schemas}{names}
UNION ALL
SELECT s.name, t.name, fk.name, 'FOREIGN KEY',
       (SELECT STRING_AGG(pc.name, ',') WITHIN GROUP (ORDER BY fkc.constraint_column_id)
        FROM sys.foreign_key_columns fkc
        JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id
                           AND pc.column_id = fkc.parent_column_id
        WHERE fkc.constraint_object_id = fk.object_id),
       rs.name, rt.name,
       (SELECT STRING_AGG(rc.name, ',') WITHIN GROUP (ORDER BY fkc.constraint_column_id)
        FROM sys.foreign_key_columns fkc
        JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id
                           AND rc.column_id = fkc.referenced_column_id
        WHERE fkc.constraint_object_id = fk.object_id),
       REPLACE(fk.update_referential_action_desc, '_', ' '),
       REPLACE(fk.delete_referential_action_desc, '_', ' '),
       0, fk.is_not_trusted, ''
FROM sys.foreign_keys fk
JOIN sys.tables t ON t.object_id = fk.parent_object_id
JOIN sys.schemas s ON s.schema_id = t.schema_id
JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
WHERE t.is_ms_shipped = 0{schemas}{names}
UNION ALL
SELECT s.name, t.name, ck.name, 'CHECK',
       '', '', '', '', '', '',
       0, ck.is_not_trusted, ck.definition
FROM sys.check_constraints ck
JOIN sys.tables t ON t.object_id = ck.parent_object_id
JOIN sys.schemas s ON s.schema_id = t.schema_id
WHERE t.is_ms_shipped = 0{schemas}{names}
ORDER BY 1, 2, 3";

pub fn constraints_query(
    ctx: &EngineContext,
    dialect: Dialect,
    filter: &Filter,
) -> Result<RenderedQuery> {
    let (name, body, schema_col, name_col) = match dialect {
        Dialect::Sqlite => ("sqlite/constraints", SQLITE_CONSTRAINTS, "", "m.name"),
        Dialect::Postgres => (
            "postgres/constraints",
            POSTGRES_CONSTRAINTS,
            "n.nspname",
            "cl.relname",
        ),
        Dialect::Mysql => (
            "mysql/constraints",
            MYSQL_CONSTRAINTS,
            "tc.table_schema",
            "tc.table_name",
        ),
        Dialect::Sqlserver => (
            "sqlserver/constraints",
            SQLSERVER_CONSTRAINTS,
            "s.name",
            "t.name",
        ),
    };
    let mut vars = vec![(
        "names",
        name_clauses(name_col, &filter.include_tables, &filter.exclude_tables),
    )];
    if !schema_col.is_empty() {
        vars.push(("schemas", schema_clauses(schema_col, dialect, filter)));
    }
    render(ctx, name, body, &vars)
}

// ===== Indexes =====

/// SQLite row (5 fields): (table, name, unique, columns CSV, sql).
const SQLITE_INDEXES: &str = "\
SELECT m.tbl_name, m.name, il.\"unique\",
       (SELECT group_concat(ii.name, ',')
        FROM pragma_index_info(m.name) ii),
       COALESCE(m.sql, '')
FROM sqlite_master m
JOIN pragma_index_list(m.tbl_name) il ON il.name = m.name
WHERE m.type = 'index' AND m.sql IS NOT NULL
  AND m.tbl_name NOT LIKE 'sqlite_%'{names}
ORDER BY m.tbl_name, m.name";

/// Postgres row (11 fields): (schema, owner, name, is_view_object,
/// index type, unique, key-plus-included columns JSON, key column count,
/// descending JSON, opclasses JSON, predicate). The column JSON packs
/// key and INCLUDE columns into one array; the count splits them.
const POSTGRES_INDEXES: &str = "\
SELECT n.nspname, c.relname, ic.relname,
       c.relkind = 'm',
       am.amname,
       ix.indisunique,
       COALESCE((SELECT json_agg(pg_catalog.pg_get_indexdef(ix.indexrelid, k.ord::int, true)
                                 ORDER BY k.ord)
                 FROM generate_series(1, ix.indnatts) WITH ORDINALITY k(i, ord)), '[]'),
       ix.indnkeyatts,
       COALESCE((SELECT json_agg((ix.indoption[k.i - 1] & 1) = 1 ORDER BY k.i)
                 FROM generate_series(1, ix.indnkeyatts) k(i)), '[]'),
       COALESCE((SELECT json_agg(COALESCE(opc.opcname, '') ORDER BY k.i)
                 FROM generate_series(1, ix.indnkeyatts) k(i)
                 LEFT JOIN pg_catalog.pg_opclass opc ON opc.oid = ix.indclass[k.i - 1]
                 WHERE NOT opc.opcdefault), '[]'),
       COALESCE(pg_catalog.pg_get_expr(ix.indpred, ix.indrelid, true), '')
FROM pg_catalog.pg_index ix
JOIN pg_catalog.pg_class ic ON ic.oid = ix.indexrelid
JOIN pg_catalog.pg_class c ON c.oid = ix.indrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_am am ON am.oid = ic.relam
WHERE c.relkind IN ('r', 'p', 'm') AND NOT ix.indisprimary
  AND NOT EXISTS (SELECT 1 FROM pg_catalog.pg_constraint cx
                  WHERE cx.conindid = ix.indexrelid){schemas}{names}
ORDER BY n.nspname, c.relname, ic.relname";

/// MySQL row (8 fields): (schema, table, name, index type, unique,
/// columns CSV, collations CSV with D marking descending, comment).
const MYSQL_INDEXES: &str = "\
SELECT st.table_schema, st.table_name, st.index_name, st.index_type,
       MAX(st.non_unique) = 0,
       group_concat(st.column_name ORDER BY st.seq_in_index SEPARATOR ','),
       group_concat(COALESCE(st.collation, 'A') ORDER BY st.seq_in_index SEPARATOR ','),
       COALESCE(MAX(st.index_comment), '')
FROM information_schema.statistics st
WHERE st.index_name <> 'PRIMARY'{schemas}{names}
GROUP BY st.table_schema, st.table_name, st.index_name, st.index_type
ORDER BY st.table_schema, st.table_name, st.index_name";

/// SQL Server row (10 fields): (schema, owner, name, is_view_object,
/// index type, unique, columns CSV, include bitmap CSV of booleans,
/// descending CSV of booleans, predicate).
const SQLSERVER_INDEXES: &str = "\
SELECT s.name, o.name, i.name,
       CASE WHEN o.type = 'V' THEN 1 ELSE 0 END,
       i.type_desc,
       i.is_unique,
       (SELECT STRING_AGG(c.name, ',') WITHIN GROUP (ORDER BY ic.index_column_id)
        FROM sys.index_columns ic
        JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
        WHERE ic.object_id = i.object_id AND ic.index_id = i.index_id),
       (SELECT STRING_AGG(CAST(ic.is_included_column AS varchar(1)), ',')
               WITHIN GROUP (ORDER BY ic.index_column_id)
        FROM sys.index_columns ic
        WHERE ic.object_id = i.object_id AND ic.index_id = i.index_id),
       (SELECT STRING_AGG(CAST(ic.is_descending_key AS varchar(1)), ',')
               WITHIN GROUP (ORDER BY ic.index_column_id)
        FROM sys.index_columns ic
        WHERE ic.object_id = i.object_id AND ic.index_id = i.index_id),
       COALESCE(i.filter_definition, '')
FROM sys.indexes i
JOIN sys.objects o ON o.object_id = i.object_id
JOIN sys.schemas s ON s.schema_id = o.schema_id
WHERE i.type > 0 AND i.is_primary_key = 0 AND i.is_unique_constraint = 0
  AND o.type IN ('U', 'V') AND o.is_ms_shipped = 0{schemas}{names}
ORDER BY s.name, o.name, i.name";

pub fn indexes_query(
    ctx: &EngineContext,
    dialect: Dialect,
    filter: &Filter,
) -> Result<RenderedQuery> {
    let (name, body, schema_col, name_col) = match dialect {
        Dialect::Sqlite => ("sqlite/indexes", SQLITE_INDEXES, "", "m.tbl_name"),
        Dialect::Postgres => (
            "postgres/indexes",
            POSTGRES_INDEXES,
            "n.nspname",
            "c.relname",
        ),
        Dialect::Mysql => (
            "mysql/indexes",
            MYSQL_INDEXES,
            "st.table_schema",
            "st.table_name",
        ),
        Dialect::Sqlserver => ("sqlserver/indexes", SQLSERVER_INDEXES, "s.name", "o.name"),
    };
    let mut vars = vec![(
        "names",
        name_clauses(name_col, &filter.include_tables, &filter.exclude_tables),
    )];
    if !schema_col.is_empty() {
        vars.push(("schemas", schema_clauses(schema_col, dialect, filter)));
    }
    render(ctx, name, body, &vars)
}

// ===== Triggers =====

/// SQLite row (3 fields): (table, name, sql).
const SQLITE_TRIGGERS: &str = "\
SELECT m.tbl_name, m.name, m.sql
FROM sqlite_master m
WHERE m.type = 'trigger' AND m.tbl_name NOT LIKE 'sqlite_%'{names}
ORDER BY m.tbl_name, m.name";

/// Postgres row (5 fields): (schema, owner, name, is_view_object,
/// definition).
const POSTGRES_TRIGGERS: &str = "\
SELECT n.nspname, c.relname, t.tgname,
       c.relkind IN ('v', 'm'),
       pg_catalog.pg_get_triggerdef(t.oid, true)
FROM pg_catalog.pg_trigger t
JOIN pg_catalog.pg_class c ON c.oid = t.tgrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE NOT t.tgisinternal{schemas}{names}
ORDER BY n.nspname, c.relname, t.tgname";

/// MySQL row (6 fields): (schema, table, name, timing, event, statement).
const MYSQL_TRIGGERS: &str = "\
SELECT tr.trigger_schema, tr.event_object_table, tr.trigger_name,
       tr.action_timing, tr.event_manipulation, tr.action_statement
FROM information_schema.triggers tr
WHERE 1 = 1{schemas}{names}
ORDER BY tr.trigger_schema, tr.event_object_table, tr.trigger_name";

/// SQL Server row (5 fields): (schema, owner, name, is_view_object,
/// definition).
const SQLSERVER_TRIGGERS: &str = "\
SELECT s.name, o.name, tr.name,
       CASE WHEN o.type = 'V' THEN 1 ELSE 0 END,
       m.definition
FROM sys.triggers tr
JOIN sys.objects o ON o.object_id = tr.parent_id
JOIN sys.schemas s ON s.schema_id = o.schema_id
JOIN sys.sql_modules m ON m.object_id = tr.object_id
WHERE tr.is_ms_shipped = 0{schemas}{names}
ORDER BY s.name, o.name, tr.name";

pub fn triggers_query(
    ctx: &EngineContext,
    dialect: Dialect,
    filter: &Filter,
) -> Result<RenderedQuery> {
    let (name, body, schema_col, name_col) = match dialect {
        Dialect::Sqlite => ("sqlite/triggers", SQLITE_TRIGGERS, "", "m.tbl_name"),
        Dialect::Postgres => (
            "postgres/triggers",
            POSTGRES_TRIGGERS,
            "n.nspname",
            "c.relname",
        ),
        Dialect::Mysql => (
            "mysql/triggers",
            MYSQL_TRIGGERS,
            "tr.trigger_schema",
            "tr.event_object_table",
        ),
        Dialect::Sqlserver => ("sqlserver/triggers", SQLSERVER_TRIGGERS, "s.name", "o.name"),
    };
    let mut vars = vec![(
        "names",
        name_clauses(name_col, &filter.include_tables, &filter.exclude_tables),
    )];
    if !schema_col.is_empty() {
        vars.push(("schemas", schema_clauses(schema_col, dialect, filter)));
    }
    render(ctx, name, body, &vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_list_doubles_quotes() {
        let items = vec!["users".to_string(), "o'brien".to_string()];
        assert_eq!(quoted_list(&items), "'users','o''brien'");
    }

    #[test]
    fn test_filter_clauses_render_into_query() {
        let ctx = EngineContext::new();
        let filter = Filter {
            include_schemas: vec!["public".to_string()],
            exclude_tables: vec!["migrations".to_string()],
            ..Default::default()
        };
        let q = tables_query(&ctx, Dialect::Postgres, &filter).unwrap();
        assert_eq!(q.template, "postgres/tables");
        assert!(q.sql.contains("n.nspname IN ('public')"));
        assert!(q.sql.contains("c.relname NOT IN ('migrations')"));
        assert!(q.sql.contains("NOT IN ('pg_catalog','information_schema','pg_toast')"));
    }

    #[test]
    fn test_system_catalogs_flag_drops_clause() {
        let ctx = EngineContext::new();
        let filter = Filter {
            include_system_catalogs: true,
            ..Default::default()
        };
        let q = tables_query(&ctx, Dialect::Postgres, &filter).unwrap();
        assert!(!q.sql.contains("pg_toast"));
    }

    #[test]
    fn test_every_dialect_renders_every_kind() {
        let ctx = EngineContext::new();
        let filter = Filter::default();
        for dialect in Dialect::all() {
            tables_query(&ctx, dialect, &filter).unwrap();
            views_query(&ctx, dialect, &filter).unwrap();
            columns_query(&ctx, dialect, &filter).unwrap();
            constraints_query(&ctx, dialect, &filter).unwrap();
            indexes_query(&ctx, dialect, &filter).unwrap();
            triggers_query(&ctx, dialect, &filter).unwrap();
            let routines = routines_query(&ctx, dialect, &filter).unwrap();
            assert_eq!(routines.is_none(), dialect == Dialect::Sqlite);
        }
        extensions_query(&ctx, &filter).unwrap();
        enums_query(&ctx, &filter).unwrap();
        domains_query(&ctx, &filter).unwrap();
    }

    #[test]
    fn test_templates_cached_by_name() {
        let ctx = EngineContext::new();
        let filter = Filter::default();
        let a = columns_query(&ctx, Dialect::Mysql, &filter).unwrap();
        let b = columns_query(&ctx, Dialect::Mysql, &filter).unwrap();
        assert_eq!(a.sql, b.sql);
    }
}
