//! Row-to-record scanners.
//!
//! Each scanner consumes the row layout documented on its query template
//! and writes catalog records through the cache. Scan errors name the
//! entity kind being read.

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::cache::CatalogCache;
use crate::core::catalog::{
    ColumnDef, ConstraintDef, Dialect, DomainDef, EnumDef, IndexDef, RoutineDef, TableDef,
    TriggerDef, ViewDef,
};
use crate::core::executor::{RowScanner, SqlRow};
use crate::core::keywords::{normalize_fk_rule, CHECK, FOREIGN_KEY, IDENTITY, PRIMARY_KEY, UNIQUE};
use crate::error::{DriftError, Result};
use crate::introspect::normalize::{normalize_column_default, normalize_column_type, NormalizedType};

fn split_csv(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(|p| p.to_string()).collect()
    }
}

fn parse_json_strings(s: &str, entity: &'static str) -> Result<Vec<String>> {
    if s.is_empty() || s == "[]" {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<Option<String>>>(s)
        .map(|v| v.into_iter().map(Option::unwrap_or_default).collect())
        .map_err(|e| DriftError::scan(entity, format!("bad JSON array {:?}: {}", s, e)))
}

fn parse_json_bools(s: &str, entity: &'static str) -> Result<Vec<bool>> {
    if s.is_empty() || s == "[]" {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<bool>>(s)
        .map_err(|e| DriftError::scan(entity, format!("bad JSON array {:?}: {}", s, e)))
}

/// Distribute normalized type arguments into the column's length,
/// precision, and scale fields, falling back to catalog-reported values
/// when the type string carried no arguments.
fn assign_type_args(
    col: &mut ColumnDef,
    ty: &NormalizedType,
    fallback_char: &str,
    fallback_precision: i64,
    fallback_scale: i64,
) {
    let char_family = ty.name.contains("CHAR")
        || ty.name.contains("BINARY")
        || ty.name.contains("TEXT")
        || ty.name == "BIT"
        || ty.name == "VARBIT";

    if !ty.arg2.is_empty() {
        col.precision = ty.arg1.clone();
        col.scale = ty.arg2.clone();
    } else if !ty.arg1.is_empty() {
        if char_family {
            col.char_length = ty.arg1.clone();
        } else {
            col.precision = ty.arg1.clone();
        }
    } else if char_family && !fallback_char.is_empty() && fallback_char != "0" {
        col.char_length = fallback_char.to_string();
    } else if ty.name == "NUMERIC" && fallback_precision > 0 {
        col.precision = fallback_precision.to_string();
        if fallback_scale > 0 {
            col.scale = fallback_scale.to_string();
        }
    }
}

/// Store the normalized base type (with suffix) on the column.
fn store_type(col: &mut ColumnDef, ty: &NormalizedType) {
    col.col_type = format!("{}{}", ty.name, ty.suffix);
}

// ===== Tables and views =====

pub(crate) fn scan_tables(cache: &mut CatalogCache, dialect: Dialect, rows: &[SqlRow]) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "Table");
        let mut table = TableDef::default();
        match dialect {
            Dialect::Sqlite => {
                table.name = scanner.text(0)?;
                let sql = scanner.text_or_empty(1)?;
                if sql.to_uppercase().starts_with("CREATE VIRTUAL") {
                    table.virtual_table = true;
                    table.sql = sql;
                }
            }
            _ => {
                table.schema = scanner.text(0)?;
                table.name = scanner.text(1)?;
                table.comment = scanner.text_or_empty(2)?;
            }
        }
        let schema = cache.get_or_create_schema(&table.schema);
        schema.tables_valid = true;
        cache.add_or_update_table(table);
    }
    debug!(count = rows.len(), "scanned tables");
    Ok(())
}

pub(crate) fn scan_views(cache: &mut CatalogCache, dialect: Dialect, rows: &[SqlRow]) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "View");
        let mut view = ViewDef::default();
        match dialect {
            Dialect::Sqlite => {
                view.name = scanner.text(0)?;
                view.sql = scanner.text_or_empty(1)?;
            }
            Dialect::Postgres => {
                view.schema = scanner.text(0)?;
                view.name = scanner.text(1)?;
                view.sql = scanner.text_or_empty(2)?;
                view.materialized = scanner.boolean(3)?;
                view.comment = scanner.text_or_empty(4)?;
            }
            Dialect::Mysql | Dialect::Sqlserver => {
                view.schema = scanner.text(0)?;
                view.name = scanner.text(1)?;
                view.sql = scanner.text_or_empty(2)?;
            }
        }
        let schema = cache.get_or_create_schema(&view.schema);
        schema.views_valid = true;
        cache.add_or_update_view(view);
    }
    debug!(count = rows.len(), "scanned views");
    Ok(())
}

// ===== Columns =====

pub(crate) fn scan_columns(cache: &mut CatalogCache, dialect: Dialect, rows: &[SqlRow]) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "Column");
        match dialect {
            Dialect::Sqlite => scan_sqlite_column(cache, &scanner)?,
            Dialect::Postgres => scan_postgres_column(cache, &scanner)?,
            Dialect::Mysql => scan_mysql_column(cache, &scanner)?,
            Dialect::Sqlserver => scan_sqlserver_column(cache, &scanner)?,
        }
    }
    debug!(count = rows.len(), "scanned columns");
    Ok(())
}

fn scan_sqlite_column(cache: &mut CatalogCache, scanner: &RowScanner<'_>) -> Result<()> {
    let table = scanner.text(0)?;
    let name = scanner.text(1)?;
    let ty = normalize_column_type(Dialect::Sqlite, &scanner.text_or_empty(2)?);
    let not_null = scanner.boolean(3)?;
    let hidden = scanner.integer(4)?;
    let default = scanner.text_or_empty(5)?;

    let col = cache.get_or_create_column("", &table, &name);
    store_type(col, &ty);
    assign_type_args(col, &ty, "", 0, 0);
    col.not_null = not_null;
    // pragma_table_xinfo: hidden = 2 is VIRTUAL generated, 3 is STORED.
    if hidden == 2 || hidden == 3 {
        col.is_generated = true;
        col.generated_stored = hidden == 3;
    }
    col.default_value = normalize_column_default(Dialect::Sqlite, &default);
    Ok(())
}

fn scan_postgres_column(cache: &mut CatalogCache, scanner: &RowScanner<'_>) -> Result<()> {
    let schema = scanner.text(0)?;
    let table = scanner.text(1)?;
    let name = scanner.text(2)?;
    let ty = normalize_column_type(Dialect::Postgres, &scanner.text_or_empty(3)?);
    let not_null = scanner.boolean(4)?;
    let default = scanner.text_or_empty(5)?;
    let is_enum = scanner.boolean(6)?;
    let domain = scanner.text_or_empty(7)?;
    let precision = scanner.integer(8)?;
    let scale = scanner.integer(9)?;
    let identity = scanner.text_or_empty(10)?;
    let generated_expr = scanner.text_or_empty(11)?;
    let generated_stored = scanner.boolean(12)?;
    let collation = scanner.text_or_empty(13)?;
    let comment = scanner.text_or_empty(14)?;

    let col = cache.get_or_create_column(&schema, &table, &name);
    store_type(col, &ty);
    assign_type_args(col, &ty, "", precision, scale);
    col.not_null = not_null;
    col.is_enum = is_enum;
    col.domain = domain;
    col.identity = identity;
    col.is_generated = !generated_expr.is_empty();
    col.generated_expr = generated_expr;
    col.generated_stored = generated_stored;
    col.collation = collation;
    col.comment = comment;
    if !col.is_generated {
        col.default_value = normalize_column_default(Dialect::Postgres, &default);
    }
    Ok(())
}

fn scan_mysql_column(cache: &mut CatalogCache, scanner: &RowScanner<'_>) -> Result<()> {
    let schema = scanner.text(0)?;
    let table = scanner.text(1)?;
    let name = scanner.text(2)?;
    let ty = normalize_column_type(Dialect::Mysql, &scanner.text_or_empty(3)?);
    let not_null = scanner.boolean(4)?;
    let default = scanner.text_or_empty(5)?;
    let autoincrement = scanner.boolean(6)?;
    let on_update = scanner.boolean(7)?;
    let char_length = scanner.integer(8)?;
    let precision = scanner.integer(9)?;
    let scale = scanner.integer(10)?;
    let generated_expr = scanner.text_or_empty(11)?;
    let generated_stored = scanner.boolean(12)?;
    let collation = scanner.text_or_empty(13)?;
    let comment = scanner.text_or_empty(14)?;

    let col = cache.get_or_create_column(&schema, &table, &name);
    store_type(col, &ty);
    assign_type_args(col, &ty, &char_length.to_string(), precision, scale);
    col.not_null = not_null;
    col.is_autoincrement = autoincrement;
    col.on_update_current_timestamp = on_update;
    col.is_generated = !generated_expr.is_empty();
    col.generated_expr = generated_expr;
    col.generated_stored = generated_stored;
    col.collation = collation;
    col.comment = comment;
    if !col.is_generated {
        col.default_value = normalize_column_default(Dialect::Mysql, &default);
    }
    Ok(())
}

fn scan_sqlserver_column(cache: &mut CatalogCache, scanner: &RowScanner<'_>) -> Result<()> {
    let schema = scanner.text(0)?;
    let table = scanner.text(1)?;
    let name = scanner.text(2)?;
    let ty = normalize_column_type(Dialect::Sqlserver, &scanner.text_or_empty(3)?);
    let not_null = scanner.boolean(4)?;
    let default = scanner.text_or_empty(5)?;
    let is_identity = scanner.boolean(6)?;
    let char_length = scanner.text_or_empty(7)?;
    let precision = scanner.integer(8)?;
    let scale = scanner.integer(9)?;
    let collation = scanner.text_or_empty(10)?;
    let computed_expr = scanner.text_or_empty(11)?;
    let comment = scanner.text_or_empty(12)?;

    let col = cache.get_or_create_column(&schema, &table, &name);
    store_type(col, &ty);
    assign_type_args(col, &ty, &char_length, precision, scale);
    col.not_null = not_null;
    if is_identity {
        col.identity = IDENTITY.to_string();
    }
    col.is_generated = !computed_expr.is_empty();
    col.generated_expr = computed_expr;
    col.collation = collation;
    col.comment = comment;
    if !col.is_generated {
        col.default_value = normalize_column_default(Dialect::Sqlserver, &default);
    }
    Ok(())
}

// ===== Constraints =====

/// Strip a `CHECK (...)` wrapper from a Postgres constraint definition.
fn strip_check_wrapper(def: &str) -> String {
    let trimmed = def.trim();
    let Some(rest) = trimmed.strip_prefix("CHECK ").or_else(|| trimmed.strip_prefix("CHECK")) else {
        return trimmed.to_string();
    };
    let rest = rest.trim();
    if rest.starts_with('(') && rest.ends_with(')') {
        rest[1..rest.len() - 1].trim().to_string()
    } else {
        rest.to_string()
    }
}

pub(crate) fn scan_constraints(
    cache: &mut CatalogCache,
    dialect: Dialect,
    rows: &[SqlRow],
    wanted_kinds: &[String],
) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "Constraint");
        let record = match dialect {
            Dialect::Sqlite => scan_sqlite_constraint(&scanner)?,
            Dialect::Postgres => scan_postgres_constraint(&scanner)?,
            Dialect::Mysql => scan_mysql_constraint(&scanner)?,
            Dialect::Sqlserver => scan_sqlserver_constraint(&scanner)?,
        };
        if !wanted_kinds.is_empty() && !wanted_kinds.iter().any(|k| k == &record.kind) {
            continue;
        }
        cache.add_or_update_constraint(record);
    }
    debug!(count = rows.len(), "scanned constraints");
    Ok(())
}

fn scan_sqlite_constraint(scanner: &RowScanner<'_>) -> Result<ConstraintDef> {
    Ok(ConstraintDef {
        table: scanner.text(0)?,
        name: scanner.text_or_empty(1)?,
        kind: scanner.text(2)?,
        columns: split_csv(&scanner.text_or_empty(3)?),
        ref_table: scanner.text_or_empty(4)?,
        ref_columns: split_csv(&scanner.text_or_empty(5)?),
        update_rule: normalize_fk_rule(&scanner.text_or_empty(6)?),
        delete_rule: normalize_fk_rule(&scanner.text_or_empty(7)?),
        check_expr: scanner.text_or_empty(8)?,
        ..Default::default()
    })
}

fn scan_postgres_constraint(scanner: &RowScanner<'_>) -> Result<ConstraintDef> {
    let kind = scanner.text(3)?;
    let check_expr = if kind == CHECK {
        strip_check_wrapper(&scanner.text_or_empty(13)?)
    } else {
        String::new()
    };
    Ok(ConstraintDef {
        schema: scanner.text(0)?,
        table: scanner.text(1)?,
        name: scanner.text(2)?,
        kind,
        columns: parse_json_strings(&scanner.text_or_empty(4)?, "Constraint")?,
        ref_schema: scanner.text_or_empty(5)?,
        ref_table: scanner.text_or_empty(6)?,
        ref_columns: parse_json_strings(&scanner.text_or_empty(7)?, "Constraint")?,
        update_rule: normalize_fk_rule(&scanner.text_or_empty(8)?),
        delete_rule: normalize_fk_rule(&scanner.text_or_empty(9)?),
        deferrable: scanner.boolean(10)?,
        initially_deferred: scanner.boolean(11)?,
        not_valid: scanner.boolean(12)?,
        check_expr,
        exclude_operators: parse_json_strings(&scanner.text_or_empty(14)?, "Constraint")?,
        exclude_index_type: scanner.text_or_empty(15)?,
        exclude_predicate: scanner.text_or_empty(16)?,
        comment: scanner.text_or_empty(17)?,
        ..Default::default()
    })
}

fn scan_mysql_constraint(scanner: &RowScanner<'_>) -> Result<ConstraintDef> {
    Ok(ConstraintDef {
        schema: scanner.text(0)?,
        table: scanner.text(1)?,
        name: scanner.text(2)?,
        kind: scanner.text(3)?,
        columns: split_csv(&scanner.text_or_empty(4)?),
        ref_schema: scanner.text_or_empty(5)?,
        ref_table: scanner.text_or_empty(6)?,
        ref_columns: split_csv(&scanner.text_or_empty(7)?),
        update_rule: normalize_fk_rule(&scanner.text_or_empty(8)?),
        delete_rule: normalize_fk_rule(&scanner.text_or_empty(9)?),
        check_expr: scanner.text_or_empty(10)?,
        ..Default::default()
    })
}

fn scan_sqlserver_constraint(scanner: &RowScanner<'_>) -> Result<ConstraintDef> {
    Ok(ConstraintDef {
        schema: scanner.text(0)?,
        table: scanner.text(1)?,
        name: scanner.text(2)?,
        kind: scanner.text(3)?,
        columns: split_csv(&scanner.text_or_empty(4)?),
        ref_schema: scanner.text_or_empty(5)?,
        ref_table: scanner.text_or_empty(6)?,
        ref_columns: split_csv(&scanner.text_or_empty(7)?),
        update_rule: normalize_fk_rule(&scanner.text_or_empty(8)?),
        delete_rule: normalize_fk_rule(&scanner.text_or_empty(9)?),
        clustered: scanner.boolean(10)?,
        not_valid: scanner.boolean(11)?,
        check_expr: scanner.text_or_empty(12)?,
        ..Default::default()
    })
}

// ===== Indexes =====

pub(crate) fn scan_indexes(cache: &mut CatalogCache, dialect: Dialect, rows: &[SqlRow]) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "Index");
        let record = match dialect {
            Dialect::Sqlite => IndexDef {
                table: scanner.text(0)?,
                name: scanner.text(1)?,
                unique: scanner.boolean(2)?,
                columns: split_csv(&scanner.text_or_empty(3)?),
                sql: scanner.text_or_empty(4)?,
                ..Default::default()
            },
            Dialect::Postgres => scan_postgres_index(&scanner)?,
            Dialect::Mysql => {
                let descending = split_csv(&scanner.text_or_empty(6)?)
                    .iter()
                    .map(|c| c == "D")
                    .collect();
                IndexDef {
                    schema: scanner.text(0)?,
                    table: scanner.text(1)?,
                    name: scanner.text(2)?,
                    index_type: scanner.text_or_empty(3)?,
                    unique: scanner.boolean(4)?,
                    columns: split_csv(&scanner.text_or_empty(5)?),
                    descending,
                    comment: scanner.text_or_empty(7)?,
                    ..Default::default()
                }
            }
            Dialect::Sqlserver => scan_sqlserver_index(&scanner)?,
        };
        cache.add_or_update_index(record);
    }
    debug!(count = rows.len(), "scanned indexes");
    Ok(())
}

fn scan_postgres_index(scanner: &RowScanner<'_>) -> Result<IndexDef> {
    // Key and INCLUDE columns arrive packed in one JSON array; the key
    // column count splits them.
    let all_columns = parse_json_strings(&scanner.text_or_empty(6)?, "Index")?;
    let key_count = scanner.integer(7)? as usize;
    let (key_columns, include_columns) = if key_count <= all_columns.len() {
        let (keys, includes) = all_columns.split_at(key_count);
        (keys.to_vec(), includes.to_vec())
    } else {
        (all_columns, Vec::new())
    };

    Ok(IndexDef {
        schema: scanner.text(0)?,
        table: scanner.text(1)?,
        name: scanner.text(2)?,
        is_view_index: scanner.boolean(3)?,
        index_type: scanner.text_or_empty(4)?.to_uppercase(),
        unique: scanner.boolean(5)?,
        columns: key_columns,
        include_columns,
        descending: parse_json_bools(&scanner.text_or_empty(8)?, "Index")?,
        opclasses: parse_json_strings(&scanner.text_or_empty(9)?, "Index")?,
        predicate: scanner.text_or_empty(10)?,
        ..Default::default()
    })
}

fn scan_sqlserver_index(scanner: &RowScanner<'_>) -> Result<IndexDef> {
    // The include bitmap is a comma list of 0/1 parallel to the full
    // column list; included columns are split out of the key list.
    let all_columns = split_csv(&scanner.text_or_empty(6)?);
    let include_flags: Vec<bool> = split_csv(&scanner.text_or_empty(7)?)
        .iter()
        .map(|f| f == "1")
        .collect();
    let descending_flags: Vec<bool> = split_csv(&scanner.text_or_empty(8)?)
        .iter()
        .map(|f| f == "1")
        .collect();

    let mut columns = Vec::new();
    let mut include_columns = Vec::new();
    let mut descending = Vec::new();
    for (i, column) in all_columns.into_iter().enumerate() {
        if include_flags.get(i).copied().unwrap_or(false) {
            include_columns.push(column);
        } else {
            columns.push(column);
            descending.push(descending_flags.get(i).copied().unwrap_or(false));
        }
    }

    Ok(IndexDef {
        schema: scanner.text(0)?,
        table: scanner.text(1)?,
        name: scanner.text(2)?,
        is_view_index: scanner.boolean(3)?,
        index_type: scanner.text_or_empty(4)?,
        unique: scanner.boolean(5)?,
        columns,
        include_columns,
        descending,
        predicate: scanner.text_or_empty(9)?,
        ..Default::default()
    })
}

// ===== Triggers =====

pub(crate) fn scan_triggers(cache: &mut CatalogCache, dialect: Dialect, rows: &[SqlRow]) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "Trigger");
        let record = match dialect {
            Dialect::Sqlite => TriggerDef {
                table: scanner.text(0)?,
                name: scanner.text(1)?,
                sql: scanner.text_or_empty(2)?,
                ..Default::default()
            },
            Dialect::Postgres | Dialect::Sqlserver => TriggerDef {
                schema: scanner.text(0)?,
                table: scanner.text(1)?,
                name: scanner.text(2)?,
                is_view_trigger: scanner.boolean(3)?,
                sql: scanner.text_or_empty(4)?,
                ..Default::default()
            },
            Dialect::Mysql => {
                let mut attributes = BTreeMap::new();
                attributes.insert("action_timing".to_string(), scanner.text_or_empty(3)?);
                attributes.insert(
                    "event_manipulation".to_string(),
                    scanner.text_or_empty(4)?,
                );
                TriggerDef {
                    schema: scanner.text(0)?,
                    table: scanner.text(1)?,
                    name: scanner.text(2)?,
                    sql: scanner.text_or_empty(5)?,
                    attributes,
                    ..Default::default()
                }
            }
        };
        cache.add_or_update_trigger(record);
    }
    debug!(count = rows.len(), "scanned triggers");
    Ok(())
}

// ===== Routines, enums, domains, extensions =====

pub(crate) fn scan_routines(cache: &mut CatalogCache, dialect: Dialect, rows: &[SqlRow]) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "Routine");
        let record = match dialect {
            Dialect::Sqlite => continue,
            Dialect::Postgres => RoutineDef {
                schema: scanner.text(0)?,
                name: scanner.text(1)?,
                identity_args: scanner.text_or_empty(2)?,
                kind: scanner.text(3)?,
                sql: scanner.text_or_empty(4)?,
                comment: scanner.text_or_empty(5)?,
                ..Default::default()
            },
            Dialect::Mysql => RoutineDef {
                schema: scanner.text(0)?,
                name: scanner.text(1)?,
                kind: scanner.text(2)?,
                sql: scanner.text_or_empty(3)?,
                comment: scanner.text_or_empty(4)?,
                ..Default::default()
            },
            Dialect::Sqlserver => RoutineDef {
                schema: scanner.text(0)?,
                name: scanner.text(1)?,
                kind: scanner.text(2)?,
                sql: scanner.text_or_empty(3)?,
                ..Default::default()
            },
        };
        let schema = cache.get_or_create_schema(&record.schema);
        schema.routines_valid = true;
        cache.add_or_update_routine(record);
    }
    debug!(count = rows.len(), "scanned routines");
    Ok(())
}

pub(crate) fn scan_enums(cache: &mut CatalogCache, rows: &[SqlRow]) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "Enum");
        let record = EnumDef {
            schema: scanner.text(0)?,
            name: scanner.text(1)?,
            labels: parse_json_strings(&scanner.text_or_empty(2)?, "Enum")?,
            ..Default::default()
        };
        let schema = cache.get_or_create_schema(&record.schema);
        schema.enums_valid = true;
        cache.add_or_update_enum(record);
    }
    debug!(count = rows.len(), "scanned enums");
    Ok(())
}

pub(crate) fn scan_domains(cache: &mut CatalogCache, rows: &[SqlRow]) -> Result<()> {
    for row in rows {
        let scanner = RowScanner::new(row, "Domain");
        let record = DomainDef {
            schema: scanner.text(0)?,
            name: scanner.text(1)?,
            domain_type: scanner.text_or_empty(2)?.to_uppercase(),
            collation: scanner.text_or_empty(3)?,
            not_null: scanner.boolean(4)?,
            default_value: scanner.text_or_empty(5)?,
            check_names: parse_json_strings(&scanner.text_or_empty(6)?, "Domain")?,
            check_exprs: parse_json_strings(&scanner.text_or_empty(7)?, "Domain")?
                .iter()
                .map(|e| strip_check_wrapper(e))
                .collect(),
            ..Default::default()
        };
        let schema = cache.get_or_create_schema(&record.schema);
        schema.domains_valid = true;
        cache.add_or_update_domain(record);
    }
    debug!(count = rows.len(), "scanned domains");
    Ok(())
}

pub(crate) fn scan_extensions(rows: &[SqlRow]) -> Result<Vec<String>> {
    let mut extensions = Vec::new();
    for row in rows {
        let scanner = RowScanner::new(row, "Extension");
        extensions.push(scanner.text(0)?);
    }
    debug!(count = extensions.len(), "scanned extensions");
    Ok(extensions)
}

// ===== Single-column constraint post-pass =====

/// Copy the fields of every single-column PRIMARY KEY / UNIQUE /
/// FOREIGN KEY constraint onto its column record.
///
/// The promotion order is PK, UNIQUE, then FK, so a column that is both
/// the primary key and a foreign key ends up with both roles visible;
/// the FK reference fields are populated last.
pub(crate) fn promote_single_column_constraints(cache: &mut CatalogCache) {
    struct Promotion {
        schema: String,
        table: String,
        column: String,
        kind: &'static str,
        ref_schema: String,
        ref_table: String,
        ref_column: String,
        update_rule: String,
        delete_rule: String,
    }

    let mut promotions = Vec::new();
    for schema in &cache.catalog().schemas {
        for table in &schema.tables {
            for constraint in &table.constraints {
                if constraint.ignore || constraint.columns.len() != 1 {
                    continue;
                }
                let kind = match constraint.kind.as_str() {
                    PRIMARY_KEY => PRIMARY_KEY,
                    UNIQUE => UNIQUE,
                    FOREIGN_KEY if constraint.ref_columns.len() == 1 => FOREIGN_KEY,
                    _ => continue,
                };
                promotions.push(Promotion {
                    schema: schema.name.clone(),
                    table: table.name.clone(),
                    column: constraint.columns[0].clone(),
                    kind,
                    ref_schema: constraint.ref_schema.clone(),
                    ref_table: constraint.ref_table.clone(),
                    ref_column: constraint
                        .ref_columns
                        .first()
                        .cloned()
                        .unwrap_or_default(),
                    update_rule: constraint.update_rule.clone(),
                    delete_rule: constraint.delete_rule.clone(),
                });
            }
        }
    }

    // PK first, then UNIQUE, then FK.
    promotions.sort_by_key(|p| match p.kind {
        PRIMARY_KEY => 0,
        UNIQUE => 1,
        _ => 2,
    });

    for p in promotions {
        let Some(col) = cache.get_column_mut(&p.schema, &p.table, &p.column) else {
            continue;
        };
        match p.kind {
            PRIMARY_KEY => {
                col.is_primary_key = true;
                col.not_null = true;
            }
            UNIQUE => col.is_unique = true,
            _ => {
                col.ref_schema = p.ref_schema;
                col.ref_table = p.ref_table;
                col.ref_column = p.ref_column;
                col.update_rule = p.update_rule;
                col.delete_rule = p.delete_rule;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::SqlValue;

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_scan_sqlite_columns() {
        let mut cache = CatalogCache::new(Dialect::Sqlite);
        let rows = vec![
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
                text("total"),
                text("real"),
                SqlValue::Int(0),
                SqlValue::Int(3),
                SqlValue::Null,
            ],
        ];
        scan_columns(&mut cache, Dialect::Sqlite, &rows).unwrap();

        let id = cache.get_column("", "t", "id").unwrap();
        assert_eq!(id.col_type, "INTEGER");
        assert!(id.not_null);
        assert_eq!(id.table, "t");

        let total = cache.get_column("", "t", "total").unwrap();
        assert!(total.is_generated);
        assert!(total.generated_stored);
    }

    #[test]
    fn test_scan_postgres_column_types_and_identity() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        let rows = vec![vec![
            text("public"),
            text("t"),
            text("id"),
            text("integer"),
            SqlValue::Bool(true),
            text(""),
            SqlValue::Bool(false),
            text(""),
            SqlValue::Int(32),
            SqlValue::Int(0),
            text("GENERATED ALWAYS AS IDENTITY"),
            text(""),
            SqlValue::Bool(false),
            text(""),
            text(""),
        ]];
        scan_columns(&mut cache, Dialect::Postgres, &rows).unwrap();

        let col = cache.get_column("public", "t", "id").unwrap();
        assert_eq!(col.col_type, "INT");
        assert_eq!(col.identity, "GENERATED ALWAYS AS IDENTITY");
        assert!(col.not_null);
    }

    #[test]
    fn test_scan_sqlserver_default_normalization() {
        let mut cache = CatalogCache::new(Dialect::Sqlserver);
        let rows = vec![
            vec![
                text("dbo"),
                text("t"),
                text("created_at"),
                text("datetime2"),
                SqlValue::Int(1),
                text("((getdate()))"),
                SqlValue::Int(0),
                text(""),
                SqlValue::Int(0),
                SqlValue::Int(0),
                text(""),
                text(""),
                text(""),
            ],
            vec![
                text("dbo"),
                text("t"),
                text("retries"),
                text("int"),
                SqlValue::Int(1),
                text("((42))"),
                SqlValue::Int(0),
                text(""),
                SqlValue::Int(10),
                SqlValue::Int(0),
                text(""),
                text(""),
                text(""),
            ],
            vec![
                text("dbo"),
                text("t"),
                text("label"),
                text("nvarchar"),
                SqlValue::Int(0),
                text("((N'hi'))"),
                SqlValue::Int(0),
                text("50"),
                SqlValue::Int(0),
                SqlValue::Int(0),
                text(""),
                text(""),
                text(""),
            ],
        ];
        scan_columns(&mut cache, Dialect::Sqlserver, &rows).unwrap();

        assert_eq!(
            cache.get_column("dbo", "t", "created_at").unwrap().default_value,
            "CURRENT_TIMESTAMP"
        );
        assert_eq!(
            cache.get_column("dbo", "t", "retries").unwrap().default_value,
            "42"
        );
        let label = cache.get_column("dbo", "t", "label").unwrap();
        assert_eq!(label.default_value, "'hi'");
        assert_eq!(label.char_length, "50");
    }

    #[test]
    fn test_scan_postgres_index_split() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        let rows = vec![vec![
            text("public"),
            text("t"),
            text("t_idx"),
            SqlValue::Bool(false),
            text("btree"),
            SqlValue::Bool(true),
            text(r#"["a", "b", "c"]"#),
            SqlValue::Int(2),
            text("[false, true]"),
            text("[]"),
            text("a > 0"),
        ]];
        scan_indexes(&mut cache, Dialect::Postgres, &rows).unwrap();

        let idx = cache.get_index("public", "t", "t_idx").unwrap();
        assert_eq!(idx.columns, vec!["a", "b"]);
        assert_eq!(idx.include_columns, vec!["c"]);
        assert_eq!(idx.descending, vec![false, true]);
        assert_eq!(idx.index_type, "BTREE");
        assert_eq!(idx.predicate, "a > 0");
        assert!(idx.unique);
    }

    #[test]
    fn test_scan_sqlserver_index_include_bitmap() {
        let mut cache = CatalogCache::new(Dialect::Sqlserver);
        let rows = vec![vec![
            text("dbo"),
            text("t"),
            text("t_idx"),
            SqlValue::Int(0),
            text("NONCLUSTERED"),
            SqlValue::Bool(false),
            text("a,b,c"),
            text("0,0,1"),
            text("0,1,0"),
            text(""),
        ]];
        scan_indexes(&mut cache, Dialect::Sqlserver, &rows).unwrap();

        let idx = cache.get_index("dbo", "t", "t_idx").unwrap();
        assert_eq!(idx.columns, vec!["a", "b"]);
        assert_eq!(idx.include_columns, vec!["c"]);
        assert_eq!(idx.descending, vec![false, true]);
    }

    #[test]
    fn test_scan_mysql_trigger_attributes() {
        let mut cache = CatalogCache::new(Dialect::Mysql);
        let rows = vec![vec![
            text("shop"),
            text("orders"),
            text("orders_audit"),
            text("AFTER"),
            text("INSERT"),
            text("INSERT INTO audit VALUES (NEW.id)"),
        ]];
        scan_triggers(&mut cache, Dialect::Mysql, &rows).unwrap();

        let trg = cache.get_trigger("shop", "orders", "orders_audit").unwrap();
        assert_eq!(trg.attributes["action_timing"], "AFTER");
        assert_eq!(trg.attributes["event_manipulation"], "INSERT");
    }

    #[test]
    fn test_promote_single_column_constraints() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.get_or_create_column("public", "t", "id");
        cache.get_or_create_column("public", "t", "name");
        cache.get_or_create_column("public", "t", "parent_id");
        cache.add_or_update_constraint(ConstraintDef {
            kind: PRIMARY_KEY.to_string(),
            name: "t_pkey".to_string(),
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec!["id".to_string()],
            ..Default::default()
        });
        cache.add_or_update_constraint(ConstraintDef {
            kind: FOREIGN_KEY.to_string(),
            name: "t_parent_fkey".to_string(),
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec!["parent_id".to_string()],
            ref_schema: "public".to_string(),
            ref_table: "t".to_string(),
            ref_columns: vec!["id".to_string()],
            delete_rule: "CASCADE".to_string(),
            ..Default::default()
        });
        // Composite constraints are not promoted.
        cache.add_or_update_constraint(ConstraintDef {
            kind: UNIQUE.to_string(),
            name: "t_multi_key".to_string(),
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec!["id".to_string(), "name".to_string()],
            ..Default::default()
        });

        promote_single_column_constraints(&mut cache);

        let id = cache.get_column("public", "t", "id").unwrap();
        assert!(id.is_primary_key);
        assert!(id.not_null);
        assert!(!id.is_unique);

        let name = cache.get_column("public", "t", "name").unwrap();
        assert!(!name.is_primary_key);
        assert!(!name.not_null);

        let parent = cache.get_column("public", "t", "parent_id").unwrap();
        assert_eq!(parent.ref_table, "t");
        assert_eq!(parent.ref_column, "id");
        assert_eq!(parent.delete_rule, "CASCADE");
        assert!(!parent.is_primary_key);
    }
}
