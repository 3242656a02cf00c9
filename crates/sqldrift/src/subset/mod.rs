//! Referentially consistent data subsetting.
//!
//! Given seed queries selecting primary-key rows, the [`Subsetter`]
//! walks the catalog's foreign-key graph and emits, for every reachable
//! table, one self-contained SQL query selecting exactly the rows
//! transitively related to the seed set. Seed results are materialized
//! as literal-VALUES CTEs so the emitted queries run standalone.

pub mod literal;

use std::collections::{BTreeMap, VecDeque};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::cache::CatalogCache;
use crate::core::catalog::{Dialect, TableDef};
use crate::core::context::EngineContext;
use crate::core::executor::{SqlExecutor, SqlRow};
use crate::core::identifier::{qualify, quote_ident, validate_identifier};
use crate::error::{DriftError, Result};

use self::literal::{coerce, render_literal, type_class};

/// How far the subset reaches along the foreign-key graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetMode {
    /// Follow only outgoing foreign keys of the seed table and its
    /// reachable ancestors (bounded).
    Subset,
    /// Additionally widen outward through inbound foreign keys, pulling
    /// in dependent rows transitively.
    ExtendedSubset,
}

/// One emitted query per reachable table, keyed by qualified table name.
#[derive(Debug, Default)]
pub struct SubsetPlan {
    pub queries: BTreeMap<String, String>,
}

type TableKey = (String, String);

#[derive(Debug)]
struct ParsedSeed {
    schema: String,
    table: String,
    pk_columns: Vec<String>,
    sql: String,
}

#[derive(Debug)]
struct SeedResult {
    /// CTE name, `query1_` ... `queryN_`.
    name: String,
    schema: String,
    table: String,
    pk_columns: Vec<String>,
    rows: Vec<SqlRow>,
}

#[derive(Debug, Clone)]
struct FkEdge {
    from: TableKey,
    to: TableKey,
    columns: Vec<String>,
    ref_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hop {
    edge: usize,
    forward: bool,
}

/// A sequence of FK hops from a seed table to a target table. Each chain
/// becomes one UNION branch of the target's `pkey_` CTE.
#[derive(Debug, Clone, Default)]
struct Chain {
    hops: Vec<Hop>,
}

impl Chain {
    fn extended(&self, hop: Hop) -> Chain {
        let mut hops = self.hops.clone();
        hops.push(hop);
        Chain { hops }
    }

    fn uses_edge(&self, edge: usize) -> bool {
        self.hops.iter().any(|h| h.edge == edge)
    }

    /// Tables visited by this chain, seed first.
    fn tables(&self, seed: &TableKey, edges: &[FkEdge]) -> Vec<TableKey> {
        let mut tables = vec![seed.clone()];
        for hop in &self.hops {
            let e = &edges[hop.edge];
            tables.push(if hop.forward { e.to.clone() } else { e.from.clone() });
        }
        tables
    }
}

/// Plans foreign-key-respecting subset dumps.
pub struct Subsetter<'a, E: SqlExecutor + ?Sized> {
    db: &'a E,
    cache: &'a CatalogCache,
    ctx: &'a EngineContext,
}

impl<'a, E: SqlExecutor + ?Sized> Subsetter<'a, E> {
    pub fn new(db: &'a E, cache: &'a CatalogCache, ctx: &'a EngineContext) -> Self {
        Self { db, cache, ctx }
    }

    /// Execute the seed queries and emit one query per reachable table.
    pub async fn subset(
        &self,
        seeds: &[String],
        mode: SubsetMode,
        cancel: &CancellationToken,
    ) -> Result<SubsetPlan> {
        let dialect = self.cache.dialect();
        let mut results = Vec::with_capacity(seeds.len());
        for (i, raw) in seeds.iter().enumerate() {
            let parsed = self.parse_seed(raw)?;
            let rows = self.execute_seed(dialect, &parsed, cancel).await?;
            debug!(
                table = %format_key(&(parsed.schema.clone(), parsed.table.clone())),
                rows = rows.len(),
                "seed executed"
            );
            results.push(SeedResult {
                name: format!("query{}_", i + 1),
                schema: parsed.schema,
                table: parsed.table,
                pk_columns: parsed.pk_columns,
                rows,
            });
        }

        let edges = self.collect_fk_edges();
        let mut reachable: BTreeMap<TableKey, Vec<(usize, Chain)>> = BTreeMap::new();
        for (seed_idx, seed) in results.iter().enumerate() {
            let seed_key = (seed.schema.clone(), seed.table.clone());
            for (table, chains) in discover_chains(&edges, &seed_key, mode) {
                reachable
                    .entry(table)
                    .or_default()
                    .extend(chains.into_iter().map(|c| (seed_idx, c)));
            }
        }

        let mut plan = SubsetPlan::default();
        for (key, chains) in &reachable {
            let Some(table) = self.cache.get_table(&key.0, &key.1) else {
                continue;
            };
            let sql = self.emit_table_query(dialect, &results, table, chains, &edges)?;
            plan.queries.insert(format_key(key), sql);
        }

        info!(tables = plan.queries.len(), "subset planned");
        Ok(plan)
    }

    /// Parse a seed query's `{*}` and `{schema.table}` placeholders and
    /// rewrite it into a projection over the seed table's primary key.
    fn parse_seed(&self, raw: &str) -> Result<ParsedSeed> {
        let mut star_spans = Vec::new();
        let mut table_span: Option<(usize, usize, String)> = None;

        let bytes = raw.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'{' {
                i += 1;
                continue;
            }
            let Some(close) = raw[i + 1..].find('}').map(|o| i + 1 + o) else {
                return Err(DriftError::seed_syntax(raw, "unterminated '{'"));
            };
            let token = raw[i + 1..close].trim().to_string();
            if token == "*" {
                if !star_spans.is_empty() {
                    return Err(DriftError::seed_syntax(raw, "duplicate {*} placeholder"));
                }
                star_spans.push((i, close + 1));
            } else {
                if table_span.is_some() {
                    return Err(DriftError::seed_syntax(raw, "duplicate table placeholder"));
                }
                table_span = Some((i, close + 1, token));
            }
            i = close + 1;
        }

        if star_spans.is_empty() {
            return Err(DriftError::seed_syntax(raw, "missing {*} placeholder"));
        }
        let Some((tstart, tend, token)) = table_span else {
            return Err(DriftError::seed_syntax(raw, "missing {table} placeholder"));
        };

        let (schema, table) = match token.split_once('.') {
            Some((s, t)) => (s.to_string(), t.to_string()),
            None => (self.cache.catalog().current_schema.clone(), token),
        };
        if !schema.is_empty() {
            validate_identifier(&schema)?;
        }
        validate_identifier(&table)?;

        let pk = self
            .cache
            .get_primary_key(&schema, &table)
            .ok_or_else(|| DriftError::NoPrimaryKey(format_key(&(schema.clone(), table.clone()))))?;
        let pk_columns = pk.columns.clone();

        let dialect = self.cache.dialect();
        let qualified = qualify(dialect, &schema, &table);
        let projection = pk_columns
            .iter()
            .map(|c| format!("{}.{}", qualified, quote_ident(dialect, c)))
            .collect::<Vec<_>>()
            .join(", ");

        let (sstart, send) = star_spans[0];
        let mut sql = String::with_capacity(raw.len() + projection.len());
        let mut spans = [(sstart, send, projection), (tstart, tend, qualified)];
        spans.sort_by_key(|(start, _, _)| *start);
        let mut cursor = 0;
        for (start, end, replacement) in &spans {
            sql.push_str(&raw[cursor..*start]);
            sql.push_str(replacement);
            cursor = *end;
        }
        sql.push_str(&raw[cursor..]);

        Ok(ParsedSeed {
            schema,
            table,
            pk_columns,
            sql,
        })
    }

    async fn execute_seed(
        &self,
        dialect: Dialect,
        seed: &ParsedSeed,
        cancel: &CancellationToken,
    ) -> Result<Vec<SqlRow>> {
        let rows = self
            .db
            .query(&seed.sql, cancel)
            .await
            .map_err(|e| DriftError::seed(seed.sql.clone(), e.to_string()))?;

        // Scan into type-aware holders guided by the catalog column
        // types, so literal rendering round-trips.
        let classes: Vec<_> = seed
            .pk_columns
            .iter()
            .map(|c| {
                let col_type = self
                    .cache
                    .get_column(&seed.schema, &seed.table, c)
                    .map(|col| col.col_type.clone())
                    .unwrap_or_default();
                type_class(dialect, &col_type)
            })
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(i, v)| match classes.get(i) {
                        Some(&class) => coerce(v, class),
                        None => v,
                    })
                    .collect()
            })
            .collect())
    }

    fn collect_fk_edges(&self) -> Vec<FkEdge> {
        let mut edges = Vec::new();
        for schema in &self.cache.catalog().schemas {
            if schema.ignore {
                continue;
            }
            for table in &schema.tables {
                if table.ignore {
                    continue;
                }
                for fk in self.cache.get_foreign_keys(&schema.name, &table.name) {
                    if fk.columns.is_empty() || fk.columns.len() != fk.ref_columns.len() {
                        continue;
                    }
                    let to_schema = if fk.ref_schema.is_empty() {
                        schema.name.clone()
                    } else {
                        fk.ref_schema.clone()
                    };
                    edges.push(FkEdge {
                        from: (schema.name.clone(), table.name.clone()),
                        to: (to_schema, fk.ref_table.clone()),
                        columns: fk.columns.clone(),
                        ref_columns: fk.ref_columns.clone(),
                    });
                }
            }
        }
        edges
    }

    fn emit_table_query(
        &self,
        dialect: Dialect,
        seeds: &[SeedResult],
        table: &TableDef,
        chains: &[(usize, Chain)],
        edges: &[FkEdge],
    ) -> Result<String> {
        let key = (table.schema.clone(), table.name.clone());
        let pk = self
            .cache
            .get_primary_key(&table.schema, &table.name)
            .ok_or_else(|| DriftError::NoPrimaryKey(format_key(&key)))?;
        let pk_columns = pk.columns.clone();
        let qualified = qualify(dialect, &table.schema, &table.name);

        let mut ctes: Vec<String> = seeds
            .iter()
            .map(|seed| render_seed_cte(dialect, seed))
            .collect();

        let branches: Vec<String> = chains
            .iter()
            .map(|(seed_idx, chain)| {
                render_chain_branch(
                    dialect,
                    &seeds[*seed_idx],
                    chain,
                    edges,
                    &qualified,
                    &pk_columns,
                )
            })
            .collect();
        let pk_list = pk_columns
            .iter()
            .map(|c| quote_ident(dialect, c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut scratch = self.ctx.buffers.acquire();
        for (i, branch) in branches.iter().enumerate() {
            if i > 0 {
                scratch.push_str("\nUNION\n");
            }
            scratch.push_str(branch);
        }
        ctes.push(format!("pkey_ ({}) AS (\n{}\n)", pk_list, scratch.as_str()));
        self.ctx.buffers.release(scratch);

        let columns: Vec<String> = table
            .columns
            .iter()
            .filter(|c| !c.ignore && !c.is_generated)
            .map(|c| format!("{}.{}", qualified, quote_ident(dialect, &c.name)))
            .collect();
        let select_list = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };

        let join_cond = pk_columns
            .iter()
            .map(|c| {
                format!(
                    "{}.{} = pkey_.{}",
                    qualified,
                    quote_ident(dialect, c),
                    quote_ident(dialect, c)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        let order_by = pk_columns
            .iter()
            .map(|c| format!("{}.{}", qualified, quote_ident(dialect, c)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "WITH {}\nSELECT {}\nFROM {}\nJOIN pkey_ ON {}\nORDER BY {}",
            ctes.join(",\n"),
            select_list,
            qualified,
            join_cond,
            order_by
        ))
    }
}

/// Materialize one seed result as a literal-values CTE.
fn render_seed_cte(dialect: Dialect, seed: &SeedResult) -> String {
    let cols = seed
        .pk_columns
        .iter()
        .map(|c| quote_ident(dialect, c))
        .collect::<Vec<_>>()
        .join(", ");

    let body = if seed.rows.is_empty() {
        let nulls = vec!["NULL"; seed.pk_columns.len()].join(", ");
        match dialect {
            Dialect::Mysql => format!("SELECT {} FROM DUAL WHERE 1 = 0", nulls),
            _ => format!("SELECT {} WHERE 1 = 0", nulls),
        }
    } else {
        let rows_sql = seed
            .rows
            .iter()
            .map(|row| {
                let values = row
                    .iter()
                    .map(|v| render_literal(dialect, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                match dialect {
                    Dialect::Mysql => format!("ROW({})", values),
                    _ => format!("({})", values),
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        match dialect {
            Dialect::Sqlserver => {
                format!("SELECT * FROM (VALUES {}) AS t ({})", rows_sql, cols)
            }
            _ => format!("VALUES {}", rows_sql),
        }
    };

    format!("{} ({}) AS ({})", seed.name, cols, body)
}

/// One `SELECT DISTINCT <target pk> FROM <chain>` branch of the `pkey_`
/// CTE, joining through the seed CTE on the seed table's primary key.
fn render_chain_branch(
    dialect: Dialect,
    seed: &SeedResult,
    chain: &Chain,
    edges: &[FkEdge],
    target_qualified: &str,
    target_pk: &[String],
) -> String {
    let seed_qualified = qualify(dialect, &seed.schema, &seed.table);
    let seed_join = seed
        .pk_columns
        .iter()
        .map(|c| {
            format!(
                "{}.{} = {}.{}",
                seed_qualified,
                quote_ident(dialect, c),
                seed.name,
                quote_ident(dialect, c)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut from = format!("{} JOIN {} ON {}", seed.name, seed_qualified, seed_join);
    for hop in &chain.hops {
        let e = &edges[hop.edge];
        let next = if hop.forward { &e.to } else { &e.from };
        let next_qualified = qualify(dialect, &next.0, &next.1);
        let from_qualified = qualify(dialect, &e.from.0, &e.from.1);
        let to_qualified = qualify(dialect, &e.to.0, &e.to.1);
        let cond = e
            .columns
            .iter()
            .zip(&e.ref_columns)
            .map(|(c, rc)| {
                format!(
                    "{}.{} = {}.{}",
                    from_qualified,
                    quote_ident(dialect, c),
                    to_qualified,
                    quote_ident(dialect, rc)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        from.push_str(&format!(" JOIN {} ON {}", next_qualified, cond));
    }

    let pk_select = target_pk
        .iter()
        .map(|c| format!("{}.{}", target_qualified, quote_ident(dialect, c)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("SELECT DISTINCT {} FROM {}", pk_select, from)
}

/// Breadth-like expansion over the FK graph. A chain never visits a
/// table twice, and (in extended mode) never crosses the same FK
/// constraint twice, which breaks cycles.
fn discover_chains(
    edges: &[FkEdge],
    seed: &TableKey,
    mode: SubsetMode,
) -> BTreeMap<TableKey, Vec<Chain>> {
    let mut found: BTreeMap<TableKey, Vec<Chain>> = BTreeMap::new();
    found.entry(seed.clone()).or_default().push(Chain::default());

    let mut queue: VecDeque<(TableKey, Chain)> = VecDeque::new();
    queue.push_back((seed.clone(), Chain::default()));

    while let Some((at, chain)) = queue.pop_front() {
        let visited = chain.tables(seed, edges);
        for (ei, edge) in edges.iter().enumerate() {
            let mut steps: Vec<(TableKey, bool)> = Vec::new();
            if edge.from == at {
                steps.push((edge.to.clone(), true));
            }
            if mode == SubsetMode::ExtendedSubset && edge.to == at {
                steps.push((edge.from.clone(), false));
            }
            for (next, forward) in steps {
                if visited.contains(&next) || chain.uses_edge(ei) {
                    continue;
                }
                let extended = chain.extended(Hop { edge: ei, forward });
                found
                    .entry(next.clone())
                    .or_default()
                    .push(extended.clone());
                queue.push_back((next, extended));
            }
        }
    }

    found
}

fn format_key(key: &TableKey) -> String {
    if key.0.is_empty() {
        key.1.clone()
    } else {
        format!("{}.{}", key.0, key.1)
    }
}
