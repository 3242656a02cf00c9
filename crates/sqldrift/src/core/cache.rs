//! Indexed cache over a [`Catalog`].
//!
//! The cache owns the catalog and keeps side tables of maps from
//! qualified names to slice positions, giving O(1) lookup without
//! re-scanning the tree. All mutation flows through `&mut self` methods;
//! lookups resolve positions on every call, so there are no stale
//! references by construction (records are only ever appended or
//! soft-deleted, never removed, which keeps every stored position valid).
//!
//! Lookup semantics: records with `ignore = true` keep their slot but are
//! invisible to the `get_*` family. Anonymous constraints (SQLite allows
//! them) are never registered in the name map but still record their
//! PRIMARY KEY / FOREIGN KEY role in the side maps, so role-aware logic
//! must iterate the table's constraint slice rather than the map alone.

use std::collections::HashMap;

use crate::core::catalog::{
    Catalog, ColumnDef, ConstraintDef, Dialect, DomainDef, EnumDef, IndexDef, RoutineDef,
    SchemaDef, TableDef, TriggerDef, ViewDef,
};
use crate::core::keywords::{FOREIGN_KEY, PRIMARY_KEY};

type Key2 = (String, String);
type Key3 = (String, String, String);

/// Position of a table-or-view-owned object (index or trigger).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ObjSlot {
    schema: usize,
    owner: usize,
    pos: usize,
    on_view: bool,
}

/// O(1) qualified-name lookup and safe in-place mutation for a catalog.
#[derive(Debug, Default)]
pub struct CatalogCache {
    catalog: Catalog,
    schemas: HashMap<String, usize>,
    tables: HashMap<Key2, (usize, usize)>,
    views: HashMap<Key2, (usize, usize)>,
    enums: HashMap<Key2, (usize, usize)>,
    domains: HashMap<Key2, (usize, usize)>,
    routines: HashMap<Key3, (usize, usize)>,
    columns: HashMap<Key3, (usize, usize, usize)>,
    constraints: HashMap<Key3, (usize, usize, usize)>,
    indexes: HashMap<Key3, ObjSlot>,
    triggers: HashMap<Key3, ObjSlot>,
    /// Last-registered PRIMARY KEY constraint per table.
    primary_keys: HashMap<Key2, (usize, usize, usize)>,
    /// FOREIGN KEY constraints per table, in registration order.
    foreign_keys: HashMap<Key2, Vec<(usize, usize, usize)>>,
}

impl CatalogCache {
    /// Create a cache over an empty catalog for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            catalog: Catalog::new(dialect),
            ..Default::default()
        }
    }

    /// Build a cache over an existing catalog (e.g. one deserialized from
    /// JSON), registering every non-ignored record.
    pub fn from_catalog(catalog: Catalog) -> Self {
        let mut cache = Self {
            catalog,
            ..Default::default()
        };
        cache.rebuild();
        cache
    }

    /// The underlying catalog, read-only.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Mutable access to catalog-level scalar attributes (dialect tag,
    /// version, database name, collation, extensions). Structural
    /// mutation of the schema tree must go through the cache methods.
    pub fn catalog_scalars_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    /// Consume the cache, returning the catalog.
    pub fn into_catalog(self) -> Catalog {
        self.catalog
    }

    /// Dialect of the cached catalog.
    pub fn dialect(&self) -> Dialect {
        self.catalog.dialect
    }

    // ===== Schemas =====

    /// Look up a schema by name. Ignored schemas are absent.
    pub fn get_schema(&self, name: &str) -> Option<&SchemaDef> {
        let &i = self.schemas.get(name)?;
        let s = &self.catalog.schemas[i];
        if s.ignore {
            None
        } else {
            Some(s)
        }
    }

    /// Mutable variant of [`get_schema`](Self::get_schema).
    pub fn get_schema_mut(&mut self, name: &str) -> Option<&mut SchemaDef> {
        let &i = self.schemas.get(name)?;
        let s = &mut self.catalog.schemas[i];
        if s.ignore {
            None
        } else {
            Some(s)
        }
    }

    /// Return the schema, creating and registering it if absent.
    pub fn get_or_create_schema(&mut self, name: &str) -> &mut SchemaDef {
        let i = self.ensure_schema(name);
        &mut self.catalog.schemas[i]
    }

    fn ensure_schema(&mut self, name: &str) -> usize {
        if let Some(&i) = self.schemas.get(name) {
            if !self.catalog.schemas[i].ignore {
                return i;
            }
        }
        let i = self.catalog.schemas.len();
        self.catalog.schemas.push(SchemaDef {
            name: name.to_string(),
            ..Default::default()
        });
        self.schemas.insert(name.to_string(), i);
        i
    }

    // ===== Tables =====

    pub fn get_table(&self, schema: &str, name: &str) -> Option<&TableDef> {
        let &(s, t) = self.tables.get(&key2(schema, name))?;
        let table = &self.catalog.schemas[s].tables[t];
        if table.ignore {
            None
        } else {
            Some(table)
        }
    }

    pub fn get_table_mut(&mut self, schema: &str, name: &str) -> Option<&mut TableDef> {
        let &(s, t) = self.tables.get(&key2(schema, name))?;
        let table = &mut self.catalog.schemas[s].tables[t];
        if table.ignore {
            None
        } else {
            Some(table)
        }
    }

    pub fn get_or_create_table(&mut self, schema: &str, name: &str) -> &mut TableDef {
        let (s, t) = self.ensure_table(schema, name);
        &mut self.catalog.schemas[s].tables[t]
    }

    fn ensure_table(&mut self, schema: &str, name: &str) -> (usize, usize) {
        let key = key2(schema, name);
        if let Some(&(s, t)) = self.tables.get(&key) {
            if !self.catalog.schemas[s].tables[t].ignore {
                return (s, t);
            }
        }
        let s = self.ensure_schema(schema);
        let tables = &mut self.catalog.schemas[s].tables;
        let t = tables.len();
        tables.push(TableDef {
            schema: schema.to_string(),
            name: name.to_string(),
            ..Default::default()
        });
        self.tables.insert(key, (s, t));
        (s, t)
    }

    /// Replace the matching non-ignored table in place, or append.
    pub fn add_or_update_table(&mut self, table: TableDef) {
        let (s, t) = self.ensure_table(&table.schema, &table.name);
        self.catalog.schemas[s].tables[t] = table;
    }

    // ===== Views =====

    pub fn get_view(&self, schema: &str, name: &str) -> Option<&ViewDef> {
        let &(s, v) = self.views.get(&key2(schema, name))?;
        let view = &self.catalog.schemas[s].views[v];
        if view.ignore {
            None
        } else {
            Some(view)
        }
    }

    pub fn get_view_mut(&mut self, schema: &str, name: &str) -> Option<&mut ViewDef> {
        let &(s, v) = self.views.get(&key2(schema, name))?;
        let view = &mut self.catalog.schemas[s].views[v];
        if view.ignore {
            None
        } else {
            Some(view)
        }
    }

    pub fn get_or_create_view(&mut self, schema: &str, name: &str) -> &mut ViewDef {
        let (s, v) = self.ensure_view(schema, name);
        &mut self.catalog.schemas[s].views[v]
    }

    fn ensure_view(&mut self, schema: &str, name: &str) -> (usize, usize) {
        let key = key2(schema, name);
        if let Some(&(s, v)) = self.views.get(&key) {
            if !self.catalog.schemas[s].views[v].ignore {
                return (s, v);
            }
        }
        let s = self.ensure_schema(schema);
        let views = &mut self.catalog.schemas[s].views;
        let v = views.len();
        views.push(ViewDef {
            schema: schema.to_string(),
            name: name.to_string(),
            ..Default::default()
        });
        self.views.insert(key, (s, v));
        (s, v)
    }

    pub fn add_or_update_view(&mut self, view: ViewDef) {
        let (s, v) = self.ensure_view(&view.schema, &view.name);
        self.catalog.schemas[s].views[v] = view;
    }

    // ===== Enums =====

    pub fn get_enum(&self, schema: &str, name: &str) -> Option<&EnumDef> {
        let &(s, e) = self.enums.get(&key2(schema, name))?;
        let record = &self.catalog.schemas[s].enums[e];
        if record.ignore {
            None
        } else {
            Some(record)
        }
    }

    pub fn get_or_create_enum(&mut self, schema: &str, name: &str) -> &mut EnumDef {
        let (s, e) = self.ensure_enum(schema, name);
        &mut self.catalog.schemas[s].enums[e]
    }

    fn ensure_enum(&mut self, schema: &str, name: &str) -> (usize, usize) {
        let key = key2(schema, name);
        if let Some(&(s, e)) = self.enums.get(&key) {
            if !self.catalog.schemas[s].enums[e].ignore {
                return (s, e);
            }
        }
        let s = self.ensure_schema(schema);
        let enums = &mut self.catalog.schemas[s].enums;
        let e = enums.len();
        enums.push(EnumDef {
            schema: schema.to_string(),
            name: name.to_string(),
            ..Default::default()
        });
        self.enums.insert(key, (s, e));
        (s, e)
    }

    pub fn add_or_update_enum(&mut self, record: EnumDef) {
        let (s, e) = self.ensure_enum(&record.schema, &record.name);
        self.catalog.schemas[s].enums[e] = record;
    }

    // ===== Domains =====

    pub fn get_domain(&self, schema: &str, name: &str) -> Option<&DomainDef> {
        let &(s, d) = self.domains.get(&key2(schema, name))?;
        let record = &self.catalog.schemas[s].domains[d];
        if record.ignore {
            None
        } else {
            Some(record)
        }
    }

    pub fn get_or_create_domain(&mut self, schema: &str, name: &str) -> &mut DomainDef {
        let (s, d) = self.ensure_domain(schema, name);
        &mut self.catalog.schemas[s].domains[d]
    }

    fn ensure_domain(&mut self, schema: &str, name: &str) -> (usize, usize) {
        let key = key2(schema, name);
        if let Some(&(s, d)) = self.domains.get(&key) {
            if !self.catalog.schemas[s].domains[d].ignore {
                return (s, d);
            }
        }
        let s = self.ensure_schema(schema);
        let domains = &mut self.catalog.schemas[s].domains;
        let d = domains.len();
        domains.push(DomainDef {
            schema: schema.to_string(),
            name: name.to_string(),
            ..Default::default()
        });
        self.domains.insert(key, (s, d));
        (s, d)
    }

    pub fn add_or_update_domain(&mut self, record: DomainDef) {
        let (s, d) = self.ensure_domain(&record.schema, &record.name);
        self.catalog.schemas[s].domains[d] = record;
    }

    // ===== Routines =====

    /// Routine identity arguments only discriminate on Postgres; the key
    /// stores them as empty for every other dialect.
    fn routine_args(&self, identity_args: &str) -> String {
        if self.catalog.dialect == Dialect::Postgres {
            identity_args.to_string()
        } else {
            String::new()
        }
    }

    pub fn get_routine(
        &self,
        schema: &str,
        name: &str,
        identity_args: &str,
    ) -> Option<&RoutineDef> {
        let key = (
            schema.to_string(),
            name.to_string(),
            self.routine_args(identity_args),
        );
        let &(s, r) = self.routines.get(&key)?;
        let record = &self.catalog.schemas[s].routines[r];
        if record.ignore {
            None
        } else {
            Some(record)
        }
    }

    pub fn get_or_create_routine(
        &mut self,
        schema: &str,
        name: &str,
        identity_args: &str,
    ) -> &mut RoutineDef {
        let (s, r) = self.ensure_routine(schema, name, identity_args);
        &mut self.catalog.schemas[s].routines[r]
    }

    fn ensure_routine(&mut self, schema: &str, name: &str, identity_args: &str) -> (usize, usize) {
        let args = self.routine_args(identity_args);
        let key = (schema.to_string(), name.to_string(), args.clone());
        if let Some(&(s, r)) = self.routines.get(&key) {
            if !self.catalog.schemas[s].routines[r].ignore {
                return (s, r);
            }
        }
        let s = self.ensure_schema(schema);
        let routines = &mut self.catalog.schemas[s].routines;
        let r = routines.len();
        routines.push(RoutineDef {
            schema: schema.to_string(),
            name: name.to_string(),
            identity_args: args,
            ..Default::default()
        });
        self.routines.insert(key, (s, r));
        (s, r)
    }

    pub fn add_or_update_routine(&mut self, mut record: RoutineDef) {
        record.identity_args = self.routine_args(&record.identity_args);
        let args = record.identity_args.clone();
        let (s, r) = self.ensure_routine(&record.schema, &record.name, &args);
        self.catalog.schemas[s].routines[r] = record;
    }

    // ===== Columns =====

    pub fn get_column(&self, schema: &str, table: &str, name: &str) -> Option<&ColumnDef> {
        let &(s, t, c) = self.columns.get(&key3(schema, table, name))?;
        let col = &self.catalog.schemas[s].tables[t].columns[c];
        if col.ignore {
            None
        } else {
            Some(col)
        }
    }

    pub fn get_column_mut(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
    ) -> Option<&mut ColumnDef> {
        let &(s, t, c) = self.columns.get(&key3(schema, table, name))?;
        let col = &mut self.catalog.schemas[s].tables[t].columns[c];
        if col.ignore {
            None
        } else {
            Some(col)
        }
    }

    /// Return the column, creating it (with its owner fields populated)
    /// if absent.
    pub fn get_or_create_column(&mut self, schema: &str, table: &str, name: &str) -> &mut ColumnDef {
        let (s, t, c) = self.ensure_column(schema, table, name);
        &mut self.catalog.schemas[s].tables[t].columns[c]
    }

    fn ensure_column(&mut self, schema: &str, table: &str, name: &str) -> (usize, usize, usize) {
        let key = key3(schema, table, name);
        if let Some(&(s, t, c)) = self.columns.get(&key) {
            if !self.catalog.schemas[s].tables[t].columns[c].ignore {
                return (s, t, c);
            }
        }
        let (s, t) = self.ensure_table(schema, table);
        let cols = &mut self.catalog.schemas[s].tables[t].columns;
        let c = cols.len();
        cols.push(ColumnDef {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            ..Default::default()
        });
        self.columns.insert(key, (s, t, c));
        (s, t, c)
    }

    pub fn add_or_update_column(&mut self, col: ColumnDef) {
        let (s, t, c) = self.ensure_column(&col.schema, &col.table, &col.name);
        self.catalog.schemas[s].tables[t].columns[c] = col;
    }

    // ===== Constraints =====

    pub fn get_constraint(&self, schema: &str, table: &str, name: &str) -> Option<&ConstraintDef> {
        let &(s, t, c) = self.constraints.get(&key3(schema, table, name))?;
        let record = &self.catalog.schemas[s].tables[t].constraints[c];
        if record.ignore {
            None
        } else {
            Some(record)
        }
    }

    /// Insert or replace a constraint and register its PRIMARY KEY /
    /// FOREIGN KEY role. Anonymous constraints (empty name) are always
    /// appended and never registered in the name map, but their role is
    /// still recorded in the side maps.
    pub fn add_or_update_constraint(&mut self, record: ConstraintDef) {
        let tkey = key2(&record.schema, &record.table);
        let key = key3(&record.schema, &record.table, &record.name);
        let named = !record.name.is_empty();

        let slot = if named {
            match self.constraints.get(&key) {
                Some(&(s, t, c))
                    if !self.catalog.schemas[s].tables[t].constraints[c].ignore =>
                {
                    (s, t, c)
                }
                _ => {
                    let (s, t) = self.ensure_table(&record.schema, &record.table);
                    let list = &mut self.catalog.schemas[s].tables[t].constraints;
                    let c = list.len();
                    list.push(ConstraintDef::default());
                    self.constraints.insert(key, (s, t, c));
                    (s, t, c)
                }
            }
        } else {
            let (s, t) = self.ensure_table(&record.schema, &record.table);
            let list = &mut self.catalog.schemas[s].tables[t].constraints;
            let c = list.len();
            list.push(ConstraintDef::default());
            (s, t, c)
        };

        self.register_constraint_role(&tkey, slot, &record.kind);
        let (s, t, c) = slot;
        self.catalog.schemas[s].tables[t].constraints[c] = record;
    }

    fn register_constraint_role(&mut self, tkey: &Key2, slot: (usize, usize, usize), kind: &str) {
        if kind == PRIMARY_KEY {
            self.primary_keys.insert(tkey.clone(), slot);
        } else if kind == FOREIGN_KEY {
            let list = self.foreign_keys.entry(tkey.clone()).or_default();
            if !list.contains(&slot) {
                list.push(slot);
            }
        }
    }

    /// The last PRIMARY KEY constraint registered on a table.
    pub fn get_primary_key(&self, schema: &str, table: &str) -> Option<&ConstraintDef> {
        let &(s, t, c) = self.primary_keys.get(&key2(schema, table))?;
        let record = &self.catalog.schemas[s].tables[t].constraints[c];
        if record.ignore {
            None
        } else {
            Some(record)
        }
    }

    /// All FOREIGN KEY constraints on a table in registration order,
    /// excluding ignored ones.
    pub fn get_foreign_keys(&self, schema: &str, table: &str) -> Vec<&ConstraintDef> {
        match self.foreign_keys.get(&key2(schema, table)) {
            Some(slots) => slots
                .iter()
                .map(|&(s, t, c)| &self.catalog.schemas[s].tables[t].constraints[c])
                .filter(|r| !r.ignore)
                .collect(),
            None => Vec::new(),
        }
    }

    // ===== Indexes =====

    pub fn get_index(&self, schema: &str, owner: &str, name: &str) -> Option<&IndexDef> {
        let slot = self.indexes.get(&key3(schema, owner, name))?;
        let record = self.resolve_index(slot);
        if record.ignore {
            None
        } else {
            Some(record)
        }
    }

    fn resolve_index(&self, slot: &ObjSlot) -> &IndexDef {
        let schema = &self.catalog.schemas[slot.schema];
        if slot.on_view {
            &schema.views[slot.owner].indexes[slot.pos]
        } else {
            &schema.tables[slot.owner].indexes[slot.pos]
        }
    }

    /// Insert or replace an index, dispatching to the owning table or
    /// view by its `is_view_index` flag.
    pub fn add_or_update_index(&mut self, record: IndexDef) {
        let key = key3(&record.schema, &record.table, &record.name);
        if let Some(slot) = self.indexes.get(&key).copied() {
            if slot.on_view == record.is_view_index && !self.resolve_index(&slot).ignore {
                let schema = &mut self.catalog.schemas[slot.schema];
                if slot.on_view {
                    schema.views[slot.owner].indexes[slot.pos] = record;
                } else {
                    schema.tables[slot.owner].indexes[slot.pos] = record;
                }
                return;
            }
        }
        let slot = if record.is_view_index {
            let (s, v) = self.ensure_view(&record.schema, &record.table);
            let list = &mut self.catalog.schemas[s].views[v].indexes;
            let pos = list.len();
            list.push(record);
            ObjSlot {
                schema: s,
                owner: v,
                pos,
                on_view: true,
            }
        } else {
            let (s, t) = self.ensure_table(&record.schema, &record.table);
            let list = &mut self.catalog.schemas[s].tables[t].indexes;
            let pos = list.len();
            list.push(record);
            ObjSlot {
                schema: s,
                owner: t,
                pos,
                on_view: false,
            }
        };
        self.indexes.insert(key, slot);
    }

    // ===== Triggers =====

    pub fn get_trigger(&self, schema: &str, owner: &str, name: &str) -> Option<&TriggerDef> {
        let slot = self.triggers.get(&key3(schema, owner, name))?;
        let record = self.resolve_trigger(slot);
        if record.ignore {
            None
        } else {
            Some(record)
        }
    }

    fn resolve_trigger(&self, slot: &ObjSlot) -> &TriggerDef {
        let schema = &self.catalog.schemas[slot.schema];
        if slot.on_view {
            &schema.views[slot.owner].triggers[slot.pos]
        } else {
            &schema.tables[slot.owner].triggers[slot.pos]
        }
    }

    /// Insert or replace a trigger, dispatching to the owning table or
    /// view by its `is_view_trigger` flag.
    pub fn add_or_update_trigger(&mut self, record: TriggerDef) {
        let key = key3(&record.schema, &record.table, &record.name);
        if let Some(slot) = self.triggers.get(&key).copied() {
            if slot.on_view == record.is_view_trigger && !self.resolve_trigger(&slot).ignore {
                let schema = &mut self.catalog.schemas[slot.schema];
                if slot.on_view {
                    schema.views[slot.owner].triggers[slot.pos] = record;
                } else {
                    schema.tables[slot.owner].triggers[slot.pos] = record;
                }
                return;
            }
        }
        let slot = if record.is_view_trigger {
            let (s, v) = self.ensure_view(&record.schema, &record.table);
            let list = &mut self.catalog.schemas[s].views[v].triggers;
            let pos = list.len();
            list.push(record);
            ObjSlot {
                schema: s,
                owner: v,
                pos,
                on_view: true,
            }
        } else {
            let (s, t) = self.ensure_table(&record.schema, &record.table);
            let list = &mut self.catalog.schemas[s].tables[t].triggers;
            let pos = list.len();
            list.push(record);
            ObjSlot {
                schema: s,
                owner: t,
                pos,
                on_view: false,
            }
        };
        self.triggers.insert(key, slot);
    }

    // ===== Rebuild =====

    /// Re-register every record from the owned catalog. Later non-ignored
    /// records win name-map slots; PRIMARY KEY / FOREIGN KEY roles are
    /// recorded for named and anonymous constraints alike.
    fn rebuild(&mut self) {
        self.schemas.clear();
        self.tables.clear();
        self.views.clear();
        self.enums.clear();
        self.domains.clear();
        self.routines.clear();
        self.columns.clear();
        self.constraints.clear();
        self.indexes.clear();
        self.triggers.clear();
        self.primary_keys.clear();
        self.foreign_keys.clear();

        for (si, schema) in self.catalog.schemas.iter().enumerate() {
            if !schema.ignore {
                self.schemas.insert(schema.name.clone(), si);
            }
            for (ti, table) in schema.tables.iter().enumerate() {
                if !table.ignore {
                    self.tables.insert(key2(&schema.name, &table.name), (si, ti));
                }
                let tkey = key2(&schema.name, &table.name);
                for (ci, col) in table.columns.iter().enumerate() {
                    if !col.ignore {
                        self.columns
                            .insert(key3(&schema.name, &table.name, &col.name), (si, ti, ci));
                    }
                }
                for (ki, k) in table.constraints.iter().enumerate() {
                    if !k.name.is_empty() && !k.ignore {
                        self.constraints
                            .insert(key3(&schema.name, &table.name, &k.name), (si, ti, ki));
                    }
                    if k.kind == PRIMARY_KEY {
                        self.primary_keys.insert(tkey.clone(), (si, ti, ki));
                    } else if k.kind == FOREIGN_KEY {
                        self.foreign_keys
                            .entry(tkey.clone())
                            .or_default()
                            .push((si, ti, ki));
                    }
                }
                for (ii, idx) in table.indexes.iter().enumerate() {
                    if !idx.ignore {
                        self.indexes.insert(
                            key3(&schema.name, &table.name, &idx.name),
                            ObjSlot {
                                schema: si,
                                owner: ti,
                                pos: ii,
                                on_view: false,
                            },
                        );
                    }
                }
                for (gi, trg) in table.triggers.iter().enumerate() {
                    if !trg.ignore {
                        self.triggers.insert(
                            key3(&schema.name, &table.name, &trg.name),
                            ObjSlot {
                                schema: si,
                                owner: ti,
                                pos: gi,
                                on_view: false,
                            },
                        );
                    }
                }
            }
            for (vi, view) in schema.views.iter().enumerate() {
                if !view.ignore {
                    self.views.insert(key2(&schema.name, &view.name), (si, vi));
                }
                for (ii, idx) in view.indexes.iter().enumerate() {
                    if !idx.ignore {
                        self.indexes.insert(
                            key3(&schema.name, &view.name, &idx.name),
                            ObjSlot {
                                schema: si,
                                owner: vi,
                                pos: ii,
                                on_view: true,
                            },
                        );
                    }
                }
                for (gi, trg) in view.triggers.iter().enumerate() {
                    if !trg.ignore {
                        self.triggers.insert(
                            key3(&schema.name, &view.name, &trg.name),
                            ObjSlot {
                                schema: si,
                                owner: vi,
                                pos: gi,
                                on_view: true,
                            },
                        );
                    }
                }
            }
            for (ei, record) in schema.enums.iter().enumerate() {
                if !record.ignore {
                    self.enums.insert(key2(&schema.name, &record.name), (si, ei));
                }
            }
            for (di, record) in schema.domains.iter().enumerate() {
                if !record.ignore {
                    self.domains
                        .insert(key2(&schema.name, &record.name), (si, di));
                }
            }
            for (ri, record) in schema.routines.iter().enumerate() {
                if !record.ignore {
                    self.routines.insert(
                        (
                            schema.name.clone(),
                            record.name.clone(),
                            record.identity_args.clone(),
                        ),
                        (si, ri),
                    );
                }
            }
        }
    }
}

/// Deep-copy `src` into the destination cache. The destination ends up
/// structurally equal to the source (including validity bits and ignored
/// records) and shares no mutable state with it.
pub fn write_catalog(src: &Catalog, dst: &mut CatalogCache) {
    dst.catalog = src.clone();
    dst.rebuild();
}

fn key2(a: &str, b: &str) -> Key2 {
    (a.to_string(), b.to_string())
}

fn key3(a: &str, b: &str, c: &str) -> Key3 {
    (a.to_string(), b.to_string(), c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keywords::{CHECK, FOREIGN_KEY, PRIMARY_KEY, UNIQUE};
    use pretty_assertions::assert_eq;

    fn pk(schema: &str, table: &str, name: &str, cols: &[&str]) -> ConstraintDef {
        ConstraintDef {
            kind: PRIMARY_KEY.to_string(),
            name: name.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            columns: cols.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    fn fk(schema: &str, table: &str, name: &str, cols: &[&str], ref_table: &str) -> ConstraintDef {
        ConstraintDef {
            kind: FOREIGN_KEY.to_string(),
            name: name.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            columns: cols.iter().map(|c| c.to_string()).collect(),
            ref_schema: schema.to_string(),
            ref_table: ref_table.to_string(),
            ref_columns: vec!["id".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_two_schema_add() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.get_or_create_schema("public");
        cache.get_or_create_schema("audit");

        let audit = cache.get_schema("audit").unwrap();
        assert_eq!(audit.name, "audit");
        assert_eq!(cache.catalog().schemas.len(), 2);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.get_or_create_table("public", "users").comment = "people".to_string();
        cache.get_or_create_table("public", "users");

        assert_eq!(cache.catalog().schemas[0].tables.len(), 1);
        assert_eq!(cache.get_table("public", "users").unwrap().comment, "people");
    }

    #[test]
    fn test_add_or_update_replaces_in_place() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.get_or_create_table("public", "users");

        let before = cache.catalog().schemas[0].tables.len();
        cache.add_or_update_table(TableDef {
            schema: "public".to_string(),
            name: "users".to_string(),
            comment: "replaced".to_string(),
            ..Default::default()
        });
        assert_eq!(cache.catalog().schemas[0].tables.len(), before);
        assert_eq!(cache.get_table("public", "users").unwrap().comment, "replaced");
    }

    #[test]
    fn test_add_or_update_appends_when_absent() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.add_or_update_table(TableDef {
            schema: "public".to_string(),
            name: "orders".to_string(),
            ..Default::default()
        });
        assert_eq!(cache.catalog().schemas[0].tables.len(), 1);
        assert!(cache.get_table("public", "orders").is_some());
    }

    #[test]
    fn test_ignored_records_are_invisible_but_keep_slots() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.get_or_create_table("public", "users").ignore = true;

        assert!(cache.get_table("public", "users").is_none());
        assert_eq!(cache.catalog().schemas[0].tables.len(), 1);

        // GetOrCreate over an ignored record appends a fresh one.
        cache.get_or_create_table("public", "users");
        assert_eq!(cache.catalog().schemas[0].tables.len(), 2);
        assert!(cache.get_table("public", "users").is_some());
    }

    #[test]
    fn test_primary_key_last_registered_wins() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.add_or_update_constraint(pk("public", "t", "t_pkey", &["a"]));
        cache.add_or_update_constraint(pk("public", "t", "t_pkey2", &["b"]));

        let got = cache.get_primary_key("public", "t").unwrap();
        assert_eq!(got.name, "t_pkey2");
        assert_eq!(got.columns, vec!["b".to_string()]);
    }

    #[test]
    fn test_foreign_keys_in_registration_order() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.add_or_update_constraint(fk("public", "t", "fk_a", &["a"], "other"));
        cache.add_or_update_constraint(fk("public", "t", "fk_b", &["b"], "other"));

        let fks = cache.get_foreign_keys("public", "t");
        assert_eq!(fks.len(), 2);
        assert_eq!(fks[0].name, "fk_a");
        assert_eq!(fks[1].name, "fk_b");
    }

    #[test]
    fn test_anonymous_constraints_register_roles_only() {
        let mut cache = CatalogCache::new(Dialect::Sqlite);
        cache.add_or_update_constraint(pk("", "t", "", &["id"]));
        cache.add_or_update_constraint(fk("", "t", "", &["parent_id"], "t"));
        cache.add_or_update_constraint(fk("", "t", "", &["owner_id"], "u"));

        // Not in the name map.
        assert!(cache.get_constraint("", "t", "").is_none());

        // But roles are recorded.
        assert!(cache.get_primary_key("", "t").is_some());
        assert_eq!(cache.get_foreign_keys("", "t").len(), 2);
        // Each anonymous add appended a new slot.
        assert_eq!(
            cache.catalog().schemas[0].tables[0].constraints.len(),
            3
        );
    }

    #[test]
    fn test_ignored_fk_excluded_from_getter() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.add_or_update_constraint(fk("public", "t", "fk_a", &["a"], "other"));
        let mut dead = fk("public", "t", "fk_b", &["b"], "other");
        dead.ignore = true;
        cache.add_or_update_constraint(dead);

        let fks = cache.get_foreign_keys("public", "t");
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].name, "fk_a");
    }

    #[test]
    fn test_view_index_dispatch() {
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.add_or_update_index(IndexDef {
            schema: "public".to_string(),
            table: "mv_sales".to_string(),
            name: "mv_sales_idx".to_string(),
            is_view_index: true,
            columns: vec!["day".to_string()],
            ..Default::default()
        });

        assert!(cache.get_index("public", "mv_sales", "mv_sales_idx").is_some());
        let view = cache.get_view("public", "mv_sales").unwrap();
        assert_eq!(view.indexes.len(), 1);
        assert!(cache.get_table("public", "mv_sales").is_none());
    }

    #[test]
    fn test_routine_identity_args_forced_empty_off_postgres() {
        let mut cache = CatalogCache::new(Dialect::Mysql);
        cache.get_or_create_routine("shop", "order_total", "int, int");
        let r = cache.get_routine("shop", "order_total", "ignored").unwrap();
        assert_eq!(r.identity_args, "");

        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.get_or_create_routine("public", "order_total", "int, int");
        assert!(cache.get_routine("public", "order_total", "").is_none());
        assert!(cache
            .get_routine("public", "order_total", "int, int")
            .is_some());
    }

    #[test]
    fn test_column_owner_fields_set_eagerly() {
        let mut cache = CatalogCache::new(Dialect::Sqlite);
        let col = cache.get_or_create_column("", "t", "id");
        assert_eq!(col.table, "t");
        assert_eq!(col.name, "id");
    }

    #[test]
    fn test_single_column_promotion_sources() {
        // The cache records what the introspector post-pass reads.
        let mut cache = CatalogCache::new(Dialect::Postgres);
        cache.add_or_update_constraint(pk("public", "t", "t_pkey", &["id"]));
        cache.add_or_update_constraint(ConstraintDef {
            kind: UNIQUE.to_string(),
            name: "t_name_key".to_string(),
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec!["name".to_string()],
            ..Default::default()
        });
        cache.add_or_update_constraint(ConstraintDef {
            kind: CHECK.to_string(),
            name: "t_check".to_string(),
            schema: "public".to_string(),
            table: "t".to_string(),
            check_expr: "id > 0".to_string(),
            ..Default::default()
        });

        assert_eq!(cache.get_primary_key("public", "t").unwrap().name, "t_pkey");
        assert!(cache.get_foreign_keys("public", "t").is_empty());
        assert!(cache.get_constraint("public", "t", "t_check").is_some());
    }

    #[test]
    fn test_write_catalog_deep_copy() {
        let mut src_cache = CatalogCache::new(Dialect::Postgres);
        src_cache.get_or_create_schema("public").tables_valid = true;
        cacheify(&mut src_cache);
        let src = src_cache.into_catalog();

        let mut dst = CatalogCache::new(Dialect::Postgres);
        write_catalog(&src, &mut dst);

        assert_eq!(dst.catalog(), &src);
        // The copy is index-consistent on its own.
        assert!(dst.get_table("public", "users").is_some());
        assert_eq!(dst.get_primary_key("public", "users").unwrap().name, "users_pkey");

        // Mutating the copy leaves the source untouched.
        dst.get_table_mut("public", "users").unwrap().comment = "changed".to_string();
        assert_eq!(src.schemas[0].tables[0].comment, "");
    }

    fn cacheify(cache: &mut CatalogCache) {
        cache.get_or_create_table("public", "users");
        cache.get_or_create_column("public", "users", "id").col_type = "INT".to_string();
        cache.add_or_update_constraint(pk("public", "users", "users_pkey", &["id"]));
    }

    #[test]
    fn test_from_catalog_registers_existing_records() {
        let mut seed = CatalogCache::new(Dialect::Postgres);
        seed.get_or_create_table("public", "users");
        seed.add_or_update_constraint(pk("public", "users", "users_pkey", &["id"]));
        let catalog = seed.into_catalog();

        let cache = CatalogCache::from_catalog(catalog);
        assert!(cache.get_table("public", "users").is_some());
        assert!(cache.get_primary_key("public", "users").is_some());
    }
}
