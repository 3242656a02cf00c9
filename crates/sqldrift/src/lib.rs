//! # sqldrift
//!
//! Multi-dialect schema migration core: compares a desired logical
//! schema against the live schema of a relational database and plans the
//! statements that transform one into the other, for SQLite, PostgreSQL,
//! MySQL, and SQL Server.
//!
//! The crate provides three tightly coupled subsystems:
//!
//! - **Catalog model & cache**: the dialect-aware in-memory schema tree
//!   with O(1) qualified-name lookup ([`CatalogCache`])
//! - **Introspector**: per-dialect readers that normalize a live
//!   database into the canonical catalog ([`Introspector`])
//! - **Subsetter**: a referentially consistent data-subsetting planner
//!   over the foreign-key graph ([`Subsetter`])
//!
//! Wire protocols stay outside the crate: everything talks to an
//! abstract query-and-scan facility ([`SqlExecutor`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqldrift::{introspect_catalog, Dialect, EngineContext, Filter};
//! use tokio_util::sync::CancellationToken;
//!
//! let ctx = EngineContext::new();
//! let cancel = CancellationToken::new();
//! let catalog = introspect_catalog(
//!     &executor,
//!     &ctx,
//!     Dialect::Postgres,
//!     Filter::default(),
//!     &cancel,
//! )
//! .await?;
//! println!("{}", catalog.to_json()?);
//! ```

pub mod core;
pub mod drivers;
pub mod error;
pub mod introspect;
pub mod subset;

// Re-exports for convenient access
pub use crate::core::cache::{write_catalog, CatalogCache};
pub use crate::core::keywords;
pub use crate::core::catalog::{
    Catalog, ColumnDef, ConstraintDef, Dialect, DomainDef, EnumDef, IndexDef, RoutineDef,
    SchemaDef, TableDef, TriggerDef, ViewDef,
};
pub use crate::core::context::EngineContext;
pub use crate::core::executor::{SqlExecutor, SqlRow, SqlValue};
pub use crate::drivers::{normalize_dsn, DriverInfo, DriverRegistry};
pub use crate::error::{DriftError, Result};
pub use crate::introspect::{introspect_catalog, Filter, Introspector, ObjectType};
pub use crate::subset::{SubsetMode, SubsetPlan, Subsetter};
