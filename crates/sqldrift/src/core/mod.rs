//! Core data model and shared abstractions.
//!
//! This module defines the catalog tree, its indexed cache, the
//! query-and-scan executor seam, identifier handling, keyword constants,
//! and the injected engine context.

pub mod cache;
pub mod catalog;
pub mod context;
pub mod executor;
pub mod identifier;
pub mod keywords;
