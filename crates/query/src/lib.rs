//! Rill Query - declarative query AST and pipeline compilation.
//!
//! This crate turns the structural description of a query — table, where
//! tree, related subqueries, order, limit, start — into a live tree of
//! sources and operators from `rill-ivm`. The AST is the interchange format
//! a typed query-builder API or a sync protocol would target; nothing here
//! depends on how the description was produced.
//!
//! - `ast`: `Query`, `Condition`, `Related` (boxed recursive tree)
//! - `filter`: condition → row predicate compilation, and the pushdown split
//!   deciding which conjuncts ride on the source connection
//! - `builder`: `SourceSet` registry and `build()`, producing the pipeline
//!   root an `ArrayView` attaches to

#![no_std]

extern crate alloc;

pub mod ast;
pub mod builder;
pub mod filter;

pub use ast::{CompareOp, Condition, Correlation, Query, QueryStart, Related};
pub use builder::{build, SourceProvider, SourceSet};
pub use filter::{compile_predicate, pushdown_split};
