//! Rill IVM - incremental view maintenance for live queries.
//!
//! This crate implements the dataflow core that keeps query results
//! incrementally up to date as row-level changes arrive, without re-running
//! full queries:
//!
//! - `MemorySource`: the leaf node owning a table's sorted rows, serving
//!   `fetch` in any requested order and disseminating `push` changes with a
//!   transient overlay so reentrant reads stay consistent
//! - `Filter`, `Skip`, `Take`, `Join`: composable operators preserving the
//!   push/fetch contract
//! - `ArrayView`: the terminal consumer materializing a listener-observable
//!   snapshot via hydrate + push
//!
//! # The overlay protocol
//!
//! `push` notifies consumers one at a time, before the change is applied to
//! the source's indexes. A consumer that fetches from inside its push handler
//! must see the state *as it will be after this change*; the source records
//! the in-flight change as an overlay and splices it into fetch streams of
//! every consumer at or before the one currently being notified. The model is
//! strictly single-threaded and synchronous, which is what makes this safe
//! without any snapshotting.
//!
//! # Example
//!
//! ```rust
//! use rill_core::{DataType, Row, Value};
//! use rill_core::schema::TableBuilder;
//! use rill_ivm::{ArrayView, MemorySource, SourceChange};
//! use rill_index::SortSpec;
//!
//! let table = TableBuilder::new("users").unwrap()
//!     .add_column("id", DataType::Int).unwrap()
//!     .add_column("name", DataType::Text).unwrap()
//!     .primary_key(&["id"]).unwrap()
//!     .build().unwrap();
//! let source = MemorySource::new(table);
//! let conn = source.connect(SortSpec::ascending(&[0]), Vec::new());
//! let view = ArrayView::new(conn);
//! view.hydrate().unwrap();
//!
//! source
//!     .push(SourceChange::add(Row::new(vec![
//!         Value::Int(1),
//!         Value::Text("Alice".into()),
//!     ])))
//!     .unwrap();
//! assert_eq!(view.len(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod change;
pub mod filter;
pub mod join;
pub mod operator;
pub mod skip;
pub mod source;
pub mod take;
pub mod view;

pub use change::{Change, Node, Relationship, SourceChange};
pub use filter::Filter;
pub use join::{CorrelationPath, Join, JoinArgs, JoinKind};
pub use operator::{
    output_port, Basis, Constraint, FetchRequest, Input, NodeStream, Output, RelationshipSchema,
    RowPredicate, Schema, Start,
};
pub use skip::{Skip, SkipBound};
pub use source::{
    generate_with_overlay, overlays_for_constraint, overlays_for_start_at, MemorySource, Overlay,
    Overlays, SourceConnection,
};
pub use take::Take;
pub use view::{strip_hidden, ArrayView, Listener, ListenerId};
