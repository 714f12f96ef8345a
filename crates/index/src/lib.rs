//! Rill Index - ordering and sorted-index machinery for the Rill IVM engine.
//!
//! Everything the dataflow layer needs to keep rows in a requested order:
//!
//! - `Direction`, `OrderPart`, `SortSpec`: a declarative ordering over table
//!   columns, extended with the primary key to guarantee a strict total order.
//!   `SortSpec` is a value type usable as a map key, so a source can keep an
//!   arena of indexes keyed by the ordering they maintain.
//! - `RowComparator`: compares rows according to a `SortSpec`.
//! - `BoundValue`, `IndexKey`: sort keys with min/max sentinels so a scan can
//!   start at the first row of a constraint group even when a later sort part
//!   is descending.
//! - `SortedRowIndex`: an ordered row container with cursor-style probes
//!   (`first_at_or_after`, `first_after`, `next_lower`) instead of held
//!   iterators, so readers never pin the container across a callback.

#![no_std]

extern crate alloc;

mod compare;
mod key;
mod sort;
mod sorted;

pub use compare::RowComparator;
pub use key::{BoundValue, IndexKey, KeyPart};
pub use sort::{ColumnId, Direction, OrderPart, SortSpec};
pub use sorted::SortedRowIndex;
