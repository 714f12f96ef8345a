//! Schema definitions for the Rill engine.
//!
//! Tables declare their columns and primary key up front; the IVM layer
//! trusts validated rows and derives identity and orderings from the schema.

mod column;
mod table;

pub use column::Column;
pub use table::{Table, TableBuilder};
