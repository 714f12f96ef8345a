//! Rill Core - Core types and schema definitions for the Rill IVM engine.
//!
//! This crate provides the foundational types shared by every layer of the
//! dataflow engine:
//!
//! - `DataType`: Supported column types (Bool, Int, Float, Text)
//! - `Value`: Runtime scalar values stored in rows
//! - `Row`: A positional tuple of values matching a table schema
//! - `RowKey`: The primary-key projection of a row, used as row identity
//! - `schema`: Schema definitions (Column, Table, TableBuilder)
//! - `Error`: Error types for engine operations
//!
//! # Example
//!
//! ```rust
//! use rill_core::{DataType, Value, Row};
//! use rill_core::schema::TableBuilder;
//!
//! let table = TableBuilder::new("users")
//!     .unwrap()
//!     .add_column("id", DataType::Int)
//!     .unwrap()
//!     .add_column("name", DataType::Text)
//!     .unwrap()
//!     .primary_key(&["id"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let row = Row::new(vec![Value::Int(1), Value::Text("Alice".into())]);
//! assert!(table.validate_row(&row).is_ok());
//! assert_eq!(row.key(table.primary_key()).values(), &[Value::Int(1)]);
//! ```

#![no_std]

extern crate alloc;

mod error;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use row::{Row, RowKey};
pub use types::DataType;
pub use value::{Value, MAX_SAFE_INTEGER};
