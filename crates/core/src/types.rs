//! Data type definitions for the Rill engine.
//!
//! This module defines the scalar column types a table schema can declare.

/// Supported column types.
///
/// The value domain is deliberately small: rows in a sync pipeline are
/// exchanged with peers that only understand JSON-style scalars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Bool,
    /// 64-bit signed integer, bounded to the exactly-representable range
    Int,
    /// 64-bit floating point number
    Float,
    /// UTF-8 string
    Text,
}

impl DataType {
    /// Returns whether this type can be used in a primary key or sort order.
    pub fn is_orderable(&self) -> bool {
        // All current scalar types order totally; kept as a seam for future
        // non-orderable types (blobs, json).
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_equality() {
        assert_eq!(DataType::Int, DataType::Int);
        assert_ne!(DataType::Int, DataType::Float);
    }

    #[test]
    fn test_orderable() {
        assert!(DataType::Bool.is_orderable());
        assert!(DataType::Text.is_orderable());
    }
}
