//! Error types for the Rill engine.

use crate::row::RowKey;
use crate::types::DataType;
use alloc::string::String;
use core::fmt;

/// Result type alias for Rill operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for engine operations.
///
/// The invariant-violation variants (`RowAlreadyExists`, `RowNotFound`,
/// `ConnectionNotFound`, `StartOutsideConstraint`) indicate a bug in the
/// component feeding the engine. They are surfaced to the caller of the
/// operation that detected them and are never retried or swallowed.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// An `add` for a primary key that is already present.
    RowAlreadyExists {
        table: String,
        key: RowKey,
    },
    /// A `remove` or the old half of an `edit` for a missing primary key.
    RowNotFound {
        table: String,
        key: RowKey,
    },
    /// A disconnect or push addressed a connection that does not exist.
    ConnectionNotFound,
    /// A fetch start row does not match the request's active constraint.
    StartOutsideConstraint,
    /// An integer value exceeds the exactly-representable numeric range.
    ValueOutOfRange {
        column: String,
        value: i64,
    },
    /// A row value does not match the declared column type.
    TypeMismatch {
        column: String,
        expected: DataType,
    },
    /// A null in a non-nullable column.
    NullConstraint {
        column: String,
    },
    /// A row's arity does not match the table schema.
    ArityMismatch {
        table: String,
        expected: usize,
        got: usize,
    },
    /// Column not found.
    ColumnNotFound {
        table: String,
        column: String,
    },
    /// Table not found.
    TableNotFound {
        name: String,
    },
    /// Invalid schema definition.
    InvalidSchema {
        message: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RowAlreadyExists { table, key } => {
                write!(f, "Row already exists in table {}: {:?}", table, key)
            }
            Error::RowNotFound { table, key } => {
                write!(f, "Row not found in table {}: {:?}", table, key)
            }
            Error::ConnectionNotFound => {
                write!(f, "Connection not found")
            }
            Error::StartOutsideConstraint => {
                write!(f, "Start row does not match the active constraint")
            }
            Error::ValueOutOfRange { column, value } => {
                write!(
                    f,
                    "Value out of representable range in column {}: {}",
                    column, value
                )
            }
            Error::TypeMismatch { column, expected } => {
                write!(f, "Type mismatch in column {}: expected {:?}", column, expected)
            }
            Error::NullConstraint { column } => {
                write!(f, "Null constraint violation on column: {}", column)
            }
            Error::ArityMismatch { table, expected, got } => {
                write!(
                    f,
                    "Row arity mismatch for table {}: expected {} values, got {}",
                    table, expected, got
                )
            }
            Error::ColumnNotFound { table, column } => {
                write!(f, "Column {} not found in table {}", column, table)
            }
            Error::TableNotFound { name } => {
                write!(f, "Table not found: {}", name)
            }
            Error::InvalidSchema { message } => {
                write!(f, "Invalid schema: {}", message)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates a row-already-exists error.
    pub fn row_already_exists(table: impl Into<String>, key: RowKey) -> Self {
        Error::RowAlreadyExists {
            table: table.into(),
            key,
        }
    }

    /// Creates a row-not-found error.
    pub fn row_not_found(table: impl Into<String>, key: RowKey) -> Self {
        Error::RowNotFound {
            table: table.into(),
            key,
        }
    }

    /// Creates a value-out-of-range error.
    pub fn value_out_of_range(column: impl Into<String>, value: i64) -> Self {
        Error::ValueOutOfRange {
            column: column.into(),
            value,
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(column: impl Into<String>, expected: DataType) -> Self {
        Error::TypeMismatch {
            column: column.into(),
            expected,
        }
    }

    /// Creates a null constraint error.
    pub fn null_constraint(column: impl Into<String>) -> Self {
        Error::NullConstraint {
            column: column.into(),
        }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn test_error_display() {
        let err = Error::row_already_exists("users", RowKey::new(vec![Value::Int(1)]));
        assert!(err.to_string().contains("already exists"));

        let err = Error::null_constraint("name");
        assert!(err.to_string().contains("name"));

        let err = Error::table_not_found("users");
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::value_out_of_range("id", 1 << 60);
        match err {
            Error::ValueOutOfRange { column, .. } => assert_eq!(column, "id"),
            _ => panic!("Wrong error type"),
        }
    }
}
