//! Table definition for the Rill engine schema.

use super::column::Column;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::types::DataType;
use crate::value::{Value, MAX_SAFE_INTEGER};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// A table definition: named columns plus a declared primary key.
///
/// The primary key is an ordered tuple of column positions. Two rows whose
/// projections onto it are equal are the same logical entity.
#[derive(Clone, Debug)]
pub struct Table {
    /// Table name.
    name: String,
    /// Column definitions, in position order.
    columns: Vec<Column>,
    /// Primary key column positions, in key order.
    primary_key: Vec<usize>,
}

impl Table {
    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the columns.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the primary key column positions.
    #[inline]
    pub fn primary_key(&self) -> &[usize] {
        &self.primary_key
    }

    /// Gets a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Gets a column position by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Gets a column position by name, erroring if absent.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::column_not_found(&self.name, name))
    }

    /// Validates a row against this schema: arity, per-column types and
    /// nullability, primary key presence, and integer range.
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::ArityMismatch {
                table: self.name.clone(),
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(row.values()) {
            match value {
                Value::Null => {
                    if !column.is_nullable() {
                        return Err(Error::null_constraint(column.name()));
                    }
                }
                Value::Int(i) => {
                    if column.data_type() != DataType::Int {
                        return Err(Error::type_mismatch(column.name(), column.data_type()));
                    }
                    if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
                        return Err(Error::value_out_of_range(column.name(), *i));
                    }
                }
                other => {
                    // data_type() is Some for every non-null value.
                    if other.data_type() != Some(column.data_type()) {
                        return Err(Error::type_mismatch(column.name(), column.data_type()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builder for creating table definitions.
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    pk_columns: Vec<String>,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
            pk_columns: Vec::new(),
        })
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_schema("Name cannot be empty"));
        }
        let first = name.chars().next().unwrap();
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::invalid_schema(format!(
                "Name must start with letter or underscore: {}",
                name
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    /// Adds a column to the table.
    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if self.columns.iter().any(|c| c.name() == name) {
            return Err(Error::invalid_schema(format!(
                "Column already exists: {}",
                name
            )));
        }
        self.columns.push(Column::new(name, data_type));
        Ok(self)
    }

    /// Marks the named columns as nullable.
    pub fn nullable(mut self, columns: &[&str]) -> Self {
        for name in columns {
            if let Some(col) = self.columns.iter_mut().find(|c| c.name() == *name) {
                *col = col.clone().nullable(true);
            }
        }
        self
    }

    /// Declares the primary key, in key order.
    pub fn primary_key(mut self, columns: &[&str]) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::invalid_schema("Primary key cannot be empty"));
        }
        for name in columns {
            let column = self
                .columns
                .iter()
                .find(|c| c.name() == *name)
                .ok_or_else(|| {
                    Error::invalid_schema(format!("Column not found: {}", name))
                })?;
            if column.is_nullable() {
                return Err(Error::invalid_schema(format!(
                    "Primary key column cannot be nullable: {}",
                    name
                )));
            }
            if !column.data_type().is_orderable() {
                return Err(Error::invalid_schema(format!(
                    "Column is not orderable: {}",
                    name
                )));
            }
        }
        self.pk_columns = columns.iter().map(|s| String::from(*s)).collect();
        Ok(self)
    }

    /// Builds the table definition.
    pub fn build(self) -> Result<Table> {
        if self.pk_columns.is_empty() {
            return Err(Error::invalid_schema("Table requires a primary key"));
        }
        let columns: Vec<Column> = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_index(i))
            .collect();
        let primary_key = self
            .pk_columns
            .iter()
            .map(|name| {
                columns
                    .iter()
                    .position(|c| c.name() == name)
                    .expect("pk column checked in primary_key()")
            })
            .collect();
        Ok(Table {
            name: self.name,
            columns,
            primary_key,
        })
    }
}
