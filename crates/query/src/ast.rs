//! The declarative query AST.
//!
//! A `Query` describes one (sub)query structurally; related subqueries nest
//! through boxed recursion. Column references are by name and resolved
//! against the table registry at build time.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use rill_core::{Row, Value};
use rill_index::Direction;
use rill_ivm::Basis;

/// Comparison operators for simple conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Evaluates the operator on two values, using the value domain's total
    /// order.
    pub fn eval(&self, left: &Value, right: &Value) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
        }
    }
}

/// A recursively-typed boolean condition tree.
#[derive(Clone, Debug)]
pub enum Condition {
    /// `field op value`
    Simple {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Every branch must hold.
    And(Vec<Condition>),
    /// Some branch must hold.
    Or(Vec<Condition>),
    /// A correlated subquery existence check: the row qualifies when the
    /// related subquery matches at least one row.
    Exists(Related),
}

impl Condition {
    /// Convenience constructor for a simple condition.
    pub fn simple(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Simple {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// The column equality correlating a subquery with its parent.
#[derive(Clone, Debug)]
pub struct Correlation {
    pub parent_field: String,
    pub child_field: String,
}

/// A related subquery: child rows correlated to each parent row.
#[derive(Clone, Debug)]
pub struct Related {
    pub correlation: Correlation,
    pub subquery: Box<Query>,
    /// Hidden relationships correlate but never surface in results
    /// (junction tables in many-to-many traversals).
    pub hidden: bool,
}

/// A query start position for pagination.
#[derive(Clone, Debug)]
pub struct QueryStart {
    pub row: Row,
    pub basis: Basis,
}

/// One (sub)query.
#[derive(Clone, Debug, Default)]
pub struct Query {
    pub table: String,
    /// Relationship name the results appear under when this is a subquery;
    /// defaults to the table name.
    pub alias: Option<String>,
    pub where_clause: Option<Condition>,
    pub related: Vec<Related>,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<usize>,
    pub start: Option<QueryStart>,
}

impl Query {
    /// A query over a table with everything else defaulted.
    pub fn table(name: impl Into<String>) -> Self {
        Query {
            table: name.into(),
            ..Query::default()
        }
    }

    /// The relationship name this subquery's results appear under.
    pub fn relationship_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}
