//! The operator contract: how dataflow nodes read from and notify each other.
//!
//! Every node in the graph is an `Input` (serves pull-based `fetch` reads)
//! and notifies a registered `Output` on every `push`. The whole graph is
//! single-threaded and synchronous: a consumer's push handler may fetch from
//! any upstream node before returning, and must observe the in-flight change
//! (see the overlay protocol in `source`).

use crate::change::{Change, Node};
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use rill_core::schema::Table;
use rill_core::{Result, Row, RowKey, Value};
use rill_index::{ColumnId, RowComparator, SortSpec};

/// An equality filter narrowing a fetch to rows matching one column value.
/// Indexed joins are implemented with constrained fetches.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub column: ColumnId,
    pub value: Value,
}

impl Constraint {
    /// Creates a constraint.
    pub fn new(column: ColumnId, value: Value) -> Self {
        Self { column, value }
    }

    /// Returns true if the row matches this constraint.
    pub fn matches(&self, row: &Row) -> bool {
        row.get(self.column).unwrap_or(&Value::Null) == &self.value
    }
}

/// Where a fetch begins relative to its start row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Basis {
    /// Begin at the row immediately preceding the start row.
    Before,
    /// Begin at the start row itself.
    At,
    /// Begin just past the start row.
    After,
}

/// A fetch start position.
#[derive(Clone, Debug, PartialEq)]
pub struct Start {
    pub row: Row,
    pub basis: Basis,
}

/// A pull request against a dataflow node. The result sequence uses the
/// connection's sort order and is lazily evaluated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchRequest {
    pub constraint: Option<Constraint>,
    pub start: Option<Start>,
}

impl FetchRequest {
    /// A request for everything, from the top.
    pub fn all() -> Self {
        Self::default()
    }

    /// A request for rows matching one column value.
    pub fn constrained(column: ColumnId, value: Value) -> Self {
        Self {
            constraint: Some(Constraint::new(column, value)),
            start: None,
        }
    }

    /// A request starting at the given row and basis.
    pub fn starting(row: Row, basis: Basis) -> Self {
        Self {
            constraint: None,
            start: Some(Start { row, basis }),
        }
    }
}

/// A predicate over rows, shared across connections and operators.
pub type RowPredicate = Rc<dyn Fn(&Row) -> bool>;

/// A lazily evaluated sequence of nodes.
pub type NodeStream<'a> = Box<dyn Iterator<Item = Node> + 'a>;

/// A relationship a join has declared on its output schema.
#[derive(Clone)]
pub struct RelationshipSchema {
    pub name: String,
    /// Hidden relationships participate in correlation and identity but are
    /// stripped from materialized snapshots (junction tables).
    pub hidden: bool,
    pub child: Rc<Schema>,
}

/// The shape of the nodes a dataflow node produces: the root table, the
/// output ordering, and any relationships joins have attached.
#[derive(Clone)]
pub struct Schema {
    table: Rc<Table>,
    sort: SortSpec,
    comparator: RowComparator,
    relationships: Vec<RelationshipSchema>,
}

impl Schema {
    /// Creates a schema for a source connection: a bare table ordered by
    /// `sort` (which must already include the primary key).
    pub fn new(table: Rc<Table>, sort: SortSpec) -> Self {
        let comparator = RowComparator::new(sort.clone());
        Self {
            table,
            sort,
            comparator,
            relationships: Vec::new(),
        }
    }

    /// Returns the root table.
    #[inline]
    pub fn table(&self) -> &Rc<Table> {
        &self.table
    }

    /// Returns the output ordering over root rows.
    #[inline]
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// Returns the comparator for the output ordering.
    #[inline]
    pub fn comparator(&self) -> &RowComparator {
        &self.comparator
    }

    /// Returns the declared relationships.
    #[inline]
    pub fn relationships(&self) -> &[RelationshipSchema] {
        &self.relationships
    }

    /// Looks up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipSchema> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Returns a schema with one more relationship declared.
    pub fn with_relationship(&self, name: &str, hidden: bool, child: Rc<Schema>) -> Schema {
        let mut relationships = self.relationships.clone();
        relationships.push(RelationshipSchema {
            name: String::from(name),
            hidden,
            child,
        });
        Schema {
            table: self.table.clone(),
            sort: self.sort.clone(),
            comparator: self.comparator.clone(),
            relationships,
        }
    }

    /// The identity of a node: the root row's primary key concatenated with
    /// the identity of every relationship node, in declaration order. For a
    /// join output this is the composite identity downstream views diff by;
    /// it exists only inside the pipeline and is never persisted.
    pub fn identity(&self, node: &Node) -> RowKey {
        let mut key = node.row.key(self.table.primary_key());
        for rel in &self.relationships {
            if let Some(r) = node.relationship(&rel.name) {
                for child in &r.nodes {
                    key.extend(&rel.child.identity(child));
                }
            }
        }
        key
    }

    /// Orders two nodes: by the root sort, with the composite identity as a
    /// tiebreak so join results sharing a root row still order totally.
    pub fn compare(&self, a: &Node, b: &Node) -> Ordering {
        let cmp = self.comparator.compare(&a.row, &b.row);
        if cmp != Ordering::Equal {
            return cmp;
        }
        self.identity(a).cmp(&self.identity(b))
    }
}

/// A dataflow node serving pull reads.
pub trait Input {
    /// The shape of the nodes this input produces.
    fn schema(&self) -> Rc<Schema>;

    /// Pulls a lazily evaluated, sorted node sequence. Invariant violations
    /// (unknown connection, start row outside the constraint) surface here,
    /// before the first element is produced.
    fn fetch(&self, req: FetchRequest) -> Result<NodeStream<'_>>;

    /// Like `fetch`, but releases any per-request operator state as the
    /// sequence is consumed. Used during teardown.
    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream<'_>>;

    /// Registers the consumer notified on every push.
    fn set_output(&self, output: Rc<dyn Output>);

    /// Tears this node down, cascading to its upstreams. Safe to call while
    /// a fetch sequence is suspended; the sequence must not be resumed
    /// afterward.
    fn destroy(&self) -> Result<()>;
}

/// A push consumer.
pub trait Output {
    /// Receives one change. Invariant failures propagate synchronously up
    /// the call stack that invoked the originating push.
    fn push(&self, change: Change) -> Result<()>;
}

/// An output edge delivering pushes to `target` through a weak reference.
///
/// Upstream nodes hold their outputs strongly while downstream nodes hold
/// their inputs strongly; routing the upstream edge through a weak target
/// keeps the two directions from forming a reference cycle.
struct OutputPort<T> {
    target: Weak<T>,
    deliver: fn(&T, Change) -> Result<()>,
}

impl<T> Output for OutputPort<T> {
    fn push(&self, change: Change) -> Result<()> {
        match self.target.upgrade() {
            Some(target) => (self.deliver)(&target, change),
            // The consumer was dropped without destroy(); nothing to notify.
            None => Ok(()),
        }
    }
}

/// Creates an output port for `target` delivering through `deliver`.
pub fn output_port<T: 'static>(
    target: &Rc<T>,
    deliver: fn(&T, Change) -> Result<()>,
) -> Rc<dyn Output> {
    Rc::new(OutputPort {
        target: Rc::downgrade(target),
        deliver,
    })
}

/// Collects push notifications; the test double for a downstream consumer.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use core::cell::RefCell;

    pub(crate) struct CatchOutput {
        pub changes: RefCell<Vec<Change>>,
    }

    impl CatchOutput {
        pub(crate) fn new() -> Rc<Self> {
            Rc::new(Self {
                changes: RefCell::new(Vec::new()),
            })
        }

        pub(crate) fn take(&self) -> Vec<Change> {
            self.changes.take()
        }
    }

    impl Output for CatchOutput {
        fn push(&self, change: Change) -> Result<()> {
            self.changes.borrow_mut().push(change);
            Ok(())
        }
    }
}
