//! Change and node types flowing through the dataflow graph.
//!
//! A `SourceChange` is the row-level mutation handed to a source by an
//! external mutator. A `Change` is what propagates through the operator
//! graph: the same mutation wrapped in a `Node`, which carries the row plus
//! any relationships a join has attached to it.

use alloc::string::String;
use alloc::vec::Vec;
use rill_core::Row;

/// A row-level mutation to a source's table.
///
/// `Edit` is semantically remove-then-add for the same primary key, but is
/// preserved as a single event so consumers can update in place instead of
/// rendering twice.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceChange {
    /// Insert a row whose primary key is currently absent.
    Add(Row),
    /// Remove a row whose primary key is currently present.
    Remove(Row),
    /// Replace the row with `old`'s primary key by `new`.
    Edit { old: Row, new: Row },
}

impl SourceChange {
    /// Creates an add change.
    #[inline]
    pub fn add(row: Row) -> Self {
        SourceChange::Add(row)
    }

    /// Creates a remove change.
    #[inline]
    pub fn remove(row: Row) -> Self {
        SourceChange::Remove(row)
    }

    /// Creates an edit change.
    #[inline]
    pub fn edit(old: Row, new: Row) -> Self {
        SourceChange::Edit { old, new }
    }

    /// The row this change introduces or targets: the new side for an edit.
    pub fn row(&self) -> &Row {
        match self {
            SourceChange::Add(row) | SourceChange::Remove(row) => row,
            SourceChange::Edit { new, .. } => new,
        }
    }

    /// Wraps this change into the node-level shape pushed to consumers.
    /// Rows leave a source with no relationships attached.
    pub fn to_change(&self) -> Change {
        match self {
            SourceChange::Add(row) => Change::Add(Node::leaf(row.clone())),
            SourceChange::Remove(row) => Change::Remove(Node::leaf(row.clone())),
            SourceChange::Edit { old, new } => Change::Edit {
                old: Node::leaf(old.clone()),
                new: Node::leaf(new.clone()),
            },
        }
    }
}

/// A named set of child nodes attached to a node by a join.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub nodes: Vec<Node>,
}

/// A row plus its relationships: the payload of fetch results and pushes.
///
/// Join results stay hierarchical rather than being flattened into wide
/// rows; each join attaches one more relationship to the node it emits.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub row: Row,
    pub relationships: Vec<Relationship>,
}

impl Node {
    /// A node with no relationships.
    pub fn leaf(row: Row) -> Self {
        Self {
            row,
            relationships: Vec::new(),
        }
    }

    /// Looks up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Returns a copy with `(name, children)` appended as a relationship.
    pub fn with_relationship(&self, name: &str, nodes: Vec<Node>) -> Node {
        let mut relationships = self.relationships.clone();
        relationships.push(Relationship {
            name: String::from(name),
            nodes,
        });
        Node {
            row: self.row.clone(),
            relationships,
        }
    }
}

/// A node-level change propagating through the operator graph.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    Add(Node),
    Remove(Node),
    Edit { old: Node, new: Node },
}

impl Change {
    /// The node this change introduces or targets: the new side for an edit.
    pub fn node(&self) -> &Node {
        match self {
            Change::Add(node) | Change::Remove(node) => node,
            Change::Edit { new, .. } => new,
        }
    }

    /// Returns true for an add.
    #[inline]
    pub fn is_add(&self) -> bool {
        matches!(self, Change::Add(_))
    }

    /// Returns true for a remove.
    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, Change::Remove(_))
    }
}
