//! Array-backed materialization of a pipeline's output.
//!
//! An `ArrayView` bridges the push/fetch dataflow to a stable snapshot:
//! `hydrate` performs one full fetch, then pushes maintain the in-memory
//! collection incrementally. Entries are kept sorted by the schema's output
//! order with the composite identity as tiebreak, so join results sharing a
//! root row still occupy distinct, stable positions.
//!
//! A plain sorted vector beats a tree here: mid-array inserts are
//! asymptotically worse but allocation-free, and the materialized form is
//! directly consumable by listeners.

use crate::change::{Change, Node, Relationship};
use crate::operator::{output_port, FetchRequest, Input, Output, Schema};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::cmp::Ordering;
use rill_core::{Error, Result, RowKey};

/// Unique identifier for a registered listener.
pub type ListenerId = u64;

/// Snapshot callback. The slice is valid for the duration of the call.
pub type Listener = Rc<dyn Fn(&[Node])>;

struct ViewEntry {
    /// Composite identity, computed before hidden relationships are
    /// stripped so junction constituents still disambiguate entries.
    key: RowKey,
    node: Node,
}

/// A terminal consumer materializing a listener-observable result set.
pub struct ArrayView {
    input: Rc<dyn Input>,
    schema: Rc<Schema>,
    entries: RefCell<Vec<ViewEntry>>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<ListenerId>,
    hydrated: Cell<bool>,
    dirty: Cell<bool>,
}

impl ArrayView {
    /// Creates a view over `input` and wires itself as its output.
    pub fn new(input: Rc<dyn Input>) -> Rc<ArrayView> {
        let view = Self::detached(input);
        view.input
            .set_output(output_port(&view, ArrayView::apply));
        view
    }

    /// Creates a view without registering it as the input's output. The
    /// owner routes pushes to `apply` itself; used by layers that need to
    /// observe the change stream as well as the collection.
    pub fn detached(input: Rc<dyn Input>) -> Rc<ArrayView> {
        let schema = input.schema();
        Rc::new(ArrayView {
            input,
            schema,
            entries: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
            hydrated: Cell::new(false),
            dirty: Cell::new(false),
        })
    }

    /// The schema of the nodes this view materializes.
    pub fn schema(&self) -> Rc<Schema> {
        self.schema.clone()
    }

    /// Performs the initial full fetch and notifies listeners.
    pub fn hydrate(&self) -> Result<()> {
        if self.hydrated.get() {
            return Err(Error::invalid_operation("view is already hydrated"));
        }
        self.hydrated.set(true);
        let nodes: Vec<Node> = self.input.fetch(FetchRequest::all())?.collect();
        for node in nodes {
            self.insert_node(node)?;
        }
        self.dirty.set(true);
        self.flush();
        Ok(())
    }

    /// Applies one change to the collection. Wired as the pipeline output;
    /// also callable directly by an owning layer that routes pushes itself.
    pub fn apply(&self, change: Change) -> Result<()> {
        match change {
            Change::Add(node) => self.insert_node(node)?,
            Change::Remove(node) => self.remove_node(&node)?,
            Change::Edit { old, new } => {
                let old_key = self.schema.identity(&old);
                let position = self.position_of(&old_key);
                match position {
                    Some(index) => {
                        self.entries.borrow_mut().remove(index);
                    }
                    None => {
                        // A replayed or out-of-order delivery from a
                        // misbehaving upstream; apply the add side only.
                        log::warn!(
                            "edit for a row not in view {}: {:?}",
                            self.schema.table().name(),
                            old_key
                        );
                    }
                }
                self.insert_node(new)?;
            }
        }
        self.dirty.set(true);
        Ok(())
    }

    fn compare_entry(&self, entry: &ViewEntry, node: &Node, key: &RowKey) -> Ordering {
        let cmp = self
            .schema
            .comparator()
            .compare(&entry.node.row, &node.row);
        if cmp != Ordering::Equal {
            return cmp;
        }
        entry.key.cmp(key)
    }

    fn insert_node(&self, node: Node) -> Result<()> {
        let key = self.schema.identity(&node);
        let stripped = strip_hidden(&self.schema, node);
        let mut entries = self.entries.borrow_mut();
        let position =
            entries.binary_search_by(|entry| self.compare_entry(entry, &stripped, &key));
        match position {
            Ok(_) => Err(Error::row_already_exists(
                self.schema.table().name(),
                key,
            )),
            Err(index) => {
                entries.insert(
                    index,
                    ViewEntry {
                        key,
                        node: stripped,
                    },
                );
                Ok(())
            }
        }
    }

    fn remove_node(&self, node: &Node) -> Result<()> {
        let key = self.schema.identity(node);
        match self.position_of(&key) {
            Some(index) => {
                self.entries.borrow_mut().remove(index);
                Ok(())
            }
            None => Err(Error::row_not_found(self.schema.table().name(), key)),
        }
    }

    fn position_of(&self, key: &RowKey) -> Option<usize> {
        self.entries
            .borrow()
            .iter()
            .position(|entry| &entry.key == key)
    }

    /// Returns the current snapshot.
    pub fn rows(&self) -> Vec<Node> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.node.clone())
            .collect()
    }

    /// Returns the number of materialized results.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns true if the view holds no results.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Returns whether `hydrate` has run.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated.get()
    }

    /// Registers a listener. A hydrated view delivers the current snapshot
    /// immediately; afterwards every flush of a dirty view notifies it.
    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push((id, listener.clone()));
        if self.hydrated.get() {
            listener(&self.rows());
        }
        id
    }

    /// Unregisters a listener. Returns true if it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Notifies listeners with the current snapshot if anything changed
    /// since the last flush. Pushes are applied eagerly; flushing is the
    /// consumer-side batching point (one render per frame, not per push).
    pub fn flush(&self) {
        if !self.dirty.get() {
            return;
        }
        self.dirty.set(false);
        let snapshot = self.rows();
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Tears the view and its pipeline down.
    pub fn destroy(&self) -> Result<()> {
        self.entries.borrow_mut().clear();
        self.listeners.borrow_mut().clear();
        self.input.destroy()
    }
}

impl Output for ArrayView {
    fn push(&self, change: Change) -> Result<()> {
        self.apply(change)
    }
}

/// Drops hidden relationships (junction tables) from a node, recursively.
pub fn strip_hidden(schema: &Schema, node: Node) -> Node {
    if node.relationships.is_empty() {
        return node;
    }
    let relationships = node
        .relationships
        .into_iter()
        .filter_map(|rel| match schema.relationship(&rel.name) {
            Some(rel_schema) if rel_schema.hidden => None,
            Some(rel_schema) => Some(Relationship {
                name: rel.name,
                nodes: rel
                    .nodes
                    .into_iter()
                    .map(|child| strip_hidden(&rel_schema.child, child))
                    .collect(),
            }),
            None => Some(rel),
        })
        .collect();
    Node {
        row: node.row,
        relationships,
    }
}
