//! The in-memory source node and the overlay protocol.
//!
//! A `MemorySource` owns the canonical sorted copy of one table's rows. It
//! serves `fetch` against any requested sort order through an arena of
//! lazily built indexes, and disseminates `push` changes to every attached
//! connection in registration order.
//!
//! While a push is being disseminated the change has not yet been applied to
//! the indexes. The in-flight change is recorded as an `Overlay`; a fetch
//! issued by a connection at or before the one currently being notified gets
//! the overlay spliced into its stream at the correct sorted position, which
//! is what gives a consumer read-your-own-write consistency from inside its
//! own push handler. At most one overlay exists at any instant and it is
//! cleared unconditionally before `push` returns.

use crate::change::{Node, SourceChange};
use crate::operator::{
    Basis, Constraint, FetchRequest, Input, NodeStream, Output, RowPredicate, Schema,
};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::cmp::Ordering;
use hashbrown::HashMap;
use rill_core::schema::Table;
use rill_core::{Error, Result, Row};
use rill_index::{BoundValue, IndexKey, KeyPart, OrderPart, RowComparator, SortSpec, SortedRowIndex};

/// The single pending change recorded on a source during dissemination.
/// `output_index` is the position of the connection currently being
/// notified; connections at or before it see the change in their fetches.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub output_index: usize,
    pub change: SourceChange,
}

/// An overlay split into its visible effects on a fetch stream: a row to
/// splice in and a row to skip. An edit populates both.
#[derive(Clone, Debug, Default)]
pub struct Overlays {
    pub add: Option<Row>,
    pub remove: Option<Row>,
}

impl Overlays {
    fn from_change(change: Option<&SourceChange>) -> Self {
        match change {
            None => Self::default(),
            Some(SourceChange::Add(row)) => Self {
                add: Some(row.clone()),
                remove: None,
            },
            Some(SourceChange::Remove(row)) => Self {
                add: None,
                remove: Some(row.clone()),
            },
            Some(SourceChange::Edit { old, new }) => Self {
                add: Some(new.clone()),
                remove: Some(old.clone()),
            },
        }
    }
}

/// Drops overlay sides that sort before the stream's lower bound; they can
/// never appear in the stream and must not be spliced into it.
pub fn overlays_for_start_at(overlays: Overlays, start_at: &Row, cmp: &RowComparator) -> Overlays {
    let keep = |row: Option<Row>| row.filter(|r| cmp.compare(r, start_at) != Ordering::Less);
    Overlays {
        add: keep(overlays.add),
        remove: keep(overlays.remove),
    }
}

/// Drops overlay sides that do not match the active constraint.
pub fn overlays_for_constraint(overlays: Overlays, constraint: &Constraint) -> Overlays {
    let keep = |row: Option<Row>| row.filter(|r| constraint.matches(r));
    Overlays {
        add: keep(overlays.add),
        remove: keep(overlays.remove),
    }
}

/// Splices an overlay into a sorted row stream: the add side is inserted
/// just before the first row sorting after it (or at the end), the remove
/// side is skipped when encountered.
struct WithOverlay<I> {
    inner: I,
    overlays: Overlays,
    cmp: RowComparator,
    pending: Option<Row>,
    add_yielded: bool,
    remove_skipped: bool,
}

impl<I: Iterator<Item = Row>> WithOverlay<I> {
    fn new(inner: I, overlays: Overlays, cmp: RowComparator) -> Self {
        Self {
            inner,
            overlays,
            cmp,
            pending: None,
            add_yielded: false,
            remove_skipped: false,
        }
    }
}

impl<I: Iterator<Item = Row>> Iterator for WithOverlay<I> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        loop {
            let row = match self.pending.take() {
                Some(row) => row,
                None => match self.inner.next() {
                    Some(row) => row,
                    None => {
                        if !self.add_yielded {
                            if let Some(add) = self.overlays.add.take() {
                                self.add_yielded = true;
                                return Some(add);
                            }
                        }
                        return None;
                    }
                },
            };
            if !self.add_yielded {
                if let Some(add) = &self.overlays.add {
                    if self.cmp.compare(add, &row) == Ordering::Less {
                        self.add_yielded = true;
                        self.pending = Some(row);
                        return self.overlays.add.clone();
                    }
                }
            }
            if !self.remove_skipped {
                if let Some(remove) = &self.overlays.remove {
                    if self.cmp.compare(remove, &row) == Ordering::Equal {
                        self.remove_skipped = true;
                        continue;
                    }
                }
            }
            return Some(row);
        }
    }
}

/// Splices `overlay` into `rows` at its correct sorted position relative to
/// `start_at` and `constraint`. The result is exactly the sequence a fetch
/// would produce had the overlay change already been applied to the rows.
pub fn generate_with_overlay<I>(
    start_at: Option<Row>,
    rows: I,
    constraint: Option<Constraint>,
    overlay: Option<Overlay>,
    cmp: RowComparator,
) -> impl Iterator<Item = Row>
where
    I: Iterator<Item = Row>,
{
    let mut overlays = Overlays::from_change(overlay.as_ref().map(|o| &o.change));
    if let Some(start_at) = &start_at {
        overlays = overlays_for_start_at(overlays, start_at, &cmp);
    }
    if let Some(constraint) = &constraint {
        overlays = overlays_for_constraint(overlays, constraint);
    }
    WithOverlay::new(rows, overlays, cmp)
}

/// Applies a start position to a sorted stream. `Before` needs one element
/// of lookahead: emission begins on the element whose successor is the first
/// row at or past the start row.
struct WithStart<I> {
    inner: I,
    start: Option<crate::operator::Start>,
    cmp: RowComparator,
    started: bool,
    peeked: Option<Row>,
}

impl<I: Iterator<Item = Row>> WithStart<I> {
    fn new(inner: I, start: Option<crate::operator::Start>, cmp: RowComparator) -> Self {
        let started = start.is_none();
        Self {
            inner,
            start,
            cmp,
            started,
            peeked: None,
        }
    }
}

impl<I: Iterator<Item = Row>> Iterator for WithStart<I> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        loop {
            let curr = match self.peeked.take() {
                Some(row) => row,
                None => self.inner.next()?,
            };
            if !self.started {
                // start is present whenever started is still false.
                let start = self.start.as_ref()?;
                match start.basis {
                    Basis::Before => {
                        self.peeked = self.inner.next();
                        let next_at_or_past = match &self.peeked {
                            None => true,
                            Some(next) => {
                                self.cmp.compare(next, &start.row) != Ordering::Less
                            }
                        };
                        if next_at_or_past {
                            self.started = true;
                        }
                    }
                    Basis::At => {
                        if self.cmp.compare(&curr, &start.row) != Ordering::Less {
                            self.started = true;
                        }
                    }
                    Basis::After => {
                        if self.cmp.compare(&curr, &start.row) == Ordering::Greater {
                            self.started = true;
                        }
                    }
                }
            }
            if self.started {
                return Some(curr);
            }
        }
    }
}

/// Ends a stream at the first row no longer matching the constraint. The
/// underlying scan is ordered by the constraint column first, so rows of one
/// constraint group are contiguous.
struct WithConstraint<I> {
    inner: I,
    constraint: Option<Constraint>,
    done: bool,
}

impl<I: Iterator<Item = Row>> Iterator for WithConstraint<I> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.done {
            return None;
        }
        let row = self.inner.next()?;
        if let Some(constraint) = &self.constraint {
            if !constraint.matches(&row) {
                self.done = true;
                return None;
            }
        }
        Some(row)
    }
}

/// Cursor-style scan over an index. Each step re-probes the container by the
/// last yielded key, so no borrow is held while a consumer callback runs and
/// the scan survives suspension across push dissemination.
struct IndexScan {
    data: Rc<RefCell<SortedRowIndex>>,
    start: Option<IndexKey>,
    cursor: Option<IndexKey>,
}

impl Iterator for IndexScan {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let data = self.data.borrow();
        let found = match &self.cursor {
            Some(cursor) => data.first_after(cursor),
            None => match &self.start {
                Some(start) => data.first_at_or_after(start),
                None => data.first(),
            },
        };
        drop(data);
        let (key, row) = found?;
        self.cursor = Some(key);
        Some(row)
    }
}

struct IndexSlot {
    data: Rc<RefCell<SortedRowIndex>>,
    /// Connections using this index; the slot is reclaimed when this
    /// empties. The primary index has no users and is never reclaimed.
    used_by: Vec<u64>,
}

struct ConnectionSlot {
    id: u64,
    sort: SortSpec,
    filters: Rc<Vec<RowPredicate>>,
    output: Option<Rc<dyn Output>>,
}

struct SourceState {
    table: Rc<Table>,
    primary_spec: SortSpec,
    indexes: RefCell<HashMap<SortSpec, IndexSlot>>,
    connections: RefCell<Vec<ConnectionSlot>>,
    overlay: RefCell<Option<Overlay>>,
    next_connection: Cell<u64>,
}

/// The leaf dataflow node: the single writable entry point for a table's
/// rows and the origin of all fetch results for that table.
pub struct MemorySource {
    state: Rc<SourceState>,
}

impl MemorySource {
    /// Creates a source for the given table, with its primary index.
    pub fn new(table: Table) -> Self {
        let table = Rc::new(table);
        let primary_spec = SortSpec::ascending(table.primary_key());
        let mut indexes = HashMap::new();
        indexes.insert(
            primary_spec.clone(),
            IndexSlot {
                data: Rc::new(RefCell::new(SortedRowIndex::new(primary_spec.clone()))),
                used_by: Vec::new(),
            },
        );
        Self {
            state: Rc::new(SourceState {
                table,
                primary_spec,
                indexes: RefCell::new(indexes),
                connections: RefCell::new(Vec::new()),
                overlay: RefCell::new(None),
                next_connection: Cell::new(0),
            }),
        }
    }

    /// Returns the table this source owns.
    pub fn table(&self) -> &Rc<Table> {
        &self.state.table
    }

    /// Registers a consumer with a requested output ordering, extended with
    /// the primary key to guarantee a strict total order, and optional row
    /// filters applied to everything the connection reads.
    pub fn connect(&self, sort: SortSpec, filters: Vec<RowPredicate>) -> Rc<SourceConnection> {
        let sort = sort.with_key(self.state.table.primary_key());
        let id = self.state.next_connection.get();
        self.state.next_connection.set(id + 1);
        self.state.connections.borrow_mut().push(ConnectionSlot {
            id,
            sort: sort.clone(),
            filters: Rc::new(filters),
            output: None,
        });
        let schema = Rc::new(Schema::new(self.state.table.clone(), sort));
        Rc::new(SourceConnection {
            state: self.state.clone(),
            id,
            schema,
        })
    }

    /// Applies one change: verifies the add/remove preconditions against the
    /// primary index, notifies every connection in registration order with
    /// the overlay set, clears the overlay, then applies the change to every
    /// index so subsequent fetches see the new state directly.
    pub fn push(&self, change: SourceChange) -> Result<()> {
        let state = &self.state;
        let table = &state.table;

        {
            let indexes = state.indexes.borrow();
            let primary = indexes
                .get(&state.primary_spec)
                .expect("primary index exists")
                .data
                .borrow();
            match &change {
                SourceChange::Add(row) => {
                    table.validate_row(row)?;
                    if primary.contains(row) {
                        return Err(Error::row_already_exists(
                            table.name(),
                            row.key(table.primary_key()),
                        ));
                    }
                }
                SourceChange::Remove(row) => {
                    if !primary.contains(row) {
                        return Err(Error::row_not_found(
                            table.name(),
                            row.key(table.primary_key()),
                        ));
                    }
                }
                SourceChange::Edit { old, new } => {
                    table.validate_row(new)?;
                    if !primary.contains(old) {
                        return Err(Error::row_not_found(
                            table.name(),
                            old.key(table.primary_key()),
                        ));
                    }
                }
            }
        }

        // Snapshot outputs so consumer callbacks may connect/disconnect
        // without invalidating the dissemination order.
        let outputs: Vec<(usize, Rc<dyn Output>)> = state
            .connections
            .borrow()
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.output.clone().map(|o| (i, o)))
            .collect();

        let node_change = change.to_change();
        let disseminate = || -> Result<()> {
            for (output_index, output) in outputs {
                *state.overlay.borrow_mut() = Some(Overlay {
                    output_index,
                    change: change.clone(),
                });
                output.push(node_change.clone())?;
            }
            Ok(())
        };
        let result = disseminate();
        // Cleared unconditionally, even when a consumer failed.
        *state.overlay.borrow_mut() = None;
        result?;

        for slot in state.indexes.borrow().values() {
            let mut data = slot.data.borrow_mut();
            match &change {
                SourceChange::Add(row) => {
                    data.insert(row.clone());
                }
                SourceChange::Remove(row) => {
                    data.remove(row);
                }
                SourceChange::Edit { old, new } => {
                    // The old row may occupy a different slot than the new
                    // one in this index's order; replace, never update.
                    data.remove(old);
                    data.insert(new.clone());
                }
            }
        }
        Ok(())
    }

    /// Returns the sort specs of all live indexes. For lifecycle tests.
    pub fn index_specs(&self) -> Vec<SortSpec> {
        self.state.indexes.borrow().keys().cloned().collect()
    }
}

impl SourceState {
    fn get_or_create_index(
        &self,
        spec: &SortSpec,
        conn_id: u64,
    ) -> Rc<RefCell<SortedRowIndex>> {
        let mut indexes = self.indexes.borrow_mut();
        if let Some(slot) = indexes.get_mut(spec) {
            if *spec != self.primary_spec && !slot.used_by.contains(&conn_id) {
                slot.used_by.push(conn_id);
            }
            return slot.data.clone();
        }

        log::debug!(
            "building secondary index on {} for {:?}",
            self.table.name(),
            spec
        );
        let mut data = SortedRowIndex::new(spec.clone());
        {
            let primary = indexes
                .get(&self.primary_spec)
                .expect("primary index exists")
                .data
                .clone();
            for row in primary.borrow().rows() {
                data.insert(row.clone());
            }
        }
        let data = Rc::new(RefCell::new(data));
        indexes.insert(
            spec.clone(),
            IndexSlot {
                data: data.clone(),
                used_by: vec![conn_id],
            },
        );
        data
    }

    fn disconnect(&self, conn_id: u64) -> Result<()> {
        let mut connections = self.connections.borrow_mut();
        let position = connections
            .iter()
            .position(|c| c.id == conn_id)
            .ok_or(Error::ConnectionNotFound)?;
        connections.remove(position);
        drop(connections);

        let mut indexes = self.indexes.borrow_mut();
        let primary_spec = &self.primary_spec;
        indexes.retain(|spec, slot| {
            if spec == primary_spec {
                return true;
            }
            slot.used_by.retain(|&id| id != conn_id);
            !slot.used_by.is_empty()
        });
        Ok(())
    }

    fn fetch(&self, req: FetchRequest, conn_id: u64) -> Result<NodeStream<'static>> {
        let (conn_index, sort, filters) = {
            let connections = self.connections.borrow();
            let position = connections
                .iter()
                .position(|c| c.id == conn_id)
                .ok_or(Error::ConnectionNotFound)?;
            let conn = &connections[position];
            (position, conn.sort.clone(), conn.filters.clone())
        };

        // An index sorted by the constraint column first serves constrained
        // fetches; rows of one constraint value are then contiguous. When
        // the constraint is the whole single-column primary key there can be
        // at most one match and the requested sort is irrelevant.
        let pk = self.table.primary_key();
        let index_spec = match &req.constraint {
            Some(constraint) => {
                if pk.len() == 1 && constraint.column == pk[0] {
                    SortSpec::new(vec![OrderPart::asc(constraint.column)])
                } else {
                    sort.prefixed_with(OrderPart::asc(constraint.column))
                }
            }
            None => sort,
        };
        let index = self.get_or_create_index(&index_spec, conn_id);
        let cmp = RowComparator::new(index_spec.clone());

        // A connection still processing this push (or one notified earlier
        // in the same dissemination) sees the in-flight change.
        let overlay = match &*self.overlay.borrow() {
            Some(o) if conn_index <= o.output_index => Some(o.clone()),
            _ => None,
        };
        let mut overlays = Overlays::from_change(overlay.as_ref().map(|o| &o.change));

        let mut start_at: Option<Row> = None;
        if let Some(start) = &req.start {
            if let Some(constraint) = &req.constraint {
                if !constraint.matches(&start.row) {
                    return Err(Error::StartOutsideConstraint);
                }
            }
            start_at = Some(start.row.clone());
            if start.basis == Basis::Before {
                start_at = next_lower_row(
                    &index,
                    &cmp,
                    &start.row,
                    &req.constraint,
                    &filters,
                    overlays.add.as_ref(),
                );
            }
        }

        if let Some(start_at) = &start_at {
            overlays = overlays_for_start_at(overlays, start_at, &cmp);
        }
        if let Some(constraint) = &req.constraint {
            overlays = overlays_for_constraint(overlays, constraint);
        }
        // Connection filters bound overlay visibility exactly like they
        // bound the scan itself.
        let passes = |row: &Row| filters.iter().all(|f| f(row));
        overlays.add = overlays.add.filter(|r| passes(r));
        overlays.remove = overlays.remove.filter(|r| passes(r));

        // With a constraint the scan starts at the first possible key of the
        // constraint group: sentinel bounds fill the unpinned columns, which
        // handles descending sort parts where the group's first row does not
        // carry the smallest values.
        let scan_start = match &req.constraint {
            Some(constraint) => Some(constraint_scan_key(&index_spec, constraint)),
            None => start_at
                .as_ref()
                .map(|row| IndexKey::for_row(row, &index_spec)),
        };

        let scan = IndexScan {
            data: index,
            start: scan_start,
            cursor: None,
        };
        let with_overlay = WithOverlay::new(scan, overlays, cmp.clone());
        let with_filters = with_overlay.filter(move |row| filters.iter().all(|f| f(row)));
        let with_start = WithStart::new(with_filters, req.start.clone(), cmp);
        let with_constraint = WithConstraint {
            inner: with_start,
            constraint: req.constraint.clone(),
            done: false,
        };
        Ok(Box::new(with_constraint.map(Node::leaf)))
    }
}

/// Builds the scan start key for a constraint: the constraint column pinned
/// to its value, every other column at the bound that sorts first under its
/// direction.
fn constraint_scan_key(spec: &SortSpec, constraint: &Constraint) -> IndexKey {
    IndexKey::new(
        spec.parts()
            .iter()
            .map(|part| KeyPart {
                value: if part.column == constraint.column {
                    BoundValue::Val(constraint.value.clone())
                } else {
                    BoundValue::lowest(part.direction)
                },
                direction: part.direction,
            })
            .collect(),
    )
}

/// Finds the row immediately preceding `row` in index order, skipping rows
/// that fail the constraint or filters. The overlay's add side is a
/// candidate too: when it falls between the found row and the target, it is
/// the true predecessor.
fn next_lower_row(
    index: &Rc<RefCell<SortedRowIndex>>,
    cmp: &RowComparator,
    row: &Row,
    constraint: &Option<Constraint>,
    filters: &[RowPredicate],
    add_overlay: Option<&Row>,
) -> Option<Row> {
    let overlay =
        add_overlay.filter(|candidate| cmp.compare(candidate, row) == Ordering::Less);
    let matches = |r: &Row| {
        constraint.as_ref().map_or(true, |c| c.matches(r)) && filters.iter().all(|f| f(r))
    };
    let data = index.borrow();
    let mut cursor = data.key_of(row);
    loop {
        match data.next_lower(&cursor) {
            None => return overlay.cloned(),
            Some((key, candidate)) => {
                if matches(&candidate) {
                    if let Some(o) = overlay {
                        if cmp.compare(o, &candidate) != Ordering::Less {
                            return Some(o.clone());
                        }
                    }
                    return Some(candidate);
                }
                cursor = key;
            }
        }
    }
}

/// One consumer's handle onto a source: the `Input` end of the connection.
pub struct SourceConnection {
    state: Rc<SourceState>,
    id: u64,
    schema: Rc<Schema>,
}

impl Input for SourceConnection {
    fn schema(&self) -> Rc<Schema> {
        self.schema.clone()
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        self.state.fetch(req, self.id)
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        self.state.fetch(req, self.id)
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        let mut connections = self.state.connections.borrow_mut();
        if let Some(conn) = connections.iter_mut().find(|c| c.id == self.id) {
            conn.output = Some(output);
        }
    }

    fn destroy(&self) -> Result<()> {
        self.state.disconnect(self.id)
    }
}
