//! The join operator.
//!
//! `Join` maintains the correlation of two dataflows, A (the parent) and B
//! (the child), by a declared equality between a parent key and a child
//! column. It emits one change per affected (parent, child) pair, so adding
//! a parent with n matching children produces exactly n adds, and removing
//! it retracts exactly those n results.
//!
//! The child side is resolved by an indexed fetch against the B input with
//! an equality constraint — the upstream source lazily builds the index.
//! The parent side is buffered in a join-owned correlation index so child
//! changes can find their parents without a correlated fetch; that buffer
//! is also why order of arrival does not matter: a parent with no children
//! yet produces no output, and matches appear as soon as the other side
//! catches up.
//!
//! Joins chain: a join's output can be the A input of another join, which is
//! how a junction (many-to-many) table is traversed. The outer join's parent
//! key then names the nested relationship the junction rows live under, and
//! the junction relationship is marked hidden so views never surface it.

use crate::change::{Change, Node};
use crate::operator::{
    output_port, Constraint, FetchRequest, Input, NodeStream, Output, Schema,
};
use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use rill_core::{Error, Result, RowKey, Value};
use rill_index::ColumnId;

/// What the join emits for matched and unmatched parents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    /// Pairs only; unmatched parents are silent.
    Inner,
    /// Pairs, plus unmatched parents with an empty relationship. Serves
    /// `related` subqueries: the parent row appears even with no children.
    Left,
    /// Parents with at least one match, emitted once, without attaching the
    /// relationship. Serves correlated-subquery existence conditions.
    Semi,
}

/// Where a parent node's correlation value lives: a root column, or — for
/// chained joins — a column of a named nested relationship.
#[derive(Clone, Debug)]
pub struct CorrelationPath {
    pub relationship: Option<String>,
    pub column: ColumnId,
}

impl CorrelationPath {
    /// A correlation on a root column of the parent.
    pub fn root(column: ColumnId) -> Self {
        Self {
            relationship: None,
            column,
        }
    }

    /// A correlation through a named relationship of the parent.
    pub fn through(relationship: impl Into<String>, column: ColumnId) -> Self {
        Self {
            relationship: Some(relationship.into()),
            column,
        }
    }

    fn value_of(&self, node: &Node) -> Value {
        match &self.relationship {
            None => node.row.get(self.column).cloned().unwrap_or(Value::Null),
            Some(name) => node
                .relationship(name)
                .and_then(|rel| rel.nodes.first())
                .and_then(|child| child.row.get(self.column).cloned())
                .unwrap_or(Value::Null),
        }
    }
}

/// Construction arguments for `Join`.
pub struct JoinArgs {
    pub parent: Rc<dyn Input>,
    pub child: Rc<dyn Input>,
    pub kind: JoinKind,
    /// Correlation value on the parent side.
    pub parent_key: CorrelationPath,
    /// Correlated column on the child's root table.
    pub child_column: ColumnId,
    /// Relationship name the child is attached under.
    pub relationship: String,
    /// Hidden relationships are used for correlation but stripped from
    /// materialized snapshots (junction tables).
    pub hidden: bool,
}

/// Parent nodes buffered by correlation value, deduplicated and ordered by
/// identity so emission order is deterministic.
#[derive(Default)]
struct CorrelationIndex {
    map: HashMap<Value, BTreeMap<RowKey, Node>>,
}

impl CorrelationIndex {
    fn add(&mut self, key: Value, id: RowKey, node: Node) {
        self.map.entry(key).or_default().insert(id, node);
    }

    fn remove(&mut self, key: &Value, id: &RowKey) {
        if let Some(entries) = self.map.get_mut(key) {
            entries.remove(id);
            if entries.is_empty() {
                self.map.remove(key);
            }
        }
    }

    fn nodes(&self, key: &Value) -> Vec<Node> {
        self.map
            .get(key)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Fetch,
    Cleanup,
}

/// The join operator. See the module docs for the algebra.
pub struct Join {
    parent: Rc<dyn Input>,
    child: Rc<dyn Input>,
    kind: JoinKind,
    parent_key: CorrelationPath,
    child_column: ColumnId,
    relationship: String,
    parent_schema: Rc<Schema>,
    schema: Rc<Schema>,
    output: RefCell<Option<Rc<dyn Output>>>,
    parent_index: RefCell<CorrelationIndex>,
    /// Child match count per parent identity; drives the Left and Semi
    /// membership transitions.
    match_counts: RefCell<HashMap<RowKey, usize>>,
}

impl Join {
    /// Creates a join and wires itself as the output of both inputs.
    pub fn new(args: JoinArgs) -> Rc<Join> {
        let JoinArgs {
            parent,
            child,
            kind,
            parent_key,
            child_column,
            relationship,
            hidden,
        } = args;
        let parent_schema = parent.schema();
        let schema = match kind {
            JoinKind::Semi => parent_schema.clone(),
            JoinKind::Inner | JoinKind::Left => Rc::new(parent_schema.with_relationship(
                &relationship,
                hidden,
                child.schema(),
            )),
        };
        let join = Rc::new(Join {
            parent,
            child,
            kind,
            parent_key,
            child_column,
            relationship,
            parent_schema,
            schema,
            output: RefCell::new(None),
            parent_index: RefCell::new(CorrelationIndex::default()),
            match_counts: RefCell::new(HashMap::new()),
        });
        join.parent
            .set_output(output_port(&join, Join::push_parent));
        join.child.set_output(output_port(&join, Join::push_child));
        join
    }

    fn out(&self) -> Result<Rc<dyn Output>> {
        self.output
            .borrow()
            .clone()
            .ok_or_else(|| Error::invalid_operation("join has no output"))
    }

    fn parent_identity(&self, node: &Node) -> RowKey {
        self.parent_schema.identity(node)
    }

    /// The child nodes matching a correlation value, via an indexed fetch.
    fn children(&self, key: &Value, mode: Mode) -> Result<Vec<Node>> {
        let req = FetchRequest {
            constraint: Some(Constraint::new(self.child_column, key.clone())),
            start: None,
        };
        let stream = match mode {
            Mode::Fetch => self.child.fetch(req)?,
            Mode::Cleanup => self.child.cleanup(req)?,
        };
        Ok(stream.collect())
    }

    fn compose(&self, parent: &Node, child: Node) -> Node {
        parent.with_relationship(&self.relationship, vec![child])
    }

    fn parent_only(&self, parent: &Node) -> Node {
        parent.with_relationship(&self.relationship, vec![])
    }

    /// Expands one parent node into the join's output nodes, maintaining
    /// the correlation buffer and match counts.
    fn expand(&self, parent: Node, mode: Mode) -> Result<Vec<Node>> {
        let key = self.parent_key.value_of(&parent);
        let id = self.parent_identity(&parent);
        let children = self.children(&key, mode)?;
        match mode {
            Mode::Fetch => {
                self.parent_index
                    .borrow_mut()
                    .add(key, id.clone(), parent.clone());
                self.match_counts.borrow_mut().insert(id, children.len());
            }
            Mode::Cleanup => {
                self.parent_index.borrow_mut().remove(&key, &id);
                self.match_counts.borrow_mut().remove(&id);
            }
        }
        Ok(match self.kind {
            JoinKind::Inner => children
                .into_iter()
                .map(|child| self.compose(&parent, child))
                .collect(),
            JoinKind::Left => {
                if children.is_empty() {
                    vec![self.parent_only(&parent)]
                } else {
                    children
                        .into_iter()
                        .map(|child| self.compose(&parent, child))
                        .collect()
                }
            }
            JoinKind::Semi => {
                if children.is_empty() {
                    Vec::new()
                } else {
                    vec![parent]
                }
            }
        })
    }

    fn push_parent(&self, change: Change) -> Result<()> {
        let output = self.out()?;
        match change {
            Change::Add(node) => {
                let key = self.parent_key.value_of(&node);
                let id = self.parent_identity(&node);
                let children = self.children(&key, Mode::Fetch)?;
                self.parent_index
                    .borrow_mut()
                    .add(key, id.clone(), node.clone());
                self.match_counts
                    .borrow_mut()
                    .insert(id, children.len());
                match self.kind {
                    JoinKind::Inner => {
                        for child in children {
                            output.push(Change::Add(self.compose(&node, child)))?;
                        }
                    }
                    JoinKind::Left => {
                        if children.is_empty() {
                            output.push(Change::Add(self.parent_only(&node)))?;
                        } else {
                            for child in children {
                                output.push(Change::Add(self.compose(&node, child)))?;
                            }
                        }
                    }
                    JoinKind::Semi => {
                        if !children.is_empty() {
                            output.push(Change::Add(node))?;
                        }
                    }
                }
            }
            Change::Remove(node) => {
                let key = self.parent_key.value_of(&node);
                let id = self.parent_identity(&node);
                let children = self.children(&key, Mode::Fetch)?;
                self.parent_index.borrow_mut().remove(&key, &id);
                self.match_counts.borrow_mut().remove(&id);
                match self.kind {
                    JoinKind::Inner => {
                        for child in children {
                            output.push(Change::Remove(self.compose(&node, child)))?;
                        }
                    }
                    JoinKind::Left => {
                        if children.is_empty() {
                            output.push(Change::Remove(self.parent_only(&node)))?;
                        } else {
                            for child in children {
                                output.push(Change::Remove(self.compose(&node, child)))?;
                            }
                        }
                    }
                    JoinKind::Semi => {
                        if !children.is_empty() {
                            output.push(Change::Remove(node))?;
                        }
                    }
                }
            }
            Change::Edit { old, new } => {
                let old_key = self.parent_key.value_of(&old);
                let new_key = self.parent_key.value_of(&new);
                if old_key != new_key {
                    // The correlation moved: every old pair retracts and the
                    // new correlation's pairs assert.
                    self.push_parent(Change::Remove(old))?;
                    self.push_parent(Change::Add(new))?;
                    return Ok(());
                }
                let old_id = self.parent_identity(&old);
                let new_id = self.parent_identity(&new);
                let children = self.children(&new_key, Mode::Fetch)?;
                {
                    let mut index = self.parent_index.borrow_mut();
                    index.remove(&old_key, &old_id);
                    index.add(new_key, new_id.clone(), new.clone());
                }
                {
                    let mut counts = self.match_counts.borrow_mut();
                    counts.remove(&old_id);
                    counts.insert(new_id, children.len());
                }
                match self.kind {
                    JoinKind::Inner => {
                        for child in children {
                            output.push(Change::Edit {
                                old: self.compose(&old, child.clone()),
                                new: self.compose(&new, child),
                            })?;
                        }
                    }
                    JoinKind::Left => {
                        if children.is_empty() {
                            output.push(Change::Edit {
                                old: self.parent_only(&old),
                                new: self.parent_only(&new),
                            })?;
                        } else {
                            for child in children {
                                output.push(Change::Edit {
                                    old: self.compose(&old, child.clone()),
                                    new: self.compose(&new, child),
                                })?;
                            }
                        }
                    }
                    JoinKind::Semi => {
                        if !children.is_empty() {
                            output.push(Change::Edit { old, new })?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn push_child(&self, change: Change) -> Result<()> {
        let output = self.out()?;
        match change {
            Change::Add(child) => {
                let key = child
                    .row
                    .get(self.child_column)
                    .cloned()
                    .unwrap_or(Value::Null);
                let parents = self.parent_index.borrow().nodes(&key);
                for parent in parents {
                    let id = self.parent_identity(&parent);
                    let count = {
                        let mut counts = self.match_counts.borrow_mut();
                        let entry = counts.entry(id).or_insert(0);
                        let before = *entry;
                        *entry += 1;
                        before
                    };
                    match self.kind {
                        JoinKind::Inner => {
                            output.push(Change::Add(self.compose(&parent, child.clone())))?;
                        }
                        JoinKind::Left => {
                            output.push(Change::Add(self.compose(&parent, child.clone())))?;
                            if count == 0 {
                                output.push(Change::Remove(self.parent_only(&parent)))?;
                            }
                        }
                        JoinKind::Semi => {
                            if count == 0 {
                                output.push(Change::Add(parent))?;
                            }
                        }
                    }
                }
            }
            Change::Remove(child) => {
                let key = child
                    .row
                    .get(self.child_column)
                    .cloned()
                    .unwrap_or(Value::Null);
                let parents = self.parent_index.borrow().nodes(&key);
                for parent in parents {
                    let id = self.parent_identity(&parent);
                    let count = {
                        let mut counts = self.match_counts.borrow_mut();
                        let entry = counts.entry(id).or_insert(1);
                        *entry = entry.saturating_sub(1);
                        *entry
                    };
                    match self.kind {
                        JoinKind::Inner => {
                            output.push(Change::Remove(self.compose(&parent, child.clone())))?;
                        }
                        JoinKind::Left => {
                            output.push(Change::Remove(self.compose(&parent, child.clone())))?;
                            if count == 0 {
                                output.push(Change::Add(self.parent_only(&parent)))?;
                            }
                        }
                        JoinKind::Semi => {
                            if count == 0 {
                                output.push(Change::Remove(parent))?;
                            }
                        }
                    }
                }
            }
            Change::Edit { old, new } => {
                let old_key = old
                    .row
                    .get(self.child_column)
                    .cloned()
                    .unwrap_or(Value::Null);
                let new_key = new
                    .row
                    .get(self.child_column)
                    .cloned()
                    .unwrap_or(Value::Null);
                if old_key != new_key {
                    // The child re-correlated: retract from the old parents,
                    // assert under the new ones.
                    self.push_child(Change::Remove(old))?;
                    self.push_child(Change::Add(new))?;
                    return Ok(());
                }
                if self.kind == JoinKind::Semi {
                    // Membership is untouched and the parent rows are the
                    // output; nothing to emit.
                    return Ok(());
                }
                let parents = self.parent_index.borrow().nodes(&old_key);
                for parent in parents {
                    output.push(Change::Edit {
                        old: self.compose(&parent, old.clone()),
                        new: self.compose(&parent, new.clone()),
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// Lazily expands parent nodes into join output nodes.
struct JoinStream<'a> {
    join: &'a Join,
    parents: NodeStream<'a>,
    pending: VecDeque<Node>,
    mode: Mode,
}

impl<'a> Iterator for JoinStream<'a> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        loop {
            if let Some(node) = self.pending.pop_front() {
                return Some(node);
            }
            let parent = self.parents.next()?;
            match self.join.expand(parent, self.mode) {
                Ok(nodes) => self.pending.extend(nodes),
                Err(err) => {
                    // Only reachable when the pipeline is torn down under a
                    // suspended stream, which the destroy contract forbids.
                    log::error!("join fetch aborted: {}", err);
                    return None;
                }
            }
        }
    }
}

impl Input for Join {
    fn schema(&self) -> Rc<Schema> {
        self.schema.clone()
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        Ok(Box::new(JoinStream {
            join: self,
            parents: self.parent.fetch(req)?,
            pending: VecDeque::new(),
            mode: Mode::Fetch,
        }))
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        Ok(Box::new(JoinStream {
            join: self,
            parents: self.parent.cleanup(req)?,
            pending: VecDeque::new(),
            mode: Mode::Cleanup,
        }))
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        *self.output.borrow_mut() = Some(output);
    }

    fn destroy(&self) -> Result<()> {
        self.parent.destroy()?;
        self.child.destroy()?;
        self.parent_index.borrow_mut().map.clear();
        self.match_counts.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::SourceChange;
    use crate::operator::test_support::CatchOutput;
    use crate::source::MemorySource;
    use rill_core::schema::TableBuilder;
    use rill_core::{DataType, Row};
    use rill_index::SortSpec;

    fn tracks() -> MemorySource {
        MemorySource::new(
            TableBuilder::new("track")
                .unwrap()
                .add_column("id", DataType::Int)
                .unwrap()
                .add_column("album_id", DataType::Int)
                .unwrap()
                .primary_key(&["id"])
                .unwrap()
                .build()
                .unwrap(),
        )
    }

    fn albums() -> MemorySource {
        MemorySource::new(
            TableBuilder::new("album")
                .unwrap()
                .add_column("id", DataType::Int)
                .unwrap()
                .primary_key(&["id"])
                .unwrap()
                .build()
                .unwrap(),
        )
    }

    fn track(id: i64, album: i64) -> Row {
        Row::new(vec![Value::Int(id), Value::Int(album)])
    }

    fn album(id: i64) -> Row {
        Row::new(vec![Value::Int(id)])
    }

    /// album (parent) <- track (child), correlated on album.id = track.album_id.
    fn album_tracks(kind: JoinKind) -> (MemorySource, MemorySource, Rc<Join>) {
        let album_source = albums();
        let track_source = tracks();
        let join = Join::new(JoinArgs {
            parent: album_source.connect(SortSpec::ascending(&[0]), Vec::new()),
            child: track_source.connect(SortSpec::ascending(&[0]), Vec::new()),
            kind,
            parent_key: CorrelationPath::root(0),
            child_column: 1,
            relationship: String::from("tracks"),
            hidden: false,
        });
        (album_source, track_source, join)
    }

    fn identities(join: &Join, changes: &[Change]) -> Vec<RowKey> {
        let schema = join.schema();
        changes.iter().map(|c| schema.identity(c.node())).collect()
    }

    #[test]
    fn test_fetch_joins_pairs() {
        let (album_source, track_source, join) = album_tracks(JoinKind::Inner);
        album_source.push(SourceChange::add(album(1))).unwrap();
        track_source.push(SourceChange::add(track(10, 1))).unwrap();
        track_source.push(SourceChange::add(track(11, 1))).unwrap();
        track_source.push(SourceChange::add(track(12, 2))).unwrap();

        let nodes: Vec<Node> = join.fetch(FetchRequest::all()).unwrap().collect();
        assert_eq!(nodes.len(), 2);
        for node in &nodes {
            assert_eq!(node.row, album(1));
            assert_eq!(node.relationship("tracks").unwrap().nodes.len(), 1);
        }
        let ids: Vec<RowKey> = nodes.iter().map(|n| join.schema().identity(n)).collect();
        assert_eq!(ids[0].values(), &[Value::Int(1), Value::Int(10)]);
        assert_eq!(ids[1].values(), &[Value::Int(1), Value::Int(11)]);
    }

    #[test]
    fn test_parent_add_emits_one_change_per_match() {
        let (album_source, track_source, join) = album_tracks(JoinKind::Inner);
        let out = CatchOutput::new();
        join.set_output(out.clone());

        for id in [10, 11, 12] {
            track_source.push(SourceChange::add(track(id, 1))).unwrap();
        }
        album_source.push(SourceChange::add(album(1))).unwrap();
        let adds = out.take();
        assert_eq!(adds.len(), 3);
        assert!(adds.iter().all(|c| c.is_add()));

        // Retraction mirrors the adds exactly, with identical identities.
        let add_ids = identities(&join, &adds);
        album_source.push(SourceChange::remove(album(1))).unwrap();
        let removes = out.take();
        assert_eq!(removes.len(), 3);
        assert!(removes.iter().all(|c| c.is_remove()));
        assert_eq!(identities(&join, &removes), add_ids);
    }

    #[test]
    fn test_retraction_from_child_side_matches() {
        let (album_source, track_source, join) = album_tracks(JoinKind::Inner);
        let out = CatchOutput::new();
        join.set_output(out.clone());

        album_source.push(SourceChange::add(album(1))).unwrap();
        for id in [10, 11] {
            track_source.push(SourceChange::add(track(id, 1))).unwrap();
        }
        let add_ids = identities(&join, &out.take());

        // Removing the children instead of the parent retracts the same set.
        for id in [10, 11] {
            track_source
                .push(SourceChange::remove(track(id, 1)))
                .unwrap();
        }
        let removes = out.take();
        assert!(removes.iter().all(|c| c.is_remove()));
        assert_eq!(identities(&join, &removes), add_ids);
    }

    #[test]
    fn test_unbalanced_input() {
        let (album_source, track_source, join) = album_tracks(JoinKind::Inner);
        let out = CatchOutput::new();
        join.set_output(out.clone());

        // Parent with no children: silence.
        album_source.push(SourceChange::add(album(1))).unwrap();
        assert!(out.take().is_empty());

        // The pair appears once the child arrives.
        track_source.push(SourceChange::add(track(10, 1))).unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_add());

        // Removing the child retracts it.
        track_source
            .push(SourceChange::remove(track(10, 1)))
            .unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_remove());

        // Re-adding restores it: no stale buffering.
        track_source.push(SourceChange::add(track(10, 1))).unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_add());
    }

    #[test]
    fn test_left_join_parent_only_transitions() {
        let (album_source, track_source, join) = album_tracks(JoinKind::Left);
        let out = CatchOutput::new();
        join.set_output(out.clone());

        // Unmatched parent surfaces with an empty relationship.
        album_source.push(SourceChange::add(album(1))).unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 1);
        let node = changes[0].node();
        assert!(node.relationship("tracks").unwrap().nodes.is_empty());

        // First child: the pair asserts, the parent-only result retracts.
        track_source.push(SourceChange::add(track(10, 1))).unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 2);
        assert!(changes[0].is_add());
        assert!(changes[1].is_remove());
        assert!(changes[1]
            .node()
            .relationship("tracks")
            .unwrap()
            .nodes
            .is_empty());

        // Last child gone: the parent-only result comes back.
        track_source
            .push(SourceChange::remove(track(10, 1)))
            .unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 2);
        assert!(changes[0].is_remove());
        assert!(changes[1].is_add());
    }

    #[test]
    fn test_semi_join_membership() {
        let (album_source, track_source, join) = album_tracks(JoinKind::Semi);
        let out = CatchOutput::new();
        join.set_output(out.clone());

        album_source.push(SourceChange::add(album(1))).unwrap();
        assert!(out.take().is_empty());

        // Parent appears once, however many children match.
        track_source.push(SourceChange::add(track(10, 1))).unwrap();
        track_source.push(SourceChange::add(track(11, 1))).unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_add());
        // Semi output carries no relationship.
        assert!(changes[0].node().relationships.is_empty());

        // It disappears only when the last child goes.
        track_source
            .push(SourceChange::remove(track(10, 1)))
            .unwrap();
        assert!(out.take().is_empty());
        track_source
            .push(SourceChange::remove(track(11, 1)))
            .unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_remove());
    }

    #[test]
    fn test_child_edit_without_recorrelation() {
        let (album_source, track_source, join) = album_tracks(JoinKind::Inner);
        let out = CatchOutput::new();
        join.set_output(out.clone());

        album_source.push(SourceChange::add(album(1))).unwrap();
        track_source.push(SourceChange::add(track(10, 1))).unwrap();
        out.take();

        track_source
            .push(SourceChange::edit(track(10, 1), track(10, 1)))
            .unwrap();
        let changes = out.take();
        assert!(matches!(changes.as_slice(), [Change::Edit { .. }]));
    }

    #[test]
    fn test_child_edit_recorrelates() {
        let (album_source, track_source, join) = album_tracks(JoinKind::Inner);
        let out = CatchOutput::new();
        join.set_output(out.clone());

        album_source.push(SourceChange::add(album(1))).unwrap();
        album_source.push(SourceChange::add(album(2))).unwrap();
        track_source.push(SourceChange::add(track(10, 1))).unwrap();
        out.take();

        // Track moves to album 2: retract under 1, assert under 2.
        track_source
            .push(SourceChange::edit(track(10, 1), track(10, 2)))
            .unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 2);
        assert!(changes[0].is_remove());
        assert_eq!(
            join.schema().identity(changes[0].node()).values(),
            &[Value::Int(1), Value::Int(10)]
        );
        assert!(changes[1].is_add());
        assert_eq!(
            join.schema().identity(changes[1].node()).values(),
            &[Value::Int(2), Value::Int(10)]
        );
    }

    #[test]
    fn test_chained_join_through_junction() {
        // track <- track_artist (junction, hidden) <- artist
        let track_source = tracks();
        let junction_source = MemorySource::new(
            TableBuilder::new("track_artist")
                .unwrap()
                .add_column("id", DataType::Int)
                .unwrap()
                .add_column("track_id", DataType::Int)
                .unwrap()
                .add_column("artist_id", DataType::Int)
                .unwrap()
                .primary_key(&["id"])
                .unwrap()
                .build()
                .unwrap(),
        );
        let artist_source = albums(); // same shape: single int pk

        let inner = Join::new(JoinArgs {
            parent: track_source.connect(SortSpec::ascending(&[0]), Vec::new()),
            child: junction_source.connect(SortSpec::ascending(&[0]), Vec::new()),
            kind: JoinKind::Inner,
            parent_key: CorrelationPath::root(0),
            child_column: 1,
            relationship: String::from("track_artist"),
            hidden: true,
        });
        let outer = Join::new(JoinArgs {
            parent: inner.clone(),
            child: artist_source.connect(SortSpec::ascending(&[0]), Vec::new()),
            kind: JoinKind::Inner,
            // The outer correlation reads through the junction relationship.
            parent_key: CorrelationPath::through("track_artist", 2),
            child_column: 0,
            relationship: String::from("artist"),
            hidden: false,
        });
        let out = CatchOutput::new();
        outer.set_output(out.clone());

        track_source.push(SourceChange::add(track(7, 0))).unwrap();
        artist_source.push(SourceChange::add(album(3))).unwrap();
        assert!(out.take().is_empty());

        // The junction row completes the 2-hop chain.
        junction_source
            .push(SourceChange::add(Row::new(vec![
                Value::Int(100),
                Value::Int(7),
                Value::Int(3),
            ])))
            .unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_add());
        let node = changes[0].node();
        assert_eq!(node.row, track(7, 0));
        // Composite identity spans all three constituents.
        assert_eq!(
            outer.schema().identity(node).values(),
            &[Value::Int(7), Value::Int(100), Value::Int(3)]
        );

        // Removing the junction row retracts the chain result.
        junction_source
            .push(SourceChange::remove(Row::new(vec![
                Value::Int(100),
                Value::Int(7),
                Value::Int(3),
            ])))
            .unwrap();
        let changes = out.take();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_remove());
    }
}
