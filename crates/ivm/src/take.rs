//! The take operator: limit queries.
//!
//! Take admits the first `limit` nodes of its input and keeps a *bound* —
//! the last admitted row — so it can judge every incoming push without
//! rescanning. When the window's membership changes, replacement rows are
//! pulled from the input with positioned fetches (`before`/`at`/`after` the
//! bound); those fetches run inside push dissemination, so the overlay makes
//! them consistent with the in-flight change.

use crate::change::{Change, Node};
use crate::operator::{
    output_port, Basis, FetchRequest, Input, NodeStream, Output, Schema, Start,
};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use rill_core::{Error, Result, Row};

/// The operator-local window state: how many rows are admitted and the last
/// of them. `bound: None` with a non-zero size never occurs; `None` means
/// the window is empty.
#[derive(Clone, Debug)]
struct TakeState {
    size: usize,
    bound: Option<Row>,
}

/// Admits the first `limit` nodes of its input.
pub struct Take {
    input: Rc<dyn Input>,
    limit: usize,
    schema: Rc<Schema>,
    state: RefCell<Option<TakeState>>,
    output: RefCell<Option<Rc<dyn Output>>>,
}

impl Take {
    /// Creates a take over `input` and wires itself as its output.
    pub fn new(input: Rc<dyn Input>, limit: usize) -> Rc<Take> {
        let schema = input.schema();
        let take = Rc::new(Take {
            input,
            limit,
            schema,
            state: RefCell::new(None),
            output: RefCell::new(None),
        });
        take.input.set_output(output_port(&take, Take::on_push));
        take
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        self.schema.comparator().compare(a, b)
    }

    fn out(&self) -> Result<Rc<dyn Output>> {
        self.output
            .borrow()
            .clone()
            .ok_or_else(|| Error::invalid_operation("take has no output"))
    }

    fn set_state(&self, size: usize, bound: Option<Row>) {
        *self.state.borrow_mut() = Some(TakeState { size, bound });
    }

    /// First node of a positioned fetch against the input.
    fn fetch_first(&self, row: &Row, basis: Basis) -> Result<Option<Node>> {
        let mut stream = self.input.fetch(FetchRequest {
            constraint: None,
            start: Some(Start {
                row: row.clone(),
                basis,
            }),
        })?;
        Ok(stream.next())
    }

    /// The window predecessor of `bound`: the row before it in the input's
    /// current (overlay-consistent) order, or None when the bound is first.
    fn row_before(&self, bound: &Row) -> Result<Option<Row>> {
        match self.fetch_first(bound, Basis::Before)? {
            Some(node) if self.compare(&node.row, bound) != Ordering::Equal => {
                Ok(Some(node.row))
            }
            _ => Ok(None),
        }
    }

    fn on_push(&self, change: Change) -> Result<()> {
        if let Change::Edit { old, new } = change {
            return self.on_edit(old, new);
        }

        let Some(state) = self.state.borrow().clone() else {
            // Not hydrated: no window to maintain, nothing downstream yet.
            return Ok(());
        };
        let output = self.out()?;

        match change {
            Change::Add(node) => {
                if state.size < self.limit {
                    let bound = match state.bound {
                        Some(bound) if self.compare(&bound, &node.row) != Ordering::Less => {
                            Some(bound)
                        }
                        _ => Some(node.row.clone()),
                    };
                    self.set_state(state.size + 1, bound);
                    output.push(Change::Add(node))?;
                    return Ok(());
                }
                let Some(bound) = state.bound else {
                    // limit is zero; nothing is ever admitted.
                    return Ok(());
                };
                if self.compare(&node.row, &bound) != Ordering::Less {
                    return Ok(());
                }
                // The new row lands inside a full window: the bound row is
                // pushed out and the window's new last row is whichever of
                // the bound's predecessor and the new row is greater.
                let bound_node = self
                    .fetch_first(&bound, Basis::At)?
                    .ok_or_else(|| Error::invalid_operation("take bound row missing"))?;
                let new_bound = match self.row_before(&bound)? {
                    Some(prev) => prev,
                    None => node.row.clone(),
                };
                self.set_state(state.size, Some(new_bound));
                output.push(Change::Remove(bound_node))?;
                output.push(Change::Add(node))?;
            }
            Change::Remove(node) => {
                let Some(bound) = state.bound else {
                    return Ok(());
                };
                if self.compare(&node.row, &bound) == Ordering::Greater {
                    // Outside the window; invisible either way.
                    return Ok(());
                }
                // A window row left. The first row past the bound (the
                // overlay already hides the removed row) slides in.
                if let Some(next) = self.fetch_first(&bound, Basis::After)? {
                    self.set_state(state.size, Some(next.row.clone()));
                    output.push(Change::Remove(node))?;
                    output.push(Change::Add(next))?;
                    return Ok(());
                }
                // Nothing to backfill with: the window shrinks.
                let new_bound = if self.compare(&node.row, &bound) == Ordering::Equal {
                    self.row_before(&bound)?
                } else {
                    Some(bound)
                };
                self.set_state(state.size - 1, new_bound);
                output.push(Change::Remove(node))?;
            }
            Change::Edit { .. } => unreachable!("handled above"),
        }
        Ok(())
    }

    fn on_edit(&self, old: Node, new: Node) -> Result<()> {
        let Some(state) = self.state.borrow().clone() else {
            return Ok(());
        };
        let output = self.out()?;
        let Some(bound) = state.bound.clone() else {
            // Empty window: nothing visible before or after.
            return Ok(());
        };

        let old_cmp = self.compare(&old.row, &bound);
        let new_cmp = self.compare(&new.row, &bound);

        if old_cmp == Ordering::Equal {
            // The bound row itself was edited.
            if new_cmp == Ordering::Equal {
                output.push(Change::Edit { old, new })?;
                return Ok(());
            }
            if new_cmp == Ordering::Less {
                if self.limit == 1 {
                    self.set_state(state.size, Some(new.row.clone()));
                    output.push(Change::Edit { old, new })?;
                    return Ok(());
                }
                // The row moved down inside the window; the new bound is the
                // old bound's predecessor in the post-change order.
                let new_bound = self.row_before(&bound)?.unwrap_or_else(|| new.row.clone());
                self.set_state(state.size, Some(new_bound));
                output.push(Change::Edit { old, new })?;
                return Ok(());
            }
            // The bound row moved past the end of the window. The row now
            // occupying the old bound position is the replacement; when that
            // is the edited row itself, the window is unchanged.
            match self.fetch_first(&bound, Basis::At)? {
                Some(node) if self.compare(&node.row, &new.row) == Ordering::Equal => {
                    self.set_state(state.size, Some(new.row.clone()));
                    output.push(Change::Edit { old, new })?;
                }
                Some(node) => {
                    self.set_state(state.size, Some(node.row.clone()));
                    output.push(Change::Remove(old))?;
                    output.push(Change::Add(node))?;
                }
                None => {
                    let new_bound = self.row_before(&bound)?;
                    self.set_state(state.size - 1, new_bound);
                    output.push(Change::Remove(old))?;
                }
            }
            return Ok(());
        }

        if old_cmp == Ordering::Greater {
            if new_cmp == Ordering::Greater {
                // Outside before and after.
                return Ok(());
            }
            // Entered the window from outside: the bound row is pushed out.
            let bound_node = self
                .fetch_first(&bound, Basis::At)?
                .ok_or_else(|| Error::invalid_operation("take bound row missing"))?;
            let new_bound = self.row_before(&bound)?.unwrap_or_else(|| new.row.clone());
            self.set_state(state.size, Some(new_bound));
            output.push(Change::Remove(bound_node))?;
            output.push(Change::Add(new))?;
            return Ok(());
        }

        // old_cmp == Less: the row was inside the window.
        if new_cmp == Ordering::Less {
            output.push(Change::Edit { old, new })?;
            return Ok(());
        }
        // Moved at or past the bound: the row after the bound (the overlay
        // already shows the edit) either is the row itself — still last of
        // the window — or replaces it.
        match self.fetch_first(&bound, Basis::After)? {
            Some(node) if self.compare(&node.row, &new.row) == Ordering::Equal => {
                self.set_state(state.size, Some(new.row.clone()));
                output.push(Change::Edit { old, new })?;
            }
            Some(node) => {
                self.set_state(state.size, Some(node.row.clone()));
                output.push(Change::Remove(old))?;
                output.push(Change::Add(node))?;
            }
            None => {
                self.set_state(state.size, Some(new.row.clone()));
                output.push(Change::Edit { old, new })?;
            }
        }
        Ok(())
    }

    fn initial_fetch(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        if req.start.is_some() || req.constraint.is_some() {
            return Err(Error::invalid_operation(
                "take serves positioned fetches only after hydration",
            ));
        }
        let mut nodes: Vec<Node> = Vec::new();
        if self.limit > 0 {
            for node in self.input.fetch(req)? {
                nodes.push(node);
                if nodes.len() == self.limit {
                    break;
                }
            }
        }
        self.set_state(nodes.len(), nodes.last().map(|n| n.row.clone()));
        Ok(Box::new(nodes.into_iter()))
    }
}

impl Input for Take {
    fn schema(&self) -> Rc<Schema> {
        self.schema.clone()
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        let state = self.state.borrow().clone();
        let Some(state) = state else {
            return self.initial_fetch(req);
        };
        let Some(bound) = state.bound else {
            return Ok(Box::new(core::iter::empty()));
        };
        let inner = self.input.fetch(req)?;
        let schema = self.schema.clone();
        Ok(Box::new(inner.take_while(move |node| {
            schema.comparator().compare(&bound, &node.row) != Ordering::Less
        })))
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        *self.state.borrow_mut() = None;
        let limit = self.limit;
        Ok(Box::new(self.input.cleanup(req)?.take(limit)))
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        *self.output.borrow_mut() = Some(output);
    }

    fn destroy(&self) -> Result<()> {
        *self.state.borrow_mut() = None;
        self.input.destroy()
    }
}
