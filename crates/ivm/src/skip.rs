//! The skip operator: a lower bound on a sorted stream.
//!
//! Skip implements a query's start position: everything sorting before the
//! bound (or at it, when the bound is exclusive) is invisible downstream,
//! for fetches and pushes alike.

use crate::change::Change;
use crate::operator::{
    output_port, Basis, FetchRequest, Input, NodeStream, Output, Schema, Start,
};
use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::cmp::Ordering;
use rill_core::{Error, Result, Row};

/// The skip bound: rows before `row` are dropped; `exclusive` also drops
/// the bound row itself.
#[derive(Clone, Debug)]
pub struct SkipBound {
    pub row: Row,
    pub exclusive: bool,
}

/// Bounds its input's stream below by a fixed row.
pub struct Skip {
    input: Rc<dyn Input>,
    bound: SkipBound,
    schema: Rc<Schema>,
    output: RefCell<Option<Rc<dyn Output>>>,
}

impl Skip {
    /// Creates a skip over `input` and wires itself as its output.
    pub fn new(input: Rc<dyn Input>, bound: SkipBound) -> Rc<Skip> {
        let schema = input.schema();
        let skip = Rc::new(Skip {
            input,
            bound,
            schema,
            output: RefCell::new(None),
        });
        skip.input.set_output(output_port(&skip, Skip::on_push));
        skip
    }

    /// True if the row falls below the bound and is invisible downstream.
    fn below_bound(&self, row: &Row) -> bool {
        match self.schema.comparator().compare(row, &self.bound.row) {
            Ordering::Less => true,
            Ordering::Equal => self.bound.exclusive,
            Ordering::Greater => false,
        }
    }

    /// Clamps a request's start to this operator's bound: whichever of the
    /// two positions is later wins.
    fn clamp_start(&self, start: Option<Start>) -> Start {
        let own = Start {
            row: self.bound.row.clone(),
            basis: if self.bound.exclusive {
                Basis::After
            } else {
                Basis::At
            },
        };
        match start {
            None => own,
            Some(start) => {
                match self
                    .schema
                    .comparator()
                    .compare(&start.row, &self.bound.row)
                {
                    Ordering::Greater => start,
                    Ordering::Less => own,
                    Ordering::Equal => {
                        // Same row: the more restrictive basis wins.
                        if start.basis == Basis::After || own.basis == Basis::After {
                            Start {
                                row: start.row,
                                basis: Basis::After,
                            }
                        } else {
                            own
                        }
                    }
                }
            }
        }
    }

    fn stream<'a>(&'a self, inner: NodeStream<'a>) -> NodeStream<'a> {
        // A `before` basis in the original request can step one row under
        // the clamped start; guard the stream's head against it.
        Box::new(inner.skip_while(move |node| self.below_bound(&node.row)))
    }

    fn on_push(&self, change: Change) -> Result<()> {
        let output = self
            .output
            .borrow()
            .clone()
            .ok_or_else(|| Error::invalid_operation("skip has no output"))?;
        match change {
            Change::Add(node) => {
                if !self.below_bound(&node.row) {
                    output.push(Change::Add(node))?;
                }
            }
            Change::Remove(node) => {
                if !self.below_bound(&node.row) {
                    output.push(Change::Remove(node))?;
                }
            }
            Change::Edit { old, new } => {
                let was_in = !self.below_bound(&old.row);
                let is_in = !self.below_bound(&new.row);
                match (was_in, is_in) {
                    (true, true) => output.push(Change::Edit { old, new })?,
                    (true, false) => output.push(Change::Remove(old))?,
                    (false, true) => output.push(Change::Add(new))?,
                    (false, false) => {}
                }
            }
        }
        Ok(())
    }
}

impl Input for Skip {
    fn schema(&self) -> Rc<Schema> {
        self.schema.clone()
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        let clamped = FetchRequest {
            constraint: req.constraint,
            start: Some(self.clamp_start(req.start)),
        };
        let inner = self.input.fetch(clamped)?;
        Ok(self.stream(inner))
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        let clamped = FetchRequest {
            constraint: req.constraint,
            start: Some(self.clamp_start(req.start)),
        };
        let inner = self.input.cleanup(clamped)?;
        Ok(self.stream(inner))
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        *self.output.borrow_mut() = Some(output);
    }

    fn destroy(&self) -> Result<()> {
        self.input.destroy()
    }
}
