//! The filter operator.

use crate::change::Change;
use crate::operator::{
    output_port, FetchRequest, Input, NodeStream, Output, RowPredicate, Schema,
};
use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;
use rill_core::{Error, Result};

/// A stateless operator passing through nodes whose root row satisfies a
/// predicate. An edit whose sides differ in membership degrades to the
/// add or remove its consumer actually observes.
pub struct Filter {
    input: Rc<dyn Input>,
    predicate: RowPredicate,
    schema: Rc<Schema>,
    output: RefCell<Option<Rc<dyn Output>>>,
}

impl Filter {
    /// Creates a filter over `input` and wires itself as its output.
    pub fn new(input: Rc<dyn Input>, predicate: RowPredicate) -> Rc<Filter> {
        let schema = input.schema();
        let filter = Rc::new(Filter {
            input,
            predicate,
            schema,
            output: RefCell::new(None),
        });
        filter.input.set_output(output_port(&filter, Filter::on_push));
        filter
    }

    fn out(&self) -> Result<Rc<dyn Output>> {
        self.output
            .borrow()
            .clone()
            .ok_or_else(|| Error::invalid_operation("filter has no output"))
    }

    fn on_push(&self, change: Change) -> Result<()> {
        let output = self.out()?;
        match change {
            Change::Add(node) => {
                if (self.predicate)(&node.row) {
                    output.push(Change::Add(node))?;
                }
            }
            Change::Remove(node) => {
                if (self.predicate)(&node.row) {
                    output.push(Change::Remove(node))?;
                }
            }
            Change::Edit { old, new } => {
                let was_in = (self.predicate)(&old.row);
                let is_in = (self.predicate)(&new.row);
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

impl Input for Filter {
    fn schema(&self) -> Rc<Schema> {
        self.schema.clone()
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        let predicate = self.predicate.clone();
        Ok(Box::new(
            self.input
                .fetch(req)?
                .filter(move |node| predicate(&node.row)),
        ))
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream<'_>> {
        let predicate = self.predicate.clone();
        Ok(Box::new(
            self.input
                .cleanup(req)?
                .filter(move |node| predicate(&node.row)),
        ))
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        *self.output.borrow_mut() = Some(output);
    }

    fn destroy(&self) -> Result<()> {
        self.input.destroy()
    }
}
