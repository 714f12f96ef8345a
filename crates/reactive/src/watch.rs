//! Query handles: a hydrated view plus diff fan-out.

use crate::change_set::{ChangeSet, ViewOp};
use crate::subscription::{SubscriptionId, SubscriptionManager};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use rill_core::Result;
use rill_ivm::{output_port, strip_hidden, ArrayView, Change, Input, Node};

/// Owns one live query: the pipeline root, its materialized view, and the
/// subscribers interested in its diffs.
///
/// Pushes are applied to the view eagerly, in arrival order, and recorded
/// into an op buffer. `flush()` replays the buffer — still in arrival
/// order — to every subscriber along with the post-change snapshot, which
/// is the consumer-side batching point (one notification per frame rather
/// than per push).
pub struct QueryHandle {
    view: Rc<ArrayView>,
    ops: RefCell<Vec<ViewOp>>,
    subscriptions: RefCell<SubscriptionManager>,
}

impl QueryHandle {
    /// Creates a handle over a pipeline root and wires itself as its
    /// output.
    pub fn new(root: Rc<dyn Input>) -> Rc<QueryHandle> {
        let view = ArrayView::detached(root.clone());
        let handle = Rc::new(QueryHandle {
            view,
            ops: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(SubscriptionManager::new()),
        });
        root.set_output(output_port(&handle, QueryHandle::on_push));
        handle
    }

    fn on_push(&self, change: Change) -> Result<()> {
        let schema = self.view.schema();
        let op = match &change {
            Change::Add(node) => ViewOp::Added(strip_hidden(&schema, node.clone())),
            Change::Remove(node) => ViewOp::Removed(strip_hidden(&schema, node.clone())),
            Change::Edit { old, new } => ViewOp::Edited {
                old: strip_hidden(&schema, old.clone()),
                new: strip_hidden(&schema, new.clone()),
            },
        };
        self.ops.borrow_mut().push(op);
        self.view.apply(change)
    }

    /// Performs the initial fetch and delivers the initial change set.
    pub fn hydrate(&self) -> Result<()> {
        self.view.hydrate()?;
        let initial = ChangeSet::initial(self.view.rows());
        self.subscriptions.borrow().notify_all(&initial);
        Ok(())
    }

    /// Returns the current snapshot.
    pub fn rows(&self) -> Vec<Node> {
        self.view.rows()
    }

    /// Returns the number of materialized results.
    pub fn len(&self) -> usize {
        self.view.len()
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Subscribes to flushed change sets. A hydrated handle delivers the
    /// current snapshot to the new subscriber immediately.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + 'static,
    {
        let deliver_now = self.view.is_hydrated();
        let id = self.subscriptions.borrow_mut().subscribe(callback);
        if deliver_now {
            let initial = ChangeSet::initial(self.view.rows());
            self.subscriptions.borrow().notify(id, &initial);
        }
        id
    }

    /// Unsubscribes by ID. Returns true if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.borrow_mut().unsubscribe(id)
    }

    /// Returns the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Delivers buffered ops to all subscribers, in arrival order, with
    /// the current snapshot. A handle with no buffered ops stays silent.
    pub fn flush(&self) {
        let ops = self.ops.take();
        if ops.is_empty() {
            return;
        }
        let changes = ChangeSet::new(ops, self.view.rows());
        self.subscriptions.borrow().notify_all(&changes);
    }

    /// Tears down the pipeline and releases all subscriptions.
    pub fn destroy(&self) -> Result<()> {
        self.subscriptions.borrow_mut().clear();
        self.ops.borrow_mut().clear();
        self.view.destroy()
    }
}
