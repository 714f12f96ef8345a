//! Rill Reactive - subscription layer over materialized views.
//!
//! Bridges the synchronous IVM world to external consumers that want diff
//! notifications rather than raw pushes:
//!
//! - `ChangeSet`: the ops applied since the last flush, in arrival order,
//!   plus the resulting snapshot
//! - `SubscriptionManager`: id-allocating callback registry
//! - `QueryHandle`: owns a pipeline and its view; hydrates once, applies
//!   pushes eagerly, and replays buffered diffs to every subscriber on
//!   `flush()`
//!
//! Batching lives here by design: the IVM core never queues. A consumer
//! that wants one render per frame processes pushes eagerly (they arrive
//! mid-transaction and must not be deferred) and flushes on its own tick.

#![no_std]

extern crate alloc;

pub mod change_set;
pub mod subscription;
pub mod watch;

pub use change_set::{ChangeSet, ViewOp};
pub use subscription::{Subscription, SubscriptionId, SubscriptionManager};
pub use watch::QueryHandle;
