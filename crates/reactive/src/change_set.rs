//! Change sets delivered to subscribers.

use alloc::vec::Vec;
use rill_ivm::Node;

/// One materialized change, as a view applied it.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewOp {
    Added(Node),
    Removed(Node),
    Edited { old: Node, new: Node },
}

/// The changes applied to a query result since the last notification.
///
/// `ops` preserves arrival order exactly — a subscriber replaying them one
/// by one reconstructs every intermediate state the view went through.
/// `snapshot` is the complete result after the last op.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    pub ops: Vec<ViewOp>,
    pub snapshot: Vec<Node>,
}

impl ChangeSet {
    /// Creates a change set from buffered ops and the current snapshot.
    pub fn new(ops: Vec<ViewOp>, snapshot: Vec<Node>) -> Self {
        Self { ops, snapshot }
    }

    /// The initial notification: every current row as an addition.
    pub fn initial(snapshot: Vec<Node>) -> Self {
        Self {
            ops: snapshot.iter().cloned().map(ViewOp::Added).collect(),
            snapshot,
        }
    }

    /// Returns true if no ops were recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the number of ops.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// The added nodes, in arrival order.
    pub fn added(&self) -> impl Iterator<Item = &Node> {
        self.ops.iter().filter_map(|op| match op {
            ViewOp::Added(node) => Some(node),
            _ => None,
        })
    }

    /// The removed nodes, in arrival order.
    pub fn removed(&self) -> impl Iterator<Item = &Node> {
        self.ops.iter().filter_map(|op| match op {
            ViewOp::Removed(node) => Some(node),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use rill_core::{Row, Value};

    fn node(id: i64) -> Node {
        Node::leaf(Row::new(vec![Value::Int(id)]))
    }

    #[test]
    fn test_initial() {
        let cs = ChangeSet::initial(vec![node(1), node(2)]);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs.added().count(), 2);
        assert_eq!(cs.removed().count(), 0);
        assert_eq!(cs.snapshot.len(), 2);
    }

    #[test]
    fn test_ops_preserve_order() {
        let cs = ChangeSet::new(
            vec![
                ViewOp::Added(node(1)),
                ViewOp::Removed(node(1)),
                ViewOp::Added(node(2)),
            ],
            vec![node(2)],
        );
        assert_eq!(cs.len(), 3);
        // Interleaving survives: add, remove, add.
        assert!(matches!(cs.ops[0], ViewOp::Added(_)));
        assert!(matches!(cs.ops[1], ViewOp::Removed(_)));
        assert!(matches!(cs.ops[2], ViewOp::Added(_)));
    }

    #[test]
    fn test_empty() {
        let cs = ChangeSet::default();
        assert!(cs.is_empty());
    }
}
