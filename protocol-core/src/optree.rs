//! The op-tree: an immutable, shared-owned tree of operation nodes.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::operation::Operation;

/// One node of an op-tree: an operation plus its ordered children.
///
/// Nodes are never mutated after construction. Callables embed a shared
/// reference to a sub-tree rather than copying it.
#[derive(Debug)]
pub struct OpTreeNode {
    pub operation: Operation,
    pub children: Vec<Arc<OpTreeNode>>,
}

impl OpTreeNode {
    pub fn leaf(operation: Operation) -> Arc<OpTreeNode> {
        Arc::new(OpTreeNode {
            operation,
            children: Vec::new(),
        })
    }

    pub fn with_children(operation: Operation, children: Vec<Arc<OpTreeNode>>) -> Arc<OpTreeNode> {
        Arc::new(OpTreeNode { operation, children })
    }
}

/// A complete compiled program: a root node plus the global pad bindings it
/// expects to find already planted (e.g. `agent`, initial protocol state).
pub struct OpTree {
    pub root: Arc<OpTreeNode>,
    pub globals: BTreeMap<String, crate::value::Value>,
}
