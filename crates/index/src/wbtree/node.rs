//! Weighted tree node definitions.

/// Node identifier in the tree arena.
pub type NodeId = usize;

/// A node in the weighted tree.
#[derive(Clone, Debug)]
pub(crate) struct Node<T> {
    /// The stored item.
    pub value: T,
    /// Left child (items ordered before `value`).
    pub left: Option<NodeId>,
    /// Right child (items ordered after `value`).
    pub right: Option<NodeId>,
    /// Number of nodes in the subtree rooted here, this one included.
    pub size: usize,
}

impl<T> Node<T> {
    /// Creates a new leaf node.
    pub fn leaf(value: T) -> Self {
        Self {
            value,
            left: None,
            right: None,
            size: 1,
        }
    }
}
