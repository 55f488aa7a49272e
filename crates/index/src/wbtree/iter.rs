//! Weighted tree iterator implementation.

use super::node::{Node, NodeId};

/// In-order iterator over a `WeightedIndex`.
pub struct Iter<'a, T> {
    /// Reference to the arena of nodes.
    nodes: &'a [Node<T>],
    /// Nodes whose value and right subtree are still to be visited.
    stack: Vec<NodeId>,
    /// Items left to yield.
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(nodes: &'a [Node<T>], root: Option<NodeId>, len: usize) -> Self {
        let mut iter = Self {
            nodes,
            stack: Vec::new(),
            remaining: len,
        };
        iter.push_left_spine(root);
        iter
    }

    fn push_left_spine(&mut self, mut current: Option<NodeId>) {
        while let Some(id) = current {
            self.stack.push(id);
            current = self.nodes[id].left;
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let nodes = self.nodes;
        self.push_left_spine(nodes[id].right);
        self.remaining -= 1;
        Some(&nodes[id].value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
