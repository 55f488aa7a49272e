//! Weighted tree implementation.

use super::iter::Iter;
use super::node::{Node, NodeId};
use super::{BALANCE_FACTOR, ROTATION_FACTOR};
use crate::comparator::{Comparator, NaturalComparator};
use core::cmp::Ordering;
use fluid_core::{Error, Result};

/// What `insert` does when the index already holds a comparator-equal item.
///
/// Membership in a `WeightedIndex` is decided by the comparator alone, so two
/// distinct values with the same sort key occupy a single slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// The stored item stays; the new one is dropped.
    #[default]
    KeepExisting,
    /// The stored item is overwritten in place by the new one.
    ReplaceExisting,
}

/// A weight-balanced ordered index.
///
/// Nodes live in an arena and reference each other by [`NodeId`]; removing
/// an item moves the last arena slot into the freed one so the arena stays
/// dense.
#[derive(Clone, Debug)]
pub struct WeightedIndex<T, C = NaturalComparator> {
    /// Arena of all nodes.
    nodes: Vec<Node<T>>,
    /// Root node ID.
    root: Option<NodeId>,
    /// Comparator for item ordering and membership.
    comparator: C,
    /// Handling of comparator-equal inserts.
    policy: DuplicatePolicy,
    /// Bumped on every change to the stored items.
    version: u64,
}

impl<T: Ord> WeightedIndex<T> {
    /// Creates an empty index in ascending natural order.
    pub fn new() -> Self {
        Self::with_comparator(NaturalComparator::asc())
    }
}

impl<T: Ord> Default for WeightedIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Comparator<T>> WeightedIndex<T, C> {
    /// Creates an empty index ordered by `comparator`.
    pub fn with_comparator(comparator: C) -> Self {
        Self::with_policy(comparator, DuplicatePolicy::default())
    }

    /// Creates an empty index with an explicit duplicate policy.
    pub fn with_policy(comparator: C, policy: DuplicatePolicy) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            comparator,
            policy,
            version: 0,
        }
    }

    /// Returns the comparator of this index.
    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Returns the duplicate policy of this index.
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    /// Returns true if the index holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the modification counter.
    ///
    /// Any insert, replacement, removal or clear changes the value, so a
    /// cursor that re-acquires the index between steps can detect that the
    /// sequence it was walking no longer exists.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.bump();
    }

    /// Inserts an item, returning false if a comparator-equal item was present.
    ///
    /// With [`DuplicatePolicy::ReplaceExisting`] the present item is
    /// overwritten, but the call still returns false.
    pub fn insert(&mut self, value: T) -> bool {
        let (root, added) = self.insert_at(self.root, value);
        self.root = Some(root);
        added
    }

    /// Removes the comparator-equal item, returning false if there was none.
    pub fn remove(&mut self, value: &T) -> bool {
        self.take(value).is_some()
    }

    /// Removes the comparator-equal item and returns the stored value.
    pub fn take(&mut self, value: &T) -> Option<T> {
        let (root, detached) = self.remove_at(self.root, value);
        self.root = root;
        let id = detached?;
        self.bump();
        Some(self.release(id))
    }

    /// Returns true if a comparator-equal item is present.
    pub fn contains(&self, value: &T) -> bool {
        self.find(value).is_some()
    }

    /// Returns the stored item that compares equal to `value`.
    pub fn get(&self, value: &T) -> Option<&T> {
        self.find(value).map(|id| &self.nodes[id].value)
    }

    /// Returns the position of `value` in sort order.
    ///
    /// `Ok(i)` when the item is present; otherwise `Err(i)` where `i` is the
    /// position at which it would be inserted.
    pub fn rank(&self, value: &T) -> core::result::Result<usize, usize> {
        let mut current = self.root;
        let mut offset = 0;

        while let Some(id) = current {
            let node = &self.nodes[id];
            match self.comparator.compare(value, &node.value) {
                Ordering::Less => current = node.left,
                Ordering::Greater => {
                    offset += self.size(node.left) + 1;
                    current = node.right;
                }
                Ordering::Equal => return Ok(offset + self.size(node.left)),
            }
        }

        Err(offset)
    }

    /// Returns the position of `value`, or None if absent.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.rank(value).ok()
    }

    /// Returns the item at `index` in sort order.
    pub fn at(&self, index: usize) -> Result<&T> {
        let len = self.len();
        let mut current = self.root;
        let mut remaining = index;

        while let Some(id) = current {
            let node = &self.nodes[id];
            let left = self.size(node.left);
            match remaining.cmp(&left) {
                Ordering::Less => current = node.left,
                Ordering::Equal => return Ok(&node.value),
                Ordering::Greater => {
                    remaining -= left + 1;
                    current = node.right;
                }
            }
        }

        Err(Error::index_out_of_range(index, len))
    }

    /// Returns the first item in sort order.
    pub fn min(&self) -> Option<&T> {
        let mut id = self.root?;
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        Some(&self.nodes[id].value)
    }

    /// Returns the last item in sort order.
    pub fn max(&self) -> Option<&T> {
        let mut id = self.root?;
        while let Some(right) = self.nodes[id].right {
            id = right;
        }
        Some(&self.nodes[id].value)
    }

    /// Returns an in-order iterator over the items.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(&self.nodes, self.root, self.len())
    }

    /// Checks the ordering, size and weight-balance invariants of every node.
    pub fn is_weight_balanced(&self) -> bool {
        self.check_subtree(self.root).is_some()
    }

    /// Returns the subtree size if the subtree rooted at `at` is valid.
    fn check_subtree(&self, at: Option<NodeId>) -> Option<usize> {
        let id = match at {
            Some(id) => id,
            None => return Some(0),
        };
        let node = &self.nodes[id];
        let left = self.check_subtree(node.left)?;
        let right = self.check_subtree(node.right)?;

        let ordered_left = node
            .left
            .map_or(true, |l| self.comparator.is_less(&self.nodes[l].value, &node.value));
        let ordered_right = node
            .right
            .map_or(true, |r| self.comparator.is_greater(&self.nodes[r].value, &node.value));
        let left_weight = (left + 1) as f64;
        let right_weight = (right + 1) as f64;
        let balanced =
            left_weight <= BALANCE_FACTOR * right_weight && right_weight <= BALANCE_FACTOR * left_weight;

        if ordered_left && ordered_right && balanced && node.size == left + right + 1 {
            Some(node.size)
        } else {
            None
        }
    }

    fn find(&self, value: &T) -> Option<NodeId> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = &self.nodes[id];
            current = match self.comparator.compare(value, &node.value) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    /// Inserts below `at`, returning the new subtree root and whether a node was added.
    fn insert_at(&mut self, at: Option<NodeId>, value: T) -> (NodeId, bool) {
        let id = match at {
            Some(id) => id,
            None => return (self.alloc(value), true),
        };

        let added = match self.comparator.compare(&value, &self.nodes[id].value) {
            Ordering::Less => {
                let (left, added) = self.insert_at(self.nodes[id].left, value);
                self.nodes[id].left = Some(left);
                added
            }
            Ordering::Greater => {
                let (right, added) = self.insert_at(self.nodes[id].right, value);
                self.nodes[id].right = Some(right);
                added
            }
            Ordering::Equal => {
                if self.policy == DuplicatePolicy::ReplaceExisting {
                    self.nodes[id].value = value;
                    self.bump();
                }
                false
            }
        };

        if added {
            self.update_size(id);
            (self.balance(id), true)
        } else {
            (id, false)
        }
    }

    /// Removes below `at`, returning the new subtree root and the detached node.
    ///
    /// The detached node holds the removed value and is no longer reachable
    /// from the root.
    fn remove_at(&mut self, at: Option<NodeId>, value: &T) -> (Option<NodeId>, Option<NodeId>) {
        let id = match at {
            Some(id) => id,
            None => return (None, None),
        };

        let detached = match self.comparator.compare(value, &self.nodes[id].value) {
            Ordering::Less => {
                let (left, detached) = self.remove_at(self.nodes[id].left, value);
                self.nodes[id].left = left;
                detached
            }
            Ordering::Greater => {
                let (right, detached) = self.remove_at(self.nodes[id].right, value);
                self.nodes[id].right = right;
                detached
            }
            Ordering::Equal => match (self.nodes[id].left, self.nodes[id].right) {
                (None, right) => return (right, Some(id)),
                (left, None) => return (left, Some(id)),
                (Some(_), Some(right)) => {
                    // The in-order successor takes this node's place.
                    let (rest, successor) = self.remove_min(right);
                    self.nodes[id].right = rest;
                    self.swap_values(id, successor);
                    Some(successor)
                }
            },
        };

        if detached.is_some() {
            self.update_size(id);
            (Some(self.balance(id)), detached)
        } else {
            (Some(id), None)
        }
    }

    /// Unlinks the minimum of the subtree at `id`, returning the new root and the minimum.
    fn remove_min(&mut self, id: NodeId) -> (Option<NodeId>, NodeId) {
        match self.nodes[id].left {
            None => (self.nodes[id].right, id),
            Some(left) => {
                let (rest, min) = self.remove_min(left);
                self.nodes[id].left = rest;
                self.update_size(id);
                (Some(self.balance(id)), min)
            }
        }
    }

    fn balance(&mut self, id: NodeId) -> NodeId {
        let left = self.nodes[id].left;
        let right = self.nodes[id].right;
        let left_weight = self.weight(left);
        let right_weight = self.weight(right);

        if left_weight > BALANCE_FACTOR * right_weight {
            if let Some(child) = left {
                let outer = self.weight(self.nodes[child].left);
                let inner = self.weight(self.nodes[child].right);
                if inner >= ROTATION_FACTOR * outer {
                    let rotated = self.rotate_left(child);
                    self.nodes[id].left = Some(rotated);
                }
                return self.rotate_right(id);
            }
        } else if right_weight > BALANCE_FACTOR * left_weight {
            if let Some(child) = right {
                let outer = self.weight(self.nodes[child].right);
                let inner = self.weight(self.nodes[child].left);
                if inner >= ROTATION_FACTOR * outer {
                    let rotated = self.rotate_right(child);
                    self.nodes[id].right = Some(rotated);
                }
                return self.rotate_left(id);
            }
        }

        id
    }

    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let pivot = match self.nodes[id].right {
            Some(pivot) => pivot,
            None => return id,
        };
        self.nodes[id].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(id);
        self.update_size(id);
        self.update_size(pivot);
        pivot
    }

    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let pivot = match self.nodes[id].left {
            Some(pivot) => pivot,
            None => return id,
        };
        self.nodes[id].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(id);
        self.update_size(id);
        self.update_size(pivot);
        pivot
    }

    /// Frees a detached node, moving the last arena slot into its place.
    fn release(&mut self, id: NodeId) -> T {
        let last = self.nodes.len() - 1;
        if id != last {
            match self.parent_of(last) {
                Some(parent) => {
                    let node = &mut self.nodes[parent];
                    if node.left == Some(last) {
                        node.left = Some(id);
                    } else {
                        node.right = Some(id);
                    }
                }
                None => self.root = Some(id),
            }
        }
        self.nodes.swap_remove(id).value
    }

    /// Finds the parent of a reachable node by searching for its value.
    fn parent_of(&self, target: NodeId) -> Option<NodeId> {
        let mut parent = None;
        let mut current = self.root;
        while let Some(id) = current {
            if id == target {
                break;
            }
            parent = Some(id);
            current = match self.comparator.compare(&self.nodes[target].value, &self.nodes[id].value) {
                Ordering::Less => self.nodes[id].left,
                _ => self.nodes[id].right,
            };
        }
        parent
    }

    fn alloc(&mut self, value: T) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::leaf(value));
        self.bump();
        id
    }

    fn swap_values(&mut self, a: NodeId, b: NodeId) {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.nodes.split_at_mut(hi);
        core::mem::swap(&mut head[lo].value, &mut tail[0].value);
    }

    #[inline]
    fn update_size(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let size = 1 + self.size(node.left) + self.size(node.right);
        self.nodes[id].size = size;
    }

    #[inline]
    fn size(&self, id: Option<NodeId>) -> usize {
        id.map_or(0, |id| self.nodes[id].size)
    }

    #[inline]
    fn weight(&self, id: Option<NodeId>) -> f64 {
        (self.size(id) + 1) as f64
    }

    #[inline]
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

impl<T, C: Comparator<T>> Extend<T> for WeightedIndex<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for WeightedIndex<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut index = Self::new();
        index.extend(iter);
        index
    }
}

impl<'a, T, C: Comparator<T>> IntoIterator for &'a WeightedIndex<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{KeyComparator, Order};

    fn items<T: Clone, C: Comparator<T>>(index: &WeightedIndex<T, C>) -> Vec<T> {
        index.iter().cloned().collect()
    }

    #[test]
    fn test_index_new() {
        let index: WeightedIndex<i32> = WeightedIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.min(), None);
        assert_eq!(index.max(), None);
        assert!(index.is_weight_balanced());
    }

    #[test]
    fn test_index_insert_contains() {
        let mut index = WeightedIndex::new();
        assert!(index.insert(10));
        assert!(index.insert(20));
        assert!(index.insert(5));

        assert!(index.contains(&10));
        assert!(index.contains(&5));
        assert!(!index.contains(&15));
        assert_eq!(index.len(), 3);
        assert_eq!(items(&index), vec![5, 10, 20]);
    }

    #[test]
    fn test_index_duplicate_keep_existing() {
        let mut index = WeightedIndex::with_comparator(KeyComparator::new(|p: &(i32, char)| p.0, Order::Asc));
        assert!(index.insert((1, 'a')));
        assert!(!index.insert((1, 'b')));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&(1, 'z')), Some(&(1, 'a')));
    }

    #[test]
    fn test_index_duplicate_replace_existing() {
        let mut index = WeightedIndex::with_policy(
            KeyComparator::new(|p: &(i32, char)| p.0, Order::Asc),
            DuplicatePolicy::ReplaceExisting,
        );
        assert!(index.insert((1, 'a')));
        let version = index.version();
        assert!(!index.insert((1, 'b')));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&(1, 'z')), Some(&(1, 'b')));
        assert_ne!(index.version(), version);
    }

    #[test]
    fn test_index_remove_leaf() {
        let mut index: WeightedIndex<i32> = [2, 1, 3].into_iter().collect();
        assert!(index.remove(&1));
        assert!(!index.remove(&1));
        assert_eq!(items(&index), vec![2, 3]);
    }

    #[test]
    fn test_index_remove_two_children() {
        let mut index: WeightedIndex<i32> = (1..=7).collect();
        let root_value = *index.at(index.len() / 2).unwrap();
        assert!(index.remove(&root_value));
        assert!(!index.contains(&root_value));
        assert_eq!(index.len(), 6);
        assert!(index.is_weight_balanced());
        let expected: Vec<i32> = (1..=7).filter(|&x| x != root_value).collect();
        assert_eq!(items(&index), expected);
    }

    #[test]
    fn test_index_take_returns_stored() {
        let mut index = WeightedIndex::with_comparator(KeyComparator::new(|p: &(i32, &str)| p.0, Order::Asc));
        index.insert((1, "one"));
        index.insert((2, "two"));
        assert_eq!(index.take(&(2, "")), Some((2, "two")));
        assert_eq!(index.take(&(2, "")), None);
        assert_eq!(items(&index), vec![(1, "one")]);
    }

    #[test]
    fn test_index_rank_and_at() {
        let index: WeightedIndex<i32> = [10, 7, 1, 9, 8].into_iter().collect();
        assert_eq!(index.rank(&1), Ok(0));
        assert_eq!(index.rank(&9), Ok(3));
        assert_eq!(index.rank(&0), Err(0));
        assert_eq!(index.rank(&5), Err(1));
        assert_eq!(index.rank(&11), Err(5));
        assert_eq!(index.index_of(&10), Some(4));
        assert_eq!(index.index_of(&4), None);

        for i in 0..index.len() {
            let value = *index.at(i).unwrap();
            assert_eq!(index.rank(&value), Ok(i));
        }
    }

    #[test]
    fn test_index_at_out_of_range() {
        let index: WeightedIndex<i32> = [1, 2].into_iter().collect();
        assert_eq!(index.at(2), Err(Error::index_out_of_range(2, 2)));

        let empty: WeightedIndex<i32> = WeightedIndex::new();
        assert!(empty.at(0).is_err());
    }

    #[test]
    fn test_index_min_max() {
        let index: WeightedIndex<i32> = [5, 3, 9, 1, 7].into_iter().collect();
        assert_eq!(index.min(), Some(&1));
        assert_eq!(index.max(), Some(&9));

        let desc: WeightedIndex<i32, NaturalComparator> = {
            let mut i = WeightedIndex::with_comparator(NaturalComparator::desc());
            i.extend([5, 3, 9]);
            i
        };
        assert_eq!(desc.min(), Some(&9));
        assert_eq!(items(&desc), vec![9, 5, 3]);
    }

    #[test]
    fn test_index_version_changes() {
        let mut index = WeightedIndex::new();
        let v0 = index.version();
        index.insert(1);
        let v1 = index.version();
        assert_ne!(v0, v1);

        // No-op insert and remove leave the version alone.
        index.insert(1);
        index.remove(&2);
        assert_eq!(index.version(), v1);

        index.remove(&1);
        assert_ne!(index.version(), v1);
    }

    #[test]
    fn test_index_clear() {
        let mut index: WeightedIndex<i32> = (0..100).collect();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.iter().count(), 0);
        assert!(index.insert(3));
        assert_eq!(items(&index), vec![3]);
    }

    #[test]
    fn test_index_sequential_stays_balanced() {
        let mut index = WeightedIndex::new();
        for i in 0..2000 {
            index.insert(i);
        }
        assert!(index.is_weight_balanced());
        for i in (0..2000).step_by(2) {
            assert!(index.remove(&i));
        }
        assert!(index.is_weight_balanced());
        assert_eq!(index.len(), 1000);
        assert_eq!(index.at(0).copied(), Ok(1));
        assert_eq!(index.max(), Some(&1999));
    }

    #[test]
    fn test_index_delete_all() {
        let mut index: WeightedIndex<i32> = (0..300).rev().collect();
        for i in 0..300 {
            assert!(index.remove(&i));
            assert!(index.is_weight_balanced());
        }
        assert!(index.is_empty());
    }

    #[test]
    fn test_index_iter_exact_size() {
        let index: WeightedIndex<i32> = (0..10).collect();
        let mut iter = index.iter();
        assert_eq!(iter.len(), 10);
        iter.next();
        assert_eq!(iter.len(), 9);
        assert_eq!((&index).into_iter().sum::<i32>(), 45);
    }
}
