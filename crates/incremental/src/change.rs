//! Change records published by reactive collections.
//!
//! A set publishes [`SetChange`] batches (`Add` or `Remove` of values); a
//! dictionary publishes [`DictChange`] batches (`AddOrUpdate` or `Remove` of
//! key-value pairs). A dictionary has no separate update reason: replacing a
//! key's value is an `AddOrUpdate` carrying the new value.
//!
//! Within one batch every item appears under the batch's single reason.
//! Operators that need to publish both reasons build the two halves with
//! [`SetChangeBuilder`] / [`DictChangeBuilder`], which emit removals before
//! additions and skip empty halves.

use crate::delta::Delta;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reason of a set change batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChangeReason {
    /// Items joined the set.
    Add,
    /// Items left the set.
    Remove,
}

impl ChangeReason {
    /// Returns the opposite reason.
    #[inline]
    pub fn inverse(self) -> Self {
        match self {
            ChangeReason::Add => ChangeReason::Remove,
            ChangeReason::Remove => ChangeReason::Add,
        }
    }

    /// Returns the delta diff of this reason (+1 or -1).
    #[inline]
    pub fn diff(self) -> i32 {
        match self {
            ChangeReason::Add => 1,
            ChangeReason::Remove => -1,
        }
    }
}

/// One set notification: a reason and the items it applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SetChange<T> {
    /// Why the items changed.
    pub reason: ChangeReason,
    /// The affected items.
    pub items: Vec<T>,
}

impl<T> SetChange<T> {
    /// Creates a change batch.
    pub fn new(reason: ChangeReason, items: Vec<T>) -> Self {
        Self { reason, items }
    }

    /// Creates an `Add` batch.
    pub fn add(items: Vec<T>) -> Self {
        Self::new(ChangeReason::Add, items)
    }

    /// Creates a `Remove` batch.
    pub fn remove(items: Vec<T>) -> Self {
        Self::new(ChangeReason::Remove, items)
    }

    /// Returns true for an `Add` batch.
    #[inline]
    pub fn is_add(&self) -> bool {
        self.reason == ChangeReason::Add
    }

    /// Returns the number of affected items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the batch affects nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns an iterator over the affected items.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Maps every item, keeping the reason.
    pub fn map<U, F>(self, f: F) -> SetChange<U>
    where
        F: FnMut(T) -> U,
    {
        SetChange {
            reason: self.reason,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

impl<T: Clone> SetChange<T> {
    /// Converts the batch to one delta per item.
    pub fn deltas(&self) -> impl Iterator<Item = Delta<T>> + '_ {
        let reason = self.reason;
        self.items.iter().map(move |item| Delta::from_reason(reason, item.clone()))
    }
}

/// Reason of a dictionary change batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DictChangeReason {
    /// Keys were added or their values replaced.
    AddOrUpdate,
    /// Keys were removed; entries carry the removed values.
    Remove,
}

/// One dictionary notification: a reason and the entries it applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DictChange<K, V> {
    /// Why the entries changed.
    pub reason: DictChangeReason,
    /// The affected entries.
    pub entries: Vec<(K, V)>,
}

impl<K, V> DictChange<K, V> {
    /// Creates a change batch.
    pub fn new(reason: DictChangeReason, entries: Vec<(K, V)>) -> Self {
        Self { reason, entries }
    }

    /// Creates an `AddOrUpdate` batch.
    pub fn add_or_update(entries: Vec<(K, V)>) -> Self {
        Self::new(DictChangeReason::AddOrUpdate, entries)
    }

    /// Creates a `Remove` batch.
    pub fn remove(entries: Vec<(K, V)>) -> Self {
        Self::new(DictChangeReason::Remove, entries)
    }

    /// Returns true for an `AddOrUpdate` batch.
    #[inline]
    pub fn is_upsert(&self) -> bool {
        self.reason == DictChangeReason::AddOrUpdate
    }

    /// Returns the number of affected entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the batch affects nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over the affected keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Returns an iterator over the affected entries.
    pub fn iter(&self) -> core::slice::Iter<'_, (K, V)> {
        self.entries.iter()
    }
}

/// Collects the two halves of a translated set batch.
#[derive(Clone, Debug)]
pub struct SetChangeBuilder<T> {
    adds: Vec<T>,
    removes: Vec<T>,
}

impl<T> Default for SetChangeBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SetChangeBuilder<T> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            adds: Vec::new(),
            removes: Vec::new(),
        }
    }

    /// Records an item under `reason`.
    #[inline]
    pub fn push(&mut self, reason: ChangeReason, item: T) {
        match reason {
            ChangeReason::Add => self.adds.push(item),
            ChangeReason::Remove => self.removes.push(item),
        }
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }

    /// Returns the non-empty batches, removals first.
    pub fn finish(self) -> Vec<SetChange<T>> {
        let mut out = Vec::with_capacity(2);
        if !self.removes.is_empty() {
            out.push(SetChange::remove(self.removes));
        }
        if !self.adds.is_empty() {
            out.push(SetChange::add(self.adds));
        }
        out
    }
}

/// Collects the two halves of a translated dictionary batch.
#[derive(Clone, Debug)]
pub struct DictChangeBuilder<K, V> {
    upserts: Vec<(K, V)>,
    removes: Vec<(K, V)>,
}

impl<K, V> Default for DictChangeBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DictChangeBuilder<K, V> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            upserts: Vec::new(),
            removes: Vec::new(),
        }
    }

    /// Records an added or updated entry.
    #[inline]
    pub fn upsert(&mut self, key: K, value: V) {
        self.upserts.push((key, value));
    }

    /// Records a removed entry.
    #[inline]
    pub fn remove(&mut self, key: K, value: V) {
        self.removes.push((key, value));
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removes.is_empty()
    }

    /// Returns the non-empty batches, removals first.
    pub fn finish(self) -> Vec<DictChange<K, V>> {
        let mut out = Vec::with_capacity(2);
        if !self.removes.is_empty() {
            out.push(DictChange::remove(self.removes));
        }
        if !self.upserts.is_empty() {
            out.push(DictChange::add_or_update(self.upserts));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_reason() {
        assert_eq!(ChangeReason::Add.inverse(), ChangeReason::Remove);
        assert_eq!(ChangeReason::Remove.inverse(), ChangeReason::Add);
        assert_eq!(ChangeReason::Add.diff(), 1);
        assert_eq!(ChangeReason::Remove.diff(), -1);
    }

    #[test]
    fn test_set_change_basics() {
        let change = SetChange::add(vec![1, 2, 3]);
        assert!(change.is_add());
        assert_eq!(change.len(), 3);
        assert_eq!(change.iter().sum::<i32>(), 6);

        let mapped = SetChange::remove(vec![1, 2]).map(|x| x * 10);
        assert_eq!(mapped, SetChange::remove(vec![10, 20]));
    }

    #[test]
    fn test_set_change_deltas() {
        let deltas: Vec<_> = SetChange::remove(vec![7, 8]).deltas().collect();
        assert_eq!(deltas, vec![Delta::delete(7), Delta::delete(8)]);
    }

    #[test]
    fn test_dict_change_basics() {
        let change = DictChange::add_or_update(vec![("a", 1), ("b", 2)]);
        assert!(change.is_upsert());
        assert_eq!(change.keys().copied().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(!DictChange::<&str, i32>::remove(vec![]).is_upsert());
    }

    #[test]
    fn test_set_builder_orders_removes_first() {
        let mut builder = SetChangeBuilder::new();
        assert!(builder.is_empty());
        builder.push(ChangeReason::Add, 1);
        builder.push(ChangeReason::Remove, 2);
        builder.push(ChangeReason::Add, 3);
        assert_eq!(builder.finish(), vec![SetChange::remove(vec![2]), SetChange::add(vec![1, 3])]);

        let mut only_adds = SetChangeBuilder::new();
        only_adds.push(ChangeReason::Add, 5);
        assert_eq!(only_adds.finish(), vec![SetChange::add(vec![5])]);
        assert!(SetChangeBuilder::<i32>::new().finish().is_empty());
    }

    #[test]
    fn test_dict_builder() {
        let mut builder = DictChangeBuilder::new();
        builder.upsert("a", 1);
        builder.remove("b", 2);
        assert_eq!(
            builder.finish(),
            vec![DictChange::remove(vec![("b", 2)]), DictChange::add_or_update(vec![("a", 1)])]
        );
    }
}
