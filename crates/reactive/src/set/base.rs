//! The base reactive set.

use crate::hub::Hub;
use crate::observable::{MaterializedSet, Observable, ObservableSet, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{set_items, Element, Error, SetStore};
use fluid_incremental::{ChangeReason, SetChange};
use hashbrown::HashSet;
use parking_lot::{ReentrantMutexGuard, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// State and delivery gate shared by every set that owns its members.
///
/// Every mutation follows the same order under the gate: compute the exact
/// diff against the live store, publish it, apply it, then publish the new
/// count. Observers therefore see the store as it was before the batch they
/// are handling.
pub(crate) struct SetCore<T> {
    hub: Hub<SetChange<T>>,
    counts: Hub<usize>,
    store: RwLock<Box<dyn SetStore<T>>>,
}

impl<T: Element> SetCore<T> {
    pub(crate) fn new(kind: &'static str, store: Box<dyn SetStore<T>>) -> Self {
        Self {
            hub: Hub::new(kind),
            counts: Hub::new(kind),
            store: RwLock::new(store),
        }
    }

    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.hub.lock()
    }

    pub(crate) fn contains(&self, item: &T) -> bool {
        self.store.read().contains(item)
    }

    pub(crate) fn len(&self) -> usize {
        self.store.read().len()
    }

    pub(crate) fn items(&self) -> Vec<T> {
        set_items(&**self.store.read())
    }

    /// Keeps the items whose membership `reason` would change, once each.
    pub(crate) fn effective<I>(&self, reason: ChangeReason, items: I) -> SetChange<T>
    where
        I: IntoIterator<Item = T>,
    {
        let store = self.store.read();
        let present = reason == ChangeReason::Remove;
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| store.contains(item) == present && seen.insert(item.clone()))
            .collect();
        SetChange::new(reason, items)
    }

    /// Publishes `change`, then applies it. The caller holds the gate.
    ///
    /// Returns the number of items changed.
    pub(crate) fn commit(&self, change: SetChange<T>) -> usize {
        if change.is_empty() {
            return 0;
        }
        trace!(kind = self.hub.kind(), reason = ?change.reason, items = change.len(), "publish");
        self.hub.publish(&change);

        let changed = change.len();
        let len = {
            let mut store = self.store.write();
            match change.reason {
                ChangeReason::Add => {
                    for item in change.items {
                        store.insert(item);
                    }
                }
                ChangeReason::Remove => {
                    for item in change.iter() {
                        store.remove(item);
                    }
                }
            }
            store.len()
        };
        self.counts.publish(&len);
        changed
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn Observer<SetChange<T>>>) -> Subscription {
        self.hub.subscribe(observer, || SetChange::add(self.items()))
    }

    pub(crate) fn watch_count(&self, observer: Arc<dyn Observer<usize>>) -> Subscription {
        let _gate = self.hub.lock();
        self.counts.subscribe(observer, || self.len())
    }

    pub(crate) fn dispose(&self) {
        let _gate = self.hub.lock();
        self.hub.complete();
        self.counts.complete();
    }

    pub(crate) fn fail(&self, error: &Error) {
        let _gate = self.hub.lock();
        self.hub.fail(error);
        self.counts.complete();
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.hub.is_terminated()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}

/// A mutable set that publishes its own mutations.
///
/// Cloning a `ReactiveSet` yields another handle to the same set.
///
/// # Example
///
/// ```
/// use fluid_reactive::{Observable, ReactiveSet};
/// use std::sync::{Arc, Mutex};
///
/// let set = ReactiveSet::from_items([1, 2]);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let _sub = set.subscribe_fn(move |change| sink.lock().unwrap().push(change.len()));
///
/// assert!(set.insert(3));
/// assert!(!set.insert(3));
/// // One snapshot batch holding both items, then the live add.
/// assert_eq!(*seen.lock().unwrap(), vec![2, 1]);
/// ```
pub struct ReactiveSet<T> {
    core: Arc<SetCore<T>>,
}

impl<T> Clone for ReactiveSet<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Element> Default for ReactiveSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> ReactiveSet<T> {
    /// Creates an empty set backed by a hash table.
    pub fn new() -> Self {
        Self::with_store(HashSet::new())
    }

    /// Creates a set seeded with `items`.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let set = Self::new();
        set.extend(items);
        set
    }

    /// Creates a set over an explicit backing store, keeping its contents.
    pub fn with_store<S>(store: S) -> Self
    where
        S: SetStore<T> + 'static,
    {
        Self {
            core: Arc::new(SetCore::new("set", Box::new(store))),
        }
    }

    /// Adds an item, returning false if it was already present.
    pub fn insert(&self, item: T) -> bool {
        let _gate = self.core.lock();
        let change = self.core.effective(ChangeReason::Add, [item]);
        self.core.commit(change) == 1
    }

    /// Removes an item, returning false if it was absent.
    pub fn remove(&self, item: &T) -> bool {
        let _gate = self.core.lock();
        let change = self.core.effective(ChangeReason::Remove, [item.clone()]);
        self.core.commit(change) == 1
    }

    /// Adds every item not yet present as one batch, returning how many were added.
    pub fn extend<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let _gate = self.core.lock();
        let change = self.core.effective(ChangeReason::Add, items);
        self.core.commit(change)
    }

    /// Removes every present item as one batch, returning how many were removed.
    pub fn remove_many<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let _gate = self.core.lock();
        let change = self.core.effective(ChangeReason::Remove, items);
        self.core.commit(change)
    }

    /// Removes every item, returning how many were removed.
    pub fn clear(&self) -> usize {
        let _gate = self.core.lock();
        let items = self.core.items();
        self.core.commit(SetChange::remove(items))
    }

    /// Makes the set equal to `target` with the minimal diff.
    ///
    /// Removals are published before additions; no other mutation can
    /// interleave between the two batches. Returns true if anything changed.
    pub fn edit<I>(&self, target: I) -> bool
    where
        I: IntoIterator<Item = T>,
    {
        let _gate = self.core.lock();
        let target: HashSet<T> = target.into_iter().collect();
        let removed = self
            .core
            .effective(ChangeReason::Remove, self.core.items().into_iter().filter(|item| !target.contains(item)));
        let added = self.core.effective(ChangeReason::Add, target);

        let changed = self.core.commit(removed) + self.core.commit(added);
        changed > 0
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current items.
    pub fn to_vec(&self) -> Vec<T> {
        self.core.items()
    }

    /// Returns a stream of the item count: the current count, then the new
    /// count after every mutation.
    pub fn watch_count(&self) -> Stream<usize> {
        let core = Arc::clone(&self.core);
        Stream::new("count_changed", move |observer| core.watch_count(observer))
    }

    /// Completes the change stream of every current observer.
    ///
    /// The set keeps its items and still accepts mutations, but publishes
    /// nothing further.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Returns true once the set has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.core.subscriber_count()
    }
}

impl<T: Element> Observable<SetChange<T>> for ReactiveSet<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<SetChange<T>>>) -> Subscription {
        self.core.subscribe(observer)
    }
}

impl<T: Element> ObservableSet<T> for ReactiveSet<T> {
    fn contains(&self, item: &T) -> bool {
        self.core.contains(item)
    }
}

impl<T: Element> MaterializedSet<T> for ReactiveSet<T> {
    fn len(&self) -> usize {
        self.core.len()
    }

    fn to_vec(&self) -> Vec<T> {
        self.core.items()
    }
}

impl<T: Element> fmt::Debug for ReactiveSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveSet").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::FnObserver;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    fn record<T: Element>(set: &ReactiveSet<T>) -> (Arc<Mutex<Vec<SetChange<T>>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let sub = set.subscribe_fn(move |change: &SetChange<T>| sink.lock().push(change.clone()));
        (log, sub)
    }

    #[test]
    fn test_set_snapshot_then_live() {
        let set = ReactiveSet::with_store(BTreeSet::from([1, 2]));
        let (log, _sub) = record(&set);

        set.insert(3);
        set.remove(&1);
        assert_eq!(
            *log.lock(),
            vec![SetChange::add(vec![1, 2]), SetChange::add(vec![3]), SetChange::remove(vec![1])]
        );
    }

    #[test]
    fn test_set_empty_snapshot() {
        let set: ReactiveSet<i32> = ReactiveSet::new();
        let (log, _sub) = record(&set);
        assert_eq!(*log.lock(), vec![SetChange::add(vec![])]);
    }

    #[test]
    fn test_set_idempotent_mutations() {
        let set = ReactiveSet::from_items([1]);
        let (log, _sub) = record(&set);

        assert!(!set.insert(1));
        assert!(!set.remove(&2));
        assert_eq!(set.extend([1]), 0);
        assert_eq!(set.remove_many([5, 6]), 0);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_set_extend_dedupes() {
        let set = ReactiveSet::with_store(BTreeSet::new());
        let (log, _sub) = record(&set);

        assert_eq!(set.extend([3, 1, 3, 2]), 3);
        assert_eq!(log.lock()[1], SetChange::add(vec![3, 1, 2]));
        assert_eq!(set.remove_many([1, 1, 9]), 1);
        assert_eq!(log.lock()[2], SetChange::remove(vec![1]));
    }

    #[test]
    fn test_set_clear() {
        let set = ReactiveSet::with_store(BTreeSet::from([1, 2]));
        let (log, _sub) = record(&set);
        assert_eq!(set.clear(), 2);
        assert_eq!(set.clear(), 0);
        assert!(set.is_empty());
        assert_eq!(log.lock().last(), Some(&SetChange::remove(vec![1, 2])));
    }

    #[test]
    fn test_set_edit_removes_first() {
        let set = ReactiveSet::with_store(BTreeSet::from([1, 2, 3]));
        let (log, _sub) = record(&set);

        assert!(set.edit([2, 3, 4]));
        assert!(!set.edit([4, 3, 2]));
        assert_eq!(log.lock()[1..], [SetChange::remove(vec![1]), SetChange::add(vec![4])]);
    }

    #[test]
    fn test_set_observer_sees_pre_mutation_state() {
        let set = ReactiveSet::new();
        let reader = set.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = set.subscribe_fn(move |change: &SetChange<i32>| {
            if let Some(item) = change.iter().next() {
                sink.lock().push(reader.contains(item));
            }
        });

        set.insert(5);
        set.remove(&5);
        assert_eq!(*seen.lock(), vec![false, true]);
    }

    #[test]
    fn test_set_unsubscribe_self_during_delivery() {
        let set = ReactiveSet::new();
        let count = Arc::new(Mutex::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let (c, s) = (count.clone(), slot.clone());
        let sub = set.subscribe_fn(move |_: &SetChange<i32>| {
            *c.lock() += 1;
            if *c.lock() == 2 {
                // Drop outside the slot lock.
                let taken = s.lock().take();
                drop(taken);
            }
        });
        *slot.lock() = Some(sub);

        set.insert(1);
        set.insert(2);
        assert_eq!(*count.lock(), 2);
        assert_eq!(set.subscriber_count(), 0);
    }

    #[test]
    fn test_set_dispose_completes() {
        let set = ReactiveSet::new();
        let completed = Arc::new(Mutex::new(0));
        let c = completed.clone();
        let _sub = set.subscribe(Arc::new(FnObserver::new(|_: &SetChange<i32>| {}).with_completed(move || {
            *c.lock() += 1;
        })));

        set.dispose();
        set.dispose();
        assert_eq!(*completed.lock(), 1);

        // State stays queryable and mutable; nothing is published.
        assert!(set.insert(7));
        assert!(set.contains(&7));
        let (log, _late) = record(&set);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_set_watch_count() {
        let set = ReactiveSet::from_items([1]);
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = counts.clone();
        let _sub = set.watch_count().subscribe_fn(move |n| sink.lock().push(*n));

        set.extend([2, 3]);
        set.insert(3);
        set.clear();
        assert_eq!(*counts.lock(), vec![1, 3, 0]);
    }
}
