//! The base reactive dictionary.

use crate::hub::Hub;
use crate::observable::{MaterializedDictionary, Observable, ObservableDictionary, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{map_entries, Element, Error, MapStore, Payload, Result};
use fluid_incremental::{DictChange, DictChangeReason};
use hashbrown::{HashMap, HashSet};
use parking_lot::{ReentrantMutexGuard, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// State and delivery gate shared by every dictionary that owns its entries.
///
/// Mutations publish their batch before applying it, so observers can read
/// the value a key held before the batch.
pub(crate) struct DictCore<K, V> {
    hub: Hub<DictChange<K, V>>,
    counts: Hub<usize>,
    store: RwLock<Box<dyn MapStore<K, V>>>,
}

impl<K: Element, V: Payload> DictCore<K, V> {
    pub(crate) fn new(kind: &'static str, store: Box<dyn MapStore<K, V>>) -> Self {
        Self {
            hub: Hub::new(kind),
            counts: Hub::new(kind),
            store: RwLock::new(store),
        }
    }

    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.hub.lock()
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.store.read().get(key).cloned()
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.store.read().contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.store.read().len()
    }

    pub(crate) fn entries(&self) -> Vec<(K, V)> {
        map_entries(&**self.store.read())
    }

    /// Builds an add-or-update batch; a key given twice keeps its last value.
    pub(crate) fn upserts<I>(&self, entries: I) -> DictChange<K, V>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut positions: HashMap<K, usize> = HashMap::new();
        let mut out: Vec<(K, V)> = Vec::new();
        for (key, value) in entries {
            match positions.get(&key) {
                Some(&i) => out[i].1 = value,
                None => {
                    positions.insert(key.clone(), out.len());
                    out.push((key, value));
                }
            }
        }
        DictChange::add_or_update(out)
    }

    /// Builds a removal batch for the present keys, carrying their stored values.
    pub(crate) fn removals<I>(&self, keys: I) -> DictChange<K, V>
    where
        I: IntoIterator<Item = K>,
    {
        let store = self.store.read();
        let mut seen = HashSet::new();
        let entries = keys
            .into_iter()
            .filter_map(|key| {
                let value = store.get(&key)?.clone();
                seen.insert(key.clone()).then_some((key, value))
            })
            .collect();
        DictChange::remove(entries)
    }

    /// Publishes `change`, then applies it. The caller holds the gate.
    ///
    /// Returns the number of entries in the batch.
    pub(crate) fn commit(&self, change: DictChange<K, V>) -> usize {
        if change.is_empty() {
            return 0;
        }
        trace!(kind = self.hub.kind(), reason = ?change.reason, entries = change.len(), "publish");
        self.hub.publish(&change);

        let changed = change.len();
        let (before, after) = {
            let mut store = self.store.write();
            let before = store.len();
            match change.reason {
                DictChangeReason::AddOrUpdate => {
                    for (key, value) in change.entries {
                        store.insert(key, value);
                    }
                }
                DictChangeReason::Remove => {
                    for key in change.keys() {
                        store.remove(key);
                    }
                }
            }
            (before, store.len())
        };
        if before != after {
            self.counts.publish(&after);
        }
        changed
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn Observer<DictChange<K, V>>>) -> Subscription {
        self.hub.subscribe(observer, || DictChange::add_or_update(self.entries()))
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

/// A mutable dictionary that publishes its own mutations.
///
/// Cloning a `ReactiveDictionary` yields another handle to the same dictionary.
pub struct ReactiveDictionary<K, V> {
    core: Arc<DictCore<K, V>>,
}

impl<K, V> Clone for ReactiveDictionary<K, V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K: Element, V: Payload> Default for ReactiveDictionary<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Element, V: Payload> ReactiveDictionary<K, V> {
    /// Creates an empty dictionary backed by a hash table.
    pub fn new() -> Self {
        Self::with_store(HashMap::new())
    }

    /// Creates a dictionary seeded with `entries`; later duplicates win.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let dict = Self::new();
        dict.update_many(entries);
        dict
    }

    /// Creates a dictionary over an explicit backing store, keeping its contents.
    pub fn with_store<S>(store: S) -> Self
    where
        S: MapStore<K, V> + 'static,
    {
        Self {
            core: Arc::new(DictCore::new("dictionary", Box::new(store))),
        }
    }

    /// Adds an entry unless `key` is present. Returns true if it was added.
    pub fn insert(&self, key: K, value: V) -> bool {
        let _gate = self.core.lock();
        if self.core.contains_key(&key) {
            return false;
        }
        self.core.commit(DictChange::add_or_update(vec![(key, value)])) == 1
    }

    /// Adds or replaces the value under `key`.
    pub fn set(&self, key: K, value: V) {
        let _gate = self.core.lock();
        self.core.commit(DictChange::add_or_update(vec![(key, value)]));
    }

    /// Adds every entry whose key is absent, as one batch.
    ///
    /// The first value given for a key wins. Returns how many were added.
    pub fn extend<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let _gate = self.core.lock();
        let mut seen = HashSet::new();
        let fresh: Vec<(K, V)> = entries
            .into_iter()
            .filter(|(key, _)| !self.core.contains_key(key) && seen.insert(key.clone()))
            .collect();
        self.core.commit(DictChange::add_or_update(fresh))
    }

    /// Adds or replaces every entry as one batch, returning the batch size.
    pub fn update_many<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let _gate = self.core.lock();
        let change = self.core.upserts(entries);
        self.core.commit(change)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let _gate = self.core.lock();
        let change = self.core.removals([key.clone()]);
        let value = change.iter().next().map(|(_, value)| value.clone());
        self.core.commit(change);
        value
    }

    /// Removes every present key as one batch, returning how many were removed.
    pub fn remove_many<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
    {
        let _gate = self.core.lock();
        let change = self.core.removals(keys);
        self.core.commit(change)
    }

    /// Removes every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let _gate = self.core.lock();
        let entries = self.core.entries();
        self.core.commit(DictChange::remove(entries))
    }

    /// Makes the dictionary equal to `target` with the minimal diff.
    ///
    /// Keys missing from `target` are removed first; then new keys and
    /// changed values are published as one batch. Returns true if anything
    /// changed.
    pub fn edit<I>(&self, target: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        V: PartialEq,
    {
        let _gate = self.core.lock();
        let target = self.core.upserts(target);
        let wanted: HashSet<&K> = target.keys().collect();
        let stale: Vec<K> = self
            .core
            .entries()
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| !wanted.contains(key))
            .collect();
        let changed: Vec<(K, V)> = target
            .iter()
            .filter(|(key, value)| self.core.get(key).as_ref() != Some(value))
            .cloned()
            .collect();

        let removed = self.core.commit(self.core.removals(stale));
        let updated = self.core.commit(DictChange::add_or_update(changed));
        removed + updated > 0
    }

    /// Returns the value under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.core.get(key)
    }

    /// Returns the value under `key`, failing with [`Error::KeyNotFound`].
    pub fn get_required(&self, key: &K) -> Result<V> {
        self.core.get(key).ok_or_else(Error::key_not_found)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.core.contains_key(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns true if the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current entries.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.core.entries()
    }

    /// Returns a stream of the entry count: the current count, then every new count.
    pub fn watch_count(&self) -> Stream<usize> {
        let core = Arc::clone(&self.core);
        Stream::new("count_changed", move |observer| core.watch_count(observer))
    }

    /// Completes the change stream of every current observer.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Returns true once the dictionary has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.core.subscriber_count()
    }
}

impl<K: Element, V: Payload> Observable<DictChange<K, V>> for ReactiveDictionary<K, V> {
    fn subscribe(&self, observer: Arc<dyn Observer<DictChange<K, V>>>) -> Subscription {
        self.core.subscribe(observer)
    }
}

impl<K: Element, V: Payload> ObservableDictionary<K, V> for ReactiveDictionary<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        self.core.get(key)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.core.contains_key(key)
    }
}

impl<K: Element, V: Payload> MaterializedDictionary<K, V> for ReactiveDictionary<K, V> {
    fn len(&self) -> usize {
        self.core.len()
    }

    fn to_vec(&self) -> Vec<(K, V)> {
        self.core.entries()
    }
}

impl<K: Element, V: Payload> fmt::Debug for ReactiveDictionary<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveDictionary").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    type Log<K, V> = Arc<Mutex<Vec<DictChange<K, V>>>>;

    fn record<K: Element, V: Payload>(dict: &ReactiveDictionary<K, V>) -> (Log<K, V>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let sub = dict.subscribe_fn(move |change: &DictChange<K, V>| sink.lock().push(change.clone()));
        (log, sub)
    }

    fn ordered() -> ReactiveDictionary<&'static str, i32> {
        ReactiveDictionary::with_store(BTreeMap::new())
    }

    #[test]
    fn test_dict_insert_and_set() {
        let dict = ordered();
        let (log, _sub) = record(&dict);

        assert!(dict.insert("a", 1));
        assert!(!dict.insert("a", 2));
        dict.set("a", 3);
        assert_eq!(dict.get(&"a"), Some(3));
        assert_eq!(
            *log.lock(),
            vec![
                DictChange::add_or_update(vec![]),
                DictChange::add_or_update(vec![("a", 1)]),
                DictChange::add_or_update(vec![("a", 3)]),
            ]
        );
    }

    #[test]
    fn test_dict_bulk_mutations() {
        let dict = ordered();
        dict.set("a", 1);
        let (log, _sub) = record(&dict);

        assert_eq!(dict.extend([("a", 9), ("b", 2), ("b", 5)]), 1);
        assert_eq!(dict.get(&"b"), Some(2));
        assert_eq!(dict.update_many([("a", 7), ("c", 3), ("c", 4)]), 2);
        assert_eq!(dict.get(&"c"), Some(4));
        assert_eq!(dict.remove_many(["a", "a", "z"]), 1);
        assert_eq!(log.lock().last(), Some(&DictChange::remove(vec![("a", 7)])));
        assert_eq!(dict.clear(), 2);
        assert!(dict.is_empty());
    }

    #[test]
    fn test_dict_remove_returns_value() {
        let dict = ordered();
        dict.set("k", 10);
        assert_eq!(dict.remove(&"k"), Some(10));
        assert_eq!(dict.remove(&"k"), None);
        assert_eq!(dict.get_required(&"k"), Err(Error::KeyNotFound));
    }

    #[test]
    fn test_dict_edit_minimal_diff() {
        let dict = ordered();
        dict.update_many([("a", 1), ("b", 2), ("c", 3)]);
        let (log, _sub) = record(&dict);

        assert!(dict.edit([("b", 2), ("c", 30), ("d", 4)]));
        assert!(!dict.edit([("b", 2), ("c", 30), ("d", 4)]));
        assert_eq!(
            log.lock()[1..],
            [
                DictChange::remove(vec![("a", 1)]),
                DictChange::add_or_update(vec![("c", 30), ("d", 4)]),
            ]
        );
    }

    #[test]
    fn test_dict_observer_sees_previous_value() {
        let dict = ordered();
        dict.set("x", 1);
        let reader = dict.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = dict.subscribe_fn(move |change: &DictChange<&str, i32>| {
            sink.lock().push(reader.get(&"x"));
            let _ = change;
        });

        dict.set("x", 2);
        assert_eq!(*seen.lock(), vec![Some(1), Some(1)]);
    }

    #[test]
    fn test_dict_watch_count() {
        let dict = ordered();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = counts.clone();
        let _sub = dict.watch_count().subscribe_fn(move |n| sink.lock().push(*n));

        dict.set("a", 1);
        dict.set("a", 2);
        dict.set("b", 1);
        dict.remove(&"a");
        assert_eq!(*counts.lock(), vec![0, 1, 2, 1]);
    }
}
