//! Pluggable backing stores for base collections.
//!
//! A base collection owns exactly one store and is the only writer to it.
//! Hash tables are the default; ordered std collections can be swapped in
//! when a deterministic snapshot order is wanted.

use core::hash::{BuildHasher, Hash};
use hashbrown::{HashMap, HashSet};
use std::collections::{BTreeMap, BTreeSet};

/// Backing storage for a reactive set.
pub trait SetStore<T>: Send + Sync {
    /// Returns true if the store holds `item`.
    fn contains(&self, item: &T) -> bool;

    /// Inserts `item`, returning false if it was already present.
    fn insert(&mut self, item: T) -> bool;

    /// Removes `item`, returning false if it was absent.
    fn remove(&mut self, item: &T) -> bool;

    /// Returns the number of stored items.
    fn len(&self) -> usize;

    /// Returns true if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every item.
    fn clear(&mut self);

    /// Visits every item in the store's iteration order.
    fn for_each(&self, f: &mut dyn FnMut(&T));
}

/// Backing storage for a reactive dictionary.
pub trait MapStore<K, V>: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &K) -> Option<&V>;

    /// Stores `value` under `key`, returning the previous value.
    fn insert(&mut self, key: K, value: V) -> Option<V>;

    /// Removes `key`, returning its value.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Returns the number of stored entries.
    fn len(&self) -> usize;

    /// Returns true if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    fn clear(&mut self);

    /// Visits every entry in the store's iteration order.
    fn for_each(&self, f: &mut dyn FnMut(&K, &V));

    /// Returns true if `key` is present.
    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

impl<T, S> SetStore<T> for HashSet<T, S>
where
    T: Eq + Hash + Send + Sync,
    S: BuildHasher + Send + Sync,
{
    fn contains(&self, item: &T) -> bool {
        HashSet::contains(self, item)
    }

    fn insert(&mut self, item: T) -> bool {
        HashSet::insert(self, item)
    }

    fn remove(&mut self, item: &T) -> bool {
        HashSet::remove(self, item)
    }

    fn len(&self) -> usize {
        HashSet::len(self)
    }

    fn clear(&mut self) {
        HashSet::clear(self)
    }

    fn for_each(&self, f: &mut dyn FnMut(&T)) {
        self.iter().for_each(f)
    }
}

impl<T> SetStore<T> for BTreeSet<T>
where
    T: Ord + Send + Sync,
{
    fn contains(&self, item: &T) -> bool {
        BTreeSet::contains(self, item)
    }

    fn insert(&mut self, item: T) -> bool {
        BTreeSet::insert(self, item)
    }

    fn remove(&mut self, item: &T) -> bool {
        BTreeSet::remove(self, item)
    }

    fn len(&self) -> usize {
        BTreeSet::len(self)
    }

    fn clear(&mut self) {
        BTreeSet::clear(self)
    }

    fn for_each(&self, f: &mut dyn FnMut(&T)) {
        self.iter().for_each(f)
    }
}

impl<K, V, S> MapStore<K, V> for HashMap<K, V, S>
where
    K: Eq + Hash + Send + Sync,
    V: Send + Sync,
    S: BuildHasher + Send + Sync,
{
    fn get(&self, key: &K) -> Option<&V> {
        HashMap::get(self, key)
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        HashMap::insert(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        HashMap::remove(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn clear(&mut self) {
        HashMap::clear(self)
    }

    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }
}

impl<K, V> MapStore<K, V> for BTreeMap<K, V>
where
    K: Ord + Send + Sync,
    V: Send + Sync,
{
    fn get(&self, key: &K) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        BTreeMap::insert(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        BTreeMap::remove(self, key)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn clear(&mut self) {
        BTreeMap::clear(self)
    }

    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }
}

/// Collects a set store's items into a vector.
pub fn set_items<T: Clone>(store: &dyn SetStore<T>) -> Vec<T> {
    let mut items = Vec::with_capacity(store.len());
    store.for_each(&mut |item| items.push(item.clone()));
    items
}

/// Collects a map store's entries into a vector.
pub fn map_entries<K: Clone, V: Clone>(store: &dyn MapStore<K, V>) -> Vec<(K, V)> {
    let mut entries = Vec::with_capacity(store.len());
    store.for_each(&mut |k, v| entries.push((k.clone(), v.clone())));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_set_store() {
        let mut store: Box<dyn SetStore<i32>> = Box::new(HashSet::<i32>::new());
        assert!(store.insert(1));
        assert!(!store.insert(1));
        assert!(store.contains(&1));
        assert_eq!(store.len(), 1);
        assert!(store.remove(&1));
        assert!(!store.remove(&1));
        assert!(store.is_empty());
    }

    #[test]
    fn test_btree_set_store_order() {
        let mut store = BTreeSet::new();
        for x in [5, 1, 3] {
            SetStore::insert(&mut store, x);
        }
        assert_eq!(set_items(&store), vec![1, 3, 5]);
    }

    #[test]
    fn test_map_store() {
        let mut store: HashMap<&str, i32> = HashMap::new();
        assert_eq!(MapStore::insert(&mut store, "a", 1), None);
        assert_eq!(MapStore::insert(&mut store, "a", 2), Some(1));
        assert!(MapStore::contains_key(&store, &"a"));
        assert_eq!(MapStore::get(&store, &"a"), Some(&2));
        assert_eq!(MapStore::remove(&mut store, &"a"), Some(2));
        assert!(MapStore::is_empty(&store));
    }

    #[test]
    fn test_btree_map_entries_sorted() {
        let mut store = BTreeMap::new();
        MapStore::insert(&mut store, 2, "b");
        MapStore::insert(&mut store, 1, "a");
        assert_eq!(map_entries(&store), vec![(1, "a"), (2, "b")]);
    }
}
