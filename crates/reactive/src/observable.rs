//! The change-stream contract shared by every reactive collection.
//!
//! Subscribing to a collection synchronously delivers exactly one batch
//! describing its entire current state (possibly empty), then every live
//! batch in the order the mutations happened. Live batches are never empty.
//! Delivery runs on the mutating thread; a slow observer stalls the mutator.

use crate::observer::{FnObserver, Observer};
use crate::subscription::Subscription;
use fluid_core::{Element, Payload};
use fluid_incremental::{ChangeReason, DictChange, DictChangeReason, SetChange};
use hashbrown::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A source of notifications of type `C`.
pub trait Observable<C>: Send + Sync {
    /// Subscribes `observer`, returning the handle that stops delivery.
    fn subscribe(&self, observer: Arc<dyn Observer<C>>) -> Subscription;

    /// Subscribes a closure that handles every batch.
    fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        Self: Sized,
        C: 'static,
        F: Fn(&C) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnObserver::new(f)))
    }
}

/// A reactive set: a stream of [`SetChange`] batches plus live membership.
pub trait ObservableSet<T>: Observable<SetChange<T>> {
    /// Returns true if `item` is currently a member.
    fn contains(&self, item: &T) -> bool;
}

/// A reactive dictionary: a stream of [`DictChange`] batches plus live lookup.
pub trait ObservableDictionary<K, V>: Observable<DictChange<K, V>> {
    /// Returns the current value stored under `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Returns true if `key` is currently present.
    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

/// A reactive set that keeps its own copy of its members.
pub trait MaterializedSet<T>: ObservableSet<T> {
    /// Returns the number of members.
    fn len(&self) -> usize;

    /// Returns true if the set has no members.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current members.
    fn to_vec(&self) -> Vec<T>;
}

/// A reactive dictionary that keeps its own copy of its entries.
pub trait MaterializedDictionary<K, V>: ObservableDictionary<K, V> {
    /// Returns the number of entries.
    fn len(&self) -> usize;

    /// Returns true if the dictionary has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current entries.
    fn to_vec(&self) -> Vec<(K, V)>;
}

/// A shared, type-erased reactive set.
pub type SharedSet<T> = Arc<dyn ObservableSet<T>>;

/// A shared, type-erased reactive dictionary.
pub type SharedDictionary<K, V> = Arc<dyn ObservableDictionary<K, V>>;

impl<C, S> Observable<C> for Arc<S>
where
    S: Observable<C> + ?Sized,
{
    fn subscribe(&self, observer: Arc<dyn Observer<C>>) -> Subscription {
        (**self).subscribe(observer)
    }
}

impl<T, S> ObservableSet<T> for Arc<S>
where
    S: ObservableSet<T> + ?Sized,
{
    fn contains(&self, item: &T) -> bool {
        (**self).contains(item)
    }
}

impl<K, V, S> ObservableDictionary<K, V> for Arc<S>
where
    S: ObservableDictionary<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn contains_key(&self, key: &K) -> bool {
        (**self).contains_key(key)
    }
}

/// A change batch that can be folded into a pending snapshot.
///
/// Multi-source operators accumulate each source's snapshot, plus any live
/// batches that arrive before every source has delivered one, and combine
/// them into a single snapshot batch.
pub trait Batch: Send + Sync + 'static {
    /// The accumulated state.
    type Snapshot: Default + Send;

    /// Returns true if the batch carries no items.
    fn is_empty(&self) -> bool;

    /// Applies the batch to `snapshot`.
    fn absorb(&self, snapshot: &mut Self::Snapshot);
}

impl<T: Element> Batch for SetChange<T> {
    type Snapshot = Vec<T>;

    fn is_empty(&self) -> bool {
        SetChange::is_empty(self)
    }

    fn absorb(&self, snapshot: &mut Vec<T>) {
        match self.reason {
            ChangeReason::Add => snapshot.extend(self.iter().cloned()),
            ChangeReason::Remove => {
                let gone: HashSet<&T> = self.iter().collect();
                snapshot.retain(|item| !gone.contains(item));
            }
        }
    }
}

/// Pending dictionary entries, indexed by key.
pub struct DictSnapshot<K, V> {
    entries: Vec<(K, V)>,
    positions: HashMap<K, usize>,
}

impl<K, V> Default for DictSnapshot<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<K: Element, V: Payload> DictSnapshot<K, V> {
    pub fn as_slice(&self) -> &[(K, V)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn upsert(&mut self, key: &K, value: &V) {
        match self.positions.get(key) {
            Some(&at) => self.entries[at].1 = value.clone(),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key.clone(), value.clone()));
            }
        }
    }

    fn remove(&mut self, key: &K) {
        if let Some(at) = self.positions.remove(key) {
            self.entries.swap_remove(at);
            if let Some((moved, _)) = self.entries.get(at) {
                self.positions.insert(moved.clone(), at);
            }
        }
    }
}

impl<K: Element, V: Payload> Batch for DictChange<K, V> {
    type Snapshot = DictSnapshot<K, V>;

    fn is_empty(&self) -> bool {
        DictChange::is_empty(self)
    }

    fn absorb(&self, snapshot: &mut DictSnapshot<K, V>) {
        for (key, value) in self.iter() {
            match self.reason {
                DictChangeReason::AddOrUpdate => snapshot.upsert(key, value),
                DictChangeReason::Remove => snapshot.remove(key),
            }
        }
    }
}

type Connect<C> = dyn Fn(Arc<dyn Observer<C>>) -> Subscription + Send + Sync;

/// A cold stream: every subscription runs its own pipeline.
///
/// Relays, buffers, aggregates and snapshot streams are all `Stream`s. They
/// hold no state between subscriptions.
pub struct Stream<C> {
    name: &'static str,
    connect: Arc<Connect<C>>,
}

impl<C> Clone for Stream<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            connect: Arc::clone(&self.connect),
        }
    }
}

impl<C> Stream<C> {
    /// Creates a stream that runs `connect` for every subscription.
    pub fn new<F>(name: &'static str, connect: F) -> Self
    where
        F: Fn(Arc<dyn Observer<C>>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            name,
            connect: Arc::new(connect),
        }
    }

    /// Returns the operator name this stream was built by.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<C> Observable<C> for Stream<C> {
    fn subscribe(&self, observer: Arc<dyn Observer<C>>) -> Subscription {
        trace!(stream = self.name, "subscribe");
        (self.connect)(observer)
    }
}

impl<C> fmt::Debug for Stream<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_batch_absorb() {
        let mut snapshot = Vec::new();
        SetChange::add(vec![1, 2, 3]).absorb(&mut snapshot);
        SetChange::remove(vec![2]).absorb(&mut snapshot);
        SetChange::add(vec![4]).absorb(&mut snapshot);
        assert_eq!(snapshot, vec![1, 3, 4]);
    }

    #[test]
    fn test_dict_batch_absorb() {
        let mut snapshot = DictSnapshot::default();
        DictChange::add_or_update(vec![("a", 1), ("b", 2), ("c", 3)]).absorb(&mut snapshot);
        DictChange::add_or_update(vec![("a", 10)]).absorb(&mut snapshot);
        DictChange::remove(vec![("a", 10)]).absorb(&mut snapshot);
        DictChange::add_or_update(vec![("b", 20), ("d", 4)]).absorb(&mut snapshot);
        DictChange::remove(vec![("x", 0)]).absorb(&mut snapshot);

        let mut entries = snapshot.as_slice().to_vec();
        entries.sort();
        assert_eq!(entries, vec![("b", 20), ("c", 3), ("d", 4)]);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_dict_snapshot_absorbs_large_batches() {
        let mut snapshot = DictSnapshot::default();
        DictChange::add_or_update((0..10_000).map(|k| (k, k)).collect()).absorb(&mut snapshot);
        DictChange::add_or_update((0..10_000).map(|k| (k, k + 1)).collect()).absorb(&mut snapshot);
        DictChange::remove((0..10_000).step_by(2).map(|k| (k, 0)).collect()).absorb(&mut snapshot);

        assert_eq!(snapshot.len(), 5_000);
        assert!(snapshot.as_slice().iter().all(|(k, v)| k % 2 == 1 && *v == k + 1));
    }

    #[test]
    fn test_stream_runs_per_subscription() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let connects = Arc::new(AtomicUsize::new(0));
        let c = connects.clone();
        let stream: Stream<i32> = Stream::new("constant", move |observer| {
            c.fetch_add(1, Ordering::SeqCst);
            observer.on_next(&42);
            Subscription::empty()
        });

        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let _a = stream.subscribe_fn(move |v| {
            s.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let _b = stream.clone().subscribe_fn(|_| {});

        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
        assert_eq!(stream.name(), "constant");
    }
}
