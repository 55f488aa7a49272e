//! Materialized dictionaries derived from another collection.

use super::base::DictCore;
use crate::link::{drive, Downstream, Link};
use crate::observable::{MaterializedDictionary, Observable, ObservableDictionary, ObservableSet, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{guard, Element, Error, Payload, Result};
use fluid_incremental::{ChangeReason, DictChange, DictChangeReason, SetChange};
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;

struct CollectedInner<K, V> {
    core: DictCore<K, V>,
    link: Link,
}

impl<K: Element, V: Payload> CollectedInner<K, V> {
    fn new(kind: &'static str) -> Self {
        Self {
            core: DictCore::new(kind, Box::new(HashMap::new())),
            link: Link::new(),
        }
    }

    fn on_entries(&self, change: &DictChange<K, V>) -> Result<()> {
        let _gate = self.core.lock();
        let change = match change.reason {
            DictChangeReason::AddOrUpdate => self.core.upserts(change.iter().cloned()),
            DictChangeReason::Remove => self.core.removals(change.keys().cloned()),
        };
        self.core.commit(change);
        Ok(())
    }

    fn on_keys<F>(&self, change: &SetChange<K>, factory: &F) -> Result<()>
    where
        F: Fn(&K) -> V,
    {
        let _gate = self.core.lock();
        let change = match change.reason {
            ChangeReason::Add => {
                let fresh = change
                    .iter()
                    .filter(|key| !self.core.contains_key(key))
                    .map(|key| guard(|| factory(key)).map(|value| (key.clone(), value)))
                    .collect::<Result<Vec<_>>>()?;
                self.core.upserts(fresh)
            }
            ChangeReason::Remove => self.core.removals(change.iter().cloned()),
        };
        self.core.commit(change);
        Ok(())
    }

    /// Projects upserted values with `selector`; removals carry the value
    /// projected when the key was last updated.
    fn on_projected<S, F>(&self, change: &DictChange<K, S>, selector: &F) -> Result<()>
    where
        F: Fn(&K, &S) -> V,
    {
        let _gate = self.core.lock();
        let change = match change.reason {
            DictChangeReason::AddOrUpdate => {
                let projected = change
                    .iter()
                    .map(|(key, value)| guard(|| selector(key, value)).map(|v| (key.clone(), v)))
                    .collect::<Result<Vec<_>>>()?;
                self.core.upserts(projected)
            }
            DictChangeReason::Remove => self.core.removals(change.keys().cloned()),
        };
        self.core.commit(change);
        Ok(())
    }
}

impl<K: Element, V: Payload> Downstream for CollectedInner<K, V> {
    fn link(&self) -> &Link {
        &self.link
    }

    fn name(&self) -> &'static str {
        "collect"
    }

    fn fail(&self, error: &Error) {
        self.core.fail(error);
    }

    fn complete(&self) {
        self.core.dispose();
    }
}

/// A dictionary holding its own copy of derived entries.
///
/// Built by collecting another dictionary, by keying a set's items with a
/// value factory, or by projecting a dictionary's values. Every subscriber
/// shares the single upstream subscription; batches are published before
/// the local copy is updated.
pub struct CollectedDictionary<K, V> {
    inner: Arc<CollectedInner<K, V>>,
}

impl<K, V> Clone for CollectedDictionary<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Element, V: Payload> CollectedDictionary<K, V> {
    pub(crate) fn collect<Src>(source: &Src) -> Self
    where
        Src: ObservableDictionary<K, V> + ?Sized,
    {
        let inner = Arc::new(CollectedInner::new("collect"));
        drive(&inner, source, |inner: &CollectedInner<K, V>, change: &DictChange<K, V>| {
            inner.on_entries(change)
        });
        Self { inner }
    }

    /// Keys every item of `source` with `factory(item)`, computed once per key.
    pub(crate) fn from_set<Src, F>(source: &Src, factory: F) -> Self
    where
        Src: ObservableSet<K> + ?Sized,
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        let inner = Arc::new(CollectedInner::new("to_dictionary"));
        drive(&inner, source, move |inner: &CollectedInner<K, V>, change: &SetChange<K>| {
            inner.on_keys(change, &factory)
        });
        Self { inner }
    }

    pub(crate) fn select<S, Src, F>(source: &Src, selector: F) -> Self
    where
        S: Payload,
        Src: ObservableDictionary<K, S> + ?Sized,
        F: Fn(&K, &S) -> V + Send + Sync + 'static,
    {
        let inner = Arc::new(CollectedInner::new("select"));
        drive(&inner, source, move |inner: &CollectedInner<K, V>, change: &DictChange<K, S>| {
            inner.on_projected(change, &selector)
        });
        Self { inner }
    }

    /// Returns the value under `key`, failing with [`Error::KeyNotFound`].
    pub fn get_required(&self, key: &K) -> Result<V> {
        self.inner.core.get(key).ok_or_else(Error::key_not_found)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.core.len()
    }

    /// Returns true if the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current entries.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.inner.core.entries()
    }

    /// Returns a stream of the entry count.
    pub fn watch_count(&self) -> Stream<usize> {
        let inner = Arc::clone(&self.inner);
        Stream::new("count_changed", move |observer| inner.core.watch_count(observer))
    }

    /// Detaches from the source and completes every observer.
    pub fn dispose(&self) {
        self.inner.link.close();
        self.inner.core.dispose();
    }

    /// Returns true once the dictionary stopped following its source.
    pub fn is_disposed(&self) -> bool {
        self.inner.core.is_disposed()
    }
}

impl<K: Element, V: Payload> Observable<DictChange<K, V>> for CollectedDictionary<K, V> {
    fn subscribe(&self, observer: Arc<dyn Observer<DictChange<K, V>>>) -> Subscription {
        self.inner.core.subscribe(observer)
    }
}

impl<K: Element, V: Payload> ObservableDictionary<K, V> for CollectedDictionary<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        self.inner.core.get(key)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.inner.core.contains_key(key)
    }
}

impl<K: Element, V: Payload> MaterializedDictionary<K, V> for CollectedDictionary<K, V> {
    fn len(&self) -> usize {
        CollectedDictionary::len(self)
    }

    fn to_vec(&self) -> Vec<(K, V)> {
        CollectedDictionary::to_vec(self)
    }
}

impl<K: Element, V: Payload> fmt::Debug for CollectedDictionary<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectedDictionary").field("len", &self.len()).finish()
    }
}
