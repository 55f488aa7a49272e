//! Fluent operators available on every observable dictionary.

use super::collected::CollectedDictionary;
use super::scoped;
use crate::aggregate::aggregate;
use crate::observable::{DictSnapshot, ObservableDictionary, ObservableSet, SharedDictionary, Stream};
use crate::relay::{merge, pipe, DictRelay, MergePlan, SetRelay};
use crate::set::SelectSet;
use crate::sink::{first_batch, scan};
use fluid_core::{guard, Element, Payload, Result};
use fluid_incremental::{
    filter_dict_change, join_change, join_snapshots, keys_change, pairs_change, symmetric_except_change,
    symmetric_except_snapshots, symmetric_join_change, symmetric_join_snapshots, DictChange, DictChangeReason,
    DictFold, FoldFn, KeyFilter, SetChange, Side,
};
use hashbrown::HashMap;
use std::sync::Arc;

/// Builds the relay of a dictionary restricted by a key set.
fn key_filter<K, V, D, S>(filter: KeyFilter, name: &'static str, dict: &D, keys: &S) -> DictRelay<K, V>
where
    K: Element,
    V: Payload,
    D: ObservableDictionary<K, V> + Clone + 'static,
    S: ObservableSet<K> + Clone + 'static,
{
    let (d, k) = (dict.clone(), keys.clone());
    let plan = MergePlan {
        combine: Box::new(move |entries: &DictSnapshot<K, V>, keys: &Vec<K>| {
            Ok(DictChange::add_or_update(filter.combine_snapshots(entries.as_slice(), keys)))
        }),
        left: Box::new(move |change: &DictChange<K, V>| Ok(vec![filter.translate_entries(change, |key| k.contains(key))])),
        right: Box::new(move |change: &SetChange<K>| Ok(filter.translate_keys(change, |key| d.get(key)))),
    };
    let stream = merge(name, dict.clone(), keys.clone(), plan);

    let (d, k) = (dict.clone(), keys.clone());
    DictRelay::new(stream, move |key| d.get(key).filter(|_| filter.admits(k.contains(key))))
}

/// Dictionary filters, joins, projections, aggregates and conversions.
///
/// As with sets, relay operators keep no state and answer `get` by
/// consulting their sources; `select` and `collect` materialize.
///
/// # Example
///
/// ```
/// use fluid_reactive::{DictExt, ObservableDictionary, ReactiveDictionary};
///
/// let prices = ReactiveDictionary::from_entries([("apple", 3), ("pear", 5)]);
/// let stock = ReactiveDictionary::from_entries([("pear", 10), ("plum", 2)]);
/// let value = prices.symmetric_join(&stock, |_, price, count| price * count);
///
/// assert_eq!(value.get(&"pear"), Some(50));
/// assert_eq!(value.get(&"apple"), None);
/// ```
pub trait DictExt<K: Element, V: Payload>: ObservableDictionary<K, V> + Clone + Sized + 'static {
    /// Erases the concrete type.
    fn shared(&self) -> SharedDictionary<K, V> {
        Arc::new(self.clone())
    }

    /// Entries satisfying `predicate`.
    ///
    /// An update whose new value fails the predicate while the old one
    /// passed it is published as a removal of the old entry.
    fn filter<F>(&self, predicate: F) -> DictRelay<K, V>
    where
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let (snapshot, live) = (Arc::clone(&predicate), Arc::clone(&predicate));
        let previous = self.clone();
        let stream = pipe(
            "where",
            self.clone(),
            move |change: &DictChange<K, V>| {
                guard(|| {
                    let entries = change.iter().filter(|(k, v)| snapshot(k, v)).cloned().collect();
                    DictChange::add_or_update(entries)
                })
            },
            move |change: &DictChange<K, V>| {
                guard(|| filter_dict_change(change, |k, v| live(k, v), |k| previous.get(k)))
            },
        );

        let source = self.clone();
        DictRelay::new(stream, move |key| {
            source.get(key).filter(|value| guard(|| predicate(key, value)).unwrap_or(false))
        })
    }

    /// A dictionary of projected values, keeping the same keys.
    fn select<R, F>(&self, selector: F) -> CollectedDictionary<K, R>
    where
        R: Payload,
        F: Fn(&K, &V) -> R + Send + Sync + 'static,
    {
        CollectedDictionary::select(self, selector)
    }

    /// The union of keys; this dictionary's value wins for shared keys.
    fn join<O>(&self, other: &O) -> DictRelay<K, V>
    where
        O: ObservableDictionary<K, V> + Clone + 'static,
    {
        let (l, r) = (self.clone(), other.clone());
        let plan = MergePlan {
            combine: Box::new(|a: &DictSnapshot<K, V>, b: &DictSnapshot<K, V>| {
                Ok(DictChange::add_or_update(join_snapshots(a.as_slice(), b.as_slice())))
            }),
            left: Box::new(move |change: &DictChange<K, V>| Ok(join_change(Side::Left, change, |k| r.get(k)))),
            right: Box::new(move |change: &DictChange<K, V>| Ok(join_change(Side::Right, change, |k| l.get(k)))),
        };
        let stream = merge("join", self.clone(), other.clone(), plan);

        let (l, r) = (self.clone(), other.clone());
        DictRelay::new(stream, move |key| l.get(key).or_else(|| r.get(key)))
    }

    /// The intersection of keys, valued by `selector`.
    fn symmetric_join<B, R, O, F>(&self, other: &O, selector: F) -> DictRelay<K, R>
    where
        B: Payload,
        R: Payload,
        O: ObservableDictionary<K, B> + Clone + 'static,
        F: Fn(&K, &V, &B) -> R + Send + Sync + 'static,
    {
        let selector = Arc::new(selector);
        let (l, r) = (self.clone(), other.clone());
        let (on_snapshot, on_left, on_right) = (Arc::clone(&selector), Arc::clone(&selector), Arc::clone(&selector));
        let plan = MergePlan {
            combine: Box::new(move |a: &DictSnapshot<K, V>, b: &DictSnapshot<K, B>| {
                guard(|| {
                    let entries = symmetric_join_snapshots(a.as_slice(), b.as_slice(), |k, x, y| on_snapshot(k, x, y));
                    DictChange::add_or_update(entries)
                })
            }),
            left: Box::new(move |change: &DictChange<K, V>| {
                guard(|| vec![symmetric_join_change(change, |k, v| r.get(k).map(|b| on_left(k, v, &b)))])
            }),
            right: Box::new(move |change: &DictChange<K, B>| {
                guard(|| vec![symmetric_join_change(change, |k, b| l.get(k).map(|a| on_right(k, &a, b)))])
            }),
        };
        let stream = merge("symmetric_join", self.clone(), other.clone(), plan);

        let (l, r) = (self.clone(), other.clone());
        DictRelay::new(stream, move |key| match (l.get(key), r.get(key)) {
            (Some(a), Some(b)) => guard(|| selector(key, &a, &b)).ok(),
            _ => None,
        })
    }

    /// Entries whose key is not in `keys`.
    fn except_keys<S>(&self, keys: &S) -> DictRelay<K, V>
    where
        S: ObservableSet<K> + Clone + 'static,
    {
        key_filter(KeyFilter::Except, "except_keys", self, keys)
    }

    /// Entries whose key is in `keys`.
    fn intersect_keys<S>(&self, keys: &S) -> DictRelay<K, V>
    where
        S: ObservableSet<K> + Clone + 'static,
    {
        key_filter(KeyFilter::Intersect, "intersect_keys", self, keys)
    }

    /// Entries whose key is held by exactly one of the two dictionaries.
    fn symmetric_except<O>(&self, other: &O) -> DictRelay<K, V>
    where
        O: ObservableDictionary<K, V> + Clone + 'static,
    {
        let (l1, r1) = (self.clone(), other.clone());
        let (l2, r2) = (self.clone(), other.clone());
        let plan = MergePlan {
            combine: Box::new(|a: &DictSnapshot<K, V>, b: &DictSnapshot<K, V>| {
                Ok(DictChange::add_or_update(symmetric_except_snapshots(a.as_slice(), b.as_slice())))
            }),
            left: Box::new(move |change: &DictChange<K, V>| {
                Ok(symmetric_except_change(change, |k| r1.get(k), |k| l1.get(k)))
            }),
            right: Box::new(move |change: &DictChange<K, V>| {
                Ok(symmetric_except_change(change, |k| l2.get(k), |k| r2.get(k)))
            }),
        };
        let stream = merge("symmetric_except", self.clone(), other.clone(), plan);

        let (l, r) = (self.clone(), other.clone());
        DictRelay::new(stream, move |key| match (l.get(key), r.get(key)) {
            (Some(v), None) | (None, Some(v)) => Some(v),
            _ => None,
        })
    }

    /// A seeded fold over the entries.
    ///
    /// Replacing a value folds the old entry out with `remove` before
    /// folding the new one in with `add`.
    fn aggregate<A, FA, FR>(&self, seed: A, add: FA, remove: FR) -> Stream<A>
    where
        A: Clone + PartialEq + Send + Sync + 'static,
        FA: Fn(&A, &K, &V) -> A + Send + Sync + 'static,
        FR: Fn(&A, &K, &V) -> A + Send + Sync + 'static,
    {
        self.try_aggregate(seed, move |acc, k, v| Ok(add(acc, k, v)), move |acc, k, v| Ok(remove(acc, k, v)))
    }

    /// Like [`aggregate`](DictExt::aggregate), with folds that can fail.
    fn try_aggregate<A, FA, FR>(&self, seed: A, add: FA, remove: FR) -> Stream<A>
    where
        A: Clone + PartialEq + Send + Sync + 'static,
        FA: Fn(&A, &K, &V) -> Result<A> + Send + Sync + 'static,
        FR: Fn(&A, &K, &V) -> Result<A> + Send + Sync + 'static,
    {
        let add: FoldFn<(K, V), A> = Arc::new(move |acc: &A, entry: &(K, V)| add(acc, &entry.0, &entry.1));
        let remove: FoldFn<(K, V), A> = Arc::new(move |acc: &A, entry: &(K, V)| remove(acc, &entry.0, &entry.1));
        aggregate("aggregate", self.clone(), move || {
            DictFold::new(seed.clone(), Arc::clone(&add), Arc::clone(&remove))
        })
    }

    /// The number of entries.
    fn count(&self) -> Stream<usize> {
        let add: FoldFn<(K, V), usize> = Arc::new(|n: &usize, _: &(K, V)| Ok(n + 1));
        let remove: FoldFn<(K, V), usize> = Arc::new(|n: &usize, _: &(K, V)| Ok(n.saturating_sub(1)));
        aggregate("count", self.clone(), move || DictFold::new(0, Arc::clone(&add), Arc::clone(&remove)))
    }

    /// Materializes this dictionary.
    fn collect(&self) -> CollectedDictionary<K, V> {
        CollectedDictionary::collect(self)
    }

    /// The `(key, value)` pairs as a set.
    ///
    /// Replacing a value removes the old pair and adds the new one.
    fn to_set(&self) -> SetRelay<(K, V)>
    where
        V: Element,
    {
        let previous = self.clone();
        let stream = pipe(
            "to_set",
            self.clone(),
            |change: &DictChange<K, V>| Ok(SetChange::add(change.entries.clone())),
            move |change: &DictChange<K, V>| Ok(pairs_change(change, |k| previous.get(k))),
        );
        let source = self.clone();
        SetRelay::new(stream, move |(key, value)| source.get(key).as_ref() == Some(value))
    }

    /// The keys as a set.
    fn key_set(&self) -> SetRelay<K> {
        let previous = self.clone();
        let stream = pipe(
            "key_set",
            self.clone(),
            |change: &DictChange<K, V>| Ok(SetChange::add(change.keys().cloned().collect())),
            move |change: &DictChange<K, V>| Ok(vec![keys_change(change, |k| previous.contains_key(k))]),
        );
        let source = self.clone();
        SetRelay::new(stream, move |key| source.contains_key(key))
    }

    /// The distinct values as a set, with multiplicity tracking.
    fn value_set(&self) -> SelectSet<K, V>
    where
        V: Element,
    {
        SelectSet::from_entries(self)
    }

    /// Passes batches through while holding one handle per entry.
    ///
    /// `factory` opens a handle for every added or updated entry. A key's
    /// handle is released when its entry is updated or removed, and every
    /// handle is released when the subscription ends.
    fn subscribe_many<F>(&self, factory: F) -> DictRelay<K, V>
    where
        F: Fn(&K, &V) -> crate::Subscription + Send + Sync + 'static,
    {
        let stream = scoped::subscribe_many(self.clone(), factory);
        let source = self.clone();
        DictRelay::new(stream, move |key| source.get(key))
    }

    /// The current entries.
    fn snapshot(&self) -> Vec<(K, V)> {
        first_batch(self).map(|change| change.entries).unwrap_or_default()
    }

    /// A stream of full immutable maps, one per batch.
    fn snapshots(&self) -> Stream<Arc<HashMap<K, V>>> {
        scan(
            "snapshots",
            self.clone(),
            HashMap::new,
            |entries: &mut HashMap<K, V>, change: &DictChange<K, V>| {
                match change.reason {
                    DictChangeReason::AddOrUpdate => entries.extend(change.iter().cloned()),
                    DictChangeReason::Remove => {
                        for key in change.keys() {
                            entries.remove(key);
                        }
                    }
                }
                Arc::new(entries.clone())
            },
        )
    }
}

impl<K: Element, V: Payload, D> DictExt<K, V> for D where D: ObservableDictionary<K, V> + Clone + Sized + 'static {}
