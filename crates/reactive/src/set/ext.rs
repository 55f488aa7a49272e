//! Fluent operators available on every observable set.

use super::buffer::{buffer, BufferOptions};
use super::collected::CollectedSet;
use super::ordered::OrderedSet;
use super::select::SelectSet;
use crate::aggregate::aggregate;
use crate::dict::CollectedDictionary;
use crate::observable::{ObservableSet, SharedSet, Stream};
use crate::relay::{merge, pipe, MergePlan, SetRelay};
use crate::sink::{first_batch, scan};
use fluid_core::{guard, Element, Payload, Result};
use fluid_incremental::{
    filter_change, ChangeReason, Fold, FoldFn, IncrementalCount, IncrementalProduct, IncrementalSum, Numeric,
    SetChange, SetOperator, Side,
};
use fluid_index::{Comparator, DuplicatePolicy, KeyComparator, NaturalComparator, Order};
use hashbrown::HashSet;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Builds the relay of `op` over two sets.
fn set_operation<T, A, B>(op: SetOperator, left: &A, right: &B) -> SetRelay<T>
where
    T: Element,
    A: ObservableSet<T> + Clone + 'static,
    B: ObservableSet<T> + Clone + 'static,
{
    let (l, r) = (left.clone(), right.clone());
    let plan = MergePlan {
        combine: Box::new(move |a: &Vec<T>, b: &Vec<T>| Ok(SetChange::add(op.combine_snapshots(a, b)))),
        left: Box::new(move |change: &SetChange<T>| Ok(op.translate(Side::Left, change, |x| r.contains(x)))),
        right: Box::new(move |change: &SetChange<T>| Ok(op.translate(Side::Right, change, |x| l.contains(x)))),
    };
    let stream = merge(op.name(), left.clone(), right.clone(), plan);

    let (l, r) = (left.clone(), right.clone());
    SetRelay::new(stream, move |x| op.contains(l.contains(x), r.contains(x)))
}

/// Set algebra, projections, aggregates and sinks.
///
/// Relay operators (`union`, `filter`, ...) keep no state and recompute
/// membership against their sources. Materializing operators (`select`,
/// `order_by`, `buffer`, `collect`, `to_dictionary`) keep a local copy
/// updated from a single upstream subscription.
///
/// # Example
///
/// ```
/// use fluid_reactive::{ObservableSet, ReactiveSet, SetExt};
///
/// let a = ReactiveSet::from_items([2, 3]);
/// let b = ReactiveSet::from_items([3, 4]);
/// let big = a.union(&b).filter(|x| *x > 3);
///
/// assert!(big.contains(&4));
/// assert!(!big.contains(&3));
/// ```
pub trait SetExt<T: Element>: ObservableSet<T> + Clone + Sized + 'static {
    /// Erases the concrete type.
    fn shared(&self) -> SharedSet<T> {
        Arc::new(self.clone())
    }

    /// Items in either set.
    fn union<O>(&self, other: &O) -> SetRelay<T>
    where
        O: ObservableSet<T> + Clone + 'static,
    {
        set_operation(SetOperator::Union, self, other)
    }

    /// Items in both sets.
    fn intersection<O>(&self, other: &O) -> SetRelay<T>
    where
        O: ObservableSet<T> + Clone + 'static,
    {
        set_operation(SetOperator::Intersection, self, other)
    }

    /// Items in this set but not in `other`.
    fn except<O>(&self, other: &O) -> SetRelay<T>
    where
        O: ObservableSet<T> + Clone + 'static,
    {
        set_operation(SetOperator::Except, self, other)
    }

    /// Items in exactly one of the two sets.
    fn symmetric_except<O>(&self, other: &O) -> SetRelay<T>
    where
        O: ObservableSet<T> + Clone + 'static,
    {
        set_operation(SetOperator::SymmetricExcept, self, other)
    }

    /// Items satisfying `predicate`.
    ///
    /// A panicking predicate terminates this relay's stream with
    /// [`fluid_core::Error::Callback`]; a membership query treats it as false.
    fn filter<F>(&self, predicate: F) -> SetRelay<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let (snapshot, live) = (Arc::clone(&predicate), Arc::clone(&predicate));
        let stream = pipe(
            "where",
            self.clone(),
            move |change: &SetChange<T>| guard(|| filter_change(change, |x| snapshot(x))),
            move |change: &SetChange<T>| guard(|| vec![filter_change(change, |x| live(x))]),
        );

        let source = self.clone();
        SetRelay::new(stream, move |x| guard(|| predicate(x)).unwrap_or(false) && source.contains(x))
    }

    /// The image of this set under `selector`, with multiplicity tracking.
    fn select<D, F>(&self, selector: F) -> SelectSet<T, D>
    where
        D: Element,
        F: Fn(&T) -> D + Send + Sync + 'static,
    {
        SelectSet::from_set(self, selector)
    }

    /// This set in natural order.
    fn order_by(&self) -> OrderedSet<T>
    where
        T: Ord,
    {
        OrderedSet::new(self, NaturalComparator::default(), DuplicatePolicy::KeepExisting)
    }

    /// This set ordered by `key`, ascending.
    ///
    /// Items with equal keys occupy one position; the first one kept wins.
    fn order_by_key<K, F>(&self, key: F) -> OrderedSet<T, KeyComparator<F, K>>
    where
        K: Ord + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        OrderedSet::new(self, KeyComparator::new(key, Order::Asc), DuplicatePolicy::KeepExisting)
    }

    /// This set ordered by `comparator`, resolving ties with `policy`.
    fn order_by_with<C>(&self, comparator: C, policy: DuplicatePolicy) -> OrderedSet<T, C>
    where
        C: Comparator<T> + Send + Sync + 'static,
    {
        OrderedSet::new(self, comparator, policy)
    }

    /// Coalesces live batches into windows.
    ///
    /// The result holds what the windows have flushed so far, so its
    /// membership lags this set until the open window closes.
    fn buffer(&self, options: BufferOptions) -> Result<CollectedSet<T>> {
        let options = options.validate()?;
        Ok(CollectedSet::from_stream("buffer", &buffer(self.clone(), options)))
    }

    /// Materializes this set.
    fn collect(&self) -> CollectedSet<T> {
        CollectedSet::new(self)
    }

    /// A seeded fold: `add` folds in added items, `remove` folds out removed ones.
    fn aggregate<A, FA, FR>(&self, seed: A, add: FA, remove: FR) -> Stream<A>
    where
        A: Clone + PartialEq + Send + Sync + 'static,
        FA: Fn(&A, &T) -> A + Send + Sync + 'static,
        FR: Fn(&A, &T) -> A + Send + Sync + 'static,
    {
        self.try_aggregate(seed, move |acc, item| Ok(add(acc, item)), move |acc, item| Ok(remove(acc, item)))
    }

    /// Like [`aggregate`](SetExt::aggregate), with folds that can fail.
    fn try_aggregate<A, FA, FR>(&self, seed: A, add: FA, remove: FR) -> Stream<A>
    where
        A: Clone + PartialEq + Send + Sync + 'static,
        FA: Fn(&A, &T) -> Result<A> + Send + Sync + 'static,
        FR: Fn(&A, &T) -> Result<A> + Send + Sync + 'static,
    {
        let add: FoldFn<T, A> = Arc::new(add);
        let remove: FoldFn<T, A> = Arc::new(remove);
        aggregate("aggregate", self.clone(), move || {
            Fold::new(seed.clone(), Arc::clone(&add), Arc::clone(&remove))
        })
    }

    /// The number of items.
    fn count(&self) -> Stream<usize> {
        aggregate("count", self.clone(), IncrementalCount::new)
    }

    /// The sum of the items.
    fn sum(&self) -> Stream<T>
    where
        T: Numeric,
    {
        aggregate("sum", self.clone(), IncrementalSum::<T>::new)
    }

    /// The product of the items.
    fn product(&self) -> Stream<T>
    where
        T: Numeric,
    {
        aggregate("product", self.clone(), IncrementalProduct::<T>::new)
    }

    /// A dictionary keyed by this set's items, valued by `factory`.
    fn to_dictionary<V, F>(&self, factory: F) -> CollectedDictionary<T, V>
    where
        V: Payload,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        CollectedDictionary::from_set(self, factory)
    }

    /// The current items.
    fn snapshot(&self) -> Vec<T> {
        first_batch(self).map(|change| change.items).unwrap_or_default()
    }

    /// Returns true if the set has any item.
    fn any(&self) -> bool {
        first_batch(self).map_or(false, |change| !change.is_empty())
    }

    /// The first current item satisfying `predicate`.
    fn first<F>(&self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        first_batch(self)?.items.into_iter().find(|item| predicate(item))
    }

    /// A stream of full immutable snapshots, one per batch.
    fn snapshots(&self) -> Stream<Arc<HashSet<T>>> {
        scan("snapshots", self.clone(), HashSet::new, |items: &mut HashSet<T>, change: &SetChange<T>| {
            apply_to(items, change);
            Arc::new(items.clone())
        })
    }

    /// Like [`snapshots`](SetExt::snapshots), with items in natural order.
    fn sorted_snapshots(&self) -> Stream<Arc<Vec<T>>>
    where
        T: Ord,
    {
        scan("sorted_snapshots", self.clone(), BTreeSet::new, |items: &mut BTreeSet<T>, change: &SetChange<T>| {
            match change.reason {
                ChangeReason::Add => items.extend(change.iter().cloned()),
                ChangeReason::Remove => {
                    for item in change.iter() {
                        items.remove(item);
                    }
                }
            }
            Arc::new(items.iter().cloned().collect())
        })
    }
}

impl<T: Element, S> SetExt<T> for S where S: ObservableSet<T> + Clone + Sized + 'static {}

fn apply_to<T: Element>(items: &mut HashSet<T>, change: &SetChange<T>) {
    match change.reason {
        ChangeReason::Add => items.extend(change.iter().cloned()),
        ChangeReason::Remove => {
            for item in change.iter() {
                items.remove(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Observable;
    use crate::observer::FnObserver;
    use crate::set::ReactiveSet;
    use fluid_core::Error;
    use parking_lot::Mutex;

    fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
        items.sort();
        items
    }

    fn replay<T: Element, S: ObservableSet<T>>(set: &S) -> (Arc<Mutex<HashSet<T>>>, crate::Subscription) {
        let replica = Arc::new(Mutex::new(HashSet::new()));
        let sink = replica.clone();
        let sub = set.subscribe(Arc::new(FnObserver::new(move |change: &SetChange<T>| {
            apply_to(&mut sink.lock(), change)
        })));
        (replica, sub)
    }

    #[test]
    fn test_union_snapshot_keeps_shared_items() {
        let a = ReactiveSet::from_items([1, 2]);
        let b = ReactiveSet::from_items([2, 3]);
        assert_eq!(sorted(a.union(&b).snapshot()), vec![1, 2, 3]);
    }

    #[test]
    fn test_set_operators_track_both_sources() {
        let a = ReactiveSet::from_items([1, 2, 3]);
        let b = ReactiveSet::from_items([3, 4]);
        let union = a.union(&b);
        let inter = a.intersection(&b);
        let except = a.except(&b);
        let sym = a.symmetric_except(&b);
        let replicas = [replay(&union), replay(&inter), replay(&except), replay(&sym)];

        a.insert(4);
        b.remove(&3);
        b.insert(1);
        a.remove(&2);

        let expected = [vec![1, 3, 4], vec![1, 4], vec![3], vec![3]];
        for ((replica, _), want) in replicas.iter().zip(expected) {
            assert_eq!(sorted(replica.lock().iter().copied().collect()), want);
        }
        assert!(union.contains(&3));
        assert!(!inter.contains(&3));
        assert!(except.contains(&3));
        assert!(!sym.contains(&1));
    }

    #[test]
    fn test_filter_relay() {
        let source = ReactiveSet::from_items([1, 5, 9]);
        let big = source.filter(|x| *x > 4);
        let (replica, _sub) = replay(&big);

        source.insert(7);
        source.insert(2);
        source.remove(&5);
        assert_eq!(sorted(replica.lock().iter().copied().collect()), vec![7, 9]);
        assert!(big.contains(&9));
        assert!(!big.contains(&2));
        assert!(!big.contains(&5));
    }

    #[test]
    fn test_filter_panic_terminates_stream() {
        let source = ReactiveSet::from_items([1]);
        let fragile = source.filter(|x| {
            assert!(*x != 0, "zero");
            true
        });
        let error = Arc::new(Mutex::new(None));
        let e = error.clone();
        let _sub = fragile.subscribe(Arc::new(FnObserver::new(|_: &SetChange<i32>| {}).with_error(move |err| {
            *e.lock() = Some(err.clone());
        })));

        source.insert(0);
        assert_eq!(*error.lock(), Some(Error::callback("zero")));
        assert!(!fragile.contains(&0));
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_aggregate_emits_once_per_batch() {
        let source = ReactiveSet::from_items([1, 2]);
        let sums = Arc::new(Mutex::new(Vec::new()));
        let sink = sums.clone();
        let _sub = source
            .aggregate(0, |acc, x| acc + x, |acc, x| acc - x)
            .subscribe_fn(move |v: &i32| sink.lock().push(*v));

        source.extend([3, 4]);
        source.insert(0);
        source.remove(&4);
        assert_eq!(*sums.lock(), vec![0, 3, 10, 6]);
    }

    #[test]
    fn test_try_aggregate_failure() {
        let source = ReactiveSet::new();
        let failed = Arc::new(Mutex::new(false));
        let f = failed.clone();
        let _sub = source
            .try_aggregate(
                0u32,
                |acc, x: &u32| acc.checked_add(*x).ok_or_else(|| Error::callback("overflow")),
                |acc, x| Ok(acc - x),
            )
            .subscribe(Arc::new(FnObserver::new(|_: &u32| {}).with_error(move |_| *f.lock() = true)));

        source.insert(u32::MAX);
        assert!(!*failed.lock());
        source.insert(1);
        assert!(*failed.lock());
    }

    #[test]
    fn test_count_sum_product() {
        let source = ReactiveSet::from_items([2, 3]);
        let last = |stream: Stream<i64>| {
            let slot = Arc::new(Mutex::new(0));
            let s = slot.clone();
            let sub = stream.subscribe_fn(move |v: &i64| *s.lock() = *v);
            (slot, sub)
        };
        let (sum, _a) = last(source.sum());
        let (product, _b) = last(source.product());
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let _c = source.count().subscribe_fn(move |n: &usize| *c.lock() = *n);

        source.insert(4);
        assert_eq!((*sum.lock(), *product.lock(), *count.lock()), (9, 24, 3));
        source.remove(&2);
        assert_eq!((*sum.lock(), *product.lock(), *count.lock()), (7, 12, 2));
    }

    #[test]
    fn test_sinks() {
        let source = ReactiveSet::from_items([3, 1, 2]);
        assert_eq!(sorted(source.snapshot()), vec![1, 2, 3]);
        assert!(source.any());
        assert_eq!(source.first(|x| *x > 2), Some(3));
        assert_eq!(source.first(|x| *x > 5), None);
        assert!(!ReactiveSet::<i32>::new().any());

        let latest = Arc::new(Mutex::new(Arc::new(Vec::new())));
        let sink = latest.clone();
        let _sub = source.sorted_snapshots().subscribe_fn(move |s: &Arc<Vec<i32>>| *sink.lock() = s.clone());
        source.remove(&2);
        assert_eq!(**latest.lock(), vec![1, 3]);

        let sets = Arc::new(Mutex::new(Vec::new()));
        let sink = sets.clone();
        let _sub = source.snapshots().subscribe_fn(move |s: &Arc<HashSet<i32>>| sink.lock().push(s.len()));
        source.insert(9);
        assert_eq!(*sets.lock(), vec![2, 3]);
    }

    #[test]
    fn test_buffer_validates_options() {
        let source = ReactiveSet::<i32>::new();
        assert!(source.buffer(BufferOptions::Count(0)).is_err());
        let buffered = source.buffer(BufferOptions::Count(1)).expect("valid");
        source.insert(1);
        assert!(buffered.contains(&1));
    }

    #[test]
    fn test_buffer_membership_follows_flushes() {
        let source = ReactiveSet::<i32>::new();
        let buffered = source.buffer(BufferOptions::Count(3)).expect("valid");
        let (replica, _sub) = replay(&buffered);

        source.insert(1);
        source.insert(2);
        assert!(replica.lock().is_empty());
        assert!(!buffered.contains(&1));
        assert_eq!(buffered.len(), 0);

        source.insert(3);
        assert_eq!(sorted(buffered.to_vec()), vec![1, 2, 3]);
        assert!(buffered.contains(&1));
        assert_eq!(replica.lock().len(), 3);
    }

    #[test]
    fn test_buffered_union_keeps_shared_items() {
        let a = ReactiveSet::<i32>::new();
        let b = ReactiveSet::<i32>::new();
        let union = a.buffer(BufferOptions::Count(2)).expect("valid").union(&b);
        let (replica, _sub) = replay(&union);

        a.insert(1);
        b.insert(1);
        a.insert(9);
        assert_eq!(sorted(replica.lock().iter().copied().collect()), vec![1, 9]);
        assert!(union.contains(&1));

        b.remove(&1);
        assert!(replica.lock().contains(&1));
    }

    #[test]
    fn test_shared_erases_type() {
        let source = ReactiveSet::from_items([1]);
        let shared = source.filter(|x| *x > 0).shared();
        let union = shared.union(&ReactiveSet::from_items([2]));
        assert_eq!(sorted(union.snapshot()), vec![1, 2]);
    }
}
