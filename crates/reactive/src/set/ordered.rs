//! Sorted materialization of a reactive set.

use crate::aggregate::aggregate;
use crate::hub::Hub;
use crate::link::{drive, Downstream, Link};
use crate::observable::{MaterializedSet, Observable, ObservableSet, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{guard, Element, Error, Result};
use fluid_incremental::{Aggregator, ChangeReason, SetChange, SetChangeBuilder};
use fluid_index::{Comparator, DuplicatePolicy, NaturalComparator, WeightedIndex};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

struct OrderedInner<T, C> {
    hub: Hub<SetChange<T>>,
    index: RwLock<WeightedIndex<T, C>>,
    link: Link,
}

impl<T, C> OrderedInner<T, C>
where
    T: Element,
    C: Comparator<T> + Send + Sync + 'static,
{
    fn on_change(&self, change: &SetChange<T>) -> Result<()> {
        let _gate = self.hub.lock();
        let batches = self.commit(change)?;
        for batch in &batches {
            trace!(kind = "order_by", reason = ?batch.reason, items = batch.len(), "publish");
            self.hub.publish(batch);
        }
        Ok(())
    }

    /// Applies a source batch to the index as a unit.
    ///
    /// If the comparator panics partway through, the edits already made for
    /// this batch are reverted before the error is returned.
    fn commit(&self, change: &SetChange<T>) -> Result<Vec<SetChange<T>>> {
        let mut index = self.index.write();
        let mut undo = Vec::new();
        match guard(|| apply(&mut index, change, &mut undo)) {
            Ok(batches) => Ok(batches),
            Err(error) => {
                let reverted = undo.len();
                if let Err(rollback) = guard(|| revert(&mut index, undo)) {
                    warn!(kind = "order_by", error = %rollback, "rollback failed");
                } else {
                    trace!(kind = "order_by", edits = reverted, "rolled back");
                }
                Err(error)
            }
        }
    }
}

/// An index edit and what it takes to reverse it.
enum Undo<T> {
    Inserted(T),
    Replaced(T),
    Removed(T),
}

/// Applies a source batch to the index, returning what became visible.
fn apply<T, C>(index: &mut WeightedIndex<T, C>, change: &SetChange<T>, undo: &mut Vec<Undo<T>>) -> Vec<SetChange<T>>
where
    T: Element,
    C: Comparator<T>,
{
    let mut out = SetChangeBuilder::new();

    match change.reason {
        ChangeReason::Add => {
            for item in change.iter() {
                match index.get(item).cloned() {
                    None => {
                        index.insert(item.clone());
                        undo.push(Undo::Inserted(item.clone()));
                        out.push(ChangeReason::Add, item.clone());
                    }
                    Some(existing) if existing != *item && index.policy() == DuplicatePolicy::ReplaceExisting => {
                        index.insert(item.clone());
                        undo.push(Undo::Replaced(existing.clone()));
                        out.push(ChangeReason::Remove, existing);
                        out.push(ChangeReason::Add, item.clone());
                    }
                    Some(_) => {}
                }
            }
        }
        ChangeReason::Remove => {
            for item in change.iter() {
                // Only the stored value itself leaves; a comparator-equal
                // item that never made it in does not evict it.
                if index.get(item) == Some(item) {
                    index.remove(item);
                    undo.push(Undo::Removed(item.clone()));
                    out.push(ChangeReason::Remove, item.clone());
                }
            }
        }
    }

    out.finish()
}

/// Reverses edits newest first.
fn revert<T, C>(index: &mut WeightedIndex<T, C>, undo: Vec<Undo<T>>)
where
    T: Element,
    C: Comparator<T>,
{
    for edit in undo.into_iter().rev() {
        match edit {
            Undo::Inserted(item) => {
                index.remove(&item);
            }
            // Replaced only happens under ReplaceExisting, so reinserting
            // the old value evicts the new one.
            Undo::Replaced(item) | Undo::Removed(item) => {
                index.insert(item);
            }
        }
    }
}

impl<T, C> Downstream for OrderedInner<T, C>
where
    T: Element,
    C: Comparator<T> + Send + Sync + 'static,
{
    fn link(&self) -> &Link {
        &self.link
    }

    fn name(&self) -> &'static str {
        "order_by"
    }

    fn fail(&self, error: &Error) {
        self.hub.fail(error);
    }

    fn complete(&self) {
        self.hub.complete();
    }
}

/// A set kept in comparator order with positional access.
///
/// Items that compare equal occupy a single position; which one is kept is
/// decided by the [`DuplicatePolicy`]. The index is updated before each
/// batch is published, and the snapshot batch lists items in sort order.
pub struct OrderedSet<T, C = NaturalComparator> {
    inner: Arc<OrderedInner<T, C>>,
}

impl<T, C> Clone for OrderedSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, C> OrderedSet<T, C>
where
    T: Element,
    C: Comparator<T> + Send + Sync + 'static,
{
    pub(crate) fn new<S>(source: &S, comparator: C, policy: DuplicatePolicy) -> Self
    where
        S: ObservableSet<T> + ?Sized,
    {
        let inner = Arc::new(OrderedInner {
            hub: Hub::new("order_by"),
            index: RwLock::new(WeightedIndex::with_policy(comparator, policy)),
            link: Link::new(),
        });
        drive(&inner, source, |inner: &OrderedInner<T, C>, change: &SetChange<T>| inner.on_change(change));
        Self { inner }
    }

    /// Returns the item at `index` in sort order.
    pub fn at(&self, index: usize) -> Result<T> {
        self.inner.index.read().at(index).cloned()
    }

    /// Returns the sort position of the item comparing equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.index.read().index_of(item)
    }

    /// Returns the first item in sort order.
    pub fn min(&self) -> Option<T> {
        self.inner.index.read().min().cloned()
    }

    /// Returns the last item in sort order.
    pub fn max(&self) -> Option<T> {
        self.inner.index.read().max().cloned()
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.inner.index.read().len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the items in sort order.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.index.read().iter().cloned().collect()
    }

    /// Returns a cursor over the items in sort order.
    ///
    /// The cursor reads one position at a time without holding a lock. If
    /// the set changes while it is open, the next step yields
    /// [`Error::ModifiedDuringIteration`] and the cursor ends.
    pub fn iter(&self) -> OrderedIter<T, C> {
        OrderedIter {
            inner: Arc::clone(&self.inner),
            version: self.inner.index.read().version(),
            position: 0,
            done: false,
        }
    }

    /// Returns a stream of the smallest item, emitted when it changes.
    pub fn min_stream(&self) -> Stream<Option<T>> {
        self.extremum("min", Extreme::Min)
    }

    /// Returns a stream of the largest item, emitted when it changes.
    pub fn max_stream(&self) -> Stream<Option<T>> {
        self.extremum("max", Extreme::Max)
    }

    fn extremum(&self, name: &'static str, which: Extreme) -> Stream<Option<T>> {
        let inner = Arc::clone(&self.inner);
        let source = self.clone();
        aggregate(name, source, move || Extremum {
            inner: Arc::clone(&inner),
            which,
        })
    }

    /// Detaches from the source and completes every observer.
    pub fn dispose(&self) {
        self.inner.link.close();
        self.inner.hub.complete();
    }
}

impl<T, C> Observable<SetChange<T>> for OrderedSet<T, C>
where
    T: Element,
    C: Comparator<T> + Send + Sync + 'static,
{
    fn subscribe(&self, observer: Arc<dyn Observer<SetChange<T>>>) -> Subscription {
        self.inner.hub.subscribe(observer, || SetChange::add(self.to_vec()))
    }
}

impl<T, C> ObservableSet<T> for OrderedSet<T, C>
where
    T: Element,
    C: Comparator<T> + Send + Sync + 'static,
{
    fn contains(&self, item: &T) -> bool {
        self.inner.index.read().get(item) == Some(item)
    }
}

impl<T, C> MaterializedSet<T> for OrderedSet<T, C>
where
    T: Element,
    C: Comparator<T> + Send + Sync + 'static,
{
    fn len(&self) -> usize {
        OrderedSet::len(self)
    }

    fn to_vec(&self) -> Vec<T> {
        OrderedSet::to_vec(self)
    }
}

impl<T, C> fmt::Debug for OrderedSet<T, C>
where
    T: Element + fmt::Debug,
    C: Comparator<T> + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

/// Cursor returned by [`OrderedSet::iter`].
pub struct OrderedIter<T, C> {
    inner: Arc<OrderedInner<T, C>>,
    version: u64,
    position: usize,
    done: bool,
}

impl<T, C> Iterator for OrderedIter<T, C>
where
    T: Element,
    C: Comparator<T> + Send + Sync + 'static,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let index = self.inner.index.read();
        if index.version() != self.version {
            self.done = true;
            return Some(Err(Error::ModifiedDuringIteration));
        }
        if self.position >= index.len() {
            self.done = true;
            return None;
        }
        let item = index.at(self.position).cloned();
        self.position += 1;
        Some(item)
    }
}

#[derive(Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

/// Reads the current extreme of an ordered set after every batch.
struct Extremum<T, C> {
    inner: Arc<OrderedInner<T, C>>,
    which: Extreme,
}

impl<T, C> Aggregator<SetChange<T>> for Extremum<T, C>
where
    T: Element,
    C: Comparator<T> + Send + Sync + 'static,
{
    type Output = Option<T>;

    fn apply(&mut self, _change: &SetChange<T>) -> Result<()> {
        Ok(())
    }

    fn value(&self) -> Option<T> {
        let index = self.inner.index.read();
        match self.which {
            Extreme::Min => index.min().cloned(),
            Extreme::Max => index.max().cloned(),
        }
    }
}
