//! Materialization of a derived set.

use super::base::SetCore;
use crate::link::{drive, Downstream, Link};
use crate::observable::{MaterializedSet, Observable, ObservableSet, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{Element, Error, Result};
use fluid_incremental::SetChange;
use hashbrown::HashSet;
use std::fmt;
use std::sync::Arc;

struct CollectedInner<T> {
    core: SetCore<T>,
    link: Link,
}

impl<T: Element> CollectedInner<T> {
    fn apply(&self, change: &SetChange<T>) -> Result<()> {
        let _gate = self.core.lock();
        let effective = self.core.effective(change.reason, change.iter().cloned());
        self.core.commit(effective);
        Ok(())
    }
}

impl<T: Element> Downstream for CollectedInner<T> {
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

/// A set holding its own copy of another set's members.
///
/// Collecting turns a relay into a materialized collection: membership
/// queries read the local copy instead of recomputing the operator, and
/// every subscriber shares one upstream subscription.
pub struct CollectedSet<T> {
    inner: Arc<CollectedInner<T>>,
}

impl<T> Clone for CollectedSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element> CollectedSet<T> {
    pub(crate) fn new<S>(source: &S) -> Self
    where
        S: ObservableSet<T> + ?Sized,
    {
        Self::from_stream("collect", source)
    }

    /// Materializes any stream of set batches, such as a buffered stream.
    pub(crate) fn from_stream<S>(kind: &'static str, source: &S) -> Self
    where
        S: Observable<SetChange<T>> + ?Sized,
    {
        let inner = Arc::new(CollectedInner {
            core: SetCore::new(kind, Box::new(HashSet::new())),
            link: Link::new(),
        });
        drive(&inner, source, |inner: &CollectedInner<T>, change: &SetChange<T>| inner.apply(change));
        Self { inner }
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.inner.core.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current items.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.core.items()
    }

    /// Returns a stream of the item count.
    pub fn watch_count(&self) -> Stream<usize> {
        let inner = Arc::clone(&self.inner);
        Stream::new("count_changed", move |observer| inner.core.watch_count(observer))
    }

    /// Detaches from the source and completes every observer.
    pub fn dispose(&self) {
        self.inner.link.close();
        self.inner.core.dispose();
    }

    /// Returns true once the set stopped following its source.
    pub fn is_disposed(&self) -> bool {
        self.inner.core.is_disposed()
    }
}

impl<T: Element> Observable<SetChange<T>> for CollectedSet<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<SetChange<T>>>) -> Subscription {
        self.inner.core.subscribe(observer)
    }
}

impl<T: Element> ObservableSet<T> for CollectedSet<T> {
    fn contains(&self, item: &T) -> bool {
        self.inner.core.contains(item)
    }
}

impl<T: Element> MaterializedSet<T> for CollectedSet<T> {
    fn len(&self) -> usize {
        CollectedSet::len(self)
    }

    fn to_vec(&self) -> Vec<T> {
        CollectedSet::to_vec(self)
    }
}

impl<T: Element> fmt::Debug for CollectedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectedSet").field("len", &self.len()).finish()
    }
}
