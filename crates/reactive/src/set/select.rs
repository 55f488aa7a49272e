//! Projection of a reactive set.

use crate::hub::Hub;
use crate::link::{drive, Downstream, Link};
use crate::observable::{MaterializedSet, Observable, ObservableDictionary, ObservableSet};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{guard, Element, Error, Result};
use fluid_incremental::{ChangeReason, DictChange, SelectState, SetChange};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type Selector<S, D> = dyn Fn(&S) -> D + Send + Sync;

struct SelectInner<S, D> {
    hub: Hub<SetChange<D>>,
    state: RwLock<SelectState<S, D>>,
    link: Link,
}

impl<S: Element, D: Element> SelectInner<S, D> {
    fn new() -> Self {
        Self {
            hub: Hub::new("select"),
            state: RwLock::new(SelectState::new()),
            link: Link::new(),
        }
    }

    /// Projects unseen source items, then applies the batch. The selector
    /// runs before any state changes, so a failing selector leaves the
    /// projection untouched.
    fn on_items(&self, change: &SetChange<S>, selector: &Selector<S, D>) -> Result<()> {
        let _gate = self.hub.lock();
        let out = match change.reason {
            ChangeReason::Add => {
                let fresh = {
                    let state = self.state.read();
                    change
                        .iter()
                        .filter(|item| state.projection(item).is_none())
                        .map(|item| guard(|| selector(item)).map(|selected| (item.clone(), selected)))
                        .collect::<Result<Vec<_>>>()?
                };
                let mut state = self.state.write();
                let added = fresh
                    .into_iter()
                    .filter_map(|(item, selected)| state.insert(item, selected).added)
                    .collect();
                SetChange::add(added)
            }
            ChangeReason::Remove => {
                let mut state = self.state.write();
                SetChange::remove(change.iter().filter_map(|item| state.remove(item)).collect())
            }
        };
        self.publish(&out);
        Ok(())
    }

    fn on_entries(&self, change: &DictChange<S, D>) -> Result<()> {
        let _gate = self.hub.lock();
        let batches = self.state.write().apply_entries(change);
        for batch in &batches {
            self.publish(batch);
        }
        Ok(())
    }

    fn publish(&self, change: &SetChange<D>) {
        if change.is_empty() {
            return;
        }
        trace!(kind = "select", reason = ?change.reason, items = change.len(), "publish");
        self.hub.publish(change);
    }
}

impl<S: Element, D: Element> Downstream for SelectInner<S, D> {
    fn link(&self) -> &Link {
        &self.link
    }

    fn name(&self) -> &'static str {
        "select"
    }

    fn fail(&self, error: &Error) {
        self.hub.fail(error);
    }

    fn complete(&self) {
        self.hub.complete();
    }
}

/// The image of a set under a selector.
///
/// Each source item is projected once, when it first appears; the cached
/// projection is reused when it leaves. A selected value stays a member
/// while at least one source item projects to it. The projection is
/// updated before its batch is published, so observers see the new state.
pub struct SelectSet<S, D> {
    inner: Arc<SelectInner<S, D>>,
}

impl<S, D> Clone for SelectSet<S, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Element, D: Element> SelectSet<S, D> {
    pub(crate) fn from_set<Src, F>(source: &Src, selector: F) -> Self
    where
        Src: ObservableSet<S> + ?Sized,
        F: Fn(&S) -> D + Send + Sync + 'static,
    {
        let inner = Arc::new(SelectInner::new());
        drive(&inner, source, move |inner: &SelectInner<S, D>, change: &SetChange<S>| {
            inner.on_items(change, &selector)
        });
        Self { inner }
    }

    /// Builds the set of a dictionary's values, keyed by the dictionary's keys.
    pub(crate) fn from_entries<Src>(source: &Src) -> Self
    where
        Src: ObservableDictionary<S, D> + ?Sized,
    {
        let inner = Arc::new(SelectInner::new());
        drive(&inner, source, |inner: &SelectInner<S, D>, change: &DictChange<S, D>| {
            inner.on_entries(change)
        });
        Self { inner }
    }

    /// Returns the number of distinct selected values.
    pub fn len(&self) -> usize {
        self.inner.state.read().len()
    }

    /// Returns true if no value is selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the selected values.
    pub fn to_vec(&self) -> Vec<D> {
        self.inner.state.read().values()
    }

    /// Returns how many source items currently project to `value`.
    pub fn multiplicity(&self, value: &D) -> usize {
        self.inner.state.read().multiplicity(value)
    }

    /// Detaches from the source and completes every observer.
    pub fn dispose(&self) {
        self.inner.link.close();
        self.inner.hub.complete();
    }
}

impl<S: Element, D: Element> Observable<SetChange<D>> for SelectSet<S, D> {
    fn subscribe(&self, observer: Arc<dyn Observer<SetChange<D>>>) -> Subscription {
        self.inner.hub.subscribe(observer, || SetChange::add(self.to_vec()))
    }
}

impl<S: Element, D: Element> ObservableSet<D> for SelectSet<S, D> {
    fn contains(&self, item: &D) -> bool {
        self.inner.state.read().contains(item)
    }
}

impl<S: Element, D: Element> MaterializedSet<D> for SelectSet<S, D> {
    fn len(&self) -> usize {
        SelectSet::len(self)
    }

    fn to_vec(&self) -> Vec<D> {
        SelectSet::to_vec(self)
    }
}

impl<S: Element, D: Element> fmt::Debug for SelectSet<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectSet").field("len", &self.len()).finish()
    }
}
