//! Per-entry resources tied to dictionary membership.

use crate::link::{drive, Downstream, Link};
use crate::observable::{Observable, ObservableDictionary, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{guard, Element, Error, Payload, Result};
use fluid_incremental::{DictChange, DictChangeReason};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use tracing::trace;

type Factory<K, V> = dyn Fn(&K, &V) -> Subscription + Send + Sync;

/// One subscription of a `subscribe_many` relay.
struct ScopedTarget<K, V> {
    link: Link,
    downstream: Arc<dyn Observer<DictChange<K, V>>>,
    handles: Mutex<HashMap<K, Subscription>>,
    factory: Arc<Factory<K, V>>,
}

impl<K: Element, V: Payload> ScopedTarget<K, V> {
    fn forward(&self, change: &DictChange<K, V>) -> Result<()> {
        for (key, value) in change.iter() {
            // Handles are dropped outside the map lock; their release may
            // reach back into this relay.
            let previous = self.handles.lock().remove(key);
            drop(previous);
            if change.reason == DictChangeReason::AddOrUpdate {
                let handle = guard(|| (self.factory)(key, value))?;
                self.handles.lock().insert(key.clone(), handle);
            }
        }
        if self.link.is_closed() {
            self.release();
            return Ok(());
        }

        if !change.is_empty() {
            self.downstream.on_next(change);
        }
        Ok(())
    }

    fn release(&self) {
        let handles = mem::take(&mut *self.handles.lock());
        if !handles.is_empty() {
            trace!(handles = handles.len(), "releasing entry handles");
        }
        drop(handles);
    }
}

impl<K: Element, V: Payload> Downstream for ScopedTarget<K, V> {
    fn link(&self) -> &Link {
        &self.link
    }

    fn name(&self) -> &'static str {
        "subscribe_many"
    }

    fn fail(&self, error: &Error) {
        self.release();
        self.downstream.on_error(error);
    }

    fn complete(&self) {
        self.release();
        self.downstream.on_completed();
    }
}

/// Relays `source` while holding one handle per entry.
///
/// `factory` runs for every added or updated entry. The handle it returns
/// is released when the entry is next updated or removed, and all handles
/// are released when the subscription ends.
pub(crate) fn subscribe_many<K, V, D, F>(source: D, factory: F) -> Stream<DictChange<K, V>>
where
    K: Element,
    V: Payload,
    D: ObservableDictionary<K, V> + 'static,
    F: Fn(&K, &V) -> Subscription + Send + Sync + 'static,
{
    let factory: Arc<Factory<K, V>> = Arc::new(factory);

    Stream::new("subscribe_many", move |downstream| {
        let target = Arc::new(ScopedTarget {
            link: Link::new(),
            downstream,
            handles: Mutex::new(HashMap::new()),
            factory: Arc::clone(&factory),
        });
        drive(&target, &source, |t: &ScopedTarget<K, V>, change: &DictChange<K, V>| t.forward(change));
        Subscription::new(move || {
            target.link.close();
            target.release();
        })
    })
}
