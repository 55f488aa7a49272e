//! Delivery gate of a stateful collection.

use crate::observer::Observer;
use crate::subscription::{Subscription, SubscriptionManager};
use fluid_core::Error;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Serializes a collection's mutations, snapshots and deliveries.
///
/// The gate is re-entrant so an observer can query or subscribe to the
/// collection that is delivering to it. Locks are always taken upstream
/// before downstream; subscription graphs must not contain cycles.
pub(crate) struct Hub<C> {
    kind: &'static str,
    gate: ReentrantMutex<()>,
    subscribers: Arc<SubscriptionManager<C>>,
}

impl<C: Send + Sync + 'static> Hub<C> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            gate: ReentrantMutex::new(()),
            subscribers: Arc::new(SubscriptionManager::new()),
        }
    }

    #[inline]
    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    /// Acquires the gate. Mutations hold it from diff computation through delivery.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.gate.lock()
    }

    /// Delivers `snapshot()` to `observer`, then registers it, atomically.
    ///
    /// A terminated stream delivers only its terminal notification.
    pub(crate) fn subscribe<F>(&self, observer: Arc<dyn Observer<C>>, snapshot: F) -> Subscription
    where
        F: FnOnce() -> C,
    {
        let _gate = self.gate.lock();
        if let Some(terminal) = self.subscribers.terminal() {
            terminal.deliver(&*observer);
            return Subscription::empty();
        }

        observer.on_next(&snapshot());
        let id = self.subscribers.subscribe(observer);
        trace!(kind = self.kind, id, "subscribed");
        self.subscribers.handle(id)
    }

    /// Delivers a live batch. The caller holds the gate.
    pub(crate) fn publish(&self, change: &C) {
        self.subscribers.notify_all(change);
    }

    pub(crate) fn complete(&self) {
        let _gate = self.gate.lock();
        if self.subscribers.complete() {
            debug!(kind = self.kind, "stream completed");
        }
    }

    pub(crate) fn fail(&self, error: &Error) {
        let _gate = self.gate.lock();
        if self.subscribers.fail(error.clone()) {
            warn!(kind = self.kind, %error, "stream failed");
        }
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.subscribers.is_terminated()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
