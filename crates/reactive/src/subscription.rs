//! Subscription management for reactive collections.
//!
//! This module provides the [`Subscription`] handle returned by every
//! `subscribe` call and the [`SubscriptionManager`] each stateful
//! collection keeps its observers in.
//!
//! The manager's observer list is copy-on-write: a delivery pass walks the
//! list as it was when the pass started, so an observer may subscribe or
//! unsubscribe (itself or a sibling) from inside its callback. Each entry
//! carries an `active` flag; a deactivated entry receives nothing further,
//! even later in the same pass.

use crate::observer::Observer;
use fluid_core::Error;
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

type Cancel = Box<dyn FnOnce() + Send>;

/// A handle to a live subscription.
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Mutex<Option<Cancel>>,
}

impl Subscription {
    /// Creates a subscription that runs `cancel` when released.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Creates an already released subscription.
    pub fn empty() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Combines several subscriptions into one.
    pub fn merge(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || drop(subscriptions))
    }

    /// Returns true once the subscription has been released.
    pub fn is_closed(&self) -> bool {
        self.cancel.lock().is_none()
    }

    /// Stops delivery. Releasing twice is a no-op.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.get_mut().take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// How a stream ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// The stream completed normally.
    Completed,
    /// The stream failed.
    Failed(Error),
}

impl Terminal {
    /// Delivers the terminal notification to `observer`.
    pub fn deliver<C>(&self, observer: &dyn Observer<C>) {
        match self {
            Terminal::Completed => observer.on_completed(),
            Terminal::Failed(error) => observer.on_error(error),
        }
    }
}

struct Entry<C> {
    id: SubscriptionId,
    observer: Arc<dyn Observer<C>>,
    active: AtomicBool,
}

impl<C> Entry<C> {
    fn notify(&self, change: &C) {
        if self.active.load(Ordering::Acquire) {
            self.observer.on_next(change);
        }
    }
}

type Entries<C> = Arc<Vec<Arc<Entry<C>>>>;

/// Manages the observers of one stream.
pub struct SubscriptionManager<C> {
    /// Registered observers, replaced wholesale on every change
    entries: Mutex<Entries<C>>,
    /// Set once the stream has completed or failed
    terminal: Mutex<Option<Terminal>>,
    /// Next subscription ID to assign
    next_id: AtomicU64,
}

impl<C> Default for SubscriptionManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SubscriptionManager<C> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Arc::new(Vec::new())),
            terminal: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers an observer for future notifications.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe(&self, observer: Arc<dyn Observer<C>>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Entry {
            id,
            observer,
            active: AtomicBool::new(true),
        });

        let mut entries = self.entries.lock();
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push(entry);
        *entries = Arc::new(next);

        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let entry = match entries.iter().find(|e| e.id == id) {
            Some(entry) => entry,
            None => return false,
        };
        entry.active.store(false, Ordering::Release);

        let next = entries.iter().filter(|e| e.id != id).cloned().collect();
        *entries = Arc::new(next);
        true
    }

    /// Notifies every active subscription.
    pub fn notify_all(&self, change: &C) {
        let entries = self.entries.lock().clone();
        for entry in entries.iter() {
            entry.notify(change);
        }
    }

    /// Completes the stream, returning false if it had already ended.
    pub fn complete(&self) -> bool {
        self.terminate(Terminal::Completed)
    }

    /// Fails the stream, returning false if it had already ended.
    pub fn fail(&self, error: Error) -> bool {
        self.terminate(Terminal::Failed(error))
    }

    fn terminate(&self, terminal: Terminal) -> bool {
        {
            let mut slot = self.terminal.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(terminal.clone());
        }

        let entries = mem::replace(&mut *self.entries.lock(), Arc::new(Vec::new()));
        for entry in entries.iter() {
            if entry.active.swap(false, Ordering::AcqRel) {
                terminal.deliver(&*entry.observer);
            }
        }
        true
    }

    /// Returns how the stream ended, if it has.
    pub fn terminal(&self) -> Option<Terminal> {
        self.terminal.lock().clone()
    }

    /// Returns true once the stream has completed or failed.
    pub fn is_terminated(&self) -> bool {
        self.terminal.lock().is_some()
    }

    /// Returns the number of active subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns all subscription IDs.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.entries.lock().iter().map(|e| e.id).collect()
    }

    /// Clears all subscriptions without notifying them.
    pub fn clear(&self) {
        let entries = mem::replace(&mut *self.entries.lock(), Arc::new(Vec::new()));
        for entry in entries.iter() {
            entry.active.store(false, Ordering::Release);
        }
    }
}

impl<C: 'static> SubscriptionManager<C> {
    /// Returns a handle that unsubscribes `id` when released.
    ///
    /// The handle does not keep the manager alive.
    pub fn handle(self: &Arc<Self>, id: SubscriptionId) -> Subscription {
        let manager = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(manager) = manager.upgrade() {
                if manager.unsubscribe(id) {
                    trace!(id, "unsubscribed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::FnObserver;
    use std::sync::atomic::AtomicUsize;

    fn counter(count: &Arc<AtomicUsize>, step: usize) -> Arc<dyn Observer<i32>> {
        let count = count.clone();
        Arc::new(FnObserver::new(move |_: &i32| {
            count.fetch_add(step, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_subscription_unsubscribe_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!sub.is_closed());

        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_drop_releases() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Subscription::empty().is_closed());
    }

    #[test]
    fn test_subscription_merge() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parts = (0..3)
            .map(|_| {
                let c = calls.clone();
                Subscription::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        Subscription::merge(parts).unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_subscription_manager_subscribe() {
        let manager = SubscriptionManager::<i32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let id1 = manager.subscribe(counter(&count, 1));
        let id2 = manager.subscribe(counter(&count, 1));

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.subscription_ids(), vec![1, 2]);
    }

    #[test]
    fn test_subscription_manager_unsubscribe() {
        let manager = SubscriptionManager::<i32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let id = manager.subscribe(counter(&count, 1));
        assert_eq!(manager.len(), 1);

        assert!(manager.unsubscribe(id));
        assert!(manager.is_empty());

        assert!(!manager.unsubscribe(id)); // Already removed
        manager.notify_all(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_manager_notify_all() {
        let manager = SubscriptionManager::new();
        let count = Arc::new(AtomicUsize::new(0));

        manager.subscribe(counter(&count, 1));
        manager.subscribe(counter(&count, 10));
        manager.notify_all(&7);

        assert_eq!(count.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_subscription_manager_unsubscribe_sibling_during_delivery() {
        let manager = Arc::new(SubscriptionManager::new());
        let count = Arc::new(AtomicUsize::new(0));

        // The first observer removes the second before it is reached.
        let m = Arc::downgrade(&manager);
        manager.subscribe(Arc::new(FnObserver::new(move |_: &i32| {
            if let Some(m) = m.upgrade() {
                m.unsubscribe(2);
            }
        })));
        manager.subscribe(counter(&count, 1));

        manager.notify_all(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_subscription_manager_subscribe_during_delivery() {
        let manager = Arc::new(SubscriptionManager::new());
        let count = Arc::new(AtomicUsize::new(0));

        let m = Arc::downgrade(&manager);
        let c = count.clone();
        manager.subscribe(Arc::new(FnObserver::new(move |_: &i32| {
            if let Some(m) = m.upgrade() {
                m.subscribe(counter(&c, 1));
            }
        })));

        // The observer added during the pass only sees later passes.
        manager.notify_all(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        manager.notify_all(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_manager_handle() {
        let manager = Arc::new(SubscriptionManager::new());
        let count = Arc::new(AtomicUsize::new(0));

        let id = manager.subscribe(counter(&count, 1));
        let handle = manager.handle(id);
        manager.notify_all(&1);
        drop(handle);
        manager.notify_all(&1);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_subscription_manager_terminate() {
        let manager = SubscriptionManager::<i32>::new();
        let completed = Arc::new(AtomicUsize::new(0));
        let c = completed.clone();
        manager.subscribe(Arc::new(FnObserver::new(|_: &i32| {}).with_completed(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })));

        assert!(manager.complete());
        assert!(!manager.complete());
        assert!(!manager.fail(Error::callback("late")));

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.terminal(), Some(Terminal::Completed));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_subscription_manager_clear() {
        let manager = SubscriptionManager::<i32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        manager.subscribe(counter(&count, 1));
        manager.subscribe(counter(&count, 1));

        assert_eq!(manager.len(), 2);
        manager.clear();
        assert!(manager.is_empty());
        assert!(!manager.is_terminated());
    }
}
