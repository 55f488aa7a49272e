//! Plumbing between an upstream stream and the operator consuming it.
//!
//! Every operator owns a [`Link`] holding its upstream subscriptions. The
//! link closes exactly once: on a callback failure, on upstream termination
//! or when the operator is released. Closing drops the upstream
//! subscriptions, so a failed operator stops receiving batches while its
//! siblings on the same upstream are unaffected.

use crate::observable::Observable;
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{Error, Result};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// The upstream subscriptions of one operator.
#[derive(Default)]
pub(crate) struct Link {
    closed: AtomicBool,
    upstream: Mutex<Vec<Subscription>>,
}

impl Link {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Keeps `subscription` alive until the link closes.
    pub(crate) fn attach(&self, subscription: Subscription) {
        let mut upstream = self.upstream.lock();
        if self.is_closed() {
            drop(upstream);
            drop(subscription);
        } else {
            upstream.push(subscription);
        }
    }

    /// Closes the link and releases every upstream subscription.
    ///
    /// Returns true for the call that actually closed it.
    pub(crate) fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        let released = mem::take(&mut *self.upstream.lock());
        drop(released);
        first
    }
}

/// An operator fed by one or more upstream streams.
pub(crate) trait Downstream: Send + Sync + 'static {
    fn link(&self) -> &Link;

    fn name(&self) -> &'static str;

    /// Delivers a failure to the operator's own observers.
    fn fail(&self, error: &Error);

    /// Delivers completion to the operator's own observers.
    fn complete(&self);

    /// Records that upstream `source` completed.
    ///
    /// Returns true once the operator as a whole is complete.
    fn upstream_completed(&self, source: usize) -> bool {
        let _ = source;
        true
    }
}

/// Terminates `target` with `error` unless it already ended.
pub(crate) fn terminate<D: Downstream + ?Sized>(target: &D, error: &Error) {
    if target.link().close() {
        warn!(stream = target.name(), %error, "terminating stream");
        target.fail(error);
    }
}

type Step<D, C> = Box<dyn Fn(&D, &C) -> Result<()> + Send + Sync>;

/// Upstream observer that forwards into an operator.
///
/// Holds the operator weakly: upstream observer lists never keep a derived
/// collection alive.
struct Driver<D, C> {
    target: Weak<D>,
    source: usize,
    step: Step<D, C>,
    _change: PhantomData<fn(&C)>,
}

impl<D: Downstream, C> Observer<C> for Driver<D, C> {
    fn on_next(&self, change: &C) {
        let target = match self.target.upgrade() {
            Some(target) => target,
            None => return,
        };
        if target.link().is_closed() {
            return;
        }
        if let Err(error) = (self.step)(&target, change) {
            terminate(&*target, &error);
        }
    }

    fn on_error(&self, error: &Error) {
        if let Some(target) = self.target.upgrade() {
            if target.link().close() {
                target.fail(error);
            }
        }
    }

    fn on_completed(&self) {
        if let Some(target) = self.target.upgrade() {
            if target.upstream_completed(self.source) && target.link().close() {
                debug!(stream = target.name(), "upstream completed");
                target.complete();
            }
        }
    }
}

/// Subscribes `target` to `source`, running `step` for every batch.
pub(crate) fn drive<D, C, S, F>(target: &Arc<D>, source: &S, step: F)
where
    D: Downstream,
    C: 'static,
    S: Observable<C> + ?Sized,
    F: Fn(&D, &C) -> Result<()> + Send + Sync + 'static,
{
    drive_from(target, 0, source, step)
}

/// Like [`drive`], for operators with several sources.
pub(crate) fn drive_from<D, C, S, F>(target: &Arc<D>, index: usize, source: &S, step: F)
where
    D: Downstream,
    C: 'static,
    S: Observable<C> + ?Sized,
    F: Fn(&D, &C) -> Result<()> + Send + Sync + 'static,
{
    let driver = Driver {
        target: Arc::downgrade(target),
        source: index,
        step: Box::new(step),
        _change: PhantomData,
    };
    let subscription = source.subscribe(Arc::new(driver));
    target.link().attach(subscription);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_link_close_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let link = Link::new();
        for _ in 0..2 {
            let r = released.clone();
            link.attach(Subscription::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert!(link.close());
        assert!(!link.close());
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_link_attach_after_close() {
        let released = Arc::new(AtomicUsize::new(0));
        let link = Link::new();
        link.close();

        let r = released.clone();
        link.attach(Subscription::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
