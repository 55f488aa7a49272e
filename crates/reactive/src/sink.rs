//! Terminal consumers of change streams.

use crate::link::{drive, Downstream, Link};
use crate::observable::{Observable, Stream};
use crate::observer::{FnObserver, Observer};
use crate::subscription::Subscription;
use fluid_core::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Returns the first batch a fresh subscription receives.
///
/// The snapshot is delivered inside `subscribe`, so this never blocks.
/// Returns None for a stream that has already terminated.
pub(crate) fn first_batch<C, S>(source: &S) -> Option<C>
where
    C: Clone + Send + 'static,
    S: Observable<C> + ?Sized,
{
    let slot = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let subscription = source.subscribe(Arc::new(FnObserver::new(move |change: &C| {
        let mut sink = sink.lock();
        if sink.is_none() {
            *sink = Some(change.clone());
        }
    })));
    subscription.unsubscribe();

    let first = slot.lock().take();
    first
}

type ScanFn<St, C, A> = dyn Fn(&mut St, &C) -> A + Send + Sync;

struct ScanTarget<St, C, A> {
    name: &'static str,
    link: Link,
    downstream: Arc<dyn Observer<A>>,
    state: Mutex<St>,
    step: Arc<ScanFn<St, C, A>>,
}

impl<St, C, A> ScanTarget<St, C, A> {
    fn scan(&self, change: &C) -> Result<()> {
        let value = (self.step)(&mut self.state.lock(), change);
        self.downstream.on_next(&value);
        Ok(())
    }
}

impl<St, C, A> Downstream for ScanTarget<St, C, A>
where
    St: Send + 'static,
    C: 'static,
    A: 'static,
{
    fn link(&self) -> &Link {
        &self.link
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn fail(&self, error: &Error) {
        self.downstream.on_error(error);
    }

    fn complete(&self) {
        self.downstream.on_completed();
    }
}

/// Builds a stream emitting one value per upstream batch.
///
/// Each subscription starts from `init()` and folds every batch with `step`,
/// which returns the value to emit.
pub(crate) fn scan<C, St, A, S, I, F>(name: &'static str, source: S, init: I, step: F) -> Stream<A>
where
    C: 'static,
    St: Send + 'static,
    A: 'static,
    S: Observable<C> + 'static,
    I: Fn() -> St + Send + Sync + 'static,
    F: Fn(&mut St, &C) -> A + Send + Sync + 'static,
{
    let step: Arc<ScanFn<St, C, A>> = Arc::new(step);

    Stream::new(name, move |downstream| {
        let target = Arc::new(ScanTarget {
            name,
            link: Link::new(),
            downstream,
            state: Mutex::new(init()),
            step: Arc::clone(&step),
        });
        drive(&target, &source, |t: &ScanTarget<St, C, A>, change: &C| t.scan(change));
        Subscription::new(move || {
            target.link.close();
        })
    })
}
