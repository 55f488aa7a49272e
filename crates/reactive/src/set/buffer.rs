//! Windowed buffering of a set's change stream.
//!
//! The first batch (the snapshot) passes straight through. Later batches
//! collect in a [`ChangeWindow`] and are published as the window's net
//! effect once it closes, either after a number of batches or after a time
//! span. A buffer is cold: every subscription owns its own window.

use crate::link::{drive, terminate, Downstream, Link};
use crate::observable::{Observable, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{Element, Error, Result};
use fluid_incremental::{ChangeWindow, SetChange};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// When a buffer window closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferOptions {
    /// After this many live batches.
    Count(usize),
    /// After this much time has passed since the window opened.
    Time(Duration),
}

impl BufferOptions {
    /// Closes windows after `batches` live batches.
    pub fn count(batches: usize) -> Result<Self> {
        Self::Count(batches).validate()
    }

    /// Closes windows every `span`.
    pub fn time(span: Duration) -> Result<Self> {
        Self::Time(span).validate()
    }

    pub(crate) fn validate(self) -> Result<Self> {
        match self {
            Self::Count(0) => Err(Error::invalid_argument("count", "must be at least 1")),
            Self::Time(span) if span.is_zero() => Err(Error::invalid_argument("span", "must be non-zero")),
            options => Ok(options),
        }
    }
}

/// Builds the buffered stream of `source`. `options` must be valid.
pub(crate) fn buffer<T, S>(source: S, options: BufferOptions) -> Stream<SetChange<T>>
where
    T: Element,
    S: Observable<SetChange<T>> + 'static,
{
    match options {
        BufferOptions::Count(size) => Stream::new("buffer", move |downstream| {
            let target = Arc::new(CountBuffer {
                link: Link::new(),
                downstream,
                size,
                state: Mutex::new(CountState {
                    primed: false,
                    window: ChangeWindow::new(),
                }),
            });
            drive(&target, &source, |t: &CountBuffer<T>, change: &SetChange<T>| t.on_change(change));
            Subscription::new(move || {
                target.link.close();
            })
        }),
        BufferOptions::Time(span) => Stream::new("buffer", move |downstream| {
            let target = Arc::new(TimeBuffer {
                link: Link::new(),
                downstream,
                span,
                delivery: ReentrantMutex::new(()),
                state: Mutex::new(TimeState {
                    primed: false,
                    closed: false,
                    window: ChangeWindow::new(),
                }),
                wake: Condvar::new(),
            });
            drive(&target, &source, |t: &TimeBuffer<T>, change: &SetChange<T>| t.on_change(change));

            let flusher = Arc::clone(&target);
            let spawned = thread::Builder::new()
                .name("fluid-buffer".to_string())
                .spawn(move || flusher.run());
            if let Err(error) = spawned {
                terminate(&*target, &Error::spawn(error.to_string()));
            }

            Subscription::new(move || {
                target.link.close();
                target.shutdown();
            })
        }),
    }
}

fn emit<T>(downstream: &dyn Observer<SetChange<T>>, batches: &[SetChange<T>]) {
    for batch in batches {
        downstream.on_next(batch);
    }
}

struct CountState<T> {
    primed: bool,
    window: ChangeWindow<T>,
}

struct CountBuffer<T> {
    link: Link,
    downstream: Arc<dyn Observer<SetChange<T>>>,
    size: usize,
    state: Mutex<CountState<T>>,
}

impl<T: Element> CountBuffer<T> {
    fn on_change(&self, change: &SetChange<T>) -> Result<()> {
        let batches = {
            let mut state = self.state.lock();
            if !state.primed {
                state.primed = true;
                vec![change.clone()]
            } else {
                state.window.push(change);
                if state.window.batches() < self.size {
                    return Ok(());
                }
                debug!(stream = "buffer", batches = self.size, "flushing window");
                state.window.drain()
            }
        };
        emit(&*self.downstream, &batches);
        Ok(())
    }
}

impl<T: Element> Downstream for CountBuffer<T> {
    fn link(&self) -> &Link {
        &self.link
    }

    fn name(&self) -> &'static str {
        "buffer"
    }

    fn fail(&self, error: &Error) {
        self.downstream.on_error(error);
    }

    fn complete(&self) {
        let rest = self.state.lock().window.drain();
        emit(&*self.downstream, &rest);
        self.downstream.on_completed();
    }
}

struct TimeState<T> {
    primed: bool,
    closed: bool,
    window: ChangeWindow<T>,
}

/// A time-windowed buffer subscription.
///
/// Lock order is `delivery` before `state`. The flush thread waits on
/// `wake` with `state` held and releases it before delivering.
struct TimeBuffer<T> {
    link: Link,
    downstream: Arc<dyn Observer<SetChange<T>>>,
    span: Duration,
    delivery: ReentrantMutex<()>,
    state: Mutex<TimeState<T>>,
    wake: Condvar,
}

impl<T: Element> TimeBuffer<T> {
    fn on_change(&self, change: &SetChange<T>) -> Result<()> {
        let mut state = self.state.lock();
        if state.primed {
            state.window.push(change);
            return Ok(());
        }
        state.primed = true;
        drop(state);

        let _delivery = self.delivery.lock();
        self.downstream.on_next(change);
        Ok(())
    }

    fn run(&self) {
        loop {
            {
                let mut state = self.state.lock();
                let deadline = Instant::now() + self.span;
                while !state.closed && !self.wake.wait_until(&mut state, deadline).timed_out() {}
                if state.closed {
                    break;
                }
            }
            if !self.flush() {
                break;
            }
        }
        debug!(stream = "buffer", "flush thread exiting");
    }

    /// Publishes the window's net effect. Returns false once closed.
    fn flush(&self) -> bool {
        let _delivery = self.delivery.lock();
        let batches = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            if state.window.is_empty() {
                return true;
            }
            let batches = state.window.batches();
            debug!(stream = "buffer", batches, "flushing window");
            state.window.drain()
        };
        emit(&*self.downstream, &batches);
        true
    }

    /// Stops the flush thread, returning whatever the window still holds.
    fn shutdown(&self) -> Vec<SetChange<T>> {
        let rest = {
            let mut state = self.state.lock();
            state.closed = true;
            state.window.drain()
        };
        self.wake.notify_one();
        rest
    }
}

impl<T: Element> Downstream for TimeBuffer<T> {
    fn link(&self) -> &Link {
        &self.link
    }

    fn name(&self) -> &'static str {
        "buffer"
    }

    fn fail(&self, error: &Error) {
        let _delivery = self.delivery.lock();
        self.shutdown();
        self.downstream.on_error(error);
    }

    fn complete(&self) {
        let _delivery = self.delivery.lock();
        let rest = self.shutdown();
        emit(&*self.downstream, &rest);
        self.downstream.on_completed();
    }
}
