//! Observers of change streams.

use fluid_core::Error;

/// Receives the notifications of one subscription.
///
/// A stream calls `on_next` zero or more times, then at most one of
/// `on_error` or `on_completed`. Calls for one subscription never overlap.
pub trait Observer<C>: Send + Sync {
    /// Receives one batch (or value).
    fn on_next(&self, value: &C);

    /// The stream failed; nothing further is delivered.
    fn on_error(&self, error: &Error) {
        let _ = error;
    }

    /// The stream ended; nothing further is delivered.
    fn on_completed(&self) {}
}

type NextFn<C> = Box<dyn Fn(&C) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&Error) + Send + Sync>;
type CompletedFn = Box<dyn Fn() + Send + Sync>;

/// An observer built from closures.
pub struct FnObserver<C> {
    next: NextFn<C>,
    error: Option<ErrorFn>,
    completed: Option<CompletedFn>,
}

impl<C> FnObserver<C> {
    /// Creates an observer that handles batches with `next`.
    pub fn new<F>(next: F) -> Self
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        Self {
            next: Box::new(next),
            error: None,
            completed: None,
        }
    }

    /// Adds an error handler.
    pub fn with_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }

    /// Adds a completion handler.
    pub fn with_completed<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.completed = Some(Box::new(f));
        self
    }
}

impl<C> Observer<C> for FnObserver<C> {
    fn on_next(&self, value: &C) {
        (self.next)(value)
    }

    fn on_error(&self, error: &Error) {
        if let Some(f) = &self.error {
            f(error)
        }
    }

    fn on_completed(&self) {
        if let Some(f) = &self.completed {
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fn_observer_handlers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (h1, h2, h3) = (hits.clone(), hits.clone(), hits.clone());
        let observer = FnObserver::new(move |v: &usize| {
            h1.fetch_add(*v, Ordering::SeqCst);
        })
        .with_error(move |_| {
            h2.fetch_add(10, Ordering::SeqCst);
        })
        .with_completed(move || {
            h3.fetch_add(100, Ordering::SeqCst);
        });

        observer.on_next(&1);
        observer.on_error(&Error::callback("x"));
        observer.on_completed();
        assert_eq!(hits.load(Ordering::SeqCst), 111);
    }

    #[test]
    fn test_fn_observer_defaults() {
        let observer = FnObserver::new(|_: &i32| {});
        observer.on_error(&Error::key_not_found());
        observer.on_completed();
    }
}
