//! Aggregate streams.
//!
//! An aggregate stream is cold: every subscription folds the upstream from
//! its snapshot onward with a fresh [`Aggregator`]. The aggregator's initial
//! value (the seed) is emitted first, then the running value once per
//! batch, only when it differs from the previous emission.

use crate::link::{drive, Downstream, Link};
use crate::observable::{Observable, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{try_guard, Error, Result};
use fluid_incremental::{Aggregator, Distinct};
use parking_lot::Mutex;
use std::sync::Arc;

struct AggregateTarget<G, A> {
    name: &'static str,
    link: Link,
    downstream: Arc<dyn Observer<A>>,
    state: Mutex<(G, Distinct<A>)>,
}

impl<G, A> AggregateTarget<G, A>
where
    A: Clone + PartialEq + Send + Sync + 'static,
{
    fn fold<C>(&self, change: &C) -> Result<()>
    where
        G: Aggregator<C, Output = A>,
    {
        let emitted = {
            let mut state = self.state.lock();
            let (aggregator, distinct) = &mut *state;
            try_guard(|| aggregator.apply(change))?;
            distinct.observe(aggregator.value())
        };

        if let Some(value) = emitted {
            self.downstream.on_next(&value);
        }
        Ok(())
    }
}

impl<G, A> Downstream for AggregateTarget<G, A>
where
    G: Send + 'static,
    A: Clone + PartialEq + Send + Sync + 'static,
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

/// Builds an aggregate stream over `source`.
///
/// `factory` creates the aggregator of each subscription.
pub(crate) fn aggregate<C, G, S, F>(name: &'static str, source: S, factory: F) -> Stream<G::Output>
where
    C: 'static,
    G: Aggregator<C> + 'static,
    S: Observable<C> + 'static,
    F: Fn() -> G + Send + Sync + 'static,
{
    Stream::new(name, move |downstream| {
        let aggregator = factory();
        let mut distinct = Distinct::new();
        if let Some(seed) = distinct.observe(aggregator.value()) {
            downstream.on_next(&seed);
        }

        let target = Arc::new(AggregateTarget {
            name,
            link: Link::new(),
            downstream,
            state: Mutex::new((aggregator, distinct)),
        });
        drive(&target, &source, |t: &AggregateTarget<G, G::Output>, change: &C| t.fold(change));
        Subscription::new(move || {
            target.link.close();
        })
    })
}
