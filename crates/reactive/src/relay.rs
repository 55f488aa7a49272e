//! Relay operators.
//!
//! A relay keeps no copy of its result. Its stream translates upstream
//! batches as they arrive, and its membership queries recompute the
//! operator's formula against the live upstream collections. Relays hold no
//! lock of their own beyond the merge gate that serializes a two-source
//! relay's deliveries.
//!
//! Consistency caveat: when two sources are mutated by different threads
//! without coordination, a relay's stream and a direct `contains` query may
//! briefly disagree. No cross-source atomicity is provided.

use crate::link::{drive, drive_from, Downstream, Link};
use crate::observable::{Batch, Observable, ObservableDictionary, ObservableSet, Stream};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{Error, Result};
use fluid_incremental::{DictChange, SetChange};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type SnapshotFn<I, O> = dyn Fn(&I) -> Result<O> + Send + Sync;
type LiveFn<I, O> = dyn Fn(&I) -> Result<Vec<O>> + Send + Sync;

/// One subscription of a single-source relay.
struct PipeTarget<I, O> {
    name: &'static str,
    link: Link,
    downstream: Arc<dyn Observer<O>>,
    primed: AtomicBool,
    snapshot: Arc<SnapshotFn<I, O>>,
    live: Arc<LiveFn<I, O>>,
}

impl<I: 'static, O: Batch> PipeTarget<I, O> {
    fn forward(&self, change: &I) -> Result<()> {
        if !self.primed.swap(true, Ordering::AcqRel) {
            let snapshot = (self.snapshot)(change)?;
            self.downstream.on_next(&snapshot);
            return Ok(());
        }

        for batch in (self.live)(change)? {
            if !batch.is_empty() {
                self.downstream.on_next(&batch);
            }
        }
        Ok(())
    }
}

impl<I: 'static, O: Batch> Downstream for PipeTarget<I, O> {
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

/// Builds a single-source relay stream.
///
/// The first upstream batch is the upstream snapshot and is translated by
/// `snapshot` into exactly one batch; later batches go through `live`.
pub(crate) fn pipe<I, O, S, FS, FL>(name: &'static str, source: S, snapshot: FS, live: FL) -> Stream<O>
where
    I: 'static,
    O: Batch,
    S: Observable<I> + 'static,
    FS: Fn(&I) -> Result<O> + Send + Sync + 'static,
    FL: Fn(&I) -> Result<Vec<O>> + Send + Sync + 'static,
{
    let snapshot: Arc<SnapshotFn<I, O>> = Arc::new(snapshot);
    let live: Arc<LiveFn<I, O>> = Arc::new(live);

    Stream::new(name, move |downstream| {
        let target = Arc::new(PipeTarget {
            name,
            link: Link::new(),
            downstream,
            primed: AtomicBool::new(false),
            snapshot: Arc::clone(&snapshot),
            live: Arc::clone(&live),
        });
        drive(&target, &source, |t: &PipeTarget<I, O>, change: &I| t.forward(change));
        Subscription::new(move || {
            target.link.close();
        })
    })
}

/// Translations of a two-source relay.
pub(crate) struct MergePlan<L: Batch, R: Batch, O> {
    /// Combines both sources' snapshots into the relay's snapshot batch.
    pub(crate) combine: Box<dyn Fn(&L::Snapshot, &R::Snapshot) -> Result<O> + Send + Sync>,
    /// Translates a live batch of the first source.
    pub(crate) left: Box<LiveFn<L, O>>,
    /// Translates a live batch of the second source.
    pub(crate) right: Box<LiveFn<R, O>>,
}

struct GateState<A, B> {
    left: Option<A>,
    right: Option<B>,
    open: bool,
    completed: [bool; 2],
}

/// One subscription of a two-source relay.
///
/// Until both sources have delivered their snapshots, batches are folded
/// into pending snapshots; the first output is their combination. Once
/// open, each batch is translated against the other source's live state.
struct MergeGate<L: Batch, R: Batch, O> {
    name: &'static str,
    link: Link,
    downstream: Arc<dyn Observer<O>>,
    state: ReentrantMutex<RefCell<GateState<L::Snapshot, R::Snapshot>>>,
    plan: Arc<MergePlan<L, R, O>>,
}

impl<L: Batch, R: Batch, O: Batch> MergeGate<L, R, O> {
    fn on_left(&self, change: &L) -> Result<()> {
        let guard = self.state.lock();
        let open = {
            let mut state = guard.borrow_mut();
            if !state.open {
                change.absorb(state.left.get_or_insert_with(Default::default));
            }
            state.open
        };

        if open {
            self.emit((self.plan.left)(change)?);
            Ok(())
        } else {
            self.try_open(&guard)
        }
    }

    fn on_right(&self, change: &R) -> Result<()> {
        let guard = self.state.lock();
        let open = {
            let mut state = guard.borrow_mut();
            if !state.open {
                change.absorb(state.right.get_or_insert_with(Default::default));
            }
            state.open
        };

        if open {
            self.emit((self.plan.right)(change)?);
            Ok(())
        } else {
            self.try_open(&guard)
        }
    }

    fn try_open(&self, state: &RefCell<GateState<L::Snapshot, R::Snapshot>>) -> Result<()> {
        let combined = {
            let mut state = state.borrow_mut();
            let combined = match (state.left.as_ref(), state.right.as_ref()) {
                (Some(left), Some(right)) => (self.plan.combine)(left, right)?,
                _ => return Ok(()),
            };
            state.open = true;
            state.left = None;
            state.right = None;
            combined
        };
        self.downstream.on_next(&combined);
        Ok(())
    }

    fn emit(&self, batches: Vec<O>) {
        for batch in batches {
            if !batch.is_empty() {
                self.downstream.on_next(&batch);
            }
        }
    }
}

impl<L: Batch, R: Batch, O: Batch> Downstream for MergeGate<L, R, O> {
    fn link(&self) -> &Link {
        &self.link
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn fail(&self, error: &Error) {
        let _gate = self.state.lock();
        self.downstream.on_error(error);
    }

    fn complete(&self) {
        let _gate = self.state.lock();
        self.downstream.on_completed();
    }

    fn upstream_completed(&self, source: usize) -> bool {
        let guard = self.state.lock();
        let done = {
            let mut state = guard.borrow_mut();
            state.completed[source] = true;
            // A source that ended before its snapshot contributes nothing.
            if !state.open {
                match source {
                    0 => {
                        state.left.get_or_insert_with(Default::default);
                    }
                    _ => {
                        state.right.get_or_insert_with(Default::default);
                    }
                }
            }
            state.completed[0] && state.completed[1]
        };

        if let Err(error) = self.try_open(&guard) {
            crate::link::terminate(self, &error);
            return false;
        }
        done
    }
}

/// Builds a two-source relay stream.
pub(crate) fn merge<L, R, O, SL, SR>(name: &'static str, left: SL, right: SR, plan: MergePlan<L, R, O>) -> Stream<O>
where
    L: Batch,
    R: Batch,
    O: Batch,
    SL: Observable<L> + 'static,
    SR: Observable<R> + 'static,
{
    let plan = Arc::new(plan);

    Stream::new(name, move |downstream| {
        let gate = Arc::new(MergeGate {
            name,
            link: Link::new(),
            downstream,
            state: ReentrantMutex::new(RefCell::new(GateState {
                left: None,
                right: None,
                open: false,
                completed: [false; 2],
            })),
            plan: Arc::clone(&plan),
        });
        drive_from(&gate, 0, &left, |g: &MergeGate<L, R, O>, change: &L| g.on_left(change));
        drive_from(&gate, 1, &right, |g: &MergeGate<L, R, O>, change: &R| g.on_right(change));
        Subscription::new(move || {
            gate.link.close();
        })
    })
}

type Membership<T> = dyn Fn(&T) -> bool + Send + Sync;

/// A derived set with no materialized state.
pub struct SetRelay<T> {
    stream: Stream<SetChange<T>>,
    membership: Arc<Membership<T>>,
}

impl<T> Clone for SetRelay<T> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            membership: Arc::clone(&self.membership),
        }
    }
}

impl<T> SetRelay<T> {
    pub(crate) fn new<F>(stream: Stream<SetChange<T>>, membership: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            stream,
            membership: Arc::new(membership),
        }
    }

    /// Returns the operator name.
    pub fn name(&self) -> &'static str {
        self.stream.name()
    }
}

impl<T> Observable<SetChange<T>> for SetRelay<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<SetChange<T>>>) -> Subscription {
        self.stream.subscribe(observer)
    }
}

impl<T> ObservableSet<T> for SetRelay<T> {
    fn contains(&self, item: &T) -> bool {
        (self.membership)(item)
    }
}

impl<T> fmt::Debug for SetRelay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetRelay").field("name", &self.name()).finish()
    }
}

type Lookup<K, V> = dyn Fn(&K) -> Option<V> + Send + Sync;

/// A derived dictionary with no materialized state.
pub struct DictRelay<K, V> {
    stream: Stream<DictChange<K, V>>,
    lookup: Arc<Lookup<K, V>>,
}

impl<K, V> Clone for DictRelay<K, V> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            lookup: Arc::clone(&self.lookup),
        }
    }
}

impl<K, V> DictRelay<K, V> {
    pub(crate) fn new<F>(stream: Stream<DictChange<K, V>>, lookup: F) -> Self
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        Self {
            stream,
            lookup: Arc::new(lookup),
        }
    }

    /// Returns the operator name.
    pub fn name(&self) -> &'static str {
        self.stream.name()
    }
}

impl<K, V> Observable<DictChange<K, V>> for DictRelay<K, V> {
    fn subscribe(&self, observer: Arc<dyn Observer<DictChange<K, V>>>) -> Subscription {
        self.stream.subscribe(observer)
    }
}

impl<K, V> ObservableDictionary<K, V> for DictRelay<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        (self.lookup)(key)
    }
}

impl<K, V> fmt::Debug for DictRelay<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictRelay").field("name", &self.name()).finish()
    }
}
