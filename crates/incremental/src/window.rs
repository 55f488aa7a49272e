//! Coalescing window for buffered change streams.
//!
//! A window accumulates set change batches and consolidates them by item:
//! an item added and later removed inside the window (or removed and later
//! re-added) cancels out and is never published.

use crate::change::SetChange;
use crate::delta::{Delta, DeltaBatch, DeltaBatchExt};
use core::hash::Hash;
use core::mem;
use hashbrown::HashMap;

/// Accumulates change batches and yields their net effect.
#[derive(Clone, Debug)]
pub struct ChangeWindow<T> {
    /// One consolidated delta per item, in order of first appearance.
    pending: DeltaBatch<T>,
    positions: HashMap<T, usize>,
    /// Number of batches pushed since the last drain.
    batches: usize,
}

impl<T> Default for ChangeWindow<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChangeWindow<T>
where
    T: Eq + Hash + Clone,
{
    /// Creates an empty window.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            positions: HashMap::new(),
            batches: 0,
        }
    }

    /// Returns the number of batches received since the last drain.
    #[inline]
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Returns true if no batch was received since the last drain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.batches == 0
    }

    /// Adds a batch to the window.
    pub fn push(&mut self, change: &SetChange<T>) {
        self.batches += 1;
        for delta in change.deltas() {
            self.apply(delta);
        }
    }

    /// Consolidates a single delta.
    pub fn apply(&mut self, delta: Delta<T>) {
        match self.positions.get(&delta.data) {
            Some(&at) => self.pending[at].diff += delta.diff,
            None => {
                self.positions.insert(delta.data.clone(), self.pending.len());
                self.pending.push(delta);
            }
        }
    }

    /// Empties the window, returning the net adds batch then the net removes batch.
    ///
    /// Empty batches are omitted, so a window whose changes all cancelled
    /// out yields nothing.
    pub fn drain(&mut self) -> Vec<SetChange<T>> {
        self.positions.clear();
        self.batches = 0;
        mem::take(&mut self.pending).compact().into_changes()
    }
}
