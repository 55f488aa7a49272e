//! Multiplicity-aware projection.
//!
//! Projections are generally not injective: several source items can map
//! to the same selected value. [`SelectState`] keeps a reference count per
//! selected value so that it stays visible until the last source item
//! contributing to it is gone.

use crate::change::{ChangeReason, DictChange, DictChangeReason, SetChange, SetChangeBuilder};
use core::hash::Hash;
use hashbrown::HashMap;

/// Visibility changes caused by one `insert`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectDelta<D> {
    /// A selected value that lost its last contributor.
    pub removed: Option<D>,
    /// A selected value that gained its first contributor.
    pub added: Option<D>,
}

impl<D> SelectDelta<D> {
    fn none() -> Self {
        Self {
            removed: None,
            added: None,
        }
    }
}

/// Reference-counted projection state.
#[derive(Clone, Debug)]
pub struct SelectState<S, D> {
    /// Source item -> its cached projection
    projections: HashMap<S, D>,
    /// Selected value -> number of source items projecting to it
    counts: HashMap<D, usize>,
}

impl<S, D> Default for SelectState<S, D>
where
    S: Eq + Hash + Clone,
    D: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, D> SelectState<S, D>
where
    S: Eq + Hash + Clone,
    D: Eq + Hash + Clone,
{
    /// Creates an empty state.
    pub fn new() -> Self {
        Self {
            projections: HashMap::new(),
            counts: HashMap::new(),
        }
    }

    /// Returns the number of distinct selected values.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if no value is selected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Returns true if `value` is currently selected.
    pub fn contains(&self, value: &D) -> bool {
        self.counts.contains_key(value)
    }

    /// Returns how many source items project to `value`.
    pub fn multiplicity(&self, value: &D) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Returns the cached projection of a source item.
    pub fn projection(&self, source: &S) -> Option<&D> {
        self.projections.get(source)
    }

    /// Returns the selected values.
    pub fn values(&self) -> Vec<D> {
        self.counts.keys().cloned().collect()
    }

    /// Removes all state.
    pub fn clear(&mut self) {
        self.projections.clear();
        self.counts.clear();
    }

    /// Records that `source` projects to `selected`, replacing any previous projection.
    pub fn insert(&mut self, source: S, selected: D) -> SelectDelta<D> {
        if self.projections.get(&source) == Some(&selected) {
            return SelectDelta::none();
        }

        let removed = self.release(&source);
        let count = self.counts.entry(selected.clone()).or_insert(0);
        *count += 1;
        let added = if *count == 1 { Some(selected.clone()) } else { None };
        self.projections.insert(source, selected);

        SelectDelta { removed, added }
    }

    /// Forgets `source`, returning its projection if that value is no longer selected.
    pub fn remove(&mut self, source: &S) -> Option<D> {
        self.release(source)
    }

    fn release(&mut self, source: &S) -> Option<D> {
        let selected = self.projections.remove(source)?;
        match self.counts.get_mut(&selected) {
            Some(count) if *count > 1 => {
                *count -= 1;
                None
            }
            Some(_) => {
                self.counts.remove(&selected);
                Some(selected)
            }
            None => None,
        }
    }

    /// Applies a set change batch, projecting new source items with `selector`.
    ///
    /// Adds of already-known source items and removes of unknown ones are
    /// ignored. The selector runs once per new source item.
    pub fn apply<F>(&mut self, change: &SetChange<S>, mut selector: F) -> SetChange<D>
    where
        F: FnMut(&S) -> D,
    {
        let mut out = Vec::new();

        match change.reason {
            ChangeReason::Add => {
                for item in change.iter() {
                    if self.projections.contains_key(item) {
                        continue;
                    }
                    let selected = selector(item);
                    if let Some(added) = self.insert(item.clone(), selected).added {
                        out.push(added);
                    }
                }
            }
            ChangeReason::Remove => {
                for item in change.iter() {
                    if let Some(removed) = self.remove(item) {
                        out.push(removed);
                    }
                }
            }
        }

        SetChange::new(change.reason, out)
    }

    /// Applies a dictionary change batch whose keys are the source items and
    /// whose values are the selected values.
    pub fn apply_entries(&mut self, change: &DictChange<S, D>) -> Vec<SetChange<D>> {
        let mut builder = SetChangeBuilder::new();

        for (key, value) in change.iter() {
            match change.reason {
                DictChangeReason::AddOrUpdate => {
                    let delta = self.insert(key.clone(), value.clone());
                    if let Some(removed) = delta.removed {
                        builder.push(ChangeReason::Remove, removed);
                    }
                    if let Some(added) = delta.added {
                        builder.push(ChangeReason::Add, added);
                    }
                }
                DictChangeReason::Remove => {
                    if let Some(removed) = self.remove(key) {
                        builder.push(ChangeReason::Remove, removed);
                    }
                }
            }
        }

        builder.finish()
    }
}
