//! Signed single-item changes.
//!
//! A set batch is a reason plus items; a delta is one item with a signed
//! weight. Batches are flattened to deltas wherever their net effect has to
//! be computed, so a sequence like Add(x), Remove(x) sums to zero.

use crate::change::{ChangeReason, SetChange};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One item with a signed weight: positive joins, negative leaves.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Delta<T> {
    pub data: T,
    pub diff: i32,
}

impl<T> Delta<T> {
    #[inline]
    pub fn new(data: T, diff: i32) -> Self {
        Self { data, diff }
    }

    /// A delta joining the set.
    #[inline]
    pub fn insert(data: T) -> Self {
        Self::new(data, 1)
    }

    /// A delta leaving the set.
    #[inline]
    pub fn delete(data: T) -> Self {
        Self::new(data, -1)
    }

    /// The delta of `data` under `reason`.
    #[inline]
    pub fn from_reason(reason: ChangeReason, data: T) -> Self {
        Self::new(data, reason.diff())
    }

    /// The reason this delta would be published under, or None if it cancelled out.
    pub fn reason(&self) -> Option<ChangeReason> {
        match self.diff {
            d if d > 0 => Some(ChangeReason::Add),
            d if d < 0 => Some(ChangeReason::Remove),
            _ => None,
        }
    }

    #[inline]
    pub fn is_noop(&self) -> bool {
        self.diff == 0
    }

    pub fn map<U, F>(self, f: F) -> Delta<U>
    where
        F: FnOnce(T) -> U,
    {
        Delta::new(f(self.data), self.diff)
    }

    pub fn negate(self) -> Self {
        Self::new(self.data, -self.diff)
    }
}

/// Deltas in order of first appearance.
pub type DeltaBatch<T> = Vec<Delta<T>>;

/// Conversions from consolidated deltas back to set batches.
pub trait DeltaBatchExt<T> {
    /// Drops deltas whose weight summed to zero.
    fn compact(self) -> Self;

    /// Splits into the net add batch then the net remove batch, omitting empty ones.
    fn into_changes(self) -> Vec<SetChange<T>>;
}

impl<T> DeltaBatchExt<T> for DeltaBatch<T> {
    fn compact(self) -> Self {
        self.into_iter().filter(|d| !d.is_noop()).collect()
    }

    fn into_changes(self) -> Vec<SetChange<T>> {
        let mut adds = Vec::new();
        let mut removes = Vec::new();
        for delta in self {
            match delta.reason() {
                Some(ChangeReason::Add) => adds.push(delta.data),
                Some(ChangeReason::Remove) => removes.push(delta.data),
                None => {}
            }
        }

        [SetChange::add(adds), SetChange::remove(removes)]
            .into_iter()
            .filter(|change| !change.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_reason() {
        assert_eq!(Delta::insert(1).reason(), Some(ChangeReason::Add));
        assert_eq!(Delta::delete(1).reason(), Some(ChangeReason::Remove));
        assert_eq!(Delta::new(1, 0).reason(), None);
        assert_eq!(Delta::from_reason(ChangeReason::Remove, 'x'), Delta::delete('x'));
    }

    #[test]
    fn test_delta_negate_and_map() {
        let neg = Delta::insert(21).negate().map(|x| x * 2);
        assert_eq!(neg, Delta::delete(42));
    }

    #[test]
    fn test_batch_compact() {
        let batch: DeltaBatch<i32> = vec![Delta::insert(1), Delta::new(2, 0), Delta::delete(3)];
        assert_eq!(batch.compact(), vec![Delta::insert(1), Delta::delete(3)]);
    }

    #[test]
    fn test_batch_into_changes() {
        let batch: DeltaBatch<i32> = vec![Delta::delete(4), Delta::insert(1), Delta::new(2, 0), Delta::new(3, 2)];
        assert_eq!(batch.into_changes(), vec![SetChange::add(vec![1, 3]), SetChange::remove(vec![4])]);

        let empty: DeltaBatch<i32> = vec![Delta::new(9, 0)];
        assert!(empty.into_changes().is_empty());
    }
}
