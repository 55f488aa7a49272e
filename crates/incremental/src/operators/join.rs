//! Incremental dictionary joins.
//!
//! Each translation takes one dictionary batch plus lookups into the other
//! operand (and, where needed, into the batch's own operand before the batch
//! is applied). A one-sided removal turns into an update when the other
//! operand still holds the key.

use super::set_ops::Side;
use crate::change::{DictChange, DictChangeBuilder, DictChangeReason};
use core::hash::Hash;
use hashbrown::{HashMap, HashSet};

/// Translates a batch for the key union of two dictionaries.
///
/// The left dictionary's value wins for keys held by both.
pub fn join_change<K, V, F>(side: Side, change: &DictChange<K, V>, mut other: F) -> Vec<DictChange<K, V>>
where
    K: Clone,
    V: Clone,
    F: FnMut(&K) -> Option<V>,
{
    let mut builder = DictChangeBuilder::new();

    for (key, value) in change.iter() {
        match (side, change.reason) {
            (Side::Left, DictChangeReason::AddOrUpdate) => builder.upsert(key.clone(), value.clone()),
            (Side::Left, DictChangeReason::Remove) => match other(key) {
                Some(fallback) => builder.upsert(key.clone(), fallback),
                None => builder.remove(key.clone(), value.clone()),
            },
            (Side::Right, reason) => {
                if other(key).is_some() {
                    continue;
                }
                match reason {
                    DictChangeReason::AddOrUpdate => builder.upsert(key.clone(), value.clone()),
                    DictChangeReason::Remove => builder.remove(key.clone(), value.clone()),
                }
            }
        }
    }

    builder.finish()
}

/// Combines snapshot entries for the key union of two dictionaries.
pub fn join_snapshots<K, V>(left: &[(K, V)], right: &[(K, V)]) -> Vec<(K, V)>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    let left_keys: HashSet<&K> = left.iter().map(|(k, _)| k).collect();
    left.iter()
        .chain(right.iter().filter(|(k, _)| !left_keys.contains(k)))
        .cloned()
        .collect()
}

/// Translates a batch for the keys held by exactly one of two dictionaries.
///
/// `previous` looks up the key in the batch's own dictionary before the
/// batch is applied; `other` looks it up in the opposite dictionary.
pub fn symmetric_except_change<K, V, F, P>(
    change: &DictChange<K, V>,
    mut other: F,
    mut previous: P,
) -> Vec<DictChange<K, V>>
where
    K: Clone,
    V: Clone,
    F: FnMut(&K) -> Option<V>,
    P: FnMut(&K) -> Option<V>,
{
    let mut builder = DictChangeBuilder::new();

    for (key, value) in change.iter() {
        match (change.reason, other(key)) {
            (DictChangeReason::AddOrUpdate, None) => builder.upsert(key.clone(), value.clone()),
            (DictChangeReason::AddOrUpdate, Some(theirs)) => {
                // The key is now in both; it leaves the result unless it already had.
                if previous(key).is_none() {
                    builder.remove(key.clone(), theirs);
                }
            }
            (DictChangeReason::Remove, None) => builder.remove(key.clone(), value.clone()),
            (DictChangeReason::Remove, Some(theirs)) => builder.upsert(key.clone(), theirs),
        }
    }

    builder.finish()
}

/// Combines snapshot entries for the keys held by exactly one dictionary.
pub fn symmetric_except_snapshots<K, V>(left: &[(K, V)], right: &[(K, V)]) -> Vec<(K, V)>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    let left_keys: HashSet<&K> = left.iter().map(|(k, _)| k).collect();
    let right_keys: HashSet<&K> = right.iter().map(|(k, _)| k).collect();
    left.iter()
        .filter(|(k, _)| !right_keys.contains(k))
        .chain(right.iter().filter(|(k, _)| !left_keys.contains(k)))
        .cloned()
        .collect()
}

/// Translates a batch for the key intersection of two dictionaries.
///
/// `combine` receives an entry of the batch, looks up the other dictionary
/// and returns the combined value, or None when the other side lacks the
/// key. Removals carry the combined value as it was before the removal.
pub fn symmetric_join_change<K, V, R, F>(change: &DictChange<K, V>, mut combine: F) -> DictChange<K, R>
where
    K: Clone,
    F: FnMut(&K, &V) -> Option<R>,
{
    let entries = change
        .iter()
        .filter_map(|(key, value)| combine(key, value).map(|r| (key.clone(), r)))
        .collect();
    DictChange::new(change.reason, entries)
}

/// Combines snapshot entries for the key intersection of two dictionaries.
pub fn symmetric_join_snapshots<K, A, B, R, F>(left: &[(K, A)], right: &[(K, B)], mut selector: F) -> Vec<(K, R)>
where
    K: Eq + Hash + Clone,
    F: FnMut(&K, &A, &B) -> R,
{
    let right_values: HashMap<&K, &B> = right.iter().map(|(k, v)| (k, v)).collect();
    left.iter()
        .filter_map(|(k, a)| right_values.get(k).map(|b| (k.clone(), selector(k, a, b))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(entries: &'static [(&'static str, i32)]) -> impl FnMut(&&'static str) -> Option<i32> {
        move |k| entries.iter().find(|(key, _)| key == k).map(|(_, v)| *v)
    }

    #[test]
    fn test_join_left_wins() {
        let out = join_change(Side::Left, &DictChange::add_or_update(vec![("a", 1)]), lookup(&[("a", 9)]));
        assert_eq!(out, vec![DictChange::add_or_update(vec![("a", 1)])]);

        // Right updates are hidden while the left holds the key.
        let out = join_change(Side::Right, &DictChange::add_or_update(vec![("a", 9), ("b", 2)]), lookup(&[("a", 1)]));
        assert_eq!(out, vec![DictChange::add_or_update(vec![("b", 2)])]);
    }

    #[test]
    fn test_join_one_sided_removal_becomes_update() {
        let out = join_change(Side::Left, &DictChange::remove(vec![("a", 1), ("c", 3)]), lookup(&[("a", 9)]));
        assert_eq!(
            out,
            vec![DictChange::remove(vec![("c", 3)]), DictChange::add_or_update(vec![("a", 9)])]
        );

        let out = join_change(Side::Right, &DictChange::remove(vec![("a", 9), ("b", 2)]), lookup(&[("a", 1)]));
        assert_eq!(out, vec![DictChange::remove(vec![("b", 2)])]);
    }

    #[test]
    fn test_join_snapshots() {
        let out = join_snapshots(&[("a", 1), ("b", 2)], &[("b", 20), ("c", 30)]);
        assert_eq!(out, vec![("a", 1), ("b", 2), ("c", 30)]);
    }

    #[test]
    fn test_symmetric_except_change() {
        // "a" is new to the left and present on the right: it leaves the result.
        let out = symmetric_except_change(&DictChange::add_or_update(vec![("a", 1), ("b", 2)]), lookup(&[("a", 9)]), |_| None);
        assert_eq!(
            out,
            vec![DictChange::remove(vec![("a", 9)]), DictChange::add_or_update(vec![("b", 2)])]
        );

        // Updating a key already in both changes nothing.
        let out = symmetric_except_change(&DictChange::add_or_update(vec![("a", 5)]), lookup(&[("a", 9)]), |_| Some(1));
        assert!(out.is_empty());

        let out = symmetric_except_change(&DictChange::remove(vec![("a", 1), ("b", 2)]), lookup(&[("a", 9)]), |_| None);
        assert_eq!(
            out,
            vec![DictChange::remove(vec![("b", 2)]), DictChange::add_or_update(vec![("a", 9)])]
        );
    }

    #[test]
    fn test_symmetric_except_snapshots() {
        let out = symmetric_except_snapshots(&[("a", 1), ("b", 2)], &[("b", 20), ("c", 30)]);
        assert_eq!(out, vec![("a", 1), ("c", 30)]);
    }

    #[test]
    fn test_symmetric_join_change() {
        let mut right = lookup(&[("a", 10)]);
        let out = symmetric_join_change(&DictChange::add_or_update(vec![("a", 1), ("b", 2)]), |k, v| {
            right(k).map(|w| v + w)
        });
        assert_eq!(out, DictChange::add_or_update(vec![("a", 11)]));

        let out = symmetric_join_change(&DictChange::remove(vec![("a", 1)]), |_, v| Some(v * 2));
        assert_eq!(out, DictChange::remove(vec![("a", 2)]));
    }

    #[test]
    fn test_symmetric_join_snapshots() {
        let out = symmetric_join_snapshots(&[("a", 1), ("b", 2)], &[("b", "x")], |k, a, b| format!("{}{}{}", k, a, b));
        assert_eq!(out, vec![("b", "b2x".to_string())]);
    }
}
