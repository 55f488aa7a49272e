//! Restricting a dictionary by a reactive key set.

use crate::change::{ChangeReason, DictChange, DictChangeBuilder, SetChange};
use core::hash::Hash;
use hashbrown::HashSet;

/// How a key set restricts a dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyFilter {
    /// Keep entries whose key is absent from the set.
    Except,
    /// Keep entries whose key is present in the set.
    Intersect,
}

impl KeyFilter {
    /// Returns true if an entry is visible given its key's membership in the set.
    #[inline]
    pub fn admits(self, in_keys: bool) -> bool {
        match self {
            KeyFilter::Except => !in_keys,
            KeyFilter::Intersect => in_keys,
        }
    }

    /// Translates a dictionary batch: entries pass when their key is admitted.
    pub fn translate_entries<K, V, F>(self, change: &DictChange<K, V>, mut keys_contains: F) -> DictChange<K, V>
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K) -> bool,
    {
        let entries = change
            .iter()
            .filter(|(key, _)| self.admits(keys_contains(key)))
            .cloned()
            .collect();
        DictChange::new(change.reason, entries)
    }

    /// Translates a key set batch into dictionary changes.
    ///
    /// `lookup` reads the dictionary's current value for a key. A key whose
    /// visibility flips is published with that value.
    pub fn translate_keys<K, V, F>(self, change: &SetChange<K>, mut lookup: F) -> Vec<DictChange<K, V>>
    where
        K: Clone,
        F: FnMut(&K) -> Option<V>,
    {
        let was_member = change.reason == ChangeReason::Remove;
        let before = self.admits(was_member);
        let after = self.admits(!was_member);
        let mut builder = DictChangeBuilder::new();

        if before != after {
            for key in change.iter() {
                if let Some(value) = lookup(key) {
                    if after {
                        builder.upsert(key.clone(), value);
                    } else {
                        builder.remove(key.clone(), value);
                    }
                }
            }
        }

        builder.finish()
    }

    /// Combines the dictionary snapshot with the key set snapshot.
    pub fn combine_snapshots<K, V>(self, entries: &[(K, V)], keys: &[K]) -> Vec<(K, V)>
    where
        K: Eq + Hash + Clone,
        V: Clone,
    {
        let keys: HashSet<&K> = keys.iter().collect();
        entries
            .iter()
            .filter(|(k, _)| self.admits(keys.contains(k)))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits() {
        assert!(KeyFilter::Except.admits(false));
        assert!(!KeyFilter::Except.admits(true));
        assert!(KeyFilter::Intersect.admits(true));
        assert!(!KeyFilter::Intersect.admits(false));
    }

    #[test]
    fn test_translate_entries() {
        let change = DictChange::add_or_update(vec![(1, "a"), (2, "b")]);
        assert_eq!(
            KeyFilter::Except.translate_entries(&change, |k| *k == 1),
            DictChange::add_or_update(vec![(2, "b")])
        );
        assert_eq!(
            KeyFilter::Intersect.translate_entries(&change, |k| *k == 1),
            DictChange::add_or_update(vec![(1, "a")])
        );
    }

    #[test]
    fn test_except_translate_keys() {
        let lookup = |k: &i32| if *k < 10 { Some(k * 100) } else { None };
        let out = KeyFilter::Except.translate_keys(&SetChange::add(vec![1, 50]), lookup);
        assert_eq!(out, vec![DictChange::remove(vec![(1, 100)])]);

        // Current value is read when a key leaves the exclusion set.
        let out = KeyFilter::Except.translate_keys(&SetChange::remove(vec![2]), lookup);
        assert_eq!(out, vec![DictChange::add_or_update(vec![(2, 200)])]);
    }

    #[test]
    fn test_intersect_translate_keys() {
        let lookup = |k: &i32| Some(*k);
        let out = KeyFilter::Intersect.translate_keys(&SetChange::add(vec![3]), lookup);
        assert_eq!(out, vec![DictChange::add_or_update(vec![(3, 3)])]);

        let out = KeyFilter::Intersect.translate_keys(&SetChange::remove(vec![3]), lookup);
        assert_eq!(out, vec![DictChange::remove(vec![(3, 3)])]);
    }

    #[test]
    fn test_combine_snapshots() {
        let entries = [(1, 'a'), (2, 'b'), (3, 'c')];
        assert_eq!(KeyFilter::Except.combine_snapshots(&entries, &[2]), vec![(1, 'a'), (3, 'c')]);
        assert_eq!(KeyFilter::Intersect.combine_snapshots(&entries, &[2, 9]), vec![(2, 'b')]);
    }
}
