//! Incremental filter operators.

use crate::change::{DictChange, DictChangeBuilder, DictChangeReason, SetChange};

/// Applies a filter predicate to a set change batch.
///
/// Only items satisfying the predicate are kept; the reason is preserved.
/// Downstream state only ever received matching adds, so forwarding only
/// matching removes keeps it consistent.
///
/// # Example
///
/// ```
/// use fluid_incremental::{filter_change, SetChange};
///
/// let change = SetChange::add(vec![10, 5, 15]);
/// assert_eq!(filter_change(&change, |&x| x > 8), SetChange::add(vec![10, 15]));
/// ```
pub fn filter_change<T, F>(change: &SetChange<T>, mut predicate: F) -> SetChange<T>
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    SetChange::new(
        change.reason,
        change.iter().filter(|item| predicate(item)).cloned().collect(),
    )
}

/// Applies a filter predicate to a dictionary change batch.
///
/// `previous` looks up a key's value before the batch is applied. An update
/// whose new value fails the predicate while the previous value passed it
/// becomes a removal of the previous entry.
pub fn filter_dict_change<K, V, F, P>(
    change: &DictChange<K, V>,
    mut predicate: F,
    mut previous: P,
) -> Vec<DictChange<K, V>>
where
    K: Clone,
    V: Clone,
    F: FnMut(&K, &V) -> bool,
    P: FnMut(&K) -> Option<V>,
{
    let mut builder = DictChangeBuilder::new();

    for (key, value) in change.iter() {
        match change.reason {
            DictChangeReason::AddOrUpdate => {
                if predicate(key, value) {
                    builder.upsert(key.clone(), value.clone());
                } else if let Some(old) = previous(key) {
                    if predicate(key, &old) {
                        builder.remove(key.clone(), old);
                    }
                }
            }
            DictChangeReason::Remove => {
                if predicate(key, value) {
                    builder.remove(key.clone(), value.clone());
                }
            }
        }
    }

    builder.finish()
}
