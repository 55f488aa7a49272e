//! Conversions between dictionary and set change streams.

use crate::change::{ChangeReason, DictChange, DictChangeReason, SetChange, SetChangeBuilder};

/// Translates a dictionary batch into a batch over its `(key, value)` pairs.
///
/// `previous` reads a key's value before the batch is applied. Replacing a
/// value removes the old pair and adds the new one.
pub fn pairs_change<K, V, P>(change: &DictChange<K, V>, mut previous: P) -> Vec<SetChange<(K, V)>>
where
    K: Clone,
    V: Clone + PartialEq,
    P: FnMut(&K) -> Option<V>,
{
    let mut builder = SetChangeBuilder::new();

    for (key, value) in change.iter() {
        match change.reason {
            DictChangeReason::AddOrUpdate => match previous(key) {
                Some(old) if old == *value => {}
                Some(old) => {
                    builder.push(ChangeReason::Remove, (key.clone(), old));
                    builder.push(ChangeReason::Add, (key.clone(), value.clone()));
                }
                None => builder.push(ChangeReason::Add, (key.clone(), value.clone())),
            },
            DictChangeReason::Remove => builder.push(ChangeReason::Remove, (key.clone(), value.clone())),
        }
    }

    builder.finish()
}

/// Translates a dictionary batch into a batch over its keys.
///
/// Updates of keys already present produce nothing.
pub fn keys_change<K, V, P>(change: &DictChange<K, V>, mut had_key: P) -> SetChange<K>
where
    K: Clone,
    P: FnMut(&K) -> bool,
{
    let keys = match change.reason {
        DictChangeReason::AddOrUpdate => change.keys().filter(|k| !had_key(k)).cloned().collect(),
        DictChangeReason::Remove => change.keys().cloned().collect(),
    };
    SetChange::new(
        match change.reason {
            DictChangeReason::AddOrUpdate => ChangeReason::Add,
            DictChangeReason::Remove => ChangeReason::Remove,
        },
        keys,
    )
}
