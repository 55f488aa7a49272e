//! Incremental operators over change batches.
//!
//! This module provides the pure translation logic behind every derived
//! collection:
//! - Set algebra: union, intersection, except and symmetric except
//! - Filter: passes through items matching a predicate
//! - Select: reference-counted projection
//! - Aggregate: count, sum, product and seeded folds
//! - Join: key union, key intersection and symmetric except of dictionaries
//! - Keys: restricting a dictionary by a key set
//! - Convert: dictionary to set conversions

mod aggregate;
mod convert;
mod filter;
mod join;
mod keys;
mod select;
mod set_ops;

pub use aggregate::{
    Aggregator, DictFold, Distinct, Fold, FoldFn, IncrementalCount, IncrementalProduct, IncrementalSum, Numeric,
};
pub use convert::{keys_change, pairs_change};
pub use filter::{filter_change, filter_dict_change};
pub use join::{
    join_change, join_snapshots, symmetric_except_change, symmetric_except_snapshots, symmetric_join_change,
    symmetric_join_snapshots,
};
pub use keys::KeyFilter;
pub use select::{SelectDelta, SelectState};
pub use set_ops::{SetOperator, Side};
