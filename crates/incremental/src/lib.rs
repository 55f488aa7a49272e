//! Fluid Incremental - Change records and incremental operators for Fluid collections.
//!
//! This crate holds everything about reactive collections that does not
//! involve locking or subscriptions: the change records a collection
//! publishes and the pure functions that translate an upstream batch into
//! a derived collection's batches.
//!
//! # Core Concepts
//!
//! - `SetChange<T>` / `DictChange<K, V>`: one published batch (a reason plus items)
//! - `Delta<T>`: a single item's signed change, used when consolidating batches
//! - `ChangeWindow<T>`: coalesces buffered batches into their net effect
//!
//! # Incremental Operators
//!
//! - `SetOperator`: union, intersection, except and symmetric except
//! - `filter_change` / `filter_dict_change`: predicate filters
//! - `SelectState`: multiplicity-aware projection
//! - `IncrementalCount/Sum/Product`, `Fold`, `DictFold`: running aggregates
//! - `join_change`, `symmetric_join_change`, `symmetric_except_change`, `KeyFilter`:
//!   dictionary operators
//!
//! # Example
//!
//! ```rust
//! use fluid_incremental::{SetChange, SetOperator, Side};
//!
//! // B = {3, 4}; A gains 2 and 3. Only 2 is new to A ∪ B.
//! let b = [3, 4];
//! let out = SetOperator::Union.translate(Side::Left, &SetChange::add(vec![2, 3]), |x| b.contains(x));
//! assert_eq!(out, vec![SetChange::add(vec![2])]);
//! ```

pub mod change;
pub mod delta;
pub mod operators;
pub mod window;

pub use change::{ChangeReason, DictChange, DictChangeBuilder, DictChangeReason, SetChange, SetChangeBuilder};
pub use delta::{Delta, DeltaBatch, DeltaBatchExt};
pub use operators::{
    filter_change, filter_dict_change, join_change, join_snapshots, keys_change, pairs_change,
    symmetric_except_change, symmetric_except_snapshots, symmetric_join_change, symmetric_join_snapshots,
    Aggregator, DictFold, Distinct, Fold, FoldFn, IncrementalCount, IncrementalProduct, IncrementalSum, KeyFilter,
    Numeric, SelectDelta, SelectState, SetOperator, Side,
};
pub use window::ChangeWindow;
