//! Fluid Reactive - Reactive sets and dictionaries with live derived views.
//!
//! Base collections publish every mutation as a change batch. Operators
//! subscribe to their sources and keep a derived collection in sync by
//! translating each batch, so a view built once stays correct as its
//! sources change.
//!
//! # Core Concepts
//!
//! - `ReactiveSet` / `ReactiveDictionary` / `ReactiveStack`: mutable base collections
//! - `Observable`: anything publishing batches; every subscription starts with a snapshot
//! - `SetRelay` / `DictRelay`: stateless derived views answering queries from their sources
//! - `SelectSet`, `OrderedSet`, `CollectedSet`, `CollectedDictionary`: materialized views
//! - `Stream`: cold streams for aggregates, buffers and snapshots
//!
//! # Operators
//!
//! - `SetExt`: set algebra, filters, projections, ordering, buffering and aggregates
//! - `DictExt`: dictionary filters, joins, key filters, projections and conversions
//!
//! # Example
//!
//! ```rust
//! use fluid_reactive::{ObservableSet, ReactiveSet, SetExt};
//!
//! let s1 = ReactiveSet::new();
//! s1.insert(2);
//! s1.insert(3);
//! let s2 = ReactiveSet::new();
//! s2.insert(3);
//! s2.insert(4);
//!
//! let view = s1.union(&s2).filter(|x| *x > 3);
//! assert!(view.contains(&4));
//! assert!(!view.contains(&3));
//! ```

pub mod dict;
pub mod observable;
pub mod observer;
pub mod relay;
pub mod set;
pub mod subscription;

mod aggregate;
mod hub;
mod link;
mod sink;

pub use dict::{CollectedDictionary, DictExt, ReactiveDictionary};
pub use observable::{
    Batch, DictSnapshot, MaterializedDictionary, MaterializedSet, Observable, ObservableDictionary, ObservableSet,
    SharedDictionary, SharedSet, Stream,
};
pub use observer::{FnObserver, Observer};
pub use relay::{DictRelay, SetRelay};
pub use set::{BufferOptions, CollectedSet, OrderedIter, OrderedSet, ReactiveSet, ReactiveStack, SelectSet, SetExt};
pub use subscription::{Subscription, SubscriptionId, SubscriptionManager, Terminal};

// Re-export the types that appear in operator signatures
pub use fluid_core::{Error, Result};
pub use fluid_incremental::{ChangeReason, DictChange, DictChangeReason, SetChange};
pub use fluid_index::{Comparator, DuplicatePolicy, FnComparator, KeyComparator, NaturalComparator, Order};
