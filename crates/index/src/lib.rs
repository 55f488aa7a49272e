//! Fluid Index - Weight-balanced ordered index for Fluid collections.
//!
//! This crate provides the ordered structure behind every sorted reactive
//! collection:
//!
//! - `WeightedIndex`: size-annotated, weight-balanced binary search tree with
//!   O(log n) insert, remove, rank and positional access
//! - `Comparator`: pluggable ordering (natural, key selector, closure)
//! - `DuplicatePolicy`: what happens when a comparator-equal item is inserted
//!
//! # Example
//!
//! ```rust
//! use fluid_index::{KeyComparator, Order, WeightedIndex};
//!
//! let mut index = WeightedIndex::new();
//! for x in [10, 7, 1, 9, 8] {
//!     index.insert(x);
//! }
//! assert_eq!(index.iter().copied().collect::<Vec<_>>(), vec![1, 7, 8, 9, 10]);
//! assert_eq!(index.rank(&9), Ok(3));
//! assert_eq!(index.rank(&5), Err(1));
//! assert_eq!(index.at(0).copied(), Ok(1));
//!
//! // Items that compare equal are the same member.
//! let mut by_len = WeightedIndex::with_comparator(KeyComparator::new(|s: &&str| s.len(), Order::Asc));
//! assert!(by_len.insert("abc"));
//! assert!(!by_len.insert("xyz"));
//! assert_eq!(by_len.len(), 1);
//! ```

pub mod comparator;
pub mod wbtree;

pub use comparator::{Comparator, FnComparator, KeyComparator, NaturalComparator, Order};
pub use wbtree::{DuplicatePolicy, Iter, WeightedIndex, BALANCE_FACTOR, ROTATION_FACTOR};
