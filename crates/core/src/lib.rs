//! Fluid Core - Core types, errors and backing stores for Fluid reactive collections.
//!
//! This crate provides the foundations shared by every other Fluid crate:
//!
//! - `Error` / `Result`: the error taxonomy of the collection engine
//! - `guard` / `try_guard`: run user callbacks, turning panics into `Error::Callback`
//! - `Element` / `Payload`: bounds for set members, dictionary keys and values
//! - `SetStore` / `MapStore`: pluggable backing storage for base collections
//!
//! # Example
//!
//! ```rust
//! use fluid_core::{guard, Error, SetStore};
//! use std::collections::BTreeSet;
//!
//! let mut store = BTreeSet::new();
//! assert!(SetStore::insert(&mut store, 3));
//! assert!(!SetStore::insert(&mut store, 3));
//!
//! let failed: fluid_core::Result<i32> = guard(|| panic!("selector failed"));
//! assert!(matches!(failed, Err(Error::Callback { .. })));
//! ```

mod error;
mod store;
mod types;

pub use error::{guard, try_guard, Error, Result};
pub use store::{map_entries, set_items, MapStore, SetStore};
pub use types::{Element, Payload};
