//! Reactive sets: base collections, derived sets and their operators.

mod base;
mod buffer;
mod collected;
mod ext;
mod ordered;
mod select;
mod stack;

pub use base::ReactiveSet;
pub use buffer::BufferOptions;
pub use collected::CollectedSet;
pub use ext::SetExt;
pub use ordered::{OrderedIter, OrderedSet};
pub use select::SelectSet;
pub use stack::ReactiveStack;
