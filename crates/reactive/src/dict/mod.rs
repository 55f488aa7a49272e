//! Reactive dictionaries and their operators.

mod base;
mod collected;
mod ext;
mod scoped;

pub use base::ReactiveDictionary;
pub use collected::CollectedDictionary;
pub use ext::DictExt;
