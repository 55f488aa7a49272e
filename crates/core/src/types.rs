//! Bounds shared by every element type stored in a Fluid collection.

use core::hash::Hash;

/// A value that can be a set member or a dictionary key.
///
/// Collections clone elements into change batches and may be shared across
/// threads, so the bound is `Clone + Eq + Hash + Send + Sync + 'static`.
pub trait Element: Clone + Eq + Hash + Send + Sync + 'static {}

impl<T> Element for T where T: Clone + Eq + Hash + Send + Sync + 'static {}

/// A value stored against a dictionary key.
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Send + Sync + 'static {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_element<T: Element>() {}
    fn assert_payload<T: Payload>() {}

    #[test]
    fn test_blanket_impls() {
        assert_element::<i64>();
        assert_element::<String>();
        assert_element::<(u8, char)>();
        assert_payload::<f64>();
        assert_payload::<Vec<String>>();
    }
}
