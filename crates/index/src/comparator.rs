//! Comparator implementations for ordered collections.
//!
//! This module provides the orderings a `WeightedIndex` can be built with.
//! Two items for which a comparator returns `Ordering::Equal` are treated as
//! the same member of the index, whatever their values.

use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;

/// Sort order for ordered collections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    /// Ascending order (smallest first)
    #[default]
    Asc,
    /// Descending order (largest first)
    Desc,
}

impl Order {
    /// Applies this order to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        }
    }
}

/// Trait for comparing items of an ordered collection.
pub trait Comparator<T> {
    /// Compares two items according to the comparator's ordering.
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// Returns true if a < b according to this comparator.
    fn is_less(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Returns true if a > b according to this comparator.
    fn is_greater(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Greater
    }

    /// Returns true if a == b according to this comparator.
    fn is_equal(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Orders items that implement `Ord` by their natural ordering.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalComparator {
    order: Order,
}

impl NaturalComparator {
    /// Creates a new natural comparator with the given order.
    pub fn new(order: Order) -> Self {
        Self { order }
    }

    /// Creates an ascending comparator.
    pub fn asc() -> Self {
        Self::new(Order::Asc)
    }

    /// Creates a descending comparator.
    pub fn desc() -> Self {
        Self::new(Order::Desc)
    }

    /// Returns the order of this comparator.
    pub fn order(&self) -> Order {
        self.order
    }
}

impl<T: Ord> Comparator<T> for NaturalComparator {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.order.apply(a.cmp(b))
    }
}

/// Orders items by a key extracted with a selector.
pub struct KeyComparator<F, K> {
    key: F,
    order: Order,
    _key: PhantomData<fn() -> K>,
}

impl<F, K> KeyComparator<F, K> {
    /// Creates a comparator that orders items by `key(item)`.
    pub fn new(key: F, order: Order) -> Self {
        Self {
            key,
            order,
            _key: PhantomData,
        }
    }

    /// Returns the order of this comparator.
    pub fn order(&self) -> Order {
        self.order
    }
}

impl<T, F, K> Comparator<T> for KeyComparator<F, K>
where
    F: Fn(&T) -> K,
    K: Ord,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.order.apply((self.key)(a).cmp(&(self.key)(b)))
    }
}

impl<F: Clone, K> Clone for KeyComparator<F, K> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone(), self.order)
    }
}

impl<F, K> fmt::Debug for KeyComparator<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyComparator").field("order", &self.order).finish()
    }
}

/// Orders items with an arbitrary comparison closure.
#[derive(Clone)]
pub struct FnComparator<F> {
    compare: F,
}

impl<F> FnComparator<F> {
    /// Wraps a comparison closure.
    pub fn new(compare: F) -> Self {
        Self { compare }
    }
}

impl<T, F> Comparator<T> for FnComparator<F>
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }
}

impl<F> fmt::Debug for FnComparator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnComparator")
    }
}
