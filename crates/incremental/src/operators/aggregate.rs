//! Incremental aggregate operators.
//!
//! Aggregates consume change batches and maintain a running value without
//! revisiting the whole collection. Streams built on them publish the value
//! once per batch, and only when it differs from the last published value
//! (see [`Distinct`]).

use crate::change::{ChangeReason, DictChange, DictChangeReason, SetChange};
use core::hash::Hash;
use core::ops::{Add, Div, Mul, Sub};
use fluid_core::Result;
use hashbrown::HashMap;
use std::sync::Arc;

/// An incrementally maintained value over a change stream of type `C`.
pub trait Aggregator<C>: Send {
    /// The aggregated value.
    type Output: Clone + PartialEq + Send + Sync + 'static;

    /// Folds one batch into the running value.
    fn apply(&mut self, change: &C) -> Result<()>;

    /// Returns the current value.
    fn value(&self) -> Self::Output;
}

/// Numeric types supported by [`IncrementalSum`] and [`IncrementalProduct`].
pub trait Numeric:
    Copy
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// The additive identity.
    const ZERO: Self;
    /// The multiplicative identity.
    const ONE: Self;
}

macro_rules! impl_numeric {
    ($($t:ty),* ; $($f:ty),*) => {
        $(impl Numeric for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;
        })*
        $(impl Numeric for $f {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
        })*
    };
}

impl_numeric!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize; f32, f64);

/// Incremental COUNT aggregate.
#[derive(Clone, Debug, Default)]
pub struct IncrementalCount {
    count: usize,
}

impl IncrementalCount {
    /// Creates a new incremental count starting at 0.
    pub fn new() -> Self {
        Self { count: 0 }
    }

    /// Returns the current count.
    #[inline]
    pub fn get(&self) -> usize {
        self.count
    }
}

impl<T> Aggregator<SetChange<T>> for IncrementalCount {
    type Output = usize;

    fn apply(&mut self, change: &SetChange<T>) -> Result<()> {
        match change.reason {
            ChangeReason::Add => self.count += change.len(),
            ChangeReason::Remove => self.count = self.count.saturating_sub(change.len()),
        }
        Ok(())
    }

    fn value(&self) -> usize {
        self.count
    }
}

/// Incremental SUM aggregate.
#[derive(Clone, Debug)]
pub struct IncrementalSum<T> {
    sum: T,
}

impl<T: Numeric> Default for IncrementalSum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric> IncrementalSum<T> {
    /// Creates a new incremental sum starting at zero.
    pub fn new() -> Self {
        Self { sum: T::ZERO }
    }

    /// Returns the current sum.
    #[inline]
    pub fn get(&self) -> T {
        self.sum
    }
}

impl<T: Numeric> Aggregator<SetChange<T>> for IncrementalSum<T> {
    type Output = T;

    fn apply(&mut self, change: &SetChange<T>) -> Result<()> {
        for &item in change.iter() {
            self.sum = match change.reason {
                ChangeReason::Add => self.sum + item,
                ChangeReason::Remove => self.sum - item,
            };
        }
        Ok(())
    }

    fn value(&self) -> T {
        self.sum
    }
}

/// Incremental PRODUCT aggregate.
///
/// Zero factors are counted instead of multiplied in, so removing a zero
/// restores the product of the remaining items without recomputation.
#[derive(Clone, Debug)]
pub struct IncrementalProduct<T> {
    /// Product of all non-zero items.
    product: T,
    /// Number of zero items.
    zeros: usize,
}

impl<T: Numeric> Default for IncrementalProduct<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric> IncrementalProduct<T> {
    /// Creates a new incremental product starting at one.
    pub fn new() -> Self {
        Self {
            product: T::ONE,
            zeros: 0,
        }
    }

    /// Returns the current product.
    pub fn get(&self) -> T {
        if self.zeros > 0 {
            T::ZERO
        } else {
            self.product
        }
    }
}

impl<T: Numeric> Aggregator<SetChange<T>> for IncrementalProduct<T> {
    type Output = T;

    fn apply(&mut self, change: &SetChange<T>) -> Result<()> {
        for &item in change.iter() {
            match (change.reason, item == T::ZERO) {
                (ChangeReason::Add, true) => self.zeros += 1,
                (ChangeReason::Remove, true) => self.zeros = self.zeros.saturating_sub(1),
                (ChangeReason::Add, false) => self.product = self.product * item,
                (ChangeReason::Remove, false) => self.product = self.product / item,
            }
        }
        Ok(())
    }

    fn value(&self) -> T {
        self.get()
    }
}

/// A fold step: combines the accumulator with one item.
pub type FoldFn<T, A> = Arc<dyn Fn(&A, &T) -> Result<A> + Send + Sync>;

/// Seeded running fold over a set change stream.
///
/// Added items are folded with `add`, removed items with `remove`.
pub struct Fold<T, A> {
    acc: A,
    add: FoldFn<T, A>,
    remove: FoldFn<T, A>,
}

impl<T, A: Clone> Fold<T, A> {
    /// Creates a fold starting at `seed`.
    pub fn new(seed: A, add: FoldFn<T, A>, remove: FoldFn<T, A>) -> Self {
        Self { acc: seed, add, remove }
    }

    /// Returns the current accumulator.
    pub fn get(&self) -> &A {
        &self.acc
    }

    fn step(&mut self, reason: ChangeReason, item: &T) -> Result<()> {
        let f = match reason {
            ChangeReason::Add => &self.add,
            ChangeReason::Remove => &self.remove,
        };
        self.acc = f(&self.acc, item)?;
        Ok(())
    }
}

impl<T, A> Aggregator<SetChange<T>> for Fold<T, A>
where
    A: Clone + PartialEq + Send + Sync + 'static,
{
    type Output = A;

    fn apply(&mut self, change: &SetChange<T>) -> Result<()> {
        for item in change.iter() {
            self.step(change.reason, item)?;
        }
        Ok(())
    }

    fn value(&self) -> A {
        self.acc.clone()
    }
}

/// Seeded running fold over a dictionary change stream.
///
/// Entries are folded as `(key, value)` pairs. Replacing a key's value
/// first folds the old pair out with `remove`, then the new pair in with
/// `add`, so the accumulator always reflects the current entries.
pub struct DictFold<K, V, A> {
    entries: HashMap<K, V>,
    fold: Fold<(K, V), A>,
}

impl<K, V, A> DictFold<K, V, A>
where
    K: Eq + Hash + Clone,
    V: Clone,
    A: Clone,
{
    /// Creates a fold starting at `seed`.
    pub fn new(seed: A, add: FoldFn<(K, V), A>, remove: FoldFn<(K, V), A>) -> Self {
        Self {
            entries: HashMap::new(),
            fold: Fold::new(seed, add, remove),
        }
    }

    /// Returns the current accumulator.
    pub fn get(&self) -> &A {
        self.fold.get()
    }
}

impl<K, V, A> Aggregator<DictChange<K, V>> for DictFold<K, V, A>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
    A: Clone + PartialEq + Send + Sync + 'static,
{
    type Output = A;

    fn apply(&mut self, change: &DictChange<K, V>) -> Result<()> {
        for (key, value) in change.iter() {
            match change.reason {
                DictChangeReason::AddOrUpdate => {
                    if let Some(old) = self.entries.insert(key.clone(), value.clone()) {
                        self.fold.step(ChangeReason::Remove, &(key.clone(), old))?;
                    }
                    self.fold.step(ChangeReason::Add, &(key.clone(), value.clone()))?;
                }
                DictChangeReason::Remove => {
                    if let Some(old) = self.entries.remove(key) {
                        self.fold.step(ChangeReason::Remove, &(key.clone(), old))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn value(&self) -> A {
        self.fold.get().clone()
    }
}

/// Suppresses consecutive duplicate values.
#[derive(Clone, Debug)]
pub struct Distinct<A> {
    last: Option<A>,
}

impl<A> Default for Distinct<A> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<A: Clone + PartialEq> Distinct<A> {
    /// Creates a filter that has seen nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value if it differs from the previously observed one.
    pub fn observe(&mut self, value: A) -> Option<A> {
        if self.last.as_ref() == Some(&value) {
            return None;
        }
        self.last = Some(value.clone());
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluid_core::Error;

    #[test]
    fn test_incremental_count() {
        let mut count = IncrementalCount::new();
        Aggregator::<SetChange<i32>>::apply(&mut count, &SetChange::add(vec![1, 2, 3])).unwrap();
        Aggregator::<SetChange<i32>>::apply(&mut count, &SetChange::remove(vec![2])).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_incremental_sum() {
        let mut sum = IncrementalSum::<i32>::new();
        sum.apply(&SetChange::add(vec![10, 20, 30])).unwrap();
        assert_eq!(sum.value(), 60);
        sum.apply(&SetChange::remove(vec![20])).unwrap();
        assert_eq!(sum.get(), 40);
    }

    #[test]
    fn test_incremental_sum_float() {
        let mut sum = IncrementalSum::<f64>::new();
        sum.apply(&SetChange::add(vec![1.5, 2.5])).unwrap();
        assert_eq!(sum.value(), 4.0);
    }

    #[test]
    fn test_incremental_product_with_zero() {
        let mut product = IncrementalProduct::<i32>::new();
        product.apply(&SetChange::add(vec![2, 3, 0])).unwrap();
        assert_eq!(product.value(), 0);

        product.apply(&SetChange::remove(vec![0])).unwrap();
        assert_eq!(product.value(), 6);

        product.apply(&SetChange::remove(vec![3])).unwrap();
        assert_eq!(product.value(), 2);
    }

    #[test]
    fn test_fold() {
        let add: FoldFn<i32, Vec<i32>> = Arc::new(|acc, x| {
            let mut next = acc.clone();
            next.push(*x);
            Ok(next)
        });
        let remove: FoldFn<i32, Vec<i32>> = Arc::new(|acc, x| Ok(acc.iter().copied().filter(|y| y != x).collect()));
        let mut fold = Fold::new(Vec::new(), add, remove);

        fold.apply(&SetChange::add(vec![1, 2, 3])).unwrap();
        fold.apply(&SetChange::remove(vec![2])).unwrap();
        assert_eq!(fold.value(), vec![1, 3]);
    }

    #[test]
    fn test_fold_error_propagates() {
        let add: FoldFn<i32, i32> = Arc::new(|acc, x| {
            if *x < 0 {
                Err(Error::callback("negative"))
            } else {
                Ok(acc + x)
            }
        });
        let remove: FoldFn<i32, i32> = Arc::new(|acc, x| Ok(acc - x));
        let mut fold = Fold::new(0, add, remove);

        assert!(fold.apply(&SetChange::add(vec![1, -1])).is_err());
        assert_eq!(*fold.get(), 1);
    }

    #[test]
    fn test_dict_fold_update_replaces() {
        let add: FoldFn<(&str, i32), i32> = Arc::new(|acc, (_, v)| Ok(acc + v));
        let remove: FoldFn<(&str, i32), i32> = Arc::new(|acc, (_, v)| Ok(acc - v));
        let mut fold = DictFold::new(0, add, remove);

        fold.apply(&DictChange::add_or_update(vec![("a", 5), ("b", 7)])).unwrap();
        assert_eq!(fold.value(), 12);

        fold.apply(&DictChange::add_or_update(vec![("a", 1)])).unwrap();
        assert_eq!(fold.value(), 8);

        fold.apply(&DictChange::remove(vec![("b", 7), ("zzz", 100)])).unwrap();
        assert_eq!(*fold.get(), 1);
    }

    #[test]
    fn test_distinct() {
        let mut distinct = Distinct::new();
        assert_eq!(distinct.observe(1), Some(1));
        assert_eq!(distinct.observe(1), None);
        assert_eq!(distinct.observe(2), Some(2));
        assert_eq!(distinct.observe(1), Some(1));
    }
}
