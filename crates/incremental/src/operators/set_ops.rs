//! Set algebra over two change streams.
//!
//! Each operator is described by its membership formula over the two
//! operands. A batch from one operand is translated item by item: the
//! item's membership in the result before and after the change is
//! evaluated against the other operand's current membership, and only
//! items whose result membership flips are forwarded.

use crate::change::{ChangeReason, SetChange, SetChangeBuilder};
use core::hash::Hash;
use hashbrown::HashSet;

/// The operand a batch came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The first operand (`A`).
    Left,
    /// The second operand (`B`).
    Right,
}

impl Side {
    /// Returns the other operand.
    #[inline]
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// A binary set operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetOperator {
    /// `A ∪ B`
    Union,
    /// `A ∩ B`
    Intersection,
    /// `A \ B`
    Except,
    /// `A △ B`
    SymmetricExcept,
}

impl SetOperator {
    /// Evaluates the membership formula.
    #[inline]
    pub fn contains(self, in_left: bool, in_right: bool) -> bool {
        match self {
            SetOperator::Union => in_left || in_right,
            SetOperator::Intersection => in_left && in_right,
            SetOperator::Except => in_left && !in_right,
            SetOperator::SymmetricExcept => in_left != in_right,
        }
    }

    /// Returns the operator name.
    pub fn name(self) -> &'static str {
        match self {
            SetOperator::Union => "union",
            SetOperator::Intersection => "intersection",
            SetOperator::Except => "except",
            SetOperator::SymmetricExcept => "symmetric_except",
        }
    }

    #[inline]
    fn eval(self, side: Side, in_own: bool, in_other: bool) -> bool {
        match side {
            Side::Left => self.contains(in_own, in_other),
            Side::Right => self.contains(in_other, in_own),
        }
    }

    /// Translates one batch from `side` into result batches.
    ///
    /// `other_contains` answers membership in the opposite operand at the
    /// time of the call. The batch's own operand is assumed not to have
    /// applied the change yet, so its membership is implied by the reason.
    pub fn translate<T, F>(self, side: Side, change: &SetChange<T>, mut other_contains: F) -> Vec<SetChange<T>>
    where
        T: Clone,
        F: FnMut(&T) -> bool,
    {
        let was_member = change.reason == ChangeReason::Remove;
        let is_member = !was_member;
        let mut builder = SetChangeBuilder::new();

        for item in change.iter() {
            let in_other = other_contains(item);
            let before = self.eval(side, was_member, in_other);
            let after = self.eval(side, is_member, in_other);
            if before != after {
                let reason = if after { ChangeReason::Add } else { ChangeReason::Remove };
                builder.push(reason, item.clone());
            }
        }

        builder.finish()
    }

    /// Combines the two operands' snapshot batches into the result's snapshot.
    ///
    /// Items held by both operands are reported once.
    pub fn combine_snapshots<T>(self, left: &[T], right: &[T]) -> Vec<T>
    where
        T: Eq + Hash + Clone,
    {
        let left_set: HashSet<&T> = left.iter().collect();
        let right_set: HashSet<&T> = right.iter().collect();
        let mut out = Vec::new();

        for item in left {
            if self.contains(true, right_set.contains(item)) {
                out.push(item.clone());
            }
        }
        for item in right {
            if !left_set.contains(item) && self.contains(false, true) {
                out.push(item.clone());
            }
        }

        out
    }
}
