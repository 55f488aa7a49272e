//! An insertion-ordered reactive set.

use crate::hub::Hub;
use crate::observable::{MaterializedSet, Observable, ObservableSet};
use crate::observer::Observer;
use crate::subscription::Subscription;
use fluid_core::{Element, Error, Result};
use fluid_incremental::SetChange;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
struct StackState<T> {
    items: Vec<T>,
    positions: HashMap<T, usize>,
}

impl<T: Element> StackState<T> {
    fn push(&mut self, item: T) {
        self.positions.insert(item.clone(), self.items.len());
        self.items.push(item);
    }

    fn pop(&mut self) -> Option<T> {
        let item = self.items.pop()?;
        self.positions.remove(&item);
        Some(item)
    }

    fn clear(&mut self) {
        self.items.clear();
        self.positions.clear();
    }
}

struct StackInner<T> {
    hub: Hub<SetChange<T>>,
    state: RwLock<StackState<T>>,
}

/// A reactive set that remembers insertion order and pops the newest item.
///
/// Members are unique; pushing an item already present is a no-op.
/// Position 0 is the bottom of the stack.
pub struct ReactiveStack<T> {
    inner: Arc<StackInner<T>>,
}

impl<T> Clone for ReactiveStack<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element> Default for ReactiveStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> ReactiveStack<T> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StackInner {
                hub: Hub::new("stack"),
                state: RwLock::new(StackState {
                    items: Vec::new(),
                    positions: HashMap::new(),
                }),
            }),
        }
    }

    fn publish(&self, change: &SetChange<T>) {
        trace!(kind = "stack", reason = ?change.reason, items = change.len(), "publish");
        self.inner.hub.publish(change);
    }

    /// Pushes an item, returning false if it is already on the stack.
    pub fn push(&self, item: T) -> bool {
        let _gate = self.inner.hub.lock();
        if self.contains(&item) {
            return false;
        }
        self.publish(&SetChange::add(vec![item.clone()]));
        self.inner.state.write().push(item);
        true
    }

    /// Removes and returns the most recently pushed item.
    pub fn pop(&self) -> Option<T> {
        let _gate = self.inner.hub.lock();
        let top = self.peek()?;
        self.publish(&SetChange::remove(vec![top]));
        self.inner.state.write().pop()
    }

    /// Returns the most recently pushed item.
    pub fn peek(&self) -> Option<T> {
        self.inner.state.read().items.last().cloned()
    }

    /// Returns the item at `index`, counted from the bottom.
    pub fn at(&self, index: usize) -> Result<T> {
        let state = self.inner.state.read();
        state
            .items
            .get(index)
            .cloned()
            .ok_or_else(|| Error::index_out_of_range(index, state.items.len()))
    }

    /// Returns the position of `item`, counted from the bottom.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.state.read().positions.get(item).copied()
    }

    /// Returns the bottom item.
    pub fn min(&self) -> Option<T> {
        self.inner.state.read().items.first().cloned()
    }

    /// Returns the top item.
    pub fn max(&self) -> Option<T> {
        self.peek()
    }

    /// Removes every item, returning how many were removed.
    pub fn clear(&self) -> usize {
        let _gate = self.inner.hub.lock();
        let items = self.to_vec();
        if items.is_empty() {
            return 0;
        }
        let removed = items.len();
        self.publish(&SetChange::remove(items));
        self.inner.state.write().clear();
        removed
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.inner.state.read().items.len()
    }

    /// Returns true if the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the items from bottom to top.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.state.read().items.clone()
    }

    /// Completes the change stream of every current observer.
    pub fn dispose(&self) {
        self.inner.hub.complete();
    }
}

impl<T: Element> Observable<SetChange<T>> for ReactiveStack<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<SetChange<T>>>) -> Subscription {
        self.inner.hub.subscribe(observer, || SetChange::add(self.to_vec()))
    }
}

impl<T: Element> ObservableSet<T> for ReactiveStack<T> {
    fn contains(&self, item: &T) -> bool {
        self.inner.state.read().positions.contains_key(item)
    }
}

impl<T: Element> MaterializedSet<T> for ReactiveStack<T> {
    fn len(&self) -> usize {
        ReactiveStack::len(self)
    }

    fn to_vec(&self) -> Vec<T> {
        ReactiveStack::to_vec(self)
    }
}

impl<T: Element + fmt::Debug> fmt::Debug for ReactiveStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_stack_push_pop() {
        let stack = ReactiveStack::new();
        assert!(stack.push("a"));
        assert!(stack.push("b"));
        assert!(!stack.push("a"));

        assert_eq!(stack.peek(), Some("b"));
        assert_eq!(stack.pop(), Some("b"));
        assert_eq!(stack.pop(), Some("a"));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_stack_positions() {
        let stack = ReactiveStack::new();
        for x in [30, 10, 20] {
            stack.push(x);
        }
        assert_eq!(stack.at(0), Ok(30));
        assert_eq!(stack.at(3), Err(Error::index_out_of_range(3, 3)));
        assert_eq!(stack.index_of(&20), Some(2));
        assert_eq!(stack.index_of(&99), None);
        assert_eq!(stack.min(), Some(30));
        assert_eq!(stack.max(), Some(20));
    }

    #[test]
    fn test_stack_publishes_in_order() {
        let stack = ReactiveStack::new();
        stack.push(1);
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let _sub = stack.subscribe_fn(move |c: &SetChange<i32>| sink.lock().push(c.clone()));

        stack.push(2);
        stack.pop();
        stack.clear();
        stack.clear();
        assert_eq!(
            *log.lock(),
            vec![
                SetChange::add(vec![1]),
                SetChange::add(vec![2]),
                SetChange::remove(vec![2]),
                SetChange::remove(vec![1]),
            ]
        );
        assert!(stack.is_empty());
    }
}
