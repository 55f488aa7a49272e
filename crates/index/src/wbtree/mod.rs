//! Weight-balanced binary search tree.
//!
//! Every node records the size of its subtree, which gives O(log n) rank
//! and positional queries. After each insert or remove the path back to the
//! root is rebalanced by comparing subtree weights (`size + 1`): when one
//! side outweighs the other by more than [`BALANCE_FACTOR`] the node is
//! rotated toward the light side, with a preliminary rotation of the heavy
//! child when its inner subtree outweighs its outer subtree by at least
//! [`ROTATION_FACTOR`].

mod iter;
mod node;
mod tree;

pub use iter::Iter;
pub use node::NodeId;
pub use tree::{DuplicatePolicy, WeightedIndex};

/// Maximum ratio allowed between the weights of a node's two subtrees.
pub const BALANCE_FACTOR: f64 = 2.5;

/// Inner/outer weight ratio of the heavy child above which a double rotation is used.
pub const ROTATION_FACTOR: f64 = 1.5;
