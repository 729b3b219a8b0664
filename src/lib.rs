//! Ordered set/map containers backed by a single red-black tree engine:
//! rank-augmented (`nth`/`rank` in O(log n)) and, optionally, with a second
//! doubly-linked ordering tracking insertion sequence independent of key
//! order.

pub mod arena;
pub mod concurrent;
pub mod error;
pub mod iter;
pub mod map;
pub mod node;
pub mod order;
pub mod set;
pub mod tree;

pub use concurrent::ConcurrentTree;
pub use error::{Result, TreeError};
pub use map::{InsertionOrderedMap, OrderedMap};
pub use set::{InsertionOrderedSet, OrderedSet};
pub use tree::{Outcome, Tree};
