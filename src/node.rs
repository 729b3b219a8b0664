//! Node layout (component C1): element slot, color, subtree size, and the
//! links a tree needs. Pure data plus small accessors — rebalancing and
//! search live in [`crate::tree`].

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::arena::{Idx, SENTINEL};

/// Mirrors `src/red_black_tree.rs`'s `Color` enum (`Black = 0, Red = 1`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum Color {
    Black = 0,
    Red = 1,
}

/// Which child of a node. Mirrors `TreeField::{Left, Right}`; used both for
/// child lookups and as the rotation direction argument in `rotate`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum Direction {
    Left = 0,
    Right = 1,
}

impl Direction {
    #[inline(always)]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// A single tree node. `order_prev`/`order_next` are only meaningful when
/// the owning tree was constructed with `track_order = true`; on a
/// non-tracking tree they are left at `SENTINEL` and never read.
pub struct Node<K, V> {
    pub key: K,
    pub value: V,
    pub color: Color,
    pub parent: Idx,
    pub left: Idx,
    pub right: Idx,
    /// 1 + size(left) + size(right); invariant 5.
    pub subtree_size: u32,
    pub order_prev: Idx,
    pub order_next: Idx,
}

impl<K, V> Node<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Node {
            key,
            value,
            color: Color::Red,
            parent: SENTINEL,
            left: SENTINEL,
            right: SENTINEL,
            subtree_size: 1,
            order_prev: SENTINEL,
            order_next: SENTINEL,
        }
    }

    #[inline(always)]
    pub fn child(&self, dir: Direction) -> Idx {
        match dir {
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    #[inline(always)]
    pub fn set_child(&mut self, dir: Direction, value: Idx) {
        match dir {
            Direction::Left => self.left = value,
            Direction::Right => self.right = value,
        }
    }
}
