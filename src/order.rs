//! Insertion-order overlay (C5): a doubly-linked list threaded through
//! `Node::order_prev`/`order_next`, maintained alongside the tree structure
//! whenever a tree is constructed with `track_order = true`.
//!
//! Adapted from `src/deque.rs`'s head/tail register pair — there it drives a
//! standalone ring buffer; here the same prev/next bookkeeping is spliced
//! onto tree nodes instead of slots in a `Vec`.

use crate::arena::{Idx, SENTINEL};
use crate::tree::Tree;

impl<K, V> Tree<K, V> {
    /// Appends `node` to the tail of the order list. No-op on a tree not
    /// tracking order, and also a no-op on replace (callers only invoke this
    /// for freshly-allocated nodes).
    pub(crate) fn order_append(&mut self, node: Idx) {
        if !self.track_order {
            return;
        }
        let old_tail = self.order_tail;
        if let Some(entry) = self.arena.get_mut(node) {
            entry.order_prev = old_tail;
            entry.order_next = SENTINEL;
        } else {
            self.bug("dereferencing a non-occupied arena slot");
            return;
        }
        if old_tail == SENTINEL {
            self.order_head = node;
        } else if let Some(entry) = self.arena.get_mut(old_tail) {
            entry.order_next = node;
        } else {
            self.bug("dereferencing a non-occupied arena slot");
            return;
        }
        self.order_tail = node;
    }

    /// Unlinks `node` from the order list, leaving the rest of the list
    /// intact. No-op on a tree not tracking order.
    pub(crate) fn order_unlink(&mut self, node: Idx) {
        if !self.track_order {
            return;
        }
        let (prev, next) = match self.arena.get(node) {
            Some(entry) => (entry.order_prev, entry.order_next),
            None => {
                self.bug("dereferencing a non-occupied arena slot");
                return;
            }
        };
        if prev != SENTINEL {
            match self.arena.get_mut(prev) {
                Some(entry) => entry.order_next = next,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    return;
                }
            }
        } else {
            self.order_head = next;
        }
        if next != SENTINEL {
            match self.arena.get_mut(next) {
                Some(entry) => entry.order_prev = prev,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    return;
                }
            }
        } else {
            self.order_tail = prev;
        }
    }

    pub(crate) fn order_head(&self) -> Idx {
        self.order_head
    }

    pub(crate) fn order_tail_idx(&self) -> Idx {
        self.order_tail
    }

    pub(crate) fn order_next(&self, node: Idx) -> Idx {
        match self.arena.get(node) {
            Some(entry) => entry.order_next,
            None => {
                self.bug("dereferencing a non-occupied arena slot");
                SENTINEL
            }
        }
    }

    pub(crate) fn order_prev(&self, node: Idx) -> Idx {
        match self.arena.get(node) {
            Some(entry) => entry.order_prev,
            None => {
                self.bug("dereferencing a non-occupied arena slot");
                SENTINEL
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_insertion_order_across_removals() {
        let mut tree: Tree<i32, i32> = Tree::with_track_order(true);
        for k in [5, 1, 9, 3, 7] {
            tree.insert(k, k);
        }
        let order: Vec<i32> = {
            let mut v = vec![];
            let mut n = tree.order_head();
            while n != SENTINEL {
                v.push(*tree.get_key_value(n).0);
                n = tree.order_next(n);
            }
            v
        };
        assert_eq!(order, vec![5, 1, 9, 3, 7]);

        tree.remove_by_key(&9);
        let order: Vec<i32> = {
            let mut v = vec![];
            let mut n = tree.order_head();
            while n != SENTINEL {
                v.push(*tree.get_key_value(n).0);
                n = tree.order_next(n);
            }
            v
        };
        assert_eq!(order, vec![5, 1, 3, 7]);
    }

    #[test]
    fn replace_does_not_move_insertion_position() {
        let mut tree: Tree<i32, i32> = Tree::with_track_order(true);
        tree.insert(1, 1);
        tree.insert(2, 2);
        tree.insert(3, 3);
        tree.insert(2, 20);
        let order: Vec<i32> = {
            let mut v = vec![];
            let mut n = tree.order_head();
            while n != SENTINEL {
                v.push(*tree.get_key_value(n).0);
                n = tree.order_next(n);
            }
            v
        };
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn untracked_tree_leaves_links_at_sentinel() {
        let mut tree: Tree<i32, i32> = Tree::new();
        tree.insert(1, 1);
        assert_eq!(tree.order_head(), SENTINEL);
    }
}
