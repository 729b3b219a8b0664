//! Ordered set façades (C8) over a `Tree<K, ()>`. The wrapper shape mirrors
//! `src/hash_set.rs` (a thin type wrapping a core map and discarding its
//! value slot), generalized onto the rank-augmented tree and with the
//! set-algebraic combinators the teacher's hash set has no use for.

use crate::error::Result;
use crate::tree::Tree;
use std::hash::{Hash, Hasher};

/// An ordered set keyed by `Ord`. Iterates in key order.
pub struct OrderedSet<K> {
    tree: Tree<K, ()>,
}

impl<K: Ord> PartialEq for OrderedSet<K> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Ord + Eq> Eq for OrderedSet<K> {}

impl<K: Ord + Hash> Hash for OrderedSet<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.hash(state)
    }
}

impl<K: Ord> Default for OrderedSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> OrderedSet<K> {
    pub fn new() -> Self {
        Self { tree: Tree::new() }
    }

    pub fn insert(&mut self, key: K) -> bool {
        matches!(self.tree.insert(key, ()), crate::tree::Outcome::Inserted)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.tree.remove_by_key(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tree.contains(key)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn clear(&mut self) {
        self.tree.clear()
    }

    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|(k, _)| k)
    }

    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|(k, _)| k)
    }

    pub fn nth(&self, index: usize) -> Result<&K> {
        let idx = self.tree.node_at_index(index)?;
        Ok(self.tree.get_key_value(idx).0)
    }

    pub fn rank(&self, key: &K) -> Option<usize> {
        self.tree.find(key).and_then(|idx| self.tree.index_of(idx).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.tree.iter().map(|(k, _)| k)
    }

    pub fn iter_rev(&self) -> impl Iterator<Item = &K> {
        self.tree.iter_rev().map(|(k, _)| k)
    }
}

impl<K: Ord + Clone> OrderedSet<K> {
    pub fn deep_copy(&self) -> Self {
        Self { tree: self.tree.deep_copy() }
    }

    /// The union of `self` and `other`: every key present in either.
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.deep_copy();
        for key in other.iter() {
            out.insert(key.clone());
        }
        out
    }

    /// Keys present in both `self` and `other`.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for key in self.iter() {
            if other.contains(key) {
                out.insert(key.clone());
            }
        }
        out
    }

    /// Keys present in `self` but not `other`.
    pub fn difference(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for key in self.iter() {
            if !other.contains(key) {
                out.insert(key.clone());
            }
        }
        out
    }

    /// Keys present in exactly one of `self`, `other`.
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let mut out = self.difference(other);
        for key in other.iter() {
            if !self.contains(key) {
                out.insert(key.clone());
            }
        }
        out
    }

    /// Removes from `self` every key also present in `other`, in place.
    pub fn subtract_in_place(&mut self, other: &Self) {
        let to_remove: Vec<K> = other.iter().filter(|k| self.contains(k)).cloned().collect();
        for key in to_remove {
            self.remove(&key);
        }
    }
}

/// An ordered set that additionally tracks insertion order (component C5).
pub struct InsertionOrderedSet<K> {
    tree: Tree<K, ()>,
}

impl<K: Ord> PartialEq for InsertionOrderedSet<K> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Ord + Eq> Eq for InsertionOrderedSet<K> {}

impl<K: Ord + Hash> Hash for InsertionOrderedSet<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.hash(state)
    }
}

impl<K: Ord> Default for InsertionOrderedSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> InsertionOrderedSet<K> {
    pub fn new() -> Self {
        Self { tree: Tree::with_track_order(true) }
    }

    pub fn insert(&mut self, key: K) -> bool {
        matches!(self.tree.insert(key, ()), crate::tree::Outcome::Inserted)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.tree.remove_by_key(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tree.contains(key)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn clear(&mut self) {
        self.tree.clear()
    }

    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|(k, _)| k)
    }

    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|(k, _)| k)
    }

    pub fn nth(&self, index: usize) -> Result<&K> {
        let idx = self.tree.node_at_index(index)?;
        Ok(self.tree.get_key_value(idx).0)
    }

    pub fn rank(&self, key: &K) -> Option<usize> {
        self.tree.find(key).and_then(|idx| self.tree.index_of(idx).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.tree.iter().map(|(k, _)| k)
    }

    pub fn iter_rev(&self) -> impl Iterator<Item = &K> {
        self.tree.iter_rev().map(|(k, _)| k)
    }

    pub fn insertion_order_iter(&self) -> Result<impl Iterator<Item = &K>> {
        Ok(self.tree.insertion_order_iter()?.map(|(k, _)| k))
    }

    pub fn insertion_order_iter_rev(&self) -> Result<impl Iterator<Item = &K>> {
        Ok(self.tree.insertion_order_iter_rev()?.map(|(k, _)| k))
    }
}

impl<K: Ord + Clone> InsertionOrderedSet<K> {
    pub fn deep_copy(&self) -> Self {
        Self { tree: self.tree.deep_copy() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_algebra() {
        let mut a = OrderedSet::new();
        let mut b = OrderedSet::new();
        for x in [1, 2, 3, 4] {
            a.insert(x);
        }
        for x in [3, 4, 5, 6] {
            b.insert(x);
        }
        let union: Vec<i32> = a.union(&b).iter().copied().collect();
        assert_eq!(union, vec![1, 2, 3, 4, 5, 6]);
        let inter: Vec<i32> = a.intersection(&b).iter().copied().collect();
        assert_eq!(inter, vec![3, 4]);
        let diff: Vec<i32> = a.difference(&b).iter().copied().collect();
        assert_eq!(diff, vec![1, 2]);
        let symdiff: Vec<i32> = a.symmetric_difference(&b).iter().copied().collect();
        assert_eq!(symdiff, vec![1, 2, 5, 6]);
    }

    #[test]
    fn subtract_in_place() {
        let mut a = OrderedSet::new();
        for x in [1, 2, 3] {
            a.insert(x);
        }
        let mut b = OrderedSet::new();
        b.insert(2);
        a.subtract_in_place(&b);
        let left: Vec<i32> = a.iter().copied().collect();
        assert_eq!(left, vec![1, 3]);
    }

    #[test]
    fn rank_and_nth() {
        let mut s = OrderedSet::new();
        for x in [5, 1, 9, 3] {
            s.insert(x);
        }
        assert_eq!(*s.nth(0).unwrap(), 1);
        assert_eq!(s.rank(&5), Some(2));
    }
}
