//! Ordered map façades (C8) over `Tree<K, V>`. Thin wrappers exposing the
//! key/value API shape while reusing the tree's rank, iteration, and
//! insertion-order machinery wholesale.

use crate::error::Result;
use crate::tree::{Outcome, Tree};
use std::hash::{Hash, Hasher};

pub struct OrderedMap<K, V> {
    tree: Tree<K, V>,
}

impl<K: Ord, V: PartialEq> PartialEq for OrderedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Ord + Eq, V: Eq> Eq for OrderedMap<K, V> {}

impl<K: Ord + Hash, V: Hash> Hash for OrderedMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.hash(state)
    }
}

impl<K: Ord, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self { tree: Tree::new() }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.insert(key, value) {
            Outcome::Inserted => None,
            Outcome::Replaced(old) => Some(old),
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.tree.remove_by_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.tree.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.tree.get_mut(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
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

    pub fn first(&self) -> Option<(&K, &V)> {
        self.tree.first()
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.tree.last()
    }

    pub fn nth(&self, index: usize) -> Result<(&K, &V)> {
        let idx = self.tree.node_at_index(index)?;
        Ok(self.tree.get_key_value(idx))
    }

    pub fn rank(&self, key: &K) -> Option<usize> {
        self.tree.find(key).and_then(|idx| self.tree.index_of(idx).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.tree.iter()
    }

    pub fn iter_rev(&self) -> impl Iterator<Item = (&K, &V)> {
        self.tree.iter_rev()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.tree.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.tree.iter().map(|(_, v)| v)
    }
}

impl<K: Ord + Clone, V: Clone> OrderedMap<K, V> {
    pub fn deep_copy(&self) -> Self {
        Self { tree: self.tree.deep_copy() }
    }

    /// Merges `other` into a copy of `self`; keys in both take `other`'s
    /// value, mirroring `Outcome::Replaced`'s "last writer wins" semantics
    /// from a single `insert`.
    pub fn merge(&self, other: &Self) -> Self {
        let mut out = self.deep_copy();
        for (k, v) in other.iter() {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

/// An ordered map that additionally tracks insertion order (component C5).
pub struct InsertionOrderedMap<K, V> {
    tree: Tree<K, V>,
}

impl<K: Ord, V: PartialEq> PartialEq for InsertionOrderedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Ord + Eq, V: Eq> Eq for InsertionOrderedMap<K, V> {}

impl<K: Ord + Hash, V: Hash> Hash for InsertionOrderedMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.hash(state)
    }
}

impl<K: Ord, V> Default for InsertionOrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> InsertionOrderedMap<K, V> {
    pub fn new() -> Self {
        Self { tree: Tree::with_track_order(true) }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.insert(key, value) {
            Outcome::Inserted => None,
            Outcome::Replaced(old) => Some(old),
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.tree.remove_by_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.tree.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.tree.get_mut(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
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

    pub fn first(&self) -> Option<(&K, &V)> {
        self.tree.first()
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.tree.last()
    }

    pub fn nth(&self, index: usize) -> Result<(&K, &V)> {
        let idx = self.tree.node_at_index(index)?;
        Ok(self.tree.get_key_value(idx))
    }

    pub fn rank(&self, key: &K) -> Option<usize> {
        self.tree.find(key).and_then(|idx| self.tree.index_of(idx).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.tree.iter()
    }

    pub fn iter_rev(&self) -> impl Iterator<Item = (&K, &V)> {
        self.tree.iter_rev()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.tree.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.tree.iter().map(|(_, v)| v)
    }

    pub fn insertion_order_iter(&self) -> Result<impl Iterator<Item = (&K, &V)>> {
        self.tree.insertion_order_iter()
    }

    pub fn insertion_order_iter_rev(&self) -> Result<impl Iterator<Item = (&K, &V)>> {
        self.tree.insertion_order_iter_rev()
    }
}

impl<K: Ord + Clone, V: Clone> InsertionOrderedMap<K, V> {
    pub fn deep_copy(&self) -> Self {
        Self { tree: self.tree.deep_copy() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replace_and_lookup() {
        let mut map = OrderedMap::new();
        assert_eq!(map.insert("a", 1), None);
        assert_eq!(map.insert("a", 2), Some(1));
        assert_eq!(map.get(&"a"), Some(&2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn merge_last_writer_wins() {
        let mut a = OrderedMap::new();
        a.insert(1, "a1");
        a.insert(2, "a2");
        let mut b = OrderedMap::new();
        b.insert(2, "b2");
        b.insert(3, "b3");
        let merged = a.merge(&b);
        assert_eq!(merged.get(&1), Some(&"a1"));
        assert_eq!(merged.get(&2), Some(&"b2"));
        assert_eq!(merged.get(&3), Some(&"b3"));
    }

    #[test]
    fn insertion_order_preserved() {
        let mut map = InsertionOrderedMap::new();
        map.insert(5, "five");
        map.insert(1, "one");
        map.insert(9, "nine");
        let order: Vec<i32> = map.insertion_order_iter().unwrap().map(|(k, _)| *k).collect();
        assert_eq!(order, vec![5, 1, 9]);
    }
}
