//! Single-writer/many-reader wrapper (C7) around a [`Tree`].
//!
//! The teacher's crate has no concurrency story of its own (a zero-copy
//! on-chain structure has no threads); this is grounded instead on
//! `pragmatrix-massive`'s use of `parking_lot::RwLock` for shared mutable
//! state elsewhere in the example pack.
//!
//! Rather than a hand-rolled reentrant lock, critical sections are
//! closure-scoped: `read`/`write` take an `FnOnce` and hold the guard only
//! for its duration. A "bulk merge" acquires `write` once and calls the
//! unwrapped `Tree`'s point operations (which never lock) from inside that
//! single closure, so nothing ever needs to re-enter the lock.

use parking_lot::RwLock;

use crate::tree::Tree;

pub struct ConcurrentTree<K, V> {
    inner: RwLock<Tree<K, V>>,
}

impl<K: Ord, V> ConcurrentTree<K, V> {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Tree::new()) }
    }

    pub fn with_track_order(track_order: bool) -> Self {
        Self { inner: RwLock::new(Tree::with_track_order(track_order)) }
    }
}

impl<K: Ord, V> Default for ConcurrentTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ConcurrentTree<K, V> {
    /// Runs `f` under a shared read lock. Any number of readers may run
    /// concurrently, but never alongside a writer.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Tree<K, V>) -> R,
    {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Runs `f` under an exclusive write lock. Use this for a sequence of
    /// point operations that must observe each other atomically (a "bulk
    /// merge") by calling `Tree`'s own methods on the `&mut Tree` passed in.
    pub fn write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Tree<K, V>) -> R,
    {
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    pub fn size(&self) -> usize {
        self.read(|t| t.size())
    }

    pub fn is_empty(&self) -> bool {
        self.read(|t| t.is_empty())
    }
}

impl<K: Ord, V: Clone> ConcurrentTree<K, V> {
    pub fn get_cloned(&self, key: &K) -> Option<V> {
        self.read(|t| t.get(key).cloned())
    }
}

impl<K: Ord, V> ConcurrentTree<K, V> {
    pub fn insert(&self, key: K, value: V) -> crate::tree::Outcome<V> {
        self.write(|t| t.insert(key, value))
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.write(|t| t.remove_by_key(key))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.read(|t| t.contains(key))
    }
}
