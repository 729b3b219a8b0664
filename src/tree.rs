//! The tree façade (C4), built on top of the rebalance core (C2) and
//! search/rank helpers (C3). Owns the root and the arena; every mutation
//! flows through here.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use colored::Colorize;

use crate::arena::{Arena, Idx, SENTINEL};
use crate::error::{invariant_violation, Result, TreeError};
use crate::node::{Color, Direction, Node};

/// Result of an [`Tree::insert`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V> {
    Inserted,
    Replaced(V),
}

type Comparator<K> = dyn Fn(&K, &K) -> Ordering + Send + Sync;

/// A generic red-black tree: the engine behind the set/map façades in
/// [`crate::set`] and [`crate::map`].
///
/// `track_order` is fixed at construction (invariant: it never changes for
/// the lifetime of a tree). When set, every node also participates in a
/// doubly-linked insertion-order list (component C5); see `src/order.rs`.
pub struct Tree<K, V> {
    pub(crate) root: Idx,
    pub(crate) arena: Arena<Node<K, V>>,
    pub(crate) track_order: bool,
    pub(crate) order_head: Idx,
    pub(crate) order_tail: Idx,
    epoch: u64,
    // `Cell` rather than a plain `bool` so that `bug()` can poison the tree
    // from `&self` contexts (e.g. `child_dir`, `successor`) and not just
    // from the `&mut self` mutators — an invariant violation discovered
    // mid-read must still be recorded.
    poisoned: Cell<bool>,
    cmp: Arc<Comparator<K>>,
}

impl<K: Ord, V> Default for Tree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> Tree<K, V> {
    pub fn new() -> Self {
        Self::with_comparator(|a, b| a.cmp(b), false)
    }

    pub fn with_track_order(track_order: bool) -> Self {
        Self::with_comparator(|a, b| a.cmp(b), track_order)
    }
}

impl<K, V> Tree<K, V> {
    pub fn with_comparator(
        cmp: impl Fn(&K, &K) -> Ordering + Send + Sync + 'static,
        track_order: bool,
    ) -> Self {
        Tree {
            root: SENTINEL,
            arena: Arena::new(),
            track_order,
            order_head: SENTINEL,
            order_tail: SENTINEL,
            epoch: 0,
            poisoned: Cell::new(false),
            cmp: Arc::new(cmp),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    #[inline]
    pub fn track_order(&self) -> bool {
        self.track_order
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.get()
    }

    #[inline]
    pub(crate) fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.cmp.as_ref())(a, b)
    }

    #[inline]
    fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    /// Records an internal invariant violation and poisons the tree. Takes
    /// `&self`, not `&mut self`, so that read-only operations like
    /// `child_dir`/`successor` can poison on discovery without needing
    /// mutable access.
    #[inline]
    pub(crate) fn bug(&self, msg: &'static str) -> TreeError {
        self.poisoned.set(true);
        invariant_violation(msg)
    }

    // ---- C1/C3 low-level accessors -------------------------------------

    // These all dereference the arena via `Idx`s this tree itself produced
    // (from `find`, `node_at_index`, child/parent links already present in
    // the tree) and are hot-path enough to stay infallible in signature.
    // A `None` back from the arena can only mean internal corruption; we
    // poison and degrade to a safe sentinel-ish value (matching how
    // `SENTINEL` itself already reads as "absent"/black) rather than
    // panicking outside of the arena's own `debug_assert!`.

    #[inline(always)]
    fn get_left(&self, node: Idx) -> Idx {
        if node == SENTINEL {
            SENTINEL
        } else {
            match self.arena.get(node) {
                Some(n) => n.left,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    SENTINEL
                }
            }
        }
    }

    #[inline(always)]
    fn get_right(&self, node: Idx) -> Idx {
        if node == SENTINEL {
            SENTINEL
        } else {
            match self.arena.get(node) {
                Some(n) => n.right,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    SENTINEL
                }
            }
        }
    }

    #[inline(always)]
    fn get_child(&self, node: Idx, dir: Direction) -> Idx {
        if node == SENTINEL {
            SENTINEL
        } else {
            match self.arena.get(node) {
                Some(n) => n.child(dir),
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    SENTINEL
                }
            }
        }
    }

    #[inline(always)]
    fn get_parent(&self, node: Idx) -> Idx {
        if node == SENTINEL {
            SENTINEL
        } else {
            match self.arena.get(node) {
                Some(n) => n.parent,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    SENTINEL
                }
            }
        }
    }

    #[inline(always)]
    fn subtree_size(&self, node: Idx) -> u32 {
        if node == SENTINEL {
            0
        } else {
            match self.arena.get(node) {
                Some(n) => n.subtree_size,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    0
                }
            }
        }
    }

    #[inline(always)]
    fn is_red(&self, node: Idx) -> bool {
        if node == SENTINEL {
            return false;
        }
        match self.arena.get(node) {
            Some(n) => n.color == Color::Red,
            None => {
                self.bug("dereferencing a non-occupied arena slot");
                false
            }
        }
    }

    #[inline(always)]
    fn is_black(&self, node: Idx) -> bool {
        if node == SENTINEL {
            return true;
        }
        match self.arena.get(node) {
            Some(n) => n.color == Color::Black,
            None => {
                self.bug("dereferencing a non-occupied arena slot");
                true
            }
        }
    }

    #[inline(always)]
    fn color_red(&mut self, node: Idx) {
        if node != SENTINEL {
            match self.arena.get_mut(node) {
                Some(n) => n.color = Color::Red,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                }
            }
        }
    }

    #[inline(always)]
    fn color_black(&mut self, node: Idx) {
        if node != SENTINEL {
            match self.arena.get_mut(node) {
                Some(n) => n.color = Color::Black,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                }
            }
        }
    }

    #[inline(always)]
    fn color_of(&self, node: Idx) -> Color {
        match self.arena.get(node) {
            Some(n) => n.color,
            None => {
                self.bug("dereferencing a non-occupied arena slot");
                Color::Black
            }
        }
    }

    #[inline(always)]
    fn set_color(&mut self, node: Idx, color: Color) {
        if node != SENTINEL {
            match self.arena.get_mut(node) {
                Some(n) => n.color = color,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                }
            }
        }
    }

    /// Which child slot of `parent` holds `child` (invariant 6). Fails
    /// rather than panicking in release if the two are not actually linked
    /// or `parent` does not resolve to a live node.
    fn child_dir(&self, parent: Idx, child: Idx) -> Result<Direction> {
        let node = match self.arena.get(parent) {
            Some(n) => n,
            None => return Err(self.bug("dereferencing a non-occupied arena slot")),
        };
        if node.left == child {
            Ok(Direction::Left)
        } else if node.right == child {
            Ok(Direction::Right)
        } else {
            Err(self.bug("invariant 6 violated: child is not linked to parent"))
        }
    }

    /// Links `child` under `parent` in direction `dir` (and sets `child`'s
    /// parent back-link). Refuses to build a cyclic self-parent link (§4.1).
    fn connect(&mut self, parent: Idx, child: Idx, dir: Direction) -> Result<()> {
        if parent != SENTINEL && parent == child {
            return Err(self.bug("invariant violated: cannot link a node as its own parent"));
        }
        if parent != SENTINEL {
            match self.arena.get_mut(parent) {
                Some(n) => n.set_child(dir, child),
                None => return Err(self.bug("dereferencing a non-occupied arena slot")),
            }
        }
        if child != SENTINEL {
            match self.arena.get_mut(child) {
                Some(n) => n.parent = parent,
                None => return Err(self.bug("dereferencing a non-occupied arena slot")),
            }
        }
        Ok(())
    }

    /// Recomputes `subtree_size` from `node` upward to the root, stopping
    /// early once a recomputation produces no change (§4.2).
    fn recount(&mut self, mut node: Idx) {
        while node != SENTINEL {
            let new_size = 1 + self.subtree_size(self.get_left(node)) + self.subtree_size(self.get_right(node));
            match self.arena.get_mut(node) {
                Some(entry) => {
                    if entry.subtree_size == new_size {
                        break;
                    }
                    entry.subtree_size = new_size;
                }
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    break;
                }
            }
            node = self.get_parent(node);
        }
    }

    // ---- C3: search and rank --------------------------------------------

    pub fn find(&self, key: &K) -> Option<Idx> {
        let mut node = self.root;
        while node != SENTINEL {
            let entry = match self.arena.get(node) {
                Some(entry) => entry,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    return None;
                }
            };
            match self.compare(key, &entry.key) {
                Ordering::Less => node = entry.left,
                Ordering::Greater => node = entry.right,
                Ordering::Equal => return Some(node),
            }
        }
        None
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let idx = self.find(key)?;
        match self.arena.get(idx) {
            Some(n) => Some(&n.value),
            None => {
                self.bug("dereferencing a non-occupied arena slot");
                None
            }
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.find(key)?;
        match self.arena.get_mut(idx) {
            Some(n) => Some(&mut n.value),
            None => {
                self.bug("dereferencing a non-occupied arena slot");
                None
            }
        }
    }

    /// Looks up the key/value pair at `idx`. `idx` must be an index this
    /// tree itself produced (from `find`, `node_at_index`, or traversal); a
    /// `None` from the arena here is unreachable except through internal
    /// corruption, which there is no error channel to report back through a
    /// `(&K, &V)` return, so it degrades to the `debug_assert!` in
    /// `Arena::get` rather than adding one more fallible layer on top.
    pub fn get_key_value(&self, idx: Idx) -> (&K, &V) {
        let node = self.arena.get(idx).expect("get_key_value called with a stale or invalid index");
        (&node.key, &node.value)
    }

    /// Generalized descent driven by a caller-supplied three-way comparator.
    pub fn search_by<F>(&self, mut compare: F) -> Option<(&K, &V)>
    where
        F: FnMut(&K, &V) -> Ordering,
    {
        let mut idx = self.root;
        while idx != SENTINEL {
            let node = match self.arena.get(idx) {
                Some(node) => node,
                None => {
                    self.bug("dereferencing a non-occupied arena slot");
                    return None;
                }
            };
            match compare(&node.key, &node.value) {
                Ordering::Less => idx = node.left,
                Ordering::Greater => idx = node.right,
                Ordering::Equal => return Some((&node.key, &node.value)),
            }
        }
        None
    }

    pub fn node_at_index(&self, i: usize) -> Result<Idx> {
        if self.is_poisoned() {
            return Err(TreeError::InternalInvariantViolated("tree is poisoned"));
        }
        let size = self.size();
        if i >= size {
            return Err(TreeError::IndexOutOfRange { index: i, size });
        }
        let mut node = self.root;
        let mut remaining = i;
        loop {
            let left_size = self.subtree_size(self.get_left(node)) as usize;
            match remaining.cmp(&left_size) {
                Ordering::Less => node = self.get_left(node),
                Ordering::Equal => return Ok(node),
                Ordering::Greater => {
                    remaining -= left_size + 1;
                    node = self.get_right(node);
                }
            }
        }
    }

    pub fn index_of(&self, mut node: Idx) -> Result<usize> {
        let mut index = self.subtree_size(self.get_left(node)) as usize;
        while self.get_parent(node) != SENTINEL {
            let parent = self.get_parent(node);
            if self.child_dir(parent, node)? == Direction::Right {
                index += self.subtree_size(self.get_left(parent)) as usize + 1;
            }
            node = parent;
        }
        Ok(index)
    }

    pub fn first_idx(&self) -> Idx {
        self.find_min(self.root)
    }

    pub fn last_idx(&self) -> Idx {
        self.find_max(self.root)
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        let idx = self.first_idx();
        (idx != SENTINEL).then(|| self.get_key_value(idx))
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        let idx = self.last_idx();
        (idx != SENTINEL).then(|| self.get_key_value(idx))
    }

    fn find_min(&self, mut node: Idx) -> Idx {
        if node == SENTINEL {
            return SENTINEL;
        }
        while self.get_left(node) != SENTINEL {
            node = self.get_left(node);
        }
        node
    }

    fn find_max(&self, mut node: Idx) -> Idx {
        if node == SENTINEL {
            return SENTINEL;
        }
        while self.get_right(node) != SENTINEL {
            node = self.get_right(node);
        }
        node
    }

    pub fn successor(&self, node: Idx) -> Result<Idx> {
        if self.get_right(node) != SENTINEL {
            return Ok(self.find_min(self.get_right(node)));
        }
        let mut cur = node;
        let mut parent = self.get_parent(cur);
        while parent != SENTINEL && self.child_dir(parent, cur)? == Direction::Right {
            cur = parent;
            parent = self.get_parent(cur);
        }
        Ok(parent)
    }

    pub fn predecessor(&self, node: Idx) -> Result<Idx> {
        if self.get_left(node) != SENTINEL {
            return Ok(self.find_max(self.get_left(node)));
        }
        let mut cur = node;
        let mut parent = self.get_parent(cur);
        while parent != SENTINEL && self.child_dir(parent, cur)? == Direction::Left {
            cur = parent;
            parent = self.get_parent(cur);
        }
        Ok(parent)
    }

    // ---- C2: rebalance core ---------------------------------------------

    /// Rotates around `node` in `dir`: `Direction::Left` pulls `node`'s right
    /// child up (a classic left-rotation), `Direction::Right` pulls the left
    /// child up. Fails if the required child is absent.
    fn rotate(&mut self, node: Idx, dir: Direction) -> Result<Idx> {
        let grandparent = self.get_parent(node);
        let pivot = self.get_child(node, dir.opposite());
        if pivot == SENTINEL {
            return Err(self.bug("rotation requires a present pivot child"));
        }
        let moved = self.get_child(pivot, dir);
        self.connect(pivot, node, dir)?;
        self.connect(node, moved, dir.opposite())?;
        if grandparent != SENTINEL {
            let gp_dir = self.child_dir(grandparent, node)?;
            self.connect(grandparent, pivot, gp_dir)?;
        } else {
            match self.arena.get_mut(pivot) {
                Some(n) => n.parent = SENTINEL,
                None => return Err(self.bug("dereferencing a non-occupied arena slot")),
            }
            self.root = pivot;
        }
        let pivot_color = self.color_of(pivot);
        let node_color = self.color_of(node);
        self.set_color(pivot, node_color);
        self.set_color(node, pivot_color);
        self.recount(node);
        Ok(pivot)
    }

    fn fix_after_insert(&mut self, mut node: Idx) -> Result<()> {
        while self.is_red(self.get_parent(node)) {
            let mut parent = self.get_parent(node);
            let mut grandparent = self.get_parent(parent);
            if grandparent == SENTINEL {
                break;
            }
            let dir = self.child_dir(grandparent, parent)?;
            let uncle = self.get_child(grandparent, dir.opposite());
            if self.is_red(uncle) {
                self.color_black(uncle);
                self.color_black(parent);
                self.color_red(grandparent);
                node = grandparent;
            } else {
                if self.child_dir(parent, node)? == dir.opposite() {
                    self.rotate(parent, dir)?;
                    node = parent;
                }
                parent = self.get_parent(node);
                grandparent = self.get_parent(parent);
                self.color_black(parent);
                self.color_red(grandparent);
                self.rotate(grandparent, dir.opposite())?;
            }
        }
        self.color_black(self.root);
        Ok(())
    }

    /// Four-case double-black resolution (§4.8's state machine).
    fn fix_after_delete(&mut self, mut node: Idx, mut parent_hint: Option<(Idx, Direction)>) -> Result<()> {
        while node != self.root && self.is_black(node) {
            let (parent, dir) = if node != SENTINEL {
                let parent = self.get_parent(node);
                let dir = self.child_dir(parent, node)?;
                (parent, dir)
            } else {
                match parent_hint {
                    Some(pd) => pd,
                    None => return Err(self.bug("double-black hole with no parent reference")),
                }
            };
            let mut sibling = self.get_child(parent, dir.opposite());
            if sibling == SENTINEL {
                return Err(self.bug("double-black sibling missing: black-height invariant broken"));
            }
            if self.is_red(sibling) {
                self.color_black(sibling);
                self.color_red(parent);
                self.rotate(parent, dir)?;
                sibling = self.get_child(parent, dir.opposite());
            }
            let close_nephew = self.get_child(sibling, dir);
            let distant_nephew = self.get_child(sibling, dir.opposite());
            if self.is_black(close_nephew) && self.is_black(distant_nephew) {
                self.color_red(sibling);
                node = parent;
                parent_hint = None;
            } else {
                if self.is_black(distant_nephew) {
                    self.color_black(close_nephew);
                    self.color_red(sibling);
                    self.rotate(sibling, dir.opposite())?;
                    sibling = self.get_child(parent, dir.opposite());
                }
                let parent_color = self.color_of(parent);
                self.set_color(sibling, parent_color);
                self.color_black(parent);
                self.color_black(self.get_child(sibling, dir.opposite()));
                self.rotate(parent, dir)?;
                node = self.root;
                parent_hint = None;
            }
        }
        self.color_black(node);
        Ok(())
    }

    fn transplant(&mut self, target: Idx, source: Idx) -> Result<()> {
        let parent = self.get_parent(target);
        if parent == SENTINEL {
            self.root = source;
            if source != SENTINEL {
                match self.arena.get_mut(source) {
                    Some(n) => n.parent = SENTINEL,
                    None => return Err(self.bug("dereferencing a non-occupied arena slot")),
                }
            }
        } else {
            let dir = self.child_dir(parent, target)?;
            self.connect(parent, source, dir)?;
        }
        Ok(())
    }

    // ---- C4: tree façade --------------------------------------------------

    /// Inserts `element`, replacing the payload in place if the key already
    /// exists (position in both orderings is unchanged on replace).
    pub fn insert(&mut self, key: K, value: V) -> Outcome<V> {
        self.bump_epoch();
        if self.root == SENTINEL {
            let idx = self.arena.add(Node::new(key, value));
            self.color_black(idx);
            self.root = idx;
            self.order_append(idx);
            return Outcome::Inserted;
        }
        let mut cur = self.root;
        loop {
            let cur_key = &self.arena.get(cur).expect("cur is always a live node reached by descending from the root").key;
            let ord = self.compare(&key, cur_key);
            match ord {
                Ordering::Equal => {
                    let slot = &mut self.arena.get_mut(cur).expect("cur is always a live node reached by descending from the root").value;
                    let prev = std::mem::replace(slot, value);
                    return Outcome::Replaced(prev);
                }
                Ordering::Less | Ordering::Greater => {
                    let dir = if ord == Ordering::Less { Direction::Left } else { Direction::Right };
                    let child = self.get_child(cur, dir);
                    if child == SENTINEL {
                        let idx = self.arena.add(Node::new(key, value));
                        self.connect(cur, idx, dir).ok();
                        self.recount(idx);
                        self.fix_after_insert(idx).ok();
                        self.order_append(idx);
                        return Outcome::Inserted;
                    }
                    cur = child;
                }
            }
        }
    }

    /// Removes the node holding `key`, if present.
    pub fn remove_by_key(&mut self, key: &K) -> Option<V> {
        let node = self.find(key)?;
        Some(self.remove_node(node).1)
    }

    /// Removes the element at in-order position `i`.
    pub fn remove_by_index(&mut self, i: usize) -> Result<(K, V)> {
        let node = self.node_at_index(i)?;
        Ok(self.remove_node(node))
    }

    /// Physically removes `node` (whichever node ends up freed — see
    /// DESIGN.md's node-identity-swap decision) and returns its payload.
    fn remove_node(&mut self, node: Idx) -> (K, V) {
        self.bump_epoch();
        self.order_unlink(node);

        let left = self.get_left(node);
        let right = self.get_right(node);

        let (pivot, parent_hint, removed_was_black) = if left == SENTINEL {
            let was_black = self.is_black(node);
            self.transplant(node, right).ok();
            let recount_from = self.get_parent(node);
            (right, recount_from, was_black)
        } else if right == SENTINEL {
            let was_black = self.is_black(node);
            self.transplant(node, left).ok();
            let recount_from = self.get_parent(node);
            (left, recount_from, was_black)
        } else {
            // Node-identity swap: splice the in-order successor into
            // `node`'s tree position instead of copying its payload.
            let successor = self.find_min(right);
            let successor_was_black = self.is_black(successor);
            let successor_right = self.get_right(successor);

            let recount_from = if self.get_parent(successor) == node {
                successor
            } else {
                let successor_parent = self.get_parent(successor);
                self.transplant(successor, successor_right).ok();
                self.connect(successor, right, Direction::Right).ok();
                successor_parent
            };

            self.transplant(node, successor).ok();
            self.connect(successor, left, Direction::Left).ok();
            self.set_color(successor, self.color_of(node));

            (successor_right, recount_from, successor_was_black)
        };

        self.recount(parent_hint);

        let removed = self.arena.remove(node).expect("node being removed was just located by this method's own caller");

        if removed_was_black {
            let hint = if pivot == SENTINEL {
                Some((parent_hint, self.hole_direction(parent_hint, pivot)))
            } else {
                None
            };
            self.fix_after_delete(pivot, hint).ok();
        }

        (removed.key, removed.value)
    }

    /// Helper used when the hole left by a removal is itself `SENTINEL`: we
    /// cannot ask `SENTINEL` which child slot it occupies, so we must have
    /// already recorded which side of `parent` it is.
    fn hole_direction(&self, parent: Idx, pivot: Idx) -> Direction {
        debug_assert_eq!(pivot, SENTINEL);
        if parent == SENTINEL {
            // Tree became empty; direction is irrelevant, fix_after_delete's
            // loop condition (`node == self.root`) exits immediately.
            Direction::Left
        } else if self.get_left(parent) == SENTINEL {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    pub fn clear(&mut self) {
        self.bump_epoch();
        self.root = SENTINEL;
        self.order_head = SENTINEL;
        self.order_tail = SENTINEL;
        self.arena.clear();
        self.poisoned.set(false);
    }
}

/// A plain, arena-free recursive copy of one node and its subtrees, built up
/// before any destination arena exists. Keeping this step separate from the
/// flatten-into-arena step means the concurrent phase of `deep_copy_parallel`
/// never touches a shared arena.
struct ClonedNode<K, V> {
    old_idx: Idx,
    key: K,
    value: V,
    color: Color,
    left: Option<Box<ClonedNode<K, V>>>,
    right: Option<Box<ClonedNode<K, V>>>,
}

impl<K: Ord + Clone, V: Clone> Tree<K, V> {
    fn clone_subtree(&self, idx: Idx) -> Option<Box<ClonedNode<K, V>>> {
        if idx == SENTINEL {
            return None;
        }
        let entry = self.arena.get(idx).expect("idx came from this tree's own left/right links");
        Some(Box::new(ClonedNode {
            old_idx: idx,
            key: entry.key.clone(),
            value: entry.value.clone(),
            color: entry.color,
            left: self.clone_subtree(entry.left),
            right: self.clone_subtree(entry.right),
        }))
    }

    fn flatten(dest: &mut Tree<K, V>, node: Option<Box<ClonedNode<K, V>>>, parent: Idx, map: &mut HashMap<Idx, Idx>) -> Idx {
        let node = match node {
            Some(node) => node,
            None => return SENTINEL,
        };
        let idx = dest.arena.add(Node::new(node.key, node.value));
        map.insert(node.old_idx, idx);
        let left = Self::flatten(dest, node.left, idx, map);
        let right = Self::flatten(dest, node.right, idx, map);
        let entry = dest.arena.get_mut(idx).expect("idx was just returned by dest.arena.add above");
        entry.color = node.color;
        entry.parent = parent;
        entry.left = left;
        entry.right = right;
        entry.subtree_size = 1 + dest.subtree_size(left) + dest.subtree_size(right);
        idx
    }

    fn finish_deep_copy(&self, cloned_root: Option<Box<ClonedNode<K, V>>>) -> Self {
        let mut dest = Tree {
            root: SENTINEL,
            arena: Arena::new(),
            track_order: self.track_order,
            order_head: SENTINEL,
            order_tail: SENTINEL,
            epoch: 0,
            poisoned: Cell::new(false),
            cmp: Arc::clone(&self.cmp),
        };
        let mut map = HashMap::with_capacity(self.size());
        dest.root = Self::flatten(&mut dest, cloned_root, SENTINEL, &mut map);
        if self.track_order {
            let mut cur = self.order_head;
            while cur != SENTINEL {
                if let Some(&new_idx) = map.get(&cur) {
                    dest.order_append(new_idx);
                }
                cur = self.order_next(cur);
            }
        }
        dest
    }

    /// Produces an independent copy: a disjoint arena, rebuilt parent/child
    /// links and subtree sizes, and (if this tree tracks order) a
    /// reconstructed order list in the same relative sequence.
    pub fn deep_copy(&self) -> Self {
        let cloned_root = self.clone_subtree(self.root);
        self.finish_deep_copy(cloned_root)
    }
}

impl<K: Ord + Clone + Send + Sync, V: Clone + Send + Sync> Tree<K, V> {
    fn clone_subtree_parallel(&self, idx: Idx, threshold: usize) -> Option<Box<ClonedNode<K, V>>> {
        if idx == SENTINEL {
            return None;
        }
        let entry = self.arena.get(idx).expect("idx came from this tree's own left/right links");
        let size = entry.subtree_size as usize;
        let (left_idx, right_idx) = (entry.left, entry.right);
        let key = entry.key.clone();
        let value = entry.value.clone();
        let color = entry.color;
        let (left, right) = if size >= threshold {
            std::thread::scope(|scope| {
                let left_handle = scope.spawn(|| self.clone_subtree_parallel(left_idx, threshold));
                let right = self.clone_subtree_parallel(right_idx, threshold);
                let left = left_handle.join().expect("clone worker thread panicked");
                (left, right)
            })
        } else {
            (
                self.clone_subtree_parallel(left_idx, threshold),
                self.clone_subtree_parallel(right_idx, threshold),
            )
        };
        Some(Box::new(ClonedNode { old_idx: idx, key, value, color, left, right }))
    }

    /// Same contract as [`Tree::deep_copy`], but subtrees at or above
    /// `threshold` live nodes are cloned on separate scoped threads. Purely
    /// a performance refinement: the destination arena is only ever touched
    /// single-threaded, after every thread has rejoined.
    pub fn deep_copy_parallel(&self, threshold: usize) -> Self {
        let cloned_root = self.clone_subtree_parallel(self.root, threshold);
        self.finish_deep_copy(cloned_root)
    }
}

impl<K: Ord, V: PartialEq> PartialEq for Tree<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<K: Ord + Eq, V: Eq> Eq for Tree<K, V> {}

impl<K: Ord + Hash, V: Hash> Hash for Tree<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size().hash(state);
        for (k, v) in self.iter() {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl<K, V> Tree<K, V> {
    // ---- diagnostics ------------------------------------------------------

    /// Checks invariants 1-5 from an in-order walk. Intended for tests and
    /// interactive debugging, not the hot path.
    pub fn is_valid(&self) -> bool
    where
        K: Ord,
    {
        if self.is_red(self.root) {
            return false;
        }
        let mut stack = vec![(self.root, 0u32)];
        let mut black_heights = vec![];
        while let Some((node, count)) = stack.pop() {
            if node == SENTINEL {
                black_heights.push(count);
                continue;
            }
            let count = count + self.is_black(node) as u32;
            if self.is_red(node) && (self.is_red(self.get_left(node)) || self.is_red(self.get_right(node))) {
                return false;
            }
            let expected = 1 + self.subtree_size(self.get_left(node)) + self.subtree_size(self.get_right(node));
            let actual = match self.arena.get(node) {
                Some(entry) => entry.subtree_size,
                None => return false,
            };
            if actual != expected {
                return false;
            }
            stack.push((self.get_left(node), count));
            stack.push((self.get_right(node), count));
        }
        if !black_heights.iter().all(|&h| h == black_heights[0]) {
            return false;
        }
        let mut prev: Option<&K> = None;
        let mut node = self.first_idx();
        let mut visited = 0usize;
        while node != SENTINEL {
            let key = match self.arena.get(node) {
                Some(entry) => &entry.key,
                None => return false,
            };
            if let Some(p) = prev {
                if self.compare(p, key) != Ordering::Less {
                    return false;
                }
            }
            prev = Some(key);
            visited += 1;
            node = match self.successor(node) {
                Ok(next) => next,
                Err(_) => return false,
            };
        }
        visited == self.size()
    }

    pub fn pretty_print(&self) -> String
    where
        K: Debug,
    {
        let mut out = String::new();
        let mut stack = vec![(self.root, String::new(), String::new())];
        while let Some((node, padding, pointer)) = stack.pop() {
            if node == SENTINEL {
                continue;
            }
            let entry = self.arena.get(node).expect("node came from this tree's own left/right links");
            out.push_str(&padding);
            out.push_str(&pointer);
            let label = format!("{:?} (size={})", entry.key, entry.subtree_size);
            if self.is_red(node) {
                out.push_str(&label.red().to_string());
            } else {
                out.push_str(&label);
            }
            out.push('\n');
            let mut child_padding = padding;
            child_padding.push_str("|  ");
            let right_pointer = "`--".to_string();
            let left_pointer = if self.get_right(node) != SENTINEL { "|--".to_string() } else { "`--".to_string() };
            stack.push((self.get_right(node), child_padding.clone(), right_pointer));
            stack.push((self.get_left(node), child_padding, left_pointer));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_basic_keeps_invariants() {
        let mut tree: Tree<i32, i32> = Tree::new();
        for k in [5, 3, 8, 1, 4, 7, 9, 2, 6] {
            tree.insert(k, k);
            assert!(tree.is_valid());
        }
        assert_eq!(tree.size(), 9);
        let in_order: Vec<i32> = {
            let mut v = vec![];
            let mut n = tree.first_idx();
            while n != SENTINEL {
                v.push(*tree.get_key_value(n).0);
                n = tree.successor(n).unwrap();
            }
            v
        };
        assert_eq!(in_order, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(*tree.get_key_value(tree.node_at_index(0).unwrap()).0, 1);
        assert_eq!(*tree.get_key_value(tree.node_at_index(8).unwrap()).0, 9);
        let six = tree.find(&6).unwrap();
        assert_eq!(tree.index_of(six).unwrap(), 5);
    }

    #[test]
    fn remove_scenario_b() {
        let mut tree: Tree<i32, i32> = Tree::new();
        for k in [5, 3, 8, 1, 4, 7, 9, 2, 6] {
            tree.insert(k, k);
        }
        assert_eq!(tree.remove_by_key(&5), Some(5));
        assert!(tree.is_valid());
        assert_eq!(tree.size(), 8);
    }

    #[test]
    fn replace_does_not_change_size() {
        let mut tree: Tree<i32, i32> = Tree::new();
        assert_eq!(tree.insert(1, 10), Outcome::Inserted);
        assert_eq!(tree.insert(1, 20), Outcome::Replaced(10));
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.get(&1), Some(&20));
    }

    #[test]
    fn remove_absent_key_is_noop() {
        let mut tree: Tree<i32, i32> = Tree::new();
        tree.insert(1, 1);
        let epoch_before = tree.epoch();
        assert_eq!(tree.remove_by_key(&99), None);
        assert_eq!(tree.epoch(), epoch_before);
    }

    #[test]
    fn index_out_of_range() {
        let mut tree: Tree<i32, i32> = Tree::new();
        tree.insert(1, 1);
        assert_eq!(
            tree.node_at_index(5),
            Err(TreeError::IndexOutOfRange { index: 5, size: 1 })
        );
    }

    #[test]
    fn remove_by_index_matches_sorted_position() {
        let mut tree: Tree<i32, &str> = Tree::new();
        for k in [5, 3, 8, 1, 9] {
            tree.insert(k, "v");
        }
        // sorted: 1, 3, 5, 8, 9 -- index 2 is key 5
        let (key, _) = tree.remove_by_index(2).unwrap();
        assert_eq!(key, 5);
        assert!(tree.is_valid());
        assert_eq!(tree.size(), 4);
        assert!(!tree.contains(&5));
    }

    #[test]
    fn round_trip_shuffled_insert_and_remove() {
        use rand::seq::SliceRandom;
        let mut rng = rand::thread_rng();
        let mut keys: Vec<i32> = (0..500).collect();
        keys.shuffle(&mut rng);
        let mut tree: Tree<i32, i32> = Tree::new();
        for &k in &keys {
            tree.insert(k, k);
            assert!(tree.is_valid());
        }
        let mut removal_order = keys.clone();
        removal_order.shuffle(&mut rng);
        for &k in &removal_order {
            assert_eq!(tree.remove_by_key(&k), Some(k));
            assert!(tree.is_valid());
        }
        assert!(tree.is_empty());
    }
}
