//! Augmented interval tree over block boxes.
//!
//! The tree is a plain binary search tree ordered on the X span of each box
//! (ties broken by the Z span). Every node caches the smallest `min.x` and the
//! largest `max.x` found in its subtree, which lets overlap queries skip whole
//! subtrees that cannot reach the query along X.
//!
//! The tree never rebalances. Inserts always land in a leaf and deletes splice
//! subtrees back together without rotations, so a pathological insert order
//! degrades queries to O(n). Every walk uses an explicit stack or owned path,
//! so such a tree is slow but never exhausts the call stack.

use std::{cmp::Ordering, fmt};

use claimguard_core::{BlockBox, Border};

type Link<T> = Option<Box<Node<T>>>;

struct Node<T> {
    bounds: BlockBox,
    payload: T,
    subtree_min_x: i32,
    subtree_max_x: i32,
    left: Link<T>,
    right: Link<T>,
}

impl<T> Node<T> {
    fn leaf(bounds: BlockBox, payload: T) -> Box<Self> {
        Box::new(Self {
            bounds,
            payload,
            subtree_min_x: bounds.min().x,
            subtree_max_x: bounds.max().x,
            left: None,
            right: None,
        })
    }

    fn widen(&mut self, min_x: i32, max_x: i32) {
        self.subtree_min_x = self.subtree_min_x.min(min_x);
        self.subtree_max_x = self.subtree_max_x.max(max_x);
    }

    /// X extent implied by this node's own box and its children's caches.
    fn local_extent(&self) -> (i32, i32) {
        let mut extent = (self.bounds.min().x, self.bounds.max().x);
        for child in [&self.left, &self.right].into_iter().flatten() {
            extent.0 = extent.0.min(child.subtree_min_x);
            extent.1 = extent.1.max(child.subtree_max_x);
        }
        extent
    }

    /// Recompute the cached X extent from this node and its direct children.
    fn refresh(&mut self) {
        (self.subtree_min_x, self.subtree_max_x) = self.local_extent();
    }

    fn child_mut(&mut self, side: Side) -> &mut Link<T> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// One step of an owned descent in [`IntervalTree::splice_along`].
enum Step {
    Descend(Side),
    Unlink,
}

/// Search order of the tree: `(min.x, max.x)`, then `(min.z, max.z)`.
///
/// This only gives the tree a deterministic total order. Y plays no part, so
/// boxes stacked vertically compare equal; equal keys descend to the right.
fn key_order(a: &BlockBox, b: &BlockBox) -> Ordering {
    (a.min().x, a.max().x)
        .cmp(&(b.min().x, b.max().x))
        .then_with(|| (a.min().z, a.max().z).cmp(&(b.min().z, b.max().z)))
}

fn side_for(bounds: &BlockBox, node: &BlockBox) -> Side {
    if key_order(bounds, node) == Ordering::Less {
        Side::Left
    } else {
        Side::Right
    }
}

/// Unbalanced augmented interval tree mapping boxes to payloads.
pub struct IntervalTree<T> {
    root: Link<T>,
    len: usize,
}

impl<T> Default for IntervalTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for IntervalTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T> Drop for IntervalTree<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> IntervalTree<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Number of stored boxes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the tree holds no boxes.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        // Detach children before each node drops so no drop recurses.
        let mut pending: Vec<Box<Node<T>>> = self.root.take().into_iter().collect();
        while let Some(mut node) = pending.pop() {
            pending.extend(node.left.take());
            pending.extend(node.right.take());
        }
        self.len = 0;
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(&Node<T>, usize)> = self.root.iter().map(|n| (&**n, 1)).collect();
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            for child in [&node.left, &node.right].into_iter().flatten() {
                stack.push((&**child, level + 1));
            }
        }
        deepest
    }

    /// Insert a box as a new leaf, widening the X extent of every ancestor.
    pub fn insert(&mut self, bounds: BlockBox, payload: T) {
        Self::graft(&mut self.root, Node::leaf(bounds, payload));
        self.len += 1;
    }

    /// Hang `subtree` at the empty slot its root sorts into.
    ///
    /// Used for single leaves and for whole subtrees during deletion; the
    /// subtree's cached extent is folded into every node on the way down.
    fn graft(mut link: &mut Link<T>, subtree: Box<Node<T>>) {
        while let Some(node) = link {
            node.widen(subtree.subtree_min_x, subtree.subtree_max_x);
            let side = side_for(&subtree.bounds, &node.bounds);
            link = node.child_mut(side);
        }
        *link = Some(subtree);
    }

    /// Detach the node stored in `link` and splice its children back in.
    ///
    /// With two children the right subtree is grafted wholesale into the left
    /// one, which then takes the removed node's place. Every key on the right
    /// sorts after every key on the left, so the graft lands on the right spine.
    fn unlink(link: &mut Link<T>) -> Option<(BlockBox, T)> {
        let mut node = link.take()?;
        let left = node.left.take();
        let right = node.right.take();
        *link = match (left, right) {
            (None, None) => None,
            (Some(child), None) | (None, Some(child)) => Some(child),
            (Some(left), Some(right)) => {
                let mut merged = Some(left);
                Self::graft(&mut merged, right);
                merged
            }
        };
        let Node { bounds, payload, .. } = *node;
        Some((bounds, payload))
    }

    /// Walk down from `link` taking each node on the path into an owned stack,
    /// unlink the node `step` picks, then reattach the path bottom-up with
    /// refreshed extents.
    fn splice_along<F>(link: &mut Link<T>, mut step: F) -> Option<(BlockBox, T)>
    where
        F: FnMut(&Node<T>) -> Step,
    {
        let mut path: Vec<(Box<Node<T>>, Side)> = Vec::new();
        let mut current = link.take();
        let removed = loop {
            let Some(mut node) = current.take() else {
                break None;
            };
            match step(node.as_ref()) {
                Step::Unlink => {
                    let mut slot = Some(node);
                    let hit = Self::unlink(&mut slot);
                    current = slot;
                    break hit;
                }
                Step::Descend(side) => {
                    current = node.child_mut(side).take();
                    path.push((node, side));
                }
            }
        };
        while let Some((mut parent, side)) = path.pop() {
            *parent.child_mut(side) = current;
            if removed.is_some() {
                parent.refresh();
            }
            current = Some(parent);
        }
        *link = current;
        removed
    }

    /// Remove the first node with exactly these bounds whose payload passes
    /// `accept`, following the search order.
    fn remove_exact<F>(
        link: &mut Link<T>,
        bounds: &BlockBox,
        mut accept: F,
    ) -> Option<(BlockBox, T)>
    where
        F: FnMut(&T) -> bool,
    {
        Self::splice_along(link, |node| {
            if node.bounds == *bounds && accept(&node.payload) {
                Step::Unlink
            } else {
                Step::Descend(side_for(bounds, &node.bounds))
            }
        })
    }

    /// Path from the root to the first node matching `predicate` in pre-order.
    fn find_path<F>(&self, predicate: &mut F) -> Option<Vec<Side>>
    where
        F: FnMut(&BlockBox, &T) -> bool,
    {
        // Each entry carries the length of its parent's path.
        let mut stack: Vec<(&Node<T>, usize, Option<Side>)> =
            self.root.iter().map(|n| (&**n, 0, None)).collect();
        let mut trail = Vec::new();
        while let Some((node, parent_len, side)) = stack.pop() {
            trail.truncate(parent_len);
            trail.extend(side);
            if predicate(&node.bounds, &node.payload) {
                return Some(trail);
            }
            let len = trail.len();
            if let Some(right) = &node.right {
                stack.push((&**right, len, Some(Side::Right)));
            }
            if let Some(left) = &node.left {
                stack.push((&**left, len, Some(Side::Left)));
            }
        }
        None
    }

    /// Delete the first node whose bounds equal `bounds` exactly.
    pub fn remove(&mut self, bounds: &BlockBox) -> Option<T> {
        let (_, payload) = Self::remove_exact(&mut self.root, bounds, |_| true)?;
        self.len -= 1;
        Some(payload)
    }

    /// Delete the first node matching `predicate`, searching depth-first
    /// (node, then left subtree, then right subtree).
    pub fn remove_first_where<F>(&mut self, mut predicate: F) -> Option<(BlockBox, T)>
    where
        F: FnMut(&BlockBox, &T) -> bool,
    {
        let mut turns = self.find_path(&mut predicate)?.into_iter();
        let removed = Self::splice_along(&mut self.root, |_| match turns.next() {
            Some(side) => Step::Descend(side),
            None => Step::Unlink,
        })?;
        self.len -= 1;
        Some(removed)
    }

    /// Delete every node matching `predicate`, one search per removal.
    ///
    /// O(n * depth); meant for rare bulk cleanups such as wiping a player.
    pub fn remove_all_where<F>(&mut self, mut predicate: F) -> Vec<(BlockBox, T)>
    where
        F: FnMut(&BlockBox, &T) -> bool,
    {
        let mut removed = Vec::new();
        while let Some(hit) = self.remove_first_where(&mut predicate) {
            removed.push(hit);
        }
        removed
    }

    fn collect<'a>(
        &'a self,
        query: &BlockBox,
        border: Border,
        first_only: bool,
        out: &mut Vec<(&'a BlockBox, &'a T)>,
    ) {
        let mut stack: Vec<&'a Node<T>> = Vec::new();
        let mut link = &self.root;
        loop {
            // A subtree whose X extent misses the query is skipped whole. For a
            // left child that is exactly `left.subtree_max_x < query.min.x`.
            while let Some(node) = link {
                if query.min().x > node.subtree_max_x || query.max().x < node.subtree_min_x {
                    break;
                }
                stack.push(&**node);
                link = &node.left;
            }
            let Some(node) = stack.pop() else {
                return;
            };
            // A box always overlaps itself, even a one-block box under open intervals.
            if node.bounds == *query || node.bounds.overlaps(query, border) {
                out.push((&node.bounds, &node.payload));
                if first_only {
                    return;
                }
            }
            link = &node.right;
        }
    }

    /// Overlap query with both toggles exposed.
    ///
    /// `first_only` stops at the first hit (in-order); `include_border`
    /// selects closed or open interval semantics.
    pub fn query(
        &self,
        query: &BlockBox,
        first_only: bool,
        include_border: bool,
    ) -> Vec<(&BlockBox, &T)> {
        let mut out = Vec::new();
        self.collect(query, Border::from_include(include_border), first_only, &mut out);
        out
    }

    /// Every stored box overlapping `query`, in search order.
    pub fn overlapping(&self, query: &BlockBox, border: Border) -> Vec<(&BlockBox, &T)> {
        let mut out = Vec::new();
        self.collect(query, border, false, &mut out);
        out
    }

    /// First stored box overlapping `query`, in search order.
    pub fn first_overlapping(&self, query: &BlockBox, border: Border) -> Option<(&BlockBox, &T)> {
        let mut out = Vec::with_capacity(1);
        self.collect(query, border, true, &mut out);
        out.pop()
    }

    /// In-order iterator over `(bounds, payload)` pairs.
    pub fn iter(&self) -> Iter<'_, T> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(&self.root);
        iter
    }

    /// Pre-order iterator (node, left subtree, right subtree).
    ///
    /// Inserting the yielded boxes into an empty tree in this order rebuilds
    /// the same shape.
    pub fn pre_order(&self) -> PreOrder<'_, T> {
        PreOrder {
            stack: self.root.iter().map(|node| &**node).collect(),
        }
    }

    /// Check the ordering and cached-extent invariants of every node.
    ///
    /// Each cache is compared against the node's own box and its children's
    /// caches; holding that at every node makes every cache exact. Returns a
    /// description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let mut stack: Vec<&Node<T>> = self.root.iter().map(|n| &**n).collect();
        let mut counted = 0;
        while let Some(node) = stack.pop() {
            counted += 1;
            if let Some(left) = &node.left {
                if key_order(&left.bounds, &node.bounds) != Ordering::Less {
                    return Err(format!(
                        "left child {} does not sort before {}",
                        left.bounds, node.bounds
                    ));
                }
            }
            if let Some(right) = &node.right {
                if key_order(&right.bounds, &node.bounds) == Ordering::Less {
                    return Err(format!(
                        "right child {} sorts before {}",
                        right.bounds, node.bounds
                    ));
                }
            }
            let (min_x, max_x) = node.local_extent();
            if (min_x, max_x) != (node.subtree_min_x, node.subtree_max_x) {
                return Err(format!(
                    "node {} caches x extent {}..{} but subtree spans {}..{}",
                    node.bounds, node.subtree_min_x, node.subtree_max_x, min_x, max_x
                ));
            }
            stack.extend([&node.left, &node.right].into_iter().flatten().map(|n| &**n));
        }
        if counted != self.len {
            return Err(format!("len is {} but {} nodes are reachable", self.len, counted));
        }
        Ok(())
    }
}

impl<T: PartialEq> IntervalTree<T> {
    /// Delete the node with exactly these bounds carrying `payload`.
    pub fn remove_entry(&mut self, bounds: &BlockBox, payload: &T) -> bool {
        let removed = Self::remove_exact(&mut self.root, bounds, |candidate| candidate == payload);
        if removed.is_some() {
            self.len -= 1;
        }
        removed.is_some()
    }
}

impl<T: Clone + PartialEq> IntervalTree<T> {
    /// Delete every node overlapping `query` whose payload passes `predicate`.
    ///
    /// Matches are collected first and then removed one exact delete at a time.
    pub fn remove_overlapping_where<F>(
        &mut self,
        query: &BlockBox,
        border: Border,
        mut predicate: F,
    ) -> Vec<(BlockBox, T)>
    where
        F: FnMut(&T) -> bool,
    {
        let doomed: Vec<(BlockBox, T)> = self
            .overlapping(query, border)
            .into_iter()
            .filter(|(_, payload)| predicate(payload))
            .map(|(bounds, payload)| (*bounds, payload.clone()))
            .collect();
        doomed
            .into_iter()
            .filter(|(bounds, payload)| self.remove_entry(bounds, payload))
            .collect()
    }
}

impl<'a, T> IntoIterator for &'a IntervalTree<T> {
    type Item = (&'a BlockBox, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over an [`IntervalTree`].
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T> Iter<'a, T> {
    fn push_left(&mut self, mut link: &'a Link<T>) {
        while let Some(node) = link {
            self.stack.push(&**node);
            link = &node.left;
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a BlockBox, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(&node.right);
        Some((&node.bounds, &node.payload))
    }
}

/// Pre-order iterator over an [`IntervalTree`].
pub struct PreOrder<'a, T> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T> Iterator for PreOrder<'a, T> {
    type Item = (&'a BlockBox, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Right first so the left subtree is yielded first.
        for child in [&node.right, &node.left].into_iter().flatten() {
            self.stack.push(&**child);
        }
        Some((&node.bounds, &node.payload))
    }
}
