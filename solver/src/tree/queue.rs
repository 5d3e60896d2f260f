//! The priority queue of open leaf nodes.
//!
//! A binary heap whose ordering is delegated to the active node selector's
//! compare function (ties broken by node insertion index). The queue also
//! tracks the minimal lower bound over its nodes: directly at the root slot
//! when the selector orders by lowest bound, otherwise through a lazily
//! revalidated cache; and the sum of lower bounds for diagnostics.

use crate::core::{num, NodeId, Real, INF};
use crate::plugins::nodesel::NodeSelector;
use crate::tree::Tree;
use std::cmp::Ordering;

struct MinBoundCache {
    value: Real,
    valid: bool,
}

pub struct NodeQueue {
    slots: Vec<NodeId>,
    sum_lower: Real,
    min_cache: MinBoundCache,
    /// Fast path: the selector's primary key is the local lower bound, so the
    /// root slot is the minimum.
    lowest_bound_order: bool,
}

impl NodeQueue {
    pub fn new() -> Self {
        NodeQueue {
            slots: Vec::new(),
            sum_lower: 0.0,
            min_cache: MinBoundCache {
                value: INF,
                valid: true,
            },
            lowest_bound_order: false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[NodeId] {
        &self.slots
    }

    /// Sum of the lower bounds of all queued nodes.
    pub fn sum_lower(&self) -> Real {
        self.sum_lower
    }

    fn better(&self, tree: &Tree, sel: &dyn NodeSelector, a: NodeId, b: NodeId) -> bool {
        match sel.compare(tree, a, b) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => tree.node(a).seq < tree.node(b).seq,
        }
    }

    pub fn insert(&mut self, tree: &Tree, sel: &dyn NodeSelector, node: NodeId) {
        let lower = tree.node(node).lower;
        self.sum_lower += lower;
        if self.min_cache.valid && lower < self.min_cache.value {
            self.min_cache.value = lower;
        }
        self.slots.push(node);
        self.sift_up(tree, sel, self.slots.len() - 1);
    }

    /// Pops the best node per the current selector; O(log n).
    pub fn pop_best(&mut self, tree: &Tree, sel: &dyn NodeSelector) -> Option<NodeId> {
        if self.slots.is_empty() {
            return None;
        }
        let best = self.slots.swap_remove(0);
        if !self.slots.is_empty() {
            self.sift_down(tree, sel, 0);
        }
        let lower = tree.node(best).lower;
        self.sum_lower -= lower;
        if num::le(lower, self.min_cache.value) {
            self.min_cache.valid = false;
        }
        if self.slots.is_empty() {
            self.sum_lower = 0.0;
            self.min_cache = MinBoundCache {
                value: INF,
                valid: true,
            };
        }
        Some(best)
    }

    /// Removes an arbitrary node; located by linear scan (removal is rare).
    pub fn remove(&mut self, tree: &Tree, sel: &dyn NodeSelector, node: NodeId) -> bool {
        let Some(pos) = self.slots.iter().position(|&n| n == node) else {
            return false;
        };
        self.slots.swap_remove(pos);
        if pos < self.slots.len() {
            self.sift_down(tree, sel, pos);
            self.sift_up(tree, sel, pos);
        }
        let lower = tree.node(node).lower;
        self.sum_lower -= lower;
        if num::le(lower, self.min_cache.value) {
            self.min_cache.valid = false;
        }
        true
    }

    /// Removes every node whose lower bound is at or above `upper`, walking
    /// the entire slot array (required for generic selector orderings), and
    /// re-heapifies. Returns the removed nodes.
    pub fn bound(&mut self, tree: &Tree, sel: &dyn NodeSelector, upper: Real) -> Vec<NodeId> {
        let mut removed = Vec::new();
        let mut i = 0;
        while i < self.slots.len() {
            let node = self.slots[i];
            if num::ge(tree.node(node).lower, upper) {
                self.slots.swap_remove(i);
                removed.push(node);
            } else {
                i += 1;
            }
        }
        if !removed.is_empty() {
            self.heapify(tree, sel);
            self.recompute(tree);
        }
        removed
    }

    /// Rebuilds the heap after a selector change; O(n log n).
    pub fn resort(&mut self, tree: &Tree, sel: &dyn NodeSelector) {
        self.lowest_bound_order = sel.lowest_bound_first();
        self.heapify(tree, sel);
    }

    /// Minimal lower bound over all queued nodes, `INF` when empty.
    pub fn min_lower(&mut self, tree: &Tree) -> Real {
        if self.slots.is_empty() {
            return INF;
        }
        if self.lowest_bound_order {
            return tree.node(self.slots[0]).lower;
        }
        if !self.min_cache.valid {
            self.recompute(tree);
        }
        self.min_cache.value
    }

    /// Read-only variant of [`NodeQueue::min_lower`]: scans instead of
    /// refreshing an invalid cache.
    pub fn peek_min_lower(&self, tree: &Tree) -> Real {
        if self.slots.is_empty() {
            return INF;
        }
        if self.lowest_bound_order {
            return tree.node(self.slots[0]).lower;
        }
        if self.min_cache.valid {
            return self.min_cache.value;
        }
        self.slots
            .iter()
            .map(|&n| tree.node(n).lower)
            .fold(INF, Real::min)
    }

    fn recompute(&mut self, tree: &Tree) {
        let mut min = INF;
        let mut sum = 0.0;
        for &n in &self.slots {
            let lower = tree.node(n).lower;
            sum += lower;
            if lower < min {
                min = lower;
            }
        }
        self.sum_lower = sum;
        self.min_cache = MinBoundCache { value: min, valid: true };
    }

    fn heapify(&mut self, tree: &Tree, sel: &dyn NodeSelector) {
        for i in (0..self.slots.len() / 2).rev() {
            self.sift_down(tree, sel, i);
        }
    }

    fn sift_up(&mut self, tree: &Tree, sel: &dyn NodeSelector, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.better(tree, sel, self.slots[i], self.slots[parent]) {
                self.slots.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, tree: &Tree, sel: &dyn NodeSelector, mut i: usize) {
        let len = self.slots.len();
        loop {
            let (l, r) = (2 * i + 1, 2 * i + 2);
            let mut best = i;
            if l < len && self.better(tree, sel, self.slots[l], self.slots[best]) {
                best = l;
            }
            if r < len && self.better(tree, sel, self.slots[r], self.slots[best]) {
                best = r;
            }
            if best == i {
                break;
            }
            self.slots.swap(i, best);
            i = best;
        }
    }
}

impl Default for NodeQueue {
    fn default() -> Self {
        NodeQueue::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::plugins::nodesel::{BestBoundSel, DepthFirstSel};
    use crate::tree::NodeSetChange;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn tree_with_leaves(lowers: &[Real]) -> (Tree, Vec<NodeId>) {
        let mut tree = Tree::new();
        let root = tree.create_root(0.0);
        let ids: Vec<NodeId> = lowers
            .iter()
            .map(|&lb| {
                let n = tree.create_child(root, NodeSetChange::new());
                tree.update_lower(n, lb);
                n
            })
            .collect();
        (tree, ids)
    }

    #[test]
    fn test_best_bound_pop_order() {
        let (tree, ids) = tree_with_leaves(&[5.0, 1.0, 3.0, 4.0, 2.0]);
        let sel = BestBoundSel::new();
        let mut q = NodeQueue::new();
        q.resort(&tree, &sel);
        for &id in &ids {
            q.insert(&tree, &sel, id);
        }
        let mut popped = Vec::new();
        while let Some(n) = q.pop_best(&tree, &sel) {
            popped.push(tree.node(n).lower);
        }
        assert_eq!(popped, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_bound_pruning_exact() {
        let mut rng = SmallRng::seed_from_u64(911);
        let lowers: Vec<Real> = (0..50).map(|_| rng.random_range(0..100) as Real).collect();
        let (tree, ids) = tree_with_leaves(&lowers);
        let sel = DepthFirstSel::new();
        let mut q = NodeQueue::new();
        for &id in &ids {
            q.insert(&tree, &sel, id);
        }
        let cutoff = 50.0;
        let removed = q.bound(&tree, &sel, cutoff);
        for &n in &removed {
            assert!(tree.node(n).lower >= cutoff);
        }
        for &n in q.slots() {
            assert!(tree.node(n).lower < cutoff);
        }
        assert_eq!(removed.len() + q.len(), ids.len());
        // min cache and sum are consistent after pruning
        let expect_min = q
            .slots()
            .iter()
            .map(|&n| tree.node(n).lower)
            .fold(INF, Real::min);
        assert_eq!(q.min_lower(&tree), expect_min);
    }

    #[test]
    fn test_min_lower_tracks_removals() {
        let (tree, ids) = tree_with_leaves(&[5.0, 1.0, 3.0]);
        let sel = DepthFirstSel::new();
        let mut q = NodeQueue::new();
        for &id in &ids {
            q.insert(&tree, &sel, id);
        }
        assert_eq!(q.min_lower(&tree), 1.0);
        assert!(q.remove(&tree, &sel, ids[1]));
        assert_eq!(q.min_lower(&tree), 3.0);
        assert!(!q.remove(&tree, &sel, ids[1]));
        assert!((q.sum_lower() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_resort_after_selector_change() {
        let (mut tree, ids) = tree_with_leaves(&[5.0, 1.0, 3.0]);
        // make one node deeper so depth-first prefers it
        let deep = tree.create_child(ids[0], NodeSetChange::new());
        tree.update_lower(deep, 9.0);

        let dfs = DepthFirstSel::new();
        let mut q = NodeQueue::new();
        q.resort(&tree, &dfs);
        for &id in &ids {
            q.insert(&tree, &dfs, id);
        }
        q.insert(&tree, &dfs, deep);
        // depth first: the deepest node wins despite its bad bound
        let first = q.pop_best(&tree, &dfs).unwrap();
        assert_eq!(first, deep);
        q.insert(&tree, &dfs, deep);

        let best = BestBoundSel::new();
        q.resort(&tree, &best);
        let first = q.pop_best(&tree, &best).unwrap();
        assert_eq!(tree.node(first).lower, 1.0);
    }
}
