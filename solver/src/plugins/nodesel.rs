//! Node selector plugins: which open leaf to process next.

use crate::core::NodeId;
use crate::tree::{NodeQueue, Tree};
use std::cmp::Ordering;

pub trait NodeSelector {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    /// Default standard priority; overridable through
    /// `nodeselection/<name>/stdpriority`.
    fn std_priority(&self) -> i32;

    /// Default priority in memory saving mode.
    fn memsave_priority(&self) -> i32 {
        0
    }

    /// True if `compare` orders primarily by local lower bound, enabling the
    /// queue's root-slot fast path for the minimal bound.
    fn lowest_bound_first(&self) -> bool {
        false
    }

    /// Picks the next node to focus. The default policy pops the best node
    /// per `compare`.
    fn select(&self, tree: &Tree, queue: &mut NodeQueue) -> Option<NodeId>;

    /// Total order on open nodes; `Less` means `a` is processed first.
    fn compare(&self, tree: &Tree, a: NodeId, b: NodeId) -> Ordering;

    /// Copy for spawning subordinate engines; `None` marks the selector as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn NodeSelector>> {
        None
    }
}

/// Depth-first search: deeper nodes first, ties by lower bound.
/// The default selector.
#[derive(Default)]
pub struct DepthFirstSel;

impl DepthFirstSel {
    pub fn new() -> Self {
        DepthFirstSel
    }
}

impl NodeSelector for DepthFirstSel {
    fn name(&self) -> &'static str {
        "dfs"
    }

    fn desc(&self) -> &'static str {
        "depth first search"
    }

    fn std_priority(&self) -> i32 {
        100_000
    }

    fn memsave_priority(&self) -> i32 {
        100_000
    }

    fn select(&self, tree: &Tree, queue: &mut NodeQueue) -> Option<NodeId> {
        queue.pop_best(tree, self)
    }

    fn compare(&self, tree: &Tree, a: NodeId, b: NodeId) -> Ordering {
        let (na, nb) = (tree.node(a), tree.node(b));
        nb.depth
            .cmp(&na.depth)
            .then_with(|| na.lower.partial_cmp(&nb.lower).unwrap_or(Ordering::Equal))
    }

    fn clone_box(&self) -> Option<Box<dyn NodeSelector>> {
        Some(Box::new(DepthFirstSel))
    }
}

/// Best-bound search: the node with the smallest local lower bound first.
#[derive(Default)]
pub struct BestBoundSel;

impl BestBoundSel {
    pub fn new() -> Self {
        BestBoundSel
    }
}

impl NodeSelector for BestBoundSel {
    fn name(&self) -> &'static str {
        "bestbound"
    }

    fn desc(&self) -> &'static str {
        "best bound first search"
    }

    fn std_priority(&self) -> i32 {
        50_000
    }

    fn lowest_bound_first(&self) -> bool {
        true
    }

    fn select(&self, tree: &Tree, queue: &mut NodeQueue) -> Option<NodeId> {
        queue.pop_best(tree, self)
    }

    fn compare(&self, tree: &Tree, a: NodeId, b: NodeId) -> Ordering {
        let (na, nb) = (tree.node(a), tree.node(b));
        na.lower
            .partial_cmp(&nb.lower)
            .unwrap_or(Ordering::Equal)
            .then_with(|| nb.depth.cmp(&na.depth))
    }

    fn clone_box(&self) -> Option<Box<dyn NodeSelector>> {
        Some(Box::new(BestBoundSel))
    }
}
