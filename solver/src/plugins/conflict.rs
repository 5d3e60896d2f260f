//! Conflict analyzer hooks: turning proven node infeasibility into globally
//! valid constraints.

use crate::core::{BoundLit, NodeId, VarStore};
use crate::err::Result;
use crate::lp::Lp;
use crate::tree::Tree;

/// What proved the node infeasible.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConflictSource {
    /// A propagation round signalled a cutoff.
    Propagation,
    /// The node LP is infeasible; a Farkas proof is available on the LP.
    LpInfeasible,
}

/// Context of a conflict analysis call.
pub struct ConflictCtx<'a> {
    pub vars: &'a VarStore,
    pub tree: &'a Tree,
    /// The node proven infeasible.
    pub node: NodeId,
    pub source: ConflictSource,
    pub lp: &'a Lp,
    /// Learned disjunctions longer than this are discarded.
    pub max_len: usize,
    learned: Vec<Vec<BoundLit>>,
}

impl<'a> ConflictCtx<'a> {
    pub fn new(
        vars: &'a VarStore,
        tree: &'a Tree,
        node: NodeId,
        source: ConflictSource,
        lp: &'a Lp,
        max_len: usize,
    ) -> Self {
        ConflictCtx {
            vars,
            tree,
            node,
            source,
            lp,
            max_len,
            learned: Vec::new(),
        }
    }

    /// Contributes a learned bound disjunction (globally valid).
    pub fn add_conflict(&mut self, lits: Vec<BoundLit>) {
        if !lits.is_empty() && lits.len() <= self.max_len {
            self.learned.push(lits);
        }
    }

    pub fn take_learned(&mut self) -> Vec<Vec<BoundLit>> {
        std::mem::take(&mut self.learned)
    }
}

pub trait ConflictHook {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    fn default_priority(&self) -> i32 {
        0
    }

    fn analyze(&mut self, ctx: &mut ConflictCtx) -> Result<()>;

    /// Copy for spawning subordinate engines; `None` marks the hook as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn ConflictHook>> {
        None
    }
}

/// Learns the negation of the branching decisions on the infeasible node's
/// ancestor path: at least one of them must be reverted.
///
/// Learning is skipped when the path carries anything beyond integral
/// branching bound changes (holes, local constraints), since negating the
/// bound changes alone would not be sound then.
#[derive(Default)]
pub struct PathNoGoodHook;

impl PathNoGoodHook {
    pub fn new() -> Self {
        PathNoGoodHook
    }
}

impl ConflictHook for PathNoGoodHook {
    fn name(&self) -> &'static str {
        "pathnogood"
    }

    fn desc(&self) -> &'static str {
        "negate the branching decisions of the infeasible path"
    }

    fn clone_box(&self) -> Option<Box<dyn ConflictHook>> {
        Some(Box::new(PathNoGoodHook))
    }

    fn analyze(&mut self, ctx: &mut ConflictCtx) -> Result<()> {
        let mut lits = Vec::new();
        for node in ctx.tree.path_to(ctx.node) {
            let change = &ctx.tree.node(node).change;
            if !change.holes.is_empty() || !change.added.is_empty() || !change.disabled.is_empty() {
                return Ok(());
            }
            for bc in &change.bounds {
                if !ctx.vars.var(bc.var).kind.is_integral() {
                    return Ok(());
                }
                let decision = BoundLit {
                    var: bc.var,
                    kind: bc.kind,
                    val: bc.val,
                };
                lits.push(decision.negate_integral());
            }
        }
        ctx.add_conflict(lits);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{BoundKind, VarKind};
    use crate::lp::simplex::SimplexBackend;
    use crate::tree::{BoundChange, NodeSetChange};

    #[test]
    fn test_path_nogood_negates_decisions() {
        let mut vars = VarStore::new();
        let o = vars.add_original("x", VarKind::Integer, 0.0, 10.0, 0.0).unwrap();
        let x = vars.transform_var(o, 0.0);

        let mut tree = Tree::new();
        let root = tree.create_root(0.0);
        let mut change = NodeSetChange::new();
        change.add_bound(BoundChange::upper(x, 3.0));
        let child = tree.create_child(root, change);
        let mut change = NodeSetChange::new();
        change.add_bound(BoundChange::lower(x, 2.0));
        let leaf = tree.create_child(child, change);

        let lp = Lp::new(Box::new(SimplexBackend::new()));
        let mut ctx = ConflictCtx::new(&vars, &tree, leaf, ConflictSource::Propagation, &lp, 50);
        PathNoGoodHook::new().analyze(&mut ctx).unwrap();
        let learned = ctx.take_learned();
        assert_eq!(learned.len(), 1);
        let lits = &learned[0];
        assert_eq!(lits.len(), 2);
        assert_eq!(lits[0], BoundLit { var: x, kind: BoundKind::Lower, val: 4.0 });
        assert_eq!(lits[1], BoundLit { var: x, kind: BoundKind::Upper, val: 1.0 });
    }
}
