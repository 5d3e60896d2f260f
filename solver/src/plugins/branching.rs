//! Branching rule plugins: turning a fractional LP solution into children.

use crate::cons::ConsId;
use crate::core::{num, DomainStore, Real, VarId, VarStore};
use crate::err::Result;
use crate::tree::BoundChange;

/// A fractional branching candidate from the LP solution.
#[derive(Copy, Clone, Debug)]
pub struct BranchCand {
    pub var: VarId,
    /// LP value of the variable.
    pub val: Real,
    /// Fractional part of the LP value, in (0, 1).
    pub frac: Real,
    pub priority: i32,
}

/// What a child node gets relative to the focus node.
#[derive(Default, Clone, Debug)]
pub struct ChildSpec {
    pub bounds: Vec<BoundChange>,
    pub conss: Vec<ConsId>,
}

/// Outcome of a branching rule.
pub enum Branching {
    DidNotRun,
    Branched(Vec<ChildSpec>),
    /// The rule proved the node infeasible.
    Cutoff,
}

pub trait BranchRule {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    /// Default priority; overridable through `branching/<name>/priority`.
    fn default_priority(&self) -> i32;

    /// Branch on a fractional LP solution of the focus node.
    fn execute_lp(
        &mut self,
        vars: &VarStore,
        dom: &DomainStore,
        cands: &[BranchCand],
    ) -> Result<Branching>;

    /// Copy for spawning subordinate engines; `None` marks the rule as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn BranchRule>> {
        None
    }
}

/// The canonical two children on a candidate: `x <= floor(val)` and
/// `x >= ceil(val)`. Also used by the engine when every rule declines.
pub fn canonical_children(cand: &BranchCand) -> Vec<ChildSpec> {
    let down = ChildSpec {
        bounds: vec![BoundChange::upper(cand.var, num::floor(cand.val))],
        conss: Vec::new(),
    };
    let up = ChildSpec {
        bounds: vec![BoundChange::lower(cand.var, num::ceil(cand.val))],
        conss: Vec::new(),
    };
    vec![down, up]
}

/// Picks the most fractional candidate, ties broken by branching priority and
/// then by variable index.
pub fn most_fractional(cands: &[BranchCand]) -> Option<&BranchCand> {
    cands.iter().min_by(|a, b| {
        let fa = (a.frac - 0.5).abs();
        let fb = (b.frac - 0.5).abs();
        fa.partial_cmp(&fb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.var.cmp(&b.var))
    })
}

/// Branch on the most fractional variable.
#[derive(Default)]
pub struct MostFracBranching;

impl MostFracBranching {
    pub fn new() -> Self {
        MostFracBranching
    }
}

impl BranchRule for MostFracBranching {
    fn name(&self) -> &'static str {
        "mostfrac"
    }

    fn desc(&self) -> &'static str {
        "branch on the most fractional LP value"
    }

    fn default_priority(&self) -> i32 {
        100
    }

    fn execute_lp(
        &mut self,
        _vars: &VarStore,
        _dom: &DomainStore,
        cands: &[BranchCand],
    ) -> Result<Branching> {
        match most_fractional(cands) {
            Some(cand) => Ok(Branching::Branched(canonical_children(cand))),
            None => Ok(Branching::DidNotRun),
        }
    }

    fn clone_box(&self) -> Option<Box<dyn BranchRule>> {
        Some(Box::new(MostFracBranching))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::BoundKind;

    fn cand(i: usize, val: Real, priority: i32) -> BranchCand {
        BranchCand {
            var: VarId::new(i),
            val,
            frac: num::frac(val),
            priority,
        }
    }

    #[test]
    fn test_most_fractional_selection() {
        let cands = [cand(0, 2.1, 0), cand(1, 3.5, 0), cand(2, 7.45, 0)];
        assert_eq!(most_fractional(&cands).unwrap().var, VarId::new(1));
        // ties by priority, then index
        let cands = [cand(0, 2.5, 1), cand(1, 3.5, 7), cand(2, 4.5, 7)];
        assert_eq!(most_fractional(&cands).unwrap().var, VarId::new(1));
    }

    #[test]
    fn test_canonical_children() {
        let children = canonical_children(&cand(0, 2.6, 0));
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].bounds[0].kind, BoundKind::Upper);
        assert_eq!(children[0].bounds[0].val, 2.0);
        assert_eq!(children[1].bounds[0].kind, BoundKind::Lower);
        assert_eq!(children[1].bounds[0].val, 3.0);
    }
}
