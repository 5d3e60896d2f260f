//! Presolver plugins and the presolve context.

use crate::cons::{ConsId, LockTable, PresolOutcome};
use crate::core::{num, Real, VarId, VarStore};
use crate::err::Result;

/// Reduction counters of one presolve round.
#[derive(Default, Clone, Copy, Debug)]
pub struct PresolCounters {
    pub nfixed: u64,
    pub naggregated: u64,
    pub nbounds: u64,
    pub ndelconss: u64,
    pub ncoefs: u64,
    pub nsides: u64,
}

impl PresolCounters {
    pub fn total(&self) -> u64 {
        self.nfixed + self.naggregated + self.nbounds + self.ndelconss + self.ncoefs + self.nsides
    }
}

/// Context of presolve callbacks: global reductions on the transformed
/// problem, performed before the search starts.
pub struct PresolCtx<'a> {
    pub vars: &'a mut VarStore,
    pub locks: &'a LockTable,
    pub counters: &'a mut PresolCounters,
    cutoff: bool,
    deletions: Vec<ConsId>,
    unbounded_ray: Option<(VarId, Real)>,
}

impl<'a> PresolCtx<'a> {
    pub fn new(vars: &'a mut VarStore, locks: &'a LockTable, counters: &'a mut PresolCounters) -> Self {
        PresolCtx {
            vars,
            locks,
            counters,
            cutoff: false,
            deletions: Vec::new(),
            unbounded_ray: None,
        }
    }

    /// Records the improving ray direction of a detected unboundedness, so
    /// the engine can report a primal ray.
    pub fn set_unbounded_ray(&mut self, v: VarId, direction: Real) {
        self.unbounded_ray = Some((v, direction));
    }

    pub fn unbounded_ray(&self) -> Option<(VarId, Real)> {
        self.unbounded_ray
    }

    /// Tightens a global bound; an emptied domain records a global cutoff.
    pub fn tighten_global(&mut self, v: VarId, lower: bool, val: Real) -> Result<bool> {
        let changed = self.vars.tighten_global(v, lower, val)?;
        if changed {
            self.counters.nbounds += 1;
            if self.vars.var(v).global.is_empty() {
                self.cutoff = true;
            }
        }
        Ok(changed)
    }

    pub fn fix_var(&mut self, v: VarId, val: Real) -> Result<()> {
        self.vars.fix(v, val)?;
        self.counters.nfixed += 1;
        Ok(())
    }

    /// Requests the removal of a redundant constraint; the driver deactivates
    /// and releases it after the callback returns.
    pub fn delete_cons(&mut self, id: ConsId) {
        self.deletions.push(id);
        self.counters.ndelconss += 1;
    }

    pub fn cutoff_detected(&self) -> bool {
        self.cutoff
    }

    pub fn take_deletions(&mut self) -> Vec<ConsId> {
        std::mem::take(&mut self.deletions)
    }
}

pub trait Presolver {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    fn default_priority(&self) -> i32 {
        0
    }

    fn execute(&mut self, ctx: &mut PresolCtx) -> Result<PresolOutcome>;

    /// Copy for spawning subordinate engines; `None` marks the presolver as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn Presolver>> {
        None
    }
}

/// Dual fixing: a variable that no constraint locks against rounding in its
/// objective direction is fixed to the corresponding bound; an infinite bound
/// with a strictly pushing objective makes the problem unbounded.
#[derive(Default)]
pub struct DualFixPresolver;

impl DualFixPresolver {
    pub fn new() -> Self {
        DualFixPresolver
    }
}

impl Presolver for DualFixPresolver {
    fn name(&self) -> &'static str {
        "dualfix"
    }

    fn desc(&self) -> &'static str {
        "fix variables that can always be rounded toward their objective"
    }

    fn default_priority(&self) -> i32 {
        100
    }

    fn clone_box(&self) -> Option<Box<dyn Presolver>> {
        Some(Box::new(DualFixPresolver))
    }

    fn execute(&mut self, ctx: &mut PresolCtx) -> Result<PresolOutcome> {
        let mut result = PresolOutcome::Unchanged;
        let active: Vec<VarId> = ctx.vars.active().collect();
        for v in active {
            let (obj, lb, ub) = {
                let var = ctx.vars.var(v);
                (var.obj, var.global.lb, var.global.ub)
            };
            if obj >= 0.0 && ctx.locks.down(v) == 0 {
                if num::is_neg_inf(lb) {
                    if obj > 0.0 {
                        ctx.set_unbounded_ray(v, -1.0);
                        return Ok(PresolOutcome::Unbounded);
                    }
                    // objective zero and no bound: nothing to gain
                    continue;
                }
                ctx.fix_var(v, lb)?;
                result = PresolOutcome::Reduced;
            } else if obj <= 0.0 && ctx.locks.up(v) == 0 {
                if num::is_inf(ub) {
                    if obj < 0.0 {
                        ctx.set_unbounded_ray(v, 1.0);
                        return Ok(PresolOutcome::Unbounded);
                    }
                    continue;
                }
                ctx.fix_var(v, ub)?;
                result = PresolOutcome::Reduced;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{VarKind, INF};

    fn setup(objs: &[Real]) -> (VarStore, Vec<VarId>) {
        let mut vars = VarStore::new();
        let mut t = Vec::new();
        for (i, &obj) in objs.iter().enumerate() {
            let o = vars
                .add_original(format!("x{i}"), VarKind::Continuous, 0.0, 10.0, obj)
                .unwrap();
            t.push(vars.transform_var(o, obj));
        }
        (vars, t)
    }

    #[test]
    fn test_dualfix_fixes_unlocked_vars() {
        let (mut vars, t) = setup(&[1.0, -2.0, 3.0]);
        let mut locks = LockTable::new(vars.len());
        // x2 is locked downward by some constraint, the others are free to move
        locks.add(t[2], true, false);
        let mut counters = PresolCounters::default();
        let mut ctx = PresolCtx::new(&mut vars, &locks, &mut counters);
        let mut presol = DualFixPresolver::new();
        assert!(matches!(presol.execute(&mut ctx).unwrap(), PresolOutcome::Reduced));
        assert!(matches!(vars.var(t[0]).status, crate::core::VarStatus::Fixed { val } if val == 0.0));
        assert!(matches!(vars.var(t[1]).status, crate::core::VarStatus::Fixed { val } if val == 10.0));
        assert!(vars.var(t[2]).is_active());
        assert_eq!(counters.nfixed, 2);
    }

    #[test]
    fn test_dualfix_detects_unboundedness() {
        let mut vars = VarStore::new();
        let o = vars
            .add_original("x", VarKind::Continuous, 0.0, INF, -1.0)
            .unwrap();
        vars.transform_var(o, -1.0);
        let locks = LockTable::new(vars.len());
        let mut counters = PresolCounters::default();
        let mut ctx = PresolCtx::new(&mut vars, &locks, &mut counters);
        let mut presol = DualFixPresolver::new();
        assert!(matches!(
            presol.execute(&mut ctx).unwrap(),
            PresolOutcome::Unbounded
        ));
    }
}
