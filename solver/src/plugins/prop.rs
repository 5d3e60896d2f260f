//! Propagator plugins: domain reductions independent of single constraints.

use crate::cons::{PropCtx, Propagation};
use crate::core::{num, BoundLit, Tightening, VarId};
use crate::err::{Result, SolverError};

pub trait Propagator {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    fn default_priority(&self) -> i32 {
        0
    }

    /// Calling frequency in tree depth (`-1` never, `0` only during
    /// presolve, `k > 0` at depths divisible by `k`).
    fn default_freq(&self) -> i32 {
        1
    }

    fn propagate(&mut self, ctx: &mut PropCtx) -> Result<Propagation>;

    /// Explains a deduction for conflict analysis.
    fn resolve_propagation(&self, _ctx: &PropCtx, _inferred: BoundLit) -> Result<Vec<BoundLit>> {
        Err(SolverError::NotImplemented {
            op: "resolve propagation",
            plugin: self.name().into(),
        })
    }

    /// Copy for spawning subordinate engines; `None` marks the propagator as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn Propagator>> {
        None
    }
}

/// Propagates variable bound relations `x >= a z + b` / `x <= a z + b`
/// (`z` binary): once `z` is fixed the implied bound is applied, and a bound
/// of `x` that contradicts one of the two implications fixes `z` to the other
/// value.
#[derive(Default)]
pub struct VarBoundProp;

impl VarBoundProp {
    pub fn new() -> Self {
        VarBoundProp
    }
}

impl Propagator for VarBoundProp {
    fn name(&self) -> &'static str {
        "vbound"
    }

    fn desc(&self) -> &'static str {
        "propagation of variable bound relations"
    }

    fn default_priority(&self) -> i32 {
        3_000_000
    }

    fn clone_box(&self) -> Option<Box<dyn Propagator>> {
        Some(Box::new(VarBoundProp))
    }

    fn propagate(&mut self, ctx: &mut PropCtx) -> Result<Propagation> {
        let mut result = Propagation::Unchanged;
        let active: Vec<VarId> = ctx.vars.active().collect();
        for &x in &active {
            let var = ctx.vars.var(x);
            for vlb in var.vlbs.iter() {
                // z fixed: apply the implied lower bound
                if ctx.dom.is_fixed(vlb.z) {
                    let implied = vlb.implied(ctx.dom.lb(vlb.z));
                    match ctx.dom.tighten_lb(x, implied) {
                        Tightening::Empty => return Ok(Propagation::Cutoff),
                        Tightening::Tightened => result = Propagation::ReducedDomain,
                        Tightening::Unchanged => {}
                    }
                    continue;
                }
                // contrapositive: ub(x) rules out one value of z
                for zval in [0.0, 1.0] {
                    if num::lt(ctx.dom.ub(x), vlb.implied(zval)) {
                        let t = if zval > 0.5 {
                            ctx.dom.tighten_ub(vlb.z, 0.0)
                        } else {
                            ctx.dom.tighten_lb(vlb.z, 1.0)
                        };
                        match t {
                            Tightening::Empty => return Ok(Propagation::Cutoff),
                            Tightening::Tightened => result = Propagation::ReducedDomain,
                            Tightening::Unchanged => {}
                        }
                    }
                }
            }
            for vub in var.vubs.iter() {
                if ctx.dom.is_fixed(vub.z) {
                    let implied = vub.implied(ctx.dom.lb(vub.z));
                    match ctx.dom.tighten_ub(x, implied) {
                        Tightening::Empty => return Ok(Propagation::Cutoff),
                        Tightening::Tightened => result = Propagation::ReducedDomain,
                        Tightening::Unchanged => {}
                    }
                    continue;
                }
                for zval in [0.0, 1.0] {
                    if num::gt(ctx.dom.lb(x), vub.implied(zval)) {
                        let t = if zval > 0.5 {
                            ctx.dom.tighten_ub(vub.z, 0.0)
                        } else {
                            ctx.dom.tighten_lb(vub.z, 1.0)
                        };
                        match t {
                            Tightening::Empty => return Ok(Propagation::Cutoff),
                            Tightening::Tightened => result = Propagation::ReducedDomain,
                            Tightening::Unchanged => {}
                        }
                    }
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{Domain, DomainStore, VarBound, VarKind, VarStore};

    fn setup() -> (VarStore, DomainStore, VarId, VarId) {
        let mut vars = VarStore::new();
        let ox = vars
            .add_original("x", VarKind::Continuous, 0.0, 100.0, 0.0)
            .unwrap();
        let oz = vars.add_original("z", VarKind::Binary, 0.0, 1.0, 0.0).unwrap();
        let x = vars.transform_var(ox, 0.0);
        let z = vars.transform_var(oz, 0.0);
        // x >= 10 z + 1
        vars.add_vlb(x, VarBound { z, coef: 10.0, constant: 1.0 }).unwrap();
        let mut dom = DomainStore::new();
        for v in vars.ids() {
            let d = vars.var(v).global.clone();
            let int = vars.var(v).kind.is_integral();
            dom.register(v, d, int);
        }
        (vars, dom, x, z)
    }

    #[test]
    fn test_fixed_binary_implies_bound() {
        let (vars, mut dom, x, z) = setup();
        dom.tighten_lb(z, 1.0);
        let mut prop = VarBoundProp::new();
        let mut ctx = PropCtx {
            vars: &vars,
            dom: &mut dom,
            depth: 0,
        };
        assert_eq!(prop.propagate(&mut ctx).unwrap(), Propagation::ReducedDomain);
        assert_eq!(dom.lb(x), 11.0);
    }

    #[test]
    fn test_contrapositive_fixes_binary() {
        let (vars, mut dom, x, z) = setup();
        // ub(x) = 5 < 11 rules out z = 1
        dom.tighten_ub(x, 5.0);
        let mut prop = VarBoundProp::new();
        let mut ctx = PropCtx {
            vars: &vars,
            dom: &mut dom,
            depth: 0,
        };
        assert_eq!(prop.propagate(&mut ctx).unwrap(), Propagation::ReducedDomain);
        assert_eq!(dom.ub(z), 0.0);
    }
}
