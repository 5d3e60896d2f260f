//! Variables: kinds, original/transformed duality, aggregation chains and
//! variable bound relations.

use crate::core::domain::Domain;
use crate::core::{num, Real, VarId, INF};
use crate::err::{Result, SolverError};
use smallvec::SmallVec;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VarKind {
    Binary,
    Integer,
    /// Integral by implication only; treated as integral in checks but not
    /// used as a branching candidate by default.
    ImplInt,
    Continuous,
}

impl VarKind {
    pub fn is_integral(self) -> bool {
        !matches!(self, VarKind::Continuous)
    }
}

/// The role a variable currently plays.
///
/// Original variables are the user-facing problem space; each has at most one
/// transformed counterpart. Transformed variables start `Active` and may be
/// rewritten by presolve into one of the aggregated forms, after which they no
/// longer appear in the LP and reject bound changes.
#[derive(Clone, Debug)]
pub enum VarStatus {
    Original { transformed: Option<VarId> },
    Active,
    Fixed { val: Real },
    /// `x = scalar * var + constant`
    Aggregated {
        var: VarId,
        scalar: Real,
        constant: Real,
    },
    /// `x = sum_i scalar_i * var_i + constant`
    MultiAggregated {
        terms: Vec<(VarId, Real)>,
        constant: Real,
    },
    /// `x = constant - var`
    Negated { var: VarId, constant: Real },
}

/// A variable bound relation `x >= coef * z + constant` (or `<=` for upper
/// variable bounds), with `z` binary.
#[derive(Copy, Clone, Debug)]
pub struct VarBound {
    pub z: VarId,
    pub coef: Real,
    pub constant: Real,
}

impl VarBound {
    /// The bound implied on `x` when `z` is fixed to `val`.
    pub fn implied(&self, val: Real) -> Real {
        self.coef * val + self.constant
    }
}

pub struct Var {
    pub name: String,
    pub kind: VarKind,
    pub obj: Real,
    /// Global bounds and holes; local bounds live in the
    /// [`DomainStore`](crate::core::DomainStore).
    pub global: Domain,
    pub status: VarStatus,
    pub branch_priority: i32,
    /// Relations `x >= coef * z + constant`.
    pub vlbs: SmallVec<[VarBound; 2]>,
    /// Relations `x <= coef * z + constant`.
    pub vubs: SmallVec<[VarBound; 2]>,
    /// Back link of a transformed variable to its original, if any.
    pub original: Option<VarId>,
}

impl Var {
    pub fn is_original(&self) -> bool {
        matches!(self.status, VarStatus::Original { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, VarStatus::Active)
    }
}

#[derive(Default)]
pub struct VarStore {
    vars: Vec<Var>,
    n_original: usize,
}

impl VarStore {
    pub fn new() -> Self {
        VarStore::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn n_original(&self) -> usize {
        self.n_original
    }

    pub fn var(&self, v: VarId) -> &Var {
        &self.vars[v.idx()]
    }

    pub fn var_mut(&mut self, v: VarId) -> &mut Var {
        &mut self.vars[v.idx()]
    }

    pub fn ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.vars.len()).map(VarId::new)
    }

    /// Transformed variables that still participate directly in the problem.
    pub fn active(&self) -> impl Iterator<Item = VarId> + '_ {
        self.ids().filter(|&v| self.vars[v.idx()].is_active())
    }

    /// Creates an original variable. Binary variables must have bounds within
    /// `[0, 1]`; integral kinds require integral or infinite global bounds.
    pub fn add_original(
        &mut self,
        name: impl Into<String>,
        kind: VarKind,
        lb: Real,
        ub: Real,
        obj: Real,
    ) -> Result<VarId> {
        let name = name.into();
        Self::validate_bounds(&name, kind, lb, ub)?;
        debug_assert!(
            self.vars.len() == self.n_original,
            "original variables must be created before the transformation"
        );
        let id = VarId::new(self.vars.len());
        self.vars.push(Var {
            name,
            kind,
            obj,
            global: Domain::new(lb, ub),
            status: VarStatus::Original { transformed: None },
            branch_priority: 0,
            vlbs: SmallVec::new(),
            vubs: SmallVec::new(),
            original: None,
        });
        self.n_original += 1;
        Ok(id)
    }

    fn validate_bounds(name: &str, kind: VarKind, lb: Real, ub: Real) -> Result<()> {
        if num::gt(lb, ub) {
            return Err(SolverError::invalid_data(
                "add variable",
                format!("variable `{name}`: lower bound {lb} above upper bound {ub}"),
            ));
        }
        if kind == VarKind::Binary && (num::lt(lb, 0.0) || num::gt(ub, 1.0)) {
            return Err(SolverError::invalid_data(
                "add variable",
                format!("binary variable `{name}` with bounds [{lb}, {ub}]"),
            ));
        }
        if kind.is_integral() && (!num::integral(lb) || !num::integral(ub)) {
            return Err(SolverError::invalid_data(
                "add variable",
                format!("integral variable `{name}` with fractional bounds [{lb}, {ub}]"),
            ));
        }
        Ok(())
    }

    /// Creates the transformed counterpart of an original variable.
    /// `obj` is the objective coefficient in the transformed (minimization)
    /// space, which may differ in sign from the original.
    pub fn transform_var(&mut self, orig: VarId, obj: Real) -> VarId {
        let (name, kind, global, prio) = {
            let o = &self.vars[orig.idx()];
            debug_assert!(o.is_original());
            (
                format!("t_{}", o.name),
                o.kind,
                o.global.clone(),
                o.branch_priority,
            )
        };
        let id = VarId::new(self.vars.len());
        self.vars.push(Var {
            name,
            kind,
            obj,
            global,
            status: VarStatus::Active,
            branch_priority: prio,
            vlbs: SmallVec::new(),
            vubs: SmallVec::new(),
            original: Some(orig),
        });
        match &mut self.vars[orig.idx()].status {
            VarStatus::Original { transformed } => {
                debug_assert!(transformed.is_none(), "variable transformed twice");
                *transformed = Some(id);
            }
            _ => unreachable!(),
        }
        id
    }

    /// Creates a transformed variable without an original counterpart
    /// (used by pricers and conflict analysis).
    pub fn add_transformed(
        &mut self,
        name: impl Into<String>,
        kind: VarKind,
        lb: Real,
        ub: Real,
        obj: Real,
    ) -> Result<VarId> {
        let name = name.into();
        Self::validate_bounds(&name, kind, lb, ub)?;
        let id = VarId::new(self.vars.len());
        self.vars.push(Var {
            name,
            kind,
            obj,
            global: Domain::new(lb, ub),
            status: VarStatus::Active,
            branch_priority: 0,
            vlbs: SmallVec::new(),
            vubs: SmallVec::new(),
            original: None,
        });
        Ok(id)
    }

    pub fn transformed_of(&self, orig: VarId) -> Option<VarId> {
        match self.vars[orig.idx()].status {
            VarStatus::Original { transformed } => transformed,
            _ => None,
        }
    }

    /// Fixes an active variable to `val` (within its global bounds).
    pub fn fix(&mut self, v: VarId, val: Real) -> Result<()> {
        let var = &self.vars[v.idx()];
        if !var.is_active() {
            return Err(SolverError::invalid_data(
                "fix variable",
                format!("variable `{}` is not active", var.name),
            ));
        }
        if !var.global.contains(val) {
            return Err(SolverError::invalid_data(
                "fix variable",
                format!("value {} outside the domain of `{}`", val, var.name),
            ));
        }
        self.vars[v.idx()].status = VarStatus::Fixed { val };
        Ok(())
    }

    /// Rewrites the active variable `x` as `scalar * y + constant`.
    pub fn aggregate(&mut self, x: VarId, y: VarId, scalar: Real, constant: Real) -> Result<()> {
        self.check_aggregation_target("aggregate variable", x)?;
        if num::eq(scalar, 0.0) {
            return Err(SolverError::invalid_data(
                "aggregate variable",
                "aggregation with zero scalar; use fix instead",
            ));
        }
        self.vars[x.idx()].status = VarStatus::Aggregated {
            var: y,
            scalar,
            constant,
        };
        Ok(())
    }

    /// Rewrites the active variable `x` as `sum_i scalar_i * y_i + constant`.
    pub fn multi_aggregate(
        &mut self,
        x: VarId,
        terms: Vec<(VarId, Real)>,
        constant: Real,
    ) -> Result<()> {
        self.check_aggregation_target("multi-aggregate variable", x)?;
        self.vars[x.idx()].status = VarStatus::MultiAggregated { terms, constant };
        Ok(())
    }

    /// Rewrites the active variable `x` as `constant - y`.
    pub fn negate(&mut self, x: VarId, y: VarId, constant: Real) -> Result<()> {
        self.check_aggregation_target("negate variable", x)?;
        self.vars[x.idx()].status = VarStatus::Negated { var: y, constant };
        Ok(())
    }

    fn check_aggregation_target(&self, op: &'static str, x: VarId) -> Result<()> {
        let var = &self.vars[x.idx()];
        if !var.is_active() {
            return Err(SolverError::invalid_data(
                op,
                format!("variable `{}` is not active", var.name),
            ));
        }
        Ok(())
    }

    /// Resolves the value of any variable by expanding its aggregation chain,
    /// reading the values of active variables from `active_val`.
    ///
    /// A cycle in the chain is an invariant violation and reported as
    /// `InvalidData`.
    pub fn resolve_value(&self, v: VarId, active_val: &dyn Fn(VarId) -> Real) -> Result<Real> {
        self.resolve_rec(v, active_val, 0)
    }

    fn resolve_rec(&self, v: VarId, active_val: &dyn Fn(VarId) -> Real, depth: usize) -> Result<Real> {
        if depth > self.vars.len() {
            return Err(SolverError::invalid_data(
                "resolve variable value",
                format!("aggregation cycle through `{}`", self.vars[v.idx()].name),
            ));
        }
        match &self.vars[v.idx()].status {
            VarStatus::Original { transformed } => match transformed {
                Some(t) => self.resolve_rec(*t, active_val, depth + 1),
                None => Err(SolverError::invalid_data(
                    "resolve variable value",
                    format!("original variable `{}` was never transformed", self.vars[v.idx()].name),
                )),
            },
            VarStatus::Active => Ok(active_val(v)),
            VarStatus::Fixed { val } => Ok(*val),
            VarStatus::Aggregated {
                var,
                scalar,
                constant,
            } => Ok(scalar * self.resolve_rec(*var, active_val, depth + 1)? + constant),
            VarStatus::MultiAggregated { terms, constant } => {
                let mut val = *constant;
                for (t, scalar) in terms {
                    val += scalar * self.resolve_rec(*t, active_val, depth + 1)?;
                }
                Ok(val)
            }
            VarStatus::Negated { var, constant } => {
                Ok(constant - self.resolve_rec(*var, active_val, depth + 1)?)
            }
        }
    }

    /// Adds `x >= coef * z + constant` to the variable bound lists.
    ///
    /// `z` must be binary and the implication must be redundancy free: for at
    /// least one value of `z` the implied bound must be strictly tighter than
    /// the unconditional lower bound of `x`.
    pub fn add_vlb(&mut self, x: VarId, vlb: VarBound) -> Result<()> {
        self.validate_varbound("add variable lower bound", x, &vlb)?;
        let implied = vlb.implied(0.0).max(vlb.implied(1.0));
        if !num::gt(implied, self.vars[x.idx()].global.lb) {
            return Err(SolverError::invalid_data(
                "add variable lower bound",
                format!("redundant relation on `{}`", self.vars[x.idx()].name),
            ));
        }
        self.vars[x.idx()].vlbs.push(vlb);
        Ok(())
    }

    /// Adds `x <= coef * z + constant`, symmetric to [`VarStore::add_vlb`].
    pub fn add_vub(&mut self, x: VarId, vub: VarBound) -> Result<()> {
        self.validate_varbound("add variable upper bound", x, &vub)?;
        let implied = vub.implied(0.0).min(vub.implied(1.0));
        if !num::lt(implied, self.vars[x.idx()].global.ub) {
            return Err(SolverError::invalid_data(
                "add variable upper bound",
                format!("redundant relation on `{}`", self.vars[x.idx()].name),
            ));
        }
        self.vars[x.idx()].vubs.push(vub);
        Ok(())
    }

    fn validate_varbound(&self, op: &'static str, x: VarId, vb: &VarBound) -> Result<()> {
        if self.vars[vb.z.idx()].kind != VarKind::Binary {
            return Err(SolverError::invalid_data(
                op,
                format!("bounding variable `{}` is not binary", self.vars[vb.z.idx()].name),
            ));
        }
        if vb.z == x {
            return Err(SolverError::invalid_data(op, "self referential relation"));
        }
        Ok(())
    }

    /// Tightens a global bound of an active variable. Only permitted outside
    /// search; the caller is responsible for that staging discipline and for
    /// detecting an emptied domain (global infeasibility).
    pub fn tighten_global(&mut self, v: VarId, lower: bool, val: Real) -> Result<bool> {
        let var = &mut self.vars[v.idx()];
        if !var.is_active() {
            return Err(SolverError::invalid_data(
                "tighten global bound",
                format!("variable `{}` is not active", var.name),
            ));
        }
        let val = if var.kind.is_integral() && num::finite(val) {
            if lower {
                num::ceil(val)
            } else {
                num::floor(val)
            }
        } else {
            val
        };
        let changed = if lower {
            if num::gt(val, var.global.lb) {
                var.global.lb = val;
                true
            } else {
                false
            }
        } else if num::lt(val, var.global.ub) {
            var.global.ub = val;
            true
        } else {
            false
        };
        Ok(changed)
    }
}

/// The objective value of the pseudo point: every variable sits at the bound
/// implied by its objective direction. Returns `-INF` if that bound is
/// infinite for some variable with a nonzero coefficient.
pub fn pseudo_objective(vars: &VarStore, lb: &dyn Fn(VarId) -> Real, ub: &dyn Fn(VarId) -> Real) -> Real {
    let mut obj = 0.0;
    for v in vars.active() {
        let var = vars.var(v);
        if var.obj > 0.0 {
            let b = lb(v);
            if num::is_neg_inf(b) {
                return -INF;
            }
            obj += var.obj * b;
        } else if var.obj < 0.0 {
            let b = ub(v);
            if num::is_inf(b) {
                return -INF;
            }
            obj += var.obj * b;
        }
    }
    obj
}

#[cfg(test)]
mod test {
    use super::*;

    fn store_with(kinds: &[(VarKind, Real, Real)]) -> (VarStore, Vec<VarId>) {
        let mut s = VarStore::new();
        let mut orig = Vec::new();
        for (i, (k, lb, ub)) in kinds.iter().enumerate() {
            orig.push(s.add_original(format!("v{i}"), *k, *lb, *ub, 0.0).unwrap());
        }
        let t: Vec<VarId> = orig.iter().map(|&o| s.transform_var(o, 0.0)).collect();
        (s, t)
    }

    #[test]
    fn test_kind_validation() {
        let mut s = VarStore::new();
        assert!(s.add_original("b", VarKind::Binary, 0.0, 2.0, 0.0).is_err());
        assert!(s.add_original("i", VarKind::Integer, 0.5, 3.0, 0.0).is_err());
        assert!(s.add_original("ok", VarKind::Integer, -INF, 3.0, 0.0).is_ok());
    }

    #[test]
    fn test_aggregation_expansion() {
        let (mut s, t) = store_with(&[
            (VarKind::Continuous, 0.0, 10.0),
            (VarKind::Continuous, 0.0, 10.0),
            (VarKind::Continuous, 0.0, 10.0),
        ]);
        // t1 = 2*t0 + 1, t2 = 5 - t1
        s.aggregate(t[1], t[0], 2.0, 1.0).unwrap();
        s.negate(t[2], t[1], 5.0).unwrap();
        let val = |v: VarId| if v == t[0] { 3.0 } else { panic!("not active") };
        assert_eq!(s.resolve_value(t[1], &val).unwrap(), 7.0);
        assert_eq!(s.resolve_value(t[2], &val).unwrap(), -2.0);
        // bound changes on aggregated variables are rejected
        assert!(s.fix(t[1], 1.0).is_err());
    }

    #[test]
    fn test_aggregation_cycle_detected() {
        let (mut s, t) = store_with(&[
            (VarKind::Continuous, 0.0, 10.0),
            (VarKind::Continuous, 0.0, 10.0),
        ]);
        s.aggregate(t[0], t[1], 1.0, 0.0).unwrap();
        // force a cycle behind the API's back
        s.var_mut(t[1]).status = VarStatus::Aggregated {
            var: t[0],
            scalar: 1.0,
            constant: 0.0,
        };
        assert!(s.resolve_value(t[0], &|_| 0.0).is_err());
    }

    #[test]
    fn test_varbound_validation() {
        let (mut s, t) = store_with(&[(VarKind::Continuous, 0.0, 10.0), (VarKind::Binary, 0.0, 1.0)]);
        // x >= 3 z + 1 is tighter than lb = 0 when z = 1
        s.add_vlb(t[0], VarBound { z: t[1], coef: 3.0, constant: 1.0 }).unwrap();
        // x >= -2 z  is never tighter than lb = 0
        assert!(s
            .add_vlb(t[0], VarBound { z: t[1], coef: -2.0, constant: 0.0 })
            .is_err());
        // bounding variable must be binary
        assert!(s
            .add_vlb(t[1], VarBound { z: t[0], coef: 1.0, constant: 0.0 })
            .is_err());
    }

    #[test]
    fn test_pseudo_objective() {
        let (mut s, t) = store_with(&[(VarKind::Continuous, 1.0, 5.0), (VarKind::Continuous, 0.0, 4.0)]);
        s.var_mut(t[0]).obj = 2.0;
        s.var_mut(t[1]).obj = -1.0;
        let lb = |v: VarId| s.var(v).global.lb;
        let ub = |v: VarId| s.var(v).global.ub;
        assert_eq!(pseudo_objective(&s, &lb, &ub), 2.0 * 1.0 - 1.0 * 4.0);
    }
}
