//! The linear constraint handler: `lhs <= sum a_i x_i <= rhs`.
//!
//! Supplies the LP relaxation row of each constraint, activity based bound
//! tightening, feasibility checks, rounding locks and the presolve reductions
//! for redundant and single-term constraints.

use super::{
    CheckArgs, Conshdlr, ConsId, ConsStore, EnfoCtx, Enforcement, Feasibility, LockTable,
    PresolOutcome, PropCtx, Propagation,
};
use crate::core::{num, BoundKind, BoundLit, DomainStore, Real, VarId, VarStatus, VarStore, FEASTOL, INF};
use crate::err::{Result, SolverError};
use crate::lp::{Lp, LpRow};
use crate::plugins::presol::PresolCtx;
use smallvec::SmallVec;
use std::any::Any;

/// Payload of a linear constraint.
#[derive(Clone, Debug)]
pub struct LinearCons {
    pub terms: SmallVec<[(VarId, Real); 4]>,
    pub lhs: Real,
    pub rhs: Real,
    /// Index of the relaxation row once it has been added to the LP.
    pub row: Option<usize>,
}

impl LinearCons {
    pub fn new(terms: impl IntoIterator<Item = (VarId, Real)>, lhs: Real, rhs: Real) -> LinearCons {
        LinearCons {
            terms: terms.into_iter().collect(),
            lhs,
            rhs,
            row: None,
        }
    }

    fn activity_at(&self, value: &dyn Fn(VarId) -> Real) -> Real {
        self.terms.iter().map(|&(v, a)| a * value(v)).sum()
    }

    fn violated_at(&self, value: &dyn Fn(VarId) -> Real) -> bool {
        let act = self.activity_at(value);
        num::gt(self.lhs - act, FEASTOL) || num::gt(act - self.rhs, FEASTOL)
    }
}

/// Activity bounds of a sum, tracking infinite contributions separately.
#[derive(Default)]
struct ActivityBounds {
    min_finite: Real,
    max_finite: Real,
    n_min_inf: usize,
    n_max_inf: usize,
}

impl ActivityBounds {
    fn of(terms: &[(VarId, Real)], lb: &dyn Fn(VarId) -> Real, ub: &dyn Fn(VarId) -> Real) -> Self {
        let mut b = ActivityBounds::default();
        for &(v, a) in terms {
            let (tmin, tmax) = if a >= 0.0 {
                (a * lb(v), a * ub(v))
            } else {
                (a * ub(v), a * lb(v))
            };
            if num::is_neg_inf(tmin) {
                b.n_min_inf += 1;
            } else {
                b.min_finite += tmin;
            }
            if num::is_inf(tmax) {
                b.n_max_inf += 1;
            } else {
                b.max_finite += tmax;
            }
        }
        b
    }

    fn min(&self) -> Real {
        if self.n_min_inf > 0 {
            -INF
        } else {
            self.min_finite
        }
    }

    fn max(&self) -> Real {
        if self.n_max_inf > 0 {
            INF
        } else {
            self.max_finite
        }
    }

    /// Minimal activity of all terms except one whose contribution bounds are
    /// `(tmin, _)`.
    fn min_without(&self, tmin: Real) -> Real {
        if num::is_neg_inf(tmin) {
            if self.n_min_inf > 1 {
                -INF
            } else {
                self.min_finite
            }
        } else if self.n_min_inf > 0 {
            -INF
        } else {
            self.min_finite - tmin
        }
    }

    fn max_without(&self, tmax: Real) -> Real {
        if num::is_inf(tmax) {
            if self.n_max_inf > 1 {
                INF
            } else {
                self.max_finite
            }
        } else if self.n_max_inf > 0 {
            INF
        } else {
            self.max_finite - tmax
        }
    }
}

/// Expands a term list over arbitrary variables into an equivalent list over
/// active variables plus a constant, following aggregation chains.
pub fn flatten_terms(
    vars: &VarStore,
    terms: &[(VarId, Real)],
) -> Result<(Vec<(VarId, Real)>, Real)> {
    let mut out: Vec<(VarId, Real)> = Vec::with_capacity(terms.len());
    let mut constant = 0.0;
    let mut push = |v: VarId, a: Real, out: &mut Vec<(VarId, Real)>| {
        if let Some(entry) = out.iter_mut().find(|(w, _)| *w == v) {
            entry.1 += a;
        } else {
            out.push((v, a));
        }
    };
    let mut stack: Vec<(VarId, Real, usize)> = terms.iter().map(|&(v, a)| (v, a, 0)).collect();
    while let Some((v, a, depth)) = stack.pop() {
        if depth > vars.len() {
            return Err(SolverError::invalid_data(
                "flatten linear terms",
                "aggregation cycle while expanding a constraint",
            ));
        }
        match &vars.var(v).status {
            VarStatus::Active => push(v, a, &mut out),
            VarStatus::Original { transformed } => match transformed {
                Some(t) => stack.push((*t, a, depth + 1)),
                None => {
                    return Err(SolverError::invalid_data(
                        "flatten linear terms",
                        format!("untransformed variable `{}` in constraint", vars.var(v).name),
                    ))
                }
            },
            VarStatus::Fixed { val } => constant += a * val,
            VarStatus::Aggregated {
                var,
                scalar,
                constant: c,
            } => {
                constant += a * c;
                stack.push((*var, a * scalar, depth + 1));
            }
            VarStatus::MultiAggregated { terms, constant: c } => {
                constant += a * c;
                for (t, s) in terms {
                    stack.push((*t, a * s, depth + 1));
                }
            }
            VarStatus::Negated { var, constant: c } => {
                constant += a * c;
                stack.push((*var, -a, depth + 1));
            }
        }
    }
    out.retain(|&(_, a)| a.abs() > crate::core::EPS);
    Ok((out, constant))
}

#[derive(Default)]
pub struct LinearConshdlr;

impl LinearConshdlr {
    pub fn new() -> Self {
        LinearConshdlr
    }

    fn data<'a>(&self, store: &'a ConsStore, id: ConsId) -> &'a LinearCons {
        store
            .data(id)
            .downcast_ref::<LinearCons>()
            .expect("linear constraint with foreign payload")
    }

    /// One round of activity based tightening on a single constraint.
    fn propagate_cons(
        &self,
        data: &LinearCons,
        vars: &VarStore,
        dom: &mut DomainStore,
    ) -> Propagation {
        let lb = |v: VarId| dom.lb(v);
        let ub = |v: VarId| dom.ub(v);
        let act = ActivityBounds::of(&data.terms, &lb, &ub);
        if num::gt(act.min(), data.rhs) || num::lt(act.max(), data.lhs) {
            return Propagation::Cutoff;
        }
        let mut reduced = false;
        for &(v, a) in &data.terms {
            if a.abs() <= crate::core::EPS {
                continue;
            }
            let (tmin, tmax) = if a >= 0.0 {
                (a * dom.lb(v), a * dom.ub(v))
            } else {
                (a * dom.ub(v), a * dom.lb(v))
            };
            // from the rhs: a*x <= rhs - minact(others)
            if !num::is_inf(data.rhs) {
                let rest = act.min_without(tmin);
                if !num::is_neg_inf(rest) {
                    let limit = (data.rhs - rest) / a;
                    let t = if a > 0.0 {
                        dom.tighten(v, BoundKind::Upper, limit)
                    } else {
                        dom.tighten(v, BoundKind::Lower, limit)
                    };
                    match t {
                        crate::core::Tightening::Empty => return Propagation::Cutoff,
                        crate::core::Tightening::Tightened => reduced = true,
                        crate::core::Tightening::Unchanged => {}
                    }
                }
            }
            // from the lhs: a*x >= lhs - maxact(others)
            if !num::is_neg_inf(data.lhs) {
                let rest = act.max_without(tmax);
                if !num::is_inf(rest) {
                    let limit = (data.lhs - rest) / a;
                    let t = if a > 0.0 {
                        dom.tighten(v, BoundKind::Lower, limit)
                    } else {
                        dom.tighten(v, BoundKind::Upper, limit)
                    };
                    match t {
                        crate::core::Tightening::Empty => return Propagation::Cutoff,
                        crate::core::Tightening::Tightened => reduced = true,
                        crate::core::Tightening::Unchanged => {}
                    }
                }
            }
        }
        if reduced {
            Propagation::ReducedDomain
        } else {
            Propagation::Unchanged
        }
    }

    fn build_row(
        &self,
        name: &str,
        data: &LinearCons,
        vars: &VarStore,
        lp: &Lp,
        local: bool,
    ) -> Result<LpRow> {
        let (terms, constant) = flatten_terms(vars, &data.terms)?;
        let mut coefs = Vec::with_capacity(terms.len());
        let mut integral = true;
        for (v, a) in terms {
            let col = lp.col_of(v).ok_or_else(|| {
                SolverError::invalid_data(
                    "linear relaxation row",
                    format!("active variable `{}` has no LP column", vars.var(v).name),
                )
            })?;
            if !lp.col(col).integral || !num::integral(a) {
                integral = false;
            }
            coefs.push((col, a));
        }
        let lhs = if num::is_neg_inf(data.lhs) { -INF } else { data.lhs - constant };
        let rhs = if num::is_inf(data.rhs) { INF } else { data.rhs - constant };
        if integral {
            integral = (num::is_neg_inf(lhs) || num::integral(lhs)) && (num::is_inf(rhs) || num::integral(rhs));
        }
        Ok(LpRow {
            name: name.into(),
            coefs,
            lhs,
            rhs,
            local,
            integral,
        })
    }
}

impl Conshdlr for LinearConshdlr {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn desc(&self) -> &'static str {
        "linear constraints lhs <= a^T x <= rhs"
    }

    fn sepa_priority(&self) -> i32 {
        100
    }

    fn enfo_priority(&self) -> i32 {
        -100
    }

    fn check_priority(&self) -> i32 {
        -100
    }

    fn prop_freq(&self) -> i32 {
        1
    }

    fn transform(&self, vars: &VarStore, data: &dyn Any) -> Result<Box<dyn Any>> {
        let orig = data
            .downcast_ref::<LinearCons>()
            .ok_or_else(|| SolverError::invalid_data("transform constraint", "foreign payload"))?;
        let mut terms = SmallVec::with_capacity(orig.terms.len());
        for &(v, a) in &orig.terms {
            let t = vars.transformed_of(v).ok_or_else(|| {
                SolverError::invalid_data(
                    "transform constraint",
                    format!("variable `{}` has no transformed counterpart", vars.var(v).name),
                )
            })?;
            terms.push((t, a));
        }
        Ok(Box::new(LinearCons {
            terms,
            lhs: orig.lhs,
            rhs: orig.rhs,
            row: None,
        }))
    }

    fn check(&self, store: &ConsStore, conss: &[ConsId], args: &CheckArgs) -> Result<Feasibility> {
        let value = |v: VarId| args.sol.value(v);
        for &id in conss {
            let data = self.data(store, id);
            if !args.check_lp_rows && data.row.is_some() {
                continue;
            }
            if data.violated_at(&value) {
                return Ok(Feasibility::Infeasible);
            }
        }
        Ok(Feasibility::Feasible)
    }

    fn enforce_lp(
        &mut self,
        store: &mut ConsStore,
        conss: &[ConsId],
        ctx: &mut EnfoCtx,
    ) -> Result<Enforcement> {
        let primal = match ctx.lp.solution() {
            Some(sol) => sol.primal.clone(),
            None => return Ok(Enforcement::Feasible),
        };
        for &id in conss {
            let (violated, has_row) = {
                let value = |v: VarId| {
                    ctx.lp
                        .col_of(v)
                        .map(|c| primal[c])
                        .unwrap_or_else(|| ctx.dom.lb(v))
                };
                let data = self.data(store, id);
                (data.violated_at(&value), data.row.is_some())
            };
            if !violated {
                continue;
            }
            if has_row {
                // the row is part of the LP, so an optimal LP solution cannot
                // violate it beyond tolerances
                return Ok(Enforcement::Infeasible);
            }
            let local = store.cons(id).owner.is_some();
            let row = self.build_row(&store.cons(id).name, self.data(store, id), ctx.vars, ctx.lp, local)?;
            let idx = ctx.lp.add_row(row);
            store
                .data_mut(id)
                .downcast_mut::<LinearCons>()
                .expect("linear constraint with foreign payload")
                .row = Some(idx);
            return Ok(Enforcement::Separated);
        }
        Ok(Enforcement::Feasible)
    }

    fn enforce_pseudo(
        &mut self,
        store: &ConsStore,
        conss: &[ConsId],
        _vars: &VarStore,
        dom: &mut DomainStore,
    ) -> Result<Enforcement> {
        // the pseudo point puts every variable at one of its current bounds
        let value = |v: VarId| dom.lb(v);
        for &id in conss {
            if self.data(store, id).violated_at(&value) {
                return Ok(Enforcement::Infeasible);
            }
        }
        Ok(Enforcement::Feasible)
    }

    fn lock(&self, store: &ConsStore, cons: ConsId, locks: &mut LockTable) {
        let data = self.data(store, cons);
        let has_lhs = !num::is_neg_inf(data.lhs);
        let has_rhs = !num::is_inf(data.rhs);
        for &(v, a) in &data.terms {
            if a > 0.0 {
                locks.add(v, has_lhs, has_rhs);
            } else if a < 0.0 {
                locks.add(v, has_rhs, has_lhs);
            }
        }
    }

    fn init_lp(
        &mut self,
        store: &mut ConsStore,
        conss: &[ConsId],
        vars: &VarStore,
        lp: &mut Lp,
    ) -> Result<()> {
        for &id in conss {
            if self.data(store, id).row.is_some() {
                continue;
            }
            let row = self.build_row(&store.cons(id).name, self.data(store, id), vars, lp, false)?;
            let idx = lp.add_row(row);
            store
                .data_mut(id)
                .downcast_mut::<LinearCons>()
                .expect("linear constraint with foreign payload")
                .row = Some(idx);
        }
        Ok(())
    }

    fn propagate(
        &mut self,
        store: &ConsStore,
        conss: &[ConsId],
        ctx: &mut PropCtx,
    ) -> Result<Propagation> {
        let mut result = Propagation::Unchanged;
        for &id in conss {
            let data = self.data(store, id);
            match self.propagate_cons(data, ctx.vars, ctx.dom) {
                Propagation::Cutoff => return Ok(Propagation::Cutoff),
                Propagation::ReducedDomain => result = Propagation::ReducedDomain,
                _ => {}
            }
        }
        Ok(result)
    }

    fn resolve_propagation(
        &self,
        store: &ConsStore,
        cons: ConsId,
        _vars: &VarStore,
        dom: &DomainStore,
        inferred: BoundLit,
    ) -> Result<Vec<BoundLit>> {
        let data = self.data(store, cons);
        let a_x = data
            .terms
            .iter()
            .find(|(v, _)| *v == inferred.var)
            .map(|&(_, a)| a)
            .ok_or_else(|| {
                SolverError::invalid_data("resolve propagation", "inferred variable not in constraint")
            })?;
        // an upper bound on a positive coefficient (or lower on a negative
        // one) was deduced from the rhs with the other terms at minimum
        let from_rhs = (inferred.kind == BoundKind::Upper) == (a_x > 0.0);
        let mut reasons = Vec::with_capacity(data.terms.len() - 1);
        for &(v, a) in &data.terms {
            if v == inferred.var {
                continue;
            }
            let at_min = from_rhs == (a > 0.0);
            reasons.push(if at_min {
                BoundLit::lower(v, dom.lb(v))
            } else {
                BoundLit::upper(v, dom.ub(v))
            });
        }
        Ok(reasons)
    }

    fn clone_box(&self) -> Option<Box<dyn Conshdlr>> {
        Some(Box::new(LinearConshdlr::new()))
    }

    fn presolve(
        &mut self,
        store: &mut ConsStore,
        conss: &[ConsId],
        ctx: &mut PresolCtx,
    ) -> Result<PresolOutcome> {
        let mut result = PresolOutcome::Unchanged;
        for &id in conss {
            if store.cons(id).is_deleted() {
                continue;
            }
            let data = self.data(store, id).clone();
            let lb = |v: VarId| ctx.vars.var(v).global.lb;
            let ub = |v: VarId| ctx.vars.var(v).global.ub;
            let act = ActivityBounds::of(&data.terms, &lb, &ub);
            if num::gt(act.min(), data.rhs) || num::lt(act.max(), data.lhs) {
                return Ok(PresolOutcome::Cutoff);
            }
            // redundant: satisfied for every point in the domain box
            if num::ge(act.min(), data.lhs) && num::le(act.max(), data.rhs) {
                ctx.delete_cons(id);
                result = PresolOutcome::Reduced;
                continue;
            }
            // a single term is just a pair of bounds
            if data.terms.len() == 1 {
                let (v, a) = data.terms[0];
                if a.abs() > crate::core::EPS {
                    let (mut lo, mut hi) = (data.lhs / a, data.rhs / a);
                    if a < 0.0 {
                        std::mem::swap(&mut lo, &mut hi);
                    }
                    if !num::is_neg_inf(lo) && ctx.tighten_global(v, true, lo)? {
                        result = PresolOutcome::Reduced;
                    }
                    if !num::is_inf(hi) && ctx.tighten_global(v, false, hi)? {
                        result = PresolOutcome::Reduced;
                    }
                    ctx.delete_cons(id);
                    result = PresolOutcome::Reduced;
                }
                continue;
            }
            // activity based global bound tightening
            for &(v, a) in &data.terms {
                if a.abs() <= crate::core::EPS {
                    continue;
                }
                let (tmin, tmax) = if a >= 0.0 {
                    (a * lb(v), a * ub(v))
                } else {
                    (a * ub(v), a * lb(v))
                };
                if !num::is_inf(data.rhs) {
                    let rest = act.min_without(tmin);
                    if !num::is_neg_inf(rest) {
                        let limit = (data.rhs - rest) / a;
                        if ctx.tighten_global(v, a < 0.0, limit)? {
                            result = PresolOutcome::Reduced;
                        }
                    }
                }
                if !num::is_neg_inf(data.lhs) {
                    let rest = act.max_without(tmax);
                    if !num::is_inf(rest) {
                        let limit = (data.lhs - rest) / a;
                        if ctx.tighten_global(v, a > 0.0, limit)? {
                            result = PresolOutcome::Reduced;
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
    use crate::core::{Domain, VarKind};

    fn setup(bounds: &[(Real, Real)]) -> (VarStore, DomainStore, Vec<VarId>) {
        let mut vars = VarStore::new();
        let mut origs = Vec::new();
        for (i, &(lb, ub)) in bounds.iter().enumerate() {
            origs.push(
                vars.add_original(format!("x{i}"), VarKind::Continuous, lb, ub, 0.0)
                    .unwrap(),
            );
        }
        let ts: Vec<VarId> = origs.iter().map(|&o| vars.transform_var(o, 0.0)).collect();
        let mut dom = DomainStore::new();
        for v in vars.ids() {
            let d = vars.var(v).global.clone();
            let integral = vars.var(v).kind.is_integral();
            dom.register(v, d, integral);
        }
        (vars, dom, ts)
    }

    #[test]
    fn test_activity_propagation() {
        // x + y <= 5 with x in [2, 10], y in [0, 10]
        let (vars, mut dom, t) = setup(&[(2.0, 10.0), (0.0, 10.0)]);
        let hdlr = LinearConshdlr::new();
        let cons = LinearCons::new([(t[0], 1.0), (t[1], 1.0)], -INF, 5.0);
        let res = hdlr.propagate_cons(&cons, &vars, &mut dom);
        assert_eq!(res, Propagation::ReducedDomain);
        assert_eq!(dom.ub(t[0]), 5.0);
        assert_eq!(dom.ub(t[1]), 3.0);
    }

    #[test]
    fn test_propagation_cutoff() {
        // x + y >= 25 with x, y in [0, 10] is fine; >= 25 with ub 10+10 < 25 cuts off
        let (vars, mut dom, t) = setup(&[(0.0, 10.0), (0.0, 10.0)]);
        let hdlr = LinearConshdlr::new();
        let cons = LinearCons::new([(t[0], 1.0), (t[1], 1.0)], 25.0, INF);
        assert_eq!(hdlr.propagate_cons(&cons, &vars, &mut dom), Propagation::Cutoff);
    }

    #[test]
    fn test_negative_coefficient_propagation() {
        // x - y <= 0, x in [3, 10], y in [0, 10]  =>  y >= 3
        let (vars, mut dom, t) = setup(&[(3.0, 10.0), (0.0, 10.0)]);
        let hdlr = LinearConshdlr::new();
        let cons = LinearCons::new([(t[0], 1.0), (t[1], -1.0)], -INF, 0.0);
        let res = hdlr.propagate_cons(&cons, &vars, &mut dom);
        assert_eq!(res, Propagation::ReducedDomain);
        assert_eq!(dom.lb(t[1]), 3.0);
    }

    #[test]
    fn test_flatten_with_fixed_and_aggregated() {
        let (mut vars, _, t) = setup(&[(0.0, 10.0), (0.0, 10.0), (0.0, 10.0)]);
        vars.fix(t[1], 4.0).unwrap();
        vars.aggregate(t[2], t[0], 2.0, 1.0).unwrap();
        // 1*t0 + 3*t1 + 1*t2  =  1*t0 + 12 + (2*t0 + 1)  =  3*t0 + 13
        let (terms, constant) = flatten_terms(&vars, &[(t[0], 1.0), (t[1], 3.0), (t[2], 1.0)]).unwrap();
        assert_eq!(terms, vec![(t[0], 3.0)]);
        assert_eq!(constant, 13.0);
    }

    #[test]
    fn test_resolve_propagation_reasons() {
        // x + y <= 5: ub(x) deduced from lb(y)
        let (vars, mut dom, t) = setup(&[(0.0, 10.0), (2.0, 10.0)]);
        let mut store = ConsStore::new();
        let id = store.add(
            "c",
            0,
            Box::new(LinearCons::new([(t[0], 1.0), (t[1], 1.0)], -INF, 5.0)),
            Default::default(),
            false,
            None,
        );
        let hdlr = LinearConshdlr::new();
        hdlr.propagate_cons(self_data(&store, id), &vars, &mut dom);
        let reasons = hdlr
            .resolve_propagation(&store, id, &vars, &dom, BoundLit::upper(t[0], 3.0))
            .unwrap();
        assert_eq!(reasons, vec![BoundLit::lower(t[1], 2.0)]);
    }

    fn self_data(store: &ConsStore, id: ConsId) -> &LinearCons {
        store.data(id).downcast_ref::<LinearCons>().unwrap()
    }

    #[test]
    fn test_check_with_tolerance() {
        let (vars, _dom, t) = setup(&[(0.0, 1.0), (0.0, 1.0)]);
        let hdlr = LinearConshdlr::new();
        let mut store = ConsStore::new();
        let id = store.add(
            "c",
            0,
            Box::new(LinearCons::new([(t[0], 1.0), (t[1], 1.0)], 1.0, INF)),
            Default::default(),
            false,
            None,
        );
        let mut sol = crate::sol::Sol::new(crate::sol::SolOrigin::Heuristic, "test");
        sol.set(t[0], 1.0);
        let args = CheckArgs {
            vars: &vars,
            sol: &sol,
            check_integrality: true,
            check_lp_rows: true,
        };
        assert_eq!(hdlr.check(&store, &[id], &args).unwrap(), Feasibility::Feasible);
        sol.set(t[0], 0.4);
        let args = CheckArgs {
            vars: &vars,
            sol: &sol,
            check_integrality: true,
            check_lp_rows: true,
        };
        assert_eq!(hdlr.check(&store, &[id], &args).unwrap(), Feasibility::Infeasible);
    }

    #[test]
    fn test_domain_is_restored_after_propagation() {
        use crate::backtrack::Backtrack;
        let (vars, mut dom, t) = setup(&[(0.0, 10.0), (0.0, 10.0)]);
        let hdlr = LinearConshdlr::new();
        let cons = LinearCons::new([(t[0], 1.0), (t[1], 1.0)], -INF, 5.0);
        dom.save_state();
        hdlr.propagate_cons(&cons, &vars, &mut dom);
        assert_eq!(dom.ub(t[0]), 5.0);
        dom.restore_last();
        assert_eq!(dom.ub(t[0]), 10.0);
        assert_eq!(dom.ub(t[1]), 10.0);
    }
}
