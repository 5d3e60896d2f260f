//! Bound disjunction constraints: `(x1 >= v1) or (x2 <= v2) or ...`.
//!
//! The learning target of conflict analysis: a node proven infeasible yields
//! the disjunction of the negated branching bounds on its ancestor path.

use super::{
    CheckArgs, Conshdlr, ConsId, ConsStore, EnfoCtx, Enforcement, Feasibility, LockTable, PropCtx,
    Propagation,
};
use crate::core::{BoundKind, BoundLit, DomainStore, Tightening, VarId, VarStore};
use crate::err::{Result, SolverError};
use std::any::Any;

#[derive(Clone, Debug)]
pub struct BoundDisjCons {
    pub lits: Vec<BoundLit>,
}

impl BoundDisjCons {
    pub fn new(lits: Vec<BoundLit>) -> BoundDisjCons {
        BoundDisjCons { lits }
    }
}

#[derive(Default)]
pub struct BoundDisjConshdlr;

impl BoundDisjConshdlr {
    pub fn new() -> Self {
        BoundDisjConshdlr
    }

    fn data<'a>(&self, store: &'a ConsStore, id: ConsId) -> &'a BoundDisjCons {
        store
            .data(id)
            .downcast_ref::<BoundDisjCons>()
            .expect("bound disjunction with foreign payload")
    }

    fn propagate_cons(&self, data: &BoundDisjCons, dom: &mut DomainStore) -> Propagation {
        let mut undecided: Option<BoundLit> = None;
        for lit in &data.lits {
            if lit.entailed_in(dom) {
                return Propagation::Unchanged; // already satisfied
            }
            if lit.impossible_in(dom) {
                continue;
            }
            if undecided.is_some() {
                return Propagation::Unchanged; // at least two open literals
            }
            undecided = Some(*lit);
        }
        match undecided {
            None => Propagation::Cutoff,
            Some(lit) => {
                // unit: the last open literal must hold
                let t = match lit.kind {
                    BoundKind::Lower => dom.tighten_lb(lit.var, lit.val),
                    BoundKind::Upper => dom.tighten_ub(lit.var, lit.val),
                };
                match t {
                    Tightening::Empty => Propagation::Cutoff,
                    Tightening::Tightened => Propagation::ReducedDomain,
                    Tightening::Unchanged => Propagation::Unchanged,
                }
            }
        }
    }
}

impl Conshdlr for BoundDisjConshdlr {
    fn name(&self) -> &'static str {
        "bounddisj"
    }

    fn desc(&self) -> &'static str {
        "disjunctions of variable bounds"
    }

    fn enfo_priority(&self) -> i32 {
        -300
    }

    fn check_priority(&self) -> i32 {
        -300
    }

    fn prop_freq(&self) -> i32 {
        1
    }

    fn transform(&self, _vars: &VarStore, data: &dyn Any) -> Result<Box<dyn Any>> {
        // bound disjunctions are created during search, directly on
        // transformed variables
        let orig = data
            .downcast_ref::<BoundDisjCons>()
            .ok_or_else(|| SolverError::invalid_data("transform constraint", "foreign payload"))?;
        Ok(Box::new(orig.clone()))
    }

    fn check(&self, store: &ConsStore, conss: &[ConsId], args: &CheckArgs) -> Result<Feasibility> {
        for &id in conss {
            let data = self.data(store, id);
            if !data.lits.iter().any(|l| l.holds_at(args.sol.value(l.var))) {
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
        let value = |v: VarId| {
            ctx.lp
                .col_of(v)
                .and_then(|c| ctx.lp.solution().map(|s| s.primal[c]))
                .unwrap_or_else(|| ctx.dom.lb(v))
        };
        for &id in conss {
            let data = self.data(store, id);
            if !data.lits.iter().any(|l| l.holds_at(value(l.var))) {
                return Ok(Enforcement::Infeasible);
            }
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
        for &id in conss {
            let data = self.data(store, id);
            if !data.lits.iter().any(|l| l.holds_at(dom.lb(l.var))) {
                return Ok(Enforcement::Infeasible);
            }
        }
        Ok(Enforcement::Feasible)
    }

    fn lock(&self, store: &ConsStore, cons: ConsId, locks: &mut LockTable) {
        for lit in &self.data(store, cons).lits {
            match lit.kind {
                BoundKind::Lower => locks.add(lit.var, true, false),
                BoundKind::Upper => locks.add(lit.var, false, true),
            }
        }
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
            match self.propagate_cons(data, ctx.dom) {
                Propagation::Cutoff => return Ok(Propagation::Cutoff),
                Propagation::ReducedDomain => result = Propagation::ReducedDomain,
                _ => {}
            }
        }
        Ok(result)
    }

    fn clone_box(&self) -> Option<Box<dyn Conshdlr>> {
        Some(Box::new(BoundDisjConshdlr::new()))
    }

    fn resolve_propagation(
        &self,
        store: &ConsStore,
        cons: ConsId,
        _vars: &VarStore,
        dom: &DomainStore,
        inferred: BoundLit,
    ) -> Result<Vec<BoundLit>> {
        // the unit literal was forced because every other literal is
        // impossible under the current bounds
        let data = self.data(store, cons);
        let mut reasons = Vec::new();
        for lit in &data.lits {
            if lit.var == inferred.var && lit.kind == inferred.kind {
                continue;
            }
            match lit.kind {
                BoundKind::Lower => reasons.push(BoundLit::upper(lit.var, dom.ub(lit.var))),
                BoundKind::Upper => reasons.push(BoundLit::lower(lit.var, dom.lb(lit.var))),
            }
        }
        Ok(reasons)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{Domain, VarKind};

    fn setup() -> (VarStore, DomainStore, Vec<VarId>) {
        let mut vars = VarStore::new();
        let mut origs = Vec::new();
        for i in 0..2 {
            origs.push(
                vars.add_original(format!("x{i}"), VarKind::Integer, 0.0, 10.0, 0.0)
                    .unwrap(),
            );
        }
        let t: Vec<VarId> = origs.iter().map(|&o| vars.transform_var(o, 0.0)).collect();
        let mut dom = DomainStore::new();
        for v in vars.ids() {
            dom.register(v, Domain::new(0.0, 10.0), true);
        }
        (vars, dom, t)
    }

    #[test]
    fn test_unit_propagation() {
        let (_vars, mut dom, t) = setup();
        let hdlr = BoundDisjConshdlr::new();
        // (x0 >= 8) or (x1 <= 2); make x0 >= 8 impossible
        let data = BoundDisjCons::new(vec![BoundLit::lower(t[0], 8.0), BoundLit::upper(t[1], 2.0)]);
        dom.tighten_ub(t[0], 5.0);
        assert_eq!(hdlr.propagate_cons(&data, &mut dom), Propagation::ReducedDomain);
        assert_eq!(dom.ub(t[1]), 2.0);
    }

    #[test]
    fn test_conflict_detection() {
        let (_vars, mut dom, t) = setup();
        let hdlr = BoundDisjConshdlr::new();
        let data = BoundDisjCons::new(vec![BoundLit::lower(t[0], 8.0), BoundLit::upper(t[1], 2.0)]);
        dom.tighten_ub(t[0], 5.0);
        dom.tighten_lb(t[1], 4.0);
        assert_eq!(hdlr.propagate_cons(&data, &mut dom), Propagation::Cutoff);
    }

    #[test]
    fn test_satisfied_is_left_alone(){
        let (_vars, mut dom, t) = setup();
        let hdlr = BoundDisjConshdlr::new();
        let data = BoundDisjCons::new(vec![BoundLit::lower(t[0], 8.0), BoundLit::upper(t[1], 2.0)]);
        dom.tighten_lb(t[0], 9.0);
        assert_eq!(hdlr.propagate_cons(&data, &mut dom), Propagation::Unchanged);
    }
}
