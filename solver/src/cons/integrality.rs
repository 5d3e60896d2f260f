//! The integrality "handler": a constraint handler without constraints that
//! reports fractional LP solutions as infeasible so the engine branches.

use super::{
    CheckArgs, Conshdlr, ConsId, ConsStore, EnfoCtx, Enforcement, Feasibility, LockTable,
};
use crate::core::{num, DomainStore, VarStore};
use crate::err::{Result, SolverError};
use std::any::Any;

#[derive(Default)]
pub struct IntegralityConshdlr;

impl IntegralityConshdlr {
    pub fn new() -> Self {
        IntegralityConshdlr
    }
}

impl Conshdlr for IntegralityConshdlr {
    fn name(&self) -> &'static str {
        "integrality"
    }

    fn desc(&self) -> &'static str {
        "integrality of integer variables"
    }

    fn enfo_priority(&self) -> i32 {
        0
    }

    fn check_priority(&self) -> i32 {
        0
    }

    fn needs_cons(&self) -> bool {
        false
    }

    fn transform(&self, _vars: &VarStore, _data: &dyn Any) -> Result<Box<dyn Any>> {
        Err(SolverError::invalid_data(
            "transform constraint",
            "the integrality handler carries no constraints",
        ))
    }

    fn check(&self, _store: &ConsStore, _conss: &[ConsId], args: &CheckArgs) -> Result<Feasibility> {
        if !args.check_integrality {
            return Ok(Feasibility::Feasible);
        }
        for v in args.vars.active() {
            if args.vars.var(v).kind.is_integral() && !num::integral(args.sol.value(v)) {
                return Ok(Feasibility::Infeasible);
            }
        }
        Ok(Feasibility::Feasible)
    }

    fn enforce_lp(
        &mut self,
        _store: &mut ConsStore,
        _conss: &[ConsId],
        ctx: &mut EnfoCtx,
    ) -> Result<Enforcement> {
        let Some(sol) = ctx.lp.solution() else {
            return Ok(Enforcement::Feasible);
        };
        for (c, col) in ctx.lp.cols().iter().enumerate() {
            if col.integral && !num::integral(sol.primal[c]) {
                return Ok(Enforcement::Infeasible);
            }
        }
        Ok(Enforcement::Feasible)
    }

    fn enforce_pseudo(
        &mut self,
        _store: &ConsStore,
        _conss: &[ConsId],
        vars: &VarStore,
        dom: &mut DomainStore,
    ) -> Result<Enforcement> {
        // the pseudo point sits on variable bounds, which are integral for
        // integral variables by the domain invariant
        for v in vars.active() {
            if vars.var(v).kind.is_integral() && !num::integral(dom.lb(v)) {
                return Ok(Enforcement::Infeasible);
            }
        }
        Ok(Enforcement::Feasible)
    }

    fn lock(&self, _store: &ConsStore, _cons: ConsId, _locks: &mut LockTable) {}

    fn clone_box(&self) -> Option<Box<dyn Conshdlr>> {
        Some(Box::new(IntegralityConshdlr::new()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::VarKind;
    use crate::sol::{Sol, SolOrigin};

    #[test]
    fn test_integrality_check() {
        let mut vars = VarStore::new();
        let o = vars
            .add_original("x", VarKind::Integer, 0.0, 10.0, 0.0)
            .unwrap();
        let t = vars.transform_var(o, 0.0);
        let store = ConsStore::new();
        let hdlr = IntegralityConshdlr::new();

        let mut sol = Sol::new(SolOrigin::Heuristic, "test");
        sol.set(t, 3.0);
        let args = CheckArgs {
            vars: &vars,
            sol: &sol,
            check_integrality: true,
            check_lp_rows: true,
        };
        assert_eq!(hdlr.check(&store, &[], &args).unwrap(), Feasibility::Feasible);

        sol.set(t, 3.4);
        let args = CheckArgs {
            vars: &vars,
            sol: &sol,
            check_integrality: true,
            check_lp_rows: true,
        };
        assert_eq!(hdlr.check(&store, &[], &args).unwrap(), Feasibility::Infeasible);

        // the caller may vouch for integrality
        let args = CheckArgs {
            vars: &vars,
            sol: &sol,
            check_integrality: false,
            check_lp_rows: true,
        };
        assert_eq!(hdlr.check(&store, &[], &args).unwrap(), Feasibility::Feasible);
    }
}
