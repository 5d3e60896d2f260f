//! Primal heuristic plugins and their execution context.

use crate::cons::{check_solution, solution_objective, ConshdlrSet, ConsStore, Feasibility};
use crate::core::{num, DomainStore, Real, VarId, VarStore};
use crate::err::Result;
use crate::lp::{Lp, LpStatus};
use crate::params::ParamStore;
use crate::sol::{Sol, SolOrigin, SolStore};

/// In which node contexts a heuristic may run.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HeurTiming {
    /// Only when the node's LP relaxation was solved.
    AfterLpNode,
    /// Only when the node was resolved without an LP (pseudo solution).
    AfterPseudoNode,
    Both,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HeurOutcome {
    DidNotRun,
    NoSolution,
    FoundSolution,
}

/// Context of a heuristic call. Offers candidate solutions to the store
/// through [`HeurCtx::try_solution`], which runs the constraint handlers'
/// check pass.
pub struct HeurCtx<'a> {
    pub vars: &'a VarStore,
    pub dom: &'a DomainStore,
    pub lp: &'a mut Lp,
    pub depth: u32,
    pub params: &'a ParamStore,
    hdlrs: &'a ConshdlrSet,
    conss: &'a ConsStore,
    sols: &'a mut SolStore,
    accepted: usize,
}

impl<'a> HeurCtx<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vars: &'a VarStore,
        dom: &'a DomainStore,
        lp: &'a mut Lp,
        depth: u32,
        params: &'a ParamStore,
        hdlrs: &'a ConshdlrSet,
        conss: &'a ConsStore,
        sols: &'a mut SolStore,
    ) -> Self {
        HeurCtx {
            vars,
            dom,
            lp,
            depth,
            params,
            hdlrs,
            conss,
            sols,
            accepted: 0,
        }
    }

    /// Offers a candidate to the solution store: the handler check loop runs
    /// with the given skip flags, feasible solutions enter the pool.
    /// Returns true if the solution was accepted.
    pub fn try_solution(
        &mut self,
        mut sol: Sol,
        check_integrality: bool,
        check_lp_rows: bool,
    ) -> Result<bool> {
        sol.obj = solution_objective(self.vars, &sol);
        let feas = check_solution(
            self.hdlrs,
            self.conss,
            self.vars,
            &sol,
            check_integrality,
            check_lp_rows,
        )?;
        if feas == Feasibility::Infeasible {
            return Ok(false);
        }
        self.sols.add(sol);
        self.accepted += 1;
        Ok(true)
    }

    pub fn naccepted(&self) -> usize {
        self.accepted
    }
}

pub trait Heuristic {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    /// Single character shown in solution logs.
    fn display_char(&self) -> char;

    /// Default calling frequency in nodes (`-1` never, `0` only at the root).
    fn default_freq(&self) -> i32;

    fn default_priority(&self) -> i32;

    fn timing(&self) -> HeurTiming {
        HeurTiming::AfterLpNode
    }

    /// True if the heuristic enters the LP dive substate.
    fn uses_dive(&self) -> bool {
        false
    }

    fn execute(&mut self, ctx: &mut HeurCtx) -> Result<HeurOutcome>;

    /// Copy for spawning subordinate engines; `None` marks the heuristic as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn Heuristic>> {
        None
    }
}

/// Rounds the LP relaxation solution to the nearest integral point.
#[derive(Default)]
pub struct RoundingHeur;

impl RoundingHeur {
    pub fn new() -> Self {
        RoundingHeur
    }
}

impl Heuristic for RoundingHeur {
    fn name(&self) -> &'static str {
        "rounding"
    }

    fn desc(&self) -> &'static str {
        "round the LP solution to the nearest integral point"
    }

    fn display_char(&self) -> char {
        'r'
    }

    fn default_freq(&self) -> i32 {
        1
    }

    fn default_priority(&self) -> i32 {
        -1000
    }

    fn clone_box(&self) -> Option<Box<dyn Heuristic>> {
        Some(Box::new(RoundingHeur))
    }

    fn execute(&mut self, ctx: &mut HeurCtx) -> Result<HeurOutcome> {
        if ctx.lp.status() != LpStatus::Optimal {
            return Ok(HeurOutcome::DidNotRun);
        }
        let mut sol = Sol::new(SolOrigin::LpRound, self.name());
        for v in ctx.vars.active() {
            let val = ctx.lp.value_of(v).unwrap_or_else(|| ctx.dom.lb(v));
            let val = if ctx.vars.var(v).kind.is_integral() {
                val.round().clamp(ctx.dom.lb(v), ctx.dom.ub(v))
            } else {
                val
            };
            sol.set(v, val);
        }
        if ctx.try_solution(sol, false, true)? {
            Ok(HeurOutcome::FoundSolution)
        } else {
            Ok(HeurOutcome::NoSolution)
        }
    }
}

/// Fractional diving: repeatedly rounds the least fractional integer variable
/// toward its nearest integer inside an LP dive and re-solves, until the LP
/// solution becomes integral or the dive dead-ends.
pub struct FracDivingHeur {
    max_iters: u32,
}

impl FracDivingHeur {
    pub fn new() -> Self {
        FracDivingHeur { max_iters: 100 }
    }

    fn dive(&self, ctx: &mut HeurCtx) -> Result<HeurOutcome> {
        for _ in 0..self.max_iters {
            let primal = match ctx.lp.solution() {
                Some(sol) => sol.primal.clone(),
                None => return Ok(HeurOutcome::NoSolution),
            };
            // least fractional integer column
            let mut cand: Option<(usize, Real, Real)> = None; // (col, value, dist)
            for c in 0..ctx.lp.ncols() {
                if !ctx.lp.col(c).integral {
                    continue;
                }
                let val = primal[c];
                if num::integral(val) {
                    continue;
                }
                let dist = (val - val.round()).abs();
                if cand.map(|(_, _, d)| dist < d).unwrap_or(true) {
                    cand = Some((c, val, dist));
                }
            }
            let Some((c, val, _)) = cand else {
                // integral LP solution: offer it
                let mut sol = Sol::new(SolOrigin::Diving, "fracdiving");
                for v in ctx.vars.active() {
                    let raw = ctx
                        .lp
                        .col_of(v)
                        .map(|c| primal[c])
                        .unwrap_or_else(|| ctx.dom.lb(v));
                    let val = if ctx.vars.var(v).kind.is_integral() {
                        raw.round()
                    } else {
                        raw
                    };
                    sol.set(v, val);
                }
                return if ctx.try_solution(sol, false, true)? {
                    Ok(HeurOutcome::FoundSolution)
                } else {
                    Ok(HeurOutcome::NoSolution)
                };
            };
            // round toward the nearest integer and re-solve
            let rounded = val.round();
            let (lb, ub) = (ctx.lp.col(c).lb, ctx.lp.col(c).ub);
            if rounded >= val {
                ctx.lp.set_col_bounds(c, rounded.min(ub).max(lb), ub);
            } else {
                ctx.lp.set_col_bounds(c, lb, rounded.max(lb).min(ub));
            }
            if ctx.lp.solve()? != LpStatus::Optimal {
                return Ok(HeurOutcome::NoSolution);
            }
        }
        Ok(HeurOutcome::NoSolution)
    }
}

impl Default for FracDivingHeur {
    fn default() -> Self {
        FracDivingHeur::new()
    }
}

impl Heuristic for FracDivingHeur {
    fn name(&self) -> &'static str {
        "fracdiving"
    }

    fn desc(&self) -> &'static str {
        "LP diving toward the nearest integers"
    }

    fn display_char(&self) -> char {
        'd'
    }

    fn default_freq(&self) -> i32 {
        10
    }

    fn default_priority(&self) -> i32 {
        -1003
    }

    fn uses_dive(&self) -> bool {
        true
    }

    fn clone_box(&self) -> Option<Box<dyn Heuristic>> {
        Some(Box::new(FracDivingHeur::new()))
    }

    fn execute(&mut self, ctx: &mut HeurCtx) -> Result<HeurOutcome> {
        if ctx.lp.status() != LpStatus::Optimal {
            return Ok(HeurOutcome::DidNotRun);
        }
        ctx.lp.start_dive()?;
        let outcome = self.dive(ctx);
        ctx.lp.end_dive()?;
        match outcome {
            // an LP failure only spoils the dive, the engine state is intact
            Err(crate::err::SolverError::LpError { .. }) => Ok(HeurOutcome::NoSolution),
            other => other,
        }
    }
}
