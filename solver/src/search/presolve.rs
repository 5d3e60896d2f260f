//! Problem transformation and the presolve driver.

use super::{Solver, Status};
use crate::cons::{LockTable, PresolOutcome};
use crate::core::VarId;
use crate::err::Result;
use crate::plugins::presol::{PresolCounters, PresolCtx};
use crate::prob::ObjSense;
use crate::sol::{Sol, SolOrigin};
use tracing::{debug, info};

impl Solver {
    /// Creates the transformed counterpart of the original problem: one
    /// active variable per original variable (objective normalized to
    /// minimization) and one transformed, globally active constraint per
    /// original constraint.
    pub(super) fn transform(&mut self) -> Result<()> {
        self.obj_sign = match self.prob.objsense {
            ObjSense::Minimize => 1.0,
            ObjSense::Maximize => -1.0,
        };
        for i in 0..self.prob.vars.n_original() {
            let o = VarId::new(i);
            let obj = self.prob.vars.var(o).obj * self.obj_sign;
            self.prob.vars.transform_var(o, obj);
        }
        let originals = self.prob.original_conss().to_vec();
        for c in originals {
            let h = self.prob.conss.cons(c).hdlr;
            let data = self
                .conshdlrs
                .hdlr(h)
                .transform(&self.prob.vars, self.prob.conss.data(c))?;
            let name = format!("t_{}", self.prob.conss.cons(c).name);
            let flags = self.prob.conss.cons(c).flags;
            let id = self.prob.conss.add(name, h, data, flags, false, None);
            self.conshdlrs.activate(&mut self.prob.conss, id);
            self.transformed_conss.push(id);
        }
        debug!(
            vars = self.prob.vars.n_original(),
            conss = self.transformed_conss.len(),
            "problem transformed"
        );
        Ok(())
    }

    /// Collects rounding locks from every enabled constraint.
    pub(super) fn compute_locks(&self) -> LockTable {
        let mut locks = LockTable::new(self.prob.vars.len());
        for h in 0..self.conshdlrs.len() {
            for &id in self.conshdlrs.active_conss(h) {
                if self.prob.conss.cons(id).is_enabled() {
                    self.conshdlrs.hdlr(h).lock(&self.prob.conss, id, &mut locks);
                }
            }
        }
        locks
    }

    /// Runs presolve rounds until no presolver or handler finds a reduction,
    /// or the round limit is hit. Returns a final status if presolve decides
    /// the problem.
    pub(super) fn run_presolve(&mut self) -> Result<Option<Status>> {
        let max_rounds = self.params.get_int("presolving/maxrounds")?;
        let mut round = 0;
        loop {
            if max_rounds >= 0 && round >= max_rounds {
                break;
            }
            round += 1;
            self.stats.presol_rounds += 1;
            let locks = self.compute_locks();
            let mut counters = PresolCounters::default();

            // presolver plugins, by priority
            let order = self
                .plugins
                .presolvers
                .order_by(|i| self.plugins.presolvers.get(i).default_priority());
            for pi in order {
                let mut ctx = PresolCtx::new(&mut self.prob.vars, &locks, &mut counters);
                let outcome = self.plugins.presolvers.get_mut(pi).execute(&mut ctx)?;
                let cutoff = ctx.cutoff_detected();
                let ray = ctx.unbounded_ray();
                let deletions = ctx.take_deletions();
                for id in deletions {
                    if self.prob.conss.cons(id).is_active() {
                        self.conshdlrs.deactivate(&mut self.prob.conss, id);
                    }
                    self.prob.conss.mark_deleted(id);
                }
                match outcome {
                    PresolOutcome::Cutoff => return Ok(Some(Status::Infeasible)),
                    PresolOutcome::Unbounded => {
                        if let Some((v, dir)) = ray {
                            let mut sol = Sol::new(SolOrigin::PrimalRay, "presolve");
                            sol.set(v, dir);
                            self.ray = Some(sol);
                        }
                        return Ok(Some(Status::Unbounded));
                    }
                    _ => {}
                }
                if cutoff {
                    return Ok(Some(Status::Infeasible));
                }
            }

            // constraint handler presolve callbacks
            for h in 0..self.conshdlrs.len() {
                let conss = self.conshdlrs.enabled_conss(&self.prob.conss, h, |_| true);
                if conss.is_empty() && self.conshdlrs.hdlr(h).needs_cons() {
                    continue;
                }
                let mut ctx = PresolCtx::new(&mut self.prob.vars, &locks, &mut counters);
                let outcome =
                    self.conshdlrs
                        .hdlr_mut(h)
                        .presolve(&mut self.prob.conss, &conss, &mut ctx)?;
                let cutoff = ctx.cutoff_detected();
                let deletions = ctx.take_deletions();
                for id in deletions {
                    if self.prob.conss.cons(id).is_active() {
                        self.conshdlrs.deactivate(&mut self.prob.conss, id);
                    }
                    self.prob.conss.mark_deleted(id);
                }
                match outcome {
                    PresolOutcome::Cutoff => return Ok(Some(Status::Infeasible)),
                    PresolOutcome::Unbounded => return Ok(Some(Status::Unbounded)),
                    _ => {}
                }
                if cutoff {
                    return Ok(Some(Status::Infeasible));
                }
            }

            self.stats.presol.nfixed += counters.nfixed;
            self.stats.presol.naggregated += counters.naggregated;
            self.stats.presol.nbounds += counters.nbounds;
            self.stats.presol.ndelconss += counters.ndelconss;
            self.stats.presol.ncoefs += counters.ncoefs;
            self.stats.presol.nsides += counters.nsides;
            if counters.total() == 0 {
                break;
            }
        }
        // a presolve reduction may have emptied a global domain
        for v in self.prob.vars.active().collect::<Vec<_>>() {
            if self.prob.vars.var(v).global.is_empty() {
                return Ok(Some(Status::Infeasible));
            }
        }
        info!(
            rounds = self.stats.presol_rounds,
            fixed = self.stats.presol.nfixed,
            bounds = self.stats.presol.nbounds,
            delconss = self.stats.presol.ndelconss,
            "presolve finished"
        );
        Ok(None)
    }
}
