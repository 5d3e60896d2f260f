//! The search engine: orchestrates presolve, the node loop, LP solving,
//! separation, enforcement, branching and heuristics.

mod presolve;
pub mod limits;
pub mod stats;

pub use limits::{Limits, StopReason};
pub use stats::Stats;

use crate::cons::bounddisj::{BoundDisjCons, BoundDisjConshdlr};
use crate::cons::integrality::IntegralityConshdlr;
use crate::cons::linear::{LinearCons, LinearConshdlr};
use crate::cons::{
    check_solution, ConsFlags, ConsId, ConshdlrSet, EnfoCtx, Enforcement, Feasibility, PropCtx,
    Propagation, SepaOutcome,
};
use crate::core::var::pseudo_objective;
use crate::core::{num, DomainStore, NodeId, Real, VarId, VarKind, INF};
use crate::err::{Result, SolverError};
use crate::lp::simplex::SimplexBackend;
use crate::lp::{Lp, LpCol, LpRow, LpStatus};
use crate::params::{ParamStore, ParamValue};
use crate::plugins::branching::{canonical_children, most_fractional, BranchCand, Branching, ChildSpec};
use crate::plugins::conflict::{ConflictCtx, ConflictSource, PathNoGoodHook};
use crate::plugins::heur::{FracDivingHeur, HeurCtx, HeurOutcome, HeurTiming, RoundingHeur};
use crate::plugins::nodesel::{BestBoundSel, DepthFirstSel, NodeSelector};
use crate::plugins::presol::DualFixPresolver;
use crate::plugins::pricer::{PriceCtx, PriceOutcome, Pricer};
use crate::plugins::prop::{Propagator, VarBoundProp};
use crate::plugins::reader::{read_problem, CipReader, Reader};
use crate::plugins::sepa::{Cut, GomorySep, ScoredCut, SepaCtx, Separator};
use crate::plugins::Plugins;
use crate::prob::{ObjSense, Problem};
use crate::sol::{Sol, SolOrigin, SolStore};
use crate::tree::{Applied, NodeQueue, NodeSetChange, NodeState, Tree};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Observable engine state.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Status {
    Uninitialized,
    Presolving,
    Solving,
    Optimal,
    Infeasible,
    Unbounded,
    Aborted,
}

/// Cap on the propagate/LP/separate/enforce cycles within one node.
const MAX_NODE_LOOPS: u32 = 100;

/// Cap on pricing rounds per LP solve.
const MAX_PRICE_ROUNDS: u32 = 10;

enum EnfOutcome {
    Feasible,
    Infeasible,
    Cutoff,
    /// A handler separated; the LP must be re-solved.
    Resolve,
    /// A handler reduced a domain or added a constraint; re-propagate.
    Repropagate,
    Branched(Vec<ChildSpec>),
}

enum SepaRound {
    NoCuts,
    Added,
    Cutoff,
}

/// The engine: owns the problem, the plugin registries and all solving state.
pub struct Solver {
    pub params: ParamStore,
    pub plugins: Plugins,
    pub conshdlrs: ConshdlrSet,
    pub prob: Problem,
    pub stats: Stats,
    limits: Limits,
    status: Status,
    stop_reason: Option<StopReason>,

    dom: DomainStore,
    lp: Lp,
    tree: Tree,
    queue: NodeQueue,
    sols: SolStore,
    ray: Option<Sol>,

    obj_sign: Real,
    objlimit_t: Real,
    transformed_conss: Vec<ConsId>,
    bounddisj_hdlr: usize,

    /// Applied nodes, root first.
    path: Vec<NodeId>,
    /// LP row count at entry of each path level.
    lp_rows_at: Vec<usize>,
    cutpool: Vec<Cut>,

    active_nodesel: usize,
    branch_order: Vec<usize>,
    sepa_order: Vec<usize>,
    heur_order: Vec<usize>,
    pricer_order: Vec<usize>,
    conflict_order: Vec<usize>,
    prop_entries: Vec<(PropEntry, i32)>,
    prop_state: Vec<Option<(u64, u64)>>,
}

#[derive(Copy, Clone)]
enum PropEntry {
    Hdlr(usize),
    Plugin(usize),
}

impl Solver {
    /// Creates an engine with the default plugin set and parameters.
    pub fn new() -> Result<Solver> {
        let mut solver = Solver::bare()?;
        solver.include_defaults()?;
        Ok(solver)
    }

    /// Creates an engine with the engine parameters but no plugins at all.
    fn bare() -> Result<Solver> {
        let mut solver = Solver {
            params: ParamStore::new(),
            plugins: Plugins::new(),
            conshdlrs: ConshdlrSet::new(),
            prob: Problem::new("unnamed"),
            stats: Stats::new(),
            limits: Limits::new(),
            status: Status::Uninitialized,
            stop_reason: None,
            dom: DomainStore::new(),
            lp: Lp::new(Box::new(SimplexBackend::new())),
            tree: Tree::new(),
            queue: NodeQueue::new(),
            sols: SolStore::new(100),
            ray: None,
            obj_sign: 1.0,
            objlimit_t: INF,
            transformed_conss: Vec::new(),
            bounddisj_hdlr: 0,
            path: Vec::new(),
            lp_rows_at: Vec::new(),
            cutpool: Vec::new(),
            active_nodesel: 0,
            branch_order: Vec::new(),
            sepa_order: Vec::new(),
            heur_order: Vec::new(),
            pricer_order: Vec::new(),
            conflict_order: Vec::new(),
            prop_entries: Vec::new(),
            prop_state: Vec::new(),
        };
        solver.register_engine_params()?;
        Ok(solver)
    }

    /// Creates an independent engine for a sub-problem (e.g. of an improvement
    /// heuristic or a decomposition): plugins are copied through their clone
    /// slots (non-cloneable ones are skipped with a warning) and the current
    /// parameter values carry over. The caller builds the sub-problem and runs
    /// the subordinate while this engine is paused.
    pub fn subordinate(&self) -> Result<Solver> {
        let mut sub = Solver::bare()?;
        for h in 0..self.conshdlrs.len() {
            match self.conshdlrs.hdlr(h).clone_box() {
                Some(copy) => {
                    sub.include_conshdlr(copy)?;
                }
                None => warn!(hdlr = self.conshdlrs.hdlr(h).name(), "handler is not cloneable, skipped"),
            }
        }
        sub.bounddisj_hdlr = sub.conshdlrs.find("bounddisj").unwrap_or(0);
        for i in 0..self.plugins.nodesels.len() {
            match self.plugins.nodesels.get(i).clone_box() {
                Some(copy) => {
                    sub.include_nodesel(copy)?;
                }
                None => warn!(plugin = self.plugins.nodesels.name(i), "node selector is not cloneable, skipped"),
            }
        }
        for i in 0..self.plugins.branchrules.len() {
            match self.plugins.branchrules.get(i).clone_box() {
                Some(copy) => {
                    sub.include_branchrule(copy)?;
                }
                None => warn!(plugin = self.plugins.branchrules.name(i), "branching rule is not cloneable, skipped"),
            }
        }
        for i in 0..self.plugins.separators.len() {
            match self.plugins.separators.get(i).clone_box() {
                Some(copy) => {
                    sub.include_separator(copy)?;
                }
                None => warn!(plugin = self.plugins.separators.name(i), "separator is not cloneable, skipped"),
            }
        }
        for i in 0..self.plugins.propagators.len() {
            match self.plugins.propagators.get(i).clone_box() {
                Some(copy) => {
                    sub.include_propagator(copy)?;
                }
                None => warn!(plugin = self.plugins.propagators.name(i), "propagator is not cloneable, skipped"),
            }
        }
        for i in 0..self.plugins.heuristics.len() {
            match self.plugins.heuristics.get(i).clone_box() {
                Some(copy) => {
                    sub.include_heuristic(copy)?;
                }
                None => warn!(plugin = self.plugins.heuristics.name(i), "heuristic is not cloneable, skipped"),
            }
        }
        for i in 0..self.plugins.presolvers.len() {
            match self.plugins.presolvers.get(i).clone_box() {
                Some(copy) => {
                    sub.include_presolver(copy)?;
                }
                None => warn!(plugin = self.plugins.presolvers.name(i), "presolver is not cloneable, skipped"),
            }
        }
        for i in 0..self.plugins.readers.len() {
            match self.plugins.readers.get(i).clone_box() {
                Some(copy) => {
                    sub.include_reader(copy)?;
                }
                None => warn!(plugin = self.plugins.readers.name(i), "reader is not cloneable, skipped"),
            }
        }
        for i in 0..self.plugins.pricers.len() {
            match self.plugins.pricers.get(i).clone_box() {
                Some(copy) => {
                    sub.include_pricer(copy)?;
                }
                None => warn!(plugin = self.plugins.pricers.name(i), "pricer is not cloneable, skipped"),
            }
        }
        for i in 0..self.plugins.conflict_hooks.len() {
            match self.plugins.conflict_hooks.get(i).clone_box() {
                Some(copy) => {
                    sub.include_conflict_hook(copy)?;
                }
                None => warn!(plugin = self.plugins.conflict_hooks.name(i), "conflict hook is not cloneable, skipped"),
            }
        }
        // carry the current parameter values over where the names survive
        let values: Vec<(String, ParamValue)> = self
            .params
            .iter()
            .map(|p| (p.name().to_string(), p.value().clone()))
            .collect();
        for (name, value) in values {
            if sub.params.contains(&name) {
                sub.params.set(&name, value)?;
            }
        }
        Ok(sub)
    }

    fn register_engine_params(&mut self) -> Result<()> {
        let p = &mut self.params;
        p.add_real("limits/time", "solving time limit in seconds", INF, 0.0, INF)?;
        p.add_longint("limits/nodes", "node limit (-1: unlimited)", -1, -1, i64::MAX)?;
        p.add_real("limits/memory", "memory limit in MB", 8192.0, 1.0, INF)?;
        p.add_real("limits/gap", "stop when the relative gap falls below this", 0.0, 0.0, INF)?;
        p.add_real(
            "limits/objective",
            "only accept solutions at least as good as this original objective value",
            INF,
            -INF,
            INF,
        )?;
        p.add_int("separating/maxrounds", "separation rounds per node (-1: unlimited)", 5, -1, i32::MAX)?;
        p.add_int(
            "separating/maxroundsroot",
            "separation rounds at the root (-1: unlimited)",
            10,
            -1,
            i32::MAX,
        )?;
        p.add_real("separating/minefficacy", "minimal violation/norm of an accepted cut", 1e-4, 0.0, INF)?;
        p.add_bool("separating/scaleintegral", "try to scale cut coefficients to integers", true)?;
        p.add_bool(
            "separating/dropnonintegral",
            "discard cuts whose coefficients cannot be scaled to integers",
            false,
        )?;
        p.add_int("presolving/maxrounds", "presolve rounds (-1: unlimited)", 10, -1, i32::MAX)?;
        p.add_int("solution/poolsize", "number of best solutions kept", 100, 1, i32::MAX)?;
        p.add_bool("conflict/enable", "learn conflict constraints", true)?;
        p.add_int("conflict/maxlength", "longest learned bound disjunction", 50, 1, i32::MAX)?;
        Ok(())
    }

    fn include_defaults(&mut self) -> Result<()> {
        self.include_conshdlr(Box::new(IntegralityConshdlr::new()))?;
        self.include_conshdlr(Box::new(LinearConshdlr::new()))?;
        self.bounddisj_hdlr = self.include_conshdlr(Box::new(BoundDisjConshdlr::new()))?;
        self.include_nodesel(Box::new(DepthFirstSel::new()))?;
        self.include_nodesel(Box::new(BestBoundSel::new()))?;
        self.include_branchrule(Box::new(crate::plugins::branching::MostFracBranching::new()))?;
        self.include_separator(Box::new(GomorySep::new()))?;
        self.include_propagator(Box::new(VarBoundProp::new()))?;
        self.include_heuristic(Box::new(RoundingHeur::new()))?;
        self.include_heuristic(Box::new(FracDivingHeur::new()))?;
        self.include_presolver(Box::new(DualFixPresolver::new()))?;
        self.include_reader(Box::new(CipReader::new()))?;
        self.include_conflict_hook(Box::new(PathNoGoodHook::new()))?;
        Ok(())
    }

    fn assert_registration_open(&self, op: &'static str) -> Result<()> {
        if self.status != Status::Uninitialized {
            return Err(SolverError::invalid_data(
                op,
                "plugins can only be registered before solving starts",
            ));
        }
        Ok(())
    }

    pub fn include_conshdlr(&mut self, hdlr: Box<dyn crate::cons::Conshdlr>) -> Result<usize> {
        self.assert_registration_open("register constraint handler")?;
        self.conshdlrs.register(hdlr)
    }

    pub fn include_nodesel(&mut self, sel: Box<dyn NodeSelector>) -> Result<usize> {
        self.assert_registration_open("register node selector")?;
        let name = sel.name();
        self.params.add_int(
            &format!("nodeselection/{name}/stdpriority"),
            "standard priority of the node selector",
            sel.std_priority(),
            i32::MIN,
            i32::MAX,
        )?;
        self.params.add_int(
            &format!("nodeselection/{name}/memsavepriority"),
            "priority in memory saving mode",
            sel.memsave_priority(),
            i32::MIN,
            i32::MAX,
        )?;
        self.plugins.nodesels.register(name, sel)
    }

    pub fn include_branchrule(&mut self, rule: Box<dyn crate::plugins::branching::BranchRule>) -> Result<usize> {
        self.assert_registration_open("register branching rule")?;
        let name = rule.name();
        self.params.add_int(
            &format!("branching/{name}/priority"),
            "priority of the branching rule",
            rule.default_priority(),
            i32::MIN,
            i32::MAX,
        )?;
        self.plugins.branchrules.register(name, rule)
    }

    pub fn include_separator(&mut self, sep: Box<dyn Separator>) -> Result<usize> {
        self.assert_registration_open("register separator")?;
        let name = sep.name();
        self.params.add_int(
            &format!("separating/{name}/maxrounds"),
            "separation rounds of this separator per node (-1: unlimited)",
            sep.default_maxrounds(),
            -1,
            i32::MAX,
        )?;
        self.params.add_int(
            &format!("separating/{name}/maxroundsroot"),
            "separation rounds of this separator at the root (-1: unlimited)",
            sep.default_maxrounds_root(),
            -1,
            i32::MAX,
        )?;
        self.params.add_int(
            &format!("separating/{name}/maxsepacuts"),
            "cuts per round of this separator",
            sep.default_maxsepacuts(),
            0,
            i32::MAX,
        )?;
        self.params.add_int(
            &format!("separating/{name}/maxsepacutsroot"),
            "cuts per round of this separator at the root",
            sep.default_maxsepacuts_root(),
            0,
            i32::MAX,
        )?;
        sep.register_params(&mut self.params)?;
        self.plugins.separators.register(name, sep)
    }

    pub fn include_propagator(&mut self, prop: Box<dyn Propagator>) -> Result<usize> {
        self.assert_registration_open("register propagator")?;
        let name = prop.name();
        self.params.add_int(
            &format!("propagating/{name}/freq"),
            "calling frequency in depth (-1: never, 0: only presolve)",
            prop.default_freq(),
            -1,
            i32::MAX,
        )?;
        self.params.add_int(
            &format!("propagating/{name}/priority"),
            "priority of the propagator",
            prop.default_priority(),
            i32::MIN,
            i32::MAX,
        )?;
        self.plugins.propagators.register(name, prop)
    }

    pub fn include_heuristic(&mut self, heur: Box<dyn crate::plugins::heur::Heuristic>) -> Result<usize> {
        self.assert_registration_open("register heuristic")?;
        let name = heur.name();
        self.params.add_int(
            &format!("heuristics/{name}/freq"),
            "calling frequency in nodes (-1: never, 0: only at the root)",
            heur.default_freq(),
            -1,
            i32::MAX,
        )?;
        self.params.add_int(
            &format!("heuristics/{name}/priority"),
            "priority of the heuristic",
            heur.default_priority(),
            i32::MIN,
            i32::MAX,
        )?;
        self.plugins.heuristics.register(name, heur)
    }

    pub fn include_presolver(&mut self, presol: Box<dyn crate::plugins::presol::Presolver>) -> Result<usize> {
        self.assert_registration_open("register presolver")?;
        let name = presol.name();
        self.params.add_int(
            &format!("presolving/{name}/priority"),
            "priority of the presolver",
            presol.default_priority(),
            i32::MIN,
            i32::MAX,
        )?;
        self.plugins.presolvers.register(name, presol)
    }

    pub fn include_reader(&mut self, reader: Box<dyn Reader>) -> Result<usize> {
        self.assert_registration_open("register reader")?;
        let name = reader.extension();
        self.plugins.readers.register(name, reader)
    }

    pub fn include_pricer(&mut self, pricer: Box<dyn Pricer>) -> Result<usize> {
        self.assert_registration_open("register pricer")?;
        let name = pricer.name();
        self.plugins.pricers.register(name, pricer)
    }

    pub fn include_conflict_hook(&mut self, hook: Box<dyn crate::plugins::conflict::ConflictHook>) -> Result<usize> {
        self.assert_registration_open("register conflict hook")?;
        let name = hook.name();
        self.plugins.conflict_hooks.register(name, hook)
    }

    // ---- problem building ----

    pub fn set_objsense(&mut self, sense: ObjSense) {
        self.prob.objsense = sense;
    }

    pub fn set_obj_offset(&mut self, offset: Real) {
        self.prob.obj_offset = offset;
    }

    pub fn add_var(&mut self, name: &str, kind: VarKind, lb: Real, ub: Real, obj: Real) -> Result<VarId> {
        self.prob.add_var(name, kind, lb, ub, obj)
    }

    /// Adds a linear constraint `lhs <= sum terms <= rhs` to the original
    /// problem.
    pub fn add_linear_cons(
        &mut self,
        name: &str,
        terms: impl IntoIterator<Item = (VarId, Real)>,
        lhs: Real,
        rhs: Real,
    ) -> Result<ConsId> {
        let h = self.conshdlrs.find("linear").ok_or(SolverError::PluginNotFound {
            op: "add constraint",
            name: "linear".into(),
        })?;
        Ok(self
            .prob
            .add_cons(name, h, Box::new(LinearCons::new(terms, lhs, rhs)), ConsFlags::default()))
    }

    /// Reads a problem file through the reader registered for its extension.
    pub fn read_problem_file(&mut self, path: &Path) -> Result<()> {
        read_problem(&mut self.plugins.readers, path, &mut self.prob, &self.conshdlrs)
    }

    pub fn read_params_file(&mut self, path: &Path) -> Result<()> {
        self.params.read_file(path)
    }

    pub fn write_params_file(&self, path: &Path) -> Result<()> {
        self.params.write_file(path)
    }

    // ---- result surface ----

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn best_solution(&self) -> Option<&Sol> {
        self.sols.incumbent()
    }

    pub fn solutions(&self) -> &[Sol] {
        self.sols.solutions()
    }

    /// The primal ray of an unbounded problem, in transformed space.
    pub fn primal_ray(&self) -> Option<&Sol> {
        self.ray.as_ref()
    }

    /// Best known bound on the original objective value.
    pub fn primal_bound(&self) -> Real {
        if self.status == Status::Unbounded {
            return self.obj_sign * -INF;
        }
        let t = self.sols.upper_bound();
        if num::is_inf(t) {
            self.obj_sign * INF
        } else {
            self.obj_sign * t + self.prob.obj_offset
        }
    }

    /// Proven bound on the original objective value.
    pub fn dual_bound(&self) -> Real {
        let t = self.dual_bound_transformed();
        if !num::finite(t) {
            self.obj_sign * t
        } else {
            self.obj_sign * t + self.prob.obj_offset
        }
    }

    fn dual_bound_transformed(&self) -> Real {
        match self.status {
            Status::Optimal => self.sols.upper_bound(),
            Status::Infeasible => INF,
            Status::Unbounded => -INF,
            _ => self.queue.peek_min_lower(&self.tree),
        }
    }

    pub fn node_count(&self) -> u64 {
        self.stats.n_nodes
    }

    pub fn lp_solve_count(&self) -> u64 {
        self.lp.solve_count()
    }

    pub fn separation_rounds(&self) -> u64 {
        self.stats.n_sepa_rounds
    }

    pub fn cuts_generated(&self) -> u64 {
        self.stats.n_cuts
    }

    pub fn cuts_generated_by(&self, sepa: &str) -> u64 {
        self.stats.cuts_of(sepa)
    }

    /// Value of an original variable in a solution, expanding aggregations.
    pub fn solution_value(&self, sol: &Sol, orig: VarId) -> Result<Real> {
        self.prob.vars.resolve_value(orig, &|v| sol.value(v))
    }

    /// Objective value of a solution in the original space.
    pub fn solution_objective(&self, sol: &Sol) -> Real {
        self.obj_sign * sol.obj + self.prob.obj_offset
    }

    /// Handle to interrupt the engine from outside (e.g. a signal handler).
    pub fn stop_handle(&self) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
        self.limits.stop_handle()
    }

    pub fn interrupt(&self) {
        self.limits.interrupt();
    }

    pub fn elapsed_seconds(&self) -> Real {
        self.limits.elapsed()
    }

    // ---- solving ----

    pub fn solve(&mut self) -> Result<Status> {
        self.limits.load(&self.params)?;
        self.limits.start_clock();
        match self.status {
            Status::Uninitialized => {
                let t0 = Instant::now();
                self.status = Status::Presolving;
                self.transform()?;
                let decided = self.run_presolve()?;
                self.stats.presolve_time += t0.elapsed();
                if let Some(status) = decided {
                    self.status = status;
                    return Ok(status);
                }
                self.init_root()?;
                self.status = Status::Solving;
            }
            Status::Aborted => {
                // resume: incumbent and queue were preserved
                self.limits.clear();
                self.stop_reason = None;
                self.status = Status::Solving;
            }
            Status::Solving => {}
            done => return Ok(done),
        }
        let t0 = Instant::now();
        let result = self.search_loop();
        self.stats.solve_time += t0.elapsed();
        result?;
        if matches!(self.status, Status::Optimal | Status::Infeasible | Status::Unbounded) {
            for h in 0..self.conshdlrs.len() {
                self.conshdlrs.hdlr_mut(h).exit();
            }
        }
        Ok(self.status)
    }

    fn init_root(&mut self) -> Result<()> {
        // local domains of every variable
        self.dom = DomainStore::new();
        for v in self.prob.vars.ids() {
            let var = self.prob.vars.var(v);
            self.dom
                .register(v, var.global.clone(), var.kind.is_integral());
        }
        // one LP column per active variable
        self.lp = Lp::new(Box::new(SimplexBackend::new()));
        for v in self.prob.vars.active().collect::<Vec<_>>() {
            let var = self.prob.vars.var(v);
            self.lp.add_col(LpCol {
                var: v,
                lb: var.global.lb,
                ub: var.global.ub,
                obj: var.obj,
                integral: var.kind.is_integral(),
            });
        }
        // handler initialization and initial relaxation rows
        for h in 0..self.conshdlrs.len() {
            self.conshdlrs.hdlr_mut(h).init();
            let conss = self.conshdlrs.enabled_conss(&self.prob.conss, h, |_| true);
            self.conshdlrs
                .hdlr_mut(h)
                .init_lp(&mut self.prob.conss, &conss, &self.prob.vars, &mut self.lp)?;
        }
        // objective limit in transformed space
        let objlimit = self.params.get_real("limits/objective")?;
        self.objlimit_t = if num::finite(objlimit) {
            self.obj_sign * (objlimit - self.prob.obj_offset)
        } else {
            INF
        };
        self.sols = SolStore::new(self.params.get_int("solution/poolsize")? as usize);

        // plugin orders (priorities may have been overridden via parameters)
        self.branch_order = self.plugins.branchrules.order_by(|i| {
            let name = self.plugins.branchrules.get(i).name();
            self.params
                .get_int(&format!("branching/{name}/priority"))
                .unwrap_or_else(|_| self.plugins.branchrules.get(i).default_priority())
        });
        self.sepa_order = self
            .plugins
            .separators
            .order_by(|i| self.plugins.separators.get(i).default_priority());
        self.heur_order = self.plugins.heuristics.order_by(|i| {
            let name = self.plugins.heuristics.get(i).name();
            self.params
                .get_int(&format!("heuristics/{name}/priority"))
                .unwrap_or_else(|_| self.plugins.heuristics.get(i).default_priority())
        });
        self.pricer_order = self
            .plugins
            .pricers
            .order_by(|i| self.plugins.pricers.get(i).default_priority());
        self.conflict_order = self
            .plugins
            .conflict_hooks
            .order_by(|i| self.plugins.conflict_hooks.get(i).default_priority());
        self.build_prop_entries()?;

        // the root node
        let root = self.tree.create_root(-INF);
        self.stats.n_created += 1;
        self.path = vec![root];
        self.lp_rows_at = vec![self.lp.nrows()];
        self.refresh_nodesel();
        self.tree.node_mut(root).state = NodeState::Queued;
        let sel = self.plugins.nodesels.get(self.active_nodesel);
        self.queue.insert(&self.tree, sel, root);
        Ok(())
    }

    /// Builds the merged propagation order: propagator plugins by their
    /// priority parameter, constraint handlers keyed by check priority.
    fn build_prop_entries(&mut self) -> Result<()> {
        let mut entries: Vec<(i32, PropEntry, i32)> = Vec::new();
        for i in 0..self.plugins.propagators.len() {
            let name = self.plugins.propagators.get(i).name();
            let prio = self.params.get_int(&format!("propagating/{name}/priority"))?;
            let freq = self.params.get_int(&format!("propagating/{name}/freq"))?;
            entries.push((prio, PropEntry::Plugin(i), freq));
        }
        for h in 0..self.conshdlrs.len() {
            let hdlr = self.conshdlrs.hdlr(h);
            entries.push((hdlr.check_priority(), PropEntry::Hdlr(h), hdlr.prop_freq()));
        }
        entries.sort_by_key(|&(prio, _, _)| -prio);
        self.prop_entries = entries.into_iter().map(|(_, e, f)| (e, f)).collect();
        self.prop_state = vec![None; self.prop_entries.len()];
        Ok(())
    }

    /// Re-resolves the active node selector from the priority parameters and
    /// resorts the queue when it changed.
    fn refresh_nodesel(&mut self) {
        let mut best = 0;
        let mut best_prio = i32::MIN;
        for i in 0..self.plugins.nodesels.len() {
            let name = self.plugins.nodesels.get(i).name();
            let prio = self
                .params
                .get_int(&format!("nodeselection/{name}/stdpriority"))
                .unwrap_or_else(|_| self.plugins.nodesels.get(i).std_priority());
            if prio > best_prio {
                best_prio = prio;
                best = i;
            }
        }
        if best != self.active_nodesel || self.queue.is_empty() {
            self.active_nodesel = best;
            let sel = self.plugins.nodesels.get(best);
            self.queue.resort(&self.tree, sel);
        }
    }

    fn cutoff_bound(&self) -> Real {
        self.sols.upper_bound().min(self.objlimit_t)
    }

    fn mem_estimate_mb(&self) -> Real {
        let bytes = self.tree.len() * 256
            + self.lp.nrows() * 128
            + self.lp.ncols() * 64
            + self.prob.conss.len() * 128;
        bytes as Real / 1e6
    }

    fn search_loop(&mut self) -> Result<()> {
        loop {
            // limits and cancellation
            let primal = self.sols.upper_bound();
            let dual = self.queue.peek_min_lower(&self.tree);
            if let Some(reason) =
                self.limits
                    .check(self.stats.n_nodes, self.mem_estimate_mb(), primal, dual)
            {
                self.stop_reason = Some(reason);
                self.status = Status::Aborted;
                debug!(?reason, "search aborted");
                return Ok(());
            }
            // prune the queue against the upper bound
            self.refresh_nodesel();
            let cutoff = self.cutoff_bound();
            let pruned = {
                let sel = self.plugins.nodesels.get(self.active_nodesel);
                self.queue.bound(&self.tree, sel, cutoff)
            };
            for n in pruned {
                self.tree.node_mut(n).state = NodeState::Infeasible;
            }
            // select the next focus node
            let focus = {
                let sel = self.plugins.nodesels.get(self.active_nodesel);
                sel.select(&self.tree, &mut self.queue)
            };
            let Some(focus) = focus else {
                self.status = if self.sols.is_empty() {
                    Status::Infeasible
                } else {
                    Status::Optimal
                };
                return Ok(());
            };
            self.stats.n_nodes += 1;
            let depth = self.tree.node(focus).depth;
            self.stats.max_depth = self.stats.max_depth.max(depth);
            self.tree.node_mut(focus).state = NodeState::Focus;
            trace!(node = ?focus, depth, "focus node");

            match self.switch_focus(focus)? {
                Applied::Cutoff => {
                    self.close_focus(focus, NodeState::Infeasible);
                    continue;
                }
                Applied::Ok => {}
            }
            self.process_focus(focus)?;
            if self.status == Status::Unbounded {
                return Ok(());
            }
            // heuristics between nodes
            let lp_ok = self.lp.status() == LpStatus::Optimal;
            self.run_heuristics(depth, lp_ok)?;
        }
    }

    /// Moves the applied state from the current path to `target`: undoes to
    /// the common ancestor, then applies downwards.
    fn switch_focus(&mut self, target: NodeId) -> Result<Applied> {
        let new_path = self.tree.path_to(target);
        let mut common = 0;
        while common < self.path.len()
            && common < new_path.len()
            && self.path[common] == new_path[common]
        {
            common += 1;
        }
        debug_assert!(common >= 1, "paths always share the root");
        while self.path.len() > common {
            let n = self.path.pop().expect("non-empty path");
            let rows_at = self.lp_rows_at.pop().expect("rows stack in sync");
            self.tree
                .node(n)
                .change
                .undo(&mut self.dom, &mut self.prob.conss, &mut self.conshdlrs);
            self.lp.truncate_rows(rows_at);
        }
        let mut cutoff = false;
        for &n in &new_path[common..] {
            self.lp_rows_at.push(self.lp.nrows());
            self.path.push(n);
            let applied =
                self.tree
                    .node(n)
                    .change
                    .apply(&mut self.dom, &mut self.prob.conss, &mut self.conshdlrs);
            if applied == Applied::Cutoff {
                cutoff = true;
            }
        }
        Ok(if cutoff { Applied::Cutoff } else { Applied::Ok })
    }

    fn close_focus(&mut self, focus: NodeId, state: NodeState) {
        self.tree.node_mut(focus).state = state;
        trace!(node = ?focus, ?state, "node closed");
    }

    fn process_focus(&mut self, focus: NodeId) -> Result<()> {
        let depth = self.tree.node(focus).depth;
        // propagate to fixpoint
        if self.propagate_focus(depth)? {
            self.analyze_conflict(focus, ConflictSource::Propagation)?;
            self.close_focus(focus, NodeState::Infeasible);
            return Ok(());
        }
        // the pseudo point may already close the node
        if self.try_pseudo()? {
            self.close_focus(focus, NodeState::Feasible);
            return Ok(());
        }
        let mut sepa_rounds = 0u32;
        let mut loops = 0u32;
        loop {
            loops += 1;
            self.sync_lp_bounds();
            let lpstat = self.lp.solve()?;
            self.stats.n_lp_solves += 1;
            self.stats.n_lp_iterations = self.lp.iteration_count();
            match lpstat {
                LpStatus::Infeasible => {
                    self.analyze_conflict(focus, ConflictSource::LpInfeasible)?;
                    self.close_focus(focus, NodeState::Infeasible);
                    return Ok(());
                }
                LpStatus::Unbounded => {
                    if let Some(ray) = self.lp.primal_ray() {
                        let mut sol = Sol::new(SolOrigin::PrimalRay, "relaxation");
                        let components: Vec<(VarId, Real)> = ray
                            .iter()
                            .enumerate()
                            .filter(|(_, &r)| r.abs() > crate::core::EPS)
                            .map(|(c, &r)| (self.lp.col(c).var, r))
                            .collect();
                        for (v, r) in components {
                            sol.set(v, r);
                        }
                        self.ray = Some(sol);
                    }
                    self.status = Status::Unbounded;
                    return Ok(());
                }
                LpStatus::Optimal => {}
                other => {
                    return Err(SolverError::LpError {
                        op: "solve node relaxation",
                        msg: format!("unexpected LP status {other:?}"),
                    });
                }
            }
            // pricing: new columns force a re-solve
            if self.price_round(loops)? {
                continue;
            }
            let objval = self.lp.objval().expect("optimal LP carries a solution");
            self.tree.update_lower(focus, objval);
            // bounding against the incumbent
            if num::ge(objval, self.cutoff_bound()) {
                self.close_focus(focus, NodeState::Infeasible);
                return Ok(());
            }
            // separation; efficacious cuts force a re-solve
            if loops <= MAX_NODE_LOOPS {
                match self.separate_round(depth, &mut sepa_rounds)? {
                    SepaRound::Cutoff => {
                        self.close_focus(focus, NodeState::Infeasible);
                        return Ok(());
                    }
                    SepaRound::Added => continue,
                    SepaRound::NoCuts => {}
                }
            }
            // enforcement
            match self.enforce_focus(depth)? {
                EnfOutcome::Feasible => {
                    self.store_lp_solution()?;
                    self.close_focus(focus, NodeState::Feasible);
                    return Ok(());
                }
                EnfOutcome::Cutoff => {
                    self.close_focus(focus, NodeState::Infeasible);
                    return Ok(());
                }
                EnfOutcome::Resolve => {
                    if loops <= MAX_NODE_LOOPS {
                        continue;
                    }
                }
                EnfOutcome::Repropagate => {
                    if self.propagate_focus(depth)? {
                        self.analyze_conflict(focus, ConflictSource::Propagation)?;
                        self.close_focus(focus, NodeState::Infeasible);
                        return Ok(());
                    }
                    if loops <= MAX_NODE_LOOPS {
                        continue;
                    }
                }
                EnfOutcome::Branched(children) => {
                    self.spawn_children(focus, children);
                    self.close_focus(focus, NodeState::Branched);
                    return Ok(());
                }
                EnfOutcome::Infeasible => {}
            }
            // branch
            return self.branch_focus(focus);
        }
    }

    /// Round-robin propagation until a round yields no reduction. Returns
    /// true on cutoff.
    fn propagate_focus(&mut self, depth: u32) -> Result<bool> {
        for _round in 0..1000 {
            let gen_before = self.dom.generation();
            let mut productive = false;
            for k in 0..self.prop_entries.len() {
                let (entry, freq) = self.prop_entries[k];
                // frequency 0 means "presolve only", handled by the presolve
                // driver; in-tree propagation needs a matching positive depth
                if freq <= 0 || depth % freq as u32 != 0 {
                    continue;
                }
                // skip when nothing changed since this entry last ran
                let state = match entry {
                    PropEntry::Hdlr(h) => (self.dom.generation(), self.conshdlrs.activation_gen(h)),
                    PropEntry::Plugin(_) => (self.dom.generation(), 0),
                };
                if self.prop_state[k] == Some(state) {
                    continue;
                }
                let outcome = match entry {
                    PropEntry::Hdlr(h) => {
                        let conss = self.conshdlrs.enabled_conss(&self.prob.conss, h, |f| f.propagate);
                        if conss.is_empty() && self.conshdlrs.hdlr(h).needs_cons() {
                            self.prop_state[k] = Some(state);
                            continue;
                        }
                        let mut ctx = PropCtx {
                            vars: &self.prob.vars,
                            dom: &mut self.dom,
                            depth,
                        };
                        self.conshdlrs
                            .hdlr_mut(h)
                            .propagate(&self.prob.conss, &conss, &mut ctx)?
                    }
                    PropEntry::Plugin(p) => {
                        let mut ctx = PropCtx {
                            vars: &self.prob.vars,
                            dom: &mut self.dom,
                            depth,
                        };
                        self.plugins.propagators.get_mut(p).propagate(&mut ctx)?
                    }
                };
                self.prop_state[k] = Some(match entry {
                    PropEntry::Hdlr(h) => (self.dom.generation(), self.conshdlrs.activation_gen(h)),
                    PropEntry::Plugin(_) => (self.dom.generation(), 0),
                });
                match outcome {
                    Propagation::Cutoff => return Ok(true),
                    Propagation::ReducedDomain | Propagation::ConsAdded => productive = true,
                    Propagation::DidNotRun | Propagation::Unchanged => {}
                }
            }
            if !productive && self.dom.generation() == gen_before {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Checks the pseudo point of the node: every variable at the bound
    /// implied by its objective direction. If that point is feasible its
    /// objective equals the node's lower bound, so the node is solved.
    fn try_pseudo(&mut self) -> Result<bool> {
        let vars = &self.prob.vars;
        let dom = &self.dom;
        let pobj = pseudo_objective(vars, &|v| dom.lb(v), &|v| dom.ub(v));
        if num::is_neg_inf(pobj) {
            return Ok(false);
        }
        let mut sol = Sol::new(SolOrigin::Pseudo, "pseudo");
        for v in vars.active() {
            let var = vars.var(v);
            let val = if var.obj > 0.0 {
                dom.lb(v)
            } else if var.obj < 0.0 {
                dom.ub(v)
            } else if num::finite(dom.lb(v)) {
                dom.lb(v)
            } else if num::finite(dom.ub(v)) {
                dom.ub(v)
            } else {
                0.0
            };
            if !num::finite(val) {
                return Ok(false);
            }
            sol.set(v, val);
        }
        sol.obj = pobj;
        if num::ge(pobj, self.cutoff_bound()) {
            // feasible or not, the pseudo bound cannot beat the incumbent;
            // leave the decision to the LP
            return Ok(false);
        }
        let feasible = check_solution(&self.conshdlrs, &self.prob.conss, vars, &sol, true, true)?;
        if feasible == Feasibility::Feasible {
            self.stats.add_solution("pseudo");
            self.sols.add(sol);
            return Ok(true);
        }
        Ok(false)
    }

    fn sync_lp_bounds(&mut self) {
        for i in 0..self.lp.ncols() {
            let v = self.lp.col(i).var;
            let (lb, ub) = (self.dom.lb(v), self.dom.ub(v));
            self.lp.set_col_bounds(i, lb, ub);
        }
    }

    /// One pricing pass; true if any pricer added columns.
    fn price_round(&mut self, loops: u32) -> Result<bool> {
        if self.plugins.pricers.is_empty() || loops > MAX_PRICE_ROUNDS {
            return Ok(false);
        }
        let duals = match self.lp.solution() {
            Some(sol) => sol.dual.clone(),
            None => return Ok(false),
        };
        let order = self.pricer_order.clone();
        let mut added = false;
        for pi in order {
            let mut ctx = PriceCtx::new(
                &mut self.prob.vars,
                &mut self.dom,
                &mut self.lp,
                &mut self.prob.conss,
                duals.clone(),
            );
            let outcome = self.plugins.pricers.get_mut(pi).price(&mut ctx)?;
            if ctx.nadded() > 0 || outcome == PriceOutcome::ColumnsAdded {
                added = true;
            }
        }
        Ok(added)
    }

    fn separate_round(&mut self, depth: u32, rounds: &mut u32) -> Result<SepaRound> {
        let at_root = depth == 0;
        let max_rounds = if at_root {
            self.params.get_int("separating/maxroundsroot")?
        } else {
            self.params.get_int("separating/maxrounds")?
        };
        if max_rounds >= 0 && *rounds >= max_rounds as u32 {
            return Ok(SepaRound::NoCuts);
        }
        let round = *rounds;
        *rounds += 1;
        self.stats.n_sepa_rounds += 1;

        let min_eff = self.params.get_real("separating/minefficacy")?;
        let scale = self.params.get_bool("separating/scaleintegral")?;
        let drop = self.params.get_bool("separating/dropnonintegral")?;

        // re-add violated global cuts from the pool first
        let mut added = self.readd_pool_cuts(min_eff);

        let mut collected: Vec<(String, ScoredCut)> = Vec::new();
        let sepa_order = self.sepa_order.clone();
        for si in sepa_order {
            let name = self.plugins.separators.get(si).name().to_string();
            let sep_rounds = if at_root {
                self.params.get_int(&format!("separating/{name}/maxroundsroot"))?
            } else {
                self.params.get_int(&format!("separating/{name}/maxrounds"))?
            };
            if sep_rounds >= 0 && round >= sep_rounds as u32 {
                continue;
            }
            let max_cuts = if at_root {
                self.params.get_int(&format!("separating/{name}/maxsepacutsroot"))?
            } else {
                self.params.get_int(&format!("separating/{name}/maxsepacuts"))?
            } as usize;
            let mut ctx = SepaCtx::new(
                &self.prob.vars,
                &self.dom,
                &self.lp,
                at_root,
                &self.params,
                min_eff,
                scale,
                drop,
                max_cuts,
            );
            let outcome = self.plugins.separators.get_mut(si).execute(&mut ctx)?;
            if outcome == SepaOutcome::Cutoff {
                return Ok(SepaRound::Cutoff);
            }
            for sc in ctx.into_cuts() {
                collected.push((name.clone(), sc));
            }
        }
        // constraint handler separation callbacks
        let hdlr_order = self.conshdlrs.sepa_order().to_vec();
        for h in hdlr_order {
            let conss = self.conshdlrs.enabled_conss(&self.prob.conss, h, |f| f.separate);
            if conss.is_empty() && self.conshdlrs.hdlr(h).needs_cons() {
                continue;
            }
            let name = self.conshdlrs.hdlr(h).name().to_string();
            let mut ctx = SepaCtx::new(
                &self.prob.vars,
                &self.dom,
                &self.lp,
                at_root,
                &self.params,
                min_eff,
                scale,
                drop,
                100,
            );
            let outcome = self
                .conshdlrs
                .hdlr_mut(h)
                .separate(&self.prob.conss, &conss, &mut ctx)?;
            if outcome == SepaOutcome::Cutoff {
                return Ok(SepaRound::Cutoff);
            }
            for sc in ctx.into_cuts() {
                collected.push((name.clone(), sc));
            }
        }

        collected.sort_by(|a, b| b.1.score.partial_cmp(&a.1.score).unwrap_or(std::cmp::Ordering::Equal));
        for (name, sc) in collected {
            let row = self.cut_to_row(&sc.cut)?;
            self.lp.add_row(row);
            if !sc.cut.local {
                self.cutpool.push(sc.cut);
            }
            self.stats.add_cut(&name);
            added += 1;
        }
        Ok(if added > 0 { SepaRound::Added } else { SepaRound::NoCuts })
    }

    /// Scans the global cut pool for violated cuts not currently in the LP.
    fn readd_pool_cuts(&mut self, min_eff: Real) -> usize {
        let mut to_add = Vec::new();
        for (i, cut) in self.cutpool.iter().enumerate() {
            let value = |v: VarId| self.lp.value_of(v).unwrap_or_else(|| self.dom.lb(v));
            let violation = cut.violation(&value);
            if violation < min_eff {
                continue;
            }
            if self.lp.rows().iter().any(|r| r.name == cut.name) {
                continue;
            }
            to_add.push(i);
        }
        let mut added = 0;
        for i in to_add {
            let cut = self.cutpool[i].clone();
            if let Ok(row) = self.cut_to_row(&cut) {
                self.lp.add_row(row);
                added += 1;
            }
        }
        added
    }

    fn cut_to_row(&self, cut: &Cut) -> Result<LpRow> {
        let mut coefs = Vec::with_capacity(cut.coefs.len());
        let mut integral = true;
        for &(v, a) in &cut.coefs {
            let col = self.lp.col_of(v).ok_or_else(|| {
                SolverError::invalid_data("add cut", "cut references a variable without LP column")
            })?;
            if !self.lp.col(col).integral || !num::integral(a) {
                integral = false;
            }
            coefs.push((col, a));
        }
        if integral {
            integral = (num::is_neg_inf(cut.lhs) || num::integral(cut.lhs))
                && (num::is_inf(cut.rhs) || num::integral(cut.rhs));
        }
        Ok(LpRow {
            name: cut.name.clone(),
            coefs,
            lhs: cut.lhs,
            rhs: cut.rhs,
            local: cut.local,
            integral,
        })
    }

    /// Runs the enforcement loop over the handlers in decreasing enforcement
    /// priority; stops at the first resolving outcome.
    fn enforce_focus(&mut self, depth: u32) -> Result<EnfOutcome> {
        let mut any_infeasible = false;
        let order = self.conshdlrs.enfo_order().to_vec();
        for h in order {
            let conss = self.conshdlrs.enabled_conss(&self.prob.conss, h, |f| f.enforce);
            if conss.is_empty() && self.conshdlrs.hdlr(h).needs_cons() {
                continue;
            }
            let mut ctx = EnfoCtx {
                vars: &self.prob.vars,
                dom: &mut self.dom,
                lp: &mut self.lp,
                depth,
                children: Vec::new(),
            };
            let outcome = self
                .conshdlrs
                .hdlr_mut(h)
                .enforce_lp(&mut self.prob.conss, &conss, &mut ctx)?;
            let children = std::mem::take(&mut ctx.children);
            match outcome {
                Enforcement::Feasible => {}
                Enforcement::Infeasible => any_infeasible = true,
                Enforcement::Cutoff => return Ok(EnfOutcome::Cutoff),
                Enforcement::Separated => return Ok(EnfOutcome::Resolve),
                Enforcement::ReducedDomain | Enforcement::ConsAdded => {
                    return Ok(EnfOutcome::Repropagate)
                }
                Enforcement::Branched => {
                    if children.is_empty() {
                        return Err(SolverError::InvalidResult {
                            op: "enforce LP solution",
                            plugin: self.conshdlrs.hdlr(h).name().into(),
                        });
                    }
                    return Ok(EnfOutcome::Branched(children));
                }
            }
        }
        Ok(if any_infeasible {
            EnfOutcome::Infeasible
        } else {
            EnfOutcome::Feasible
        })
    }

    /// Offers the (integral, enforced) LP solution to the store.
    fn store_lp_solution(&mut self) -> Result<()> {
        let Some(lpsol) = self.lp.solution() else {
            return Ok(());
        };
        let primal = lpsol.primal.clone();
        let mut sol = Sol::new(SolOrigin::LpRound, "relaxation");
        for v in self.prob.vars.active().collect::<Vec<_>>() {
            let raw = self
                .lp
                .col_of(v)
                .map(|c| primal[c])
                .unwrap_or_else(|| self.dom.lb(v));
            let val = if self.prob.vars.var(v).kind.is_integral() {
                raw.round()
            } else {
                raw
            };
            sol.set(v, val);
        }
        sol.obj = crate::cons::solution_objective(&self.prob.vars, &sol);
        let feasible = check_solution(&self.conshdlrs, &self.prob.conss, &self.prob.vars, &sol, false, false)?;
        if feasible == Feasibility::Feasible {
            self.stats.add_solution("relaxation");
            self.sols.add(sol);
        }
        Ok(())
    }

    fn branch_candidates(&self) -> Vec<BranchCand> {
        let Some(sol) = self.lp.solution() else {
            return Vec::new();
        };
        let mut cands = Vec::new();
        let mut implint_cands = Vec::new();
        for (c, col) in self.lp.cols().iter().enumerate() {
            if !col.integral {
                continue;
            }
            let val = sol.primal[c];
            let frac = num::frac(val);
            if frac < crate::core::FEASTOL || frac > 1.0 - crate::core::FEASTOL {
                continue;
            }
            let var = self.prob.vars.var(col.var);
            let cand = BranchCand {
                var: col.var,
                val,
                frac,
                priority: var.branch_priority,
            };
            if var.kind == VarKind::ImplInt {
                implint_cands.push(cand);
            } else {
                cands.push(cand);
            }
        }
        if cands.is_empty() {
            implint_cands
        } else {
            cands
        }
    }

    fn branch_focus(&mut self, focus: NodeId) -> Result<()> {
        let cands = self.branch_candidates();
        if cands.is_empty() {
            return Err(SolverError::BranchingFailed);
        }
        let order = self.branch_order.clone();
        let mut specs: Option<Vec<ChildSpec>> = None;
        for bi in order {
            match self
                .plugins
                .branchrules
                .get_mut(bi)
                .execute_lp(&self.prob.vars, &self.dom, &cands)?
            {
                Branching::Branched(s) => {
                    specs = Some(s);
                    break;
                }
                Branching::Cutoff => {
                    self.close_focus(focus, NodeState::Infeasible);
                    return Ok(());
                }
                Branching::DidNotRun => {}
            }
        }
        // fallback: canonical branching on the most fractional candidate
        let specs = match specs {
            Some(s) => s,
            None => canonical_children(most_fractional(&cands).expect("candidates are non-empty")),
        };
        if specs.is_empty() {
            return Err(SolverError::BranchingFailed);
        }
        self.spawn_children(focus, specs);
        self.close_focus(focus, NodeState::Branched);
        Ok(())
    }

    fn spawn_children(&mut self, focus: NodeId, specs: Vec<ChildSpec>) {
        for spec in specs {
            let mut change = NodeSetChange::new();
            change.bounds = spec.bounds;
            for c in spec.conss {
                self.prob.conss.capture(c);
                change.add_cons(c);
            }
            let child = self.tree.create_child(focus, change);
            self.stats.n_created += 1;
            for &c in &self.tree.node(child).change.added {
                self.prob.conss.cons_mut(c).owner = Some(child);
            }
            self.tree.node_mut(child).state = NodeState::Queued;
            let sel = self.plugins.nodesels.get(self.active_nodesel);
            self.queue.insert(&self.tree, sel, child);
        }
    }

    fn run_heuristics(&mut self, depth: u32, lp_ok: bool) -> Result<()> {
        let order = self.heur_order.clone();
        for hi in order {
            let name = self.plugins.heuristics.get(hi).name().to_string();
            let freq = self.params.get_int(&format!("heuristics/{name}/freq"))?;
            let due = match freq {
                f if f < 0 => false,
                0 => self.stats.n_nodes <= 1,
                f => self.stats.n_nodes % f as u64 == 0,
            };
            if !due {
                continue;
            }
            let timing = self.plugins.heuristics.get(hi).timing();
            let fits = match timing {
                HeurTiming::AfterLpNode => lp_ok,
                HeurTiming::AfterPseudoNode => !lp_ok,
                HeurTiming::Both => true,
            };
            if !fits {
                continue;
            }
            let mut ctx = HeurCtx::new(
                &self.prob.vars,
                &self.dom,
                &mut self.lp,
                depth,
                &self.params,
                &self.conshdlrs,
                &self.prob.conss,
                &mut self.sols,
            );
            let outcome = self.plugins.heuristics.get_mut(hi).execute(&mut ctx)?;
            debug_assert!(!self.lp.in_dive(), "heuristic left the LP in dive mode");
            if outcome == HeurOutcome::FoundSolution {
                self.stats.add_solution(&name);
            }
        }
        Ok(())
    }

    fn analyze_conflict(&mut self, node: NodeId, source: ConflictSource) -> Result<()> {
        if !self.params.get_bool("conflict/enable")? {
            return Ok(());
        }
        let max_len = self.params.get_int("conflict/maxlength")? as usize;
        let mut learned = Vec::new();
        {
            let mut ctx = ConflictCtx::new(&self.prob.vars, &self.tree, node, source, &self.lp, max_len);
            let order = self.conflict_order.clone();
            for ci in order {
                self.plugins.conflict_hooks.get_mut(ci).analyze(&mut ctx)?;
            }
            learned.append(&mut ctx.take_learned());
        }
        for lits in learned {
            let name = format!("conflict_{}", self.stats.n_conflicts);
            let flags = ConsFlags {
                separate: false,
                enforce: false,
                check: false,
                propagate: true,
            };
            let id = self
                .prob
                .conss
                .add(name, self.bounddisj_hdlr, Box::new(BoundDisjCons::new(lits)), flags, false, None);
            self.conshdlrs.activate(&mut self.prob.conss, id);
            self.stats.n_conflicts += 1;
        }
        Ok(())
    }
}
