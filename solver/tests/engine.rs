//! End-to-end scenarios for the search engine.

use sylva::cons::{check_solution, PropCtx, Propagation};
use sylva::core::{VarKind, INF};
use sylva::err::Result;
use sylva::plugins::pricer::{PriceCtx, PriceOutcome, Pricer};
use sylva::search::{Solver, Status};
use sylva::sol::SolOrigin;

/// `min x + y` over binaries with `x + y >= 1`.
fn trivial_cover() -> Result<Solver> {
    let mut solver = Solver::new()?;
    let x = solver.add_var("x", VarKind::Binary, 0.0, 1.0, 1.0)?;
    let y = solver.add_var("y", VarKind::Binary, 0.0, 1.0, 1.0)?;
    solver.add_linear_cons("cover", [(x, 1.0), (y, 1.0)], 1.0, INF)?;
    Ok(solver)
}

/// `min -x - y` over integers in [0, 2] with `3x + 2y <= 6`, `2x + 3y <= 6`.
/// The root LP sits at the fractional vertex (1.2, 1.2); the integer optimum
/// is -2.
fn fractional_diamond() -> Result<Solver> {
    let mut solver = Solver::new()?;
    let x = solver.add_var("x", VarKind::Integer, 0.0, 2.0, -1.0)?;
    let y = solver.add_var("y", VarKind::Integer, 0.0, 2.0, -1.0)?;
    solver.add_linear_cons("c1", [(x, 3.0), (y, 2.0)], -INF, 6.0)?;
    solver.add_linear_cons("c2", [(x, 2.0), (y, 3.0)], -INF, 6.0)?;
    Ok(solver)
}

fn disable_heuristics(solver: &mut Solver) {
    solver.params.set_int("heuristics/rounding/freq", -1).unwrap();
    solver.params.set_int("heuristics/fracdiving/freq", -1).unwrap();
}

fn disable_separation(solver: &mut Solver) {
    solver.params.set_int("separating/maxrounds", 0).unwrap();
    solver.params.set_int("separating/maxroundsroot", 0).unwrap();
}

#[test]
fn test_s1_trivial_integer_lp() {
    let mut solver = trivial_cover().unwrap();
    let status = solver.solve().unwrap();
    assert_eq!(status, Status::Optimal);
    assert!((solver.primal_bound() - 1.0).abs() < 1e-6);
    assert!((solver.dual_bound() - 1.0).abs() < 1e-6);
    assert!(solver.node_count() <= 3);

    // exactly one of the two variables is set
    let sol = solver.best_solution().unwrap().clone();
    let x = solver.prob.find_var("x").unwrap();
    let y = solver.prob.find_var("y").unwrap();
    let vx = solver.solution_value(&sol, x).unwrap();
    let vy = solver.solution_value(&sol, y).unwrap();
    assert!((vx + vy - 1.0).abs() < 1e-6);
    assert!(vx.abs() < 1e-6 || (vx - 1.0).abs() < 1e-6);
}

#[test]
fn test_s2_unbounded_with_ray() {
    let mut solver = Solver::new().unwrap();
    let x = solver.add_var("x", VarKind::Continuous, 0.0, INF, -1.0).unwrap();
    let status = solver.solve().unwrap();
    assert_eq!(status, Status::Unbounded);
    let ray = solver.primal_ray().expect("unbounded problems carry a ray");
    let t = solver.prob.vars.transformed_of(x).unwrap();
    assert!(ray.value(t) > 0.0);
}

#[test]
fn test_s3_infeasible() {
    let mut solver = Solver::new().unwrap();
    let x = solver.add_var("x", VarKind::Binary, 0.0, 1.0, 0.0).unwrap();
    solver.add_linear_cons("ge", [(x, 1.0)], 1.0, INF).unwrap();
    solver.add_linear_cons("le", [(x, 1.0)], -INF, 0.0).unwrap();
    let status = solver.solve().unwrap();
    assert_eq!(status, Status::Infeasible);
    assert!(solver.best_solution().is_none());
    assert!(solver.dual_bound() >= INF);
}

#[test]
fn test_s4_diving_heuristic_finds_solution() {
    let mut solver = fractional_diamond().unwrap();
    disable_separation(&mut solver);
    solver.params.set_int("heuristics/rounding/freq", -1).unwrap();
    solver.params.set_int("heuristics/fracdiving/freq", 1).unwrap();
    let status = solver.solve().unwrap();
    assert_eq!(status, Status::Optimal);
    assert!((solver.primal_bound() - -2.0).abs() < 1e-6);
    let dived = solver
        .solutions()
        .iter()
        .any(|s| s.origin == SolOrigin::Diving && s.found_by == "fracdiving");
    assert!(dived, "expected a solution found by the diving heuristic");
}

#[test]
fn test_s5_gomory_controlled_by_parameters() {
    // enabled: at least one Gomory cut separates the fractional root
    let mut with_cuts = fractional_diamond().unwrap();
    disable_heuristics(&mut with_cuts);
    assert_eq!(with_cuts.solve().unwrap(), Status::Optimal);
    assert!((with_cuts.primal_bound() - -2.0).abs() < 1e-6);
    assert!(with_cuts.cuts_generated_by("gomory") >= 1);
    assert!(with_cuts.cuts_generated() >= with_cuts.cuts_generated_by("gomory"));

    // disabled through a settings file: zero Gomory cuts, same optimum
    let dir = std::env::temp_dir().join("sylva_engine_test");
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("nogomory.set");
    std::fs::write(
        &file,
        "separating/gomory/maxroundsroot = 0\nseparating/gomory/maxrounds = 0\n",
    )
    .unwrap();
    let mut without = fractional_diamond().unwrap();
    disable_heuristics(&mut without);
    without.read_params_file(&file).unwrap();
    assert_eq!(without.solve().unwrap(), Status::Optimal);
    assert_eq!(without.cuts_generated_by("gomory"), 0);
    assert!((without.primal_bound() - -2.0).abs() < 1e-6);
    std::fs::remove_file(&file).unwrap();
}

#[test]
fn test_s6_objective_limit_prunes() {
    // baseline: plain branch and bound
    let mut baseline = fractional_diamond().unwrap();
    disable_heuristics(&mut baseline);
    disable_separation(&mut baseline);
    assert_eq!(baseline.solve().unwrap(), Status::Optimal);
    let base_nodes = baseline.node_count();
    assert!(base_nodes >= 3);

    // a valid bound slightly above the optimum preserves the optimum and
    // never increases the tree
    let mut bounded = fractional_diamond().unwrap();
    disable_heuristics(&mut bounded);
    disable_separation(&mut bounded);
    bounded.params.set_real("limits/objective", -1.9).unwrap();
    assert_eq!(bounded.solve().unwrap(), Status::Optimal);
    assert!((bounded.primal_bound() - -2.0).abs() < 1e-6);
    assert!(bounded.node_count() <= base_nodes);

    // a bound below the optimum cuts the whole tree after the root
    let mut cutoff = fractional_diamond().unwrap();
    disable_heuristics(&mut cutoff);
    disable_separation(&mut cutoff);
    cutoff.params.set_real("limits/objective", -2.5).unwrap();
    let status = cutoff.solve().unwrap();
    assert_eq!(status, Status::Infeasible);
    assert!(cutoff.best_solution().is_none());
    assert!(cutoff.node_count() < base_nodes);
}

#[test]
fn test_soundness_of_incumbent() {
    let mut solver = fractional_diamond().unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    let sol = solver.best_solution().unwrap();
    // the incumbent passes the full handler check pass
    let feas = check_solution(&solver.conshdlrs, &solver.prob.conss, &solver.prob.vars, sol, true, true).unwrap();
    assert_eq!(feas, sylva::cons::Feasibility::Feasible);
    // primal and dual bound agree at optimality
    assert!((solver.primal_bound() - solver.dual_bound()).abs() < 1e-6);
}

#[test]
fn test_conflict_learning_on_infeasible_tree() {
    // pairwise at most one, but a total of at least 1.5: the LP relaxation
    // is feasible at (1/2, 1/2, 1/2) while no integral point exists
    let mut solver = Solver::new().unwrap();
    let x1 = solver.add_var("x1", VarKind::Binary, 0.0, 1.0, 0.0).unwrap();
    let x2 = solver.add_var("x2", VarKind::Binary, 0.0, 1.0, 0.0).unwrap();
    let x3 = solver.add_var("x3", VarKind::Binary, 0.0, 1.0, 0.0).unwrap();
    for (name, a, b) in [("p12", x1, x2), ("p13", x1, x3), ("p23", x2, x3)] {
        solver.add_linear_cons(name, [(a, 1.0), (b, 1.0)], -INF, 1.0).unwrap();
    }
    solver
        .add_linear_cons("total", [(x1, 1.0), (x2, 1.0), (x3, 1.0)], 1.5, INF)
        .unwrap();
    disable_heuristics(&mut solver);
    disable_separation(&mut solver);
    let status = solver.solve().unwrap();
    assert_eq!(status, Status::Infeasible);
    assert!(solver.stats.n_conflicts >= 1, "path no-goods should have been learned");
}

#[test]
fn test_node_limit_aborts_and_resumes() {
    let mut solver = fractional_diamond().unwrap();
    disable_heuristics(&mut solver);
    disable_separation(&mut solver);
    solver.params.set_longint("limits/nodes", 1).unwrap();
    let status = solver.solve().unwrap();
    assert_eq!(status, Status::Aborted);
    assert_eq!(solver.stop_reason(), Some(sylva::search::StopReason::NodeLimit));

    // resuming with a relaxed limit finishes the solve
    solver.params.set_longint("limits/nodes", -1).unwrap();
    let status = solver.solve().unwrap();
    assert_eq!(status, Status::Optimal);
    assert!((solver.primal_bound() - -2.0).abs() < 1e-6);
}

#[test]
fn test_maximization_is_normalized() {
    use sylva::prob::ObjSense;
    let mut solver = Solver::new().unwrap();
    solver.set_objsense(ObjSense::Maximize);
    let x = solver.add_var("x", VarKind::Integer, 0.0, 2.0, 1.0).unwrap();
    let y = solver.add_var("y", VarKind::Integer, 0.0, 2.0, 1.0).unwrap();
    solver.add_linear_cons("c1", [(x, 3.0), (y, 2.0)], -INF, 6.0).unwrap();
    solver.add_linear_cons("c2", [(x, 2.0), (y, 3.0)], -INF, 6.0).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert!((solver.primal_bound() - 2.0).abs() < 1e-6);
    assert!((solver.dual_bound() - 2.0).abs() < 1e-6);
}

#[test]
fn test_propagation_reaches_fixpoint() {
    // x <= 5, y <= x, z <= y as a chain; the loop must stop with a round
    // producing zero reductions
    use sylva::cons::linear::{LinearCons, LinearConshdlr};
    use sylva::cons::{Conshdlr, ConsStore};
    use sylva::core::{Domain, DomainStore, VarStore};

    let mut vars = VarStore::new();
    let mut t = Vec::new();
    for name in ["x", "y", "z"] {
        let o = vars.add_original(name, VarKind::Integer, 0.0, 100.0, 0.0).unwrap();
        t.push(vars.transform_var(o, 0.0));
    }
    let mut dom = DomainStore::new();
    for v in vars.ids() {
        dom.register(v, Domain::new(0.0, 100.0), true);
    }
    let mut store = ConsStore::new();
    let mut ids = Vec::new();
    ids.push(store.add(
        "cap",
        0,
        Box::new(LinearCons::new([(t[0], 1.0)], -INF, 5.0)),
        Default::default(),
        false,
        None,
    ));
    ids.push(store.add(
        "yx",
        0,
        Box::new(LinearCons::new([(t[1], 1.0), (t[0], -1.0)], -INF, 0.0)),
        Default::default(),
        false,
        None,
    ));
    ids.push(store.add(
        "zy",
        0,
        Box::new(LinearCons::new([(t[2], 1.0), (t[1], -1.0)], -INF, 0.0)),
        Default::default(),
        false,
        None,
    ));

    let mut hdlr = LinearConshdlr::new();
    let mut rounds = 0;
    loop {
        rounds += 1;
        assert!(rounds < 50, "propagation failed to reach a fixpoint");
        let mut ctx = PropCtx {
            vars: &vars,
            dom: &mut dom,
            depth: 0,
        };
        match hdlr.propagate(&store, &ids, &mut ctx).unwrap() {
            Propagation::ReducedDomain => continue,
            Propagation::Unchanged | Propagation::DidNotRun => break,
            other => panic!("unexpected propagation outcome {other:?}"),
        }
    }
    assert_eq!(dom.ub(t[0]), 5.0);
    assert_eq!(dom.ub(t[1]), 5.0);
    assert_eq!(dom.ub(t[2]), 5.0);
    // one more round is unproductive
    let gen = dom.generation();
    let mut ctx = PropCtx {
        vars: &vars,
        dom: &mut dom,
        depth: 0,
    };
    assert_eq!(hdlr.propagate(&store, &ids, &mut ctx).unwrap(), Propagation::Unchanged);
    assert_eq!(dom.generation(), gen);
}

/// A pricer that adds one cheaper column covering the same demand row.
struct OneShotPricer {
    done: bool,
}

impl Pricer for OneShotPricer {
    fn name(&self) -> &'static str {
        "oneshot"
    }

    fn price(&mut self, ctx: &mut PriceCtx) -> Result<PriceOutcome> {
        if self.done {
            return Ok(PriceOutcome::NoColumns);
        }
        // the demand row's dual exceeds the new column's cost, so the column
        // has negative reduced cost
        if ctx.duals.first().copied().unwrap_or(0.0) > 1.0 {
            let v = ctx.add_priced_var("priced", VarKind::Continuous, 0.0, INF, 1.0, &[(0, 1.0)])?;
            // the new column also joins the covering constraint itself
            let demand = ctx
                .conss
                .ids()
                .find(|&c| ctx.conss.cons(c).name == "t_demand")
                .expect("transformed demand constraint");
            ctx.conss
                .data_mut(demand)
                .downcast_mut::<sylva::cons::linear::LinearCons>()
                .unwrap()
                .terms
                .push((v, 1.0));
            self.done = true;
            return Ok(PriceOutcome::ColumnsAdded);
        }
        Ok(PriceOutcome::NoColumns)
    }
}

#[test]
fn test_pricer_adds_improving_column() {
    let mut solver = Solver::new().unwrap();
    let x = solver.add_var("x", VarKind::Continuous, 0.0, INF, 2.0).unwrap();
    solver.add_linear_cons("demand", [(x, 1.0)], 1.0, INF).unwrap();
    solver.include_pricer(Box::new(OneShotPricer { done: false })).unwrap();
    disable_heuristics(&mut solver);
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    // without pricing the optimum is 2; the priced column brings it to 1
    assert!((solver.primal_bound() - 1.0).abs() < 1e-6);
}

#[test]
fn test_subordinate_engine_clones_plugins_and_params() {
    let mut parent = trivial_cover().unwrap();
    parent.params.set_int("separating/maxrounds", 3).unwrap();
    // a non-cloneable plugin is skipped, not an error
    parent.include_pricer(Box::new(OneShotPricer { done: true })).unwrap();

    let mut sub = parent.subordinate().unwrap();
    assert_eq!(sub.params.get_int("separating/maxrounds").unwrap(), 3);
    assert!(sub.plugins.pricers.is_empty());

    // the subordinate solves its own problem independently
    let x = sub.add_var("x", VarKind::Binary, 0.0, 1.0, 1.0).unwrap();
    let y = sub.add_var("y", VarKind::Binary, 0.0, 1.0, 1.0).unwrap();
    sub.add_linear_cons("cover", [(x, 1.0), (y, 1.0)], 1.0, INF).unwrap();
    assert_eq!(sub.solve().unwrap(), Status::Optimal);
    assert!((sub.primal_bound() - 1.0).abs() < 1e-6);

    // the parent is untouched and solves afterwards
    assert_eq!(parent.solve().unwrap(), Status::Optimal);
}

#[test]
fn test_node_selector_switch_via_parameters() {
    let mut solver = fractional_diamond().unwrap();
    disable_heuristics(&mut solver);
    disable_separation(&mut solver);
    solver
        .params
        .set_int("nodeselection/bestbound/stdpriority", 1_000_000)
        .unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert!((solver.primal_bound() - -2.0).abs() < 1e-6);
}
