//! Command line interface.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sylva::search::Status;
use sylva::Solver;
use tracing::info;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Branch-and-bound solver for constraint integer programs.",
    long_about = None
)]
pub struct Args {
    /// Problem file; the reader is chosen by extension.
    #[arg(value_name = "FILE")]
    pub problem: PathBuf,

    /// Parameter settings file to apply before solving.
    #[arg(short, long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Time limit in seconds.
    #[arg(short, long, value_name = "SECONDS")]
    pub time_limit: Option<f64>,

    /// Print solve statistics after the run.
    #[arg(long)]
    pub stats: bool,

    /// Write the effective parameters to a file and exit.
    #[arg(long, value_name = "FILE")]
    pub emit_settings: Option<PathBuf>,
}

pub fn parse_args() -> Args {
    Args::parse()
}

pub fn run(args: &Args) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut solver = Solver::new().context("engine setup")?;
    if let Some(settings) = &args.settings {
        solver
            .read_params_file(settings)
            .with_context(|| format!("reading settings {}", settings.display()))?;
    }
    if let Some(limit) = args.time_limit {
        solver.params.set_real("limits/time", limit)?;
    }
    if let Some(out) = &args.emit_settings {
        solver.write_params_file(out)?;
        return Ok(());
    }

    solver
        .read_problem_file(&args.problem)
        .with_context(|| format!("reading problem {}", args.problem.display()))?;
    info!(
        vars = solver.prob.n_vars(),
        conss = solver.prob.n_conss(),
        "problem loaded"
    );

    let status = solver.solve().context("solving")?;
    match status {
        Status::Optimal => {
            println!("status: optimal");
            println!("objective: {}", solver.primal_bound());
            if let Some(sol) = solver.best_solution() {
                for i in 0..solver.prob.n_vars() {
                    let v = sylva::core::VarId::new(i);
                    let val = solver.solution_value(sol, v)?;
                    if val.abs() > 1e-9 {
                        println!("  {} = {val}", solver.prob.vars.var(v).name);
                    }
                }
            }
        }
        Status::Infeasible => println!("status: infeasible"),
        Status::Unbounded => {
            println!("status: unbounded");
            if solver.primal_ray().is_some() {
                println!("  (a primal ray is available)");
            }
        }
        Status::Aborted => {
            println!("status: aborted ({:?})", solver.stop_reason());
            println!("primal bound: {}", solver.primal_bound());
            println!("dual bound:   {}", solver.dual_bound());
        }
        other => println!("status: {other:?}"),
    }
    println!(
        "nodes: {}  LP solves: {}  cuts: {}  time: {:.3}s",
        solver.node_count(),
        solver.lp_solve_count(),
        solver.cuts_generated(),
        solver.elapsed_seconds(),
    );
    if args.stats {
        print!("{}", solver.stats);
    }
    Ok(())
}
