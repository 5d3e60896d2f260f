//! Solve statistics.

use crate::plugins::presol::PresolCounters;
use std::collections::BTreeMap;
use std::fmt::{Display, Error, Formatter};
use std::time::Duration;

/// Counters of one engine run. All times are in seconds.
#[derive(Clone, Default)]
pub struct Stats {
    /// Focus nodes processed.
    pub n_nodes: u64,
    /// Nodes ever created (including pruned ones).
    pub n_created: u64,
    pub max_depth: u32,
    pub n_lp_solves: u64,
    pub n_lp_iterations: u64,
    pub n_sepa_rounds: u64,
    pub n_cuts: u64,
    pub cuts_by_sepa: BTreeMap<String, u64>,
    pub n_conflicts: u64,
    pub n_sols_found: u64,
    pub sols_by_plugin: BTreeMap<String, u64>,
    pub presol: PresolCounters,
    pub presol_rounds: u64,
    pub presolve_time: Duration,
    pub solve_time: Duration,
}

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    pub fn add_cut(&mut self, sepa: &str) {
        self.n_cuts += 1;
        *self.cuts_by_sepa.entry(sepa.to_string()).or_insert(0) += 1;
    }

    pub fn cuts_of(&self, sepa: &str) -> u64 {
        self.cuts_by_sepa.get(sepa).copied().unwrap_or(0)
    }

    pub fn add_solution(&mut self, plugin: &str) {
        self.n_sols_found += 1;
        *self.sols_by_plugin.entry(plugin.to_string()).or_insert(0) += 1;
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        fn label(f: &mut Formatter<'_>, label: &str) -> Result<(), Error> {
            write!(f, "{label:<20}: ")
        }
        fn val_throughput(f: &mut Formatter<'_>, value: u64, time: &Duration) -> Result<(), Error> {
            if time.as_secs_f64() > 0.0 {
                writeln!(f, "{:<12} ({:.0} /sec)", value, (value as f64) / time.as_secs_f64())
            } else {
                writeln!(f, "{value:<12}")
            }
        }

        label(f, "nodes")?;
        val_throughput(f, self.n_nodes, &self.solve_time)?;

        label(f, "max depth")?;
        writeln!(f, "{:<12}", self.max_depth)?;

        label(f, "LP solves")?;
        val_throughput(f, self.n_lp_solves, &self.solve_time)?;

        label(f, "LP iterations")?;
        val_throughput(f, self.n_lp_iterations, &self.solve_time)?;

        label(f, "separation rounds")?;
        writeln!(f, "{:<12}", self.n_sepa_rounds)?;

        label(f, "cuts")?;
        writeln!(f, "{:<12}", self.n_cuts)?;
        for (name, n) in &self.cuts_by_sepa {
            label(f, &format!("  {name}"))?;
            writeln!(f, "{n:<12}")?;
        }

        label(f, "conflicts learned")?;
        writeln!(f, "{:<12}", self.n_conflicts)?;

        label(f, "solutions")?;
        writeln!(f, "{:<12}", self.n_sols_found)?;
        for (name, n) in &self.sols_by_plugin {
            label(f, &format!("  {name}"))?;
            writeln!(f, "{n:<12}")?;
        }

        writeln!(f, "================= ")?;
        label(f, "presolve rounds")?;
        writeln!(f, "{:<12}", self.presol_rounds)?;
        label(f, "  fixed")?;
        writeln!(f, "{:<12}", self.presol.nfixed)?;
        label(f, "  bounds")?;
        writeln!(f, "{:<12}", self.presol.nbounds)?;
        label(f, "  deleted conss")?;
        writeln!(f, "{:<12}", self.presol.ndelconss)?;

        label(f, "presolve time")?;
        writeln!(f, "{:.6} s", self.presolve_time.as_secs_f64())?;
        label(f, "solve time")?;
        writeln!(f, "{:.6} s", self.solve_time.as_secs_f64())?;

        Ok(())
    }
}
