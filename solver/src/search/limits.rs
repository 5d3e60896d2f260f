//! Work limits and cooperative cancellation.
//!
//! The engine checks [`Limits::check`] between every major step (propagation
//! round, LP call, separator call). A triggered limit or the stop flag makes
//! the engine unwind cleanly, preserving incumbent and queue for a resume.

use crate::core::{num, Real};
use crate::err::Result;
use crate::params::ParamStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StopReason {
    TimeLimit,
    NodeLimit,
    MemoryLimit,
    GapLimit,
    Interrupted,
}

pub struct Limits {
    start: Option<Instant>,
    stop: Arc<AtomicBool>,
    time_limit: Real,
    node_limit: i64,
    mem_limit: Real,
    gap_limit: Real,
}

impl Limits {
    pub fn new() -> Limits {
        Limits {
            start: None,
            stop: Arc::new(AtomicBool::new(false)),
            time_limit: crate::core::INF,
            node_limit: -1,
            mem_limit: crate::core::INF,
            gap_limit: 0.0,
        }
    }

    /// Loads the limit parameters; called when solving (re)starts.
    pub fn load(&mut self, params: &ParamStore) -> Result<()> {
        self.time_limit = params.get_real("limits/time")?;
        self.node_limit = params.get_longint("limits/nodes")?;
        self.mem_limit = params.get_real("limits/memory")?;
        self.gap_limit = params.get_real("limits/gap")?;
        Ok(())
    }

    pub fn start_clock(&mut self) {
        if self.start.is_none() {
            self.start = Some(Instant::now());
        }
    }

    pub fn elapsed(&self) -> Real {
        self.start.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0)
    }

    /// Handle that external code (e.g. a signal handler) may set to stop the
    /// engine at the next check point.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn interrupt(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Clears the stop flag for a resume.
    pub fn clear(&mut self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    /// The relative primal-dual gap, `INF` when no incumbent exists.
    pub fn gap(primal: Real, dual: Real) -> Real {
        if !num::finite(primal) || !num::finite(dual) {
            return crate::core::INF;
        }
        (primal - dual).abs() / primal.abs().max(dual.abs()).max(1.0)
    }

    pub fn check(&self, nodes: u64, mem_mb: Real, primal: Real, dual: Real) -> Option<StopReason> {
        if self.stop.load(Ordering::Relaxed) {
            return Some(StopReason::Interrupted);
        }
        if self.elapsed() > self.time_limit {
            return Some(StopReason::TimeLimit);
        }
        if self.node_limit >= 0 && nodes >= self.node_limit as u64 {
            return Some(StopReason::NodeLimit);
        }
        if mem_mb > self.mem_limit {
            return Some(StopReason::MemoryLimit);
        }
        if self.gap_limit > 0.0 && Self::gap(primal, dual) <= self.gap_limit {
            return Some(StopReason::GapLimit);
        }
        None
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stop_flag() {
        let limits = Limits::new();
        assert!(limits.check(0, 0.0, 10.0, 0.0).is_none());
        let handle = limits.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert_eq!(limits.check(0, 0.0, 10.0, 0.0), Some(StopReason::Interrupted));
    }

    #[test]
    fn test_node_limit() {
        let mut limits = Limits::new();
        limits.node_limit = 10;
        assert!(limits.check(9, 0.0, 10.0, 0.0).is_none());
        assert_eq!(limits.check(10, 0.0, 10.0, 0.0), Some(StopReason::NodeLimit));
    }

    #[test]
    fn test_gap() {
        assert!(Limits::gap(10.0, crate::core::INF) >= crate::core::INF);
        assert!((Limits::gap(10.0, 9.0) - 0.1).abs() < 1e-12);
    }
}
