//! Performance statistics collected by the direct solver adapter.

use std::time::{Duration, Instant};

/// Call counter and phase timings accumulated across solves.
///
/// Owned by [`crate::solver::direct::DirectSolver`]; every call to `solve`
/// adds to it, successful or not.
#[derive(Debug, Clone)]
pub struct SolveStats {
    created: Instant,
    pub solver_calls: u32,
    pub failed_calls: u32,
    // Sub-phase accumulators
    pub assembly: Duration,
    pub factorization: Duration,
    pub scatter: Duration,
    pub last_nonzeros: usize,
    pub last_order: usize,
}

impl Default for SolveStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SolveStats {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            solver_calls: 0,
            failed_calls: 0,
            assembly: Duration::ZERO,
            factorization: Duration::ZERO,
            scatter: Duration::ZERO,
            last_nonzeros: 0,
            last_order: 0,
        }
    }

    /// Time spent in assembly, factorization and scatter together.
    pub fn total_solve_time(&self) -> Duration {
        self.assembly + self.factorization + self.scatter
    }

    /// Log the counters at info level.
    pub fn display(&self) {
        tracing::info!(
            calls = self.solver_calls,
            failed = self.failed_calls,
            order = self.last_order,
            nonzeros = self.last_nonzeros,
            "direct solver stats"
        );
        tracing::info!(
            assembly_s = self.assembly.as_secs_f64(),
            factorization_s = self.factorization.as_secs_f64(),
            scatter_s = self.scatter.as_secs_f64(),
            wall_s = self.created.elapsed().as_secs_f64(),
            "direct solver timings"
        );
    }
}
