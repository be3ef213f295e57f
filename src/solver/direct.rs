//! Linear system adapter over the direct engine.
//!
//! One `solve` call asks the descriptor for `A` and `b`, runs the combined
//! analyze/factorize/solve job on a freshly initialized engine and scatters
//! the solution back. The engine is torn down before `solve` returns, on
//! every path.

use std::time::Instant;

use super::engine::{DirectEngine, EngineConfig};
use super::runtime::{SingleProcessRuntime, SolverRuntime};
use super::status::Job;
use crate::descriptor::SystemDescriptor;
use crate::error::{LinksolveError, Result};
use crate::sparse::{AssembledMatrix, AssemblyPolicy};
use crate::stats::SolveStats;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters for [`DirectSolver`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectSolverConfig {
    /// Insertion policy of the assembled matrix handed to descriptors.
    pub assembly: AssemblyPolicy,
    pub engine: EngineConfig,
    /// Expected non-zero count; 0 picks a fraction of the dense size.
    pub nonzeros_hint: usize,
    /// Compute ‖A·x − b‖₂ after each successful solve.
    pub compute_residual: bool,
}

impl Default for DirectSolverConfig {
    fn default() -> Self {
        Self {
            assembly: AssemblyPolicy::default(),
            engine: EngineConfig::default(),
            nonzeros_hint: 0,
            compute_residual: true,
        }
    }
}

/// Direct sparse solver for [`SystemDescriptor`]s.
///
/// The assembled matrix and right-hand side buffers are kept between calls
/// and reused.
pub struct DirectSolver<R: SolverRuntime = SingleProcessRuntime> {
    runtime: R,
    config: DirectSolverConfig,
    matrix: Option<AssembledMatrix>,
    rhs: Vec<f64>,
    last_residual_norm: f64,
    stats: SolveStats,
}

impl DirectSolver<SingleProcessRuntime> {
    pub fn new(config: DirectSolverConfig) -> Self {
        Self::with_runtime(SingleProcessRuntime, config)
    }
}

impl Default for DirectSolver<SingleProcessRuntime> {
    fn default() -> Self {
        Self::new(DirectSolverConfig::default())
    }
}

impl<R: SolverRuntime> DirectSolver<R> {
    pub fn with_runtime(runtime: R, config: DirectSolverConfig) -> Self {
        Self {
            runtime,
            config,
            matrix: None,
            rhs: Vec::new(),
            last_residual_norm: 0.0,
            stats: SolveStats::new(),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn config(&self) -> &DirectSolverConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DirectSolverConfig {
        &mut self.config
    }

    /// Number of `solve` calls so far, failed ones included.
    pub fn solver_calls(&self) -> u32 {
        self.stats.solver_calls
    }

    /// Residual norm of the last successful solve (0 when not computed).
    pub fn last_residual_norm(&self) -> f64 {
        self.last_residual_norm
    }

    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }

    /// The matrix assembled by the last call, one-based after a solve.
    pub fn last_matrix(&self) -> Option<&AssembledMatrix> {
        self.matrix.as_ref()
    }

    /// Solve the descriptor's system and store the solution into it.
    ///
    /// Returns the residual norm ‖A·x − b‖₂ (0 when residuals are disabled).
    /// On failure the descriptor's unknowns are left untouched and the
    /// decoded engine status is returned.
    pub fn solve(&mut self, descriptor: &mut dyn SystemDescriptor) -> Result<f64> {
        self.stats.solver_calls += 1;
        let span = tracing::info_span!("direct_solve", call = self.stats.solver_calls);
        let _guard = span.enter();

        let result = self.solve_inner(descriptor);
        if result.is_err() {
            self.stats.failed_calls += 1;
        }
        result
    }

    fn solve_inner(&mut self, descriptor: &mut dyn SystemDescriptor) -> Result<f64> {
        let n = descriptor.count_unknowns();
        let hint = self.config.nonzeros_hint;

        let t = Instant::now();
        let mut matrix = self
            .matrix
            .take()
            .unwrap_or_else(|| AssembledMatrix::new(n, n, hint, self.config.assembly));
        matrix.set_policy(self.config.assembly);
        matrix.reset(n, n, hint);
        let mut rhs = std::mem::take(&mut self.rhs);
        rhs.clear();
        rhs.resize(n, 0.0);

        let assembled = descriptor.convert_to_matrix_form(&mut matrix, &mut rhs);
        self.stats.assembly += t.elapsed();
        let assembled = assembled.and_then(|()| {
            if matrix.nrows() != n || matrix.ncols() != n {
                return Err(LinksolveError::Assembly(format!(
                    "descriptor left a {}x{} matrix for {n} unknowns",
                    matrix.nrows(),
                    matrix.ncols()
                )));
            }
            Ok(())
        });
        if let Err(e) = assembled {
            self.matrix = Some(matrix);
            self.rhs = rhs;
            return Err(e);
        }
        tracing::debug!(n, nz = matrix.len(), "system assembled");

        let b = self.config.compute_residual.then(|| rhs.clone());

        let t = Instant::now();
        let (status, problem) = {
            let mut engine = DirectEngine::initialize(&self.runtime, self.config.engine.clone());
            engine.set_problem(matrix, rhs);
            engine.call(Job::All);
            (engine.check(), engine.take_problem())
        };
        self.stats.factorization += t.elapsed();

        let (matrix, solution) = problem.ok_or_else(|| {
            LinksolveError::Runtime("direct engine did not return the problem buffers".into())
        })?;
        self.stats.last_order = matrix.nrows();
        self.stats.last_nonzeros = matrix.len();

        if let Err(e) = status {
            self.matrix = Some(matrix);
            self.rhs = solution;
            return Err(e.into());
        }

        self.last_residual_norm = match &b {
            Some(b) => matrix
                .mul_vec(&solution)
                .iter()
                .zip(b)
                .map(|(ax, b)| (ax - b) * (ax - b))
                .sum::<f64>()
                .sqrt(),
            None => 0.0,
        };
        tracing::debug!(residual = self.last_residual_norm, "system solved");

        let t = Instant::now();
        let scattered = descriptor.from_vector_to_unknowns(&solution);
        self.stats.scatter += t.elapsed();

        self.matrix = Some(matrix);
        self.rhs = solution;
        scattered.map(|()| self.last_residual_norm)
    }
}

impl<R: SolverRuntime> super::LinearSystemSolver for DirectSolver<R> {
    fn solve(&mut self, descriptor: &mut dyn SystemDescriptor) -> Result<f64> {
        DirectSolver::solve(self, descriptor)
    }

    fn solver_calls(&self) -> u32 {
        self.stats.solver_calls
    }
}
