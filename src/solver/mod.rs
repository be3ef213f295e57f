//! Direct sparse solvers for assembled linear systems.

pub mod direct;
pub mod engine;
pub mod runtime;
#[cfg(feature = "distributed")]
pub mod runtime_mpi;
pub(crate) mod sparse_direct;
pub mod status;

use crate::descriptor::SystemDescriptor;
use crate::error::Result;

/// A solver for systems described by a [`SystemDescriptor`].
pub trait LinearSystemSolver {
    /// Solve the system and write the solution into the descriptor.
    ///
    /// Returns the residual norm of the solution.
    fn solve(&mut self, descriptor: &mut dyn SystemDescriptor) -> Result<f64>;

    /// Number of solves attempted so far.
    fn solver_calls(&self) -> u32;
}
