//! MPI runtime binding for the direct engine.
//!
//! Requires the `distributed` feature flag and an MPI installation.
//!
//! # Usage
//!
//! ```ignore
//! let runtime = MpiRuntime::initialize()?;
//! let mut solver = DirectSolver::with_runtime(runtime, DirectSolverConfig::default());
//! ```
//!
//! MPI can be initialized once per process. The binding is released when the
//! `MpiRuntime` is dropped, so it must outlive every engine borrowing it.

use super::runtime::{SolverRuntime, HOST_RANK};
use crate::error::{LinksolveError, Result};
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

/// MPI-based runtime bound to the world communicator.
pub struct MpiRuntime {
    universe: Universe,
}

impl MpiRuntime {
    /// Initialize MPI and bind to the world communicator.
    ///
    /// Fails if MPI was already initialized in this process.
    pub fn initialize() -> Result<Self> {
        let universe = mpi::initialize().ok_or_else(|| {
            LinksolveError::Runtime("MPI already initialized in this process".into())
        })?;
        let world = universe.world();
        tracing::debug!(rank = world.rank(), size = world.size(), "MPI runtime bound");
        Ok(Self { universe })
    }

    fn world(&self) -> SimpleCommunicator {
        self.universe.world()
    }
}

impl SolverRuntime for MpiRuntime {
    fn rank(&self) -> usize {
        self.world().rank() as usize
    }

    fn num_ranks(&self) -> usize {
        self.world().size() as usize
    }

    fn broadcast_ints(&self, data: &mut [i32]) {
        let world = self.world();
        world
            .process_at_rank(HOST_RANK as i32)
            .broadcast_into(data);
    }

    fn broadcast_values(&self, data: &mut [f64]) {
        let world = self.world();
        world
            .process_at_rank(HOST_RANK as i32)
            .broadcast_into(data);
    }

    fn barrier(&self) {
        self.world().barrier();
    }
}
