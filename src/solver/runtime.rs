//! Parallel runtime binding for the direct engine.
//!
//! The engine centralizes the matrix on the host rank, factorizes there and
//! broadcasts status and solution to the other ranks. The runtime is the
//! process-wide resource this relies on; it is owned by the caller and lent
//! to each engine instance.

/// Rank that holds the assembled matrix and runs the factorization.
pub const HOST_RANK: usize = 0;

/// Abstraction over the process group the engine runs on.
///
/// Implementations: `SingleProcessRuntime` (no-op), `MpiRuntime` (via mpi crate).
/// Every rank must make the same sequence of calls.
pub trait SolverRuntime {
    /// This process's rank.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn num_ranks(&self) -> usize;

    fn is_host(&self) -> bool {
        self.rank() == HOST_RANK
    }

    /// Broadcast integers from the host rank to every rank, in place.
    fn broadcast_ints(&self, data: &mut [i32]);

    /// Broadcast values from the host rank to every rank, in place.
    fn broadcast_values(&self, data: &mut [f64]);

    /// Synchronization barrier.
    fn barrier(&self);
}

/// No-op runtime for single-process execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleProcessRuntime;

impl SolverRuntime for SingleProcessRuntime {
    fn rank(&self) -> usize {
        HOST_RANK
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn broadcast_ints(&self, _data: &mut [i32]) {
        // Single process: data already lives on the host.
    }

    fn broadcast_values(&self, _data: &mut [f64]) {}

    fn barrier(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_process_is_host() {
        let rt = SingleProcessRuntime;
        assert_eq!(rt.rank(), 0);
        assert_eq!(rt.num_ranks(), 1);
        assert!(rt.is_host());
    }

    #[test]
    fn single_process_broadcast_is_noop() {
        let rt = SingleProcessRuntime;
        let mut ints = [3, -6];
        let mut values = [1.5, 2.5];
        rt.broadcast_ints(&mut ints);
        rt.broadcast_values(&mut values);
        rt.barrier();
        assert_eq!(ints, [3, -6]);
        assert_eq!(values, [1.5, 2.5]);
    }
}
