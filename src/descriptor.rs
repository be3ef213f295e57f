//! Boundary between a linear system owner and the solver adapter.

use crate::error::Result;
use crate::sparse::AssembledMatrix;

/// A linear system that can be written as `A x = b` and receive `x` back.
pub trait SystemDescriptor {
    /// Number of unknowns (order of `A`).
    fn count_unknowns(&self) -> usize;

    /// Write `A` into `matrix` and `b` into `rhs`.
    ///
    /// `matrix` arrives reset to `count_unknowns()` square and zero-based;
    /// `rhs` arrives zero-filled with `count_unknowns()` entries.
    fn convert_to_matrix_form(&self, matrix: &mut AssembledMatrix, rhs: &mut [f64]) -> Result<()>;

    /// Store the solution `x` into the unknowns of the system.
    fn from_vector_to_unknowns(&mut self, solution: &[f64]) -> Result<()>;
}
