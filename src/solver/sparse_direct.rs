//! Sparse LU back end of the direct engine.
//!
//! Converts the one-based assembled triplets into faer's column-compressed
//! layout (duplicates summed), then runs the symbolic analysis, the numeric
//! factorization and the triangular solves as separate phases so that the
//! engine can expose them behind distinct job codes.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::{SparseColMat, Triplet};
use faer::sparse::FaerError;

use super::status::EngineError;
use crate::sparse::AssembledMatrix;

/// Clamp a count into the `i32` detail slot of a status.
pub(crate) fn detail(x: usize) -> i32 {
    i32::try_from(x).unwrap_or(i32::MAX)
}

/// Zero-based triplets ready for faer, plus the number of entries dropped
/// because their indices fell outside `1..=n`.
pub(crate) struct Entries {
    pub triplets: Vec<Triplet<usize, usize, f64>>,
    pub out_of_range: usize,
}

/// Check that `perm` is a permutation of `0..n`.
///
/// On failure the error carries the one-based position of the first bad entry.
pub(crate) fn validate_permutation(perm: &[usize], n: usize) -> Result<(), EngineError> {
    if perm.len() != n {
        return Err(EngineError::BadPermutation {
            position: detail(perm.len().min(n) + 1),
        });
    }
    let mut seen = vec![false; n];
    for (i, &p) in perm.iter().enumerate() {
        if p >= n || seen[p] {
            return Err(EngineError::BadPermutation { position: detail(i + 1) });
        }
        seen[p] = true;
    }
    Ok(())
}

/// Gather the one-based triplets of `matrix` as zero-based faer triplets,
/// applying the symmetric permutation `perm` when given.
pub(crate) fn collect_entries(
    matrix: &AssembledMatrix,
    n: usize,
    perm: Option<&[usize]>,
) -> Result<Entries, EngineError> {
    let base = matrix.base();
    let mut triplets = Vec::new();
    triplets
        .try_reserve_exact(matrix.len())
        .map_err(|_| EngineError::RealWorkspace { size: detail(matrix.len()) })?;

    let mut out_of_range = 0;
    for (row, col, val) in matrix.triplets() {
        if row < base || col < base || row - base >= n || col - base >= n {
            out_of_range += 1;
            continue;
        }
        let (mut r, mut c) = (row - base, col - base);
        if let Some(p) = perm {
            r = p[r];
            c = p[c];
        }
        triplets.push(Triplet::new(r, c, val));
    }

    Ok(Entries { triplets, out_of_range })
}

fn count_empty(n: usize, indices: impl Iterator<Item = usize>) -> Result<usize, EngineError> {
    let mut hit = Vec::new();
    hit.try_reserve_exact(n)
        .map_err(|_| EngineError::IntegerWorkspace { size: detail(n) })?;
    hit.resize(n, false);
    for i in indices {
        hit[i] = true;
    }
    Ok(hit.iter().filter(|&&h| !h).count())
}

fn build(n: usize, triplets: &[Triplet<usize, usize, f64>]) -> Result<SparseColMat<usize, f64>, EngineError> {
    SparseColMat::<usize, f64>::try_new_from_triplets(n, n, triplets).map_err(|e| {
        tracing::debug!(?e, "sparse matrix build failed");
        EngineError::ArrayPointers { detail: 0 }
    })
}

/// Symbolic analysis: structural checks, then fill-reducing ordering.
pub(crate) fn analyze(
    n: usize,
    triplets: &[Triplet<usize, usize, f64>],
) -> Result<SymbolicLu<usize>, EngineError> {
    let empty_rows = count_empty(n, triplets.iter().map(|t| t.row))?;
    let empty_cols = count_empty(n, triplets.iter().map(|t| t.col))?;
    let empty = empty_rows.max(empty_cols);
    if empty > 0 {
        return Err(EngineError::StructurallySingular { rank: detail(n - empty) });
    }

    let mat = build(n, triplets)?;
    SymbolicLu::try_new(mat.symbolic().as_ref()).map_err(|e| match e {
        FaerError::OutOfMemory => EngineError::IntegerWorkspace { size: detail(triplets.len()) },
        _ => EngineError::OrderOutOfRange { n: detail(n) },
    })
}

/// Numeric factorization reusing a symbolic analysis of the same pattern.
pub(crate) fn factorize(
    symbolic: &SymbolicLu<usize>,
    n: usize,
    triplets: &[Triplet<usize, usize, f64>],
) -> Result<Lu<usize, f64>, EngineError> {
    let mut cells: HashMap<(usize, usize), f64> = HashMap::with_capacity(triplets.len());
    for t in triplets {
        if !t.val.is_finite() {
            return Err(EngineError::NumericallySingular { pivot: 0 });
        }
        *cells.entry((t.row, t.col)).or_insert(0.0) += t.val;
    }
    let mut row_live = vec![false; n];
    for (&(row, _), &v) in &cells {
        if v != 0.0 {
            row_live[row] = true;
        }
    }
    if let Some(row) = row_live.iter().position(|&live| !live) {
        return Err(EngineError::NumericallySingular { pivot: detail(row + 1) });
    }

    let mat = build(n, triplets)?;
    let symbolic = symbolic.clone();
    // The simplicial kernel panics on an exact zero pivot instead of failing.
    let factored = panic::catch_unwind(AssertUnwindSafe(|| Lu::try_new_with_symbolic(symbolic, mat.as_ref())));
    match factored {
        Ok(Ok(lu)) => Ok(lu),
        Ok(Err(e)) => {
            tracing::debug!(?e, "sparse LU factorization failed");
            Err(EngineError::NumericallySingular { pivot: 0 })
        }
        Err(_) => {
            tracing::debug!("zero pivot during sparse LU factorization");
            Err(EngineError::NumericallySingular { pivot: 0 })
        }
    }
}

/// Forward/backward substitution with a cached factorization.
pub(crate) fn solve(lu: &Lu<usize, f64>, rhs: &[f64]) -> Result<Vec<f64>, EngineError> {
    let n = rhs.len();
    let b = faer::Mat::<f64>::from_fn(n, 1, |i, _| rhs[i]);
    let x = lu.solve(&b);

    let mut out = vec![0.0; n];
    for (i, xi) in out.iter_mut().enumerate() {
        let v = x[(i, 0)];
        if !v.is_finite() {
            return Err(EngineError::NumericallySingular { pivot: 0 });
        }
        *xi = v;
    }
    Ok(out)
}
