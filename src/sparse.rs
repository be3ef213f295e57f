//! Assembled (coordinate / triplet) sparse matrix.
//!
//! Entries are kept as three parallel arrays of row index, column index and
//! value. This is the layout the direct engine consumes: duplicates for the
//! same cell may coexist and are summed on read and during factorization.
//!
//! Indices passed to [`AssembledMatrix::set_element`] and
//! [`AssembledMatrix::get_element`] are interpreted in the matrix's active
//! convention (zero-based unless [`AssembledMatrix::set_one_indexed`] was
//! switched on).

use nalgebra::{DMatrix, Dim, Matrix, RawStorage};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fraction of a dense matrix assumed non-zero when no size hint is given.
pub const DEFAULT_FULLNESS: f64 = 0.1;

/// Default capacity growth step of the triplet store.
pub const DEFAULT_AUGMENTATION: usize = 4;

/// Duplicate / overwrite behavior of [`AssembledMatrix::set_element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssemblyPolicy {
    /// Several triplets may address the same cell; their values are summed.
    pub duplicates_allowed: bool,
    /// An overwriting insert appends a fresh triplet instead of replacing.
    pub overwrite_means_new: bool,
    /// Minimum capacity growth when the triplet store is full.
    pub augmentation: usize,
}

impl AssemblyPolicy {
    /// At most one triplet per cell; overwrites replace in place.
    pub fn unique() -> Self {
        Self {
            duplicates_allowed: false,
            overwrite_means_new: false,
            augmentation: DEFAULT_AUGMENTATION,
        }
    }
}

impl Default for AssemblyPolicy {
    fn default() -> Self {
        Self {
            duplicates_allowed: true,
            overwrite_means_new: true,
            augmentation: DEFAULT_AUGMENTATION,
        }
    }
}

/// Sparse matrix stored as an unordered collection of (row, col, value).
///
/// The three arrays always have the same length, which is the physical
/// capacity; only the first `len()` entries are meaningful.
#[derive(Debug, Clone)]
pub struct AssembledMatrix {
    nrows: usize,
    ncols: usize,
    row_indices: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
    len: usize,
    one_indexed: bool,
    policy: AssemblyPolicy,
}

impl AssembledMatrix {
    /// Create an empty matrix with room for `nonzeros` triplets.
    ///
    /// A zero hint reserves [`DEFAULT_FULLNESS`] of the dense size.
    pub fn new(nrows: usize, ncols: usize, nonzeros: usize, policy: AssemblyPolicy) -> Self {
        let hint = if nonzeros == 0 {
            ((nrows * ncols) as f64 * DEFAULT_FULLNESS) as usize
        } else {
            nonzeros
        };
        let mut m = Self {
            nrows,
            ncols,
            row_indices: Vec::new(),
            col_indices: Vec::new(),
            values: Vec::new(),
            len: 0,
            one_indexed: false,
            policy,
        };
        m.reset(nrows, ncols, hint);
        m
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored triplets (logical size).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Physical capacity of the triplet store.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn is_one_indexed(&self) -> bool {
        self.one_indexed
    }

    /// 1 in one-based mode, 0 otherwise.
    pub fn base(&self) -> usize {
        usize::from(self.one_indexed)
    }

    pub fn policy(&self) -> AssemblyPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: AssemblyPolicy) {
        self.policy = policy;
    }

    /// Stored row indices, in the active convention.
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices[..self.len]
    }

    /// Stored column indices, in the active convention.
    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices[..self.len]
    }

    pub fn values(&self) -> &[f64] {
        &self.values[..self.len]
    }

    /// Iterate over the stored triplets in insertion order.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.len).map(move |k| (self.row_indices[k], self.col_indices[k], self.values[k]))
    }

    /// Drop every triplet and switch back to zero-based indexing.
    ///
    /// Capacity is kept, and raised to at least `nonzeros`.
    pub fn reset(&mut self, nrows: usize, ncols: usize, nonzeros: usize) {
        self.nrows = nrows;
        self.ncols = ncols;
        if nonzeros > self.capacity() {
            self.grow_to(nonzeros);
        }
        self.len = 0;
        self.set_one_indexed(false);
    }

    /// Update the dimensions and make room for `nonzeros` triplets.
    ///
    /// Growth is `max(capacity + augmentation, nonzeros)`; the store never
    /// shrinks here.
    pub fn resize(&mut self, nrows: usize, ncols: usize, nonzeros: usize) {
        self.nrows = nrows;
        self.ncols = ncols;
        let capacity = self.capacity();
        if nonzeros > capacity {
            self.grow_to((capacity + self.policy.augmentation).max(nonzeros));
        }
    }

    fn grow_to(&mut self, capacity: usize) {
        self.row_indices.resize(capacity, 0);
        self.col_indices.resize(capacity, 0);
        self.values.resize(capacity, 0.0);
    }

    fn push(&mut self, row: usize, col: usize, value: f64) {
        let entry = self.len;
        if entry == self.capacity() {
            self.resize(self.nrows, self.ncols, entry + 1);
        }
        self.row_indices[entry] = row;
        self.col_indices[entry] = col;
        self.values[entry] = value;
        self.len += 1;
    }

    /// Insert `value` at (row, col) following the matrix's [`AssemblyPolicy`].
    ///
    /// With `overwrite` the cell takes `value` (or a new triplet is appended
    /// when `overwrite_means_new`); without it `value` is added to the cell.
    pub fn set_element(&mut self, row: usize, col: usize, value: f64, overwrite: bool) {
        let policy = self.policy;
        let scan = (overwrite && !policy.overwrite_means_new)
            || (!overwrite && !policy.duplicates_allowed);

        if scan {
            let mut value = value;
            let mut found = false;
            for k in 0..self.len {
                if self.row_indices[k] != row || self.col_indices[k] != col {
                    continue;
                }
                if overwrite {
                    self.values[k] = value;
                } else {
                    self.values[k] += value;
                }
                found = true;
                if !policy.duplicates_allowed {
                    break;
                }
                // Later duplicates of a replaced cell must not add to it.
                value = 0.0;
            }
            if found {
                return;
            }
        }

        self.push(row, col, value);
    }

    /// Value of (row, col); every duplicate is summed when duplicates are
    /// allowed. Returns 0 when the cell holds no triplet.
    pub fn get_element(&self, row: usize, col: usize) -> f64 {
        let mut value = 0.0;
        for k in 0..self.len {
            if self.row_indices[k] == row && self.col_indices[k] == col {
                value += self.values[k];
                if !self.policy.duplicates_allowed {
                    break;
                }
            }
        }
        value
    }

    /// Release the slack so that capacity equals the logical size.
    pub fn trim(&mut self) {
        self.row_indices.truncate(self.len);
        self.col_indices.truncate(self.len);
        self.values.truncate(self.len);
        self.row_indices.shrink_to_fit();
        self.col_indices.shrink_to_fit();
        self.values.shrink_to_fit();
    }

    /// Remove exact-zero triplets, keeping the order of the others.
    ///
    /// # Panics
    ///
    /// Panics if the first stored triplet is zero: the assembly that produced
    /// the matrix is in an inconsistent state.
    pub fn prune(&mut self) {
        let Some(first_zero) = self.values().iter().position(|&v| v == 0.0) else {
            return;
        };
        assert!(
            first_zero != 0,
            "assembled matrix inconsistent: leading triplet is zero"
        );

        let mut write = first_zero;
        for read in first_zero..self.len {
            if self.values[read] != 0.0 {
                self.values[write] = self.values[read];
                self.row_indices[write] = self.row_indices[read];
                self.col_indices[write] = self.col_indices[read];
                write += 1;
            }
        }
        self.len = write;
    }

    /// Switch the stored indices between zero- and one-based.
    pub fn set_one_indexed(&mut self, on: bool) {
        if on == self.one_indexed {
            return;
        }
        self.one_indexed = on;
        let (rows, cols) = (
            &mut self.row_indices[..self.len],
            &mut self.col_indices[..self.len],
        );
        if on {
            rows.iter_mut().for_each(|r| *r += 1);
            cols.iter_mut().for_each(|c| *c += 1);
        } else {
            rows.iter_mut().for_each(|r| *r -= 1);
            cols.iter_mut().for_each(|c| *c -= 1);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn paste_with(
        &mut self,
        nrows: usize,
        ncols: usize,
        insrow: usize,
        inscol: usize,
        overwrite: bool,
        transpose: bool,
        get: impl Fn(usize, usize) -> f64,
    ) {
        if transpose {
            for i in 0..ncols {
                for j in 0..nrows {
                    let v = get(j, i);
                    if v != 0.0 {
                        self.set_element(insrow + i, inscol + j, v, overwrite);
                    }
                }
            }
        } else {
            for i in 0..nrows {
                for j in 0..ncols {
                    let v = get(i, j);
                    if v != 0.0 {
                        self.set_element(insrow + i, inscol + j, v, overwrite);
                    }
                }
            }
        }
    }

    /// Copy the non-zero entries of a dense block with its top-left corner at
    /// (insrow, inscol), optionally transposed.
    pub fn paste_matrix<R, C, S>(
        &mut self,
        block: &Matrix<f64, R, C, S>,
        insrow: usize,
        inscol: usize,
        overwrite: bool,
        transpose: bool,
    ) where
        R: Dim,
        C: Dim,
        S: RawStorage<f64, R, C>,
    {
        let (nrows, ncols) = block.shape();
        self.paste_with(nrows, ncols, insrow, inscol, overwrite, transpose, |i, j| {
            block[(i, j)]
        });
    }

    /// Single-precision variant of [`Self::paste_matrix`].
    pub fn paste_matrix_f32<R, C, S>(
        &mut self,
        block: &Matrix<f32, R, C, S>,
        insrow: usize,
        inscol: usize,
        overwrite: bool,
        transpose: bool,
    ) where
        R: Dim,
        C: Dim,
        S: RawStorage<f32, R, C>,
    {
        let (nrows, ncols) = block.shape();
        self.paste_with(nrows, ncols, insrow, inscol, overwrite, transpose, |i, j| {
            f64::from(block[(i, j)])
        });
    }

    /// Copy the `nrows × ncols` window of `block` starting at
    /// (cliprow, clipcol) to (insrow, inscol).
    #[allow(clippy::too_many_arguments)]
    pub fn paste_clipped_matrix<R, C, S>(
        &mut self,
        block: &Matrix<f64, R, C, S>,
        cliprow: usize,
        clipcol: usize,
        nrows: usize,
        ncols: usize,
        insrow: usize,
        inscol: usize,
        overwrite: bool,
    ) where
        R: Dim,
        C: Dim,
        S: RawStorage<f64, R, C>,
    {
        self.paste_with(nrows, ncols, insrow, inscol, overwrite, false, |i, j| {
            block[(cliprow + i, clipcol + j)]
        });
    }

    /// Sparse matrix-vector product y = A * x, duplicates summed.
    ///
    /// Triplets addressing cells outside the matrix are ignored.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.ncols, "mul_vec dimension mismatch");
        let base = self.base();
        let mut y = vec![0.0; self.nrows];
        for (row, col, value) in self.triplets() {
            if row < base || col < base || row - base >= self.nrows || col - base >= self.ncols {
                continue;
            }
            y[row - base] += value * x[col - base];
        }
        y
    }

    /// Convert to a dense matrix. For testing and small matrices only.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let base = self.base();
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for (row, col, value) in self.triplets() {
            dense[(row - base, col - base)] += value;
        }
        dense
    }
}
