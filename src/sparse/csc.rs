//! Compressed sparse column matrix.

use super::cholesky::CholeskyFactor;
use super::compressed::Compressed;
use super::kernel;
use super::{CsrMatrix, TripletMatrix};
use crate::types::{FillReducing, GpaError, Result};
use crate::vector::{DenseVector, SparseVector, Vector};
use ndarray::Array2;
use sprs::CsMat;

/// Immutable compressed-column matrix.
///
/// Column `j` owns `col_ptr[j]..col_ptr[j + 1]` of the parallel
/// `row_indices` / `values` arrays.  A row appears at most once per column;
/// rows within a column are not required to be sorted.  Every operation
/// returns a new matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    rows: usize,
    cols: usize,
    store: Compressed,
}

impl CscMatrix {
    // ── Construction ──────────────────────────────────────────

    /// Build from raw compressed arrays, validating their structure.
    pub fn new(
        rows: usize,
        cols: usize,
        col_ptr: Vec<usize>,
        row_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let store = Compressed::from_raw(cols, rows, col_ptr, row_indices, values)?;
        Ok(Self { rows, cols, store })
    }

    pub(crate) fn from_compressed(rows: usize, cols: usize, store: Compressed) -> Self {
        debug_assert_eq!(store.outer, cols);
        debug_assert_eq!(store.inner, rows);
        Self { rows, cols, store }
    }

    pub(crate) fn store(&self) -> &Compressed {
        &self.store
    }

    pub fn zero(rows: usize, cols: usize) -> Self {
        Self::from_compressed(rows, cols, Compressed::empty(cols, rows))
    }

    pub fn identity(n: usize) -> Self {
        Self::diagonal(&vec![1.0; n])
    }

    pub fn diagonal(values: &[f64]) -> Self {
        let n = values.len();
        Self::from_compressed(n, n, Compressed::diagonal(values))
    }

    pub fn from_triplets(triplets: &TripletMatrix) -> Self {
        triplets.to_csc()
    }

    /// Build from a dense array, skipping exact zeros.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let (rows, cols) = dense.dim();
        let lanes: Vec<Vec<(usize, f64)>> = (0..cols)
            .map(|j| {
                (0..rows)
                    .filter_map(|i| {
                        let v = dense[[i, j]];
                        (v != 0.0).then_some((i, v))
                    })
                    .collect()
            })
            .collect();
        Self::from_compressed(rows, cols, Compressed::from_lanes(cols, rows, lanes))
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn nnz(&self) -> usize {
        self.store.nnz()
    }

    pub fn col_ptr(&self) -> &[usize] {
        &self.store.ptr
    }

    pub fn row_indices(&self) -> &[usize] {
        &self.store.idx
    }

    pub fn values(&self) -> &[f64] {
        &self.store.val
    }

    /// Row indices and values stored in column `col`.
    pub fn column(&self, col: usize) -> Result<(&[usize], &[f64])> {
        if col >= self.cols {
            return Err(GpaError::IndexOutOfRange {
                context: "CscMatrix::column",
                index: col,
                bound: self.cols,
            });
        }
        Ok(self.store.lane(col))
    }

    /// `(row, col, value)` for every stored entry, column by column.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.store.entries().map(|(c, r, v)| (r, c, v))
    }

    pub fn at(&self, row: usize, col: usize) -> Result<f64> {
        if row >= self.rows {
            return Err(GpaError::IndexOutOfRange {
                context: "CscMatrix::at (row)",
                index: row,
                bound: self.rows,
            });
        }
        if col >= self.cols {
            return Err(GpaError::IndexOutOfRange {
                context: "CscMatrix::at (col)",
                index: col,
                bound: self.cols,
            });
        }
        Ok(self.store.get(col, row))
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.rows, self.cols));
        for (r, c, v) in self.iter() {
            out[[r, c]] = v;
        }
        out
    }

    // ── Arithmetic ────────────────────────────────────────────

    fn check_same_shape(&self, other: &CscMatrix, context: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(GpaError::ShapeMismatch {
                context,
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &CscMatrix) -> Result<CscMatrix> {
        self.check_same_shape(other, "CscMatrix::add")?;
        Ok(Self::from_compressed(self.rows, self.cols, self.store.merge(&other.store, 1.0)))
    }

    pub fn subtract(&self, other: &CscMatrix) -> Result<CscMatrix> {
        self.check_same_shape(other, "CscMatrix::subtract")?;
        Ok(Self::from_compressed(self.rows, self.cols, self.store.merge(&other.store, -1.0)))
    }

    /// Matrix product `self · other`.
    pub fn multiply(&self, other: &CscMatrix) -> Result<CscMatrix> {
        if self.cols != other.rows {
            return Err(GpaError::ShapeMismatch {
                context: "CscMatrix::multiply",
                left: self.shape(),
                right: other.shape(),
            });
        }
        // column j of the product = Σ B[k, j] · A[:, k]
        let store = Compressed::product(&other.store, &self.store);
        Ok(Self::from_compressed(self.rows, other.cols, store))
    }

    pub fn scale(&self, factor: f64) -> CscMatrix {
        if factor == 0.0 {
            return Self::zero(self.rows, self.cols);
        }
        Self::from_compressed(self.rows, self.cols, self.store.map_values(|v| v * factor))
    }

    pub fn divide(&self, divisor: f64) -> Result<CscMatrix> {
        if divisor == 0.0 {
            return Err(GpaError::DivisionByZero);
        }
        Ok(Self::from_compressed(self.rows, self.cols, self.store.map_values(|v| v / divisor)))
    }

    /// `AᵗA`, the normal-equation matrix of `A`.
    pub fn transpose_multiply_self(&self) -> CscMatrix {
        // CSC arrays of Aᵗ are the CSR arrays of A
        let at = self.store.transposed();
        let store = Compressed::product(&self.store, &at);
        Self::from_compressed(self.cols, self.cols, store)
    }

    /// `Aᵗ` as a row-major matrix sharing this matrix's arrays.
    pub fn transpose(&self) -> CsrMatrix {
        CsrMatrix::from_compressed(self.cols, self.rows, self.store.clone())
    }

    /// The same matrix in row-major storage.
    pub fn to_csr(&self) -> CsrMatrix {
        CsrMatrix::from_compressed(self.rows, self.cols, self.store.transposed())
    }

    /// `[self; other]`: stack rows of `other` below `self`.
    pub fn vstack(&self, other: &CscMatrix) -> Result<CscMatrix> {
        if self.cols != other.cols {
            return Err(GpaError::ShapeMismatch {
                context: "CscMatrix::vstack",
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(Self::from_compressed(
            self.rows + other.rows,
            self.cols,
            self.store.stack_inner(&other.store),
        ))
    }

    // ── Matrix–vector products ───────────────────────────────

    pub fn multiply_vector(&self, x: &Vector) -> Result<DenseVector> {
        match x {
            Vector::Dense(d) => self.multiply_dense(d),
            Vector::Sparse(s) => self.multiply_sparse(s),
        }
    }

    pub fn multiply_dense(&self, x: &DenseVector) -> Result<DenseVector> {
        if x.size() != self.cols {
            return Err(GpaError::DimensionMismatch {
                context: "CscMatrix::multiply_dense",
                expected: self.cols,
                actual: x.size(),
            });
        }
        let mut y = vec![0.0; self.rows];
        for j in 0..self.cols {
            let xj = x[j];
            if xj == 0.0 {
                continue;
            }
            let (idx, val) = self.store.lane(j);
            for (&i, &v) in idx.iter().zip(val) {
                y[i] += v * xj;
            }
        }
        Ok(DenseVector::from_vec(y))
    }

    /// Visits only the columns selected by the nonzeros of `x`.
    pub fn multiply_sparse(&self, x: &SparseVector) -> Result<DenseVector> {
        if x.size() != self.cols {
            return Err(GpaError::DimensionMismatch {
                context: "CscMatrix::multiply_sparse",
                expected: self.cols,
                actual: x.size(),
            });
        }
        let mut y = vec![0.0; self.rows];
        for (j, xj) in x.sorted_entries() {
            let (idx, val) = self.store.lane(j);
            for (&i, &v) in idx.iter().zip(val) {
                y[i] += v * xj;
            }
        }
        Ok(DenseVector::from_vec(y))
    }

    /// `Aᵗ·x`.
    pub fn transpose_multiply_vector(&self, x: &Vector) -> Result<DenseVector> {
        match x {
            Vector::Dense(d) => self.transpose_multiply_dense(d),
            Vector::Sparse(s) => self.transpose_multiply_sparse(s),
        }
    }

    pub fn transpose_multiply_dense(&self, x: &DenseVector) -> Result<DenseVector> {
        if x.size() != self.rows {
            return Err(GpaError::DimensionMismatch {
                context: "CscMatrix::transpose_multiply_dense",
                expected: self.rows,
                actual: x.size(),
            });
        }
        let y = (0..self.cols)
            .map(|j| {
                let (idx, val) = self.store.lane(j);
                idx.iter().zip(val).map(|(&i, &v)| v * x[i]).sum::<f64>()
            })
            .collect();
        Ok(DenseVector::from_vec(y))
    }

    pub fn transpose_multiply_sparse(&self, x: &SparseVector) -> Result<DenseVector> {
        if x.size() != self.rows {
            return Err(GpaError::DimensionMismatch {
                context: "CscMatrix::transpose_multiply_sparse",
                expected: self.rows,
                actual: x.size(),
            });
        }
        if x.nnz() == 0 {
            return Ok(DenseVector::zeros(self.cols));
        }
        let y = (0..self.cols)
            .map(|j| {
                let (idx, val) = self.store.lane(j);
                idx.iter().zip(val).map(|(&i, &v)| v * x.value(i)).sum::<f64>()
            })
            .collect();
        Ok(DenseVector::from_vec(y))
    }

    // ── Factorisations ───────────────────────────────────────

    /// Orthonormal basis of the right null space.
    ///
    /// Row reduction with partial pivoting finds the free columns; the
    /// resulting null vectors are orthonormalised by Gram-Schmidt.  A
    /// full-column-rank matrix yields an empty basis.
    ///
    /// The reduction runs on a dense copy, so this takes `rows × cols`
    /// memory regardless of sparsity.
    pub fn kernel(&self) -> Result<Vec<DenseVector>> {
        kernel::null_space(&self.to_dense())
    }

    /// Numerical rank, using the same pivot threshold as [`Self::kernel`].
    /// Densifies like `kernel`.
    pub fn rank(&self) -> usize {
        kernel::row_reduce(&self.to_dense()).pivots.len()
    }

    /// `LLᵗ` factorisation of this symmetric positive-definite matrix.
    pub fn cholesky(&self, ordering: FillReducing) -> Result<CholeskyFactor> {
        CholeskyFactor::new(self, ordering)
    }

    /// Solve `A·x = b` for symmetric positive-definite `A`.
    pub fn solve_cholesky(&self, b: &DenseVector) -> Result<DenseVector> {
        self.cholesky(FillReducing::Natural)?.solve(b)
    }

    // ── Interchange with `sprs` ──────────────────────────────

    /// Copy into a `sprs` CSC matrix (rows sorted within each column).
    pub fn to_sprs(&self) -> CsMat<f64> {
        let sorted = self.store.sorted();
        CsMat::new_csc((self.rows, self.cols), sorted.ptr, sorted.idx, sorted.val)
    }

    pub fn from_sprs(mat: &CsMat<f64>) -> Result<Self> {
        let csc = mat.to_csc();
        let indptr = csc.indptr();
        Self::new(
            csc.rows(),
            csc.cols(),
            indptr.raw_storage().to_vec(),
            csc.indices().to_vec(),
            csc.data().to_vec(),
        )
    }
}
