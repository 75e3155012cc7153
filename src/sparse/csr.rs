//! Compressed sparse row matrix, the row-major twin of [`CscMatrix`].

use super::compressed::Compressed;
use super::{CscMatrix, TripletMatrix};
use crate::types::{GpaError, Result};
use crate::vector::{DenseVector, SparseVector, Vector};
use ndarray::Array2;

/// Immutable compressed-row matrix.
///
/// Row `i` owns `row_ptr[i]..row_ptr[i + 1]` of the parallel
/// `col_indices` / `values` arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    store: Compressed,
}

impl CsrMatrix {
    pub fn new(
        rows: usize,
        cols: usize,
        row_ptr: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let store = Compressed::from_raw(rows, cols, row_ptr, col_indices, values)?;
        Ok(Self { rows, cols, store })
    }

    pub(crate) fn from_compressed(rows: usize, cols: usize, store: Compressed) -> Self {
        debug_assert_eq!(store.outer, rows);
        debug_assert_eq!(store.inner, cols);
        Self { rows, cols, store }
    }

    pub fn zero(rows: usize, cols: usize) -> Self {
        Self::from_compressed(rows, cols, Compressed::empty(rows, cols))
    }

    pub fn identity(n: usize) -> Self {
        Self::from_compressed(n, n, Compressed::diagonal(&vec![1.0; n]))
    }

    pub fn from_triplets(triplets: &TripletMatrix) -> Self {
        triplets.to_csr()
    }

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

    pub fn row_ptr(&self) -> &[usize] {
        &self.store.ptr
    }

    pub fn col_indices(&self) -> &[usize] {
        &self.store.idx
    }

    pub fn values(&self) -> &[f64] {
        &self.store.val
    }

    pub fn row(&self, row: usize) -> Result<(&[usize], &[f64])> {
        if row >= self.rows {
            return Err(GpaError::IndexOutOfRange {
                context: "CsrMatrix::row",
                index: row,
                bound: self.rows,
            });
        }
        Ok(self.store.lane(row))
    }

    /// `(row, col, value)` for every stored entry, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.store.entries()
    }

    pub fn at(&self, row: usize, col: usize) -> Result<f64> {
        if row >= self.rows {
            return Err(GpaError::IndexOutOfRange {
                context: "CsrMatrix::at (row)",
                index: row,
                bound: self.rows,
            });
        }
        if col >= self.cols {
            return Err(GpaError::IndexOutOfRange {
                context: "CsrMatrix::at (col)",
                index: col,
                bound: self.cols,
            });
        }
        Ok(self.store.get(row, col))
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.rows, self.cols));
        for (r, c, v) in self.iter() {
            out[[r, c]] = v;
        }
        out
    }

    fn check_same_shape(&self, other: &CsrMatrix, context: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(GpaError::ShapeMismatch {
                context,
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &CsrMatrix) -> Result<CsrMatrix> {
        self.check_same_shape(other, "CsrMatrix::add")?;
        Ok(Self::from_compressed(self.rows, self.cols, self.store.merge(&other.store, 1.0)))
    }

    pub fn subtract(&self, other: &CsrMatrix) -> Result<CsrMatrix> {
        self.check_same_shape(other, "CsrMatrix::subtract")?;
        Ok(Self::from_compressed(self.rows, self.cols, self.store.merge(&other.store, -1.0)))
    }

    pub fn multiply(&self, other: &CsrMatrix) -> Result<CsrMatrix> {
        if self.cols != other.rows {
            return Err(GpaError::ShapeMismatch {
                context: "CsrMatrix::multiply",
                left: self.shape(),
                right: other.shape(),
            });
        }
        // row i of the product = Σ A[i, k] · B[k, :]
        let store = Compressed::product(&self.store, &other.store);
        Ok(Self::from_compressed(self.rows, other.cols, store))
    }

    pub fn scale(&self, factor: f64) -> CsrMatrix {
        if factor == 0.0 {
            return Self::zero(self.rows, self.cols);
        }
        Self::from_compressed(self.rows, self.cols, self.store.map_values(|v| v * factor))
    }

    pub fn divide(&self, divisor: f64) -> Result<CsrMatrix> {
        if divisor == 0.0 {
            return Err(GpaError::DivisionByZero);
        }
        Ok(Self::from_compressed(self.rows, self.cols, self.store.map_values(|v| v / divisor)))
    }

    pub fn transpose_multiply_self(&self) -> CsrMatrix {
        self.to_csc().transpose_multiply_self().to_csr()
    }

    /// `Aᵗ` as a column-major matrix sharing this matrix's arrays.
    pub fn transpose(&self) -> CscMatrix {
        CscMatrix::from_compressed(self.cols, self.rows, self.store.clone())
    }

    pub fn to_csc(&self) -> CscMatrix {
        CscMatrix::from_compressed(self.rows, self.cols, self.store.transposed())
    }

    pub fn multiply_vector(&self, x: &Vector) -> Result<DenseVector> {
        match x {
            Vector::Dense(d) => self.multiply_dense(d),
            Vector::Sparse(s) => self.multiply_sparse(s),
        }
    }

    pub fn multiply_dense(&self, x: &DenseVector) -> Result<DenseVector> {
        if x.size() != self.cols {
            return Err(GpaError::DimensionMismatch {
                context: "CsrMatrix::multiply_dense",
                expected: self.cols,
                actual: x.size(),
            });
        }
        let y = (0..self.rows)
            .map(|i| {
                let (idx, val) = self.store.lane(i);
                idx.iter().zip(val).map(|(&j, &v)| v * x[j]).sum::<f64>()
            })
            .collect();
        Ok(DenseVector::from_vec(y))
    }

    /// Each stored entry costs one hash lookup; absent columns are never visited.
    pub fn multiply_sparse(&self, x: &SparseVector) -> Result<DenseVector> {
        if x.size() != self.cols {
            return Err(GpaError::DimensionMismatch {
                context: "CsrMatrix::multiply_sparse",
                expected: self.cols,
                actual: x.size(),
            });
        }
        if x.nnz() == 0 {
            return Ok(DenseVector::zeros(self.rows));
        }
        let y = (0..self.rows)
            .map(|i| {
                let (idx, val) = self.store.lane(i);
                idx.iter().zip(val).map(|(&j, &v)| v * x.value(j)).sum::<f64>()
            })
            .collect();
        Ok(DenseVector::from_vec(y))
    }

    pub fn transpose_multiply_vector(&self, x: &Vector) -> Result<DenseVector> {
        match x {
            Vector::Dense(d) => self.transpose_multiply_dense(d),
            Vector::Sparse(s) => self.transpose_multiply_sparse(s),
        }
    }

    pub fn transpose_multiply_dense(&self, x: &DenseVector) -> Result<DenseVector> {
        if x.size() != self.rows {
            return Err(GpaError::DimensionMismatch {
                context: "CsrMatrix::transpose_multiply_dense",
                expected: self.rows,
                actual: x.size(),
            });
        }
        let mut y = vec![0.0; self.cols];
        for i in 0..self.rows {
            let xi = x[i];
            if xi == 0.0 {
                continue;
            }
            let (idx, val) = self.store.lane(i);
            for (&j, &v) in idx.iter().zip(val) {
                y[j] += v * xi;
            }
        }
        Ok(DenseVector::from_vec(y))
    }

    pub fn transpose_multiply_sparse(&self, x: &SparseVector) -> Result<DenseVector> {
        if x.size() != self.rows {
            return Err(GpaError::DimensionMismatch {
                context: "CsrMatrix::transpose_multiply_sparse",
                expected: self.rows,
                actual: x.size(),
            });
        }
        let mut y = vec![0.0; self.cols];
        for (i, xi) in x.sorted_entries() {
            let (idx, val) = self.store.lane(i);
            for (&j, &v) in idx.iter().zip(val) {
                y[j] += v * xi;
            }
        }
        Ok(DenseVector::from_vec(y))
    }

    /// See [`CscMatrix::kernel`]; dense `rows × cols` workspace.
    pub fn kernel(&self) -> Result<Vec<DenseVector>> {
        self.to_csc().kernel()
    }

    /// Densifies, as [`CscMatrix::rank`] does.
    pub fn rank(&self) -> usize {
        self.to_csc().rank()
    }

    pub fn solve_cholesky(&self, b: &DenseVector) -> Result<DenseVector> {
        self.to_csc().solve_cholesky(b)
    }
}
