//! Storage-polymorphic matrix handle.

use super::{CscMatrix, CsrMatrix};
use crate::types::{GpaError, Result};
use crate::vector::{DenseVector, Vector};

/// A compressed matrix of either orientation.
///
/// Operations between two matrices of the same storage dispatch to the
/// concrete type.  Mixed CSC/CSR arithmetic is reported as
/// [`GpaError::NotImplemented`] rather than converting silently.
#[derive(Debug, Clone, PartialEq)]
pub enum Matrix {
    Csc(CscMatrix),
    Csr(CsrMatrix),
}

impl Matrix {
    pub fn kind(&self) -> &'static str {
        match self {
            Matrix::Csc(_) => "csc",
            Matrix::Csr(_) => "csr",
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            Matrix::Csc(m) => m.rows(),
            Matrix::Csr(m) => m.rows(),
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Matrix::Csc(m) => m.cols(),
            Matrix::Csr(m) => m.cols(),
        }
    }

    pub fn nnz(&self) -> usize {
        match self {
            Matrix::Csc(m) => m.nnz(),
            Matrix::Csr(m) => m.nnz(),
        }
    }

    pub fn at(&self, row: usize, col: usize) -> Result<f64> {
        match self {
            Matrix::Csc(m) => m.at(row, col),
            Matrix::Csr(m) => m.at(row, col),
        }
    }

    fn mixed(&self, other: &Matrix, operation: &'static str) -> GpaError {
        GpaError::NotImplemented {
            operation,
            lhs: self.kind(),
            rhs: other.kind(),
        }
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        match (self, other) {
            (Matrix::Csc(a), Matrix::Csc(b)) => a.add(b).map(Matrix::Csc),
            (Matrix::Csr(a), Matrix::Csr(b)) => a.add(b).map(Matrix::Csr),
            _ => Err(self.mixed(other, "add")),
        }
    }

    pub fn subtract(&self, other: &Matrix) -> Result<Matrix> {
        match (self, other) {
            (Matrix::Csc(a), Matrix::Csc(b)) => a.subtract(b).map(Matrix::Csc),
            (Matrix::Csr(a), Matrix::Csr(b)) => a.subtract(b).map(Matrix::Csr),
            _ => Err(self.mixed(other, "subtract")),
        }
    }

    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        match (self, other) {
            (Matrix::Csc(a), Matrix::Csc(b)) => a.multiply(b).map(Matrix::Csc),
            (Matrix::Csr(a), Matrix::Csr(b)) => a.multiply(b).map(Matrix::Csr),
            _ => Err(self.mixed(other, "multiply")),
        }
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        match self {
            Matrix::Csc(m) => Matrix::Csc(m.scale(factor)),
            Matrix::Csr(m) => Matrix::Csr(m.scale(factor)),
        }
    }

    pub fn multiply_vector(&self, x: &Vector) -> Result<DenseVector> {
        match self {
            Matrix::Csc(m) => m.multiply_vector(x),
            Matrix::Csr(m) => m.multiply_vector(x),
        }
    }

    /// Transposition flips the storage orientation without copying indices.
    pub fn transpose(&self) -> Matrix {
        match self {
            Matrix::Csc(m) => Matrix::Csr(m.transpose()),
            Matrix::Csr(m) => Matrix::Csc(m.transpose()),
        }
    }
}

impl From<CscMatrix> for Matrix {
    fn from(m: CscMatrix) -> Self {
        Matrix::Csc(m)
    }
}

impl From<CsrMatrix> for Matrix {
    fn from(m: CsrMatrix) -> Self {
        Matrix::Csr(m)
    }
}
