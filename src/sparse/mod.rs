//! Sparse matrices: triplet assembly, compressed storage and factorisations.

mod cholesky;
pub(crate) mod compressed;
mod csc;
mod csr;
pub(crate) mod kernel;
mod matrix;
mod triplet;

pub use cholesky::CholeskyFactor;
pub use csc::CscMatrix;
pub use csr::CsrMatrix;
pub use matrix::Matrix;
pub use triplet::TripletMatrix;
