//! **gpa**: Guided Projection solver on a native compressed-sparse engine.
//!
//! The crate has two layers:
//!
//! 1. **Sparse engine** (`sparse`, `vector`): triplet assembly, CSC / CSR
//!    matrices and their arithmetic, kernel extraction, sparse Cholesky.
//! 2. **GPA** (`variable`, `model`, `models`, `assembly`, `solver`): variables
//!    living in one shared array, local quadratic models bound to them, and
//!    the iterative assemble → solve → update loop.
//!
//! `ffi` exposes the solver through a C ABI.

pub mod types;
pub mod vector;
pub mod sparse;
pub mod variable;
pub mod model;
pub mod models;
mod assembly;
pub mod solver;
pub mod ffi;

pub use model::{Constraint, ConstraintModel, Energy, EnergyModel};
pub use solver::{ConstraintId, EnergyId, GpaSolver};
pub use sparse::{CholeskyFactor, CscMatrix, CsrMatrix, Matrix, TripletMatrix};
pub use types::{FillReducing, GpaError, IterationReport, Result, SolverOptions};
pub use variable::{SubVariable, Variable, VariableRef, VariableSet};
pub use vector::{gram_schmidt, DenseVector, SparseVector, Vector};
