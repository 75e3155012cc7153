use thiserror::Error;

// ─────────────────────────────────────────────────────────────
//  Error type
// ─────────────────────────────────────────────────────────────

/// Failure kinds shared by the sparse engine and the solver.
///
/// Shape and index problems are reported as values, never as panics, so a
/// failed iteration leaves the shared unknowns as they were.  `ffi.rs`
/// turns any variant into a failure status and keeps its message for
/// `gpa_last_error`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GpaError {
    /// A vector or local block has the wrong length.
    #[error("{context}: dimension mismatch, expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Two matrix operands have incompatible shapes.
    #[error("{context}: shape mismatch, {left:?} vs {right:?}")]
    ShapeMismatch {
        context: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// An index addresses past the end of a container.
    #[error("{context}: index {index} out of range (bound {bound})")]
    IndexOutOfRange {
        context: &'static str,
        index: usize,
        bound: usize,
    },

    /// The same component index was given twice to a sub-variable view.
    #[error("duplicate component index {index}")]
    DuplicateIndex { index: usize },

    /// Raw pointer / index / value arrays do not describe a valid matrix.
    #[error("malformed compressed arrays: {0}")]
    MalformedCompressed(String),

    /// Division of a matrix or vector by exactly zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Cholesky met a pivot that is non-positive within tolerance.
    #[error("matrix is not positive definite (pivot {pivot}, value {value:e})")]
    NotPositiveDefinite { pivot: usize, value: f64 },

    /// No specialisation exists for this pairing of storage kinds.
    #[error("{operation} is not implemented for {lhs} and {rhs}")]
    NotImplemented {
        operation: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    /// `run_iteration` called before `initialise_x`.
    #[error("solver not initialised (call initialise_x first)")]
    NotInitialised,

    /// `initialise_x` called twice.
    #[error("solver already initialised")]
    AlreadyInitialised,

    /// A new variable was introduced after the layout was frozen.
    #[error("variable layout is frozen; register variables before initialise_x")]
    LayoutFrozen,

    /// Rejected solver configuration.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// A local model failed to refresh itself.
    #[error("local model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, GpaError>;

// ─────────────────────────────────────────────────────────────
//  Constants
// ─────────────────────────────────────────────────────────────

/// Relative threshold below which a pivot is treated as zero.
///
/// Shared by the kernel row reduction (relative to the largest entry of
/// the matrix) and the Cholesky factorisation (relative to the diagonal
/// entry being eliminated).
pub const NEGLIGIBLE_PIVOT: f64 = 1e-10;

pub const DEFAULT_EPSILON: f64 = 0.1;

// ─────────────────────────────────────────────────────────────
//  Solver options
// ─────────────────────────────────────────────────────────────

/// Fill-reducing permutation applied before a Cholesky factorisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillReducing {
    /// Factor the matrix in its given order.
    Natural,
    /// Reverse Cuthill-McKee bandwidth reduction (via `sprs`).
    #[default]
    ReverseCuthillMcKee,
}

#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Damping ε; the normal equations carry an `ε²I` term.
    pub epsilon: f64,
    /// Ordering used when factoring the normal equations.
    pub ordering: FillReducing,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            ordering: FillReducing::default(),
        }
    }
}

impl SolverOptions {
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(GpaError::InvalidOption(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Iteration report  (returned from run_iteration)
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// Zero-based index of the iteration that just completed.
    pub iteration: usize,
    /// Constraint rows assembled (constraints with nonzero weight).
    pub constraint_rows: usize,
    /// Energy rows assembled (energies with nonzero weight).
    pub energy_rows: usize,
    /// ‖H·x_prev − r‖ of the linearised constraint block at the start point.
    pub constraint_residual: f64,
    /// ‖x_new − x_prev‖.
    pub step_norm: f64,
}
