//! Local models and their bindings to variables.
//!
//! A constraint model describes a scalar quadratic
//!
//! ```text
//! φ(x) = ½·xᵗ·H·x + Bᵗ·x + C = 0
//! ```
//!
//! over its local unknowns `x`.  Linearised at the current point `x₀`, with
//! `h = H·x₀ + B`, this gives one row of the global system:
//!
//! ```text
//! hᵗ · x  =  ½·x₀ᵗ·h − C
//! ```
//!
//! For a purely quadratic model (`B = 0`) the row evaluated at `x₀` leaves
//! exactly `φ(x₀)`.  Models with a linear part account for the `½·x₀ᵗ·B`
//! on the right-hand side in their `C`.
//!
//! An energy model is already linear: one row `Kᵗ·x = S`.
//!
//! Models only ever see local vectors.  The binding to global positions is
//! the concatenated order of the bound variables.

use crate::sparse::CscMatrix;
use crate::types::{GpaError, Result};
use crate::variable::VariableRef;
use crate::vector::DenseVector;

// ─────────────────────────────────────────────────────────────
//  Model contracts
// ─────────────────────────────────────────────────────────────

/// Linear energy row `Kᵗ·x = S`.
pub trait EnergyModel: Send + Sync {
    fn dimension(&self) -> usize;

    /// `K`, of length `dimension()`.
    fn coefficients(&self) -> &DenseVector;

    /// `S`.
    fn target(&self) -> f64;
}

/// Quadratic constraint `½·xᵗ·H·x + Bᵗ·x + C = 0`.
///
/// Linearised models (those whose `H`, `B`, `C` depend on the current
/// point) return `true` from [`is_linearised`](Self::is_linearised) and
/// recompute their terms in [`refresh`](Self::refresh), which the solver
/// calls at the top of every iteration.
pub trait ConstraintModel: Send + Sync {
    fn dimension(&self) -> usize;

    /// `H`, square of side `dimension()`.
    fn hessian(&self) -> &CscMatrix;

    /// `B`; `None` means zero.
    fn linear(&self) -> Option<&DenseVector> {
        None
    }

    /// `C`.
    fn constant(&self) -> f64;

    fn is_linearised(&self) -> bool {
        false
    }

    fn refresh(&mut self, _x_local: &DenseVector) -> Result<()> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Assembled rows
// ─────────────────────────────────────────────────────────────

/// One row of the global system: sparse coefficients at global columns
/// plus its right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Row {
    pub entries: Vec<(usize, f64)>,
    pub rhs: f64,
}

impl Row {
    /// `row · x − rhs`.
    pub fn residual(&self, x: &[f64]) -> f64 {
        self.entries.iter().map(|&(j, v)| v * x[j]).sum::<f64>() - self.rhs
    }
}

fn bound_dimension(variables: &[VariableRef]) -> usize {
    variables.iter().map(VariableRef::dimension).sum()
}

fn resolve_indices(variables: &[VariableRef]) -> Result<Vec<usize>> {
    let mut indices = Vec::with_capacity(bound_dimension(variables));
    for v in variables {
        indices.extend(v.global_indices()?);
    }
    Ok(indices)
}

fn check_weight(weight: f64) -> Result<()> {
    if !weight.is_finite() {
        return Err(GpaError::InvalidOption(format!("weight must be finite, got {weight}")));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
//  Energy
// ─────────────────────────────────────────────────────────────

/// An energy model bound to an ordered list of variables and a weight.
pub struct Energy {
    model: Box<dyn EnergyModel>,
    variables: Vec<VariableRef>,
    weight: f64,
    pub(crate) indices: Vec<usize>,
}

impl Energy {
    pub fn new<M>(model: M, variables: Vec<VariableRef>, weight: f64) -> Result<Self>
    where
        M: EnergyModel + 'static,
    {
        let dimension = model.dimension();
        if bound_dimension(&variables) != dimension {
            return Err(GpaError::DimensionMismatch {
                context: "Energy::new (bound variables vs model)",
                expected: dimension,
                actual: bound_dimension(&variables),
            });
        }
        if model.coefficients().size() != dimension {
            return Err(GpaError::DimensionMismatch {
                context: "Energy::new (coefficients)",
                expected: dimension,
                actual: model.coefficients().size(),
            });
        }
        check_weight(weight)?;
        Ok(Self {
            model: Box::new(model),
            variables,
            weight,
            indices: Vec::new(),
        })
    }

    pub fn model(&self) -> &dyn EnergyModel {
        self.model.as_ref()
    }

    pub fn variables(&self) -> &[VariableRef] {
        &self.variables
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub(crate) fn set_weight(&mut self, weight: f64) -> Result<()> {
        check_weight(weight)?;
        self.weight = weight;
        Ok(())
    }

    pub(crate) fn resolve(&mut self) -> Result<()> {
        self.indices = resolve_indices(&self.variables)?;
        Ok(())
    }

    /// `weight·Kᵗ` scattered to global columns, with `weight·S`.
    pub(crate) fn row(&self) -> Row {
        let w = self.weight;
        let entries = self
            .indices
            .iter()
            .zip(self.model.coefficients().iter())
            .filter(|&(_, k)| k != 0.0)
            .map(|(&j, k)| (j, w * k))
            .collect();
        Row {
            entries,
            rhs: w * self.model.target(),
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Constraint
// ─────────────────────────────────────────────────────────────

/// A constraint model bound to an ordered list of variables and a weight.
pub struct Constraint {
    model: Box<dyn ConstraintModel>,
    variables: Vec<VariableRef>,
    weight: f64,
    pub(crate) indices: Vec<usize>,
}

impl Constraint {
    pub fn new<M>(model: M, variables: Vec<VariableRef>, weight: f64) -> Result<Self>
    where
        M: ConstraintModel + 'static,
    {
        let dimension = model.dimension();
        if bound_dimension(&variables) != dimension {
            return Err(GpaError::DimensionMismatch {
                context: "Constraint::new (bound variables vs model)",
                expected: dimension,
                actual: bound_dimension(&variables),
            });
        }
        check_weight(weight)?;
        let constraint = Self {
            model: Box::new(model),
            variables,
            weight,
            indices: Vec::new(),
        };
        constraint.check_terms()?;
        Ok(constraint)
    }

    pub fn model(&self) -> &dyn ConstraintModel {
        self.model.as_ref()
    }

    pub fn variables(&self) -> &[VariableRef] {
        &self.variables
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub(crate) fn set_weight(&mut self, weight: f64) -> Result<()> {
        check_weight(weight)?;
        self.weight = weight;
        Ok(())
    }

    pub(crate) fn resolve(&mut self) -> Result<()> {
        self.indices = resolve_indices(&self.variables)?;
        Ok(())
    }

    fn check_terms(&self) -> Result<()> {
        let n = self.model.dimension();
        let h = self.model.hessian();
        if h.shape() != (n, n) {
            return Err(GpaError::ShapeMismatch {
                context: "Constraint (hessian)",
                left: h.shape(),
                right: (n, n),
            });
        }
        if let Some(b) = self.model.linear() {
            if b.size() != n {
                return Err(GpaError::DimensionMismatch {
                    context: "Constraint (linear term)",
                    expected: n,
                    actual: b.size(),
                });
            }
        }
        Ok(())
    }

    fn gather(&self, x: &[f64]) -> DenseVector {
        DenseVector::from_vec(self.indices.iter().map(|&j| x[j]).collect())
    }

    /// Re-linearise a point-dependent model at the current `x`.
    pub(crate) fn refresh(&mut self, x: &[f64]) -> Result<()> {
        if !self.model.is_linearised() {
            return Ok(());
        }
        let local = self.gather(x);
        self.model.refresh(&local)?;
        self.check_terms()
    }

    /// Linearised row at `x`: `weight·h` with `h = H·x_local + B` and
    /// right-hand side `weight·(½·x_localᵗ·h − C)`.
    pub(crate) fn row(&self, x: &[f64]) -> Result<Row> {
        let w = self.weight;
        let local = self.gather(x);
        let hx = self.model.hessian().multiply_dense(&local)?;
        let gradient = match self.model.linear() {
            Some(b) => hx.add(b)?,
            None => hx,
        };
        let quadratic = 0.5 * local.dot(&gradient)?;
        let entries = self
            .indices
            .iter()
            .zip(gradient.iter())
            .filter(|&(_, g)| g != 0.0)
            .map(|(&j, g)| (j, w * g))
            .collect();
        Ok(Row {
            entries,
            rhs: w * (quadratic - self.model.constant()),
        })
    }
}
