//! Stock local models.

use crate::model::{ConstraintModel, Energy, EnergyModel};
use crate::sparse::{CscMatrix, TripletMatrix};
use crate::types::{GpaError, Result};
use crate::variable::{Variable, VariableRef};
use crate::vector::DenseVector;

// ─────────────────────────────────────────────────────────────
//  Energies
// ─────────────────────────────────────────────────────────────

/// Arbitrary linear residual `Kᵗ·x = S`.
#[derive(Debug, Clone)]
pub struct LinearEnergy {
    coefficients: DenseVector,
    target: f64,
}

impl LinearEnergy {
    pub fn new(coefficients: Vec<f64>, target: f64) -> Self {
        Self {
            coefficients: DenseVector::from_vec(coefficients),
            target,
        }
    }
}

impl EnergyModel for LinearEnergy {
    fn dimension(&self) -> usize {
        self.coefficients.size()
    }

    fn coefficients(&self) -> &DenseVector {
        &self.coefficients
    }

    fn target(&self) -> f64 {
        self.target
    }
}

/// One `x[i] = targets[i]` energy per component of `variable`, each bound
/// to a single-component view of it.
pub fn anchor_energies(variable: &Variable, targets: &[f64], weight: f64) -> Result<Vec<Energy>> {
    if targets.len() != variable.dimension() {
        return Err(GpaError::DimensionMismatch {
            context: "anchor_energies",
            expected: variable.dimension(),
            actual: targets.len(),
        });
    }
    targets
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let component = variable.subvariable(vec![i])?;
            Energy::new(LinearEnergy::new(vec![1.0], t), vec![component.into()], weight)
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────
//  Constraints
// ─────────────────────────────────────────────────────────────

/// `H = 2·[[I, −I], [−I, I]]` for two points of `dimension` components.
fn difference_gram(dimension: usize) -> Result<CscMatrix> {
    let mut t = TripletMatrix::new(2 * dimension, 2 * dimension);
    for k in 0..dimension {
        t.add(k, k, 2.0)?;
        t.add(dimension + k, dimension + k, 2.0)?;
        t.add(k, dimension + k, -2.0)?;
        t.add(dimension + k, k, -2.0)?;
    }
    Ok(t.to_csc())
}

/// `|a − b|² = L²`, quadratic by construction.
///
/// Local unknowns are `[a, b]`; `½·xᵗ·H·x = |a − b|²` and `C = −L²`.
#[derive(Debug, Clone)]
pub struct SquaredLength {
    hessian: CscMatrix,
    constant: f64,
}

impl SquaredLength {
    pub fn new(dimension: usize, length: f64) -> Result<Self> {
        Ok(Self {
            hessian: difference_gram(dimension)?,
            constant: -length * length,
        })
    }

    /// Convenience binding of two whole points.
    pub fn between(a: &Variable, b: &Variable, length: f64) -> Result<(Self, Vec<VariableRef>)> {
        if a.dimension() != b.dimension() {
            return Err(GpaError::DimensionMismatch {
                context: "SquaredLength::between",
                expected: a.dimension(),
                actual: b.dimension(),
            });
        }
        Ok((Self::new(a.dimension(), length)?, vec![a.into(), b.into()]))
    }
}

impl ConstraintModel for SquaredLength {
    fn dimension(&self) -> usize {
        self.hessian.cols()
    }

    fn hessian(&self) -> &CscMatrix {
        &self.hessian
    }

    fn constant(&self) -> f64 {
        self.constant
    }
}

/// `|a − b| = L`, linearised at the current point.
///
/// With `g = ((a − b)/|a − b|, −(a − b)/|a − b|)` the length is `gᵗ·x`
/// exactly at the linearisation point `x₀`, so the model has `H = 0` and
/// `B = g`.  The row's right-hand side picks up `½·gᵗ·x₀ = ½·|a − b|`,
/// hence `C = ½·|a − b| − L` to leave the row as `gᵗ·x = L`.
#[derive(Debug, Clone)]
pub struct Length {
    dimension: usize,
    length: f64,
    hessian: CscMatrix,
    gradient: DenseVector,
    constant: f64,
}

impl Length {
    pub fn new(dimension: usize, length: f64) -> Self {
        Self {
            dimension,
            length,
            hessian: CscMatrix::zero(2 * dimension, 2 * dimension),
            gradient: DenseVector::zeros(2 * dimension),
            constant: -length,
        }
    }

    pub fn between(a: &Variable, b: &Variable, length: f64) -> Result<(Self, Vec<VariableRef>)> {
        if a.dimension() != b.dimension() {
            return Err(GpaError::DimensionMismatch {
                context: "Length::between",
                expected: a.dimension(),
                actual: b.dimension(),
            });
        }
        Ok((Self::new(a.dimension(), length), vec![a.into(), b.into()]))
    }
}

impl ConstraintModel for Length {
    fn dimension(&self) -> usize {
        2 * self.dimension
    }

    fn hessian(&self) -> &CscMatrix {
        &self.hessian
    }

    fn linear(&self) -> Option<&DenseVector> {
        Some(&self.gradient)
    }

    fn constant(&self) -> f64 {
        self.constant
    }

    fn is_linearised(&self) -> bool {
        true
    }

    fn refresh(&mut self, x_local: &DenseVector) -> Result<()> {
        let d = self.dimension;
        let diff: Vec<f64> = (0..d).map(|k| x_local[k] - x_local[d + k]).collect();
        let norm = diff.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(GpaError::Model(
                "length constraint cannot be linearised at coincident points".into(),
            ));
        }
        let gradient = diff
            .iter()
            .map(|v| v / norm)
            .chain(diff.iter().map(|v| -v / norm))
            .collect();
        self.gradient = DenseVector::from_vec(gradient);
        self.constant = 0.5 * norm - self.length;
        Ok(())
    }
}
