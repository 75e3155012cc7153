//! Global system assembly.
//!
//! Every constraint and energy contributes one independent row, so the two
//! families are evaluated as parallel maps and joined.  Rayon's `collect`
//! keeps registration order, which makes the parallel and sequential paths
//! produce identical matrices entry for entry.

use crate::model::{Constraint, Energy, Row};
use crate::sparse::{CscMatrix, TripletMatrix};
use crate::types::Result;
use crate::vector::DenseVector;
use rayon::prelude::*;

/// Run `a` and `b` through `rayon::join` when `parallel`, else in order.
pub(crate) fn join_if<A, B, RA, RB>(parallel: bool, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    if parallel {
        rayon::join(a, b)
    } else {
        (a(), b())
    }
}

// ─────────────────────────────────────────────────────────────
//  Rows
// ─────────────────────────────────────────────────────────────

/// Re-linearise point-dependent constraint models at `x`.
pub(crate) fn refresh_constraints(constraints: &mut [Constraint], x: &[f64], parallel: bool) -> Result<()> {
    if parallel {
        constraints.par_iter_mut().try_for_each(|c| c.refresh(x))
    } else {
        constraints.iter_mut().try_for_each(|c| c.refresh(x))
    }
}

/// Rows of `H` and `r`; zero-weight constraints contribute nothing.
pub(crate) fn constraint_rows(constraints: &[Constraint], x: &[f64], parallel: bool) -> Result<Vec<Row>> {
    if parallel {
        constraints
            .par_iter()
            .filter(|c| c.weight() != 0.0)
            .map(|c| c.row(x))
            .collect()
    } else {
        constraints
            .iter()
            .filter(|c| c.weight() != 0.0)
            .map(|c| c.row(x))
            .collect()
    }
}

/// Rows of `K` and `s`; zero-weight energies contribute nothing.
pub(crate) fn energy_rows(energies: &[Energy], parallel: bool) -> Vec<Row> {
    if parallel {
        energies
            .par_iter()
            .filter(|e| e.weight() != 0.0)
            .map(Energy::row)
            .collect()
    } else {
        energies
            .iter()
            .filter(|e| e.weight() != 0.0)
            .map(Energy::row)
            .collect()
    }
}

/// `‖A·x − b‖` over a family of rows.
pub(crate) fn residual_norm(rows: &[Row], x: &[f64]) -> f64 {
    rows.iter()
        .map(|row| {
            let r = row.residual(x);
            r * r
        })
        .sum::<f64>()
        .sqrt()
}

// ─────────────────────────────────────────────────────────────
//  Normal equations
// ─────────────────────────────────────────────────────────────

/// A row block `A` (rows × unknowns) and its right-hand side `b`.
pub(crate) struct Block {
    pub matrix: CscMatrix,
    pub rhs: DenseVector,
}

impl Block {
    /// `None` for an empty family, so the block drops out of the system.
    pub fn from_rows(rows: &[Row], unknowns: usize) -> Result<Option<Self>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let mut t = TripletMatrix::new(rows.len(), unknowns);
        for (i, row) in rows.iter().enumerate() {
            for &(j, v) in &row.entries {
                t.add(i, j, v)?;
            }
        }
        Ok(Some(Self {
            matrix: t.to_csc(),
            rhs: DenseVector::from_vec(rows.iter().map(|r| r.rhs).collect()),
        }))
    }

    /// `(AᵗA, Aᵗb)`, the two products computed independently.
    fn normal(&self, parallel: bool) -> Result<(CscMatrix, DenseVector)> {
        let (ata, atb) = join_if(
            parallel,
            || self.matrix.transpose_multiply_self(),
            || self.matrix.transpose_multiply_dense(&self.rhs),
        );
        Ok((ata, atb?))
    }
}

pub(crate) struct NormalEquations {
    pub lhs: CscMatrix,
    pub rhs: DenseVector,
}

/// ```text
/// LHS = HᵗH + KᵗK + ε²·I
/// RHS = Hᵗr + Kᵗs + ε²·x_prev
/// ```
///
/// Missing blocks are omitted, as is the damping term when `ε = 0`.
pub(crate) fn normal_equations(
    constraints: Option<&Block>,
    energies: Option<&Block>,
    x_prev: &[f64],
    epsilon: f64,
    parallel: bool,
) -> Result<NormalEquations> {
    let n = x_prev.len();
    let (h, k) = join_if(
        parallel,
        || constraints.map(|b| b.normal(parallel)).transpose(),
        || energies.map(|b| b.normal(parallel)).transpose(),
    );

    let mut lhs = CscMatrix::zero(n, n);
    let mut rhs = DenseVector::zeros(n);
    for (ata, atb) in [h?, k?].into_iter().flatten() {
        lhs = lhs.add(&ata)?;
        rhs = rhs.add(&atb)?;
    }
    if epsilon != 0.0 {
        let damping = epsilon * epsilon;
        lhs = lhs.add(&CscMatrix::diagonal(&vec![damping; n]))?;
        rhs.axpy(damping, &DenseVector::from_slice(x_prev))?;
    }
    Ok(NormalEquations { lhs, rhs })
}
