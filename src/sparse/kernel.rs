//! Null-space extraction by dense row reduction.

use crate::types::{Result, NEGLIGIBLE_PIVOT};
use crate::vector::{gram_schmidt, DenseVector};
use ndarray::Array2;

/// Reduced row echelon form plus the pivot column of each leading row.
pub(crate) struct RowEchelon {
    pub reduced: Array2<f64>,
    pub pivots: Vec<usize>,
}

/// Gauss-Jordan elimination with partial pivoting.
///
/// A candidate pivot whose magnitude is at most `NEGLIGIBLE_PIVOT` times the
/// largest entry of the input is treated as zero and its column is free.
pub(crate) fn row_reduce(a: &Array2<f64>) -> RowEchelon {
    let (m, n) = a.dim();
    let mut r = a.clone();
    let scale = r.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tol = NEGLIGIBLE_PIVOT * scale;
    let mut pivots = Vec::new();
    if scale == 0.0 {
        return RowEchelon { reduced: r, pivots };
    }

    let mut lead = 0;
    for col in 0..n {
        if lead == m {
            break;
        }
        let mut best = lead;
        for i in (lead + 1)..m {
            if r[[i, col]].abs() > r[[best, col]].abs() {
                best = i;
            }
        }
        if r[[best, col]].abs() <= tol {
            for i in lead..m {
                r[[i, col]] = 0.0;
            }
            continue;
        }
        if best != lead {
            for j in 0..n {
                r.swap([best, j], [lead, j]);
            }
        }
        let pivot = r[[lead, col]];
        for j in col..n {
            r[[lead, j]] /= pivot;
        }
        for i in 0..m {
            if i == lead {
                continue;
            }
            let factor = r[[i, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                r[[i, j]] -= factor * r[[lead, j]];
            }
        }
        pivots.push(col);
        lead += 1;
    }
    RowEchelon { reduced: r, pivots }
}

/// Orthonormal basis of `{x : a·x = 0}`.
pub(crate) fn null_space(a: &Array2<f64>) -> Result<Vec<DenseVector>> {
    let n = a.ncols();
    let echelon = row_reduce(a);
    let mut is_pivot = vec![false; n];
    for &p in &echelon.pivots {
        is_pivot[p] = true;
    }

    let candidates = (0..n).filter(|&f| !is_pivot[f]).map(|free| {
        let mut v = vec![0.0; n];
        v[free] = 1.0;
        for (row, &p) in echelon.pivots.iter().enumerate() {
            v[p] = -echelon.reduced[[row, free]];
        }
        DenseVector::from_vec(v)
    });
    gram_schmidt(candidates)
}
