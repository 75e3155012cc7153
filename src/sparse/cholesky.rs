//! Sparse `LLᵗ` factorisation for symmetric positive-definite matrices.
//!
//! Up-looking algorithm: row `k` of `L` is found from the elimination tree
//! (its nonzero pattern is the set of tree paths from the entries of
//! column `k` of the upper triangle up to `k`), then computed by a sparse
//! triangular solve against the rows already factored.
//!
//! An optional fill-reducing permutation `P` is applied first, so the
//! factor satisfies `P·A·Pᵗ = L·Lᵗ`.

use super::compressed::Compressed;
use super::CscMatrix;
use crate::types::{FillReducing, GpaError, Result, NEGLIGIBLE_PIVOT};
use crate::vector::DenseVector;
use sprs::CsMat;
use tracing::trace;

/// Numeric Cholesky factor, reusable for any number of right-hand sides.
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    n: usize,
    /// `perm[new] = old`
    perm: Vec<usize>,
    /// Lower factor; the diagonal entry is stored first in every column.
    l: CscMatrix,
}

impl CholeskyFactor {
    /// Factor `a`, reading only its upper triangle.
    ///
    /// Fails with [`GpaError::NotPositiveDefinite`] when a pivot is not
    /// strictly positive beyond `NEGLIGIBLE_PIVOT` times the diagonal entry
    /// it was computed from.  The pivot is never clamped.
    pub fn new(a: &CscMatrix, ordering: FillReducing) -> Result<Self> {
        if a.rows() != a.cols() {
            return Err(GpaError::ShapeMismatch {
                context: "CholeskyFactor::new (matrix must be square)",
                left: a.shape(),
                right: (a.cols(), a.rows()),
            });
        }
        let n = a.cols();
        let perm = match ordering {
            FillReducing::Natural => (0..n).collect(),
            FillReducing::ReverseCuthillMcKee => reverse_cuthill_mckee(a),
        };
        let mut pinv = vec![0usize; n];
        for (new, &old) in perm.iter().enumerate() {
            pinv[old] = new;
        }

        // upper triangle of P·A·Pᵗ, one list per column
        let mut upper: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (row, col, value) in a.iter() {
            let (i, j) = (pinv[row], pinv[col]);
            if i <= j {
                upper[j].push((i, value));
            }
        }

        let parent = elimination_tree(&upper);
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut x = vec![0.0; n];
        let mut mark = vec![usize::MAX; n];
        let mut path = Vec::new();
        let mut pattern = Vec::new();

        for k in 0..n {
            row_pattern(&upper[k], k, &parent, &mut mark, &mut path, &mut pattern);

            let mut diagonal = 0.0;
            for &(i, v) in &upper[k] {
                if i == k {
                    diagonal += v;
                } else {
                    x[i] += v;
                }
            }

            let mut d = diagonal;
            for &i in &pattern {
                let lki = x[i] / columns[i][0].1;
                x[i] = 0.0;
                for &(r, v) in &columns[i][1..] {
                    x[r] -= v * lki;
                }
                d -= lki * lki;
                columns[i].push((k, lki));
            }

            if !d.is_finite() || d <= NEGLIGIBLE_PIVOT * diagonal.abs() {
                return Err(GpaError::NotPositiveDefinite {
                    pivot: perm[k],
                    value: d,
                });
            }
            columns[k].insert(0, (k, d.sqrt()));
        }

        let l = CscMatrix::from_compressed(n, n, Compressed::from_lanes(n, n, columns));
        trace!(n, factor_nnz = l.nnz(), input_nnz = a.nnz(), "cholesky factorised");
        Ok(Self { n, perm, l })
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Stored entries of `L`, diagonal included.
    pub fn factor_nnz(&self) -> usize {
        self.l.nnz()
    }

    /// The lower-triangular factor of the permuted matrix.
    pub fn factor(&self) -> &CscMatrix {
        &self.l
    }

    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }

    /// Solve `A·x = b` by forward then backward substitution.
    pub fn solve(&self, b: &DenseVector) -> Result<DenseVector> {
        if b.size() != self.n {
            return Err(GpaError::DimensionMismatch {
                context: "CholeskyFactor::solve",
                expected: self.n,
                actual: b.size(),
            });
        }
        let store = self.l.store();
        let mut y: Vec<f64> = self.perm.iter().map(|&old| b[old]).collect();

        // L·z = P·b
        for j in 0..self.n {
            let (idx, val) = store.lane(j);
            y[j] /= val[0];
            let yj = y[j];
            for (&r, &v) in idx[1..].iter().zip(&val[1..]) {
                y[r] -= v * yj;
            }
        }
        // Lᵗ·w = z
        for j in (0..self.n).rev() {
            let (idx, val) = store.lane(j);
            let mut sum = y[j];
            for (&r, &v) in idx[1..].iter().zip(&val[1..]) {
                sum -= v * y[r];
            }
            y[j] = sum / val[0];
        }

        let mut x = vec![0.0; self.n];
        for (new, &old) in self.perm.iter().enumerate() {
            x[old] = y[new];
        }
        Ok(DenseVector::from_vec(x))
    }
}

/// `parent[i]` of the elimination tree, computed from the upper triangle.
fn elimination_tree(upper: &[Vec<(usize, f64)>]) -> Vec<Option<usize>> {
    let n = upper.len();
    let mut parent = vec![None; n];
    let mut ancestor: Vec<Option<usize>> = vec![None; n];
    for (k, column) in upper.iter().enumerate() {
        for &(row, _) in column {
            let mut node = Some(row);
            while let Some(i) = node {
                if i >= k {
                    break;
                }
                let next = ancestor[i];
                ancestor[i] = Some(k);
                if next.is_none() {
                    parent[i] = Some(k);
                }
                node = next;
            }
        }
    }
    parent
}

/// Nonzero pattern of row `k` of `L`, in an order where every node
/// precedes its elimination-tree ancestors.
fn row_pattern(
    column: &[(usize, f64)],
    k: usize,
    parent: &[Option<usize>],
    mark: &mut [usize],
    path: &mut Vec<usize>,
    pattern: &mut Vec<usize>,
) {
    pattern.clear();
    mark[k] = k;
    for &(row, _) in column {
        if row >= k {
            continue;
        }
        path.clear();
        let mut node = Some(row);
        while let Some(i) = node {
            if mark[i] == k {
                break;
            }
            mark[i] = k;
            path.push(i);
            node = parent[i];
        }
        // newer paths go in front of older ones
        pattern.extend(path.iter().rev());
    }
    pattern.reverse();
}

/// Reverse Cuthill-McKee order of the symmetrised pattern of `a`.
fn reverse_cuthill_mckee(a: &CscMatrix) -> Vec<usize> {
    let n = a.cols();
    if n == 0 {
        return Vec::new();
    }
    let pattern = a.store().map_values(|_| 1.0);
    let symmetric = pattern.merge(&pattern.transposed(), 1.0).sorted();
    let mat = CsMat::new_csc((n, n), symmetric.ptr, symmetric.idx, symmetric.val);
    let ordering = sprs::linalg::reverse_cuthill_mckee(mat.view());
    let perm = ordering.perm.vec();
    if perm.len() == n {
        perm
    } else {
        (0..n).collect()
    }
}
