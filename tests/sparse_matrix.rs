//! Compressed-matrix tests: construction, element access, arithmetic and
//! products, checked against dense `ndarray` references on seeded random
//! matrices.

use approx::assert_abs_diff_eq;
use gpa::{CscMatrix, CsrMatrix, DenseVector, GpaError, Matrix, SparseVector, TripletMatrix, Vector};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

fn random_triplets(rng: &mut ChaCha8Rng, rows: usize, cols: usize, density: f64) -> TripletMatrix {
    let mut t = TripletMatrix::new(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            if rng.gen_bool(density) {
                t.add(i, j, rng.gen_range(-1.0..1.0)).unwrap();
            }
        }
    }
    t
}

fn random_csc(rng: &mut ChaCha8Rng, rows: usize, cols: usize, density: f64) -> CscMatrix {
    random_triplets(rng, rows, cols, density).to_csc()
}

fn assert_dense_eq(a: &Array2<f64>, b: &Array2<f64>, tol: f64) {
    assert_eq!(a.dim(), b.dim());
    for ((i, j), &v) in a.indexed_iter() {
        assert_abs_diff_eq!(v, b[[i, j]], epsilon = tol);
    }
}

fn scenario_1() -> CscMatrix {
    CscMatrix::new(
        2,
        3,
        vec![0, 2, 4, 6],
        vec![0, 1, 0, 1, 0, 1],
        vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0],
    )
    .unwrap()
}

// ─────────────────────────────────────────────────────────────
//  Construction and access
// ─────────────────────────────────────────────────────────────

#[test]
fn raw_csc_element_access() {
    let a = scenario_1();
    assert_eq!(a.at(0, 1).unwrap(), 2.0);
    assert_eq!(a.at(1, 0).unwrap(), 5.0);
    assert_eq!(a.at(1, 2).unwrap(), 7.0);
    assert_eq!(a.nnz(), 6);
    assert_eq!(a.shape(), (2, 3));
}

#[test]
fn absent_entry_reads_zero() {
    let a = CscMatrix::new(3, 2, vec![0, 1, 2], vec![2, 0], vec![4.0, -1.0]).unwrap();
    assert_eq!(a.at(0, 0).unwrap(), 0.0);
    assert_eq!(a.at(2, 0).unwrap(), 4.0);
    assert_eq!(a.at(0, 1).unwrap(), -1.0);
}

#[test]
fn unsorted_rows_within_a_column_are_accepted() {
    let a = CscMatrix::new(3, 1, vec![0, 3], vec![2, 0, 1], vec![3.0, 1.0, 2.0]).unwrap();
    assert_eq!(a.at(0, 0).unwrap(), 1.0);
    assert_eq!(a.at(1, 0).unwrap(), 2.0);
    assert_eq!(a.at(2, 0).unwrap(), 3.0);
}

#[test]
fn out_of_range_access_is_an_error() {
    let a = scenario_1();
    assert!(matches!(a.at(2, 0), Err(GpaError::IndexOutOfRange { index: 2, bound: 2, .. })));
    assert!(matches!(a.at(0, 3), Err(GpaError::IndexOutOfRange { index: 3, bound: 3, .. })));
    assert!(a.column(3).is_err());
}

#[test]
fn malformed_raw_arrays_are_rejected() {
    let malformed = |r: Result<CscMatrix, GpaError>| matches!(r, Err(GpaError::MalformedCompressed(_)));

    // pointer too short
    assert!(malformed(CscMatrix::new(2, 3, vec![0, 2, 4], vec![0, 1, 0, 1], vec![1.0; 4])));
    // pointer does not start at zero
    assert!(malformed(CscMatrix::new(2, 1, vec![1, 2], vec![0, 1], vec![1.0; 2])));
    // pointer not monotonic
    assert!(malformed(CscMatrix::new(2, 2, vec![0, 2, 1], vec![0], vec![1.0])));
    // index / value length mismatch
    assert!(malformed(CscMatrix::new(2, 1, vec![0, 2], vec![0, 1], vec![1.0])));
    // row index out of range
    assert!(malformed(CscMatrix::new(2, 1, vec![0, 1], vec![2], vec![1.0])));
    // duplicate row in a column
    assert!(malformed(CscMatrix::new(2, 1, vec![0, 2], vec![1, 1], vec![1.0, 2.0])));
    // pointer end disagrees with nnz
    assert!(malformed(CscMatrix::new(2, 1, vec![0, 1], vec![0, 1], vec![1.0, 2.0])));

    assert!(matches!(
        CsrMatrix::new(1, 2, vec![0, 2], vec![0, 0], vec![1.0, 1.0]),
        Err(GpaError::MalformedCompressed(_))
    ));
}

#[test]
fn triplet_duplicates_are_summed() {
    let mut t = TripletMatrix::new(3, 3);
    t.add(0, 0, 1.0).unwrap();
    t.add(0, 0, 2.5).unwrap();
    t.add(2, 1, -4.0).unwrap();
    t.add(1, 2, 3.0).unwrap();
    t.add(1, 2, -3.0).unwrap();
    assert_eq!(t.get(0, 0), 3.5);

    let csc = CscMatrix::from_triplets(&t);
    let csr = CsrMatrix::from_triplets(&t);
    assert_eq!(csc.at(0, 0).unwrap(), 3.5);
    assert_eq!(csc.at(2, 1).unwrap(), -4.0);
    // exact cancellation is not stored
    assert_eq!(csc.nnz(), 2);
    assert_eq!(csr.nnz(), 2);
    assert_dense_eq(&csc.to_dense(), &csr.to_dense(), 0.0);
}

#[test]
fn triplet_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let t = random_triplets(&mut rng, 9, 7, 0.3);
    let csc = t.to_csc();
    let csr = t.to_csr();
    for (r, c, v) in t.iter() {
        assert_eq!(csc.at(r, c).unwrap(), v);
        assert_eq!(csr.at(r, c).unwrap(), v);
    }
    assert_eq!(csc.nnz(), t.len());
}

#[test]
fn triplet_long_column_accumulates_in_linear_time() {
    // one column touched by every row, each position hit twice
    let n = 100_000;
    let mut t = TripletMatrix::new(n, 2);
    let start = Instant::now();
    for pass in 0..2 {
        for r in 0..n {
            t.add(r, 0, (r + pass) as f64).unwrap();
        }
    }
    t.add(n - 1, 1, 1.0).unwrap();
    let csc = t.to_csc();
    let elapsed = start.elapsed();
    assert!(elapsed.as_secs_f64() < 5.0, "took {elapsed:?}");

    assert_eq!(t.len(), n + 1);
    assert_eq!(t.get(7, 0), 15.0);
    assert_eq!(t.get(7, 1), 0.0);
    assert_eq!(csc.at(n - 1, 0).unwrap(), (2 * n - 1) as f64);
    // row 0 sums to 0 + 1 = 1, nothing cancels
    assert_eq!(csc.nnz(), n + 1);
}

#[test]
fn triplet_rejects_out_of_range() {
    let mut t = TripletMatrix::new(2, 2);
    assert!(t.add(2, 0, 1.0).is_err());
    assert!(t.add(0, 5, 1.0).is_err());
    assert!(t.is_empty());
}

// ─────────────────────────────────────────────────────────────
//  Arithmetic
// ─────────────────────────────────────────────────────────────

#[test]
fn add_is_entrywise() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let a = random_csc(&mut rng, 8, 6, 0.4);
    let b = random_csc(&mut rng, 8, 6, 0.4);
    let sum = a.add(&b).unwrap();
    let diff = a.subtract(&b).unwrap();
    for i in 0..8 {
        for j in 0..6 {
            let (x, y) = (a.at(i, j).unwrap(), b.at(i, j).unwrap());
            assert_abs_diff_eq!(sum.at(i, j).unwrap(), x + y, epsilon = 1e-15);
            assert_abs_diff_eq!(diff.at(i, j).unwrap(), x - y, epsilon = 1e-15);
        }
    }
}

#[test]
fn subtracting_self_drops_every_entry() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let a = random_csc(&mut rng, 5, 5, 0.5);
    assert_eq!(a.subtract(&a).unwrap().nnz(), 0);
    let r = a.to_csr();
    assert_eq!(r.subtract(&r).unwrap().nnz(), 0);
}

#[test]
fn shape_mismatch_is_an_error() {
    let a = CscMatrix::zero(2, 3);
    let b = CscMatrix::zero(3, 2);
    assert!(matches!(a.add(&b), Err(GpaError::ShapeMismatch { .. })));
    assert!(matches!(a.subtract(&b), Err(GpaError::ShapeMismatch { .. })));
    assert!(matches!(a.multiply(&a), Err(GpaError::ShapeMismatch { .. })));
    assert!(a.multiply(&b).is_ok());
    let x = DenseVector::zeros(2);
    assert!(matches!(a.multiply_dense(&x), Err(GpaError::DimensionMismatch { .. })));
}

#[test]
fn multiply_by_identity_is_identity() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let a = random_csc(&mut rng, 7, 5, 0.35);
    let right = a.multiply(&CscMatrix::identity(5)).unwrap();
    let left = CscMatrix::identity(7).multiply(&a).unwrap();
    assert_dense_eq(&right.to_dense(), &a.to_dense(), 0.0);
    assert_dense_eq(&left.to_dense(), &a.to_dense(), 0.0);

    let r = a.to_csr();
    let right = r.multiply(&CsrMatrix::identity(5)).unwrap();
    assert_dense_eq(&right.to_dense(), &a.to_dense(), 0.0);
}

#[test]
fn matrix_product_matches_dense() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let a = random_csc(&mut rng, 6, 9, 0.3);
    let b = random_csc(&mut rng, 9, 4, 0.3);
    let expected = a.to_dense().dot(&b.to_dense());

    assert_dense_eq(&a.multiply(&b).unwrap().to_dense(), &expected, 1e-12);
    let csr = a.to_csr().multiply(&b.to_csr()).unwrap();
    assert_dense_eq(&csr.to_dense(), &expected, 1e-12);
}

#[test]
fn transpose_multiply_self_is_symmetric_gram() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let a = random_csc(&mut rng, 10, 6, 0.3);
    let dense = a.to_dense();
    let expected = dense.t().dot(&dense);
    let ata = a.transpose_multiply_self();
    assert_eq!(ata.shape(), (6, 6));
    assert_dense_eq(&ata.to_dense(), &expected, 1e-12);
    for i in 0..6 {
        for j in 0..6 {
            assert_eq!(ata.at(i, j).unwrap(), ata.at(j, i).unwrap());
        }
    }
    assert_dense_eq(&a.to_csr().transpose_multiply_self().to_dense(), &expected, 1e-12);
}

#[test]
fn scalar_scale_and_divide() {
    let a = scenario_1();
    let doubled = a.scale(2.0);
    assert_eq!(doubled.at(1, 2).unwrap(), 14.0);
    assert_eq!(a.scale(0.0).nnz(), 0);
    let halved = a.divide(2.0).unwrap();
    assert_eq!(halved.at(0, 2).unwrap(), 1.5);
    assert_eq!(a.divide(0.0), Err(GpaError::DivisionByZero));
    assert_eq!(a.to_csr().divide(0.0), Err(GpaError::DivisionByZero));
}

#[test]
fn transpose_swaps_orientation() {
    let a = scenario_1();
    let t = a.transpose();
    assert_eq!(t.shape(), (3, 2));
    for i in 0..2 {
        for j in 0..3 {
            assert_eq!(t.at(j, i).unwrap(), a.at(i, j).unwrap());
        }
    }
    // CSC of Aᵗ shares the CSR arrays of A
    let csr = a.to_csr();
    assert_eq!(csr.transpose().to_dense(), a.to_dense().t().to_owned());
    assert_dense_eq(&csr.to_csc().to_dense(), &a.to_dense(), 0.0);
}

#[test]
fn vstack_appends_rows() {
    let a = scenario_1();
    let b = CscMatrix::identity(3);
    let stacked = a.vstack(&b).unwrap();
    assert_eq!(stacked.shape(), (5, 3));
    assert_eq!(stacked.at(0, 1).unwrap(), 2.0);
    assert_eq!(stacked.at(3, 1).unwrap(), 1.0);
    assert!(a.vstack(&CscMatrix::identity(2)).is_err());
}

// ─────────────────────────────────────────────────────────────
//  Matrix-vector products
// ─────────────────────────────────────────────────────────────

#[test]
fn matrix_vector_matches_naive_product() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let a = random_csc(&mut rng, 12, 8, 0.25);
    let x: Vec<f64> = (0..8).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let dense = a.to_dense();
    let naive: Vec<f64> = (0..12).map(|i| (0..8).map(|j| dense[[i, j]] * x[j]).sum()).collect();

    let xv = DenseVector::from_slice(&x);
    let y_csc = a.multiply_dense(&xv).unwrap();
    let y_csr = a.to_csr().multiply_dense(&xv).unwrap();
    for i in 0..12 {
        assert_abs_diff_eq!(y_csc[i], naive[i], epsilon = 1e-12);
        assert_abs_diff_eq!(y_csr[i], naive[i], epsilon = 1e-12);
    }
}

#[test]
fn sparse_operand_matches_dense_operand() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let a = random_csc(&mut rng, 6, 10, 0.4);
    let s = SparseVector::from_entries(10, [(1, 2.0), (7, -1.5), (4, 0.25)]).unwrap();
    let d = s.to_dense();

    let via_sparse = a.multiply_vector(&Vector::from(s.clone())).unwrap();
    let via_dense = a.multiply_vector(&Vector::from(d.clone())).unwrap();
    for i in 0..6 {
        assert_abs_diff_eq!(via_sparse[i], via_dense[i], epsilon = 1e-14);
    }
    let r = a.to_csr();
    let via_sparse = r.multiply_sparse(&s).unwrap();
    for i in 0..6 {
        assert_abs_diff_eq!(via_sparse[i], via_dense[i], epsilon = 1e-14);
    }

    let empty = SparseVector::new(10);
    assert_eq!(a.multiply_sparse(&empty).unwrap().norm(), 0.0);
}

#[test]
fn transpose_multiply_vector_matches_transpose() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let a = random_csc(&mut rng, 9, 5, 0.4);
    let x = DenseVector::from_vec((0..9).map(|i| i as f64 - 4.0).collect());
    let expected = a.transpose().multiply_dense(&x).unwrap();
    let got = a.transpose_multiply_dense(&x).unwrap();
    let got_csr = a.to_csr().transpose_multiply_dense(&x).unwrap();
    let s = SparseVector::from_entries(9, x.iter().enumerate().filter(|(_, v)| *v != 0.0)).unwrap();
    let got_sparse = a.transpose_multiply_sparse(&s).unwrap();
    for j in 0..5 {
        assert_abs_diff_eq!(got[j], expected[j], epsilon = 1e-12);
        assert_abs_diff_eq!(got_csr[j], expected[j], epsilon = 1e-12);
        assert_abs_diff_eq!(got_sparse[j], expected[j], epsilon = 1e-12);
    }
}

// ─────────────────────────────────────────────────────────────
//  Storage-polymorphic handle
// ─────────────────────────────────────────────────────────────

#[test]
fn matrix_enum_dispatches_same_storage() {
    let a = Matrix::from(scenario_1());
    let b = Matrix::from(scenario_1().scale(-1.0));
    assert_eq!(a.add(&b).unwrap().nnz(), 0);
    let r = Matrix::from(scenario_1().to_csr());
    assert_eq!(r.subtract(&r).unwrap().kind(), "csr");
    assert_eq!(a.transpose().kind(), "csr");
    assert_eq!(a.transpose().multiply(&a).unwrap_err().to_string(), "multiply is not implemented for csr and csc");
}

#[test]
fn matrix_enum_rejects_mixed_storage() {
    let c = Matrix::from(CscMatrix::identity(3));
    let r = Matrix::from(CsrMatrix::identity(3));
    assert_eq!(
        c.add(&r),
        Err(GpaError::NotImplemented { operation: "add", lhs: "csc", rhs: "csr" })
    );
    assert!(matches!(r.subtract(&c), Err(GpaError::NotImplemented { .. })));
    assert!(matches!(c.multiply(&r), Err(GpaError::NotImplemented { .. })));
    assert_eq!(c.multiply(&c).unwrap().at(2, 2).unwrap(), 1.0);
}

// ─────────────────────────────────────────────────────────────
//  Interchange with sprs
// ─────────────────────────────────────────────────────────────

#[test]
fn sprs_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let a = random_csc(&mut rng, 7, 7, 0.3);
    let s = a.to_sprs();
    assert_eq!(s.rows(), 7);
    assert_eq!(s.nnz(), a.nnz());
    for (r, c, v) in a.iter() {
        assert_eq!(*s.get(r, c).unwrap(), v);
    }
    let back = CscMatrix::from_sprs(&s).unwrap();
    assert_dense_eq(&back.to_dense(), &a.to_dense(), 0.0);
}
