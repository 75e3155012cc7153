//! Dense / sparse vector arithmetic and Gram-Schmidt.

use approx::assert_abs_diff_eq;
use gpa::{gram_schmidt, DenseVector, GpaError, SparseVector, Vector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_dense(rng: &mut ChaCha8Rng, n: usize) -> DenseVector {
    DenseVector::from_vec((0..n).map(|_| rng.gen_range(-10.0..10.0)).collect())
}

#[test]
fn add_then_subtract_recovers_operand() {
    let mut rng = ChaCha8Rng::seed_from_u64(30);
    let a = random_dense(&mut rng, 16);
    let b = random_dense(&mut rng, 16);
    let back = a.add(&b).unwrap().subtract(&b).unwrap();
    for i in 0..16 {
        assert_abs_diff_eq!(back[i], a[i], epsilon = 1e-12);
    }

    let sa = SparseVector::from_entries(20, [(0, 1.5), (7, -2.0), (19, 4.0)]).unwrap();
    let sb = SparseVector::from_entries(20, [(7, 3.0), (3, 1.0)]).unwrap();
    let back = sa.add(&sb).unwrap().subtract(&sb).unwrap();
    assert_eq!(back, sa);
}

#[test]
fn norms() {
    assert_eq!(DenseVector::zeros(5).norm(), 0.0);
    assert_eq!(SparseVector::new(5).norm(), 0.0);
    let v = DenseVector::from_vec(vec![3.0, 4.0]);
    assert_eq!(v.norm(), 5.0);
    assert_eq!(v.norm_squared(), 25.0);
    let s = SparseVector::from_entries(100, [(10, -3.0), (90, 4.0)]).unwrap();
    assert_eq!(s.norm(), 5.0);
    assert!(Vector::from(s).norm() >= 0.0);
}

#[test]
fn dot_products_agree_across_storage() {
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    let d = random_dense(&mut rng, 12);
    let s = SparseVector::from_entries(12, [(2, 1.0), (5, -2.0), (11, 0.5)]).unwrap();
    let expected = d[2] - 2.0 * d[5] + 0.5 * d[11];

    let dv = Vector::from(d.clone());
    let sv = Vector::from(s.clone());
    assert_abs_diff_eq!(dv.dot(&sv).unwrap(), expected, epsilon = 1e-12);
    assert_abs_diff_eq!(sv.dot(&dv).unwrap(), expected, epsilon = 1e-12);
    assert_abs_diff_eq!(d.dot(&s.to_dense()).unwrap(), expected, epsilon = 1e-12);
    assert_abs_diff_eq!(sv.dot(&sv).unwrap(), s.norm_squared(), epsilon = 1e-12);
}

#[test]
fn mixed_arithmetic_dispatch() {
    let d = Vector::from(DenseVector::from_vec(vec![1.0, 2.0, 3.0]));
    let s = Vector::from(SparseVector::from_entries(3, [(1, 10.0)]).unwrap());

    let sum = d.add(&s).unwrap();
    assert_eq!(sum.kind(), "dense");
    assert_eq!(sum.to_dense().to_vec(), vec![1.0, 12.0, 3.0]);

    let diff = s.subtract(&d).unwrap();
    assert_eq!(diff.to_dense().to_vec(), vec![-1.0, 8.0, -3.0]);

    // sparse ± sparse stays sparse
    let twice = s.add(&s).unwrap();
    assert_eq!(twice.kind(), "sparse");
    assert_eq!(twice.get(1).unwrap(), 20.0);
}

#[test]
fn size_mismatch_is_an_error() {
    let a = DenseVector::zeros(3);
    let b = DenseVector::zeros(4);
    assert!(matches!(a.add(&b), Err(GpaError::DimensionMismatch { .. })));
    let s = SparseVector::new(4);
    assert!(matches!(
        Vector::from(a).dot(&Vector::from(s)),
        Err(GpaError::DimensionMismatch { .. })
    ));
}

#[test]
fn element_access() {
    let mut d = DenseVector::zeros(3);
    d.set(2, 7.0).unwrap();
    assert_eq!(d.get(2).unwrap(), 7.0);
    assert!(matches!(d.get(3), Err(GpaError::IndexOutOfRange { .. })));

    let mut s = SparseVector::new(3);
    s.set(1, 2.0).unwrap();
    assert_eq!(s.get(0).unwrap(), 0.0);
    assert_eq!(s.nnz(), 1);
    s.set(1, 0.0).unwrap();
    assert_eq!(s.nnz(), 0);
    assert!(s.set(3, 1.0).is_err());
}

#[test]
fn sparse_scale_by_zero_collapses() {
    let s = SparseVector::from_entries(8, [(0, 1.0), (4, 2.0), (7, 3.0)]).unwrap();
    let zero = s.scale(0.0);
    assert_eq!(zero.nnz(), 0);
    assert_eq!(zero.size(), 8);
    assert_eq!(s.scale(2.0).get(4).unwrap(), 4.0);
    assert_eq!(Vector::from(s.clone()).scale(0.0).kind(), "sparse");
}

#[test]
fn division_by_zero() {
    assert_eq!(DenseVector::zeros(2).divide(0.0), Err(GpaError::DivisionByZero));
    assert_eq!(SparseVector::new(2).divide(0.0), Err(GpaError::DivisionByZero));
    let v = Vector::from(DenseVector::from_vec(vec![2.0, 4.0]));
    assert_eq!(v.divide(2.0).unwrap().to_dense().to_vec(), vec![1.0, 2.0]);
}

#[test]
fn gram_schmidt_orthonormalises() {
    let mut rng = ChaCha8Rng::seed_from_u64(32);
    let inputs: Vec<DenseVector> = (0..4).map(|_| random_dense(&mut rng, 6)).collect();
    let basis = gram_schmidt(inputs).unwrap();
    assert_eq!(basis.len(), 4);
    for (i, u) in basis.iter().enumerate() {
        assert_abs_diff_eq!(u.norm(), 1.0, epsilon = 1e-12);
        for v in &basis[i + 1..] {
            assert_abs_diff_eq!(u.dot(v).unwrap(), 0.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn gram_schmidt_drops_dependent_vectors() {
    let a = DenseVector::from_vec(vec![1.0, 1.0, 0.0]);
    let b = DenseVector::from_vec(vec![2.0, 2.0, 0.0]);
    let c = DenseVector::from_vec(vec![0.0, 1.0, 0.0]);
    let basis = gram_schmidt(vec![a, b, c, DenseVector::zeros(3)]).unwrap();
    assert_eq!(basis.len(), 2);
    let s = 1.0 / 2.0_f64.sqrt();
    assert_abs_diff_eq!(basis[0][0], s, epsilon = 1e-14);
    assert_abs_diff_eq!(basis[1][0], -s, epsilon = 1e-14);
    assert_abs_diff_eq!(basis[1][1], s, epsilon = 1e-14);
}

#[test]
fn gram_schmidt_rejects_ragged_input() {
    let r = gram_schmidt(vec![DenseVector::zeros(2), DenseVector::zeros(3)]);
    assert!(matches!(r, Err(GpaError::DimensionMismatch { expected: 2, actual: 3, .. })));
    assert!(gram_schmidt(Vec::new()).unwrap().is_empty());
}
