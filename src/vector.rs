//! Dense and sparse numeric vectors.
//!
//! `DenseVector` is a thin wrapper over `ndarray::Array1`; `SparseVector`
//! stores only nonzero entries in a hash map.  The closed [`Vector`] enum
//! dispatches mixed dense/sparse arithmetic to the specialised pairing so
//! that no operation densifies a sparse operand without need.

use crate::types::{GpaError, Result, NEGLIGIBLE_PIVOT};
use hashbrown::HashMap;
use ndarray::Array1;
use std::ops::Index;

// ─────────────────────────────────────────────────────────────
//  Dense vector
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DenseVector {
    data: Array1<f64>,
}

impl DenseVector {
    pub fn zeros(size: usize) -> Self {
        Self { data: Array1::zeros(size) }
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        Self { data: Array1::from_vec(values) }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self::from_vec(values.to_vec())
    }

    /// Unit basis vector `e_index` of length `size`.
    pub fn unit(size: usize, index: usize) -> Result<Self> {
        let mut v = Self::zeros(size);
        v.set(index, 1.0)?;
        Ok(v)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        self.data.get(index).copied().ok_or(GpaError::IndexOutOfRange {
            context: "DenseVector::get",
            index,
            bound: self.size(),
        })
    }

    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let bound = self.size();
        let slot = self.data.get_mut(index).ok_or(GpaError::IndexOutOfRange {
            context: "DenseVector::set",
            index,
            bound,
        })?;
        *slot = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.to_vec()
    }

    fn check_size(&self, other_size: usize, context: &'static str) -> Result<()> {
        if self.size() != other_size {
            return Err(GpaError::DimensionMismatch {
                context,
                expected: self.size(),
                actual: other_size,
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &DenseVector) -> Result<DenseVector> {
        self.check_size(other.size(), "DenseVector::add")?;
        Ok(Self { data: &self.data + &other.data })
    }

    pub fn subtract(&self, other: &DenseVector) -> Result<DenseVector> {
        self.check_size(other.size(), "DenseVector::subtract")?;
        Ok(Self { data: &self.data - &other.data })
    }

    pub fn scale(&self, factor: f64) -> DenseVector {
        Self { data: &self.data * factor }
    }

    pub fn divide(&self, divisor: f64) -> Result<DenseVector> {
        if divisor == 0.0 {
            return Err(GpaError::DivisionByZero);
        }
        Ok(Self { data: &self.data / divisor })
    }

    pub fn dot(&self, other: &DenseVector) -> Result<f64> {
        self.check_size(other.size(), "DenseVector::dot")?;
        Ok(self.data.dot(&other.data))
    }

    pub fn norm_squared(&self) -> f64 {
        self.data.dot(&self.data)
    }

    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// `self += factor · other` without allocating.
    pub(crate) fn axpy(&mut self, factor: f64, other: &DenseVector) -> Result<()> {
        self.check_size(other.size(), "DenseVector::axpy")?;
        self.data.scaled_add(factor, &other.data);
        Ok(())
    }

    // dense ± sparse: copy the dense operand, touch only the sparse nonzeros
    fn add_sparse(&self, other: &SparseVector, sign: f64) -> Result<DenseVector> {
        self.check_size(other.size(), "DenseVector::add_sparse")?;
        let mut out = self.data.clone();
        for (i, v) in other.iter() {
            out[i] += sign * v;
        }
        Ok(Self { data: out })
    }

    fn dot_sparse(&self, other: &SparseVector) -> Result<f64> {
        self.check_size(other.size(), "DenseVector::dot_sparse")?;
        Ok(other.iter().map(|(i, v)| self.data[i] * v).sum())
    }
}

impl Index<usize> for DenseVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.data[index]
    }
}

impl From<Vec<f64>> for DenseVector {
    fn from(values: Vec<f64>) -> Self {
        Self::from_vec(values)
    }
}

// ─────────────────────────────────────────────────────────────
//  Sparse vector
// ─────────────────────────────────────────────────────────────

/// Fixed-size vector storing only its nonzero entries.
///
/// An absent index reads as `0.0`; explicit zeros are never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    size: usize,
    entries: HashMap<usize, f64>,
}

impl SparseVector {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            entries: HashMap::new(),
        }
    }

    /// Build from `(index, value)` pairs; repeated indices are summed.
    pub fn from_entries<I>(size: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut v = Self::new(size);
        for (index, value) in entries {
            let current = v.get(index)?;
            v.set(index, current + value)?;
        }
        Ok(v)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    fn check_index(&self, index: usize, context: &'static str) -> Result<()> {
        if index >= self.size {
            return Err(GpaError::IndexOutOfRange {
                context,
                index,
                bound: self.size,
            });
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        self.check_index(index, "SparseVector::get")?;
        Ok(self.value(index))
    }

    /// Unchecked read; caller guarantees `index < size`.
    pub(crate) fn value(&self, index: usize) -> f64 {
        self.entries.get(&index).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        self.check_index(index, "SparseVector::set")?;
        if value == 0.0 {
            self.entries.remove(&index);
        } else {
            self.entries.insert(index, value);
        }
        Ok(())
    }

    /// Nonzero entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().map(|(&i, &v)| (i, v))
    }

    /// Nonzero entries ordered by index.
    pub fn sorted_entries(&self) -> Vec<(usize, f64)> {
        let mut out: Vec<(usize, f64)> = self.iter().collect();
        out.sort_unstable_by_key(|&(i, _)| i);
        out
    }

    pub fn to_dense(&self) -> DenseVector {
        let mut out = DenseVector::zeros(self.size);
        for (i, v) in self.iter() {
            out.data[i] = v;
        }
        out
    }

    fn check_size(&self, other_size: usize, context: &'static str) -> Result<()> {
        if self.size != other_size {
            return Err(GpaError::DimensionMismatch {
                context,
                expected: self.size,
                actual: other_size,
            });
        }
        Ok(())
    }

    fn merge(&self, other: &SparseVector, sign: f64) -> SparseVector {
        let mut out = self.clone();
        for (i, v) in other.iter() {
            let sum = out.value(i) + sign * v;
            if sum == 0.0 {
                out.entries.remove(&i);
            } else {
                out.entries.insert(i, sum);
            }
        }
        out
    }

    pub fn add(&self, other: &SparseVector) -> Result<SparseVector> {
        self.check_size(other.size, "SparseVector::add")?;
        Ok(self.merge(other, 1.0))
    }

    pub fn subtract(&self, other: &SparseVector) -> Result<SparseVector> {
        self.check_size(other.size, "SparseVector::subtract")?;
        Ok(self.merge(other, -1.0))
    }

    pub fn scale(&self, factor: f64) -> SparseVector {
        if factor == 0.0 {
            return Self::new(self.size);
        }
        Self {
            size: self.size,
            entries: self.entries.iter().map(|(&i, &v)| (i, v * factor)).collect(),
        }
    }

    pub fn divide(&self, divisor: f64) -> Result<SparseVector> {
        if divisor == 0.0 {
            return Err(GpaError::DivisionByZero);
        }
        Ok(Self {
            size: self.size,
            entries: self.entries.iter().map(|(&i, &v)| (i, v / divisor)).collect(),
        })
    }

    pub fn dot(&self, other: &SparseVector) -> Result<f64> {
        self.check_size(other.size, "SparseVector::dot")?;
        let (small, large) = if self.nnz() <= other.nnz() {
            (self, other)
        } else {
            (other, self)
        };
        Ok(small.iter().map(|(i, v)| v * large.value(i)).sum())
    }

    pub fn norm_squared(&self) -> f64 {
        self.entries.values().map(|v| v * v).sum()
    }

    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }
}

// ─────────────────────────────────────────────────────────────
//  Closed dense | sparse union
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    Dense(DenseVector),
    Sparse(SparseVector),
}

impl Vector {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dense(_) => "dense",
            Self::Sparse(_) => "sparse",
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Dense(v) => v.size(),
            Self::Sparse(v) => v.size(),
        }
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        match self {
            Self::Dense(v) => v.get(index),
            Self::Sparse(v) => v.get(index),
        }
    }

    pub fn to_dense(&self) -> DenseVector {
        match self {
            Self::Dense(v) => v.clone(),
            Self::Sparse(v) => v.to_dense(),
        }
    }

    pub fn add(&self, other: &Vector) -> Result<Vector> {
        match (self, other) {
            (Self::Dense(a), Self::Dense(b)) => a.add(b).map(Self::Dense),
            (Self::Sparse(a), Self::Sparse(b)) => a.add(b).map(Self::Sparse),
            (Self::Dense(a), Self::Sparse(b)) => a.add_sparse(b, 1.0).map(Self::Dense),
            (Self::Sparse(a), Self::Dense(b)) => b.add_sparse(a, 1.0).map(Self::Dense),
        }
    }

    pub fn subtract(&self, other: &Vector) -> Result<Vector> {
        match (self, other) {
            (Self::Dense(a), Self::Dense(b)) => a.subtract(b).map(Self::Dense),
            (Self::Sparse(a), Self::Sparse(b)) => a.subtract(b).map(Self::Sparse),
            (Self::Dense(a), Self::Sparse(b)) => a.add_sparse(b, -1.0).map(Self::Dense),
            // s − d = −(d − s)
            (Self::Sparse(a), Self::Dense(b)) => b
                .add_sparse(a, -1.0)
                .map(|d| Self::Dense(d.scale(-1.0))),
        }
    }

    pub fn dot(&self, other: &Vector) -> Result<f64> {
        match (self, other) {
            (Self::Dense(a), Self::Dense(b)) => a.dot(b),
            (Self::Sparse(a), Self::Sparse(b)) => a.dot(b),
            (Self::Dense(a), Self::Sparse(b)) | (Self::Sparse(b), Self::Dense(a)) => a.dot_sparse(b),
        }
    }

    pub fn scale(&self, factor: f64) -> Vector {
        match self {
            Self::Dense(v) => Self::Dense(v.scale(factor)),
            Self::Sparse(v) => Self::Sparse(v.scale(factor)),
        }
    }

    pub fn divide(&self, divisor: f64) -> Result<Vector> {
        match self {
            Self::Dense(v) => v.divide(divisor).map(Self::Dense),
            Self::Sparse(v) => v.divide(divisor).map(Self::Sparse),
        }
    }

    pub fn norm(&self) -> f64 {
        match self {
            Self::Dense(v) => v.norm(),
            Self::Sparse(v) => v.norm(),
        }
    }
}

impl From<DenseVector> for Vector {
    fn from(v: DenseVector) -> Self {
        Self::Dense(v)
    }
}

impl From<SparseVector> for Vector {
    fn from(v: SparseVector) -> Self {
        Self::Sparse(v)
    }
}

// ─────────────────────────────────────────────────────────────
//  Gram-Schmidt
// ─────────────────────────────────────────────────────────────

/// Orthonormalise `vectors` in order (modified Gram-Schmidt).
///
/// Each candidate has its projection onto every already-accepted output
/// removed and is then divided by its length, so every returned vector has
/// unit norm.  A candidate whose remainder is negligible relative to its
/// original length is linearly dependent on the accepted set and is
/// dropped, so the output may be shorter than the input.
pub fn gram_schmidt<I>(vectors: I) -> Result<Vec<DenseVector>>
where
    I: IntoIterator<Item = DenseVector>,
{
    let mut basis: Vec<DenseVector> = Vec::new();
    let mut size = None;
    for candidate in vectors {
        match size {
            None => size = Some(candidate.size()),
            Some(n) if n != candidate.size() => {
                return Err(GpaError::DimensionMismatch {
                    context: "gram_schmidt",
                    expected: n,
                    actual: candidate.size(),
                });
            }
            Some(_) => {}
        }

        let original = candidate.norm();
        let mut v = candidate;
        for u in &basis {
            let projection = v.dot(u)?;
            v.axpy(-projection, u)?;
        }
        let length = v.norm();
        if length <= NEGLIGIBLE_PIVOT * original || length == 0.0 {
            continue;
        }
        basis.push(v.divide(length)?);
    }
    Ok(basis)
}
