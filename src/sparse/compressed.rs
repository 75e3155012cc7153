//! Storage shared by the CSC and CSR matrices.
//!
//! A `Compressed` block is a list of *lanes* (columns for CSC, rows for
//! CSR).  Lane `j` owns the half-open slice `ptr[j]..ptr[j + 1]` of the
//! parallel `idx` / `val` arrays.  Within a lane an inner index appears at
//! most once; inner indices need not be sorted.

use crate::types::{GpaError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Compressed {
    pub outer: usize,
    pub inner: usize,
    pub ptr: Vec<usize>,
    pub idx: Vec<usize>,
    pub val: Vec<f64>,
}

/// Dense accumulator for one output lane, reset in O(touched).
struct Accumulator {
    values: Vec<f64>,
    stamp: Vec<usize>,
    touched: Vec<usize>,
}

impl Accumulator {
    fn new(size: usize) -> Self {
        Self {
            values: vec![0.0; size],
            stamp: vec![usize::MAX; size],
            touched: Vec::new(),
        }
    }

    #[inline]
    fn add(&mut self, lane: usize, index: usize, value: f64) {
        if self.stamp[index] != lane {
            self.stamp[index] = lane;
            self.values[index] = value;
            self.touched.push(index);
        } else {
            self.values[index] += value;
        }
    }

    /// Move the nonzero results into `idx` / `val` in first-touch order.
    fn drain_into(&mut self, idx: &mut Vec<usize>, val: &mut Vec<f64>) {
        for &i in &self.touched {
            let v = self.values[i];
            if v != 0.0 {
                idx.push(i);
                val.push(v);
            }
        }
        self.touched.clear();
    }
}

impl Compressed {
    pub fn empty(outer: usize, inner: usize) -> Self {
        Self {
            outer,
            inner,
            ptr: vec![0; outer + 1],
            idx: Vec::new(),
            val: Vec::new(),
        }
    }

    pub fn diagonal(values: &[f64]) -> Self {
        let n = values.len();
        let mut ptr = Vec::with_capacity(n + 1);
        let mut idx = Vec::with_capacity(n);
        let mut val = Vec::with_capacity(n);
        ptr.push(0);
        for (i, &v) in values.iter().enumerate() {
            if v != 0.0 {
                idx.push(i);
                val.push(v);
            }
            ptr.push(idx.len());
        }
        Self { outer: n, inner: n, ptr, idx, val }
    }

    /// Validate raw arrays and take ownership of them.
    pub fn from_raw(
        outer: usize,
        inner: usize,
        ptr: Vec<usize>,
        idx: Vec<usize>,
        val: Vec<f64>,
    ) -> Result<Self> {
        if ptr.len() != outer + 1 {
            return Err(GpaError::MalformedCompressed(format!(
                "pointer array has length {}, expected {}",
                ptr.len(),
                outer + 1
            )));
        }
        if ptr[0] != 0 {
            return Err(GpaError::MalformedCompressed(format!(
                "pointer array starts at {}, expected 0",
                ptr[0]
            )));
        }
        if idx.len() != val.len() {
            return Err(GpaError::MalformedCompressed(format!(
                "{} indices but {} values",
                idx.len(),
                val.len()
            )));
        }
        if ptr[outer] != idx.len() {
            return Err(GpaError::MalformedCompressed(format!(
                "pointer array ends at {}, but there are {} entries",
                ptr[outer],
                idx.len()
            )));
        }
        let mut seen = vec![usize::MAX; inner];
        for lane in 0..outer {
            let (start, end) = (ptr[lane], ptr[lane + 1]);
            if end < start || end > idx.len() {
                return Err(GpaError::MalformedCompressed(format!(
                    "pointer array is not monotonic at lane {lane}"
                )));
            }
            for &i in &idx[start..end] {
                if i >= inner {
                    return Err(GpaError::MalformedCompressed(format!(
                        "index {i} in lane {lane} exceeds inner dimension {inner}"
                    )));
                }
                if seen[i] == lane {
                    return Err(GpaError::MalformedCompressed(format!(
                        "index {i} repeated in lane {lane}"
                    )));
                }
                seen[i] = lane;
            }
        }
        Ok(Self { outer, inner, ptr, idx, val })
    }

    /// Build from per-lane entry lists.  Lanes must hold unique inner indices.
    pub fn from_lanes(outer: usize, inner: usize, lanes: Vec<Vec<(usize, f64)>>) -> Self {
        debug_assert_eq!(lanes.len(), outer);
        let nnz = lanes.iter().map(Vec::len).sum();
        let mut ptr = Vec::with_capacity(outer + 1);
        let mut idx = Vec::with_capacity(nnz);
        let mut val = Vec::with_capacity(nnz);
        ptr.push(0);
        for lane in lanes {
            for (i, v) in lane {
                idx.push(i);
                val.push(v);
            }
            ptr.push(idx.len());
        }
        Self { outer, inner, ptr, idx, val }
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.idx.len()
    }

    #[inline]
    pub fn lane(&self, j: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.ptr[j], self.ptr[j + 1]);
        (&self.idx[start..end], &self.val[start..end])
    }

    /// Linear scan of lane `outer` for `inner`; `0.0` when absent.
    pub fn get(&self, outer: usize, inner: usize) -> f64 {
        let (idx, val) = self.lane(outer);
        idx.iter()
            .position(|&i| i == inner)
            .map_or(0.0, |p| val[p])
    }

    /// `(outer, inner, value)` for every stored entry, lane by lane.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.outer).flat_map(move |j| {
            let (idx, val) = self.lane(j);
            idx.iter().zip(val).map(move |(&i, &v)| (j, i, v))
        })
    }

    /// `self + sign · other`, dropping exact cancellations.
    pub fn merge(&self, other: &Compressed, sign: f64) -> Compressed {
        let mut acc = Accumulator::new(self.inner);
        let mut ptr = Vec::with_capacity(self.outer + 1);
        let mut idx = Vec::with_capacity(self.nnz() + other.nnz());
        let mut val = Vec::with_capacity(self.nnz() + other.nnz());
        ptr.push(0);
        for j in 0..self.outer {
            let (ai, av) = self.lane(j);
            for (&i, &v) in ai.iter().zip(av) {
                acc.add(j, i, v);
            }
            let (bi, bv) = other.lane(j);
            for (&i, &v) in bi.iter().zip(bv) {
                acc.add(j, i, sign * v);
            }
            acc.drain_into(&mut idx, &mut val);
            ptr.push(idx.len());
        }
        Compressed {
            outer: self.outer,
            inner: self.inner,
            ptr,
            idx,
            val,
        }
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Compressed {
        Compressed {
            outer: self.outer,
            inner: self.inner,
            ptr: self.ptr.clone(),
            idx: self.idx.clone(),
            val: self.val.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Swap the roles of lanes and inner indices (counting sort).
    ///
    /// The CSC arrays of `A` reinterpreted this way are the CSC arrays of
    /// `Aᵗ`, i.e. the CSR arrays of `A`.  Output lanes are sorted.
    pub fn transposed(&self) -> Compressed {
        let mut counts = vec![0usize; self.inner + 1];
        for &i in &self.idx {
            counts[i + 1] += 1;
        }
        for i in 0..self.inner {
            counts[i + 1] += counts[i];
        }
        let ptr = counts.clone();
        let mut next = counts;
        let mut idx = vec![0usize; self.nnz()];
        let mut val = vec![0.0; self.nnz()];
        for j in 0..self.outer {
            let (li, lv) = self.lane(j);
            for (&i, &v) in li.iter().zip(lv) {
                let slot = next[i];
                idx[slot] = j;
                val[slot] = v;
                next[i] += 1;
            }
        }
        Compressed {
            outer: self.inner,
            inner: self.outer,
            ptr,
            idx,
            val,
        }
    }

    /// Sparse product driven by the lanes of `driver`:
    ///
    /// ```text
    /// out.lane(j) = Σ_{(k, v) ∈ driver.lane(j)}  v · gathered.lane(k)
    /// ```
    ///
    /// For CSC `A·B` the driver is `B` and the gathered operand `A`; for
    /// CSR the roles swap.  Only nonzero results are emitted.
    pub fn product(driver: &Compressed, gathered: &Compressed) -> Compressed {
        debug_assert_eq!(driver.inner, gathered.outer);
        let mut acc = Accumulator::new(gathered.inner);
        let mut ptr = Vec::with_capacity(driver.outer + 1);
        let mut idx = Vec::new();
        let mut val = Vec::new();
        ptr.push(0);
        for j in 0..driver.outer {
            let (di, dv) = driver.lane(j);
            for (&k, &v) in di.iter().zip(dv) {
                let (gi, gv) = gathered.lane(k);
                for (&i, &a) in gi.iter().zip(gv) {
                    acc.add(j, i, v * a);
                }
            }
            acc.drain_into(&mut idx, &mut val);
            ptr.push(idx.len());
        }
        Compressed {
            outer: driver.outer,
            inner: gathered.inner,
            ptr,
            idx,
            val,
        }
    }

    /// Append the lanes of `other`, offsetting its inner indices by
    /// `self.inner` (stacking along the inner dimension).
    pub fn stack_inner(&self, other: &Compressed) -> Compressed {
        debug_assert_eq!(self.outer, other.outer);
        let mut ptr = Vec::with_capacity(self.outer + 1);
        let mut idx = Vec::with_capacity(self.nnz() + other.nnz());
        let mut val = Vec::with_capacity(self.nnz() + other.nnz());
        ptr.push(0);
        for j in 0..self.outer {
            let (ai, av) = self.lane(j);
            idx.extend_from_slice(ai);
            val.extend_from_slice(av);
            let (bi, bv) = other.lane(j);
            idx.extend(bi.iter().map(|&i| i + self.inner));
            val.extend_from_slice(bv);
            ptr.push(idx.len());
        }
        Compressed {
            outer: self.outer,
            inner: self.inner + other.inner,
            ptr,
            idx,
            val,
        }
    }

    /// Copy with each lane sorted by inner index.
    pub fn sorted(&self) -> Compressed {
        let mut lanes = Vec::with_capacity(self.outer);
        for j in 0..self.outer {
            let (li, lv) = self.lane(j);
            let mut lane: Vec<(usize, f64)> = li.iter().copied().zip(lv.iter().copied()).collect();
            lane.sort_unstable_by_key(|&(i, _)| i);
            lanes.push(lane);
        }
        Compressed::from_lanes(self.outer, self.inner, lanes)
    }
}
