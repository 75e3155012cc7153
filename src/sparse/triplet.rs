//! Triplet store: the assembly format for compressed matrices.

use hashbrown::HashMap;

use super::compressed::Compressed;
use super::{CscMatrix, CsrMatrix};
use crate::types::{GpaError, Result};

/// Accumulates `(row, col, value)` entries column by column.
///
/// Adding to an existing `(row, col)` sums onto the stored value, which is
/// the standard idiom for scattering local contributions into a global
/// matrix.  Entries that sum to exactly zero are dropped on conversion.
/// Each `(row, col)` maps to its slot in the column, so `add` is O(1)
/// however many rows touch one column.
#[derive(Debug, Clone)]
pub struct TripletMatrix {
    rows: usize,
    cols: usize,
    columns: Vec<Vec<(usize, f64)>>,
    slots: HashMap<(usize, usize), usize>,
}

impl TripletMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            columns: vec![Vec::new(); cols],
            slots: HashMap::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of distinct `(row, col)` positions touched so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.rows {
            return Err(GpaError::IndexOutOfRange {
                context: "TripletMatrix::add (row)",
                index: row,
                bound: self.rows,
            });
        }
        if col >= self.cols {
            return Err(GpaError::IndexOutOfRange {
                context: "TripletMatrix::add (col)",
                index: col,
                bound: self.cols,
            });
        }
        let column = &mut self.columns[col];
        match self.slots.get(&(row, col)) {
            Some(&slot) => column[slot].1 += value,
            None => {
                self.slots.insert((row, col), column.len());
                column.push((row, value));
            }
        }
        Ok(())
    }

    /// Current accumulated value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.slots
            .get(&(row, col))
            .map_or(0.0, |&slot| self.columns[col][slot].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(c, column)| column.iter().map(move |&(r, v)| (r, c, v)))
    }

    fn compressed(&self) -> Compressed {
        let lanes: Vec<Vec<(usize, f64)>> = self
            .columns
            .iter()
            .map(|c| c.iter().copied().filter(|&(_, v)| v != 0.0).collect())
            .collect();
        Compressed::from_lanes(self.cols, self.rows, lanes)
    }

    pub fn to_csc(&self) -> CscMatrix {
        CscMatrix::from_compressed(self.rows, self.cols, self.compressed())
    }

    pub fn to_csr(&self) -> CsrMatrix {
        CsrMatrix::from_compressed(self.rows, self.cols, self.compressed().transposed())
    }
}
