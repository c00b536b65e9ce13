//! Constraint matrix for Fourier-Motzkin elimination.
//!
//! Each row encodes one inequality `a·x <= b`; the last column holds the
//! right-hand side `b`. Rows are stored in a plain `Vec`, and bulk deletion
//! marks rows then compacts once, so surviving rows keep their relative
//! order.

use std::fmt;
use num_integer::Integer;

use crate::utils::errors::{SolverError, SolverResult};

/// Tolerance used when deciding whether a coefficient is zero.
pub const EPSILON: f64 = 1e-9;

/// A growable list of `a·x <= b` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    /// Number of columns, right-hand side included
    cols: usize,
    /// Row storage
    rows: Vec<Vec<f64>>,
}

impl Matrix {
    /// Create an empty matrix with `cols` columns (right-hand side included).
    pub fn new(cols: usize) -> Self {
        Self { cols, rows: Vec::new() }
    }

    /// Create from row data. Every row must have the same length.
    pub fn from_rows(data: Vec<Vec<f64>>) -> Self {
        let cols = data.first().map_or(0, |r| r.len());
        debug_assert!(data.iter().all(|r| r.len() == cols), "ragged constraint rows");
        Self { cols, rows: data }
    }

    /// Create from integer row data.
    pub fn from_int_rows(data: &[Vec<i64>]) -> Self {
        Self::from_rows(
            data.iter()
                .map(|row| row.iter().map(|&v| v as f64).collect())
                .collect(),
        )
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns, right-hand side included.
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Number of variable columns (everything except the right-hand side).
    pub fn num_vars(&self) -> usize {
        self.cols.saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Borrow a row.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Get an element.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    /// Right-hand side of a row.
    pub fn rhs(&self, row: usize) -> f64 {
        self.rows[row][self.cols - 1]
    }

    /// Check that `col` names a variable column.
    pub fn check_var(&self, col: usize) -> SolverResult<()> {
        if col >= self.num_vars() {
            return Err(SolverError::ColumnOutOfBounds { column: col, columns: self.cols });
        }
        Ok(())
    }

    /// Append a row.
    pub fn add_row(&mut self, row: Vec<f64>) -> SolverResult<()> {
        if row.len() != self.cols {
            return Err(SolverError::ColumnOutOfBounds { column: row.len(), columns: self.cols });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append an integer row.
    pub fn add_int_row(&mut self, row: &[i64]) -> SolverResult<()> {
        self.add_row(row.iter().map(|&v| v as f64).collect())
    }

    /// Delete the rows whose indices are listed; survivors keep their order.
    pub fn delete_rows(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let mut doomed = vec![false; self.rows.len()];
        for &i in indices {
            if i < doomed.len() {
                doomed[i] = true;
            }
        }
        let mut idx = 0;
        self.rows.retain(|_| {
            let keep = !doomed[idx];
            idx += 1;
            keep
        });
    }

    /// Keep only rows satisfying the predicate.
    pub fn retain_rows<F: FnMut(&[f64]) -> bool>(&mut self, mut keep: F) {
        self.rows.retain(|r| keep(r));
    }

    /// Divide every entry of a row by `divisor`.
    pub fn divide_row(&mut self, row: usize, divisor: f64) {
        for v in &mut self.rows[row] {
            *v /= divisor;
        }
    }

    /// True if every variable coefficient of the row is zero.
    pub fn is_zero_row(&self, row: usize) -> bool {
        self.rows[row][..self.cols - 1].iter().all(|v| v.abs() < EPSILON)
    }

    /// True if every entry is an integer.
    pub fn is_integral(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|v| is_integral(*v)))
    }
}

/// True if `v` is (within tolerance) an integer.
pub fn is_integral(v: f64) -> bool {
    (v - v.round()).abs() < EPSILON
}

/// 2^63: the first magnitude an `i64` cannot hold.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Sum of two rows scaled by `a` and `b`.
pub fn combine(left: &[f64], a: f64, right: &[f64], b: f64) -> Vec<f64> {
    left.iter().zip(right).map(|(l, r)| a * l + b * r).collect()
}

/// GCD of the integral variable coefficients of a row (right-hand side
/// excluded). Returns `None` when some coefficient is not integral or does
/// not fit an `i64`.
pub fn row_gcd(row: &[f64]) -> Option<i64> {
    let (coeffs, _) = row.split_at(row.len().saturating_sub(1));
    let mut g = 0i64;
    for &c in coeffs {
        if !is_integral(c) || c.abs() >= I64_LIMIT {
            return None;
        }
        g = g.gcd(&(c.round() as i64));
    }
    Some(g)
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for row in &self.rows {
            write!(f, "  [")?;
            for (j, val) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                if j + 1 == row.len() {
                    write!(f, "| ")?;
                }
                if is_integral(*val) {
                    write!(f, "{}", val.round() as i64)?;
                } else {
                    write!(f, "{}", val)?;
                }
            }
            writeln!(f, "]")?;
        }
        write!(f, "]")
    }
}
