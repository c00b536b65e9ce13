//! Single-vector dependence test.
//!
//! Builds the constraint system "the write and the read touch the same
//! element while their iterations satisfy direction vector `v`" and asks
//! the eliminator whether it has a solution.
//!
//! Subscript coefficient rows are laid out as
//! `[constant, induction coefficients..., scalar coefficients...]`.
//! Matrix columns are
//! `[write-side indices..., read-side indices..., scalars..., rhs]`;
//! write-side and read-side indices are distinct unknowns because the two
//! accesses may run in different iterations of the same loop.

use log::{trace, warn};

use crate::analysis::direction::{Direction, DirectionVector};
use crate::analysis::fourier_motzkin::FourierMotzkinEliminator;
use crate::utils::errors::{AnalysisError, AnalysisResult, SolverError};
use crate::utils::matrix::Matrix;

/// Runs one feasibility test per direction vector.
#[derive(Debug, Clone)]
pub struct FourierMotzkinDependenceTester {
    eliminator: FourierMotzkinEliminator,
    integer_solutions: bool,
}

impl Default for FourierMotzkinDependenceTester {
    fn default() -> Self {
        Self::new(FourierMotzkinEliminator::new())
    }
}

impl FourierMotzkinDependenceTester {
    pub fn new(eliminator: FourierMotzkinEliminator) -> Self {
        Self { eliminator, integer_solutions: true }
    }

    /// Use the real relaxation instead of the integer test.
    pub fn real_solutions_only(mut self) -> Self {
        self.integer_solutions = false;
        self
    }

    /// May the accesses touch the same element under `direction`?
    ///
    /// `false` is a proof of independence. Solver failures other than
    /// cancellation answer `true`.
    pub fn test(
        &self,
        lower_bounds: &[i64],
        upper_bounds: &[i64],
        write_coefficients: &[Vec<i64>],
        read_coefficients: &[Vec<i64>],
        num_scalars: usize,
        direction: &DirectionVector,
    ) -> AnalysisResult<bool> {
        if let Some(decided) = constant_subscripts(write_coefficients, read_coefficients) {
            trace!("constant subscripts decide {} as {}", direction, decided);
            return Ok(decided);
        }

        let matrix = generate_dependence_matrix(
            lower_bounds,
            upper_bounds,
            write_coefficients,
            read_coefficients,
            num_scalars,
            direction,
        );
        let answer = if self.integer_solutions {
            self.eliminator.eliminate_for_integer_solutions(matrix)
        } else {
            self.eliminator.eliminate_for_real_solutions(matrix)
        };
        match answer {
            Ok(feasible) => {
                trace!("{} feasible: {}", direction, feasible);
                Ok(feasible)
            }
            Err(SolverError::Cancelled) => Err(AnalysisError::Cancelled),
            Err(err) => {
                warn!("{}; conservatively assuming a dependence under {}", err, direction);
                Ok(true)
            }
        }
    }
}

/// Decide the test without the solver when some dimension compares two
/// different constants (independent) or when every dimension compares
/// constants (dependent iff all are equal, which the first case covers).
fn constant_subscripts(write: &[Vec<i64>], read: &[Vec<i64>]) -> Option<bool> {
    let mut all_constant = true;
    for (w, r) in write.iter().zip(read) {
        let w_const = w.iter().skip(1).all(|&c| c == 0);
        let r_const = r.iter().skip(1).all(|&c| c == 0);
        if w_const && r_const {
            if w.first() != r.first() {
                return Some(false);
            }
        } else {
            all_constant = false;
        }
    }
    if all_constant {
        Some(true)
    } else {
        None
    }
}

/// Build the dependence system for one direction vector.
pub fn generate_dependence_matrix(
    lower_bounds: &[i64],
    upper_bounds: &[i64],
    write_coefficients: &[Vec<i64>],
    read_coefficients: &[Vec<i64>],
    num_scalars: usize,
    direction: &DirectionVector,
) -> Matrix {
    let write_len = write_coefficients.first().map_or(1, |c| c.len());
    let read_len = read_coefficients.first().map_or(1, |c| c.len());
    let width = write_len + read_len - num_scalars - 1;
    let read_offset = (width - 1 - num_scalars) / 2;
    let mut rows: Vec<Vec<f64>> = Vec::new();

    // write subscript == read subscript, as a pair of opposing rows.
    // Coefficients span all of i64, so differences are taken in f64.
    for (w, r) in write_coefficients.iter().zip(read_coefficients) {
        let induction_end = w.len() - num_scalars;
        let mut row: Vec<f64> = w[1..induction_end].iter().map(|&c| c as f64).collect();
        row.extend(r[1..induction_end].iter().map(|&c| -(c as f64)));
        row.extend(w[induction_end..].iter().zip(&r[induction_end..]).map(|(&a, &b)| a as f64 - b as f64));
        row.push(r[0] as f64 - w[0] as f64);
        let negated = row.iter().map(|v| -v).collect();
        rows.push(row);
        rows.push(negated);
    }

    // lb <= index <= ub on both sides
    for (i, (&lb, &ub)) in lower_bounds.iter().zip(upper_bounds).enumerate() {
        for col in [i, i + read_offset] {
            rows.push(unit_row(width, col, -1.0, -(lb as f64)));
            rows.push(unit_row(width, col, 1.0, ub as f64));
        }
    }

    for (i, d) in direction.iter().enumerate() {
        let (w, r) = (i, i + read_offset);
        match d {
            Direction::Any => {}
            Direction::Eq => {
                rows.push(pair_row(width, w, r, 1.0, 0.0));
                rows.push(pair_row(width, w, r, -1.0, 0.0));
            }
            // w < r  ->  w - r <= -1
            Direction::Lt => rows.push(pair_row(width, w, r, 1.0, -1.0)),
            // r < w  -> -w + r <= -1
            Direction::Gt => rows.push(pair_row(width, w, r, -1.0, -1.0)),
            Direction::Le => rows.push(pair_row(width, w, r, 1.0, 0.0)),
            Direction::Ge => rows.push(pair_row(width, w, r, -1.0, 0.0)),
        }
    }

    Matrix::from_rows(rows)
}

fn unit_row(width: usize, col: usize, coeff: f64, rhs: f64) -> Vec<f64> {
    let mut row = vec![0.0; width];
    row[col] = coeff;
    row[width - 1] = rhs;
    row
}

/// `sign * (x_w - x_r) <= rhs`
fn pair_row(width: usize, w: usize, r: usize, sign: f64, rhs: f64) -> Vec<f64> {
    let mut row = vec![0.0; width];
    row[w] = sign;
    row[r] = -sign;
    row[width - 1] = rhs;
    row
}
