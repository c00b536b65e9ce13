//! Fourier-Motzkin elimination.
//!
//! Decides whether a system of inequalities `A·x <= b` has a solution by
//! projecting away one variable at a time. Two entry points exist:
//!
//! - [`FourierMotzkinEliminator::eliminate_for_real_solutions`] answers the
//!   real relaxation.
//! - [`FourierMotzkinEliminator::eliminate_for_integer_solutions`] runs two
//!   integer projections side by side. The *real shadow* combines rows with
//!   exact integer multipliers and tightens every integral row by the gcd of
//!   its coefficients. The *dark shadow* additionally subtracts
//!   `(a - 1)(b - 1)` from each combined row (Pugh). An infeasible real
//!   shadow proves there is no integer point; a feasible dark shadow proves
//!   there is one. In between the answer is "feasible", which only ever
//!   over-approximates dependences.

use log::trace;

use crate::analysis::cancel::CancellationToken;
use crate::utils::errors::{SolverError, SolverResult};
use crate::utils::matrix::{combine, is_integral, row_gcd, Matrix, EPSILON};

/// Default cap on the number of rows a projection may produce.
pub const DEFAULT_MAX_ROWS: usize = 4096;

/// Outcome of the integer test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerVerdict {
    /// The tightened real shadow is infeasible
    Infeasible,
    /// The dark shadow is feasible
    Feasible,
    /// Real shadow feasible, dark shadow infeasible
    Inconclusive,
}

impl IntegerVerdict {
    /// The answer to "may an integer solution exist".
    pub fn may_be_feasible(self) -> bool {
        !matches!(self, IntegerVerdict::Infeasible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    Real,
    RealShadow,
    DarkShadow,
}

/// The eliminator. Cheap to construct; holds only limits.
#[derive(Debug, Clone)]
pub struct FourierMotzkinEliminator {
    max_rows: usize,
    cancel: Option<CancellationToken>,
}

impl Default for FourierMotzkinEliminator {
    fn default() -> Self {
        Self::new()
    }
}

impl FourierMotzkinEliminator {
    pub fn new() -> Self {
        Self { max_rows: DEFAULT_MAX_ROWS, cancel: None }
    }

    /// Cap the number of rows any intermediate system may have.
    pub fn with_row_limit(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Poll `token` once per elimination.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Does the system have a real solution?
    pub fn eliminate_for_real_solutions(&self, matrix: Matrix) -> SolverResult<bool> {
        self.eliminate(matrix, Projection::Real)
    }

    /// May the system have an integer solution? `false` is exact.
    pub fn eliminate_for_integer_solutions(&self, matrix: Matrix) -> SolverResult<bool> {
        Ok(self.integer_verdict(matrix)?.may_be_feasible())
    }

    /// Run both integer shadows and classify the result.
    pub fn integer_verdict(&self, matrix: Matrix) -> SolverResult<IntegerVerdict> {
        if !matrix.is_integral() {
            // Shadows need integral rows; fall back to the relaxation.
            let feasible = self.eliminate_for_real_solutions(matrix)?;
            return Ok(if feasible { IntegerVerdict::Inconclusive } else { IntegerVerdict::Infeasible });
        }
        if !self.eliminate(matrix.clone(), Projection::RealShadow)? {
            return Ok(IntegerVerdict::Infeasible);
        }
        if self.eliminate(matrix, Projection::DarkShadow)? {
            Ok(IntegerVerdict::Feasible)
        } else {
            trace!("integer gray zone: real shadow feasible, dark shadow empty");
            Ok(IntegerVerdict::Inconclusive)
        }
    }

    fn eliminate(&self, mut m: Matrix, projection: Projection) -> SolverResult<bool> {
        if m.is_empty() {
            return Err(SolverError::EmptyMatrix);
        }
        if self.cancel.as_ref().map_or(false, |t| t.is_cancelled()) {
            return Err(SolverError::Cancelled);
        }
        if projection != Projection::Real {
            tighten_rows(&mut m);
        }

        loop {
            let before = m.nrows();
            delete_all_unconstrained_variables(&mut m)?;
            if m.is_empty() {
                return Ok(true);
            }
            if m.nrows() == before {
                break;
            }
        }

        if !delete_trivial_rows(&mut m) {
            return Ok(false);
        }
        if m.is_empty() {
            return Ok(true);
        }
        if contains_inconsistent_inequalities(&m) {
            return Ok(false);
        }

        let mut var = m.num_vars();
        while var > 0 && !m.is_empty() {
            var -= 1;
            match projection {
                Projection::Real => real_projection(&mut m, var)?,
                Projection::RealShadow => integer_projection(&mut m, var, false)?,
                Projection::DarkShadow => integer_projection(&mut m, var, true)?,
            }
            if m.nrows() > self.max_rows {
                return Err(SolverError::RowLimitExceeded { limit: self.max_rows });
            }
            if !delete_trivial_rows(&mut m) || contains_inconsistent_inequalities(&m) {
                return Ok(false);
            }
        }

        Ok(m.rows().all(|row| row[row.len() - 1] >= -EPSILON))
    }
}

/// Row indices with a negative coefficient on `col` (`L = { i | a_ij < 0 }`).
pub fn lower_bound_set(m: &Matrix, col: usize) -> SolverResult<Vec<usize>> {
    bound_set(m, col, |v| v < -EPSILON)
}

/// Row indices with a positive coefficient on `col` (`U = { i | a_ij > 0 }`).
pub fn upper_bound_set(m: &Matrix, col: usize) -> SolverResult<Vec<usize>> {
    bound_set(m, col, |v| v > EPSILON)
}

fn bound_set(m: &Matrix, col: usize, pick: impl Fn(f64) -> bool) -> SolverResult<Vec<usize>> {
    if m.is_empty() {
        return Err(SolverError::EmptyMatrix);
    }
    m.check_var(col)?;
    Ok((0..m.nrows()).filter(|&i| pick(m.get(i, col))).collect())
}

/// For each variable, whether it lacks a lower or an upper bound.
pub fn unconstrained_variables(m: &Matrix) -> Vec<bool> {
    (0..m.num_vars())
        .map(|col| {
            let has_lower = m.rows().any(|r| r[col] < -EPSILON);
            let has_upper = m.rows().any(|r| r[col] > EPSILON);
            !(has_lower && has_upper)
        })
        .collect()
}

/// Drop every row that mentions a variable bounded on one side only.
/// Such a variable can always be pushed far enough to satisfy those rows.
pub fn delete_all_unconstrained_variables(m: &mut Matrix) -> SolverResult<()> {
    if m.is_empty() {
        return Err(SolverError::EmptyMatrix);
    }
    let free = unconstrained_variables(m);
    if free.iter().any(|&f| f) {
        m.retain_rows(|row| !free.iter().zip(row).any(|(&f, &v)| f && v.abs() > EPSILON));
    }
    Ok(())
}

/// Remove rows with no variable terms. Returns `false` if one of them reads
/// `0 <= b` with `b < 0`.
pub fn delete_trivial_rows(m: &mut Matrix) -> bool {
    let mut consistent = true;
    m.retain_rows(|row| {
        let (coeffs, rhs) = row.split_at(row.len() - 1);
        if coeffs.iter().any(|v| v.abs() > EPSILON) {
            return true;
        }
        if rhs[0] < -EPSILON {
            consistent = false;
        }
        false
    });
    consistent
}

/// True if some pair of rows reads `a·x <= b1` and `-a·x <= b2` with `-b2 > b1`.
pub fn contains_inconsistent_inequalities(m: &Matrix) -> bool {
    let n = m.nrows();
    (0..n).any(|i| ((i + 1)..n).any(|k| is_inconsistent_inequality(m.row(i), m.row(k))))
}

/// See [`contains_inconsistent_inequalities`].
pub fn is_inconsistent_inequality(row1: &[f64], row2: &[f64]) -> bool {
    let last = row1.len() - 1;
    let opposite = row1[..last]
        .iter()
        .zip(&row2[..last])
        .all(|(a, b)| (a + b).abs() < EPSILON);
    opposite && -row2[last] > row1[last] + EPSILON
}

/// One real projection step on column `var`.
///
/// Each bounding row is scaled to a unit coefficient, every (lower, upper)
/// pair is summed into a new row (lower-major order), and the bounding rows
/// are removed. If `var` is bounded on one side only, its rows are dropped.
pub fn real_projection(m: &mut Matrix, var: usize) -> SolverResult<()> {
    let lower = lower_bound_set(m, var)?;
    let upper = upper_bound_set(m, var)?;
    if lower.is_empty() || upper.is_empty() {
        m.delete_rows(&[lower, upper].concat());
        return Ok(());
    }

    for &i in lower.iter().chain(&upper) {
        let scale = m.get(i, var).abs();
        m.divide_row(i, scale);
    }
    for &l in &lower {
        for &u in &upper {
            let row = combine(m.row(l), 1.0, m.row(u), 1.0);
            m.add_row(row)?;
        }
    }
    m.delete_rows(&[lower, upper].concat());
    Ok(())
}

/// One exact integer projection step on column `var`; rows are combined as
/// `a·L + b·U` where `-b` and `a` are the coefficients of `var` in `L` and `U`.
fn integer_projection(m: &mut Matrix, var: usize, dark: bool) -> SolverResult<()> {
    let lower = lower_bound_set(m, var)?;
    let upper = upper_bound_set(m, var)?;
    if lower.is_empty() || upper.is_empty() {
        m.delete_rows(&[lower, upper].concat());
        return Ok(());
    }

    let last = m.ncols() - 1;
    for &l in &lower {
        for &u in &upper {
            let b = -m.get(l, var);
            let a = m.get(u, var);
            let mut row = combine(m.row(l), a, m.row(u), b);
            row[var] = 0.0;
            if dark {
                row[last] -= (a - 1.0) * (b - 1.0);
            }
            tighten(&mut row);
            m.add_row(row)?;
        }
    }
    m.delete_rows(&[lower, upper].concat());
    Ok(())
}

fn tighten_rows(m: &mut Matrix) {
    let rows: Vec<Vec<f64>> = m.rows().map(|r| {
        let mut row = r.to_vec();
        tighten(&mut row);
        row
    }).collect();
    *m = Matrix::from_rows(rows);
}

/// Divide an integral row by the gcd of its coefficients and round the
/// right-hand side down. Integer solutions are preserved.
fn tighten(row: &mut [f64]) {
    let last = row.len() - 1;
    if !is_integral(row[last]) {
        row[last] = row[last].floor();
    }
    match row_gcd(row) {
        Some(g) if g > 1 => {
            let g = g as f64;
            for v in &mut row[..last] {
                *v = (*v / g).round();
            }
            row[last] = (row[last] / g).floor();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feasible_system() -> Matrix {
        Matrix::from_int_rows(&[
            vec![1, 1, 1, 10],
            vec![1, -1, 2, 20],
            vec![2, -1, -1, -1],
            vec![-1, 1, -1, 5],
        ])
    }

    #[test]
    fn test_real_feasible() {
        let el = FourierMotzkinEliminator::new();
        assert_eq!(el.eliminate_for_real_solutions(feasible_system()), Ok(true));
        assert_eq!(el.eliminate_for_integer_solutions(feasible_system()), Ok(true));
    }

    #[test]
    fn test_real_infeasible() {
        let el = FourierMotzkinEliminator::new();
        let m = Matrix::from_int_rows(&[
            vec![1, 0, 20],
            vec![-1, 0, -10],
            vec![0, 1, 5],
            vec![0, -1, 0],
            vec![1, -1, 4],
        ]);
        assert_eq!(el.eliminate_for_real_solutions(m.clone()), Ok(false));
        assert_eq!(el.eliminate_for_integer_solutions(m), Ok(false));

        let m = Matrix::from_int_rows(&[vec![1, -1, -2], vec![-1, 1, -2]]);
        assert_eq!(el.eliminate_for_real_solutions(m), Ok(false));
    }

    #[test]
    fn test_empty_matrix_is_error() {
        let el = FourierMotzkinEliminator::new();
        assert_eq!(el.eliminate_for_real_solutions(Matrix::new(3)), Err(SolverError::EmptyMatrix));
        assert_eq!(el.eliminate_for_integer_solutions(Matrix::new(3)), Err(SolverError::EmptyMatrix));
        assert_eq!(lower_bound_set(&Matrix::new(3), 0), Err(SolverError::EmptyMatrix));
    }

    #[test]
    fn test_bound_sets() {
        let m = feasible_system();
        assert_eq!(lower_bound_set(&m, 0).unwrap(), vec![3]);
        assert_eq!(lower_bound_set(&m, 1).unwrap(), vec![1, 2]);
        assert_eq!(lower_bound_set(&m, 2).unwrap(), vec![2, 3]);
        assert_eq!(upper_bound_set(&m, 0).unwrap(), vec![0, 1, 2]);
        assert_eq!(upper_bound_set(&m, 1).unwrap(), vec![0, 3]);
        assert_eq!(upper_bound_set(&m, 2).unwrap(), vec![0, 1]);
        assert!(matches!(
            lower_bound_set(&m, 3),
            Err(SolverError::ColumnOutOfBounds { column: 3, columns: 4 })
        ));
    }

    #[test]
    fn test_real_projection() {
        let mut m = feasible_system();
        real_projection(&mut m, 2).unwrap();
        let expected = Matrix::from_rows(vec![
            vec![3.0, 0.0, 0.0, 9.0],
            vec![2.5, -1.5, 0.0, 9.0],
            vec![0.0, 2.0, 0.0, 15.0],
            vec![-0.5, 0.5, 0.0, 15.0],
        ]);
        assert_eq!(m, expected);
    }

    #[test]
    fn test_unconstrained_variables() {
        let mut m = Matrix::from_int_rows(&[
            vec![1, 1, 4],
            vec![-1, 0, 0],
            vec![0, 1, 3],
        ]);
        assert_eq!(unconstrained_variables(&m), vec![false, true]);
        delete_all_unconstrained_variables(&mut m).unwrap();
        assert_eq!(m.nrows(), 1);
        assert_eq!(m.row(0), &[-1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_trivial_rows() {
        let mut m = Matrix::from_int_rows(&[vec![0, 0, 3], vec![1, 0, 2]]);
        assert!(delete_trivial_rows(&mut m));
        assert_eq!(m.nrows(), 1);

        let mut m = Matrix::from_int_rows(&[vec![0, 0, -1], vec![1, 0, 2]]);
        assert!(!delete_trivial_rows(&mut m));
    }

    #[test]
    fn test_inconsistent_pair() {
        assert!(is_inconsistent_inequality(&[1.0, -1.0, -2.0], &[-1.0, 1.0, -2.0]));
        assert!(!is_inconsistent_inequality(&[1.0, -1.0, 2.0], &[-1.0, 1.0, -2.0]));
        assert!(!is_inconsistent_inequality(&[1.0, 0.0, -2.0], &[-1.0, 1.0, -2.0]));
    }

    #[test]
    fn test_integer_tightening_detects_parity() {
        // 2x = 1 has a real solution but no integer one.
        let m = Matrix::from_int_rows(&[vec![2, 1], vec![-2, -1]]);
        let el = FourierMotzkinEliminator::new();
        assert_eq!(el.eliminate_for_real_solutions(m.clone()), Ok(true));
        assert_eq!(el.integer_verdict(m), Ok(IntegerVerdict::Infeasible));
    }

    #[test]
    fn test_integer_exact_feasible() {
        // 2x <= 5 and 3x >= 4 leave exactly x = 2.
        let m = Matrix::from_int_rows(&[vec![2, 5], vec![-3, -4]]);
        let el = FourierMotzkinEliminator::new();
        assert_eq!(el.integer_verdict(m), Ok(IntegerVerdict::Feasible));
    }

    #[test]
    fn test_integer_gray_zone_is_conservative() {
        // x <= 2y <= ..., 3y <= x + 1, 1 <= x <= 10: integer point (2, 1).
        let m = Matrix::from_int_rows(&[
            vec![1, -2, 0],
            vec![-1, 3, 1],
            vec![-1, 0, -1],
            vec![1, 0, 10],
        ]);
        let el = FourierMotzkinEliminator::new();
        assert_eq!(el.integer_verdict(m.clone()), Ok(IntegerVerdict::Inconclusive));
        assert_eq!(el.eliminate_for_integer_solutions(m), Ok(true));
    }

    #[test]
    fn test_row_limit() {
        let el = FourierMotzkinEliminator::new().with_row_limit(3);
        let m = Matrix::from_int_rows(&[
            vec![1, 1, 1],
            vec![1, 2, 1],
            vec![-1, 1, 1],
            vec![-1, 2, 1],
            vec![0, -1, 1],
        ]);
        assert_eq!(
            el.eliminate_for_real_solutions(m),
            Err(SolverError::RowLimitExceeded { limit: 3 })
        );
    }

    #[test]
    fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let el = FourierMotzkinEliminator::new().with_cancellation(token);
        assert_eq!(el.eliminate_for_real_solutions(feasible_system()), Err(SolverError::Cancelled));
    }
}
