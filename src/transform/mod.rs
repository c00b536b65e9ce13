//! Legality checks for loop transformations.
//!
//! Each check inspects the shape of a loop and then consults the
//! dependence analysis of its body. A transformation is legal only if it
//! does not reverse any dependence; every reason it might is reported as
//! an error [`Diagnostic`].

pub mod distribution;
pub mod fusion;
pub mod interchange;
pub mod parallel;
pub mod tiling;

pub use distribution::DistributionCheck;
pub use fusion::FusionCheck;
pub use interchange::InterchangeCheck;
pub use parallel::ParallelizeCheck;
pub use tiling::{LoopCutCheck, TileCheck};

use crate::analysis::dependence::{AnalysisOptions, DataDependence, DependenceAnalysis};
use crate::analysis::direction::DirectionVector;
use crate::ir::ast::Stmt;
use crate::ir::loops::{is_counted_loop, LiteralBounds, LoopInfo};
use crate::utils::errors::Diagnostic;
use log::debug;

/// Diagnostics gathered by a check.
#[derive(Debug, Clone, Default)]
pub struct CheckStatus {
    diagnostics: Vec<Diagnostic>,
}

impl CheckStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// True if no error was reported.
    pub fn is_ok(&self) -> bool {
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// A legality check on a single `for` statement.
pub trait LoopCheck {
    /// Name of the transformation, for messages.
    fn name(&self) -> &str;

    /// Structural preconditions. The default requires a counted loop.
    fn loop_form_check(&self, stmt: &Stmt, status: &mut CheckStatus) {
        require_counted_loop(self.name(), stmt, status);
    }

    /// Dependence-based legality, given the analysis of the loop's body.
    fn dependence_check(&self, stmt: &Stmt, analysis: &DependenceAnalysis, status: &mut CheckStatus);

    /// Run both phases. The dependence phase is skipped when the form
    /// check already failed.
    fn run(&self, stmt: &Stmt, options: &AnalysisOptions<'_>) -> CheckStatus {
        let mut status = CheckStatus::new();
        self.loop_form_check(stmt, &mut status);
        if status.has_errors() {
            return status;
        }
        match DependenceAnalysis::for_loop(stmt, options) {
            Ok(analysis) => self.dependence_check(stmt, &analysis, &mut status),
            Err(err) => status.add(
                err.to_diagnostic()
                    .with_note(format!("{} requires a dependence analysis of the loop body", self.name())),
            ),
        }
        debug!("{} check: {} diagnostics", self.name(), status.diagnostics().len());
        status
    }
}

/// Report an error unless `stmt` is a counted `for` loop.
pub(crate) fn require_counted_loop(name: &str, stmt: &Stmt, status: &mut CheckStatus) -> bool {
    let counted = stmt.as_for().map_or(false, is_counted_loop);
    if !counted {
        status.add(
            Diagnostic::error(format!("{}: statement is not a counted for loop", name))
                .with_span(stmt.span)
                .with_suggestion("use `for (i = lb; i < ub; i += c)` with a positive constant c"),
        );
    }
    counted
}

/// Counted-loop information with literal bounds, for shape checks.
pub(crate) fn loop_info(stmt: &Stmt) -> Option<LoopInfo> {
    LoopInfo::inspect(stmt, &LiteralBounds)
}

/// One error listing every offending dependence.
pub(crate) fn dependence_error<'d>(
    message: String,
    stmt: &Stmt,
    offending: impl IntoIterator<Item = &'d DataDependence>,
) -> Diagnostic {
    offending
        .into_iter()
        .fold(Diagnostic::error(message).with_span(stmt.span), |d, dep| d.with_note(dep.describe()))
}

/// True unless the first non-`=` entry is `>` or `>=`.
pub fn is_forward(vector: &DirectionVector) -> bool {
    vector.is_forward()
}

/// Copy of `vector` with positions `i` and `j` exchanged.
pub fn swap(vector: &DirectionVector, i: usize, j: usize) -> DirectionVector {
    vector.swapped(i, j)
}

/// Interchanging loops `i` and `j` is legal if no forward vector becomes
/// backward. Vectors too short to have both positions are unaffected.
pub fn is_interchange_legal(deps: &[DataDependence], i: usize, j: usize) -> bool {
    deps.iter()
        .map(|d| &d.direction)
        .filter(|v| v.len() > i.max(j))
        .all(|v| !is_forward(v) || is_forward(&swap(v, i, j)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::direction::Direction::*;

    fn v(d: Vec<crate::analysis::direction::Direction>) -> DirectionVector {
        DirectionVector::new(d)
    }

    #[test]
    fn test_is_forward() {
        assert!(is_forward(&v(vec![Eq, Lt])));
        assert!(is_forward(&v(vec![Any, Gt])));
        assert!(is_forward(&v(vec![Eq, Eq])));
        assert!(!is_forward(&v(vec![Eq, Gt])));
        assert!(!is_forward(&v(vec![Ge, Lt])));
    }

    #[test]
    fn test_swap() {
        assert_eq!(swap(&v(vec![Lt, Gt, Eq]), 0, 1), v(vec![Gt, Lt, Eq]));
    }

    #[test]
    fn test_status() {
        let mut status = CheckStatus::new();
        assert!(status.is_ok());
        status.add(Diagnostic::warning("just so you know"));
        assert!(status.is_ok());
        status.add(Diagnostic::error("no"));
        assert!(!status.is_ok());
        assert_eq!(status.errors().count(), 1);
    }

    #[test]
    fn test_form_check_rejects_non_loops() {
        let mut status = CheckStatus::new();
        assert!(!require_counted_loop("tile", &Stmt::new(crate::ir::ast::StmtKind::Null), &mut status));
        assert!(status.has_errors());
    }
}
