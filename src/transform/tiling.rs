//! Tiling and loop-cut legality.
//!
//! Tiling (also called blocking) splits a loop into a loop over tiles and
//! a loop within each tile:
//! ```text
//! for i = 0 to N:                  for ii = 0 to N step W:
//!   A[i] = ...             ==>       for i = ii to min(ii + W, N):
//!                                      A[i] = ...
//! ```
//! Loop cutting is the one-dimensional case with a fixed factor. Both
//! reorder iterations of the original loop across tiles, so neither is
//! allowed when that loop carries a dependence.

use crate::analysis::dependence::{DependenceAnalysis, DependenceSet};
use crate::ir::ast::Stmt;
use crate::transform::{dependence_error, loop_info, require_counted_loop, CheckStatus, LoopCheck};
use crate::utils::errors::Diagnostic;

/// Rectangular tiling with the given tile sizes.
#[derive(Debug, Clone, Copy)]
pub struct TileCheck {
    pub width: i64,
    pub height: i64,
}

impl TileCheck {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// One-row tiles of `width` iterations.
    pub fn strided(width: i64) -> Self {
        Self::new(width, 1)
    }
}

impl LoopCheck for TileCheck {
    fn name(&self) -> &str {
        "tile"
    }

    fn loop_form_check(&self, stmt: &Stmt, status: &mut CheckStatus) {
        if self.width < 1 || self.height < 1 {
            status.add(
                Diagnostic::error(format!("invalid tile size {}x{}", self.width, self.height))
                    .with_span(stmt.span)
                    .with_suggestion("tile sizes must be at least 1"),
            );
            return;
        }
        require_counted_loop(self.name(), stmt, status);
    }

    fn dependence_check(&self, stmt: &Stmt, analysis: &DependenceAnalysis, status: &mut CheckStatus) {
        reject_carried(self.name(), stmt, analysis, status);
    }
}

/// Cutting a loop into chunks of `factor` iterations.
#[derive(Debug, Clone, Copy)]
pub struct LoopCutCheck {
    pub factor: i64,
}

impl LoopCutCheck {
    pub fn new(factor: i64) -> Self {
        Self { factor }
    }
}

impl LoopCheck for LoopCutCheck {
    fn name(&self) -> &str {
        "cut"
    }

    fn loop_form_check(&self, stmt: &Stmt, status: &mut CheckStatus) {
        if !require_counted_loop(self.name(), stmt, status) {
            return;
        }
        let Some(info) = loop_info(stmt) else {
            return;
        };
        let step = info.factor;
        if self.factor <= 0 || self.factor % step != 0 || self.factor <= step {
            status.add(
                Diagnostic::error(format!("invalid cut factor {}", self.factor))
                    .with_span(stmt.span)
                    .with_note(format!("the loop advances by {} per iteration", step))
                    .with_suggestion(format!("use a multiple of {} greater than {}", step, step)),
            );
        }
    }

    fn dependence_check(&self, stmt: &Stmt, analysis: &DependenceAnalysis, status: &mut CheckStatus) {
        reject_carried(self.name(), stmt, analysis, status);
    }
}

fn reject_carried(name: &str, stmt: &Stmt, analysis: &DependenceAnalysis, status: &mut CheckStatus) {
    if analysis.has_level1_carried_dependence() {
        status.add(dependence_error(
            format!("{}: loop carries a dependence", name),
            stmt,
            analysis.dependences().iter().filter(|d| d.level() == 1),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dependence::AnalysisOptions;
    use crate::ir::ast::{BinaryOp, Expr};

    fn copy_loop(step: i64) -> Stmt {
        let body = Stmt::assign(Expr::index("a", vec![Expr::var("i")]), Expr::index("b", vec![Expr::var("i")])).at(2);
        Stmt::counted_loop("i", Expr::int(0), BinaryOp::Lt, Expr::int(64), step, body).spanning(1, 2)
    }

    fn recurrence_loop() -> Stmt {
        let body = Stmt::assign(
            Expr::index("a", vec![Expr::var("i")]),
            Expr::index("a", vec![Expr::sub(Expr::var("i"), Expr::int(1))]),
        )
        .at(2);
        Stmt::for_loop("i", 1, 64, body).spanning(1, 2)
    }

    #[test]
    fn test_tiling_legal() {
        let options = AnalysisOptions::default();
        assert!(TileCheck::new(8, 8).run(&copy_loop(1), &options).is_ok());
        assert!(TileCheck::strided(4).run(&copy_loop(1), &options).is_ok());
    }

    #[test]
    fn test_tiling_illegal_carried_dep() {
        let status = TileCheck::new(8, 8).run(&recurrence_loop(), &AnalysisOptions::default());
        assert!(!status.is_ok());
    }

    #[test]
    fn test_tile_sizes_must_be_positive() {
        let status = TileCheck::new(0, 4).run(&copy_loop(1), &AnalysisOptions::default());
        assert!(!status.is_ok());
        assert_eq!(TileCheck::strided(3).height, 1);
    }

    #[test]
    fn test_cut_factor() {
        let options = AnalysisOptions::default();
        assert!(LoopCutCheck::new(8).run(&copy_loop(2), &options).is_ok());
        for bad in [0, -4, 2, 3] {
            assert!(!LoopCutCheck::new(bad).run(&copy_loop(2), &options).is_ok(), "factor {}", bad);
        }
        assert!(!LoopCutCheck::new(4).run(&recurrence_loop(), &options).is_ok());
    }
}
