//! Loop interchange legality.
//!
//! Interchange swaps the outermost loop of a perfect nest with the loop
//! `depth` levels below it:
//! ```text
//! for i = 0 to N:                for j = 0 to M:
//!   for j = 0 to M:       ==>      for i = 0 to N:
//!     A[i][j] = B[j][i]              A[i][j] = B[j][i]
//! ```
//! It is legal if every dependence direction vector that was forward stays
//! forward with entries 0 and `depth` exchanged.

use crate::analysis::dependence::{DependenceAnalysis, DependenceSet};
use crate::ir::ast::Stmt;
use crate::ir::loops::{is_counted_loop, perfectly_nested_loops};
use crate::transform::{dependence_error, is_forward, require_counted_loop, swap, CheckStatus, LoopCheck};
use crate::utils::errors::Diagnostic;

/// Interchange of the outermost loop with the loop at `depth`.
#[derive(Debug, Clone, Copy)]
pub struct InterchangeCheck {
    /// 0-based position of the inner loop in the perfect nest
    pub depth: usize,
}

impl InterchangeCheck {
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }
}

impl LoopCheck for InterchangeCheck {
    fn name(&self) -> &str {
        "interchange"
    }

    fn loop_form_check(&self, stmt: &Stmt, status: &mut CheckStatus) {
        if !require_counted_loop(self.name(), stmt, status) {
            return;
        }
        let nest = perfectly_nested_loops(stmt);
        if self.depth == 0 || self.depth >= nest.len() {
            status.add(
                Diagnostic::error(format!(
                    "interchange depth {} is outside the perfect loop nest (depth {})",
                    self.depth,
                    nest.len()
                ))
                .with_span(stmt.span),
            );
            return;
        }
        if let Some(inner) = nest.iter().find(|s| !s.as_for().map_or(false, is_counted_loop)) {
            status.add(Diagnostic::error("interchange: nested loop is not a counted loop").with_span(inner.span));
        }
    }

    fn dependence_check(&self, stmt: &Stmt, analysis: &DependenceAnalysis, status: &mut CheckStatus) {
        let offending: Vec<_> = analysis
            .dependences()
            .iter()
            .filter(|d| d.direction.len() > self.depth)
            .filter(|d| is_forward(&d.direction) && !is_forward(&swap(&d.direction, 0, self.depth)))
            .collect();
        if !offending.is_empty() {
            status.add(dependence_error(
                format!("interchange with loop at depth {} would reverse a dependence", self.depth),
                stmt,
                offending,
            ));
        }
    }
}
