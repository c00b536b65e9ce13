//! Parallelization legality.
//!
//! Iterations of a loop may run concurrently only if the loop carries no
//! dependence, i.e. no direction vector has its first non-`=` entry in
//! position 0.

use crate::analysis::dependence::{DependenceAnalysis, DependenceSet};
use crate::ir::ast::Stmt;
use crate::transform::{dependence_error, CheckStatus, LoopCheck};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelizeCheck;

impl ParallelizeCheck {
    pub fn new() -> Self {
        Self
    }
}

impl LoopCheck for ParallelizeCheck {
    fn name(&self) -> &str {
        "parallelize"
    }

    fn dependence_check(&self, stmt: &Stmt, analysis: &DependenceAnalysis, status: &mut CheckStatus) {
        if analysis.has_level1_carried_dependence() {
            status.add(dependence_error(
                "loop carries a dependence and cannot be parallelized".to_string(),
                stmt,
                analysis.dependences().iter().filter(|d| d.level() == 1),
            ));
        }
    }
}
