//! Loop distribution legality.
//!
//! Distribution splits a loop over `S1; S2; ...` into one loop per
//! statement, so every instance of `S1` runs before any instance of `S2`.
//! A dependence carried by the loop from a later statement back to an
//! earlier one would be reversed.

use crate::analysis::dependence::{DependenceAnalysis, DependenceSet};
use crate::ir::ast::{walk_stmt, AstVisitor, NodeId, Stmt, StmtKind};
use crate::transform::{dependence_error, require_counted_loop, CheckStatus, LoopCheck};
use crate::utils::errors::Diagnostic;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionCheck;

impl DistributionCheck {
    pub fn new() -> Self {
        Self
    }
}

impl LoopCheck for DistributionCheck {
    fn name(&self) -> &str {
        "distribute"
    }

    fn loop_form_check(&self, stmt: &Stmt, status: &mut CheckStatus) {
        if !require_counted_loop(self.name(), stmt, status) {
            return;
        }
        let splittable = stmt
            .as_for()
            .map_or(false, |h| matches!(&h.body.kind, StmtKind::Compound(s) if s.len() >= 2));
        if !splittable {
            status.add(
                Diagnostic::error("distribute: loop body must be a block of at least two statements")
                    .with_span(stmt.span),
            );
        }
    }

    fn dependence_check(&self, stmt: &Stmt, analysis: &DependenceAnalysis, status: &mut CheckStatus) {
        let Some(header) = stmt.as_for() else {
            return;
        };
        let positions = top_level_positions(header.body.statements());
        let position = |id: &NodeId| positions.get(id).copied();
        let backward: Vec<_> = analysis
            .dependences()
            .iter()
            .filter(|d| d.level() == 1)
            .filter(|d| match (position(&d.source.statement.id), position(&d.sink.statement.id)) {
                (Some(src), Some(dst)) => src > dst,
                _ => false,
            })
            .collect();
        if !backward.is_empty() {
            status.add(dependence_error(
                "loop carries a dependence from a later statement to an earlier one".to_string(),
                stmt,
                backward,
            ));
        }
    }
}

/// Index of the top-level statement containing each nested statement.
fn top_level_positions(stmts: &[Stmt]) -> HashMap<NodeId, usize> {
    struct Ids<'m> {
        position: usize,
        map: &'m mut HashMap<NodeId, usize>,
    }

    impl AstVisitor for Ids<'_> {
        fn visit_stmt(&mut self, stmt: &Stmt) {
            self.map.insert(stmt.id, self.position);
            walk_stmt(self, stmt);
        }
    }

    let mut map = HashMap::new();
    for (position, stmt) in stmts.iter().enumerate() {
        Ids { position, map: &mut map }.visit_stmt(stmt);
    }
    map
}
