//! Loop fusion legality.
//!
//! Two adjacent loops with identical headers can be merged into one loop
//! running both bodies per iteration. That is illegal when a dependence
//! from an access in the second loop reaches back to an access in the
//! first loop in a later iteration: after fusion the second body would run
//! before the first body it used to follow.

use crate::analysis::dependence::{
    AnalysisOptions, DataDependence, DependenceSet, DependenceType, FusionDependenceAnalysis,
};
use crate::analysis::direction::Direction;
use crate::ir::ast::Stmt;
use crate::ir::loops::LoopInfo;
use crate::transform::{dependence_error, require_counted_loop, CheckStatus};
use crate::utils::errors::Diagnostic;
use log::debug;

/// Fusion of a loop with the statement that follows it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FusionCheck;

impl FusionCheck {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, first: &Stmt, second: &Stmt, options: &AnalysisOptions<'_>) -> CheckStatus {
        let mut status = CheckStatus::new();
        if !self.headers_match(first, second, options, &mut status) {
            return status;
        }
        match FusionDependenceAnalysis::new(first, second, options) {
            Ok(analysis) => {
                let preventing: Vec<_> =
                    analysis.dependences().iter().filter(|d| is_fusion_preventing(d)).collect();
                debug!("fusion: {} fusion-preventing dependences", preventing.len());
                if !preventing.is_empty() {
                    status.add(dependence_error("loops cannot be fused".to_string(), second, preventing));
                }
            }
            Err(err) => status.add(err.to_diagnostic().with_note("fusion requires a dependence analysis of both loops")),
        }
        status
    }

    fn headers_match(
        &self,
        first: &Stmt,
        second: &Stmt,
        options: &AnalysisOptions<'_>,
        status: &mut CheckStatus,
    ) -> bool {
        if !require_counted_loop("fusion", first, status) {
            return false;
        }
        if second.as_for().is_none() {
            status.add(Diagnostic::error("fusion: the next statement is not a for loop").with_span(second.span));
            return false;
        }
        if !require_counted_loop("fusion", second, status) {
            return false;
        }
        let bounds = options.bounds_provider();
        let (Some(a), Some(b)) = (LoopInfo::inspect(first, bounds), LoopInfo::inspect(second, bounds)) else {
            return false;
        };
        let same = a.index == b.index
            && a.lower.is_some()
            && a.lower == b.lower
            && a.upper.is_some()
            && a.upper == b.upper
            && a.factor == b.factor;
        if !same {
            status.add(
                Diagnostic::error("fusion: loop headers differ")
                    .with_span(first.span.merge(&second.span))
                    .with_note(format!("first loop: {}", header_summary(&a)))
                    .with_note(format!("second loop: {}", header_summary(&b))),
            );
        }
        same
    }
}

/// A dependence that fusion would reverse: carried, between the two loops,
/// originating in the second loop and pointing forward at its level.
pub fn is_fusion_preventing(dep: &DataDependence) -> bool {
    if !dep.is_loop_carried() || dep.dependence_type == DependenceType::Input {
        return false;
    }
    if dep.source.segment == dep.sink.segment || dep.source.segment != 1 {
        return false;
    }
    matches!(
        dep.direction.get(dep.level() - 1),
        Some(Direction::Lt | Direction::Le | Direction::Any)
    )
}

fn header_summary(info: &LoopInfo) -> String {
    let bound = |b: Option<i64>| b.map_or_else(|| "?".to_string(), |v| v.to_string());
    format!("{} in [{}, {}] step {}", info.index, bound(info.lower), bound(info.upper), info.factor)
}
