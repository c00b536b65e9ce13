//! # loopdep - Data-Dependence Analysis for Counted Loop Nests
//!
//! Given a block of C-like statements, loopdep finds every pair of accesses
//! to the same variable that may touch the same memory location, and the
//! loop-iteration directions under which they may do so. The result gates
//! loop transformations:
//! - Access collection with affine subscript decomposition
//! - Fourier-Motzkin elimination over the reals and the integers
//! - Direction-vector hierarchy search
//! - Legality checks (interchange, fusion, tiling, parallelization, distribution)
//!
//! ## Architecture
//!
//! ```text
//! Stmt IR → AccessCollector → pairwise driver → hierarchy → tester → eliminator
//!                                    ↓
//!                            Set<DataDependence> → LoopCheck
//! ```
//!
//! ## Example
//!
//! ```rust
//! use loopdep::prelude::*;
//!
//! // for (int i = 1; i < 100; i++) a[i] = a[i - 1] + 1;
//! let body = Stmt::assign(
//!     Expr::index("a", vec![Expr::var("i")]),
//!     Expr::add(Expr::index("a", vec![Expr::sub(Expr::var("i"), Expr::int(1))]), Expr::int(1)),
//! )
//! .at(2);
//! let nest = Stmt::for_loop("i", 1, 100, body).spanning(1, 2);
//!
//! let analysis = DependenceAnalysis::for_loop(&nest, &AnalysisOptions::default())?;
//! assert!(analysis.has_level1_carried_dependence());
//! assert!(!ParallelizeCheck::new().run(&nest, &AnalysisOptions::default()).is_ok());
//! # Ok::<(), loopdep::utils::errors::AnalysisError>(())
//! ```

#![warn(clippy::all)]

pub mod analysis;
pub mod ir;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::analysis::{
        AccessShape, AddressTakenAnalysis, AddressTakenCache, AnalysisOptions, CancellationToken, DataDependence,
        DependenceAnalysis, DependenceReport, DependenceSet, DependenceType, Direction, DirectionVector,
        FourierMotzkinEliminator, FusionDependenceAnalysis, VariableAccess,
    };
    pub use crate::ir::ast::*;
    pub use crate::ir::loops::{KnownConstants, LiteralBounds, LoopBoundsProvider, LoopInfo};
    pub use crate::transform::{
        CheckStatus, DistributionCheck, FusionCheck, InterchangeCheck, LoopCheck, LoopCutCheck, ParallelizeCheck,
        TileCheck,
    };
    pub use crate::utils::errors::*;
    pub use crate::utils::intern::Symbol;
    pub use crate::utils::location::Span;
    pub use crate::{analyze_block, AnalysisConfig};
}

use analysis::dependence::{AnalysisOptions, DependenceAnalysis};
use ir::ast::Stmt;
use utils::errors::AnalysisResult;

/// Configuration for a dependence analysis.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Decide feasibility over the integers (dark shadow) rather than the reals
    pub integer_solutions: bool,
    /// Row cap for the eliminator; exceeding it yields a conservative answer
    pub max_constraint_rows: usize,
    /// Drop loop-independent dependences of an access on itself
    pub drop_self_loop_independent: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            integer_solutions: true,
            max_constraint_rows: 4096,
            drop_self_loop_independent: true,
        }
    }
}

/// Analyze a statement block with the given configuration and no
/// injected collaborators.
pub fn analyze_block(stmts: &[Stmt], config: AnalysisConfig) -> AnalysisResult<DependenceAnalysis> {
    DependenceAnalysis::new(stmts, &AnalysisOptions::new(config))
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert!(config.integer_solutions);
        assert_eq!(config.max_constraint_rows, 4096);
        assert!(config.drop_self_loop_independent);
    }

    #[test]
    fn test_analyze_block() {
        let stmts = vec![ir::ast::Stmt::assign(ir::ast::Expr::var("x"), ir::ast::Expr::int(1)).at(1)];
        let analysis = analyze_block(&stmts, AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.variable_accesses().len(), 1);
    }
}
