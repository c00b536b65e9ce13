//! Dependence analysis passes.
//!
//! Bottom-up: `linear` decomposes subscripts, `access` collects variable
//! accesses, `fourier_motzkin` decides feasibility of constraint systems,
//! `dependence_tester` and `hierarchy` turn a pair of accesses into a set
//! of direction vectors, and `dependence` runs all of it over every pair.

pub mod access;
pub mod address_taken;
pub mod cancel;
pub mod dependence;
pub mod dependence_tester;
pub mod direction;
pub mod fourier_motzkin;
pub mod hierarchy;
pub mod linear;

pub use access::{is_whitelisted, AccessCollector, AccessShape, DeclId, StmtRef, VariableAccess};
pub use address_taken::{AddressTakenAnalysis, AddressTakenCache};
pub use cancel::CancellationToken;
pub use dependence::{
    AnalysisOptions, DataDependence, DependenceAnalysis, DependenceRecord, DependenceReport, DependenceSet,
    DependenceSummary, DependenceType, FusionDependenceAnalysis,
};
pub use dependence_tester::FourierMotzkinDependenceTester;
pub use direction::{Direction, DirectionVector};
pub use fourier_motzkin::{FourierMotzkinEliminator, IntegerVerdict};
pub use hierarchy::DirectionHierarchyTester;
pub use linear::LinearExpression;
