//! Utility modules shared by the analysis passes.
//!
//! - Error types and diagnostics
//! - The dense constraint matrix used by the eliminator
//! - Source location tracking
//! - Symbol interning

pub mod errors;
pub mod intern;
pub mod location;
pub mod matrix;

// Re-exports
pub use errors::*;
pub use intern::{intern, resolve, Symbol};
pub use location::{SourceLocation, Span};
pub use matrix::Matrix;
