//! Input representation for the analyzer.
//!
//! - `ast`: the statement/expression tree handed to the access collector
//! - `loops`: counted-loop recognition, loop bounds and perfect nests

pub mod ast;
pub mod loops;

pub use ast::{
    AssignOp, BinaryOp, Declarator, Expr, ExprKind, ForLoop, Function, Initializer, NodeId, Parameter, Stmt,
    StmtKind, UnaryOp,
};
pub use loops::{
    innermost_loop_body, is_counted_loop, perfectly_nested_loops, KnownConstants, LiteralBounds, LoopBoundsProvider,
    LoopInfo,
};
