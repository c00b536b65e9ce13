//! Counted-loop inspection and loop bounds.
//!
//! A `for` statement is *counted* when its header has the shape
//!
//! ```text
//! for (i = init; i < bound; i++)      // or i <= bound
//!                           ++i
//!                           i += c    // c a positive constant
//!                           i = i + c
//! ```
//!
//! with integer-valued `init` and `bound`. Only counted loops take part in
//! dependence testing; their bounds come from a [`LoopBoundsProvider`].

use crate::ir::ast::{AssignOp, BinaryOp, Expr, ExprKind, ForLoop, NodeId, Stmt, StmtKind, UnaryOp};
use crate::utils::intern::Symbol;
use crate::utils::location::Span;
use std::collections::HashMap;

/// A counted loop as seen by the dependence analysis.
///
/// Two `LoopInfo`s are equal when they describe the same statement.
#[derive(Debug, Clone)]
pub struct LoopInfo {
    /// The `for` statement
    pub id: NodeId,
    /// Index variable
    pub index: Symbol,
    /// Lower bound, if it evaluates to a constant
    pub lower: Option<i64>,
    /// Inclusive upper bound, if it evaluates to a constant
    pub upper: Option<i64>,
    /// Step added to the index on every iteration
    pub factor: i64,
    /// Location of the `for` statement
    pub span: Span,
}

impl PartialEq for LoopInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LoopInfo {}

impl LoopInfo {
    /// Inspect a `for` statement. Returns `None` for anything that is not a
    /// counted loop.
    pub fn inspect(stmt: &Stmt, bounds: &dyn LoopBoundsProvider) -> Option<LoopInfo> {
        let header = stmt.as_for()?;
        let factor = counted_loop_factor(header)?;
        Some(LoopInfo {
            id: stmt.id,
            index: header.index,
            lower: bounds.lower_bound(header),
            upper: bounds.inclusive_upper_bound(header),
            factor,
            span: stmt.span,
        })
    }
}

/// Check whether a loop header is counted.
pub fn is_counted_loop(header: &ForLoop) -> bool {
    counted_loop_factor(header).is_some()
}

/// Iteration factor of a counted loop header.
fn counted_loop_factor(header: &ForLoop) -> Option<i64> {
    if !is_integer_expression(&header.init) {
        return None;
    }
    let (op, bound) = upper_bound_expression(header)?;
    if !matches!(op, BinaryOp::Lt | BinaryOp::Le) || !is_bound_expression(bound, header.index) {
        return None;
    }
    increment_step(&header.increment, header.index)
}

/// The comparison operator and bound of `index < bound` / `index <= bound`.
fn upper_bound_expression(header: &ForLoop) -> Option<(BinaryOp, &Expr)> {
    match &header.condition.ungrouped().kind {
        ExprKind::Binary { op, left, right } if left.ungrouped().as_variable() == Some(header.index) => {
            Some((*op, right.as_ref()))
        }
        _ => None,
    }
}

/// Positive step of `i++`, `++i`, `i += c` or `i = i + c`.
fn increment_step(increment: &Expr, index: Symbol) -> Option<i64> {
    let is_index = |e: &Expr| e.ungrouped().as_variable() == Some(index);
    let step = match &increment.ungrouped().kind {
        ExprKind::Unary { op: UnaryOp::PostInc | UnaryOp::PreInc, operand } if is_index(operand) => 1,
        ExprKind::Assign { op: AssignOp::AddAssign, target, value } if is_index(target) => {
            int_literal(value)?
        }
        ExprKind::Assign { op: AssignOp::Assign, target, value } if is_index(target) => {
            match &value.ungrouped().kind {
                ExprKind::Binary { op: BinaryOp::Add, left, right } if is_index(left) => int_literal(right)?,
                ExprKind::Binary { op: BinaryOp::Add, left, right } if is_index(right) => int_literal(left)?,
                _ => return None,
            }
        }
        _ => return None,
    };
    (step > 0).then_some(step)
}

fn int_literal(expr: &Expr) -> Option<i64> {
    match &expr.ungrouped().kind {
        ExprKind::IntLiteral(v) => Some(*v),
        _ => None,
    }
}

/// Integer literals, variables and field references combined with integer
/// arithmetic.
fn is_integer_expression(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::IntLiteral(_) | ExprKind::Variable(_) => true,
        ExprKind::FieldReference { .. } => expr.simple_field_reference().is_some(),
        ExprKind::Binary { op, left, right } => {
            matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod)
                && is_integer_expression(left)
                && is_integer_expression(right)
        }
        ExprKind::Unary { op: UnaryOp::Neg | UnaryOp::Plus, operand } => is_integer_expression(operand),
        ExprKind::Grouped(inner) => is_integer_expression(inner),
        _ => false,
    }
}

/// A loop bound may not mention the index itself.
fn is_bound_expression(expr: &Expr, index: Symbol) -> bool {
    struct MentionsIndex(Symbol, bool);
    impl crate::ir::ast::AstVisitor for MentionsIndex {
        fn visit_expr(&mut self, expr: &Expr) {
            if expr.as_variable() == Some(self.0) {
                self.1 = true;
            }
            crate::ir::ast::walk_expr(self, expr);
        }
    }
    let mut finder = MentionsIndex(index, false);
    crate::ir::ast::AstVisitor::visit_expr(&mut finder, expr);
    is_integer_expression(expr) && !finder.1
}

/// Supplies integer values for loop bound expressions.
///
/// Returning `None` means "unknown"; the analysis then substitutes the
/// unbounded sentinels.
pub trait LoopBoundsProvider {
    /// Evaluate an integer expression.
    fn evaluate(&self, expr: &Expr) -> Option<i64>;

    /// Value the index starts at.
    fn lower_bound(&self, header: &ForLoop) -> Option<i64> {
        self.evaluate(&header.init)
    }

    /// Largest value the index takes (`bound - 1` for `<`).
    fn inclusive_upper_bound(&self, header: &ForLoop) -> Option<i64> {
        let (op, bound) = upper_bound_expression(header)?;
        let value = self.evaluate(bound)?;
        match op {
            BinaryOp::Lt => value.checked_sub(1),
            _ => Some(value),
        }
    }
}

/// Constant-folds integer literal arithmetic. Any variable makes the
/// expression unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralBounds;

impl LoopBoundsProvider for LiteralBounds {
    fn evaluate(&self, expr: &Expr) -> Option<i64> {
        fold(expr, &|_| None)
    }
}

/// Constant folding with caller-supplied values for named constants.
/// Field references are looked up as `"owner.field"`.
#[derive(Debug, Clone, Default)]
pub struct KnownConstants {
    values: HashMap<String, i64>,
}

impl KnownConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a named value.
    pub fn with(mut self, name: &str, value: i64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: i64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }
}

impl LoopBoundsProvider for KnownConstants {
    fn evaluate(&self, expr: &Expr) -> Option<i64> {
        fold(expr, &|leaf| match &leaf.kind {
            ExprKind::Variable(name) => self.get(&name.as_string()),
            ExprKind::FieldReference { .. } => {
                let (owner, field) = leaf.simple_field_reference()?;
                self.get(&format!("{}.{}", owner, field))
            }
            _ => None,
        })
    }
}

fn fold(expr: &Expr, leaf: &dyn Fn(&Expr) -> Option<i64>) -> Option<i64> {
    match &expr.kind {
        ExprKind::IntLiteral(v) => Some(*v),
        ExprKind::Variable(_) | ExprKind::FieldReference { .. } => leaf(expr),
        ExprKind::Grouped(inner) => fold(inner, leaf),
        ExprKind::Unary { op: UnaryOp::Neg, operand } => fold(operand, leaf)?.checked_neg(),
        ExprKind::Unary { op: UnaryOp::Plus, operand } => fold(operand, leaf),
        ExprKind::Binary { op, left, right } => {
            let l = fold(left, leaf)?;
            let r = fold(right, leaf)?;
            match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Sub => l.checked_sub(r),
                BinaryOp::Mul => l.checked_mul(r),
                BinaryOp::Div => l.checked_div(r),
                BinaryOp::Mod => l.checked_rem(r),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Headers of the perfect loop nest rooted at `stmt`, outermost first.
///
/// A nest continues while a loop body is either another `for` statement or
/// a compound statement holding exactly one `for` statement.
pub fn perfectly_nested_loops(stmt: &Stmt) -> Vec<&Stmt> {
    let mut headers = Vec::new();
    let mut current = stmt;
    while let Some(header) = current.as_for() {
        headers.push(current);
        match single_nested_loop(&header.body) {
            Some(next) => current = next,
            None => break,
        }
    }
    headers
}

/// Body of the innermost loop of the perfect nest rooted at `stmt`.
pub fn innermost_loop_body(stmt: &Stmt) -> Option<&Stmt> {
    let innermost = perfectly_nested_loops(stmt).pop()?;
    innermost.as_for().map(|header| header.body.as_ref())
}

fn single_nested_loop(body: &Stmt) -> Option<&Stmt> {
    match &body.kind {
        StmtKind::For(_) => Some(body),
        StmtKind::Compound(stmts) if stmts.len() == 1 && stmts[0].as_for().is_some() => Some(&stmts[0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::Declarator;

    fn header(stmt: &Stmt) -> &ForLoop {
        stmt.as_for().unwrap()
    }

    #[test]
    fn test_simple_counted_loop() {
        let stmt = Stmt::for_loop("i", 0, 10, Stmt::new(StmtKind::Null));
        let info = LoopInfo::inspect(&stmt, &LiteralBounds).unwrap();
        assert_eq!(info.lower, Some(0));
        assert_eq!(info.upper, Some(9));
        assert_eq!(info.factor, 1);
        assert_eq!(info.index.as_string(), "i");
    }

    #[test]
    fn test_inclusive_bound_and_step() {
        let stmt = Stmt::counted_loop("i", Expr::int(1), BinaryOp::Le, Expr::int(100), 4, Stmt::new(StmtKind::Null));
        let info = LoopInfo::inspect(&stmt, &LiteralBounds).unwrap();
        assert_eq!(info.upper, Some(100));
        assert_eq!(info.factor, 4);
    }

    #[test]
    fn test_i_equals_i_plus_c() {
        let mut stmt = Stmt::for_loop("k", 0, 8, Stmt::new(StmtKind::Null));
        if let StmtKind::For(h) = &mut stmt.kind {
            h.increment = Expr::assign(Expr::var("k"), Expr::add(Expr::var("k"), Expr::int(2)));
        }
        assert_eq!(LoopInfo::inspect(&stmt, &LiteralBounds).unwrap().factor, 2);
    }

    #[test]
    fn test_uncounted_forms() {
        let body = Stmt::new(StmtKind::Null);
        // i > 0
        let mut down = Stmt::counted_loop("i", Expr::int(10), BinaryOp::Gt, Expr::int(0), 1, body.clone());
        assert!(LoopInfo::inspect(&down, &LiteralBounds).is_none());
        // i--
        if let StmtKind::For(h) = &mut down.kind {
            h.condition = Expr::binary(BinaryOp::Lt, Expr::var("i"), Expr::int(10));
            h.increment = Expr::unary(UnaryOp::PostDec, Expr::var("i"));
        }
        assert!(LoopInfo::inspect(&down, &LiteralBounds).is_none());
        // i < f(n)
        let call = Stmt::counted_loop("i", Expr::int(0), BinaryOp::Lt, Expr::call("f", vec![]), 1, body.clone());
        assert!(!is_counted_loop(header(&call)));
        // i < i + 1
        let selfref = Stmt::counted_loop(
            "i",
            Expr::int(0),
            BinaryOp::Lt,
            Expr::add(Expr::var("i"), Expr::int(1)),
            1,
            body,
        );
        assert!(!is_counted_loop(header(&selfref)));
    }

    #[test]
    fn test_symbolic_bound() {
        let stmt = Stmt::counted_loop("i", Expr::int(0), BinaryOp::Lt, Expr::var("n"), 1, Stmt::new(StmtKind::Null));
        let unknown = LoopInfo::inspect(&stmt, &LiteralBounds).unwrap();
        assert_eq!(unknown.upper, None);

        let known = KnownConstants::new().with("n", 64);
        assert_eq!(LoopInfo::inspect(&stmt, &known).unwrap().upper, Some(63));
    }

    #[test]
    fn test_field_bound() {
        let stmt = Stmt::counted_loop(
            "i",
            Expr::int(0),
            BinaryOp::Le,
            Expr::field(Expr::var("grid"), "n"),
            1,
            Stmt::new(StmtKind::Null),
        );
        let known = KnownConstants::new().with("grid.n", 7);
        assert_eq!(known.inclusive_upper_bound(header(&stmt)), Some(7));
    }

    #[test]
    fn test_folding() {
        let e = Expr::sub(Expr::mul(Expr::int(4), Expr::int(5)), Expr::neg(Expr::int(2)));
        assert_eq!(LiteralBounds.evaluate(&e), Some(22));
        let div0 = Expr::binary(BinaryOp::Div, Expr::int(1), Expr::int(0));
        assert_eq!(LiteralBounds.evaluate(&div0), None);
        let overflow = Expr::mul(Expr::int(i64::MAX), Expr::int(2));
        assert_eq!(LiteralBounds.evaluate(&overflow), None);
    }

    #[test]
    fn test_perfect_nest() {
        let inner = Stmt::for_loop("j", 0, 4, Stmt::assign(Expr::var("x"), Expr::int(1)));
        let middle = Stmt::for_loop("i", 0, 4, Stmt::compound(vec![inner]));
        let outer = Stmt::for_loop("k", 0, 4, middle);
        let nest = perfectly_nested_loops(&outer);
        assert_eq!(nest.len(), 3);
        assert_eq!(header(nest[2]).index.as_string(), "j");
        assert!(matches!(innermost_loop_body(&outer).unwrap().kind, StmtKind::Expression(_)));

        let imperfect = Stmt::for_loop(
            "i",
            0,
            4,
            Stmt::compound(vec![
                Stmt::decl(vec![Declarator::scalar("t")]),
                Stmt::for_loop("j", 0, 4, Stmt::new(StmtKind::Null)),
            ]),
        );
        assert_eq!(perfectly_nested_loops(&imperfect).len(), 1);
        assert!(perfectly_nested_loops(&Stmt::new(StmtKind::Null)).is_empty());
    }
}
