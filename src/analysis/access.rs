//! Variable accesses and the collector that finds them.
//!
//! The collector walks a statement sequence in source order and records one
//! [`VariableAccess`] per read or write of a variable, together with the
//! statement it belongs to and the chain of counted loops around it. Any
//! form it cannot model aborts collection with an [`UnsupportedConstruct`],
//! since a silently dropped access could hide a dependence.

use crate::analysis::address_taken::AddressTakenAnalysis;
use crate::analysis::dependence::DependenceType;
use crate::analysis::linear::LinearExpression;
use crate::ir::ast::{AssignOp, Declarator, Expr, ExprKind, Initializer, NodeId, Stmt, StmtKind, UnaryOp};
use crate::ir::loops::{LoopBoundsProvider, LoopInfo};
use crate::utils::errors::{AnalysisError, AnalysisResult, UnsupportedConstruct, UnsupportedKind};
use crate::utils::intern::Symbol;
use crate::utils::location::Span;
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt;

/// Math library functions known not to touch memory visible to the caller.
/// Each is also accepted with an `f` suffix.
pub const WHITELISTED_FUNCTIONS: &[&str] = &[
    "acos", "asin", "atan", "atan2", "cos", "cosh", "exp", "fabs", "fmax", "fmin", "log", "log10", "pow", "sin",
    "sinh", "sqrt", "tan", "tanh",
];

/// Check whether a call to `name` has no side effects on program variables.
pub fn is_whitelisted(name: &str) -> bool {
    WHITELISTED_FUNCTIONS
        .iter()
        .any(|&f| name == f || name.strip_suffix('f') == Some(f))
}

/// How a variable is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessShape {
    /// Whole-variable access
    Scalar,
    /// Element access with affine subscripts, outermost first
    Array(Vec<LinearExpression>),
    /// Element access with at least one non-affine subscript; compared as
    /// if it were a scalar
    NonAffineArray,
}

/// The statement an access belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StmtRef {
    pub id: NodeId,
    pub span: Span,
    pub is_declaration: bool,
}

impl StmtRef {
    pub fn of(stmt: &Stmt) -> Self {
        Self { id: stmt.id, span: stmt.span, is_declaration: stmt.is_declaration() }
    }

    /// First source line of the statement.
    pub fn line(&self) -> usize {
        self.span.start_line
    }
}

/// A declaration: the declared name and the statement declaring it. A
/// loop's own index is declared by the loop statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId {
    pub name: Symbol,
    pub node: NodeId,
}

/// One read or write of a variable.
#[derive(Debug, Clone)]
pub struct VariableAccess {
    /// Position in collection order; identifies the access
    pub ordinal: usize,
    pub is_write: bool,
    pub variable: Symbol,
    /// Innermost visible declaration of `variable`; `None` when it is
    /// declared outside the collected statements
    pub declaration: Option<DeclId>,
    pub shape: AccessShape,
    /// Innermost statement containing the access
    pub statement: StmtRef,
    /// Counted loops around the access, outermost first
    pub loops: Vec<LoopInfo>,
    /// Location of the accessed name
    pub span: Span,
    /// Which input sequence the access came from (fusion tags the two loop
    /// bodies 0 and 1)
    pub segment: usize,
}

impl PartialEq for VariableAccess {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal && self.segment == other.segment
    }
}

impl Eq for VariableAccess {}

impl VariableAccess {
    pub fn is_read(&self) -> bool {
        !self.is_write
    }

    /// Affine subscripts, or `None` for scalar-style accesses.
    pub fn subscripts(&self) -> Option<&[LinearExpression]> {
        match &self.shape {
            AccessShape::Array(subs) => Some(subs),
            _ => None,
        }
    }

    /// Scalars and non-affine array accesses are both compared without
    /// subscript information.
    pub fn is_scalar_access(&self) -> bool {
        self.subscripts().is_none()
    }

    pub fn refers_to_same_variable_as(&self, other: &VariableAccess) -> bool {
        self.variable == other.variable && self.declaration == other.declaration
    }

    pub fn num_enclosing_loops(&self) -> usize {
        self.loops.len()
    }

    /// Longest common prefix of the two loop chains.
    pub fn common_enclosing_loops(&self, other: &VariableAccess) -> &[LoopInfo] {
        let n = self
            .loops
            .iter()
            .zip(&other.loops)
            .take_while(|(a, b)| a == b)
            .count();
        &self.loops[..n]
    }

    pub fn is_in_common_loops_with(&self, other: &VariableAccess) -> bool {
        !self.common_enclosing_loops(other).is_empty()
    }

    /// True if this access's statement starts before the other's.
    pub fn enclosing_statement_lexically_precedes(&self, other: &VariableAccess) -> bool {
        self.statement.span.precedes(&other.statement.span)
    }

    /// Dependence type when this access is the source and `other` the sink.
    pub fn dependence_type_to(&self, other: &VariableAccess) -> DependenceType {
        DependenceType::classify(self.is_write, other.is_write)
    }

    /// Per subscript: `[constant, coefficient of vars[0], coefficient of vars[1], ...]`.
    /// Empty for scalar-style accesses.
    pub fn collect_coefficients(&self, vars: &[Symbol]) -> Vec<Vec<i64>> {
        self.subscripts()
            .unwrap_or_default()
            .iter()
            .map(|sub| {
                std::iter::once(sub.constant_coefficient())
                    .chain(vars.iter().map(|&v| sub.coefficient(v)))
                    .collect()
            })
            .collect()
    }

    /// Line of the enclosing statement.
    pub fn line(&self) -> usize {
        self.statement.line()
    }
}

impl fmt::Display for VariableAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", if self.is_write { "Write" } else { "Read" }, self.variable)?;
        match &self.shape {
            AccessShape::Scalar => {}
            AccessShape::Array(subs) => {
                for s in subs {
                    write!(f, "[{}]", s)?;
                }
            }
            AccessShape::NonAffineArray => write!(f, "[?]")?,
        }
        write!(f, " at line {}", self.line())
    }
}

/// Result of collecting accesses.
#[derive(Debug, Clone, Default)]
pub struct CollectedAccesses {
    pub accesses: Vec<VariableAccess>,
    /// Loop chain at every declaration made inside a loop (or as a loop's
    /// own index)
    pub loop_declarations: HashMap<DeclId, Vec<LoopInfo>>,
}

/// Walks statements and emits [`VariableAccess`] records in source order.
pub struct AccessCollector<'a> {
    bounds: &'a dyn LoopBoundsProvider,
    address_taken: Option<&'a AddressTakenAnalysis>,
    loops: Vec<LoopInfo>,
    /// Declarations per open block, innermost last
    scopes: Vec<Vec<DeclId>>,
    statement: Option<StmtRef>,
    segment: usize,
    out: CollectedAccesses,
}

impl<'a> AccessCollector<'a> {
    /// `context` is the chain of loops enclosing the statements that will be
    /// collected, outermost first.
    pub fn new(
        bounds: &'a dyn LoopBoundsProvider,
        address_taken: Option<&'a AddressTakenAnalysis>,
        context: Vec<LoopInfo>,
    ) -> Self {
        Self {
            bounds,
            address_taken,
            loops: context,
            scopes: vec![Vec::new()],
            statement: None,
            segment: 0,
            out: CollectedAccesses::default(),
        }
    }

    /// Tag subsequent accesses with `segment`.
    pub fn set_segment(&mut self, segment: usize) {
        self.segment = segment;
    }

    /// Declare `name`, declared by statement `node`, in the current scope at
    /// the current loop depth.
    pub fn declare_in_context(&mut self, name: Symbol, node: NodeId) {
        self.declare(name, node);
    }

    fn declare(&mut self, name: Symbol, node: NodeId) {
        let id = DeclId { name, node };
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(id);
        }
        if !self.loops.is_empty() {
            self.out.loop_declarations.insert(id, self.loops.clone());
        }
    }

    fn resolve(&self, name: Symbol) -> Option<DeclId> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|d| d.name == name)
            .copied()
    }

    pub fn collect_statements(&mut self, stmts: &[Stmt]) -> AnalysisResult<()> {
        for stmt in stmts {
            self.collect_statement(stmt)?;
        }
        Ok(())
    }

    pub fn finish(self) -> CollectedAccesses {
        debug!("collected {} variable accesses", self.out.accesses.len());
        self.out
    }

    fn collect_statement(&mut self, stmt: &Stmt) -> AnalysisResult<()> {
        let saved = self.statement.replace(StmtRef::of(stmt));
        let result = self.collect_statement_kind(stmt).map_err(|err| match err {
            AnalysisError::UnsupportedConstruct(mut construct) if construct.span.is_dummy() => {
                construct.span = stmt.span;
                AnalysisError::UnsupportedConstruct(construct)
            }
            other => other,
        });
        self.statement = saved;
        result
    }

    fn collect_statement_kind(&mut self, stmt: &Stmt) -> AnalysisResult<()> {
        match &stmt.kind {
            StmtKind::Declaration(decls) => {
                for d in decls {
                    self.collect_declarator(d, stmt.id, stmt.span)?;
                }
                Ok(())
            }
            StmtKind::Expression(expr) => self.collect_expression_statement(expr, stmt.span),
            StmtKind::For(header) => {
                let info = LoopInfo::inspect(stmt, self.bounds).ok_or_else(|| {
                    unsupported(UnsupportedKind::UncountedLoop, stmt.span, "loop is not a counted loop")
                })?;
                self.loops.push(info);
                self.scopes.push(Vec::new());
                if header.declares_index {
                    self.declare(header.index, stmt.id);
                }
                let result = self.collect_statement(&header.body);
                self.scopes.pop();
                self.loops.pop();
                result
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.collect_expression(condition)?;
                self.collect_statement(then_branch)?;
                match else_branch {
                    Some(e) => self.collect_statement(e),
                    None => Ok(()),
                }
            }
            StmtKind::While { condition, body } => {
                self.collect_expression(condition)?;
                self.collect_statement(body)
            }
            StmtKind::Switch { body, .. } => self.collect_statement(body),
            StmtKind::Case(expr) => self.collect_expression(expr),
            StmtKind::Compound(stmts) => {
                self.scopes.push(Vec::new());
                let result = self.collect_statements(stmts);
                self.scopes.pop();
                result
            }
            StmtKind::Default | StmtKind::Null | StmtKind::Break | StmtKind::Continue => Ok(()),
            StmtKind::Goto(label) => {
                Err(unsupported(UnsupportedKind::Goto, stmt.span, format!("goto {}", label)).into())
            }
            StmtKind::Return(_) => Err(unsupported(UnsupportedKind::Return, stmt.span, "return statement").into()),
            StmtKind::Unrecognized(text) => Err(unsupported(
                UnsupportedKind::Unrecognized,
                stmt.span,
                format!("unrecognized statement '{}'", text),
            )
            .into()),
        }
    }

    fn collect_declarator(&mut self, decl: &Declarator, node: NodeId, stmt_span: Span) -> AnalysisResult<()> {
        if decl.pointer {
            return Err(unsupported(
                UnsupportedKind::PointerDeclaration,
                stmt_span,
                format!("pointer declaration of '{}'", decl.name),
            )
            .into());
        }
        let span = if decl.span.is_dummy() { stmt_span } else { decl.span };
        self.declare(decl.name, node);
        self.push(true, decl.name, AccessShape::Scalar, span);
        match &decl.initializer {
            None => Ok(()),
            Some(Initializer::Expr(e)) => self.collect_expression(e),
            Some(Initializer::List(_)) => Err(unsupported(
                UnsupportedKind::InitializerList,
                stmt_span,
                format!("initializer list for '{}'", decl.name),
            )
            .into()),
        }
    }

    fn collect_expression_statement(&mut self, expr: &Expr, stmt_span: Span) -> AnalysisResult<()> {
        let expr = expr.ungrouped();
        match &expr.kind {
            ExprKind::Assign { op: AssignOp::Assign, target, value } => {
                self.collect_assignment_target(target)?;
                self.collect_expression(value)
            }
            ExprKind::Assign { target, value, .. } => {
                // x op= y writes and reads x
                self.collect_assignment_target(target)?;
                self.collect_expression(target)?;
                self.collect_expression(value)
            }
            ExprKind::Unary { op, operand } if op.is_increment() => {
                self.collect_expression(operand)?;
                self.collect_assignment_target(operand)
            }
            ExprKind::Call { .. } => self.collect_expression(expr),
            _ => Err(unsupported(
                UnsupportedKind::ExpressionStatement,
                stmt_span,
                "expression statement is not an assignment, increment or call",
            )
            .into()),
        }
    }

    fn collect_assignment_target(&mut self, target: &Expr) -> AnalysisResult<()> {
        match &target.kind {
            ExprKind::Variable(name) => {
                self.push(true, *name, AccessShape::Scalar, target.span);
                Ok(())
            }
            ExprKind::FieldReference { .. } => {
                let (owner, field) = self.field_reference(target)?;
                self.push(false, owner, AccessShape::Scalar, target.span);
                self.push(true, field, AccessShape::Scalar, target.span);
                Ok(())
            }
            ExprKind::ArrayAccess { .. } => self.collect_array_access(target, true),
            ExprKind::Grouped(inner) => self.collect_assignment_target(inner),
            ExprKind::Unary { op, operand } if op.is_increment() => {
                self.collect_expression(target)?;
                self.collect_assignment_target(operand)
            }
            _ => Err(unsupported(UnsupportedKind::Expression, target.span, "unsupported assignment target").into()),
        }
    }

    fn collect_expression(&mut self, expr: &Expr) -> AnalysisResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_) | ExprKind::StringLiteral(_) => Ok(()),
            ExprKind::Variable(name) => {
                self.push(false, *name, AccessShape::Scalar, expr.span);
                Ok(())
            }
            ExprKind::ArrayAccess { .. } => self.collect_array_access(expr, false),
            ExprKind::FieldReference { .. } => {
                let (owner, field) = self.field_reference(expr)?;
                self.push(false, owner, AccessShape::Scalar, expr.span);
                self.push(false, field, AccessShape::Scalar, expr.span);
                Ok(())
            }
            ExprKind::Binary { left, right, .. } => {
                self.collect_expression(left)?;
                self.collect_expression(right)
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg | UnaryOp::Plus | UnaryOp::Not | UnaryOp::BitNot | UnaryOp::Sizeof => {
                    self.collect_expression(operand)
                }
                UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                    self.collect_assignment_target(operand)?;
                    self.collect_expression(operand)
                }
                UnaryOp::AddressOf | UnaryOp::Deref => Err(unsupported(
                    UnsupportedKind::PointerOperation,
                    expr.span,
                    format!("pointer operator '{}'", op),
                )
                .into()),
            },
            ExprKind::Call { function, args } => self.collect_call(*function, args, expr.span),
            ExprKind::Ternary { condition, then_expr, else_expr } => {
                self.collect_expression(condition)?;
                self.collect_expression(then_expr)?;
                self.collect_expression(else_expr)
            }
            ExprKind::Grouped(inner) => self.collect_expression(inner),
            ExprKind::Assign { .. } => {
                Err(unsupported(UnsupportedKind::Expression, expr.span, "assignment used as a value").into())
            }
            ExprKind::Cast { .. } => Err(unsupported(UnsupportedKind::Expression, expr.span, "cast expression").into()),
            ExprKind::Comma(_) => Err(unsupported(UnsupportedKind::Expression, expr.span, "comma expression").into()),
            ExprKind::Unrecognized(text) => Err(unsupported(
                UnsupportedKind::Unrecognized,
                expr.span,
                format!("unrecognized expression '{}'", text),
            )
            .into()),
        }
    }

    fn collect_call(&mut self, function: Symbol, args: &[Expr], span: Span) -> AnalysisResult<()> {
        let name = function.as_string();
        if is_whitelisted(&name) {
            for arg in args {
                self.collect_expression(arg)?;
            }
            return Ok(());
        }
        let Some(analysis) = self.address_taken else {
            return Err(unsupported(
                UnsupportedKind::UnknownCall,
                span,
                format!("call to '{}' with no alias information", name),
            )
            .into());
        };
        // The callee may read or write anything whose address escaped,
        // and nothing else.
        for var in analysis.address_taken_variables() {
            self.push(false, var, AccessShape::Scalar, span);
            self.push(true, var, AccessShape::Scalar, span);
        }
        Ok(())
    }

    fn collect_array_access(&mut self, expr: &Expr, is_write: bool) -> AnalysisResult<()> {
        let (name, subscripts) = expr.array_access_parts().ok_or_else(|| {
            unsupported(UnsupportedKind::Expression, expr.span, "array base is not a variable")
        })?;
        let linear: Option<Vec<LinearExpression>> =
            subscripts.iter().map(|s| LinearExpression::from_expr(s)).collect();
        let shape = match linear {
            Some(subs) => AccessShape::Array(subs),
            None => {
                trace!("non-affine subscript on '{}' at {}", name, expr.span);
                AccessShape::NonAffineArray
            }
        };
        self.push(is_write, name, shape, expr.span);
        for s in subscripts {
            self.collect_expression(s)?;
        }
        Ok(())
    }

    /// Owner and `.field` key of a simple field reference.
    fn field_reference(&self, expr: &Expr) -> AnalysisResult<(Symbol, Symbol)> {
        let (owner, field) = expr.simple_field_reference().ok_or_else(|| {
            unsupported(UnsupportedKind::Expression, expr.span, "field reference through a non-variable owner")
        })?;
        Ok((owner, Symbol::from(format!(".{}", field).as_str())))
    }

    fn push(&mut self, is_write: bool, variable: Symbol, shape: AccessShape, span: Span) {
        let Some(statement) = self.statement else {
            return;
        };
        let access = VariableAccess {
            ordinal: self.out.accesses.len(),
            is_write,
            variable,
            declaration: self.resolve(variable),
            shape,
            statement,
            loops: self.loops.clone(),
            span: if span.is_dummy() { statement.span } else { span },
            segment: self.segment,
        };
        trace!("{}", access);
        self.out.accesses.push(access);
    }
}

fn unsupported(kind: UnsupportedKind, span: Span, message: impl Into<String>) -> UnsupportedConstruct {
    UnsupportedConstruct::new(kind, span, message)
}
