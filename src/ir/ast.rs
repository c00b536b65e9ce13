//! Statement and expression tree consumed by the access collector.
//!
//! The tree is a closed set of C-like statement and expression forms. Forms
//! the analyzer cannot reason about still have a home (`Unrecognized`, `Goto`,
//! `Cast`, ...) so the collector can reject them with a located error instead
//! of silently skipping them.

use crate::utils::intern::Symbol;
use crate::utils::location::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A node ID for unique identification of statements and expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    /// Create a node ID with a given value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// A process-unique ID.
    pub fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A function definition. Only used as the unit the address-taken
/// analysis is computed (and cached) for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    #[serde(default = "NodeId::fresh")]
    pub id: NodeId,
    /// Function name
    pub name: String,
    /// Parameters
    #[serde(default)]
    pub params: Vec<Parameter>,
    /// Body statements
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, body: Vec<Stmt>) -> Self {
        Self {
            id: NodeId::fresh(),
            name: name.into(),
            params,
            body,
            span: Span::dummy(),
        }
    }
}

/// A function parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: Symbol,
    /// Declared with a pointer operator
    #[serde(default)]
    pub pointer: bool,
}

impl Parameter {
    pub fn new(name: &str, pointer: bool) -> Self {
        Self { name: Symbol::from(name), pointer }
    }
}

/// A statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default = "NodeId::fresh")]
    pub id: NodeId,
    /// The kind of statement
    pub kind: StmtKind,
    /// Source span
    #[serde(default)]
    pub span: Span,
}

/// The kind of a statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    /// `int a = 1, b[10];`
    Declaration(Vec<Declarator>),

    /// `expr;`
    Expression(Expr),

    /// `for (init; condition; increment) body`
    For(Box<ForLoop>),

    /// `if (condition) then else`
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while (condition) body`
    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    /// `switch (selector) body`
    Switch {
        selector: Expr,
        body: Box<Stmt>,
    },

    /// `case expr:`
    Case(Expr),

    /// `default:`
    Default,

    /// `{ stmts }`
    Compound(Vec<Stmt>),

    /// `;`
    Null,

    Break,

    Continue,

    /// `goto label;`
    Goto(String),

    /// `return expr;`
    Return(Option<Expr>),

    /// Any statement form not modeled above; the string is its source text
    Unrecognized(String),
}

/// One declarator of a declaration statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declarator {
    pub name: Symbol,
    /// Declared with a pointer operator (`*p`)
    #[serde(default)]
    pub pointer: bool,
    /// Array dimensions (`a[10][20]`)
    #[serde(default)]
    pub dimensions: Vec<Expr>,
    #[serde(default)]
    pub initializer: Option<Initializer>,
    #[serde(default)]
    pub span: Span,
}

impl Declarator {
    /// An uninitialized scalar.
    pub fn scalar(name: &str) -> Self {
        Self {
            name: Symbol::from(name),
            pointer: false,
            dimensions: Vec::new(),
            initializer: None,
            span: Span::dummy(),
        }
    }

    /// An array with integer dimensions.
    pub fn array(name: &str, dimensions: &[i64]) -> Self {
        Self {
            dimensions: dimensions.iter().map(|&d| Expr::int(d)).collect(),
            ..Self::scalar(name)
        }
    }

    /// A pointer declarator.
    pub fn pointer(name: &str) -> Self {
        Self { pointer: true, ..Self::scalar(name) }
    }

    /// Attach `= value`.
    pub fn init(mut self, value: Expr) -> Self {
        self.initializer = Some(Initializer::Expr(value));
        self
    }

    /// Attach `= { values }`.
    pub fn init_list(mut self, values: Vec<Expr>) -> Self {
        self.initializer = Some(Initializer::List(values));
        self
    }

    pub fn is_array(&self) -> bool {
        !self.dimensions.is_empty()
    }
}

/// Right-hand side of a declarator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Initializer {
    /// `= expr`
    Expr(Expr),
    /// `= { a, b, c }`
    List(Vec<Expr>),
}

/// Header and body of a `for` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForLoop {
    /// Variable assigned by the init clause
    pub index: Symbol,
    /// Init clause is a declaration (`for (int i = ...`)
    #[serde(default)]
    pub declares_index: bool,
    /// Value assigned to the index by the init clause
    pub init: Expr,
    pub condition: Expr,
    pub increment: Expr,
    pub body: Box<Stmt>,
}

/// An assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl AssignOp {
    /// Every operator except plain `=` reads its target.
    pub fn is_compound(&self) -> bool {
        !matches!(self, AssignOp::Assign)
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
            AssignOp::AndAssign => "&=",
            AssignOp::OrAssign => "|=",
            AssignOp::XorAssign => "^=",
            AssignOp::ShlAssign => "<<=",
            AssignOp::ShrAssign => ">>=",
        };
        f.write_str(s)
    }
}

/// An expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default = "NodeId::fresh")]
    pub id: NodeId,
    /// The kind of expression
    pub kind: ExprKind,
    /// Source span
    #[serde(default)]
    pub span: Span,
}

/// The kind of an expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    /// Integer literal
    IntLiteral(i64),
    /// Floating-point literal
    FloatLiteral(f64),
    /// String literal
    StringLiteral(String),

    /// Variable reference
    Variable(Symbol),

    /// Array access: `a[i][j]`
    ArrayAccess {
        array: Box<Expr>,
        indices: Vec<Expr>,
    },

    /// `owner.field` or `owner->field`
    FieldReference {
        owner: Box<Expr>,
        field: Symbol,
        arrow: bool,
    },

    /// Binary operation: `left op right`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation: `op operand`
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// `target op value`
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// Function call: `func(args)`
    Call {
        function: Symbol,
        args: Vec<Expr>,
    },

    /// Ternary conditional: `cond ? then : else`
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    /// Cast: `(type) expr`
    Cast {
        target_type: String,
        expr: Box<Expr>,
    },

    /// `a, b`
    Comma(Vec<Expr>),

    /// Grouped expression (parenthesized)
    Grouped(Box<Expr>),

    /// Any expression form not modeled above; the string is its source text
    Unrecognized(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// Check if this is a comparison operator.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(s)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `sizeof x`
    Sizeof,
    /// `++x`
    PreInc,
    /// `--x`
    PreDec,
    /// `x++`
    PostInc,
    /// `x--`
    PostDec,
    /// `&x`
    AddressOf,
    /// `*x`
    Deref,
}

impl UnaryOp {
    /// `++` or `--` in either position.
    pub fn is_increment(&self) -> bool {
        matches!(self, UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Sizeof => "sizeof ",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
            UnaryOp::AddressOf => "&",
            UnaryOp::Deref => "*",
        };
        f.write_str(s)
    }
}

impl Expr {
    /// Create a new expression with a fresh ID and no location.
    pub fn new(kind: ExprKind) -> Self {
        Self { id: NodeId::fresh(), kind, span: Span::dummy() }
    }

    /// Attach a location.
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Create an integer literal.
    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::IntLiteral(value))
    }

    /// Create a float literal.
    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::FloatLiteral(value))
    }

    /// Create a variable reference.
    pub fn var(name: &str) -> Self {
        Self::new(ExprKind::Variable(Symbol::from(name)))
    }

    /// `name[indices...]`
    pub fn index(name: &str, indices: Vec<Expr>) -> Self {
        Self::new(ExprKind::ArrayAccess { array: Box::new(Self::var(name)), indices })
    }

    /// `owner.field`
    pub fn field(owner: Expr, field: &str) -> Self {
        Self::new(ExprKind::FieldReference {
            owner: Box::new(owner),
            field: Symbol::from(field),
            arrow: false,
        })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) })
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Mul, left, right)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(ExprKind::Unary { op, operand: Box::new(operand) })
    }

    pub fn neg(operand: Expr) -> Self {
        Self::unary(UnaryOp::Neg, operand)
    }

    pub fn address_of(operand: Expr) -> Self {
        Self::unary(UnaryOp::AddressOf, operand)
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::assign_op(AssignOp::Assign, target, value)
    }

    pub fn assign_op(op: AssignOp, target: Expr, value: Expr) -> Self {
        Self::new(ExprKind::Assign { op, target: Box::new(target), value: Box::new(value) })
    }

    pub fn call(function: &str, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call { function: Symbol::from(function), args })
    }

    pub fn grouped(inner: Expr) -> Self {
        Self::new(ExprKind::Grouped(Box::new(inner)))
    }

    /// The variable name, if this is a plain variable reference.
    pub fn as_variable(&self) -> Option<Symbol> {
        match &self.kind {
            ExprKind::Variable(name) => Some(*name),
            _ => None,
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn ungrouped(&self) -> &Expr {
        match &self.kind {
            ExprKind::Grouped(inner) => inner.ungrouped(),
            _ => self,
        }
    }

    /// Base array name and all subscripts of a (possibly nested) array
    /// access, outermost subscript first. `None` if the base is not a
    /// plain variable.
    pub fn array_access_parts(&self) -> Option<(Symbol, Vec<&Expr>)> {
        match &self.kind {
            ExprKind::ArrayAccess { array, indices } => {
                let base = array.ungrouped();
                let (name, mut subscripts) = match &base.kind {
                    ExprKind::Variable(name) => (*name, Vec::new()),
                    ExprKind::ArrayAccess { .. } => base.array_access_parts()?,
                    _ => return None,
                };
                subscripts.extend(indices.iter());
                Some((name, subscripts))
            }
            _ => None,
        }
    }

    /// `(owner, field)` for `owner.field` / `owner->field` where the owner
    /// is a plain variable.
    pub fn simple_field_reference(&self) -> Option<(Symbol, Symbol)> {
        match &self.kind {
            ExprKind::FieldReference { owner, field, .. } => {
                owner.ungrouped().as_variable().map(|o| (o, *field))
            }
            _ => None,
        }
    }
}

impl Stmt {
    /// Create a new statement with a fresh ID and no location.
    pub fn new(kind: StmtKind) -> Self {
        Self { id: NodeId::fresh(), kind, span: Span::dummy() }
    }

    /// Attach a single-line location.
    pub fn at(mut self, line: usize) -> Self {
        self.span = Span::line(line);
        self
    }

    /// Attach a multi-line location.
    pub fn spanning(mut self, first: usize, last: usize) -> Self {
        self.span = Span::lines(first, last);
        self
    }

    pub fn decl(declarators: Vec<Declarator>) -> Self {
        Self::new(StmtKind::Declaration(declarators))
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expression(expr))
    }

    /// `target = value;`
    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::expr(Expr::assign(target, value))
    }

    pub fn compound(stmts: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Compound(stmts))
    }

    /// `for (int index = lower; index < upper; index++) body`
    pub fn for_loop(index: &str, lower: i64, upper: i64, body: Stmt) -> Self {
        Self::counted_loop(index, Expr::int(lower), BinaryOp::Lt, Expr::int(upper), 1, body)
    }

    /// `for (int index = init; index op bound; index += step) body`,
    /// written as `index++` when `step` is 1.
    pub fn counted_loop(index: &str, init: Expr, op: BinaryOp, bound: Expr, step: i64, body: Stmt) -> Self {
        let increment = if step == 1 {
            Expr::unary(UnaryOp::PostInc, Expr::var(index))
        } else {
            Expr::assign_op(AssignOp::AddAssign, Expr::var(index), Expr::int(step))
        };
        Self::new(StmtKind::For(Box::new(ForLoop {
            index: Symbol::from(index),
            declares_index: true,
            init,
            condition: Expr::binary(op, Expr::var(index), bound),
            increment,
            body: Box::new(body),
        })))
    }

    pub fn if_then(condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        Self::new(StmtKind::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_loop(condition: Expr, body: Stmt) -> Self {
        Self::new(StmtKind::While { condition, body: Box::new(body) })
    }

    /// The loop header, if this is a `for` statement.
    pub fn as_for(&self) -> Option<&ForLoop> {
        match &self.kind {
            StmtKind::For(header) => Some(header),
            _ => None,
        }
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self.kind, StmtKind::Declaration(_))
    }

    /// The statements of a compound statement, or the statement itself.
    pub fn statements(&self) -> &[Stmt] {
        match &self.kind {
            StmtKind::Compound(stmts) => stmts,
            _ => std::slice::from_ref(self),
        }
    }
}

/// Visitor trait for traversing statements and expressions.
///
/// Default methods walk every child; override a method and call the
/// matching `walk_*` function to keep descending.
pub trait AstVisitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_declarator(&mut self, decl: &Declarator) {
        for dim in &decl.dimensions {
            self.visit_expr(dim);
        }
        match &decl.initializer {
            Some(Initializer::Expr(e)) => self.visit_expr(e),
            Some(Initializer::List(items)) => {
                for e in items {
                    self.visit_expr(e);
                }
            }
            None => {}
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

/// Visit every child of `stmt`.
pub fn walk_stmt<V: AstVisitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Declaration(decls) => {
            for d in decls {
                visitor.visit_declarator(d);
            }
        }
        StmtKind::Expression(e) | StmtKind::Case(e) => visitor.visit_expr(e),
        StmtKind::For(header) => {
            visitor.visit_expr(&header.init);
            visitor.visit_expr(&header.condition);
            visitor.visit_expr(&header.increment);
            visitor.visit_stmt(&header.body);
        }
        StmtKind::If { condition, then_branch, else_branch } => {
            visitor.visit_expr(condition);
            visitor.visit_stmt(then_branch);
            if let Some(e) = else_branch {
                visitor.visit_stmt(e);
            }
        }
        StmtKind::While { condition, body } => {
            visitor.visit_expr(condition);
            visitor.visit_stmt(body);
        }
        StmtKind::Switch { selector, body } => {
            visitor.visit_expr(selector);
            visitor.visit_stmt(body);
        }
        StmtKind::Compound(stmts) => {
            for s in stmts {
                visitor.visit_stmt(s);
            }
        }
        StmtKind::Return(Some(e)) => visitor.visit_expr(e),
        StmtKind::Return(None)
        | StmtKind::Default
        | StmtKind::Null
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Goto(_)
        | StmtKind::Unrecognized(_) => {}
    }
}

/// Visit every child of `expr`.
pub fn walk_expr<V: AstVisitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::Variable(_)
        | ExprKind::Unrecognized(_) => {}
        ExprKind::ArrayAccess { array, indices } => {
            visitor.visit_expr(array);
            for i in indices {
                visitor.visit_expr(i);
            }
        }
        ExprKind::FieldReference { owner, .. } => visitor.visit_expr(owner),
        ExprKind::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::Unary { operand, .. } => visitor.visit_expr(operand),
        ExprKind::Assign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        ExprKind::Call { args, .. } => {
            for a in args {
                visitor.visit_expr(a);
            }
        }
        ExprKind::Ternary { condition, then_expr, else_expr } => {
            visitor.visit_expr(condition);
            visitor.visit_expr(then_expr);
            visitor.visit_expr(else_expr);
        }
        ExprKind::Cast { expr, .. } => visitor.visit_expr(expr),
        ExprKind::Comma(items) => {
            for e in items {
                visitor.visit_expr(e);
            }
        }
        ExprKind::Grouped(inner) => visitor.visit_expr(inner),
    }
}
