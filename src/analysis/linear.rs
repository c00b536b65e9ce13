//! Affine subscript expressions.

use crate::ir::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::utils::intern::Symbol;
use std::collections::BTreeMap;
use std::fmt;

/// `constant + Σ coefficient·variable`.
///
/// Built only from integer literals, variables, `+`, `-`, unary `+`/`-`,
/// parentheses and `*` with a constant operand. Variables whose
/// coefficients cancel out stay in the map with coefficient 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinearExpression {
    coefficients: BTreeMap<Symbol, i64>,
    constant: i64,
}

impl LinearExpression {
    /// Decompose `expr`, or `None` if it is not linear.
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => Some(Self::constant(*v)),
            ExprKind::Variable(name) => Some(Self::variable(*name)),
            ExprKind::Grouped(inner) => Self::from_expr(inner),
            ExprKind::Unary { op: UnaryOp::Plus, operand } => Self::from_expr(operand),
            ExprKind::Unary { op: UnaryOp::Neg, operand } => Self::from_expr(operand)?.scaled(-1),
            ExprKind::Binary { op, left, right } => {
                let lhs = Self::from_expr(left)?;
                let rhs = Self::from_expr(right)?;
                match op {
                    BinaryOp::Add => lhs.plus(&rhs),
                    BinaryOp::Sub => lhs.plus(&rhs.scaled(-1)?),
                    BinaryOp::Mul => lhs.times(&rhs),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn constant(value: i64) -> Self {
        Self { coefficients: BTreeMap::new(), constant: value }
    }

    pub fn variable(name: Symbol) -> Self {
        Self { coefficients: BTreeMap::from([(name, 1)]), constant: 0 }
    }

    /// Variables mentioned, including those with coefficient 0.
    pub fn variables(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.coefficients.keys().copied()
    }

    /// Coefficient of `var` (0 when absent).
    pub fn coefficient(&self, var: Symbol) -> i64 {
        self.coefficients.get(&var).copied().unwrap_or(0)
    }

    pub fn constant_coefficient(&self) -> i64 {
        self.constant
    }

    /// True if every variable coefficient is 0.
    pub fn is_constant(&self) -> bool {
        self.coefficients.values().all(|&c| c == 0)
    }

    fn plus(&self, rhs: &Self) -> Option<Self> {
        let mut coefficients = self.coefficients.clone();
        for (&var, &c) in &rhs.coefficients {
            let entry = coefficients.entry(var).or_insert(0);
            *entry = entry.checked_add(c)?;
        }
        Some(Self { coefficients, constant: self.constant.checked_add(rhs.constant)? })
    }

    fn times(&self, rhs: &Self) -> Option<Self> {
        if self.is_constant() {
            rhs.scaled(self.constant)
        } else if rhs.is_constant() {
            self.scaled(rhs.constant)
        } else {
            None
        }
    }

    fn scaled(&self, k: i64) -> Option<Self> {
        let mut coefficients = BTreeMap::new();
        for (&var, &c) in &self.coefficients {
            coefficients.insert(var, c.checked_mul(k)?);
        }
        Some(Self { coefficients, constant: self.constant.checked_mul(k)? })
    }
}

impl fmt::Display for LinearExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut terms: Vec<(String, i64)> =
            self.coefficients.iter().map(|(v, &c)| (v.as_string(), c)).collect();
        terms.sort();
        write!(f, "{}", self.constant)?;
        for (name, c) in terms {
            write!(f, " + {}*{}", c, name)?;
        }
        Ok(())
    }
}
