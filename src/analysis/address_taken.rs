//! Address-taken analysis.
//!
//! A call to a function the analyzer knows nothing about may read or write
//! any variable whose address escaped through `&`. This pass finds those
//! variables for one function body.

use crate::ir::ast::{
    walk_expr, walk_stmt, AstVisitor, Declarator, Expr, ExprKind, Function, Initializer, NodeId, Stmt, UnaryOp,
};
use crate::utils::errors::{AnalysisError, AnalysisResult, UnsupportedConstruct, UnsupportedKind};
use crate::utils::intern::Symbol;
use log::debug;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Variables of one function whose address is taken.
#[derive(Debug, Clone, Default)]
pub struct AddressTakenAnalysis {
    address_taken: BTreeSet<Symbol>,
    variables: HashSet<Symbol>,
}

impl AddressTakenAnalysis {
    /// Analyze a function, parameters included.
    pub fn for_function(function: &Function) -> AnalysisResult<Self> {
        let mut pointers = HashSet::new();
        let mut variables = HashSet::new();
        for p in &function.params {
            variables.insert(p.name);
            if p.pointer {
                pointers.insert(p.name);
            }
        }
        Self::analyze(&function.body, variables, pointers)
    }

    /// Analyze a statement sequence as if it were a whole function body.
    pub fn for_body(body: &[Stmt]) -> AnalysisResult<Self> {
        Self::analyze(body, HashSet::new(), HashSet::new())
    }

    fn analyze(body: &[Stmt], variables: HashSet<Symbol>, pointers: HashSet<Symbol>) -> AnalysisResult<Self> {
        let mut names = NameCollector { variables, pointers };
        for stmt in body {
            names.visit_stmt(stmt);
        }

        let mut finder = AddressFinder {
            pointers: &names.pointers,
            found: BTreeSet::new(),
            error: None,
        };
        for stmt in body {
            finder.visit_stmt(stmt);
        }
        if let Some(err) = finder.error {
            return Err(err.into());
        }
        debug!(
            "address-taken analysis: {} variables, {} address taken",
            names.variables.len(),
            finder.found.len()
        );
        Ok(Self { address_taken: finder.found, variables: names.variables })
    }

    /// Whether `name`'s address is taken. Fails for names that never occur
    /// in the analyzed function.
    pub fn is_address_taken(&self, name: Symbol) -> AnalysisResult<bool> {
        if !self.variables.contains(&name) {
            return Err(AnalysisError::NotLocal(name.as_string()));
        }
        Ok(self.address_taken.contains(&name))
    }

    /// Every address-taken variable.
    pub fn address_taken_variables(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.address_taken.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.address_taken.is_empty()
    }
}

/// Records every variable name and which of them are declared as pointers.
struct NameCollector {
    variables: HashSet<Symbol>,
    pointers: HashSet<Symbol>,
}

impl AstVisitor for NameCollector {
    fn visit_declarator(&mut self, decl: &Declarator) {
        self.variables.insert(decl.name);
        if decl.pointer {
            self.pointers.insert(decl.name);
        }
        for dim in &decl.dimensions {
            self.visit_expr(dim);
        }
        if let Some(init) = &decl.initializer {
            match init {
                Initializer::Expr(e) => self.visit_expr(e),
                Initializer::List(items) => items.iter().for_each(|e| self.visit_expr(e)),
            }
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let Some(header) = stmt.as_for() {
            self.variables.insert(header.index);
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::Variable(name) = expr.kind {
            self.variables.insert(name);
        }
        walk_expr(self, expr);
    }
}

struct AddressFinder<'a> {
    pointers: &'a HashSet<Symbol>,
    found: BTreeSet<Symbol>,
    error: Option<UnsupportedConstruct>,
}

impl AddressFinder<'_> {
    /// Walk down from the operand of `&` to the variable(s) it names.
    /// Below a binary operator only pointer variables count: `&*(p + i)`
    /// exposes what `p` points to, not `i`.
    fn find_binding(&mut self, expr: &Expr, below_binary: bool) {
        match &expr.kind {
            ExprKind::Unary { operand, .. } => self.find_binding(operand, below_binary),
            ExprKind::Grouped(inner) => self.find_binding(inner, below_binary),
            ExprKind::Binary { left, right, .. } => {
                for side in [left, right] {
                    if is_lvalue(side) {
                        self.find_binding(side, true);
                    }
                }
            }
            ExprKind::Variable(name) => {
                if !below_binary || self.pointers.contains(name) {
                    self.found.insert(*name);
                }
            }
            // &a[i] and &s.f expose the whole aggregate
            ExprKind::ArrayAccess { .. } => {
                if let Some((name, _)) = expr.array_access_parts() {
                    self.found.insert(name);
                }
            }
            ExprKind::FieldReference { owner, .. } => self.find_binding(owner, below_binary),
            _ => {}
        }
    }
}

impl AstVisitor for AddressFinder<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::Unary { op: UnaryOp::AddressOf, operand } = &expr.kind {
            if is_lvalue(operand) {
                self.find_binding(operand, false);
            } else if self.error.is_none() {
                self.error = Some(UnsupportedConstruct::new(
                    UnsupportedKind::PointerOperation,
                    expr.span,
                    "address of a value that is not an lvalue",
                ));
            }
        }
        walk_expr(self, expr);
    }
}

fn is_lvalue(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Variable(_) | ExprKind::ArrayAccess { .. } | ExprKind::FieldReference { .. } => true,
        ExprKind::Unary { op: UnaryOp::Deref, .. } => true,
        ExprKind::Grouped(inner) => is_lvalue(inner),
        _ => false,
    }
}

/// Per-function memo of [`AddressTakenAnalysis`] results.
///
/// Lookups take a shared lock; a miss computes outside the lock and the
/// first result inserted for a key wins.
#[derive(Debug, Default)]
pub struct AddressTakenCache {
    entries: RwLock<HashMap<NodeId, Arc<AddressTakenAnalysis>>>,
}

impl AddressTakenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached analysis for `function`, computing it on first use.
    pub fn get_or_compute(&self, function: &Function) -> AnalysisResult<Arc<AddressTakenAnalysis>> {
        if let Some(hit) = self.entries.read().get(&function.id) {
            return Ok(Arc::clone(hit));
        }
        let computed = Arc::new(AddressTakenAnalysis::for_function(function)?);
        let mut entries = self.entries.write();
        Ok(Arc::clone(entries.entry(function.id).or_insert(computed)))
    }

    /// Drop the entry for a function that has changed.
    pub fn invalidate(&self, id: NodeId) {
        self.entries.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{Parameter, Stmt};

    fn sym(s: &str) -> Symbol {
        Symbol::from(s)
    }

    #[test]
    fn test_address_of_variable() {
        let body = vec![
            Stmt::decl(vec![Declarator::scalar("a"), Declarator::scalar("b")]),
            Stmt::decl(vec![Declarator::pointer("p").init(Expr::address_of(Expr::var("b")))]),
        ];
        let analysis = AddressTakenAnalysis::for_body(&body).unwrap();
        assert!(analysis.is_address_taken(sym("b")).unwrap());
        assert!(!analysis.is_address_taken(sym("a")).unwrap());
        assert!(!analysis.is_address_taken(sym("p")).unwrap());
    }

    #[test]
    fn test_not_local() {
        let analysis = AddressTakenAnalysis::for_body(&[]).unwrap();
        assert!(matches!(analysis.is_address_taken(sym("nowhere")), Err(AnalysisError::NotLocal(_))));
    }

    #[test]
    fn test_binary_only_records_pointers() {
        // q = &*(p + i);
        let inner = Expr::unary(UnaryOp::Deref, Expr::grouped(Expr::add(Expr::var("p"), Expr::var("i"))));
        let body = vec![
            Stmt::decl(vec![Declarator::pointer("p"), Declarator::scalar("i"), Declarator::pointer("q")]),
            Stmt::assign(Expr::var("q"), Expr::address_of(inner)),
        ];
        let analysis = AddressTakenAnalysis::for_body(&body).unwrap();
        let taken: Vec<_> = analysis.address_taken_variables().collect();
        assert_eq!(taken, vec![sym("p")]);
    }

    #[test]
    fn test_array_element_exposes_array() {
        let body = vec![Stmt::expr(Expr::call("f", vec![Expr::address_of(Expr::index("buf", vec![Expr::int(2)]))]))];
        let analysis = AddressTakenAnalysis::for_body(&body).unwrap();
        assert!(analysis.is_address_taken(sym("buf")).unwrap());
    }

    #[test]
    fn test_address_of_rvalue_is_rejected() {
        let body = vec![Stmt::expr(Expr::call("f", vec![Expr::address_of(Expr::int(3))]))];
        assert!(matches!(
            AddressTakenAnalysis::for_body(&body),
            Err(AnalysisError::UnsupportedConstruct(_))
        ));
    }

    #[test]
    fn test_parameters_are_local() {
        let function = Function::new("f", vec![Parameter::new("out", true)], vec![]);
        let analysis = AddressTakenAnalysis::for_function(&function).unwrap();
        assert!(!analysis.is_address_taken(sym("out")).unwrap());
    }

    #[test]
    fn test_cache_computes_once_per_function() {
        let cache = AddressTakenCache::new();
        let body = vec![Stmt::decl(vec![Declarator::pointer("p").init(Expr::address_of(Expr::var("x")))])];
        let f = Function::new("f", vec![], body);
        let g = Function::new("g", vec![], vec![]);

        let first = cache.get_or_compute(&f).unwrap();
        let second = cache.get_or_compute(&f).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        cache.get_or_compute(&g).unwrap();
        assert_eq!(cache.len(), 2);

        cache.invalidate(f.id);
        assert_eq!(cache.len(), 1);
        let third = cache.get_or_compute(&f).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_cache_shared_across_threads() {
        let cache = Arc::new(AddressTakenCache::new());
        let f = Arc::new(Function::new("f", vec![], vec![]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let f = Arc::clone(&f);
                std::thread::spawn(move || cache.get_or_compute(&f).map(|a| a.is_empty()))
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().unwrap());
        }
        assert_eq!(cache.len(), 1);
    }
}
