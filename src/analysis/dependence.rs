//! Pairwise data-dependence analysis.
//!
//! Every ordered pair of collected accesses to the same variable, at least
//! one of them a write, is tested:
//! - scalar-style pairs get `[*, ...]` over their common loops
//! - array pairs are handed to the direction-vector hierarchy search
//! - loop-private declarations and self dependences are filtered
//!
//! [`DependenceAnalysis`] handles a statement block (optionally inside a
//! loop). [`FusionDependenceAnalysis`] treats two adjacent loops as one
//! virtual loop to decide whether they may be fused.

use crate::analysis::access::{AccessCollector, CollectedAccesses, DeclId, VariableAccess};
use crate::analysis::address_taken::AddressTakenAnalysis;
use crate::analysis::cancel::CancellationToken;
use crate::analysis::dependence_tester::FourierMotzkinDependenceTester;
use crate::analysis::direction::{Direction, DirectionVector};
use crate::analysis::fourier_motzkin::FourierMotzkinEliminator;
use crate::analysis::hierarchy::DirectionHierarchyTester;
use crate::ir::ast::Stmt;
use crate::ir::loops::{LiteralBounds, LoopBoundsProvider, LoopInfo};
use crate::utils::errors::{AnalysisError, AnalysisResult, UnsupportedConstruct, UnsupportedKind};
use crate::utils::intern::Symbol;
use crate::AnalysisConfig;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Bound used for loops whose bound is unknown or does not fit in 32 bits.
pub const UNBOUNDED_LOWER: i64 = i32::MIN as i64 + 1;
/// Upper counterpart of [`UNBOUNDED_LOWER`].
pub const UNBOUNDED_UPPER: i64 = i32::MAX as i64 - 1;

/// Kind of data dependence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DependenceType {
    /// Read-after-write
    Flow,
    /// Write-after-read
    Anti,
    /// Write-after-write
    Output,
    /// Read-after-read
    Input,
}

impl DependenceType {
    /// Classify by the roles of the source and sink accesses.
    pub fn classify(source_writes: bool, sink_writes: bool) -> Self {
        match (source_writes, sink_writes) {
            (true, false) => DependenceType::Flow,
            (false, true) => DependenceType::Anti,
            (true, true) => DependenceType::Output,
            (false, false) => DependenceType::Input,
        }
    }

    /// Lower-case name used in prose.
    pub fn name(&self) -> &'static str {
        match self {
            DependenceType::Flow => "flow",
            DependenceType::Anti => "anti",
            DependenceType::Output => "output",
            DependenceType::Input => "input",
        }
    }
}

impl fmt::Display for DependenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_uppercase())
    }
}

/// A dependence from `source` to `sink` under one direction vector.
#[derive(Debug, Clone)]
pub struct DataDependence {
    pub source: VariableAccess,
    pub sink: VariableAccess,
    pub direction: DirectionVector,
    pub dependence_type: DependenceType,
}

impl DataDependence {
    pub fn new(source: VariableAccess, sink: VariableAccess, direction: DirectionVector) -> Self {
        let dependence_type = source.dependence_type_to(&sink);
        Self { source, sink, direction, dependence_type }
    }

    /// 1-based position of the carrying loop, 0 if loop-independent.
    pub fn level(&self) -> usize {
        self.direction.level()
    }

    pub fn is_loop_carried(&self) -> bool {
        self.level() > 0
    }

    pub fn is_loop_independent(&self) -> bool {
        self.level() == 0
    }

    pub fn variable(&self) -> Symbol {
        self.source.variable
    }

    pub fn source_line(&self) -> usize {
        self.source.line()
    }

    pub fn sink_line(&self) -> usize {
        self.sink.line()
    }

    /// Sentence form for diagnostics.
    pub fn describe(&self) -> String {
        let name = self.dependence_type.name();
        let kind = if self.is_loop_carried() {
            format!("Loop-carried {}", name)
        } else {
            let mut chars = name.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        };
        format!(
            "{} dependence from line {} to line {} {}",
            kind,
            self.source_line(),
            self.sink_line(),
            self.direction
        )
    }

    fn key(&self) -> (usize, usize, usize, usize, &DirectionVector, DependenceType) {
        (
            self.source.segment,
            self.source.ordinal,
            self.sink.segment,
            self.sink.ordinal,
            &self.direction,
            self.dependence_type,
        )
    }
}

impl PartialEq for DataDependence {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DataDependence {}

impl fmt::Display for DataDependence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} {}",
            self.dependence_type,
            self.source_line(),
            self.sink_line(),
            self.direction
        )
    }
}

/// Configuration plus injected collaborators for one analysis run.
#[derive(Clone, Default)]
pub struct AnalysisOptions<'a> {
    pub config: AnalysisConfig,
    pub cancel: Option<&'a CancellationToken>,
    pub address_taken: Option<&'a AddressTakenAnalysis>,
    pub bounds: Option<&'a dyn LoopBoundsProvider>,
}

impl<'a> AnalysisOptions<'a> {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_address_taken(mut self, analysis: &'a AddressTakenAnalysis) -> Self {
        self.address_taken = Some(analysis);
        self
    }

    pub fn with_bounds(mut self, bounds: &'a dyn LoopBoundsProvider) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn bounds_provider(&self) -> &'a dyn LoopBoundsProvider {
        self.bounds.unwrap_or(&LiteralBounds)
    }

    fn check_cancelled(&self) -> AnalysisResult<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(AnalysisError::Cancelled),
            _ => Ok(()),
        }
    }

    fn tester(&self) -> FourierMotzkinDependenceTester {
        let mut eliminator = FourierMotzkinEliminator::new().with_row_limit(self.config.max_constraint_rows);
        if let Some(token) = self.cancel {
            eliminator = eliminator.with_cancellation(token.clone());
        }
        let tester = FourierMotzkinDependenceTester::new(eliminator);
        if self.config.integer_solutions {
            tester
        } else {
            tester.real_solutions_only()
        }
    }
}

/// Queries shared by both analyses.
pub trait DependenceSet {
    fn dependences(&self) -> &[DataDependence];

    /// Does some dependence have the outermost loop as its carrier?
    fn has_level1_carried_dependence(&self) -> bool {
        self.dependences().iter().any(|d| d.level() == 1)
    }

    /// Number of loop-carried dependences.
    fn carry_dependence_count(&self) -> usize {
        self.dependences().iter().filter(|d| d.is_loop_carried()).count()
    }

    fn summary(&self) -> DependenceSummary {
        DependenceSummary::of(self.dependences())
    }
}

/// Dependences of a statement block.
#[derive(Debug, Clone)]
pub struct DependenceAnalysis {
    accesses: Vec<VariableAccess>,
    dependences: Vec<DataDependence>,
}

impl DependenceAnalysis {
    /// Analyze a statement block that is not nested in any loop.
    pub fn new(stmts: &[Stmt], options: &AnalysisOptions<'_>) -> AnalysisResult<Self> {
        let mut collector = AccessCollector::new(options.bounds_provider(), options.address_taken, Vec::new());
        collector.collect_statements(stmts)?;
        Self::from_accesses(collector.finish(), options)
    }

    /// Analyze the body of a counted loop with the loop as enclosing context.
    pub fn for_loop(stmt: &Stmt, options: &AnalysisOptions<'_>) -> AnalysisResult<Self> {
        let (info, body) = counted_loop(stmt, options)?;
        let declares_index = stmt.as_for().map_or(false, |h| h.declares_index);
        let index = info.index;
        let mut collector = AccessCollector::new(options.bounds_provider(), options.address_taken, vec![info]);
        if declares_index {
            collector.declare_in_context(index, stmt.id);
        }
        collector.collect_statements(std::slice::from_ref(body))?;
        Self::from_accesses(collector.finish(), options)
    }

    fn from_accesses(collected: CollectedAccesses, options: &AnalysisOptions<'_>) -> AnalysisResult<Self> {
        let engine = PairwiseEngine {
            options,
            tester: options.tester(),
            declarations: &collected.loop_declarations,
            fusion: false,
        };
        let dependences = engine.run(&collected.accesses)?;
        debug!(
            "{} accesses, {} dependences ({} loop-carried)",
            collected.accesses.len(),
            dependences.len(),
            dependences.iter().filter(|d| d.is_loop_carried()).count()
        );
        Ok(Self { accesses: collected.accesses, dependences })
    }

    pub fn variable_accesses(&self) -> &[VariableAccess] {
        &self.accesses
    }
}

impl DependenceSet for DependenceAnalysis {
    fn dependences(&self) -> &[DataDependence] {
        &self.dependences
    }
}

/// Dependences between two adjacent loops considered as one loop.
///
/// Both bodies are analyzed under the first loop's index and bounds, so
/// direction vectors have exactly one entry. Accesses from the first body
/// carry segment 0, those from the second segment 1.
#[derive(Debug, Clone)]
pub struct FusionDependenceAnalysis {
    accesses: Vec<VariableAccess>,
    dependences: Vec<DataDependence>,
}

impl FusionDependenceAnalysis {
    pub fn new(first: &Stmt, second: &Stmt, options: &AnalysisOptions<'_>) -> AnalysisResult<Self> {
        let (info, first_body) = counted_loop(first, options)?;
        let (_, second_body) = counted_loop(second, options)?;
        let index = info.index;
        let declares_index = first.as_for().map_or(false, |h| h.declares_index);

        let mut collector = AccessCollector::new(options.bounds_provider(), options.address_taken, vec![info]);
        if declares_index {
            collector.declare_in_context(index, first.id);
        }
        collector.collect_statements(std::slice::from_ref(first_body))?;
        collector.set_segment(1);
        collector.collect_statements(std::slice::from_ref(second_body))?;
        let collected = collector.finish();

        let engine = PairwiseEngine {
            options,
            tester: options.tester(),
            declarations: &collected.loop_declarations,
            fusion: true,
        };
        let dependences = engine.run(&collected.accesses)?;
        debug!("fusion: {} accesses, {} dependences", collected.accesses.len(), dependences.len());
        Ok(Self { accesses: collected.accesses, dependences })
    }

    pub fn variable_accesses(&self) -> &[VariableAccess] {
        &self.accesses
    }
}

impl DependenceSet for FusionDependenceAnalysis {
    fn dependences(&self) -> &[DataDependence] {
        &self.dependences
    }
}

fn counted_loop<'s>(stmt: &'s Stmt, options: &AnalysisOptions<'_>) -> AnalysisResult<(LoopInfo, &'s Stmt)> {
    let header = stmt.as_for().ok_or_else(|| {
        UnsupportedConstruct::new(UnsupportedKind::Unrecognized, stmt.span, "statement is not a for loop")
    })?;
    let info = LoopInfo::inspect(stmt, options.bounds_provider()).ok_or_else(|| {
        UnsupportedConstruct::new(UnsupportedKind::UncountedLoop, stmt.span, "loop is not a counted loop")
    })?;
    Ok((info, &header.body))
}

struct PairwiseEngine<'o, 'a> {
    options: &'o AnalysisOptions<'a>,
    tester: FourierMotzkinDependenceTester,
    declarations: &'o HashMap<DeclId, Vec<LoopInfo>>,
    /// Single virtual loop, every pair tested
    fusion: bool,
}

impl PairwiseEngine<'_, '_> {
    fn run(&self, accesses: &[VariableAccess]) -> AnalysisResult<Vec<DataDependence>> {
        check_index_mutation(accesses)?;
        let mut out = Vec::new();
        for v1 in accesses {
            for v2 in accesses {
                self.options.check_cancelled()?;
                if !self.is_candidate(v1, v2) {
                    continue;
                }
                let before = out.len();
                if v1.is_scalar_access() || v2.is_scalar_access() {
                    self.scalar_dependence(v1, v2, &mut out);
                } else {
                    self.array_dependences(v1, v2, &mut out)?;
                }
                for dep in &out[before..] {
                    trace!("{} ({} -> {})", dep, v1, v2);
                }
            }
        }
        Ok(out)
    }

    fn is_candidate(&self, v1: &VariableAccess, v2: &VariableAccess) -> bool {
        if !v1.refers_to_same_variable_as(v2) || (v1.is_read() && v2.is_read()) {
            return false;
        }
        if self.fusion {
            return true;
        }
        let feasible = v1.is_in_common_loops_with(v2) || v1.enclosing_statement_lexically_precedes(v2);
        feasible && !v2.statement.is_declaration
    }

    /// Loops the direction vector ranges over.
    fn common_loops<'v>(&self, v1: &'v VariableAccess, v2: &VariableAccess) -> &'v [LoopInfo] {
        let common = v1.common_enclosing_loops(v2);
        if self.fusion {
            &common[..common.len().min(1)]
        } else {
            common
        }
    }

    /// Loop chain of the in-loop declaration `v` resolves to, if that
    /// declaration encloses `v`.
    fn declaration_of(&self, v: &VariableAccess) -> Option<&[LoopInfo]> {
        let decl = self.declarations.get(v.declaration.as_ref()?)?;
        let encloses_source = decl.len() <= v.loops.len() && decl.iter().zip(&v.loops).all(|(a, b)| a == b);
        encloses_source.then_some(decl.as_slice())
    }

    fn scalar_dependence(&self, v1: &VariableAccess, v2: &VariableAccess, out: &mut Vec<DataDependence>) {
        let len = self.common_loops(v1, v2).len();
        let mut vector = DirectionVector::any(len);
        if let Some(decl) = self.declaration_of(v1) {
            if v1 == v2 && decl.len() == v1.loops.len() {
                // a private scalar's own access in its declaring loop
                return;
            }
            let private = shared_prefix(&v1.loops, decl).min(shared_prefix(&v2.loops, decl)).min(len);
            for i in 0..private {
                vector = vector.with(i, Direction::Eq);
            }
        }
        out.push(DataDependence::new(v1.clone(), v2.clone(), vector));
    }

    fn array_dependences(
        &self,
        v1: &VariableAccess,
        v2: &VariableAccess,
        out: &mut Vec<DataDependence>,
    ) -> AnalysisResult<()> {
        let common = self.common_loops(v1, v2);
        let mut vars: Vec<Symbol> = common.iter().map(|l| l.index).collect();
        let mut others: Vec<Symbol> = v1
            .subscripts()
            .into_iter()
            .chain(v2.subscripts())
            .flatten()
            .flat_map(|s| s.variables())
            .filter(|v| !vars.contains(v))
            .collect();
        others.sort_by_key(|s| s.as_string());
        others.dedup();
        let num_scalars = others.len();
        vars.extend(others);

        let (lower, upper): (Vec<i64>, Vec<i64>) = common.iter().map(loop_bounds).unzip();
        let hierarchy = DirectionHierarchyTester::new(
            &self.tester,
            lower,
            upper,
            v1.collect_coefficients(&vars),
            v2.collect_coefficients(&vars),
            num_scalars,
        );
        let private = self.declaration_of(v1).map_or(0, <[LoopInfo]>::len);
        for vector in hierarchy.possible_dependence_directions()? {
            if self.options.config.drop_self_loop_independent && v1 == v2 && vector.level() == 0 {
                continue;
            }
            if vector.iter().take(private).any(|d| d != Direction::Eq) {
                trace!("{} carried across a private declaration of {}", vector, v1.variable);
                continue;
            }
            out.push(DataDependence::new(v1.clone(), v2.clone(), vector));
        }
        Ok(())
    }
}

fn shared_prefix(a: &[LoopInfo], b: &[LoopInfo]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn loop_bounds(info: &LoopInfo) -> (i64, i64) {
    let in_range = |v: i64| (UNBOUNDED_LOWER..=UNBOUNDED_UPPER).contains(&v);
    let lower = info.lower.filter(|&v| in_range(v)).unwrap_or(UNBOUNDED_LOWER);
    let upper = info.upper.filter(|&v| in_range(v)).unwrap_or(UNBOUNDED_UPPER);
    (lower, upper)
}

/// A write to the index of any loop enclosing it invalidates the bounds.
fn check_index_mutation(accesses: &[VariableAccess]) -> AnalysisResult<()> {
    match accesses
        .iter()
        .find(|a| a.is_write && a.loops.iter().any(|l| l.index == a.variable))
    {
        Some(a) => Err(AnalysisError::IndexMutationInLoop { variable: a.variable.as_string(), span: a.span }),
        None => Ok(()),
    }
}

/// Counts by kind and carrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependenceSummary {
    pub num_dependences: usize,
    pub num_flow: usize,
    pub num_anti: usize,
    pub num_output: usize,
    #[serde(default)]
    pub num_input: usize,
    pub num_loop_carried: usize,
    pub num_loop_independent: usize,
}

impl DependenceSummary {
    pub fn of(deps: &[DataDependence]) -> Self {
        let count = |t: DependenceType| deps.iter().filter(|d| d.dependence_type == t).count();
        let carried = deps.iter().filter(|d| d.is_loop_carried()).count();
        Self {
            num_dependences: deps.len(),
            num_flow: count(DependenceType::Flow),
            num_anti: count(DependenceType::Anti),
            num_output: count(DependenceType::Output),
            num_input: count(DependenceType::Input),
            num_loop_carried: carried,
            num_loop_independent: deps.len() - carried,
        }
    }
}

impl fmt::Display for DependenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dependence Summary:")?;
        writeln!(f, "  Dependences: {}", self.num_dependences)?;
        writeln!(f, "    Flow: {}", self.num_flow)?;
        writeln!(f, "    Anti: {}", self.num_anti)?;
        writeln!(f, "    Output: {}", self.num_output)?;
        writeln!(f, "    Input: {}", self.num_input)?;
        writeln!(f, "  Loop-carried: {}", self.num_loop_carried)?;
        write!(f, "  Loop-independent: {}", self.num_loop_independent)
    }
}

/// Serializable form of one dependence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependenceRecord {
    #[serde(rename = "type")]
    pub dependence_type: DependenceType,
    pub variable: String,
    pub source_line: usize,
    pub sink_line: usize,
    pub direction: DirectionVector,
    pub level: usize,
}

impl From<&DataDependence> for DependenceRecord {
    fn from(dep: &DataDependence) -> Self {
        Self {
            dependence_type: dep.dependence_type,
            variable: dep.variable().as_string(),
            source_line: dep.source_line(),
            sink_line: dep.sink_line(),
            direction: dep.direction.clone(),
            level: dep.level(),
        }
    }
}

/// Serializable result of an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependenceReport {
    pub accesses: usize,
    pub summary: DependenceSummary,
    pub dependences: Vec<DependenceRecord>,
}

impl DependenceReport {
    pub fn new(accesses: &[VariableAccess], deps: &[DataDependence]) -> Self {
        Self {
            accesses: accesses.len(),
            summary: DependenceSummary::of(deps),
            dependences: deps.iter().map(DependenceRecord::from).collect(),
        }
    }
}

impl From<&DependenceAnalysis> for DependenceReport {
    fn from(analysis: &DependenceAnalysis) -> Self {
        Self::new(analysis.variable_accesses(), analysis.dependences())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{Declarator, Expr};
    use std::collections::BTreeSet;

    fn strings(deps: &[DataDependence]) -> BTreeSet<String> {
        deps.iter().map(|d| d.to_string()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn analyze(stmts: &[Stmt]) -> DependenceAnalysis {
        DependenceAnalysis::new(stmts, &AnalysisOptions::default()).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(DependenceType::classify(true, false), DependenceType::Flow);
        assert_eq!(DependenceType::classify(false, true), DependenceType::Anti);
        assert_eq!(DependenceType::classify(true, true), DependenceType::Output);
        assert_eq!(DependenceType::classify(false, false), DependenceType::Input);
        assert_eq!(DependenceType::Output.to_string(), "OUTPUT");
    }

    #[test]
    fn test_straight_line_scalars() {
        let stmts = vec![
            Stmt::decl(vec![Declarator::scalar("x")]).at(1),
            Stmt::assign(Expr::var("x"), Expr::int(1)).at(2),
            Stmt::assign(Expr::var("y"), Expr::var("x")).at(3),
        ];
        let analysis = analyze(&stmts);
        assert_eq!(
            strings(analysis.dependences()),
            set(&["OUTPUT 1 -> 2 []", "FLOW 1 -> 3 []", "FLOW 2 -> 3 []"])
        );
        assert!(!analysis.has_level1_carried_dependence());
    }

    #[test]
    fn test_later_statement_never_sources_earlier() {
        let stmts = vec![
            Stmt::assign(Expr::var("y"), Expr::var("x")).at(1),
            Stmt::assign(Expr::var("x"), Expr::int(1)).at(2),
        ];
        assert_eq!(strings(analyze(&stmts).dependences()), set(&["ANTI 1 -> 2 []"]));
    }

    #[test]
    fn test_loop_carried_array_flow() {
        // for (i = 1; i < 10; i++) a[i] = a[i - 1];
        let body = Stmt::assign(
            Expr::index("a", vec![Expr::var("i")]),
            Expr::index("a", vec![Expr::sub(Expr::var("i"), Expr::int(1))]),
        )
        .at(2);
        let nest = Stmt::for_loop("i", 1, 10, body).spanning(1, 2);
        let analysis = DependenceAnalysis::for_loop(&nest, &AnalysisOptions::default()).unwrap();
        assert_eq!(strings(analysis.dependences()), set(&["FLOW 2 -> 2 [<]"]));
        assert!(analysis.has_level1_carried_dependence());
        assert_eq!(analysis.carry_dependence_count(), 1);
        let dep = &analysis.dependences()[0];
        assert_eq!(dep.describe(), "Loop-carried flow dependence from line 2 to line 2 [<]");
    }

    #[test]
    fn test_independent_halves() {
        // for (i = 0; i < 10; i++) a[i] = a[i + 10];
        let body = Stmt::assign(
            Expr::index("a", vec![Expr::var("i")]),
            Expr::index("a", vec![Expr::add(Expr::var("i"), Expr::int(10))]),
        )
        .at(2);
        let nest = Stmt::for_loop("i", 0, 10, body).spanning(1, 2);
        let analysis = DependenceAnalysis::for_loop(&nest, &AnalysisOptions::default()).unwrap();
        assert!(analysis.dependences().is_empty());
    }

    #[test]
    fn test_private_scalar_is_not_carried() {
        // for (int i = 0; i < 10; i++) { int t = a[i]; b[i] = t; }
        let body = Stmt::compound(vec![
            Stmt::decl(vec![Declarator::scalar("t").init(Expr::index("a", vec![Expr::var("i")]))]).at(2),
            Stmt::assign(Expr::index("b", vec![Expr::var("i")]), Expr::var("t")).at(3),
        ]);
        let nest = Stmt::for_loop("i", 0, 10, body).spanning(1, 4);
        let analysis = DependenceAnalysis::for_loop(&nest, &AnalysisOptions::default()).unwrap();
        assert_eq!(strings(analysis.dependences()), set(&["FLOW 2 -> 3 [=]"]));
        assert!(!analysis.has_level1_carried_dependence());
    }

    #[test]
    fn test_index_mutation() {
        let body = Stmt::assign(Expr::var("i"), Expr::add(Expr::var("i"), Expr::int(2))).at(2);
        let nest = Stmt::for_loop("i", 0, 10, body).spanning(1, 2);
        match DependenceAnalysis::for_loop(&nest, &AnalysisOptions::default()) {
            Err(AnalysisError::IndexMutationInLoop { variable, .. }) => assert_eq!(variable, "i"),
            other => panic!("expected index mutation, got {:?}", other.map(|a| a.dependences().len())),
        }
    }

    #[test]
    fn test_cancelled_before_first_pair() {
        let token = CancellationToken::new();
        token.cancel();
        let options = AnalysisOptions::default().with_cancellation(&token);
        let stmts = vec![Stmt::assign(Expr::var("x"), Expr::int(1)).at(1)];
        assert!(matches!(DependenceAnalysis::new(&stmts, &options), Err(AnalysisError::Cancelled)));
    }

    #[test]
    fn test_unknown_bounds_use_sentinels() {
        let info = LoopInfo {
            id: crate::ir::ast::NodeId::fresh(),
            index: Symbol::from("i"),
            lower: None,
            upper: Some(i64::MAX),
            factor: 1,
            span: Default::default(),
        };
        assert_eq!(loop_bounds(&info), (UNBOUNDED_LOWER, UNBOUNDED_UPPER));
    }

    #[test]
    fn test_fusion_single_entry_vectors() {
        // for (i..) a[i] = 0;   for (i..) b[i] = a[i + 1];
        let first = Stmt::for_loop("i", 0, 10, Stmt::assign(Expr::index("a", vec![Expr::var("i")]), Expr::int(0)).at(2))
            .spanning(1, 2);
        let second = Stmt::for_loop(
            "i",
            0,
            10,
            Stmt::assign(
                Expr::index("b", vec![Expr::var("i")]),
                Expr::index("a", vec![Expr::add(Expr::var("i"), Expr::int(1))]),
            )
            .at(4),
        )
        .spanning(3, 4);
        let fusion = FusionDependenceAnalysis::new(&first, &second, &AnalysisOptions::default()).unwrap();
        assert!(fusion.dependences().iter().all(|d| d.direction.len() == 1));
        let segments: BTreeSet<_> = fusion.variable_accesses().iter().map(|a| a.segment).collect();
        assert_eq!(segments.len(), 2);
        // the read of a[i+1] in the second loop comes before the write of a[i+1]
        // in the first loop's next iteration
        assert!(fusion
            .dependences()
            .iter()
            .any(|d| d.dependence_type == DependenceType::Anti && d.source.segment == 1 && d.sink.segment == 0));
    }

    #[test]
    fn test_report_summary() {
        let stmts = vec![
            Stmt::assign(Expr::var("x"), Expr::int(1)).at(1),
            Stmt::assign(Expr::var("x"), Expr::var("x")).at(2),
        ];
        let report = DependenceReport::from(&analyze(&stmts));
        assert_eq!(report.accesses, 3);
        assert_eq!(report.summary.num_flow, 1);
        assert_eq!(report.summary.num_output, 1);
        assert_eq!(report.summary.num_loop_independent, 2);
        assert_eq!(report.summary.num_input, 0);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"type\":\"FLOW\""));
    }

    #[test]
    fn test_summary_counts_input_dependences() {
        // x = y; z = y;
        let stmts = vec![
            Stmt::assign(Expr::var("x"), Expr::var("y")).at(1),
            Stmt::assign(Expr::var("z"), Expr::var("y")).at(2),
        ];
        let analysis = analyze(&stmts);
        let reads: Vec<&VariableAccess> =
            analysis.variable_accesses().iter().filter(|a| a.variable == Symbol::from("y")).collect();
        let input = DataDependence::new(reads[0].clone(), reads[1].clone(), DirectionVector::any(0));
        assert_eq!(input.dependence_type, DependenceType::Input);

        let summary = DependenceSummary::of(&[input]);
        assert_eq!(summary.num_input, 1);
        assert_eq!((summary.num_flow, summary.num_anti, summary.num_output), (0, 0, 0));
        assert!(summary.to_string().contains("    Input: 1"));

        let legacy: DependenceSummary = serde_json::from_str(
            r#"{"num_dependences":1,"num_flow":1,"num_anti":0,"num_output":0,
                "num_loop_carried":0,"num_loop_independent":1}"#,
        )
        .unwrap();
        assert_eq!(legacy.num_input, 0);
    }
}
