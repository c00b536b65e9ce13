//! Error types for the dependence analyzer.
//!
//! Errors are organized by the phase that produces them: the access
//! collector raises [`UnsupportedConstruct`], the pairwise driver raises
//! [`AnalysisError::IndexMutationInLoop`] and [`AnalysisError::Cancelled`],
//! and the eliminator raises [`SolverError`]. Solver errors never leave the
//! dependence tester; they are turned into a conservative answer there.

use thiserror::Error;
use crate::utils::location::Span;
use std::fmt;

/// Top-level error type for a dependence analysis.
///
/// Every variant means "dependences unknown". None of them may be read as
/// "no dependences".
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    /// The collector met a construct it cannot model
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(#[from] UnsupportedConstruct),

    /// A loop's own index variable is written inside its body
    #[error("Loop index '{variable}' is modified inside the loop body at {span}")]
    IndexMutationInLoop {
        /// The index variable
        variable: String,
        /// Location of the offending write
        span: Span,
    },

    /// Cooperative cancellation was observed
    #[error("Dependence analysis was cancelled")]
    Cancelled,

    /// Eliminator failure that escaped the conservative fallback
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// Query about a name that is not local to the analyzed function
    #[error("'{0}' is not a local variable of the analyzed function")]
    NotLocal(String),
}

impl AnalysisError {
    /// Source location attached to the error, if any.
    pub fn span(&self) -> Option<Span> {
        match self {
            AnalysisError::UnsupportedConstruct(err) => Some(err.span),
            AnalysisError::IndexMutationInLoop { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// Convert into a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.to_string());
        match self.span() {
            Some(span) => diagnostic.with_span(span),
            None => diagnostic,
        }
    }
}

/// A statement or expression form the access collector cannot linearize.
#[derive(Error, Debug, Clone)]
pub struct UnsupportedConstruct {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of construct
    pub kind: UnsupportedKind,
}

impl UnsupportedConstruct {
    /// Create a new unsupported-construct error.
    pub fn new(kind: UnsupportedKind, span: Span, message: impl Into<String>) -> Self {
        Self { message: message.into(), span, kind }
    }

    /// Source line of the construct.
    pub fn line(&self) -> usize {
        self.span.start_line
    }
}

impl fmt::Display for UnsupportedConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedKind {
    /// `goto` statement
    Goto,
    /// `return` statement
    Return,
    /// Loop that is not a counted loop
    UncountedLoop,
    /// Call to a function with unknown effects
    UnknownCall,
    /// Pointer declarator
    PointerDeclaration,
    /// Brace-enclosed initializer list
    InitializerList,
    /// Address-of or dereference
    PointerOperation,
    /// Comma or cast expression
    Expression,
    /// Expression statement that is not an assignment or increment
    ExpressionStatement,
    /// Anything else
    Unrecognized,
}

/// Internal failure inside the Fourier-Motzkin eliminator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverError {
    /// The constraint matrix has no rows
    #[error("empty constraint matrix")]
    EmptyMatrix,

    /// A column index past the right-hand side was requested
    #[error("column {column} out of bounds for matrix with {columns} columns")]
    ColumnOutOfBounds {
        /// Requested column
        column: usize,
        /// Columns in the matrix, right-hand side included
        columns: usize,
    },

    /// Elimination produced more rows than the configured cap
    #[error("constraint system grew past {limit} rows")]
    RowLimitExceeded {
        /// The configured cap
        limit: usize,
    },

    /// Cancellation observed inside the eliminator
    #[error("elimination cancelled")]
    Cancelled,
}

/// A diagnostic message with severity level.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level
    pub severity: DiagnosticSeverity,
    /// Message
    pub message: String,
    /// Primary span
    pub span: Option<Span>,
    /// Additional notes
    pub notes: Vec<String>,
    /// Suggested fix (if any)
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// Error - the transformation must not be applied
    Error,
    /// Warning - the transformation is legal but may not help
    Warning,
    /// Note - informational message
    Note,
    /// Help - suggestion for fixing the issue
    Help,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Note => write!(f, "note"),
            DiagnosticSeverity::Help => write!(f, "help"),
        }
    }
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, message)
    }

    fn with_severity(severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            span: None,
            notes: Vec::new(),
            suggestion: None,
        }
    }

    /// Add a span to the diagnostic.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Add a note to the diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Add a suggestion to the diagnostic.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({})", span)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  help: {}", suggestion)?;
        }
        Ok(())
    }
}

/// Result type using AnalysisError.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type for the eliminator.
pub type SolverResult<T> = Result<T, SolverError>;
