//! Source location tracking for diagnostics and dependence reports.
//!
//! Statements carry a [`Span`]; the start line of that span is the line
//! number printed in dependence strings, and span ordering is the lexical
//! order used by the control-flow feasibility filter.

use std::cmp::Ordering;
use std::fmt;
use serde::{Serialize, Deserialize};

/// A position in source code (line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl PartialOrd for SourceLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceLocation {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.line, self.column).cmp(&(other.line, other.column))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span in source code (start and end positions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start line (1-indexed)
    pub start_line: usize,
    /// Start column (1-indexed)
    pub start_column: usize,
    /// End line (1-indexed)
    pub end_line: usize,
    /// End column (1-indexed)
    pub end_column: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self { start_line, start_column, end_line, end_column }
    }

    /// A span covering a single whole line.
    pub fn line(line: usize) -> Self {
        Self::new(line, 1, line, usize::MAX)
    }

    /// A span from the start of `first` to the end of `last`.
    pub fn lines(first: usize, last: usize) -> Self {
        Self::new(first, 1, last, usize::MAX)
    }

    /// Create a dummy span (for generated code).
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Check if this span is a dummy span.
    pub fn is_dummy(&self) -> bool {
        self.start_line == 0 && self.end_line == 0
    }

    /// Get the start location.
    pub fn start(&self) -> SourceLocation {
        SourceLocation::new(self.start_line, self.start_column)
    }

    /// Get the end location.
    pub fn end(&self) -> SourceLocation {
        SourceLocation::new(self.end_line, self.end_column)
    }

    /// Merge two spans to create a span covering both.
    pub fn merge(&self, other: &Span) -> Span {
        let start = self.start().min(other.start());
        let end = self.end().max(other.end());
        Span::new(start.line, start.column, end.line, end.column)
    }

    /// Check if this span contains a location.
    pub fn contains(&self, loc: &SourceLocation) -> bool {
        self.start() <= *loc && *loc <= self.end()
    }

    /// True if this span starts strictly before `other` starts.
    pub fn precedes(&self, other: &Span) -> bool {
        self.start() < other.start()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.end_column == usize::MAX {
            if self.start_line == self.end_line {
                write!(f, "line {}", self.start_line)
            } else {
                write!(f, "lines {}-{}", self.start_line, self.end_line)
            }
        } else if self.start_line == self.end_line {
            write!(f, "{}:{}-{}", self.start_line, self.start_column, self.end_column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start_line, self.start_column, self.end_line, self.end_column
            )
        }
    }
}
