use crate::checker::Checker;
use serde::Serialize;
use tree_sitter::{Node, Range};

/// A single finding produced by ctxflow.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Diagnostic {
    pub checker: Checker,
    pub file: Option<String>,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(checker: Checker, span: Span, message: impl Into<String>) -> Self {
        Self {
            checker,
            file: None,
            span,
            message: message.into(),
        }
    }

    pub fn at_node(checker: Checker, node: Node, message: impl Into<String>) -> Self {
        Self::new(checker, Span::from_range(node.range()), message)
    }

    /// Sort key used for stable output: position first, then checker name.
    pub fn sort_key(&self) -> (usize, usize, &'static str) {
        (self.span.start.row, self.span.start.column, self.checker.name())
    }
}

/// Span in a Go source file (1-based row/column positions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// Single position in a Go source file (1-based row/column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Span {
    /// Construct a `Span` from a tree-sitter range, converting to 1-based positions.
    #[must_use]
    pub fn from_range(range: Range) -> Self {
        Self {
            start: Position {
                row: range.start_point.row + 1,
                column: range.start_point.column + 1,
            },
            end: Position {
                row: range.end_point.row + 1,
                column: range.end_point.column + 1,
            },
        }
    }
}
