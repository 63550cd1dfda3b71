//! Error types.
//!
//! Compile-time errors ([`PatternSyntaxError`], [`RuleSyntaxError`]) are fatal
//! to compiling a program and are returned to the caller. Run-time
//! [`EvalError`]s never leave the engine: the executor logs them and skips the
//! single assignment, annotation or relation that failed.

use std::fmt;

use thiserror::Error;

/// A malformed trigger pattern.
///
/// `position` is a byte offset into the pattern text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pattern syntax error at offset {position}: {message}")]
pub struct PatternSyntaxError {
    pub position: usize,
    pub message: String,
}

impl PatternSyntaxError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self { position, message: message.into() }
    }
}

/// Location inside program source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl SourcePosition {
    /// Compute line/column for `offset` in `source`.
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before.get(line_start..).map(|s| s.chars().count()).unwrap_or(0) + 1;
        Self { offset, line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A malformed rule program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct RuleSyntaxError {
    /// Name of the rule being compiled, when the error occurred inside one.
    pub rule: Option<String>,
    pub position: SourcePosition,
    pub message: String,
}

impl fmt::Display for RuleSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "rule syntax error in [{}] at {}: {}", rule, self.position, self.message),
            None => write!(f, "rule syntax error at {}: {}", self.position, self.message),
        }
    }
}

/// Per-match construction failure. Recovered locally by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum EvalError {
    #[error("capture `{0}` did not bind any tokens")]
    MissingCapture(String),

    #[error("attribute `{attribute}` is not available on `{target}`")]
    UnresolvedAttribute { target: String, attribute: String },

    #[error("no annotation or token found for endpoint `{0}`")]
    UnresolvedEndpoint(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: &'static str },
}
