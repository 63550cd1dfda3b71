//! Caduceus: rule-based information extraction over token streams.
//!
//! A program is a list of named rules. Each rule pairs a token-level trigger
//! pattern with constructors that turn every match into annotations and
//! relations on a document.
//!
//! ```text
//! program text ── compile (program.rs, pattern.rs) ──▶ Program (immutable)
//!                                                        │
//! document ───────────── execute (engine.rs) ◀───────────┘
//!                          │
//!                          └─▶ annotations + relations (AnnotationSink)
//! ```

extern crate self as caduceus;

#[macro_use]
mod macros;
mod api;
pub mod document;
mod engine;
mod error;
pub mod pattern;
mod program;
pub mod types;

pub use api::{
    ExtractDetails, ExtractResult, ExtractResultVerbose, Extraction, Options, RelationSummary, extract,
    extract_verbose_with, extract_with,
};
pub use document::{AnnotationSink, Document, TokenSource};
pub use engine::{RuleMetrics, RunMetrics};
pub use error::{PatternSyntaxError, RuleSyntaxError, SourcePosition};
pub use pattern::{CompiledTrigger, DEFAULT_EXEC_FUEL, Match, TokenSeq};
pub use program::{AnnotationSpec, Endpoint, Program, RelationSpec, Rule, Scope, compile, compile_with};
pub use types::{TypeId, TypeKind, TypeTable};

/// Pattern compiler entry point: `Pattern::compile(text)`.
pub struct Pattern;

impl Pattern {
    pub fn compile(text: &str) -> Result<CompiledTrigger, PatternSyntaxError> {
        pattern::compile(text)
    }
}

// --- Shared types -----------------------------------------------------------

/// Half-open token range `[start, end)`, in absolute document token indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> Self {
        TokenSpan { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: TokenSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Internal record of one annotation created during a run. Converted to the
/// public [`Extraction`] by `api.rs`.
#[derive(Debug, Clone)]
pub(crate) struct Produced {
    /// Index of the producing rule in its program.
    pub rule: usize,
    pub kind: TypeId,
    pub span: TokenSpan,
    /// Attributes that evaluated successfully, in assignment order.
    pub attributes: Vec<(String, String)>,
}
