//! Token-level trigger patterns.
//!
//! A trigger is compiled once from text into an immutable AST
//! ([`CompiledTrigger`]) and then scanned against any number of token
//! sequences. Matching works on tokens, not characters: a literal matches one
//! whole token, a predicate tests one token's attributes.
//!
//! ```text
//! "Dr"i (?<name> {pos=NNP}+)      pattern text
//!        │ parser.rs
//!        v
//! Sequence[Literal, Group#1(Repetition(Predicate))]
//!        │ matcher.rs (backtracking)
//!        v
//! Match { *: 3..5, name: 4..5 }
//! ```
//!
//! - `ast.rs`: node types and the required-literal analysis used for gating.
//! - `parser.rs`: grammar and every structural error.
//! - `matcher.rs`: backtracking scan with a step budget.

#[path = "pattern/ast.rs"]
pub(crate) mod ast;
#[path = "pattern/matcher.rs"]
mod matcher;
#[path = "pattern/parser.rs"]
mod parser;

use std::fmt;

use crate::TokenSpan;
use crate::document::TokenSource;
use crate::error::PatternSyntaxError;
use ast::{Node, RequiredLiteral};
use matcher::{Matcher, Scan};

pub use matcher::{DEFAULT_EXEC_FUEL, FindAll, MAX_MATCH_DEPTH};
pub use parser::{MAX_DEPTH, MAX_REPEAT};

/// Name of the implicit whole-match capture (slot 0).
pub const WHOLE_MATCH: &str = "*";

/// Compile pattern text into a [`CompiledTrigger`].
pub fn compile(text: &str) -> Result<CompiledTrigger, PatternSyntaxError> {
    CompiledTrigger::compile(text)
}

/// A compiled trigger pattern plus its capture table.
#[derive(Debug, Clone)]
pub struct CompiledTrigger {
    root: Node,
    /// Capture names by slot; slot 0 is [`WHOLE_MATCH`].
    captures: Vec<String>,
    required: Vec<RequiredLiteral>,
}

impl CompiledTrigger {
    pub fn compile(text: &str) -> Result<Self, PatternSyntaxError> {
        let (root, named) = parser::parse(text)?;
        let mut captures = Vec::with_capacity(named.len() + 1);
        captures.push(WHOLE_MATCH.to_string());
        captures.extend(named);
        let required = root.required_literals();
        Ok(CompiledTrigger { root, captures, required })
    }

    /// Capture names by slot, starting with [`WHOLE_MATCH`].
    pub fn capture_names(&self) -> &[String] {
        &self.captures
    }

    pub fn capture_index(&self, name: &str) -> Option<usize> {
        self.captures.iter().position(|c| c == name)
    }

    /// Span bound to capture `name` in `m`.
    pub fn capture(&self, m: &Match, name: &str) -> Option<TokenSpan> {
        m.get(self.capture_index(name)?)
    }

    pub(crate) fn required_literals(&self) -> &[RequiredLiteral] {
        &self.required
    }

    /// Match with the first token fixed at `start`.
    pub fn scan(&self, tokens: &TokenSeq<'_>, start: usize) -> Option<Match> {
        if !tokens.contains(start) {
            return None;
        }
        let mut matcher = Matcher::new(*tokens, self.captures.len(), DEFAULT_EXEC_FUEL);
        match matcher.scan(&self.root, start, DEFAULT_EXEC_FUEL) {
            Scan::Matched(m) => Some(m),
            Scan::NoMatch | Scan::Exhausted => None,
        }
    }

    /// All non-overlapping matches, left to right.
    pub fn find_all(&self, tokens: &TokenSeq<'_>) -> Vec<Match> {
        self.find_all_with(tokens, DEFAULT_EXEC_FUEL).matches
    }

    /// [`find_all`](Self::find_all) with an explicit per-scan step budget.
    ///
    /// After a match the cursor jumps to its end; after a failure it moves
    /// one token. Matches are never empty, so the loop always advances.
    pub fn find_all_with(&self, tokens: &TokenSeq<'_>, fuel: u32) -> FindAll {
        let mut result = FindAll::default();
        let mut matcher = Matcher::new(*tokens, self.captures.len(), fuel);
        let mut pos = tokens.span().start;
        while pos < tokens.span().end {
            match matcher.scan(&self.root, pos, fuel) {
                Scan::Matched(m) => {
                    pos = m.span().end;
                    result.matches.push(m);
                }
                Scan::NoMatch => pos += 1,
                Scan::Exhausted => {
                    result.exhausted.push(pos);
                    pos += 1;
                }
            }
        }
        result
    }
}

/// One trigger application: capture spans indexed by slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    captures: Box<[Option<TokenSpan>]>,
}

impl Match {
    /// Span of the whole match.
    pub fn span(&self) -> TokenSpan {
        self.captures.first().copied().flatten().unwrap_or_default()
    }

    /// Span bound to capture slot `index`, if the group participated.
    pub fn get(&self, index: usize) -> Option<TokenSpan> {
        self.captures.get(index).copied().flatten()
    }

    pub fn captures(&self) -> &[Option<TokenSpan>] {
        &self.captures
    }
}

/// A view of a contiguous token range of a document: one sentence, or the
/// whole document for document-scoped triggers.
#[derive(Clone, Copy)]
pub struct TokenSeq<'a> {
    source: &'a dyn TokenSource,
    span: TokenSpan,
}

impl<'a> TokenSeq<'a> {
    pub fn new(source: &'a dyn TokenSource, span: TokenSpan) -> Self {
        let end = span.end.min(source.token_count());
        TokenSeq { source, span: TokenSpan::new(span.start.min(end), end) }
    }

    /// Every token of `source`.
    pub fn whole(source: &'a dyn TokenSource) -> Self {
        Self::new(source, TokenSpan::new(0, source.token_count()))
    }

    pub fn span(&self) -> TokenSpan {
        self.span
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.span.start && index < self.span.end
    }

    pub fn text(&self, index: usize) -> &'a str {
        self.source.token_text(index)
    }

    pub fn value(&self, index: usize, attr: &str) -> Option<&'a str> {
        self.source.token_value(index, attr)
    }

    pub fn source(&self) -> &'a dyn TokenSource {
        self.source
    }
}

impl fmt::Debug for TokenSeq<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSeq").field("span", &self.span).finish()
    }
}
