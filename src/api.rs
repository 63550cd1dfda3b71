use std::time::Duration;

use crate::document::{Document, NodeRef, TokenSource};
use crate::engine::{Executor, RuleMetrics};
use crate::pattern::DEFAULT_EXEC_FUEL;
use crate::{Produced, Program, TokenSpan};

/// Options that affect execution.
///
/// Neither option changes what a correct run produces, except that running
/// out of `exec_fuel` abandons the scan position it happened at.
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum matcher steps for one scan position.
    pub exec_fuel: u32,
    /// Skip token sequences that lack a rule's required literals.
    pub gate_rules: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { exec_fuel: DEFAULT_EXEC_FUEL, gate_rules: true }
    }
}

impl Options {
    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.exec_fuel = fuel;
        self
    }

    pub fn gate_rules(mut self, enabled: bool) -> Self {
        self.gate_rules = enabled;
        self
    }
}

/// An annotation produced by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Name of the rule that produced it.
    pub rule: String,
    /// Annotation type name.
    pub kind: String,
    pub span: TokenSpan,
    /// Byte offsets into the document text, when the document has them.
    pub byte_range: Option<(usize, usize)>,
    /// Covered text.
    pub text: String,
    /// Attributes in assignment order.
    pub attributes: Vec<(String, String)>,
}

impl Extraction {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// Result from [`extract`] and [`extract_with`].
#[derive(Debug, Clone)]
pub struct ExtractResult {
    /// The input text.
    pub text: String,
    /// Produced annotations, in creation order.
    pub results: Vec<Extraction>,
    /// Total elapsed time spent executing the program.
    pub elapsed: Duration,
}

/// A relation rendered with the text of both endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSummary {
    pub kind: String,
    pub source: String,
    pub target: String,
    pub value: String,
}

/// Additional details returned by [`extract_verbose_with`].
#[derive(Debug, Clone)]
pub struct ExtractDetails {
    pub total: Duration,
    /// Per-rule counters, in program order.
    pub rules: Vec<RuleMetrics>,
    /// Relations created during the run.
    pub relations: Vec<RelationSummary>,
    pub sentences: usize,
    pub tokens: usize,
}

/// Result from [`extract_verbose_with`].
#[derive(Debug, Clone)]
pub struct ExtractResultVerbose {
    pub text: String,
    pub results: Vec<Extraction>,
    pub elapsed: Duration,
    pub details: ExtractDetails,
}

/// Tokenize `text` and run `program` over it with default [`Options`].
///
/// # Example
/// ```
/// let program = caduceus::compile("[greeting]\n\"hello\"i\nannotation:\n capture=*\n type=GREETING\n").unwrap();
/// let out = caduceus::extract(&program, "Hello there. hello again.");
/// assert_eq!(out.results.len(), 2);
/// ```
pub fn extract(program: &Program, text: &str) -> ExtractResult {
    extract_with(program, text, &Options::default())
}

/// Tokenize `text` and run `program` over it.
pub fn extract_with(program: &Program, text: &str, options: &Options) -> ExtractResult {
    let mut doc = Document::tokenize(text);
    let run = Executor::new(program, options).run(&mut doc);
    ExtractResult {
        text: text.to_string(),
        results: to_extractions(program, &doc, run.produced),
        elapsed: run.metrics.total,
    }
}

/// [`extract_with`] plus per-rule metrics and the relations created.
pub fn extract_verbose_with(program: &Program, text: &str, options: &Options) -> ExtractResultVerbose {
    let mut doc = Document::tokenize(text);
    let run = Executor::new(program, options).run(&mut doc);

    let relations = doc
        .relations()
        .iter()
        .map(|r| RelationSummary {
            kind: program.types().name(r.kind).to_string(),
            source: node_text(&doc, r.source),
            target: node_text(&doc, r.target),
            value: r.value.clone(),
        })
        .collect();

    let details = ExtractDetails {
        total: run.metrics.total,
        rules: run.metrics.rules,
        relations,
        sentences: doc.sentences().len(),
        tokens: doc.token_count(),
    };
    let results = to_extractions(program, &doc, run.produced);

    ExtractResultVerbose { text: text.to_string(), results, elapsed: details.total, details }
}

pub(crate) fn to_extractions<D: TokenSource>(program: &Program, doc: &D, produced: Vec<Produced>) -> Vec<Extraction> {
    produced
        .into_iter()
        .map(|p| Extraction {
            rule: program.rules().get(p.rule).map(|r| r.name().to_string()).unwrap_or_default(),
            kind: program.types().name(p.kind).to_string(),
            span: p.span,
            byte_range: doc.byte_range(p.span),
            text: doc.covered_text(p.span),
            attributes: p.attributes,
        })
        .collect()
}

fn node_text(doc: &Document, node: NodeRef) -> String {
    let span = match node {
        NodeRef::Token(index) => TokenSpan::new(index, index + 1),
        NodeRef::Annotation(id) => match doc.annotation(id) {
            Some(annotation) => annotation.span,
            None => return String::new(),
        },
    };
    doc.covered_text(span)
}
