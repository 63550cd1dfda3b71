//! Compiled rule programs.
//!
//! ```text
//! [person]                                  Rule { name: "person",
//! "Dr"i (?<name> {pos=NNP}+)                       trigger: CompiledTrigger,
//! annotation:                     compile          annotations: [AnnotationSpec],
//!     capture=name               ────────▶        relations: [RelationSpec] }
//!     type=PERSON
//!     $title = "Dr"
//! ```
//!
//! A [`Program`] is immutable once compiled and can be shared across threads;
//! each `execute` call works on its own document.
//!
//! - `parser.rs`: the rule file grammar and every compile-time check.
//! - `expr.rs`: attribute and relation value expressions.

#[path = "program/expr.rs"]
pub(crate) mod expr;
#[path = "program/parser.rs"]
mod parser;

use crate::api::{Extraction, Options, to_extractions};
use crate::document::{AnnotationSink, TokenSource};
use crate::engine::{CompiledRules, Executor, RunMetrics};
use crate::error::RuleSyntaxError;
use crate::pattern::CompiledTrigger;
use crate::types::{TypeId, TypeTable};
use expr::Expr;
use parser::Types;

/// Compile program text, interning every type name it mentions into a fresh
/// [`TypeTable`] (available afterwards through [`Program::types`]).
pub fn compile(text: &str) -> Result<Program, RuleSyntaxError> {
    Program::build(text, Types::Open(TypeTable::new()))
}

/// Compile program text against a caller-owned type table. Unknown type
/// names, and names of the wrong kind, are compile errors.
pub fn compile_with(text: &str, types: &TypeTable) -> Result<Program, RuleSyntaxError> {
    Program::build(text, Types::Fixed(types))
}

/// Token sequences a rule's trigger is scanned over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Each sentence separately.
    #[default]
    Sentence,
    /// The whole document as one sequence.
    Document,
}

/// A relation endpoint, resolved at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The annotation built by the rule's constructor at this index.
    Constructed(usize),
    /// Whatever node the document has at this capture's span.
    Capture(usize),
}

/// `annotation:` block.
#[derive(Debug, Clone)]
pub struct AnnotationSpec {
    pub(crate) capture: usize,
    pub(crate) kind: TypeId,
    pub(crate) name: Option<String>,
    pub(crate) assignments: Vec<(String, Expr)>,
}

impl AnnotationSpec {
    /// Capture slot whose span the annotation covers.
    pub fn capture(&self) -> usize {
        self.capture
    }

    pub fn kind(&self) -> TypeId {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Assigned attribute names, in evaluation order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|(name, _)| name.as_str())
    }
}

/// `relation:` block.
#[derive(Debug, Clone)]
pub struct RelationSpec {
    pub(crate) source: Endpoint,
    pub(crate) target: Endpoint,
    pub(crate) kind: TypeId,
    pub(crate) value: Expr,
    pub(crate) guard: Option<Expr>,
}

impl RelationSpec {
    pub fn source(&self) -> Endpoint {
        self.source
    }

    pub fn target(&self) -> Endpoint {
        self.target
    }

    pub fn kind(&self) -> TypeId {
        self.kind
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) name: String,
    pub(crate) trigger: CompiledTrigger,
    pub(crate) scope: Scope,
    pub(crate) annotations: Vec<AnnotationSpec>,
    pub(crate) relations: Vec<RelationSpec>,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> &CompiledTrigger {
        &self.trigger
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn annotations(&self) -> &[AnnotationSpec] {
        &self.annotations
    }

    pub fn relations(&self) -> &[RelationSpec] {
        &self.relations
    }

    /// Name an endpoint the way the rule file spells it.
    pub(crate) fn endpoint_name(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Constructed(index) => self
                .annotations
                .get(index)
                .map(|spec| spec.name.as_deref().unwrap_or_else(|| self.capture_name(spec.capture)))
                .unwrap_or("?"),
            Endpoint::Capture(slot) => self.capture_name(slot),
        }
    }

    pub(crate) fn capture_name(&self, slot: usize) -> &str {
        self.trigger.capture_names().get(slot).map(String::as_str).unwrap_or("?")
    }
}

/// An ordered, immutable set of rules plus the type table they were
/// compiled against.
#[derive(Debug, Clone)]
pub struct Program {
    rules: Vec<Rule>,
    types: TypeTable,
    compiled: CompiledRules,
}

impl Program {
    fn build(text: &str, types: Types<'_>) -> Result<Self, RuleSyntaxError> {
        let (rules, types) = parser::parse_program(text, types)?;
        let compiled = CompiledRules::new(&rules);
        tracing::debug!(rules = rules.len(), types = types.len(), "program compiled");
        Ok(Program { rules, types, compiled })
    }

    /// Rules in execution order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub(crate) fn compiled(&self) -> &CompiledRules {
        &self.compiled
    }

    /// Run every rule against `doc`, in program order, adding annotations and
    /// relations in place.
    ///
    /// Running the same program twice on one document duplicates its output;
    /// nothing is de-duplicated.
    pub fn execute<D: TokenSource + AnnotationSink>(&self, doc: &mut D) {
        self.execute_with(doc, &Options::default());
    }

    /// [`execute`](Self::execute) with explicit options, returning per-rule
    /// metrics.
    pub fn execute_with<D: TokenSource + AnnotationSink>(&self, doc: &mut D, options: &Options) -> RunMetrics {
        Executor::new(self, options).run(doc).metrics
    }

    /// Run the program against a copy of `doc` and return every annotation it
    /// produced, in creation order. `doc` itself is left untouched.
    pub fn extract_all<D: TokenSource + AnnotationSink + Clone>(&self, doc: &D) -> Vec<Extraction> {
        let mut scratch = doc.clone();
        let result = Executor::new(self, &Options::default()).run(&mut scratch);
        to_extractions(self, &scratch, result.produced)
    }
}
