//! Rule executor.
//!
//! This module is the operational core of the engine:
//!
//! - Pick the token sequences each rule is scanned over (sentences, or the
//!   whole document for document-scoped rules).
//! - Skip sequences that cannot contain a rule's required literals (see
//!   `compiled_rules.rs` and `trigger.rs`).
//! - Run the trigger over each remaining sequence and, per match, build the
//!   rule's annotations and then its relations.
//!
//! ## Pass structure
//!
//! ```text
//! (0) trigger scan             -> surface forms per sequence (once per run)
//! (1) for rule in program order
//!       for sequence           -> gate, then find_all
//!         for match            -> constructors, then relations
//! ```
//!
//! Failures inside one match (missing capture, evaluation error, unresolved
//! endpoint) skip only the annotation, relation or assignment involved.
//! Nothing here returns an error.

use std::time::Instant;

use tracing::{debug, trace, warn};

use super::compiled_rules::{RuleFlags, RuleId};
use super::metrics::{RuleMetrics, RunResult};
use super::resolve;
use super::trigger::TriggerInfo;
use crate::api::Options;
use crate::document::{AnnotationId, AnnotationSink, TokenSource};
use crate::error::EvalError;
use crate::pattern::{Match, TokenSeq};
use crate::program::expr::{EvalContext, Value};
use crate::program::{AnnotationSpec, Program, RelationSpec, Rule, Scope};
use crate::{Produced, TokenSpan};

/// Applies one [`Program`] to documents.
///
/// Usage: `Executor::new(&program, &options).run(&mut doc)`.
#[derive(Debug)]
pub(crate) struct Executor<'a> {
    program: &'a Program,
    options: &'a Options,
}

/// Token sequences of one document, with their gating scans.
struct Sequences {
    sentences: Vec<TokenSpan>,
    whole: TokenSpan,
    sentence_info: Vec<TriggerInfo>,
    whole_info: Option<TriggerInfo>,
}

impl Sequences {
    fn new<D: TokenSource>(doc: &D, program: &Program, gate: bool) -> Self {
        let whole = TokenSpan::new(0, doc.token_count());
        let mut sentences = doc.sentences().to_vec();
        if sentences.is_empty() {
            sentences.push(whole);
        }
        let compiled = program.compiled();
        let fold_case = compiled.any(RuleFlags::FOLDS_CASE);
        let mut sequences = Sequences { sentences, whole, sentence_info: Vec::new(), whole_info: None };
        if gate && compiled.any(RuleFlags::GATED) {
            sequences.sentence_info =
                sequences.sentences.iter().map(|s| TriggerInfo::scan(&TokenSeq::new(doc, *s), fold_case)).collect();
            if compiled.any(RuleFlags::DOCUMENT_SCOPED) {
                sequences.whole_info = Some(TriggerInfo::scan(&TokenSeq::new(doc, whole), fold_case));
            }
            debug!(sentences = sequences.sentences.len(), "trigger scan complete");
        }
        sequences
    }

    /// `(span, gating info)` pairs for a rule of the given scope.
    fn for_scope(&self, scope: Scope) -> Vec<(TokenSpan, Option<&TriggerInfo>)> {
        match scope {
            Scope::Document => vec![(self.whole, self.whole_info.as_ref())],
            Scope::Sentence => {
                self.sentences.iter().enumerate().map(|(i, s)| (*s, self.sentence_info.get(i))).collect()
            }
        }
    }
}

impl<'a> Executor<'a> {
    pub fn new(program: &'a Program, options: &'a Options) -> Self {
        Executor { program, options }
    }

    /// Run every rule in program order against `doc`.
    pub fn run<D: TokenSource + AnnotationSink>(&self, doc: &mut D) -> RunResult {
        let started = Instant::now();
        let mut result = RunResult::default();
        let sequences = Sequences::new(&*doc, self.program, self.options.gate_rules);

        for (id, rule) in self.program.rules().iter().enumerate() {
            let rule_started = Instant::now();
            let mut metrics = RuleMetrics { rule: rule.name.clone(), ..RuleMetrics::default() };

            for (span, info) in sequences.for_scope(rule.scope) {
                if let Some(info) = info {
                    if !self.program.compiled().admits(id, info) {
                        metrics.sequences_skipped += 1;
                        continue;
                    }
                }
                metrics.sequences_scanned += 1;

                let found = rule.trigger.find_all_with(&TokenSeq::new(&*doc, span), self.options.exec_fuel);
                if !found.exhausted.is_empty() {
                    warn!(
                        rule = %rule.name,
                        positions = ?found.exhausted,
                        "backtracking fuel exhausted, scan positions skipped"
                    );
                    metrics.fuel_exhausted += found.exhausted.len();
                }
                for hit in &found.matches {
                    trace!(rule = %rule.name, span = ?hit.span(), "match");
                    metrics.matches += 1;
                    self.apply(id, rule, hit, doc, &mut metrics, &mut result.produced);
                }
            }

            metrics.duration = rule_started.elapsed();
            debug!(
                rule = %rule.name,
                scanned = metrics.sequences_scanned,
                gated = metrics.sequences_skipped,
                matches = metrics.matches,
                annotations = metrics.annotations,
                relations = metrics.relations,
                skipped = metrics.skipped,
                "rule finished"
            );
            result.metrics.rules.push(metrics);
        }

        result.metrics.total = started.elapsed();
        result
    }

    /// Constructors first, then relations, each in declaration order.
    fn apply<D: TokenSource + AnnotationSink>(
        &self,
        id: RuleId,
        rule: &Rule,
        found: &Match,
        doc: &mut D,
        metrics: &mut RuleMetrics,
        produced: &mut Vec<Produced>,
    ) {
        let mut built: Vec<Option<AnnotationId>> = Vec::with_capacity(rule.annotations.len());
        for spec in &rule.annotations {
            match self.construct(rule, spec, found, doc, metrics) {
                Ok((annotation, record)) => {
                    metrics.annotations += 1;
                    built.push(Some(annotation));
                    produced.push(Produced { rule: id, ..record });
                }
                Err(error) => {
                    debug!(rule = %rule.name, %error, "annotation skipped");
                    metrics.skipped += 1;
                    built.push(None);
                }
            }
        }

        for spec in &rule.relations {
            match self.relate(rule, spec, found, &built, doc) {
                Ok(true) => metrics.relations += 1,
                Ok(false) => {
                    trace!(rule = %rule.name, "relation guard is false");
                    metrics.guarded_out += 1;
                }
                Err(error) => {
                    debug!(rule = %rule.name, %error, "relation skipped");
                    metrics.skipped += 1;
                }
            }
        }
    }

    /// Build one annotation. A failing assignment drops only that attribute.
    fn construct<D: TokenSource + AnnotationSink>(
        &self,
        rule: &Rule,
        spec: &AnnotationSpec,
        found: &Match,
        doc: &mut D,
        metrics: &mut RuleMetrics,
    ) -> Result<(AnnotationId, Produced), EvalError> {
        let span = resolve::capture_span(rule, found, spec.capture)?;

        let mut attributes: Vec<(String, String)> = Vec::with_capacity(spec.assignments.len());
        for (name, expr) in &spec.assignments {
            let cx = EvalContext { tokens: &*doc, found, current: Some(attributes.as_slice()) };
            let value = expr.eval(&cx).and_then(Value::into_string);
            match value {
                Ok(value) => attributes.push((name.clone(), value)),
                Err(error) => {
                    debug!(rule = %rule.name, attribute = %name, %error, "assignment skipped");
                    metrics.skipped += 1;
                }
            }
        }

        let annotation = doc.add_annotation(spec.kind, span);
        for (name, value) in &attributes {
            doc.set_attribute(annotation, name, value.clone());
        }
        Ok((annotation, Produced { rule: 0, kind: spec.kind, span, attributes }))
    }

    /// Add one relation. `Ok(false)` means the guard rejected it.
    fn relate<D: TokenSource + AnnotationSink>(
        &self,
        rule: &Rule,
        spec: &RelationSpec,
        found: &Match,
        built: &[Option<AnnotationId>],
        doc: &mut D,
    ) -> Result<bool, EvalError> {
        let source = resolve::endpoint(&*doc, rule, spec.source, found, built)?;
        let target = resolve::endpoint(&*doc, rule, spec.target, found, built)?;

        let cx = EvalContext { tokens: &*doc, found, current: None };
        if let Some(guard) = &spec.guard {
            if !guard.eval(&cx)?.into_bool()? {
                return Ok(false);
            }
        }
        let value = spec.value.eval(&cx)?.into_string()?;

        doc.add_relation(spec.kind, source, target, value);
        Ok(true)
    }
}
