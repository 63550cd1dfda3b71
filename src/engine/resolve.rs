//! Capture and endpoint resolution.
//!
//! Turns the compile-time references held by annotation and relation specs
//! into concrete spans and document nodes for one match.
//!
//! ```text
//! Endpoint::Constructed(i) ──▶ annotation built for constructor i in this match
//! Endpoint::Capture(slot)  ──▶ capture span ──▶ AnnotationSink::node_at(span)
//! ```

use crate::TokenSpan;
use crate::document::{AnnotationId, AnnotationSink, NodeRef};
use crate::error::EvalError;
use crate::pattern::Match;
use crate::program::{Endpoint, Rule};

/// Span bound to capture `slot`. Unbound and zero-token captures both count
/// as missing.
pub(crate) fn capture_span(rule: &Rule, found: &Match, slot: usize) -> Result<TokenSpan, EvalError> {
    match found.get(slot) {
        Some(span) if !span.is_empty() => Ok(span),
        _ => Err(EvalError::MissingCapture(rule.capture_name(slot).to_string())),
    }
}

/// Resolve a relation endpoint for the current match.
///
/// `built[i]` is the annotation produced by constructor `i` for this match,
/// or `None` when that constructor was skipped.
pub(crate) fn endpoint<S: AnnotationSink + ?Sized>(
    sink: &S,
    rule: &Rule,
    endpoint: Endpoint,
    found: &Match,
    built: &[Option<AnnotationId>],
) -> Result<NodeRef, EvalError> {
    match endpoint {
        Endpoint::Constructed(index) => built
            .get(index)
            .copied()
            .flatten()
            .map(NodeRef::Annotation)
            .ok_or_else(|| EvalError::UnresolvedEndpoint(rule.endpoint_name(endpoint).to_string())),
        Endpoint::Capture(slot) => {
            let span = capture_span(rule, found, slot)?;
            sink.node_at(span).ok_or_else(|| EvalError::UnresolvedEndpoint(rule.endpoint_name(endpoint).to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::pattern::TokenSeq;

    fn setup() -> (crate::Program, Document, Match) {
        let program = crate::compile(indoc::indoc! {r#"
            [r]
            (?<A> "a") (?<B> "b" "c") (?<C> "x")?
            annotation:
                capture=A
                type=X
        "#})
        .unwrap();
        let doc = Document::from_sentences(&[&["a", "b", "c"]]);
        let found = program.rules()[0].trigger().find_all(&TokenSeq::whole(&doc)).remove(0);
        (program, doc, found)
    }

    #[test]
    fn missing_capture_is_reported_by_name() {
        let (program, _, found) = setup();
        let rule = &program.rules()[0];
        assert_eq!(capture_span(rule, &found, 1), Ok(TokenSpan::new(0, 1)));
        assert_eq!(capture_span(rule, &found, 3), Err(EvalError::MissingCapture("C".into())));
    }

    #[test]
    fn endpoints_use_built_annotations_then_document_nodes() {
        let (program, doc, found) = setup();
        let rule = &program.rules()[0];
        let id = AnnotationId(7);
        assert_eq!(endpoint(&doc, rule, Endpoint::Constructed(0), &found, &[Some(id)]), Ok(NodeRef::Annotation(id)));
        assert_eq!(
            endpoint(&doc, rule, Endpoint::Constructed(0), &found, &[None]),
            Err(EvalError::UnresolvedEndpoint("A".into()))
        );
        assert_eq!(endpoint(&doc, rule, Endpoint::Capture(1), &found, &[]), Ok(NodeRef::Token(0)));
        // Two tokens with no annotation over them.
        assert_eq!(
            endpoint(&doc, rule, Endpoint::Capture(2), &found, &[]),
            Err(EvalError::UnresolvedEndpoint("B".into()))
        );
    }
}
