//! Document capabilities consumed by the engine.
//!
//! The engine never assumes a concrete document representation. It reads
//! tokens through [`TokenSource`] and writes results through
//! [`AnnotationSink`]. [`Document`] is a small in-memory implementation of
//! both, used by the CLI and the tests.
//!
//! ```text
//! TokenSource ──▶ matcher (token text + attributes, sentence spans)
//! AnnotationSink ◀── executor (annotations, attributes, relations)
//! ```

use crate::TokenSpan;
use crate::types::TypeId;

/// Attribute name that always addresses the token surface form.
pub const TEXT_ATTR: &str = "text";

/// Read access to tokens and their boundaries.
pub trait TokenSource {
    fn token_count(&self) -> usize;

    fn token_text(&self, index: usize) -> &str;

    /// Named per-token attribute (lemma, part-of-speech, ...).
    fn token_attr(&self, index: usize, name: &str) -> Option<&str>;

    /// Sentence boundaries as absolute token spans, in document order. An
    /// empty slice means the whole document is a single sentence.
    fn sentences(&self) -> &[TokenSpan];

    /// Text covered by `span`. The default joins token texts with a space.
    fn covered_text(&self, span: TokenSpan) -> String {
        (span.start..span.end).map(|i| self.token_text(i)).collect::<Vec<_>>().join(" ")
    }

    /// Byte offsets of `span` in the underlying text, when the source has one.
    fn byte_range(&self, _span: TokenSpan) -> Option<(usize, usize)> {
        None
    }

    /// Attribute lookup that routes [`TEXT_ATTR`] to the surface form.
    fn token_value(&self, index: usize, name: &str) -> Option<&str> {
        if name == TEXT_ATTR { Some(self.token_text(index)) } else { self.token_attr(index, name) }
    }
}

/// Opaque handle of an annotation inside a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(pub u32);

/// A relation endpoint: an annotation or a bare token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Token(usize),
    Annotation(AnnotationId),
}

/// Write access to the annotation/relation graph.
pub trait AnnotationSink {
    fn add_annotation(&mut self, kind: TypeId, span: TokenSpan) -> AnnotationId;

    fn set_attribute(&mut self, id: AnnotationId, name: &str, value: String);

    /// Node for `span`: the annotation at (or enclosing) that span, or the
    /// token itself for single-token spans.
    fn node_at(&self, span: TokenSpan) -> Option<NodeRef>;

    fn add_relation(&mut self, kind: TypeId, source: NodeRef, target: NodeRef, value: String);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenData {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub kind: TypeId,
    pub span: TokenSpan,
    /// Attributes in assignment order.
    pub attributes: Vec<(String, String)>,
}

impl Annotation {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub kind: TypeId,
    pub source: NodeRef,
    pub target: NodeRef,
    pub value: String,
}

/// In-memory document: text, tokens, sentences, annotations and relations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    text: String,
    tokens: Vec<TokenData>,
    sentences: Vec<TokenSpan>,
    annotations: Vec<Annotation>,
    relations: Vec<Relation>,
}

impl Document {
    /// Tokenize `text` into words and punctuation, splitting sentences after
    /// `.`, `!` and `?`.
    pub fn tokenize(text: &str) -> Self {
        let word = crate::regex!(r"\w+(?:['’-]\w+)*|[^\w\s]");
        let mut tokens = Vec::new();
        let mut sentences = Vec::new();
        let mut sentence_start = 0;

        for m in word.find_iter(text) {
            tokens.push(TokenData { start: m.start(), end: m.end(), attrs: Vec::new() });
            if matches!(m.as_str(), "." | "!" | "?") {
                sentences.push(TokenSpan::new(sentence_start, tokens.len()));
                sentence_start = tokens.len();
            }
        }
        if sentence_start < tokens.len() {
            sentences.push(TokenSpan::new(sentence_start, tokens.len()));
        }

        Document { text: text.to_string(), tokens, sentences, annotations: Vec::new(), relations: Vec::new() }
    }

    /// Build a document from pre-tokenized sentences. Tokens are joined with
    /// single spaces.
    pub fn from_sentences(sentences: &[&[&str]]) -> Self {
        let mut doc = Document::default();
        for sentence in sentences {
            let first = doc.tokens.len();
            for token in sentence.iter() {
                if !doc.text.is_empty() {
                    doc.text.push(' ');
                }
                let start = doc.text.len();
                doc.text.push_str(token);
                doc.tokens.push(TokenData { start, end: doc.text.len(), attrs: Vec::new() });
            }
            if doc.tokens.len() > first {
                doc.sentences.push(TokenSpan::new(first, doc.tokens.len()));
            }
        }
        doc
    }

    /// Set (or replace) a per-token attribute. Out-of-range indices are ignored.
    pub fn set_token_attr(&mut self, index: usize, name: &str, value: &str) {
        let Some(token) = self.tokens.get_mut(index) else {
            return;
        };
        match token.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => token.attrs.push((name.to_string(), value.to_string())),
        }
    }

    /// Set attribute `name` on consecutive tokens starting at 0.
    pub fn with_token_attrs(mut self, name: &str, values: &[&str]) -> Self {
        for (index, value) in values.iter().enumerate() {
            self.set_token_attr(index, name, value);
        }
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[TokenData] {
        &self.tokens
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(id.0 as usize)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relations whose source is `node`, in creation order.
    pub fn outgoing(&self, node: NodeRef) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(move |r| r.source == node)
    }

    /// Remove every annotation and relation, keeping tokens.
    pub fn clear_annotations(&mut self) {
        self.annotations.clear();
        self.relations.clear();
    }
}

impl TokenSource for Document {
    fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn token_text(&self, index: usize) -> &str {
        self.tokens.get(index).and_then(|t| self.text.get(t.start..t.end)).unwrap_or("")
    }

    fn token_attr(&self, index: usize, name: &str) -> Option<&str> {
        let token = self.tokens.get(index)?;
        token.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn sentences(&self) -> &[TokenSpan] {
        &self.sentences
    }

    fn covered_text(&self, span: TokenSpan) -> String {
        self.byte_range(span).and_then(|(s, e)| self.text.get(s..e)).unwrap_or("").to_string()
    }

    fn byte_range(&self, span: TokenSpan) -> Option<(usize, usize)> {
        if span.is_empty() {
            return None;
        }
        let first = self.tokens.get(span.start)?;
        let last = self.tokens.get(span.end - 1)?;
        Some((first.start, last.end))
    }
}

impl AnnotationSink for Document {
    fn add_annotation(&mut self, kind: TypeId, span: TokenSpan) -> AnnotationId {
        let id = AnnotationId(self.annotations.len() as u32);
        self.annotations.push(Annotation { id, kind, span, attributes: Vec::new() });
        id
    }

    fn set_attribute(&mut self, id: AnnotationId, name: &str, value: String) {
        let Some(ann) = self.annotations.get_mut(id.0 as usize) else {
            return;
        };
        match ann.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => ann.attributes.push((name.to_string(), value)),
        }
    }

    fn node_at(&self, span: TokenSpan) -> Option<NodeRef> {
        // Latest exact match wins, then the tightest enclosing annotation.
        if let Some(ann) = self.annotations.iter().rev().find(|a| a.span == span) {
            return Some(NodeRef::Annotation(ann.id));
        }
        let enclosing = self
            .annotations
            .iter()
            .rev()
            .filter(|a| a.span.contains(span))
            .min_by_key(|a| a.span.len());
        if let Some(ann) = enclosing {
            return Some(NodeRef::Annotation(ann.id));
        }
        if span.len() == 1 && span.start < self.tokens.len() {
            return Some(NodeRef::Token(span.start));
        }
        None
    }

    fn add_relation(&mut self, kind: TypeId, source: NodeRef, target: NodeRef, value: String) {
        self.relations.push(Relation { kind, source, target, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn tokenize_splits_words_punctuation_and_sentences() {
        let doc = Document::tokenize("Alice met Bob. Then Alice left!");
        let words: Vec<&str> = (0..doc.token_count()).map(|i| doc.token_text(i)).collect();
        assert_eq!(words, ["Alice", "met", "Bob", ".", "Then", "Alice", "left", "!"]);
        assert_eq!(doc.sentences(), &[TokenSpan::new(0, 4), TokenSpan::new(4, 8)]);
        assert_eq!(doc.covered_text(TokenSpan::new(0, 3)), "Alice met Bob");
    }

    #[test]
    fn trailing_tokens_form_a_sentence() {
        let doc = Document::tokenize("no final stop");
        assert_eq!(doc.sentences(), &[TokenSpan::new(0, 3)]);
    }

    #[test]
    fn node_at_prefers_exact_then_enclosing_then_token() {
        let mut types = TypeTable::new();
        let ty = types.annotation("NP");
        let mut doc = Document::from_sentences(&[&["the", "red", "car"]]);
        assert_eq!(doc.node_at(TokenSpan::new(1, 2)), Some(NodeRef::Token(1)));
        assert_eq!(doc.node_at(TokenSpan::new(0, 2)), None);

        let outer = doc.add_annotation(ty, TokenSpan::new(0, 3));
        assert_eq!(doc.node_at(TokenSpan::new(1, 2)), Some(NodeRef::Annotation(outer)));

        let exact = doc.add_annotation(ty, TokenSpan::new(1, 2));
        assert_eq!(doc.node_at(TokenSpan::new(1, 2)), Some(NodeRef::Annotation(exact)));
    }

    #[test]
    fn attributes_replace_in_place() {
        let mut types = TypeTable::new();
        let ty = types.annotation("X");
        let mut doc = Document::from_sentences(&[&["a"]]);
        let id = doc.add_annotation(ty, TokenSpan::new(0, 1));
        doc.set_attribute(id, "k", "1".into());
        doc.set_attribute(id, "j", "2".into());
        doc.set_attribute(id, "k", "3".into());
        let ann = doc.annotation(id).unwrap();
        assert_eq!(ann.attributes, vec![("k".to_string(), "3".to_string()), ("j".to_string(), "2".to_string())]);
    }

    #[test]
    fn token_value_routes_text() {
        let doc = Document::from_sentences(&[&["runs"]]).with_token_attrs("lemma", &["run"]);
        assert_eq!(doc.token_value(0, TEXT_ATTR), Some("runs"));
        assert_eq!(doc.token_value(0, "lemma"), Some("run"));
        assert_eq!(doc.token_value(0, "pos"), None);
    }
}
