//! Recursive-descent parser for trigger patterns.
//!
//! ```text
//! pattern     := alternation
//! alternation := sequence ('|' sequence)*
//! sequence    := quantified+
//! quantified  := atom quantifier?          (quantifier must touch its atom)
//! atom        := "lit"[i] | {cond,...}[i] | . | ^ | $ | ( pattern ) | (?<name> pattern )
//! quantifier  := (? | * | + | {m} | {m,} | {m,n} | {,n}) ?
//! ```
//!
//! Every structural problem is reported here; nothing is deferred to the
//! matcher.

use super::ast::{Anchor, Condition, MatchFlags, Node, ValueTest};
use crate::error::PatternSyntaxError;
use regex::Regex;

/// Maximum group nesting.
pub const MAX_DEPTH: usize = 64;
/// Maximum explicit repetition bound.
pub const MAX_REPEAT: u32 = 1024;

type Result<T> = std::result::Result<T, PatternSyntaxError>;

/// Parse `src` into a root node plus capture names (slot 1.. in declaration
/// order; slot 0 is the implicit whole match and is not listed).
pub(crate) fn parse(src: &str) -> Result<(Node, Vec<String>)> {
    let mut parser = Parser { src, pos: 0, depth: 0, captures: Vec::new() };
    parser.skip_ws();
    if parser.at_end() {
        return Err(PatternSyntaxError::new(0, "empty pattern"));
    }
    let root = parser.alternation()?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok((root, parser.captures)),
        Some(')') => Err(parser.error("unbalanced ')'")),
        Some(c) => Err(parser.error(format!("unexpected character '{c}'"))),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    captures: Vec<String>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> PatternSyntaxError {
        PatternSyntaxError::new(self.pos, message)
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> PatternSyntaxError {
        PatternSyntaxError::new(position, message)
    }

    fn alternation(&mut self) -> Result<Node> {
        let mut branches = vec![self.sequence()?];
        loop {
            self.skip_ws();
            if !self.eat('|') {
                break;
            }
            branches.push(self.sequence()?);
        }
        Ok(if branches.len() == 1 { branches.remove(0) } else { Node::Alternation(branches) })
    }

    fn sequence(&mut self) -> Result<Node> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None | Some('|') | Some(')') => break,
                _ => items.push(self.quantified()?),
            }
        }
        match items.len() {
            0 => Err(self.error("empty alternative")),
            1 => Ok(items.remove(0)),
            _ => Ok(Node::Sequence(items)),
        }
    }

    fn quantified(&mut self) -> Result<Node> {
        let atom = self.atom()?;
        let quant_start = self.pos;
        let Some((min, max)) = self.quantifier()? else {
            return Ok(atom);
        };
        if matches!(atom, Node::Anchor(_)) {
            return Err(self.error_at(quant_start, "anchors cannot be repeated"));
        }
        let greedy = !self.eat('?');
        if matches!(self.peek(), Some('?' | '*' | '+')) || self.at_bounded_quantifier() {
            return Err(self.error("quantifier without operand"));
        }
        Ok(Node::Repetition { child: Box::new(atom), min, max, greedy })
    }

    /// `{` followed by optional whitespace and a digit or comma.
    fn at_bounded_quantifier(&self) -> bool {
        if self.peek() != Some('{') {
            return false;
        }
        self.src[self.pos + 1..].trim_start().starts_with(|c: char| c.is_ascii_digit() || c == ',')
    }

    fn quantifier(&mut self) -> Result<Option<(u32, Option<u32>)>> {
        match self.peek() {
            Some('?') => {
                self.bump();
                Ok(Some((0, Some(1))))
            }
            Some('*') => {
                self.bump();
                Ok(Some((0, None)))
            }
            Some('+') => {
                self.bump();
                Ok(Some((1, None)))
            }
            Some('{') if self.at_bounded_quantifier() => self.bounded().map(Some),
            _ => Ok(None),
        }
    }

    fn bounded(&mut self) -> Result<(u32, Option<u32>)> {
        let start = self.pos;
        self.bump(); // '{'
        self.skip_ws();
        let min = self.number()?;
        self.skip_ws();
        let (min, max) = if self.eat(',') {
            self.skip_ws();
            let max = self.number()?;
            match (min, max) {
                (None, None) => return Err(self.error_at(start, "unknown quantifier '{,}'")),
                (min, max) => (min.unwrap_or(0), max),
            }
        } else {
            match min {
                Some(n) => (n, Some(n)),
                None => return Err(self.error_at(start, "unknown quantifier")),
            }
        };
        self.skip_ws();
        if !self.eat('}') {
            return Err(self.error_at(start, "unknown quantifier"));
        }
        if let Some(max) = max {
            if min > max {
                return Err(self.error_at(start, format!("repetition minimum {min} exceeds maximum {max}")));
            }
        }
        if min > MAX_REPEAT || max.is_some_and(|m| m > MAX_REPEAT) {
            return Err(self.error_at(start, format!("repetition bound exceeds {MAX_REPEAT}")));
        }
        Ok((min, max))
    }

    fn number(&mut self) -> Result<Option<u32>> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if start == self.pos {
            return Ok(None);
        }
        self.src[start..self.pos]
            .parse::<u32>()
            .map(Some)
            .map_err(|_| self.error_at(start, format!("repetition bound exceeds {MAX_REPEAT}")))
    }

    fn atom(&mut self) -> Result<Node> {
        let start = self.pos;
        match self.peek() {
            Some('"') => {
                let text = self.quoted()?;
                if text.is_empty() {
                    return Err(self.error_at(start, "empty literal"));
                }
                let flags = self.case_modifier()?;
                let text = if flags.contains(MatchFlags::CASE_INSENSITIVE) { text.to_lowercase() } else { text };
                Ok(Node::Literal { text, flags })
            }
            Some('{') => self.predicate(),
            Some('.') => {
                self.bump();
                Ok(Node::Wildcard)
            }
            Some('^') => {
                self.bump();
                Ok(Node::Anchor(Anchor::Start))
            }
            Some('$') => {
                self.bump();
                Ok(Node::Anchor(Anchor::End))
            }
            Some('(') => self.group(),
            Some(')') => Err(self.error("unbalanced ')'")),
            Some('?' | '*' | '+') => Err(self.error("quantifier without operand")),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of pattern")),
        }
    }

    /// Optional `i` suffix directly after a literal or predicate.
    fn case_modifier(&mut self) -> Result<MatchFlags> {
        if self.peek() == Some('i') && !self.peek_nth(1).is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
            return Ok(MatchFlags::CASE_INSENSITIVE);
        }
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(self.error("unknown modifier"));
        }
        Ok(MatchFlags::empty())
    }

    /// A `"..."` string with `\"` and `\\` escapes.
    fn quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error_at(start, "unterminated literal")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c @ ('"' | '\\')) => out.push(c),
                    Some(c) => return Err(self.error(format!("unknown escape '\\{c}'"))),
                    None => return Err(self.error_at(start, "unterminated literal")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn group(&mut self) -> Result<Node> {
        let open = self.pos;
        self.bump(); // '('
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error_at(open, format!("pattern nesting exceeds {MAX_DEPTH} levels")));
        }

        let capture = if self.peek() == Some('?') && self.peek_nth(1) == Some('<') {
            self.bump();
            self.bump();
            let name_start = self.pos;
            let name = self.ident();
            if name.is_empty() {
                return Err(self.error_at(name_start, "expected capture name"));
            }
            if !self.eat('>') {
                return Err(self.error("expected '>' after capture name"));
            }
            if self.captures.iter().any(|c| *c == name) {
                return Err(self.error_at(name_start, format!("duplicate capture name '{name}'")));
            }
            self.captures.push(name);
            Some(self.captures.len())
        } else {
            None
        };

        self.skip_ws();
        if self.peek() == Some(')') {
            return Err(self.error("empty group"));
        }
        let child = self.alternation()?;
        self.skip_ws();
        if !self.eat(')') {
            return Err(self.error_at(open, "unbalanced '('"));
        }
        self.depth -= 1;
        Ok(Node::Group { child: Box::new(child), capture })
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn predicate(&mut self) -> Result<Node> {
        let open = self.pos;
        self.bump(); // '{'
        let mut raw = Vec::new();
        loop {
            self.skip_ws();
            if self.at_end() {
                return Err(self.error_at(open, "unterminated attribute predicate"));
            }
            let attr_pos = self.pos;
            let attr = self.ident();
            if attr.is_empty() {
                return Err(self.error("expected attribute name"));
            }
            self.skip_ws();
            let negated = if self.eat('!') {
                if !self.eat('=') {
                    return Err(self.error("expected '=' after '!'"));
                }
                true
            } else if self.eat('=') {
                false
            } else if self.at_end() {
                return Err(self.error_at(open, "unterminated attribute predicate"));
            } else {
                return Err(self.error("expected '=' or '!='"));
            };
            self.skip_ws();
            let value = self.predicate_value(open)?;
            raw.push((attr_pos, attr, negated, value));

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                None => return Err(self.error_at(open, "unterminated attribute predicate")),
                Some(c) => return Err(self.error_at(self.pos - c.len_utf8(), format!("unexpected character '{c}'"))),
            }
        }

        let outer = self.case_modifier()?;
        let mut conditions = Vec::with_capacity(raw.len());
        for (attr_pos, attr, negated, value) in raw {
            let mut flags = outer;
            if negated {
                flags |= MatchFlags::NEGATED;
            }
            let test = match value {
                RawValue::Plain(v) if flags.contains(MatchFlags::CASE_INSENSITIVE) => ValueTest::Equals(v.to_lowercase()),
                RawValue::Plain(v) => ValueTest::Equals(v),
                RawValue::Regex { source, case_insensitive } => {
                    let ci = case_insensitive || flags.contains(MatchFlags::CASE_INSENSITIVE);
                    let invalid = |e: regex::Error| self.error_at(attr_pos, format!("invalid regex for '{attr}': {e}"));
                    // Checked on its own first so it cannot close the anchoring group.
                    Regex::new(&source).map_err(invalid)?;
                    let anchored = format!("{}^(?:{})$", if ci { "(?i)" } else { "" }, source);
                    let re = Regex::new(&anchored).map_err(invalid)?;
                    // Regexes carry their own case folding.
                    flags.remove(MatchFlags::CASE_INSENSITIVE);
                    ValueTest::Regex(re)
                }
            };
            conditions.push(Condition { attr, test, flags });
        }
        Ok(Node::Predicate(conditions))
    }

    fn predicate_value(&mut self, open: usize) -> Result<RawValue> {
        match self.peek() {
            Some('"') => Ok(RawValue::Plain(self.quoted()?)),
            Some('/') => {
                let start = self.pos;
                self.bump();
                let mut source = String::new();
                loop {
                    match self.bump() {
                        None => return Err(self.error_at(start, "unterminated regex")),
                        Some('/') => break,
                        Some('\\') if self.peek() == Some('/') => {
                            self.bump();
                            source.push('/');
                        }
                        Some('\\') => {
                            source.push('\\');
                            if let Some(c) = self.bump() {
                                source.push(c);
                            }
                        }
                        Some(c) => source.push(c),
                    }
                }
                let case_insensitive = self.eat('i');
                Ok(RawValue::Regex { source, case_insensitive })
            }
            None => Err(self.error_at(open, "unterminated attribute predicate")),
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|c| !c.is_whitespace() && c != ',' && c != '}') {
                    self.bump();
                }
                if start == self.pos {
                    return Err(self.error("expected attribute value"));
                }
                Ok(RawValue::Plain(self.src[start..self.pos].to_string()))
            }
        }
    }
}

enum RawValue {
    Plain(String),
    Regex { source: String, case_insensitive: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(src: &str) -> PatternSyntaxError {
        match parse(src) {
            Ok(_) => panic!("expected `{src}` to fail"),
            Err(e) => e,
        }
    }

    #[test]
    fn parses_sequence_with_quantifiers() {
        let (node, caps) = parse(r#""a" "b"+ "c"{1,3}? ."#).unwrap();
        assert!(caps.is_empty());
        let Node::Sequence(items) = node else { panic!("expected sequence") };
        assert_eq!(items.len(), 4);
        assert!(matches!(items[1], Node::Repetition { min: 1, max: None, greedy: true, .. }));
        assert!(matches!(items[2], Node::Repetition { min: 1, max: Some(3), greedy: false, .. }));
        assert!(matches!(items[3], Node::Wildcard));
    }

    #[test]
    fn alternation_has_lowest_precedence() {
        let (node, _) = parse(r#""x" | "x" "y""#).unwrap();
        let Node::Alternation(branches) = node else { panic!("expected alternation") };
        assert!(matches!(branches[0], Node::Literal { .. }));
        assert!(matches!(branches[1], Node::Sequence(_)));
    }

    #[test]
    fn named_captures_are_numbered_in_order() {
        let (_, caps) = parse(r#"(?<A> "a" (?<B> .)) (?<C> "c")"#).unwrap();
        assert_eq!(caps, ["A", "B", "C"]);
    }

    #[test]
    fn predicate_with_regex_and_negation() {
        let (node, _) = parse(r#"{pos=/NN.*/, lemma!="be"}"#).unwrap();
        let Node::Predicate(conds) = node else { panic!("expected predicate") };
        assert_eq!(conds.len(), 2);
        assert!(conds[0].holds(Some("NNP")));
        assert!(!conds[0].holds(Some("VNN")));
        assert!(conds[1].flags.contains(MatchFlags::NEGATED));
    }

    #[test]
    fn brace_after_atom_with_letter_is_a_new_predicate() {
        let (node, _) = parse(r#""a"{pos=NN}"#).unwrap();
        let Node::Sequence(items) = node else { panic!("expected sequence") };
        assert!(matches!(items[1], Node::Predicate(_)));
    }

    #[test]
    fn case_insensitive_literal_is_lowercased() {
        let (node, _) = parse(r#""Alice"i"#).unwrap();
        let Node::Literal { text, flags } = node else { panic!("expected literal") };
        assert_eq!(text, "alice");
        assert!(flags.contains(MatchFlags::CASE_INSENSITIVE));
    }

    #[test]
    fn structural_errors() {
        assert_eq!(err(r#"("a""#).message, "unbalanced '('");
        assert_eq!(err(r#""a")"#).message, "unbalanced ')'");
        assert_eq!(err(r#"*"a""#).message, "quantifier without operand");
        assert_eq!(err(r#""a"**"#).message, "quantifier without operand");
        assert_eq!(err(r#""a"{3,1}"#).message, "repetition minimum 3 exceeds maximum 1");
        assert_eq!(err(r#""a"{2,x}"#).message, "unknown quantifier");
        assert_eq!(err(r#"{pos=NN"#).message, "unterminated attribute predicate");
        assert_eq!(err(r#""abc"#).message, "unterminated literal");
        assert_eq!(err(r#"(?<A> "a") (?<A> "b")"#).message, "duplicate capture name 'A'");
        assert_eq!(err(r#""a" | "#).message, "empty alternative");
        assert_eq!(err("   ").message, "empty pattern");
        assert_eq!(err("()").message, "empty group");
        assert_eq!(err("^*").message, "anchors cannot be repeated");
        assert_eq!(err(r#""a"{1,2000}"#).message, format!("repetition bound exceeds {MAX_REPEAT}"));
        assert_eq!(err(r#""a"{1025}"#).message, "repetition bound exceeds 1024");
    }

    #[test]
    fn error_positions_point_at_the_problem() {
        assert_eq!(err(r#""a" ("b""#).position, 4);
        assert_eq!(err(r#""a" "b")"#).position, 7);
    }

    #[test]
    fn nesting_limit_is_enforced() {
        let deep = format!("{}\"a\"{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(err(&deep).message.contains("nesting"));
        let ok = format!("{}\"a\"{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn invalid_regex_is_a_syntax_error() {
        assert!(err(r#"{pos=/[/}"#).message.starts_with("invalid regex"));
        assert!(err(r#"{pos=/x)|(N/}"#).message.starts_with("invalid regex"));
    }
}
