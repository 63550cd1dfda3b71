//! Attribute / relation value expressions.
//!
//! ```text
//! expr    := concat (('==' | '!=') concat)?
//! concat  := primary ('+' primary)*
//! primary := "string" | true | false | $ATTR | ( expr )
//!          | text(R) | attr(R, "name") | lemma(R) | pos(R) | defined(R)
//!          | lower(expr) | upper(expr)
//! R       := * | CAPTURE_NAME
//! ```
//!
//! Capture references are resolved to trigger slots while parsing, so an
//! undeclared capture is a compile error rather than a run-time miss.

use crate::document::TokenSource;
use crate::error::EvalError;
use crate::pattern::{CompiledTrigger, Match};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRef {
    pub name: String,
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Str(String),
    Bool(bool),
    /// Attribute already assigned on the annotation being built.
    SelfAttr(String),
    Text(CaptureRef),
    Attr(CaptureRef, String),
    Defined(CaptureRef),
    Lower(Box<Expr>),
    Upper(Box<Expr>),
    Concat(Vec<Expr>),
    Compare { left: Box<Expr>, right: Box<Expr>, negated: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Bool(bool),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }

    pub(crate) fn into_string(self) -> Result<String, EvalError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(EvalError::TypeMismatch { expected: "string", found: other.type_name() }),
        }
    }

    pub(crate) fn into_bool(self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::TypeMismatch { expected: "boolean", found: other.type_name() }),
        }
    }
}

/// Everything an expression can observe for one match.
pub(crate) struct EvalContext<'a> {
    pub tokens: &'a dyn TokenSource,
    pub found: &'a Match,
    /// Attributes assigned so far on the annotation being built.
    pub current: Option<&'a [(String, String)]>,
}

impl EvalContext<'_> {
    fn span_of(&self, r: &CaptureRef) -> Result<crate::TokenSpan, EvalError> {
        match self.found.get(r.slot) {
            Some(span) if !span.is_empty() => Ok(span),
            _ => Err(EvalError::MissingCapture(r.name.clone())),
        }
    }
}

impl Expr {
    pub(crate) fn eval(&self, cx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match self {
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::SelfAttr(name) => cx
                .current
                .and_then(|attrs| attrs.iter().find(|(k, _)| k == name))
                .map(|(_, v)| Value::Str(v.clone()))
                .ok_or_else(|| EvalError::UnresolvedAttribute { target: "annotation".into(), attribute: name.clone() }),
            Expr::Text(r) => Ok(Value::Str(cx.tokens.covered_text(cx.span_of(r)?))),
            Expr::Attr(r, attribute) => {
                let span = cx.span_of(r)?;
                let mut parts = Vec::with_capacity(span.len());
                for index in span.start..span.end {
                    let value = cx.tokens.token_value(index, attribute).ok_or_else(|| {
                        EvalError::UnresolvedAttribute { target: r.name.clone(), attribute: attribute.clone() }
                    })?;
                    parts.push(value);
                }
                Ok(Value::Str(parts.join(" ")))
            }
            Expr::Defined(r) => Ok(Value::Bool(cx.span_of(r).is_ok())),
            Expr::Lower(inner) => Ok(Value::Str(inner.eval(cx)?.into_string()?.to_lowercase())),
            Expr::Upper(inner) => Ok(Value::Str(inner.eval(cx)?.into_string()?.to_uppercase())),
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&part.eval(cx)?.into_string()?);
                }
                Ok(Value::Str(out))
            }
            Expr::Compare { left, right, negated } => {
                let (l, r) = (left.eval(cx)?, right.eval(cx)?);
                let equal = match (&l, &r) {
                    (Value::Str(a), Value::Str(b)) => a == b,
                    (Value::Bool(a), Value::Bool(b)) => a == b,
                    _ => return Err(EvalError::TypeMismatch { expected: l.type_name(), found: r.type_name() }),
                };
                Ok(Value::Bool(equal != *negated))
            }
        }
    }

    /// Names read through `$ATTR`, in evaluation order.
    pub(crate) fn self_attributes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Expr::SelfAttr(name) = e {
                out.push(name.as_str());
            }
        });
        out
    }

    fn walk<'e>(&'e self, f: &mut dyn FnMut(&'e Expr)) {
        f(self);
        match self {
            Expr::Lower(inner) | Expr::Upper(inner) => inner.walk(f),
            Expr::Concat(parts) => {
                for part in parts {
                    part.walk(f);
                }
            }
            Expr::Compare { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Str(_) | Expr::Bool(_) | Expr::SelfAttr(_) | Expr::Text(_) | Expr::Attr(..) | Expr::Defined(_) => {}
        }
    }
}

/// Expression syntax error; `position` is a byte offset into the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExprError {
    pub position: usize,
    pub message: String,
}

pub(crate) fn parse(src: &str, trigger: &CompiledTrigger) -> Result<Expr, ExprError> {
    let mut p = ExprParser { src, pos: 0, trigger };
    p.skip_ws();
    if p.at_end() {
        return Err(p.error("expected expression"));
    }
    let expr = p.compare()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(p.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
    trigger: &'a CompiledTrigger,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += self.peek().map_or(0, char::len_utf8);
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), ExprError> {
        if self.eat(token) { Ok(()) } else { Err(self.error(format!("expected '{token}'"))) }
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError { position: self.pos, message: message.into() }
    }

    fn ident(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            self.pos += self.peek().map_or(0, char::len_utf8);
        }
        self.src[start..self.pos].to_string()
    }

    fn compare(&mut self) -> Result<Expr, ExprError> {
        let left = self.concat()?;
        let negated = if self.eat("==") {
            false
        } else if self.eat("!=") {
            true
        } else {
            return Ok(left);
        };
        let right = self.concat()?;
        Ok(Expr::Compare { left: Box::new(left), right: Box::new(right), negated })
    }

    fn concat(&mut self) -> Result<Expr, ExprError> {
        let mut parts = vec![self.primary()?];
        while self.eat("+") {
            parts.push(self.primary()?);
        }
        Ok(if parts.len() == 1 { parts.remove(0) } else { Expr::Concat(parts) })
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        match self.peek() {
            Some('"') => Ok(Expr::Str(self.string()?)),
            Some('(') => {
                self.pos += 1;
                let inner = self.compare()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some('$') => {
                self.pos += 1;
                let name = self.ident();
                if name.is_empty() {
                    return Err(self.error("expected attribute name after '$'"));
                }
                Ok(Expr::SelfAttr(name))
            }
            Some(c) if c.is_alphabetic() => {
                let start = self.pos;
                let name = self.ident();
                match name.as_str() {
                    "true" => Ok(Expr::Bool(true)),
                    "false" => Ok(Expr::Bool(false)),
                    "text" | "lemma" | "pos" | "defined" | "attr" => {
                        self.expect("(")?;
                        let capture = self.capture_ref()?;
                        let expr = match name.as_str() {
                            "text" => Expr::Text(capture),
                            "defined" => Expr::Defined(capture),
                            "attr" => {
                                self.expect(",")?;
                                self.skip_ws();
                                if self.peek() != Some('"') {
                                    return Err(self.error("expected quoted attribute name"));
                                }
                                Expr::Attr(capture, self.string()?)
                            }
                            other => Expr::Attr(capture, other.to_string()),
                        };
                        self.expect(")")?;
                        Ok(expr)
                    }
                    "lower" | "upper" => {
                        self.expect("(")?;
                        let inner = Box::new(self.compare()?);
                        self.expect(")")?;
                        Ok(if name == "lower" { Expr::Lower(inner) } else { Expr::Upper(inner) })
                    }
                    _ => Err(ExprError { position: start, message: format!("unknown function '{name}'") }),
                }
            }
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("expected expression")),
        }
    }

    fn capture_ref(&mut self) -> Result<CaptureRef, ExprError> {
        self.skip_ws();
        let start = self.pos;
        let name = if self.eat(crate::pattern::WHOLE_MATCH) { crate::pattern::WHOLE_MATCH.to_string() } else { self.ident() };
        if name.is_empty() {
            return Err(self.error("expected capture name"));
        }
        match self.trigger.capture_index(&name) {
            Some(slot) => Ok(CaptureRef { name, slot }),
            None => Err(ExprError { position: start, message: format!("unknown capture '{name}'") }),
        }
    }

    fn string(&mut self) -> Result<String, ExprError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, e @ ('"' | '\\'))) => out.push(e),
                    Some((j, e)) => {
                        return Err(ExprError { position: self.pos + j, message: format!("unknown escape '\\{e}'") });
                    }
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err(ExprError { position: start, message: "unterminated string".into() })
    }
}
