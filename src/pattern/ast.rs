//! Trigger pattern AST.
//!
//! A closed set of node kinds, evaluated by exhaustive `match` in
//! `matcher.rs`. Nodes are immutable after compilation and shared read-only by
//! every scan.

use regex::Regex;

bitflags::bitflags! {
    /// Modifiers attached to literals and attribute conditions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MatchFlags: u8 {
        const CASE_INSENSITIVE = 1 << 0;
        const NEGATED          = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    End,
}

/// How a condition tests an attribute value.
#[derive(Debug, Clone)]
pub enum ValueTest {
    /// Plain equality. Stored lowercased when the condition is case-insensitive.
    Equals(String),
    /// Whole-value regex match (anchored at compile time).
    Regex(Regex),
}

/// One `ATTR=value` / `ATTR!=value` test inside a `{...}` predicate.
#[derive(Debug, Clone)]
pub struct Condition {
    pub attr: String,
    pub test: ValueTest,
    pub flags: MatchFlags,
}

impl Condition {
    /// Evaluate against an attribute value (`None` when the token lacks it).
    pub fn holds(&self, value: Option<&str>) -> bool {
        let positive = match value {
            None => false,
            Some(v) => match &self.test {
                ValueTest::Equals(expected) if self.flags.contains(MatchFlags::CASE_INSENSITIVE) => {
                    v.to_lowercase() == *expected
                }
                ValueTest::Equals(expected) => v == expected,
                ValueTest::Regex(re) => re.is_match(v),
            },
        };
        positive != self.flags.contains(MatchFlags::NEGATED)
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    /// Surface-form equality. `text` is lowercased when case-insensitive.
    Literal { text: String, flags: MatchFlags },
    /// Conjunction of attribute conditions over a single token.
    Predicate(Vec<Condition>),
    /// Exactly one token, unconstrained.
    Wildcard,
    Sequence(Vec<Node>),
    /// Ordered alternatives; earlier ones are tried first.
    Alternation(Vec<Node>),
    Repetition { child: Box<Node>, min: u32, max: Option<u32>, greedy: bool },
    /// Grouping, optionally capturing into slot `capture`.
    Group { child: Box<Node>, capture: Option<usize> },
    Anchor(Anchor),
}

/// A literal token every match of a trigger is guaranteed to contain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequiredLiteral {
    pub text: String,
    pub case_insensitive: bool,
}

impl Node {
    /// Literals present in every possible match of this node.
    ///
    /// Conservative: alternations, optional repetitions and predicates
    /// contribute nothing.
    pub fn required_literals(&self) -> Vec<RequiredLiteral> {
        let mut out = Vec::new();
        self.collect_required(&mut out);
        out.dedup();
        out
    }

    fn collect_required(&self, out: &mut Vec<RequiredLiteral>) {
        match self {
            Node::Literal { text, flags } => {
                let lit =
                    RequiredLiteral { text: text.clone(), case_insensitive: flags.contains(MatchFlags::CASE_INSENSITIVE) };
                if !out.contains(&lit) {
                    out.push(lit);
                }
            }
            Node::Sequence(children) => children.iter().for_each(|c| c.collect_required(out)),
            Node::Repetition { child, min, .. } if *min >= 1 => child.collect_required(out),
            Node::Group { child, .. } => child.collect_required(out),
            Node::Repetition { .. } | Node::Alternation(_) | Node::Predicate(_) | Node::Wildcard | Node::Anchor(_) => {}
        }
    }
}
