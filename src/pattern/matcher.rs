//! Backtracking matcher.
//!
//! Recursive descent over the AST in continuation-passing style: every node
//! receives the "rest of the pattern" as a continuation `k`, so alternation and
//! repetition can retry their choices when the remainder fails.
//!
//! ```text
//! Sequence [a, b+, c] at p:
//!   a(p, |p1| b+(p1, |p2| c(p2, |p3| done(p3))))
//!              └─ greedy: take as many b's as possible, back off one at a time
//! ```
//!
//! A repetition whose body is a single token (literal, predicate, wildcard,
//! or an uncaptured group of one) is matched as a run instead: count how far
//! the body matches, then offer each end position to `k`, longest first when
//! greedy. This keeps stack depth independent of match length, so `.+` can
//! span a whole document.
//!
//! Cost is bounded by `fuel` (steps per scan) and [`MAX_MATCH_DEPTH`]. When
//! either runs out the scan fails at that position and the caller is told, so
//! it can report it; pathological patterns degrade into missed matches rather
//! than unbounded run time.

use super::ast::{Anchor, MatchFlags, Node};
use super::{Match, TokenSeq};
use crate::TokenSpan;

/// Default matcher step budget for one scan.
pub const DEFAULT_EXEC_FUEL: u32 = 100_000;

/// Maximum nesting of `match_node` calls during one scan. Only repetitions
/// over multi-token bodies add a level per iteration.
pub const MAX_MATCH_DEPTH: usize = 2048;

/// Result of scanning a whole token sequence.
#[derive(Debug, Clone, Default)]
pub struct FindAll {
    pub matches: Vec<Match>,
    /// Start positions where the scan gave up because of fuel or depth.
    pub exhausted: Vec<usize>,
}

pub(crate) enum Scan {
    Matched(Match),
    NoMatch,
    Exhausted,
}

type Cont<'k, 'a> = dyn FnMut(&mut Matcher<'a>, usize) -> bool + 'k;

pub(crate) struct Matcher<'a> {
    tokens: TokenSeq<'a>,
    captures: Vec<Option<TokenSpan>>,
    fuel: u32,
    depth: usize,
    exhausted: bool,
}

impl<'a> Matcher<'a> {
    pub(crate) fn new(tokens: TokenSeq<'a>, capture_count: usize, fuel: u32) -> Self {
        Matcher { tokens, captures: vec![None; capture_count], fuel, depth: 0, exhausted: false }
    }

    /// Try to match `root` with its first token fixed at `start`.
    pub(crate) fn scan(&mut self, root: &Node, start: usize, fuel: u32) -> Scan {
        self.captures.iter_mut().for_each(|c| *c = None);
        self.fuel = fuel;
        self.depth = 0;
        self.exhausted = false;

        let mut end = start;
        let matched = self.match_node(root, start, &mut |_m, p| {
            // Zero-length matches are never reported.
            if p > start {
                end = p;
                true
            } else {
                false
            }
        });

        if matched {
            let mut captures = std::mem::take(&mut self.captures);
            captures[0] = Some(TokenSpan::new(start, end));
            self.captures = vec![None; captures.len()];
            Scan::Matched(Match { captures: captures.into_boxed_slice() })
        } else if self.exhausted {
            Scan::Exhausted
        } else {
            Scan::NoMatch
        }
    }

    fn match_node(&mut self, node: &Node, pos: usize, k: &mut Cont<'_, 'a>) -> bool {
        if self.exhausted {
            return false;
        }
        if self.depth >= MAX_MATCH_DEPTH || !self.charge() {
            self.exhausted = true;
            return false;
        }
        self.depth += 1;
        let ok = self.match_inner(node, pos, k);
        self.depth -= 1;
        ok
    }

    /// Spend one step. Marks the scan exhausted when none are left.
    fn charge(&mut self) -> bool {
        if self.fuel == 0 {
            self.exhausted = true;
            return false;
        }
        self.fuel -= 1;
        true
    }

    /// Whether single-token `node` accepts the token at `pos`.
    fn token_matches(&self, node: &Node, pos: usize) -> bool {
        if !self.tokens.contains(pos) {
            return false;
        }
        match node {
            Node::Literal { text, flags } => {
                let surface = self.tokens.text(pos);
                if flags.contains(MatchFlags::CASE_INSENSITIVE) {
                    surface.to_lowercase() == *text
                } else {
                    surface == text.as_str()
                }
            }
            Node::Predicate(conditions) => conditions.iter().all(|c| c.holds(self.tokens.value(pos, &c.attr))),
            Node::Wildcard => true,
            Node::Group { child, capture: None } => self.token_matches(child, pos),
            _ => false,
        }
    }

    fn match_inner(&mut self, node: &Node, pos: usize, k: &mut Cont<'_, 'a>) -> bool {
        match node {
            Node::Literal { .. } | Node::Predicate(_) | Node::Wildcard => {
                self.token_matches(node, pos) && k(self, pos + 1)
            }
            Node::Anchor(Anchor::Start) => pos == self.tokens.span().start && k(self, pos),
            Node::Anchor(Anchor::End) => pos == self.tokens.span().end && k(self, pos),
            Node::Sequence(children) => self.match_sequence(children, pos, k),
            Node::Alternation(branches) => {
                for branch in branches {
                    if self.match_node(branch, pos, &mut *k) {
                        return true;
                    }
                    if self.exhausted {
                        return false;
                    }
                }
                false
            }
            Node::Group { child, capture: None } => self.match_node(child, pos, k),
            Node::Group { child, capture: Some(slot) } => {
                let slot = *slot;
                self.match_node(child, pos, &mut |m, p| {
                    let previous = m.captures[slot];
                    m.captures[slot] = Some(TokenSpan::new(pos, p));
                    if k(m, p) {
                        return true;
                    }
                    m.captures[slot] = previous;
                    false
                })
            }
            Node::Repetition { child, min, max, greedy } => {
                let rep = Repeat { child, min: *min, max: *max, greedy: *greedy };
                if is_single_token(child) {
                    self.match_run(rep, pos, k)
                } else {
                    self.match_repetition(rep, 0, pos, k)
                }
            }
        }
    }

    fn match_sequence(&mut self, children: &[Node], pos: usize, k: &mut Cont<'_, 'a>) -> bool {
        match children.split_first() {
            None => k(self, pos),
            Some((first, rest)) => self.match_node(first, pos, &mut |m, p| m.match_sequence(rest, p, &mut *k)),
        }
    }

    fn match_repetition(&mut self, rep: Repeat<'_>, count: u32, pos: usize, k: &mut Cont<'_, 'a>) -> bool {
        let can_stop = count >= rep.min;
        let can_grow = rep.max.is_none_or(|max| count < max);

        if rep.greedy {
            if can_grow && self.repeat_once(rep, count, pos, &mut *k) {
                return true;
            }
            !self.exhausted && can_stop && k(self, pos)
        } else {
            if can_stop && k(self, pos) {
                return true;
            }
            !self.exhausted && can_grow && self.repeat_once(rep, count, pos, k)
        }
    }

    /// Repetition of a single-token body, without a stack frame per token.
    fn match_run(&mut self, rep: Repeat<'_>, pos: usize, k: &mut Cont<'_, 'a>) -> bool {
        let limit = rep.max.map_or(usize::MAX, |max| max as usize);
        let mut run = 0;
        while run < limit && self.token_matches(rep.child, pos + run) {
            if !self.charge() {
                return false;
            }
            run += 1;
        }
        let min = rep.min as usize;
        if run < min {
            return false;
        }
        for step in 0..=run - min {
            let count = if rep.greedy { run - step } else { min + step };
            if !self.charge() {
                return false;
            }
            if k(self, pos + count) {
                return true;
            }
            if self.exhausted {
                return false;
            }
        }
        false
    }

    fn repeat_once(&mut self, rep: Repeat<'_>, count: u32, pos: usize, k: &mut Cont<'_, 'a>) -> bool {
        self.match_node(rep.child, pos, &mut |m, p| {
            // An empty iteration past the minimum can repeat forever.
            if p == pos && count >= rep.min {
                return false;
            }
            m.match_repetition(rep, count + 1, p, &mut *k)
        })
    }
}

/// Nodes that always consume exactly one token and bind no capture.
fn is_single_token(node: &Node) -> bool {
    match node {
        Node::Literal { .. } | Node::Predicate(_) | Node::Wildcard => true,
        Node::Group { child, capture: None } => is_single_token(child),
        _ => false,
    }
}

#[derive(Clone, Copy)]
struct Repeat<'n> {
    child: &'n Node,
    min: u32,
    max: Option<u32>,
    greedy: bool,
}

#[cfg(test)]
mod tests {
    use super::super::CompiledTrigger;
    use super::*;
    use crate::document::Document;

    fn doc(words: &[&str]) -> Document {
        Document::from_sentences(&[words])
    }

    fn spans(pattern: &str, words: &[&str]) -> Vec<(usize, usize)> {
        let trigger = CompiledTrigger::compile(pattern).unwrap();
        let d = doc(words);
        trigger.find_all(&TokenSeq::whole(&d)).iter().map(|m| (m.span().start, m.span().end)).collect()
    }

    #[test]
    fn greedy_plus_takes_all_b() {
        let trigger = CompiledTrigger::compile(r#""a" (?<bs> "b"+) "c""#).unwrap();
        let d = doc(&["a", "b", "b", "c"]);
        let m = trigger.scan(&TokenSeq::whole(&d), 0).unwrap();
        assert_eq!(m.span(), TokenSpan::new(0, 4));
        assert_eq!(trigger.capture(&m, "bs"), Some(TokenSpan::new(1, 3)));
    }

    #[test]
    fn greedy_backs_off_for_the_remainder() {
        let trigger = CompiledTrigger::compile(r#"(?<head> .+) (?<tail> "b")"#).unwrap();
        let d = doc(&["a", "b", "b"]);
        let m = trigger.scan(&TokenSeq::whole(&d), 0).unwrap();
        assert_eq!(trigger.capture(&m, "head"), Some(TokenSpan::new(0, 2)));
        assert_eq!(trigger.capture(&m, "tail"), Some(TokenSpan::new(2, 3)));
    }

    #[test]
    fn non_greedy_takes_minimum() {
        let trigger = CompiledTrigger::compile(r#"(?<head> .+?) (?<tail> "b")"#).unwrap();
        let d = doc(&["a", "b", "b"]);
        let m = trigger.scan(&TokenSeq::whole(&d), 0).unwrap();
        assert_eq!(trigger.capture(&m, "head"), Some(TokenSpan::new(0, 1)));
        assert_eq!(m.span(), TokenSpan::new(0, 2));
    }

    #[test]
    fn alternation_prefers_leftmost() {
        let trigger = CompiledTrigger::compile(r#"(?<one> "x") | (?<two> "x" "y")"#).unwrap();
        let d = doc(&["x", "y"]);
        let m = trigger.scan(&TokenSeq::whole(&d), 0).unwrap();
        assert_eq!(m.span(), TokenSpan::new(0, 1));
        assert_eq!(trigger.capture(&m, "one"), Some(TokenSpan::new(0, 1)));
        assert_eq!(trigger.capture(&m, "two"), None);
    }

    #[test]
    fn alternation_literal_against_single_token() {
        assert_eq!(spans(r#""x"|"xy""#, &["x"]), [(0, 1)]);
    }

    #[test]
    fn bounded_repetition() {
        assert_eq!(spans(r#""a"{2,3}"#, &["a", "a", "a", "a", "a"]), [(0, 3), (3, 5)]);
        assert_eq!(spans(r#""a"{2}"#, &["a", "b", "a", "a"]), [(2, 4)]);
    }

    #[test]
    fn find_all_is_ordered_and_non_overlapping() {
        let found = spans(r#""a" .?"#, &["a", "a", "a", "x", "a"]);
        assert_eq!(found, [(0, 2), (2, 4), (4, 5)]);
        for pair in found.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
    }

    #[test]
    fn zero_length_matches_are_skipped() {
        assert_eq!(spans(r#""a"*"#, &["b", "a", "a", "b"]), [(1, 3)]);
        assert!(spans(r#"^"#, &["a"]).is_empty());
    }

    #[test]
    fn optional_group_leaves_capture_unbound() {
        let trigger = CompiledTrigger::compile(r#""Mr" (?<dot> ".")? (?<name> .)"#).unwrap();
        let d = doc(&["Mr", "Smith"]);
        let m = trigger.scan(&TokenSeq::whole(&d), 0).unwrap();
        assert_eq!(trigger.capture(&m, "dot"), None);
        assert_eq!(trigger.capture(&m, "name"), Some(TokenSpan::new(1, 2)));
    }

    #[test]
    fn failed_branch_restores_captures() {
        let trigger = CompiledTrigger::compile(r#"((?<x> "a") "b" | "a" "c")"#).unwrap();
        let d = doc(&["a", "c"]);
        let m = trigger.scan(&TokenSeq::whole(&d), 0).unwrap();
        assert_eq!(trigger.capture(&m, "x"), None);
    }

    #[test]
    fn anchors_bind_to_sequence_edges() {
        assert_eq!(spans(r#"^ "a""#, &["a", "a"]), [(0, 1)]);
        assert_eq!(spans(r#""a" $"#, &["a", "a"]), [(1, 2)]);
    }

    #[test]
    fn predicates_read_token_attributes() {
        let trigger = CompiledTrigger::compile(r#"{pos=DT} (?<noun> {pos=/NN.*/}+)"#).unwrap();
        let d = doc(&["the", "big", "dog", "house"]).with_token_attrs("pos", &["DT", "JJ", "NN", "NNS"]);
        assert!(trigger.find_all(&TokenSeq::whole(&d)).is_empty());

        let d = doc(&["the", "dog", "house"]).with_token_attrs("pos", &["DT", "NN", "NNS"]);
        let found = trigger.find_all(&TokenSeq::whole(&d));
        assert_eq!(found.len(), 1);
        assert_eq!(trigger.capture(&found[0], "noun"), Some(TokenSpan::new(1, 3)));
    }

    #[test]
    fn case_insensitive_literal() {
        assert_eq!(spans(r#""alice"i"#, &["ALICE", "Alice", "bob"]), [(0, 1), (1, 2)]);
        assert!(spans(r#""alice""#, &["ALICE"]).is_empty());
    }

    #[test]
    fn empty_repetition_body_terminates() {
        assert_eq!(spans(r#"("a"?)* "b""#, &["a", "a", "b"]), [(0, 3)]);
    }

    #[test]
    fn single_token_runs_are_not_depth_limited() {
        let mut words = vec!["from"];
        words.extend(std::iter::repeat_n("w", 3 * MAX_MATCH_DEPTH));
        words.push("to");
        let trigger = CompiledTrigger::compile(r#""from" (?<body> .+) "to""#).unwrap();
        let d = doc(&words);
        let result = trigger.find_all_with(&TokenSeq::whole(&d), DEFAULT_EXEC_FUEL);
        assert!(result.exhausted.is_empty());
        assert_eq!(result.matches.len(), 1);
        assert_eq!(trigger.capture(&result.matches[0], "body"), Some(TokenSpan::new(1, words.len() - 1)));

        let lazy = CompiledTrigger::compile(r#""from" (?<body> "w"*?) "to""#).unwrap();
        let m = lazy.scan(&TokenSeq::whole(&d), 0).unwrap();
        assert_eq!(m.span(), TokenSpan::new(0, words.len()));
    }

    #[test]
    fn capture_in_repetition_binds_last_iteration() {
        let trigger = CompiledTrigger::compile(r#"((?<x> .) ",")+"#).unwrap();
        let d = doc(&["a", ",", "b", ","]);
        let m = trigger.scan(&TokenSeq::whole(&d), 0).unwrap();
        assert_eq!(m.span(), TokenSpan::new(0, 4));
        assert_eq!(trigger.capture(&m, "x"), Some(TokenSpan::new(2, 3)));
    }

    #[test]
    fn fuel_exhaustion_is_reported() {
        let trigger = CompiledTrigger::compile(r#"(.*)* "z""#).unwrap();
        let words = vec!["a"; 24];
        let d = doc(&words);
        let result = trigger.find_all_with(&TokenSeq::whole(&d), 500);
        assert!(result.matches.is_empty());
        assert!(!result.exhausted.is_empty());
    }
}
