//! Trigger scanning (sequence pre-classification).
//!
//! Before a rule is matched against a token sequence, the executor checks that
//! every literal the rule's trigger requires actually occurs in it. The scan
//! collects the sequence's surface forms once, so that check is a handful of
//! set lookups instead of a backtracking pass per start position.
//!
//! ## Design notes
//!
//! - Gating never changes results. A required literal is one that every match
//!   must contain, so a sequence without it cannot match.
//! - The lowercased set is only built when some rule has a case-insensitive
//!   required literal.

use std::collections::HashSet;

use crate::pattern::TokenSeq;
use crate::pattern::ast::RequiredLiteral;

/// Surface forms present in one token sequence.
#[derive(Debug, Clone, Default)]
pub struct TriggerInfo {
    pub exact: HashSet<String>,
    pub folded: HashSet<String>,
}

impl TriggerInfo {
    /// Scan `seq`; `fold_case` also records lowercased forms.
    pub fn scan(seq: &TokenSeq<'_>, fold_case: bool) -> Self {
        let mut info = TriggerInfo::default();
        let span = seq.span();
        for index in span.start..span.end {
            let text = seq.text(index);
            if fold_case {
                info.folded.insert(text.to_lowercase());
            }
            info.exact.insert(text.to_string());
        }
        info
    }

    pub fn contains(&self, literal: &RequiredLiteral) -> bool {
        if literal.case_insensitive { self.folded.contains(&literal.text) } else { self.exact.contains(&literal.text) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn lit(text: &str, case_insensitive: bool) -> RequiredLiteral {
        RequiredLiteral { text: text.into(), case_insensitive }
    }

    #[test]
    fn exact_and_folded_lookup() {
        let doc = Document::tokenize("Meet me in Paris.");
        let info = TriggerInfo::scan(&TokenSeq::whole(&doc), true);
        assert!(info.contains(&lit("Paris", false)));
        assert!(!info.contains(&lit("paris", false)));
        assert!(info.contains(&lit("paris", true)));
        assert!(!info.contains(&lit("london", true)));
    }

    #[test]
    fn folded_set_is_skipped_when_unused() {
        let doc = Document::tokenize("Meet me");
        let info = TriggerInfo::scan(&TokenSeq::whole(&doc), false);
        assert!(info.folded.is_empty());
        assert_eq!(info.exact.len(), 2);
    }
}
