//! Per-rule metadata.
//!
//! Derived once when a program is compiled and kept next to its rules. The
//! executor consults it to decide, per token sequence, whether a rule can
//! possibly match there.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `Program::rules` and `CompiledRules::metas`.
//!   Those vectors must stay aligned.
//! - A rule without required literals is always on.

use super::trigger::TriggerInfo;
use crate::pattern::ast::RequiredLiteral;
use crate::program::{Rule, Scope};

/// Rule identifier (index into the rules vector).
pub(crate) type RuleId = usize;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleFlags: u8 {
        /// Scanned over the whole document rather than per sentence.
        const DOCUMENT_SCOPED = 1 << 0;
        /// Has at least one required literal.
        const GATED           = 1 << 1;
        /// Some required literal is case-insensitive.
        const FOLDS_CASE      = 1 << 2;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleMeta {
    pub required: Vec<RequiredLiteral>,
    pub flags: RuleFlags,
}

/// Rule metadata for a whole program.
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    pub metas: Vec<RuleMeta>,
    /// Union of all rule flags.
    pub flags: RuleFlags,
}

impl CompiledRules {
    pub fn new(rules: &[Rule]) -> Self {
        let metas: Vec<RuleMeta> = rules
            .iter()
            .map(|rule| {
                let required = rule.trigger.required_literals().to_vec();
                let mut flags = RuleFlags::empty();
                if rule.scope == Scope::Document {
                    flags |= RuleFlags::DOCUMENT_SCOPED;
                }
                if !required.is_empty() {
                    flags |= RuleFlags::GATED;
                }
                if required.iter().any(|lit| lit.case_insensitive) {
                    flags |= RuleFlags::FOLDS_CASE;
                }
                RuleMeta { required, flags }
            })
            .collect();
        let flags = metas.iter().fold(RuleFlags::empty(), |acc, m| acc | m.flags);
        CompiledRules { metas, flags }
    }

    /// Whether rule `id` may match inside the sequence described by `info`.
    pub fn admits(&self, id: RuleId, info: &TriggerInfo) -> bool {
        match self.metas.get(id) {
            Some(meta) if meta.flags.contains(RuleFlags::GATED) => meta.required.iter().all(|lit| info.contains(lit)),
            _ => true,
        }
    }

    pub fn any(&self, flag: RuleFlags) -> bool {
        self.flags.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, TokenSource};
    use crate::pattern::TokenSeq;

    #[test]
    fn metas_follow_rule_order_and_flags() {
        let program = crate::compile(indoc::indoc! {r#"
            [a]
            "born"i "in" .
            [b]
            scope=document
            {pos=NNP}+
        "#})
        .unwrap();
        let compiled = program.compiled();
        assert_eq!(compiled.metas.len(), 2);
        assert!(compiled.metas[0].flags.contains(RuleFlags::GATED | RuleFlags::FOLDS_CASE));
        assert_eq!(compiled.metas[1].flags, RuleFlags::DOCUMENT_SCOPED);
        assert!(compiled.any(RuleFlags::FOLDS_CASE));

        let doc = Document::from_sentences(&[&["Born", "in", "Paris"], &["born", "on", "Monday"]]);
        let first = TriggerInfo::scan(&TokenSeq::new(&doc, doc.sentences()[0]), true);
        let second = TriggerInfo::scan(&TokenSeq::new(&doc, doc.sentences()[1]), true);
        assert!(compiled.admits(0, &first));
        assert!(!compiled.admits(0, &second));
        assert!(compiled.admits(1, &second));
    }
}
