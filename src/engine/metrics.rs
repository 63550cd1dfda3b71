//! Engine run metrics.
//!
//! `Program::execute` discards these; `Program::execute_with` and the verbose
//! facade hand them back for profiling and rule debugging.

use std::time::Duration;

use crate::Produced;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for one run.
    pub total: Duration,
    /// One entry per rule, in program order.
    pub rules: Vec<RuleMetrics>,
}

impl RunMetrics {
    pub fn rule(&self, name: &str) -> Option<&RuleMetrics> {
        self.rules.iter().find(|r| r.rule == name)
    }

    /// Matches across all rules.
    pub fn matches(&self) -> usize {
        self.rules.iter().map(|r| r.matches).sum()
    }

    pub fn annotations(&self) -> usize {
        self.rules.iter().map(|r| r.annotations).sum()
    }

    pub fn relations(&self) -> usize {
        self.rules.iter().map(|r| r.relations).sum()
    }
}

/// Counters for a single rule.
#[derive(Debug, Default, Clone)]
pub struct RuleMetrics {
    pub rule: String,
    pub duration: Duration,
    /// Token sequences the trigger was scanned over.
    pub sequences_scanned: usize,
    /// Token sequences skipped because a required literal was absent.
    pub sequences_skipped: usize,
    pub matches: usize,
    pub annotations: usize,
    pub relations: usize,
    /// Relations whose guard evaluated to false.
    pub guarded_out: usize,
    /// Annotations, relations or single assignments skipped after an
    /// evaluation error.
    pub skipped: usize,
    /// Scan positions abandoned because the backtracking fuel ran out.
    pub fuel_exhausted: usize,
}

/// Executor output bundled with timing information.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunResult {
    /// Every annotation created, in creation order.
    pub produced: Vec<Produced>,
    pub metrics: RunMetrics,
}
