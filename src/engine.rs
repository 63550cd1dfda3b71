//! Rule execution engine.
//!
//! Applies a compiled [`Program`](crate::Program) to a document. Everything
//! here runs after compilation and only reads the program.
//!
//! ## How the parts work together
//!
//! ```text
//! Program.rules ──┐
//!                 │  CompiledRules::new              (compiled_rules.rs)
//!                 └──────────────┬─────────────── required literals, flags
//!                                │
//! document ── TriggerInfo::scan ─┼─ per sequence: can this rule match here?
//!            (trigger.rs)        │
//!                                v
//!                      Executor::run (executor.rs)
//!                        for rule in program order
//!                          for sequence (sentence | document)
//!                            find_all ─▶ Match*
//!                              ├─ annotation specs ─▶ AnnotationSink
//!                              └─ relation specs   ─▶ AnnotationSink
//!                                (endpoints via resolve.rs)
//!                                │
//!                                v
//!                      RunResult { produced, metrics }   (metrics.rs)
//! ```
//!
//! Rules run strictly one after another against the same document, so
//! annotations created by one rule are visible to every later one.
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: per-rule metadata derived once at compile time.
//! - `trigger.rs`: cheap scan of a token sequence for gating.
//! - `executor.rs`: the run loop, constructors and relations.
//! - `resolve.rs`: capture spans and relation endpoints.
//! - `metrics.rs`: per-run and per-rule counters and timings.
//!
//! ## Debugging
//!
//! Everything is reported through `tracing`: gating and per-rule summaries
//! at `debug`, individual matches at `trace`, exhausted backtracking fuel at
//! `warn`.

#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/executor.rs"]
mod executor;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/resolve.rs"]
mod resolve;
#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;
#[path = "engine/trigger.rs"]
mod trigger;

pub(crate) use compiled_rules::CompiledRules;
pub(crate) use executor::Executor;
pub use metrics::{RuleMetrics, RunMetrics};
