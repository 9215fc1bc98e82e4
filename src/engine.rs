//! Rule compiler and scheduler.
//!
//! This module is the public entry point for the engine. It is split into
//! focused submodules under `src/engine/` while keeping public paths flat
//! (for example `crate::engine::Engine` and `crate::engine::Rule`).
//!
//! ## How the parts work together
//!
//! ```text
//! rule file ── logical_lines (source.rs)
//!                 │
//!                 v
//!           Engine::compile_* (ingest.rs)
//!             - definitions      -> Definitions (definitions.rs, category.rs)
//!             - directives       -> groups, exceptions, assertions
//!             - rule statements  -> Rule::compile (rule.rs)
//!                                     Part::parse (part.rs) -> Items (item.rs)
//!                 │
//!                 v
//!   RuleTable (compiled_rules.rs) + RuleGroup tree (group.rs)
//!                 │
//! word ───────────┤
//!                 v
//!           Engine::process_word (processor.rs)
//!             Scheduler::run_group (scheduler.rs)
//!               - iterations, gates, shuffle, max, decay
//!               - Rule::apply per dialect (exceptions.rs)
//!               - persistent pass after every rule
//!                 │
//!                 v
//!           DialectWords (+ RunMetrics, metrics.rs)
//! ```
//!
//! ## Debugging
//!
//! Everything logs through the `log` facade: `debug` for compiled rules and
//! directives, `trace` for individual applications and scheduler decisions.

#[path = "engine/category.rs"]
mod category;
#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/definitions.rs"]
mod definitions;
#[path = "engine/exceptions.rs"]
mod exceptions;
#[path = "engine/group.rs"]
mod group;
#[path = "engine/ingest.rs"]
mod ingest;
#[path = "engine/item.rs"]
mod item;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/part.rs"]
mod part;
#[path = "engine/processor.rs"]
mod processor;
#[path = "engine/rule.rs"]
mod rule;
#[path = "engine/scheduler.rs"]
mod scheduler;
#[path = "engine/source.rs"]
mod source;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use category::{CategoryValue, evaluate};
pub use compiled_rules::{Assertion, RuleId, RuleTable};
pub use definitions::{ChangeDefinition, DefinitionKind, Definitions, Feature, ListDefinition, StringDefinition};
pub use exceptions::ExceptionTable;
pub use group::{GroupChild, GroupParams, Heading, RuleGroup};
pub use item::{Blend, Field, Item, Table};
pub use metrics::{RunMetrics, RunResult};
pub use part::Part;
pub use processor::Engine;
pub use rule::{DialectFilter, FieldTexts, Outcome, Rule, RuleFlags};
pub use source::{SourceLine, logical_lines, split_escaped};
