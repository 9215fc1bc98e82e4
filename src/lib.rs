//! Rule-based sound change applier.
//!
//! Rules are written in a compact phonological notation and compiled to
//! anchored patterns; words are run through them once per dialect.
//!
//! ```text
//! V = aeiou
//! feature Voice = ptk|bdg
//! * [-Voice] [+Voice] V_V B     ! intervocalic voicing
//! * [+Voice] [-Voice] _#        ! final devoicing
//! ```
//!
//! ```
//! use soundshift::{Engine, Options};
//!
//! let mut engine = Engine::new(Options::default());
//! engine.compile_str("demo", "feature Voice = ptk|bdg\n* [+Voice] [-Voice] _#\n").unwrap();
//! let words = engine.process_word("dog", None).unwrap();
//! assert_eq!(words.first(), Some("dok"));
//! ```

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;

pub use api::{Counts, DialectWords, Options, OutcomeKind, SeedMode, Step, apply_rules};
pub use engine::{
    Assertion, Blend, CategoryValue, ChangeDefinition, DefinitionKind, Definitions, DialectFilter, Engine,
    ExceptionTable, Feature, Field, FieldTexts, GroupChild, GroupParams, Heading, Item, ListDefinition, Outcome, Part,
    Rule, RuleFlags, RuleGroup, RuleId, RuleTable, RunMetrics, RunResult, SourceLine, StringDefinition, Table, evaluate,
    logical_lines, split_escaped,
};
pub use error::{Error, Result};
