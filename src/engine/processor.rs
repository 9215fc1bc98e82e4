//! The engine: loaded tables plus word processing.
//!
//! ```text
//! Engine::new(options)
//!   ├─ compile_source / compile_str / compile_line   (ingest.rs)
//!   │     definitions, rules, groups, exceptions, assertions
//!   └─ process_word(word, dialects)
//!         [assertions]                               (optional, all first)
//!         reseed (per-word mode)
//!         Scheduler::run_group(main)                 (scheduler.rs)
//!         -> DialectWords
//! ```

use super::compiled_rules::{Assertion, RuleTable};
use super::definitions::{DefinitionKind, Definitions};
use super::exceptions::ExceptionTable;
use super::group::{GroupParams, RuleGroup};
use super::ingest::IngestState;
use super::metrics::RunResult;
use super::rule::{Outcome, Rule};
use super::scheduler::Scheduler;
use crate::api::{Counts, DialectWords, Options, SeedMode, Step, word_rng};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use std::time::Instant;

/// Id of the main group; nested groups are numbered from 2.
pub(super) const MAIN_GROUP: usize = 0;
pub(super) const PERSISTENT_GROUP: usize = 1;

#[derive(Debug)]
pub struct Engine {
    pub(super) options: Options,
    pub(super) defs: Definitions,
    pub(super) rules: RuleTable,
    pub(super) main: RuleGroup,
    pub(super) persistent: RuleGroup,
    pub(super) exceptions: ExceptionTable,
    pub(super) dialects: String,
    pub(super) seed: SeedMode,
    pub(super) rng: StdRng,
    pub(super) ingest: IngestState,
}

impl Engine {
    pub fn new(options: Options) -> Self {
        let seed = options.seed;
        Engine {
            options,
            defs: Definitions::default(),
            rules: RuleTable::default(),
            main: RuleGroup::new(MAIN_GROUP, GroupParams::default()),
            persistent: RuleGroup::new(PERSISTENT_GROUP, GroupParams::default()),
            exceptions: ExceptionTable::default(),
            dialects: "A".to_string(),
            seed,
            rng: seed.rng(),
            ingest: IngestState::default(),
        }
    }

    /// Run `word` through every rule, in `dialects` (all declared dialects
    /// when `None`).
    pub fn process_word(&mut self, word: &str, dialects: Option<&str>) -> Result<DialectWords> {
        Ok(self.run(word, dialects, false, None)?.words)
    }

    /// Like [`Engine::process_word`], optionally checking every `!assert` first
    /// and reporting each step to `on_step`. Returns run counters as well.
    pub fn process_word_with(
        &mut self,
        word: &str,
        dialects: Option<&str>,
        check_assertions: bool,
        on_step: Option<&mut dyn FnMut(&Step<'_>)>,
    ) -> Result<RunResult> {
        self.run(word, dialects, check_assertions, on_step)
    }

    /// Process `word` and return run counters along with the result.
    pub fn process_word_verbose(&mut self, word: &str, dialects: Option<&str>) -> Result<RunResult> {
        self.run(word, dialects, false, None)
    }

    fn run(
        &mut self,
        word: &str,
        dialects: Option<&str>,
        check_assertions: bool,
        on_step: Option<&mut dyn FnMut(&Step<'_>)>,
    ) -> Result<RunResult> {
        let start = Instant::now();
        let dialects = self.select_dialects(dialects)?;
        if check_assertions {
            self.check_assertions()?;
        }

        let per_word = self.seed == SeedMode::PerWord;
        if per_word {
            self.rng = word_rng(word);
        }

        let mut words = DialectWords::new(word, &dialects);
        let mut scheduler =
            Scheduler::new(&self.rules, &self.exceptions, &self.persistent, &mut self.rng, per_word, on_step);
        scheduler.run_group(&self.main, &mut words)?;
        let mut metrics = scheduler.finish();
        metrics.total = start.elapsed();

        log::debug!("'{}' -> '{}' ({} change(s))", word, words, metrics.changes);
        Ok(RunResult { words, metrics })
    }

    /// Check every registered assertion, failing on the first mismatch.
    pub fn check_assertions(&mut self) -> Result<()> {
        for Assertion { rule, dialect, input, expected, file, line } in self.rules.assertions() {
            let Some(compiled) = self.rules.get(*rule) else {
                continue;
            };
            let actual = match compiled.apply(input, *dialect, None, &mut self.rng)? {
                Outcome::Applied(out) => out,
                Outcome::NotApplicable | Outcome::Exception => input.clone(),
            };
            if actual != *expected {
                return Err(Error::AssertionFailed {
                    file: file.clone(),
                    line: *line,
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    fn select_dialects(&self, requested: Option<&str>) -> Result<String> {
        let Some(requested) = requested else {
            return Ok(self.dialects.clone());
        };
        if requested.is_empty() {
            return Err(Error::malformed("no dialects given"));
        }
        if let Some(unknown) = requested.chars().find(|c| !self.dialects.contains(*c)) {
            return Err(Error::malformed(format!("unknown dialect '{unknown}'")));
        }
        Ok(requested.to_string())
    }

    /// Definitions of one kind as `(name, rendered value)`, sorted by name.
    pub fn definitions(&self, kind: DefinitionKind) -> Vec<(String, String)> {
        self.defs.entries(kind)
    }

    pub fn definition_count(&self, kind: DefinitionKind) -> usize {
        self.defs.count(kind)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.named(name)
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn counts(&self) -> Counts {
        Counts {
            rules: self.rules.len() - self.rules.persistent_count(),
            persistent: self.rules.persistent_count(),
            definitions: DefinitionKind::ALL.iter().map(|&kind| (kind, self.defs.count(kind))).collect(),
        }
    }

    /// Declared dialect codes, in declaration order.
    pub fn dialects(&self) -> &str {
        &self.dialects
    }

    pub fn main_group(&self) -> &RuleGroup {
        &self.main
    }

    pub fn persistent_group(&self) -> &RuleGroup {
        &self.persistent
    }

    pub fn exceptions(&self) -> &ExceptionTable {
        &self.exceptions
    }

    pub fn seed_mode(&self) -> SeedMode {
        self.seed
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(super) fn set_seed(&mut self, seed: SeedMode) {
        log::debug!("seed set to {}", seed);
        self.seed = seed;
        self.rng = seed.rng();
    }
}
