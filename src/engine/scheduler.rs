//! Group scheduling.
//!
//! One `Scheduler` drives one word through the group tree:
//!
//! ```text
//! for each of `times` iterations:
//!     roll `prob`                      (skip the iteration on failure)
//!     shuffle children if asked
//!     for each child:
//!         heading -> report it
//!         roll `ruleprob`              (skip the child on failure)
//!         rule    -> apply in every dialect, then one persistent pass
//!         group   -> recurse
//!         stop the group once `max` children have run
//!     scale `prob` and `ruleprob` by `reduce`
//! ```
//!
//! Decayed odds are kept per group for the whole word, so a group nested in a
//! repeated group keeps decaying across the outer repeats.

use super::compiled_rules::{RuleId, RuleTable};
use super::exceptions::ExceptionTable;
use super::group::{GroupChild, RuleGroup};
use super::metrics::RunMetrics;
use super::rule::Outcome;
use crate::api::{DialectWords, OutcomeKind, Step, word_rng};
use crate::error::{Error, Result};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Odds {
    prob: Option<f64>,
    ruleprob: Option<f64>,
}

pub(crate) struct Scheduler<'a, 'o> {
    rules: &'a RuleTable,
    exceptions: &'a ExceptionTable,
    persistent: &'a RuleGroup,
    rng: &'a mut StdRng,
    per_word: bool,
    observer: Option<&'o mut dyn FnMut(&Step<'_>)>,
    metrics: RunMetrics,
    odds: HashMap<usize, Odds>,
    in_persistent: bool,
}

impl<'a, 'o> Scheduler<'a, 'o> {
    pub(crate) fn new(
        rules: &'a RuleTable,
        exceptions: &'a ExceptionTable,
        persistent: &'a RuleGroup,
        rng: &'a mut StdRng,
        per_word: bool,
        observer: Option<&'o mut dyn FnMut(&Step<'_>)>,
    ) -> Self {
        Scheduler {
            rules,
            exceptions,
            persistent,
            rng,
            per_word,
            observer,
            metrics: RunMetrics::default(),
            odds: HashMap::new(),
            in_persistent: false,
        }
    }

    pub(crate) fn run_group(&mut self, group: &RuleGroup, words: &mut DialectWords) -> Result<()> {
        let params = group.params();
        let mut order: Vec<&GroupChild> = group.children().iter().collect();
        let mut ran = 0u32;

        for iteration in 0..params.times {
            let odds = self.odds(group);
            if !self.roll(odds.prob) {
                log::trace!("group #{} iteration {} skipped", group.id(), iteration + 1);
                self.decay(group);
                continue;
            }
            if params.shuffle {
                order.shuffle(&mut *self.rng);
            }

            for child in &order {
                match child {
                    GroupChild::Heading(heading) => {
                        self.emit(&Step::Heading { level: heading.level, text: &heading.text });
                        continue;
                    }
                    GroupChild::Rule(id) => {
                        let odds = self.odds(group);
                        if !self.roll(odds.ruleprob) {
                            continue;
                        }
                        self.run_rule(*id, words)?;
                        self.run_persistent(words)?;
                    }
                    GroupChild::Group(nested) => {
                        let odds = self.odds(group);
                        if !self.roll(odds.ruleprob) {
                            continue;
                        }
                        self.run_group(nested, words)?;
                    }
                }

                ran += 1;
                if params.max.is_some_and(|max| ran >= max) {
                    log::trace!("group #{} reached max={}", group.id(), ran);
                    self.decay(group);
                    return Ok(());
                }
            }

            self.decay(group);
        }
        Ok(())
    }

    /// Apply one rule in every dialect.
    fn run_rule(&mut self, id: RuleId, words: &mut DialectWords) -> Result<()> {
        let rule = self.rules.get(id).ok_or_else(|| Error::malformed(format!("no rule with id {id}")))?;

        for (dialect, word) in words.iter_mut() {
            if self.per_word {
                *self.rng = word_rng(word);
            }
            self.metrics.rules_tried += 1;

            let (outcome, after) = match rule.apply(word, dialect, Some(self.exceptions), self.rng)? {
                Outcome::Applied(after) => {
                    self.metrics.applications += 1;
                    if after != *word {
                        self.metrics.changes += 1;
                    }
                    (OutcomeKind::Applied, after)
                }
                Outcome::NotApplicable => {
                    self.metrics.not_applicable += 1;
                    (OutcomeKind::NotApplicable, word.clone())
                }
                Outcome::Exception => {
                    self.metrics.exceptions += 1;
                    (OutcomeKind::Exception, word.clone())
                }
            };

            if let Some(observer) = self.observer.as_mut() {
                observer(&Step::Rule {
                    rule,
                    dialect,
                    outcome,
                    before: word,
                    after: &after,
                    persistent: self.in_persistent,
                });
            }
            *word = after;
        }
        Ok(())
    }

    /// One full pass of the persistent group. Not re-entrant: rules applied
    /// during the pass do not start another one.
    fn run_persistent(&mut self, words: &mut DialectWords) -> Result<()> {
        let persistent = self.persistent;
        if self.in_persistent || persistent.is_empty() {
            return Ok(());
        }
        self.in_persistent = true;
        self.metrics.persistent_passes += 1;
        let result = self.run_group(persistent, words);
        self.in_persistent = false;
        result
    }

    fn odds(&mut self, group: &RuleGroup) -> Odds {
        *self
            .odds
            .entry(group.id())
            .or_insert_with(|| Odds { prob: group.params().prob, ruleprob: group.params().ruleprob })
    }

    /// `true` with probability `percent`; always when there is no gate.
    fn roll(&mut self, percent: Option<f64>) -> bool {
        percent.is_none_or(|p| (self.rng.gen_range(0u32..100) as f64) < p)
    }

    fn decay(&mut self, group: &RuleGroup) {
        let Some(factor) = group.params().reduce else {
            return;
        };
        if let Some(odds) = self.odds.get_mut(&group.id()) {
            odds.prob = odds.prob.map(|p| p * factor);
            odds.ruleprob = odds.ruleprob.map(|p| p * factor);
            log::trace!("group #{} odds now {:?}/{:?}", group.id(), odds.prob, odds.ruleprob);
        }
    }

    fn emit(&mut self, step: &Step<'_>) {
        if let Some(observer) = self.observer.as_mut() {
            observer(step);
        }
    }

    pub(crate) fn finish(self) -> RunMetrics {
        self.metrics
    }
}
