//! Engine run metrics.
//!
//! - `Engine::process_word` for normal operation.
//! - `Engine::process_word_verbose` for profiling and for checking what a
//!   rule file actually did to a word.

use crate::api::DialectWords;
use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunMetrics {
    /// Total elapsed time for [`crate::Engine::process_word_verbose`].
    pub total: Duration,
    /// (rule, dialect) pairs attempted, persistent passes included.
    pub rules_tried: usize,
    /// Attempts that ran the rule over the word.
    pub applications: usize,
    /// Applications that changed the word.
    pub changes: usize,
    /// Attempts skipped because the word is an exception.
    pub exceptions: usize,
    /// Attempts skipped for the dialect or a failed probability roll.
    pub not_applicable: usize,
    /// Full runs of the persistent group.
    pub persistent_passes: usize,
}

/// Processing output bundled with counters.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub words: DialectWords,
    pub metrics: RunMetrics,
}
