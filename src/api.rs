use crate::engine::{DefinitionKind, Engine, Rule};
use crate::error::{Error, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::FxHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// How the engine's random stream is seeded.
///
/// Randomness drives `prob`/`ruleprob` gates, shuffled groups, percentage
/// flags and random picks (`<@V>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedMode {
    /// Seed from the operating system; results vary between runs.
    Entropy,
    /// One fixed seed for the whole run.
    Fixed(u64),
    /// Reseed from the word itself, so a word always comes out the same way
    /// no matter what was processed before it.
    #[default]
    PerWord,
}

impl SeedMode {
    pub fn rng(self) -> StdRng {
        match self {
            SeedMode::Entropy => StdRng::from_entropy(),
            SeedMode::Fixed(seed) => StdRng::seed_from_u64(seed),
            SeedMode::PerWord => word_rng(""),
        }
    }

    /// `time`, `word`, a number, or any other text (hashed).
    pub fn parse(text: &str) -> SeedMode {
        match text {
            "time" => SeedMode::Entropy,
            "word" => SeedMode::PerWord,
            other => SeedMode::Fixed(other.parse().unwrap_or_else(|_| hash(other))),
        }
    }
}

impl fmt::Display for SeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedMode::Entropy => f.write_str("time"),
            SeedMode::Fixed(seed) => write!(f, "{seed}"),
            SeedMode::PerWord => f.write_str("word"),
        }
    }
}

pub(crate) fn word_rng(word: &str) -> StdRng {
    StdRng::seed_from_u64(hash(word))
}

fn hash(text: &str) -> u64 {
    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Options that affect ingestion and processing.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Command-line variables (`-D name[=value]`), read by `!skipif`,
    /// `!skipunless` and `&name:default` group parameters.
    pub defines: HashMap<String, String>,
    /// Initial seed mode; `!seed` overrides it.
    pub seed: SeedMode,
}

impl Options {
    /// Parse `name` or `name=value`.
    pub fn define(&mut self, spec: &str) {
        match spec.split_once('=') {
            Some((name, value)) => self.defines.insert(name.to_string(), value.to_string()),
            None => self.defines.insert(spec.to_string(), String::new()),
        };
    }
}

/// The current form of one word in each dialect, in dialect order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectWords {
    entries: Vec<(char, String)>,
}

impl DialectWords {
    pub fn new(word: &str, dialects: &str) -> Self {
        DialectWords { entries: dialects.chars().map(|d| (d, word.to_string())).collect() }
    }

    pub fn get(&self, dialect: char) -> Option<&str> {
        self.entries.iter().find(|(d, _)| *d == dialect).map(|(_, w)| w.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &str)> {
        self.entries.iter().map(|(d, w)| (*d, w.as_str()))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (char, &mut String)> {
        self.entries.iter_mut().map(|(d, w)| (*d, w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The word in the first requested dialect.
    pub fn first(&self) -> Option<&str> {
        self.entries.first().map(|(_, w)| w.as_str())
    }
}

impl fmt::Display for DialectWords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (_, word)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            f.write_str(word)?;
        }
        Ok(())
    }
}

/// What happened when a rule met a word in one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Applied = 0,
    NotApplicable = 1,
    Exception = 2,
}

impl OutcomeKind {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One step of processing, as seen by an observer.
#[derive(Debug, Clone, Copy)]
pub enum Step<'a> {
    Rule {
        rule: &'a Rule,
        dialect: char,
        outcome: OutcomeKind,
        before: &'a str,
        after: &'a str,
        /// The rule ran as part of a persistent pass.
        persistent: bool,
    },
    Heading {
        level: u8,
        text: &'a str,
    },
}

/// Aggregate counts of what has been loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counts {
    pub rules: usize,
    pub persistent: usize,
    pub definitions: Vec<(DefinitionKind, usize)>,
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rules: {}  persistent: {}", self.rules, self.persistent)?;
        for (kind, count) in &self.definitions {
            write!(f, "  {}s: {}", kind.keyword(), count)?;
        }
        Ok(())
    }
}

/// Compile `source` and run `word` through it in the first declared dialect.
///
/// # Example
/// ```
/// let out = soundshift::apply_rules("V = aeiou\n* a e #_\n", "apple").unwrap();
/// assert_eq!(out, "epple");
/// ```
pub fn apply_rules(source: &str, word: &str) -> Result<String> {
    let mut engine = Engine::new(Options::default());
    engine.compile_str("<input>", source)?;
    let words = engine.process_word(word, None)?;
    words.first().map(str::to_string).ok_or_else(|| Error::malformed("no dialects to process"))
}
