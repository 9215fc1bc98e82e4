//! Per-rule word exceptions.
//!
//! Exceptions are keyed by rule name, so only named rules (`@name` flag) can
//! have them. An exception file looks like this:
//!
//! ```text
//! # words that keep their final vowel
//! @apocope AB
//! mama papa
//! @lenition
//! kaka
//! ```
//!
//! A header without dialects applies to every dialect.

use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone)]
struct ExceptionEntry {
    dialects: Option<String>,
    words: HashSet<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ExceptionTable {
    entries: HashMap<String, Vec<ExceptionEntry>>,
}

impl ExceptionTable {
    /// Exclude `words` from the rule called `rule`, in `dialects` (all when `None`).
    pub fn add<I, S>(&mut self, rule: &str, words: I, dialects: Option<&str>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = words.into_iter().map(Into::into).collect();
        let dialects = dialects.filter(|d| !d.is_empty()).map(str::to_string);
        log::debug!("{} exception(s) for rule '{}'", words.len(), rule);
        self.entries.entry(rule.to_string()).or_default().push(ExceptionEntry { dialects, words });
    }

    pub fn is_exception(&self, rule: &str, word: &str, dialect: char) -> bool {
        let Some(entries) = self.entries.get(rule) else {
            return false;
        };
        entries.iter().any(|entry| {
            entry.words.contains(word) && entry.dialects.as_deref().is_none_or(|d| d.contains(dialect))
        })
    }

    /// Number of rules that have exceptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn read_file(&mut self, path: &Path) -> Result<()> {
        let text =
            std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.display().to_string(), source })?;
        log::info!("loading exceptions from '{}'", path.display());
        self.load_str(&path.display().to_string(), &text)
    }

    pub fn load_str(&mut self, name: &str, text: &str) -> Result<()> {
        let mut current: Option<(String, String)> = None;

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('@') {
                let mut tokens = header.split_whitespace();
                let rule = tokens
                    .next()
                    .ok_or_else(|| Error::malformed("missing rule name after '@'").at(name, idx + 1))?;
                current = Some((rule.to_string(), tokens.collect()));
                continue;
            }

            let Some((rule, dialects)) = &current else {
                return Err(Error::malformed("no rule named before the first words").at(name, idx + 1));
            };
            self.add(rule, line.split_whitespace(), Some(dialects.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_restrictions() {
        let mut table = ExceptionTable::default();
        table.add("apocope", ["mama", "papa"], Some("AB"));
        table.add("lenition", ["kaka"], None);

        assert!(table.is_exception("apocope", "mama", 'A'));
        assert!(!table.is_exception("apocope", "mama", 'C'));
        assert!(!table.is_exception("apocope", "kaka", 'A'));
        assert!(table.is_exception("lenition", "kaka", 'Z'));
        assert!(!table.is_exception("unknown", "kaka", 'A'));
    }

    #[test]
    fn file_format() {
        let mut table = ExceptionTable::default();
        table.load_str("words.txt", "# note\n@apocope AB\nmama papa\n\n@lenition\nkaka\n").unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.is_exception("apocope", "papa", 'B'));
        assert!(table.is_exception("lenition", "kaka", 'C'));

        let err = ExceptionTable::default().load_str("words.txt", "mama\n").unwrap_err();
        assert!(err.to_string().starts_with("at line 1 of 'words.txt'"));
    }
}
