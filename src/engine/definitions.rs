//! Definition tables.
//!
//! Six independent namespaces, one per [`DefinitionKind`]. A name may be
//! defined once per kind; the same name can mean different things in
//! different kinds (`cat V` and `list V` do not clash).
//!
//! Values are parsed when they are defined, so later lookups never fail on
//! malformed text:
//!
//! | kind      | source form            | stored as                  |
//! |-----------|------------------------|----------------------------|
//! | `cat`     | `V = a e i o u`        | symbol string              |
//! | `list`    | `list L = [ab,cd]`     | entries                    |
//! | `string`  | `string s = tʃ`        | text                       |
//! | `change`  | `change c = a e`       | (target, replacement)      |
//! | `env`     | `env e = V_#`          | environment text           |
//! | `feature` | `feature Voice = ptk \| bdg` | (negative, positive) |
//!
//! A definition written with `==` is *raw*: string and list values are used as
//! pattern text without escaping, and category symbols are taken literally.

use super::category;
use super::source::split_escaped;
use crate::error::{Error, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefinitionKind {
    Category,
    List,
    String,
    Change,
    Environment,
    Feature,
}

impl DefinitionKind {
    pub const ALL: [DefinitionKind; 6] = [
        DefinitionKind::Category,
        DefinitionKind::List,
        DefinitionKind::String,
        DefinitionKind::Change,
        DefinitionKind::Environment,
        DefinitionKind::Feature,
    ];

    /// Keyword used in source files.
    pub fn keyword(self) -> &'static str {
        match self {
            DefinitionKind::Category => "cat",
            DefinitionKind::List => "list",
            DefinitionKind::String => "string",
            DefinitionKind::Change => "change",
            DefinitionKind::Environment => "env",
            DefinitionKind::Feature => "feature",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        DefinitionKind::ALL.into_iter().find(|k| k.keyword() == keyword)
    }

    /// Human-readable name used in messages.
    pub fn label(self) -> &'static str {
        match self {
            DefinitionKind::Category => "category",
            DefinitionKind::List => "list",
            DefinitionKind::String => "string",
            DefinitionKind::Change => "change",
            DefinitionKind::Environment => "environment",
            DefinitionKind::Feature => "feature",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDefinition {
    pub values: Vec<String>,
    pub raw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringDefinition {
    pub value: String,
    pub raw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDefinition {
    pub target: String,
    pub replacement: String,
}

/// Negative and positive classes of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub negative: String,
    pub positive: String,
}

impl Feature {
    pub fn side(&self, positive: bool) -> &str {
        if positive { &self.positive } else { &self.negative }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Definitions {
    categories: BTreeMap<String, String>,
    lists: BTreeMap<String, ListDefinition>,
    strings: BTreeMap<String, StringDefinition>,
    changes: BTreeMap<String, ChangeDefinition>,
    environments: BTreeMap<String, String>,
    features: BTreeMap<String, Feature>,
}

impl Definitions {
    /// Parse `spec` and store it as `name` in `kind`.
    pub fn define(&mut self, kind: DefinitionKind, name: &str, spec: &str, raw: bool) -> Result<()> {
        if self.contains(kind, name) {
            return Err(Error::DuplicateDefinition { kind: kind.label(), name: name.to_string() });
        }
        let spec = spec.trim();

        match kind {
            DefinitionKind::Category => {
                let symbols = self.parse_category(spec, raw)?;
                self.categories.insert(name.to_string(), symbols);
            }
            DefinitionKind::List => {
                let list = self.parse_list(spec, raw)?;
                self.lists.insert(name.to_string(), list);
            }
            DefinitionKind::String => {
                self.strings.insert(name.to_string(), StringDefinition { value: spec.to_string(), raw });
            }
            DefinitionKind::Change => {
                let fields = split_escaped(spec, None);
                let [target, replacement] = <[String; 2]>::try_from(fields)
                    .map_err(|_| Error::malformed("there must be exactly 2 fields in a change definition"))?;
                self.changes.insert(name.to_string(), ChangeDefinition { target, replacement });
            }
            DefinitionKind::Environment => {
                if split_escaped(spec, None).len() != 1 {
                    return Err(Error::malformed("there must be exactly 1 field in an environment definition"));
                }
                if !spec.contains('_') {
                    return Err(Error::malformed("there must be a '_' character in an environment definition"));
                }
                self.environments.insert(name.to_string(), spec.to_string());
            }
            DefinitionKind::Feature => {
                let feature = self.parse_feature(name, spec)?;
                self.features.insert(name.to_string(), feature);
            }
        }

        log::debug!("defined {} '{}'", kind.label(), name);
        Ok(())
    }

    fn parse_category(&self, spec: &str, raw: bool) -> Result<String> {
        if raw {
            return Ok(spec.chars().filter(|c| !c.is_whitespace()).collect());
        }
        let mut symbols = String::new();
        for token in split_escaped(spec, None) {
            let value = category::evaluate(self, &token)?;
            if value.is_complement() {
                return Err(Error::malformed(format!("a category definition cannot be a complement ('{token}')")));
            }
            symbols.push_str(value.symbols());
        }
        Ok(symbols)
    }

    fn parse_list(&self, spec: &str, raw: bool) -> Result<ListDefinition> {
        let inner = spec.strip_prefix('[').and_then(|s| s.strip_suffix(']')).unwrap_or(spec);
        let mut values = Vec::new();
        for entry in split_escaped(inner, Some(',')) {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(Error::malformed(format!("empty entry in list '{spec}'")));
            }
            values.push(self.expand_entry(entry)?);
        }
        Ok(ListDefinition { values, raw })
    }

    /// Resolve a `$name` list entry to the string it names.
    pub(crate) fn expand_entry(&self, entry: &str) -> Result<String> {
        match entry.strip_prefix('$') {
            Some(name) => Ok(self.find_string(name.trim_end_matches('$'))?.value.clone()),
            None => Ok(entry.to_string()),
        }
    }

    fn parse_feature(&self, name: &str, spec: &str) -> Result<Feature> {
        let halves: Vec<&str> = spec.split('|').collect();
        if halves.len() != 2 {
            return Err(Error::malformed("there must be exactly two fields in a feature definition"));
        }

        let mut sides = Vec::with_capacity(2);
        for (half, label) in halves.iter().zip(["negative", "positive"]) {
            if half.trim().is_empty() {
                return Err(Error::malformed(format!("empty {label} part in feature definition")));
            }
            let mut symbols = String::new();
            for token in half.split_whitespace() {
                let value = category::evaluate(self, token)?;
                if value.is_complement() {
                    return Err(Error::malformed(format!("feature '{name}' cannot use a complement ('{token}')")));
                }
                symbols.push_str(value.symbols());
            }
            sides.push(symbols);
        }

        let positive = sides.pop().unwrap_or_default();
        let negative = sides.pop().unwrap_or_default();
        let (n, p) = (negative.chars().count(), positive.chars().count());
        if n != p {
            return Err(Error::FeatureLengthMismatch { name: name.to_string(), negative: n, positive: p });
        }
        Ok(Feature { negative, positive })
    }

    pub fn contains(&self, kind: DefinitionKind, name: &str) -> bool {
        match kind {
            DefinitionKind::Category => self.categories.contains_key(name),
            DefinitionKind::List => self.lists.contains_key(name),
            DefinitionKind::String => self.strings.contains_key(name),
            DefinitionKind::Change => self.changes.contains_key(name),
            DefinitionKind::Environment => self.environments.contains_key(name),
            DefinitionKind::Feature => self.features.contains_key(name),
        }
    }

    pub fn category(&self, name: &str) -> Option<&str> {
        self.categories.get(name).map(String::as_str)
    }

    pub fn list(&self, name: &str) -> Option<&ListDefinition> {
        self.lists.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&StringDefinition> {
        self.strings.get(name)
    }

    pub fn change(&self, name: &str) -> Option<&ChangeDefinition> {
        self.changes.get(name)
    }

    pub fn environment(&self, name: &str) -> Option<&str> {
        self.environments.get(name).map(String::as_str)
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }

    pub(crate) fn find_string(&self, name: &str) -> Result<&StringDefinition> {
        self.string(name).ok_or_else(|| undefined(DefinitionKind::String, name))
    }

    pub(crate) fn find_change(&self, name: &str) -> Result<&ChangeDefinition> {
        self.change(name).ok_or_else(|| undefined(DefinitionKind::Change, name))
    }

    pub(crate) fn find_environment(&self, name: &str) -> Result<&str> {
        self.environment(name).ok_or_else(|| undefined(DefinitionKind::Environment, name))
    }

    pub(crate) fn find_feature(&self, name: &str) -> Result<&Feature> {
        self.feature(name).ok_or_else(|| undefined(DefinitionKind::Feature, name))
    }

    pub fn count(&self, kind: DefinitionKind) -> usize {
        match kind {
            DefinitionKind::Category => self.categories.len(),
            DefinitionKind::List => self.lists.len(),
            DefinitionKind::String => self.strings.len(),
            DefinitionKind::Change => self.changes.len(),
            DefinitionKind::Environment => self.environments.len(),
            DefinitionKind::Feature => self.features.len(),
        }
    }

    /// `(name, value)` pairs for one kind, sorted by name, with values
    /// rendered the way they would be written in a source file.
    pub fn entries(&self, kind: DefinitionKind) -> Vec<(String, String)> {
        fn collect<V>(map: &BTreeMap<String, V>, show: impl Fn(&V) -> String) -> Vec<(String, String)> {
            map.iter().map(|(k, v)| (k.clone(), show(v))).collect()
        }

        match kind {
            DefinitionKind::Category => collect(&self.categories, |v| v.clone()),
            DefinitionKind::List => collect(&self.lists, |v| v.values.join(",")),
            DefinitionKind::String => collect(&self.strings, |v| v.value.clone()),
            DefinitionKind::Change => collect(&self.changes, |v| format!("{} {}", v.target, v.replacement)),
            DefinitionKind::Environment => collect(&self.environments, |v| v.clone()),
            DefinitionKind::Feature => collect(&self.features, |v| format!("{}|{}", v.negative, v.positive)),
        }
    }
}

fn undefined(kind: DefinitionKind, name: &str) -> Error {
    Error::UndefinedReference { kind: kind.label(), name: name.to_string() }
}
