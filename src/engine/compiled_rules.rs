//! The compiled rule table.
//!
//! Rules are stored once, in source order, and referred to everywhere else
//! (groups, the scheduler, assertions) by [`RuleId`].
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleTable::rules` and never changes once issued.
//! - Rule names are unique; `by_name` maps each name to its rule.

use super::rule::Rule;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Rule identifier (index into the rules vector).
pub type RuleId = usize;

/// `!assert` attached to a rule: applying the rule to `input` in `dialect`
/// must give `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub rule: RuleId,
    pub dialect: char,
    pub input: String,
    pub expected: String,
    pub file: String,
    pub line: usize,
}

#[derive(Debug, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
    by_name: HashMap<String, RuleId>,
    assertions: Vec<Assertion>,
}

impl RuleTable {
    pub fn insert(&mut self, rule: Rule) -> Result<RuleId> {
        let id = self.rules.len();
        if let Some(name) = rule.name() {
            if self.by_name.contains_key(name) {
                return Err(Error::DuplicateDefinition { kind: "rule", name: name.to_string() });
            }
            self.by_name.insert(name.to_string(), id);
        }
        self.rules.push(rule);
        Ok(id)
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn named(&self, name: &str) -> Option<&Rule> {
        self.by_name.get(name).and_then(|&id| self.rules.get(id))
    }

    pub(crate) fn find_named(&self, name: &str) -> Result<&Rule> {
        self.named(name).ok_or_else(|| Error::UndefinedReference { kind: "rule", name: name.to_string() })
    }

    /// The most recently compiled rule.
    pub fn last(&self) -> Option<&Rule> {
        self.rules.last()
    }

    pub fn last_id(&self) -> Option<RuleId> {
        self.rules.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter().enumerate()
    }

    pub fn persistent_count(&self) -> usize {
        self.rules.iter().filter(|rule| rule.is_persistent()).count()
    }

    pub fn add_assertion(&mut self, assertion: Assertion) {
        self.assertions.push(assertion);
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::definitions::Definitions;
    use crate::engine::rule::Origin;

    fn compile(table: &RuleTable, statement: &str) -> Rule {
        let origin = Origin { file: "test.sca", line: table.len() + 1 };
        Rule::compile(statement, &Definitions::default(), table, "A", origin).unwrap()
    }

    #[test]
    fn names_are_unique_and_resolvable() {
        let mut table = RuleTable::default();
        let first = compile(&table, "* a e _ @fronting");
        assert_eq!(table.insert(first).unwrap(), 0);
        let second = compile(&table, "* o u _");
        assert_eq!(table.insert(second).unwrap(), 1);

        assert_eq!(table.named("fronting").map(Rule::line), Some(1));
        assert_eq!(table.last_id(), Some(1));
        assert!(matches!(table.find_named("raising"), Err(Error::UndefinedReference { kind: "rule", .. })));

        let duplicate = compile(&table, "* i e _ @fronting");
        assert!(matches!(table.insert(duplicate), Err(Error::DuplicateDefinition { kind: "rule", .. })));
    }

    #[test]
    fn previous_and_named_rules_feed_shorthands() {
        let mut table = RuleTable::default();
        let rule = compile(&table, "* a e #_ @fronting");
        table.insert(rule).unwrap();

        let reused = compile(&table, "* ` ` _#");
        assert_eq!(reused.to_string(), "a -> e / _#");
        let named = compile(&table, "* o u `@fronting");
        assert_eq!(named.texts().environment(), "#_");
        let change = compile(&table, "* `@fronting _");
        assert_eq!(change.to_string(), "a -> e / _");
    }
}
