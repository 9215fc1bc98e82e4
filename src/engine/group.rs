//! Rule groups.
//!
//! Every rule lives in a group. The engine owns two roots: the main group,
//! which receives every rule not inside an explicit `!group`, and the
//! persistent group, which receives rules flagged `P`.
//!
//! Group parameters (`!group key=value ...`):
//!
//! | key        | type    | range     | default |
//! |------------|---------|-----------|---------|
//! | `times`    | integer | 1..=1000  | 1       |
//! | `max`      | integer | 1..=1000  | none    |
//! | `shuffle`  | flag    |           | off     |
//! | `pick`     | integer | 1..=1000  | none    |
//! | `prob`     | percent | 1..=100   | none    |
//! | `ruleprob` | percent | 1..=100   | none    |
//! | `name`     | text    |           | none    |
//! | `reduce`   | factor  | 0..=1     | none    |
//!
//! A value written `&var:default` takes the command-line variable `var` when
//! it is defined and not empty, and `default` otherwise. `pick=n` implies
//! `shuffle` and `max=n`.

use super::compiled_rules::{RuleId, RuleTable};
use crate::error::{Error, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct GroupParams {
    pub times: u32,
    pub max: Option<u32>,
    pub shuffle: bool,
    pub pick: Option<u32>,
    /// Chance, in percent, that an iteration runs at all.
    pub prob: Option<f64>,
    /// Chance, in percent, that each child runs within an iteration.
    pub ruleprob: Option<f64>,
    pub name: Option<String>,
    /// Factor applied to `prob` and `ruleprob` after every iteration.
    pub reduce: Option<f64>,
}

impl Default for GroupParams {
    fn default() -> Self {
        GroupParams {
            times: 1,
            max: None,
            shuffle: false,
            pick: None,
            prob: None,
            ruleprob: None,
            name: None,
            reduce: None,
        }
    }
}

impl GroupParams {
    pub fn parse(args: &[(String, Option<String>)], defines: &HashMap<String, String>) -> Result<Self> {
        let mut params = GroupParams::default();

        for (key, value) in args {
            let value = value.as_deref().map(|v| substitute(v, defines)).transpose()?;
            let required = || value.clone().ok_or_else(|| Error::malformed(format!("no value for parameter '{key}'")));

            match key.as_str() {
                "times" => params.times = integer(key, &required()?, 1, 1000)?,
                "max" => params.max = Some(integer(key, &required()?, 1, 1000)?),
                "pick" => params.pick = Some(integer(key, &required()?, 1, 1000)?),
                "prob" => params.prob = Some(integer(key, &required()?, 1, 100)? as f64),
                "ruleprob" => params.ruleprob = Some(integer(key, &required()?, 1, 100)? as f64),
                "name" => params.name = Some(required()?),
                "reduce" => {
                    let text = required()?;
                    let factor: f64 = text
                        .parse()
                        .map_err(|_| Error::malformed(format!("'{text}' does not represent a number")))?;
                    if !(0.0..=1.0).contains(&factor) {
                        return Err(Error::malformed(format!("'{key}' must be between 0 and 1, not {text}")));
                    }
                    params.reduce = Some(factor);
                }
                "shuffle" => {
                    params.shuffle = !matches!(value.as_deref(), Some("0" | "no" | "false" | "off"));
                }
                other => return Err(Error::malformed(format!("unknown parameter '{other}' for group"))),
            }
        }

        if let Some(pick) = params.pick {
            params.shuffle = true;
            params.max = Some(pick);
        }
        Ok(params)
    }
}

fn substitute(value: &str, defines: &HashMap<String, String>) -> Result<String> {
    let Some(reference) = value.strip_prefix('&') else {
        return Ok(value.to_string());
    };
    let Some((name, default)) = reference.split_once(':') else {
        return Err(Error::malformed(format!("variable reference '{value}' needs a default after ':'")));
    };
    Ok(match defines.get(name) {
        Some(defined) if !defined.is_empty() => defined.clone(),
        _ => default.to_string(),
    })
}

fn integer(key: &str, text: &str, min: u32, max: u32) -> Result<u32> {
    let n: u32 = text.parse().map_err(|_| Error::malformed(format!("'{text}' does not represent an integer")))?;
    if !(min..=max).contains(&n) {
        return Err(Error::malformed(format!("'{key}' must be between {min} and {max}, not {n}")));
    }
    Ok(n)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// 0 for `!heading`, 1 for `!subheading`, 2 for `!subsubheading`.
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupChild {
    Rule(RuleId),
    Heading(Heading),
    Group(RuleGroup),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleGroup {
    id: usize,
    params: GroupParams,
    children: Vec<GroupChild>,
}

impl RuleGroup {
    /// `id` keys the group's decaying odds during processing, so it must be
    /// unique within an engine.
    pub fn new(id: usize, params: GroupParams) -> Self {
        RuleGroup { id, params, children: Vec::new() }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn params(&self) -> &GroupParams {
        &self.params
    }

    pub fn name(&self) -> Option<&str> {
        self.params.name.as_deref()
    }

    pub fn children(&self) -> &[GroupChild] {
        &self.children
    }

    pub fn push(&mut self, child: GroupChild) {
        self.children.push(child);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Rules in this group and all nested groups.
    pub fn rule_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                GroupChild::Rule(_) => 1,
                GroupChild::Heading(_) => 0,
                GroupChild::Group(group) => group.rule_count(),
            })
            .sum()
    }

    /// Rules in source order, nested groups flattened.
    pub fn rule_ids(&self) -> Vec<RuleId> {
        let mut ids = Vec::new();
        self.collect_rules(&mut ids);
        ids
    }

    fn collect_rules(&self, ids: &mut Vec<RuleId>) {
        for child in &self.children {
            match child {
                GroupChild::Rule(id) => ids.push(*id),
                GroupChild::Heading(_) => {}
                GroupChild::Group(group) => group.collect_rules(ids),
            }
        }
    }

    /// One-line summary for logs and listings.
    pub fn describe(&self, rules: &RuleTable) -> String {
        let name = self.name().unwrap_or("(unnamed)");
        format!("group {} #{}: {} rule(s) of {}", name, self.id, self.rule_count(), rules.len())
    }
}

/// Follow `path` (indices of nested group children) down from `root`.
pub(crate) fn group_at<'g>(root: &'g mut RuleGroup, path: &[usize]) -> Result<&'g mut RuleGroup> {
    let mut group = root;
    for &index in path {
        group = match group.children.get_mut(index) {
            Some(GroupChild::Group(child)) => child,
            _ => return Err(Error::malformed("the active group has gone missing")),
        };
    }
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Option<&str>)]) -> Vec<(String, Option<String>)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.map(str::to_string))).collect()
    }

    #[test]
    fn pick_implies_shuffle_and_max() {
        let params = GroupParams::parse(&args(&[("pick", Some("2")), ("times", Some("3"))]), &HashMap::new()).unwrap();
        assert!(params.shuffle);
        assert_eq!(params.max, Some(2));
        assert_eq!(params.times, 3);
    }

    #[test]
    fn ranges_and_unknown_keys() {
        let defines = HashMap::new();
        assert!(GroupParams::parse(&args(&[("times", Some("0"))]), &defines).is_err());
        assert!(GroupParams::parse(&args(&[("prob", Some("101"))]), &defines).is_err());
        assert!(GroupParams::parse(&args(&[("reduce", Some("1.5"))]), &defines).is_err());
        assert!(GroupParams::parse(&args(&[("max", None)]), &defines).is_err());
        assert!(GroupParams::parse(&args(&[("colour", Some("red"))]), &defines).is_err());

        let params = GroupParams::parse(&args(&[("shuffle", None), ("reduce", Some("0.5"))]), &defines).unwrap();
        assert!(params.shuffle);
        assert_eq!(params.reduce, Some(0.5));
    }

    #[test]
    fn variables_with_defaults() {
        let mut defines = HashMap::new();
        defines.insert("N".to_string(), "4".to_string());
        defines.insert("EMPTY".to_string(), String::new());

        let parsed = GroupParams::parse(
            &args(&[("times", Some("&N:1")), ("max", Some("&EMPTY:2")), ("pick", Some("&MISSING:3"))]),
            &defines,
        )
        .unwrap();
        assert_eq!(parsed.times, 4);
        assert_eq!(parsed.max, Some(3));
        assert_eq!(parsed.pick, Some(3));
        assert!(GroupParams::parse(&args(&[("times", Some("&N"))]), &defines).is_err());
    }

    #[test]
    fn nested_paths_and_counts() {
        let mut root = RuleGroup::new(0, GroupParams::default());
        root.push(GroupChild::Rule(0));
        root.push(GroupChild::Group(RuleGroup::new(2, GroupParams::default())));
        group_at(&mut root, &[1]).unwrap().push(GroupChild::Rule(1));
        group_at(&mut root, &[1]).unwrap().push(GroupChild::Heading(Heading { level: 0, text: "x".into() }));

        assert_eq!(root.rule_count(), 2);
        assert_eq!(root.rule_ids(), vec![0, 1]);
        assert!(group_at(&mut root, &[0]).is_err());
    }
}
