//! Rule compilation and application.
//!
//! A rule statement has the form
//!
//! ```text
//! dialects target replacement context-left_context-right [flags]
//! ```
//!
//! and compiles to one expression with three named groups:
//!
//! ```text
//! (?P<pre>context-left)(?P<target>target)(?P<post>context-right)
//! ```
//!
//! Matching is always *anchored* at the cursor: a match that starts anywhere
//! else is ignored, and the cursor moves on by one symbol instead.
//!
//! Shorthands resolved before parsing:
//!
//! | written          | means                                            |
//! |------------------|--------------------------------------------------|
//! | `` ` ``          | same field as the previous rule                  |
//! | `` `@name ``     | target and replacement (or environment) of a named rule |
//! | `` `name ``      | a `change` (or `env`) definition                 |
//! | `%_x`            | context-left is the target, target is `%1`       |
//! | `x_%`, `x_<`     | context-right is `%2`, `%1`                      |
//! | `<`, `>`         | replacement is `%1`, `%3`                        |
//!
//! Flags: `1`-`99` application probability, `@name`, `B` overlap, `F` once,
//! `L` once + reverse, `R` overlap + reverse, `P` persistent.

use super::compiled_rules::RuleTable;
use super::definitions::Definitions;
use super::exceptions::ExceptionTable;
use super::item::{Field, Item, Matched};
use super::part::Part;
use super::source::split_escaped;
use crate::error::{Error, Result};
use fancy_regex::Regex;
use rand::Rng;
use rand::rngs::StdRng;
use std::fmt;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleFlags: u8 {
        /// Scan right to left.
        const REVERSE    = 1 << 0;
        /// Let the context-right of one match take part in the next.
        const OVERLAP    = 1 << 1;
        /// Stop after the first match.
        const ONCE       = 1 << 2;
        /// Re-run after every other rule application.
        const PERSISTENT = 1 << 3;
    }
}

/// Which dialects a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialectFilter {
    All,
    Only(String),
}

impl DialectFilter {
    /// `*`, or a run of declared dialect codes.
    pub fn parse(spec: &str, declared: &str) -> Result<Self> {
        if spec == "*" {
            return Ok(DialectFilter::All);
        }
        if let Some(unknown) = spec.chars().find(|c| !declared.contains(*c)) {
            return Err(Error::malformed(format!("unknown dialect '{unknown}' in '{spec}'")));
        }
        Ok(DialectFilter::Only(spec.to_string()))
    }

    pub fn contains(&self, dialect: char) -> bool {
        match self {
            DialectFilter::All => true,
            DialectFilter::Only(codes) => codes.contains(dialect),
        }
    }
}

impl fmt::Display for DialectFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectFilter::All => f.write_str("*"),
            DialectFilter::Only(codes) => f.write_str(codes),
        }
    }
}

/// Field texts after shorthand resolution, kept for `` ` `` and `` `@name ``.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTexts {
    pub target: String,
    pub replacement: String,
    pub pre: String,
    pub post: String,
}

impl FieldTexts {
    pub fn environment(&self) -> String {
        format!("{}_{}", self.pre, self.post)
    }
}

/// Result of applying one rule to one word in one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(String),
    /// Wrong dialect, or the probability roll failed.
    NotApplicable,
    /// The word is listed as an exception for this rule.
    Exception,
}

#[derive(Debug)]
pub struct Rule {
    statement: String,
    file: String,
    line: usize,
    dialects: DialectFilter,
    texts: FieldTexts,
    pre: Part,
    target: Part,
    replacement: Part,
    post: Part,
    regex: Regex,
    splits: [Option<Regex>; 3],
    flags: RuleFlags,
    name: Option<String>,
    probability: Option<u8>,
}

/// Where a rule statement came from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Origin<'a> {
    pub file: &'a str,
    pub line: usize,
}

impl Rule {
    /// Compile a rule statement. `table` supplies the previous and named rules
    /// for the `` ` `` shorthands; `declared` lists the known dialect codes.
    pub(crate) fn compile(
        statement: &str,
        defs: &Definitions,
        table: &RuleTable,
        declared: &str,
        origin: Origin<'_>,
    ) -> Result<Rule> {
        let mut tokens = split_escaped(statement, None).into_iter();

        let dialects = tokens.next().ok_or_else(|| Error::malformed("no dialects given"))?;
        let dialects = DialectFilter::parse(&dialects, declared)?;

        let first = tokens.next().ok_or_else(|| Error::malformed("no target given"))?;
        let (target, replacement) = if first.len() > 1 && first.starts_with('`') {
            match &first[1..] {
                reference if reference.starts_with('@') => {
                    let texts = &table.find_named(&reference[1..])?.texts;
                    (texts.target.clone(), texts.replacement.clone())
                }
                reference => {
                    let change = defs.find_change(reference)?;
                    (change.target.clone(), change.replacement.clone())
                }
            }
        } else {
            let replacement = tokens.next().ok_or_else(|| Error::malformed("no replacement given"))?;
            (first, replacement)
        };

        let env = tokens.next().ok_or_else(|| Error::malformed("no environment given"))?;
        let (flags, name, probability) = parse_flags(tokens)?;

        let previous = || {
            table.last().map(|rule| &rule.texts).ok_or_else(|| Error::malformed("there is no previous rule"))
        };
        let mut target = if target == "`" { previous()?.target.clone() } else { target };
        let mut replacement = if replacement == "`" { previous()?.replacement.clone() } else { replacement };
        let (mut pre, mut post) = match env.strip_prefix('`') {
            Some("") => {
                let texts = previous()?;
                (texts.pre.clone(), texts.post.clone())
            }
            Some(reference) => match reference.strip_prefix('@') {
                Some(name) => split_environment(&table.find_named(name)?.texts.environment())?,
                None => split_environment(defs.find_environment(reference)?)?,
            },
            None => split_environment(&env)?,
        };

        if pre == "%" {
            pre = std::mem::replace(&mut target, "%1".to_string());
        }
        match post.as_str() {
            "%" => post = "%2".to_string(),
            "<" => post = "%1".to_string(),
            _ => {}
        }
        match replacement.as_str() {
            "<" => replacement = "%1".to_string(),
            ">" => replacement = "%3".to_string(),
            _ => {}
        }

        let pre_part = Part::parse(&pre, Field::Pre, defs, None)?;
        let target_part = Part::parse(&target, Field::Target, defs, None)?;
        let post_part = Part::parse(&post, Field::Post, defs, None)?;
        let matched = [pre_part.items(), target_part.items(), post_part.items()];
        let replacement_part = Part::parse(&replacement, Field::Replacement, defs, Some(matched))?;

        let pattern = format!(
            "(?P<pre>{})(?P<target>{})(?P<post>{})",
            pre_part.pattern(),
            target_part.pattern(),
            post_part.pattern()
        );
        let regex = Regex::new(&pattern).map_err(|e| Error::pattern(&pattern, e))?;

        // The target is always split; the contexts only when a blend reads from them.
        let mut wanted = [false, true, false];
        for item in replacement_part.items() {
            if let Item::Blend(blend) = item {
                wanted[blend.slot()] = true;
            }
        }
        let mut splits = [None, None, None];
        for (slot, part) in [&pre_part, &target_part, &post_part].into_iter().enumerate() {
            if wanted[slot] {
                splits[slot] = Some(part.split_regex()?);
            }
        }

        let rule = Rule {
            statement: statement.to_string(),
            file: origin.file.to_string(),
            line: origin.line,
            dialects,
            texts: FieldTexts { target, replacement, pre, post },
            pre: pre_part,
            target: target_part,
            replacement: replacement_part,
            post: post_part,
            regex,
            splits,
            flags,
            name,
            probability,
        };
        log::debug!("compiled rule {} as {}", rule, rule.regex.as_str());
        Ok(rule)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn flags(&self) -> RuleFlags {
        self.flags
    }

    pub fn is_persistent(&self) -> bool {
        self.flags.contains(RuleFlags::PERSISTENT)
    }

    pub fn dialects(&self) -> &DialectFilter {
        &self.dialects
    }

    /// Application probability in percent, if the rule has one.
    pub fn probability(&self) -> Option<u8> {
        self.probability
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn texts(&self) -> &FieldTexts {
        &self.texts
    }

    /// The compiled expression.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// The four parts in display order: target, replacement, context-left, context-right.
    pub fn parts(&self) -> [&Part; 4] {
        [&self.target, &self.replacement, &self.pre, &self.post]
    }

    /// Apply the rule to `word` as spoken in `dialect`.
    ///
    /// Exceptions are consulted only for named rules. A match that neither
    /// changes the word nor moves the cursor is stepped over; a replacement that
    /// keeps growing the word exactly as fast as the cursor advances (inserting
    /// before every symbol, say) never reaches the end of the word, so such rules
    /// need the `F` flag.
    pub fn apply(
        &self,
        word: &str,
        dialect: char,
        exceptions: Option<&ExceptionTable>,
        rng: &mut StdRng,
    ) -> Result<Outcome> {
        if !self.dialects.contains(dialect) {
            return Ok(Outcome::NotApplicable);
        }
        if let (Some(name), Some(exceptions)) = (&self.name, exceptions) {
            if exceptions.is_exception(name, word, dialect) {
                return Ok(Outcome::Exception);
            }
        }
        if let Some(percent) = self.probability {
            if rng.gen_range(0..100u8) >= percent {
                return Ok(Outcome::NotApplicable);
            }
        }

        let reverse = self.flags.contains(RuleFlags::REVERSE);
        let once = self.flags.contains(RuleFlags::ONCE);
        let mut word = word.to_string();
        let mut pos = if reverse { word.char_indices().next_back().map_or(0, |(i, _)| i) } else { 0 };

        loop {
            let splice = self.apply_at(&mut word, pos, rng)?;

            if reverse {
                if pos == 0 {
                    break;
                }
                pos -= word[..pos].chars().next_back().map_or(0, char::len_utf8);
            } else {
                match splice {
                    Some(Splice { advance: 0, changed: false }) | None => pos = next_boundary(&word, pos),
                    Some(Splice { advance, .. }) => pos += advance,
                }
                if pos >= word.len() {
                    break;
                }
            }

            if once && splice.is_some() {
                break;
            }
        }

        Ok(Outcome::Applied(word))
    }

    /// Try one anchored match at `pos` and splice in the replacement.
    fn apply_at(&self, word: &mut String, pos: usize, rng: &mut StdRng) -> Result<Option<Splice>> {
        let (spliced, advance) = {
            let caps =
                self.regex.captures_from_pos(word, pos).map_err(|e| Error::pattern(self.regex.as_str(), e))?;
            let Some(caps) = caps else {
                return Ok(None);
            };
            let (Some(whole), Some(pre), Some(target), Some(post)) =
                (caps.get(0), caps.name("pre"), caps.name("target"), caps.name("post"))
            else {
                return Ok(None);
            };
            if whole.start() != pos {
                return Ok(None);
            }

            let groups = [pre.as_str(), target.as_str(), post.as_str()];
            let parts = [&self.pre, &self.target, &self.post];
            let items = [0, 1, 2].map(|slot| match &self.splits[slot] {
                Some(regex) => parts[slot].split(regex, groups[slot]),
                None => Vec::new(),
            });
            let matched = Matched { groups, items };

            let target_items = self.target.items();
            let replacement: String = self
                .replacement
                .items()
                .iter()
                .enumerate()
                .map(|(position, item)| item.produce(position, target_items, &matched, rng))
                .collect();

            let mut advance = groups[0].len() + replacement.len();
            if !self.flags.contains(RuleFlags::OVERLAP) {
                advance += groups[2].len();
            }
            let spliced = format!("{}{}{}{}{}", &word[..pos], groups[0], replacement, groups[2], &word[whole.end()..]);
            (spliced, advance)
        };

        log::trace!("{}: '{}' -> '{}' at {}", self, word, spliced, pos);
        let changed = spliced != *word;
        *word = spliced;
        Ok(Some(Splice { advance, changed }))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} / {}_{}",
            self.target.display(),
            self.replacement.display(),
            self.pre.display(),
            self.post.display()
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Splice {
    advance: usize,
    changed: bool,
}

fn next_boundary(word: &str, pos: usize) -> usize {
    pos + word.get(pos..).and_then(|rest| rest.chars().next()).map_or(1, char::len_utf8)
}

fn split_environment(env: &str) -> Result<(String, String)> {
    let Some((pre, post)) = env.split_once('_') else {
        return Err(Error::malformed(format!("missing '_' in environment '{env}'")));
    };
    if post.contains('_') {
        return Err(Error::malformed(format!("more than one '_' in environment '{env}'")));
    }
    Ok((pre.to_string(), post.to_string()))
}

fn parse_flags(tokens: impl Iterator<Item = String>) -> Result<(RuleFlags, Option<String>, Option<u8>)> {
    let mut flags = RuleFlags::empty();
    let mut name = None;
    let mut probability = None;

    for token in tokens {
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            let percent: u8 = token.parse().map_err(|_| Error::malformed(format!("invalid percentage '{token}'")))?;
            if !(1..100).contains(&percent) {
                return Err(Error::malformed(format!("percentage '{token}' must be between 1 and 99")));
            }
            probability = Some(percent);
            continue;
        }

        if let Some(rule_name) = token.strip_prefix('@') {
            if rule_name.is_empty() {
                return Err(Error::malformed("bad rule name '@'"));
            }
            name = Some(rule_name.to_string());
            continue;
        }

        for c in token.chars() {
            flags |= match c {
                'B' => RuleFlags::OVERLAP,
                'F' => RuleFlags::ONCE,
                'L' => RuleFlags::ONCE | RuleFlags::REVERSE,
                'R' => RuleFlags::OVERLAP | RuleFlags::REVERSE,
                'P' => RuleFlags::PERSISTENT,
                other => return Err(Error::malformed(format!("unknown flag '{other}'"))),
            };
        }
    }

    Ok((flags, name, probability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DefinitionKind;
    use rand::SeedableRng;

    const ORIGIN: Origin<'static> = Origin { file: "test.sca", line: 1 };

    fn defs() -> Definitions {
        let mut defs = Definitions::default();
        defs.define(DefinitionKind::Category, "V", "aeiou", false).unwrap();
        defs.define(DefinitionKind::Category, "C", "ptkbdg", false).unwrap();
        defs.define(DefinitionKind::Category, "U", "ptk", false).unwrap();
        defs.define(DefinitionKind::Category, "D", "bdg", false).unwrap();
        defs.define(DefinitionKind::Change, "voicing", "U D", false).unwrap();
        defs.define(DefinitionKind::Environment, "intervocalic", "V_V", false).unwrap();
        defs
    }

    fn compile(statement: &str) -> Rule {
        Rule::compile(statement, &defs(), &RuleTable::default(), "AB", ORIGIN).unwrap()
    }

    fn run(statement: &str, word: &str) -> String {
        let rule = compile(statement);
        let mut rng = StdRng::seed_from_u64(7);
        match rule.apply(word, 'A', None, &mut rng).unwrap() {
            Outcome::Applied(out) => out,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn initial_and_final_contexts() {
        assert_eq!(run("* a e #_", "apple"), "epple");
        assert_eq!(run("* a e #_", "banana"), "banana");
        assert_eq!(run("* a o _#", "banana"), "banano");
    }

    #[test]
    fn positional_categories() {
        // The context-right of one match is consumed unless the rule overlaps.
        assert_eq!(run("* U D V_V", "pataka"), "padaka");
        assert_eq!(run("* U D V_V B", "pataka"), "padaga");
        assert_eq!(run("* `voicing `intervocalic B", "pataka"), "padaga");
    }

    #[test]
    fn overlap_controls_context_reuse() {
        assert_eq!(run("* t d a_a", "atatata"), "adatada");
        assert_eq!(run("* t d a_a B", "atatata"), "adadada");
    }

    #[test]
    fn reverse_and_once() {
        assert_eq!(run("* a o _ F", "banana"), "bonana");
        assert_eq!(run("* a o _ L", "banana"), "banano");
        assert_eq!(run("* a o _", "banana"), "bonono");
    }

    #[test]
    fn deletion_and_zero_width_matches_terminate() {
        assert_eq!(run("* a 0 _", "aaab"), "b");
        assert_eq!(run("* 0 0 _", "abc"), "abc");
        assert_eq!(run("* 0 e C_C", "aptka"), "apetka");
    }

    #[test]
    fn field_swaps() {
        // Degemination: the context-left is the target itself.
        assert_eq!(run("* C 0 %_", "appa"), "apa");
        let rule = compile("* C 0 %_");
        assert_eq!(rule.texts().pre, "C");
        assert_eq!(rule.texts().target, "%1");
        assert_eq!(run("* a < p_", "pab"), "ppb");
    }

    #[test]
    fn dialect_filter_and_flags() {
        let rule = compile("B a o _ @round 50 P");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rule.apply("a", 'A', None, &mut rng).unwrap(), Outcome::NotApplicable);
        assert_eq!(rule.name(), Some("round"));
        assert_eq!(rule.probability(), Some(50));
        assert!(rule.is_persistent());

        assert!(Rule::compile("C a o _", &defs(), &RuleTable::default(), "AB", ORIGIN).is_err());
        assert!(Rule::compile("* a o _ 100", &defs(), &RuleTable::default(), "AB", ORIGIN).is_err());
        assert!(Rule::compile("* a o _ Q", &defs(), &RuleTable::default(), "AB", ORIGIN).is_err());
        assert!(Rule::compile("* a o ab", &defs(), &RuleTable::default(), "AB", ORIGIN).is_err());
    }

    #[test]
    fn exceptions_apply_to_named_rules() {
        let rule = compile("* a o _ @round");
        let mut exceptions = ExceptionTable::default();
        exceptions.add("round", ["mama"], None);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rule.apply("mama", 'A', Some(&exceptions), &mut rng).unwrap(), Outcome::Exception);
        assert_eq!(rule.apply("papa", 'A', Some(&exceptions), &mut rng).unwrap(), Outcome::Applied("popo".into()));
    }

    #[test]
    fn display_shows_resolved_fields() {
        let rule = compile("* U D V_V");
        assert_eq!(rule.to_string(), "U -> D / V_V");
        assert_eq!(rule.pattern(), "(?P<pre>[aeiou])(?P<target>[ptk])(?P<post>[aeiou])");
    }
}
