//! Pattern items.
//!
//! A rule field is parsed into a sequence of [`Item`]s. Items in the three
//! matched fields (context-left, target, context-right) contribute a piece of
//! pattern; items in the replacement field produce text once a match is found.
//!
//! Most replacement items work by *positional correspondence*: the item looks
//! at the target item it refers to, finds where the matched text sits in that
//! item's table of values, and outputs its own value at the same position.
//!
//! ```text
//! cat V = a e i o       rule: * <V> <W> _
//! cat W = e i u 0       "o" is V[3]  ->  W[3] = "0"  ->  deleted
//! ```
//!
//! References are 1-based; negative references count from the end of the
//! target. An item without an explicit reference refers to the target item at
//! its own position.

use super::category::{self, CategoryValue};
use super::definitions::Definitions;
use crate::error::{Error, Result};
use rand::Rng;
use rand::rngs::StdRng;

/// One of the four fields of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Pre,
    Target,
    Replacement,
    Post,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Pre => "context-left",
            Field::Target => "target",
            Field::Replacement => "replacement",
            Field::Post => "context-right",
        }
    }

    pub(crate) fn from_slot(slot: usize) -> Field {
        match slot {
            0 => Field::Pre,
            2 => Field::Post,
            _ => Field::Target,
        }
    }

    /// Name of the capture group holding this field's text.
    pub(crate) fn group_name(self) -> &'static str {
        match self {
            Field::Pre => "pre",
            Field::Target | Field::Replacement => "target",
            Field::Post => "post",
        }
    }

    /// What `#` becomes in this field, if it is allowed at all.
    pub(crate) fn anchor(self) -> Option<&'static str> {
        match self {
            Field::Pre => Some("^"),
            Field::Post => Some("$"),
            Field::Target | Field::Replacement => None,
        }
    }
}

/// Values shared by categories, features and lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    source: String,
    values: Vec<String>,
    pattern: String,
    reference: Option<isize>,
    random: bool,
}

impl Table {
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn reference(&self) -> Option<isize> {
        self.reference
    }

    pub fn is_random(&self) -> bool {
        self.random
    }

    fn pick(&self, rng: &mut StdRng) -> String {
        if self.values.is_empty() {
            return String::new();
        }
        output_value(&self.values[rng.gen_range(0..self.values.len())])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// Plain symbols, possibly with wildcards, anchors and quantifiers.
    Literal { source: String, output: String, pattern: String },
    /// `0`: matches nothing, produces nothing.
    Zero,
    /// `$name$`
    StringRef { name: String, value: String, pattern: String },
    /// `%1`..`%3`: the text of an earlier field.
    PartRef(usize),
    Category { table: Table, complement: bool },
    Feature(Table),
    List(Table),
    /// `1`..`9` or `-1`..`-9` in the replacement: the text matched by a target item.
    Index(isize),
    Blend(Blend),
}

impl Item {
    /// The item as written in the rule.
    pub fn display(&self) -> String {
        match self {
            Item::Literal { source, .. } => source.clone(),
            Item::Zero => "0".to_string(),
            Item::StringRef { name, .. } => format!("${name}$"),
            Item::PartRef(group) => format!("%{group}"),
            Item::Category { table, .. } | Item::Feature(table) | Item::List(table) => table.source.clone(),
            Item::Index(reference) => reference.to_string(),
            Item::Blend(blend) => blend.source.clone(),
        }
    }

    /// Pattern used inside the full rule expression. `None` for items that
    /// only make sense in the replacement.
    pub fn pattern(&self) -> Option<String> {
        match self {
            Item::Literal { pattern, .. } | Item::StringRef { pattern, .. } => Some(pattern.clone()),
            Item::Zero => Some(String::new()),
            Item::PartRef(group) => Some(format!(r"\k<{}>", Field::from_slot(group - 1).group_name())),
            Item::Category { table, .. } | Item::Feature(table) | Item::List(table) => Some(table.pattern.clone()),
            Item::Index(_) | Item::Blend(_) => None,
        }
    }

    /// Pattern used when splitting one captured field back into items.
    pub(crate) fn split_pattern(&self) -> Option<String> {
        match self {
            Item::PartRef(_) => Some(".*?".to_string()),
            other => other.pattern(),
        }
    }

    pub fn is_result_only(&self) -> bool {
        matches!(self, Item::Index(_) | Item::Blend(_))
    }

    /// Lookup table for positional correspondence. Complements have none.
    pub fn table(&self) -> Option<&Table> {
        match self {
            Item::Category { table, complement: false } | Item::Feature(table) | Item::List(table) => Some(table),
            _ => None,
        }
    }

    /// Whether an index item may point at this item.
    pub(crate) fn is_indexable(&self) -> bool {
        matches!(self, Item::Category { .. } | Item::Feature(_) | Item::List(_) | Item::PartRef(_))
    }

    /// `<expr>` with an optional leading index and `@`, or a bare category letter.
    pub(crate) fn category(inner: &str, source: String, quantifier: &str, defs: &Definitions) -> Result<Item> {
        let (reference, random, expr) = split_prefix(inner)?;
        if expr.is_empty() {
            return Err(Error::malformed(format!("empty category '{source}'")));
        }
        let value = category::evaluate(defs, expr)?;
        if random && value.is_complement() {
            return Err(Error::malformed(format!("cannot pick at random from the complement '{source}'")));
        }
        let pattern = format!("{}{quantifier}", value.class_pattern());
        let table = Table { source, values: value.values(), pattern, reference, random };
        Ok(Item::Category { table, complement: value.is_complement() })
    }

    /// `[+Voice,-Nasal]`: the intersection of feature sides, in the order of
    /// the first one.
    pub(crate) fn feature(inner: &str, source: String, quantifier: &str, defs: &Definitions) -> Result<Item> {
        let (reference, random, body) = split_prefix(inner)?;
        let mut symbols: Option<String> = None;
        for entry in body.split(',') {
            let (positive, name) = match entry.strip_prefix('+') {
                Some(name) => (true, name),
                None => (false, entry.strip_prefix('-').unwrap_or(entry)),
            };
            let side = defs.find_feature(name)?.side(positive);
            symbols = Some(match symbols {
                None => side.to_string(),
                Some(acc) => acc.chars().filter(|c| side.contains(*c)).collect(),
            });
        }
        let value = CategoryValue::new(symbols.unwrap_or_default(), false);
        let pattern = format!("{}{quantifier}", value.class_pattern());
        Ok(Item::Feature(Table { source, values: value.values(), pattern, reference, random }))
    }

    /// `[a,b,$s]`, `[L]` or `[@L]`.
    pub(crate) fn list(inner: &str, source: String, quantifier: &str, defs: &Definitions) -> Result<Item> {
        let (random, body) = match inner.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, inner),
        };

        let (values, raw) = match defs.list(body) {
            Some(list) => (list.values.clone(), list.raw),
            None => {
                let mut values = Vec::new();
                for entry in super::source::split_escaped(body, Some(',')) {
                    if entry.is_empty() {
                        return Err(Error::malformed(format!("empty entry in list '{source}'")));
                    }
                    values.push(defs.expand_entry(&entry)?);
                }
                (values, false)
            }
        };

        if values.is_empty() {
            return Err(Error::malformed(format!("empty list '{source}'")));
        }
        let alternatives: Vec<String> = values.iter().map(|v| if raw { v.clone() } else { escape(v) }).collect();
        let pattern = format!("(?:{}){quantifier}", alternatives.join("|"));
        Ok(Item::List(Table { source, values, pattern, reference: None, random }))
    }

    /// `$name$`
    pub(crate) fn string(name: &str, quantifier: &str, defs: &Definitions) -> Result<Item> {
        let def = defs.find_string(name)?;
        let body = if def.raw { def.value.clone() } else { escape(&def.value) };
        let pattern = if quantifier.is_empty() { body } else { format!("(?:{body}){quantifier}") };
        Ok(Item::StringRef { name: name.to_string(), value: def.value.clone(), pattern })
    }

    /// Check a replacement item against the target it refers to.
    pub(crate) fn validate(&self, position: usize, target: &[Item]) -> Result<()> {
        let (reference, needs_table) = match self {
            Item::Category { complement: true, .. } => {
                return Err(Error::malformed(format!(
                    "the complement '{}' cannot be used in the replacement",
                    self.display()
                )));
            }
            Item::Category { table, .. } | Item::Feature(table) | Item::List(table) => {
                if table.random {
                    return Ok(());
                }
                (table.reference.unwrap_or(position as isize + 1), true)
            }
            Item::Index(reference) => (*reference, false),
            _ => return Ok(()),
        };

        let field = Field::Target.label();
        let index = resolve_index(reference, target.len()).ok_or_else(|| Error::OutOfRangeReference {
            item: self.display(),
            index: reference,
            len: target.len(),
            field,
        })?;

        let referenced = &target[index];
        let ok = if needs_table { referenced.table().is_some() } else { referenced.is_indexable() };
        if !ok {
            return Err(Error::NotIndexable { item: self.display(), index: reference, field });
        }
        Ok(())
    }

    /// Text this replacement item contributes for one match.
    pub(crate) fn produce(&self, position: usize, target: &[Item], matched: &Matched<'_>, rng: &mut StdRng) -> String {
        match self {
            Item::Literal { output, .. } => output.clone(),
            Item::Zero => String::new(),
            Item::StringRef { value, .. } => value.clone(),
            Item::PartRef(group) => matched.groups[group - 1].to_string(),
            Item::Category { table, .. } | Item::Feature(table) | Item::List(table) => {
                if table.random {
                    return table.pick(rng);
                }
                let reference = table.reference.unwrap_or(position as isize + 1);
                let Some(index) = resolve_index(reference, target.len()) else {
                    return String::new();
                };
                let text = matched.item(1, index);
                match target[index].table() {
                    Some(from) => correspond(text, &from.values, &table.values),
                    None => text.to_string(),
                }
            }
            Item::Index(reference) => {
                resolve_index(*reference, target.len()).map(|index| matched.item(1, index).to_string()).unwrap_or_default()
            }
            Item::Blend(blend) => correspond(matched.item(blend.slot, blend.index), &blend.lookup, &blend.output),
        }
    }
}

/// `{a:b}` in the replacement.
///
/// Each half is either a field reference (`<`, `>` or nothing, then an
/// optional index, e.g. `<2`, `-1`, ``) naming a category, feature or list
/// item, or a category expression / `+Feature` / `-Feature`. The left half
/// supplies the output table; the right half supplies the lookup table and
/// the matched text to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blend {
    source: String,
    output: Vec<String>,
    lookup: Vec<String>,
    slot: usize,
    index: usize,
}

impl Blend {
    pub(crate) fn parse(inner: &str, position: usize, defs: &Definitions, parts: [&[Item]; 3]) -> Result<Blend> {
        let source = format!("{{{inner}}}");
        if inner.is_empty() {
            return Err(Error::malformed("nothing given in blend"));
        }
        let halves: Vec<&str> = inner.split(':').collect();
        let [output_half, lookup_half] = halves[..] else {
            return Err(Error::malformed(format!("blend '{source}' needs exactly one ':'")));
        };

        let (_, _, output) = Self::half(output_half, position, defs, parts, &source)?;
        let (slot, index, lookup) = Self::half(lookup_half, position, defs, parts, &source)?;

        if index >= parts[slot].len() {
            return Err(Error::OutOfRangeReference {
                item: source,
                index: index as isize + 1,
                len: parts[slot].len(),
                field: Field::from_slot(slot).label(),
            });
        }
        Ok(Blend { source, output, lookup, slot, index })
    }

    /// Which matched field the looked-up text comes from.
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    fn half(
        text: &str,
        position: usize,
        defs: &Definitions,
        parts: [&[Item]; 3],
        source: &str,
    ) -> Result<(usize, usize, Vec<String>)> {
        let Some(caps) = regex!(r"^([<>]?)(-?\d?)$").captures(text) else {
            return Ok((1, position, named_values(text, defs)?));
        };

        let slot = match &caps[1] {
            "<" => 0,
            ">" => 2,
            _ => 1,
        };
        let reference = match &caps[2] {
            "" => position as isize + 1,
            digits => digits.parse::<isize>().map_err(|_| Error::BadIndex(text.to_string()))?,
        };

        let part = parts[slot];
        let field = Field::from_slot(slot).label();
        let index = resolve_index(reference, part.len()).ok_or_else(|| Error::OutOfRangeReference {
            item: source.to_string(),
            index: reference,
            len: part.len(),
            field,
        })?;
        let table =
            part[index].table().ok_or_else(|| Error::NotIndexable { item: source.to_string(), index: reference, field })?;
        Ok((slot, index, table.values.clone()))
    }
}

fn named_values(text: &str, defs: &Definitions) -> Result<Vec<String>> {
    let feature = text.strip_prefix('+').map(|n| (true, n)).or_else(|| text.strip_prefix('-').map(|n| (false, n)));
    if let Some((positive, name)) = feature {
        if let Some(def) = defs.feature(name) {
            return Ok(def.side(positive).chars().map(String::from).collect());
        }
    }
    let value = category::evaluate(defs, text)?;
    if value.is_complement() {
        return Err(Error::malformed(format!("blend half '{text}' cannot be a complement")));
    }
    Ok(value.values())
}

/// Texts captured by one match.
#[derive(Debug, Default)]
pub(crate) struct Matched<'t> {
    /// Whole context-left, target and context-right.
    pub groups: [&'t str; 3],
    /// Per-item texts of each matched field; empty when a field was not split.
    pub items: [Vec<&'t str>; 3],
}

impl Matched<'_> {
    fn item(&self, slot: usize, index: usize) -> &str {
        self.items[slot].get(index).copied().unwrap_or("")
    }
}

/// Map `text` from one table to the value at the same position in another.
///
/// `0` means deletion; a position past the end of `to` produces nothing; text
/// not found in `from` passes through unchanged.
pub(crate) fn correspond(text: &str, from: &[String], to: &[String]) -> String {
    match from.iter().position(|v| v == text) {
        Some(n) => to.get(n).map(|v| output_value(v)).unwrap_or_default(),
        None => text.to_string(),
    }
}

fn output_value(value: &str) -> String {
    if value == "0" { String::new() } else { value.to_string() }
}

/// 1-based (or negative, from the end) reference to a 0-based index.
pub(crate) fn resolve_index(reference: isize, len: usize) -> Option<usize> {
    let magnitude = reference.unsigned_abs();
    if reference == 0 || magnitude > len {
        return None;
    }
    Some(if reference > 0 { magnitude - 1 } else { len - magnitude })
}

/// Split `-2@V` into its reference, random marker and remainder.
fn split_prefix(inner: &str) -> Result<(Option<isize>, bool, &str)> {
    let Some(caps) = regex!(r"^(-?[1-9])?(@)?").captures(inner) else {
        return Ok((None, false, inner));
    };
    let reference = match caps.get(1) {
        Some(m) => Some(m.as_str().parse::<isize>().map_err(|_| Error::BadIndex(m.as_str().to_string()))?),
        None => None,
    };
    let end = caps.get(0).map_or(0, |m| m.end());
    Ok((reference, caps.get(2).is_some(), &inner[end..]))
}

/// Escape the characters that mean something outside a character class.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
