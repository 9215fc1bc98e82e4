//! Rule field parser.
//!
//! One left-to-right scan over the field text. Special characters start an
//! item; everything else accumulates into a single literal that is flushed
//! when the next item starts:
//!
//! ```text
//! "s<V>[+Voice]*#"  (context-right)
//!   Literal "s" | Category <V> | Feature [+Voice]* | Literal "#" -> "$"
//! ```
//!
//! An uppercase letter is a category when a single-letter category of that name
//! exists, a list when a list does, and a plain symbol otherwise.

use super::definitions::Definitions;
use super::item::{Blend, Field, Item, escape};
use crate::error::{Error, Result};
use fancy_regex::Regex;

/// The items parsed from one rule field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    field: Field,
    source: String,
    items: Vec<Item>,
}

impl Part {
    /// Parse `text` as `field`. The replacement needs the three matched parts
    /// (context-left, target, context-right) to resolve its references.
    pub(crate) fn parse(text: &str, field: Field, defs: &Definitions, matched: Option<[&[Item]; 3]>) -> Result<Part> {
        let parser = FieldParser {
            defs,
            field,
            matched,
            chars: text.chars().collect(),
            pos: 0,
            items: Vec::new(),
            literal: PendingLiteral::default(),
        };
        let items = parser.run()?;

        if field == Field::Replacement {
            let target = matched.map_or(&[][..], |parts| parts[1]);
            for (position, item) in items.iter().enumerate() {
                item.validate(position, target)?;
            }
        }

        Ok(Part { field, source: text.to_string(), items })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn display(&self) -> String {
        self.items.iter().map(Item::display).collect()
    }

    /// Concatenated item patterns, for use inside the full rule expression.
    pub fn pattern(&self) -> String {
        self.items.iter().filter_map(Item::pattern).collect()
    }

    /// An anchored expression with one named group (`i0`, `i1`, ...) per item.
    /// Raw definitions may carry groups of their own, so items are read by name.
    pub(crate) fn split_regex(&self) -> Result<Regex> {
        let groups: String = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(n, item)| item.split_pattern().map(|p| format!("(?P<i{n}>{p})")))
            .collect();
        let pattern = format!(r"\A(?:{groups})\z");
        Regex::new(&pattern).map_err(|e| Error::pattern(&pattern, e))
    }

    /// Per-item texts of `text`, which this part matched as a whole.
    pub(crate) fn split<'t>(&self, regex: &Regex, text: &'t str) -> Vec<&'t str> {
        match regex.captures(text) {
            Ok(Some(caps)) => {
                (0..self.items.len()).map(|n| caps.name(&format!("i{n}")).map_or("", |m| m.as_str())).collect()
            }
            _ => {
                log::trace!("could not split '{}' into the items of {}", text, self.field.label());
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Default)]
struct PendingLiteral {
    source: String,
    output: String,
    pattern: String,
}

struct FieldParser<'a> {
    defs: &'a Definitions,
    field: Field,
    matched: Option<[&'a [Item]; 3]>,
    chars: Vec<char>,
    pos: usize,
    items: Vec<Item>,
    literal: PendingLiteral,
}

impl FieldParser<'_> {
    fn run(mut self) -> Result<Vec<Item>> {
        while let Some(c) = self.next() {
            match c {
                '\\' => {
                    // A trailing backslash stands for a space.
                    let escaped = self.next().unwrap_or(' ');
                    self.literal.source.push('\\');
                    self.push_symbol(escaped);
                }
                '<' => {
                    let inner = self.delimited('<', '>')?;
                    let quantifier = self.quantifier()?;
                    let source = format!("<{inner}>{quantifier}");
                    let item = Item::category(&inner, source, &quantifier, self.defs)?;
                    self.push(item);
                }
                '[' => {
                    let inner = self.delimited('[', ']')?;
                    let quantifier = self.quantifier()?;
                    let source = format!("[{inner}]{quantifier}");
                    let item = if is_feature(&inner) {
                        Item::feature(&inner, source, &quantifier, self.defs)?
                    } else {
                        Item::list(&inner, source, &quantifier, self.defs)?
                    };
                    self.push(item);
                }
                '{' => {
                    let inner = self.delimited('{', '}')?;
                    let Some(parts) = self.matched.filter(|_| self.field == Field::Replacement) else {
                        return Err(self.misplaced(&format!("{{{inner}}}")));
                    };
                    self.flush();
                    let blend = Blend::parse(&inner, self.items.len(), self.defs, parts)?;
                    self.items.push(Item::Blend(blend));
                }
                '$' => {
                    let name = self.delimited('$', '$')?;
                    let quantifier = self.quantifier()?;
                    let item = Item::string(&name, &quantifier, self.defs)?;
                    self.push(item);
                }
                '#' => {
                    let anchor = self.field.anchor().ok_or_else(|| {
                        Error::malformed(format!("'#' is not allowed in the {}", self.field.label()))
                    })?;
                    self.literal.source.push('#');
                    self.literal.pattern.push_str(anchor);
                }
                '0' => self.push(Item::Zero),
                '%' => {
                    let group = match self.peek() {
                        Some(d @ '1'..='3') => {
                            self.pos += 1;
                            d as usize - '0' as usize
                        }
                        _ => 1,
                    };
                    let limit = match self.field {
                        Field::Pre => 0,
                        Field::Target => 1,
                        Field::Post => 2,
                        Field::Replacement => 3,
                    };
                    if group > limit {
                        return Err(Error::malformed(format!(
                            "'%{group}' in the {} must refer to an earlier field",
                            self.field.label()
                        )));
                    }
                    self.push(Item::PartRef(group));
                }
                '1'..='9' => self.index(c.to_string())?,
                '-' if matches!(self.peek(), Some('1'..='9')) => {
                    let digit = self.next().unwrap_or('1');
                    self.index(format!("-{digit}"))?;
                }
                '*' | '+' | '?' => {
                    if self.field == Field::Replacement {
                        return Err(Error::malformed(format!("quantifier '{c}' in the replacement")));
                    }
                    if self.literal.source.is_empty() {
                        return Err(Error::malformed(format!("quantifier '{c}' does not follow anything")));
                    }
                    self.literal.source.push(c);
                    self.literal.pattern.push(c);
                }
                '.' if self.field != Field::Replacement => {
                    self.literal.source.push('.');
                    self.literal.output.push('.');
                    self.literal.pattern.push('.');
                }
                c if c.is_uppercase() => self.letter(c)?,
                c => self.push_symbol(c),
            }
        }
        self.flush();
        Ok(self.items)
    }

    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        self.pos += 1;
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Text up to the matching `close`, which is consumed.
    fn delimited(&mut self, open: char, close: char) -> Result<String> {
        let rest = self.chars.get(self.pos..).unwrap_or(&[]);
        let Some(len) = rest.iter().position(|&c| c == close) else {
            let text: String = std::iter::once(open).chain(rest.iter().copied()).collect();
            return Err(Error::UnterminatedDelimiter { close, text });
        };
        let inner: String = rest[..len].iter().collect();
        self.pos += len + 1;
        Ok(inner)
    }

    fn quantifier(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(c @ ('*' | '+' | '?')) = self.peek() {
            out.push(c);
            self.pos += 1;
        }
        if !out.is_empty() && self.field == Field::Replacement {
            return Err(Error::malformed(format!("quantifier '{out}' in the replacement")));
        }
        Ok(out)
    }

    fn index(&mut self, text: String) -> Result<()> {
        if self.field != Field::Replacement {
            return Err(self.misplaced(&text));
        }
        let reference = text.parse::<isize>().map_err(|_| Error::BadIndex(text.clone()))?;
        self.push(Item::Index(reference));
        Ok(())
    }

    fn letter(&mut self, c: char) -> Result<()> {
        let name = c.to_string();
        if self.defs.category(&name).is_some() {
            let quantifier = self.quantifier()?;
            let item = Item::category(&name, format!("{name}{quantifier}"), &quantifier, self.defs)?;
            self.push(item);
        } else if self.defs.list(&name).is_some() {
            let quantifier = self.quantifier()?;
            let item = Item::list(&name, format!("{name}{quantifier}"), &quantifier, self.defs)?;
            self.push(item);
        } else {
            self.push_symbol(c);
        }
        Ok(())
    }

    fn push_symbol(&mut self, c: char) {
        self.literal.source.push(c);
        self.literal.output.push(c);
        self.literal.pattern.push_str(&escape(c.encode_utf8(&mut [0; 4])));
    }

    fn push(&mut self, item: Item) {
        self.flush();
        self.items.push(item);
    }

    fn flush(&mut self) {
        if self.literal.source.is_empty() {
            return;
        }
        let PendingLiteral { source, output, pattern } = std::mem::take(&mut self.literal);
        self.items.push(Item::Literal { source, output, pattern });
    }

    fn misplaced(&self, text: &str) -> Error {
        Error::malformed(format!("'{text}' is only allowed in the replacement, not the {}", self.field.label()))
    }
}

/// `[...]` holds features when every entry, after an optional index, starts
/// with a sign.
fn is_feature(inner: &str) -> bool {
    let body = regex!(r"^-?[1-9]").find(inner).map_or(inner, |m| &inner[m.end()..]);
    !body.is_empty() && body.split(',').all(|entry| entry.starts_with(['+', '-']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DefinitionKind;

    fn defs() -> Definitions {
        let mut defs = Definitions::default();
        defs.define(DefinitionKind::Category, "V", "aeiou", false).unwrap();
        defs.define(DefinitionKind::Category, "C", "ptk", false).unwrap();
        defs.define(DefinitionKind::List, "L", "ab,cd", false).unwrap();
        defs.define(DefinitionKind::Feature, "Voice", "ptk|bdg", false).unwrap();
        defs
    }

    fn parse(text: &str, field: Field) -> Result<Part> {
        Part::parse(text, field, &defs(), None)
    }

    #[test]
    fn literals_merge_between_items() {
        let part = parse("stV*rX", Field::Target).unwrap();
        let shown: Vec<String> = part.items().iter().map(Item::display).collect();
        assert_eq!(shown, vec!["st", "V*", "rX"]);
        assert_eq!(part.pattern(), "st[aeiou]*rX");
    }

    #[test]
    fn anchors_only_in_context_fields() {
        assert_eq!(parse("#C", Field::Pre).unwrap().pattern(), "^[ptk]");
        assert_eq!(parse("V#", Field::Post).unwrap().pattern(), "[aeiou]$");
        assert!(parse("a#", Field::Target).is_err());
    }

    #[test]
    fn escapes_wildcards_and_quantifiers() {
        let part = parse(r"\<.a+\.", Field::Target).unwrap();
        assert_eq!(part.len(), 1);
        assert_eq!(part.pattern(), r"<.a+\.");
        assert!(matches!(parse("*a", Field::Target), Err(Error::MalformedSpec(_))));
    }

    #[test]
    fn delimited_items() {
        let part = parse("[+Voice]L[x,y]$", Field::Post);
        assert!(matches!(part, Err(Error::UnterminatedDelimiter { close: '$', .. })));

        let part = parse("[+Voice]L[x,y]", Field::Target).unwrap();
        assert!(matches!(part.items()[0], Item::Feature(_)));
        assert!(matches!(part.items()[1], Item::List(_)));
        assert_eq!(part.pattern(), "[bdg](?:ab|cd)(?:x|y)");
        assert!(matches!(parse("<V", Field::Target), Err(Error::UnterminatedDelimiter { close: '>', .. })));
    }

    #[test]
    fn part_references_must_look_back() {
        assert!(parse("%", Field::Pre).is_err());
        assert_eq!(parse("%1", Field::Target).unwrap().pattern(), r"\k<pre>");
        assert_eq!(parse("%2", Field::Post).unwrap().pattern(), r"\k<target>");
        assert!(parse("%3", Field::Post).is_err());
    }

    #[test]
    fn indexes_and_blends_belong_to_the_replacement() {
        let defs = defs();
        assert!(parse("2", Field::Target).is_err());
        assert_eq!(parse("a-b", Field::Target).unwrap().pattern(), "a-b");

        let pre = Part::parse("C", Field::Pre, &defs, None).unwrap();
        let target = Part::parse("VC", Field::Target, &defs, None).unwrap();
        let post = Part::parse("", Field::Post, &defs, None).unwrap();
        let parts = [pre.items(), target.items(), post.items()];

        let replacement = Part::parse("-1x1", Field::Replacement, &defs, Some(parts)).unwrap();
        assert_eq!(replacement.items()[0], Item::Index(-1));
        assert_eq!(replacement.items()[2], Item::Index(1));

        assert!(matches!(
            Part::parse("3", Field::Replacement, &defs, Some(parts)),
            Err(Error::OutOfRangeReference { index: 3, len: 2, .. })
        ));
        assert!(Part::parse("{C:<}", Field::Replacement, &defs, Some(parts)).is_ok());
    }

    #[test]
    fn feature_detection() {
        assert!(is_feature("+Voice,-Nasal"));
        assert!(is_feature("-1+Voice"));
        assert!(!is_feature("ab,-c"));
        assert!(!is_feature("@L"));
    }
}
