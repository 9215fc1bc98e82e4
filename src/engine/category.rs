//! Category algebra.
//!
//! A category expression combines named categories and literal symbols:
//!
//! ```text
//! V            -> aeiou
//! V+y          -> aeiouy          (union, order kept, no dedup)
//! V-ei         -> aou             (difference)
//! CV           -> C's symbols then V's, when both letters are defined
//! ^V  or  -V   -> anything except aeiou
//! ```
//!
//! Symbol order matters: positional correspondence between a matched category
//! and a replacement category is by index, so the accumulator never reorders
//! or deduplicates.

use super::definitions::Definitions;
use crate::error::{Error, Result};

/// Result of evaluating a category expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryValue {
    symbols: String,
    complement: bool,
}

impl CategoryValue {
    pub fn new(symbols: impl Into<String>, complement: bool) -> Self {
        CategoryValue { symbols: symbols.into(), complement }
    }

    pub fn symbols(&self) -> &str {
        &self.symbols
    }

    pub fn is_complement(&self) -> bool {
        self.complement
    }

    /// The symbols as one-character strings, in declaration order.
    pub fn values(&self) -> Vec<String> {
        self.symbols.chars().map(String::from).collect()
    }

    /// Compile to a character class.
    pub fn class_pattern(&self) -> String {
        if self.symbols.is_empty() {
            // `[]` is not a valid class in either direction.
            return if self.complement { "(?s:.)".to_string() } else { "(?!)".to_string() };
        }
        let mut out = String::from(if self.complement { "[^" } else { "[" });
        for c in self.symbols.chars() {
            if matches!(c, '\\' | '[' | ']' | '^' | '-' | '&' | '~') {
                out.push('\\');
            }
            out.push(c);
        }
        out.push(']');
        out
    }

    pub fn matches(&self, symbol: char) -> bool {
        self.symbols.contains(symbol) != self.complement
    }
}

impl std::fmt::Display for CategoryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.complement { write!(f, "^{}", self.symbols) } else { f.write_str(&self.symbols) }
    }
}

/// Evaluate a category expression against the category table in `defs`.
pub fn evaluate(defs: &Definitions, expr: &str) -> Result<CategoryValue> {
    let mut symbols = String::new();
    let mut complement = false;
    let mut first = true;
    let mut adding = true;

    for token in split_operators(expr) {
        match token {
            "" => continue,
            "^" if first => complement = true,
            "^" => return Err(Error::malformed(format!("'^' must start the category expression '{expr}'"))),
            "-" if first => complement = true,
            "+" => adding = true,
            "-" => adding = false,
            operand => {
                let resolved = resolve_operand(defs, operand)?;
                if adding {
                    symbols.push_str(&resolved);
                } else {
                    symbols.retain(|c| !resolved.contains(c));
                }
            }
        }
        first = false;
    }

    Ok(CategoryValue { symbols, complement })
}

/// Split on `+`, `-` and `^`, keeping the operators as their own tokens.
fn split_operators(expr: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (idx, c) in expr.char_indices() {
        if matches!(c, '+' | '-' | '^') {
            tokens.push(&expr[start..idx]);
            tokens.push(&expr[idx..idx + 1]);
            start = idx + 1;
        }
    }
    tokens.push(&expr[start..]);
    tokens
}

/// Resolve a single operand to its symbols.
///
/// Operands with lowercase letters are a category name when one is defined,
/// literal symbols otherwise. All-uppercase operands are read letter by letter:
/// every letter defined means concatenation, no letter defined means literal
/// symbols, anything in between is an error.
fn resolve_operand(defs: &Definitions, operand: &str) -> Result<String> {
    if operand != operand.to_uppercase() {
        return Ok(defs.category(operand).unwrap_or(operand).to_string());
    }

    let defined = operand.chars().filter(|c| defs.category(c.encode_utf8(&mut [0; 4])).is_some()).count();

    if defined == 0 {
        return Ok(defs.category(operand).unwrap_or(operand).to_string());
    }
    if defined != operand.chars().count() {
        return Err(Error::UndefinedCategory(operand.to_string()));
    }

    let mut out = String::new();
    for c in operand.chars() {
        out.push_str(defs.category(c.encode_utf8(&mut [0; 4])).unwrap_or_default());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DefinitionKind;

    fn defs() -> Definitions {
        let mut defs = Definitions::default();
        defs.define(DefinitionKind::Category, "A", "abcde", false).unwrap();
        defs.define(DefinitionKind::Category, "B", "defgh", false).unwrap();
        defs.define(DefinitionKind::Category, "Stop", "ptk", false).unwrap();
        defs
    }

    #[test]
    fn union_difference_and_complement() {
        let defs = defs();
        assert_eq!(evaluate(&defs, "A+efg").unwrap(), CategoryValue::new("abcdeefg", false));
        assert_eq!(evaluate(&defs, "A-de").unwrap(), CategoryValue::new("abc", false));
        assert_eq!(evaluate(&defs, "A+B").unwrap(), CategoryValue::new("abcdedefgh", false));
        assert_eq!(evaluate(&defs, "AB").unwrap(), CategoryValue::new("abcdedefgh", false));
        assert_eq!(evaluate(&defs, "A-B").unwrap(), CategoryValue::new("abc", false));
        assert_eq!(evaluate(&defs, "^A").unwrap(), CategoryValue::new("abcde", true));
        assert_eq!(evaluate(&defs, "-A").unwrap(), CategoryValue::new("abcde", true));
    }

    #[test]
    fn complement_only_at_the_start() {
        let defs = defs();
        assert!(matches!(evaluate(&defs, "A^B"), Err(Error::MalformedSpec(_))));
        assert!(matches!(evaluate(&defs, "A+^B"), Err(Error::MalformedSpec(_))));
        assert_eq!(evaluate(&defs, "^A+B").unwrap(), CategoryValue::new("abcdedefgh", true));
    }

    #[test]
    fn complement_matches_everything_outside_the_set() {
        let defs = defs();
        let value = evaluate(&defs, "^A").unwrap();
        let re = regex::Regex::new(&format!("^{}$", value.class_pattern())).unwrap();
        for c in "abcde".chars() {
            assert!(!re.is_match(&c.to_string()));
            assert!(!value.matches(c));
        }
        for c in "xyzʃ-]^".chars() {
            assert!(re.is_match(&c.to_string()), "{c}");
            assert!(value.matches(c));
        }
    }

    #[test]
    fn names_literals_and_partial_uppercase() {
        let defs = defs();
        assert_eq!(evaluate(&defs, "Stop+m").unwrap().symbols(), "ptkm");
        assert_eq!(evaluate(&defs, "xyz").unwrap().symbols(), "xyz");
        assert_eq!(evaluate(&defs, "XY").unwrap().symbols(), "XY");
        assert!(matches!(evaluate(&defs, "AX"), Err(Error::UndefinedCategory(s)) if s == "AX"));
    }

    #[test]
    fn class_pattern_escapes_and_handles_empty() {
        let value = CategoryValue::new("a-]", false);
        let re = regex::Regex::new(&value.class_pattern()).unwrap();
        assert!(re.is_match("-"));
        assert!(re.is_match("]"));
        assert!(!re.is_match("b"));
        assert_eq!(CategoryValue::new("", false).class_pattern(), "(?!)");
    }
}
