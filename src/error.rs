//! Error type shared by ingestion and processing.
//!
//! Ingestion errors are wrapped in [`Error::At`] once per source level, so an
//! error raised three includes deep reads as a chain of locations ending in the
//! actual complaint.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid definition type '{0}'")]
    UnknownDefinitionKind(String),

    #[error("{kind} '{name}' has already been defined")]
    DuplicateDefinition { kind: &'static str, name: String },

    #[error("unknown {kind} '{name}'")]
    UndefinedReference { kind: &'static str, name: String },

    #[error("not all categories in '{0}' are defined")]
    UndefinedCategory(String),

    #[error("{0}")]
    MalformedSpec(String),

    #[error("'{item}' in the replacement refers to item {index} of {len} in {field}")]
    OutOfRangeReference { item: String, index: isize, len: usize, field: &'static str },

    #[error("'{item}' refers to item {index} in {field}, which is not a category, feature or list")]
    NotIndexable { item: String, index: isize, field: &'static str },

    #[error("feature '{name}' has {negative} negative and {positive} positive symbols")]
    FeatureLengthMismatch { name: String, negative: usize, positive: usize },

    #[error("no terminator '{close}' found after '{text}'")]
    UnterminatedDelimiter { close: char, text: String },

    #[error("bad index '{0}'")]
    BadIndex(String),

    #[error("assertion failed at line {line} of '{file}': expected '{expected}', but got '{actual}'")]
    AssertionFailed { file: String, line: usize, expected: String, actual: String },

    #[error("bad resulting pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("at line {line} of '{file}':\n  {source}")]
    At {
        file: String,
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedSpec(message.into())
    }

    pub(crate) fn pattern(pattern: &str, source: fancy_regex::Error) -> Self {
        Error::Pattern { pattern: pattern.to_string(), source: Box::new(source) }
    }

    pub(crate) fn at(self, file: &str, line: usize) -> Self {
        Error::At { file: file.to_string(), line, source: Box::new(self) }
    }

    /// The innermost error, with all location wrappers removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::At { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_wrappers_nest_and_unwrap() {
        let err = Error::malformed("missing '_' in environment").at("inner.sca", 3).at("outer.sca", 10);
        let text = err.to_string();
        assert!(text.starts_with("at line 10 of 'outer.sca'"));
        assert!(text.contains("at line 3 of 'inner.sca'"));
        assert!(matches!(err.root(), Error::MalformedSpec(_)));
    }
}
