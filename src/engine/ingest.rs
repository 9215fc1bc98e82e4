//! Source ingestion: definitions, directives and rule statements.
//!
//! Each logical line (see `source.rs`) is one of:
//!
//! ```text
//! !directive args...          directive
//! V = aeiou                   category definition (shorthand)
//! list L = ab,cd              definition of any kind; `==` for raw values
//! * a e #_ [flags]            rule statement
//! ```
//!
//! Directive arguments are positional or `key=value`; both bind to the same
//! fixed parameter list per directive.

use super::compiled_rules::Assertion;
use super::definitions::DefinitionKind;
use super::group::{GroupChild, GroupParams, Heading, RuleGroup, group_at};
use super::processor::Engine;
use super::rule::{DialectFilter, Origin, Rule};
use super::source::{logical_lines, split_escaped};
use crate::api::SeedMode;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Parsing state that only matters while files are being read.
#[derive(Debug)]
pub(crate) struct IngestState {
    /// Child indices from the main group down to the active group.
    group_path: Vec<usize>,
    /// Dialects prepended to every rule statement.
    prefix: String,
    skip: bool,
    done: bool,
    /// Files currently being read, outermost first.
    files: Vec<PathBuf>,
    next_group_id: usize,
}

impl Default for IngestState {
    fn default() -> Self {
        IngestState {
            group_path: Vec::new(),
            prefix: String::new(),
            skip: false,
            done: false,
            files: Vec::new(),
            next_group_id: 2,
        }
    }
}

type Args = Vec<(String, Option<String>)>;

impl Engine {
    /// Read and compile a rule file. `.sca` is appended when `path` has no
    /// extension.
    pub fn compile_source(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let mut path = path.as_ref().to_path_buf();
        if path.extension().is_none() {
            path.set_extension("sca");
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
        self.compile_named(path, &text)
    }

    /// Compile rule-file text; `name` is used in error locations and as the
    /// base for relative `!include` paths.
    pub fn compile_str(&mut self, name: &str, text: &str) -> Result<()> {
        self.compile_named(PathBuf::from(name), text)
    }

    /// Compile a single statement, as if it were the next line of input.
    pub fn compile_line(&mut self, text: &str) -> Result<()> {
        self.compile_statement("<line>", 1, text.trim()).map_err(|e| e.at("<line>", 1))
    }

    fn compile_named(&mut self, path: PathBuf, text: &str) -> Result<()> {
        if self.ingest.files.contains(&path) {
            return Err(Error::malformed(format!("'{}' is already being included", path.display())));
        }
        let file = path.display().to_string();
        log::info!("compiling '{}'", file);

        self.ingest.files.push(path);
        let result = self.compile_lines(&file, text);
        self.ingest.files.pop();
        self.ingest.skip = false;
        self.ingest.done = false;

        if self.ingest.files.is_empty() && !self.ingest.group_path.is_empty() {
            log::warn!("{} group(s) still open at the end of '{}'", self.ingest.group_path.len(), file);
        }
        result
    }

    fn compile_lines(&mut self, file: &str, text: &str) -> Result<()> {
        for line in logical_lines(text) {
            self.compile_statement(file, line.number, &line.text).map_err(|e| e.at(file, line.number))?;
            if self.ingest.done {
                log::debug!("'{}' ends at line {}", file, line.number);
                break;
            }
        }
        Ok(())
    }

    fn compile_statement(&mut self, file: &str, number: usize, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        if self.ingest.skip {
            let name = text.strip_prefix('!').and_then(|d| d.split_whitespace().next());
            if !matches!(name, Some("noskip" | "end")) {
                return Ok(());
            }
        }

        if let Some(directive) = text.strip_prefix('!') {
            return self.directive(file, number, directive);
        }

        if let Some(caps) = regex!(r"^(\w+)\s+(==?)\s+(.*)$").captures(text) {
            return self.defs.define(DefinitionKind::Category, &caps[1], &caps[3], &caps[2] == "==");
        }

        if let Some(caps) = regex!(r"^(\w+)\s+(\S+)(?:\s+(==?))?\s+(.*)$").captures(text) {
            let raw = caps.get(3).is_some_and(|m| m.as_str() == "==");
            match DefinitionKind::from_keyword(&caps[1]) {
                Some(kind) => return self.defs.define(kind, &caps[2], &caps[4], raw),
                None if caps.get(3).is_some() && DialectFilter::parse(&caps[1], &self.dialects).is_err() => {
                    return Err(Error::UnknownDefinitionKind(caps[1].to_string()));
                }
                None => {}
            }
        }

        self.add_rule(file, number, text)
    }

    fn add_rule(&mut self, file: &str, number: usize, text: &str) -> Result<()> {
        let statement =
            if self.ingest.prefix.is_empty() { text.to_string() } else { format!("{} {}", self.ingest.prefix, text) };
        let origin = Origin { file, line: number };
        let rule = Rule::compile(&statement, &self.defs, &self.rules, &self.dialects, origin)?;
        let persistent = rule.is_persistent();
        let id = self.rules.insert(rule)?;

        if persistent {
            self.persistent.push(GroupChild::Rule(id));
        } else {
            group_at(&mut self.main, &self.ingest.group_path)?.push(GroupChild::Rule(id));
        }
        Ok(())
    }

    fn directive(&mut self, file: &str, number: usize, line: &str) -> Result<()> {
        let mut tokens = split_escaped(line, None).into_iter();
        let Some(name) = tokens.next() else {
            return Err(Error::malformed("empty directive"));
        };
        let rest: Vec<String> = tokens.collect();
        log::debug!("directive !{} {:?}", name, rest);

        if let Some(level) = heading_level(&name) {
            let heading = Heading { level, text: rest.join(" ") };
            group_at(&mut self.main, &self.ingest.group_path)?.push(GroupChild::Heading(heading));
            return Ok(());
        }

        let args: Args = rest
            .iter()
            .map(|token| match token.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (token.clone(), None),
            })
            .collect();

        match name.as_str() {
            "dialects" => self.declare_dialects(&args),
            "prefix" | "dirprefix" => {
                let [prefix] = bind(&name, &args, ["dialects"], 0)?;
                let prefix = prefix.unwrap_or_default();
                DialectFilter::parse(&prefix, &self.dialects)?;
                self.ingest.prefix = prefix;
                Ok(())
            }
            "group" => self.open_group(&args),
            "endgroup" => {
                if self.ingest.group_path.pop().is_none() {
                    return Err(Error::malformed("no active group"));
                }
                Ok(())
            }
            "assert" => {
                let [dialect, word, expected] = bind(&name, &args, ["dialect", "word", "expected"], 3)?;
                let (dialect, word, expected) =
                    (dialect.unwrap_or_default(), word.unwrap_or_default(), expected.unwrap_or_default());
                let mut chars = dialect.chars();
                let (Some(code), None) = (chars.next(), chars.next()) else {
                    return Err(Error::malformed(format!("'{dialect}' is not a single dialect")));
                };
                if !self.dialects.contains(code) {
                    return Err(Error::malformed(format!("unknown dialect '{code}'")));
                }
                let rule = self.rules.last_id().ok_or_else(|| Error::malformed("no rule to assert about"))?;
                self.rules.add_assertion(Assertion {
                    rule,
                    dialect: code,
                    input: word,
                    expected,
                    file: file.to_string(),
                    line: number,
                });
                Ok(())
            }
            "exception" => {
                let [rule, words, dialects] = bind(&name, &args, ["rule", "words", "dialects"], 2)?;
                let (rule, words) = (rule.unwrap_or_default(), words.unwrap_or_default());
                self.exceptions.add(&rule, words.split(',').filter(|w| !w.is_empty()), dialects.as_deref());
                Ok(())
            }
            "exceptfile" => {
                let [path] = bind(&name, &args, ["file"], 1)?;
                let path = self.relative(&path.unwrap_or_default());
                self.exceptions.read_file(&path)
            }
            "include" => {
                let [path] = bind(&name, &args, ["file"], 1)?;
                let path = self.relative(&path.unwrap_or_default());
                self.compile_source(path)
            }
            "seed" => {
                let [seed] = bind(&name, &args, ["seed"], 1)?;
                self.set_seed(SeedMode::parse(&seed.unwrap_or_default()));
                Ok(())
            }
            "skip" => {
                self.ingest.skip = true;
                Ok(())
            }
            "noskip" => {
                self.ingest.skip = false;
                Ok(())
            }
            "end" => {
                self.ingest.done = true;
                Ok(())
            }
            "skipif" | "skipunless" => {
                let [var] = bind(&name, &args, ["var"], 1)?;
                let defined = self.options.defines.contains_key(&var.unwrap_or_default());
                self.ingest.skip = defined == (name == "skipif");
                Ok(())
            }
            other => Err(Error::malformed(format!("unknown directive '{other}'"))),
        }
    }

    fn declare_dialects(&mut self, args: &Args) -> Result<()> {
        let mut dialects = String::new();
        for (token, value) in args {
            if value.is_some() || !token.chars().all(char::is_alphanumeric) {
                return Err(Error::malformed(format!("bad dialect spec '{token}'")));
            }
            for c in token.chars() {
                if dialects.contains(c) {
                    return Err(Error::malformed(format!("duplicate dialect spec '{c}'")));
                }
                dialects.push(c);
            }
        }
        if dialects.is_empty() {
            return Err(Error::malformed("no dialects given"));
        }
        log::debug!("dialects: {}", dialects);
        self.dialects = dialects;
        Ok(())
    }

    fn open_group(&mut self, args: &Args) -> Result<()> {
        let params = GroupParams::parse(args, &self.options.defines)?;
        let id = self.ingest.next_group_id;
        self.ingest.next_group_id += 1;

        let active = group_at(&mut self.main, &self.ingest.group_path)?;
        let index = active.children().len();
        active.push(GroupChild::Group(RuleGroup::new(id, params)));
        self.ingest.group_path.push(index);
        log::debug!("opened group #{} at depth {}", id, self.ingest.group_path.len());
        Ok(())
    }

    /// `path` relative to the directory of the file being read.
    fn relative(&self, path: &str) -> PathBuf {
        match self.ingest.files.last().and_then(|file| file.parent()) {
            Some(dir) => dir.join(path),
            None => PathBuf::from(path),
        }
    }
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "heading" => Some(0),
        "subheading" => Some(1),
        "subsubheading" => Some(2),
        _ => None,
    }
}

/// Bind directive arguments to `names`: `key=value` by name, the rest in order.
/// The first `required` names must end up with a value.
fn bind<const N: usize>(
    directive: &str,
    args: &Args,
    names: [&str; N],
    required: usize,
) -> Result<[Option<String>; N]> {
    let mut bound: [Option<String>; N] = std::array::from_fn(|_| None);
    let mut positional = Vec::new();

    for (key, value) in args {
        match value {
            Some(value) => match names.iter().position(|n| *n == key.as_str()) {
                Some(slot) => bound[slot] = Some(value.clone()),
                None => return Err(Error::malformed(format!("unknown parameter '{key}' for '{directive}'"))),
            },
            None => positional.push(key.clone()),
        }
    }

    let mut free = (0..N).filter(|&slot| bound[slot].is_none()).collect::<Vec<_>>().into_iter();
    for value in positional {
        let Some(slot) = free.next() else {
            return Err(Error::malformed(format!("too many arguments for '{directive}'")));
        };
        bound[slot] = Some(value);
    }

    if let Some(missing) = names.iter().take(required).zip(&bound).find(|(_, v)| v.is_none()) {
        return Err(Error::malformed(format!("parameter '{}' not given for '{}'", missing.0, directive)));
    }
    Ok(bound)
}
