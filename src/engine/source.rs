//! Source text preprocessing.
//!
//! Rule files are line oriented. Before a line reaches the compiler it goes
//! through the following steps:
//!
//! ```text
//! raw line ── trim ── drop blanks / '#' comments
//!                  ── cut at a non-initial, unescaped '!'
//!                  ── join with the next line when it ends in '\'
//! ```
//!
//! The first physical line number of each logical line is kept so that errors
//! can point back into the file.

/// A logical line with the number of the physical line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Split `text` into logical lines, applying comment stripping and `\`
/// continuations.
pub fn logical_lines(text: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    let mut start = 0;

    for (idx, raw) in text.lines().enumerate() {
        let number = idx + 1;
        let mut line = raw.trim();

        if line.is_empty() || (pending.is_empty() && line.starts_with('#')) {
            continue;
        }

        if let Some(cut) = comment_start(line) {
            line = line[..cut].trim_end();
            if line.is_empty() {
                continue;
            }
        }

        if pending.is_empty() {
            start = number;
        }

        if let Some(head) = line.strip_suffix('\\') {
            pending.push_str(head);
            continue;
        }

        pending.push_str(line);
        lines.push(SourceLine { number: start, text: std::mem::take(&mut pending) });
    }

    if !pending.trim().is_empty() {
        lines.push(SourceLine { number: start, text: pending });
    }

    lines
}

/// Byte offset of the first non-initial `!` not preceded by a backslash.
fn comment_start(line: &str) -> Option<usize> {
    let mut prev = None;
    for (idx, c) in line.char_indices() {
        if c == '!' && idx > 0 && prev != Some('\\') {
            return Some(idx);
        }
        prev = Some(c);
    }
    None
}

/// Split `s` on `delim` (whitespace when `None`), treating a delimiter that
/// follows a backslash as part of the text.
///
/// ```text
/// split_escaped("a\\ b c", None)      -> ["a b", "c"]
/// split_escaped("ab,c\\,d", Some(',')) -> ["ab", "c,d"]
/// ```
pub fn split_escaped(s: &str, delim: Option<char>) -> Vec<String> {
    let pieces: Vec<&str> = match delim {
        None => s.split_whitespace().collect(),
        Some(d) => s.split(d).collect(),
    };
    let joiner = delim.unwrap_or(' ');

    let mut out: Vec<String> = Vec::new();
    for piece in pieces {
        match out.last_mut() {
            Some(last) if last.ends_with('\\') => {
                last.pop();
                last.push(joiner);
                last.push_str(piece);
            }
            _ => out.push(piece.to_string()),
        }
    }
    out
}
