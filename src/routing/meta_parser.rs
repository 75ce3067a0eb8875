//! Restricted literal parser for meta blocks embedded in view artifacts.
//!
//! A view may declare its policy inline:
//!
//! ```text
//! {{!-- RouteMeta = [
//!     'requireLogin' => 'Please sign in',
//!     'method' => ['GET', 'POST'],
//!     'cache' => ['enabled' => true, 'time' => 300],
//! ]; --}}
//! ```
//!
//! Only literals are accepted: quoted strings, numbers, `true`/`false`/`null`
//! and nested `[...]` lists or maps. Keys are quoted strings, numbers or bare
//! identifiers, separated from values by `=>` or `:`. Blocks containing a
//! denylisted construct are rejected before parsing. This is never an evaluator.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

/// Constructs that reject a block outright.
const DENYLIST: &[&str] = &[
    "$",
    "function(",
    "eval(",
    "exec(",
    "system(",
    "shell_exec(",
    "passthru(",
    "popen(",
    "proc_open(",
    "file_get_contents(",
    "file_put_contents(",
    "fopen(",
    "fwrite(",
    "unlink(",
    "include(",
    "require(",
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetaParseError {
    #[error("meta block contains denied construct '{0}'")]
    Denied(&'static str),
    #[error("meta block is not terminated")]
    Unterminated,
    #[error("unexpected {found} at offset {offset}")]
    Unexpected { offset: usize, found: String },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

fn block_start() -> &'static Regex {
    static START: OnceLock<Regex> = OnceLock::new();
    START.get_or_init(|| Regex::new(r"(?:\bconst\s+)?\bRouteMeta\s*=\s*\[").expect("static meta regex"))
}

/// Location of a meta block inside an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaBlock<'a> {
    /// The whole statement, from `RouteMeta` through the optional `;`.
    pub span: Range<usize>,
    /// The bracketed literal.
    pub literal: &'a str,
}

/// Locate the first meta block in `source`.
pub fn find_block(source: &str) -> Result<Option<MetaBlock<'_>>, MetaParseError> {
    let Some(m) = block_start().find(source) else {
        return Ok(None);
    };
    let open = m.end() - 1;
    let close = matching_bracket(source, open)?;
    let literal = &source[open..=close];

    let mut end = close + 1;
    let rest = &source[end..];
    let trimmed = rest.trim_start();
    if trimmed.starts_with(';') {
        end += rest.len() - trimmed.len() + 1;
    }

    Ok(Some(MetaBlock { span: m.start()..end, literal }))
}

/// Extract and parse the meta block of `source`, if it has one.
pub fn parse_meta(source: &str) -> Result<Option<Value>, MetaParseError> {
    match find_block(source)? {
        None => Ok(None),
        Some(block) => {
            check_denylist(block.literal)?;
            parse_literal(block.literal).map(Some)
        }
    }
}

/// Remove the meta block from `source`. Sources without a valid block are returned unchanged.
pub fn strip_block(source: &str) -> Cow<'_, str> {
    match find_block(source) {
        Ok(Some(block)) => {
            let mut out = String::with_capacity(source.len());
            out.push_str(&source[..block.span.start]);
            out.push_str(&source[block.span.end..]);
            Cow::Owned(out)
        }
        _ => Cow::Borrowed(source),
    }
}

fn check_denylist(literal: &str) -> Result<(), MetaParseError> {
    let lowered = literal.to_ascii_lowercase();
    let compact: String = lowered.split_whitespace().collect();
    for construct in DENYLIST {
        if compact.contains(construct) {
            return Err(MetaParseError::Denied(construct));
        }
    }
    Ok(())
}

/// Find the `]` matching the `[` at `open`, skipping strings and comments.
fn matching_bracket(source: &str, open: usize) -> Result<usize, MetaParseError> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    Err(MetaParseError::Unterminated)
}

/// Parse a bracketed literal into a JSON value.
pub fn parse_literal(literal: &str) -> Result<Value, MetaParseError> {
    let mut parser = Parser { src: literal, pos: 0 };
    let value = parser.value()?;
    parser.skip_trivia();
    if parser.pos < parser.src.len() {
        return Err(parser.unexpected());
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

enum Key {
    Named(String),
    Positional(Value),
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn unexpected(&self) -> MetaParseError {
        let found = match self.peek() {
            Some(c) => format!("'{}'", c),
            None => "end of input".to_string(),
        };
        MetaParseError::Unexpected { offset: self.pos, found }
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.starts_with("//") || trimmed.starts_with('#') {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if trimmed.starts_with("/*") {
                self.pos += trimmed.find("*/").map(|i| i + 2).unwrap_or(trimmed.len());
            } else {
                return;
            }
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_trivia();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Result<Value, MetaParseError> {
        self.skip_trivia();
        match self.peek() {
            Some('[') => self.array(),
            Some(q @ ('\'' | '"')) => self.string(q).map(Value::String),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let word = self.identifier();
                match word.to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" => Ok(Value::Null),
                    _ => Err(MetaParseError::Unexpected {
                        offset: self.pos - word.len(),
                        found: format!("identifier '{}'", word),
                    }),
                }
            }
            _ => Err(self.unexpected()),
        }
    }

    fn array(&mut self) -> Result<Value, MetaParseError> {
        self.pos += 1; // '['
        let mut entries: Vec<(Option<String>, Value)> = Vec::new();

        loop {
            if self.eat("]") {
                break;
            }

            let first = self.key_or_value()?;
            let entry = if self.eat("=>") || self.eat(":") {
                let key = match first {
                    Key::Named(name) => name,
                    Key::Positional(Value::String(s)) => s,
                    Key::Positional(Value::Number(n)) => n.to_string(),
                    Key::Positional(_) => return Err(self.unexpected()),
                };
                (Some(key), self.value()?)
            } else {
                match first {
                    Key::Positional(value) => (None, value),
                    Key::Named(name) => {
                        return Err(MetaParseError::Unexpected {
                            offset: self.pos,
                            found: format!("bare identifier '{}' without value", name),
                        })
                    }
                }
            };
            entries.push(entry);

            if self.eat(",") {
                continue;
            }
            if self.eat("]") {
                break;
            }
            self.skip_trivia();
            return Err(if self.pos >= self.src.len() {
                MetaParseError::Unterminated
            } else {
                self.unexpected()
            });
        }

        if entries.iter().all(|(key, _)| key.is_none()) {
            return Ok(Value::Array(entries.into_iter().map(|(_, v)| v).collect()));
        }

        let mut map = Map::new();
        for (i, (key, value)) in entries.into_iter().enumerate() {
            map.insert(key.unwrap_or_else(|| i.to_string()), value);
        }
        Ok(Value::Object(map))
    }

    /// A map key may be a bare identifier; anything else is a literal value.
    fn key_or_value(&mut self) -> Result<Key, MetaParseError> {
        self.skip_trivia();
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos;
                let word = self.identifier();
                match word.to_ascii_lowercase().as_str() {
                    "true" | "false" | "null" => {
                        self.pos = start;
                        self.value().map(Key::Positional)
                    }
                    _ => Ok(Key::Named(word)),
                }
            }
            _ => self.value().map(Key::Positional),
        }
    }

    fn identifier(&mut self) -> String {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        let word = self.rest()[..len].to_string();
        self.pos += len;
        word
    }

    fn string(&mut self, quote: char) -> Result<String, MetaParseError> {
        self.pos += 1;
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            if c == quote {
                self.pos += i + 1;
                return Ok(out);
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, e)) if e == quote || e == '\\' => out.push(e),
                    Some((_, 'n')) if quote == '"' => out.push('\n'),
                    Some((_, 't')) if quote == '"' => out.push('\t'),
                    Some((_, 'r')) if quote == '"' => out.push('\r'),
                    Some((_, e)) => {
                        out.push('\\');
                        out.push(e);
                    }
                    None => break,
                }
                continue;
            }
            out.push(c);
        }
        Err(MetaParseError::Unterminated)
    }

    fn number(&mut self) -> Result<Value, MetaParseError> {
        let len = self
            .rest()
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || (c == '-' && i == 0) || c == '+'))
            .map(|(i, _)| i)
            .unwrap_or(self.rest().len());
        let text = &self.rest()[..len];
        self.pos += len;

        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| MetaParseError::InvalidNumber(text.to_string()))
    }
}
