//! Response parser.
//!
//! Lines are first read into a generic [`Value`] tree and then interpreted
//! into typed responses by [`parse_response`]. The tree keeps the parser
//! small: every response shape the client cares about is a walk over atoms,
//! numbers, strings and nested lists.

mod fetch;
mod response;

pub use fetch::{Address, BodyStructure, Disposition, Envelope, FetchItem};
pub use response::{Response, ResponseCode, Status, Untagged, parse_response};

use std::borrow::Cow;

use crate::error::{Error, Result};

const MAX_DEPTH: usize = 64;

/// A node of a parsed response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A bare atom, such as `FLAGS` or `\Seen`.
    Atom(String),
    /// An unsigned number.
    Number(u64),
    /// A quoted string, unescaped.
    Quoted(Vec<u8>),
    /// A `{n}` literal.
    Literal(Vec<u8>),
    /// `NIL`
    Nil,
    /// A parenthesized list.
    List(Vec<Value>),
    /// A bracketed section, as in `BODY[HEADER]` or a response code.
    Section(Vec<Value>),
}

impl Value {
    /// Text of an atom, quoted string or literal. Invalid UTF-8 is replaced.
    #[must_use]
    pub fn as_str(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Atom(s) => Some(Cow::Borrowed(s)),
            Self::Quoted(b) | Self::Literal(b) => Some(String::from_utf8_lossy(b)),
            Self::Number(_) | Self::Nil | Self::List(_) | Self::Section(_) => None,
        }
    }

    /// An nstring: `None` for `NIL`, the text otherwise.
    #[must_use]
    pub fn nstring(&self) -> Option<String> {
        self.as_str().map(Cow::into_owned)
    }

    /// The number, if this is one.
    #[must_use]
    pub const fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// True when this is an atom equal to `name`, ignoring case.
    #[must_use]
    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Self::Atom(s) if s.eq_ignore_ascii_case(name))
    }
}

/// Cursor over one response line (literals included inline).
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.pos, message)
    }

    /// True at the end of input or at the terminating CRLF.
    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek(), None | Some(b'\r' | b'\n'))
    }

    pub(crate) fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    /// Consumes `byte` if it is next.
    pub(crate) fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        while self.eat(b' ') {}
    }

    /// Reads bytes up to the next space or end of line.
    pub(crate) fn word(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while !self.at_end() && self.peek() != Some(b' ') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a word"));
        }
        let input = self.input;
        std::str::from_utf8(&input[start..self.pos]).map_err(|_| self.error("non-UTF-8 word"))
    }

    /// Everything up to the end of the line, lossily decoded.
    pub(crate) fn rest(&mut self) -> String {
        let start = self.pos;
        while !self.at_end() {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Reads an astring, allowing the `]` that atoms may not contain.
    pub(crate) fn astring(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'"' | b'{') => self.value(),
            _ => {
                let start = self.pos;
                while !self.at_end() && !matches!(self.peek(), Some(b' ' | b'(' | b')')) {
                    self.pos += 1;
                }
                if start == self.pos {
                    return Err(self.error("expected astring"));
                }
                Ok(Value::Atom(
                    String::from_utf8_lossy(&self.input[start..self.pos]).into_owned(),
                ))
            }
        }
    }

    /// Reads one value.
    pub(crate) fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                self.nested(b')').map(Value::List)
            }
            Some(b'[') => {
                self.pos += 1;
                self.nested(b']').map(Value::Section)
            }
            Some(b'"') => self.quoted(),
            Some(b'{') => self.literal(),
            Some(_) if !self.at_end() => self.atom(),
            _ => Err(self.error("unexpected end of line")),
        }
    }

    /// Reads space-separated values until `close`, which is consumed.
    pub(crate) fn values_until(&mut self, close: u8) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        loop {
            self.skip_spaces();
            if self.eat(close) {
                return Ok(values);
            }
            if self.at_end() {
                return Err(self.error(format!("missing '{}'", close as char)));
            }
            values.push(self.value()?);
        }
    }

    fn nested(&mut self, close: u8) -> Result<Vec<Value>> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let values = self.values_until(close);
        self.depth -= 1;
        values
    }

    fn atom(&mut self) -> Result<Value> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_atom_char(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected atom"));
        }
        let text = String::from_utf8_lossy(&self.input[start..self.pos]);
        if text.eq_ignore_ascii_case("NIL") {
            return Ok(Value::Nil);
        }
        if text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = text.parse() {
                return Ok(Value::Number(n));
            }
        }
        Ok(Value::Atom(text.into_owned()))
    }

    fn quoted(&mut self) -> Result<Value> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(Value::Quoted(out));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(b'\r' | b'\n') | None => return Err(self.error("unterminated string")),
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn literal(&mut self) -> Result<Value> {
        self.expect(b'{')?;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let len: usize = std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid literal length"))?;
        self.eat(b'+');
        self.expect(b'}')?;
        self.expect(b'\r')?;
        self.expect(b'\n')?;
        let end = self.pos + len;
        if end > self.input.len() {
            return Err(self.error("truncated literal"));
        }
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(Value::Literal(data))
    }
}

const fn is_atom_char(b: u8) -> bool {
    !matches!(b, b' ' | b'(' | b')' | b'[' | b']' | b'{' | b'"') && b > 0x1F && b != 0x7F
}
