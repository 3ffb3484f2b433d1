//! Wire encoding of command arguments.

use super::types::{SearchKey, search_date};

/// A serialized command, split at every synchronizing literal.
///
/// The first part is sent immediately; each following part may only be sent
/// after the server answered the preceding `{n}` with a continuation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    parts: Vec<Vec<u8>>,
}

impl Request {
    /// The parts in send order.
    #[must_use]
    pub fn parts(&self) -> &[Vec<u8>] {
        &self.parts
    }

    /// The whole command as one buffer, as it appears on the wire.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.parts.concat()
    }
}

/// Incremental command writer.
#[derive(Debug)]
pub(crate) struct Encoder {
    current: Vec<u8>,
    parts: Vec<Vec<u8>>,
    literal_plus: bool,
}

impl Encoder {
    pub(crate) fn new(tag: &str, literal_plus: bool) -> Self {
        let mut current = Vec::with_capacity(64);
        current.extend_from_slice(tag.as_bytes());
        current.push(b' ');
        Self {
            current,
            parts: Vec::new(),
            literal_plus,
        }
    }

    pub(crate) fn raw(&mut self, s: &str) -> &mut Self {
        self.current.extend_from_slice(s.as_bytes());
        self
    }

    pub(crate) fn sp(&mut self) -> &mut Self {
        self.current.push(b' ');
        self
    }

    /// Writes an astring: a bare atom when possible, a quoted string when it
    /// only has specials, a literal when it has 8-bit or line-break bytes.
    pub(crate) fn astring(&mut self, s: &str) -> &mut Self {
        if s.bytes().any(needs_literal) {
            self.literal(s.as_bytes())
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            self.quoted(s)
        } else {
            self.raw(s)
        }
    }

    /// Writes a string argument that must never be a bare atom.
    pub(crate) fn string(&mut self, s: &str) -> &mut Self {
        if s.bytes().any(needs_literal) {
            self.literal(s.as_bytes())
        } else {
            self.quoted(s)
        }
    }

    /// Writes a LIST pattern; `%` and `*` stay unquoted as wildcards.
    pub(crate) fn list_pattern(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() && s.bytes().all(|b| b == b'%' || b == b'*' || !needs_quoting(b)) {
            self.raw(s)
        } else {
            self.astring(s)
        }
    }

    fn quoted(&mut self, s: &str) -> &mut Self {
        self.current.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                self.current.push(b'\\');
            }
            self.current.push(b);
        }
        self.current.push(b'"');
        self
    }

    fn literal(&mut self, data: &[u8]) -> &mut Self {
        if self.literal_plus {
            self.raw(&format!("{{{}+}}\r\n", data.len()));
        } else {
            self.raw(&format!("{{{}}}\r\n", data.len()));
            self.parts.push(std::mem::take(&mut self.current));
        }
        self.current.extend_from_slice(data);
        self
    }

    pub(crate) fn search_key(&mut self, key: &SearchKey) -> &mut Self {
        match key {
            SearchKey::All => self.raw("ALL"),
            SearchKey::Unseen => self.raw("UNSEEN"),
            SearchKey::Unanswered => self.raw("UNANSWERED"),
            SearchKey::From(s) => self.raw("FROM ").string(s),
            SearchKey::To(s) => self.raw("TO ").string(s),
            SearchKey::Subject(s) => self.raw("SUBJECT ").string(s),
            SearchKey::Since(date) => self.raw("SINCE ").raw(&search_date(*date)),
            SearchKey::Before(date) => self.raw("BEFORE ").raw(&search_date(*date)),
            SearchKey::Not(inner) => self.raw("NOT ").search_key(inner),
        }
    }

    pub(crate) fn finish(mut self) -> Request {
        self.current.extend_from_slice(b"\r\n");
        self.parts.push(self.current);
        Request { parts: self.parts }
    }
}

const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}

const fn needs_literal(b: u8) -> bool {
    b >= 0x80 || b == b'\r' || b == b'\n' || b == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(f: impl FnOnce(&mut Encoder), literal_plus: bool) -> Request {
        let mut enc = Encoder::new("A1", literal_plus);
        f(&mut enc);
        enc.finish()
    }

    #[test]
    fn atoms_stay_bare() {
        let req = encode(|e| { e.astring("INBOX"); }, false);
        assert_eq!(req.to_bytes(), b"A1 INBOX\r\n");
    }

    #[test]
    fn specials_are_quoted_and_escaped() {
        let req = encode(|e| { e.astring("say \"hi\"\\"); }, false);
        assert_eq!(req.to_bytes(), b"A1 \"say \\\"hi\\\"\\\\\"\r\n");
    }

    #[test]
    fn empty_astring_is_quoted() {
        let req = encode(|e| { e.astring(""); }, false);
        assert_eq!(req.to_bytes(), b"A1 \"\"\r\n");
    }

    #[test]
    fn non_ascii_becomes_synchronizing_literal() {
        let req = encode(|e| { e.raw("SUBJECT ").string("café"); }, false);
        assert_eq!(req.parts().len(), 2);
        assert_eq!(req.parts()[0], b"A1 SUBJECT {5}\r\n");
        assert_eq!(req.parts()[1], "café\r\n".as_bytes());
    }

    #[test]
    fn literal_plus_keeps_one_part() {
        let req = encode(|e| { e.raw("SUBJECT ").string("café"); }, true);
        assert_eq!(req.parts().len(), 1);
        assert_eq!(req.to_bytes(), "A1 SUBJECT {5+}\r\ncafé\r\n".as_bytes());
    }

    #[test]
    fn list_wildcards_are_bare() {
        let req = encode(|e| { e.list_pattern("*"); }, false);
        assert_eq!(req.to_bytes(), b"A1 *\r\n");
    }

    #[test]
    fn search_strings_are_always_quoted() {
        let req = encode(|e| { e.search_key(&SearchKey::From("bob".to_string())); }, false);
        assert_eq!(req.to_bytes(), b"A1 FROM \"bob\"\r\n");
    }
}
