//! Typed command arguments.

use chrono::NaiveDate;

/// A UID SEARCH key. Keys in one command are implicitly ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// `ALL`
    All,
    /// `UNSEEN`
    Unseen,
    /// `UNANSWERED`
    Unanswered,
    /// `FROM <string>`, substring of the From header.
    From(String),
    /// `TO <string>`, substring of the To header.
    To(String),
    /// `SUBJECT <string>`, substring of the Subject header.
    Subject(String),
    /// `SINCE <date>`, internal date on or after.
    Since(NaiveDate),
    /// `BEFORE <date>`, internal date strictly before.
    Before(NaiveDate),
    /// `NOT <key>`
    Not(Box<SearchKey>),
}

impl SearchKey {
    /// Wraps a key in `NOT`.
    #[must_use]
    pub fn not(key: Self) -> Self {
        Self::Not(Box::new(key))
    }

    /// True when the key carries a non-ASCII string, so the command has to
    /// announce `CHARSET UTF-8`.
    #[must_use]
    pub fn needs_utf8(&self) -> bool {
        match self {
            Self::From(s) | Self::To(s) | Self::Subject(s) => !s.is_ascii(),
            Self::Not(inner) => inner.needs_utf8(),
            Self::All | Self::Unseen | Self::Unanswered | Self::Since(_) | Self::Before(_) => {
                false
            }
        }
    }
}

/// Formats a date the way SEARCH expects it (`1-Feb-2024`).
#[must_use]
pub fn search_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}

/// A data item requested by UID FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`
    Uid,
    /// `FLAGS`
    Flags,
    /// `ENVELOPE`
    Envelope,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `INTERNALDATE`
    InternalDate,
}

impl FetchAttribute {
    /// Wire name of the item.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uid => "UID",
            Self::Flags => "FLAGS",
            Self::Envelope => "ENVELOPE",
            Self::BodyStructure => "BODYSTRUCTURE",
            Self::Rfc822Size => "RFC822.SIZE",
            Self::InternalDate => "INTERNALDATE",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn search_date_uses_imap_format() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(search_date(date), "1-Feb-2024");
        let date = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();
        assert_eq!(search_date(date), "25-Dec-2023");
    }

    #[test]
    fn utf8_detection_looks_through_not() {
        assert!(!SearchKey::From("a@x.com".to_string()).needs_utf8());
        assert!(SearchKey::Subject("Grüße".to_string()).needs_utf8());
        assert!(SearchKey::not(SearchKey::To("jörg@x.de".to_string())).needs_utf8());
        assert!(!SearchKey::Unseen.needs_utf8());
    }
}
