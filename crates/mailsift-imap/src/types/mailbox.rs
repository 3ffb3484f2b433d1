//! Mailbox names, LIST entries and selection status.

use utf7_imap::{decode_utf7_imap, encode_utf7_imap};

/// Encodes a mailbox name to the modified UTF-7 form used on the wire.
#[must_use]
pub fn encode_mailbox_name(name: &str) -> String {
    encode_utf7_imap(name.to_owned())
}

/// Decodes a modified UTF-7 mailbox name received from the server.
#[must_use]
pub fn decode_mailbox_name(name: &str) -> String {
    decode_utf7_imap(name.to_owned())
}

/// One entry of a LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Decoded mailbox name.
    pub name: String,
}

impl ListResponse {
    /// Returns false for `\Noselect` / `\NonExistent` placeholders.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| matches!(a, MailboxAttribute::NoSelect | MailboxAttribute::NonExistent))
    }
}

/// A LIST mailbox attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\NonExistent`
    NonExistent,
    /// `\HasChildren`
    HasChildren,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\Junk` (or the legacy `\Spam`)
    Junk,
    /// `\Trash`
    Trash,
    /// `\Sent`
    Sent,
    /// `\Drafts`
    Drafts,
    /// `\Archive`
    Archive,
    /// Anything else.
    Other(String),
}

impl MailboxAttribute {
    /// Parses an attribute atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\TRASH" => Self::Trash,
            "\\SENT" => Self::Sent,
            "\\DRAFTS" => Self::Drafts,
            "\\ARCHIVE" => Self::Archive,
            _ => Self::Other(s.to_string()),
        }
    }
}

/// State reported by SELECT or EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// UIDVALIDITY, if reported.
    pub uid_validity: Option<u32>,
    /// Predicted next UID, if reported.
    pub uid_next: Option<u32>,
    /// True when opened with EXAMINE or the server forced READ-ONLY.
    pub read_only: bool,
}
