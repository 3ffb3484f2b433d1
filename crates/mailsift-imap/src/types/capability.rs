//! Server capabilities.

use std::fmt;

/// A capability advertised by the server.
///
/// Only the capabilities the client acts on get their own variant; the rest
/// are kept verbatim so callers can still ask about them by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501).
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051).
    Imap4Rev2,
    /// `UIDPLUS` (RFC 4315), enables `UID EXPUNGE`.
    UidPlus,
    /// `MOVE` (RFC 6851).
    Move,
    /// `LITERAL+` (RFC 7888), non-synchronizing literals.
    LiteralPlus,
    /// `STARTTLS`.
    StartTls,
    /// `LOGINDISABLED`, plaintext LOGIN is refused.
    LoginDisabled,
    /// `AUTH=<mechanism>`.
    Auth(String),
    /// Anything else, as sent by the server.
    Other(String),
}

impl Capability {
    /// Parses a capability atom (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "LITERAL+" => Self::LiteralPlus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            _ => match upper.strip_prefix("AUTH=") {
                Some(mechanism) => Self::Auth(mechanism.to_string()),
                None => Self::Other(s.to_string()),
            },
        }
    }

    /// Returns true if this capability has the given name, ignoring case.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.to_string().eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imap4Rev1 => f.write_str("IMAP4rev1"),
            Self::Imap4Rev2 => f.write_str("IMAP4rev2"),
            Self::UidPlus => f.write_str("UIDPLUS"),
            Self::Move => f.write_str("MOVE"),
            Self::LiteralPlus => f.write_str("LITERAL+"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::LoginDisabled => f.write_str("LOGINDISABLED"),
            Self::Auth(mechanism) => write!(f, "AUTH={mechanism}"),
            Self::Other(name) => f.write_str(name),
        }
    }
}
