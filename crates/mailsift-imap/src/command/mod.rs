//! IMAP commands.

mod serialize;
mod tag_generator;
mod types;

pub use serialize::Request;
pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, SearchKey, search_date};

use serialize::Encoder;

use crate::types::{Flag, UidSet, encode_mailbox_name};

/// A command the client can send.
///
/// Mailbox names are given decoded; encoding to modified UTF-7 happens during
/// serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `CAPABILITY`
    Capability,
    /// `LOGIN <user> <password>`
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// `LOGOUT`
    Logout,
    /// `LIST <reference> <pattern>`
    List {
        /// Reference name, usually empty.
        reference: String,
        /// Mailbox pattern with `%`/`*` wildcards.
        pattern: String,
    },
    /// `SELECT <mailbox>`
    Select {
        /// Mailbox to open read-write.
        mailbox: String,
    },
    /// `EXAMINE <mailbox>`
    Examine {
        /// Mailbox to open read-only.
        mailbox: String,
    },
    /// `CREATE <mailbox>`
    Create {
        /// Mailbox to create.
        mailbox: String,
    },
    /// `DELETE <mailbox>`
    Delete {
        /// Mailbox to delete.
        mailbox: String,
    },
    /// `RENAME <from> <to>`
    Rename {
        /// Existing name.
        from: String,
        /// New name.
        to: String,
    },
    /// `UID SEARCH [CHARSET UTF-8] <keys>`
    UidSearch {
        /// Search keys, ANDed. Empty means `ALL`.
        keys: Vec<SearchKey>,
    },
    /// `UID FETCH <set> (<items>)`
    UidFetch {
        /// Messages to fetch.
        uids: UidSet,
        /// Requested items.
        attributes: Vec<FetchAttribute>,
    },
    /// `UID STORE <set> +FLAGS.SILENT (<flags>)`
    UidAddFlags {
        /// Messages to update.
        uids: UidSet,
        /// Flags to add.
        flags: Vec<Flag>,
    },
    /// `UID COPY <set> <mailbox>`
    UidCopy {
        /// Messages to copy.
        uids: UidSet,
        /// Destination mailbox.
        mailbox: String,
    },
    /// `UID MOVE <set> <mailbox>` (RFC 6851)
    UidMove {
        /// Messages to move.
        uids: UidSet,
        /// Destination mailbox.
        mailbox: String,
    },
    /// `EXPUNGE`
    Expunge,
    /// `UID EXPUNGE <set>` (RFC 4315)
    UidExpunge {
        /// Messages to expunge, if flagged `\Deleted`.
        uids: UidSet,
    },
}

impl Command {
    /// Command name for logging. Never includes arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Login { .. } => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::List { .. } => "LIST",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::UidSearch { .. } => "UID SEARCH",
            Self::UidFetch { .. } => "UID FETCH",
            Self::UidAddFlags { .. } => "UID STORE",
            Self::UidCopy { .. } => "UID COPY",
            Self::UidMove { .. } => "UID MOVE",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
        }
    }

    /// Serializes the command with the given tag.
    ///
    /// With `literal_plus` set, literals are non-synchronizing and the result
    /// has a single part.
    #[must_use]
    pub fn serialize(&self, tag: &str, literal_plus: bool) -> Request {
        let mut enc = Encoder::new(tag, literal_plus);
        match self {
            Self::Capability | Self::Logout | Self::Expunge => {
                enc.raw(self.name());
            }
            Self::Login { username, password } => {
                enc.raw("LOGIN ").astring(username).sp().astring(password);
            }
            Self::List { reference, pattern } => {
                enc.raw("LIST ")
                    .astring(&encode_mailbox_name(reference))
                    .sp()
                    .list_pattern(&encode_mailbox_name(pattern));
            }
            Self::Select { mailbox }
            | Self::Examine { mailbox }
            | Self::Create { mailbox }
            | Self::Delete { mailbox } => {
                enc.raw(self.name()).sp().astring(&encode_mailbox_name(mailbox));
            }
            Self::Rename { from, to } => {
                enc.raw("RENAME ")
                    .astring(&encode_mailbox_name(from))
                    .sp()
                    .astring(&encode_mailbox_name(to));
            }
            Self::UidSearch { keys } => {
                enc.raw("UID SEARCH ");
                if keys.iter().any(SearchKey::needs_utf8) {
                    enc.raw("CHARSET UTF-8 ");
                }
                if keys.is_empty() {
                    enc.raw("ALL");
                }
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        enc.sp();
                    }
                    enc.search_key(key);
                }
            }
            Self::UidFetch { uids, attributes } => {
                let items: Vec<&str> = attributes.iter().map(|a| a.as_str()).collect();
                enc.raw(&format!("UID FETCH {uids} ({})", items.join(" ")));
            }
            Self::UidAddFlags { uids, flags } => {
                let flags: Vec<&str> = flags.iter().map(Flag::as_str).collect();
                enc.raw(&format!("UID STORE {uids} +FLAGS.SILENT ({})", flags.join(" ")));
            }
            Self::UidCopy { uids, mailbox } | Self::UidMove { uids, mailbox } => {
                enc.raw(&format!("{} {uids} ", self.name()))
                    .astring(&encode_mailbox_name(mailbox));
            }
            Self::UidExpunge { uids } => {
                enc.raw(&format!("UID EXPUNGE {uids}"));
            }
        }
        enc.finish()
    }
}
