//! Protocol value types shared by commands and responses.

mod capability;
mod flags;
mod identifiers;
mod mailbox;

pub use capability::Capability;
pub use flags::Flag;
pub use identifiers::{Uid, UidSet};
pub use mailbox::{ListResponse, MailboxAttribute, MailboxStatus, decode_mailbox_name, encode_mailbox_name};
