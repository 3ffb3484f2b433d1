//! # mailsift-imap
//!
//! A small async IMAP4rev1 client carrying exactly the commands mailsift
//! needs to search, inspect and reorganise a mailbox.
//!
//! ## Connection States
//!
//! The client uses the type-state pattern so that commands are only callable
//! in the protocol state that permits them:
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select()/examine() ──→ Selected
//!                                       ▲                                    │
//!                                       └──────── list/create/rename/delete ─┘
//! ```
//!
//! Mailbox management (LIST, CREATE, RENAME, DELETE) is available both before
//! and after a mailbox has been selected.
//!
//! ## Example
//!
//! ```ignore
//! use mailsift_imap::{Client, SearchKey, connection};
//!
//! let stream = connection::connect_tls("imap.example.com", 993).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.login("user@example.com", "secret").await?;
//! let mut client = client.examine("INBOX").await?;
//! let unseen = client.uid_search(&[SearchKey::Unseen]).await?;
//! client.logout().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Authenticated, Client, ImapStream, MailboxAccess, NotAuthenticated, Selected};
pub use command::{Command, FetchAttribute, SearchKey};
pub use error::{Error, Result};
pub use parser::{Address, BodyStructure, Disposition, Envelope, FetchItem};
pub use types::{Capability, Flag, ListResponse, MailboxAttribute, MailboxStatus, Uid, UidSet};
