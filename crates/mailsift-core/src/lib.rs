//! # mailsift-core
//!
//! Search and rule automation for IMAP mailboxes.
//!
//! This crate provides:
//! - **Configuration** - accounts from TOML, passwords from the system keyring
//! - **Search** - predicates translated into IMAP searches and merged with
//!   AND/OR semantics, plus attachment post-filters
//! - **Rules** - ordered `[[rule]]` files that move or delete what they match
//! - **Accounts** - a facade that opens one session per operation and caches
//!   capabilities and folders
//! - **Sessions** - the [`session::MailSession`] boundary, backed by IMAP or,
//!   with the `test-support` feature, by an in-memory server

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod config;
mod error;
pub mod message;
pub mod rules;
pub mod search;
pub mod session;

pub use account::{ALL_FOLDERS, Account};
pub use config::credentials;
pub use config::{AccountConfig, Config, Security, ValidationError, validate_account};
pub use error::{Error, Result};
pub use mailsift_imap::{Capability, Uid};
pub use message::{Attachment, AttachmentKind, MessageSummary};
pub use rules::{Action, Outcome, Rule, RuleReport};
pub use search::{MergeMode, PostFilter, Predicate, SearchSpec};
#[cfg(any(test, feature = "test-support"))]
pub use session::MemoryServer;
pub use session::{Connector, ImapConnector, MailSession, SessionError};
