//! The mail session boundary.
//!
//! Everything above this module talks to a server through [`MailSession`],
//! obtained from a [`Connector`]. [`ImapConnector`] is the real thing.
//! With the `test-support` feature, `MemoryServer` keeps mailboxes in memory
//! for tests.

mod imap;
#[cfg(any(test, feature = "test-support"))]
mod memory;

use std::collections::{BTreeMap, BTreeSet};

use mailsift_imap::{
    Capability, FetchAttribute, FetchItem, ListResponse, MailboxStatus, SearchKey, Uid,
};
use tracing::debug;

pub use imap::{ImapConnector, ImapSession};
#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryServer, MemorySession, StoredMessage};

use crate::config::Security;
use crate::{Error, Result};

/// Errors raised by a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Protocol or transport failure.
    #[error(transparent)]
    Imap(#[from] mailsift_imap::Error),

    /// The server refused the credentials.
    #[error("Login rejected: {0}")]
    Login(String),

    /// The configured security mode cannot be used.
    #[error("Security mode {0:?} not supported: use tls or none")]
    UnsupportedSecurity(Security),

    /// A message operation was attempted before selecting a folder.
    #[error("No folder selected")]
    NoFolderSelected,

    /// The session was lost after an earlier failure.
    #[error("Session is closed")]
    Closed,

    /// The server answered NO to a request.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Operations the core needs from a logged-in mail session.
///
/// Message operations act on the folder chosen by the last
/// [`select_folder`](MailSession::select_folder). Empty UID sets are no-ops.
#[allow(async_fn_in_trait)]
pub trait MailSession {
    /// Capabilities advertised after login.
    fn capabilities(&self) -> &[Capability];

    /// Lists every folder.
    async fn list_folders(&mut self) -> SessionResult<Vec<ListResponse>>;

    /// Opens a folder, read-only or read-write.
    async fn select_folder(
        &mut self,
        name: &str,
        read_only: bool,
    ) -> SessionResult<MailboxStatus>;

    /// Runs one search; keys are ANDed.
    async fn search(&mut self, keys: &[SearchKey]) -> SessionResult<BTreeSet<Uid>>;

    /// Fetches data items, keyed by UID.
    async fn fetch(
        &mut self,
        uids: &BTreeSet<Uid>,
        attributes: &[FetchAttribute],
    ) -> SessionResult<BTreeMap<Uid, Vec<FetchItem>>>;

    /// Moves messages with the server's MOVE command.
    async fn move_messages(
        &mut self,
        uids: &BTreeSet<Uid>,
        folder: &str,
    ) -> SessionResult<()>;

    /// Copies messages to another folder.
    async fn copy_messages(
        &mut self,
        uids: &BTreeSet<Uid>,
        folder: &str,
    ) -> SessionResult<()>;

    /// Flags messages `\Deleted`.
    async fn delete_messages(&mut self, uids: &BTreeSet<Uid>) -> SessionResult<()>;

    /// Removes deleted messages, limited to `uids` where the server allows.
    async fn expunge(&mut self, uids: &BTreeSet<Uid>) -> SessionResult<()>;

    /// Creates a folder.
    async fn create_folder(&mut self, name: &str) -> SessionResult<()>;

    /// Renames a folder.
    async fn rename_folder(&mut self, from: &str, to: &str) -> SessionResult<()>;

    /// Deletes a folder.
    async fn delete_folder(&mut self, name: &str) -> SessionResult<()>;

    /// Ends the session.
    async fn logout(self) -> SessionResult<()>
    where
        Self: Sized;
}

/// Opens authenticated sessions for one account.
#[allow(async_fn_in_trait)]
pub trait Connector {
    /// Session type produced.
    type Session: MailSession;

    /// Connects and logs in.
    async fn connect(&self) -> SessionResult<Self::Session>;
}

/// Moves messages from the selected folder, falling back to copy, delete
/// and expunge when the server lacks MOVE.
///
/// # Errors
///
/// Returns the first failing step's error.
pub async fn move_or_copy<S: MailSession>(
    session: &mut S,
    uids: &BTreeSet<Uid>,
    folder: &str,
) -> SessionResult<()> {
    if session.capabilities().contains(&Capability::Move) {
        return session.move_messages(uids, folder).await;
    }
    debug!(folder, count = uids.len(), "no MOVE capability, copying instead");
    session.copy_messages(uids, folder).await?;
    session.delete_messages(uids).await?;
    session.expunge(uids).await
}

/// Runs `op` on a fresh session and logs out afterwards, whether or not `op`
/// succeeded.
///
/// # Errors
///
/// Returns [`Error::Authentication`] if the login is refused,
/// [`Error::Connection`] for other connection failures, and whatever `op`
/// returns. Logout failures are only logged.
pub async fn scoped<C, T>(
    connector: &C,
    account: &str,
    op: impl AsyncFnOnce(&mut C::Session) -> Result<T>,
) -> Result<T>
where
    C: Connector,
{
    let mut session = connector
        .connect()
        .await
        .map_err(|source| match source {
            SessionError::Login(_) => Error::Authentication {
                account: account.to_string(),
                source,
            },
            source => Error::Connection {
                account: account.to_string(),
                source,
            },
        })?;
    debug!(account, "session opened");

    let outcome = op(&mut session).await;

    if let Err(e) = session.logout().await {
        debug!(account, error = %e, "logout failed");
    } else {
        debug!(account, "session closed");
    }
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_logs_out_after_success() {
        let server = MemoryServer::new();
        let value = scoped(&server, "test", async |session| {
            Ok(session.capabilities().len())
        })
        .await
        .unwrap();
        assert!(value > 0);
        assert_eq!(server.sessions_opened(), 1);
        assert_eq!(server.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn scoped_logs_out_after_failure() {
        let server = MemoryServer::new();
        let err = scoped(&server, "test", async |session| {
            session
                .select_folder("Missing", true)
                .await
                .map_err(Error::query("Missing"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::QueryFailed { .. }));
        assert_eq!(server.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn move_without_capability_copies_and_expunges() {
        let server = MemoryServer::new();
        server.set_capabilities(vec![Capability::Imap4Rev1, Capability::UidPlus]);
        server.add_folder("Archive");
        let kept = server.deliver("INBOX", StoredMessage::new("a@x.com", "stay"));
        let moved = server.deliver("INBOX", StoredMessage::new("b@x.com", "go"));

        let mut session = server.connect().await.unwrap();
        session.select_folder("INBOX", false).await.unwrap();
        move_or_copy(&mut session, &[moved].into(), "Archive")
            .await
            .unwrap();

        assert_eq!(server.messages("INBOX").into_keys().collect::<Vec<_>>(), [kept]);
        assert_eq!(server.messages("Archive").len(), 1);
        assert_eq!(
            server.commands()[1..],
            [
                "UID COPY 2 Archive",
                "UID STORE 2 +FLAGS.SILENT (\\Deleted)",
                "UID EXPUNGE 2",
            ]
        );
    }

    #[tokio::test]
    async fn refused_login_is_an_authentication_error() {
        let server = MemoryServer::new();
        server.reject_login();
        let err = scoped(&server, "work", async |_| Ok(())).await.unwrap_err();
        match err {
            Error::Authentication { account, .. } => assert_eq!(account, "work"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(server.sessions_opened(), 0);
    }
}
