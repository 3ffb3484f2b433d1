//! Sessions backed by a real IMAP server.

use std::collections::{BTreeMap, BTreeSet};

use mailsift_imap::connection::{connect_plain, connect_tls};
use mailsift_imap::{
    Authenticated, Capability, Client, FetchAttribute, FetchItem, Flag, ImapStream, ListResponse,
    MailboxStatus, NotAuthenticated, SearchKey, Selected, Uid, UidSet,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::{Connector, MailSession, SessionError, SessionResult};
use crate::config::{AccountConfig, Security, credentials, validate_account};
use crate::{Error, Result};

/// Connection settings for one account, with the password resolved.
#[derive(Clone)]
pub struct ImapConnector {
    host: String,
    port: u16,
    security: Security,
    username: String,
    password: String,
}

impl std::fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl ImapConnector {
    /// Builds a connector from an account's settings. A missing password is
    /// looked up in the system keyring.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing every validation problem, or if no
    /// password is configured or stored.
    pub fn from_config(name: &str, account: &AccountConfig) -> Result<Self> {
        if let Err(errors) = validate_account(account) {
            let problems: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(Error::Config(format!(
                "account {name}: {}",
                problems.join("; ")
            )));
        }

        let password = match &account.password {
            Some(password) => password.clone(),
            None => credentials::imap_password(name)
                .map_err(|e| Error::Config(format!("account {name}: {e}")))?
                .ok_or_else(|| {
                    Error::Config(format!(
                        "account {name}: no password configured or stored in the keyring"
                    ))
                })?,
        };

        Ok(Self {
            host: account.host.clone(),
            port: account.port(),
            security: account.security,
            username: account.username.clone(),
            password,
        })
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession<ImapStream>;

    async fn connect(&self) -> SessionResult<Self::Session> {
        let stream = match self.security {
            Security::Tls => connect_tls(&self.host, self.port).await?,
            Security::None => connect_plain(&self.host, self.port).await?,
            Security::StartTls => return Err(SessionError::UnsupportedSecurity(self.security)),
        };
        ImapSession::login(stream, &self.username, &self.password).await
    }
}

enum State<S> {
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
}

/// A [`MailSession`] over an IMAP client.
///
/// A failed SELECT consumes the underlying connection; every later call then
/// fails with [`SessionError::Closed`].
pub struct ImapSession<S> {
    state: Option<State<S>>,
}

impl<S> std::fmt::Debug for ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            Some(State::Authenticated(_)) => "authenticated",
            Some(State::Selected(client)) => client.mailbox(),
            None => "closed",
        };
        f.debug_struct("ImapSession").field("state", &state).finish()
    }
}

impl<S> ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the greeting on `stream` and logs in.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Login`] if the credentials are refused.
    pub async fn login(stream: S, username: &str, password: &str) -> SessionResult<Self> {
        let client: Client<S, NotAuthenticated> = Client::from_stream(stream).await?;
        let mut client = client
            .login(username, password)
            .await
            .map_err(|e| match e {
                mailsift_imap::Error::Auth(text) => SessionError::Login(text),
                other => SessionError::Imap(other),
            })?;
        if client.capabilities().is_empty() {
            client.capability().await?;
        }
        Ok(Self {
            state: Some(State::Authenticated(client)),
        })
    }

    fn selected(&mut self) -> SessionResult<&mut Client<S, Selected>> {
        match self.state.as_mut() {
            Some(State::Selected(client)) => Ok(client),
            Some(State::Authenticated(_)) => Err(SessionError::NoFolderSelected),
            None => Err(SessionError::Closed),
        }
    }

    fn state(&mut self) -> SessionResult<&mut State<S>> {
        self.state.as_mut().ok_or(SessionError::Closed)
    }
}

fn uid_set(uids: &BTreeSet<Uid>) -> Option<UidSet> {
    UidSet::from_uids(uids.iter().copied())
}

impl<S> MailSession for ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn capabilities(&self) -> &[Capability] {
        match &self.state {
            Some(State::Authenticated(client)) => client.capabilities(),
            Some(State::Selected(client)) => client.capabilities(),
            None => &[],
        }
    }

    async fn list_folders(&mut self) -> SessionResult<Vec<ListResponse>> {
        let folders = match self.state()? {
            State::Authenticated(client) => client.list("", "*").await?,
            State::Selected(client) => client.list("", "*").await?,
        };
        Ok(folders)
    }

    async fn select_folder(&mut self, name: &str, read_only: bool) -> SessionResult<MailboxStatus> {
        let client = match self.state.take().ok_or(SessionError::Closed)? {
            State::Authenticated(client) if read_only => client.examine(name).await?,
            State::Authenticated(client) => client.select(name).await?,
            State::Selected(client) if read_only => client.examine(name).await?,
            State::Selected(client) => client.select(name).await?,
        };
        let status = client.status().clone();
        debug!(folder = name, exists = status.exists, read_only, "folder selected");
        self.state = Some(State::Selected(client));
        Ok(status)
    }

    async fn search(&mut self, keys: &[SearchKey]) -> SessionResult<BTreeSet<Uid>> {
        let uids = self.selected()?.uid_search(keys).await?;
        Ok(uids.into_iter().collect())
    }

    async fn fetch(
        &mut self,
        uids: &BTreeSet<Uid>,
        attributes: &[FetchAttribute],
    ) -> SessionResult<BTreeMap<Uid, Vec<FetchItem>>> {
        let Some(set) = uid_set(uids) else {
            return Ok(BTreeMap::new());
        };
        let responses = self.selected()?.uid_fetch(&set, attributes).await?;

        let mut by_uid: BTreeMap<Uid, Vec<FetchItem>> = BTreeMap::new();
        for items in responses {
            let uid = items.iter().find_map(|item| match item {
                FetchItem::Uid(uid) => Some(*uid),
                _ => None,
            });
            // Unsolicited FETCH responses carry no UID.
            if let Some(uid) = uid {
                by_uid.entry(uid).or_default().extend(items);
            }
        }
        Ok(by_uid)
    }

    async fn move_messages(&mut self, uids: &BTreeSet<Uid>, folder: &str) -> SessionResult<()> {
        if let Some(set) = uid_set(uids) {
            self.selected()?.uid_move(&set, folder).await?;
        }
        Ok(())
    }

    async fn copy_messages(&mut self, uids: &BTreeSet<Uid>, folder: &str) -> SessionResult<()> {
        if let Some(set) = uid_set(uids) {
            self.selected()?.uid_copy(&set, folder).await?;
        }
        Ok(())
    }

    async fn delete_messages(&mut self, uids: &BTreeSet<Uid>) -> SessionResult<()> {
        if let Some(set) = uid_set(uids) {
            self.selected()?.uid_add_flags(&set, &[Flag::Deleted]).await?;
        }
        Ok(())
    }

    async fn expunge(&mut self, uids: &BTreeSet<Uid>) -> SessionResult<()> {
        let Some(set) = uid_set(uids) else {
            return Ok(());
        };
        let client = self.selected()?;
        if client.has_capability(&Capability::UidPlus) {
            client.uid_expunge(&set).await?;
        } else {
            client.expunge().await?;
        }
        Ok(())
    }

    async fn create_folder(&mut self, name: &str) -> SessionResult<()> {
        match self.state()? {
            State::Authenticated(client) => client.create(name).await?,
            State::Selected(client) => client.create(name).await?,
        }
        Ok(())
    }

    async fn rename_folder(&mut self, from: &str, to: &str) -> SessionResult<()> {
        match self.state()? {
            State::Authenticated(client) => client.rename(from, to).await?,
            State::Selected(client) => client.rename(from, to).await?,
        }
        Ok(())
    }

    async fn delete_folder(&mut self, name: &str) -> SessionResult<()> {
        match self.state()? {
            State::Authenticated(client) => client.delete(name).await?,
            State::Selected(client) => client.delete(name).await?,
        }
        Ok(())
    }

    async fn logout(self) -> SessionResult<()> {
        match self.state {
            Some(State::Authenticated(client)) => client.logout().await?,
            Some(State::Selected(client)) => client.logout().await?,
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn uids(values: &[u32]) -> BTreeSet<Uid> {
        values.iter().map(|&v| Uid::new(v).unwrap()).collect()
    }

    #[test]
    fn debug_hides_password() {
        let account: AccountConfig = toml::from_str(
            "host = \"imap.example.com\"\nusername = \"me\"\npassword = \"hunter2\"\n",
        )
        .unwrap();
        let connector = ImapConnector::from_config("home", &account).unwrap();
        let debug = format!("{connector:?}");
        assert!(debug.contains("imap.example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn invalid_account_lists_every_problem() {
        let account: AccountConfig =
            toml::from_str("host = \"\"\nusername = \"\"\npassword = \"x\"\n").unwrap();
        let err = ImapConnector::from_config("home", &account).unwrap_err();
        let message = err.to_string();
        assert!(err.is_configuration());
        assert!(message.contains("host"), "{message}");
        assert!(message.contains("username"), "{message}");
    }

    #[tokio::test]
    async fn starttls_is_refused_before_connecting() {
        let account: AccountConfig = toml::from_str(
            "host = \"imap.example.com\"\nusername = \"me\"\npassword = \"x\"\nsecurity = \"starttls\"\n",
        )
        .unwrap();
        let connector = ImapConnector::from_config("home", &account).unwrap();
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnsupportedSecurity(Security::StartTls)
        ));
    }

    #[tokio::test]
    async fn rejected_login_maps_to_login_error() {
        let stream = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN me wrong\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] bad credentials\r\n")
            .build();
        let err = ImapSession::login(stream, "me", "wrong").await.unwrap_err();
        assert!(matches!(err, SessionError::Login(_)));
    }

    #[tokio::test]
    async fn search_fetch_and_expunge_with_uidplus() {
        let stream = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 UIDPLUS] ready\r\n")
            .write(b"A0001 LOGIN me secret\r\n")
            .read(b"A0001 OK logged in\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\n* OK [UIDVALIDITY 7] ok\r\nA0002 OK [READ-WRITE] done\r\n")
            .write(b"A0003 UID SEARCH UNANSWERED\r\n")
            .read(b"* SEARCH 4 9\r\nA0003 OK done\r\n")
            .write(b"A0004 UID FETCH 4,9 (RFC822.SIZE)\r\n")
            .read(b"* 1 FETCH (UID 4 RFC822.SIZE 100)\r\n")
            .read(b"* 2 FETCH (FLAGS (\\Seen))\r\n")
            .read(b"* 3 FETCH (RFC822.SIZE 250 UID 9)\r\nA0004 OK done\r\n")
            .write(b"A0005 UID STORE 4 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 UID EXPUNGE 4\r\n")
            .read(b"* 1 EXPUNGE\r\nA0006 OK done\r\n")
            .write(b"A0007 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0007 OK done\r\n")
            .build();

        let mut session = ImapSession::login(stream, "me", "secret").await.unwrap();
        let status = session.select_folder("INBOX", false).await.unwrap();
        assert_eq!(status.exists, 3);
        assert_eq!(status.uid_validity, Some(7));

        let found = session.search(&[SearchKey::Unanswered]).await.unwrap();
        assert_eq!(found, uids(&[4, 9]));

        let fetched = session
            .fetch(&found, &[FetchAttribute::Rfc822Size])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched[&Uid::new(9).unwrap()].contains(&FetchItem::Rfc822Size(250)));

        session.delete_messages(&uids(&[4])).await.unwrap();
        session.expunge(&uids(&[4])).await.unwrap();
        session.logout().await.unwrap();
    }

    #[tokio::test]
    async fn select_with_flags_and_permanentflags() {
        let stream = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN me secret\r\n")
            .read(b"A0001 OK logged in\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft $Junk)\r\n")
            .read(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n")
            .read(b"* 18 EXISTS\r\n* 2 RECENT\r\n")
            .read(b"* OK [UNSEEN 17] Message 17 is the first unseen message\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"* OK [UIDNEXT 4392] Predicted next UID\r\n")
            .read(b"A0002 OK [READ-WRITE] SELECT completed\r\n")
            .write(b"A0003 UID SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 4390 4391\r\nA0003 OK done\r\n")
            .build();

        let mut session = ImapSession::login(stream, "me", "secret").await.unwrap();
        let status = session.select_folder("INBOX", false).await.unwrap();
        assert_eq!(status.exists, 18);
        assert_eq!(status.uid_validity, Some(3_857_529_045));
        assert_eq!(status.uid_next, Some(4392));
        assert!(!status.read_only);
        assert!(format!("{session:?}").contains("INBOX"));

        let found = session.search(&[SearchKey::Unseen]).await.unwrap();
        assert_eq!(found, uids(&[4390, 4391]));
    }

    #[tokio::test]
    async fn listing_real_folders() {
        let stream = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN me secret\r\n")
            .read(b"A0001 OK logged in\r\n")
            .write(b"A0002 LIST \"\" *\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
            .read(b"* LIST (\\HasChildren \\Noselect) \"/\" \"[Gmail]\"\r\n")
            .read(b"* LIST (\\HasNoChildren \\Junk) \"/\" \"[Gmail]/Spam\"\r\n")
            .read(b"A0002 OK LIST completed\r\n")
            .build();

        let mut session = ImapSession::login(stream, "me", "secret").await.unwrap();
        let folders = session.list_folders().await.unwrap();
        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["INBOX", "[Gmail]", "[Gmail]/Spam"]);
        assert!(!folders[1].is_selectable());
    }

    #[tokio::test]
    async fn message_operations_need_a_selected_folder() {
        let stream = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN me secret\r\n")
            .read(b"A0001 OK logged in\r\n")
            .build();
        let mut session = ImapSession::login(stream, "me", "secret").await.unwrap();
        let err = session.search(&[SearchKey::All]).await.unwrap_err();
        assert!(matches!(err, SessionError::NoFolderSelected));
    }

    #[tokio::test]
    async fn failed_select_closes_the_session() {
        let stream = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN me secret\r\n")
            .read(b"A0001 OK logged in\r\n")
            .write(b"A0002 EXAMINE Nope\r\n")
            .read(b"A0002 NO no such mailbox\r\n")
            .build();
        let mut session = ImapSession::login(stream, "me", "secret").await.unwrap();
        assert!(session.select_folder("Nope", true).await.is_err());
        let err = session.list_folders().await.unwrap_err();
        assert!(matches!(err, SessionError::Closed));
        assert!(session.capabilities().is_empty());
    }

    #[tokio::test]
    async fn empty_uid_sets_send_nothing() {
        let stream = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN me secret\r\n")
            .read(b"A0001 OK logged in\r\n")
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"A0002 OK [READ-ONLY] done\r\n")
            .build();
        let mut session = ImapSession::login(stream, "me", "secret").await.unwrap();
        session.select_folder("INBOX", true).await.unwrap();
        let empty = BTreeSet::new();
        assert!(session
            .fetch(&empty, &[FetchAttribute::Flags])
            .await
            .unwrap()
            .is_empty());
        session.move_messages(&empty, "Junk").await.unwrap();
        session.delete_messages(&empty).await.unwrap();
        session.expunge(&empty).await.unwrap();
    }
}
