//! An in-memory mail server.
//!
//! [`MemoryServer`] implements [`Connector`] over mailboxes held in memory,
//! with the same observable behavior as an IMAP server for the operations the
//! core uses. Every request is recorded in IMAP syntax (without the tag) so
//! callers can assert on what would have been sent.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use mailsift_imap::{
    Address, BodyStructure, Capability, Command, Disposition, Envelope, FetchAttribute,
    FetchItem, Flag, ListResponse, MailboxAttribute, MailboxStatus, SearchKey, Uid, UidSet,
};

use super::{Connector, MailSession, SessionError, SessionResult};

/// A message stored by [`MemoryServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    from: String,
    from_name: Option<String>,
    to: String,
    subject: String,
    date: NaiveDate,
    flags: Vec<Flag>,
    attachments: Vec<(String, u64)>,
    size: u64,
}

impl StoredMessage {
    /// A message from `from` with the given subject, dated 2024-01-01.
    #[must_use]
    pub fn new(from: &str, subject: &str) -> Self {
        Self {
            from: from.to_string(),
            from_name: None,
            to: "me@example.com".to_string(),
            subject: subject.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            flags: Vec::new(),
            attachments: Vec::new(),
            size: 1024,
        }
    }

    /// Sets the sender's display name.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.from_name = Some(name.to_string());
        self
    }

    /// Sets the recipient.
    #[must_use]
    pub fn to(mut self, address: &str) -> Self {
        self.to = address.to_string();
        self
    }

    /// Sets the internal date.
    #[must_use]
    pub const fn dated(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Adds a flag.
    #[must_use]
    pub fn flagged(mut self, flag: Flag) -> Self {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self
    }

    /// Marks the message seen.
    #[must_use]
    pub fn seen(self) -> Self {
        self.flagged(Flag::Seen)
    }

    /// Marks the message answered.
    #[must_use]
    pub fn answered(self) -> Self {
        self.flagged(Flag::Answered)
    }

    /// Adds an attachment part.
    #[must_use]
    pub fn attachment(mut self, filename: &str, size: u64) -> Self {
        self.attachments.push((filename.to_string(), size));
        self.size += size;
        self
    }

    /// Sender address.
    #[must_use]
    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Current flags.
    #[must_use]
    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    fn has_flag(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    fn from_header(&self) -> String {
        match &self.from_name {
            Some(name) => format!("{name} <{}>", self.from),
            None => self.from.clone(),
        }
    }

    fn matches(&self, key: &SearchKey) -> bool {
        match key {
            SearchKey::All => true,
            SearchKey::Unseen => !self.has_flag(&Flag::Seen),
            SearchKey::Unanswered => !self.has_flag(&Flag::Answered),
            SearchKey::From(text) => contains_ignore_case(&self.from_header(), text),
            SearchKey::To(text) => contains_ignore_case(&self.to, text),
            SearchKey::Subject(text) => contains_ignore_case(&self.subject, text),
            SearchKey::Since(date) => self.date >= *date,
            SearchKey::Before(date) => self.date < *date,
            SearchKey::Not(inner) => !self.matches(inner),
        }
    }

    fn item(&self, attribute: FetchAttribute) -> Option<FetchItem> {
        let item = match attribute {
            FetchAttribute::Uid => return None,
            FetchAttribute::Flags => FetchItem::Flags(self.flags.clone()),
            FetchAttribute::Envelope => FetchItem::Envelope(Box::new(self.envelope())),
            FetchAttribute::BodyStructure => FetchItem::BodyStructure(self.body_structure()),
            FetchAttribute::Rfc822Size => FetchItem::Rfc822Size(self.size),
            FetchAttribute::InternalDate => FetchItem::InternalDate(
                self.date.format("%d-%b-%Y 00:00:00 +0000").to_string(),
            ),
        };
        Some(item)
    }

    fn envelope(&self) -> Envelope {
        let mut from = address(&self.from);
        from.name.clone_from(&self.from_name);
        Envelope {
            date: Some(self.date.format("%a, %-d %b %Y 00:00:00 +0000").to_string()),
            subject: Some(self.subject.clone()),
            from: vec![from.clone()],
            sender: vec![from.clone()],
            reply_to: vec![from],
            to: vec![address(&self.to)],
            ..Envelope::default()
        }
    }

    fn body_structure(&self) -> BodyStructure {
        let text = BodyStructure::Single {
            media_type: "TEXT".to_string(),
            media_subtype: "PLAIN".to_string(),
            params: vec![("CHARSET".to_string(), "UTF-8".to_string())],
            size: 512,
            disposition: None,
        };
        if self.attachments.is_empty() {
            return text;
        }
        let mut parts = vec![text];
        parts.extend(self.attachments.iter().map(|(filename, size)| {
            let (media_type, media_subtype) = media_type_for(filename);
            BodyStructure::Single {
                media_type: media_type.to_string(),
                media_subtype: media_subtype.to_string(),
                params: vec![("NAME".to_string(), filename.clone())],
                size: *size,
                disposition: Some(Disposition {
                    kind: "attachment".to_string(),
                    params: vec![("FILENAME".to_string(), filename.clone())],
                }),
            }
        }));
        BodyStructure::Multipart {
            subtype: "MIXED".to_string(),
            parts,
            disposition: None,
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn address(email: &str) -> Address {
    let (mailbox, host) = match email.rsplit_once('@') {
        Some((mailbox, host)) => (mailbox.to_string(), Some(host.to_string())),
        None => (email.to_string(), None),
    };
    Address {
        name: None,
        mailbox: Some(mailbox),
        host,
    }
}

fn media_type_for(filename: &str) -> (&'static str, &'static str) {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => ("APPLICATION", "PDF"),
        "png" => ("IMAGE", "PNG"),
        "jpg" | "jpeg" => ("IMAGE", "JPEG"),
        "zip" => ("APPLICATION", "ZIP"),
        _ => ("APPLICATION", "OCTET-STREAM"),
    }
}

#[derive(Debug, Default)]
struct Mailbox {
    next_uid: u32,
    messages: BTreeMap<Uid, StoredMessage>,
}

impl Mailbox {
    fn append(&mut self, message: StoredMessage) -> Uid {
        self.next_uid = self.next_uid.max(1);
        let uid = Uid::new(self.next_uid).unwrap_or(Uid::MIN);
        self.next_uid += 1;
        self.messages.insert(uid, message);
        uid
    }
}

#[derive(Debug)]
struct ServerState {
    folders: BTreeMap<String, Mailbox>,
    capabilities: Vec<Capability>,
    log: Vec<String>,
    failing: Option<String>,
    reject_login: bool,
    opened: usize,
    closed: usize,
}

/// Shared in-memory server. Clones refer to the same mailboxes.
#[derive(Debug, Clone)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    /// A server with an empty INBOX advertising MOVE and UIDPLUS.
    #[must_use]
    pub fn new() -> Self {
        let mut folders = BTreeMap::new();
        folders.insert("INBOX".to_string(), Mailbox::default());
        Self {
            state: Arc::new(Mutex::new(ServerState {
                folders,
                capabilities: vec![Capability::Imap4Rev1, Capability::Move, Capability::UidPlus],
                log: Vec::new(),
                failing: None,
                reject_login: false,
                opened: 0,
                closed: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the advertised capabilities.
    pub fn set_capabilities(&self, capabilities: Vec<Capability>) {
        self.lock().capabilities = capabilities;
    }

    /// Creates an empty folder if it does not exist.
    pub fn add_folder(&self, name: &str) {
        self.lock().folders.entry(name.to_string()).or_default();
    }

    /// Appends a message to a folder, creating the folder if needed.
    pub fn deliver(&self, folder: &str, message: StoredMessage) -> Uid {
        self.lock()
            .folders
            .entry(folder.to_string())
            .or_default()
            .append(message)
    }

    /// Folder names, sorted.
    #[must_use]
    pub fn folder_names(&self) -> Vec<String> {
        self.lock().folders.keys().cloned().collect()
    }

    /// Messages in a folder, by UID. Empty if the folder is missing.
    #[must_use]
    pub fn messages(&self, folder: &str) -> BTreeMap<Uid, StoredMessage> {
        self.lock()
            .folders
            .get(folder)
            .map(|mailbox| mailbox.messages.clone())
            .unwrap_or_default()
    }

    /// Requests received so far, in IMAP syntax without tags.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// Forgets recorded requests.
    pub fn clear_commands(&self) {
        self.lock().log.clear();
    }

    /// Makes every later command with this name (e.g. `UID SEARCH`) fail.
    pub fn fail_on(&self, command: &str) {
        self.lock().failing = Some(command.to_string());
    }

    /// Makes every later login fail.
    pub fn reject_login(&self) {
        self.lock().reject_login = true;
    }

    /// Sessions successfully opened.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.lock().opened
    }

    /// Sessions logged out.
    #[must_use]
    pub fn sessions_closed(&self) -> usize {
        self.lock().closed
    }
}

impl Connector for MemoryServer {
    type Session = MemorySession;

    async fn connect(&self) -> SessionResult<MemorySession> {
        let mut state = self.lock();
        if state.reject_login {
            return Err(SessionError::Login("invalid credentials".to_string()));
        }
        state.opened += 1;
        Ok(MemorySession {
            server: self.clone(),
            capabilities: state.capabilities.clone(),
            selected: None,
        })
    }
}

/// A session on a [`MemoryServer`].
#[derive(Debug)]
pub struct MemorySession {
    server: MemoryServer,
    capabilities: Vec<Capability>,
    selected: Option<(String, bool)>,
}

impl MemorySession {
    /// Records `command` and returns the server state, or fails if the
    /// command was set to fail.
    fn request(&self, command: &Command) -> SessionResult<MutexGuard<'_, ServerState>> {
        let mut state = self.server.lock();
        let wire = command.serialize("*", true).to_bytes();
        let text = String::from_utf8_lossy(&wire).into_owned();
        let text = text.strip_prefix("* ").unwrap_or(text.as_str()).trim_end().to_string();
        state.log.push(text);
        if state.failing.as_deref() == Some(command.name()) {
            return Err(SessionError::Rejected(format!("{} failed", command.name())));
        }
        Ok(state)
    }

    fn selected(&self) -> SessionResult<(&str, bool)> {
        self.selected
            .as_ref()
            .map(|(name, read_only)| (name.as_str(), *read_only))
            .ok_or(SessionError::NoFolderSelected)
    }

    fn writable(&self) -> SessionResult<&str> {
        match self.selected()? {
            (_, true) => Err(SessionError::Rejected("mailbox is read-only".to_string())),
            (name, false) => Ok(name),
        }
    }

    fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    fn transfer(
        &self,
        command: &Command,
        uids: &BTreeSet<Uid>,
        folder: &str,
        remove: bool,
    ) -> SessionResult<()> {
        let source = if remove {
            self.writable()?
        } else {
            self.selected()?.0
        };
        let mut state = self.request(command)?;
        if !state.folders.contains_key(folder) {
            return Err(SessionError::Rejected(format!(
                "[TRYCREATE] no such mailbox {folder}"
            )));
        }
        let taken: Vec<StoredMessage> = {
            let Some(mailbox) = state.folders.get_mut(source) else {
                return Err(SessionError::Closed);
            };
            if remove {
                uids.iter()
                    .filter_map(|uid| mailbox.messages.remove(uid))
                    .collect()
            } else {
                uids.iter()
                    .filter_map(|uid| mailbox.messages.get(uid).cloned())
                    .collect()
            }
        };
        if let Some(target) = state.folders.get_mut(folder) {
            for message in taken {
                target.append(message);
            }
        }
        Ok(())
    }
}

impl MailSession for MemorySession {
    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn list_folders(&mut self) -> SessionResult<Vec<ListResponse>> {
        let state = self.request(&Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        })?;
        Ok(state
            .folders
            .keys()
            .map(|name| ListResponse {
                attributes: vec![MailboxAttribute::HasNoChildren],
                delimiter: Some('/'),
                name: name.clone(),
            })
            .collect())
    }

    async fn select_folder(&mut self, name: &str, read_only: bool) -> SessionResult<MailboxStatus> {
        let mailbox = name.to_string();
        let command = if read_only {
            Command::Examine { mailbox }
        } else {
            Command::Select { mailbox }
        };
        let status = {
            let state = self.request(&command)?;
            let Some(folder) = state.folders.get(name) else {
                return Err(SessionError::Rejected(format!("no such mailbox {name}")));
            };
            MailboxStatus {
                exists: u32::try_from(folder.messages.len()).unwrap_or(u32::MAX),
                uid_validity: Some(1),
                uid_next: Some(folder.next_uid.max(1)),
                read_only,
            }
        };
        self.selected = Some((name.to_string(), read_only));
        Ok(status)
    }

    async fn search(&mut self, keys: &[SearchKey]) -> SessionResult<BTreeSet<Uid>> {
        let (folder, _) = self.selected()?;
        let state = self.request(&Command::UidSearch {
            keys: keys.to_vec(),
        })?;
        let Some(mailbox) = state.folders.get(folder) else {
            return Err(SessionError::Closed);
        };
        Ok(mailbox
            .messages
            .iter()
            .filter(|(_, message)| keys.iter().all(|key| message.matches(key)))
            .map(|(uid, _)| *uid)
            .collect())
    }

    async fn fetch(
        &mut self,
        uids: &BTreeSet<Uid>,
        attributes: &[FetchAttribute],
    ) -> SessionResult<BTreeMap<Uid, Vec<FetchItem>>> {
        let (folder, _) = self.selected()?;
        let Some(set) = UidSet::from_uids(uids.iter().copied()) else {
            return Ok(BTreeMap::new());
        };
        let state = self.request(&Command::UidFetch {
            uids: set,
            attributes: attributes.to_vec(),
        })?;
        let Some(mailbox) = state.folders.get(folder) else {
            return Err(SessionError::Closed);
        };
        Ok(uids
            .iter()
            .filter_map(|uid| {
                let message = mailbox.messages.get(uid)?;
                let mut items = vec![FetchItem::Uid(*uid)];
                items.extend(attributes.iter().filter_map(|&a| message.item(a)));
                Some((*uid, items))
            })
            .collect())
    }

    async fn move_messages(&mut self, uids: &BTreeSet<Uid>, folder: &str) -> SessionResult<()> {
        let Some(set) = UidSet::from_uids(uids.iter().copied()) else {
            return Ok(());
        };
        if !self.has_capability(&Capability::Move) {
            return Err(mailsift_imap::Error::Protocol(
                "server does not support MOVE".to_string(),
            )
            .into());
        }
        let command = Command::UidMove {
            uids: set,
            mailbox: folder.to_string(),
        };
        self.transfer(&command, uids, folder, true)
    }

    async fn copy_messages(&mut self, uids: &BTreeSet<Uid>, folder: &str) -> SessionResult<()> {
        let Some(set) = UidSet::from_uids(uids.iter().copied()) else {
            return Ok(());
        };
        let command = Command::UidCopy {
            uids: set,
            mailbox: folder.to_string(),
        };
        self.transfer(&command, uids, folder, false)
    }

    async fn delete_messages(&mut self, uids: &BTreeSet<Uid>) -> SessionResult<()> {
        let Some(set) = UidSet::from_uids(uids.iter().copied()) else {
            return Ok(());
        };
        let folder = self.writable()?;
        let mut state = self.request(&Command::UidAddFlags {
            uids: set,
            flags: vec![Flag::Deleted],
        })?;
        if let Some(mailbox) = state.folders.get_mut(folder) {
            for uid in uids {
                if let Some(message) = mailbox.messages.get_mut(uid)
                    && !message.has_flag(&Flag::Deleted)
                {
                    message.flags.push(Flag::Deleted);
                }
            }
        }
        Ok(())
    }

    async fn expunge(&mut self, uids: &BTreeSet<Uid>) -> SessionResult<()> {
        let Some(set) = UidSet::from_uids(uids.iter().copied()) else {
            return Ok(());
        };
        let folder = self.writable()?;
        let scoped = self.has_capability(&Capability::UidPlus);
        let command = if scoped {
            Command::UidExpunge { uids: set }
        } else {
            Command::Expunge
        };
        let mut state = self.request(&command)?;
        if let Some(mailbox) = state.folders.get_mut(folder) {
            mailbox.messages.retain(|uid, message| {
                !(message.has_flag(&Flag::Deleted) && (!scoped || uids.contains(uid)))
            });
        }
        Ok(())
    }

    async fn create_folder(&mut self, name: &str) -> SessionResult<()> {
        let mut state = self.request(&Command::Create {
            mailbox: name.to_string(),
        })?;
        if state.folders.contains_key(name) {
            return Err(SessionError::Rejected(format!("mailbox {name} already exists")));
        }
        state.folders.insert(name.to_string(), Mailbox::default());
        Ok(())
    }

    async fn rename_folder(&mut self, from: &str, to: &str) -> SessionResult<()> {
        let mut state = self.request(&Command::Rename {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        if state.folders.contains_key(to) {
            return Err(SessionError::Rejected(format!("mailbox {to} already exists")));
        }
        let Some(mailbox) = state.folders.remove(from) else {
            return Err(SessionError::Rejected(format!("no such mailbox {from}")));
        };
        state.folders.insert(to.to_string(), mailbox);
        Ok(())
    }

    async fn delete_folder(&mut self, name: &str) -> SessionResult<()> {
        let mut state = self.request(&Command::Delete {
            mailbox: name.to_string(),
        })?;
        if name.eq_ignore_ascii_case("INBOX") || state.folders.remove(name).is_none() {
            return Err(SessionError::Rejected(format!("cannot delete {name}")));
        }
        Ok(())
    }

    async fn logout(self) -> SessionResult<()> {
        let mut state = self.request(&Command::Logout)?;
        state.closed += 1;
        Ok(())
    }
}
