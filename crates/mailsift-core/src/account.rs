//! The per-account facade used by the CLI.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use mailsift_imap::{Capability, FetchAttribute, FetchItem, ListResponse, Uid};
use tracing::{debug, info};

use crate::config::Config;
use crate::message::{MessageSummary, SUMMARY_ATTRIBUTES};
use crate::rules::{PACING_DELAY, RuleReport, load_rules, run_rules_with_folders};
use crate::search::{MergeMode, SearchSpec, resolve};
use crate::session::{Connector, ImapConnector, MailSession, move_or_copy, scoped};
use crate::{Error, Result};

/// Folder selector meaning every selectable folder.
pub const ALL_FOLDERS: &str = "*";

/// One configured mail account.
///
/// Every operation opens its own session and logs out when done.
/// Capabilities and the folder list are fetched on first use and cached;
/// creating, renaming or deleting a folder drops the cached list.
#[derive(Debug)]
pub struct Account<C> {
    name: String,
    inbox: String,
    rule_files: Vec<PathBuf>,
    connector: C,
    capabilities: Option<Vec<Capability>>,
    folders: Option<Vec<ListResponse>>,
}

impl Account<ImapConnector> {
    /// Builds the account `name` from the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the account is unknown, invalid or
    /// has no password.
    pub fn from_config(config: &Config, name: &str) -> Result<Self> {
        let settings = config.account(name)?;
        let connector = ImapConnector::from_config(name, settings)?;
        Ok(Self::new(name, connector)
            .with_inbox(&settings.inbox)
            .with_rule_files(settings.rule_files()))
    }
}

impl<C: Connector> Account<C> {
    /// An account using `connector`, with `INBOX` and no rules.
    pub fn new(name: &str, connector: C) -> Self {
        Self {
            name: name.to_string(),
            inbox: "INBOX".to_string(),
            rule_files: Vec::new(),
            connector,
            capabilities: None,
            folders: None,
        }
    }

    /// Sets the folder rules run against.
    #[must_use]
    pub fn with_inbox(mut self, inbox: &str) -> Self {
        self.inbox = inbox.to_string();
        self
    }

    /// Sets the rule files.
    #[must_use]
    pub fn with_rule_files(mut self, rule_files: Vec<PathBuf>) -> Self {
        self.rule_files = rule_files;
        self
    }

    /// Account name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Folder rules run against.
    #[must_use]
    pub fn inbox(&self) -> &str {
        &self.inbox
    }

    /// Server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened.
    pub async fn capabilities(&mut self) -> Result<&[Capability]> {
        if self.capabilities.is_none() {
            let capabilities = scoped(&self.connector, &self.name, async |session| {
                Ok(session.capabilities().to_vec())
            })
            .await?;
            debug!(account = %self.name, count = capabilities.len(), "capabilities cached");
            self.capabilities = Some(capabilities);
        }
        Ok(self.capabilities.as_deref().unwrap_or_default())
    }

    /// Whether the server advertises `name`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened.
    pub async fn has_capability(&mut self, name: &str) -> Result<bool> {
        Ok(self.capabilities().await?.iter().any(|c| c.is(name)))
    }

    /// Whether the server moves messages natively.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened.
    pub async fn move_supported(&mut self) -> Result<bool> {
        Ok(self.capabilities().await?.contains(&Capability::Move))
    }

    /// Every folder on the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueryFailed`] if the listing fails.
    pub async fn folders(&mut self) -> Result<&[ListResponse]> {
        if self.folders.is_none() {
            let folders = scoped(&self.connector, &self.name, async |session| {
                session.list_folders().await.map_err(Error::query("*"))
            })
            .await?;
            debug!(account = %self.name, count = folders.len(), "folder list cached");
            self.folders = Some(folders);
        }
        Ok(self.folders.as_deref().unwrap_or_default())
    }

    /// Expands a folder selector: [`ALL_FOLDERS`] becomes every selectable
    /// folder, anything else names one folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueryFailed`] if the listing fails.
    pub async fn resolve_folders(&mut self, selector: &str) -> Result<Vec<String>> {
        if selector != ALL_FOLDERS {
            return Ok(vec![selector.to_string()]);
        }
        Ok(self
            .folders()
            .await?
            .iter()
            .filter(|f| f.is_selectable())
            .map(|f| f.name.clone())
            .collect())
    }

    /// Creates a folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MutationFailed`] if the server refuses.
    pub async fn create_folder(&mut self, name: &str) -> Result<()> {
        self.folders = None;
        scoped(&self.connector, &self.name, async |session| {
            session
                .create_folder(name)
                .await
                .map_err(Error::mutation(format!("create {name}")))
        })
        .await?;
        info!(account = %self.name, folder = name, "created folder");
        Ok(())
    }

    /// Renames a folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MutationFailed`] if the server refuses.
    pub async fn rename_folder(&mut self, from: &str, to: &str) -> Result<()> {
        self.folders = None;
        scoped(&self.connector, &self.name, async |session| {
            session
                .rename_folder(from, to)
                .await
                .map_err(Error::mutation(format!("rename {from} to {to}")))
        })
        .await?;
        info!(account = %self.name, from, to, "renamed folder");
        Ok(())
    }

    /// Deletes a folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MutationFailed`] if the server refuses.
    pub async fn delete_folder(&mut self, name: &str) -> Result<()> {
        self.folders = None;
        scoped(&self.connector, &self.name, async |session| {
            session
                .delete_folder(name)
                .await
                .map_err(Error::mutation(format!("delete folder {name}")))
        })
        .await?;
        info!(account = %self.name, folder = name, "deleted folder");
        Ok(())
    }

    /// UIDs in `folder` matching `spec`.
    ///
    /// # Errors
    ///
    /// See [`resolve`].
    pub async fn search(
        &self,
        folder: &str,
        spec: &SearchSpec,
        mode: MergeMode,
    ) -> Result<BTreeSet<Uid>> {
        scoped(&self.connector, &self.name, async |session| {
            resolve(session, folder, spec, mode).await
        })
        .await
    }

    /// Summaries of the messages in `folder` matching `spec`, by UID.
    ///
    /// # Errors
    ///
    /// See [`resolve`]; fetch failures are [`Error::QueryFailed`].
    pub async fn summaries(
        &self,
        folder: &str,
        spec: &SearchSpec,
        mode: MergeMode,
    ) -> Result<Vec<MessageSummary>> {
        scoped(&self.connector, &self.name, async |session| {
            let uids = resolve(session, folder, spec, mode).await?;
            let fetched = session
                .fetch(&uids, &SUMMARY_ATTRIBUTES)
                .await
                .map_err(Error::query(folder))?;
            Ok(fetched
                .iter()
                .map(|(uid, items)| MessageSummary::from_items(*uid, items))
                .collect())
        })
        .await
    }

    /// Sender addresses of the matching messages with their message counts,
    /// least frequent first.
    ///
    /// # Errors
    ///
    /// See [`Account::summaries`].
    pub async fn unique_senders(
        &self,
        folder: &str,
        spec: &SearchSpec,
        mode: MergeMode,
    ) -> Result<Vec<(String, usize)>> {
        let fetched = scoped(&self.connector, &self.name, async |session| {
            let uids = resolve(session, folder, spec, mode).await?;
            session
                .fetch(&uids, &[FetchAttribute::Envelope])
                .await
                .map_err(Error::query(folder))
        })
        .await?;

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for items in fetched.values() {
            let sender = items.iter().find_map(|item| match item {
                FetchItem::Envelope(envelope) => envelope.from.first().and_then(|a| a.email()),
                _ => None,
            });
            if let Some(sender) = sender {
                *counts.entry(sender.to_lowercase()).or_default() += 1;
            }
        }
        let mut senders: Vec<(String, usize)> = counts.into_iter().collect();
        senders.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(senders)
    }

    /// Moves messages from `folder` to `destination`, emulating MOVE when
    /// the server lacks it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MutationFailed`] if any step fails.
    pub async fn move_messages(
        &self,
        folder: &str,
        uids: &BTreeSet<Uid>,
        destination: &str,
    ) -> Result<()> {
        scoped(&self.connector, &self.name, async |session| {
            session
                .select_folder(folder, false)
                .await
                .map_err(Error::query(folder))?;
            move_or_copy(session, uids, destination)
                .await
                .map_err(Error::mutation(format!("move to {destination}")))
        })
        .await?;
        info!(account = %self.name, count = uids.len(), from = folder, to = destination, "moved messages");
        tokio::time::sleep(PACING_DELAY).await;
        Ok(())
    }

    /// Deletes and expunges messages in `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MutationFailed`] if any step fails.
    pub async fn delete_messages(&self, folder: &str, uids: &BTreeSet<Uid>) -> Result<()> {
        scoped(&self.connector, &self.name, async |session| {
            session
                .select_folder(folder, false)
                .await
                .map_err(Error::query(folder))?;
            session
                .delete_messages(uids)
                .await
                .map_err(Error::mutation("delete"))?;
            session
                .expunge(uids)
                .await
                .map_err(Error::mutation("expunge"))
        })
        .await?;
        info!(account = %self.name, count = uids.len(), folder, "deleted messages");
        tokio::time::sleep(PACING_DELAY).await;
        Ok(())
    }

    /// Runs the account's rule files against its inbox.
    ///
    /// Rule files are read before connecting; with no rules nothing is
    /// contacted. Move destinations are checked against [`Account::folders`],
    /// and the cached list is dropped once a rule creates a folder.
    ///
    /// # Errors
    ///
    /// Returns configuration errors for unreadable or invalid rule files and
    /// the first failing rule's error.
    pub async fn process_rules(&mut self, dry_run: bool) -> Result<Vec<RuleReport>> {
        let rules = load_rules(&self.rule_files)?;
        if rules.is_empty() {
            info!(account = %self.name, "no rules configured");
            return Ok(Vec::new());
        }
        info!(account = %self.name, rules = rules.len(), dry_run, "processing rules");
        let known: BTreeSet<String> = self.folders().await?.iter().map(|f| f.name.clone()).collect();
        let outcome = scoped(&self.connector, &self.name, async |session| {
            run_rules_with_folders(session, &self.inbox, &known, &rules, dry_run).await
        })
        .await;

        // A failed run may have created folders before stopping.
        let stale = match &outcome {
            Ok(reports) => reports.iter().any(RuleReport::created_folder),
            Err(_) => !dry_run,
        };
        if stale {
            self.folders = None;
        }
        outcome
    }
}
