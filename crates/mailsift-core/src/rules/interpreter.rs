//! Applies rules to an inbox.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use mailsift_imap::Uid;
use tracing::info;

use super::{Action, Rule};
use crate::search::resolve;
use crate::session::{MailSession, move_or_copy};
use crate::{Error, Result};

/// Pause after every destructive request, to stay under server rate limits.
pub const PACING_DELAY: Duration = Duration::from_secs(2);

/// What happened to one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing matched.
    Skipped,
    /// The actions ran (or would have, in a dry run).
    Acted(Vec<ActionReport>),
}

/// One executed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    /// The action.
    pub action: Action,
    /// Messages it applied to.
    pub count: usize,
    /// Whether the destination folder was (or would be) created first.
    pub created_folder: bool,
    /// Whether the action was only reported.
    pub dry_run: bool,
}

impl fmt::Display for ActionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = if self.count == 1 { "message" } else { "messages" };
        let (verb, target) = match (&self.action, self.dry_run) {
            (Action::Move(folder), true) => ("would move", Some(folder)),
            (Action::Move(folder), false) => ("moved", Some(folder)),
            (Action::Delete, true) => ("would delete", None),
            (Action::Delete, false) => ("deleted", None),
        };
        write!(f, "{verb} {} {messages}", self.count)?;
        if let Some(folder) = target {
            write!(f, " to {folder}")?;
            if self.created_folder {
                let created = if self.dry_run { "would create" } else { "created" };
                write!(f, " ({created} {folder})")?;
            }
        }
        Ok(())
    }
}

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    /// Rule name.
    pub rule: String,
    /// Messages the rule matched.
    pub matched: usize,
    /// What was done.
    pub outcome: Outcome,
}

impl RuleReport {
    /// Whether a folder was actually created while acting on this rule.
    #[must_use]
    pub fn created_folder(&self) -> bool {
        match &self.outcome {
            Outcome::Skipped => false,
            Outcome::Acted(actions) => actions.iter().any(|a| a.created_folder && !a.dry_run),
        }
    }
}

impl fmt::Display for RuleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Skipped => write!(f, "{}: no matches", self.rule),
            Outcome::Acted(actions) => {
                write!(f, "{}:", self.rule)?;
                for (i, action) in actions.iter().enumerate() {
                    let separator = if i == 0 { " " } else { ", " };
                    write!(f, "{separator}{action}")?;
                }
                Ok(())
            }
        }
    }
}

/// Runs `rules` in order against `inbox`.
///
/// Each rule is resolved on its own; actions of a rule all apply to the set
/// it matched, moves before deletes. With `dry_run` nothing is created, moved
/// or deleted, but the reports are the same.
///
/// # Errors
///
/// Stops at the first failing rule and returns its error.
pub async fn run_rules<S: MailSession>(
    session: &mut S,
    inbox: &str,
    rules: &[Rule],
    dry_run: bool,
) -> Result<Vec<RuleReport>> {
    run(session, inbox, None, rules, dry_run).await
}

/// Like [`run_rules`], with move destinations checked against `folders`
/// instead of a fresh listing.
///
/// # Errors
///
/// Stops at the first failing rule and returns its error.
pub async fn run_rules_with_folders<S: MailSession>(
    session: &mut S,
    inbox: &str,
    folders: &BTreeSet<String>,
    rules: &[Rule],
    dry_run: bool,
) -> Result<Vec<RuleReport>> {
    run(session, inbox, Some(folders.clone()), rules, dry_run).await
}

async fn run<S: MailSession>(
    session: &mut S,
    inbox: &str,
    folders: Option<BTreeSet<String>>,
    rules: &[Rule],
    dry_run: bool,
) -> Result<Vec<RuleReport>> {
    let mut runner = Runner {
        session,
        inbox,
        dry_run,
        folders,
    };
    let mut reports = Vec::with_capacity(rules.len());
    for rule in rules {
        let report = runner.run(rule).await?;
        info!("{report}");
        reports.push(report);
    }
    Ok(reports)
}

struct Runner<'a, S> {
    session: &'a mut S,
    inbox: &'a str,
    dry_run: bool,
    folders: Option<BTreeSet<String>>,
}

impl<S: MailSession> Runner<'_, S> {
    async fn run(&mut self, rule: &Rule) -> Result<RuleReport> {
        let matched = resolve(&mut *self.session, self.inbox, &rule.spec, rule.merge).await?;
        if matched.is_empty() {
            return Ok(RuleReport {
                rule: rule.name.clone(),
                matched: 0,
                outcome: Outcome::Skipped,
            });
        }

        if !self.dry_run {
            self.session
                .select_folder(self.inbox, false)
                .await
                .map_err(Error::query(self.inbox))?;
        }

        let mut actions = Vec::with_capacity(rule.actions.len());
        for action in &rule.actions {
            let created_folder = match action {
                Action::Move(folder) => self.move_to(&matched, folder).await?,
                Action::Delete => {
                    self.delete(&matched).await?;
                    false
                }
            };
            actions.push(ActionReport {
                action: action.clone(),
                count: matched.len(),
                created_folder,
                dry_run: self.dry_run,
            });
        }

        Ok(RuleReport {
            rule: rule.name.clone(),
            matched: matched.len(),
            outcome: Outcome::Acted(actions),
        })
    }

    /// Returns whether the folder had to be created.
    async fn move_to(&mut self, uids: &BTreeSet<Uid>, folder: &str) -> Result<bool> {
        let missing = !self.folders().await?.contains(folder);
        if self.dry_run {
            return Ok(missing);
        }
        let action = format!("move to {folder}");
        if missing {
            self.session
                .create_folder(folder)
                .await
                .map_err(Error::mutation(format!("create {folder}")))?;
            if let Some(folders) = &mut self.folders {
                folders.insert(folder.to_string());
            }
            info!(folder, "created folder");
        }
        move_or_copy(&mut *self.session, uids, folder)
            .await
            .map_err(Error::mutation(action))?;
        tokio::time::sleep(PACING_DELAY).await;
        Ok(missing)
    }

    async fn delete(&mut self, uids: &BTreeSet<Uid>) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        self.session
            .delete_messages(uids)
            .await
            .map_err(Error::mutation("delete"))?;
        self.session
            .expunge(uids)
            .await
            .map_err(Error::mutation("expunge"))?;
        tokio::time::sleep(PACING_DELAY).await;
        Ok(())
    }

    async fn folders(&mut self) -> Result<&BTreeSet<String>> {
        if self.folders.is_none() {
            let listed = self
                .session
                .list_folders()
                .await
                .map_err(Error::query(self.inbox))?;
            self.folders = Some(listed.into_iter().map(|f| f.name).collect());
        }
        Ok(self.folders.get_or_insert_default())
    }
}
