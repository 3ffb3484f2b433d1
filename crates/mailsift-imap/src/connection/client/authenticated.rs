//! Mailbox management, available once logged in.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{MailboxAccess, Selected};
use crate::Result;
use crate::command::Command;
use crate::parser::{ResponseCode, Untagged};
use crate::types::{ListResponse, MailboxStatus};

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: MailboxAccess,
{
    /// Lists mailboxes matching `pattern` under `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let completion = self
            .execute(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|u| match u {
                Untagged::List(entry) => Some(entry),
                _ => None,
            })
            .collect())
    }

    /// Creates a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses, e.g. because it exists.
    pub async fn create(&mut self, mailbox: &str) -> Result<()> {
        self.execute(&Command::Create {
            mailbox: mailbox.to_string(),
        })
        .await
        .map(drop)
    }

    /// Deletes a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses.
    pub async fn delete(&mut self, mailbox: &str) -> Result<()> {
        self.execute(&Command::Delete {
            mailbox: mailbox.to_string(),
        })
        .await
        .map(drop)
    }

    /// Renames a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.execute(&Command::Rename {
            from: from.to_string(),
            to: to.to_string(),
        })
        .await
        .map(drop)
    }

    /// Opens a mailbox read-write.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox cannot be selected. The connection is
    /// consumed either way.
    pub async fn select(self, mailbox: &str) -> Result<Client<S, Selected>> {
        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        self.open(command, mailbox).await
    }

    /// Opens a mailbox read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox cannot be examined. The connection is
    /// consumed either way.
    pub async fn examine(self, mailbox: &str) -> Result<Client<S, Selected>> {
        let command = Command::Examine {
            mailbox: mailbox.to_string(),
        };
        self.open(command, mailbox).await
    }

    async fn open(mut self, command: Command, mailbox: &str) -> Result<Client<S, Selected>> {
        let read_only = matches!(command, Command::Examine { .. });
        let completion = self.execute(&command).await?;

        let mut status = MailboxStatus {
            read_only,
            ..MailboxStatus::default()
        };
        for untagged in &completion.untagged {
            match untagged {
                Untagged::Exists(n) => status.exists = *n,
                Untagged::Status {
                    code: Some(ResponseCode::UidValidity(v)),
                    ..
                } => status.uid_validity = Some(*v),
                Untagged::Status {
                    code: Some(ResponseCode::UidNext(n)),
                    ..
                } => status.uid_next = Some(*n),
                _ => {}
            }
        }
        if completion.code == Some(ResponseCode::ReadOnly) {
            status.read_only = true;
        }

        Ok(self.into_state(Selected {
            mailbox: mailbox.to_string(),
            status,
        }))
    }
}
