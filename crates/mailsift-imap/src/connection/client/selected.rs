//! Commands on the selected mailbox.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::command::{Command, FetchAttribute, SearchKey};
use crate::parser::{FetchItem, Untagged};
use crate::types::{Capability, Flag, MailboxStatus, Uid, UidSet};
use crate::{Error, Result};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.state.mailbox
    }

    /// Status reported when the mailbox was opened.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.state.status
    }

    /// Searches the mailbox, returning matching UIDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the search.
    pub async fn uid_search(&mut self, keys: &[SearchKey]) -> Result<Vec<Uid>> {
        let completion = self
            .execute(&Command::UidSearch {
                keys: keys.to_vec(),
            })
            .await?;
        Ok(completion
            .untagged
            .iter()
            .filter_map(|u| match u {
                Untagged::Search(ids) => Some(ids),
                _ => None,
            })
            .flatten()
            .filter_map(|&n| Uid::new(n))
            .collect())
    }

    /// Fetches data items for the given messages.
    ///
    /// Each entry is the item list of one FETCH response; UID FETCH always
    /// includes the UID item.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn uid_fetch(
        &mut self,
        uids: &UidSet,
        attributes: &[FetchAttribute],
    ) -> Result<Vec<Vec<FetchItem>>> {
        let completion = self
            .execute(&Command::UidFetch {
                uids: uids.clone(),
                attributes: attributes.to_vec(),
            })
            .await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|u| match u {
                Untagged::Fetch { items, .. } => Some(items),
                _ => None,
            })
            .collect())
    }

    /// Adds flags to the given messages without echoing the new flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn uid_add_flags(&mut self, uids: &UidSet, flags: &[Flag]) -> Result<()> {
        self.execute(&Command::UidAddFlags {
            uids: uids.clone(),
            flags: flags.to_vec(),
        })
        .await
        .map(drop)
    }

    /// Copies messages to another mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails, e.g. the target is missing.
    pub async fn uid_copy(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        self.execute(&Command::UidCopy {
            uids: uids.clone(),
            mailbox: mailbox.to_string(),
        })
        .await
        .map(drop)
    }

    /// Moves messages to another mailbox (RFC 6851).
    ///
    /// # Errors
    ///
    /// Returns an error if the server lacks MOVE or the command fails.
    pub async fn uid_move(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        if !self.has_capability(&Capability::Move) {
            return Err(Error::Protocol("server does not support MOVE".to_string()));
        }
        self.execute(&Command::UidMove {
            uids: uids.clone(),
            mailbox: mailbox.to_string(),
        })
        .await
        .map(drop)
    }

    /// Permanently removes every `\Deleted` message, returning the sequence
    /// numbers the server reported as expunged.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn expunge(&mut self) -> Result<Vec<u32>> {
        let completion = self.execute(&Command::Expunge).await?;
        Ok(expunged(&completion.untagged))
    }

    /// Removes only the given `\Deleted` messages (RFC 4315).
    ///
    /// # Errors
    ///
    /// Returns an error if the server lacks UIDPLUS or the command fails.
    pub async fn uid_expunge(&mut self, uids: &UidSet) -> Result<Vec<u32>> {
        if !self.has_capability(&Capability::UidPlus) {
            return Err(Error::Protocol("server does not support UIDPLUS".to_string()));
        }
        let completion = self.execute(&Command::UidExpunge { uids: uids.clone() }).await?;
        Ok(expunged(&completion.untagged))
    }
}

fn expunged(untagged: &[Untagged]) -> Vec<u32> {
    untagged
        .iter()
        .filter_map(|u| match u {
            Untagged::Expunge(n) => Some(*n),
            _ => None,
        })
        .collect()
}
