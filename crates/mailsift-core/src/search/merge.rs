//! Evaluation of a search specification against one folder.

use std::collections::BTreeSet;

use mailsift_imap::{FetchAttribute, FetchItem, SearchKey, Uid};
use tracing::debug;

use super::MergeMode;
use super::bulk::is_bulk_sender;
use super::criteria::{Plan, translate};
use super::spec::{PostFilter, SearchSpec};
use crate::message::attachments;
use crate::session::MailSession;
use crate::{Error, Result};

/// Resolves `spec` in `folder` to the set of matching UIDs.
///
/// The folder is opened read-only. Each query predicate is evaluated on its
/// own and merged into the running set with `mode`; the first one seeds it.
/// Post-filters then narrow the merged set in order.
///
/// # Errors
///
/// Returns [`Error::InvalidSpecification`] before any request if a predicate
/// cannot be translated, and [`Error::QueryFailed`] if any request fails. No
/// partial result is returned.
pub async fn resolve<S: MailSession>(
    session: &mut S,
    folder: &str,
    spec: &SearchSpec,
    mode: MergeMode,
) -> Result<BTreeSet<Uid>> {
    let plans = spec
        .predicates()
        .iter()
        .map(translate)
        .collect::<Result<Vec<_>>>()?;

    session
        .select_folder(folder, true)
        .await
        .map_err(Error::query(folder))?;

    let base = if spec.unread() {
        SearchKey::Unseen
    } else {
        SearchKey::All
    };

    let mut matched = if plans.is_empty() {
        search(session, folder, &[base]).await?
    } else {
        let mut running: Option<BTreeSet<Uid>> = None;
        for (predicate, plan) in spec.predicates().iter().zip(&plans) {
            let found = match plan {
                Plan::Search(queries) => {
                    let mut union = BTreeSet::new();
                    for query in queries {
                        let mut keys = Vec::with_capacity(query.len() + 1);
                        if spec.unread() {
                            keys.push(SearchKey::Unseen);
                        }
                        keys.extend(query.iter().cloned());
                        union.extend(search(session, folder, &keys).await?);
                    }
                    union
                }
                Plan::EnvelopeScan => bulk_senders(session, folder, base.clone()).await?,
            };
            debug!(
                folder,
                predicate = predicate.name(),
                matched = found.len(),
                "predicate evaluated"
            );
            running = Some(match running {
                Some(running) => mode.merge(running, found),
                None => found,
            });
        }
        running.unwrap_or_default()
    };

    for filter in spec.post_filters() {
        matched = post_filter(session, folder, matched, *filter).await?;
    }

    debug!(folder, %mode, matched = matched.len(), "search resolved");
    Ok(matched)
}

async fn search<S: MailSession>(
    session: &mut S,
    folder: &str,
    keys: &[SearchKey],
) -> Result<BTreeSet<Uid>> {
    session.search(keys).await.map_err(Error::query(folder))
}

async fn bulk_senders<S: MailSession>(
    session: &mut S,
    folder: &str,
    base: SearchKey,
) -> Result<BTreeSet<Uid>> {
    let candidates = search(session, folder, &[base]).await?;
    let envelopes = session
        .fetch(&candidates, &[FetchAttribute::Envelope])
        .await
        .map_err(Error::query(folder))?;
    Ok(envelopes
        .into_iter()
        .filter(|(_, items)| {
            items.iter().any(|item| match item {
                FetchItem::Envelope(envelope) => envelope
                    .from
                    .first()
                    .and_then(mailsift_imap::Address::email)
                    .is_some_and(|address| is_bulk_sender(&address)),
                _ => false,
            })
        })
        .map(|(uid, _)| uid)
        .collect())
}

async fn post_filter<S: MailSession>(
    session: &mut S,
    folder: &str,
    uids: BTreeSet<Uid>,
    filter: PostFilter,
) -> Result<BTreeSet<Uid>> {
    if uids.is_empty() {
        return Ok(uids);
    }
    let structures = session
        .fetch(&uids, &[FetchAttribute::BodyStructure])
        .await
        .map_err(Error::query(folder))?;
    Ok(structures
        .into_iter()
        .filter(|(_, items)| {
            let count = items
                .iter()
                .find_map(|item| match item {
                    FetchItem::BodyStructure(body) => Some(attachments(body).len()),
                    _ => None,
                })
                .unwrap_or(0);
            filter.keeps(count)
        })
        .map(|(uid, _)| uid)
        .collect())
}
