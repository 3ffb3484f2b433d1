//! Search specifications and their evaluation.
//!
//! A [`SearchSpec`] is an ordered set of predicates. [`criteria`] turns one
//! predicate into IMAP search keys, [`resolve`] runs them all against a
//! folder and merges the per-predicate results.

mod bulk;
pub mod criteria;
mod merge;
mod spec;

pub use bulk::{BULK_SENDER_SENTINEL, DOMAIN_LENGTH_THRESHOLD, is_bulk_sender};
pub use criteria::{Plan, translate};
pub use merge::resolve;
pub use spec::{DateRange, PostFilter, Predicate, SearchSpec, SpecRecord, parse_date};

use serde::Deserialize;

/// How per-predicate result sets are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Keep messages matched by every predicate.
    And,
    /// Keep messages matched by any predicate.
    Or,
}

impl MergeMode {
    /// Merges `next` into the running set.
    #[must_use]
    pub fn merge<T: Ord>(
        self,
        mut running: std::collections::BTreeSet<T>,
        next: std::collections::BTreeSet<T>,
    ) -> std::collections::BTreeSet<T> {
        match self {
            Self::And => {
                running.retain(|item| next.contains(item));
                running
            }
            Self::Or => {
                running.extend(next);
                running
            }
        }
    }
}

impl std::fmt::Display for MergeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}
