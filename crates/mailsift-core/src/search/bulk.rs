//! Bulk-sender heuristic.
//!
//! Mass mailers tend to send from long generated subdomains
//! (`bounce.mail-7f3a9c.campaign-tracker.example`). A sender whose domain is
//! longer than [`DOMAIN_LENGTH_THRESHOLD`] characters counts as bulk.

/// Sender value that selects the bulk-sender predicate instead of an address.
pub const BULK_SENDER_SENTINEL: &str = "@@";

/// Domains longer than this many characters are treated as bulk senders.
pub const DOMAIN_LENGTH_THRESHOLD: usize = 32;

/// Whether an address looks like it came from a bulk mailer.
#[must_use]
pub fn is_bulk_sender(address: &str) -> bool {
    address
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.chars().count() > DOMAIN_LENGTH_THRESHOLD)
}
