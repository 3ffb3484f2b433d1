//! Connection states.

use crate::types::MailboxStatus;

/// Connected, not yet logged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in, no mailbox selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is selected (SELECT) or examined (EXAMINE).
#[derive(Debug, Clone, Default)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// States in which mailbox management and selection are allowed.
pub trait MailboxAccess: sealed::Sealed {}

impl MailboxAccess for Authenticated {}
impl MailboxAccess for Selected {}
