//! Type-state markers for IMAP client connection states.

use crate::types::MailboxStatus;

/// Initial state: only STARTTLS and LOGIN are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in, no mailbox open.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// Logged in with a mailbox open for read-write access.
#[derive(Debug, Clone, Default)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Status reported by SELECT.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// States in which the user is logged in.
///
/// Folder commands and LOGOUT are implemented once for every such state.
pub trait LoggedIn: sealed::Sealed {}

impl LoggedIn for Authenticated {}
impl LoggedIn for Selected {}
