//! The operations the filter needs from a mail server.
//!
//! The filtering logic only talks to these traits, so it runs the same
//! against the IMAP implementation and an in-memory server in tests.

use std::collections::BTreeSet;

use inboxsift_imap::Uid;

use crate::Result;
use crate::message::MessageRef;

/// Opens logged-in sessions.
#[allow(async_fn_in_trait)]
pub trait Connector {
    /// Session type produced by [`connect`](Self::connect).
    type Session: MailSession;

    /// Connects and logs in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`](crate::Error::Network) when the server is
    /// unreachable and [`Error::Auth`](crate::Error::Auth) when the login is
    /// rejected.
    async fn connect(&self) -> Result<Self::Session>;
}

/// One logged-in connection.
///
/// Folder names passed in and out are in wire form, already joined with
/// [`separator`](Self::separator).
#[allow(async_fn_in_trait)]
pub trait MailSession {
    /// Hierarchy separator the server uses in folder names.
    fn separator(&self) -> char;

    /// Opens `mailbox` for reading and moving messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mailbox`](crate::Error::Mailbox) when the server
    /// refuses; the session stays usable.
    async fn select_mailbox(&mut self, mailbox: &str) -> Result<()>;

    /// Lists the sender and subject of every message in the selected mailbox.
    ///
    /// Does not change any message flags.
    ///
    /// # Errors
    ///
    /// Fails if no mailbox is selected or the fetch fails.
    async fn fetch_messages(&mut self) -> Result<Vec<MessageRef>>;

    /// Returns true if a folder with exactly this name exists.
    ///
    /// # Errors
    ///
    /// Fails when the server cannot answer.
    async fn folder_exists(&mut self, folder: &str) -> Result<bool>;

    /// Creates a folder. Its parent must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Folder`](crate::Error::Folder) when the server refuses.
    async fn create_folder(&mut self, folder: &str) -> Result<()>;

    /// Moves messages of the selected mailbox into `folder` in one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Move`](crate::Error::Move) when the server refuses.
    async fn move_messages(&mut self, uids: &BTreeSet<Uid>, folder: &str) -> Result<()>;

    /// Logs out and closes the connection.
    ///
    /// # Errors
    ///
    /// Fails only if the goodbye could not be sent.
    async fn disconnect(self) -> Result<()>
    where
        Self: Sized;
}
