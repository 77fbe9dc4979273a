//! # inboxsift-imap
//!
//! A small async IMAP4 client with exactly the surface a server-side mail
//! filter needs: log in, select a mailbox, read sender headers, create
//! folders and move messages in bulk.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use inboxsift_imap::{Client, Endpoint, TlsMode, UidSet};
//!
//! #[tokio::main]
//! async fn main() -> inboxsift_imap::Result<()> {
//!     let endpoint =
//!         Endpoint::new("imap.example.com", None, TlsMode::Implicit, Duration::from_secs(30));
//!     let client = Client::connect(&endpoint).await?;
//!     let client = client.login("user@example.com", "password").await?;
//!
//!     let (mut client, status) = client.select("INBOX").await?;
//!     if status.exists > 0 {
//!         let headers = client.uid_fetch_headers(&UidSet::All, &["FROM"]).await?;
//!         println!("{} messages", headers.len());
//!     }
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select() ──→ Selected
//! ```
//!
//! Folder commands (LIST, CREATE) and LOGOUT are available in both the
//! authenticated and the selected state; message commands only once a
//! mailbox is selected.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, TagGenerator, decode_mailbox, encode_mailbox};
pub use connection::{
    Authenticated, Client, Endpoint, FramedStream, ImapStream, LoggedIn, NotAuthenticated,
    SelectFailed, Selected, TlsMode,
};
pub use error::{Error, Result};
pub use parser::{FetchedHeaders, Response, ResponseCode, ResponseParser, UntaggedResponse};
pub use types::{Capability, ListEntry, MailboxStatus, Status, Uid, UidSet};
