//! Mail server access.

mod imap;
mod transport;

pub use imap::{DEFAULT_SEPARATOR, ImapConnector, ImapSession};
pub use transport::{Connector, MailSession};
