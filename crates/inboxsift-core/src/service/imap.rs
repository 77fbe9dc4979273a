//! IMAP-backed sessions.

use std::collections::BTreeSet;

use inboxsift_imap::{
    Authenticated, Client, Endpoint, Error as ImapError, ImapStream, SelectFailed, Selected, Uid,
    UidSet,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use super::transport::{Connector, MailSession};
use crate::message::{MessageRef, sender_address};
use crate::{Error, Result};

/// Separator assumed when neither the configuration nor the server names one.
pub const DEFAULT_SEPARATOR: char = '.';

/// Header fields fetched for every message.
const HEADER_FIELDS: [&str; 2] = ["FROM", "SUBJECT"];

/// Connects to a real IMAP server.
#[derive(Clone)]
pub struct ImapConnector {
    endpoint: Endpoint,
    username: String,
    password: String,
    separator: Option<char>,
}

impl ImapConnector {
    /// Creates a connector.
    ///
    /// With `separator` set, hierarchy discovery is skipped.
    #[must_use]
    pub fn new(
        endpoint: Endpoint,
        username: impl Into<String>,
        password: impl Into<String>,
        separator: Option<char>,
    ) -> Self {
        Self {
            endpoint,
            username: username.into(),
            password: password.into(),
            separator,
        }
    }
}

impl std::fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConnector")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("separator", &self.separator)
            .finish()
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession<ImapStream>;

    async fn connect(&self) -> Result<Self::Session> {
        info!("Logging in to {}...", self.endpoint.host);
        let client = Client::connect(&self.endpoint).await?;
        let client = client.login(&self.username, &self.password).await?;
        let session = ImapSession::new(client, &self.endpoint.host, self.separator).await?;
        info!("Success!");
        Ok(session)
    }
}

enum Connection<S> {
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
    Closed,
}

/// A logged-in IMAP connection.
pub struct ImapSession<S> {
    connection: Connection<S>,
    host: String,
    separator: char,
    exists: u32,
}

impl<S> ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a logged-in client.
    ///
    /// Without `separator` the server is asked for its hierarchy delimiter,
    /// falling back to [`DEFAULT_SEPARATOR`] for flat namespaces.
    ///
    /// # Errors
    ///
    /// Fails if the delimiter query fails.
    pub async fn new(
        mut client: Client<S, Authenticated>,
        host: &str,
        separator: Option<char>,
    ) -> Result<Self> {
        let separator = match separator {
            Some(separator) => separator,
            None => {
                let discovered = client.hierarchy_delimiter().await?;
                debug!(?discovered, "hierarchy delimiter");
                discovered.unwrap_or(DEFAULT_SEPARATOR)
            }
        };

        Ok(Self {
            connection: Connection::Authenticated(client),
            host: host.to_string(),
            separator,
            exists: 0,
        })
    }

    async fn list_names(&mut self, name: &str) -> Result<Vec<inboxsift_imap::ListEntry>> {
        let entries = match &mut self.connection {
            Connection::Authenticated(client) => client.list("", name).await,
            Connection::Selected(client) => client.list("", name).await,
            Connection::Closed => return Err(closed()),
        };
        Ok(entries?)
    }
}

impl<S> MailSession for ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn separator(&self) -> char {
        self.separator
    }

    async fn select_mailbox(&mut self, mailbox: &str) -> Result<()> {
        let result = match std::mem::replace(&mut self.connection, Connection::Closed) {
            Connection::Authenticated(client) => client.select(mailbox).await,
            Connection::Selected(client) => client.select(mailbox).await,
            Connection::Closed => return Err(closed()),
        };

        match result {
            Ok((client, status)) => {
                debug!(mailbox, exists = status.exists, "selected");
                self.exists = status.exists;
                self.connection = Connection::Selected(client);
                Ok(())
            }
            Err(SelectFailed { error, client }) => {
                if let Some(client) = client {
                    self.connection = Connection::Authenticated(client);
                }
                Err(match error {
                    ImapError::No(reason) | ImapError::Bad(reason) => Error::Mailbox {
                        mailbox: mailbox.to_string(),
                        reason,
                    },
                    other => other.into(),
                })
            }
        }
    }

    async fn fetch_messages(&mut self) -> Result<Vec<MessageRef>> {
        let Connection::Selected(client) = &mut self.connection else {
            return Err(Error::Protocol("no mailbox selected".to_string()));
        };
        if self.exists == 0 {
            return Ok(Vec::new());
        }

        let headers = client.uid_fetch_headers(&UidSet::All, &HEADER_FIELDS).await?;
        Ok(headers
            .into_iter()
            .map(|h| {
                let sender = h.field("From").map(|f| sender_address(&f)).unwrap_or_default();
                let subject = h.field("Subject").unwrap_or_default();
                MessageRef::new(h.uid, sender, subject)
            })
            .collect())
    }

    async fn folder_exists(&mut self, folder: &str) -> Result<bool> {
        let entries = self.list_names(folder).await?;
        Ok(entries.iter().any(|entry| {
            let same = entry.name == folder
                || (entry.name.eq_ignore_ascii_case("INBOX") && folder.eq_ignore_ascii_case("INBOX"));
            same && !entry
                .attributes
                .iter()
                .any(|a| a.eq_ignore_ascii_case("\\NonExistent"))
        }))
    }

    async fn create_folder(&mut self, folder: &str) -> Result<()> {
        let result = match &mut self.connection {
            Connection::Authenticated(client) => client.create(folder).await,
            Connection::Selected(client) => client.create(folder).await,
            Connection::Closed => return Err(closed()),
        };
        result.map_err(|e| match e {
            ImapError::No(reason) | ImapError::Bad(reason) => Error::Folder {
                folder: folder.to_string(),
                reason,
            },
            other => other.into(),
        })
    }

    async fn move_messages(&mut self, uids: &BTreeSet<Uid>, folder: &str) -> Result<()> {
        let Connection::Selected(client) = &mut self.connection else {
            return Err(Error::Protocol("no mailbox selected".to_string()));
        };
        let set = UidSet::from_uids(uids.iter().copied());
        client.uid_move(&set, folder).await.map_err(|e| match e {
            ImapError::No(reason) | ImapError::Bad(reason) => Error::Move {
                folder: folder.to_string(),
                reason,
            },
            other => other.into(),
        })
    }

    async fn disconnect(self) -> Result<()> {
        info!("Disconnecting from {}...", self.host);
        match self.connection {
            Connection::Authenticated(client) => client.logout().await?,
            Connection::Selected(client) => client.logout().await?,
            Connection::Closed => {}
        }
        Ok(())
    }
}

fn closed() -> Error {
    Error::Network("connection already closed".to_string())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tokio_test::io::{Builder, Mock};

    async fn session(mock: Mock, separator: Option<char>) -> ImapSession<Mock> {
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("me", "pw").await.unwrap();
        ImapSession::new(client, "imap.test", separator).await.unwrap()
    }

    fn login(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"* OK [CAPABILITY IMAP4rev1 MOVE] ready\r\n")
            .write(b"A0000 LOGIN me pw\r\n")
            .read(b"A0000 OK [CAPABILITY IMAP4rev1 MOVE] Logged in\r\n")
    }

    #[tokio::test]
    async fn discovers_separator() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 LIST \"\" \"\"\r\n")
            .read(b"* LIST (\\Noselect) \"/\" \"\"\r\nA0001 OK done\r\n")
            .build();
        let session = session(mock, None).await;
        assert_eq!(session.separator(), '/');
    }

    #[tokio::test]
    async fn flat_namespace_falls_back_to_dot() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 LIST \"\" \"\"\r\n")
            .read(b"* LIST (\\Noselect) NIL \"\"\r\nA0001 OK done\r\n")
            .build();
        let session = session(mock, None).await;
        assert_eq!(session.separator(), DEFAULT_SEPARATOR);
    }

    #[tokio::test]
    async fn fetch_extracts_sender_address() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 1 EXISTS\r\nA0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID FETCH 1:* (UID BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])\r\n")
            .read(b"* 1 FETCH (UID 42 BODY[HEADER.FIELDS (FROM SUBJECT)] {50}\r\n")
            .read(b"From: Boss <BOSS@corp.com>\r\nSubject: Quarterly\r\n\r\n)\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let mut session = session(mock, Some('.')).await;

        session.select_mailbox("INBOX").await.unwrap();
        let messages = session.fetch_messages().await.unwrap();

        assert_eq!(
            messages,
            [MessageRef::new(Uid::new(42).unwrap(), "BOSS@corp.com", "Quarterly")]
        );
    }

    #[tokio::test]
    async fn empty_mailbox_skips_fetch() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 0 EXISTS\r\nA0001 OK done\r\n")
            .build();
        let mut session = session(mock, Some('.')).await;

        session.select_mailbox("INBOX").await.unwrap();
        assert!(session.fetch_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_select_keeps_session() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 SELECT Nope\r\n")
            .read(b"A0001 NO Mailbox doesn't exist\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 0 EXISTS\r\nA0002 OK done\r\n")
            .build();
        let mut session = session(mock, Some('.')).await;

        let err = session.select_mailbox("Nope").await.unwrap_err();
        assert!(matches!(err, Error::Mailbox { ref mailbox, .. } if mailbox == "Nope"));
        assert!(!err.is_fatal());

        session.select_mailbox("INBOX").await.unwrap();
    }

    #[tokio::test]
    async fn folder_exists_matches_exact_name() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 LIST \"\" \"Work.Urgent\"\r\n")
            .read(b"* LIST () \".\" Work.Urgent\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" \"Work.Later\"\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let mut session = session(mock, Some('.')).await;

        assert!(session.folder_exists("Work.Urgent").await.unwrap());
        assert!(!session.folder_exists("Work.Later").await.unwrap());
    }

    #[tokio::test]
    async fn folder_exists_compares_decoded_names() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 LIST \"\" \"Rechnungen.&ANw-bersicht\"\r\n")
            .read(b"* LIST () \".\" Rechnungen.&ANw-bersicht\r\nA0001 OK done\r\n")
            .write(b"A0002 CREATE Rechnungen.&ANY-l\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let mut session = session(mock, Some('.')).await;

        assert!(session.folder_exists("Rechnungen.Übersicht").await.unwrap());
        session.create_folder("Rechnungen.Öl").await.unwrap();
    }

    #[tokio::test]
    async fn refused_create_is_a_folder_error() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 CREATE Work\r\n")
            .read(b"A0001 NO [OVERQUOTA] Too many folders\r\n")
            .build();
        let mut session = session(mock, Some('.')).await;

        let err = session.create_folder("Work").await.unwrap_err();
        assert!(matches!(err, Error::Folder { ref folder, .. } if folder == "Work"));
    }

    #[tokio::test]
    async fn bulk_move_sends_one_command() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 9 EXISTS\r\nA0001 OK done\r\n")
            .write(b"A0002 UID MOVE 3:5,9 Work.Urgent\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let mut session = session(mock, Some('.')).await;

        session.select_mailbox("INBOX").await.unwrap();
        let uids: BTreeSet<Uid> = [9, 3, 4, 5].into_iter().filter_map(Uid::new).collect();
        session.move_messages(&uids, "Work.Urgent").await.unwrap();
    }

    #[tokio::test]
    async fn refused_move_is_a_move_error() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 1 EXISTS\r\nA0001 OK done\r\n")
            .write(b"A0002 UID MOVE 1 Gone\r\n")
            .read(b"A0002 NO [TRYCREATE] No such mailbox\r\n")
            .build();
        let mut session = session(mock, Some('.')).await;

        session.select_mailbox("INBOX").await.unwrap();
        let uids = BTreeSet::from([Uid::new(1).unwrap()]);
        let err = session.move_messages(&uids, "Gone").await.unwrap_err();
        assert!(matches!(err, Error::Move { ref folder, .. } if folder == "Gone"));
    }

    #[tokio::test]
    async fn fetch_without_select_is_an_error() {
        let mock = login(&mut Builder::new()).build();
        let mut session = session(mock, Some('.')).await;
        assert!(matches!(
            session.fetch_messages().await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn disconnect_logs_out() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0001 OK done\r\n")
            .build();
        let session = session(mock, Some('.')).await;
        session.disconnect().await.unwrap();
    }
}
