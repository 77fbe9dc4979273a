//! Commands valid in every logged-in state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::states::{Authenticated, LoggedIn, Selected};
use super::{Client, SelectFailed};
use crate::command::{Command, decode_mailbox};
use crate::parser::{Response, ResponseCode, UntaggedResponse};
use crate::types::{ListEntry, MailboxStatus};
use crate::{Error, Result};

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: LoggedIn,
{
    /// Selects a mailbox for read-write access.
    ///
    /// Consumes self and returns a selected client on success. Selecting
    /// from the selected state implicitly closes the previous mailbox.
    ///
    /// # Errors
    ///
    /// When the server answers NO or BAD (for example because the mailbox
    /// does not exist) the connection is still usable and is handed back in
    /// [`SelectFailed::client`], in the authenticated state.
    pub async fn select(
        mut self,
        mailbox: &str,
    ) -> std::result::Result<(Client<S, Selected>, MailboxStatus), SelectFailed<S>> {
        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        match self.execute(&command).await {
            Ok(responses) => {
                let status = mailbox_status(&responses);
                let selected = Selected {
                    mailbox: mailbox.to_string(),
                    status: status.clone(),
                };
                Ok((self.transition(selected), status))
            }
            Err(error @ (Error::No(_) | Error::Bad(_))) => Err(SelectFailed {
                error,
                client: Some(self.transition(Authenticated)),
            }),
            Err(error) => Err(SelectFailed {
                error,
                client: None,
            }),
        }
    }

    /// Lists mailboxes matching a pattern.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-OK completion.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>> {
        let responses = self
            .execute(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        Ok(responses
            .into_iter()
            .filter_map(|response| match response {
                Response::Untagged(UntaggedResponse::List(entry)) => Some(ListEntry {
                    name: decode_mailbox(&entry.name),
                    ..entry
                }),
                _ => None,
            })
            .collect())
    }

    /// Asks the server for its hierarchy delimiter (`LIST "" ""`).
    ///
    /// Returns `None` for flat namespaces.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-OK completion.
    pub async fn hierarchy_delimiter(&mut self) -> Result<Option<char>> {
        let entries = self.list("", "").await?;
        Ok(entries.into_iter().find_map(|entry| entry.delimiter))
    }

    /// Creates a new mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`](crate::Error::No) if the server refuses, for
    /// example because the mailbox already exists.
    pub async fn create(&mut self, mailbox: &str) -> Result<()> {
        self.execute(&Command::Create {
            mailbox: mailbox.to_string(),
        })
        .await
        .map(|_| ())
    }

    /// Gracefully disconnects from the server.
    ///
    /// The server's BYE and the completion are read but their status is
    /// ignored; the connection is gone either way.
    ///
    /// # Errors
    ///
    /// Fails only if LOGOUT cannot be written.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next_tag();
        self.stream
            .write_command(&Command::Logout.serialize(&tag).concat())
            .await?;
        if let Err(e) = self.stream.read_until_tagged(&tag).await {
            tracing::debug!(error = %e, "connection closed before LOGOUT completed");
        }
        Ok(())
    }
}

/// Collects the SELECT data that matters to the client.
fn mailbox_status(responses: &[Response]) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for response in responses {
        match response {
            Response::Untagged(UntaggedResponse::Exists(n)) => status.exists = *n,
            Response::Untagged(UntaggedResponse::Status {
                code: Some(code), ..
            }) => match code {
                ResponseCode::UidValidity(v) => status.uid_validity = Some(*v),
                ResponseCode::UidNext(v) => status.uid_next = Some(*v),
                _ => {}
            },
            _ => {}
        }
    }

    status
}
