//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::Result;
use crate::command::{Command, FetchAttribute};
use crate::parser::{FetchedHeaders, Response, UntaggedResponse};
use crate::types::{MailboxStatus, UidSet};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Status reported when the mailbox was selected.
    #[must_use]
    pub const fn mailbox_status(&self) -> &MailboxStatus {
        self.state.status()
    }

    /// Fetches the given header fields for a set of messages.
    ///
    /// Uses `BODY.PEEK`, so the `\Seen` flag is left untouched. Messages the
    /// server returns without a UID are skipped.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-OK completion.
    pub async fn uid_fetch_headers(
        &mut self,
        uids: &UidSet,
        fields: &[&str],
    ) -> Result<Vec<FetchedHeaders>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let command = Command::UidFetch {
            uids: uids.clone(),
            items: vec![
                FetchAttribute::Uid,
                FetchAttribute::HeaderFields(fields.iter().map(|f| (*f).to_string()).collect()),
            ],
        };
        let responses = self.execute(&command).await?;

        let mut headers = Vec::new();
        for response in responses {
            if let Response::Untagged(UntaggedResponse::Fetch { seq, uid, section }) = response {
                match uid {
                    Some(uid) => headers.push(FetchedHeaders {
                        uid,
                        header: section.unwrap_or_default(),
                    }),
                    None => tracing::debug!(seq, "FETCH response without UID"),
                }
            }
        }
        Ok(headers)
    }

    /// Moves messages to another mailbox.
    ///
    /// Uses `UID MOVE` when the server advertises MOVE; otherwise falls back
    /// to `UID COPY`, flagging the originals `\Deleted` and expunging them
    /// (`UID EXPUNGE` with UIDPLUS, plain `EXPUNGE` without).
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-OK completion of any step.
    pub async fn uid_move(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }

        if self.supports_move() {
            self.execute(&Command::UidMove {
                uids: uids.clone(),
                mailbox: mailbox.to_string(),
            })
            .await?;
            return Ok(());
        }

        self.execute(&Command::UidCopy {
            uids: uids.clone(),
            mailbox: mailbox.to_string(),
        })
        .await?;
        self.execute(&Command::UidMarkDeleted { uids: uids.clone() })
            .await?;
        let expunge = if self.supports_uidplus() {
            Command::UidExpunge { uids: uids.clone() }
        } else {
            Command::Expunge
        };
        self.execute(&expunge).await?;
        Ok(())
    }
}
