//! Type-state IMAP client connection.
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after LOGIN
//! - `Selected`: after SELECT
//!
//! Each state only exposes the commands valid in it.

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::states::{Authenticated, LoggedIn, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, Status};
use crate::{Error, Result};

/// Default bound on a single command round-trip.
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(120);

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) io_timeout: Duration,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if the server supports MOVE (RFC 6851).
    #[must_use]
    pub fn supports_move(&self) -> bool {
        self.has_capability(&Capability::Move)
    }

    /// Returns true if the server supports UIDPLUS (RFC 4315).
    #[must_use]
    pub fn supports_uidplus(&self) -> bool {
        self.has_capability(&Capability::UidPlus)
    }

    /// Sets the bound applied to every command round-trip.
    #[must_use]
    pub const fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sends a NOOP command.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-OK completion.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).await.map(|_| ())
    }

    /// Sends CAPABILITY and replaces the stored capabilities.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-OK completion.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        let responses = self.execute(&Command::Capability).await?;
        for parsed in responses {
            if let Response::Untagged(UntaggedResponse::Capability(caps)) = parsed {
                self.capabilities.clone_from(&caps);
            }
        }
        Ok(self.capabilities.clone())
    }

    /// Sends one command and waits for its completion.
    ///
    /// Returns every parsed response, the tagged completion last. Untagged
    /// responses that fail to parse are kept as [`UntaggedResponse::Other`]
    /// so one odd line from the server does not fail the command.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<Response>> {
        let tag = self.tag_gen.next_tag();
        tracing::trace!(tag, command = command.name(), "sending");

        let io_timeout = self.io_timeout;
        let stream = &mut self.stream;
        let parts = command.serialize(&tag);
        let round_trip = stream.round_trip(&parts, &tag);
        let raw = tokio::time::timeout(io_timeout, round_trip)
            .await
            .map_err(|_| Error::Timeout(io_timeout))??;

        let mut responses = Vec::with_capacity(raw.len());
        for bytes in &raw {
            let parsed = ResponseParser::parse(bytes).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "unparsed response");
                Response::Untagged(UntaggedResponse::Other(
                    String::from_utf8_lossy(bytes).trim().to_string(),
                ))
            });
            responses.push(parsed);
        }

        check_completion(&responses, &tag)?;
        Ok(responses)
    }

    fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            io_timeout: self.io_timeout,
            state,
        }
    }
}

/// A SELECT that did not succeed.
pub struct SelectFailed<S> {
    /// Why it failed.
    pub error: Error,
    /// The connection, back in the authenticated state, when the server
    /// rejected the command; `None` when the connection itself failed.
    pub client: Option<Client<S, Authenticated>>,
}

impl<S> std::fmt::Debug for SelectFailed<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectFailed")
            .field("error", &self.error)
            .field("recoverable", &self.client.is_some())
            .finish()
    }
}

impl<S> From<SelectFailed<S>> for Error {
    fn from(failed: SelectFailed<S>) -> Self {
        failed.error
    }
}

/// Maps the tagged completion for `tag` to `Ok` or the matching error.
fn check_completion(responses: &[Response], tag: &str) -> Result<()> {
    for response in responses.iter().rev() {
        if let Response::Tagged {
            tag: resp_tag,
            status,
            text,
            ..
        } = response
            && resp_tag == tag
        {
            return match status {
                Status::Ok | Status::PreAuth => Ok(()),
                Status::No => Err(Error::No(text.clone())),
                Status::Bad => Err(Error::Bad(text.clone())),
                Status::Bye => Err(Error::Bye(text.clone())),
            };
        }
    }

    Err(Error::Protocol(format!("missing tagged response for {tag}")))
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

    fn tagged(tag: &str, status: Status, text: &str) -> Response {
        Response::Tagged {
            tag: tag.into(),
            status,
            code: None,
            text: text.into(),
        }
    }

    #[test]
    fn completion_ok() {
        let responses = vec![
            Response::Untagged(UntaggedResponse::Exists(1)),
            tagged("A0002", Status::Ok, "done"),
        ];
        assert!(check_completion(&responses, "A0002").is_ok());
    }

    #[test]
    fn completion_no_and_bad() {
        let no = check_completion(&[tagged("A0001", Status::No, "nope")], "A0001");
        assert!(matches!(no, Err(Error::No(text)) if text == "nope"));

        let bad = check_completion(&[tagged("A0001", Status::Bad, "syntax")], "A0001");
        assert!(matches!(bad, Err(Error::Bad(_))));
    }

    #[test]
    fn completion_missing() {
        let err = check_completion(&[tagged("A0009", Status::Ok, "")], "A0001").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
