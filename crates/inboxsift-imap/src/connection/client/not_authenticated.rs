//! Implementation for the not-authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::{Client, DEFAULT_IO_TIMEOUT};
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::connection::stream::{Endpoint, ImapStream, TlsMode, connect};
use crate::parser::{Response, ResponseCode, ResponseParser, UntaggedResponse};
use crate::types::{Capability, Status};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting and any capabilities it advertises.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, an unparseable greeting, or a BYE greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = ResponseParser::parse(&framed.read_response().await?)?;

        let capabilities = match greeting {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            Response::Untagged(UntaggedResponse::Status {
                code: Some(ResponseCode::Capability(caps)),
                ..
            }) => caps,
            Response::Untagged(UntaggedResponse::Status { .. }) => Vec::new(),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        };

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            io_timeout: DEFAULT_IO_TIMEOUT,
            state: NotAuthenticated,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// Consumes self and returns an authenticated client on success. The
    /// capability list is refreshed, since servers commonly advertise more
    /// after authentication.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials.
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        if [username, password].iter().any(|s| s.contains(['\r', '\n'])) {
            return Err(Error::Auth("credentials must not contain line breaks".to_string()));
        }

        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        let responses = self.execute(&command).await.map_err(|e| match e {
            Error::No(text) | Error::Bad(text) => Error::Auth(text),
            other => other,
        })?;

        let advertised = advertised_capabilities(responses);
        let mut client = self.transition(Authenticated);
        match advertised {
            Some(caps) => client.capabilities = caps,
            None => {
                client.capability().await?;
            }
        }

        tracing::debug!(capabilities = ?client.capabilities, "logged in");
        Ok(client)
    }
}

impl Client<ImapStream, NotAuthenticated> {
    /// Connects to `endpoint`: TCP, TLS or STARTTLS, then greeting.
    ///
    /// # Errors
    ///
    /// Fails if the server is unreachable, the handshake fails, or the
    /// greeting is a BYE.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let stream = connect(endpoint).await?;
        let mut client = Self::from_stream(stream).await?.with_io_timeout(endpoint.timeout);
        if endpoint.tls == TlsMode::StartTls {
            client = client.starttls(&endpoint.host).await?;
        }
        Ok(client)
    }

    /// Issues STARTTLS and upgrades the stream.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses STARTTLS or the handshake fails.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        self.execute(&Command::StartTls).await?;

        let tls = self.stream.into_inner().upgrade_to_tls(host).await?;
        Ok(Self {
            stream: FramedStream::new(tls),
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
            io_timeout: self.io_timeout,
            state: NotAuthenticated,
        })
    }
}

fn advertised_capabilities(responses: Vec<Response>) -> Option<Vec<Capability>> {
    responses.into_iter().find_map(|response| match response {
        Response::Untagged(UntaggedResponse::Capability(caps))
        | Response::Tagged {
            code: Some(ResponseCode::Capability(caps)),
            ..
        } => Some(caps),
        _ => None,
    })
}
