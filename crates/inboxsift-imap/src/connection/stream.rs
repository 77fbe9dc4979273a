//! Stream types for IMAP connections.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::{Error, Result};

/// How the connection is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plaintext throughout. Only for local test servers.
    Plain,
    /// Plaintext greeting, then STARTTLS before logging in.
    StartTls,
    /// TLS from the first byte.
    Implicit,
}

/// Where an IMAP server listens and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server hostname, also used for certificate verification.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Encryption.
    pub tls: TlsMode,
    /// Bound on connecting (TCP plus handshake) and on each command.
    pub timeout: Duration,
}

impl Endpoint {
    /// Describes a server; without `port`, 993 for implicit TLS and 143
    /// otherwise.
    #[must_use]
    pub fn new(host: impl Into<String>, port: Option<u16>, tls: TlsMode, timeout: Duration) -> Self {
        let port = port.unwrap_or(match tls {
            TlsMode::Implicit => 993,
            TlsMode::Plain | TlsMode::StartTls => 143,
        });
        Self {
            host: host.into(),
            port,
            tls,
            timeout,
        }
    }
}

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Upgrades a plaintext stream to TLS after a successful STARTTLS.
    ///
    /// # Errors
    ///
    /// Fails if the stream is already encrypted or the handshake fails.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => tls_handshake(host, tcp).await,
            Self::Tls(_) => Err(Error::InvalidState("stream is already TLS".to_string())),
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_tls() { "ImapStream::Tls" } else { "ImapStream::Plain" })
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector trusting the Mozilla root set.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

async fn tls_handshake(host: &str, tcp: TcpStream) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = create_tls_connector().connect(server_name, tcp).await?;
    Ok(ImapStream::Tls(Box::new(tls)))
}

/// Opens the transport to `endpoint`.
///
/// With [`TlsMode::StartTls`] the returned stream is still plaintext; the
/// upgrade happens once the greeting has been read, see
/// [`Client::connect`](crate::Client::connect).
///
/// # Errors
///
/// Returns [`Error::Timeout`] if TCP connect plus handshake exceed
/// `endpoint.timeout`, otherwise the underlying I/O or TLS error.
pub async fn connect(endpoint: &Endpoint) -> Result<ImapStream> {
    let attempt = async {
        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
        match endpoint.tls {
            TlsMode::Implicit => tls_handshake(&endpoint.host, tcp).await,
            TlsMode::Plain | TlsMode::StartTls => Ok(ImapStream::Plain(tcp)),
        }
    };

    tokio::time::timeout(endpoint.timeout, attempt)
        .await
        .map_err(|_| Error::Timeout(endpoint.timeout))?
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

    #[test]
    fn test_create_tls_connector() {
        let _connector = create_tls_connector();
    }

    fn local(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", Some(port), TlsMode::Plain, Duration::from_secs(5))
    }

    #[test]
    fn test_default_ports() {
        let timeout = Duration::from_secs(1);
        assert_eq!(Endpoint::new("h", None, TlsMode::Implicit, timeout).port, 993);
        assert_eq!(Endpoint::new("h", None, TlsMode::StartTls, timeout).port, 143);
        assert_eq!(Endpoint::new("h", None, TlsMode::Plain, timeout).port, 143);
        assert_eq!(Endpoint::new("h", Some(3993), TlsMode::Implicit, timeout).port, 3993);
    }

    #[tokio::test]
    async fn test_connect_plain_to_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let endpoint = local(port);
        let (stream, accepted) = tokio::join!(connect(&endpoint), listener.accept());
        assert!(!stream.unwrap().is_tls());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect(&local(port)).await.unwrap_err();
        assert!(err.is_network());
    }
}
