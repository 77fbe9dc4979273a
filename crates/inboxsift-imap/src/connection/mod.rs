//! IMAP connection management.
//!
//! - Endpoint description and TLS/plaintext stream abstraction
//! - Framed I/O for the IMAP wire format
//! - Type-state client

mod client;
mod framed;
mod stream;

pub use client::{Authenticated, Client, LoggedIn, NotAuthenticated, SelectFailed, Selected};
pub use framed::FramedStream;
pub use stream::{Endpoint, ImapStream, TlsMode, connect, create_tls_connector};
