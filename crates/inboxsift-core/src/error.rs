//! Error types for the filtering engine.

use thiserror::Error;

use crate::config::ValidationError;
use crate::config::credentials::CredentialError;

/// Errors that can occur while provisioning or filtering.
#[derive(Debug, Error)]
pub enum Error {
    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The connection could not be established or was lost.
    #[error("Network error: {0}")]
    Network(String),

    /// The server sent something the client could not make sense of.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A folder could not be checked or created.
    #[error("Folder {folder}: {reason}")]
    Folder {
        /// Folder in wire form.
        folder: String,
        /// Server explanation.
        reason: String,
    },

    /// A batch move into a folder was refused.
    #[error("Moving messages to {folder} failed: {reason}")]
    Move {
        /// Destination in wire form.
        folder: String,
        /// Server explanation.
        reason: String,
    },

    /// A watched mailbox could not be opened.
    #[error("Mailbox {mailbox}: {reason}")]
    Mailbox {
        /// Mailbox name.
        mailbox: String,
        /// Server explanation.
        reason: String,
    },

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration failed validation.
    #[error("Invalid configuration: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    /// Configuration file could not be parsed.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),
}

impl Error {
    /// Returns true if the error ends the whole run rather than one mailbox
    /// or one folder.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Folder { .. } | Self::Move { .. } | Self::Mailbox { .. }
        )
    }
}

impl From<inboxsift_imap::Error> for Error {
    fn from(err: inboxsift_imap::Error) -> Self {
        use inboxsift_imap::Error as Imap;

        match err {
            Imap::Auth(text) => Self::Auth(text),
            e if e.is_network() => Self::Network(e.to_string()),
            e => Self::Protocol(e.to_string()),
        }
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {e}", e.field()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn per_item_errors_are_not_fatal() {
        let folder = Error::Folder {
            folder: "Work".into(),
            reason: "quota".into(),
        };
        let moved = Error::Move {
            folder: "Work".into(),
            reason: "quota".into(),
        };
        let mailbox = Error::Mailbox {
            mailbox: "Spam".into(),
            reason: "no such mailbox".into(),
        };
        assert!(!folder.is_fatal());
        assert!(!moved.is_fatal());
        assert!(!mailbox.is_fatal());
    }

    #[test]
    fn session_errors_are_fatal() {
        assert!(Error::Auth("bad password".into()).is_fatal());
        assert!(Error::Network("reset".into()).is_fatal());
        assert!(Error::Protocol("garbage".into()).is_fatal());
        assert!(Error::Config("missing".into()).is_fatal());
    }

    #[test]
    fn imap_errors_are_classified() {
        let auth: Error = inboxsift_imap::Error::Auth("denied".into()).into();
        assert!(matches!(auth, Error::Auth(text) if text == "denied"));

        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "closed");
        let network: Error = inboxsift_imap::Error::Io(eof).into();
        assert!(matches!(network, Error::Network(_)));

        let no: Error = inboxsift_imap::Error::No("nope".into()).into();
        assert!(matches!(no, Error::Protocol(_)));
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = Error::Validation(vec![
            ValidationError::EmptyHost,
            ValidationError::NoMailboxes,
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid configuration: server.host: Server host is required; \
             mailboxes: At least one mailbox must be watched"
        );
    }
}
