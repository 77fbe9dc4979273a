//! Password storage in the system keyring.
//!
//! Keeps the IMAP password out of the configuration file:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::debug;

/// Service name used for keyring entries.
pub const SERVICE_NAME: &str = "inboxsift";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Neither the configuration, the environment nor the keyring had a password.
    #[error("No password configured for {0}")]
    Missing(String),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Stores the password for `username` in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_password(username: &str, password: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, username)?;
    entry.set_password(password)?;
    debug!("Stored password for {username}");
    Ok(())
}

/// Retrieves the password for `username` from the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn get_password(username: &str) -> CredentialResult<Option<String>> {
    let entry = Entry::new(SERVICE_NAME, username)?;
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => {
            debug!("No password found for {username}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes the stored password for `username`.
///
/// # Errors
///
/// Returns an error if the keyring operation fails (except for missing entries).
pub fn delete_password(username: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, username)?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Picks the password from the first source that has one: the
/// configuration file, then `from_env`, then the keyring.
///
/// # Errors
///
/// Returns [`CredentialError::Missing`] when no source has a password, or
/// the keyring error if the keyring had to be consulted and failed.
pub fn resolve_password(
    username: &str,
    configured: Option<&str>,
    from_env: Option<String>,
) -> CredentialResult<String> {
    if let Some(password) = configured {
        return Ok(password.to_string());
    }
    if let Some(password) = from_env.filter(|p| !p.is_empty()) {
        debug!("Using password from environment");
        return Ok(password);
    }
    get_password(username)?.ok_or_else(|| CredentialError::Missing(username.to_string()))
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
    // Tests that reach the real keyring are ignored by default.
    // Run manually with `cargo test -- --ignored`

    use super::*;

    #[test]
    fn configured_password_wins() {
        let password = resolve_password("me", Some("from-file"), Some("from-env".into())).unwrap();
        assert_eq!(password, "from-file");
    }

    #[test]
    fn environment_beats_keyring() {
        let password = resolve_password("me", None, Some("from-env".into())).unwrap();
        assert_eq!(password, "from-env");
    }

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_store_and_retrieve_password() {
        let username = "inboxsift-test-user@example.invalid";
        store_password(username, "hunter2").unwrap();
        assert_eq!(get_password(username).unwrap(), Some("hunter2".to_string()));
        assert_eq!(resolve_password(username, None, None).unwrap(), "hunter2");

        delete_password(username).unwrap();
        assert_eq!(get_password(username).unwrap(), None);
    }
}
