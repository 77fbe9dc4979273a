//! Agent configuration.
//!
//! The whole configuration lives in one JSON document. Rules are a JSON
//! array so their declaration order survives loading.

pub mod credentials;
mod validation;

use std::path::{Path, PathBuf};
use std::time::Duration;

use inboxsift_imap::{Endpoint, TlsMode};
use serde::{Deserialize, Serialize};

pub use validation::{ValidationError, ValidationResult, validate_config};

use crate::filter::{MoveErrorPolicy, Settings};
use crate::rules::{MatchPolicy, RuleTable};
use crate::{Error, Result};

/// Sleep between cycles when the file does not say.
pub const DEFAULT_SLEEP_SECONDS: u64 = 300;

/// Connect and command timeout when the file does not say.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Security/encryption mode for the IMAP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl From<Security> for TlsMode {
    fn from(security: Security) -> Self {
        match security {
            Security::None => Self::Plain,
            Security::Tls => Self::Implicit,
            Security::StartTls => Self::StartTls,
        }
    }
}

/// Where the IMAP server is and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (default: 993 for TLS, 143 otherwise).
    #[serde(default)]
    pub port: Option<u16>,
    /// Security mode.
    #[serde(default)]
    pub security: Security,
    /// Connect and per-command timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ServerConfig {
    /// Where the IMAP client connects.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            &self.host,
            self.port,
            self.security.into(),
            Duration::from_secs(self.timeout_seconds),
        )
    }
}

/// Everything the agent needs to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// IMAP server.
    pub server: ServerConfig,
    /// Login name.
    pub username: String,
    /// Login password; looked up elsewhere when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Mailboxes filtered every cycle, in order.
    pub mailboxes: Vec<String>,
    /// Sender rules in priority order.
    pub rules: RuleTable,
    /// Pause between cycles.
    #[serde(default = "default_sleep_seconds")]
    pub sleep_seconds: u64,
    /// Append log records to this file as well as the console.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Server hierarchy separator; discovered from the server when absent.
    #[serde(default)]
    pub separator: Option<char>,
    /// How many rules may claim one message.
    #[serde(default)]
    pub match_policy: MatchPolicy,
    /// What a failed batch move aborts.
    #[serde(default)]
    pub move_error_policy: MoveErrorPolicy,
}

const fn default_sleep_seconds() -> u64 {
    DEFAULT_SLEEP_SECONDS
}

const fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Config {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serde`] for malformed JSON, unknown fields or bad
    /// folder paths, and [`Error::Validation`] for semantic problems.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        validate_config(&config).map_err(Error::Validation)?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the file when it cannot be read,
    /// otherwise the errors of [`from_json`](Self::from_json).
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Pause between cycles.
    #[must_use]
    pub const fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep_seconds)
    }

    /// The filtering part of the configuration.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            mailboxes: self.mailboxes.clone(),
            rules: self.rules.clone(),
            sleep: self.sleep(),
            match_policy: self.match_policy,
            move_error_policy: self.move_error_policy,
        }
    }
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
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "server": { "host": "imap.example.com", "port": 993, "security": "tls" },
        "username": "me@example.com",
        "password": null,
        "mailboxes": ["INBOX", "Junk"],
        "rules": [
            { "pattern": "boss@", "folder": "Work/Urgent" },
            { "pattern": "@lists.example.org", "folder": "Lists" }
        ],
        "sleep_seconds": 60,
        "log_file": null,
        "separator": null,
        "match_policy": "first",
        "move_error_policy": "abort-mailbox"
    }"#;

    pub(crate) fn sample() -> Config {
        Config::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn parses_full_document() {
        let config = sample();
        assert_eq!(config.server.host, "imap.example.com");
        assert_eq!(config.server.security, Security::Tls);
        assert_eq!(config.mailboxes, ["INBOX", "Junk"]);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules.rules()[0].folder.to_string(), "Work/Urgent");
        assert_eq!(config.sleep(), Duration::from_secs(60));
        assert_eq!(config.match_policy, MatchPolicy::First);
        assert_eq!(config.move_error_policy, MoveErrorPolicy::AbortMailbox);
    }

    #[test]
    fn optional_fields_default() {
        let config = Config::from_json(
            r#"{
                "server": { "host": "imap.example.com" },
                "username": "me",
                "mailboxes": ["INBOX"],
                "rules": []
            }"#,
        )
        .unwrap();
        assert_eq!(config.server.port, None);
        assert_eq!(config.server.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(config.sleep_seconds, DEFAULT_SLEEP_SECONDS);
        assert_eq!(config.password, None);
        assert_eq!(config.separator, None);
        assert_eq!(config.move_error_policy, MoveErrorPolicy::AbortMailbox);
    }

    #[test]
    fn endpoint_uses_security_default_port() {
        let mut config = sample();
        config.server.port = None;
        config.server.security = Security::StartTls;
        let endpoint = config.server.endpoint();
        assert_eq!(endpoint.port, 143);
        assert_eq!(endpoint.tls, TlsMode::StartTls);
        assert_eq!(endpoint.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let json = SAMPLE.replace(r#""security": "tls""#, r#""security": "tls", "timeout_seconds": 0"#);
        let err = Config::from_json(&json).unwrap_err();
        assert!(matches!(err, Error::Validation(errors) if errors == [ValidationError::ZeroTimeout]));
    }

    #[test]
    fn security_names() {
        let s: Security = serde_json::from_str("\"starttls\"").unwrap();
        assert_eq!(s, Security::StartTls);
        let s: Security = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(s, Security::None);
    }

    #[test]
    fn bad_folder_path_is_rejected_while_parsing() {
        let json = SAMPLE.replace("Work/Urgent", "Work//Urgent");
        assert!(matches!(Config::from_json(&json), Err(Error::Serde(_))));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let json = SAMPLE.replace("\"username\"", "\"user_name\"");
        assert!(Config::from_json(&json).is_err());
    }

    #[test]
    fn zero_sleep_is_a_validation_error() {
        let json = SAMPLE.replace("\"sleep_seconds\": 60", "\"sleep_seconds\": 0");
        let err = Config::from_json(&json).unwrap_err();
        assert!(matches!(err, Error::Validation(errors) if errors == [ValidationError::ZeroSleep]));
    }

    #[test]
    fn settings_carry_policies() {
        let settings = sample().settings();
        assert_eq!(settings.mailboxes, ["INBOX", "Junk"]);
        assert_eq!(settings.sleep, Duration::from_secs(60));
        assert_eq!(settings.rules.len(), 2);
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/inboxsift/config.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(text) if text.contains("/nonexistent")));
    }
}
