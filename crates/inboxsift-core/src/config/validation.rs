//! Configuration validation.

use super::Config;

/// A reason a configuration cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Server host is empty.
    EmptyHost,
    /// Port was given as 0.
    InvalidPort,
    /// Username is empty.
    EmptyUsername,
    /// No mailbox to watch.
    NoMailboxes,
    /// A watched mailbox name is empty.
    EmptyMailbox,
    /// A rule pattern is empty and would match every sender.
    EmptyPattern {
        /// Position of the rule in the table.
        index: usize,
    },
    /// Sleep interval is zero.
    ZeroSleep,
    /// Connect and command timeout is zero.
    ZeroTimeout,
    /// Wire separator is whitespace or a control character.
    InvalidSeparator(char),
}

impl ValidationError {
    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyHost => "server.host",
            Self::InvalidPort => "server.port",
            Self::EmptyUsername => "username",
            Self::NoMailboxes | Self::EmptyMailbox => "mailboxes",
            Self::EmptyPattern { .. } => "rules",
            Self::ZeroSleep => "sleep_seconds",
            Self::ZeroTimeout => "server.timeout_seconds",
            Self::InvalidSeparator(_) => "separator",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyHost => f.write_str("Server host is required"),
            Self::InvalidPort => f.write_str("Server port must be 1-65535"),
            Self::EmptyUsername => f.write_str("Username is required"),
            Self::NoMailboxes => f.write_str("At least one mailbox must be watched"),
            Self::EmptyMailbox => f.write_str("Mailbox names must not be empty"),
            Self::EmptyPattern { index } => write!(f, "Rule {index} has an empty pattern"),
            Self::ZeroSleep => f.write_str("Sleep interval must be at least one second"),
            Self::ZeroTimeout => f.write_str("Timeout must be at least one second"),
            Self::InvalidSeparator(c) => write!(f, "{c:?} cannot be used as folder separator"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a configuration.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Checks a configuration, collecting every problem.
///
/// Folder paths are checked when they are parsed, so they cannot be
/// invalid here.
///
/// # Errors
///
/// Returns all [`ValidationError`]s found.
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.server.port == Some(0) {
        errors.push(ValidationError::InvalidPort);
    }
    if config.server.timeout_seconds == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.username.trim().is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }

    if config.mailboxes.is_empty() {
        errors.push(ValidationError::NoMailboxes);
    } else if config.mailboxes.iter().any(|m| m.trim().is_empty()) {
        errors.push(ValidationError::EmptyMailbox);
    }

    for (index, rule) in config.rules.rules().iter().enumerate() {
        if rule.pattern.is_empty() {
            errors.push(ValidationError::EmptyPattern { index });
        }
    }

    if config.sleep_seconds == 0 {
        errors.push(ValidationError::ZeroSleep);
    }

    if let Some(separator) = config.separator
        && (separator.is_whitespace() || separator.is_control())
    {
        errors.push(ValidationError::InvalidSeparator(separator));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
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
mod tests {
    use super::*;
    use crate::config::tests::sample;
    use crate::rules::{Rule, RuleTable};

    #[test]
    fn sample_is_valid() {
        assert_eq!(validate_config(&sample()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = sample();
        config.server.host = "  ".into();
        config.username = String::new();
        config.mailboxes.clear();
        config.sleep_seconds = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            [
                ValidationError::EmptyHost,
                ValidationError::EmptyUsername,
                ValidationError::NoMailboxes,
                ValidationError::ZeroSleep,
            ]
        );
    }

    #[test]
    fn empty_pattern_is_reported_with_index() {
        let mut config = sample();
        let mut rules = config.rules.rules().to_vec();
        rules.push(Rule::new("", "Trash".parse().unwrap()));
        config.rules = RuleTable::new(rules);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, [ValidationError::EmptyPattern { index: 2 }]);
        assert_eq!(errors[0].field(), "rules");
    }

    #[test]
    fn blank_mailbox_name() {
        let mut config = sample();
        config.mailboxes.push(String::new());
        assert_eq!(
            validate_config(&config).unwrap_err(),
            [ValidationError::EmptyMailbox]
        );
    }

    #[test]
    fn slash_separator_is_accepted() {
        let mut config = sample();
        config.separator = Some('/');
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn whitespace_separator() {
        let mut config = sample();
        config.separator = Some(' ');
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, [ValidationError::InvalidSeparator(' ')]);
        assert_eq!(errors[0].field(), "separator");
    }

    #[test]
    fn zero_timeout() {
        let mut config = sample();
        config.server.timeout_seconds = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, [ValidationError::ZeroTimeout]);
        assert_eq!(errors[0].field(), "server.timeout_seconds");
    }

    #[test]
    fn port_zero() {
        let mut config = sample();
        config.server.port = Some(0);
        assert_eq!(
            validate_config(&config).unwrap_err(),
            [ValidationError::InvalidPort]
        );
    }
}
