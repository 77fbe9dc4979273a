//! The part of a message the filter looks at.

use inboxsift_imap::Uid;

/// A message in the selected mailbox, reduced to what rules need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    /// Stable identifier inside the mailbox.
    pub uid: Uid,
    /// Sender address, without display name.
    pub sender: String,
    /// Subject line, for logging only.
    pub subject: String,
}

impl MessageRef {
    /// Creates a message reference.
    #[must_use]
    pub fn new(uid: Uid, sender: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            uid,
            sender: sender.into(),
            subject: subject.into(),
        }
    }
}

/// Extracts the bare address from a `From` header value.
///
/// `"Jane Doe" <jane@example.com>` becomes `jane@example.com`. Without angle
/// brackets the first whitespace-separated word containing `@` is used, and
/// failing that the trimmed value itself. Only the first of several
/// comma-separated mailboxes is considered.
#[must_use]
pub fn sender_address(from: &str) -> String {
    let from = from.trim();

    if let Some(open) = from.find('<')
        && let Some(len) = from[open + 1..].find('>')
    {
        return from[open + 1..open + 1 + len].trim().to_string();
    }

    let first = from.split(',').next().unwrap_or_default();
    first
        .split_whitespace()
        .find(|word| word.contains('@'))
        .map_or_else(|| first.trim(), |word| word.trim_matches(['"', '(', ')']))
        .to_string()
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
    fn display_name_and_brackets() {
        assert_eq!(
            sender_address("\"Jane Doe\" <jane@example.com>"),
            "jane@example.com"
        );
        assert_eq!(sender_address("Boss <BOSS@corp.com>"), "BOSS@corp.com");
    }

    #[test]
    fn bare_address() {
        assert_eq!(sender_address("  news@paper.com "), "news@paper.com");
    }

    #[test]
    fn address_with_comment() {
        assert_eq!(sender_address("news@paper.com (Daily News)"), "news@paper.com");
    }

    #[test]
    fn first_of_many() {
        assert_eq!(sender_address("a@x.org, b@y.org"), "a@x.org");
    }

    #[test]
    fn no_address_at_all() {
        assert_eq!(sender_address("MAILER-DAEMON"), "MAILER-DAEMON");
        assert_eq!(sender_address(""), "");
    }
}
