//! Sender statistics for writing rules.

use std::collections::HashMap;

use crate::Result;
use crate::message::MessageRef;
use crate::service::MailSession;

/// How many messages each sender has in a mailbox.
///
/// Addresses are counted case-insensitively, matching how rules compare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderHistogram {
    counts: HashMap<String, usize>,
}

impl SenderHistogram {
    /// Counts the senders of `messages`.
    #[must_use]
    pub fn from_messages(messages: &[MessageRef]) -> Self {
        let mut histogram = Self::default();
        for message in messages {
            histogram.add(&message.sender);
        }
        histogram
    }

    fn add(&mut self, sender: &str) {
        *self.counts.entry(sender.to_lowercase()).or_insert(0) += 1;
    }

    /// Messages from `sender`.
    #[must_use]
    pub fn count(&self, sender: &str) -> usize {
        self.counts
            .get(&sender.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Messages counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Distinct senders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if no message was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Senders by descending count, ties by address.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<_> = self
            .counts
            .iter()
            .map(|(sender, &count)| (sender.as_str(), count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Counts the senders in `mailbox` without changing anything.
///
/// # Errors
///
/// Fails if the mailbox cannot be selected or read.
pub async fn analyze_mailbox<M: MailSession>(
    session: &mut M,
    mailbox: &str,
) -> Result<SenderHistogram> {
    session.select_mailbox(mailbox).await?;
    let messages = session.fetch_messages().await?;
    Ok(SenderHistogram::from_messages(&messages))
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
    use crate::Error;
    use crate::service::Connector;
    use crate::testing::{Call, FakeServer};
    use inboxsift_imap::Uid;

    fn msg(uid: u32, sender: &str) -> MessageRef {
        MessageRef::new(Uid::new(uid).unwrap(), sender, "")
    }

    #[test]
    fn counts_and_ranks() {
        let histogram = SenderHistogram::from_messages(&[
            msg(1, "b@x.org"),
            msg(2, "a@x.org"),
            msg(3, "news@paper.com"),
            msg(4, "News@Paper.com"),
            msg(5, "news@paper.com"),
        ]);

        assert_eq!(histogram.count("news@paper.com"), 3);
        assert_eq!(histogram.count("NEWS@paper.com"), 3);
        assert_eq!(histogram.count("nobody@x.org"), 0);
        assert_eq!(histogram.total(), 5);
        assert_eq!(histogram.len(), 3);
        assert_eq!(
            histogram.ranked(),
            [("news@paper.com", 3), ("a@x.org", 1), ("b@x.org", 1)]
        );
    }

    #[test]
    fn empty_mailbox() {
        let histogram = SenderHistogram::from_messages(&[]);
        assert!(histogram.is_empty());
        assert_eq!(histogram.total(), 0);
        assert!(histogram.ranked().is_empty());
    }

    #[tokio::test]
    async fn analysis_moves_nothing() {
        let server = FakeServer::new()
            .with_folders(["Work"])
            .with_mailbox("INBOX", [(1, "boss@corp.com"), (2, "boss@corp.com")]);
        let mut session = server.connector().connect().await.unwrap();

        let histogram = analyze_mailbox(&mut session, "INBOX").await.unwrap();

        assert_eq!(histogram.count("boss@corp.com"), 2);
        assert_eq!(server.mailbox_uids("INBOX"), [1, 2]);
        assert!(server.calls_matching(|c| matches!(c, Call::Move { .. } | Call::Create(_))).is_empty());
    }

    #[tokio::test]
    async fn unknown_mailbox() {
        let server = FakeServer::new();
        let mut session = server.connector().connect().await.unwrap();

        let err = analyze_mailbox(&mut session, "Nope").await.unwrap_err();
        assert!(matches!(err, Error::Mailbox { .. }));
    }
}
