//! Turning a mailbox listing into a move plan.

use std::collections::BTreeSet;

use inboxsift_imap::Uid;
use tracing::info;

use crate::folder::FolderPath;
use crate::message::MessageRef;
use crate::rules::{MatchPolicy, RuleTable};

/// Destination folders and the messages bound for each.
///
/// Folders keep the order in which they were first matched; each UID is
/// listed at most once per folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovePlan {
    entries: Vec<(FolderPath, BTreeSet<Uid>)>,
}

impl MovePlan {
    /// An empty plan.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, folder: &FolderPath, uid: Uid) {
        match self.entries.iter_mut().find(|(f, _)| f == folder) {
            Some((_, uids)) => {
                uids.insert(uid);
            }
            None => self.entries.push((folder.clone(), BTreeSet::from([uid]))),
        }
    }

    /// UIDs planned for `folder`.
    #[must_use]
    pub fn get(&self, folder: &FolderPath) -> Option<&BTreeSet<Uid>> {
        self.entries
            .iter()
            .find_map(|(f, uids)| (f == folder).then_some(uids))
    }

    /// Entries in first-match order.
    pub fn iter(&self) -> impl Iterator<Item = (&FolderPath, &BTreeSet<Uid>)> {
        self.entries.iter().map(|(f, uids)| (f, uids))
    }

    /// Number of destination folders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is to be moved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total UIDs across all folders.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.entries.iter().map(|(_, uids)| uids.len()).sum()
    }
}

impl FromIterator<(FolderPath, Uid)> for MovePlan {
    fn from_iter<T: IntoIterator<Item = (FolderPath, Uid)>>(iter: T) -> Self {
        let mut plan = Self::new();
        for (folder, uid) in iter {
            plan.insert(&folder, uid);
        }
        plan
    }
}

/// Outcome of classifying one mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// What to move where.
    pub plan: MovePlan,
    /// Number of (message, rule) matches recorded.
    pub matched: usize,
}

/// Matches every message against the rules and builds the move plan.
///
/// Each recorded match is logged with the sender and subject so the log
/// shows why a message moved.
#[must_use]
pub fn classify(
    mailbox: &str,
    messages: &[MessageRef],
    rules: &RuleTable,
    policy: MatchPolicy,
) -> Classification {
    let mut result = Classification::default();

    for message in messages {
        for rule in rules.select(&message.sender, policy) {
            info!(
                from = %message.sender,
                subject = %message.subject,
                "Moving from {mailbox} to {}",
                rule.folder
            );
            result.plan.insert(&rule.folder, message.uid);
            result.matched += 1;
        }
    }

    result
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
    use crate::rules::Rule;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn path(s: &str) -> FolderPath {
        FolderPath::parse(s).unwrap()
    }

    fn msg(n: u32, sender: &str) -> MessageRef {
        MessageRef::new(uid(n), sender, format!("message {n}"))
    }

    fn rules(pairs: &[(&str, &str)]) -> RuleTable {
        pairs.iter().map(|(p, f)| Rule::new(*p, path(f))).collect()
    }

    #[test]
    fn classifies_by_domain_and_address() {
        let rules = rules(&[("@lists.example.org", "Lists"), ("boss@", "Work/Urgent")]);
        let messages = [
            msg(1, "digest@lists.example.org"),
            msg(2, "friend@home.net"),
            msg(3, "boss@corp.com"),
        ];

        let result = classify("INBOX", &messages, &rules, MatchPolicy::First);

        assert_eq!(result.matched, 2);
        assert_eq!(result.plan.len(), 2);
        assert_eq!(result.plan.get(&path("Lists")).unwrap(), &BTreeSet::from([uid(1)]));
        assert_eq!(
            result.plan.get(&path("Work/Urgent")).unwrap(),
            &BTreeSet::from([uid(3)])
        );
    }

    #[test]
    fn matching_ignores_sender_case() {
        let rules = rules(&[("boss@", "Work")]);
        let result = classify("INBOX", &[msg(7, "BOSS@corp.com")], &rules, MatchPolicy::First);
        assert_eq!(result.matched, 1);
        assert!(result.plan.get(&path("Work")).unwrap().contains(&uid(7)));
    }

    #[test]
    fn nothing_matches() {
        let rules = rules(&[("boss@", "Work")]);
        let result = classify(
            "INBOX",
            &[msg(1, "a@b.c"), msg(2, "d@e.f")],
            &rules,
            MatchPolicy::First,
        );
        assert_eq!(result.matched, 0);
        assert!(result.plan.is_empty());
    }

    #[test]
    fn empty_mailbox() {
        let result = classify("INBOX", &[], &rules(&[("x", "Y")]), MatchPolicy::First);
        assert_eq!(result, Classification::default());
    }

    #[test]
    fn folders_keep_first_match_order() {
        let rules = rules(&[("@b", "B"), ("@a", "A")]);
        let messages = [msg(1, "x@a"), msg(2, "x@b"), msg(3, "y@a")];
        let result = classify("INBOX", &messages, &rules, MatchPolicy::First);

        let order: Vec<_> = result.plan.iter().map(|(f, _)| f.to_string()).collect();
        assert_eq!(order, ["A", "B"]);
        assert_eq!(result.plan.message_count(), 3);
    }

    #[test]
    fn first_policy_uses_table_order() {
        let rules = rules(&[("boss@", "Work/Urgent"), ("@corp.com", "Work")]);
        let result = classify("INBOX", &[msg(1, "boss@corp.com")], &rules, MatchPolicy::First);
        assert_eq!(result.matched, 1);
        assert!(result.plan.get(&path("Work")).is_none());
    }

    // Under `all` one message lands in two plans. Only the first move can
    // succeed because the message leaves the source mailbox.
    #[test]
    fn all_policy_records_every_match() {
        let rules = rules(&[("boss@", "Work/Urgent"), ("@corp.com", "Work")]);
        let result = classify("INBOX", &[msg(1, "boss@corp.com")], &rules, MatchPolicy::All);
        assert_eq!(result.matched, 2);
        assert!(result.plan.get(&path("Work/Urgent")).unwrap().contains(&uid(1)));
        assert!(result.plan.get(&path("Work")).unwrap().contains(&uid(1)));
    }

    #[test]
    fn same_folder_twice_keeps_one_uid() {
        let rules = rules(&[("boss@", "Work"), ("@corp.com", "Work")]);
        let result = classify("INBOX", &[msg(4, "boss@corp.com")], &rules, MatchPolicy::All);
        assert_eq!(result.matched, 2);
        assert_eq!(result.plan.message_count(), 1);
    }

    #[test]
    fn plan_from_pairs() {
        let plan: MovePlan = [(path("A"), uid(2)), (path("A"), uid(1)), (path("B"), uid(3))]
            .into_iter()
            .collect();
        let a: Vec<_> = plan.get(&path("A")).unwrap().iter().map(|u| u.get()).collect();
        assert_eq!(a, [1, 2]);
        assert_eq!(plan.len(), 2);
    }
}
