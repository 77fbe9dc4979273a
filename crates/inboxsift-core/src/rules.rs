//! Sender rules.
//!
//! A rule maps a sender pattern to a destination folder. Matching is a
//! case-insensitive substring test against the sender address, so
//! `@example.com` catches a whole domain and `boss@` catches one mailbox
//! name at any domain.

use serde::{Deserialize, Serialize};

use crate::folder::FolderPath;

/// One pattern-to-folder rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Text looked for inside the sender address.
    pub pattern: String,
    /// Where matching messages go.
    pub folder: FolderPath,
}

impl Rule {
    /// Creates a rule.
    #[must_use]
    pub fn new(pattern: impl Into<String>, folder: FolderPath) -> Self {
        Self {
            pattern: pattern.into(),
            folder,
        }
    }

    /// Returns true if `sender` contains the pattern, ignoring case.
    #[must_use]
    pub fn matches(&self, sender: &str) -> bool {
        sender.to_lowercase().contains(&self.pattern.to_lowercase())
    }
}

/// How many rules may claim one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// The first matching rule in table order wins.
    #[default]
    First,
    /// Every matching rule records a move for the message.
    ///
    /// After the first move the message is gone from the source mailbox,
    /// so the later moves of the same UID fail or hit a different message.
    All,
}

/// Ordered set of rules.
///
/// Order matters under [`MatchPolicy::First`]. Patterns are lowercased once
/// when the table is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Rule>", into = "Vec<Rule>")]
pub struct RuleTable {
    rules: Vec<Rule>,
    needles: Vec<String>,
}

impl RuleTable {
    /// Builds a table from rules in priority order.
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        let needles = rules.iter().map(|r| r.pattern.to_lowercase()).collect();
        Self { rules, needles }
    }

    /// The rules in table order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Target folders in table order, repeats included.
    pub fn folders(&self) -> impl Iterator<Item = &FolderPath> {
        self.rules.iter().map(|r| &r.folder)
    }

    /// Rules whose pattern occurs in `sender`, in table order.
    pub fn matching<'a>(&'a self, sender: &str) -> impl Iterator<Item = &'a Rule> + 'a {
        let sender = sender.to_lowercase();
        self.rules
            .iter()
            .zip(&self.needles)
            .filter(move |(_, needle)| sender.contains(needle.as_str()))
            .map(|(rule, _)| rule)
    }

    /// Rules that apply to `sender` under `policy`.
    pub fn select<'a>(
        &'a self,
        sender: &str,
        policy: MatchPolicy,
    ) -> impl Iterator<Item = &'a Rule> + 'a {
        let limit = match policy {
            MatchPolicy::First => 1,
            MatchPolicy::All => usize::MAX,
        };
        self.matching(sender).take(limit)
    }
}

impl From<Vec<Rule>> for RuleTable {
    fn from(rules: Vec<Rule>) -> Self {
        Self::new(rules)
    }
}

impl From<RuleTable> for Vec<Rule> {
    fn from(table: RuleTable) -> Self {
        table.rules
    }
}

impl FromIterator<Rule> for RuleTable {
    fn from_iter<T: IntoIterator<Item = Rule>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
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

    fn rule(pattern: &str, folder: &str) -> Rule {
        Rule::new(pattern, FolderPath::parse(folder).unwrap())
    }

    fn table() -> RuleTable {
        RuleTable::new(vec![
            rule("boss@", "Work/Urgent"),
            rule("@lists.example.org", "Lists"),
            rule("example", "Misc"),
        ])
    }

    #[test]
    fn rule_matching_ignores_case() {
        let r = rule("boss@", "Work");
        assert!(r.matches("boss@corp.com"));
        assert!(r.matches("BOSS@corp.com"));
        assert!(r.matches("the.Boss@corp.com"));
        assert!(!r.matches("bossy.corp.com"));
    }

    #[test]
    fn pattern_case_is_ignored_too() {
        let t = RuleTable::new(vec![rule("NEWS@", "News")]);
        assert_eq!(t.matching("news@paper.com").count(), 1);
    }

    #[test]
    fn matching_keeps_table_order() {
        let t = table();
        let hits: Vec<_> = t
            .matching("digest@lists.example.org")
            .map(|r| r.folder.to_string())
            .collect();
        assert_eq!(hits, ["Lists", "Misc"]);
    }

    #[test]
    fn first_policy_takes_one() {
        let t = table();
        let hits: Vec<_> = t
            .select("digest@lists.example.org", MatchPolicy::First)
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].folder.to_string(), "Lists");
    }

    #[test]
    fn all_policy_takes_every_match() {
        let t = table();
        assert_eq!(
            t.select("digest@lists.example.org", MatchPolicy::All).count(),
            2
        );
    }

    #[test]
    fn no_match() {
        assert_eq!(table().matching("stranger@elsewhere.net").count(), 0);
    }

    #[test]
    fn deserializes_from_rule_list() {
        let json = r#"[{"pattern": "boss@", "folder": "Work/Urgent"}]"#;
        let t: RuleTable = serde_json::from_str(json).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.matching("BOSS@corp.com").count(), 1);
        assert_eq!(t.folders().next().unwrap().to_wire('.'), "Work.Urgent");
    }

    #[test]
    fn match_policy_names() {
        assert_eq!(
            serde_json::from_str::<MatchPolicy>("\"all\"").unwrap(),
            MatchPolicy::All
        );
        assert_eq!(MatchPolicy::default(), MatchPolicy::First);
    }
}
