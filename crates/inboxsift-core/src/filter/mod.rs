//! Provisioning folders and filtering mailboxes.
//!
//! [`Filter`] ties the pieces together: it derives the folder hierarchy
//! from the rules, provisions it, and for each watched mailbox fetches the
//! senders, classifies them and moves the matches in bulk.

mod executor;
mod provision;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

pub use executor::execute_plan;
pub use provision::{ProvisionReport, provision_folders};

use crate::analysis::{SenderHistogram, analyze_mailbox};
use crate::classify::classify;
use crate::folder::{FolderPath, derive_hierarchy};
use crate::rules::{MatchPolicy, RuleTable};
use crate::service::{Connector, MailSession};
use crate::{Error, Result};

/// What a refused batch move aborts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveErrorPolicy {
    /// Skip the rest of the current mailbox, carry on with the next one.
    #[default]
    AbortMailbox,
    /// Skip every remaining mailbox until the next cycle.
    AbortCycle,
}

/// The filtering part of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Mailboxes filtered every cycle, in order.
    pub mailboxes: Vec<String>,
    /// Sender rules in priority order.
    pub rules: RuleTable,
    /// Pause between cycles.
    pub sleep: Duration,
    /// How many rules may claim one message.
    pub match_policy: MatchPolicy,
    /// What a failed batch move aborts.
    pub move_error_policy: MoveErrorPolicy,
}

/// Totals for one pass over the watched mailboxes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Mailboxes filtered to the end.
    pub filtered: usize,
    /// Matches recorded across all mailboxes.
    pub matched: usize,
    /// Distinct messages moved.
    pub moved: usize,
    /// Mailboxes that failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Mailboxes skipped because an earlier one aborted the cycle.
    pub skipped: usize,
}

/// Whether the cycle may go on after a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Abort,
}

/// Rule-driven filter over one account.
#[derive(Debug)]
pub struct Filter<C> {
    connector: C,
    settings: Settings,
}

impl<C: Connector> Filter<C> {
    /// Creates a filter.
    pub const fn new(connector: C, settings: Settings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    /// The settings this filter runs with.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) const fn connector(&self) -> &C {
        &self.connector
    }

    /// Every folder the rules need, parents first.
    #[must_use]
    pub fn hierarchy(&self) -> Vec<FolderPath> {
        derive_hierarchy(self.settings.rules.folders())
    }

    /// Connects, provisions the folder hierarchy and disconnects.
    ///
    /// # Errors
    ///
    /// Returns fatal errors only; refused folders are in the report.
    pub async fn provision(&self) -> Result<ProvisionReport> {
        let mut session = self.connector.connect().await?;
        let report = self.provision_with(&mut session).await?;
        session.disconnect().await?;
        Ok(report)
    }

    /// Provisions the folder hierarchy over an open session.
    ///
    /// # Errors
    ///
    /// Returns fatal errors only; refused folders are in the report.
    pub async fn provision_with(&self, session: &mut C::Session) -> Result<ProvisionReport> {
        info!("Creating mailboxes...");
        let report = provision_folders(session, &self.hierarchy()).await?;
        if report.is_complete() {
            info!("Mailboxes created.");
        } else {
            warn!(
                failed = report.failed.len(),
                "Some mailboxes could not be created"
            );
        }
        Ok(report)
    }

    /// Filters one mailbox and returns the number of matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mailbox`] if the mailbox cannot be selected,
    /// [`Error::Move`] for the first refused batch, and fatal errors as is.
    pub async fn run_once(&self, session: &mut C::Session, mailbox: &str) -> Result<usize> {
        Ok(self.filter_mailbox(session, mailbox).await?.0)
    }

    /// Returns `(matched, moved)`.
    async fn filter_mailbox(&self, session: &mut C::Session, mailbox: &str) -> Result<(usize, usize)> {
        info!("Filtering started on {mailbox}");
        session.select_mailbox(mailbox).await?;
        let messages = session.fetch_messages().await?;

        let classification = classify(
            mailbox,
            &messages,
            &self.settings.rules,
            self.settings.match_policy,
        );
        if classification.matched == 0 {
            info!("There was nothing to do.");
            return Ok((0, 0));
        }

        let moved = execute_plan(session, &classification.plan).await?;
        Ok((classification.matched, moved))
    }

    /// Filters one mailbox as part of a cycle and folds the outcome into
    /// `report`.
    ///
    /// Non-fatal errors are logged and recorded; the returned [`Flow`]
    /// says whether the remaining mailboxes should still run.
    pub(crate) async fn filter_into(
        &self,
        session: &mut C::Session,
        mailbox: &str,
        report: &mut CycleReport,
    ) -> Result<Flow> {
        match self.filter_mailbox(session, mailbox).await {
            Ok((matched, moved)) => {
                report.filtered += 1;
                report.matched += matched;
                report.moved += moved;
                Ok(Flow::Continue)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("Filtering {mailbox} failed: {e}");
                let abort = matches!(e, Error::Move { .. })
                    && self.settings.move_error_policy == MoveErrorPolicy::AbortCycle;
                report.failed.push((mailbox.to_string(), e.to_string()));
                Ok(if abort { Flow::Abort } else { Flow::Continue })
            }
        }
    }

    /// Filters every watched mailbox over an open session.
    ///
    /// # Errors
    ///
    /// Returns fatal errors only; per-mailbox failures are in the report.
    pub async fn filter_mailboxes(&self, session: &mut C::Session) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let mailboxes = &self.settings.mailboxes;

        for (index, mailbox) in mailboxes.iter().enumerate() {
            if self.filter_into(session, mailbox, &mut report).await? == Flow::Abort {
                report.skipped = mailboxes.len() - index - 1;
                warn!(skipped = report.skipped, "Cycle aborted after failed move");
                break;
            }
        }

        Ok(report)
    }

    /// Connects, filters every watched mailbox and disconnects.
    ///
    /// # Errors
    ///
    /// Returns fatal errors only; per-mailbox failures are in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut session = self.connector.connect().await?;
        let report = self.filter_mailboxes(&mut session).await?;
        session.disconnect().await?;
        Ok(report)
    }

    /// Connects, counts the senders in `mailbox` and disconnects.
    ///
    /// # Errors
    ///
    /// Fails if the mailbox cannot be selected or read.
    pub async fn analyze(&self, mailbox: &str) -> Result<SenderHistogram> {
        let mut session = self.connector.connect().await?;
        let histogram = analyze_mailbox(&mut session, mailbox).await?;
        session.disconnect().await?;
        Ok(histogram)
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
    use crate::rules::Rule;
    use crate::testing::{Call, FakeConnector, FakeServer};

    pub(crate) fn settings(rules: &[(&str, &str)], mailboxes: &[&str]) -> Settings {
        Settings {
            mailboxes: mailboxes.iter().map(ToString::to_string).collect(),
            rules: rules
                .iter()
                .map(|(p, f)| Rule::new(*p, f.parse().unwrap()))
                .collect(),
            sleep: Duration::from_secs(60),
            match_policy: MatchPolicy::First,
            move_error_policy: MoveErrorPolicy::AbortMailbox,
        }
    }

    fn filter(server: &FakeServer, settings: Settings) -> Filter<FakeConnector> {
        Filter::new(server.connector(), settings)
    }

    #[test]
    fn hierarchy_comes_from_rules() {
        let f = filter(
            &FakeServer::new(),
            settings(&[("a", "Work/Urgent"), ("b", "Work/Later"), ("c", "Work")], &["INBOX"]),
        );
        let names: Vec<_> = f.hierarchy().iter().map(ToString::to_string).collect();
        assert_eq!(names, ["Work", "Work/Urgent", "Work/Later"]);
    }

    #[tokio::test]
    async fn provision_connects_and_disconnects() {
        let server = FakeServer::new();
        let f = filter(&server, settings(&[("boss@", "Work/Urgent")], &["INBOX"]));

        let report = f.provision().await.unwrap();

        assert_eq!(report.created, ["Work", "Work.Urgent"]);
        let calls = server.calls();
        assert_eq!(calls.first(), Some(&Call::Connect));
        assert_eq!(calls.last(), Some(&Call::Disconnect));
    }

    #[tokio::test]
    async fn run_once_moves_matches_in_bulk() {
        let server = FakeServer::new()
            .with_folders(["Work", "Work.Urgent", "Lists"])
            .with_mailbox(
                "INBOX",
                [
                    (1, "boss@corp.com"),
                    (2, "friend@home.net"),
                    (3, "BOSS@corp.com"),
                    (4, "digest@lists.example.org"),
                    (5, "the.boss@corp.com"),
                ],
            );
        let f = filter(
            &server,
            settings(
                &[("boss@", "Work/Urgent"), ("@lists.example.org", "Lists")],
                &["INBOX"],
            ),
        );
        let mut session = f.connector().connect().await.unwrap();

        let matched = f.run_once(&mut session, "INBOX").await.unwrap();

        assert_eq!(matched, 4);
        assert_eq!(server.mailbox_uids("INBOX"), [2]);
        assert_eq!(server.mailbox_uids("Work.Urgent"), [1, 3, 5]);
        assert_eq!(
            server.calls_matching(|c| matches!(c, Call::Move { .. })),
            [
                Call::Move {
                    folder: "Work.Urgent".into(),
                    uids: vec![1, 3, 5],
                },
                Call::Move {
                    folder: "Lists".into(),
                    uids: vec![4],
                },
            ]
        );
    }

    #[tokio::test]
    async fn run_once_with_nothing_to_do() {
        let server = FakeServer::new().with_mailbox("INBOX", [(1, "friend@home.net")]);
        let f = filter(&server, settings(&[("boss@", "Work")], &["INBOX"]));
        let mut session = f.connector().connect().await.unwrap();

        assert_eq!(f.run_once(&mut session, "INBOX").await.unwrap(), 0);
        assert!(server.calls_matching(|c| matches!(c, Call::Move { .. })).is_empty());
    }

    #[tokio::test]
    async fn missing_mailbox_does_not_stop_the_cycle() {
        let server = FakeServer::new()
            .with_folders(["Work"])
            .with_mailbox("INBOX", [(1, "boss@corp.com")]);
        let f = filter(&server, settings(&[("boss@", "Work")], &["Nope", "INBOX"]));

        let report = f.run_cycle().await.unwrap();

        assert_eq!(report.filtered, 1);
        assert_eq!(report.moved, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Nope");
        assert_eq!(server.calls().last(), Some(&Call::Disconnect));
    }

    #[tokio::test]
    async fn failed_move_aborts_only_the_mailbox_by_default() {
        let server = FakeServer::new()
            .with_folders(["Lists"])
            .with_mailbox("INBOX", [(1, "boss@corp.com"), (2, "x@lists.org")])
            .with_mailbox("Other", [(3, "y@lists.org")]);
        let f = filter(
            &server,
            settings(&[("boss@", "Work"), ("@lists.org", "Lists")], &["INBOX", "Other"]),
        );

        let report = f.run_cycle().await.unwrap();

        // "Work" was never provisioned, so the first batch fails and the
        // "Lists" batch of INBOX is not attempted.
        assert_eq!(server.mailbox_uids("INBOX"), [1, 2]);
        assert_eq!(server.mailbox_uids("Lists"), [3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.filtered, 1);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn failed_move_can_abort_the_cycle() {
        let server = FakeServer::new()
            .with_folders(["Lists", "Third"])
            .with_mailbox("INBOX", [(1, "boss@corp.com")])
            .with_mailbox("Other", [(3, "y@lists.org")]);
        let mut s = settings(
            &[("boss@", "Work"), ("@lists.org", "Lists")],
            &["INBOX", "Other", "Third"],
        );
        s.move_error_policy = MoveErrorPolicy::AbortCycle;
        let f = filter(&server, s);

        let report = f.run_cycle().await.unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(server.mailbox_uids("Other"), [3]);
        assert!(!server.calls().contains(&Call::Select("Other".into())));
    }

    #[tokio::test]
    async fn lost_connection_ends_the_cycle() {
        let server = FakeServer::new().with_mailbox("INBOX", [(1, "boss@corp.com")]);
        let f = filter(&server, settings(&[("boss@", "Work")], &["INBOX"]));
        let mut session = f.connector().connect().await.unwrap();
        server.drop_connection();

        let err = f.filter_mailboxes(&mut session).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn analyze_counts_senders() {
        let server = FakeServer::new().with_mailbox(
            "INBOX",
            [(1, "a@x.org"), (2, "b@y.org"), (3, "a@x.org")],
        );
        let f = filter(&server, settings(&[], &["INBOX"]));

        let histogram = f.analyze("INBOX").await.unwrap();
        assert_eq!(histogram.count("a@x.org"), 2);
        assert_eq!(histogram.total(), 3);
        assert_eq!(server.calls().last(), Some(&Call::Disconnect));
    }
}
