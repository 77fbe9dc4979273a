//! The poll loop.
//!
//! ```text
//!             ┌──────────── (first pass only) ───────────┐
//! Disconnected ── connect ──→ Provisioning ──→ Filtering(0) ──→ … ──→ Filtering(n-1)
//!      ↑                                                                   │
//!   Sleeping ←──────────────────── Disconnecting ←────────────────────────┘
//! ```
//!
//! Every cycle opens a fresh session. Folders are provisioned once, in the
//! first session. A mailbox that fails is skipped; the agent only stops on
//! fatal errors such as rejected credentials or a lost connection.

use std::convert::Infallible;

use tracing::{debug, info};

use crate::filter::{CycleReport, Filter, Flow};
use crate::service::{Connector, MailSession};
use crate::{Error, Result};

/// Where the agent is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// No session; the next step connects.
    Disconnected,
    /// Connected for the first time; the next step creates missing folders.
    Provisioning,
    /// The next step filters the mailbox at this index.
    Filtering {
        /// Position in the watched mailbox list.
        index: usize,
    },
    /// Every mailbox has been handled; the next step logs out.
    Disconnecting,
    /// The next step waits out the sleep interval.
    Sleeping,
}

/// Drives a [`Filter`] forever.
pub struct Agent<C: Connector> {
    filter: Filter<C>,
    state: AgentState,
    session: Option<C::Session>,
    provisioned: bool,
    report: CycleReport,
    cycles: u64,
}

impl<C: Connector> Agent<C> {
    /// Creates an agent that has not connected yet.
    pub fn new(filter: Filter<C>) -> Self {
        Self {
            filter,
            state: AgentState::Disconnected,
            session: None,
            provisioned: false,
            report: CycleReport::default(),
            cycles: 0,
        }
    }

    /// Current state.
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Completed cycles.
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Totals of the cycle in progress, or of the last one while sleeping.
    pub const fn report(&self) -> &CycleReport {
        &self.report
    }

    /// Performs one transition and returns the new state.
    ///
    /// After an error the session is dropped and the agent is back in
    /// [`AgentState::Disconnected`].
    ///
    /// # Errors
    ///
    /// Returns fatal errors; failures confined to one mailbox or folder are
    /// logged and do not surface here.
    pub async fn step(&mut self) -> Result<AgentState> {
        match self.advance().await {
            Ok(next) => {
                self.state = next;
                Ok(next)
            }
            Err(e) => {
                self.session = None;
                self.state = AgentState::Disconnected;
                Err(e)
            }
        }
    }

    /// Steps until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error.
    pub async fn run(&mut self) -> Result<Infallible> {
        loop {
            self.step().await?;
        }
    }

    async fn advance(&mut self) -> Result<AgentState> {
        match self.state {
            AgentState::Disconnected => {
                self.session = Some(self.filter.connector().connect().await?);
                self.report = CycleReport::default();
                Ok(if self.provisioned {
                    self.first_mailbox()
                } else {
                    AgentState::Provisioning
                })
            }
            AgentState::Provisioning => {
                let session = self.session.as_mut().ok_or_else(no_session)?;
                self.filter.provision_with(session).await?;
                self.provisioned = true;
                Ok(self.first_mailbox())
            }
            AgentState::Filtering { index } => {
                let mailboxes = &self.filter.settings().mailboxes;
                let Some(mailbox) = mailboxes.get(index) else {
                    return Ok(AgentState::Disconnecting);
                };
                let session = self.session.as_mut().ok_or_else(no_session)?;
                let flow = self.filter.filter_into(session, mailbox, &mut self.report).await?;

                let next = index + 1;
                if flow == Flow::Abort {
                    self.report.skipped = mailboxes.len() - next;
                    Ok(AgentState::Disconnecting)
                } else if next < mailboxes.len() {
                    Ok(AgentState::Filtering { index: next })
                } else {
                    Ok(AgentState::Disconnecting)
                }
            }
            AgentState::Disconnecting => {
                if let Some(session) = self.session.take() {
                    session.disconnect().await?;
                }
                self.cycles += 1;
                info!(
                    matched = self.report.matched,
                    moved = self.report.moved,
                    failed = self.report.failed.len(),
                    skipped = self.report.skipped,
                    "Cycle {} finished",
                    self.cycles
                );
                Ok(AgentState::Sleeping)
            }
            AgentState::Sleeping => {
                let sleep = self.filter.settings().sleep;
                debug!("Filtering done. Rerunning in {} seconds.", sleep.as_secs());
                tokio::time::sleep(sleep).await;
                debug!("Filtering triggered by timer.");
                Ok(AgentState::Disconnected)
            }
        }
    }

    fn first_mailbox(&self) -> AgentState {
        if self.filter.settings().mailboxes.is_empty() {
            AgentState::Disconnecting
        } else {
            AgentState::Filtering { index: 0 }
        }
    }
}

fn no_session() -> Error {
    Error::Protocol("no open session".to_string())
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
    use std::time::Duration;

    use super::*;
    use crate::filter::MoveErrorPolicy;
    use crate::filter::tests::settings;
    use crate::testing::{Call, FakeConnector, FakeServer};

    fn agent(server: &FakeServer, rules: &[(&str, &str)], mailboxes: &[&str]) -> Agent<FakeConnector> {
        Agent::new(Filter::new(server.connector(), settings(rules, mailboxes)))
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_walks_every_state() {
        let server = FakeServer::new()
            .with_mailbox("INBOX", [(1, "boss@corp.com")])
            .with_mailbox("Junk", [(2, "friend@home.net")]);
        let mut agent = agent(&server, &[("boss@", "Work/Urgent")], &["INBOX", "Junk"]);

        assert_eq!(agent.state(), AgentState::Disconnected);
        assert_eq!(agent.step().await.unwrap(), AgentState::Provisioning);
        assert_eq!(agent.step().await.unwrap(), AgentState::Filtering { index: 0 });
        assert!(server.folder_exists("Work.Urgent"));
        assert_eq!(agent.step().await.unwrap(), AgentState::Filtering { index: 1 });
        assert_eq!(server.mailbox_uids("Work.Urgent"), [1]);
        assert_eq!(agent.step().await.unwrap(), AgentState::Disconnecting);
        assert_eq!(agent.step().await.unwrap(), AgentState::Sleeping);
        assert_eq!(agent.cycles(), 1);
        assert_eq!(agent.report().moved, 1);
        assert_eq!(agent.report().filtered, 2);
        assert_eq!(server.calls().last(), Some(&Call::Disconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn sleeping_waits_the_interval() {
        let server = FakeServer::new();
        let mut agent = agent(&server, &[], &["INBOX"]);
        while agent.state() != AgentState::Sleeping {
            agent.step().await.unwrap();
        }

        let started = tokio::time::Instant::now();
        assert_eq!(agent.step().await.unwrap(), AgentState::Disconnected);
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn later_cycles_skip_provisioning() {
        let server = FakeServer::new();
        let mut agent = agent(&server, &[("boss@", "Work")], &["INBOX"]);
        while agent.cycles() < 1 || agent.state() != AgentState::Disconnected {
            agent.step().await.unwrap();
        }
        server.clear_calls();

        assert_eq!(agent.step().await.unwrap(), AgentState::Filtering { index: 0 });
        assert!(server.calls_matching(|c| matches!(c, Call::Exists(_) | Call::Create(_))).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_cycling_and_provisions_once() {
        let server = FakeServer::new().with_mailbox("INBOX", [(1, "boss@corp.com")]);
        let mut agent = agent(&server, &[("boss@", "Work")], &["INBOX"]);

        let outcome = tokio::time::timeout(Duration::from_secs(200), agent.run()).await;

        assert!(outcome.is_err(), "run only returns on fatal errors");
        let connects = server.calls_matching(|c| *c == Call::Connect).len();
        assert!(connects >= 3, "expected several cycles, got {connects}");
        assert_eq!(server.calls_matching(|c| matches!(c, Call::Create(_))).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_mailbox_is_skipped() {
        let server = FakeServer::new().with_mailbox("INBOX", [(1, "boss@corp.com")]);
        let mut agent = agent(&server, &[("boss@", "Work")], &["Gone", "INBOX"]);
        while agent.state() != AgentState::Sleeping {
            agent.step().await.unwrap();
        }

        assert_eq!(agent.report().failed.len(), 1);
        assert_eq!(server.mailbox_uids("Work"), [1]);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_cycle_goes_straight_to_disconnect() {
        let server = FakeServer::new()
            .refuse_create("Work")
            .with_mailbox("INBOX", [(1, "boss@corp.com")])
            .with_folders(["Other"]);
        let mut s = settings(&[("boss@", "Work")], &["INBOX", "Other"]);
        s.move_error_policy = MoveErrorPolicy::AbortCycle;
        let mut agent = Agent::new(Filter::new(server.connector(), s));

        agent.step().await.unwrap();
        agent.step().await.unwrap();
        assert_eq!(agent.step().await.unwrap(), AgentState::Disconnecting);
        assert_eq!(agent.report().skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_login_is_fatal() {
        let server = FakeServer::new().reject_login();
        let mut agent = agent(&server, &[], &["INBOX"]);

        let err = agent.run().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(agent.state(), AgentState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_connection_resets_to_disconnected() {
        let server = FakeServer::new();
        let mut agent = agent(&server, &[("boss@", "Work")], &["INBOX"]);
        agent.step().await.unwrap();

        server.drop_connection();
        assert!(agent.step().await.unwrap_err().is_fatal());
        assert_eq!(agent.state(), AgentState::Disconnected);

        server.restore_connection();
        assert_eq!(agent.step().await.unwrap(), AgentState::Provisioning);
    }
}
