//! # inboxsift-core
//!
//! Rule-based mail filtering for `inboxsift`.
//!
//! This crate provides:
//! - Sender rules and case-insensitive matching
//! - Folder hierarchy derivation and provisioning
//! - Classification of a mailbox into a bulk move plan
//! - The poll loop that filters a set of mailboxes forever
//! - Sender statistics to help write rules
//! - JSON configuration and keyring-backed credentials
//!
//! The server is reached through the [`Connector`] and [`MailSession`]
//! traits; [`ImapConnector`] is the production implementation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod analysis;
pub mod classify;
pub mod config;
mod error;
pub mod filter;
pub mod folder;
pub mod message;
pub mod rules;
pub mod service;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentState};
pub use analysis::{SenderHistogram, analyze_mailbox};
pub use classify::{Classification, MovePlan, classify};
pub use config::credentials;
pub use config::{Config, Security, ServerConfig, ValidationError, validate_config};
pub use error::{Error, Result};
pub use filter::{
    CycleReport, Filter, MoveErrorPolicy, ProvisionReport, Settings, execute_plan,
    provision_folders,
};
pub use folder::{FolderPath, derive_hierarchy};
pub use inboxsift_imap::Uid;
pub use message::{MessageRef, sender_address};
pub use rules::{MatchPolicy, Rule, RuleTable};
pub use service::{Connector, DEFAULT_SEPARATOR, ImapConnector, ImapSession, MailSession};
