//! `inboxsift` - server-side mail filtering agent.
//!
//! Watches IMAP mailboxes and moves messages into folders according to
//! sender rules, sleeping between passes.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use inboxsift_core::credentials::{self, CredentialError};
use inboxsift_core::{Agent, Config, Filter, ImapConnector};
use tracing::{error, info};

use cli::{Args, Command};

/// Environment variable consulted for the password.
const PASSWORD_ENV: &str = "INBOXSIFT_PASSWORD";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes up even when the configuration is broken, so the
    // failure below lands in the log file too.
    let loaded = load_config(args.config.clone()).await;
    let configured_log = loaded.as_ref().ok().and_then(|config| config.log_file.clone());
    logging::init(logging::choose_log_file(args.log_file.clone(), configured_log).as_deref())?;

    info!("Starting inboxsift");
    let result = match loaded {
        Ok(config) => dispatch(args.command.unwrap_or_default(), &config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

async fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => cli::default_config_path().context("cannot determine the configuration directory")?,
    };
    Config::load(&path)
        .await
        .with_context(|| format!("loading {}", path.display()))
}

async fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::SetPassword { password } => set_password(config, password),
        Command::ForgetPassword => {
            credentials::delete_password(&config.username)?;
            println!("Password removed from the system keyring for {}", config.username);
            Ok(())
        }
        Command::Run => run(config).await,
        Command::Provision => {
            let report = filter(config)?.provision().await?;
            println!(
                "{} created, {} already present, {} failed",
                report.created.len(),
                report.existing.len(),
                report.failed.len()
            );
            if !report.is_complete() {
                bail!("some folders could not be created");
            }
            Ok(())
        }
        Command::Once => {
            let report = filter(config)?.run_cycle().await?;
            println!(
                "{} mailbox(es) filtered, {} message(s) moved, {} failed",
                report.filtered,
                report.moved,
                report.failed.len()
            );
            Ok(())
        }
        Command::Analyze { mailbox, top } => {
            let histogram = filter(config)?.analyze(&mailbox).await?;
            println!("{} messages from {} senders", histogram.total(), histogram.len());
            for (sender, count) in histogram.ranked().into_iter().take(top) {
                println!("{count:>6}  {sender}");
            }
            Ok(())
        }
    }
}

/// Runs the agent until a fatal error or Ctrl-C.
async fn run(config: &Config) -> Result<()> {
    let mut agent = Agent::new(filter(config)?);

    tokio::select! {
        result = agent.run() => {
            result?;
            Ok(())
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl-C")?;
            info!("Interrupted, exiting");
            Ok(())
        }
    }
}

fn filter(config: &Config) -> Result<Filter<ImapConnector>> {
    let password = credentials::resolve_password(
        &config.username,
        config.password.as_deref(),
        std::env::var(PASSWORD_ENV).ok(),
    )
    .map_err(|e| match e {
        CredentialError::Missing(user) => anyhow::anyhow!(
            "no password for {user}: set it in the configuration, in {PASSWORD_ENV}, \
             or with `inboxsift set-password`"
        ),
        other => other.into(),
    })?;

    let connector = ImapConnector::new(
        config.server.endpoint(),
        &config.username,
        password,
        config.separator,
    );
    Ok(Filter::new(connector, config.settings()))
}

fn set_password(config: &Config, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password(format!("Password for {}: ", config.username))?,
    };
    if password.is_empty() {
        bail!("refusing to store an empty password");
    }
    credentials::store_password(&config.username, &password)?;
    println!("Password stored in the system keyring for {}", config.username);
    Ok(())
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

    #[tokio::test]
    async fn missing_config_names_the_file() {
        let path = std::env::temp_dir().join(format!("inboxsift-missing-{}.json", std::process::id()));
        let err = load_config(Some(path.clone())).await.unwrap_err();
        assert!(format!("{err:#}").contains(&path.display().to_string()));
    }
}
