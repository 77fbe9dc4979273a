//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the JSON configuration file
    /// [default: <config dir>/inboxsift/config.json]
    #[arg(short, long, env = "INBOXSIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Append logs to this file instead of the configured one
    #[arg(long, env = "INBOXSIFT_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Default, PartialEq, Eq)]
pub enum Command {
    /// Provision folders, then filter every watched mailbox forever (default)
    #[default]
    Run,
    /// Create the folders the rules point to, then exit
    Provision,
    /// Filter every watched mailbox once, then exit
    Once,
    /// Count the messages per sender in a mailbox
    Analyze {
        /// Mailbox to inspect
        mailbox: String,
        /// How many senders to print
        #[arg(short, long, default_value_t = 20)]
        top: usize,
    },
    /// Store the account password in the system keyring
    SetPassword {
        /// Password to store; prompted for when absent
        #[arg(long, env = "INBOXSIFT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Remove the account password from the system keyring
    ForgetPassword,
}

/// `<config_dir>/inboxsift/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("inboxsift").join("config.json"))
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
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let args = Args::try_parse_from(["inboxsift"]).unwrap();
        assert_eq!(args.command.unwrap_or_default(), Command::Run);
    }

    #[test]
    fn analyze_with_top() {
        let args = Args::try_parse_from(["inboxsift", "analyze", "INBOX", "--top", "5"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Analyze {
                mailbox: "INBOX".into(),
                top: 5
            })
        );
    }

    #[test]
    fn analyze_requires_mailbox() {
        assert!(Args::try_parse_from(["inboxsift", "analyze"]).is_err());
    }

    #[test]
    fn config_flag() {
        let args = Args::try_parse_from(["inboxsift", "-c", "/tmp/x.json", "once"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/x.json")));
        assert_eq!(args.command, Some(Command::Once));
    }

    #[test]
    fn set_password_flag() {
        let args =
            Args::try_parse_from(["inboxsift", "set-password", "--password", "s3cret"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::SetPassword {
                password: Some("s3cret".into())
            })
        );
    }

    #[test]
    fn forget_password() {
        let args = Args::try_parse_from(["inboxsift", "forget-password"]).unwrap();
        assert_eq!(args.command, Some(Command::ForgetPassword));
    }

    #[test]
    fn default_config_path_shape() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("inboxsift/config.json"));
        }
    }
}
