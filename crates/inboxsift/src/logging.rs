//! Log output: console plus an optional append-only file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "inboxsift=info,inboxsift_core=info,inboxsift_imap=warn";

/// Timestamp layout, e.g. `19/10/2026 08:15:02.417262`.
const TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S%.6f";

/// Stamps records with local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format(TIME_FORMAT))
    }
}

/// Default log file: `<data_dir>/inboxsift/inboxsift.log`.
#[must_use]
pub fn default_log_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("inboxsift").join("inboxsift.log"))
}

/// Log file to use: the command line wins over the configuration, which
/// wins over [`default_log_file`].
#[must_use]
pub fn choose_log_file(cli: Option<PathBuf>, configured: Option<PathBuf>) -> Option<PathBuf> {
    cli.or(configured).or_else(default_log_file)
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let file_layer = log_file
        .map(open_log_file)
        .transpose()?
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTimer)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .context("logging already initialized")?;

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

    #[test]
    fn time_format_has_microseconds() {
        let stamp = chrono::NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_micro_opt(8, 5, 2, 417)
            .unwrap()
            .format(TIME_FORMAT)
            .to_string();
        assert_eq!(stamp, "19/10/2026 08:05:02.000417");
    }

    #[test]
    fn timer_writes_a_stamp() {
        let mut out = String::new();
        LocalTimer.format_time(&mut Writer::new(&mut out)).unwrap();
        assert_eq!(out.len(), "19/10/2026 08:05:02.000417".len());
    }

    #[test]
    fn default_log_file_is_under_data_dir() {
        if let Some(path) = default_log_file() {
            assert!(path.ends_with("inboxsift/inboxsift.log"));
        }
    }

    #[test]
    fn log_file_precedence() {
        let cli = PathBuf::from("/tmp/cli.log");
        let configured = PathBuf::from("/tmp/configured.log");

        assert_eq!(
            choose_log_file(Some(cli.clone()), Some(configured.clone())),
            Some(cli)
        );
        assert_eq!(
            choose_log_file(None, Some(configured.clone())),
            Some(configured)
        );
        assert_eq!(choose_log_file(None, None), default_log_file());
    }

    #[test]
    fn log_file_parent_is_created() {
        let dir = std::env::temp_dir().join(format!("inboxsift-log-{}", std::process::id()));
        let path = dir.join("nested").join("test.log");

        open_log_file(&path).unwrap();
        assert!(path.exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
