//! Per-session log file.
//!
//! The game owns the terminal while it runs, so logs go to a timestamped
//! file in the configured log directory instead of stderr.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use tracing_subscriber::EnvFilter;

/// Fallback filter variable consulted when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "ADOMATE_LOG_LEVEL";

/// `adom_log_YYYY-MM-DD_HH-MM-SS.log` for the given time.
pub fn log_file_name(now: DateTime<Local>) -> String {
    format!("adom_log_{}.log", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Create the log file and install the global subscriber writing to it.
///
/// Returns the path of the log file.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let path = log_dir.join(log_file_name(Local::now()));
    let file = File::create(&path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_LEVEL_ENV))
        .unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    Ok(path)
}
