//! Tracing setup. Runs append to `$XDG_STATE_HOME/keycheck/keycheck.log`;
//! when that file cannot be opened the binary falls back to stderr.
//!
//! `RUST_LOG` overrides the default filter, e.g. `RUST_LOG=keycheck_core=trace`
//! to see the styled elements the classifier matched.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,keycheck=debug,keycheck_core=debug";
const LOG_FILE: &str = "keycheck.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn log_file_in(state_home: &Path) -> PathBuf {
    state_home.join("keycheck").join(LOG_FILE)
}

/// Path of the run log (not created here).
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("keycheck")?;
    Ok(log_file_in(&xdg_dirs.get_state_home()))
}

/// Install the file subscriber and return the log path. An error leaves no
/// subscriber installed, so the caller can still use [`init_logging_stderr`].
pub fn init_logging() -> Result<PathBuf> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    // Every event locks the file once; runs log a few lines per key at most.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {e}"))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "keycheck logging to {}", path.display());
    Ok(path)
}

/// Stderr-only subscriber for when the log file is unavailable.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
