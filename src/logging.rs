//! Logging and tracing initialization.
//!
//! The interactive console owns the terminal, so it logs to a file. One-shot
//! commands log to stderr.

use crate::error::{BasilError, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "BASIL_LOG";

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Append to a file, without ANSI colors.
    File(PathBuf),
    /// Compact records on stderr.
    Stderr,
}

/// Default log file for the interactive console (`<data_dir>/basil/basil.log`).
#[must_use]
pub fn default_log_file() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("basil").join("basil.log"))
}

/// Builds the filter: `BASIL_LOG` if set, otherwise `basil=info`
/// (`basil=debug` with `debug`).
///
/// # Errors
///
/// Returns [`BasilError::Logging`] for an unparsable directive.
pub fn filter(debug: bool) -> Result<EnvFilter> {
    let level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(format!("basil={level}")))
        .map_err(|e| BasilError::Logging(format!("failed to create log filter: {e}")))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init(target: &LogTarget, debug: bool) -> Result<()> {
    let env_filter = filter(debug)?;
    match target {
        LogTarget::File(path) => init_file_logging(path, env_filter),
        LogTarget::Stderr => init_stderr_logging(env_filter),
    }
}

fn init_stderr_logging(env_filter: EnvFilter) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| BasilError::Logging(e.to_string()))
}

fn init_file_logging(path: &Path, env_filter: EnvFilter) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| BasilError::Logging(e.to_string()))
}

/// Initialize logging for unit tests.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("basil=debug"));
        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
