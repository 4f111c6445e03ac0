//! Error types for the console.
//!
//! Per-connection failures never surface as [`BasilError`]: the fetcher turns
//! them into [`FetchError`] values carried as data inside a
//! [`FetchOutcome`](crate::aggregate::FetchOutcome). Only construction-time
//! misconfiguration and environment problems (terminal, logging, config file)
//! propagate as errors.

use std::io;
use thiserror::Error;

/// A malformed connection entry found while building a
/// [`ConnectionSet`](crate::connection::ConnectionSet).
///
/// One bad entry aborts the whole build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The entry has neither a username/password pair nor an API key.
    #[error("connection '{name}' needs either username and password or an api_key")]
    MissingCredentials {
        /// Name of the offending entry.
        name: String,
    },

    /// The entry's URL could not be parsed into an endpoint.
    #[error("connection '{name}' has an invalid url '{url}': {reason}")]
    InvalidEndpoint {
        /// Name of the offending entry.
        name: String,
        /// The URL as written in the configuration.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Why a single connection failed to answer a query.
///
/// The remote client's own error types are not interpreted: everything it
/// raises is stringified into [`FetchError::Client`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The remote resource client returned an error.
    #[error("{0}")]
    Client(String),

    /// The remote resource client panicked while serving the request.
    #[error("client panicked: {0}")]
    Panicked(String),

    /// The fetch task was torn down before it produced an answer.
    #[error("fetch was cancelled")]
    Cancelled,
}

/// Error type for console operations.
#[derive(Debug, Error)]
pub enum BasilError {
    /// A connection entry is malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration parsing error with line number.
    #[error("configuration error at line {line}: {message}")]
    ConfigParse {
        /// Line number where the error occurred (1-indexed).
        line: usize,
        /// Error message describing the issue.
        message: String,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    /// Invalid configuration value.
    #[error("invalid configuration value for '{key}': {message}")]
    ConfigInvalid {
        /// The configuration key with invalid value.
        key: String,
        /// Error message describing why the value is invalid.
        message: String,
    },

    /// Adding a connection whose name is already configured.
    #[error("connection '{0}' already exists")]
    ConnectionExists(String),

    /// Editing or deleting a connection that is not configured.
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    /// Terminal initialization, rendering or file I/O error.
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),

    /// The tracing subscriber could not be installed.
    #[error("logging error: {0}")]
    Logging(String),

    /// The orchestrator's coordination loop has shut down.
    #[error("orchestrator is no longer running")]
    OrchestratorClosed,
}

/// Result type alias for console operations.
pub type Result<T> = std::result::Result<T, BasilError>;
