//! Configured backends and the immutable set that holds them.
//!
//! A [`ConnectionSet`] is built once from the configuration entries and never
//! mutated afterwards. Reconfiguration builds a fresh set and swaps it in
//! (see [`AppContext`](crate::context::AppContext)); aggregations already in
//! flight keep the `Arc` snapshot they started with.

use crate::aggregate::{merge, Aggregate, FetchOutcome, Stage};
use crate::client::ResourceClient;
use crate::config::ConnectionEntry;
use crate::error::ConfigError;
use crate::fetcher::Fetcher;
use crate::resource::ResourceKind;
use secrecy::SecretString;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

/// Port used for `https` URLs without an explicit port.
pub const DEFAULT_TLS_PORT: u16 = 443;

/// Port used for plain URLs without an explicit port (the backend API port).
pub const DEFAULT_PLAIN_PORT: u16 = 8080;

/// Where a backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Normalized base URL.
    pub url: Url,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Whether the backend is reached over TLS.
    pub tls: bool,
}

impl Endpoint {
    /// Parses an endpoint from a configuration URL.
    ///
    /// A URL without a scheme is treated as plain `http`.
    ///
    /// # Errors
    ///
    /// Returns the reason the URL was rejected.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("url is empty".to_string());
        }
        let url = if raw.contains("://") {
            Url::parse(raw)
        } else {
            Url::parse(&format!("http://{raw}"))
        }
        .map_err(|e| e.to_string())?;

        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(format!("unsupported scheme '{other}'")),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| "url has no host".to_string())?
            .to_string();
        let port = url
            .port()
            .unwrap_or(if tls { DEFAULT_TLS_PORT } else { DEFAULT_PLAIN_PORT });

        Ok(Self { url, host, port, tls })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "https" } else { "http" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

/// How the console authenticates against a backend.
#[derive(Debug)]
pub enum Credential {
    /// Username and password login.
    Password {
        /// Login name.
        username: String,
        /// Login password.
        password: SecretString,
    },
    /// Alternate token authentication.
    ApiKey(SecretString),
}

impl Credential {
    fn from_entry(entry: &ConnectionEntry) -> Option<Self> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }

        if let Some(key) = present(&entry.api_key) {
            return Some(Self::ApiKey(SecretString::from(key.to_string())));
        }
        match (present(&entry.username), present(&entry.password)) {
            (Some(user), Some(pass)) => Some(Self::Password {
                username: user.to_string(),
                password: SecretString::from(pass.to_string()),
            }),
            _ => None,
        }
    }

    /// Short label for display.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::ApiKey(_) => "api key",
        }
    }
}

/// A configured handle to one remote backend. Immutable once built.
#[derive(Debug)]
pub struct Connection {
    /// Unique connection name.
    pub name: String,
    /// Where the backend lives.
    pub endpoint: Endpoint,
    /// Namespace queried on the backend.
    pub namespace: String,
    /// Authentication material.
    pub credential: Credential,
}

impl Connection {
    /// Validates one named configuration entry.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing credentials or a bad URL.
    pub fn from_entry(name: &str, entry: &ConnectionEntry) -> Result<Self, ConfigError> {
        let raw_url = entry.url.clone().unwrap_or_default();
        let endpoint = Endpoint::parse(&raw_url).map_err(|reason| ConfigError::InvalidEndpoint {
            name: name.to_string(),
            url: raw_url.clone(),
            reason,
        })?;
        let credential = Credential::from_entry(entry).ok_or_else(|| {
            ConfigError::MissingCredentials { name: name.to_string() }
        })?;
        let namespace = entry
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| "default".to_string());

        Ok(Self {
            name: name.to_string(),
            endpoint,
            namespace,
            credential,
        })
    }
}

/// The immutable set of configured connections, in configuration order.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    connections: Vec<Arc<Connection>>,
    index: HashMap<String, usize>,
}

impl ConnectionSet {
    /// Builds a set from configuration entries.
    ///
    /// Entries without a name are skipped. A later entry reusing a name
    /// replaces the earlier one in place (last wins, first position kept).
    ///
    /// # Errors
    ///
    /// The first malformed entry aborts the whole build.
    pub fn build(entries: &[ConnectionEntry]) -> Result<Self, ConfigError> {
        let mut set = Self::default();

        for entry in entries {
            let Some(name) = entry.name.as_deref().filter(|n| !n.is_empty()) else {
                warn!("skipping connection entry without a name");
                continue;
            };
            let connection = Arc::new(Connection::from_entry(name, entry)?);

            match set.index.get(name) {
                Some(&idx) => {
                    warn!(connection = name, "duplicate connection name, later entry wins");
                    set.connections[idx] = connection;
                }
                None => {
                    set.index.insert(name.to_string(), set.connections.len());
                    set.connections.push(connection);
                }
            }
        }

        debug!(count = set.connections.len(), "built connection set");
        Ok(set)
    }

    /// All connections in configuration order.
    #[must_use]
    pub fn all(&self) -> &[Arc<Connection>] {
        &self.connections
    }

    /// Looks up a connection by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Connection>> {
        self.index.get(name).map(|&idx| &self.connections[idx])
    }

    /// Number of connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connections are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connection names in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.iter().map(|c| c.name.as_str())
    }

    /// Queries every connection concurrently and returns once all have
    /// answered or failed.
    ///
    /// This is the coarse path for non-interactive callers: failures are
    /// isolated per connection, but there are no partial flushes and no
    /// deadline.
    pub async fn fetch_all(
        &self,
        client: Arc<dyn ResourceClient>,
        kind: ResourceKind,
    ) -> Aggregate {
        let fetcher = Fetcher::new(client);
        let mut tasks = JoinSet::new();

        for connection in &self.connections {
            let fetcher = fetcher.clone();
            let connection = Arc::clone(connection);
            tasks.spawn(async move {
                let outcome = fetcher.fetch(Arc::clone(&connection), kind).await;
                (connection.name.clone(), outcome)
            });
        }

        let mut outcomes: HashMap<String, FetchOutcome> = HashMap::with_capacity(self.len());
        while let Some(joined) = tasks.join_next().await {
            // Fetcher::fetch never panics; a join error means the runtime is shutting down.
            if let Ok((name, outcome)) = joined {
                outcomes.insert(name, outcome);
            }
        }

        merge(&self.connections, &outcomes, Stage::Final)
    }
}

/// Builds a standalone connection for tests.
#[cfg(test)]
pub(crate) fn test_connection(name: &str) -> Arc<Connection> {
    let entry = ConnectionEntry::with_api_key(name, "https://sensu.test:8080", "key");
    Arc::new(Connection::from_entry(name, &entry).expect("valid test entry"))
}
