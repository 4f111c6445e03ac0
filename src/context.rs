//! Explicit application context.
//!
//! Holds the live connection set and the collaborators the engine is built
//! from. Reconfiguration builds a complete new [`ConnectionSet`] first and
//! then swaps the `Arc`; readers either see the old set or the new one.

use crate::aggregate::AggregateUpdate;
use crate::client::ResourceClient;
use crate::config::{ConnectionEntry, GlobalConfig};
use crate::connection::ConnectionSet;
use crate::error::ConfigError;
use crate::orchestrator::Orchestrator;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

/// Live configuration shared by the console's components.
pub struct AppContext {
    connections: RwLock<Arc<ConnectionSet>>,
    client: Arc<dyn ResourceClient>,
    settings: GlobalConfig,
}

impl AppContext {
    /// Creates a context around an already built connection set.
    #[must_use]
    pub fn new(
        connections: ConnectionSet,
        client: Arc<dyn ResourceClient>,
        settings: GlobalConfig,
    ) -> Self {
        Self {
            connections: RwLock::new(Arc::new(connections)),
            client,
            settings,
        }
    }

    /// Builds the connection set from configuration entries.
    ///
    /// # Errors
    ///
    /// Returns the first malformed entry's [`ConfigError`].
    pub fn from_entries(
        entries: &[ConnectionEntry],
        client: Arc<dyn ResourceClient>,
        settings: GlobalConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(ConnectionSet::build(entries)?, client, settings))
    }

    /// The current connection set. Later reconfiguration never changes it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ConnectionSet> {
        let guard = self.connections.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Rebuilds the connection set and swaps it in.
    ///
    /// On error the live set is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the first malformed entry's [`ConfigError`].
    pub fn reconfigure(
        &self,
        entries: &[ConnectionEntry],
    ) -> Result<Arc<ConnectionSet>, ConfigError> {
        let fresh = Arc::new(ConnectionSet::build(entries)?);
        let mut guard = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&fresh);
        info!(connections = fresh.len(), "connection set reconfigured");
        Ok(fresh)
    }

    /// The remote resource client.
    #[must_use]
    pub fn client(&self) -> Arc<dyn ResourceClient> {
        Arc::clone(&self.client)
    }

    /// Global settings.
    #[must_use]
    pub fn settings(&self) -> &GlobalConfig {
        &self.settings
    }

    /// Overall deadline for one aggregation.
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.timeout_ms)
    }

    /// Auto-refresh period.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.settings.refresh_ms)
    }

    /// Starts an orchestrator wired to this context's client and flush window.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn_orchestrator(&self) -> (Orchestrator, UnboundedReceiver<AggregateUpdate>) {
        Orchestrator::spawn(self.client(), Duration::from_millis(self.settings.flush_ms))
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("connections", &self.snapshot().len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
