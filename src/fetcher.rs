//! One query against one connection.
//!
//! The fetcher is the failure boundary: whatever the client does (return an
//! error, panic) comes out as a [`FetchOutcome`], never as an error or an
//! unwinding task.

use crate::aggregate::FetchOutcome;
use crate::client::ResourceClient;
use crate::connection::Connection;
use crate::error::FetchError;
use crate::resource::ResourceKind;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs client queries on their own tasks.
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn ResourceClient>,
}

impl Fetcher {
    /// Creates a fetcher over a client.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }

    /// Queries `connection` for `kind`. No retries.
    pub async fn fetch(&self, connection: Arc<Connection>, kind: ResourceKind) -> FetchOutcome {
        let client = Arc::clone(&self.client);
        let name = connection.name.clone();

        let task = tokio::spawn(async move { client.fetch(&connection, kind).await });

        match task.await {
            Ok(Ok(items)) => {
                debug!(connection = %name, %kind, count = items.len(), "fetch succeeded");
                FetchOutcome::Success(items)
            }
            Ok(Err(e)) => {
                let message = format!("{e:#}");
                warn!(connection = %name, %kind, error = %message, "fetch failed");
                FetchOutcome::Failure(FetchError::Client(message))
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                warn!(connection = %name, %kind, error = %message, "client panicked");
                FetchOutcome::Failure(FetchError::Panicked(message))
            }
            Err(_) => {
                debug!(connection = %name, %kind, "fetch task cancelled");
                FetchOutcome::Failure(FetchError::Cancelled)
            }
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
