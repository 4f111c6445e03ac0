//! The remote resource client seam.
//!
//! The wire protocol and authentication used to talk to a backend live
//! behind [`ResourceClient`]. The aggregation engine only sees
//! `Result<Vec<RawItem>>` and never interprets the error.
//!
//! [`DemoClient`] is a deterministic in-process backend used by `--demo` and
//! the test suite. Latency and failures can be injected per connection.

use crate::connection::Connection;
use crate::resource::{RawItem, ResourceKind};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Queries one backend for one kind of resource.
#[async_trait]
pub trait ResourceClient: Send + Sync + 'static {
    /// Fetches every item of `kind` from `connection`'s namespace.
    ///
    /// # Errors
    ///
    /// Any transport, authentication or protocol failure.
    async fn fetch(
        &self,
        connection: &Connection,
        kind: ResourceKind,
    ) -> anyhow::Result<Vec<RawItem>>;
}

/// How a [`DemoClient`] answers for one connection.
#[derive(Debug, Clone)]
pub enum DemoBehaviour {
    /// Synthetic records derived from the connection name.
    Healthy,
    /// Exactly these records, whatever the kind.
    Fixed(Vec<RawItem>),
    /// Fails with this message.
    Fail(String),
    /// Panics with this message.
    Panic(String),
}

/// In-process backend with deterministic data.
#[derive(Debug, Default)]
pub struct DemoClient {
    behaviours: HashMap<String, DemoBehaviour>,
    latencies: HashMap<String, Duration>,
    default_latency: Duration,
    calls: AtomicUsize,
}

impl DemoClient {
    /// Creates a client where every connection is healthy and instant.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the behaviour for one connection.
    #[must_use]
    pub fn with_behaviour(mut self, connection: &str, behaviour: DemoBehaviour) -> Self {
        self.behaviours.insert(connection.to_string(), behaviour);
        self
    }

    /// Delays every answer from one connection.
    #[must_use]
    pub fn with_latency(mut self, connection: &str, latency: Duration) -> Self {
        self.latencies.insert(connection.to_string(), latency);
        self
    }

    /// Delays answers from connections without their own latency.
    #[must_use]
    pub fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Number of fetches started so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceClient for DemoClient {
    async fn fetch(
        &self,
        connection: &Connection,
        kind: ResourceKind,
    ) -> anyhow::Result<Vec<RawItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self
            .latencies
            .get(&connection.name)
            .copied()
            .unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.behaviours.get(&connection.name).unwrap_or(&DemoBehaviour::Healthy) {
            DemoBehaviour::Healthy => Ok(synthetic(&connection.name, &connection.namespace, kind)),
            DemoBehaviour::Fixed(items) => Ok(items.clone()),
            DemoBehaviour::Fail(message) => Err(anyhow::anyhow!("{message}")),
            DemoBehaviour::Panic(message) => panic!("{message}"),
        }
    }
}

const DEMO_CHECKS: [(&str, &str, u64); 4] = [
    ("check-cpu", "check-cpu.rb -w 80 -c 90", 60),
    ("check-disk", "check-disk-usage.rb -w 85 -c 95 --mount /", 300),
    ("check-http", "check-http.rb -u http://localhost/health", 30),
    ("check-ntp", "check-ntp.rb", 600),
];

const DEMO_HOSTS: [(&str, &str, &[&str]); 3] = [
    ("web", "agent", &["linux", "web", "nginx", "entity:web"]),
    ("db", "agent", &["linux", "postgres"]),
    ("lb", "proxy", &[]),
];

/// Status of a check on a host; stable for a given connection.
fn demo_status(connection: &str, host: usize, check: usize) -> u64 {
    let seed = connection.bytes().map(u64::from).sum::<u64>();
    match (seed + host as u64 * 7 + check as u64 * 3) % 7 {
        0 => 2,
        1 | 2 => 1,
        _ => 0,
    }
}

fn synthetic(connection: &str, namespace: &str, kind: ResourceKind) -> Vec<RawItem> {
    match kind {
        ResourceKind::Entity => DEMO_HOSTS
            .iter()
            .map(|(host, class, subs)| {
                json!({
                    "metadata": {"name": format!("{connection}-{host}"), "namespace": namespace},
                    "entity_class": class,
                    "subscriptions": subs,
                })
            })
            .collect(),
        ResourceKind::Event => DEMO_HOSTS
            .iter()
            .enumerate()
            .flat_map(move |(h, (host, _, _))| {
                DEMO_CHECKS.iter().enumerate().map(move |(c, (check, _, _))| {
                    let status = demo_status(connection, h, c);
                    let output = match status {
                        0 => format!("{check} OK"),
                        1 => format!("{check} WARNING: threshold exceeded"),
                        _ => format!("{check} CRITICAL: threshold exceeded on {connection}-{host}"),
                    };
                    json!({
                        "metadata": {"namespace": namespace},
                        "entity": {"metadata": {"name": format!("{connection}-{host}")}},
                        "check": {"metadata": {"name": check}, "status": status, "output": output},
                    })
                })
            })
            .collect(),
        ResourceKind::Check => DEMO_CHECKS
            .iter()
            .map(|(name, command, interval)| {
                json!({
                    "metadata": {"name": name, "namespace": namespace},
                    "command": command,
                    "interval": interval,
                })
            })
            .collect(),
        ResourceKind::Silence => vec![
            json!({
                "metadata": {"name": "linux:check-ntp", "namespace": namespace},
                "reason": "ntp servers being replaced",
                "expire": -1,
            }),
            json!({
                "metadata": {"name": format!("entity:{connection}-db:*"), "namespace": namespace},
                "reason": "maintenance window",
                "expire": 3600,
            }),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::test_connection;

    #[tokio::test]
    async fn test_healthy_data_is_deterministic() {
        let client = DemoClient::new();
        let conn = test_connection("prod");

        let first = client.fetch(&conn, ResourceKind::Event).await.unwrap();
        let second = client.fetch(&conn, ResourceKind::Event).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), DEMO_HOSTS.len() * DEMO_CHECKS.len());
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_entities_carry_connection_prefix() {
        let client = DemoClient::new();
        let conn = test_connection("dev");

        let items = client.fetch(&conn, ResourceKind::Entity).await.unwrap();
        assert_eq!(items[0]["metadata"]["name"], "dev-web");
    }

    #[tokio::test]
    async fn test_fail_behaviour_returns_error() {
        let client = DemoClient::new()
            .with_behaviour("dev", DemoBehaviour::Fail("401 unauthorized".into()));
        let conn = test_connection("dev");

        let err = client.fetch(&conn, ResourceKind::Check).await.unwrap_err();
        assert_eq!(err.to_string(), "401 unauthorized");
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let client = DemoClient::new().with_latency("slow", Duration::from_secs(5));
        let conn = test_connection("slow");

        let start = tokio::time::Instant::now();
        client.fetch(&conn, ResourceKind::Silence).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn test_demo_status_in_range() {
        for h in 0..DEMO_HOSTS.len() {
            for c in 0..DEMO_CHECKS.len() {
                assert!(demo_status("prod", h, c) <= 2);
            }
        }
    }
}
