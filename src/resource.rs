//! Resource kinds and the records fetched from a backend.
//!
//! A [`Resource`] pairs one raw backend record with a non-owning
//! back-reference to the [`Connection`] it came from. The reference is an
//! `Arc` into the snapshot the fetch ran against, so it stays valid and
//! unchanged even after the live connection set is reconfigured.

use crate::connection::Connection;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One record as returned by the remote resource client.
pub type RawItem = Value;

/// The kinds of resources the console aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Check results (`/events`).
    Event,
    /// Monitored agents and proxies (`/entities`).
    Entity,
    /// Check definitions (`/checks`).
    Check,
    /// Silencing entries (`/silenced`).
    Silence,
}

impl ResourceKind {
    /// Every kind, in tab order.
    pub const ALL: [ResourceKind; 4] = [Self::Event, Self::Entity, Self::Silence, Self::Check];

    /// The backend's collection name for this kind.
    #[must_use]
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Event => "events",
            Self::Entity => "entities",
            Self::Check => "checks",
            Self::Silence => "silenced",
        }
    }

    /// Human-readable plural title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Event => "Events",
            Self::Entity => "Entities",
            Self::Check => "Checks",
            Self::Silence => "Silences",
        }
    }

    /// Parses a kind from its API name, singular or plural title.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "event" | "events" => Some(Self::Event),
            "entity" | "entities" => Some(Self::Entity),
            "check" | "checks" => Some(Self::Check),
            "silence" | "silences" | "silenced" => Some(Self::Silence),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// One domain record plus the connection it came from.
#[derive(Debug, Clone)]
pub struct Resource {
    /// The raw record.
    pub item: RawItem,
    /// Connection the record was fetched from (lookup only).
    pub connection: Arc<Connection>,
}

impl Resource {
    /// Wraps a raw record with its connection.
    #[must_use]
    pub fn new(item: RawItem, connection: Arc<Connection>) -> Self {
        Self { item, connection }
    }

    /// Name of the connection this record came from.
    #[must_use]
    pub fn connection_name(&self) -> &str {
        &self.connection.name
    }

    /// String field at a JSON pointer, e.g. `/metadata/name`.
    #[must_use]
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.item.pointer(pointer).and_then(Value::as_str)
    }

    /// Integer field at a JSON pointer.
    #[must_use]
    pub fn int_at(&self, pointer: &str) -> Option<i64> {
        self.item.pointer(pointer).and_then(Value::as_i64)
    }

    /// Renders any scalar at a JSON pointer as text.
    #[must_use]
    pub fn text_at(&self, pointer: &str) -> Option<String> {
        match self.item.pointer(pointer)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other @ (Value::Number(_) | Value::Bool(_)) => Some(other.to_string()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// `metadata.name`, the identity of most records.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_at("/metadata/name")
    }

    /// String items of an array field.
    #[must_use]
    pub fn strings_at(&self, pointer: &str) -> Vec<&str> {
        self.item
            .pointer(pointer)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::test_connection;
    use serde_json::json;

    #[test]
    fn test_kind_parse_accepts_aliases() {
        assert_eq!(ResourceKind::parse("Events"), Some(ResourceKind::Event));
        assert_eq!(ResourceKind::parse("silenced"), Some(ResourceKind::Silence));
        assert_eq!(ResourceKind::parse("entity"), Some(ResourceKind::Entity));
        assert_eq!(ResourceKind::parse("widgets"), None);
    }

    #[test]
    fn test_kind_display_is_api_name() {
        assert_eq!(ResourceKind::Silence.to_string(), "silenced");
        assert_eq!(ResourceKind::Check.title(), "Checks");
    }

    #[test]
    fn test_resource_accessors() {
        let conn = test_connection("prod");
        let res = Resource::new(
            json!({
                "metadata": {"name": "web-1"},
                "check": {"status": 2, "output": "CRITICAL"},
                "subscriptions": ["linux", "web", 3],
            }),
            conn,
        );

        assert_eq!(res.name(), Some("web-1"));
        assert_eq!(res.int_at("/check/status"), Some(2));
        assert_eq!(res.text_at("/check/status").as_deref(), Some("2"));
        assert_eq!(res.strings_at("/subscriptions"), vec!["linux", "web"]);
        assert_eq!(res.connection_name(), "prod");
        assert_eq!(res.text_at("/missing"), None);
    }
}
