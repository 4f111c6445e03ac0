//! Static per-kind tables: columns, default order and preprocessing.

use super::{PreprocessParams, SideTable, SortKey};
use crate::resource::{Resource, ResourceKind};
use std::cmp::Ordering;
use std::fmt;

/// Extracts a comparable key for one column.
pub type KeyFn = fn(&Resource, &SideTable) -> SortKey;
/// Renders one cell.
pub type CellFn = fn(&Resource, &SideTable) -> String;
/// The canonical default order of a kind.
pub type OrderFn = fn(&Resource, &Resource, &SideTable) -> Ordering;
/// Derives side-table metrics before sorting.
pub type PreprocessFn = fn(&[Resource], &PreprocessParams<'_>, &mut SideTable);
/// Severity used for row styling (0 ok, 1 warning, 2 critical).
pub type SeverityFn = fn(&Resource, &SideTable) -> Option<i64>;

/// One display column.
pub struct Column {
    /// Header text.
    pub title: &'static str,
    /// Relative width in percent.
    pub width: u16,
    /// Cell renderer.
    pub cell: CellFn,
    /// Sort key extractor.
    pub key: KeyFn,
}

/// Everything kind-specific about a collection.
pub struct KindTable {
    /// The kind this table describes.
    pub kind: ResourceKind,
    /// Columns in display order.
    pub columns: &'static [Column],
    /// Order applied when no explicit sort is pinned.
    pub default_order: OrderFn,
    /// Side-table hook run on every reload.
    pub preprocess: PreprocessFn,
    /// Row severity.
    pub severity: SeverityFn,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("title", &self.title)
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for KindTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindTable")
            .field("kind", &self.kind)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Looks up the static table for a kind.
#[must_use]
pub fn table(kind: ResourceKind) -> &'static KindTable {
    match kind {
        ResourceKind::Event => &EVENTS,
        ResourceKind::Entity => &ENTITIES,
        ResourceKind::Silence => &SILENCES,
        ResourceKind::Check => &CHECKS,
    }
}

fn text(value: Option<&str>) -> SortKey {
    SortKey::text(value.unwrap_or_default())
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn cmp_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    text(a).cmp_asc(&text(b))
}

fn by_name_then_connection(a: &Resource, b: &Resource) -> Ordering {
    cmp_text(a.name(), b.name())
        .then_with(|| cmp_text(Some(a.connection_name()), Some(b.connection_name())))
}

fn connection_cell(r: &Resource, _: &SideTable) -> String {
    r.connection_name().to_string()
}
fn connection_key(r: &Resource, _: &SideTable) -> SortKey {
    SortKey::text(r.connection_name())
}
fn name_cell(r: &Resource, _: &SideTable) -> String {
    r.name().unwrap_or_default().to_string()
}
fn name_key(r: &Resource, _: &SideTable) -> SortKey {
    text(r.name())
}

fn no_preprocess(_: &[Resource], _: &PreprocessParams<'_>, _: &mut SideTable) {}

fn no_severity(_: &Resource, _: &SideTable) -> Option<i64> {
    None
}

// Events

const EVENT_ENTITY: &str = "/entity/metadata/name";
const EVENT_CHECK: &str = "/check/metadata/name";
const EVENT_STATUS: &str = "/check/status";
const EVENT_OUTPUT: &str = "/check/output";

static EVENTS: KindTable = KindTable {
    kind: ResourceKind::Event,
    columns: &[
        Column {
            title: "Entity",
            width: 20,
            cell: |r, _| r.str_at(EVENT_ENTITY).unwrap_or_default().to_string(),
            key: |r, _| text(r.str_at(EVENT_ENTITY)),
        },
        Column {
            title: "Check",
            width: 20,
            cell: |r, _| r.str_at(EVENT_CHECK).unwrap_or_default().to_string(),
            key: |r, _| text(r.str_at(EVENT_CHECK)),
        },
        Column {
            title: "Status",
            width: 8,
            cell: |r, _| r.text_at(EVENT_STATUS).unwrap_or_default(),
            key: |r, _| SortKey::number(r.int_at(EVENT_STATUS)),
        },
        Column {
            title: "Output",
            width: 37,
            cell: |r, _| truncate(r.str_at(EVENT_OUTPUT).unwrap_or_default().trim(), 50),
            key: |r, _| text(r.str_at(EVENT_OUTPUT)),
        },
        Column {
            title: "Connection",
            width: 15,
            cell: connection_cell,
            key: connection_key,
        },
    ],
    default_order: |a, b, _| {
        SortKey::number(a.int_at(EVENT_STATUS))
            .cmp_desc(&SortKey::number(b.int_at(EVENT_STATUS)))
            .then_with(|| cmp_text(a.str_at(EVENT_ENTITY), b.str_at(EVENT_ENTITY)))
            .then_with(|| cmp_text(a.str_at(EVENT_CHECK), b.str_at(EVENT_CHECK)))
            .then_with(|| cmp_text(Some(a.connection_name()), Some(b.connection_name())))
    },
    preprocess: no_preprocess,
    severity: |r, _| r.int_at(EVENT_STATUS),
};

// Entities

fn entity_worst(r: &Resource, side: &SideTable) -> Option<i64> {
    side.check_counts(r.name()?, r.connection_name()).and_then(|c| c.worst())
}

fn count_checks(resources: &[Resource], params: &PreprocessParams<'_>, side: &mut SideTable) {
    let Some(events) = params.events else {
        return;
    };
    side.clear_check_counts();
    for event in events {
        let Some(entity) = event.str_at(EVENT_ENTITY) else {
            continue;
        };
        if let Some(status) = event.int_at(EVENT_STATUS) {
            side.record_check(entity, event.connection_name(), status);
        }
    }
    // Entities without events show 0/0/0 rather than "-".
    for entity in resources {
        if let Some(name) = entity.name() {
            side.ensure_check_counts(name, entity.connection_name());
        }
    }
}

static ENTITIES: KindTable = KindTable {
    kind: ResourceKind::Entity,
    columns: &[
        Column {
            title: "Connection",
            width: 15,
            cell: connection_cell,
            key: connection_key,
        },
        Column {
            title: "Name",
            width: 25,
            cell: name_cell,
            key: name_key,
        },
        Column {
            title: "Class",
            width: 10,
            cell: |r, _| r.str_at("/entity_class").unwrap_or_default().to_string(),
            key: |r, _| text(r.str_at("/entity_class")),
        },
        Column {
            title: "Checks",
            width: 15,
            cell: |r, side| {
                r.name()
                    .and_then(|n| side.check_counts(n, r.connection_name()))
                    .map(|c| format!("{}/{}/{}", c.ok, c.warning, c.critical))
                    .unwrap_or_else(|| "-".to_string())
            },
            key: |r, side| SortKey::number(entity_worst(r, side)),
        },
        Column {
            title: "Subscriptions",
            width: 35,
            cell: |r, _| {
                let subs = r.strings_at("/subscriptions");
                if subs.is_empty() {
                    "None".to_string()
                } else {
                    subs.iter().take(3).copied().collect::<Vec<_>>().join(", ")
                }
            },
            key: |r, _| SortKey::text(&r.strings_at("/subscriptions").join(",")),
        },
    ],
    default_order: |a, b, side| {
        SortKey::number(entity_worst(a, side))
            .cmp_desc(&SortKey::number(entity_worst(b, side)))
            .then_with(|| by_name_then_connection(a, b))
    },
    preprocess: count_checks,
    severity: entity_worst,
};

// Silences

static SILENCES: KindTable = KindTable {
    kind: ResourceKind::Silence,
    columns: &[
        Column {
            title: "Connection",
            width: 15,
            cell: connection_cell,
            key: connection_key,
        },
        Column {
            title: "Name",
            width: 30,
            cell: name_cell,
            key: name_key,
        },
        Column {
            title: "Reason",
            width: 40,
            cell: |r, _| r.str_at("/reason").unwrap_or_default().to_string(),
            key: |r, _| text(r.str_at("/reason")),
        },
        Column {
            title: "Expire",
            width: 15,
            cell: |r, _| match r.int_at("/expire") {
                Some(-1) => "Never".to_string(),
                Some(secs) => format!("{secs}s"),
                None => String::new(),
            },
            key: |r, _| match r.int_at("/expire") {
                Some(-1) => SortKey::Number(Some(f64::INFINITY)),
                other => SortKey::number(other),
            },
        },
    ],
    default_order: |a, b, _| by_name_then_connection(a, b),
    preprocess: no_preprocess,
    severity: no_severity,
};

// Checks

static CHECKS: KindTable = KindTable {
    kind: ResourceKind::Check,
    columns: &[
        Column {
            title: "Connection",
            width: 15,
            cell: connection_cell,
            key: connection_key,
        },
        Column {
            title: "Name",
            width: 25,
            cell: name_cell,
            key: name_key,
        },
        Column {
            title: "Command",
            width: 45,
            cell: |r, _| truncate(r.str_at("/command").unwrap_or_default(), 30),
            key: |r, _| text(r.str_at("/command")),
        },
        Column {
            title: "Interval",
            width: 15,
            cell: |r, _| r.text_at("/interval").unwrap_or_default(),
            key: |r, _| SortKey::number(r.int_at("/interval")),
        },
    ],
    default_order: |a, b, _| by_name_then_connection(a, b),
    preprocess: no_preprocess,
    severity: no_severity,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::test_connection;
    use serde_json::json;

    fn event(entity: &str, check: &str, status: i64) -> Resource {
        Resource::new(
            json!({
                "entity": {"metadata": {"name": entity}},
                "check": {"metadata": {"name": check}, "status": status, "output": "x".repeat(80)},
            }),
            test_connection("prod"),
        )
    }

    #[test]
    fn test_every_kind_has_a_table() {
        for kind in ResourceKind::ALL {
            let t = table(kind);
            assert_eq!(t.kind, kind);
            assert!(!t.columns.is_empty());
            assert_eq!(t.columns.iter().map(|c| c.width).sum::<u16>(), 100);
        }
    }

    #[test]
    fn test_event_output_is_truncated() {
        let e = event("web", "cpu", 2);
        let output = (EVENTS.columns[3].cell)(&e, &SideTable::default());
        assert_eq!(output.chars().count(), 50);
    }

    #[test]
    fn test_event_default_order_is_status_descending() {
        let ok = event("a", "cpu", 0);
        let crit = event("b", "cpu", 2);
        let side = SideTable::default();

        assert_eq!((EVENTS.default_order)(&crit, &ok, &side), Ordering::Less);
        assert_eq!((EVENTS.default_order)(&ok, &crit, &side), Ordering::Greater);
    }

    #[test]
    fn test_silence_expire_never() {
        let s = Resource::new(
            json!({"metadata": {"name": "x"}, "expire": -1}),
            test_connection("prod"),
        );
        assert_eq!((SILENCES.columns[3].cell)(&s, &SideTable::default()), "Never");
    }

    #[test]
    fn test_entity_subscriptions_cell() {
        let side = SideTable::default();
        let none = Resource::new(json!({"metadata": {"name": "a"}}), test_connection("p"));
        let many = Resource::new(
            json!({"metadata": {"name": "b"}, "subscriptions": ["a", "b", "c", "d"]}),
            test_connection("p"),
        );

        assert_eq!((ENTITIES.columns[4].cell)(&none, &side), "None");
        assert_eq!((ENTITIES.columns[4].cell)(&many, &side), "a, b, c");
    }

    #[test]
    fn test_count_checks_builds_side_table() {
        let events = vec![
            event("web", "cpu", 0),
            event("web", "disk", 2),
            event("web", "ntp", 1),
            event("web", "odd", 3),
        ];
        let entity = Resource::new(json!({"metadata": {"name": "web"}}), test_connection("prod"));
        let mut side = SideTable::default();

        count_checks(
            std::slice::from_ref(&entity),
            &PreprocessParams { events: Some(events.as_slice()) },
            &mut side,
        );

        let counts = side.check_counts("web", "prod").unwrap();
        assert_eq!((counts.ok, counts.warning, counts.critical), (1, 1, 1));
        assert_eq!(entity_worst(&entity, &side), Some(2));
        assert_eq!((ENTITIES.columns[3].cell)(&entity, &side), "1/1/1");
    }
}
