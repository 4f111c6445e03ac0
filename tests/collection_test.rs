#![allow(clippy::unwrap_used, clippy::panic)]
//! Property tests for sort-stable collections.

use basil::collection::{PreprocessParams, SortDirection, SortStableCollection};
use basil::config::ConnectionEntry;
use basil::connection::Connection;
use basil::resource::{Resource, ResourceKind};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

const CONNECTIONS: [&str; 3] = ["prod", "staging", "dev"];

fn connections() -> Vec<Arc<Connection>> {
    CONNECTIONS
        .iter()
        .map(|name| {
            let url = format!("https://{name}.example.com");
            let entry = ConnectionEntry::with_api_key(name, &url, "k");
            Arc::new(Connection::from_entry(name, &entry).unwrap())
        })
        .collect()
}

/// (entity, check, connection) triples are unique, as they are in a real
/// backend.
fn events_strategy() -> impl Strategy<Value = Vec<(u8, u8, usize, Option<i64>)>> {
    (
        prop::collection::btree_set((0u8..6, 0u8..4, 0usize..CONNECTIONS.len()), 0..40),
        prop::collection::vec(prop::option::weighted(0.9, 0i64..4), 40),
    )
        .prop_map(|(keys, statuses): (BTreeSet<_>, Vec<_>)| {
            keys.into_iter()
                .zip(statuses)
                .map(|((e, c, conn), status)| (e, c, conn, status))
                .collect()
        })
}

fn build(triples: &[(u8, u8, usize, Option<i64>)]) -> Vec<Resource> {
    let conns = connections();
    triples.iter()
        .map(|&(e, c, conn, status)| {
            let mut check = json!({
                "metadata": {"name": format!("check-{c}")},
                "output": format!("output {e}/{c}"),
            });
            if let Some(status) = status {
                check["status"] = json!(status);
            }
            let item = json!({
                "entity": {"metadata": {"name": format!("host-{e}")}},
                "check": check,
            });
            Resource::new(item, Arc::clone(&conns[conn]))
        })
        .collect()
}

fn events_view(resources: Vec<Resource>, sort: &[usize]) -> Vec<Vec<String>> {
    let mut collection = SortStableCollection::new(ResourceKind::Event);
    for &column in sort {
        collection.user_sort(column);
    }
    collection.reload(resources, &PreprocessParams::default());
    collection.rows()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_reload_is_idempotent(triples in events_strategy(), column in 0usize..5) {
        let mut collection = SortStableCollection::new(ResourceKind::Event);
        collection.user_sort(column);

        collection.reload(build(&triples), &PreprocessParams::default());
        let once = collection.rows();
        collection.reload(build(&triples), &PreprocessParams::default());

        prop_assert_eq!(once, collection.rows());
    }

    #[test]
    fn prop_order_ignores_arrival_order(
        (triples, shuffled) in events_strategy().prop_flat_map(|triples| {
            let shuffled = Just(triples.clone()).prop_shuffle();
            (Just(triples), shuffled)
        }),
        sort in prop::collection::vec(0usize..5, 0..3),
    ) {
        prop_assert_eq!(events_view(build(&triples), &sort), events_view(build(&shuffled), &sort));
    }

    #[test]
    fn prop_sort_survives_superset_reload(
        triples in events_strategy(),
        split in 0usize..40,
        column in 0usize..5,
        flip in any::<bool>(),
    ) {
        let subset = &triples[..split.min(triples.len())];

        let mut live = SortStableCollection::new(ResourceKind::Event);
        live.reload(build(subset), &PreprocessParams::default());
        live.user_sort(column);
        if flip {
            live.user_sort(column);
        }
        let state = live.sort_state();
        live.reload(build(&triples), &PreprocessParams::default());

        prop_assert_eq!(live.sort_state(), state);
        let direction = if flip { SortDirection::Descending } else { SortDirection::Ascending };
        prop_assert_eq!(live.sort_state().direction, direction);

        let mut fresh = SortStableCollection::new(ResourceKind::Event);
        fresh.user_sort(column);
        if flip {
            fresh.user_sort(column);
        }
        fresh.reload(build(&triples), &PreprocessParams::default());
        prop_assert_eq!(live.rows(), fresh.rows());
    }

    #[test]
    fn prop_missing_status_sorts_last(triples in events_strategy(), flip in any::<bool>()) {
        let mut collection = SortStableCollection::new(ResourceKind::Event);
        collection.user_sort(2);
        if flip {
            collection.user_sort(2);
        }
        collection.reload(build(&triples), &PreprocessParams::default());

        let missing: Vec<bool> = collection
            .resources()
            .iter()
            .map(|r| r.int_at("/check/status").is_none())
            .collect();
        let first_missing = missing.iter().position(|&m| m).unwrap_or(missing.len());
        prop_assert!(missing[first_missing..].iter().all(|&m| m));
    }
}

#[test]
fn entity_counts_follow_event_reloads() {
    let conns = connections();
    let entity = Resource::new(
        json!({"metadata": {"name": "host-1"}, "entity_class": "agent"}),
        Arc::clone(&conns[0]),
    );
    let mut entities = SortStableCollection::new(ResourceKind::Entity);

    let first = build(&[(1, 0, 0, Some(2)), (1, 1, 0, Some(0))]);
    entities.reload(vec![entity], &PreprocessParams { events: Some(first.as_slice()) });
    let counts = *entities.side_table().check_counts("host-1", "prod").unwrap();
    assert_eq!((counts.ok, counts.warning, counts.critical), (1, 0, 1));

    let second = build(&[(1, 0, 0, Some(0)), (1, 1, 0, Some(0))]);
    entities.reprocess(&PreprocessParams { events: Some(second.as_slice()) });
    let counts = *entities.side_table().check_counts("host-1", "prod").unwrap();
    assert_eq!((counts.ok, counts.warning, counts.critical), (2, 0, 0));
}
