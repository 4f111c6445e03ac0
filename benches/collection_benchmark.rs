#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]
//! Benchmark for collection reloads and user sorts.

use basil::prelude::*;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

fn events(size: usize, connections: &[Arc<Connection>]) -> Vec<Resource> {
    (0..size)
        .map(|i| {
            // Deterministic spread of hosts, checks and statuses
            let item = json!({
                "entity": {"metadata": {"name": format!("host-{}", i % 97)}},
                "check": {
                    "metadata": {"name": format!("check-{}", i % 13)},
                    "status": (i * 7) % 4,
                    "output": format!("line {i}"),
                },
            });
            Resource::new(item, Arc::clone(&connections[i % connections.len()]))
        })
        .collect()
}

fn connections() -> Vec<Arc<Connection>> {
    ["prod", "staging", "dev"]
        .iter()
        .map(|name| {
            let entry = ConnectionEntry::with_api_key(name, "https://sensu.example.com", "k");
            Arc::new(Connection::from_entry(name, &entry).unwrap())
        })
        .collect()
}

fn reload_benchmark(c: &mut Criterion) {
    let conns = connections();
    let mut group = c.benchmark_group("reload");

    for size in [100, 1_000, 10_000] {
        let data = events(size, &conns);

        group.bench_with_input(BenchmarkId::new("default_order", size), &size, |b, _| {
            let mut collection = SortStableCollection::new(ResourceKind::Event);
            b.iter(|| {
                collection.reload(black_box(data.clone()), &PreprocessParams::default());
            });
        });

        group.bench_with_input(BenchmarkId::new("pinned_column", size), &size, |b, _| {
            let mut collection = SortStableCollection::new(ResourceKind::Event);
            collection.user_sort(3);
            b.iter(|| {
                collection.reload(black_box(data.clone()), &PreprocessParams::default());
            });
        });

        group.bench_with_input(BenchmarkId::new("entities_with_counts", size), &size, |b, _| {
            let entities: Vec<Resource> = (0..97)
                .map(|i| {
                    let item = json!({"metadata": {"name": format!("host-{i}")}});
                    Resource::new(item, Arc::clone(&conns[i % conns.len()]))
                })
                .collect();
            let params = PreprocessParams { events: Some(data.as_slice()) };
            let mut collection = SortStableCollection::new(ResourceKind::Entity);
            b.iter(|| {
                collection.reload(black_box(entities.clone()), &params);
            });
        });
    }

    group.finish();
}

fn user_sort_benchmark(c: &mut Criterion) {
    let conns = connections();
    let mut group = c.benchmark_group("user_sort");

    for size in [1_000, 10_000] {
        let mut collection = SortStableCollection::new(ResourceKind::Event);
        collection.reload(events(size, &conns), &PreprocessParams::default());

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| collection.user_sort(black_box(2)));
        });
    }

    group.finish();
}

criterion_group!(benches, reload_benchmark, user_sort_benchmark);
criterion_main!(benches);
