//! # Mesh Broker Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Pattern matcher | `matches` on 5-segment topics | < 100ns |
//! | Registry | request selection among N registrations | < 10µs at N = 1000 |
//! | Envelope | build + parse request envelope | < 5µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use mesh_bus::{matches, HandlerRegistry};
use mesh_types::{build_request_envelope, handler_fn, parse_request_envelope};

fn bench_pattern_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern-matcher");
    let topic = "orders.eu.berlin.created.v2";

    for pattern in [
        "orders.eu.berlin.created.v2",
        "orders.*.*.created.*",
        "orders.>",
        "orders.us.>",
    ] {
        group.bench_with_input(BenchmarkId::new("matches", pattern), &pattern, |b, p| {
            b.iter(|| black_box(matches(black_box(p), black_box(topic))))
        });
    }
    group.finish();
}

fn bench_request_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    for size in [10usize, 100, 1000] {
        let registry: HandlerRegistry<Value> = HandlerRegistry::new();
        for i in 0..size {
            registry.add_request(
                &format!("service{i}.*"),
                handler_fn(|x: Value, _| async move { Ok(x) }),
            );
        }
        // Two competing handlers on the hot topic
        for _ in 0..2 {
            registry.add_request("hot.path", handler_fn(|x: Value, _| async move { Ok(x) }));
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("select_request", size), &registry, |b, r| {
            b.iter(|| black_box(r.select_request(black_box("hot.path")).is_some()))
        });
    }
    group.finish();
}

fn bench_envelopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    let input = json!({"user": "Bob", "items": [1, 2, 3], "total": 42.5});

    group.bench_function("build_parse_request", |b| {
        b.iter(|| {
            let value = build_request_envelope(black_box(input.clone()))
                .into_value()
                .unwrap_or_default();
            black_box(parse_request_envelope(value).is_ok())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_pattern_matching,
    bench_request_selection,
    bench_envelopes
);
criterion_main!(benches);
