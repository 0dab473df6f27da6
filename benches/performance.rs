//! Performance benchmarks for the event bus.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use owner_bus::{AlwaysAlive, EventBus, Handler, Owner, OwnerId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy)]
struct Tick(u64);

fn create_bus() -> EventBus {
    EventBus::new(Arc::new(AlwaysAlive))
}

/// Benchmark publish cost as the number of handlers grows
fn bench_publish_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fan_out");

    for handlers in [1, 10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("handlers", handlers),
            &handlers,
            |b, &count| {
                let bus = create_bus();
                let sink = Arc::new(AtomicU64::new(0));

                for _ in 0..count {
                    let owner = Owner::probed(OwnerId::new());
                    let sink = Arc::clone(&sink);
                    bus.subscribe(
                        &owner,
                        &Handler::new(move |t: &Tick| {
                            sink.fetch_add(t.0, Ordering::Relaxed);
                        }),
                    )
                    .unwrap();
                }

                b.iter(|| bus.publish(black_box(Tick(1))));
            },
        );
    }

    group.finish();
}

/// Benchmark publish with no subscribers (repository lookup only)
fn bench_publish_empty(c: &mut Criterion) {
    let bus = create_bus();
    bus.publish(Tick(0));

    c.bench_function("publish_empty", |b| {
        b.iter(|| bus.publish(black_box(Tick(1))));
    });
}

/// Benchmark subscribe + unsubscribe against a populated repository
fn bench_subscribe_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscribe_churn");

    for existing in [0, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("existing", existing),
            &existing,
            |b, &count| {
                let bus = create_bus();
                let owner = Owner::unmanaged(OwnerId::new());
                for _ in 0..count {
                    bus.subscribe(&owner, &Handler::new(|_: &Tick| {})).unwrap();
                }

                let handler = Handler::new(|_: &Tick| {});
                b.iter(|| {
                    bus.subscribe(&owner, &handler).unwrap();
                    bus.unsubscribe(&owner, &handler).unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark sweeping an owner with subscriptions across several types
fn bench_unsubscribe_owner(c: &mut Criterion) {
    let bus = create_bus();

    c.bench_function("unsubscribe_owner_3_types", |b| {
        b.iter(|| {
            let owner = Owner::unmanaged(OwnerId::new());
            bus.subscribe(&owner, &Handler::new(|_: &Tick| {})).unwrap();
            bus.subscribe(&owner, &Handler::new(|_: &u32| {})).unwrap();
            bus.subscribe(&owner, &Handler::new(|_: &String| {})).unwrap();
            black_box(bus.unsubscribe_owner(&owner));
        });
    });
}

criterion_group!(
    benches,
    bench_publish_fan_out,
    bench_publish_empty,
    bench_subscribe_churn,
    bench_unsubscribe_owner
);
criterion_main!(benches);
