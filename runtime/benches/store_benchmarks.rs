//! Registration store benchmarks
//!
//! Measures the hot paths against the in-memory backend:
//! - schema normalization of a typical team submission
//! - registration creation (number generation + insert)
//! - check-in transition (fetch + compare-and-swap)
//! - concurrent creation across events
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use registration_core::schema::normalize_submission;
use registration_core::{ActorId, Submission};
use registration_runtime::RegistrationStore;
use registration_testing::InMemoryRegistrationBackend;
use serde_json::{Map, Value, json};
use std::sync::Arc;

fn team_submission() -> Map<String, Value> {
    let Value::Object(fields) = json!({
        "eventName": "Tech Hunt",
        "teamName": "Alpha",
        "email": "Lead@Example.com",
        "phone": 9876543210_u64,
        "teamSize": 3,
        "paymentMethod": "upi",
        "paymentAmount": "300",
        "participants": [
            {"name": "Asha", "email": "asha@example.com", "order": "1"},
            {"name": "Ravi", "email": "ravi@example.com", "order": "2"},
            {"name": "Meera", "email": "meera@example.com", "order": "3"}
        ],
        "favouriteColour": "teal"
    }) else {
        unreachable!("literal is an object")
    };
    fields
}

fn store() -> RegistrationStore {
    RegistrationStore::new(Arc::new(InMemoryRegistrationBackend::new()))
}

fn benchmark_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema");
    group.throughput(Throughput::Elements(1));

    let fields = team_submission();
    group.bench_function("normalize_submission", |b| {
        b.iter(|| normalize_submission(black_box(fields.clone())).expect("valid submission"));
    });

    group.finish();
}

fn benchmark_store_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("create_registration", |b| {
        let store = store();
        b.to_async(&runtime).iter(|| async {
            store
                .create_registration("Tech Hunt", Submission::new(black_box(team_submission())))
                .await
                .expect("create");
        });
    });

    group.bench_function("mark_checked_in", |b| {
        let store = store();
        let record = runtime
            .block_on(store.create_registration("Tech Hunt", Submission::new(team_submission())))
            .expect("create");
        b.to_async(&runtime).iter(|| async {
            store
                .mark_checked_in("Tech Hunt", record.id, ActorId::new("desk-1"))
                .await
                .expect("check in");
        });
    });

    group.finish();
}

fn benchmark_concurrent_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.throughput(Throughput::Elements(10));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("10_concurrent_creates", |b| {
        let store = Arc::new(store());
        b.to_async(&runtime).iter(|| async {
            let handles: Vec<_> = (0..10)
                .map(|i| {
                    let store = Arc::clone(&store);
                    let event = if i % 2 == 0 { "Tech Hunt" } else { "Robo Race" };
                    tokio::spawn(async move {
                        store
                            .create_registration(event, Submission::new(team_submission()))
                            .await
                    })
                })
                .collect();

            for handle in handles {
                handle.await.expect("Task failed").expect("create");
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_normalization,
    benchmark_store_operations,
    benchmark_concurrent_creation,
);
criterion_main!(benches);
