//! Benchmarks for JSON message validation.

#![allow(
    clippy::min_ident_chars,
    clippy::unwrap_used,
    missing_docs,
    reason = "Benchmarks use standard closure names and fail fast on setup errors"
)]

use citrus_core::{Message, MessageValidator as _, TestContextFactory, ValidationContext};
use citrus_validation::{JsonTextMessageValidator, default_matcher_registry};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

fn order_document(items: usize, control: bool) -> String {
    let entries: Vec<String> = (0..items)
        .map(|i| {
            if control {
                format!(r#"{{"sku": "sku-{i}", "quantity": "@isNumber()@", "note": "@ignore@"}}"#)
            } else {
                format!(r#"{{"sku": "sku-{i}", "quantity": {i}, "note": "n{i}"}}"#)
            }
        })
        .collect();
    format!(r#"{{"order": {{"id": 1, "items": [{}]}}}}"#, entries.join(", "))
}

fn bench_json_validation(c: &mut Criterion) {
    let context = TestContextFactory::new()
        .with_matcher_registry(default_matcher_registry())
        .create_context();
    let contexts = [ValidationContext::json(true)];
    let mut group = c.benchmark_group("json_validation");

    for items in &[1, 10, 100] {
        let received = Message::new(order_document(*items, false));
        let control = Message::new(order_document(*items, true));
        group.throughput(Throughput::Elements(*items as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), items, |b, _| {
            b.iter(|| {
                JsonTextMessageValidator
                    .validate(black_box(&received), &control, &context, &contexts)
                    .unwrap();
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(2))
        .warm_up_time(Duration::from_millis(500))
        .sample_size(10);
    targets = bench_json_validation
}
criterion_main!(benches);
