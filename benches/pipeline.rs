//! Record-path benchmarks.
//!
//! Every error that escapes a wrapped operation goes through
//! classification, throttling and the store insert, so these stay cheap.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use aegis_lib::core::clock::{Clock, ManualClock};
use aegis_lib::core::config::ThrottleConfig;
use aegis_lib::core::{Config, Failure, Severity};
use aegis_lib::pipeline::{classify, normalize, ErrorReport, ErrorStore, Throttle};
use aegis_lib::storage::MemoryStore;

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    let failures = [
        Failure::remote("firestore/unavailable", "The service is currently unavailable."),
        Failure::message("Network request failed"),
        Failure::exception("TypeError", "Cannot read properties of undefined (reading 'map')"),
    ];

    for failure in &failures {
        group.bench_with_input(BenchmarkId::from_parameter(failure.text()), failure, |b, failure| {
            b.iter(|| black_box(classify(black_box(failure), None)));
        });
    }

    group.finish();
}

fn bench_throttle(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttle");

    group.bench_function("normalize", |b| {
        b.iter(|| black_box(normalize(black_box("Request 8812 failed after 3000ms on shard 17"), 100)));
    });

    group.bench_function("check_distinct", |b| {
        let mut throttle = Throttle::new(ThrottleConfig::default());
        let signatures: Vec<String> = (0..1000).map(|i| format!("failure kind {}", i)).collect();
        let mut now = 0_i64;
        b.iter(|| {
            for signature in &signatures {
                now += 1;
                black_box(throttle.check(signature, now));
            }
        });
    });

    group.finish();
}

fn bench_record(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("record");
    group.measurement_time(Duration::from_secs(5));

    for capacity in [100_usize, 500] {
        group.bench_with_input(BenchmarkId::new("store_insert", capacity), &capacity, |b, &capacity| {
            let mut config = Config::default();
            config.errors.max_records = capacity;
            config.throttle.duplicate_window = Duration::ZERO;
            config.throttle.burst_limit = usize::MAX;
            let clock = Arc::new(ManualClock::new(1_700_000_000_000));
            let store = ErrorStore::new(&config, Arc::new(MemoryStore::new()), Arc::clone(&clock) as Arc<dyn Clock>);
            let mut n = 0_u64;

            b.iter(|| {
                n += 1;
                clock.advance(Duration::from_millis(1));
                let report = ErrorReport::new(format!("sync failed for shard {}", char::from(b'a' + (n % 26) as u8)))
                    .severity(Severity::Medium);
                runtime.block_on(store.record(report))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_throttle, bench_record);
criterion_main!(benches);
