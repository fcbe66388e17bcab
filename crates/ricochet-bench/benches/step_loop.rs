//! Criterion benchmarks for the event loop on rod gases.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ricochet_bench::{reference_profile, stress_profile};
use ricochet_engine::RunLimit;

fn bench_step_1k(c: &mut Criterion) {
    let mut kernel = reference_profile(42).unwrap();

    // Warm up so queue capacities settle.
    kernel.run_until(RunLimit::events(10_000)).unwrap();

    c.bench_function("step_1k_rods", |b| {
        b.iter(|| {
            let outcome = kernel.step().unwrap();
            black_box(&outcome);
        });
    });
}

fn bench_step_100k(c: &mut Criterion) {
    let mut kernel = stress_profile(42).unwrap();
    kernel.run_until(RunLimit::events(10_000)).unwrap();

    c.bench_function("step_100k_rods", |b| {
        b.iter(|| {
            let outcome = kernel.step().unwrap();
            black_box(&outcome);
        });
    });
}

fn bench_initialize_1k(c: &mut Criterion) {
    c.bench_function("initialize_1k_rods", |b| {
        b.iter(|| {
            let kernel = reference_profile(42).unwrap();
            black_box(kernel.event_count());
        });
    });
}

fn bench_10k_events_1k(c: &mut Criterion) {
    c.bench_function("10k_events_1k_rods", |b| {
        b.iter(|| {
            let mut kernel = reference_profile(42).unwrap();
            let report = kernel.run_until(RunLimit::events(10_000)).unwrap();
            black_box(report);
        });
    });
}

criterion_group!(
    benches,
    bench_step_1k,
    bench_step_100k,
    bench_initialize_1k,
    bench_10k_events_1k
);
criterion_main!(benches);
