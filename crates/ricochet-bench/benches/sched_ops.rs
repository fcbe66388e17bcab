//! Criterion micro-benchmarks for the scheduling structures and the
//! checkpoint codec.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ricochet_bench::reference_profile;
use ricochet_checkpoint::{checkpoint_hash, from_bytes, to_bytes};
use ricochet_core::{BodyId, Epoch, EventKind, EventRecord, SimTime};
use ricochet_engine::RunLimit;
use ricochet_sched::{EpochTable, GlobalScheduler, ParticleEventQueue};

fn record(body: u32, partner: u32, time: f64) -> EventRecord {
    let t = SimTime::new(time).unwrap();
    EventRecord::interaction(t, BodyId(body), Epoch(0), BodyId(partner), Epoch(0), 0)
}

/// Benchmark: refill an 8-record queue and drain it.
fn bench_queue_refill_drain(c: &mut Criterion) {
    let records: Vec<EventRecord> = (1..=8).map(|i| record(0, i, (i * 37 % 11) as f64)).collect();
    let mut queue = ParticleEventQueue::new(BodyId(0));

    c.bench_function("queue_refill_drain_8", |b| {
        b.iter(|| {
            queue.clear();
            for &r in &records {
                queue.push(r);
            }
            while let Some(r) = queue.pop_min() {
                black_box(r);
            }
        });
    });
}

/// Benchmark: reposition bodies in a 10K-slot scheduler.
fn bench_scheduler_update_10k(c: &mut Criterion) {
    let n = 10_000u32;
    let mut scheduler = GlobalScheduler::new(n as usize);
    for i in 0..n {
        scheduler
            .on_body_updated(BodyId(i), record(i, (i + 1) % n, f64::from(i % 97)))
            .unwrap();
    }
    let mut tick = 0u32;

    c.bench_function("scheduler_update_10k", |b| {
        b.iter(|| {
            tick = tick.wrapping_add(7919);
            let body = tick % n;
            let front = record(body, (body + 1) % n, f64::from(tick % 1013));
            scheduler.on_body_updated(BodyId(body), front).unwrap();
            black_box(scheduler.next_event());
        });
    });
}

/// Benchmark: freshness check of a pair record.
fn bench_epoch_check(c: &mut Criterion) {
    let mut epochs = EpochTable::new(1_000);
    epochs.bump(BodyId(3));
    let fresh = record(1, 2, 1.0);
    let stale = EventRecord::single(EventKind::BoundaryCrossing, SimTime::ZERO, BodyId(3), Epoch(0), 0);

    c.bench_function("epoch_check_pair", |b| {
        b.iter(|| {
            black_box(epochs.check(black_box(&fresh)));
            black_box(epochs.check(black_box(&stale)));
        });
    });
}

/// Benchmark: encode, decode and hash a 1K-rod checkpoint.
fn bench_checkpoint_codec_1k(c: &mut Criterion) {
    let mut kernel = reference_profile(42).unwrap();
    kernel.run_until(RunLimit::events(5_000)).unwrap();
    let cp = kernel.checkpoint().unwrap();
    let bytes = to_bytes(&cp).unwrap();

    c.bench_function("checkpoint_encode_1k", |b| {
        b.iter(|| black_box(to_bytes(&cp).unwrap()));
    });
    c.bench_function("checkpoint_decode_1k", |b| {
        b.iter(|| black_box(from_bytes(&bytes).unwrap()));
    });
    c.bench_function("checkpoint_hash_1k", |b| {
        b.iter(|| black_box(checkpoint_hash(&cp)));
    });
}

criterion_group!(
    benches,
    bench_queue_refill_drain,
    bench_scheduler_update_10k,
    bench_epoch_check,
    bench_checkpoint_codec_1k
);
criterion_main!(benches);
