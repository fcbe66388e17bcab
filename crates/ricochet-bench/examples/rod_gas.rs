//! End-to-end rod-gas example.
//!
//! Demonstrates: build kernel → run in chunks → read metrics → checkpoint
//! → keep running → restore → replay the same events.

use ricochet_bench::reference_profile;
use ricochet_checkpoint::{checkpoint_hash, trace_hash};
use ricochet_core::EventKind;
use ricochet_engine::RunLimit;

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Ricochet Rod Gas Example ===\n");
    let mut kernel = reference_profile(42).unwrap();

    for chunk in 0..4 {
        let report = kernel.run_until(RunLimit::events(25_000)).unwrap();
        let m = kernel.metrics();
        println!(
            "chunk {chunk}: {} events, clock {}, collisions {}, walls {}, transitions {}, stale {}",
            report.events,
            report.clock,
            m.events(EventKind::Interaction),
            m.events(EventKind::BoundaryCrossing),
            m.events(EventKind::PartitionTransition),
            m.stale_discards,
        );
    }

    let cp = kernel.checkpoint().unwrap();
    println!("\ncheckpoint: {} records, hash {:016x}", cp.record_count(), checkpoint_hash(&cp));

    let mut first = Vec::new();
    kernel
        .run_with(RunLimit::events(10_000), |e| first.push(e.clone()))
        .unwrap();

    kernel.restore(&cp).unwrap();
    let mut second = Vec::new();
    kernel
        .run_with(RunLimit::events(10_000), |e| second.push(e.clone()))
        .unwrap();

    println!(
        "replay after restore: {:016x} vs {:016x} ({})",
        trace_hash(&first),
        trace_hash(&second),
        if first == second { "identical" } else { "DIVERGED" }
    );
    println!("kinetic energy: {:.4}", kernel.dynamics().kinetic_energy());
}
