//! Event loop orchestrating Ricochet simulations.
//!
//! Provides the [`Orchestrator`] that owns the simulation clock, the
//! per-body queues, the epoch table and the global scheduler, and drives
//! them against a [`DynamicsProvider`](ricochet_core::DynamicsProvider)
//! and a [`NeighbourProvider`](ricochet_core::NeighbourProvider).
//! Supports single steps, bounded runs, system-wide sources, global time
//! rescaling, time-frame rebasing and checkpoint/restore.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod run;
pub mod system;

pub use clock::SimulationClock;
pub use config::{KernelConfig, TimeFrame, DEFAULT_MAX_DISCARDS, DEFAULT_NEGATIVE_TOLERANCE};
pub use metrics::KernelMetrics;
pub use orchestrator::{Orchestrator, StepOutcome, ValidEvent};
pub use run::{RunLimit, RunReport, StopReason};
pub use system::{SystemEventSpec, SystemRegistry, SystemSource};
