//! Ricochet: a discrete-event scheduling kernel for hard-body particle
//! simulation.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Ricochet sub-crates. For most users, adding `ricochet` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use ricochet::prelude::*;
//!
//! // One body bouncing between two walls one time unit apart.
//! struct Bouncer {
//!     bounces: u64,
//! }
//!
//! impl DynamicsProvider for Bouncer {
//!     fn body_count(&self) -> usize { 1 }
//!     fn predict(&self, kind: EventKind, _: BodyId, _: Option<BodyId>, _: SimTime) -> Prediction {
//!         match kind {
//!             EventKind::BoundaryCrossing => Prediction::after(1.0),
//!             _ => Prediction::NEVER,
//!         }
//!     }
//!     fn resolve(&mut self, record: &EventRecord, _: SimTime) -> Result<Resolution, ProviderError> {
//!         self.bounces += 1;
//!         Ok(Resolution::affecting(&record.bodies()))
//!     }
//!     fn describe(&self, body: BodyId) -> String { format!("{body}: {} bounces", self.bounces) }
//!     fn save_state(&self) -> Vec<u8> { self.bounces.to_le_bytes().to_vec() }
//!     fn load_state(&mut self, blob: &[u8]) -> Result<(), ProviderError> {
//!         let bytes: [u8; 8] = blob.try_into().map_err(|_| ProviderError::StateCorrupt {
//!             reason: "expected 8 bytes".into(),
//!         })?;
//!         self.bounces = u64::from_le_bytes(bytes);
//!         Ok(())
//!     }
//! }
//!
//! struct Alone;
//! impl NeighbourProvider<Bouncer> for Alone {
//!     fn query(&self, _: &Bouncer, _: BodyId, _: &mut Candidates) {}
//! }
//!
//! let mut kernel = Orchestrator::initialize(KernelConfig::new(1), Bouncer { bounces: 0 }, Alone).unwrap();
//! let report = kernel.run_until(RunLimit::until(SimTime::new(3.0).unwrap())).unwrap();
//! assert_eq!(report.events, 3);
//! assert_eq!(kernel.dynamics().bounces, 3);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `ricochet-core` | IDs, time, event records, errors, provider traits |
//! | [`sched`] | `ricochet-sched` | Per-body queues, epoch table, global scheduler |
//! | [`checkpoint`] | `ricochet-checkpoint` | Snapshot types, binary codec, hashing |
//! | [`engine`] | `ricochet-engine` | Orchestrator, configuration, run loops |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`ricochet-core`).
///
/// Contains the event record, simulated time, error types and the
/// collaborator traits ([`types::DynamicsProvider`],
/// [`types::NeighbourProvider`]).
pub use ricochet_core as types;

/// Scheduling structures (`ricochet-sched`).
///
/// [`sched::ParticleEventQueue`], [`sched::EpochTable`] and
/// [`sched::GlobalScheduler`]. The orchestrator owns these; use them
/// directly only for custom drivers or inspection.
pub use ricochet_sched as sched;

/// Checkpoint snapshots (`ricochet-checkpoint`).
///
/// Serialize a [`checkpoint::Checkpoint`] with [`checkpoint::to_bytes`] and
/// compare runs with [`checkpoint::checkpoint_hash`] and
/// [`checkpoint::trace_hash`].
pub use ricochet_checkpoint as checkpoint;

/// The event loop (`ricochet-engine`).
///
/// [`engine::Orchestrator`] plus its configuration, metrics and run
/// limits.
pub use ricochet_engine as engine;

/// Common imports for typical Ricochet usage.
///
/// ```rust
/// use ricochet::prelude::*;
/// ```
///
/// This imports the kernel, its configuration, the provider traits and
/// the types they exchange.
pub mod prelude {
    // Core types
    pub use ricochet_core::{
        BodyId, Candidates, EventKind, EventRecord, EventSummary, OutcomeMetadata, SimTime,
        Subject, SystemEventId,
    };

    // Provider traits
    pub use ricochet_core::{DynamicsProvider, NeighbourProvider, Prediction, Resolution};

    // Errors
    pub use ricochet_core::{ConfigError, KernelError, ProviderError};

    // Checkpoints
    pub use ricochet_checkpoint::Checkpoint;

    // Engine
    pub use ricochet_engine::{
        KernelConfig, KernelMetrics, Orchestrator, RunLimit, RunReport, StepOutcome,
        StopReason, SystemEventSpec, TimeFrame,
    };
}
