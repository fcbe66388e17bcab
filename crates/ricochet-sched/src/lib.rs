//! Scheduling structures for the Ricochet kernel.
//!
//! Three pieces, used together by the engine's orchestrator:
//!
//! - [`ParticleEventQueue`]: one small min-heap of predictions per body.
//! - [`EpochTable`]: per-body epochs and per-source generations used to
//!   invalidate predictions lazily.
//! - [`GlobalScheduler`]: an indexed min-heap over every queue front and
//!   every active system source.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod epoch;
pub mod queue;
pub mod scheduler;

pub use epoch::{EpochTable, Freshness};
pub use queue::ParticleEventQueue;
pub use scheduler::GlobalScheduler;
