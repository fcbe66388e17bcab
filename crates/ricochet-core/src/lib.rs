//! Core types and traits for the Ricochet event-driven simulation kernel.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! fundamental abstractions used throughout the Ricochet workspace:
//! identifiers, simulated time, event records, error types, and the
//! collaborator traits implemented by physics and broad-phase providers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod id;
pub mod time;
pub mod traits;

pub use error::{
    CheckpointError, ConfigError, DegeneracyCause, DegeneracyReport, InvariantReport, KernelError,
    ProviderError,
};
pub use event::{EventKind, EventRecord, EventSummary, OutcomeMetadata, Stamp, Subject};
pub use id::{AffectedSet, BodyId, Candidates, Epoch, SystemEventId};
pub use time::SimTime;
pub use traits::{DynamicsProvider, NeighbourProvider, Prediction, Resolution};
