//! Snapshot data types.

use ricochet_core::{Epoch, EventRecord, SimTime, SystemEventId};

/// Persisted state of one system-wide event source.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemEventState {
    /// Source identifier.
    pub id: SystemEventId,
    /// Human-readable label from registration.
    pub name: String,
    /// Current generation.
    pub generation: Epoch,
    /// Next firing time in the stored frame.
    pub next: SimTime,
    /// Re-arm interval; `None` for one-shot sources.
    pub period: Option<f64>,
    /// Tag carried in each firing's `aux`.
    pub tag: u32,
}

/// Complete kernel state at an Idle point (between two events).
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    /// Clock value in the stored frame.
    pub clock: SimTime,
    /// Accumulated frame origin. Absolute time is `origin + clock`.
    pub origin: f64,
    /// Events executed so far.
    pub event_count: u64,
    /// Next system source id to allocate.
    pub next_system_id: u32,
    /// Every body's queue, indexed by body id, each in ascending order.
    pub queues: Vec<Vec<EventRecord>>,
    /// Body epochs, indexed by body id.
    pub epochs: Vec<Epoch>,
    /// Active system sources in registration order.
    pub systems: Vec<SystemEventState>,
    /// The scheduler minimum at capture time.
    pub scheduler_min: Option<EventRecord>,
    /// Opaque dynamics provider state.
    pub dynamics: Vec<u8>,
    /// Opaque neighbour provider state (empty when membership is rebuilt
    /// from positions).
    pub neighbours: Vec<u8>,
}

impl Checkpoint {
    /// Number of bodies covered by the snapshot.
    pub fn body_count(&self) -> usize {
        self.epochs.len()
    }

    /// Total stored body records.
    pub fn record_count(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }
}
