//! Cumulative counters for the event loop.
//!
//! [`KernelMetrics`] is updated in place by the orchestrator. Counters
//! survive for the lifetime of one kernel instance and are not part of a
//! checkpoint; restoring resets nothing here.

use ricochet_core::EventKind;

/// Counters collected by the orchestrator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelMetrics {
    /// Executed events, indexed by [`EventKind::index`].
    pub events_by_kind: [u64; 5],
    /// Stale records discarded at the front of the schedule.
    pub stale_discards: u64,
    /// Discards that emptied a queue and forced a rebuild without an
    /// epoch bump.
    pub partial_rebuilds: u64,
    /// Full prediction rebuilds of a body's queue.
    pub body_rebuilds: u64,
    /// Predictions requested from providers.
    pub predictions: u64,
    /// Predictions that came back `+∞`.
    pub infinite_predictions: u64,
    /// Slightly negative delays clamped to zero.
    pub clamped_delays: u64,
    /// Global time rescales applied.
    pub rescales: u64,
    /// Time-frame rebases applied.
    pub rebases: u64,
}

impl KernelMetrics {
    /// Count one executed event.
    #[inline]
    pub fn record_event(&mut self, kind: EventKind) {
        self.events_by_kind[kind.index()] += 1;
    }

    /// Executed events of `kind`.
    #[inline]
    pub fn events(&self, kind: EventKind) -> u64 {
        self.events_by_kind[kind.index()]
    }

    /// Executed events of every kind.
    pub fn events_total(&self) -> u64 {
        self.events_by_kind.iter().sum()
    }
}
