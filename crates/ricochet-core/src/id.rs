//! Strongly-typed identifiers and the [`Candidates`] list alias.

use smallvec::SmallVec;
use std::fmt;

/// Identifies a body within a simulation.
///
/// Bodies are registered at initialization and assigned sequential IDs.
/// `BodyId(n)` indexes the n-th slot of every arena-indexed table in the
/// kernel (epochs, queues, scheduler positions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl BodyId {
    /// The arena index of this body.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for BodyId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a system-wide event source (ticker, thermostat, ...).
///
/// Allocated by the engine when a source is registered. Never reused
/// within one run, so a retired source cannot alias a newer one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemEventId(pub u32);

impl fmt::Display for SystemEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sys{}", self.0)
    }
}

impl From<u32> for SystemEventId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Per-participant validity counter.
///
/// Incremented every time the owning body (or system source) is affected
/// by an executed event. A prediction stamped with an older epoch is stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(pub u64);

impl Epoch {
    /// The epoch every participant starts at.
    pub const ZERO: Epoch = Epoch(0);

    /// The epoch that follows this one.
    #[inline]
    pub fn next(self) -> Epoch {
        Epoch(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<u64> for Epoch {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Candidate interaction partners returned by a neighbour query.
///
/// Inline capacity covers a 1-D cell neighbourhood and most 3-D cell
/// neighbourhoods at liquid densities; larger sets spill to the heap.
pub type Candidates = SmallVec<[BodyId; 16]>;

/// Bodies affected by one executed event.
///
/// One for boundary and transition events, two for pair interactions.
pub type AffectedSet = SmallVec<[BodyId; 2]>;
