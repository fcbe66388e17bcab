//! Event records: immutable descriptions of predicted occurrences.
//!
//! An [`EventRecord`] is produced whenever a body's queue is rebuilt and
//! consumed when it reaches the front of the global schedule. Records
//! are `Copy`; the kernel moves them between the per-body queues and the
//! global scheduler by value.
//!
//! # Ordering
//!
//! Records form a deterministic total order so that runs with identical
//! inputs produce identical event sequences:
//!
//! 1. `time` ascending;
//! 2. `kind` in declaration order of [`EventKind`];
//! 3. `subject` (bodies before system sources, then by id);
//! 4. `partner` (absent first, then by id);
//! 5. `aux`, then the stamp.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

use crate::id::{BodyId, Epoch, SystemEventId};
use crate::time::SimTime;

/// What kind of occurrence a record predicts.
///
/// The declaration order is the tie-break order at equal times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Pairwise interaction between the subject and its partner.
    Interaction,
    /// The subject reaches a boundary (wall, domain edge).
    BoundaryCrossing,
    /// A system-wide source fires (ticker, thermostat).
    SystemPeriodic,
    /// The subject moves between spatial partitions (cells).
    PartitionTransition,
    /// Sentinel: nothing is predicted. Always carries `+∞`.
    None,
}

impl EventKind {
    /// All kinds, in tie-break order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Interaction,
        EventKind::BoundaryCrossing,
        EventKind::SystemPeriodic,
        EventKind::PartitionTransition,
        EventKind::None,
    ];

    /// Dense index, usable for per-kind counter arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(i: usize) -> Option<EventKind> {
        Self::ALL.get(i).copied()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Interaction => "interaction",
            Self::BoundaryCrossing => "boundary",
            Self::SystemPeriodic => "system",
            Self::PartitionTransition => "transition",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// The primary participant of a record: the queue or source that owns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// A body; the record lives in that body's queue.
    Body(BodyId),
    /// A system-wide source; the record lives in the scheduler directly.
    System(SystemEventId),
}

impl Subject {
    /// The body id, if this subject is a body.
    #[inline]
    pub fn body(self) -> Option<BodyId> {
        match self {
            Self::Body(id) => Some(id),
            Self::System(_) => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(id) => write!(f, "{id}"),
            Self::System(id) => write!(f, "{id}"),
        }
    }
}

/// Participant epochs captured at prediction time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stamp {
    /// Epoch of the subject (body epoch or system source generation).
    pub subject: Epoch,
    /// Epoch of the partner body, for pair records.
    pub partner: Option<Epoch>,
}

/// One predicted future occurrence. Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventRecord {
    time: SimTime,
    kind: EventKind,
    subject: Subject,
    partner: Option<BodyId>,
    aux: u32,
    stamp: Stamp,
}

impl EventRecord {
    /// A pair interaction owned by `subject`'s queue.
    pub fn interaction(
        time: SimTime,
        subject: BodyId,
        subject_epoch: Epoch,
        partner: BodyId,
        partner_epoch: Epoch,
        aux: u32,
    ) -> Self {
        Self {
            time,
            kind: EventKind::Interaction,
            subject: Subject::Body(subject),
            partner: Some(partner),
            aux,
            stamp: Stamp {
                subject: subject_epoch,
                partner: Some(partner_epoch),
            },
        }
    }

    /// A single-body record (boundary crossing or partition transition).
    pub fn single(kind: EventKind, time: SimTime, body: BodyId, epoch: Epoch, aux: u32) -> Self {
        Self {
            time,
            kind,
            subject: Subject::Body(body),
            partner: None,
            aux,
            stamp: Stamp {
                subject: epoch,
                partner: None,
            },
        }
    }

    /// A system-source firing.
    pub fn system(time: SimTime, source: SystemEventId, generation: Epoch, aux: u32) -> Self {
        Self {
            time,
            kind: EventKind::SystemPeriodic,
            subject: Subject::System(source),
            partner: None,
            aux,
            stamp: Stamp {
                subject: generation,
                partner: None,
            },
        }
    }

    /// The sentinel for an empty queue owned by `subject`.
    pub fn none(subject: Subject) -> Self {
        Self {
            time: SimTime::NEVER,
            kind: EventKind::None,
            subject,
            partner: None,
            aux: 0,
            stamp: Stamp::default(),
        }
    }

    /// The same record at a different time.
    ///
    /// Used by global time rescaling and frame rebasing; the sentinel keeps
    /// its `+∞`.
    pub fn with_time(self, time: SimTime) -> Self {
        if self.kind == EventKind::None {
            return self;
        }
        Self { time, ..self }
    }

    /// Absolute time at which the record fires.
    #[inline]
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Kind of occurrence.
    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Primary participant.
    #[inline]
    pub fn subject(&self) -> Subject {
        self.subject
    }

    /// Secondary participant, for pair records.
    #[inline]
    pub fn partner(&self) -> Option<BodyId> {
        self.partner
    }

    /// Provider-defined discriminator (wall index, cell face, source tag).
    #[inline]
    pub fn aux(&self) -> u32 {
        self.aux
    }

    /// Epochs captured at prediction time.
    #[inline]
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    /// `true` for the `None` sentinel.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.kind == EventKind::None
    }

    /// Bodies named by this record, subject first.
    pub fn bodies(&self) -> SmallVec<[BodyId; 2]> {
        let mut out = SmallVec::new();
        if let Subject::Body(b) = self.subject {
            out.push(b);
        }
        if let Some(p) = self.partner {
            out.push(p);
        }
        out
    }

    fn order_key(&self) -> (SimTime, EventKind, Subject, Option<BodyId>, u32) {
        (self.time, self.kind, self.subject, self.partner, self.aux)
    }
}

impl Ord for EventRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key()
            .cmp(&other.order_key())
            .then_with(|| self.stamp.cmp(&other.stamp))
    }
}

impl PartialOrd for EventRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.time, self.kind, self.subject)?;
        if let Some(p) = self.partner {
            write!(f, "<->{p}")?;
        }
        write!(f, " aux={} [{}", self.aux, self.stamp.subject)?;
        if let Some(pe) = self.stamp.partner {
            write!(f, ",{pe}")?;
        }
        write!(f, "]")
    }
}

/// Opaque outcome data returned by a provider's `resolve`.
///
/// The kernel never inspects it; it is handed back to the driver in the
/// [`EventSummary`] for statistics collaborators.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutcomeMetadata {
    /// Provider-defined scalars (impulse, energy change, ...).
    pub values: SmallVec<[f64; 4]>,
}

impl OutcomeMetadata {
    /// Metadata carrying no values.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Metadata carrying `values`.
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            values: SmallVec::from_slice(values),
        }
    }
}

/// What one successful `step()` executed.
#[derive(Clone, Debug, PartialEq)]
pub struct EventSummary {
    /// Absolute time of the event, including any frame offset.
    pub time: SimTime,
    /// Kind of the executed record.
    pub kind: EventKind,
    /// Participating bodies, subject first. Empty for system events.
    pub participants: SmallVec<[BodyId; 2]>,
    /// The source that fired, for system events.
    pub system: Option<SystemEventId>,
    /// The record's `aux` discriminator.
    pub aux: u32,
    /// Bodies whose state changed (and whose predictions were rebuilt).
    pub affected: SmallVec<[BodyId; 2]>,
    /// Pass-through provider metadata.
    pub metadata: OutcomeMetadata,
}
