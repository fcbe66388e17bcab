//! Lazy invalidation via per-participant epochs.
//!
//! Executing an event bumps the epoch of each affected body. Records
//! stamped with an older epoch are left in place and discarded when they
//! reach the front of the schedule, so no other queue is touched.
//!
//! System sources carry a generation with the same meaning: re-arming or
//! retiring a source bumps it.

use indexmap::IndexMap;

use ricochet_core::{BodyId, Epoch, EventRecord, Subject, SystemEventId};

/// Result of checking a record's stamp against the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Every participant's epoch matches the stamp.
    Fresh,
    /// At least one participant has moved on since the prediction.
    Stale,
    /// A participant is not registered (retired source or bad id).
    Unknown,
}

/// Arena-indexed epoch table for bodies plus a registry of system
/// source generations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EpochTable {
    bodies: Vec<Epoch>,
    systems: IndexMap<SystemEventId, Epoch>,
}

impl EpochTable {
    /// A table of `body_count` bodies, all at [`Epoch::ZERO`].
    pub fn new(body_count: usize) -> Self {
        Self {
            bodies: vec![Epoch::ZERO; body_count],
            systems: IndexMap::new(),
        }
    }

    /// Reassemble a table from exported parts.
    pub fn from_parts(
        bodies: Vec<Epoch>,
        systems: impl IntoIterator<Item = (SystemEventId, Epoch)>,
    ) -> Self {
        Self {
            bodies,
            systems: systems.into_iter().collect(),
        }
    }

    /// Number of registered bodies.
    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Current epoch of `body`.
    #[inline]
    pub fn body(&self, body: BodyId) -> Option<Epoch> {
        self.bodies.get(body.index()).copied()
    }

    /// Advance `body`'s epoch, invalidating every record stamped with the
    /// old one. Returns the new epoch.
    pub fn bump(&mut self, body: BodyId) -> Option<Epoch> {
        let slot = self.bodies.get_mut(body.index())?;
        *slot = slot.next();
        Some(*slot)
    }

    /// All body epochs, indexed by body id.
    pub fn bodies(&self) -> &[Epoch] {
        &self.bodies
    }

    /// Register a system source at generation zero.
    ///
    /// Returns `false` if the id is already registered.
    pub fn register_system(&mut self, id: SystemEventId) -> bool {
        if self.systems.contains_key(&id) {
            return false;
        }
        self.systems.insert(id, Epoch::ZERO);
        true
    }

    /// Current generation of a system source.
    #[inline]
    pub fn system(&self, id: SystemEventId) -> Option<Epoch> {
        self.systems.get(&id).copied()
    }

    /// Advance a system source's generation. Returns the new generation.
    pub fn bump_system(&mut self, id: SystemEventId) -> Option<Epoch> {
        let slot = self.systems.get_mut(&id)?;
        *slot = slot.next();
        Some(*slot)
    }

    /// Forget a system source. Any of its records become [`Freshness::Unknown`].
    pub fn retire_system(&mut self, id: SystemEventId) -> Option<Epoch> {
        self.systems.shift_remove(&id)
    }

    /// Registered system sources and their generations, in registration
    /// order.
    pub fn systems(&self) -> impl Iterator<Item = (SystemEventId, Epoch)> + '_ {
        self.systems.iter().map(|(&id, &e)| (id, e))
    }

    /// Current epoch of a record's subject.
    pub fn subject(&self, subject: Subject) -> Option<Epoch> {
        match subject {
            Subject::Body(b) => self.body(b),
            Subject::System(s) => self.system(s),
        }
    }

    /// Compare every participant's stamped epoch with the current one.
    pub fn check(&self, record: &EventRecord) -> Freshness {
        let stamp = record.stamp();
        let Some(current) = self.subject(record.subject()) else {
            return Freshness::Unknown;
        };
        if current != stamp.subject {
            return Freshness::Stale;
        }
        match (record.partner(), stamp.partner) {
            (None, None) => Freshness::Fresh,
            (Some(p), Some(pe)) => match self.body(p) {
                Some(cur) if cur == pe => Freshness::Fresh,
                Some(_) => Freshness::Stale,
                None => Freshness::Unknown,
            },
            // A partner without an epoch (or the reverse) cannot be produced
            // by the record constructors.
            _ => Freshness::Unknown,
        }
    }

    /// Shorthand for `check(record) == Freshness::Fresh`.
    #[inline]
    pub fn is_fresh(&self, record: &EventRecord) -> bool {
        self.check(record) == Freshness::Fresh
    }

    /// `true` if no participant's stamped epoch is ahead of the table.
    ///
    /// Stale records may exist in a consistent kernel; records from the
    /// future may not.
    pub fn admits(&self, record: &EventRecord) -> bool {
        let stamp = record.stamp();
        let subject_ok = self
            .subject(record.subject())
            .is_some_and(|cur| stamp.subject <= cur);
        let partner_ok = match (record.partner(), stamp.partner) {
            (None, None) => true,
            (Some(p), Some(pe)) => self.body(p).is_some_and(|cur| pe <= cur),
            _ => false,
        };
        subject_ok && partner_ok
    }
}
