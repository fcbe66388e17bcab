//! Scripted providers for driving the kernel through exact sequences.
//!
//! Every body carries a revision counter that increments whenever the
//! body is affected. Scripts are indexed by revision:
//!
//! - a boundary or transition script for body `b` is read at `rev(b)`;
//! - a pair script for `{a, b}` is read at `rev(a) + rev(b)`.
//!
//! Entries past the end of a script mean "never".

use std::cell::Cell;

use indexmap::IndexMap;

use ricochet_core::{
    BodyId, Candidates, DynamicsProvider, EventKind, EventRecord, NeighbourProvider,
    OutcomeMetadata, Prediction, ProviderError, Resolution, SimTime, Subject,
};

/// One scripted prediction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Timing {
    /// An absolute time. Delays are computed against the query clock,
    /// so a time earlier than `now` yields a negative delay.
    At(f64),
    /// A raw delay handed to the kernel as-is.
    After(f64),
}

/// What a system firing with a given tag does.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemEffect {
    pub affected: Vec<BodyId>,
    pub rescale: Option<f64>,
}

/// Dynamics whose predictions come from per-body and per-pair scripts.
#[derive(Clone, Debug)]
pub struct ScriptedDynamics {
    n: usize,
    revisions: Vec<Cell<u32>>,
    boundary: Vec<Vec<Timing>>,
    transitions: Vec<Vec<Timing>>,
    pairs: IndexMap<(BodyId, BodyId), Vec<Timing>>,
    neighbours: IndexMap<BodyId, Vec<BodyId>>,
    systems: IndexMap<u32, SystemEffect>,
    metadata: OutcomeMetadata,
    reported: Option<Vec<BodyId>>,
    fail_on_resolve: Option<u64>,
    resolved: u64,
    origin: f64,
}

fn key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn at(times: &[f64]) -> Vec<Timing> {
    times.iter().map(|&t| Timing::At(t)).collect()
}

fn after(delays: &[f64]) -> Vec<Timing> {
    delays.iter().map(|&d| Timing::After(d)).collect()
}

impl ScriptedDynamics {
    /// `n` bodies that never do anything.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            revisions: (0..n).map(|_| Cell::new(0)).collect(),
            boundary: vec![Vec::new(); n],
            transitions: vec![Vec::new(); n],
            pairs: IndexMap::new(),
            neighbours: IndexMap::new(),
            systems: IndexMap::new(),
            metadata: OutcomeMetadata::empty(),
            reported: None,
            fail_on_resolve: None,
            resolved: 0,
            origin: 0.0,
        }
    }

    /// Boundary crossings of `body` at absolute `times`.
    pub fn boundary(mut self, body: u32, times: &[f64]) -> Self {
        self.boundary[body as usize] = at(times);
        self
    }

    /// Boundary crossings of `body` after raw `delays`.
    pub fn boundary_delays(mut self, body: u32, delays: &[f64]) -> Self {
        self.boundary[body as usize] = after(delays);
        self
    }

    /// Partition transitions of `body` at absolute `times`. Read by
    /// [`ScriptedNeighbours`].
    pub fn transition(mut self, body: u32, times: &[f64]) -> Self {
        self.transitions[body as usize] = at(times);
        self
    }

    /// Interactions of `a` with `b` at absolute `times`.
    pub fn pair(mut self, a: u32, b: u32, times: &[f64]) -> Self {
        self.pairs.insert(key(BodyId(a), BodyId(b)), at(times));
        self
    }

    /// Interactions of `a` with `b` after raw `delays`.
    pub fn pair_delays(mut self, a: u32, b: u32, delays: &[f64]) -> Self {
        self.pairs.insert(key(BodyId(a), BodyId(b)), after(delays));
        self
    }

    /// Candidate list returned by [`ScriptedNeighbours`] for `body`,
    /// passed through unchecked.
    pub fn with_neighbours(mut self, body: u32, ids: &[u32]) -> Self {
        self.neighbours
            .insert(BodyId(body), ids.iter().map(|&i| BodyId(i)).collect());
        self
    }

    /// System firings tagged `tag` affect `bodies`.
    pub fn on_system(mut self, tag: u32, bodies: &[u32]) -> Self {
        self.systems.entry(tag).or_default().affected = bodies.iter().map(|&i| BodyId(i)).collect();
        self
    }

    /// System firings tagged `tag` request a rescale by `factor`.
    pub fn rescale_on_system(mut self, tag: u32, factor: f64) -> Self {
        self.systems.entry(tag).or_default().rescale = Some(factor);
        self
    }

    /// Attach `metadata` to every resolution.
    pub fn with_metadata(mut self, metadata: OutcomeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Body-scoped resolutions report `ids` as affected instead of the
    /// record's participants, passed through unchecked.
    pub fn reporting_affected(mut self, ids: &[u32]) -> Self {
        self.reported = Some(ids.iter().map(|&i| BodyId(i)).collect());
        self
    }

    /// The `n`-th call to `resolve` (1-based) fails.
    pub fn fail_on_resolve(mut self, n: u64) -> Self {
        self.fail_on_resolve = Some(n);
        self
    }

    /// Current revision of `body`.
    pub fn revision(&self, body: BodyId) -> u32 {
        self.revisions[body.index()].get()
    }

    /// Successful and failed `resolve` calls so far.
    pub fn resolved(&self) -> u64 {
        self.resolved
    }

    /// Mark `body` as changed without a `resolve` call.
    pub fn touch(&self, body: BodyId) {
        let r = &self.revisions[body.index()];
        r.set(r.get() + 1);
    }

    fn delay(&self, entry: Option<&Timing>, now: SimTime) -> Prediction {
        match entry {
            Some(Timing::At(t)) => Prediction::after(t - self.origin - now.value()),
            Some(Timing::After(d)) => Prediction::after(*d),
            None => Prediction::NEVER,
        }
    }

    fn neighbours_of(&self, body: BodyId) -> Option<&[BodyId]> {
        self.neighbours.get(&body).map(Vec::as_slice)
    }

    fn predict_transition(&self, body: BodyId, now: SimTime) -> Prediction {
        let script = &self.transitions[body.index()];
        self.delay(script.get(self.revision(body) as usize), now)
            .with_aux(1)
    }
}

impl DynamicsProvider for ScriptedDynamics {
    fn body_count(&self) -> usize {
        self.n
    }

    fn predict(&self, kind: EventKind, body: BodyId, partner: Option<BodyId>, now: SimTime) -> Prediction {
        match (kind, partner) {
            (EventKind::Interaction, Some(p)) => {
                let idx = (self.revision(body) + self.revision(p)) as usize;
                let entry = self.pairs.get(&key(body, p)).and_then(|s| s.get(idx));
                self.delay(entry, now)
            }
            (EventKind::BoundaryCrossing, _) => {
                let script = &self.boundary[body.index()];
                self.delay(script.get(self.revision(body) as usize), now)
            }
            _ => Prediction::NEVER,
        }
    }

    fn resolve(&mut self, record: &EventRecord, _now: SimTime) -> Result<Resolution, ProviderError> {
        self.resolved += 1;
        if self.fail_on_resolve == Some(self.resolved) {
            return Err(ProviderError::ResolveFailed {
                reason: format!("scripted failure on resolve {}", self.resolved),
            });
        }
        let mut resolution = match (record.kind(), record.subject()) {
            (EventKind::Interaction | EventKind::BoundaryCrossing, Subject::Body(_)) => {
                match &self.reported {
                    Some(ids) => Resolution::affecting(ids),
                    None => Resolution::affecting(&record.bodies()),
                }
            }
            (EventKind::SystemPeriodic, Subject::System(_)) => {
                let effect = self.systems.get(&record.aux()).cloned().unwrap_or_default();
                let mut r = Resolution::affecting(&effect.affected);
                r.rescale = effect.rescale;
                r
            }
            (kind, _) => return Err(ProviderError::UnsupportedKind { kind }),
        };
        for &b in &resolution.affected {
            if b.index() < self.n {
                self.touch(b);
            }
        }
        resolution.metadata = self.metadata.clone();
        Ok(resolution)
    }

    fn describe(&self, body: BodyId) -> String {
        format!("{body}: scripted, revision {}", self.revision(body))
    }

    fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + 4 * self.n);
        out.extend_from_slice(&self.resolved.to_le_bytes());
        out.extend_from_slice(&self.origin.to_le_bytes());
        for r in &self.revisions {
            out.extend_from_slice(&r.get().to_le_bytes());
        }
        out
    }

    fn load_state(&mut self, blob: &[u8]) -> Result<(), ProviderError> {
        if blob.len() != 16 + 4 * self.n {
            return Err(ProviderError::StateCorrupt {
                reason: format!("expected {} bytes, got {}", 16 + 4 * self.n, blob.len()),
            });
        }
        let (head, revs) = blob.split_at(16);
        let mut word = [0u8; 8];
        word.copy_from_slice(&head[..8]);
        self.resolved = u64::from_le_bytes(word);
        word.copy_from_slice(&head[8..]);
        self.origin = f64::from_le_bytes(word);
        for (cell, chunk) in self.revisions.iter().zip(revs.chunks_exact(4)) {
            let mut b = [0u8; 4];
            b.copy_from_slice(chunk);
            cell.set(u32::from_le_bytes(b));
        }
        Ok(())
    }

    fn rebase(&mut self, shift: f64) {
        self.origin += shift;
    }
}

/// Neighbour provider reading its candidate lists and transition scripts
/// from a [`ScriptedDynamics`].
///
/// Bodies without a configured list see every other body.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptedNeighbours;

impl NeighbourProvider<ScriptedDynamics> for ScriptedNeighbours {
    fn query(&self, dynamics: &ScriptedDynamics, body: BodyId, out: &mut Candidates) {
        match dynamics.neighbours_of(body) {
            Some(ids) => out.extend_from_slice(ids),
            None => AllPairs.query(dynamics, body, out),
        }
    }

    fn predict_transition(&self, dynamics: &ScriptedDynamics, body: BodyId, now: SimTime) -> Prediction {
        dynamics.predict_transition(body, now)
    }

    fn apply_transition(
        &mut self,
        dynamics: &ScriptedDynamics,
        record: &EventRecord,
        _now: SimTime,
    ) -> Result<Resolution, ProviderError> {
        let Some(b) = record.subject().body() else {
            return Err(ProviderError::UnsupportedKind {
                kind: record.kind(),
            });
        };
        dynamics.touch(b);
        Ok(Resolution::affecting(&[b]))
    }
}

/// Every body is a candidate partner of every other body.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllPairs;

impl<D: DynamicsProvider + ?Sized> NeighbourProvider<D> for AllPairs {
    fn query(&self, dynamics: &D, body: BodyId, out: &mut Candidates) {
        let n = dynamics.body_count() as u32;
        out.extend((0..n).map(BodyId).filter(|&b| b != body));
    }
}
