//! Orchestrator: the single-threaded discrete-event loop.
//!
//! [`Orchestrator`] wires the per-body queues, the epoch table and the
//! global scheduler to the two collaborator providers and drives the
//! step state machine:
//!
//! ```text
//! Idle -> SelectNext -> Validate -> { Execute | DiscardAndRetry }
//!      -> Advance -> Propagate -> Idle
//! ```
//!
//! with `Exhausted` as the terminal state when nothing finite remains.
//!
//! # Failure model
//!
//! Stale records are the only recovered fault: they are discarded and
//! selection retries. Every other error halts the kernel; further
//! `step()` calls return [`KernelError::Halted`] until a checkpoint is
//! restored.

use smallvec::SmallVec;
use tracing::{debug, error, info, trace, warn};

use ricochet_core::{
    BodyId, Candidates, ConfigError, DegeneracyCause, DegeneracyReport, DynamicsProvider, Epoch,
    EventKind, EventRecord, EventSummary, InvariantReport, KernelError, NeighbourProvider,
    Prediction, Resolution, SimTime, Subject, SystemEventId,
};
use ricochet_sched::{EpochTable, Freshness, GlobalScheduler, ParticleEventQueue};

use crate::clock::SimulationClock;
use crate::config::{KernelConfig, TimeFrame};
use crate::metrics::KernelMetrics;
use crate::system::{SystemEventSpec, SystemRegistry};

// ── StepOutcome ─────────────────────────────────────────────────

/// Result of a successful [`Orchestrator::step`].
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// One event executed.
    Event(EventSummary),
    /// Nothing finite remains in the schedule. The state is unchanged.
    Exhausted,
}

impl StepOutcome {
    /// The executed event, if any.
    pub fn event(&self) -> Option<&EventSummary> {
        match self {
            Self::Event(s) => Some(s),
            Self::Exhausted => None,
        }
    }

    /// `true` for [`StepOutcome::Exhausted`].
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// Outcome of a step bounded by a frame-local time limit.
pub(crate) enum Stepped {
    Executed(EventSummary),
    Exhausted,
    /// The next valid event lies beyond the limit and was not executed.
    Deferred,
}

// ── ValidEvent ──────────────────────────────────────────────────

/// A record whose stamp matched every participant's epoch at selection.
///
/// Only the orchestrator's validation step constructs one; execution
/// accepts nothing else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidEvent {
    record: EventRecord,
}

impl ValidEvent {
    /// The validated record.
    pub fn record(&self) -> &EventRecord {
        &self.record
    }
}

// ── KernelState ─────────────────────────────────────────────────

/// Every piece of mutable scheduling state, owned in one place.
#[derive(Clone, Debug)]
pub(crate) struct KernelState {
    pub(crate) clock: SimulationClock,
    pub(crate) queues: Vec<ParticleEventQueue>,
    pub(crate) epochs: EpochTable,
    pub(crate) scheduler: GlobalScheduler,
    pub(crate) systems: SystemRegistry,
    pub(crate) event_count: u64,
    pub(crate) halted: bool,
}

impl KernelState {
    pub(crate) fn new(config: &KernelConfig) -> Self {
        let n = config.body_count;
        Self {
            clock: SimulationClock::new(),
            queues: (0..n)
                .map(|i| ParticleEventQueue::with_capacity(BodyId(i as u32), config.queue_capacity_hint))
                .collect(),
            epochs: EpochTable::new(n),
            scheduler: GlobalScheduler::new(n),
            systems: SystemRegistry::new(),
            event_count: 0,
            halted: false,
        }
    }
}

// ── Orchestrator ────────────────────────────────────────────────

/// The discrete-event kernel.
///
/// Generic over the dynamics provider `D` and a neighbour provider `N`
/// that reads `D`. `Send` whenever both providers are.
pub struct Orchestrator<D, N> {
    pub(crate) config: KernelConfig,
    pub(crate) dynamics: D,
    pub(crate) neighbours: N,
    pub(crate) state: KernelState,
    pub(crate) metrics: KernelMetrics,
    scratch: Candidates,
}

impl<D, N> Orchestrator<D, N>
where
    D: DynamicsProvider,
    N: NeighbourProvider<D>,
{
    /// Validate `config`, build partitions and predict every body.
    pub fn initialize(config: KernelConfig, dynamics: D, neighbours: N) -> Result<Self, KernelError> {
        let mut orch = Self::unprimed(config, dynamics, neighbours)?;
        orch.neighbours.rebuild(&orch.dynamics, SimTime::ZERO);
        for i in 0..orch.config.body_count {
            orch.rebuild_body(BodyId(i as u32))?;
        }
        info!(
            bodies = orch.config.body_count,
            frame = ?orch.config.time_frame,
            "kernel initialized"
        );
        Ok(orch)
    }

    /// An orchestrator with validated config and empty queues.
    pub(crate) fn unprimed(config: KernelConfig, dynamics: D, neighbours: N) -> Result<Self, KernelError> {
        config.validate()?;
        let provider = dynamics.body_count();
        if provider != config.body_count {
            return Err(ConfigError::BodyCountMismatch {
                configured: config.body_count,
                provider,
            }
            .into());
        }
        let state = KernelState::new(&config);
        Ok(Self {
            config,
            dynamics,
            neighbours,
            state,
            metrics: KernelMetrics::default(),
            scratch: Candidates::new(),
        })
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Absolute simulated time.
    pub fn now(&self) -> SimTime {
        self.state.clock.absolute()
    }

    /// The clock, including the frame origin.
    pub fn clock(&self) -> &SimulationClock {
        &self.state.clock
    }

    /// Events executed since time zero.
    pub fn event_count(&self) -> u64 {
        self.state.event_count
    }

    /// Cumulative counters.
    pub fn metrics(&self) -> &KernelMetrics {
        &self.metrics
    }

    /// The configuration the kernel was built with.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The dynamics provider.
    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    /// The neighbour provider.
    pub fn neighbours(&self) -> &N {
        &self.neighbours
    }

    /// `true` after a fatal fault, until a restore.
    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    /// A body's pending predictions.
    pub fn queue(&self, body: BodyId) -> Option<&ParticleEventQueue> {
        self.state.queues.get(body.index())
    }

    /// The epoch table.
    pub fn epochs(&self) -> &EpochTable {
        &self.state.epochs
    }

    /// Active system sources.
    pub fn systems(&self) -> &SystemRegistry {
        &self.state.systems
    }

    /// The global scheduler.
    pub fn scheduler(&self) -> &GlobalScheduler {
        &self.state.scheduler
    }

    /// The scheduler minimum, possibly stale.
    pub fn peek_next(&self) -> Option<EventRecord> {
        self.state.scheduler.next_event()
    }

    // ── Step ────────────────────────────────────────────────────

    /// Execute the earliest valid event.
    pub fn step(&mut self) -> Result<StepOutcome, KernelError> {
        match self.step_bounded(None)? {
            Stepped::Executed(s) => Ok(StepOutcome::Event(s)),
            Stepped::Exhausted | Stepped::Deferred => Ok(StepOutcome::Exhausted),
        }
    }

    /// Execute the earliest valid event if it fires no later than `limit`
    /// (frame-local). Halts the kernel on any error.
    pub(crate) fn step_bounded(&mut self, limit: Option<SimTime>) -> Result<Stepped, KernelError> {
        if self.state.halted {
            return Err(KernelError::Halted);
        }
        let result = self.select_and_execute(limit);
        if let Err(e) = &result {
            self.state.halted = true;
            error!(error = %e, clock = %self.now(), "kernel halted");
        }
        result
    }

    fn select_and_execute(&mut self, limit: Option<SimTime>) -> Result<Stepped, KernelError> {
        let Some(valid) = self.select_next()? else {
            return Ok(Stepped::Exhausted);
        };
        if limit.is_some_and(|l| valid.record.time() > l) {
            return Ok(Stepped::Deferred);
        }
        self.execute(valid).map(Stepped::Executed)
    }

    /// SelectNext + Validate, discarding stale records until a fresh one
    /// surfaces.
    fn select_next(&mut self) -> Result<Option<ValidEvent>, KernelError> {
        let mut discards = 0usize;
        while let Some(record) = self.state.scheduler.next_event() {
            match self.state.epochs.check(&record) {
                Freshness::Fresh => return Ok(Some(ValidEvent { record })),
                Freshness::Stale => {
                    discards += 1;
                    self.metrics.stale_discards += 1;
                    trace!(record = %record, "stale record discarded");
                    if discards > self.config.max_discards_per_step {
                        return Err(self.invariant(
                            "stale discards exceeded max_discards_per_step",
                            Some(record),
                        ));
                    }
                    self.discard(record)?;
                }
                Freshness::Unknown => {
                    return Err(
                        self.invariant("record names an unregistered participant", Some(record))
                    );
                }
            }
        }
        Ok(None)
    }

    /// Drop a stale front. An emptied queue is rebuilt without bumping the
    /// epoch; the body is then repositioned.
    fn discard(&mut self, record: EventRecord) -> Result<(), KernelError> {
        let Subject::Body(b) = record.subject() else {
            // Source slots are replaced whenever a generation changes.
            return Err(self.invariant("stale system record in scheduler", Some(record)));
        };
        self.pop_front(b, &record)?;
        if self.state.queues[b.index()].is_empty() {
            self.metrics.partial_rebuilds += 1;
            self.predict_body(b)?;
        }
        self.reposition(b)
    }

    /// Remove `record` from the front of `b`'s queue.
    fn pop_front(&mut self, b: BodyId, record: &EventRecord) -> Result<(), KernelError> {
        let popped = self
            .state
            .queues
            .get_mut(b.index())
            .and_then(ParticleEventQueue::pop_min);
        if popped.as_ref() != Some(record) {
            return Err(self.invariant("scheduler slot out of sync with queue front", Some(*record)));
        }
        Ok(())
    }

    // ── Execute / Advance / Propagate ───────────────────────────

    fn execute(&mut self, valid: ValidEvent) -> Result<EventSummary, KernelError> {
        let record = valid.record;
        if !self.state.epochs.is_fresh(&record) {
            return Err(self.invariant("validated record is no longer fresh", Some(record)));
        }
        let now = self.state.clock.now();
        let t = record.time();
        if t < now || !t.is_finite() {
            return Err(self.degeneracy(
                DegeneracyCause::ClockRegression { from: now, to: t },
                record.kind(),
                record.subject(),
                record.partner(),
                Some(record),
            ));
        }

        // Execute
        let resolution = match record.kind() {
            EventKind::Interaction | EventKind::BoundaryCrossing | EventKind::SystemPeriodic => {
                self.dynamics.resolve(&record, t)?
            }
            EventKind::PartitionTransition => {
                self.neighbours.apply_transition(&self.dynamics, &record, t)?
            }
            EventKind::None => return Err(self.invariant("sentinel selected", Some(record))),
        };
        self.check_resolution(&record, &resolution)?;

        // Advance
        if let Err(cause) = self.state.clock.advance(t) {
            return Err(self.degeneracy(
                cause,
                record.kind(),
                record.subject(),
                record.partner(),
                Some(record),
            ));
        }
        self.state.event_count += 1;
        self.metrics.record_event(record.kind());
        trace!(record = %record, affected = resolution.affected.len(), "event executed");

        match record.subject() {
            Subject::Body(b) if !resolution.affected.contains(&b) => {
                // The subject's trajectory did not change; its other
                // predictions stay valid.
                self.pop_front(b, &record)?;
                self.reposition(b)?;
            }
            Subject::Body(_) => {}
            Subject::System(id) => self.fire_source(id, t)?,
        }

        // Propagate
        for &b in &resolution.affected {
            self.state.epochs.bump(b);
        }
        if let Some(factor) = resolution.rescale {
            self.apply_rescale(factor)?;
        }
        for &b in &resolution.affected {
            self.rebuild_body(b)?;
        }
        if self.config.verify_propagation {
            self.verify(&resolution.affected)?;
        }

        let summary = EventSummary {
            time: self.state.clock.to_absolute(t),
            kind: record.kind(),
            participants: record.bodies(),
            system: match record.subject() {
                Subject::System(id) => Some(id),
                Subject::Body(_) => None,
            },
            aux: record.aux(),
            affected: resolution.affected,
            metadata: resolution.metadata,
        };
        self.frame_after_event()?;
        Ok(summary)
    }

    fn check_resolution(&self, record: &EventRecord, resolution: &Resolution) -> Result<(), KernelError> {
        let n = self.config.body_count;
        let context = "resolve";
        if let Some(&b) = resolution.affected.iter().find(|b| b.index() >= n) {
            return Err(ConfigError::UnknownBody { id: b, context }.into());
        }
        let mut sorted = resolution.affected.clone();
        sorted.sort_unstable();
        if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::DuplicateParticipant { id: w[0], context }.into());
        }
        // Both queues hold a copy of a pair record; only an epoch bump
        // retires the partner's.
        if let (Subject::Body(subject), Some(partner)) = (record.subject(), record.partner()) {
            let affected = &resolution.affected;
            if !affected.contains(&subject) && !affected.contains(&partner) {
                return Err(ConfigError::UnaffectedInteraction { subject, partner }.into());
            }
        }
        if let Some(f) = resolution.rescale {
            if !f.is_finite() || f <= 0.0 {
                return Err(ConfigError::InvalidRescaleFactor { value: f }.into());
            }
        }
        Ok(())
    }

    /// Re-arm a periodic source after it fired at `fired`, or retire a
    /// one-shot source.
    fn fire_source(&mut self, id: SystemEventId, fired: SimTime) -> Result<(), KernelError> {
        if self.state.systems.re_arm(id, fired).is_some() {
            self.state.epochs.bump_system(id);
            self.arm_source(id)
        } else {
            self.state.systems.retire(id);
            self.state.epochs.retire_system(id);
            self.state.scheduler.retire_system_event(id);
            debug!(id = %id, "one-shot system event retired");
            Ok(())
        }
    }

    /// Publish a source's pending record to the scheduler.
    fn arm_source(&mut self, id: SystemEventId) -> Result<(), KernelError> {
        let rec = self.source_record(id)?;
        self.state.scheduler.register_system_event(id, rec);
        Ok(())
    }

    fn source_record(&self, id: SystemEventId) -> Result<EventRecord, KernelError> {
        let src = self
            .state
            .systems
            .get(id)
            .ok_or(ConfigError::UnknownSystemEvent { id })?;
        let generation = self
            .state
            .epochs
            .system(id)
            .ok_or(ConfigError::UnknownSystemEvent { id })?;
        Ok(src.record(id, generation))
    }

    /// Clear and refill `b`'s queue, then reposition it.
    fn rebuild_body(&mut self, b: BodyId) -> Result<(), KernelError> {
        self.predict_body(b)?;
        self.reposition(b)
    }

    fn reposition(&mut self, b: BodyId) -> Result<(), KernelError> {
        let front = self.state.queues[b.index()].peek_min();
        self.state.scheduler.on_body_updated(b, front)?;
        Ok(())
    }

    /// Refill `b`'s queue from fresh predictions at the current clock.
    fn predict_body(&mut self, b: BodyId) -> Result<(), KernelError> {
        let now = self.state.clock.now();
        let epoch = self.state.epochs.body(b).ok_or(ConfigError::UnknownBody {
            id: b,
            context: "rebuild",
        })?;
        let mut candidates = std::mem::take(&mut self.scratch);
        candidates.clear();
        self.neighbours.query(&self.dynamics, b, &mut candidates);
        let result = self.predict_records(b, epoch, &candidates, now);
        self.scratch = candidates;
        let records = result?;

        let queue = &mut self.state.queues[b.index()];
        queue.clear();
        for r in records {
            queue.push(r);
        }
        self.metrics.body_rebuilds += 1;
        Ok(())
    }

    fn predict_records(
        &mut self,
        b: BodyId,
        epoch: Epoch,
        candidates: &Candidates,
        now: SimTime,
    ) -> Result<SmallVec<[EventRecord; 8]>, KernelError> {
        self.check_candidates(b, candidates)?;
        let mut out = SmallVec::new();

        for &c in candidates {
            let partner_epoch = self.state.epochs.body(c).ok_or(ConfigError::UnknownBody {
                id: c,
                context: "neighbour query",
            })?;
            let p = self.dynamics.predict(EventKind::Interaction, b, Some(c), now);
            if let Some(t) = self.admit(p, EventKind::Interaction, b, Some(c), now)? {
                out.push(EventRecord::interaction(t, b, epoch, c, partner_epoch, p.aux));
            }
        }

        let p = self.dynamics.predict(EventKind::BoundaryCrossing, b, None, now);
        if let Some(t) = self.admit(p, EventKind::BoundaryCrossing, b, None, now)? {
            out.push(EventRecord::single(EventKind::BoundaryCrossing, t, b, epoch, p.aux));
        }

        let p = self.neighbours.predict_transition(&self.dynamics, b, now);
        if let Some(t) = self.admit(p, EventKind::PartitionTransition, b, None, now)? {
            out.push(EventRecord::single(EventKind::PartitionTransition, t, b, epoch, p.aux));
        }
        Ok(out)
    }

    fn check_candidates(&self, b: BodyId, candidates: &Candidates) -> Result<(), KernelError> {
        let n = self.config.body_count;
        let context = "neighbour query";
        for &c in candidates {
            if c.index() >= n {
                return Err(ConfigError::UnknownBody { id: c, context }.into());
            }
            if c == b {
                return Err(ConfigError::DuplicateParticipant { id: c, context }.into());
            }
        }
        let mut sorted = candidates.clone();
        sorted.sort_unstable();
        if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::DuplicateParticipant { id: w[0], context }.into());
        }
        Ok(())
    }

    /// Turn a relative prediction into an absolute time, or `None` for
    /// "never". NaN and negative delays beyond tolerance are fatal.
    fn admit(
        &mut self,
        p: Prediction,
        kind: EventKind,
        b: BodyId,
        partner: Option<BodyId>,
        now: SimTime,
    ) -> Result<Option<SimTime>, KernelError> {
        self.metrics.predictions += 1;
        let mut delay = p.delay;
        if delay.is_nan() {
            return Err(self.degeneracy(DegeneracyCause::NanDelay, kind, Subject::Body(b), partner, None));
        }
        if delay == f64::INFINITY {
            self.metrics.infinite_predictions += 1;
            return Ok(None);
        }
        if delay < 0.0 {
            let tolerance = self.config.negative_tolerance;
            if -delay > tolerance {
                return Err(self.degeneracy(
                    DegeneracyCause::NegativeDelay { delay, tolerance },
                    kind,
                    Subject::Body(b),
                    partner,
                    None,
                ));
            }
            self.metrics.clamped_delays += 1;
            warn!(body = %b, kind = %kind, delay, "negative delay within tolerance clamped to zero");
            delay = 0.0;
        }
        match now.after(delay) {
            Some(t) if t.is_finite() => Ok(Some(t)),
            _ => {
                self.metrics.infinite_predictions += 1;
                Ok(None)
            }
        }
    }

    /// Re-check what Propagate just produced.
    fn verify(&self, affected: &[BodyId]) -> Result<(), KernelError> {
        let now = self.state.clock.now();
        for &b in affected {
            let queue = &self.state.queues[b.index()];
            if let Some(r) = queue.iter().find(|r| !self.state.epochs.is_fresh(r) || r.time() < now) {
                return Err(self.invariant("rebuilt queue holds a stale or past record", Some(*r)));
            }
            if self.state.scheduler.front_of(Subject::Body(b)) != Some(queue.peek_min()) {
                return Err(self.invariant("scheduler slot differs from rebuilt queue front", None));
            }
        }
        if !self.state.scheduler.is_consistent() {
            return Err(self.invariant("scheduler heap inconsistent", None));
        }
        Ok(())
    }

    // ── Time frame and rescaling ────────────────────────────────

    fn frame_after_event(&mut self) -> Result<(), KernelError> {
        match self.config.time_frame {
            TimeFrame::Absolute => Ok(()),
            TimeFrame::Relative => self.rebase_frame().map(|_| ()),
            TimeFrame::Rebased { threshold } => {
                if self.state.clock.now().value() > threshold {
                    self.rebase_frame().map(|_| ())
                } else {
                    Ok(())
                }
            }
        }
    }

    fn rebase_frame(&mut self) -> Result<f64, KernelError> {
        let shift = self.state.clock.now().value();
        if shift == 0.0 {
            return Ok(0.0);
        }
        for q in &mut self.state.queues {
            q.shift(shift);
        }
        self.state.systems.shift(shift);
        self.dynamics.rebase(shift);
        self.state.clock.rebase();
        self.rebuild_scheduler()?;
        self.metrics.rebases += 1;
        if self.config.time_frame != TimeFrame::Relative {
            debug!(shift, origin = self.state.clock.origin(), "time frame rebased");
        }
        Ok(shift)
    }

    fn apply_rescale(&mut self, factor: f64) -> Result<(), KernelError> {
        let now = self.state.clock.now();
        for q in &mut self.state.queues {
            q.rescale(factor, now);
        }
        self.rebuild_scheduler()?;
        self.metrics.rescales += 1;
        debug!(factor, clock = %self.now(), "pending times rescaled");
        Ok(())
    }

    /// Re-key the scheduler from every queue front and source record.
    pub(crate) fn rebuild_scheduler(&mut self) -> Result<(), KernelError> {
        let mut records: Vec<EventRecord> =
            self.state.queues.iter().map(ParticleEventQueue::peek_min).collect();
        for (id, _) in self.state.systems.iter() {
            records.push(self.source_record(id)?);
        }
        self.state.scheduler.rebuild(records)?;
        Ok(())
    }

    // ── Driver operations ───────────────────────────────────────

    fn ensure_running(&self) -> Result<(), KernelError> {
        if self.state.halted {
            Err(KernelError::Halted)
        } else {
            Ok(())
        }
    }

    /// Register a system-wide source. Its first firing is `spec.start`
    /// after the current clock.
    pub fn register_system_event(&mut self, spec: SystemEventSpec) -> Result<SystemEventId, KernelError> {
        self.ensure_running()?;
        let name = spec.name.clone();
        let id = self.state.systems.register(spec, self.state.clock.now())?;
        self.state.epochs.register_system(id);
        self.arm_source(id)?;
        debug!(id = %id, name = %name, "system event registered");
        Ok(id)
    }

    /// Remove a source; its pending firing never executes.
    pub fn retire_system_event(&mut self, id: SystemEventId) -> Result<(), KernelError> {
        self.ensure_running()?;
        self.state
            .systems
            .retire(id)
            .ok_or(ConfigError::UnknownSystemEvent { id })?;
        self.state.epochs.retire_system(id);
        self.state.scheduler.retire_system_event(id);
        debug!(id = %id, "system event retired");
        Ok(())
    }

    /// Change a source's period. The pending firing moves by the change in
    /// period, but not before the current clock.
    pub fn set_period(&mut self, id: SystemEventId, period: f64) -> Result<(), KernelError> {
        self.ensure_running()?;
        let next = self
            .state
            .systems
            .set_period(id, period, self.state.clock.now())?;
        self.state.epochs.bump_system(id);
        self.arm_source(id)?;
        debug!(id = %id, period, next = %next, "system event period changed");
        Ok(())
    }

    /// Multiply every pending body prediction's offset from now by
    /// `factor`. System sources keep their times.
    ///
    /// The caller is responsible for changing the dynamics consistently
    /// (a velocity rescale by `s` needs `factor = 1/s`).
    pub fn rescale_times(&mut self, factor: f64) -> Result<(), KernelError> {
        self.ensure_running()?;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ConfigError::InvalidRescaleFactor { value: factor }.into());
        }
        self.apply_rescale(factor)
    }

    /// Fold the current clock into the frame origin. Returns the shift.
    pub fn rebase(&mut self) -> Result<f64, KernelError> {
        self.ensure_running()?;
        self.rebase_frame()
    }

    // ── Diagnostics ─────────────────────────────────────────────

    fn describe_body(&self, b: BodyId) -> String {
        if b.index() < self.config.body_count {
            self.dynamics.describe(b)
        } else {
            format!("{b}: unknown")
        }
    }

    fn degeneracy(
        &self,
        cause: DegeneracyCause,
        kind: EventKind,
        subject: Subject,
        partner: Option<BodyId>,
        record: Option<EventRecord>,
    ) -> KernelError {
        let participants = subject
            .body()
            .into_iter()
            .chain(partner)
            .map(|b| self.describe_body(b))
            .collect();
        KernelError::NumericDegeneracy(Box::new(DegeneracyReport {
            clock: self.now(),
            cause,
            kind,
            subject,
            partner,
            record,
            participants,
        }))
    }

    pub(crate) fn invariant(&self, violation: &str, record: Option<EventRecord>) -> KernelError {
        let mut lines = Vec::new();
        if let Some(r) = &record {
            for b in r.bodies() {
                let epoch = self
                    .state
                    .epochs
                    .body(b)
                    .map_or_else(|| "?".to_string(), |e| e.to_string());
                match self.state.queues.get(b.index()) {
                    Some(q) => lines.push(format!(
                        "{b}: epoch {epoch}, {} queued, front {}",
                        q.len(),
                        q.peek_min()
                    )),
                    None => lines.push(format!("{b}: no queue")),
                }
            }
        }
        if let Some(top) = self.state.scheduler.peek() {
            lines.push(format!("scheduler top {top}"));
        }
        KernelError::InvariantViolation(Box::new(InvariantReport {
            clock: self.now(),
            violation: violation.to_string(),
            record,
            dump: lines.join("\n"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::OutcomeMetadata;
    use ricochet_test_utils::{AllPairs, ScriptedDynamics};

    fn t(v: f64) -> SimTime {
        SimTime::new(v).unwrap()
    }

    fn kernel(d: ScriptedDynamics) -> Orchestrator<ScriptedDynamics, AllPairs> {
        let n = d.body_count();
        Orchestrator::initialize(KernelConfig::new(n).with_verification(true), d, AllPairs)
            .unwrap()
    }

    #[test]
    fn body_count_mismatch_rejected() {
        let d = ScriptedDynamics::new(2);
        let err = Orchestrator::initialize(KernelConfig::new(3), d, AllPairs).err().unwrap();
        assert!(matches!(
            err,
            KernelError::Configuration(ConfigError::BodyCountMismatch {
                configured: 3,
                provider: 2
            })
        ));
    }

    #[test]
    fn empty_system_is_exhausted() {
        let mut k = kernel(ScriptedDynamics::new(3));
        assert!(k.step().unwrap().is_exhausted());
        assert_eq!(k.now(), SimTime::ZERO);
        assert!(!k.is_halted());
    }

    #[test]
    fn earliest_event_wins_and_clock_advances() {
        let d = ScriptedDynamics::new(3)
            .boundary(0, &[4.0])
            .boundary(1, &[2.0])
            .boundary(2, &[3.0]);
        let mut k = kernel(d);
        let first = k.step().unwrap();
        let e = first.event().unwrap();
        assert_eq!(e.time, t(2.0));
        assert_eq!(e.participants.as_slice(), &[BodyId(1)]);
        assert_eq!(k.now(), t(2.0));
        assert_eq!(k.event_count(), 1);
    }

    #[test]
    fn pair_record_executes_once() {
        // Both queues hold a mirror of the same interaction; the lower
        // subject id wins the tie.
        let d = ScriptedDynamics::new(2).pair(0, 1, &[1.0]);
        let mut k = kernel(d);
        let e = k.step().unwrap();
        let e = e.event().unwrap();
        assert_eq!(e.kind, EventKind::Interaction);
        assert_eq!(e.participants.as_slice(), &[BodyId(0), BodyId(1)]);
        assert_eq!(e.affected.as_slice(), &[BodyId(0), BodyId(1)]);
        assert!(k.step().unwrap().is_exhausted());
        assert_eq!(k.metrics().events(EventKind::Interaction), 1);
    }

    #[test]
    fn stale_front_is_discarded_and_queue_rebuilt() {
        // Body 2's record with body 1 goes stale when 0-1 collide.
        let d = ScriptedDynamics::new(3)
            .pair(0, 1, &[1.0])
            .pair(1, 2, &[2.0, 7.0]);
        let mut k = kernel(d);
        k.step().unwrap();
        assert_eq!(k.metrics().stale_discards, 0);
        let e = k.step().unwrap();
        let e = e.event().unwrap();
        assert_eq!(e.time, t(7.0));
        assert_eq!(e.participants.as_slice(), &[BodyId(1), BodyId(2)]);
        assert_eq!(k.metrics().stale_discards, 1);
        assert_eq!(k.metrics().partial_rebuilds, 1);
    }

    #[test]
    fn clamped_negative_delay_fires_immediately() {
        let d = ScriptedDynamics::new(1).boundary_delays(0, &[1.0, -1e-12]);
        let mut k = kernel(d);
        k.step().unwrap();
        assert_eq!(k.metrics().clamped_delays, 1);
        let e = k.step().unwrap();
        assert_eq!(e.event().unwrap().time, t(1.0));
    }

    #[test]
    fn nan_prediction_halts() {
        let d = ScriptedDynamics::new(1).boundary_delays(0, &[1.0, f64::NAN]);
        let mut k = kernel(d);
        let err = k.step().unwrap_err();
        match err {
            KernelError::NumericDegeneracy(r) => assert_eq!(r.cause, DegeneracyCause::NanDelay),
            other => panic!("expected NumericDegeneracy, got {other:?}"),
        }
        assert!(k.is_halted());
        assert_eq!(k.step().unwrap_err(), KernelError::Halted);
        assert!(matches!(
            k.register_system_event(SystemEventSpec::periodic("tick", 1.0)),
            Err(KernelError::Halted)
        ));
    }

    #[test]
    fn unknown_neighbour_rejected() {
        let d = ScriptedDynamics::new(2).with_neighbours(0, &[5]);
        let err = Orchestrator::initialize(KernelConfig::new(2), d, ricochet_test_utils::ScriptedNeighbours)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            KernelError::Configuration(ConfigError::UnknownBody { id: BodyId(5), .. })
        ));
    }

    #[test]
    fn self_neighbour_rejected() {
        let d = ScriptedDynamics::new(2).with_neighbours(1, &[1]);
        let err = Orchestrator::initialize(KernelConfig::new(2), d, ricochet_test_utils::ScriptedNeighbours)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            KernelError::Configuration(ConfigError::DuplicateParticipant { id: BodyId(1), .. })
        ));
    }

    #[test]
    fn metadata_passes_through() {
        let d = ScriptedDynamics::new(1)
            .boundary(0, &[1.0])
            .with_metadata(OutcomeMetadata::from_values(&[2.5]));
        let mut k = kernel(d);
        let e = k.step().unwrap();
        assert_eq!(e.event().unwrap().metadata.values.as_slice(), &[2.5]);
    }

    #[test]
    fn validated_record_is_only_built_by_selection() {
        let d = ScriptedDynamics::new(1).boundary(0, &[1.0]);
        let mut k = kernel(d);
        let v = k.select_next().unwrap().unwrap();
        assert_eq!(v.record().kind(), EventKind::BoundaryCrossing);
    }

    #[test]
    fn interaction_affecting_neither_body_halts() {
        let d = ScriptedDynamics::new(2).pair(0, 1, &[1.0]).reporting_affected(&[]);
        let mut k = kernel(d);
        let err = k.step().unwrap_err();
        assert_eq!(
            err,
            KernelError::Configuration(ConfigError::UnaffectedInteraction {
                subject: BodyId(0),
                partner: BodyId(1),
            })
        );
        assert!(k.is_halted());
        assert_eq!(k.dynamics().resolved(), 1);
        assert_eq!(k.now(), SimTime::ZERO);
        assert_eq!(k.event_count(), 0);
    }

    #[test]
    fn interaction_affecting_one_body_retires_the_mirror() {
        let d = ScriptedDynamics::new(2).pair(0, 1, &[1.0]).reporting_affected(&[1]);
        let mut k = kernel(d);
        let e = k.step().unwrap();
        assert_eq!(e.event().unwrap().affected.as_slice(), &[BodyId(1)]);
        assert!(k.step().unwrap().is_exhausted());
        assert_eq!(k.dynamics().resolved(), 1);
        assert_eq!(k.metrics().events(EventKind::Interaction), 1);
    }

    #[test]
    fn resolve_naming_unknown_body_halts() {
        let d = ScriptedDynamics::new(2).boundary(0, &[1.0]).reporting_affected(&[5]);
        let mut k = kernel(d);
        let err = k.step().unwrap_err();
        assert!(matches!(
            err,
            KernelError::Configuration(ConfigError::UnknownBody {
                id: BodyId(5),
                context: "resolve"
            })
        ));
        assert!(k.is_halted());
        assert_eq!(k.now(), SimTime::ZERO);
    }

    #[test]
    fn resolve_repeating_a_body_halts() {
        let d = ScriptedDynamics::new(2).boundary(0, &[1.0]).reporting_affected(&[1, 0, 1]);
        let mut k = kernel(d);
        let err = k.step().unwrap_err();
        assert!(matches!(
            err,
            KernelError::Configuration(ConfigError::DuplicateParticipant {
                id: BodyId(1),
                context: "resolve"
            })
        ));
        assert!(k.is_halted());
        assert_eq!(k.now(), SimTime::ZERO);
    }

    fn two_stale_fronts(max_discards_per_step: usize) -> Orchestrator<ScriptedDynamics, AllPairs> {
        // The 0-1 collision at 1.0 leaves the records bodies 2 and 3 hold
        // against body 1 stale, and neither re-predicts anything.
        let d = ScriptedDynamics::new(4)
            .pair(0, 1, &[1.0])
            .pair(1, 2, &[2.0])
            .pair(1, 3, &[3.0]);
        let cfg = KernelConfig {
            max_discards_per_step,
            ..KernelConfig::new(4)
        };
        let mut k = Orchestrator::initialize(cfg, d, AllPairs).unwrap();
        assert_eq!(k.step().unwrap().event().map(|e| e.time), Some(t(1.0)));
        k
    }

    #[test]
    fn discard_budget_exceeded_is_an_invariant_violation() {
        let mut k = two_stale_fronts(1);
        let err = k.step().unwrap_err();
        match err {
            KernelError::InvariantViolation(report) => {
                assert!(report.violation.contains("max_discards_per_step"));
                assert_eq!(report.record.map(|r| r.subject()), Some(Subject::Body(BodyId(3))));
            }
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
        assert!(k.is_halted());
        assert_eq!(k.metrics().stale_discards, 2);
    }

    #[test]
    fn discard_budget_within_limit_recovers() {
        let mut k = two_stale_fronts(2);
        assert!(k.step().unwrap().is_exhausted());
        assert_eq!(k.metrics().stale_discards, 2);
        assert!(!k.is_halted());
    }
}
