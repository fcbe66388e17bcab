//! Capture and restore of the complete kernel state.
//!
//! A checkpoint is only taken at an Idle point. Restore validates the
//! whole snapshot before touching any live state, so a rejected snapshot
//! leaves the kernel exactly as it was.

use indexmap::IndexMap;
use tracing::info;

use ricochet_checkpoint::{Checkpoint, SystemEventState};
use ricochet_core::{
    BodyId, CheckpointError, DynamicsProvider, EventRecord, KernelError, NeighbourProvider,
    SystemEventId,
};
use ricochet_sched::{EpochTable, GlobalScheduler, ParticleEventQueue};

use crate::clock::SimulationClock;
use crate::config::KernelConfig;
use crate::orchestrator::{KernelState, Orchestrator};
use crate::system::{SystemRegistry, SystemSource};

impl<D, N> Orchestrator<D, N>
where
    D: DynamicsProvider,
    N: NeighbourProvider<D>,
{
    /// Build a kernel directly from a snapshot, without predicting.
    pub fn from_checkpoint(
        config: KernelConfig,
        dynamics: D,
        neighbours: N,
        checkpoint: &Checkpoint,
    ) -> Result<Self, KernelError> {
        let mut orch = Self::unprimed(config, dynamics, neighbours)?;
        orch.restore(checkpoint)?;
        Ok(orch)
    }

    /// Snapshot the current state. Fails once the kernel has halted,
    /// since a halted kernel may be mid-propagation.
    pub fn checkpoint(&self) -> Result<Checkpoint, KernelError> {
        if self.state.halted {
            return Err(KernelError::Halted);
        }
        let mut systems = Vec::with_capacity(self.state.systems.len());
        for (id, src) in self.state.systems.iter() {
            let generation = self
                .state
                .epochs
                .system(id)
                .ok_or_else(|| self.invariant("system source without a generation", None))?;
            systems.push(SystemEventState {
                id,
                name: src.name.clone(),
                generation,
                next: src.next,
                period: src.period,
                tag: src.tag,
            });
        }
        let clock = self.state.clock;
        Ok(Checkpoint {
            clock: clock.now(),
            origin: clock.origin(),
            event_count: self.state.event_count,
            next_system_id: self.state.systems.next_id(),
            queues: self.state.queues.iter().map(ParticleEventQueue::sorted).collect(),
            epochs: self.state.epochs.bodies().to_vec(),
            systems,
            scheduler_min: self.state.scheduler.next_event(),
            dynamics: self.dynamics.save_state(),
            neighbours: self.neighbours.save_state(),
        })
    }

    /// Replace the kernel state with `checkpoint`. Clears a halt.
    ///
    /// Structural validation runs first and leaves the kernel untouched
    /// on failure. A provider that rejects its blob leaves the kernel
    /// halted, since the provider state is then unknown.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), KernelError> {
        let staged = self.stage(checkpoint)?;

        if let Err(e) = self.dynamics.load_state(&checkpoint.dynamics) {
            self.state.halted = true;
            return Err(e.into());
        }
        if let Err(e) =
            self.neighbours
                .load_state(&self.dynamics, &checkpoint.neighbours, checkpoint.clock)
        {
            self.state.halted = true;
            return Err(e.into());
        }
        self.state = staged;
        info!(
            clock = %self.now(),
            events = self.state.event_count,
            records = checkpoint.record_count(),
            "checkpoint restored"
        );
        Ok(())
    }

    /// Validate `cp` and assemble the state it describes.
    fn stage(&self, cp: &Checkpoint) -> Result<KernelState, KernelError> {
        let n = self.config.body_count;
        for found in [cp.body_count(), cp.queues.len()] {
            if found != n {
                return Err(CheckpointError::BodyCountMismatch { expected: n, found }.into());
            }
        }
        let clock = cp.clock;
        if !clock.is_finite() {
            return Err(CheckpointError::InvalidClock {
                value: clock.value(),
            }
            .into());
        }
        if !cp.origin.is_finite() {
            return Err(CheckpointError::InvalidClock { value: cp.origin }.into());
        }

        let mut sources: IndexMap<SystemEventId, SystemSource> = IndexMap::new();
        let mut generations = Vec::with_capacity(cp.systems.len());
        for s in &cp.systems {
            let source = SystemSource {
                name: s.name.clone(),
                next: s.next,
                period: s.period,
                tag: s.tag,
            };
            let record = source.record(s.id, s.generation);
            if s.next < clock {
                return Err(CheckpointError::RecordInPast { record, clock }.into());
            }
            if s.id.0 >= cp.next_system_id || sources.insert(s.id, source).is_some() {
                return Err(CheckpointError::DuplicateSource { id: s.id }.into());
            }
            generations.push((s.id, s.generation));
        }
        let epochs = EpochTable::from_parts(cp.epochs.clone(), generations);

        let mut queues = Vec::with_capacity(n);
        for (i, stored) in cp.queues.iter().enumerate() {
            let b = BodyId(i as u32);
            for r in stored {
                if r.time() < clock {
                    return Err(CheckpointError::RecordInPast { record: *r, clock }.into());
                }
                if r.subject().body() == Some(b) && !epochs.admits(r) {
                    return Err(CheckpointError::StampAhead { record: *r }.into());
                }
            }
            let queue = ParticleEventQueue::from_records(b, stored.iter().copied())
                .map_err(|record| CheckpointError::ForeignRecord { queue: b, record })?;
            queues.push(queue);
        }

        let systems = SystemRegistry::from_parts(sources, cp.next_system_id);
        let mut fronts: Vec<EventRecord> = queues.iter().map(ParticleEventQueue::peek_min).collect();
        for (id, src) in systems.iter() {
            let generation = epochs
                .system(id)
                .ok_or(CheckpointError::DuplicateSource { id })?;
            fronts.push(src.record(id, generation));
        }
        let mut scheduler = GlobalScheduler::new(n);
        scheduler.rebuild(fronts)?;
        let rebuilt = scheduler.next_event();
        if rebuilt != cp.scheduler_min {
            return Err(CheckpointError::AggregateMismatch {
                stored: cp.scheduler_min,
                rebuilt,
            }
            .into());
        }

        Ok(KernelState {
            clock: SimulationClock::from_parts(clock, cp.origin),
            queues,
            epochs,
            scheduler,
            systems,
            event_count: cp.event_count,
            halted: false,
        })
    }
}
