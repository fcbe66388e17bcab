//! System-wide event sources: tickers, thermostats, samplers.
//!
//! A source is not owned by any body. Its single pending record lives in
//! the global scheduler directly, stamped with the source's generation
//! from the [`EpochTable`](ricochet_sched::EpochTable).

use indexmap::IndexMap;

use ricochet_core::{ConfigError, Epoch, EventRecord, SimTime, SystemEventId};

/// Registration request for a system source.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemEventSpec {
    /// Human-readable label, logged and checkpointed.
    pub name: String,
    /// Delay from registration until the first firing.
    pub start: f64,
    /// Re-arm interval; `None` fires once and retires.
    pub period: Option<f64>,
    /// Copied into each firing's `aux`.
    pub tag: u32,
}

impl SystemEventSpec {
    /// A source firing every `period`, first after one period.
    pub fn periodic(name: impl Into<String>, period: f64) -> Self {
        Self {
            name: name.into(),
            start: period,
            period: Some(period),
            tag: 0,
        }
    }

    /// A source firing once, `delay` after registration.
    pub fn one_shot(name: impl Into<String>, delay: f64) -> Self {
        Self {
            name: name.into(),
            start: delay,
            period: None,
            tag: 0,
        }
    }

    /// Override the delay until the first firing.
    pub fn starting_after(mut self, delay: f64) -> Self {
        self.start = delay;
        self
    }

    /// Set the `aux` tag.
    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    /// Check the start delay and period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(ConfigError::InvalidStartTime { value: self.start });
        }
        if let Some(p) = self.period {
            validate_period(p)?;
        }
        Ok(())
    }
}

fn validate_period(p: f64) -> Result<(), ConfigError> {
    if !p.is_finite() || p <= 0.0 {
        return Err(ConfigError::InvalidPeriod { value: p });
    }
    Ok(())
}

/// A registered source.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemSource {
    /// Label from registration.
    pub name: String,
    /// Next firing time, frame-local.
    pub next: SimTime,
    /// Re-arm interval.
    pub period: Option<f64>,
    /// `aux` tag.
    pub tag: u32,
}

impl SystemSource {
    /// The pending record for this source.
    pub fn record(&self, id: SystemEventId, generation: Epoch) -> EventRecord {
        EventRecord::system(self.next, id, generation, self.tag)
    }
}

/// All active sources, in registration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemRegistry {
    sources: IndexMap<SystemEventId, SystemSource>,
    next_id: u32,
}

impl SystemRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a registry from stored sources.
    pub fn from_parts(
        sources: impl IntoIterator<Item = (SystemEventId, SystemSource)>,
        next_id: u32,
    ) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            next_id,
        }
    }

    /// Id that the next registration will receive.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Number of active sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// `true` if no source is active.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Register a validated spec at time `now`. Ids are never reused.
    pub fn register(
        &mut self,
        spec: SystemEventSpec,
        now: SimTime,
    ) -> Result<SystemEventId, ConfigError> {
        spec.validate()?;
        let next = now
            .after(spec.start)
            .ok_or(ConfigError::InvalidStartTime { value: spec.start })?;
        let id = SystemEventId(self.next_id);
        self.next_id += 1;
        self.sources.insert(
            id,
            SystemSource {
                name: spec.name,
                next,
                period: spec.period,
                tag: spec.tag,
            },
        );
        Ok(id)
    }

    /// Look up a source.
    pub fn get(&self, id: SystemEventId) -> Option<&SystemSource> {
        self.sources.get(&id)
    }

    /// Advance a periodic source past a firing at `fired`. Returns the
    /// new firing time, or `None` for a one-shot source.
    pub fn re_arm(&mut self, id: SystemEventId, fired: SimTime) -> Option<SimTime> {
        let src = self.sources.get_mut(&id)?;
        let next = fired.after(src.period?)?;
        src.next = next;
        Some(next)
    }

    /// Remove a source.
    pub fn retire(&mut self, id: SystemEventId) -> Option<SystemSource> {
        self.sources.shift_remove(&id)
    }

    /// Change a source's period.
    ///
    /// A pending periodic firing moves by the difference between the new
    /// and the old period, but never before `now`. A one-shot source keeps
    /// its pending firing and becomes periodic.
    pub fn set_period(
        &mut self,
        id: SystemEventId,
        period: f64,
        now: SimTime,
    ) -> Result<SimTime, ConfigError> {
        validate_period(period)?;
        let src = self
            .sources
            .get_mut(&id)
            .ok_or(ConfigError::UnknownSystemEvent { id })?;
        if let Some(old) = src.period {
            let moved = src.next.after(period - old).unwrap_or(src.next);
            src.next = moved.max(now);
        }
        src.period = Some(period);
        Ok(src.next)
    }

    /// Subtract `shift` from every pending firing time.
    pub fn shift(&mut self, shift: f64) {
        for src in self.sources.values_mut() {
            if let Some(t) = src.next.after(-shift) {
                src.next = t;
            }
        }
    }

    /// Active sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (SystemEventId, &SystemSource)> {
        self.sources.iter().map(|(&id, s)| (id, s))
    }
}
