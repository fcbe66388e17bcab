//! Driver loops over [`Orchestrator::step`].

use ricochet_core::{DynamicsProvider, EventSummary, KernelError, NeighbourProvider, SimTime};

use crate::orchestrator::{Orchestrator, Stepped};

/// When a run stops. Unset limits are unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunLimit {
    /// Stop before executing any event later than this absolute time.
    pub time: Option<SimTime>,
    /// Stop after this many events.
    pub events: Option<u64>,
}

impl RunLimit {
    /// Run until absolute time `t`.
    pub fn until(t: SimTime) -> Self {
        Self {
            time: Some(t),
            events: None,
        }
    }

    /// Run for `n` events.
    pub fn events(n: u64) -> Self {
        Self {
            time: None,
            events: Some(n),
        }
    }

    /// Add an event limit.
    pub fn with_events(mut self, n: u64) -> Self {
        self.events = Some(n);
        self
    }
}

/// Why a run returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The next valid event lies beyond the time limit.
    TimeLimit,
    /// The event limit was reached.
    EventLimit,
    /// Nothing finite remains.
    Exhausted,
}

/// Summary of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Events executed by this run.
    pub events: u64,
    /// Why the run stopped.
    pub stop: StopReason,
    /// Absolute clock at return. The clock is never advanced past the
    /// last executed event.
    pub clock: SimTime,
}

impl<D, N> Orchestrator<D, N>
where
    D: DynamicsProvider,
    N: NeighbourProvider<D>,
{
    /// Step until `limit` is reached or the schedule is exhausted.
    pub fn run_until(&mut self, limit: RunLimit) -> Result<RunReport, KernelError> {
        self.run_with(limit, |_| {})
    }

    /// Like [`run_until`](Self::run_until), handing each executed event to
    /// `observe`.
    pub fn run_with<F>(&mut self, limit: RunLimit, mut observe: F) -> Result<RunReport, KernelError>
    where
        F: FnMut(&EventSummary),
    {
        let mut events = 0u64;
        let stop = loop {
            if limit.events.is_some_and(|max| events >= max) {
                break StopReason::EventLimit;
            }
            // Rebasing moves the origin, so convert on every pass.
            let bound = limit.time.map(|t| self.clock().to_local(t));
            match self.step_bounded(bound)? {
                Stepped::Executed(summary) => {
                    events += 1;
                    observe(&summary);
                }
                Stepped::Deferred => break StopReason::TimeLimit,
                Stepped::Exhausted => break StopReason::Exhausted,
            }
        };
        Ok(RunReport {
            events,
            stop,
            clock: self.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_test_utils::{AllPairs, ScriptedDynamics};

    use crate::config::KernelConfig;

    fn t(v: f64) -> SimTime {
        SimTime::new(v).unwrap()
    }

    fn kernel() -> Orchestrator<ScriptedDynamics, AllPairs> {
        let d = ScriptedDynamics::new(1).boundary(0, &[1.0, 2.0, 3.0, 4.0]);
        Orchestrator::initialize(KernelConfig::new(1), d, AllPairs).unwrap()
    }

    #[test]
    fn time_limit_stops_before_later_event() {
        let mut k = kernel();
        let report = k.run_until(RunLimit::until(t(2.5))).unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.stop, StopReason::TimeLimit);
        assert_eq!(report.clock, t(2.0));
        // The deferred event is still pending.
        assert_eq!(k.peek_next().map(|r| r.time()), Some(t(3.0)));
    }

    #[test]
    fn event_at_limit_executes() {
        let mut k = kernel();
        let report = k.run_until(RunLimit::until(t(2.0))).unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.clock, t(2.0));
    }

    #[test]
    fn event_limit_and_exhaustion() {
        let mut k = kernel();
        let report = k.run_until(RunLimit::events(3)).unwrap();
        assert_eq!(report.stop, StopReason::EventLimit);
        assert_eq!(report.events, 3);
        let mut seen = Vec::new();
        let report = k.run_with(RunLimit::default(), |e| seen.push(e.time)).unwrap();
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(seen, vec![t(4.0)]);
    }
}
