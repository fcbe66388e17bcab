//! The simulation clock.

use ricochet_core::{DegeneracyCause, SimTime};

/// One monotonic scalar plus the accumulated frame origin.
///
/// `now` is frame-local: every stored record time is in the same frame.
/// Reported (absolute) time is `origin + now`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimulationClock {
    now: SimTime,
    origin: f64,
}

impl SimulationClock {
    /// A clock at zero with zero origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a clock from stored parts.
    pub fn from_parts(now: SimTime, origin: f64) -> Self {
        Self { now, origin }
    }

    /// Frame-local time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Accumulated frame origin.
    #[inline]
    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// Absolute time, `origin + now`.
    #[inline]
    pub fn absolute(&self) -> SimTime {
        self.to_absolute(self.now)
    }

    /// Convert a frame-local time to absolute.
    #[inline]
    pub fn to_absolute(&self, local: SimTime) -> SimTime {
        local.after(self.origin).unwrap_or(local)
    }

    /// Convert an absolute time to frame-local.
    #[inline]
    pub fn to_local(&self, absolute: SimTime) -> SimTime {
        absolute.after(-self.origin).unwrap_or(absolute)
    }

    /// Move to `to`. Fails, leaving the clock untouched, if `to` is
    /// earlier than now or not finite.
    pub fn advance(&mut self, to: SimTime) -> Result<(), DegeneracyCause> {
        if to < self.now || !to.is_finite() {
            return Err(DegeneracyCause::ClockRegression {
                from: self.now,
                to,
            });
        }
        self.now = to;
        Ok(())
    }

    /// Fold `now` into the origin and reset `now` to zero. Returns the
    /// shift applied to every frame-local time.
    pub fn rebase(&mut self) -> f64 {
        let shift = self.now.value();
        self.origin += shift;
        self.now = SimTime::ZERO;
        shift
    }
}
