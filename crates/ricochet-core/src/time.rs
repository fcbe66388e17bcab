//! Simulated time.
//!
//! [`SimTime`] is an absolute instant on the kernel's single monotonic
//! clock. Construction rejects NaN, so every value is totally ordered and
//! usable as a heap key. `+∞` is allowed and means "never".

use ordered_float::OrderedFloat;
use std::fmt;

/// An absolute simulated instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimTime(OrderedFloat<f64>);

impl SimTime {
    /// The start of every run.
    pub const ZERO: SimTime = SimTime(OrderedFloat(0.0));

    /// The instant that never arrives.
    pub const NEVER: SimTime = SimTime(OrderedFloat(f64::INFINITY));

    /// Wrap a raw value. Returns `None` for NaN.
    #[inline]
    pub fn new(t: f64) -> Option<SimTime> {
        if t.is_nan() {
            None
        } else {
            Some(SimTime(OrderedFloat(t)))
        }
    }

    /// Raw `f64` value.
    #[inline]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }

    /// `false` only for [`SimTime::NEVER`] (and `-∞`, which the kernel
    /// never produces).
    #[inline]
    pub fn is_finite(self) -> bool {
        self.value().is_finite()
    }

    /// `self + delay`, or `None` if the sum is NaN (`∞ - ∞`).
    #[inline]
    pub fn after(self, delay: f64) -> Option<SimTime> {
        SimTime::new(self.value() + delay)
    }

    /// Offset of `self` from `origin`.
    #[inline]
    pub fn since(self, origin: SimTime) -> f64 {
        self.value() - origin.value()
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::ZERO
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_finite() {
            write!(f, "t={}", self.value())
        } else {
            write!(f, "t=inf")
        }
    }
}
