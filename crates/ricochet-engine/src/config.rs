//! Kernel configuration and validation.
//!
//! [`KernelConfig`] is the builder-input for [`Orchestrator::initialize`].
//! [`validate()`](KernelConfig::validate) checks structural invariants
//! before any provider is consulted.
//!
//! [`Orchestrator::initialize`]: crate::Orchestrator::initialize

use ricochet_core::ConfigError;

/// Default tolerance below zero for predicted delays.
pub const DEFAULT_NEGATIVE_TOLERANCE: f64 = 1e-10;

/// Default bound on stale discards within one `step()`.
pub const DEFAULT_MAX_DISCARDS: usize = 1 << 20;

/// How record times are stored relative to the clock.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TimeFrame {
    /// Absolute times against one monotonic clock. Never rebased
    /// automatically.
    #[default]
    Absolute,
    /// Absolute times, with every stored time shifted back by the clock
    /// whenever the clock passes `threshold`. Bounds precision loss on
    /// long runs at O(total records) per rebase.
    Rebased {
        /// Frame-local clock value that triggers a rebase.
        threshold: f64,
    },
    /// Offsets from the current clock: rebases after every event. O(total
    /// records) per event.
    Relative,
}

/// Complete configuration for one kernel instance.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelConfig {
    /// Number of bodies. Must match `DynamicsProvider::body_count`.
    pub body_count: usize,
    /// Time storage strategy. Default: [`TimeFrame::Absolute`].
    pub time_frame: TimeFrame,
    /// Negative delays with magnitude up to this value are clamped to
    /// zero; larger ones are fatal. Default: 1e-10.
    pub negative_tolerance: f64,
    /// Stale discards allowed within one `step()` before the kernel
    /// reports a livelock. Default: 2^20.
    pub max_discards_per_step: usize,
    /// Re-check every rebuilt queue and the scheduler heap after each
    /// event. Expensive; meant for tests. Default: false.
    pub verify_propagation: bool,
    /// Initial capacity of each body's queue. Default: 8.
    pub queue_capacity_hint: usize,
}

impl KernelConfig {
    /// Default configuration for `body_count` bodies.
    pub fn new(body_count: usize) -> Self {
        Self {
            body_count,
            ..Self::default()
        }
    }

    /// Set the time frame.
    pub fn with_time_frame(mut self, frame: TimeFrame) -> Self {
        self.time_frame = frame;
        self
    }

    /// Turn propagation verification on or off.
    pub fn with_verification(mut self, on: bool) -> Self {
        self.verify_propagation = on;
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if u32::try_from(self.body_count).is_err() {
            return Err(ConfigError::TooManyBodies {
                value: self.body_count,
            });
        }
        let tol = self.negative_tolerance;
        if !tol.is_finite() || tol < 0.0 {
            return Err(ConfigError::InvalidTolerance { value: tol });
        }
        if let TimeFrame::Rebased { threshold } = self.time_frame {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(ConfigError::InvalidRebaseThreshold { value: threshold });
            }
        }
        if self.max_discards_per_step == 0 {
            return Err(ConfigError::ZeroDiscardBudget);
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            body_count: 0,
            time_frame: TimeFrame::Absolute,
            negative_tolerance: DEFAULT_NEGATIVE_TOLERANCE,
            max_discards_per_step: DEFAULT_MAX_DISCARDS,
            verify_propagation: false,
            queue_capacity_hint: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(KernelConfig::new(10).validate().is_ok());
        assert_eq!(KernelConfig::default().negative_tolerance, 1e-10);
        assert_eq!(KernelConfig::default().time_frame, TimeFrame::Absolute);
    }

    #[test]
    fn bad_tolerance_rejected() {
        for value in [f64::NAN, -1.0, f64::INFINITY] {
            let cfg = KernelConfig {
                negative_tolerance: value,
                ..KernelConfig::new(1)
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::InvalidTolerance { .. })
            ));
        }
    }

    #[test]
    fn bad_rebase_threshold_rejected() {
        let cfg = KernelConfig::new(1).with_time_frame(TimeFrame::Rebased { threshold: 0.0 });
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidRebaseThreshold { .. })
        ));
        let ok = KernelConfig::new(1).with_time_frame(TimeFrame::Rebased { threshold: 1e3 });
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn zero_discard_budget_rejected() {
        let cfg = KernelConfig {
            max_discards_per_step: 0,
            ..KernelConfig::new(1)
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDiscardBudget));
    }
}
