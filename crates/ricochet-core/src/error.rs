//! Error types for the Ricochet kernel.
//!
//! Organized by the fault taxonomy of the event loop: numeric
//! degeneracy, configuration, invariant violation, and collaborator
//! failure. Stale-record discards are not errors; they are recovered
//! inside the loop and only show up in metrics.

use std::error::Error;
use std::fmt;

use crate::event::{EventKind, EventRecord, Subject};
use crate::id::{BodyId, SystemEventId};
use crate::time::SimTime;

// ── ConfigError ─────────────────────────────────────────────────

/// Invalid configuration, or a collaborator returned malformed identifiers.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `KernelConfig::body_count` disagrees with the dynamics provider.
    BodyCountMismatch {
        /// Count in the kernel configuration.
        configured: usize,
        /// Count reported by the provider.
        provider: usize,
    },
    /// Body count does not fit the `u32` id space.
    TooManyBodies {
        /// The rejected count.
        value: usize,
    },
    /// A collaborator named a body that is not registered.
    UnknownBody {
        /// The offending id.
        id: BodyId,
        /// Which call produced it.
        context: &'static str,
    },
    /// A collaborator listed the same body twice, or a body as its own
    /// partner.
    DuplicateParticipant {
        /// The repeated id.
        id: BodyId,
        /// Which call produced it.
        context: &'static str,
    },
    /// `resolve` reported an interaction that changed neither participant.
    UnaffectedInteraction {
        /// Subject of the executed record.
        subject: BodyId,
        /// Partner of the executed record.
        partner: BodyId,
    },
    /// A system source id is not registered.
    UnknownSystemEvent {
        /// The offending id.
        id: SystemEventId,
    },
    /// Negative-delay tolerance is NaN, infinite or negative.
    InvalidTolerance {
        /// The rejected value.
        value: f64,
    },
    /// Rebase threshold is not finite and positive.
    InvalidRebaseThreshold {
        /// The rejected value.
        value: f64,
    },
    /// A system source period is not finite and positive.
    InvalidPeriod {
        /// The rejected value.
        value: f64,
    },
    /// A time-rescale factor is not finite and positive.
    InvalidRescaleFactor {
        /// The rejected value.
        value: f64,
    },
    /// A system source's first firing time is NaN or in the past.
    InvalidStartTime {
        /// The rejected value.
        value: f64,
    },
    /// `max_discards_per_step` is zero.
    ZeroDiscardBudget,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BodyCountMismatch {
                configured,
                provider,
            } => write!(
                f,
                "body_count {configured} does not match provider body count {provider}"
            ),
            Self::TooManyBodies { value } => write!(f, "body count {value} exceeds u32::MAX"),
            Self::UnknownBody { id, context } => write!(f, "{context}: unknown body {id}"),
            Self::DuplicateParticipant { id, context } => {
                write!(f, "{context}: duplicate participant {id}")
            }
            Self::UnaffectedInteraction { subject, partner } => write!(
                f,
                "resolve: interaction {subject}<->{partner} affected neither participant"
            ),
            Self::UnknownSystemEvent { id } => write!(f, "unknown system event {id}"),
            Self::InvalidTolerance { value } => {
                write!(f, "negative_tolerance must be finite and >= 0, got {value}")
            }
            Self::InvalidRebaseThreshold { value } => {
                write!(f, "rebase threshold must be finite and positive, got {value}")
            }
            Self::InvalidPeriod { value } => {
                write!(f, "system event period must be finite and positive, got {value}")
            }
            Self::InvalidRescaleFactor { value } => {
                write!(f, "rescale factor must be finite and positive, got {value}")
            }
            Self::InvalidStartTime { value } => {
                write!(f, "system event start time {value} is NaN or in the past")
            }
            Self::ZeroDiscardBudget => write!(f, "max_discards_per_step must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

// ── ProviderError ───────────────────────────────────────────────

/// A collaborator (dynamics or neighbour provider) failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderError {
    /// `resolve` could not compute the outcome.
    ResolveFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// `load_state` was handed a blob it cannot decode.
    StateCorrupt {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The provider does not handle this event kind.
    UnsupportedKind {
        /// The unhandled kind.
        kind: EventKind,
    },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveFailed { reason } => write!(f, "resolve failed: {reason}"),
            Self::StateCorrupt { reason } => write!(f, "provider state corrupt: {reason}"),
            Self::UnsupportedKind { kind } => write!(f, "event kind '{kind}' not supported"),
        }
    }
}

impl Error for ProviderError {}

// ── CheckpointError ─────────────────────────────────────────────

/// A snapshot is internally inconsistent and cannot be restored.
#[derive(Clone, Debug, PartialEq)]
pub enum CheckpointError {
    /// Snapshot body count differs from the running configuration.
    BodyCountMismatch {
        /// Bodies in the running kernel.
        expected: usize,
        /// Bodies in the snapshot.
        found: usize,
    },
    /// A stored queue holds a record owned by another subject.
    ForeignRecord {
        /// Queue the record was found in.
        queue: BodyId,
        /// The misplaced record.
        record: EventRecord,
    },
    /// A stored record is stamped with an epoch later than the stored
    /// epoch table allows.
    StampAhead {
        /// The offending record.
        record: EventRecord,
    },
    /// A stored record fires before the stored clock.
    RecordInPast {
        /// The offending record.
        record: EventRecord,
        /// The stored clock.
        clock: SimTime,
    },
    /// The stored scheduler minimum disagrees with the one rebuilt from
    /// the queues.
    AggregateMismatch {
        /// Minimum recorded in the snapshot.
        stored: Option<EventRecord>,
        /// Minimum rebuilt from the stored queues.
        rebuilt: Option<EventRecord>,
    },
    /// Two system sources share an id.
    DuplicateSource {
        /// The repeated id.
        id: SystemEventId,
    },
    /// The stored clock is NaN or infinite.
    InvalidClock {
        /// The rejected value.
        value: f64,
    },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BodyCountMismatch { expected, found } => {
                write!(f, "snapshot has {found} bodies, kernel has {expected}")
            }
            Self::ForeignRecord { queue, record } => {
                write!(f, "queue {queue} holds foreign record {record}")
            }
            Self::StampAhead { record } => {
                write!(f, "record {record} stamped ahead of the epoch table")
            }
            Self::RecordInPast { record, clock } => {
                write!(f, "record {record} fires before stored clock {clock}")
            }
            Self::AggregateMismatch { stored, rebuilt } => {
                write!(f, "scheduler minimum mismatch: stored ")?;
                match stored {
                    Some(r) => write!(f, "{r}")?,
                    None => write!(f, "none")?,
                }
                write!(f, ", rebuilt ")?;
                match rebuilt {
                    Some(r) => write!(f, "{r}"),
                    None => write!(f, "none"),
                }
            }
            Self::DuplicateSource { id } => write!(f, "duplicate system source {id}"),
            Self::InvalidClock { value } => write!(f, "stored clock {value} is not finite"),
        }
    }
}

impl Error for CheckpointError {}

// ── Diagnostics ─────────────────────────────────────────────────

/// What made a prediction or an advance numerically degenerate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DegeneracyCause {
    /// A predicted delay was NaN.
    NanDelay,
    /// A predicted delay was negative beyond the configured tolerance.
    NegativeDelay {
        /// The predicted delay.
        delay: f64,
        /// The tolerance it exceeded.
        tolerance: f64,
    },
    /// The clock would have moved backward.
    ClockRegression {
        /// Clock before the advance.
        from: SimTime,
        /// Requested target.
        to: SimTime,
    },
}

impl fmt::Display for DegeneracyCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NanDelay => write!(f, "NaN predicted delay"),
            Self::NegativeDelay { delay, tolerance } => {
                write!(f, "negative predicted delay {delay} (tolerance {tolerance})")
            }
            Self::ClockRegression { from, to } => {
                write!(f, "clock would move backward from {from} to {to}")
            }
        }
    }
}

/// Full diagnostic for a [`KernelError::NumericDegeneracy`].
#[derive(Clone, Debug, PartialEq)]
pub struct DegeneracyReport {
    /// Clock at the moment of the fault.
    pub clock: SimTime,
    /// What went wrong.
    pub cause: DegeneracyCause,
    /// Kind of the prediction or event involved.
    pub kind: EventKind,
    /// Primary participant.
    pub subject: Subject,
    /// Secondary participant, if any.
    pub partner: Option<BodyId>,
    /// The offending record, when one had already been built.
    pub record: Option<EventRecord>,
    /// Provider descriptions of each participant's physical state.
    pub participants: Vec<String>,
}

impl fmt::Display for DegeneracyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} predicting {} for {}",
            self.cause, self.clock, self.kind, self.subject
        )?;
        if let Some(p) = self.partner {
            write!(f, "<->{p}")?;
        }
        if let Some(r) = &self.record {
            write!(f, " (record {r})")?;
        }
        for p in &self.participants {
            write!(f, "; {p}")?;
        }
        Ok(())
    }
}

/// Full diagnostic for a [`KernelError::InvariantViolation`].
#[derive(Clone, Debug, PartialEq)]
pub struct InvariantReport {
    /// Clock at the moment of detection.
    pub clock: SimTime,
    /// Which invariant broke.
    pub violation: String,
    /// The record involved, if any.
    pub record: Option<EventRecord>,
    /// Kernel state dump (queue fronts, epochs of the participants).
    pub dump: String,
}

impl fmt::Display for InvariantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.violation, self.clock)?;
        if let Some(r) = &self.record {
            write!(f, " (record {r})")?;
        }
        if !self.dump.is_empty() {
            write!(f, "\n{}", self.dump)?;
        }
        Ok(())
    }
}

// ── KernelError ─────────────────────────────────────────────────

/// Fatal errors surfaced by `step()`, `run_until()` and the driver API.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelError {
    /// A prediction was NaN or negative, or the clock would regress.
    NumericDegeneracy(Box<DegeneracyReport>),
    /// Invalid configuration or malformed collaborator identifiers.
    Configuration(ConfigError),
    /// The epoch/queue consistency contract was breached. Indicates a bug.
    InvariantViolation(Box<InvariantReport>),
    /// A collaborator failed.
    Provider(ProviderError),
    /// A previous fatal fault halted the kernel; restore a checkpoint.
    Halted,
    /// A checkpoint could not be restored.
    Checkpoint(CheckpointError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumericDegeneracy(r) => write!(f, "numeric degeneracy: {r}"),
            Self::Configuration(e) => write!(f, "configuration: {e}"),
            Self::InvariantViolation(r) => write!(f, "invariant violation: {r}"),
            Self::Provider(e) => write!(f, "provider: {e}"),
            Self::Halted => write!(f, "kernel halted by an earlier fault"),
            Self::Checkpoint(e) => write!(f, "checkpoint: {e}"),
        }
    }
}

impl Error for KernelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::Provider(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for KernelError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e)
    }
}

impl From<ProviderError> for KernelError {
    fn from(e: ProviderError) -> Self {
        Self::Provider(e)
    }
}

impl From<CheckpointError> for KernelError {
    fn from(e: CheckpointError) -> Self {
        Self::Checkpoint(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_is_informative() {
        let e = ConfigError::UnknownBody {
            id: BodyId(12),
            context: "neighbour query",
        };
        let s = e.to_string();
        assert!(s.contains("neighbour query"));
        assert!(s.contains("#12"));
    }

    #[test]
    fn degeneracy_report_names_cause_and_participants() {
        let report = DegeneracyReport {
            clock: SimTime::new(3.0).unwrap(),
            cause: DegeneracyCause::NegativeDelay {
                delay: -0.5,
                tolerance: 1e-10,
            },
            kind: EventKind::Interaction,
            subject: Subject::Body(BodyId(1)),
            partner: Some(BodyId(2)),
            record: None,
            participants: vec!["#1 x=0".into(), "#2 x=1".into()],
        };
        let e = KernelError::NumericDegeneracy(Box::new(report));
        let s = e.to_string();
        assert!(s.contains("negative predicted delay -0.5"));
        assert!(s.contains("#1<->#2"));
        assert!(s.contains("#2 x=1"));
    }

    #[test]
    fn source_chain() {
        let e: KernelError = ProviderError::UnsupportedKind {
            kind: EventKind::SystemPeriodic,
        }
        .into();
        assert!(e.source().is_some());
        assert!(KernelError::Halted.source().is_none());
        let c: KernelError = CheckpointError::InvalidClock { value: f64::NAN }.into();
        assert!(c.source().is_some());
    }
}
