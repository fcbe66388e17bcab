//! Collaborator contracts: the physics and the broad-phase.
//!
//! The kernel never computes geometry. It asks a [`DynamicsProvider`]
//! when things will happen and what happened, and a [`NeighbourProvider`]
//! which bodies are close enough to be worth asking about.

use crate::error::ProviderError;
use crate::event::{EventKind, EventRecord, OutcomeMetadata};
use crate::id::{AffectedSet, BodyId, Candidates};
use crate::time::SimTime;

/// Answer to a single prediction query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// Delay from `now` until the occurrence. `+∞` means "never"; NaN or
    /// a negative value is a numeric fault the kernel reports.
    pub delay: f64,
    /// Provider-defined discriminator copied into the record.
    pub aux: u32,
}

impl Prediction {
    /// Nothing will happen.
    pub const NEVER: Prediction = Prediction {
        delay: f64::INFINITY,
        aux: 0,
    };

    /// An occurrence `delay` from now with `aux = 0`.
    pub fn after(delay: f64) -> Self {
        Self { delay, aux: 0 }
    }

    /// Replace the discriminator.
    pub fn with_aux(self, aux: u32) -> Self {
        Self { aux, ..self }
    }

    /// `true` if the delay is `+∞`.
    pub fn is_never(&self) -> bool {
        self.delay == f64::INFINITY
    }
}

/// Outcome of executing one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolution {
    /// Bodies whose state changed. Each gets its epoch bumped and its
    /// predictions rebuilt.
    pub affected: AffectedSet,
    /// Pass-through data for the driver.
    pub metadata: OutcomeMetadata,
    /// Multiply every pending delay by this factor (thermostat velocity
    /// rescale by `s` shortens delays by `1/s`).
    pub rescale: Option<f64>,
}

impl Resolution {
    /// A resolution that changed `affected` and nothing else.
    pub fn affecting(affected: &[BodyId]) -> Self {
        Self {
            affected: AffectedSet::from_slice(affected),
            ..Self::default()
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: OutcomeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Request a global time rescale.
    pub fn with_rescale(mut self, factor: f64) -> Self {
        self.rescale = Some(factor);
        self
    }
}

/// The physics: trajectories, interaction laws and boundaries.
///
/// `predict` must be a pure function of the provider state and its
/// arguments. `resolve` is the only call that mutates, and it is only
/// called for records the kernel has validated.
pub trait DynamicsProvider {
    /// Number of bodies. Fixed for the lifetime of a run.
    fn body_count(&self) -> usize;

    /// Delay from `now` until the next `kind` occurrence for `body`
    /// (with `partner` for [`EventKind::Interaction`]).
    ///
    /// Only called with `Interaction` and `BoundaryCrossing`.
    fn predict(
        &self,
        kind: EventKind,
        body: BodyId,
        partner: Option<BodyId>,
        now: SimTime,
    ) -> Prediction;

    /// Apply the outcome of `record`, which fires at `now`.
    ///
    /// Called for `Interaction`, `BoundaryCrossing` and
    /// `SystemPeriodic` records. An `Interaction` must affect at least one
    /// of its two bodies.
    fn resolve(&mut self, record: &EventRecord, now: SimTime) -> Result<Resolution, ProviderError>;

    /// One-line description of `body`'s physical state for diagnostics.
    fn describe(&self, body: BodyId) -> String;

    /// Serialize the complete mutable state.
    fn save_state(&self) -> Vec<u8>;

    /// Replace the complete mutable state with a blob from
    /// [`save_state`](Self::save_state).
    fn load_state(&mut self, blob: &[u8]) -> Result<(), ProviderError>;

    /// Subtract `shift` from every stored absolute time.
    ///
    /// Called when the kernel moves its time origin forward. Providers
    /// that store no absolute times can ignore it.
    fn rebase(&mut self, shift: f64) {
        let _ = shift;
    }
}

/// The broad-phase: spatial partitions and neighbourhood queries.
///
/// Generic over the dynamics type so partitions can read positions
/// without the kernel knowing what a position is.
pub trait NeighbourProvider<D: ?Sized> {
    /// Fill `out` with candidate partners of `body`, in ascending id
    /// order, excluding `body` itself. `out` is empty on entry.
    fn query(&self, dynamics: &D, body: BodyId, out: &mut Candidates);

    /// Delay from `now` until `body` leaves its partition, with the exit
    /// face in `aux`. [`Prediction::NEVER`] if partitions are not used.
    fn predict_transition(&self, dynamics: &D, body: BodyId, now: SimTime) -> Prediction {
        let _ = (dynamics, body, now);
        Prediction::NEVER
    }

    /// Move the subject of a [`EventKind::PartitionTransition`] record to
    /// its new partition.
    ///
    /// The default affects the subject only, so its predictions are
    /// rebuilt against its new neighbourhood.
    fn apply_transition(
        &mut self,
        dynamics: &D,
        record: &EventRecord,
        now: SimTime,
    ) -> Result<Resolution, ProviderError> {
        let _ = (dynamics, now);
        match record.subject().body() {
            Some(b) => Ok(Resolution::affecting(&[b])),
            None => Err(ProviderError::UnsupportedKind {
                kind: record.kind(),
            }),
        }
    }

    /// Recompute every membership from scratch at time `now`.
    fn rebuild(&mut self, dynamics: &D, now: SimTime) {
        let _ = (dynamics, now);
    }

    /// Serialize membership, for providers whose state cannot be
    /// recomputed exactly from positions (bodies sitting on a partition
    /// face at a transition instant).
    fn save_state(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Restore membership from [`save_state`](Self::save_state).
    ///
    /// The default ignores the blob and calls [`rebuild`](Self::rebuild).
    fn load_state(&mut self, dynamics: &D, blob: &[u8], now: SimTime) -> Result<(), ProviderError> {
        let _ = blob;
        self.rebuild(dynamics, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_helpers() {
        assert!(Prediction::NEVER.is_never());
        let p = Prediction::after(1.5).with_aux(3);
        assert_eq!(p.delay, 1.5);
        assert_eq!(p.aux, 3);
        assert!(!p.is_never());
    }

    #[test]
    fn resolution_builders() {
        let r = Resolution::affecting(&[BodyId(1), BodyId(2)])
            .with_metadata(OutcomeMetadata::from_values(&[0.5]))
            .with_rescale(2.0);
        assert_eq!(r.affected.as_slice(), &[BodyId(1), BodyId(2)]);
        assert_eq!(r.metadata.values.as_slice(), &[0.5]);
        assert_eq!(r.rescale, Some(2.0));
    }
}
