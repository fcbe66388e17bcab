//! One-dimensional hard-rod gas.
//!
//! Equal-mass rods of length `sigma` on `[0, length]` with reflecting
//! walls. Rods stream lazily: each stores its position at its own last
//! update time, and positions at other times are extrapolated. A collision
//! swaps velocities; a wall reverses one. System firings tagged
//! [`THERMOSTAT_TAG`] scale every velocity, which shortens every pending
//! delay by the inverse factor.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ricochet_core::{
    BodyId, DynamicsProvider, EventKind, EventRecord, OutcomeMetadata, Prediction, ProviderError,
    Resolution, SimTime, Subject,
};

/// `aux` of a left-wall crossing.
pub const LEFT_WALL: u32 = 0;
/// `aux` of a right-wall crossing.
pub const RIGHT_WALL: u32 = 1;
/// System tag that triggers a velocity rescale.
pub const THERMOSTAT_TAG: u32 = 7;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Rod {
    x: f64,
    v: f64,
    t_last: f64,
}

impl Rod {
    fn at(&self, now: f64) -> f64 {
        self.x + self.v * (now - self.t_last)
    }

    fn stream(&mut self, now: f64) {
        self.x = self.at(now);
        self.t_last = now;
    }
}

/// The rod gas.
#[derive(Clone, Debug, PartialEq)]
pub struct RodGas {
    rods: Vec<Rod>,
    length: f64,
    sigma: f64,
    thermostat: f64,
}

fn unit(rng: &mut ChaCha8Rng) -> f64 {
    (rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

impl RodGas {
    /// Rods at explicit positions and velocities, all last updated at 0.
    pub fn new(length: f64, sigma: f64, bodies: &[(f64, f64)]) -> Self {
        Self {
            rods: bodies
                .iter()
                .map(|&(x, v)| Rod { x, v, t_last: 0.0 })
                .collect(),
            length,
            sigma,
            thermostat: 1.0,
        }
    }

    /// `n` rods spaced evenly with jitter, velocities uniform in `[-1, 1)`.
    pub fn random(n: usize, length: f64, sigma: f64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let slot = length / n as f64;
        let slack = (slot - sigma).max(0.0);
        let bodies: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let x = i as f64 * slot + sigma / 2.0 + slack * (0.1 + 0.8 * unit(&mut rng));
                let v = 2.0 * unit(&mut rng) - 1.0;
                (x, v)
            })
            .collect();
        Self::new(length, sigma, &bodies)
    }

    /// Thermostat firings multiply every velocity by `factor`.
    pub fn with_thermostat(mut self, factor: f64) -> Self {
        self.thermostat = factor;
        self
    }

    /// Box length.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Rod length.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Centre of `body` at frame-local time `now`.
    pub fn position(&self, body: BodyId, now: f64) -> f64 {
        self.rods[body.index()].at(now)
    }

    /// Velocity of `body`.
    pub fn velocity(&self, body: BodyId) -> f64 {
        self.rods[body.index()].v
    }

    /// Total kinetic energy with unit masses.
    pub fn kinetic_energy(&self) -> f64 {
        self.rods.iter().map(|r| 0.5 * r.v * r.v).sum()
    }

    fn rod(&self, body: BodyId) -> Result<&Rod, ProviderError> {
        self.rods.get(body.index()).ok_or_else(|| ProviderError::StateCorrupt {
            reason: format!("no rod {body}"),
        })
    }

    fn collision_delay(&self, a: &Rod, b: &Rod, now: f64) -> f64 {
        let (xa, xb) = (a.at(now), b.at(now));
        let (left, right) = if xa <= xb { (a, b) } else { (b, a) };
        let closing = left.v - right.v;
        if closing <= 0.0 {
            return f64::INFINITY;
        }
        let gap = right.at(now) - left.at(now) - self.sigma;
        gap / closing
    }

    fn wall_prediction(&self, r: &Rod, now: f64) -> Prediction {
        let x = r.at(now);
        let half = self.sigma / 2.0;
        if r.v > 0.0 {
            Prediction::after((self.length - half - x) / r.v).with_aux(RIGHT_WALL)
        } else if r.v < 0.0 {
            Prediction::after((x - half) / -r.v).with_aux(LEFT_WALL)
        } else {
            Prediction::NEVER
        }
    }
}

impl DynamicsProvider for RodGas {
    fn body_count(&self) -> usize {
        self.rods.len()
    }

    fn predict(&self, kind: EventKind, body: BodyId, partner: Option<BodyId>, now: SimTime) -> Prediction {
        let now = now.value();
        let Some(a) = self.rods.get(body.index()) else {
            return Prediction::NEVER;
        };
        match (kind, partner.and_then(|p| self.rods.get(p.index()))) {
            (EventKind::Interaction, Some(b)) => Prediction::after(self.collision_delay(a, b, now)),
            (EventKind::BoundaryCrossing, _) => self.wall_prediction(a, now),
            _ => Prediction::NEVER,
        }
    }

    fn resolve(&mut self, record: &EventRecord, now: SimTime) -> Result<Resolution, ProviderError> {
        let now = now.value();
        match (record.kind(), record.subject()) {
            (EventKind::Interaction, Subject::Body(a)) => {
                let b = record.partner().ok_or_else(|| ProviderError::StateCorrupt {
                    reason: format!("interaction {record} has no partner"),
                })?;
                self.rod(a)?;
                self.rod(b)?;
                let (ia, ib) = (a.index(), b.index());
                self.rods[ia].stream(now);
                self.rods[ib].stream(now);
                let (va, vb) = (self.rods[ia].v, self.rods[ib].v);
                self.rods[ia].v = vb;
                self.rods[ib].v = va;
                Ok(Resolution::affecting(&[a, b])
                    .with_metadata(OutcomeMetadata::from_values(&[(va - vb).abs()])))
            }
            (EventKind::BoundaryCrossing, Subject::Body(a)) => {
                self.rod(a)?;
                let rod = &mut self.rods[a.index()];
                rod.stream(now);
                rod.v = -rod.v;
                Ok(Resolution::affecting(&[a])
                    .with_metadata(OutcomeMetadata::from_values(&[2.0 * rod.v.abs()])))
            }
            (EventKind::SystemPeriodic, Subject::System(_)) if record.aux() == THERMOSTAT_TAG => {
                let s = self.thermostat;
                let before = self.kinetic_energy();
                for rod in &mut self.rods {
                    rod.stream(now);
                    rod.v *= s;
                }
                Ok(Resolution::default()
                    .with_rescale(1.0 / s)
                    .with_metadata(OutcomeMetadata::from_values(&[self.kinetic_energy() - before])))
            }
            (EventKind::SystemPeriodic, Subject::System(_)) => Ok(Resolution::default()),
            (kind, _) => Err(ProviderError::UnsupportedKind { kind }),
        }
    }

    fn describe(&self, body: BodyId) -> String {
        match self.rods.get(body.index()) {
            Some(r) => format!("{body}: x={} v={} t_last={}", r.x, r.v, r.t_last),
            None => format!("{body}: no such rod"),
        }
    }

    fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 24 * self.rods.len());
        out.extend_from_slice(&self.thermostat.to_le_bytes());
        for r in &self.rods {
            out.extend_from_slice(&r.x.to_le_bytes());
            out.extend_from_slice(&r.v.to_le_bytes());
            out.extend_from_slice(&r.t_last.to_le_bytes());
        }
        out
    }

    fn load_state(&mut self, blob: &[u8]) -> Result<(), ProviderError> {
        let expected = 8 + 24 * self.rods.len();
        if blob.len() != expected {
            return Err(ProviderError::StateCorrupt {
                reason: format!("expected {expected} bytes, got {}", blob.len()),
            });
        }
        let mut words = blob.chunks_exact(8).map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        });
        let mut next = || {
            words.next().ok_or_else(|| ProviderError::StateCorrupt {
                reason: "truncated rod state".to_string(),
            })
        };
        let thermostat = next()?;
        let mut rods = Vec::with_capacity(self.rods.len());
        for _ in 0..self.rods.len() {
            rods.push(Rod {
                x: next()?,
                v: next()?,
                t_last: next()?,
            });
        }
        self.thermostat = thermostat;
        self.rods = rods;
        Ok(())
    }

    fn rebase(&mut self, shift: f64) {
        for r in &mut self.rods {
            r.t_last -= shift;
        }
    }
}
