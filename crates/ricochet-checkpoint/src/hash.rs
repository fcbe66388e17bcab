//! Hashing utilities for checkpoint and trace comparison.
//!
//! Uses FNV-1a for fast, deterministic hashing of kernel state. These
//! hashes are not cryptographically secure; they are used for fast
//! equality checks in determinism tests.

use ricochet_core::{EventRecord, EventSummary, Subject};

use crate::types::Checkpoint;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Feed a single byte into an FNV-1a hash state.
#[inline]
fn fnv1a_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

/// Feed a u32 (as 4 LE bytes) into an FNV-1a hash state.
#[inline]
fn fnv1a_u32(mut hash: u64, v: u32) -> u64 {
    for &b in &v.to_le_bytes() {
        hash = fnv1a_byte(hash, b);
    }
    hash
}

/// Feed a u64 (as 8 LE bytes) into an FNV-1a hash state.
#[inline]
fn fnv1a_u64(mut hash: u64, v: u64) -> u64 {
    for &b in &v.to_le_bytes() {
        hash = fnv1a_byte(hash, b);
    }
    hash
}

fn fnv1a_record(mut hash: u64, r: &EventRecord) -> u64 {
    hash = fnv1a_byte(hash, r.kind().index() as u8);
    hash = fnv1a_u64(hash, r.time().value().to_bits());
    hash = match r.subject() {
        Subject::Body(b) => fnv1a_u32(fnv1a_byte(hash, 0), b.0),
        Subject::System(s) => fnv1a_u32(fnv1a_byte(hash, 1), s.0),
    };
    hash = fnv1a_u32(hash, r.partner().map_or(u32::MAX, |p| p.0));
    hash = fnv1a_u32(hash, r.aux());
    let stamp = r.stamp();
    hash = fnv1a_u64(hash, stamp.subject.0);
    fnv1a_u64(hash, stamp.partner.map_or(u64::MAX, |e| e.0))
}

/// Compute a hash over every field of a checkpoint.
///
/// Two checkpoints hash equal iff they would restore to the same kernel
/// state (up to FNV collisions).
pub fn checkpoint_hash(cp: &Checkpoint) -> u64 {
    let mut hash = FNV_OFFSET;
    hash = fnv1a_u64(hash, cp.clock.value().to_bits());
    hash = fnv1a_u64(hash, cp.origin.to_bits());
    hash = fnv1a_u64(hash, cp.event_count);
    hash = fnv1a_u32(hash, cp.next_system_id);

    for (i, (epoch, queue)) in cp.epochs.iter().zip(&cp.queues).enumerate() {
        // Fold in the body index at each boundary
        hash = fnv1a_u64(hash, i as u64);
        hash = fnv1a_u64(hash, epoch.0);
        for r in queue {
            hash = fnv1a_record(hash, r);
        }
    }

    for s in &cp.systems {
        hash = fnv1a_u32(hash, s.id.0);
        for &b in s.name.as_bytes() {
            hash = fnv1a_byte(hash, b);
        }
        hash = fnv1a_u64(hash, s.generation.0);
        hash = fnv1a_u64(hash, s.next.value().to_bits());
        hash = fnv1a_u64(hash, s.period.map_or(u64::MAX, f64::to_bits));
        hash = fnv1a_u32(hash, s.tag);
    }

    if let Some(r) = &cp.scheduler_min {
        hash = fnv1a_record(hash, r);
    }
    for &b in &cp.dynamics {
        hash = fnv1a_byte(hash, b);
    }
    hash = fnv1a_u64(hash, cp.neighbours.len() as u64);
    for &b in &cp.neighbours {
        hash = fnv1a_byte(hash, b);
    }
    hash
}

/// Compute a hash over an executed event sequence.
///
/// Covers time, kind, participants, source, aux and affected set of
/// every summary, in order. Metadata is folded in by bit pattern.
pub fn trace_hash<'a>(summaries: impl IntoIterator<Item = &'a EventSummary>) -> u64 {
    let mut hash = FNV_OFFSET;
    for s in summaries {
        hash = fnv1a_u64(hash, s.time.value().to_bits());
        hash = fnv1a_byte(hash, s.kind.index() as u8);
        for p in &s.participants {
            hash = fnv1a_u32(hash, p.0);
        }
        hash = fnv1a_u32(hash, s.system.map_or(u32::MAX, |id| id.0));
        hash = fnv1a_u32(hash, s.aux);
        for a in &s.affected {
            hash = fnv1a_u32(hash, a.0);
        }
        for v in &s.metadata.values {
            hash = fnv1a_u64(hash, v.to_bits());
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::{BodyId, Epoch, EventKind, OutcomeMetadata, SimTime};
    use smallvec::smallvec;

    fn cp() -> Checkpoint {
        let t = SimTime::new(1.0).unwrap();
        Checkpoint {
            clock: SimTime::ZERO,
            origin: 0.0,
            event_count: 0,
            next_system_id: 0,
            queues: vec![vec![EventRecord::single(
                EventKind::BoundaryCrossing,
                t,
                BodyId(0),
                Epoch(0),
                0,
            )]],
            epochs: vec![Epoch(0)],
            systems: Vec::new(),
            scheduler_min: None,
            dynamics: vec![9],
            neighbours: Vec::new(),
        }
    }

    #[test]
    fn same_state_same_hash() {
        assert_eq!(checkpoint_hash(&cp()), checkpoint_hash(&cp()));
    }

    #[test]
    fn epoch_change_changes_hash() {
        let mut b = cp();
        b.epochs[0] = Epoch(1);
        assert_ne!(checkpoint_hash(&cp()), checkpoint_hash(&b));
    }

    #[test]
    fn dynamics_blob_is_hashed() {
        let mut b = cp();
        b.dynamics[0] = 8;
        assert_ne!(checkpoint_hash(&cp()), checkpoint_hash(&b));
    }

    #[test]
    fn empty_trace_hash_is_fnv_offset() {
        assert_eq!(trace_hash(&[] as &[EventSummary]), FNV_OFFSET);
    }

    #[test]
    fn trace_order_matters() {
        let mk = |time: f64, body: u32| EventSummary {
            time: SimTime::new(time).unwrap(),
            kind: EventKind::BoundaryCrossing,
            participants: smallvec![BodyId(body)],
            system: None,
            aux: 0,
            affected: smallvec![BodyId(body)],
            metadata: OutcomeMetadata::empty(),
        };
        let a = [mk(1.0, 0), mk(2.0, 1)];
        let b = [mk(1.0, 1), mk(2.0, 0)];
        assert_ne!(trace_hash(&a), trace_hash(&b));
    }
}
