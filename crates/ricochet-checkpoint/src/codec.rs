//! Binary encode/decode for the checkpoint format.
//!
//! All integers are little-endian. Strings and byte arrays are
//! length-prefixed with a `u32` length. Optional values carry a `u8`
//! presence flag.

use std::io::{Read, Write};

use ricochet_core::{BodyId, Epoch, EventKind, EventRecord, SimTime, Subject, SystemEventId};

use crate::error::CodecError;
use crate::types::{Checkpoint, SystemEventState};
use crate::{FORMAT_VERSION, MAGIC};

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), CodecError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a `usize` as a u32 length, rejecting values that do not fit.
fn write_len(w: &mut dyn Write, len: usize) -> Result<(), CodecError> {
    let v = u32::try_from(len).map_err(|_| CodecError::Malformed {
        detail: format!("length {len} exceeds u32"),
    })?;
    write_u32_le(w, v)
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), CodecError> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), CodecError> {
    write_len(w, b.len())?;
    w.write_all(b)?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, CodecError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, CodecError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, CodecError> {
    let buf = read_length_prefixed_bytes(r)?;
    String::from_utf8(buf).map_err(|e| CodecError::Malformed {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

/// Read a length-prefixed byte array.
pub fn read_length_prefixed_bytes(r: &mut dyn Read) -> Result<Vec<u8>, CodecError> {
    let len = read_u32_le(r)?;
    // Grow with the data actually present, not with the claimed length.
    let mut buf = Vec::new();
    Read::take(&mut *r, u64::from(len)).read_to_end(&mut buf)?;
    if buf.len() != len as usize {
        return Err(CodecError::Malformed {
            detail: format!("length prefix {len} but only {} bytes follow", buf.len()),
        });
    }
    Ok(buf)
}

fn read_time(r: &mut dyn Read, what: &str) -> Result<SimTime, CodecError> {
    let v = read_f64_le(r)?;
    SimTime::new(v).ok_or_else(|| CodecError::Malformed {
        detail: format!("{what} is NaN"),
    })
}

fn read_flag(r: &mut dyn Read) -> Result<bool, CodecError> {
    match read_u8(r)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::Malformed {
            detail: format!("presence flag {other} is neither 0 nor 1"),
        }),
    }
}

// ── Record encode/decode ────────────────────────────────────────

/// Encode one event record.
pub fn encode_record(w: &mut dyn Write, rec: &EventRecord) -> Result<(), CodecError> {
    write_u8(w, rec.kind().index() as u8)?;
    write_f64_le(w, rec.time().value())?;
    match rec.subject() {
        Subject::Body(b) => {
            write_u8(w, 0)?;
            write_u32_le(w, b.0)?;
        }
        Subject::System(s) => {
            write_u8(w, 1)?;
            write_u32_le(w, s.0)?;
        }
    }
    match rec.partner() {
        Some(p) => {
            write_u8(w, 1)?;
            write_u32_le(w, p.0)?;
        }
        None => write_u8(w, 0)?,
    }
    write_u32_le(w, rec.aux())?;
    let stamp = rec.stamp();
    write_u64_le(w, stamp.subject.0)?;
    match stamp.partner {
        Some(e) => {
            write_u8(w, 1)?;
            write_u64_le(w, e.0)?;
        }
        None => write_u8(w, 0)?,
    }
    Ok(())
}

/// Decode one event record.
///
/// The record is rebuilt through its constructors, so field combinations
/// the kernel never produces are rejected.
pub fn decode_record(r: &mut dyn Read) -> Result<EventRecord, CodecError> {
    let tag = read_u8(r)?;
    let kind = EventKind::from_index(tag as usize).ok_or(CodecError::UnknownKind { tag })?;
    let time = read_time(r, "record time")?;
    let subject = match read_u8(r)? {
        0 => Subject::Body(BodyId(read_u32_le(r)?)),
        1 => Subject::System(SystemEventId(read_u32_le(r)?)),
        other => {
            return Err(CodecError::Malformed {
                detail: format!("subject tag {other}"),
            })
        }
    };
    let partner = if read_flag(r)? {
        Some(BodyId(read_u32_le(r)?))
    } else {
        None
    };
    let aux = read_u32_le(r)?;
    let subject_epoch = Epoch(read_u64_le(r)?);
    let partner_epoch = if read_flag(r)? {
        Some(Epoch(read_u64_le(r)?))
    } else {
        None
    };

    let malformed = || CodecError::Malformed {
        detail: format!("inconsistent {kind} record for {subject}"),
    };
    match (kind, subject, partner, partner_epoch) {
        (EventKind::Interaction, Subject::Body(b), Some(p), Some(pe)) => Ok(
            EventRecord::interaction(time, b, subject_epoch, p, pe, aux),
        ),
        (
            EventKind::BoundaryCrossing | EventKind::PartitionTransition,
            Subject::Body(b),
            None,
            None,
        ) => Ok(EventRecord::single(kind, time, b, subject_epoch, aux)),
        (EventKind::SystemPeriodic, Subject::System(s), None, None) => {
            Ok(EventRecord::system(time, s, subject_epoch, aux))
        }
        (EventKind::None, subject, None, None) => Ok(EventRecord::none(subject)),
        _ => Err(malformed()),
    }
}

fn encode_optional_record(w: &mut dyn Write, rec: Option<&EventRecord>) -> Result<(), CodecError> {
    match rec {
        Some(rec) => {
            write_u8(w, 1)?;
            encode_record(w, rec)
        }
        None => write_u8(w, 0),
    }
}

fn decode_optional_record(r: &mut dyn Read) -> Result<Option<EventRecord>, CodecError> {
    if read_flag(r)? {
        Ok(Some(decode_record(r)?))
    } else {
        Ok(None)
    }
}

// ── System source encode/decode ─────────────────────────────────

fn encode_system(w: &mut dyn Write, s: &SystemEventState) -> Result<(), CodecError> {
    write_u32_le(w, s.id.0)?;
    write_length_prefixed_str(w, &s.name)?;
    write_u64_le(w, s.generation.0)?;
    write_f64_le(w, s.next.value())?;
    match s.period {
        Some(p) => {
            write_u8(w, 1)?;
            write_f64_le(w, p)?;
        }
        None => write_u8(w, 0)?,
    }
    write_u32_le(w, s.tag)?;
    Ok(())
}

fn decode_system(r: &mut dyn Read) -> Result<SystemEventState, CodecError> {
    Ok(SystemEventState {
        id: SystemEventId(read_u32_le(r)?),
        name: read_length_prefixed_str(r)?,
        generation: Epoch(read_u64_le(r)?),
        next: read_time(r, "system source time")?,
        period: if read_flag(r)? {
            Some(read_f64_le(r)?)
        } else {
            None
        },
        tag: read_u32_le(r)?,
    })
}

// ── Checkpoint encode/decode ────────────────────────────────────

/// Encode a full checkpoint (magic, version, body).
pub fn encode_checkpoint(w: &mut dyn Write, cp: &Checkpoint) -> Result<(), CodecError> {
    if cp.queues.len() != cp.epochs.len() {
        return Err(CodecError::Malformed {
            detail: format!(
                "{} queues for {} epochs",
                cp.queues.len(),
                cp.epochs.len()
            ),
        });
    }

    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;

    // Clock and frame
    write_f64_le(w, cp.clock.value())?;
    write_f64_le(w, cp.origin)?;
    write_u64_le(w, cp.event_count)?;
    write_u32_le(w, cp.next_system_id)?;

    // Bodies
    write_len(w, cp.epochs.len())?;
    for (epoch, queue) in cp.epochs.iter().zip(&cp.queues) {
        write_u64_le(w, epoch.0)?;
        write_len(w, queue.len())?;
        for rec in queue {
            encode_record(w, rec)?;
        }
    }

    // System sources
    write_len(w, cp.systems.len())?;
    for s in &cp.systems {
        encode_system(w, s)?;
    }

    encode_optional_record(w, cp.scheduler_min.as_ref())?;
    write_length_prefixed_bytes(w, &cp.dynamics)?;
    write_length_prefixed_bytes(w, &cp.neighbours)?;
    Ok(())
}

/// Decode and validate a full checkpoint.
///
/// Only the framing is validated here. Consistency between queues,
/// epochs and the stored scheduler minimum is checked on restore.
pub fn decode_checkpoint(r: &mut dyn Read) -> Result<Checkpoint, CodecError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(CodecError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion { found: version });
    }

    let clock = read_time(r, "clock")?;
    let origin = read_f64_le(r)?;
    let event_count = read_u64_le(r)?;
    let next_system_id = read_u32_le(r)?;

    let body_count = read_u32_le(r)? as usize;
    let mut epochs = Vec::new();
    let mut queues = Vec::new();
    for _ in 0..body_count {
        epochs.push(Epoch(read_u64_le(r)?));
        let len = read_u32_le(r)? as usize;
        let mut queue = Vec::new();
        for _ in 0..len {
            queue.push(decode_record(r)?);
        }
        queues.push(queue);
    }

    let system_count = read_u32_le(r)? as usize;
    let mut systems = Vec::new();
    for _ in 0..system_count {
        systems.push(decode_system(r)?);
    }

    let scheduler_min = decode_optional_record(r)?;
    let dynamics = read_length_prefixed_bytes(r)?;
    let neighbours = read_length_prefixed_bytes(r)?;

    Ok(Checkpoint {
        clock,
        origin,
        event_count,
        next_system_id,
        queues,
        epochs,
        systems,
        scheduler_min,
        dynamics,
        neighbours,
    })
}

/// Encode a checkpoint into a fresh byte vector.
pub fn to_bytes(cp: &Checkpoint) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_checkpoint(&mut buf, cp)?;
    Ok(buf)
}

/// Decode a checkpoint from a byte slice, rejecting trailing bytes.
pub fn from_bytes(mut bytes: &[u8]) -> Result<Checkpoint, CodecError> {
    let cp = decode_checkpoint(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(CodecError::Malformed {
            detail: format!("{} trailing bytes", bytes.len()),
        });
    }
    Ok(cp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: f64) -> SimTime {
        SimTime::new(v).unwrap()
    }

    fn sample() -> Checkpoint {
        let sys = SystemEventId(0);
        Checkpoint {
            clock: t(2.5),
            origin: 100.0,
            event_count: 42,
            next_system_id: 1,
            queues: vec![
                vec![
                    EventRecord::interaction(t(3.0), BodyId(0), Epoch(4), BodyId(1), Epoch(2), 0),
                    EventRecord::single(EventKind::BoundaryCrossing, t(4.0), BodyId(0), Epoch(4), 1),
                ],
                vec![EventRecord::single(
                    EventKind::PartitionTransition,
                    t(2.75),
                    BodyId(1),
                    Epoch(2),
                    0,
                )],
            ],
            epochs: vec![Epoch(4), Epoch(2)],
            systems: vec![SystemEventState {
                id: sys,
                name: "ticker".into(),
                generation: Epoch(3),
                next: t(5.0),
                period: Some(1.0),
                tag: 7,
            }],
            scheduler_min: Some(EventRecord::single(
                EventKind::PartitionTransition,
                t(2.75),
                BodyId(1),
                Epoch(2),
                0,
            )),
            dynamics: vec![1, 2, 3, 4],
            neighbours: vec![5, 6],
        }
    }

    #[test]
    fn checkpoint_survives_encoding() {
        let cp = sample();
        let bytes = to_bytes(&cp).unwrap();
        assert_eq!(&bytes[..4], b"RCHK");
        assert_eq!(from_bytes(&bytes).unwrap(), cp);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = to_bytes(&sample()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(from_bytes(&bytes), Err(CodecError::InvalidMagic)));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = to_bytes(&sample()).unwrap();
        bytes[4] = FORMAT_VERSION + 1;
        assert!(matches!(
            from_bytes(&bytes),
            Err(CodecError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn truncation_is_an_error() {
        let bytes = to_bytes(&sample()).unwrap();
        for cut in [5, 20, bytes.len() - 1] {
            assert!(from_bytes(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn oversized_length_prefix_is_malformed() {
        let mut data: &[u8] = &[0xff, 0xff, 0xff, 0xff, 1, 2, 3];
        match read_length_prefixed_bytes(&mut data) {
            Err(CodecError::Malformed { detail }) => assert!(detail.contains("4294967295")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = to_bytes(&sample()).unwrap();
        bytes.push(0);
        assert!(matches!(from_bytes(&bytes), Err(CodecError::Malformed { .. })));
    }

    #[test]
    fn inconsistent_record_rejected() {
        // An interaction tag with no partner.
        let mut buf = Vec::new();
        let rec = EventRecord::single(EventKind::BoundaryCrossing, t(1.0), BodyId(0), Epoch(0), 0);
        encode_record(&mut buf, &rec).unwrap();
        buf[0] = EventKind::Interaction.index() as u8;
        assert!(matches!(
            decode_record(&mut buf.as_slice()),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut buf = Vec::new();
        let rec = EventRecord::single(EventKind::BoundaryCrossing, t(1.0), BodyId(0), Epoch(0), 0);
        encode_record(&mut buf, &rec).unwrap();
        buf[0] = 99;
        assert!(matches!(
            decode_record(&mut buf.as_slice()),
            Err(CodecError::UnknownKind { tag: 99 })
        ));
    }

    #[test]
    fn mismatched_queue_count_refused_on_encode() {
        let mut cp = sample();
        cp.queues.pop();
        assert!(to_bytes(&cp).is_err());
    }
}
