//! Checkpoint snapshots for the Ricochet kernel.
//!
//! A [`Checkpoint`] captures the full kernel state between two events:
//! clock and frame origin, every body's queue and epoch, every active
//! system source, the scheduler minimum and the opaque state of both
//! providers.
//!
//! # Format
//!
//! ```text
//! [MAGIC "RCHK"] [VERSION u8] [clock f64] [origin f64] [event_count u64]
//! [next_system_id u32] [bodies: epoch + queue]* [systems]* [min?]
//! [dynamics bytes] [neighbour bytes]
//! ```
//!
//! All I/O uses a custom binary codec (no serde dependency).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod hash;
pub mod types;

pub use codec::{decode_checkpoint, encode_checkpoint, from_bytes, to_bytes};
pub use error::CodecError;
pub use hash::{checkpoint_hash, trace_hash};
pub use types::{Checkpoint, SystemEventState};

/// Magic bytes at the start of every checkpoint.
pub const MAGIC: [u8; 4] = *b"RCHK";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
