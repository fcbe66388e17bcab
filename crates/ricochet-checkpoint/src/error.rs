//! Error types for checkpoint encoding and decoding.

use std::fmt;
use std::io;

/// Errors that can occur while encoding or decoding a checkpoint.
#[derive(Debug)]
pub enum CodecError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The data does not start with the expected `b"RCHK"` magic bytes.
    InvalidMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the data.
        found: u8,
    },
    /// An event kind tag is not recognized.
    UnknownKind {
        /// The unrecognized tag.
        tag: u8,
    },
    /// A section could not be decoded (truncated or corrupt data).
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"RCHK\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {found}")
            }
            Self::UnknownKind { tag } => write!(f, "unknown event kind tag {tag}"),
            Self::Malformed { detail } => write!(f, "malformed checkpoint: {detail}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
