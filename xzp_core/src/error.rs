//! Error types for container encode and decode.
//!
//! Every variant is terminal for the operation that raised it: nothing is
//! retried and no partial output is salvaged. Variants carry the declared and
//! observed values so callers can report exactly what disagreed.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    UnsupportedVersion,
    SizeViolation,
    TruncatedInput,
    Codec,
    InvalidOptions,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The first four bytes match neither container signature.
    #[error("unknown container signature {found:02x?} (expected \"xSmp\" or \"xCmp\")")]
    UnknownSignature { found: [u8; 4] },

    /// Structurally invalid header field.
    #[error("malformed container: {message}")]
    Format { message: String },

    #[error("unsupported container version {found} (only version 1 is supported)")]
    UnsupportedVersion { found: u32 },

    /// A decompressed length exceeds a declared bound.
    #[error("{what}: {observed} bytes exceeds the declared limit of {limit}")]
    SizeViolation {
        what: &'static str,
        limit: u64,
        observed: u64,
    },

    /// Input ended before the declared amount of data was available.
    #[error("truncated input: {what} needs {expected} bytes but only {available} are available")]
    TruncatedInput {
        what: &'static str,
        expected: u64,
        available: u64,
    },

    /// The codec failed while decoding a chunk.
    #[error("codec failed on chunk at offset {offset}: {message}")]
    Codec { offset: u64, message: String },

    #[error("invalid encode options: {message}")]
    InvalidOptions { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownSignature { .. } | Error::Format { .. } => ErrorKind::Format,
            Error::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            Error::SizeViolation { .. } => ErrorKind::SizeViolation,
            Error::TruncatedInput { .. } => ErrorKind::TruncatedInput,
            Error::Codec { .. } => ErrorKind::Codec,
            Error::InvalidOptions { .. } => ErrorKind::InvalidOptions,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}
