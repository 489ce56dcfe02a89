//! Container formats for packzip carrier executables.
//!
//! A carrier is an ordinary executable with an archive appended to its tail.
//! This crate owns both layers of that format and knows nothing about
//! processes or the filesystem layout of an extraction.
//!
//! # Binary Format
//!
//! ```text
//! +---------------------------+
//! | Host Executable           |  full copy of the packzip binary
//! +---------------------------+
//! | Payload (base64 of ZIP)   |  L bytes, printable
//! +---------------------------+
//! | Size field                |  10 bytes, decimal L, right-aligned
//! +---------------------------+
//! | Marker                    |  "PACKZIP_BASE64_END"
//! +---------------------------+
//! ```
//!
//! The marker contains `_`, which is outside the standard base64 alphabet, so
//! the payload can never contain the marker. Readers scan a bounded window at
//! the end of the file for the last occurrence of the marker and walk
//! backwards from there.

#![deny(missing_docs)]

pub mod archive;
pub mod trailer;

pub use archive::{Archive, ArchiveEntry, ArchiveWriter, EntryInfo};
pub use trailer::{TrailerLocation, MARKER, SCAN_WINDOW, SIZE_FIELD_WIDTH};

use thiserror::Error;

/// Errors that can occur while encoding or decoding a carrier.
#[derive(Debug, Error)]
pub enum PackError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The trailing window holds no marker.
    #[error("not a carrier: trailer marker not found")]
    NotACarrier,

    /// The size field in front of the marker is not a non-negative integer.
    #[error("malformed trailer: invalid size field {0:?}")]
    MalformedSize(String),

    /// The size field points before the start of the file.
    #[error("truncated trailer: payload of {payload_len} bytes needs {needed} bytes before the size field, only {available} available")]
    Truncated {
        /// Declared payload length.
        payload_len: u64,
        /// Bytes required in front of the size field.
        needed: u64,
        /// Bytes actually present in front of the size field.
        available: u64,
    },

    /// The payload is not valid base64.
    #[error("corrupt trailer: {0}")]
    CorruptPayload(String),

    /// The encoded payload does not fit in the size field.
    #[error("payload too large: {0} bytes does not fit in the size field")]
    PayloadTooLarge(u64),

    /// ZIP archive error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Entry name that cannot be stored or extracted safely.
    #[error("invalid entry name: {0:?}")]
    InvalidName(String),
}

/// Result type for pack operations.
pub type Result<T> = std::result::Result<T, PackError>;

/// Calculate the CRC32 checksum of archive bytes.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
