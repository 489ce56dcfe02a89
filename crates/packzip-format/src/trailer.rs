//! Trailer encoding for carrier executables.
//!
//! The trailer is the text-safe region appended after the host image:
//!
//! ```text
//! Offset (from payload)   Size   Field
//! 0                       L      payload (base64 of the archive)
//! L                       10     size field (decimal L, right-aligned)
//! L + 10                  18     marker ("PACKZIP_BASE64_END")
//! ```
//!
//! Decoding never scans the whole file. Only the last [`SCAN_WINDOW`] bytes
//! are searched for the marker; everything else is reached by offset.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::{PackError, Result};

/// Marker terminating every trailer.
///
/// `_` is not part of the standard base64 alphabet, so an encoded payload can
/// never contain this sequence.
pub const MARKER: &[u8; 18] = b"PACKZIP_BASE64_END";

/// Width of the decimal size field in bytes.
pub const SIZE_FIELD_WIDTH: usize = 10;

/// Number of trailing bytes searched for the marker.
pub const SCAN_WINDOW: u64 = 2048;

/// Largest payload length representable in the size field.
const MAX_PAYLOAD_LEN: u64 = 9_999_999_999;

/// Position of a trailer inside a container image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailerLocation {
    /// Absolute offset of the first payload byte.
    pub payload_offset: u64,
    /// Length of the encoded payload.
    pub payload_len: u64,
    /// Absolute offset of the marker.
    pub marker_offset: u64,
}

impl TrailerLocation {
    /// Absolute offset of the size field.
    pub fn size_field_offset(&self) -> u64 {
        self.marker_offset - SIZE_FIELD_WIDTH as u64
    }

    /// Length of the host region, i.e. everything before the payload.
    pub fn host_len(&self) -> u64 {
        self.payload_offset
    }

    /// Total trailer length: payload, size field and marker.
    pub fn trailer_len(&self) -> u64 {
        self.marker_offset + MARKER.len() as u64 - self.payload_offset
    }
}

/// Encode raw archive bytes into a trailer ready to append to a host image.
pub fn encode(archive: &[u8]) -> Result<Vec<u8>> {
    let payload = STANDARD.encode(archive);
    let payload_len = payload.len() as u64;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(PackError::PayloadTooLarge(payload_len));
    }

    let size_field = format!("{:>width$}", payload_len, width = SIZE_FIELD_WIDTH);

    let mut out = Vec::with_capacity(payload.len() + SIZE_FIELD_WIDTH + MARKER.len());
    out.extend_from_slice(payload.as_bytes());
    out.extend_from_slice(size_field.as_bytes());
    out.extend_from_slice(MARKER);
    Ok(out)
}

/// Find the last occurrence of the marker in `window`.
///
/// The last occurrence wins so that marker bytes appearing coincidentally in
/// the host region are ignored when a real trailer follows them.
pub fn find_marker(window: &[u8]) -> Option<usize> {
    window
        .windows(MARKER.len())
        .rposition(|candidate| candidate == MARKER)
}

/// Locate the trailer given the tail window of an image.
///
/// `window_offset` is the absolute offset of `window[0]` in the image.
pub fn locate(window: &[u8], window_offset: u64) -> Result<TrailerLocation> {
    let marker_idx = find_marker(window).ok_or(PackError::NotACarrier)?;

    if marker_idx < SIZE_FIELD_WIDTH {
        return Err(PackError::MalformedSize(
            String::from_utf8_lossy(&window[..marker_idx]).into_owned(),
        ));
    }

    let field = &window[marker_idx - SIZE_FIELD_WIDTH..marker_idx];
    let payload_len = parse_size_field(field)?;

    let marker_offset = window_offset + marker_idx as u64;
    let size_field_offset = marker_offset - SIZE_FIELD_WIDTH as u64;
    if payload_len > size_field_offset {
        return Err(PackError::Truncated {
            payload_len,
            needed: payload_len,
            available: size_field_offset,
        });
    }

    Ok(TrailerLocation {
        payload_offset: size_field_offset - payload_len,
        payload_len,
        marker_offset,
    })
}

fn parse_size_field(field: &[u8]) -> Result<u64> {
    let malformed = || PackError::MalformedSize(String::from_utf8_lossy(field).into_owned());

    let text = std::str::from_utf8(field).map_err(|_| malformed())?.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    text.parse::<u64>().map_err(|_| malformed())
}

/// Locate the trailer of a seekable image of `file_len` bytes.
pub fn locate_in<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<TrailerLocation> {
    let window_len = SCAN_WINDOW.min(file_len);
    let window_offset = file_len - window_len;

    reader.seek(SeekFrom::Start(window_offset))?;
    let mut window = vec![0u8; window_len as usize];
    reader.read_exact(&mut window)?;

    locate(&window, window_offset)
}

/// Recover the raw archive bytes from a seekable image of `file_len` bytes.
pub fn read_trailer<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<Vec<u8>> {
    let location = locate_in(reader, file_len)?;

    let payload_len = usize::try_from(location.payload_len)
        .map_err(|_| PackError::PayloadTooLarge(location.payload_len))?;

    reader.seek(SeekFrom::Start(location.payload_offset))?;
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    decode_payload(&payload)
}

/// Recover the raw archive bytes from a carrier on disk.
pub fn read_trailer_from_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let mut file = File::open(path.as_ref())?;
    let file_len = file.metadata()?.len();
    read_trailer(&mut file, file_len)
}

/// Locate the trailer of a carrier on disk.
pub fn locate_in_file(path: impl AsRef<Path>) -> Result<TrailerLocation> {
    let mut file = File::open(path.as_ref())?;
    let file_len = file.metadata()?.len();
    locate_in(&mut file, file_len)
}

/// Recover the raw archive bytes from an in-memory image.
pub fn decode(image: &[u8]) -> Result<Vec<u8>> {
    read_trailer(&mut Cursor::new(image), image.len() as u64)
}

/// Length of the host region of a file.
///
/// Files without a structurally valid trailer are all host.
pub fn host_region_len(path: impl AsRef<Path>) -> Result<u64> {
    let mut file = File::open(path.as_ref())?;
    let file_len = file.metadata()?.len();

    match locate_in(&mut file, file_len) {
        Ok(location) => Ok(location.host_len()),
        Err(PackError::NotACarrier)
        | Err(PackError::MalformedSize(_))
        | Err(PackError::Truncated { .. }) => Ok(file_len),
        Err(e) => Err(e),
    }
}

fn decode_payload(payload: &[u8]) -> Result<Vec<u8>> {
    STANDARD
        .decode(payload)
        .map_err(|e| PackError::CorruptPayload(e.to_string()))
}
