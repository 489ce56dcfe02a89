//! Carrier mode detection.
//!
//! The same binary acts as the build tool and as a carrier. Which role
//! applies is decided once at startup by looking for the trailer marker in the
//! last few kilobytes of the running executable.
//!
//! This is a heuristic. A host image whose own tail happens to contain the
//! marker text would be classified as a carrier.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use packzip_format::trailer::{find_marker, SCAN_WINDOW};

/// Files smaller than this cannot hold a host executable plus a trailer.
pub const MIN_CARRIER_SIZE: u64 = 10_000;

/// Role of the running executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Plain build tool: parse the CLI.
    Builder,
    /// Carrier: extract and launch the embedded files.
    Carrier {
        /// Path of the carrier image.
        image: PathBuf,
    },
}

/// Detect the role of the running executable.
///
/// An executable whose path cannot be resolved is treated as the build tool.
pub fn detect() -> Mode {
    match std::env::current_exe() {
        Ok(image) if is_carrier_image(&image) => Mode::Carrier { image },
        Ok(_) => Mode::Builder,
        Err(e) => {
            tracing::debug!(error = %e, "current executable unresolved, assuming build mode");
            Mode::Builder
        }
    }
}

/// Whether the running executable is a carrier.
pub fn is_carrier() -> bool {
    matches!(detect(), Mode::Carrier { .. })
}

/// Whether the file at `path` looks like a carrier.
pub fn is_carrier_image(path: &Path) -> bool {
    match tail_has_marker(path) {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "carrier probe failed");
            false
        }
    }
}

fn tail_has_marker(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    if size < MIN_CARRIER_SIZE {
        return Ok(false);
    }

    let window_len = SCAN_WINDOW.min(size);
    file.seek(SeekFrom::Start(size - window_len))?;

    let mut window = vec![0u8; window_len as usize];
    file.read_exact(&mut window)?;

    Ok(find_marker(&window).is_some())
}
