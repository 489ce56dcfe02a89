//! Error types for packzip.
//!
//! # Error Message Style Guide
//!
//! - **Format**: `"<operation> failed: <reason>"` or `"<entity> not found: <identifier>"`
//! - **Case**: All lowercase
//! - **Context**: Include the path involved whenever one is known
//!
//! ```text
//! "host image read failed: /usr/local/bin/packzip: permission denied"
//! "output create failed: /readonly/out.exe: read-only file system"
//! "too few inputs: need at least 2, got 1"
//! ```
//!
//! Errors are grouped by phase. Anything returned from the build phase is
//! fatal for the build; per-input failures never surface as an [`Error`] and
//! are reported in the build report instead. The same holds for the run phase
//! and per-entry failures.

use std::path::PathBuf;
use thiserror::Error;

use packzip_format::PackError;

/// Result type alias using packzip's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in packzip operations.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Build Errors
    // ========================================================================
    /// Fewer input files than a carrier requires.
    #[error("too few inputs: need at least {required}, got {actual}")]
    TooFewInputs {
        /// Minimum number of inputs.
        required: usize,
        /// Number of inputs given.
        actual: usize,
    },

    /// The host image (normally the running executable) could not be read.
    #[error("host image read failed: {}: {reason}", path.display())]
    HostImage {
        /// Path to the host image.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// The output file could not be created or written.
    #[error("output {operation} failed: {}: {reason}", path.display())]
    Output {
        /// The operation that failed (e.g., "create", "write").
        operation: String,
        /// Path to the output file.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// The output path resolves to the host image itself.
    #[error("invalid output path: {} is the host image", path.display())]
    OutputIsHost {
        /// Offending output path.
        path: PathBuf,
    },

    // ========================================================================
    // Run Errors
    // ========================================================================
    /// The carrier image could not be opened or its trailer parsed.
    #[error("carrier read failed: {}: {source}", path.display())]
    Carrier {
        /// Path to the carrier image.
        path: PathBuf,
        /// Underlying format error.
        #[source]
        source: PackError,
    },

    /// The extraction session directory could not be created.
    #[error("session create failed: {}: {reason}", root.display())]
    Session {
        /// Directory the session was to be created under.
        root: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// The path of the running executable could not be resolved.
    #[error("current executable not found: {0}")]
    CurrentExe(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Format error outside of a specific carrier context.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// I/O error.
    #[error("io operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a host image error.
    pub fn host_image(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::HostImage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an output error.
    pub fn output(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl ToString,
    ) -> Self {
        Self::Output {
            operation: operation.into(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a carrier read error.
    pub fn carrier(path: impl Into<PathBuf>, source: PackError) -> Self {
        Self::Carrier {
            path: path.into(),
            source,
        }
    }

    /// Create a session error.
    pub fn session(root: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Session {
            root: root.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error comes from argument validation rather than I/O.
    ///
    /// Usage errors exit immediately; everything else pauses first so the
    /// operator can read the message.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::TooFewInputs { .. })
    }
}
