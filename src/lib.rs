//! packzip - self-extracting carrier executables
//!
//! packzip bundles a set of files into a single executable. The bundle is a
//! copy of the packzip binary itself with the files appended as an encoded
//! archive. When the bundle is started it extracts the files to a fresh
//! temporary directory and opens each of them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  packzip CLI (build / inspect / extract)        │
//! ├────────────────────────┬────────────────────────┤
//! │  builder               │  runner → launcher     │
//! ├────────────────────────┴────────────────────────┤
//! │  detect (carrier or build tool?)                │
//! ├─────────────────────────────────────────────────┤
//! │  packzip-format (archive + trailer codecs)      │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use packzip::{CarrierBuilder, CarrierRunner, RunConfig};
//!
//! // Bundle two files into a carrier built from the running executable
//! let report = CarrierBuilder::for_current_exe()?
//!     .input("readme.txt")
//!     .input("setup.exe")
//!     .build("bundle")?;
//! println!("wrote {}", report.output.display());
//!
//! // Extract and open them again
//! let runner = CarrierRunner::with_system_launcher(RunConfig::default());
//! let session = runner.run(&report.output)?;
//! println!("extracted to {}", session.dir.display());
//! # Ok::<(), packzip::Error>(())
//! ```
//!
//! # Platform Support
//!
//! | Platform | Shell open | Script start | Direct |
//! |----------|------------|--------------|--------|
//! | Windows  | `cmd /c start` | `powershell Start-Process` | `.exe` only |
//! | macOS    | `open` | `sh -c` | execute bit or `.exe` |
//! | Linux    | `xdg-open` | `sh -c` | execute bit or `.exe` |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod config;
pub mod detect;
pub mod error;
pub mod launcher;
pub mod runner;

// Re-export main types for convenience
pub use builder::{BuildReport, CarrierBuilder, SkippedInput};
pub use config::RunConfig;
pub use detect::{detect, Mode};
pub use error::{Error, Result};
pub use launcher::{Launch, LaunchHandle, Strategy, SystemLauncher};
pub use runner::{CarrierRunner, ExtractionSession, SkippedEntry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
