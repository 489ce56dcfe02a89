//! Build command for creating carrier executables.

use clap::Args;
use packzip::builder::{CarrierBuilder, DEFAULT_OUTPUT, MIN_INPUTS};
use std::path::PathBuf;
use tracing::info;

use super::format_kb;

/// Usage line printed when too few files are given.
const BUILD_USAGE: &str = "Usage: packzip build <FILE> <FILE>... [-o <PATH>]";

/// Bundle files into a carrier executable.
///
/// The carrier is a copy of this executable with the files appended. Running
/// it extracts the files into a temporary directory and opens each one.
/// Files that cannot be read are skipped with a warning.
///
/// Examples:
///   packzip build readme.txt setup.exe
///   packzip build docs/manual.pdf tools/viewer.exe -o manual
#[derive(Args, Debug)]
pub struct BuildCmd {
    /// Files to bundle (at least two)
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output path for the carrier (".exe" is appended when missing)
    #[arg(short = 'o', long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Host executable to copy (defaults to this binary)
    #[arg(long, value_name = "PATH", hide = true)]
    pub host: Option<PathBuf>,
}

impl BuildCmd {
    pub fn run(self) -> packzip::Result<()> {
        // Validate before resolving the host so a bad invocation touches nothing.
        if self.files.len() < MIN_INPUTS {
            eprintln!("{}", BUILD_USAGE);
            return Err(packzip::Error::TooFewInputs {
                required: MIN_INPUTS,
                actual: self.files.len(),
            });
        }

        let builder = match self.host {
            Some(host) => CarrierBuilder::new(host),
            None => CarrierBuilder::for_current_exe()?,
        }
        .inputs(&self.files);

        info!(files = self.files.len(), output = %self.output.display(), "building carrier");
        println!("Packing {} files...", self.files.len());

        let report = builder.build(&self.output)?;

        for skipped in &report.skipped {
            eprintln!(
                "Warning: skipped {}: {}",
                skipped.path.display(),
                skipped.reason
            );
        }
        for name in &report.replaced {
            eprintln!("Warning: duplicate name '{}', keeping the later file", name);
        }

        println!(
            "Packed: {} ({} entries, host: {}, archive: {}, total: {})",
            report.output.display(),
            report.entries.len(),
            format_kb(report.host_size),
            format_kb(report.archive_size),
            format_kb(report.total_size())
        );
        if !report.executable {
            eprintln!("Warning: could not mark the carrier executable");
        }

        println!("\nRun with: {}", report.output.display());
        Ok(())
    }
}
