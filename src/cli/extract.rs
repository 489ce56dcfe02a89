//! Extract command for unpacking carriers without launching anything.

use clap::Args;
use packzip::runner::{self, CarrierRunner};
use packzip::RunConfig;
use std::path::PathBuf;

/// Extract the files of a carrier.
///
/// Without `--dir` the files land in a fresh session directory under `TEMP`
/// (or the system temporary directory), exactly where running the carrier
/// would put them.
///
/// Examples:
///   packzip extract bundle.exe
///   packzip extract bundle.exe -d ./unpacked
#[derive(Args, Debug)]
pub struct ExtractCmd {
    /// Carrier executable to extract
    #[arg(value_name = "CARRIER")]
    pub carrier: PathBuf,

    /// Directory to extract into (created when missing)
    #[arg(short = 'd', long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

impl ExtractCmd {
    pub fn run(self) -> packzip::Result<()> {
        let session = match &self.dir {
            Some(dir) => runner::extract_to(&self.carrier, dir)?,
            None => CarrierRunner::with_system_launcher(RunConfig::from_env())
                .extract(&self.carrier)?,
        };

        for skipped in &session.skipped {
            eprintln!("Warning: skipped {}: {}", skipped.name, skipped.reason);
        }
        for path in &session.written {
            println!("  {}", path.display());
        }
        println!(
            "Extracted {} files to {}",
            session.written.len(),
            session.dir.display()
        );
        Ok(())
    }
}
