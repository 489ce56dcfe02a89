//! Carrier mode entry point.
//!
//! When the running executable carries a trailer it skips the CLI entirely:
//! no arguments are parsed, the embedded files are extracted and opened, and
//! the process exits. Nothing is printed unless `PACKZIP_VERBOSE` is set.

use packzip::config::{RunConfig, RUN_FATAL_PAUSE};
use packzip::CarrierRunner;
use std::path::PathBuf;

/// Entry point when detection determines we are a carrier.
///
/// Called from `main()` before clap parses the normal CLI.
/// Never returns, calls `std::process::exit()`.
pub fn run_as_carrier(image: PathBuf) -> ! {
    let config = RunConfig::from_env();
    let silent = config.silent;
    if !silent {
        crate::init_logging();
    }

    tracing::debug!(image = %image.display(), version = packzip::VERSION, "running as carrier");

    let runner = CarrierRunner::with_system_launcher(config);
    match runner.run(&image) {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "carrier run failed");
            if !silent {
                eprintln!("error: {}", e);
                super::flush_output();
            }
            std::thread::sleep(RUN_FATAL_PAUSE);
            std::process::exit(1);
        }
    }
}
