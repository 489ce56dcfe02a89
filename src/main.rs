//! packzip CLI entry point.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use packzip::config::BUILD_FATAL_PAUSE;
use packzip::Mode;
use tracing_subscriber::EnvFilter;

mod cli;

/// packzip - bundle files into a self-extracting executable
#[derive(Parser, Debug)]
#[command(name = "packzip")]
#[command(about = "Bundle files into a self-extracting executable")]
#[command(
    long_about = "packzip copies itself and appends an archive of the given files.\n\n\
Running the resulting executable extracts the files into a fresh temporary \
directory and opens each of them with the system's default handler.\n\n\
Quick start:\n  \
packzip build readme.txt setup.exe -o bundle\n  \
packzip inspect bundle.exe"
)]
#[command(version)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bundle files into a carrier executable
    Build(cli::build::BuildCmd),

    /// Show the trailer layout and entries of a carrier
    Inspect(cli::inspect::InspectCmd),

    /// Extract the files of a carrier without opening them
    Extract(cli::extract::ExtractCmd),
}

fn main() -> ExitCode {
    // A carrier takes no arguments; decide the role before clap sees argv.
    if let Mode::Carrier { image } = packzip::detect() {
        cli::carrier::run_as_carrier(image);
    }

    // Usage errors exit 1 like every other failure; only explicit
    // --help/--version succeed.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    // Initialize logging based on RUST_LOG or default to info
    init_logging();

    tracing::debug!(version = packzip::VERSION, "starting packzip");

    let pauses_on_error = matches!(cli.command, Commands::Build(_));

    // Execute command
    let result = match cli.command {
        Commands::Build(cmd) => cmd.run(),
        Commands::Inspect(cmd) => cmd.run(),
        Commands::Extract(cmd) => cmd.run(),
    };

    // Handle errors
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            if pauses_on_error && !e.is_usage() {
                cli::flush_output();
                std::thread::sleep(BUILD_FATAL_PAUSE);
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Diagnostics go to stderr so command output on stdout stays parseable.
pub(crate) fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("packzip=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
