//! Runtime configuration.
//!
//! packzip has no configuration file. The build phase is driven entirely by
//! CLI arguments; the run phase takes no arguments at all and reads its few
//! knobs from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the extraction root.
pub const TEMP_ENV: &str = "TEMP";

/// Environment variable that turns off carrier-mode silence.
pub const VERBOSE_ENV: &str = "PACKZIP_VERBOSE";

/// Delay between two launches.
pub const DEFAULT_LAUNCH_INTERVAL: Duration = Duration::from_millis(100);

/// Time given to launched processes after the last launch.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(3);

/// Longest wait for a shell helper to hand a file off.
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause before exiting on a build-fatal error.
pub const BUILD_FATAL_PAUSE: Duration = Duration::from_secs(5);

/// Pause before exiting on a run-fatal error.
pub const RUN_FATAL_PAUSE: Duration = Duration::from_secs(2);

/// Carrier run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory the session directory is created in.
    pub temp_root: PathBuf,
    /// Delay between consecutive launches.
    pub launch_interval: Duration,
    /// Time given to launched processes before the runner returns.
    pub settle: Duration,
    /// Bound on how long a shell helper may take to hand a file off.
    pub handoff_timeout: Duration,
    /// Wait on launched children (bounded by `settle`) instead of sleeping.
    pub wait_for_children: bool,
    /// Suppress all diagnostics.
    pub silent: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            temp_root: env::temp_dir(),
            launch_interval: DEFAULT_LAUNCH_INTERVAL,
            settle: DEFAULT_SETTLE,
            handoff_timeout: DEFAULT_HANDOFF_TIMEOUT,
            wait_for_children: false,
            silent: true,
        }
    }
}

impl RunConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(temp) = lookup(TEMP_ENV).filter(|v| !v.trim().is_empty()) {
            config.temp_root = PathBuf::from(temp);
        }
        if let Some(verbose) = lookup(VERBOSE_ENV) {
            config.silent = !is_truthy(&verbose);
        }

        config
    }

    /// A configuration with no delays, for driving the runner in-process.
    pub fn immediate(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            launch_interval: Duration::ZERO,
            settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
