//! CLI command implementations.

pub mod build;
pub mod carrier;
pub mod extract;
pub mod inspect;

use std::io::Write;

/// Render permission bits the way `ls -l` users read them in octal.
pub fn format_mode(mode: u32) -> String {
    format!("{:03o}", mode & 0o777)
}

/// Format a byte count as whole kilobytes, rounding up.
pub fn format_kb(bytes: u64) -> String {
    format!("{}KB", bytes.div_ceil(1024))
}

/// Flush stdout and stderr, ignoring errors.
///
/// Used to ensure output is visible before blocking operations.
pub fn flush_output() {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}
