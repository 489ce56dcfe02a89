//! Opening extracted files.
//!
//! A file is opened by trying a fixed list of OS-provided strategies in
//! order until one works:
//!
//! | Strategy      | Windows                            | macOS / Linux                |
//! |---------------|------------------------------------|------------------------------|
//! | `ShellOpen`   | `cmd /c start "" <path>`           | `open` / `xdg-open <path>`   |
//! | `ScriptStart` | `powershell Start-Process <path>`  | `sh -c 'exec "$0"' <path>`   |
//! | `Direct`      | spawn `<path>` if it is an `.exe`  | spawn `<path>` if executable |
//!
//! The shell strategies hand the file to another program and are expected to
//! exit quickly. They are waited on for a bounded time only; a helper that is
//! still running when the bound expires counts as a successful launch.
//!
//! Launch failures are never errors: [`Launch::open`] returns `None` and the
//! caller moves on.

use std::fmt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::config::DEFAULT_HANDOFF_TIMEOUT;

/// Something that can open a file.
pub trait Launch {
    /// Open `path`, returning a handle on success.
    fn open(&self, path: &Path) -> Option<LaunchHandle>;
}

/// One way of opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The desktop's default file association.
    ShellOpen,
    /// A scripting shell starts the file.
    ScriptStart,
    /// The file is executed directly.
    Direct,
}

impl Strategy {
    /// All strategies in priority order.
    pub const ALL: [Strategy; 3] = [Strategy::ShellOpen, Strategy::ScriptStart, Strategy::Direct];

    /// Whether the spawned process only hands the file off and then exits.
    pub fn is_handoff(self) -> bool {
        !matches!(self, Strategy::Direct)
    }

    /// Command implementing this strategy for `path`.
    ///
    /// `None` when the strategy does not apply to the file.
    fn command(self, path: &Path) -> Option<Command> {
        let mut command = match self {
            Strategy::ShellOpen => shell_open_command(path),
            Strategy::ScriptStart => script_start_command(path),
            Strategy::Direct => {
                if !is_directly_executable(path) {
                    return None;
                }
                Command::new(path)
            }
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        hide_console(&mut command);
        Some(command)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::ShellOpen => write!(f, "shell-open"),
            Strategy::ScriptStart => write!(f, "script-start"),
            Strategy::Direct => write!(f, "direct"),
        }
    }
}

#[cfg(windows)]
fn shell_open_command(path: &Path) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/c", "start", ""]).arg(path);
    command
}

#[cfg(target_os = "macos")]
fn shell_open_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg(path);
    command
}

#[cfg(all(unix, not(target_os = "macos")))]
fn shell_open_command(path: &Path) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    command
}

#[cfg(windows)]
fn script_start_command(path: &Path) -> Command {
    let mut command = Command::new("powershell");
    command
        .args(["-NoProfile", "-NonInteractive", "Start-Process", "-FilePath"])
        .arg(path);
    command
}

#[cfg(not(windows))]
fn script_start_command(path: &Path) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg("exec \"$0\"").arg(path);
    command
}

#[cfg(windows)]
fn hide_console(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_command: &mut Command) {}

/// Whether `path` can be spawned as a program.
pub fn is_directly_executable(path: &Path) -> bool {
    let has_exe_extension = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                has_exe_extension || meta.permissions().mode() & 0o111 != 0
            }
            _ => false,
        }
    }

    #[cfg(not(unix))]
    {
        has_exe_extension && path.is_file()
    }
}

/// A successful launch.
#[derive(Debug)]
pub struct LaunchHandle {
    strategy: Strategy,
    child: Option<Child>,
}

impl LaunchHandle {
    /// Handle for a launch whose process has already been reaped or is not
    /// tracked.
    pub fn detached(strategy: Strategy) -> Self {
        Self {
            strategy,
            child: None,
        }
    }

    /// Strategy that succeeded.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Whether a spawned process is still tracked and running.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Wait up to `timeout` for the tracked process to exit.
    ///
    /// Returns `None` if nothing is tracked, the timeout expired, or waiting
    /// failed.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.wait_timeout(timeout) {
            Ok(status) => status,
            Err(e) => {
                debug!(error = %e, "wait on launched process failed");
                None
            }
        }
    }
}

/// Launcher using the strategies of the host OS.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    strategies: Vec<Strategy>,
    handoff_timeout: Duration,
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_HANDOFF_TIMEOUT)
    }
}

impl SystemLauncher {
    /// Launcher trying every strategy in priority order.
    pub fn new(handoff_timeout: Duration) -> Self {
        Self::with_strategies(Strategy::ALL, handoff_timeout)
    }

    /// Launcher restricted to the given strategies, tried in the given order.
    pub fn with_strategies(
        strategies: impl IntoIterator<Item = Strategy>,
        handoff_timeout: Duration,
    ) -> Self {
        Self {
            strategies: strategies.into_iter().collect(),
            handoff_timeout,
        }
    }

    /// Strategies in the order they are tried.
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    fn attempt(&self, strategy: Strategy, path: &Path) -> std::io::Result<Option<LaunchHandle>> {
        let Some(mut command) = strategy.command(path) else {
            return Ok(None);
        };

        let mut child = command.spawn()?;
        if !strategy.is_handoff() {
            return Ok(Some(LaunchHandle {
                strategy,
                child: Some(child),
            }));
        }

        match child.wait_timeout(self.handoff_timeout)? {
            Some(status) if status.success() => Ok(Some(LaunchHandle::detached(strategy))),
            Some(status) => Err(std::io::Error::other(format!("exited with {}", status))),
            None => Ok(Some(LaunchHandle {
                strategy,
                child: Some(child),
            })),
        }
    }
}

impl Launch for SystemLauncher {
    fn open(&self, path: &Path) -> Option<LaunchHandle> {
        for &strategy in &self.strategies {
            match self.attempt(strategy, path) {
                Ok(Some(handle)) => {
                    debug!(path = %path.display(), %strategy, "launched");
                    return Some(handle);
                }
                Ok(None) => {
                    debug!(path = %path.display(), %strategy, "strategy not applicable");
                }
                Err(e) => {
                    debug!(path = %path.display(), %strategy, error = %e, "strategy failed");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priority_order() {
        let launcher = SystemLauncher::default();
        assert_eq!(
            launcher.strategies(),
            &[Strategy::ShellOpen, Strategy::ScriptStart, Strategy::Direct]
        );
    }

    #[test]
    fn test_handoff_strategies() {
        assert!(Strategy::ShellOpen.is_handoff());
        assert!(Strategy::ScriptStart.is_handoff());
        assert!(!Strategy::Direct.is_handoff());
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::ShellOpen.to_string(), "shell-open");
        assert_eq!(Strategy::Direct.to_string(), "direct");
    }

    #[test]
    fn test_detached_handle() {
        let mut handle = LaunchHandle::detached(Strategy::ShellOpen);
        assert_eq!(handle.strategy(), Strategy::ShellOpen);
        assert!(!handle.is_running());
        assert!(handle.wait_timeout(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_no_strategies_never_launches() {
        let launcher = SystemLauncher::with_strategies([], Duration::from_secs(1));
        assert!(launcher.open(Path::new("/anything")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_directly_executable() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();

        let script = temp_dir.path().join("run");
        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_directly_executable(&script));

        let text = temp_dir.path().join("notes.txt");
        fs::write(&text, "plain").unwrap();
        fs::set_permissions(&text, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!is_directly_executable(&text));

        let exe = temp_dir.path().join("setup.EXE");
        fs::write(&exe, "MZ").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(is_directly_executable(&exe));

        assert!(!is_directly_executable(temp_dir.path()));
        assert!(!is_directly_executable(&temp_dir.path().join("missing")));
    }

    // All spawning cases live in one test so no other test forks while a
    // freshly written script is still open for writing.
    #[cfg(unix)]
    #[test]
    fn test_spawning_strategies() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let timeout = Duration::from_secs(10);

        let script = temp_dir.path().join("ok.sh");
        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let text = temp_dir.path().join("data.txt");
        fs::write(&text, "not a program").unwrap();
        fs::set_permissions(&text, fs::Permissions::from_mode(0o644)).unwrap();

        // Direct: executable script spawns and is tracked
        let direct = SystemLauncher::with_strategies([Strategy::Direct], timeout);
        let mut handle = direct.open(&script).expect("script should launch");
        assert_eq!(handle.strategy(), Strategy::Direct);
        let status = handle.wait_timeout(timeout).expect("script should exit");
        assert!(status.success());

        // Direct: not applicable to a non-executable file
        assert!(direct.open(&text).is_none());

        // ScriptStart: quick successful handoff is not tracked further
        let script_start = SystemLauncher::with_strategies([Strategy::ScriptStart], timeout);
        let mut handle = script_start.open(&script).expect("shell should start script");
        assert_eq!(handle.strategy(), Strategy::ScriptStart);
        assert!(!handle.is_running());

        // ScriptStart: shell exits non-zero for a missing file
        assert!(script_start
            .open(&temp_dir.path().join("missing"))
            .is_none());

        // Fallback order: ScriptStart fails on a data file, Direct does not apply
        let both = SystemLauncher::with_strategies([Strategy::ScriptStart, Strategy::Direct], timeout);
        assert!(both.open(&text).is_none());
    }
}
