//! Carrier run phase.
//!
//! Decodes the trailer of a carrier image, unpacks every entry into a fresh
//! session directory and opens each extracted file in archive order.
//!
//! Only the image and the session directory are fatal. A single entry that
//! cannot be written is skipped, and a file that cannot be opened is ignored.
//! The session directory is left in place after the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use packzip_format::archive::{Archive, ArchiveEntry};
use packzip_format::trailer;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::launcher::{Launch, LaunchHandle, SystemLauncher};

/// Prefix of session directory names.
pub const SESSION_PREFIX: &str = "packzip_";

/// An entry that could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Entry name, or its index when the name could not be read.
    pub name: String,
    /// Why the entry was skipped.
    pub reason: String,
}

/// Files materialised by one run.
#[derive(Debug, Clone)]
pub struct ExtractionSession {
    /// Directory holding the extracted files.
    pub dir: PathBuf,
    /// Extracted files in archive order.
    pub written: Vec<PathBuf>,
    /// Entries that were not extracted.
    pub skipped: Vec<SkippedEntry>,
}

/// Runs a carrier image.
pub struct CarrierRunner<L = SystemLauncher> {
    config: RunConfig,
    launcher: L,
}

impl CarrierRunner<SystemLauncher> {
    /// Runner using the OS launcher configured from `config`.
    pub fn with_system_launcher(config: RunConfig) -> Self {
        let launcher = SystemLauncher::new(config.handoff_timeout);
        Self::new(config, launcher)
    }
}

impl<L: Launch> CarrierRunner<L> {
    /// Create a runner.
    pub fn new(config: RunConfig, launcher: L) -> Self {
        Self { config, launcher }
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Extract the carrier at `image` and open every extracted file.
    pub fn run(&self, image: impl AsRef<Path>) -> Result<ExtractionSession> {
        let session = self.extract(image)?;
        let launched = self.launch(&session);
        info!(
            dir = %session.dir.display(),
            extracted = session.written.len(),
            launched,
            "carrier run complete"
        );
        Ok(session)
    }

    /// Extract the carrier at `image` into a fresh session directory.
    pub fn extract(&self, image: impl AsRef<Path>) -> Result<ExtractionSession> {
        let archive = open_archive(image.as_ref())?;
        let dir = create_session_dir(&self.config.temp_root)?;
        Ok(unpack(archive, dir))
    }

    /// Open every extracted file, then give the launched processes time to
    /// start.
    ///
    /// Returns how many files were launched.
    pub fn launch(&self, session: &ExtractionSession) -> usize {
        let mut handles = Vec::new();

        for (i, path) in session.written.iter().enumerate() {
            if i > 0 && !self.config.launch_interval.is_zero() {
                thread::sleep(self.config.launch_interval);
            }

            match self.launcher.open(path) {
                Some(handle) => {
                    debug!(path = %path.display(), strategy = %handle.strategy(), "opened");
                    handles.push(handle);
                }
                None => debug!(path = %path.display(), "no launch strategy succeeded"),
            }
        }

        let launched = handles.len();
        self.settle(handles);
        launched
    }

    fn settle(&self, mut handles: Vec<LaunchHandle>) {
        if self.config.settle.is_zero() {
            return;
        }

        if !self.config.wait_for_children {
            thread::sleep(self.config.settle);
            return;
        }

        // Children still running at the deadline are left alone.
        let deadline = Instant::now() + self.config.settle;
        for handle in &mut handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Some(status) = handle.wait_timeout(remaining) {
                debug!(strategy = %handle.strategy(), %status, "launched process exited");
            }
        }
    }
}

/// Decode the trailer of `image` and open the embedded archive.
pub fn open_archive(image: &Path) -> Result<Archive> {
    let bytes = trailer::read_trailer_from_file(image).map_err(|e| Error::carrier(image, e))?;
    debug!(image = %image.display(), archive_size = bytes.len(), "trailer decoded");
    Archive::from_bytes(bytes).map_err(|e| Error::carrier(image, e))
}

/// Create a uniquely named session directory under `root`.
pub fn create_session_dir(root: &Path) -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(SESSION_PREFIX)
        .tempdir_in(root)
        .map_err(|e| Error::session(root, e))?;
    Ok(dir.keep())
}

/// Extract the carrier at `image` into `dir` without launching anything.
///
/// `dir` is created when missing.
pub fn extract_to(image: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<ExtractionSession> {
    let archive = open_archive(image.as_ref())?;
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::session(dir, e))?;
    Ok(unpack(archive, dir.to_path_buf()))
}

fn unpack(mut archive: Archive, dir: PathBuf) -> ExtractionSession {
    info!(dir = %dir.display(), entries = archive.len(), "extracting");

    let mut written: Vec<PathBuf> = Vec::new();
    let mut skipped = Vec::new();

    for index in 0..archive.len() {
        let entry = match archive.entry(index) {
            Ok(entry) => entry,
            Err(e) => {
                let name = archive
                    .info(index)
                    .map(|info| info.name)
                    .unwrap_or_else(|_| format!("#{}", index));
                warn!(name = %name, error = %e, "skipping entry");
                skipped.push(SkippedEntry {
                    name,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match write_entry(&dir, &entry) {
            Ok(path) => {
                // Last write wins for repeated names; list the path once.
                if !written.contains(&path) {
                    written.push(path);
                }
            }
            Err(e) => {
                warn!(name = %entry.name, error = %e, "skipping entry");
                skipped.push(SkippedEntry {
                    name: entry.name,
                    reason: e.to_string(),
                });
            }
        }
    }

    ExtractionSession {
        dir,
        written,
        skipped,
    }
}

fn write_entry(dir: &Path, entry: &ArchiveEntry) -> std::io::Result<PathBuf> {
    let path = dir.join(&entry.name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &entry.content)?;

    if let Err(e) = restore_mode(&path, entry.mode) {
        warn!(path = %path.display(), error = %e, "could not restore permissions");
    }

    debug!(path = %path.display(), size = entry.content.len(), "extracted");
    Ok(path)
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restore_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::Strategy;
    use packzip_format::archive;
    use packzip_format::PackError;
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingLauncher {
        opened: RefCell<Vec<PathBuf>>,
        refuse: Option<&'static str>,
    }

    impl Launch for RecordingLauncher {
        fn open(&self, path: &Path) -> Option<LaunchHandle> {
            self.opened.borrow_mut().push(path.to_path_buf());
            let refused = self
                .refuse
                .is_some_and(|name| path.file_name().is_some_and(|f| f == name));
            (!refused).then(|| LaunchHandle::detached(Strategy::Direct))
        }
    }

    fn write_carrier(dir: &Path, entries: Vec<ArchiveEntry>) -> PathBuf {
        let path = dir.join("bundle.exe");
        let mut image = vec![0x7Fu8; 16_000];
        let archive = archive::pack(entries).unwrap();
        image.extend_from_slice(&trailer::encode(&archive).unwrap());
        fs::write(&path, image).unwrap();
        path
    }

    fn sample_entries() -> Vec<ArchiveEntry> {
        vec![
            ArchiveEntry::new("readme.txt", 0o644, b"hi".to_vec()),
            ArchiveEntry::new("app", 0o755, b"#!/bin/sh\necho app\n".to_vec()),
        ]
    }

    #[test]
    fn test_run_extracts_and_launches_in_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), sample_entries());
        let root = temp_dir.path().join("tmp");
        fs::create_dir(&root).unwrap();

        let runner = CarrierRunner::new(RunConfig::immediate(&root), RecordingLauncher::default());
        let session = runner.run(&image).unwrap();

        assert_eq!(session.dir.parent(), Some(root.as_path()));
        let dir_name = session.dir.file_name().unwrap().to_string_lossy();
        assert!(dir_name.starts_with(SESSION_PREFIX));

        let readme = session.dir.join("readme.txt");
        let app = session.dir.join("app");
        assert_eq!(session.written, vec![readme.clone(), app.clone()]);
        assert!(session.skipped.is_empty());
        assert_eq!(fs::read(&readme).unwrap(), b"hi");
        assert_eq!(fs::read(&app).unwrap(), b"#!/bin/sh\necho app\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode(&readme), 0o644);
            assert_eq!(mode(&app), 0o755);
        }

        assert_eq!(*runner.launcher.opened.borrow(), vec![readme, app]);
    }

    #[test]
    fn test_each_run_gets_a_fresh_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), sample_entries());

        let runner = CarrierRunner::new(
            RunConfig::immediate(temp_dir.path()),
            RecordingLauncher::default(),
        );
        let first = runner.extract(&image).unwrap();
        let second = runner.extract(&image).unwrap();

        assert_ne!(first.dir, second.dir);
        assert!(first.dir.join("readme.txt").exists());
        assert!(second.dir.join("readme.txt").exists());
    }

    #[test]
    fn test_launch_failures_are_ignored() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), sample_entries());

        let launcher = RecordingLauncher {
            refuse: Some("readme.txt"),
            ..Default::default()
        };
        let runner = CarrierRunner::new(RunConfig::immediate(temp_dir.path()), launcher);
        let session = runner.extract(&image).unwrap();

        assert_eq!(runner.launch(&session), 1);
        assert_eq!(runner.launcher.opened.borrow().len(), 2);
    }

    #[test]
    fn test_settle_runs_even_when_nothing_launched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), Vec::new());

        let config = RunConfig {
            settle: Duration::from_millis(200),
            ..RunConfig::immediate(temp_dir.path())
        };
        let runner = CarrierRunner::new(config, RecordingLauncher::default());

        let started = Instant::now();
        let session = runner.run(&image).unwrap();
        assert!(session.written.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_bounded_wait_for_children() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), sample_entries());

        let config = RunConfig {
            settle: Duration::from_secs(30),
            wait_for_children: true,
            ..RunConfig::immediate(temp_dir.path())
        };
        let runner = CarrierRunner::new(config, RecordingLauncher::default());
        let session = runner.extract(&image).unwrap();

        // Detached handles have nothing to wait on
        let started = Instant::now();
        assert_eq!(runner.launch(&session), 2);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_not_a_carrier_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = temp_dir.path().join("plain.exe");
        fs::write(&image, vec![0u8; 20_000]).unwrap();

        let runner = CarrierRunner::new(
            RunConfig::immediate(temp_dir.path()),
            RecordingLauncher::default(),
        );
        let err = runner.run(&image).unwrap_err();

        assert!(matches!(
            err,
            Error::Carrier {
                source: PackError::NotACarrier,
                ..
            }
        ));
        assert!(runner.launcher.opened.borrow().is_empty());
    }

    #[test]
    fn test_missing_image_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let runner = CarrierRunner::new(
            RunConfig::immediate(temp_dir.path()),
            RecordingLauncher::default(),
        );

        let err = runner.run(temp_dir.path().join("gone.exe")).unwrap_err();
        assert!(matches!(
            err,
            Error::Carrier {
                source: PackError::Io(_),
                ..
            }
        ));
    }

    #[test]
    fn test_corrupt_archive_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = temp_dir.path().join("bad.exe");
        let mut bytes = vec![0u8; 16_000];
        bytes.extend_from_slice(&trailer::encode(b"definitely not a zip").unwrap());
        fs::write(&image, bytes).unwrap();

        let err = open_archive(&image).unwrap_err();
        assert!(matches!(
            err,
            Error::Carrier {
                source: PackError::Archive(_),
                ..
            }
        ));
    }

    #[test]
    fn test_uncreatable_session_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), sample_entries());

        let runner = CarrierRunner::new(
            RunConfig::immediate(temp_dir.path().join("no").join("such").join("root")),
            RecordingLauncher::default(),
        );
        let err = runner.run(&image).unwrap_err();

        assert!(matches!(err, Error::Session { .. }));
        assert!(runner.launcher.opened.borrow().is_empty());
    }

    #[test]
    fn test_unwritable_entry_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), sample_entries());
        let out = temp_dir.path().join("out");

        // A directory squatting on the destination makes the write fail
        fs::create_dir_all(out.join("readme.txt")).unwrap();

        let session = extract_to(&image, &out).unwrap();
        assert_eq!(session.written, vec![out.join("app")]);
        assert_eq!(session.skipped.len(), 1);
        assert_eq!(session.skipped[0].name, "readme.txt");
    }

    #[test]
    fn test_extract_to_creates_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), sample_entries());
        let out = temp_dir.path().join("nested").join("out");

        let session = extract_to(&image, &out).unwrap();
        assert_eq!(session.dir, out);
        assert_eq!(fs::read(out.join("readme.txt")).unwrap(), b"hi");
    }

    #[test]
    fn test_empty_archive_extracts_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = write_carrier(temp_dir.path(), Vec::new());

        let runner = CarrierRunner::new(
            RunConfig::immediate(temp_dir.path()),
            RecordingLauncher::default(),
        );
        let session = runner.run(&image).unwrap();
        assert!(session.written.is_empty());
        assert!(session.dir.is_dir());
    }
}
