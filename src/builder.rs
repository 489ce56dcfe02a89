//! Carrier builder.
//!
//! Packs input files into an archive, encodes it as a trailer, and writes a
//! copy of the host executable with that trailer appended:
//!
//! ```text
//! inputs ──► ArchiveWriter ──► trailer::encode ──┐
//!                                                ▼
//! host image (host region only) ──────────► output.exe
//! ```
//!
//! Only failing to read the host or to write the output aborts a build.
//! Inputs that cannot be read are skipped and listed in the [`BuildReport`].

use std::fs::{self, File, Metadata};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use packzip_format::archive::{ArchiveEntry, ArchiveWriter};
use packzip_format::trailer;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Minimum number of input files for a carrier.
pub const MIN_INPUTS: usize = 2;

/// Suffix every carrier file name ends with.
pub const CARRIER_SUFFIX: &str = ".exe";

/// Output path used when none is given.
pub const DEFAULT_OUTPUT: &str = "output.exe";

/// Append [`CARRIER_SUFFIX`] unless `path` already ends with it (any case).
pub fn carrier_output_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path
        .to_string_lossy()
        .to_ascii_lowercase()
        .ends_with(CARRIER_SUFFIX)
    {
        return path.to_path_buf();
    }

    let mut name = path.as_os_str().to_os_string();
    name.push(CARRIER_SUFFIX);
    PathBuf::from(name)
}

/// An input that was left out of the carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    /// Path as given.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Path of the written carrier.
    pub output: PathBuf,
    /// Entry names in archive order.
    pub entries: Vec<String>,
    /// Inputs that could not be read.
    pub skipped: Vec<SkippedInput>,
    /// Entry names that more than one input mapped to (last one kept).
    pub replaced: Vec<String>,
    /// Size of the host region copied into the carrier.
    pub host_size: u64,
    /// Size of the raw archive.
    pub archive_size: u64,
    /// Size of the appended trailer.
    pub trailer_size: u64,
    /// CRC32 of the raw archive.
    pub archive_crc32: u32,
    /// Whether the executable bits were applied to the output.
    pub executable: bool,
}

impl BuildReport {
    /// Total size of the carrier.
    pub fn total_size(&self) -> u64 {
        self.host_size + self.trailer_size
    }
}

/// Builder for carrier executables.
#[derive(Debug, Clone)]
pub struct CarrierBuilder {
    host: PathBuf,
    inputs: Vec<PathBuf>,
}

impl CarrierBuilder {
    /// Create a builder that copies `host` as the carrier's executable part.
    pub fn new(host: impl AsRef<Path>) -> Self {
        Self {
            host: host.as_ref().to_path_buf(),
            inputs: Vec::new(),
        }
    }

    /// Create a builder hosted by the running executable.
    pub fn for_current_exe() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| Error::CurrentExe(e.to_string()))?;
        Ok(Self::new(exe))
    }

    /// Add one input file.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add several input files.
    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.inputs
            .extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    /// Path of the host image.
    pub fn host(&self) -> &Path {
        &self.host
    }

    /// Write the carrier.
    ///
    /// `output` gets [`CARRIER_SUFFIX`] appended when missing. Nothing is
    /// touched on disk when fewer than [`MIN_INPUTS`] inputs were given.
    pub fn build(&self, output: impl AsRef<Path>) -> Result<BuildReport> {
        if self.inputs.len() < MIN_INPUTS {
            return Err(Error::TooFewInputs {
                required: MIN_INPUTS,
                actual: self.inputs.len(),
            });
        }

        let output = carrier_output_path(output);
        info!(
            host = %self.host.display(),
            output = %output.display(),
            inputs = self.inputs.len(),
            "building carrier"
        );

        // 1. Archive
        let mut writer = ArchiveWriter::new();
        let mut skipped = Vec::new();
        let mut replaced = Vec::new();

        for path in &self.inputs {
            let entry = match read_input(path) {
                Ok(entry) => entry,
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "skipping input");
                    skipped.push(SkippedInput {
                        path: path.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let name = entry.name.clone();
            debug!(path = %path.display(), name = %name, mode = %format!("{:o}", entry.mode), size = entry.content.len(), "adding entry");

            match writer.add(entry) {
                Ok(Some(_)) => {
                    warn!(name = %name, path = %path.display(), "duplicate entry name, keeping the later file");
                    replaced.push(name);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping input");
                    skipped.push(SkippedInput {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if writer.is_empty() {
            warn!("no readable inputs, carrier will hold an empty archive");
        }

        let entries = writer.names();
        let archive = writer.finish()?;
        let archive_crc32 = packzip_format::crc32(&archive);
        let encoded = trailer::encode(&archive)?;
        debug!(
            archive_size = archive.len(),
            trailer_size = encoded.len(),
            crc32 = %format!("{:08x}", archive_crc32),
            "archive encoded"
        );

        // 2. Host region
        let host_file = File::open(&self.host).map_err(|e| Error::host_image(&self.host, e))?;
        let host_meta = host_file
            .metadata()
            .map_err(|e| Error::host_image(&self.host, e))?;
        let host_size =
            trailer::host_region_len(&self.host).map_err(|e| Error::host_image(&self.host, e))?;
        if host_size < host_meta.len() {
            info!(
                stripped = host_meta.len() - host_size,
                "host already carries a trailer, copying host region only"
            );
        }

        if is_same_file(&output, &self.host) {
            return Err(Error::OutputIsHost { path: output });
        }

        // 3. Output
        let mut out = File::create(&output).map_err(|e| Error::output("create", &output, e))?;

        let copied = std::io::copy(&mut host_file.take(host_size), &mut out)
            .map_err(|e| Error::output("write", &output, e))?;
        if copied != host_size {
            return Err(Error::host_image(
                &self.host,
                format!("expected {} bytes, read {}", host_size, copied),
            ));
        }

        out.write_all(&encoded)
            .and_then(|()| out.flush())
            .map_err(|e| Error::output("write", &output, e))?;
        drop(out);

        // 4. Permissions
        let executable = match mark_executable(&output, &host_meta) {
            Ok(()) => true,
            Err(e) => {
                warn!(output = %output.display(), error = %e, "failed to set executable permissions");
                false
            }
        };

        info!(
            output = %output.display(),
            entries = entries.len(),
            skipped = skipped.len(),
            "carrier written"
        );

        Ok(BuildReport {
            output,
            entries,
            skipped,
            replaced,
            host_size,
            archive_size: archive.len() as u64,
            trailer_size: encoded.len() as u64,
            archive_crc32,
            executable,
        })
    }
}

/// Read one input file as an archive entry named by its basename.
fn read_input(path: &Path) -> std::result::Result<ArchiveEntry, String> {
    let mut file = File::open(path).map_err(|e| format!("open failed: {}", e))?;
    let metadata = file.metadata().map_err(|e| format!("stat failed: {}", e))?;
    if !metadata.is_file() {
        return Err("not a regular file".to_string());
    }

    let name = path
        .file_name()
        .ok_or_else(|| "path has no file name".to_string())?
        .to_str()
        .ok_or_else(|| "file name is not valid UTF-8".to_string())?
        .to_string();

    let mut content = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut content)
        .map_err(|e| format!("read failed: {}", e))?;

    Ok(ArchiveEntry::new(name, file_mode(&metadata), content))
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        packzip_format::archive::DEFAULT_MODE
    }
}

#[cfg(unix)]
fn mark_executable(output: &Path, host_meta: &Metadata) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = host_meta.permissions().mode() | 0o111;
    fs::set_permissions(output, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn mark_executable(_output: &Path, _host_meta: &Metadata) -> std::io::Result<()> {
    Ok(())
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
