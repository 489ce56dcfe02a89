//! Inner multi-file archive.
//!
//! Entries are stored in a deflate ZIP held entirely in memory. Every entry
//! carries its permission bits in the unix external attributes and a fixed
//! timestamp, so packing the same files twice yields identical bytes.

use std::io::{Cursor, Read, Write};
use std::path::{Component, Path};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::{PackError, Result};

/// Permission bits used when an entry carries none.
pub const DEFAULT_MODE: u32 = 0o644;

/// Permission bits kept from a file mode.
pub const MODE_MASK: u32 = 0o777;

/// One file inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Relative path inside the archive.
    pub name: String,
    /// Unix permission bits.
    pub mode: u32,
    /// Raw file content.
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    /// Create a new entry.
    pub fn new(name: impl Into<String>, mode: u32, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mode: mode & MODE_MASK,
            content,
        }
    }
}

/// Entry metadata read without decompressing its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Relative path inside the archive.
    pub name: String,
    /// Unix permission bits.
    pub mode: u32,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Compressed size in bytes.
    pub compressed_size: u64,
}

/// Builder for an in-memory archive.
///
/// Names are unique keys: adding a name that is already present replaces the
/// earlier entry in place and hands it back.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    entries: Vec<ArchiveEntry>,
}

impl ArchiveWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    ///
    /// Returns the entry it replaced, if the name was already present.
    pub fn add(&mut self, entry: ArchiveEntry) -> Result<Option<ArchiveEntry>> {
        if !is_flat_name(&entry.name) {
            return Err(PackError::InvalidName(entry.name));
        }

        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => Ok(Some(std::mem::replace(existing, entry))),
            None => {
                self.entries.push(entry);
                Ok(None)
            }
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries have been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in archive order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Serialize all entries into ZIP bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(DateTime::default())
                .unix_permissions(entry.mode & MODE_MASK);

            zip.start_file(entry.name.as_str(), options)
                .map_err(|e| PackError::Archive(e.to_string()))?;
            zip.write_all(&entry.content)?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| PackError::Archive(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

/// Convenience wrapper: pack entries into ZIP bytes.
pub fn pack(entries: impl IntoIterator<Item = ArchiveEntry>) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::new();
    for entry in entries {
        writer.add(entry)?;
    }
    writer.finish()
}

/// Reader over archive bytes.
#[derive(Debug)]
pub struct Archive {
    inner: ZipArchive<Cursor<Vec<u8>>>,
}

impl Archive {
    /// Open archive bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let inner =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| PackError::Archive(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Read metadata of the entry at `index`.
    pub fn info(&mut self, index: usize) -> Result<EntryInfo> {
        let file = self
            .inner
            .by_index_raw(index)
            .map_err(|e| PackError::Archive(e.to_string()))?;

        Ok(EntryInfo {
            name: file.name().to_string(),
            mode: file.unix_mode().map_or(DEFAULT_MODE, |m| m & MODE_MASK),
            size: file.size(),
            compressed_size: file.compressed_size(),
        })
    }

    /// Read the entry at `index`, including its content.
    ///
    /// Fails with [`PackError::InvalidName`] for names that would escape the
    /// extraction directory.
    pub fn entry(&mut self, index: usize) -> Result<ArchiveEntry> {
        let mut file = self
            .inner
            .by_index(index)
            .map_err(|e| PackError::Archive(e.to_string()))?;

        let name = file.name().to_string();
        if file.is_dir() || file.enclosed_name().is_none() {
            return Err(PackError::InvalidName(name));
        }

        let mode = file.unix_mode().map_or(DEFAULT_MODE, |m| m & MODE_MASK);
        let mut content = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut content)?;

        Ok(ArchiveEntry {
            name,
            mode,
            content,
        })
    }

    /// Read every entry, failing on the first unreadable one.
    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        (0..self.len()).map(|i| self.entry(i)).collect()
    }
}

/// Largest buffer reserved up front for an entry's content.
const MAX_PREALLOC: u64 = 1 << 20;

/// Buffer to reserve for an entry whose header claims `declared` bytes.
///
/// The header is untrusted; `read_to_end` grows the buffer past the cap.
fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// Whether `name` is a single, plain path component.
fn is_flat_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
