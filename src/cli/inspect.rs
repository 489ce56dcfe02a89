//! Inspect command for examining carriers without running them.

use clap::Args;
use packzip::Error;
use packzip_format::archive::Archive;
use packzip_format::trailer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::format_mode;

/// Show the trailer layout and entry list of a carrier.
///
/// Examples:
///   packzip inspect bundle.exe
///   packzip inspect bundle.exe --json
#[derive(Args, Debug)]
pub struct InspectCmd {
    /// Carrier executable to inspect
    #[arg(value_name = "CARRIER")]
    pub carrier: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Layout and contents of a carrier.
#[derive(Debug, Serialize)]
pub struct CarrierInfo {
    /// Carrier path as given.
    pub image: PathBuf,
    /// Total image size in bytes.
    pub file_size: u64,
    /// Bytes before the trailer.
    pub host_size: u64,
    /// Offset of the encoded payload.
    pub payload_offset: u64,
    /// Length of the encoded payload.
    pub payload_len: u64,
    /// Offset of the marker.
    pub marker_offset: u64,
    /// Decoded archive size in bytes.
    pub archive_size: u64,
    /// CRC32 of the decoded archive, hex encoded.
    pub archive_crc32: String,
    /// Archive entries in order.
    pub entries: Vec<EntryRow>,
}

/// One archive entry.
#[derive(Debug, Serialize)]
pub struct EntryRow {
    /// Entry name.
    pub name: String,
    /// Permission bits in octal.
    pub mode: String,
    /// Uncompressed size.
    pub size: u64,
    /// Compressed size.
    pub compressed_size: u64,
}

impl InspectCmd {
    pub fn run(self) -> packzip::Result<()> {
        let info = read_carrier_info(&self.carrier)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
            return Ok(());
        }

        println!("Carrier: {}", info.image.display());
        println!("  Size:    {} bytes", info.file_size);
        println!("  Host:    {} bytes", info.host_size);
        println!(
            "  Payload: {} bytes at offset {}",
            info.payload_len, info.payload_offset
        );
        println!("  Marker:  offset {}", info.marker_offset);
        println!(
            "  Archive: {} bytes, crc32 {}",
            info.archive_size, info.archive_crc32
        );

        println!("\nEntries ({}):", info.entries.len());
        if info.entries.is_empty() {
            println!("  (none)");
            return Ok(());
        }
        println!("  {:<6} {:>10} {:>10}  NAME", "MODE", "SIZE", "PACKED");
        for entry in &info.entries {
            println!(
                "  {:<6} {:>10} {:>10}  {}",
                entry.mode, entry.size, entry.compressed_size, entry.name
            );
        }
        Ok(())
    }
}

/// Read the trailer geometry and entry table of the carrier at `path`.
pub fn read_carrier_info(path: &Path) -> packzip::Result<CarrierInfo> {
    let mut file = File::open(path).map_err(|e| Error::carrier(path, e.into()))?;
    let file_size = file
        .metadata()
        .map_err(|e| Error::carrier(path, e.into()))?
        .len();

    let location = trailer::locate_in(&mut file, file_size).map_err(|e| Error::carrier(path, e))?;
    let bytes =
        trailer::read_trailer(&mut file, file_size).map_err(|e| Error::carrier(path, e))?;

    let archive_size = bytes.len() as u64;
    let archive_crc32 = format!("{:08x}", packzip_format::crc32(&bytes));
    let mut archive = Archive::from_bytes(bytes).map_err(|e| Error::carrier(path, e))?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.info(index).map_err(|e| Error::carrier(path, e))?;
        entries.push(EntryRow {
            name: entry.name,
            mode: format_mode(entry.mode),
            size: entry.size,
            compressed_size: entry.compressed_size,
        });
    }

    Ok(CarrierInfo {
        image: path.to_path_buf(),
        file_size,
        host_size: location.host_len(),
        payload_offset: location.payload_offset,
        payload_len: location.payload_len,
        marker_offset: location.marker_offset,
        archive_size,
        archive_crc32,
        entries,
    })
}
