//! File persistence over both codecs.
//!
//! Thin byte-stream wrappers: full write with flush + sync on save, full
//! read on load, stream released on every exit path. Codec failures fold
//! into `io::ErrorKind::InvalidData`; nothing here retries.

use crate::binary;
use crate::json;
use crate::schematic::Schematic;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// On-disk encoding of a schematic file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Compact,
    Json,
}

/// Sniff a file's encoding from its leading bytes. Anything that does not
/// open with the compact magic is assumed to be the structured-text form.
pub fn detect_format(path: &Path) -> io::Result<FileFormat> {
    let mut file = File::open(path)?;
    let mut head = [0u8; 4];
    match file.read_exact(&mut head) {
        Ok(()) if u32::from_be_bytes(head) == binary::COMPACT_MAGIC => Ok(FileFormat::Compact),
        Ok(()) => Ok(FileFormat::Json),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => Ok(FileFormat::Json),
        Err(error) => Err(error),
    }
}

pub fn save_compact_file<C>(path: &Path, schematic: &Schematic<C>) -> io::Result<()> {
    let bytes = binary::encode_compact(schematic)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    write_file(path, &bytes)
}

pub fn load_compact_file<C>(path: &Path) -> io::Result<Schematic<C>> {
    let bytes = read_file(path)?;
    binary::decode_compact(&bytes)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
}

pub fn save_json_file<C>(path: &Path, schematic: &Schematic<C>) -> io::Result<()> {
    let text = json::to_json_string(schematic)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    write_file(path, text.as_bytes())
}

pub fn load_json_file<C>(path: &Path) -> io::Result<Schematic<C>> {
    let bytes = read_file(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    json::from_json_str(&text)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
}

/// Load through whichever codec the file's leading bytes indicate.
pub fn load_file<C>(path: &Path) -> io::Result<Schematic<C>> {
    match detect_format(path)? {
        FileFormat::Compact => load_compact_file(path),
        FileFormat::Json => load_json_file(path),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|error| io::Error::new(io::ErrorKind::Other, error))?;
    file.sync_all()?;
    Ok(())
}

fn read_file(path: &Path) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}
