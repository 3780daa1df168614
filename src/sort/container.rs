//! On-disk sort containers
//!
//! A container holds one pre-sorted run of entries spilled from memory.
//! Record format:
//!
//! ```text
//! +------------------+
//! | Payload Length   | (u32 LE)
//! +------------------+
//! | Payload          | (JSON-encoded SortEntry)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of length + payload)
//! +------------------+
//! ```
//!
//! The backing file is deleted when the container is dropped.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::entry::SortEntry;
use super::errors::{SortError, SortResult};
use crate::storage::{compute_checksum, verify_checksum};

/// A spilled, sorted run of entries
#[derive(Debug)]
pub struct SortContainer {
    file: NamedTempFile,
    entries: usize,
}

impl SortContainer {
    /// Writes an already-sorted run to a new container file
    pub fn spill(dir: Option<&Path>, entries: &[SortEntry]) -> SortResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sort-").suffix(".container");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| SortError::io_error("Failed to create sort container", e))?;

        {
            let mut writer = BufWriter::new(file.as_file());
            for entry in entries {
                let payload = serde_json::to_vec(entry)
                    .map_err(|e| SortError::encoding_failed(e.to_string()))?;
                write_record(&mut writer, &payload)?;
            }
            writer
                .flush()
                .map_err(|e| SortError::io_error("Failed to flush sort container", e))?;
        }

        Ok(Self {
            file,
            entries: entries.len(),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of entries in the container
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Whether the container holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Opens a sequential reader over the container
    pub fn open(&self) -> SortResult<ContainerReader> {
        let file = File::open(self.path())
            .map_err(|e| SortError::io_error("Failed to open sort container", e))?;
        Ok(ContainerReader {
            reader: BufReader::new(file),
            remaining: self.entries,
        })
    }
}

fn write_record<W: Write>(writer: &mut W, payload: &[u8]) -> SortResult<()> {
    let length = (payload.len() as u32).to_le_bytes();
    let mut checksum_data = Vec::with_capacity(4 + payload.len());
    checksum_data.extend_from_slice(&length);
    checksum_data.extend_from_slice(payload);
    let checksum = compute_checksum(&checksum_data);

    writer
        .write_all(&checksum_data)
        .and_then(|_| writer.write_all(&checksum.to_le_bytes()))
        .map_err(|e| SortError::io_error("Failed to write sort container", e))
}

/// Sequential reader over one container
#[derive(Debug)]
pub struct ContainerReader {
    reader: BufReader<File>,
    remaining: usize,
}

impl ContainerReader {
    /// Reads the next entry, verifying its checksum
    pub fn next_entry(&mut self) -> SortResult<Option<SortEntry>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let mut length = [0u8; 4];
        self.read_exact(&mut length)?;
        let payload_len = u32::from_le_bytes(length) as usize;

        let mut checksum_data = Vec::with_capacity(4 + payload_len);
        checksum_data.extend_from_slice(&length);
        checksum_data.resize(4 + payload_len, 0);
        self.read_exact(&mut checksum_data[4..])?;

        let mut stored = [0u8; 4];
        self.read_exact(&mut stored)?;
        if !verify_checksum(&checksum_data, u32::from_le_bytes(stored)) {
            return Err(SortError::corruption("sort container record checksum mismatch"));
        }

        let entry = serde_json::from_slice(&checksum_data[4..])
            .map_err(|e| SortError::encoding_failed(e.to_string()))?;
        self.remaining -= 1;
        Ok(Some(entry))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> SortResult<()> {
        self.reader
            .read_exact(buf)
            .map_err(|e| SortError::io_error("Failed to read sort container", e))
    }
}
