//! Record Writer
//!
//! Append-only handle on a segment's data file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{BitcaskError, Result};

use super::encode_record;

/// Appends records to a data file
pub struct RecordWriter {
    /// Data file path (for error context)
    path: PathBuf,
    /// File opened in append mode
    file: File,
    /// Current end of the file == offset of the next record
    offset: u64,
}

impl RecordWriter {
    /// Open (creating if needed) a data file for appending
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(BitcaskError::at("open data file", path))?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            offset,
        })
    }

    /// Append a record, returning the offset it starts at
    ///
    /// The record is encoded up front and handed to the OS in a single
    /// write, so readers on other handles see it as soon as this returns.
    pub fn append(&mut self, key: &str, value: Option<&str>) -> Result<u64> {
        let encoded = encode_record(key, value);
        self.file
            .write_all(&encoded)
            .map_err(BitcaskError::at("append record", &self.path))?;

        let start = self.offset;
        self.offset += encoded.len() as u64;
        Ok(start)
    }

    /// Force data to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_data()
            .map_err(BitcaskError::at("sync data file", &self.path))
    }

    /// Bytes written so far (== file length)
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
