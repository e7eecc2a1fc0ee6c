//! Peekable record sequence
//!
//! Sequential traversal of a frozen data file with one record of lookahead.

use std::path::Path;

use crate::codec::{Record, RecordReader};
use crate::error::{BitcaskError, Result};

/// Lookahead sequence over a data file, starting at offset zero
///
/// Not rewindable: open a new one to start over.
pub struct PeekableRecords {
    reader: RecordReader,
    /// Data length when the sequence was opened
    end: u64,
    /// Record read ahead by `peek`
    peeked: Option<Record>,
}

impl PeekableRecords {
    pub fn open(data_path: &Path) -> Result<Self> {
        let reader = RecordReader::open(data_path)?;
        let end = reader.len()?;
        Ok(Self {
            reader,
            end,
            peeked: None,
        })
    }

    /// Next record without consuming it
    pub fn peek(&mut self) -> Result<Option<&Record>> {
        if self.peeked.is_none() && self.reader.position() < self.end {
            self.peeked = Some(self.reader.read_next()?);
        }
        Ok(self.peeked.as_ref())
    }

    /// Record currently held in the lookahead slot, if any
    pub fn current(&self) -> Option<&Record> {
        self.peeked.as_ref()
    }

    pub fn has_next(&self) -> bool {
        self.peeked.is_some() || self.reader.position() < self.end
    }

    /// Consume the next record
    ///
    /// Returns the record a preceding `peek` showed, if there was one.
    pub fn next_record(&mut self) -> Result<Record> {
        if let Some(record) = self.peeked.take() {
            return Ok(record);
        }
        if self.reader.position() >= self.end {
            return Err(BitcaskError::SequenceExhausted);
        }
        self.reader.read_next()
    }
}

impl Iterator for PeekableRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_record())
    }
}
