//! Hash-indexed segment
//!
//! Every key maps to the offset of its latest record in the data file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{PositionalReader, Record, RecordWriter};
use crate::config::SegmentOptions;
use crate::error::{BitcaskError, Result};

use super::{
    data_path, parse_version, prepare_dir, read_all_records, replay_data_file, write_index,
    Segment, SegmentDir,
};

/// Segment with a full in-memory key → offset index
///
/// ## Lookups
/// One hash lookup plus one random read at the stored offset.
pub struct HashSegment {
    path: PathBuf,
    version: u64,
    /// Key → offset of its latest record
    index: HashMap<String, u64>,
    /// Append handle; `None` once frozen
    writer: Option<RecordWriter>,
    /// Positional read handle shared by concurrent lookups
    reader: PositionalReader,
    /// Data file length after freezing
    frozen_size: u64,
}

impl HashSegment {
    /// Keys present in this segment (tombstoned keys included)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Segment for HashSegment {
    fn open(path: &Path, _options: &SegmentOptions) -> Result<Self> {
        let version = parse_version(path)?;

        let (index, writer) = match prepare_dir(path)? {
            SegmentDir::Created => {
                let writer = RecordWriter::open(&data_path(path))?;
                (HashMap::new(), Some(writer))
            }
            SegmentDir::Indexed(entries) => (entries.into_iter().collect(), None),
            SegmentDir::Unindexed => {
                // Later records overwrite earlier ones for the same key
                let index: HashMap<String, u64> = replay_data_file(path)?.into_iter().collect();
                write_index(path, &index)?;
                warn!(
                    version,
                    keys = index.len(),
                    "Rebuilt missing index of hash segment from its data file"
                );
                (index, None)
            }
        };

        let reader = PositionalReader::open(&data_path(path))?;
        let frozen_size = reader.len()?;

        Ok(Self {
            path: path.to_path_buf(),
            version,
            index,
            writer,
            reader,
            frozen_size,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn put(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| BitcaskError::SegmentFrozen(self.path.clone()))?;

        let offset = writer.append(key, value)?;
        self.index.insert(key.to_string(), offset);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Record>> {
        let offset = match self.index.get(key) {
            Some(&offset) => offset,
            None => return Ok(None),
        };

        let record = self.reader.read_at(offset)?;
        if record.key != key {
            return Err(BitcaskError::Corruption(format!(
                "index of {} points at key {:?} for {:?}",
                self.path.display(),
                record.key,
                key
            )));
        }
        Ok(Some(record))
    }

    fn freeze(&mut self) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        writer.sync()?;
        let size = writer.offset();
        write_index(&self.path, &self.index)?;

        self.frozen_size = size;
        self.writer = None;

        debug!(
            version = self.version,
            keys = self.index.len(),
            bytes = self.frozen_size,
            "Froze hash segment"
        );
        Ok(())
    }

    fn is_frozen(&self) -> bool {
        self.writer.is_none()
    }

    fn size(&self) -> u64 {
        match &self.writer {
            Some(writer) => writer.offset(),
            None => self.frozen_size,
        }
    }

    fn records(&self) -> Result<Vec<Record>> {
        read_all_records(&self.path)
    }
}
