//! Sorted segment (SSTable)
//!
//! While mutable, writes land in an ordered in-memory buffer and nothing
//! touches the data file. Freezing writes the buffer out in key order and
//! persists a sparse index holding every `sparse_factor`-th key.
//!
//! Frozen lookups take the greatest indexed key not above the target, seek
//! to it and scan forward. The scan stops at the first key that is equal
//! (hit) or greater (miss), or at the end of the data.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{record_size, PositionalReader, Record, RecordWriter};
use crate::config::SegmentOptions;
use crate::error::{BitcaskError, Result};

use super::{
    data_path, parse_version, prepare_dir, read_all_records, replay_data_file, write_index,
    PeekableRecords, Segment, SegmentDir,
};

/// Segment with a sorted data file and a sparse index
pub struct SortedSegment {
    path: PathBuf,
    version: u64,
    sparse_factor: usize,
    /// Pending writes, flushed in order on freeze
    memtable: BTreeMap<String, Option<String>>,
    /// Sparse key → offset index (frozen only)
    index: BTreeMap<String, u64>,
    /// Append handle; `None` once frozen
    writer: Option<RecordWriter>,
    reader: PositionalReader,
    /// Buffered record bytes while mutable, data file length once frozen
    size: u64,
}

impl SortedSegment {
    /// Open a fresh lookahead sequence over the frozen data file
    pub fn iter(&self) -> Result<PeekableRecords> {
        PeekableRecords::open(&data_path(&self.path))
    }

    /// Number of keys held by the sparse index
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn sparse_factor(&self) -> usize {
        self.sparse_factor
    }

    fn scan_from(&self, offset: u64, key: &str) -> Result<Option<Record>> {
        let end = self.reader.len()?;
        let mut scan = self.reader.scan(offset);

        while scan.position() < end {
            let record = scan.read_next()?;
            match record.key.as_str().cmp(key) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Equal => return Ok(Some(record)),
                std::cmp::Ordering::Greater => return Ok(None),
            }
        }
        Ok(None)
    }
}

/// Keep every `factor`-th entry, starting with the first
fn sparsify(entries: Vec<(String, u64)>, factor: usize) -> BTreeMap<String, u64> {
    entries
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % factor == 0)
        .map(|(_, entry)| entry)
        .collect()
}

impl Segment for SortedSegment {
    fn open(path: &Path, options: &SegmentOptions) -> Result<Self> {
        let version = parse_version(path)?;
        let sparse_factor = options.sparse_factor.max(1);

        let (index, writer) = match prepare_dir(path)? {
            SegmentDir::Created => {
                let writer = RecordWriter::open(&data_path(path))?;
                (BTreeMap::new(), Some(writer))
            }
            SegmentDir::Indexed(entries) => (entries.into_iter().collect(), None),
            SegmentDir::Unindexed => {
                let entries = replay_data_file(path)?;
                let records = entries.len();
                let index = sparsify(entries, sparse_factor);
                write_index(path, &index)?;
                warn!(
                    version,
                    records,
                    "Rebuilt missing sparse index of sorted segment from its data file"
                );
                (index, None)
            }
        };

        let reader = PositionalReader::open(&data_path(path))?;
        let size = if writer.is_some() { 0 } else { reader.len()? };

        Ok(Self {
            path: path.to_path_buf(),
            version,
            sparse_factor,
            memtable: BTreeMap::new(),
            index,
            writer,
            reader,
            size,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn put(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        if self.writer.is_none() {
            return Err(BitcaskError::SegmentFrozen(self.path.clone()));
        }

        self.size += record_size(key, value);
        self.memtable
            .insert(key.to_string(), value.map(str::to_string));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Record>> {
        if !self.is_frozen() {
            return Ok(self.memtable.get(key).map(|value| Record {
                key: key.to_string(),
                value: value.clone(),
            }));
        }

        let floor = self
            .index
            .range::<str, _>((Bound::Unbounded, Bound::Included(key)))
            .next_back();

        match floor {
            Some((_, &offset)) => self.scan_from(offset, key),
            None => Ok(None),
        }
    }

    fn freeze(&mut self) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        let mut entries = Vec::with_capacity(self.memtable.len());
        for (key, value) in &self.memtable {
            let offset = writer.append(key, value.as_deref())?;
            entries.push((key.clone(), offset));
        }
        writer.sync()?;
        let size = writer.offset();

        let records = entries.len();
        self.index = sparsify(entries, self.sparse_factor);
        write_index(&self.path, &self.index)?;

        self.size = size;
        self.memtable.clear();
        self.writer = None;

        debug!(
            version = self.version,
            records,
            indexed = self.index.len(),
            bytes = self.size,
            "Froze sorted segment"
        );
        Ok(())
    }

    fn is_frozen(&self) -> bool {
        self.writer.is_none()
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn records(&self) -> Result<Vec<Record>> {
        if self.is_frozen() {
            return read_all_records(&self.path);
        }
        Ok(self
            .memtable
            .iter()
            .map(|(key, value)| Record {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}
