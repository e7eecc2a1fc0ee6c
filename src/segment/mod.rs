//! Segment Module
//!
//! One log-structured unit of the store: a directory named after its
//! version, holding an append-only `data` file and a persisted `index`.
//!
//! ## Lifecycle
//! ```text
//!   open(new dir) ──► Mutable ──freeze()──► Frozen
//!                                             ▲
//!   open(dir with index) ─────────────────────┤
//!   open(dir without index) ── replay data ───┘
//! ```
//! Freezing is one-way and idempotent.
//!
//! ## Variants
//! - [`HashSegment`]: full key → offset map, O(1) lookups
//! - [`SortedSegment`]: sorted in-memory buffer while mutable, sorted data
//!   file plus sparse index once frozen

mod hash;
mod index;
mod iterator;
mod sorted;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::codec::{Record, RecordReader};
use crate::config::SegmentOptions;
use crate::error::{BitcaskError, Result};

pub use hash::HashSegment;
pub use index::{read_index, write_index, INDEX_FORMAT_VERSION, INDEX_MAGIC};
pub use iterator::PeekableRecords;
pub use sorted::SortedSegment;

/// Name of the append-only record file inside a segment directory
pub const DATA_FILE_NAME: &str = "data";

/// Name of the persisted index inside a segment directory
pub const INDEX_FILE_NAME: &str = "index";

/// Contract shared by every segment variant
///
/// The store owns segments exclusively and mediates concurrency with its
/// own reader/writer lock, so mutation takes `&mut self` and lookups take
/// `&self`.
pub trait Segment: Send + Sync + Sized + 'static {
    /// Open the segment backed by `path`.
    ///
    /// A missing directory is created and yields an empty mutable segment.
    /// An existing directory yields a frozen segment: its index is read back,
    /// or rebuilt by replaying the data file when no index was persisted.
    fn open(path: &Path, options: &SegmentOptions) -> Result<Self>;

    /// Directory backing this segment
    fn path(&self) -> &Path;

    /// Version parsed from the directory name
    fn version(&self) -> u64;

    /// Record `key` → `value`; `None` writes a tombstone
    fn put(&mut self, key: &str, value: Option<&str>) -> Result<()>;

    /// Most recent record for `key` in this segment
    fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Flush buffered state, persist the index and drop the write handle
    fn freeze(&mut self) -> Result<()>;

    fn is_frozen(&self) -> bool;

    /// Data size in bytes, used for rollover decisions
    fn size(&self) -> u64;

    /// All records in data file order
    fn records(&self) -> Result<Vec<Record>>;
}

/// Parse a segment version from its directory name
/// "42" → 42; only the canonical spelling is accepted ("042", "+42" are not)
pub fn parse_version(path: &Path) -> Result<u64> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| {
            let version: u64 = name.parse().ok()?;
            (version.to_string() == name).then_some(version)
        })
        .ok_or_else(|| BitcaskError::InvalidSegmentDir(path.to_path_buf()))
}

pub fn data_path(dir: &Path) -> PathBuf {
    dir.join(DATA_FILE_NAME)
}

pub fn index_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE_NAME)
}

/// Whether a segment directory carries a persisted index
pub fn has_index(dir: &Path) -> bool {
    index_path(dir).is_file()
}

/// What `open` found on disk
pub(crate) enum SegmentDir {
    /// Directory did not exist and was created
    Created,
    /// Directory existed with a persisted index
    Indexed(Vec<(String, u64)>),
    /// Directory existed without an index (unclean shutdown)
    Unindexed,
}

/// Inspect (or create) a segment directory ahead of opening it
pub(crate) fn prepare_dir(path: &Path) -> Result<SegmentDir> {
    if !path.exists() {
        fs::create_dir(path).map_err(BitcaskError::at("create segment directory", path))?;
        return Ok(SegmentDir::Created);
    }

    if !path.is_dir() {
        return Err(BitcaskError::InvalidSegmentDir(path.to_path_buf()));
    }

    if has_index(path) {
        Ok(SegmentDir::Indexed(read_index(path)?))
    } else {
        Ok(SegmentDir::Unindexed)
    }
}

/// Replay a data file from offset zero
///
/// Returns every record's key and starting offset in file order. A torn
/// record at the tail (the process died mid-append) is cut off so the file
/// ends on a record boundary again.
pub(crate) fn replay_data_file(dir: &Path) -> Result<Vec<(String, u64)>> {
    let path = data_path(dir);
    if !path.exists() {
        fs::File::create(&path).map_err(BitcaskError::at("create data file", &path))?;
        return Ok(Vec::new());
    }

    let mut reader = RecordReader::open(&path)?;
    let len = reader.len()?;
    let mut entries = Vec::new();

    while reader.position() < len {
        let offset = reader.position();
        match reader.read_next() {
            Ok(record) => entries.push((record.key, offset)),
            Err(BitcaskError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!(
                    path = %path.display(),
                    offset,
                    len,
                    "Truncating torn record at end of data file"
                );
                let file = fs::OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .map_err(BitcaskError::at("truncate data file", &path))?;
                file.set_len(offset)
                    .map_err(BitcaskError::at("truncate data file", &path))?;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(entries)
}

/// Read every record of a data file in order
pub(crate) fn read_all_records(dir: &Path) -> Result<Vec<Record>> {
    let mut reader = RecordReader::open(&data_path(dir))?;
    let mut records = Vec::new();
    while reader.can_read()? {
        records.push(reader.read_next()?);
    }
    Ok(records)
}
