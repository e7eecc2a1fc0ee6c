//! Store Module
//!
//! The orchestrator that owns every segment and routes operations.
//!
//! ## Responsibilities
//! - Recover segments from the store directory on open
//! - Route writes to the active segment, rolling over when it is full
//! - Search active → newest frozen → oldest frozen on reads
//! - Compact the oldest original segments into one, in the background
//!
//! ## Versioning
//! ```text
//!   originals:   1   3   5   7   9  11 ...   (odd, increasing)
//!   compacting 1,3,5,7 ──────────► 8        (last input + 1, even)
//!   order:       8 < 9 < 11 < ...           (higher version = newer)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::compaction::Compactor;
use crate::config::{Config, SegmentOptions};
use crate::error::{BitcaskError, Result};
use crate::merge::{HashMerge, MergeStrategy, SortedMerge};
use crate::segment::{has_index, parse_version, HashSegment, Segment, SortedSegment};

/// Store backed by hash-indexed segments
pub type HashStore = Store<HashSegment, HashMerge>;

/// Store backed by sorted segments (SSTables)
pub type SortedStore = Store<SortedSegment, SortedMerge>;

/// An embedded Bitcask-style key-value store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader
///
/// - **Writes** (put/remove/compact): exclusive lock on the segment set
///   - Rollover only ever happens here
/// - **Reads** (get): shared lock, never mutate the segment set
/// - **Compaction thread**: takes the same exclusive lock per tick
pub struct Store<S: Segment, M: MergeStrategy<S>> {
    inner: Arc<StoreInner<S, M>>,

    /// Background compaction thread, if enabled and not yet stopped
    compactor: Mutex<Option<Compactor>>,
}

struct StoreInner<S: Segment, M: MergeStrategy<S>> {
    config: Config,
    options: SegmentOptions,
    merge: M,
    state: RwLock<StoreState<S>>,
}

struct StoreState<S> {
    /// Frozen segments keyed by version
    frozen: BTreeMap<u64, S>,

    /// The only segment accepting writes; newer than everything in `frozen`
    active: S,

    closed: bool,
}

impl<S: Segment, M: MergeStrategy<S> + Default> Store<S, M> {
    /// Open or create a store using the variant's default merge strategy
    pub fn open(config: Config) -> Result<Self> {
        Self::with_merge(config, M::default())
    }

    /// Open with default config in the given directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }
}

impl<S: Segment, M: MergeStrategy<S>> Store<S, M> {
    /// Open or create a store with an explicit merge strategy
    ///
    /// On startup:
    /// 1. Create the store directory if needed
    /// 2. Recover one segment per version-named subdirectory
    /// 3. Start a fresh active segment at the next odd version
    /// 4. Start the compaction thread unless disabled
    pub fn with_merge(config: Config, merge: M) -> Result<Self> {
        config.validate()?;
        let options = config.segment_options();
        let dir = config.data_dir.clone();

        fs::create_dir_all(&dir).map_err(BitcaskError::at("create store directory", &dir))?;

        let frozen = recover_segments::<S>(&dir, &options)?;

        // Next odd version above everything on disk
        let active_version = match frozen.keys().next_back() {
            Some(&highest) if highest % 2 == 1 => highest + 2,
            Some(&highest) => highest + 1,
            None => 1,
        };
        let active = create_segment::<S>(&dir, active_version, &options)?;

        info!(
            dir = %dir.display(),
            segments = frozen.len(),
            active_version,
            "Store opened"
        );

        let inner = Arc::new(StoreInner {
            config,
            options,
            merge,
            state: RwLock::new(StoreState {
                frozen,
                active,
                closed: false,
            }),
        });

        let compactor = if inner.config.compaction_enabled {
            let job_inner = Arc::clone(&inner);
            Some(Compactor::spawn(inner.config.compaction_interval, move || {
                job_inner.compact()
            })?)
        } else {
            None
        };

        Ok(Self {
            inner,
            compactor: Mutex::new(compactor),
        })
    }

    /// Put a key-value pair
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, Some(value))
    }

    /// Remove a key by writing a tombstone
    pub fn remove(&self, key: &str) -> Result<()> {
        self.write(key, None)
    }

    /// Write `value` for `key`; `None` is a deletion
    pub fn write(&self, key: &str, value: Option<&str>) -> Result<()> {
        let mut state = self.inner.state.write();
        if state.closed {
            return Err(BitcaskError::Closed);
        }

        self.inner.roll_over_if_full(&mut state)?;
        state.active.put(key, value)
    }

    /// Get the current value of a key
    ///
    /// Search order:
    /// 1. Active segment
    /// 2. Frozen segments, newest version first
    ///
    /// The first segment holding the key decides; a tombstone there means
    /// `None` even if older segments still carry a value.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.inner.state.read();
        if state.closed {
            return Err(BitcaskError::Closed);
        }

        if let Some(record) = state.active.get(key)? {
            return Ok(record.value);
        }

        for segment in state.frozen.values().rev() {
            if let Some(record) = segment.get(key)? {
                return Ok(record.value);
            }
        }

        Ok(None)
    }

    /// Merge the oldest original segments into one
    ///
    /// Returns the version of the segment produced, or `None` when fewer
    /// than two original segments are available.
    pub fn compact(&self) -> Result<Option<u64>> {
        self.inner.compact()
    }

    /// Close the store
    ///
    /// Stops the compaction thread (waiting at most `shutdown_timeout`),
    /// then freezes every segment so all indexes are on disk. Every call
    /// after the first fails with `BitcaskError::Closed`.
    pub fn close(&self) -> Result<()> {
        if let Some(compactor) = self.compactor.lock().take() {
            compactor.stop(self.inner.config.shutdown_timeout);
        }

        let mut state = self.inner.state.write();
        if state.closed {
            return Err(BitcaskError::Closed);
        }
        state.closed = true;

        let mut result = state.active.freeze();
        for segment in state.frozen.values_mut() {
            let frozen = segment.freeze();
            if result.is_ok() {
                result = frozen;
            }
        }

        info!(dir = %self.inner.config.data_dir.display(), "Store closed");
        result
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn is_closed(&self) -> bool {
        self.inner.state.read().closed
    }

    /// Versions of all frozen segments, ascending
    pub fn frozen_versions(&self) -> Vec<u64> {
        self.inner.state.read().frozen.keys().copied().collect()
    }

    /// Version of the segment currently accepting writes
    pub fn active_version(&self) -> u64 {
        self.inner.state.read().active.version()
    }

    /// Frozen segments plus the active one
    pub fn segment_count(&self) -> usize {
        self.inner.state.read().frozen.len() + 1
    }

    /// Total data bytes across all segments
    pub fn total_size(&self) -> u64 {
        let state = self.inner.state.read();
        state.active.size() + state.frozen.values().map(Segment::size).sum::<u64>()
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.config.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl<S: Segment, M: MergeStrategy<S>> Drop for Store<S, M> {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            error!(error = %e, "Failed to close store on drop");
        }
    }
}

impl<S: Segment, M: MergeStrategy<S>> StoreInner<S, M> {
    /// Freeze the active segment and start the next one if it is over
    /// the size limit. Called with the write lock held.
    fn roll_over_if_full(&self, state: &mut StoreState<S>) -> Result<()> {
        if state.active.size() <= self.config.max_segment_size {
            return Ok(());
        }

        let old_version = state.active.version();
        let new_version = old_version + 2;

        // Freeze first: if opening the next segment fails, the next write
        // retries the whole rollover and freeze is a no-op the second time
        state.active.freeze()?;
        let next = create_segment::<S>(&self.config.data_dir, new_version, &self.options)?;

        let old = std::mem::replace(&mut state.active, next);
        state.frozen.insert(old_version, old);

        debug!(old_version, new_version, "Rolled over active segment");
        Ok(())
    }

    fn compact(&self) -> Result<Option<u64>> {
        let mut state = self.state.write();
        if state.closed {
            return Err(BitcaskError::Closed);
        }

        let batch: Vec<u64> = state
            .frozen
            .keys()
            .copied()
            .filter(|version| version % 2 == 1)
            .take(self.config.max_segments_per_compaction)
            .collect();

        let Some(&last) = batch.last() else {
            return Ok(None);
        };
        if batch.len() < 2 {
            return Ok(None);
        }

        let target = last + 1;
        let mut dest = create_segment::<S>(&self.config.data_dir, target, &self.options)?;
        let dest_path = dest.path().to_path_buf();
        let inputs: Vec<&S> = batch
            .iter()
            .filter_map(|version| state.frozen.get(version))
            .collect();
        let size_before: u64 = inputs.iter().map(|segment| segment.size()).sum();

        if let Err(e) = self.merge.merge(&inputs, &mut dest) {
            drop(dest);
            if let Err(cleanup) = fs::remove_dir_all(&dest_path) {
                warn!(error = %cleanup, path = %dest_path.display(), "Failed to remove partial compaction output");
            }
            return Err(e);
        }
        let size_after = dest.size();

        state.frozen.insert(target, dest);
        for version in &batch {
            if let Some(segment) = state.frozen.remove(version) {
                let path = segment.path().to_path_buf();
                drop(segment);
                fs::remove_dir_all(&path).map_err(BitcaskError::at("delete compacted segment", &path))?;
            }
        }

        info!(
            inputs = ?batch,
            output = target,
            size_before,
            size_after,
            "Compacted segments"
        );
        Ok(Some(target))
    }
}

/// Directory of the segment with `version`
fn segment_path(dir: &Path, version: u64) -> PathBuf {
    dir.join(version.to_string())
}

/// Open a new, empty, mutable segment at `version`
///
/// Versions handed out here are above everything recovered at open, so an
/// existing directory can only be left over from an earlier attempt that
/// failed part way (a rollover or compaction); nothing readable lives in
/// it and it is replaced. A failed open removes what it created.
fn create_segment<S: Segment>(dir: &Path, version: u64, options: &SegmentOptions) -> Result<S> {
    let path = segment_path(dir, version);
    if path.exists() {
        warn!(version, "Removing leftover directory of an unfinished segment");
        fs::remove_dir_all(&path).map_err(BitcaskError::at("remove stale segment", &path))?;
    }

    match S::open(&path, options) {
        Ok(segment) if !segment.is_frozen() => Ok(segment),
        Ok(_) => Err(BitcaskError::Corruption(format!(
            "new segment {} opened read-only",
            path.display()
        ))),
        Err(e) => {
            if path.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&path) {
                    warn!(error = %cleanup, path = %path.display(), "Failed to remove partial segment");
                }
            }
            Err(e)
        }
    }
}

/// Open every segment directory under `dir`
///
/// Only one original (odd) segment may lack an index: the one that was
/// active when the process died. It is rebuilt from its data file. An
/// even segment without an index is the output of an interrupted
/// compaction whose inputs are all still present, so it is discarded.
/// Originals older than a finished compaction output are its leftover
/// inputs and are deleted, as are segments without any records.
fn recover_segments<S: Segment>(dir: &Path, options: &SegmentOptions) -> Result<BTreeMap<u64, S>> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(BitcaskError::at("list store directory", dir))? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        found.push((parse_version(&path)?, path));
    }
    found.sort();

    let mut unindexed = Vec::new();
    let mut to_open = Vec::with_capacity(found.len());

    for (version, path) in found {
        if !has_index(&path) {
            if version % 2 == 0 {
                warn!(version, "Discarding unfinished compaction output");
                fs::remove_dir_all(&path)
                    .map_err(BitcaskError::at("remove unfinished segment", &path))?;
                continue;
            }
            unindexed.push(version);
        }
        to_open.push((version, path));
    }

    // Compaction always takes the oldest originals, so an original below a
    // finished compaction output is an input that was never deleted
    let newest_compacted = to_open
        .iter()
        .map(|(version, _)| *version)
        .filter(|version| version % 2 == 0)
        .max();
    if let Some(newest_compacted) = newest_compacted {
        let mut kept = Vec::with_capacity(to_open.len());
        for (version, path) in to_open {
            if version % 2 == 1 && version < newest_compacted {
                warn!(version, newest_compacted, "Removing leftover compaction input");
                fs::remove_dir_all(&path)
                    .map_err(BitcaskError::at("delete compacted segment", &path))?;
                unindexed.retain(|&v| v != version);
                continue;
            }
            kept.push((version, path));
        }
        to_open = kept;
    }

    if unindexed.len() > 1 {
        return Err(BitcaskError::Corruption(format!(
            "segments {:?} in {} have no index; at most one may be unindexed",
            unindexed,
            dir.display()
        )));
    }

    let mut recovered = BTreeMap::new();
    for (version, path) in to_open {
        let segment = S::open(&path, options)?;
        if segment.size() == 0 {
            // Holds no records: typically the active segment of a session
            // that only read
            drop(segment);
            fs::remove_dir_all(&path).map_err(BitcaskError::at("remove empty segment", &path))?;
            debug!(version, "Removed empty segment");
            continue;
        }
        debug!(version, bytes = segment.size(), "Recovered segment");
        recovered.insert(version, segment);
    }
    Ok(recovered)
}
