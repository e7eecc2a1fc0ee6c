//! Tests for compaction
//!
//! These tests verify:
//! - Compaction preserves every visible value and tombstone
//! - Batches take the oldest original (odd) segments, at most N at a time
//! - The output version is the last input's version + 1
//! - Inputs are deleted from disk
//! - The background compactor runs on its own and stops on close

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use bitcaskv::segment::{has_index, Segment};
use bitcaskv::{
    Config, HashMerge, HashSegment, HashStore, MergeStrategy, SortedMerge, SortedSegment, Store,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// 32 bytes per record; three records fill a 64-byte segment
fn key(i: usize) -> String {
    format!("key{:02}", i)
}

fn value(i: usize) -> String {
    format!("value{:02}", i)
}

fn manual_config(dir: &Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .max_segment_size(64)
        .sparse_factor(2)
        .compaction_enabled(false)
        .build()
}

fn segment_dirs(dir: &Path) -> Vec<u64> {
    let mut versions: Vec<u64> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_str().unwrap().parse().unwrap())
        .collect();
    versions.sort_unstable();
    versions
}

/// Fill segments 1, 3, ..., 11 (frozen) and 13 (active)
fn fill<S: Segment, M: MergeStrategy<S>>(store: &Store<S, M>) {
    for i in 0..19 {
        store.put(&key(i), &value(i)).unwrap();
    }
    // Shadow a few values across segments
    store.put(&key(0), "updated").unwrap();
    store.remove(&key(4)).unwrap();
}

fn check_visible_state<S: Segment, M: MergeStrategy<S>>(store: &Store<S, M>) {
    assert_eq!(store.get(&key(0)).unwrap(), Some("updated".to_string()));
    assert_eq!(store.get(&key(4)).unwrap(), None);
    for i in (1..19).filter(|&i| i != 4) {
        assert_eq!(store.get(&key(i)).unwrap(), Some(value(i)), "key {}", i);
    }
}

fn check_compaction_preserves_state<S: Segment, M: MergeStrategy<S> + Default>() {
    let temp = TempDir::new().unwrap();
    let store: Store<S, M> = Store::open(manual_config(temp.path())).unwrap();
    fill(&store);

    let before = store.frozen_versions();
    assert_eq!(before, vec![1, 3, 5, 7, 9, 11]);

    // Oldest four originals merge into 7 + 1
    assert_eq!(store.compact().unwrap(), Some(8));
    assert_eq!(store.frozen_versions(), vec![8, 9, 11]);
    check_visible_state(&store);

    // Remaining originals
    assert_eq!(store.compact().unwrap(), Some(12));
    assert_eq!(store.frozen_versions(), vec![8, 12]);
    check_visible_state(&store);

    // Nothing original left behind the active segment
    assert_eq!(store.compact().unwrap(), None);

    store.close().unwrap();

    // Survives a reopen
    let store: Store<S, M> = Store::open(manual_config(temp.path())).unwrap();
    assert_eq!(store.frozen_versions(), vec![8, 12, 13]);
    assert_eq!(store.active_version(), 15);
    check_visible_state(&store);
}

// =============================================================================
// Shared Contract Tests
// =============================================================================

#[test]
fn test_hash_compaction_preserves_state() {
    check_compaction_preserves_state::<HashSegment, HashMerge>();
}

#[test]
fn test_sorted_compaction_preserves_state() {
    check_compaction_preserves_state::<SortedSegment, SortedMerge>();
}

// =============================================================================
// Batch Selection Tests
// =============================================================================

#[test]
fn test_compaction_needs_two_originals() {
    let temp = TempDir::new().unwrap();
    let store = HashStore::open(manual_config(temp.path())).unwrap();

    assert_eq!(store.compact().unwrap(), None);

    for i in 0..4 {
        store.put(&key(i), &value(i)).unwrap();
    }
    assert_eq!(store.frozen_versions(), vec![1]);
    assert_eq!(store.compact().unwrap(), None);
    assert_eq!(store.frozen_versions(), vec![1]);
}

#[test]
fn test_compaction_respects_batch_limit() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        max_segments_per_compaction: 2,
        ..manual_config(temp.path())
    };
    let store = HashStore::open(config).unwrap();
    fill(&store);

    assert_eq!(store.compact().unwrap(), Some(4));
    assert_eq!(store.frozen_versions(), vec![4, 5, 7, 9, 11]);
    assert_eq!(store.compact().unwrap(), Some(8));
    assert_eq!(store.frozen_versions(), vec![4, 8, 9, 11]);
    check_visible_state(&store);
}

#[test]
fn test_compaction_never_touches_active_segment() {
    let temp = TempDir::new().unwrap();
    let store = HashStore::open(manual_config(temp.path())).unwrap();
    fill(&store);
    let active = store.active_version();

    while store.compact().unwrap().is_some() {}

    assert_eq!(store.active_version(), active);
    assert!(store.frozen_versions().iter().all(|&v| v < active));
    store.put("after", "compaction").unwrap();
    assert_eq!(store.get("after").unwrap(), Some("compaction".to_string()));
}

// =============================================================================
// On-Disk Effects
// =============================================================================

#[test]
fn test_compaction_deletes_inputs() {
    let temp = TempDir::new().unwrap();
    let store = HashStore::open(manual_config(temp.path())).unwrap();
    fill(&store);

    store.compact().unwrap();

    assert_eq!(segment_dirs(temp.path()), vec![8, 9, 11, 13]);
    assert!(has_index(&temp.path().join("8")));
}

#[test]
fn test_compaction_replaces_stale_destination() {
    let temp = TempDir::new().unwrap();
    let store = HashStore::open(manual_config(temp.path())).unwrap();
    for i in 0..9 {
        store.put(&key(i), &value(i)).unwrap();
    }
    assert_eq!(store.frozen_versions(), vec![1, 3]);

    // Left behind by a compaction that died after creating its directory
    let stale = temp.path().join("4");
    fs::create_dir(&stale).unwrap();
    fs::write(stale.join("junk"), b"leftover").unwrap();

    assert_eq!(store.compact().unwrap(), Some(4));

    assert!(!stale.join("junk").exists());
    assert!(has_index(&stale));
    for i in 0..9 {
        assert_eq!(store.get(&key(i)).unwrap(), Some(value(i)));
    }
}

// =============================================================================
// Background Compaction
// =============================================================================

#[test]
fn test_background_compaction_runs() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        compaction_enabled: true,
        compaction_interval: Duration::from_millis(20),
        ..manual_config(temp.path())
    };
    let store = HashStore::open(config).unwrap();
    fill(&store);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !store.frozen_versions().iter().any(|v| v % 2 == 0) {
        assert!(Instant::now() < deadline, "compactor never caught up");
        thread::sleep(Duration::from_millis(10));
    }

    check_visible_state(&store);
    store.close().unwrap();
}

#[test]
fn test_close_stops_background_compaction() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        compaction_enabled: true,
        compaction_interval: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(2),
        ..manual_config(temp.path())
    };
    let store = HashStore::open(config).unwrap();
    store.put("k", "v").unwrap();

    let started = Instant::now();
    store.close().unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(store.is_closed());

    // Directory is stable once closed
    let dirs = segment_dirs(temp.path());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(segment_dirs(temp.path()), dirs);
}

#[test]
fn test_reopen_removes_leftover_inputs() {
    let temp = TempDir::new().unwrap();
    {
        let store = HashStore::open(manual_config(temp.path())).unwrap();
        fill(&store);
        // Newer values for keys held by the inputs of the first compaction
        store.put(&key(1), "newer").unwrap();
        assert_eq!(store.compact().unwrap(), Some(8));
        store.close().unwrap();
    }

    // An input that survived its compaction, e.g. a failed delete
    let leftover = temp.path().join("3");
    {
        let mut segment =
            HashSegment::open(&leftover, &bitcaskv::SegmentOptions::default()).unwrap();
        segment.put(&key(1), Some("stale")).unwrap();
        segment.freeze().unwrap();
    }

    let store = HashStore::open(manual_config(temp.path())).unwrap();

    assert!(!leftover.exists());
    assert!(!store.frozen_versions().contains(&3));
    assert_eq!(store.get(&key(1)).unwrap(), Some("newer".to_string()));
}
