//! # bitcaskv
//!
//! An embedded, Bitcask-style log-structured key-value store with:
//! - Append-only segments, one directory per version
//! - Pluggable indexing: full hash index or sorted data with sparse index
//! - Background compaction that merges old segments into one
//! - Single-writer/multi-reader concurrency model
//! - Crash recovery by replaying the segment that lost its index
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │            (RwLock: put/remove/compact vs. get)              │
//! └───────┬─────────────────────┬───────────────────────┬───────┘
//!         │                     │                       │
//!         ▼                     ▼                       ▼
//!  ┌─────────────┐      ┌──────────────┐        ┌──────────────┐
//!  │   Active    │      │    Frozen    │        │  Compactor   │
//!  │  Segment    │      │   Segments   │◄───────│  (thread +   │
//!  │ (mutable)   │      │ (by version) │ merge  │   ticker)    │
//!  └──────┬──────┘      └──────┬───────┘        └──────────────┘
//!         │                    │
//!         ▼                    ▼
//!  ┌─────────────────────────────────────┐
//!  │  Record Codec  (data)   Index file  │
//!  └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod segment;
pub mod merge;
pub mod compaction;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::Record;
pub use config::{Config, SegmentOptions};
pub use error::{BitcaskError, Result};
pub use merge::{HashMerge, MergeStrategy, SortedMerge};
pub use segment::{HashSegment, Segment, SortedSegment};
pub use store::{HashStore, SortedStore, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of bitcaskv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
