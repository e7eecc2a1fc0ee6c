//! Merge Module
//!
//! Compaction algorithms: each one streams several frozen segments into a
//! single fresh segment.
//!
//! ## Contract
//! - `inputs` are frozen and ordered by ascending version (oldest first)
//! - `dest` is empty and mutable; it comes back populated and frozen
//! - inputs are left untouched; the caller deletes them afterwards
//! - for every key the newest input's record wins, tombstones included

mod hash;
mod sorted;

use crate::error::Result;
use crate::segment::Segment;

pub use hash::HashMerge;
pub use sorted::SortedMerge;

/// Compaction algorithm for one segment variant
pub trait MergeStrategy<S: Segment>: Send + Sync + 'static {
    fn merge(&self, inputs: &[&S], dest: &mut S) -> Result<()>;
}
