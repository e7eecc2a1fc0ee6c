//! Last-writer-wins merge for hash-indexed segments

use std::collections::HashMap;

use crate::error::{BitcaskError, Result};
use crate::segment::{HashSegment, Segment};

use super::MergeStrategy;

/// Merges hash segments by picking, per key, the newest segment holding it
///
/// Output order in the destination data file is unspecified.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashMerge;

impl MergeStrategy<HashSegment> for HashMerge {
    fn merge(&self, inputs: &[&HashSegment], dest: &mut HashSegment) -> Result<()> {
        // Inputs are oldest first, so later inserts overwrite older winners
        let mut winners: HashMap<&str, &HashSegment> = HashMap::new();
        for &segment in inputs {
            for key in segment.keys() {
                winners.insert(key, segment);
            }
        }

        for (key, segment) in winners {
            let record = segment.get(key)?.ok_or_else(|| {
                BitcaskError::Corruption(format!(
                    "key {:?} indexed but unreadable in {}",
                    key,
                    segment.path().display()
                ))
            })?;
            dest.put(key, record.value.as_deref())?;
        }

        dest.freeze()
    }
}
