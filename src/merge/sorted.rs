//! K-way streaming merge for sorted segments

use crate::error::Result;
use crate::segment::{PeekableRecords, Segment, SortedSegment};

use super::MergeStrategy;

/// Merges sorted segments in one pass with one lookahead per input
///
/// Each round every sequence skips records whose key is not above the last
/// key written, leaving its smallest fresh key in the lookahead slot. The
/// smallest of those is written; on a tie the later (newer) sequence wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct SortedMerge;

/// Drop records with keys `<= last`, leaving the next candidate peeked
fn advance_past(sequence: &mut PeekableRecords, last: Option<&str>) -> Result<()> {
    loop {
        let stale = match (sequence.peek()?, last) {
            (Some(record), Some(last)) => record.key.as_str() <= last,
            _ => false,
        };
        if !stale {
            return Ok(());
        }
        sequence.next_record()?;
    }
}

impl MergeStrategy<SortedSegment> for SortedMerge {
    fn merge(&self, inputs: &[&SortedSegment], dest: &mut SortedSegment) -> Result<()> {
        let mut sequences = inputs
            .iter()
            .map(|segment| segment.iter())
            .collect::<Result<Vec<_>>>()?;

        let mut last_written: Option<String> = None;

        loop {
            for sequence in sequences.iter_mut() {
                advance_past(sequence, last_written.as_deref())?;
            }

            let mut winner: Option<usize> = None;
            for (i, sequence) in sequences.iter().enumerate() {
                let Some(candidate) = sequence.current() else {
                    continue;
                };
                let better = match winner.and_then(|w| sequences[w].current()) {
                    Some(best) => candidate.key <= best.key,
                    None => true,
                };
                if better {
                    winner = Some(i);
                }
            }

            let Some(i) = winner else {
                break;
            };

            let record = sequences[i].next_record()?;
            dest.put(&record.key, record.value.as_deref())?;
            last_written = Some(record.key);
        }

        dest.freeze()
    }
}
