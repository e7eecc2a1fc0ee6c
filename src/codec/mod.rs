//! Record Codec Module
//!
//! Binary framing for key/value records inside a segment's `data` file.
//!
//! ## Responsibilities
//! - Encode strings as length-prefixed UTF-16 code units
//! - Mark tombstones with a `-1` length and no payload
//! - Append records and hand back their starting offset
//! - Read records sequentially or at a random byte offset
//! - Serve concurrent random reads through positional I/O
//!
//! ## Record Format
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │ Key                          │ Value                        │
//! │ ┌────────────┬─────────────┐ │ ┌────────────┬─────────────┐ │
//! │ │ Len i32 BE │ UTF-16 BE   │ │ │ Len i32 BE │ UTF-16 BE   │ │
//! │ │  (4)       │ (2 * Len)   │ │ │  (4)       │ (2 * Len)   │ │
//! │ └────────────┴─────────────┘ │ └────────────┴─────────────┘ │
//! └──────────────────────────────┴──────────────────────────────┘
//! Len = -1 → absent string (tombstone value), no payload follows
//! ```
//!
//! There is no checksum and no whole-record length: record boundaries are
//! only found by replaying from offset zero or by jumping to an offset taken
//! from an index.

mod reader;
mod record;
mod writer;

pub use reader::{PositionalReader, RecordReader, RecordScan};
pub use record::{
    encode_record, encoded_len, read_record, read_string, record_size, write_string, Record,
};
pub use writer::RecordWriter;

/// Length written in place of a string that is absent
pub(crate) const ABSENT_LENGTH: i32 = -1;
