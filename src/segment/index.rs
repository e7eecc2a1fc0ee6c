//! Index file persistence
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (bincode, 14 bytes)                              │
//! │   Magic: "BKIX" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Entries (variable)                                      │
//! │   [KeyLen: u32 BE][Key: UTF-8][Offset: u64 BE]          │
//! │   ... repeated Count times ...                          │
//! ├─────────────────────────────────────────────────────────┤
//! │ CRC32 of everything above: u32 BE (4)                   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//! The file is written to `index.tmp` and renamed into place, so a
//! directory either has a complete index or none at all.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{BitcaskError, Result};

use super::index_path;

/// Magic bytes identifying a bitcaskv index file
pub const INDEX_MAGIC: [u8; 4] = *b"BKIX";

/// Current index format version
pub const INDEX_FORMAT_VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Count (8)
const HEADER_SIZE: usize = 14;

/// Trailing checksum size
const CRC_SIZE: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
struct IndexHeader {
    magic: [u8; 4],
    format_version: u16,
    entry_count: u64,
}

/// Persist `entries` as the index of the segment in `dir`
pub fn write_index<'a, I>(dir: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a String, &'a u64)>,
    I::IntoIter: ExactSizeIterator,
{
    let entries = entries.into_iter();
    let header = IndexHeader {
        magic: INDEX_MAGIC,
        format_version: INDEX_FORMAT_VERSION,
        entry_count: entries.len() as u64,
    };

    let mut buf = BytesMut::new();
    buf.put_slice(&bincode::serialize(&header)?);
    for (key, offset) in entries {
        buf.put_u32(key.len() as u32);
        buf.put_slice(key.as_bytes());
        buf.put_u64(*offset);
    }
    let crc = crc32fast::hash(&buf);
    buf.put_u32(crc);

    let final_path = index_path(dir);
    let tmp_path = final_path.with_extension("tmp");

    let mut file = File::create(&tmp_path).map_err(BitcaskError::at("create index file", &tmp_path))?;
    file.write_all(&buf)
        .map_err(BitcaskError::at("write index file", &tmp_path))?;
    file.sync_all()
        .map_err(BitcaskError::at("sync index file", &tmp_path))?;
    drop(file);

    fs::rename(&tmp_path, &final_path).map_err(BitcaskError::at("install index file", &final_path))?;
    Ok(())
}

/// Load the index of the segment in `dir`, in the order it was written
pub fn read_index(dir: &Path) -> Result<Vec<(String, u64)>> {
    let path = index_path(dir);
    let bytes = fs::read(&path).map_err(BitcaskError::at("read index file", &path))?;

    let corrupt = |msg: &str| BitcaskError::Corruption(format!("{}: {}", path.display(), msg));

    if bytes.len() < HEADER_SIZE + CRC_SIZE {
        return Err(corrupt("index file too short"));
    }

    let (body, crc_bytes) = bytes.split_at(bytes.len() - CRC_SIZE);
    let stored_crc = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    if crc32fast::hash(body) != stored_crc {
        return Err(corrupt("index checksum mismatch"));
    }

    let mut cursor = body;
    let header: IndexHeader = bincode::deserialize_from(&mut cursor)?;
    if header.magic != INDEX_MAGIC {
        return Err(corrupt("bad index magic"));
    }
    if header.format_version != INDEX_FORMAT_VERSION {
        return Err(BitcaskError::Corruption(format!(
            "{}: unsupported index format version {}",
            path.display(),
            header.format_version
        )));
    }

    let mut entries = Vec::with_capacity(header.entry_count.min(1 << 20) as usize);
    for _ in 0..header.entry_count {
        if cursor.remaining() < 4 {
            return Err(corrupt("truncated index entry"));
        }
        let key_len = cursor.get_u32() as usize;
        if cursor.remaining() < key_len + 8 {
            return Err(corrupt("truncated index entry"));
        }
        let key = String::from_utf8(cursor[..key_len].to_vec())
            .map_err(|_| corrupt("index key is not UTF-8"))?;
        cursor.advance(key_len);
        let offset = cursor.get_u64();
        entries.push((key, offset));
    }

    if cursor.has_remaining() {
        return Err(corrupt("trailing bytes after index entries"));
    }

    Ok(entries)
}
