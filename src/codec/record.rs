//! Record definitions and string framing

use std::io::Read;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{BitcaskError, Result};

use super::ABSENT_LENGTH;

/// A single key/value record. `value == None` is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    pub key: String,
    pub value: Option<String>,
}

impl Record {
    pub fn new(key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            key: key.into(),
            value: value.map(Into::into),
        }
    }

    /// A record marking `key` as deleted
    pub fn tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Bytes this record occupies in a data file
    pub fn encoded_len(&self) -> u64 {
        record_size(&self.key, self.value.as_deref())
    }
}

/// Frame `s` into `out`: length in UTF-16 code units, then the code units
/// big-endian. `None` writes only the `-1` length.
pub fn write_string<B: BufMut>(out: &mut B, s: Option<&str>) {
    match s {
        Some(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            out.put_i32(units.len() as i32);
            for unit in units {
                out.put_u16(unit);
            }
        }
        None => out.put_i32(ABSENT_LENGTH),
    }
}

/// Inverse of [`write_string`]
pub fn read_string<R: Read>(input: &mut R) -> Result<Option<String>> {
    let mut len_bytes = [0u8; 4];
    input.read_exact(&mut len_bytes)?;
    let len = i32::from_be_bytes(len_bytes);

    if len == ABSENT_LENGTH {
        return Ok(None);
    }
    if len < 0 {
        return Err(BitcaskError::Corruption(format!(
            "negative string length {}",
            len
        )));
    }

    let mut payload = vec![0u8; len as usize * 2];
    input.read_exact(&mut payload)?;

    let mut buf = payload.as_slice();
    let mut units = Vec::with_capacity(len as usize);
    while buf.has_remaining() {
        units.push(buf.get_u16());
    }

    String::from_utf16(&units)
        .map(Some)
        .map_err(|e| BitcaskError::Corruption(format!("invalid UTF-16 payload: {}", e)))
}

/// Read one record (key then value) from `input`
pub fn read_record<R: Read>(input: &mut R) -> Result<Record> {
    let key = read_string(input)?
        .ok_or_else(|| BitcaskError::Corruption("record has an absent key".to_string()))?;
    let value = read_string(input)?;
    Ok(Record { key, value })
}

/// Bytes [`write_string`] produces for `s`
pub fn encoded_len(s: Option<&str>) -> u64 {
    match s {
        Some(s) => 4 + 2 * s.encode_utf16().count() as u64,
        None => 4,
    }
}

/// Bytes a whole record occupies
pub fn record_size(key: &str, value: Option<&str>) -> u64 {
    encoded_len(Some(key)) + encoded_len(value)
}

/// Encode a full record (key then value) into one buffer
pub fn encode_record(key: &str, value: Option<&str>) -> BytesMut {
    let mut buf = BytesMut::with_capacity(record_size(key, value) as usize);
    write_string(&mut buf, Some(key));
    write_string(&mut buf, value);
    buf
}
