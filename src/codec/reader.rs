//! Record Reader
//!
//! Sequential and random-access reads over a segment's data file.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{BitcaskError, Result};

use super::{read_record, Record};

/// Reads records from a data file
///
/// Keeps its own cursor; callers check [`RecordReader::can_read`] before
/// reading since running off the end is an error.
pub struct RecordReader {
    /// Data file path (for error context)
    path: PathBuf,
    /// Buffered read handle
    file: BufReader<File>,
    /// Offset of the next record to read
    position: u64,
}

impl RecordReader {
    /// Open a data file for reading, positioned at offset zero
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(BitcaskError::at("open data file", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the record at the cursor and advance past it
    pub fn read_next(&mut self) -> Result<Record> {
        let record = read_record(&mut self.file).map_err(|e| locate(e, self.position, &self.path))?;
        self.position += record.encoded_len();
        Ok(record)
    }

    /// Seek to `offset`, then read the record there
    pub fn read_at(&mut self, offset: u64) -> Result<Record> {
        self.seek(offset)?;
        self.read_next()
    }

    /// Move the cursor to `offset`
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    /// Whether unread bytes remain after the cursor
    pub fn can_read(&self) -> Result<bool> {
        Ok(self.position < self.len()?)
    }

    /// Current data file length
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.get_ref().metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Offset of the next record to read
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Attach the record position to corruption errors
fn locate(e: BitcaskError, position: u64, path: &Path) -> BitcaskError {
    match e {
        BitcaskError::Corruption(msg) => BitcaskError::Corruption(format!(
            "{} at offset {} in {}",
            msg,
            position,
            path.display()
        )),
        other => other,
    }
}

/// Lock-free random access to a data file
///
/// Reads go through positional I/O on a shared handle, so any number of
/// threads can read the same file at once without a cursor to fight over.
pub struct PositionalReader {
    path: PathBuf,
    file: File,
}

impl PositionalReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(BitcaskError::at("open data file", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Read the record starting at `offset`
    pub fn read_at(&self, offset: u64) -> Result<Record> {
        self.scan(offset).read_next()
    }

    /// Sequential cursor starting at `offset`, private to the caller
    pub fn scan(&self, offset: u64) -> RecordScan<'_> {
        RecordScan {
            path: &self.path,
            input: BufReader::with_capacity(
                SCAN_BUFFER_SIZE,
                FileAt {
                    file: &self.file,
                    offset,
                },
            ),
            position: offset,
        }
    }

    /// Current data file length
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read-ahead per scan; most records fit in one fill
const SCAN_BUFFER_SIZE: usize = 512;

/// Cursor handed out by [`PositionalReader::scan`]
pub struct RecordScan<'a> {
    path: &'a Path,
    input: BufReader<FileAt<'a>>,
    position: u64,
}

impl RecordScan<'_> {
    /// Read the record at the cursor and advance past it
    pub fn read_next(&mut self) -> Result<Record> {
        let record = read_record(&mut self.input).map_err(|e| locate(e, self.position, &self.path))?;
        self.position += record.encoded_len();
        Ok(record)
    }

    /// Offset of the next record to read
    pub fn position(&self) -> u64 {
        self.position
    }
}

/// `Read` over a shared file starting at a fixed offset
struct FileAt<'a> {
    file: &'a File,
    offset: u64,
}

impl Read for FileAt<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = read_at(self.file, buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
