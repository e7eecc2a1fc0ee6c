//! Error types for bitcaskv
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using BitcaskError
pub type Result<T> = std::result::Result<T, BitcaskError>;

/// Unified error type for bitcaskv operations
#[derive(Debug, Error)]
pub enum BitcaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{op} failed for {}: {source}", path.display())]
    SegmentIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Segment directory name is not a version number: {}", .0.display())]
    InvalidSegmentDir(PathBuf),

    #[error("Segment is frozen: {}", .0.display())]
    SegmentFrozen(PathBuf),

    #[error("Record sequence exhausted")]
    SequenceExhausted,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Store is closed")]
    Closed,
}

impl BitcaskError {
    /// Wrap an I/O error with the operation and path it came from
    pub(crate) fn at(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| BitcaskError::SegmentIo { op, path, source }
    }
}

impl From<bincode::Error> for BitcaskError {
    fn from(e: bincode::Error) -> Self {
        BitcaskError::Serialization(e.to_string())
    }
}
