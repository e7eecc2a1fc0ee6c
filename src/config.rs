//! Configuration for bitcaskv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BitcaskError, Result};

/// Main configuration for a bitcaskv store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory of the store
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── 1/          (segment version 1)
    ///     │   ├── data
    ///     │   └── index
    ///     ├── 3/
    ///     └── ...
    pub data_dir: PathBuf,

    /// Active segment size (bytes) above which the next write rolls over
    /// to a fresh segment
    pub max_segment_size: u64,

    /// Sorted segments index only every Nth key
    pub sparse_factor: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Run compaction on a background thread
    pub compaction_enabled: bool,

    /// Time between background compaction ticks
    pub compaction_interval: Duration,

    /// Upper bound on the number of segments merged in one compaction
    pub max_segments_per_compaction: usize,

    /// How long `close` waits for the compaction thread before detaching it
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./bitcaskv_data"),
            max_segment_size: 8 * 1024, // 8 KiB
            sparse_factor: 1000,
            compaction_enabled: true,
            compaction_interval: Duration::from_secs(10),
            max_segments_per_compaction: 4,
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(BitcaskError::Config(
                "max_segment_size must be greater than zero".to_string(),
            ));
        }
        if self.sparse_factor == 0 {
            return Err(BitcaskError::Config(
                "sparse_factor must be at least 1".to_string(),
            ));
        }
        if self.max_segments_per_compaction < 2 {
            return Err(BitcaskError::Config(format!(
                "max_segments_per_compaction must be at least 2, got {}",
                self.max_segments_per_compaction
            )));
        }
        if self.compaction_enabled && self.compaction_interval.is_zero() {
            return Err(BitcaskError::Config(
                "compaction_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-segment settings derived from this config
    pub fn segment_options(&self) -> SegmentOptions {
        SegmentOptions {
            sparse_factor: self.sparse_factor,
        }
    }
}

/// Settings handed to every segment the store opens
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Sorted segments index only every Nth key
    pub sparse_factor: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Config::default().segment_options()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the rollover threshold (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the sparse index factor for sorted segments
    pub fn sparse_factor(mut self, factor: usize) -> Self {
        self.config.sparse_factor = factor;
        self
    }

    /// Enable or disable background compaction
    pub fn compaction_enabled(mut self, enabled: bool) -> Self {
        self.config.compaction_enabled = enabled;
        self
    }

    /// Set the background compaction interval
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = interval;
        self
    }

    /// Set the maximum number of segments merged per compaction
    pub fn max_segments_per_compaction(mut self, count: usize) -> Self {
        self.config.max_segments_per_compaction = count;
        self
    }

    /// Set the bounded wait for the compaction thread on close
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
