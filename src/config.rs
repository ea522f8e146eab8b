//! Configuration for viewdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Main configuration for a viewdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── data_store.parquet   (active segment)
    ///     ├── swap_store.parquet   (scratch segment, only during a rewrite)
    ///     ├── key_index.log        (key index log)
    ///     └── key_index.snapshot   (key index checkpoint)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Segment Configuration
    // -------------------------------------------------------------------------
    /// Max rows per Parquet row group
    pub row_group_size: usize,

    /// Rows buffered by a segment writer before they are handed to Parquet
    pub write_batch_rows: usize,

    // -------------------------------------------------------------------------
    // Key Index Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the index log
    pub index_sync_strategy: IndexSyncStrategy,

    /// Log frames accumulated before the index writes a snapshot
    /// (0 disables automatic snapshots)
    pub index_checkpoint_entries: usize,
}

/// Index log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSyncStrategy {
    /// fsync after every write (every index mutation is durable on return)
    EveryWrite,

    /// fsync after N unsynced entries; trades the durability contract for
    /// throughput, intended for benchmarks and bulk loads
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            row_group_size: 8192,
            write_batch_rows: 1024,
            index_sync_strategy: IndexSyncStrategy::EveryWrite,
            index_checkpoint_entries: 10_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.row_group_size == 0 {
            return Err(StoreError::Config("row_group_size must be > 0".into()));
        }
        if self.write_batch_rows == 0 {
            return Err(StoreError::Config("write_batch_rows must be > 0".into()));
        }
        if let IndexSyncStrategy::EveryNEntries { count: 0 } = self.index_sync_strategy {
            return Err(StoreError::Config(
                "EveryNEntries sync count must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the Parquet row group size
    pub fn row_group_size(mut self, rows: usize) -> Self {
        self.config.row_group_size = rows;
        self
    }

    /// Set how many rows a segment writer buffers per batch
    pub fn write_batch_rows(mut self, rows: usize) -> Self {
        self.config.write_batch_rows = rows;
        self
    }

    /// Set the index log sync strategy
    pub fn index_sync_strategy(mut self, strategy: IndexSyncStrategy) -> Self {
        self.config.index_sync_strategy = strategy;
        self
    }

    /// Set the number of log frames that triggers an index snapshot
    pub fn index_checkpoint_entries(mut self, count: usize) -> Self {
        self.config.index_checkpoint_entries = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
