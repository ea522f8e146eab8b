//! Index Log Writer
//!
//! Handles appending frames to the key index log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::IndexSyncStrategy;
use crate::error::{Result, StoreError};

use super::recovery::IndexRecovery;
use super::{IndexEntry, IndexOperation};

/// Writes entries to the index log file
pub struct IndexLogWriter {
    path: PathBuf,
    file: File,
    /// LSN the next append will receive
    next_lsn: u64,
    sync_strategy: IndexSyncStrategy,
    /// Appends since the last fsync
    unsynced: usize,
    /// Frames currently held by the log file
    entries_written: u64,
}

impl IndexLogWriter {
    /// Open or create a log file, continuing after its last valid LSN.
    /// A torn tail is cut off first so new frames stay aligned.
    pub fn open(path: &Path, sync_strategy: IndexSyncStrategy) -> Result<Self> {
        let (next_lsn, entries) = if path.exists() {
            let (_, result) = IndexRecovery::recover(path)?;
            (result.last_lsn + 1, result.entries_recovered)
        } else {
            (1, 0)
        };
        Self::open_at(path, sync_strategy, next_lsn, entries)
    }

    /// Open with a known starting LSN (used after recovery already scanned the file)
    pub fn open_at(
        path: &Path,
        sync_strategy: IndexSyncStrategy,
        next_lsn: u64,
        entries_written: u64,
    ) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
            entries_written,
        })
    }

    /// Append an operation, returning the LSN it was assigned
    pub fn append(&mut self, operation: IndexOperation) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = IndexEntry::new(lsn, operation).serialize()?;

        self.file
            .write_all(&frame)
            .map_err(|e| StoreError::Index(format!("append to {}: {}", self.path.display(), e)))?;
        self.next_lsn += 1;
        self.entries_written += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            IndexSyncStrategy::EveryWrite => true,
            IndexSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_data()
            .map_err(|e| StoreError::Index(format!("fsync {}: {}", self.path.display(), e)))?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every frame; LSNs keep counting from where they were
    pub fn truncate(&mut self) -> Result<()> {
        self.file
            .set_len(0)
            .map_err(|e| StoreError::Index(format!("truncate {}: {}", self.path.display(), e)))?;
        self.sync()?;
        self.entries_written = 0;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Number of frames in the log file
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Frames appended since the last fsync
    pub fn unsynced(&self) -> usize {
        self.unsynced
    }
}
