//! Key Index Module
//!
//! Persistent ordered map from a record's derived key to its row offset in
//! the active segment.
//!
//! ## Responsibilities
//! - Durable put/delete: every mutation is logged (CRC32 framed) before it
//!   is applied to the in-memory table
//! - Crash recovery: snapshot load + log replay, torn tail truncation
//! - Periodic snapshots so the log stays short
//!
//! ## Log Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//! Data is the bincode encoding of [`IndexEntry`].

mod entry;
mod reader;
mod recovery;
mod snapshot;
mod table;
mod writer;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, StoreError};

pub use entry::{IndexEntry, IndexOperation, HEADER_SIZE};
pub use reader::{Frame, IndexLogIterator, IndexLogReader};
pub use recovery::{IndexRecovery, RecoveryResult};
pub use snapshot::Snapshot;
pub use table::IndexTable;
pub use writer::IndexLogWriter;

/// Offset reported for a key that is not in the index
pub const ABSENT_OFFSET: i64 = -1;

/// Durable key → row offset index
pub struct KeyIndex {
    log_path: PathBuf,
    snapshot_path: PathBuf,
    log: IndexLogWriter,
    table: IndexTable,
    /// Log frames that trigger a snapshot (0 = never automatically)
    checkpoint_entries: usize,
    /// Result of replaying the log at open
    recovery: RecoveryResult,
}

impl KeyIndex {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    pub const LOG_FILENAME: &'static str = "key_index.log";
    pub const SNAPSHOT_FILENAME: &'static str = "key_index.snapshot";

    /// Open or create the index stored in `dir`
    ///
    /// Re-opening never loses entries:
    /// 1. Load the snapshot, if any
    /// 2. Replay log frames newer than the snapshot
    /// 3. Reopen the log for appends after the last valid LSN
    pub fn open(dir: &Path, config: &Config) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let log_path = dir.join(Self::LOG_FILENAME);
        let snapshot_path = dir.join(Self::SNAPSHOT_FILENAME);

        let snapshot = Snapshot::load(&snapshot_path)?.unwrap_or_default();
        let snapshot_lsn = snapshot.last_lsn;
        let mut table = IndexTable::from_map(snapshot.entries);

        let recovery = if log_path.exists() {
            let (entries, result) = IndexRecovery::recover(&log_path)?;
            for entry in entries {
                if entry.lsn > snapshot_lsn {
                    table.apply(entry.operation);
                }
            }
            result
        } else {
            RecoveryResult::default()
        };

        if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
            info!(
                recovered = recovery.entries_recovered,
                corrupted = recovery.entries_corrupted,
                last_lsn = recovery.last_lsn,
                truncated = recovery.was_truncated,
                "replayed key index log"
            );
        }

        let next_lsn = recovery.last_lsn.max(snapshot_lsn) + 1;
        let log = IndexLogWriter::open_at(
            &log_path,
            config.index_sync_strategy,
            next_lsn,
            recovery.entries_recovered + recovery.entries_corrupted,
        )?;

        Ok(Self {
            log_path,
            snapshot_path,
            log,
            table,
            checkpoint_entries: config.index_checkpoint_entries,
            recovery,
        })
    }

    /// Offset stored for `key`
    pub fn get(&self, key: &str) -> Option<i64> {
        self.table.get(key)
    }

    /// Offset stored for `key`, or [`ABSENT_OFFSET`]
    pub fn offset_or_absent(&self, key: &str) -> i64 {
        self.get(key).unwrap_or(ABSENT_OFFSET)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.table.get(key).is_some()
    }

    /// Point `key` at `offset`, replacing any previous offset
    pub fn put(&mut self, key: &str, offset: i64) -> Result<()> {
        if offset < 0 {
            return Err(StoreError::Index(format!(
                "refusing negative offset {} for key {}",
                offset, key
            )));
        }
        self.log.append(IndexOperation::Put {
            key: key.to_string(),
            offset,
        })?;
        self.table.put(key.to_string(), offset);
        self.maybe_checkpoint()
    }

    /// Remove `key`; removing an absent key is a no-op
    pub fn delete(&mut self, key: &str) -> Result<()> {
        if !self.contains_key(key) {
            return Ok(());
        }
        self.log.append(IndexOperation::Delete {
            key: key.to_string(),
        })?;
        self.table.delete(key);
        self.maybe_checkpoint()
    }

    /// Drop every entry durably
    pub fn clear(&mut self) -> Result<()> {
        self.table.clear();
        self.checkpoint()
    }

    /// Write a snapshot of the table and truncate the log
    pub fn checkpoint(&mut self) -> Result<()> {
        let last_lsn = self.log.current_lsn() - 1;
        let size = Snapshot::write(
            &self.snapshot_path,
            self.table.iter(),
            self.table.len(),
            last_lsn,
        )?;
        self.log.truncate()?;
        debug!(
            entries = self.table.len(),
            last_lsn,
            bytes = size,
            "key index checkpoint"
        );
        Ok(())
    }

    /// Flush any frames an `EveryNEntries` strategy left unsynced
    pub fn sync(&mut self) -> Result<()> {
        self.log.sync()
    }

    fn maybe_checkpoint(&mut self) -> Result<()> {
        if self.checkpoint_entries > 0 && self.log.entries_written() >= self.checkpoint_entries as u64 {
            self.checkpoint()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.table.iter()
    }

    /// Frames currently in the log (resets on checkpoint)
    pub fn log_entries(&self) -> u64 {
        self.log.entries_written()
    }

    /// Log frames not yet fsynced
    pub fn unsynced_entries(&self) -> usize {
        self.log.unsynced()
    }

    /// What the last open recovered from the log
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}
