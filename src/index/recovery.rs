//! Index Log Recovery
//!
//! Rebuilds the list of committed index mutations after a crash.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::warn;

use crate::error::Result;

use super::reader::{Frame, IndexLogReader};
use super::IndexEntry;

/// Handles index log recovery after crash
pub struct IndexRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the log was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl IndexRecovery {
    /// Recover entries from a log file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Skip frames that fail their checksum
    /// 3. Truncate a partial write at the end
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<IndexEntry>, RecoveryResult)> {
        let (entries, result, valid_len) = Self::scan(path, true)?;

        if result.was_truncated {
            warn!(
                path = %path.display(),
                valid_len,
                "truncating torn tail of index log"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        Ok((entries, result))
    }

    /// Verify integrity of a log file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path, false)?;
        Ok(result)
    }

    fn scan(path: &Path, collect: bool) -> Result<(Vec<IndexEntry>, RecoveryResult, u64)> {
        let mut reader = IndexLogReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_frame()? {
                Frame::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = result.last_lsn.max(entry.lsn);
                    if collect {
                        entries.push(entry);
                    }
                }
                Frame::Corrupt { lsn, reason } => {
                    warn!(lsn, %reason, "skipping corrupt index log frame");
                    result.entries_corrupted += 1;
                }
                Frame::Torn => {
                    result.was_truncated = true;
                    break;
                }
                Frame::End => break,
            }
        }

        Ok((entries, result, reader.position()))
    }
}
