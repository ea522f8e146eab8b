//! Startup recovery and consistency audit.
//!
//! A crash can interrupt an engine between any two file operations. On open
//! the segment files are reconciled first, then the index is checked against
//! the surviving active segment:
//!
//! | On disk                      | Meaning                            | Action                          |
//! |------------------------------|------------------------------------|---------------------------------|
//! | active + swap                | rewrite or session never published | drop swap, rebuild index        |
//! | swap only                    | crash between remove and rename    | rename swap, rebuild index      |
//! | active without footer magic  | first session never finished       | quarantine active, clear index  |
//! | active with footer, unusable | damaged segment                    | refuse to open                  |
//! | index log frames skipped     | offsets may be stale               | rebuild index                   |
//! | key points at another row    | index out of step with the segment | rebuild index                   |
//!
//! I/O errors while probing the active segment are returned, never treated
//! as damage.

use std::collections::HashSet;
use std::fs;

use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::segment::{self, SegmentReader};

use super::Engine;

/// Result of [`Engine::check_consistency`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Rows read from the active segment and any open session
    pub rows_scanned: u64,
    /// Index entries examined
    pub keys_checked: usize,
    /// Keys whose row derives a different key
    pub mismatched_keys: Vec<String>,
    /// Keys whose offset is past the last row
    pub dangling_keys: Vec<String>,
}

impl ConsistencyReport {
    /// Every indexed key points at a row that derives that key
    pub fn is_consistent(&self) -> bool {
        self.mismatched_keys.is_empty() && self.dangling_keys.is_empty()
    }
}

impl Engine {
    pub(super) fn recover(&mut self) -> Result<()> {
        let mut rebuild = false;

        match (self.paths.active.exists(), self.paths.swap.exists()) {
            (true, true) => {
                warn!(
                    swap = %self.paths.swap.display(),
                    "removing orphaned swap segment from an interrupted rewrite"
                );
                fs::remove_file(&self.paths.swap)?;
                rebuild = true;
            }
            (false, true) => {
                warn!(
                    swap = %self.paths.swap.display(),
                    "promoting swap segment left by an interrupted swap"
                );
                fs::rename(&self.paths.swap, &self.paths.active)?;
                rebuild = true;
            }
            _ => {}
        }

        if !self.paths.active.exists() {
            if !self.index.is_empty() {
                warn!(keys = self.index.len(), "no active segment, clearing key index");
                self.index.clear()?;
            }
            return Ok(());
        }

        if let Err(e) = SegmentReader::open(&self.paths.active) {
            return self.discard_unfinished_active(e);
        }

        if !rebuild && self.index.recovery().entries_corrupted > 0 {
            warn!(
                corrupted = self.index.recovery().entries_corrupted,
                "key index log lost frames, rebuilding from active segment"
            );
            rebuild = true;
        }
        if !rebuild {
            let report = self.check_consistency()?;
            if !report.is_consistent() {
                warn!(
                    mismatched = report.mismatched_keys.len(),
                    dangling = report.dangling_keys.len(),
                    "key index disagrees with active segment, rebuilding"
                );
                rebuild = true;
            }
        }
        if rebuild {
            self.rebuild_index()?;
            // Replaces a log that may still hold damaged frames
            self.index.checkpoint()?;
        }
        Ok(())
    }

    /// Handle an active segment that failed to open
    ///
    /// Only a file that never received its footer is moved aside; anything
    /// else is returned to the caller untouched.
    fn discard_unfinished_active(&mut self, err: StoreError) -> Result<()> {
        if let StoreError::Io(_) = err {
            return Err(err);
        }
        if segment::has_footer_magic(&self.paths.active)? {
            return Err(StoreError::Storage(format!(
                "active segment {} is damaged: {}",
                self.paths.active.display(),
                err
            )));
        }

        let moved_to = segment::quarantine(&self.paths.active)?;
        warn!(
            error = %err,
            moved_to = %moved_to.display(),
            keys = self.index.len(),
            "active segment was never finished, moved it aside"
        );
        self.index.clear()?;
        Ok(())
    }

    /// Re-point every key at its row in the active segment and drop keys
    /// with no row
    fn rebuild_index(&mut self) -> Result<()> {
        let reader = SegmentReader::open(&self.paths.active)?;

        let mut seen = HashSet::new();
        let mut updated = 0usize;
        for (position, record) in reader.scan()?.enumerate() {
            let key = record?.generate_key();
            let position = position as i64;
            if self.index.get(&key) != Some(position) {
                self.index.put(&key, position)?;
                updated += 1;
            }
            seen.insert(key);
        }

        let stale: Vec<String> = self
            .index
            .iter()
            .filter(|(key, _)| !seen.contains(*key))
            .map(|(key, _)| key.to_string())
            .collect();
        for key in &stale {
            self.index.delete(key)?;
        }

        info!(
            rows = reader.row_count(),
            updated,
            removed = stale.len(),
            "rebuilt key index from active segment"
        );
        Ok(())
    }

    /// Audit that every indexed key points at a row deriving that key
    pub fn check_consistency(&self) -> Result<ConsistencyReport> {
        let rows = self.load_rows()?;
        let mut report = ConsistencyReport {
            rows_scanned: rows.len() as u64,
            ..ConsistencyReport::default()
        };

        for (key, offset) in self.index.iter() {
            report.keys_checked += 1;
            match usize::try_from(offset).ok().and_then(|i| rows.get(i)) {
                Some(record) if record.generate_key() == key => {}
                Some(_) => report.mismatched_keys.push(key.to_string()),
                None => report.dangling_keys.push(key.to_string()),
            }
        }
        Ok(report)
    }
}
