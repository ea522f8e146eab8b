//! Engine Module
//!
//! The storage engine that coordinates the key index and the segment files.
//!
//! ## Responsibilities
//! - Put/Get/Delete of single records addressed by their derived key
//! - Filtered, sorted bulk reads
//! - Copy-on-write rewrites of the active segment on upsert and delete
//! - Crash recovery on startup
//!
//! ## Write Model
//!
//! A segment file is unreadable until its writer is finished, and a finished
//! Parquet file cannot be appended to. Inserts therefore go to an
//! *append session*: one open writer that new rows stream into, with the
//! rows it holds kept in memory so reads still see them.
//!
//! ```text
//!   insert ──▶ AppendSession ──write_out()──▶ data_store.parquet
//!                (writer on active path if none exists yet,
//!                 otherwise on swap path seeded with the active rows)
//!
//!   upsert/delete ──▶ write_out() ──▶ compact_excluding(offset)
//!                 ──▶ swap_store.parquet ──swap──▶ data_store.parquet
//! ```

mod read;
mod recovery;
mod write;

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::index::KeyIndex;
use crate::segment::{self, SegmentPaths};

pub use recovery::ConsistencyReport;

use write::AppendSession;

/// The main storage engine
///
/// ## Concurrency Model: Single Writer
///
/// Every mutating operation takes `&mut self`; the engine owns the index and
/// every segment file handle. Two processes sharing one data directory are
/// not detected.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Active and swap segment paths inside the data directory
    paths: SegmentPaths,

    /// Durable key → row offset map for the active segment
    index: KeyIndex,

    /// Open writer that inserts append to, if any
    session: Option<AppendSession>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Open the key index (snapshot + log replay)
    /// 3. Reconcile segment files and index after an interrupted run
    ///
    /// No writer is opened until the first insert.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let paths = SegmentPaths::new(&config.data_dir);
        let index = KeyIndex::open(&config.data_dir, &config)?;

        let mut engine = Self {
            config,
            paths,
            index,
            session: None,
        };
        engine.recover()?;

        info!(
            data_dir = %engine.config.data_dir.display(),
            keys = engine.index.len(),
            "engine opened"
        );
        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Publish pending writes and checkpoint the index
    pub fn close(mut self) -> Result<()> {
        self.write_out()?;
        self.index.checkpoint()?;
        info!(keys = self.index.len(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Rows currently stored, including rows of an unpublished session
    pub fn row_count(&self) -> Result<u64> {
        match &self.session {
            Some(session) => Ok(session.row_count()),
            None => segment::row_count(&self.paths.active),
        }
    }

    /// Number of keys in the index
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// True while inserted rows are waiting for [`write_out`](Self::write_out)
    pub fn has_pending_writes(&self) -> bool {
        self.session.is_some()
    }

    pub fn index(&self) -> &KeyIndex {
        &self.index
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.write_out() {
                warn!(error = %e, "failed to publish pending writes on drop");
            }
        }
    }
}
