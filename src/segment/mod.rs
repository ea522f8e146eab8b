//! Segment Module
//!
//! Columnar row storage in Apache Parquet files.
//!
//! ## Responsibilities
//! - Write records sequentially into a new segment (append-then-finish)
//! - Read one row by skipping to its offset, or scan every row
//! - Track the active/swap file pair and swap them after a rewrite
//!
//! A segment is never modified in place. A rewrite copies the surviving rows
//! into the swap file, then the swap file replaces the active one:
//!
//! ```text
//!   data_store.parquet ──scan──▶ SegmentWriter ──▶ swap_store.parquet
//!                                                      │
//!            remove(data_store) ; rename(swap_store → data_store)
//! ```
//!
//! ## Columns
//! `stb` Utf8 | `title` Utf8 | `provider` Utf8 | `date` Int64 |
//! `rev` Float64 | `view_time` Int32

mod batch;
mod reader;
mod writer;

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::Result;

pub use batch::{batch_to_records, records_to_batch, schema};
pub use reader::{SegmentIterator, SegmentReader};
pub use writer::SegmentWriter;

/// File name of the canonical segment
pub const ACTIVE_FILENAME: &str = "data_store.parquet";

/// File name of the scratch segment a rewrite writes into
pub const SWAP_FILENAME: &str = "swap_store.parquet";

/// Smallest file that can hold a Parquet footer ("PAR1" + len + "PAR1")
pub(crate) const MIN_SEGMENT_BYTES: u64 = 12;

/// Trailing magic written only when a segment writer finishes
const FOOTER_MAGIC: &[u8; 4] = b"PAR1";

/// Infix of the name an unreadable segment is moved aside to
pub const QUARANTINE_INFIX: &str = ".unfinished-";

/// Metadata of a finished segment
#[derive(Debug, Clone)]
pub struct SegmentMeta {
    pub path: PathBuf,
    pub row_count: u64,
    pub file_size: u64,
}

/// Which of the two segment files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSlot {
    Active,
    Swap,
}

/// The active/swap file pair inside a data directory
#[derive(Debug, Clone)]
pub struct SegmentPaths {
    pub active: PathBuf,
    pub swap: PathBuf,
}

impl SegmentPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            active: dir.join(ACTIVE_FILENAME),
            swap: dir.join(SWAP_FILENAME),
        }
    }

    pub fn path(&self, slot: SegmentSlot) -> &Path {
        match slot {
            SegmentSlot::Active => &self.active,
            SegmentSlot::Swap => &self.swap,
        }
    }

    /// Where a new writer goes: the active path if no segment exists yet,
    /// otherwise the swap path
    pub fn writable_target(&self) -> SegmentSlot {
        if self.active.exists() {
            SegmentSlot::Swap
        } else {
            SegmentSlot::Active
        }
    }

    /// Replace the active segment with the finished swap segment
    pub fn swap_files(&self) -> Result<()> {
        if self.active.exists() {
            fs::remove_file(&self.active)?;
        }
        fs::rename(&self.swap, &self.active)?;
        Ok(())
    }
}

/// Row count of the segment at `path`
///
/// A missing file, or one too small to carry a footer, counts as empty.
pub fn row_count(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() >= MIN_SEGMENT_BYTES => Ok(SegmentReader::open(path)?.row_count()),
        Ok(_) => Ok(0),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Whether the file at `path` ends with the footer magic of a finished
/// segment
///
/// A path that is not a regular file is an I/O error, not a missing footer.
pub fn has_footer_magic(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let meta = file.metadata()?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )
        .into());
    }
    if meta.len() < MIN_SEGMENT_BYTES {
        return Ok(false);
    }

    let mut magic = [0u8; 4];
    file.seek(SeekFrom::End(-(FOOTER_MAGIC.len() as i64)))?;
    file.read_exact(&mut magic)?;
    Ok(&magic == FOOTER_MAGIC)
}

/// Move an unreadable segment aside, returning its new path
pub fn quarantine(path: &Path) -> Result<PathBuf> {
    let mut name = path.as_os_str().to_owned();
    name.push(QUARANTINE_INFIX);
    name.push(Utc::now().format("%Y%m%dT%H%M%S%.3f").to_string());

    let target = PathBuf::from(name);
    fs::rename(path, &target)?;
    Ok(target)
}
