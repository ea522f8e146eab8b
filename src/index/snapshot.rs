//! Index Snapshot
//!
//! Checkpoint of the whole key table, so the log can be truncated.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (22 bytes)                                            │
//! │   Magic: "VIDX" (4) | Version: u16 (2) | Count: u64 (8)      │
//! │   LastLSN: u64 (8)                                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                        │
//! │   [KeyLen: u32][Offset: i64][Key]                            │
//! │   ... repeated for each entry, in key order ...              │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                             │
//! │   DataCRC: u32                                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, StoreError};

/// Magic bytes identifying an index snapshot
pub(crate) const MAGIC: &[u8; 4] = b"VIDX";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Count (8) + LastLSN (8)
pub(crate) const HEADER_SIZE: usize = 22;

/// Footer size: DataCRC (4)
pub(crate) const FOOTER_SIZE: usize = 4;

/// Contents of a loaded snapshot
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Every key → offset pair at checkpoint time
    pub entries: BTreeMap<String, i64>,
    /// Last log LSN folded into this snapshot
    pub last_lsn: u64,
}

impl Snapshot {
    /// Write a snapshot atomically (temp file + fsync + rename)
    pub fn write<'a, I>(path: &Path, entries: I, count: usize, last_lsn: u64) -> Result<u64>
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let tmp_path = path.with_extension("snapshot.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(count as u64).to_le_bytes())?;
        writer.write_all(&last_lsn.to_le_bytes())?;

        let mut hasher = crc32fast::Hasher::new();
        let mut written = 0usize;
        for (key, offset) in entries {
            let key_len = (key.len() as u32).to_le_bytes();
            let offset = offset.to_le_bytes();
            writer.write_all(&key_len)?;
            writer.write_all(&offset)?;
            writer.write_all(key.as_bytes())?;
            hasher.update(&key_len);
            hasher.update(&offset);
            hasher.update(key.as_bytes());
            written += 1;
        }
        if written != count {
            return Err(StoreError::Index(format!(
                "snapshot count mismatch: declared {}, wrote {}",
                count, written
            )));
        }

        writer.write_all(&hasher.finalize().to_le_bytes())?;
        writer.flush()?;

        let file = writer
            .into_inner()
            .map_err(|e| StoreError::Index(format!("flush snapshot: {}", e)))?;
        file.sync_all()?;
        let size = file.metadata()?.len();
        drop(file);

        fs::rename(&tmp_path, path)?;
        Ok(size)
    }

    /// Load a snapshot; `Ok(None)` if none has been written yet
    pub fn load(path: &Path) -> Result<Option<Snapshot>> {
        if !path.exists() {
            return Ok(None);
        }

        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(path, "file shorter than header and footer"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(corrupt(path, "bad magic"));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(corrupt(path, &format!("unsupported version {}", version)));
        }
        let count = read_u64(&bytes[6..14]);
        let last_lsn = read_u64(&bytes[14..22]);

        let data_end = bytes.len() - FOOTER_SIZE;
        let data = &bytes[HEADER_SIZE..data_end];
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[data_end..]);
        if crc32fast::hash(data) != u32::from_le_bytes(crc) {
            return Err(corrupt(path, "data CRC mismatch"));
        }

        // Parse entries: [key_len(4)][offset(8)][key]
        let mut entries = BTreeMap::new();
        let mut pos = 0;
        while pos < data.len() {
            if pos + 12 > data.len() {
                return Err(corrupt(path, "truncated entry header"));
            }
            let mut key_len = [0u8; 4];
            key_len.copy_from_slice(&data[pos..pos + 4]);
            let key_len = u32::from_le_bytes(key_len) as usize;
            let mut offset = [0u8; 8];
            offset.copy_from_slice(&data[pos + 4..pos + 12]);
            let offset = i64::from_le_bytes(offset);
            pos += 12;

            if pos + key_len > data.len() {
                return Err(corrupt(path, "truncated key"));
            }
            let key = std::str::from_utf8(&data[pos..pos + key_len])
                .map_err(|_| corrupt(path, "key is not UTF-8"))?;
            pos += key_len;

            entries.insert(key.to_string(), offset);
        }

        if entries.len() as u64 != count {
            return Err(corrupt(
                path,
                &format!("header declares {} entries, found {}", count, entries.len()),
            ));
        }

        Ok(Some(Snapshot { entries, last_lsn }))
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn corrupt(path: &Path, reason: &str) -> StoreError {
    StoreError::IndexCorruption(format!("snapshot {}: {}", path.display(), reason))
}
