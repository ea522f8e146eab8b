//! Index log entry definitions
//!
//! Defines the structure of individual key index log frames.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single frame body; anything larger is garbage
pub(crate) const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// A single entry in the index log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The mutation to replay
    pub operation: IndexOperation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Mutations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexOperation {
    /// Point a key at a row offset
    Put { key: String, offset: i64 },

    /// Remove a key
    Delete { key: String },
}

impl IndexOperation {
    pub fn key(&self) -> &str {
        match self {
            IndexOperation::Put { key, .. } | IndexOperation::Delete { key } => key,
        }
    }
}

impl IndexEntry {
    pub fn new(lsn: u64, operation: IndexOperation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as a complete frame: `[LSN][CRC][Len][bincode body]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)
            .map_err(|e| StoreError::Serialization(format!("index entry: {}", e)))?;
        if body.len() > MAX_FRAME_BYTES as usize {
            return Err(StoreError::Serialization(format!(
                "index entry too large: {} bytes",
                body.len()
            )));
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decode a complete frame, verifying its checksum
    pub fn deserialize(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_SIZE {
            return Err(StoreError::IndexCorruption(format!(
                "frame shorter than header ({} bytes)",
                frame.len()
            )));
        }
        let header = FrameHeader::parse(&frame[..HEADER_SIZE]);
        let body = &frame[HEADER_SIZE..];
        if body.len() != header.len as usize {
            return Err(StoreError::IndexCorruption(format!(
                "frame length mismatch: header says {}, got {}",
                header.len,
                body.len()
            )));
        }
        Self::decode_body(&header, body)
    }

    pub(crate) fn decode_body(header: &FrameHeader, body: &[u8]) -> Result<Self> {
        if crc32fast::hash(body) != header.crc {
            return Err(StoreError::IndexCorruption(format!(
                "CRC mismatch at lsn {}",
                header.lsn
            )));
        }
        let entry: IndexEntry = bincode::deserialize(body)
            .map_err(|e| StoreError::IndexCorruption(format!("undecodable frame: {}", e)))?;
        if entry.lsn != header.lsn {
            return Err(StoreError::IndexCorruption(format!(
                "LSN mismatch: header {}, body {}",
                header.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}

/// Parsed frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    /// `bytes` must hold at least HEADER_SIZE bytes
    pub fn parse(bytes: &[u8]) -> Self {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);
        Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        }
    }
}
