//! Index Log Reader
//!
//! Handles reading frames from the key index log.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Result, StoreError};

use super::entry::{FrameHeader, HEADER_SIZE, MAX_FRAME_BYTES};
use super::IndexEntry;

/// Outcome of reading one frame
#[derive(Debug)]
pub enum Frame {
    /// A complete, checksummed entry
    Entry(IndexEntry),
    /// A complete frame whose body failed verification; the reader moved past it
    Corrupt { lsn: u64, reason: String },
    /// An incomplete or unframeable tail starting at the reader position
    Torn,
    /// Clean end of file
    End,
}

/// Reads entries from the index log file
pub struct IndexLogReader {
    file: BufReader<File>,
    /// Byte offset just past the last complete frame
    position: u64,
    file_len: u64,
}

impl IndexLogReader {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            file: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Offset of the end of the last complete frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next frame without interpreting failures
    pub fn next_frame(&mut self) -> Result<Frame> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(Frame::End);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(Frame::Torn);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        self.file.read_exact(&mut header_bytes)?;
        let header = FrameHeader::parse(&header_bytes);

        if header.len > MAX_FRAME_BYTES
            || HEADER_SIZE as u64 + header.len as u64 > remaining
        {
            return Ok(Frame::Torn);
        }

        let mut body = vec![0u8; header.len as usize];
        self.file.read_exact(&mut body)?;
        self.position += (HEADER_SIZE + body.len()) as u64;

        match IndexEntry::decode_body(&header, &body) {
            Ok(entry) => Ok(Frame::Entry(entry)),
            Err(StoreError::IndexCorruption(reason)) => Ok(Frame::Corrupt {
                lsn: header.lsn,
                reason,
            }),
            Err(e) => Err(e),
        }
    }

    /// Read the next entry from the log
    ///
    /// A torn tail reads as end of log; a corrupt frame is an error.
    pub fn next_entry(&mut self) -> Result<Option<IndexEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::Corrupt { lsn, reason } => Err(StoreError::IndexCorruption(format!(
                "frame lsn {}: {}",
                lsn, reason
            ))),
            Frame::Torn | Frame::End => Ok(None),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> IndexLogIterator {
        IndexLogIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over index log entries
pub struct IndexLogIterator {
    reader: IndexLogReader,
    done: bool,
}

impl Iterator for IndexLogIterator {
    type Item = Result<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
