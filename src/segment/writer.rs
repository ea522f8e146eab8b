//! Segment Writer
//!
//! Streams records into a new Parquet segment file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::config::Config;
use crate::error::Result;
use crate::record::Record;

use super::batch::{records_to_batch, schema};
use super::SegmentMeta;

/// Append-only writer for one segment file
///
/// Rows are buffered and handed to Parquet in batches; nothing is readable
/// until [`finish`](Self::finish) writes the footer.
pub struct SegmentWriter {
    path: PathBuf,
    writer: ArrowWriter<File>,
    /// Second handle on the same file, used to fsync after close
    sync_handle: File,
    buffer: Vec<Record>,
    batch_rows: usize,
    rows_written: u64,
}

impl SegmentWriter {
    /// Create (or truncate) a segment file
    pub fn create(path: &Path, config: &Config) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let sync_handle = file.try_clone()?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_max_row_group_size(config.row_group_size)
            .build();
        let writer = ArrowWriter::try_new(file, schema(), Some(props))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            sync_handle,
            buffer: Vec::with_capacity(config.write_batch_rows),
            batch_rows: config.write_batch_rows,
            rows_written: 0,
        })
    }

    /// Append one row
    pub fn append(&mut self, record: &Record) -> Result<()> {
        self.buffer.push(record.clone());
        self.rows_written += 1;
        if self.buffer.len() >= self.batch_rows {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Rows appended so far (buffered or written)
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush buffered rows, write the footer and fsync
    pub fn finish(mut self) -> Result<SegmentMeta> {
        self.flush_buffer()?;

        let SegmentWriter {
            path,
            writer,
            sync_handle,
            rows_written,
            ..
        } = self;

        writer.close()?;
        sync_handle.sync_all()?;
        let file_size = sync_handle.metadata()?.len();

        Ok(SegmentMeta {
            path,
            row_count: rows_written,
            file_size,
        })
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = records_to_batch(&self.buffer)?;
        self.writer.write(&batch)?;
        self.buffer.clear();
        Ok(())
    }
}
