//! Segment Reader
//!
//! Opens a finished segment and reads it by skip-then-read or full scan.
//! Every read opens a fresh cursor over the file.

use std::fs::File;
use std::path::{Path, PathBuf};

use parquet::arrow::arrow_reader::{
    ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder, RowSelection, RowSelector,
};

use crate::error::{Result, StoreError};
use crate::record::{Column, Record};

use super::batch::batch_to_records;

/// Rows per Arrow batch when scanning
const SCAN_BATCH_ROWS: usize = 1024;

/// Reader for a finished segment file
#[derive(Debug, Clone)]
pub struct SegmentReader {
    path: PathBuf,
    row_count: u64,
}

impl SegmentReader {
    /// Open a segment, reading the row count from its footer
    pub fn open(path: &Path) -> Result<Self> {
        let builder = Self::builder(path)?;

        for column in Column::ALL {
            if builder.schema().field_with_name(column.name()).is_err() {
                return Err(StoreError::Storage(format!(
                    "segment {} has no `{}` column",
                    path.display(),
                    column.name()
                )));
            }
        }

        let row_count = builder.metadata().file_metadata().num_rows().max(0) as u64;
        Ok(Self {
            path: path.to_path_buf(),
            row_count,
        })
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Read the row at `offset`: skip `offset` rows, then read exactly one
    pub fn read_at(&self, offset: u64) -> Result<Record> {
        if offset >= self.row_count {
            return Err(StoreError::Storage(format!(
                "offset {} out of range for segment with {} rows",
                offset, self.row_count
            )));
        }

        let mut selectors = Vec::with_capacity(2);
        if offset > 0 {
            selectors.push(RowSelector::skip(offset as usize));
        }
        selectors.push(RowSelector::select(1));

        let reader = Self::builder(&self.path)?
            .with_row_selection(RowSelection::from(selectors))
            .with_batch_size(1)
            .build()?;

        for batch in reader {
            if let Some(record) = batch_to_records(&batch?)?.into_iter().next() {
                return Ok(record);
            }
        }

        Err(StoreError::Storage(format!(
            "segment {} returned no row at offset {}",
            self.path.display(),
            offset
        )))
    }

    /// Iterate over every row in order
    pub fn scan(&self) -> Result<SegmentIterator> {
        let batches = Self::builder(&self.path)?
            .with_batch_size(SCAN_BATCH_ROWS)
            .build()?;
        Ok(SegmentIterator {
            batches,
            current: Vec::new().into_iter(),
        })
    }

    /// Read every row into memory
    pub fn read_all(&self) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.row_count as usize);
        for record in self.scan()? {
            records.push(record?);
        }
        Ok(records)
    }

    fn builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
        let file = File::open(path)?;
        Ok(ParquetRecordBatchReaderBuilder::try_new(file)?)
    }
}

/// Iterator over the rows of a segment
pub struct SegmentIterator {
    batches: ParquetRecordBatchReader,
    current: std::vec::IntoIter<Record>,
}

impl Iterator for SegmentIterator {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(Ok(record));
            }

            let batch = match self.batches.next()? {
                Ok(batch) => batch,
                Err(e) => return Some(Err(e.into())),
            };
            match batch_to_records(&batch) {
                Ok(records) => self.current = records.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
