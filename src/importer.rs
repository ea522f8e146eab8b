//! Importer Module
//!
//! Bulk-loads pipe-delimited text into an engine.
//!
//! ## Input Format
//! ```text
//! STB|TITLE|PROVIDER|DATE|REV|VIEW_TIME        <- header, skipped
//! stb1|the matrix|warner bros|2014-04-01|4.00|1:30
//! ```
//! - `DATE` is `YYYY-MM-DD`, stored as Unix seconds at UTC midnight
//! - `REV` is a decimal number
//! - `VIEW_TIME` is `H:MM`, stored as whole minutes (a bare number is minutes)

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{Array, StringArray};
use arrow::csv::reader::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use chrono::NaiveDate;
use tracing::info;

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::record::{Column, Record};

/// File imported when none is given
pub const DEFAULT_IMPORT_PATH: &str = "assets/data_sample.psv";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Counts reported by [`Importer::import`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Data rows read (header excluded)
    pub rows_read: u64,
    /// Rows stored under a new key
    pub inserted: u64,
    /// Rows that replaced an existing record
    pub updated: u64,
}

/// Reads a delimited file and stores every row through [`Engine::put`]
#[derive(Debug, Clone)]
pub struct Importer {
    path: PathBuf,
    delimiter: u8,
}

impl Importer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b'|',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Import every data row, then publish the engine's pending writes
    ///
    /// The first malformed row aborts the import with [`StoreError::Parse`]
    /// naming its line. Rows before it are already put and are published by
    /// the engine's next `write_out` or `close`.
    pub fn import(&self, engine: &mut Engine) -> Result<ImportSummary> {
        let file = File::open(&self.path)?;
        // One row per batch so a decode error names the offending line
        let reader = ReaderBuilder::new(raw_schema())
            .with_header(true)
            .with_delimiter(self.delimiter)
            .with_batch_size(1)
            .build(file)
            .map_err(|e| self.parse_error(1, e))?;

        let mut summary = ImportSummary::default();
        for batch in reader {
            // Header is line 1
            let line = summary.rows_read + 2;
            let batch = batch.map_err(|e| self.parse_error(line, e))?;

            let columns = Column::ALL
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    batch
                        .column(i)
                        .as_any()
                        .downcast_ref::<StringArray>()
                        .ok_or_else(|| {
                            StoreError::Parse(format!("column `{}` was not read as text", column))
                        })
                })
                .collect::<Result<Vec<_>>>()?;

            for row in 0..batch.num_rows() {
                let line = summary.rows_read + 2;
                let fields: Vec<&str> = columns
                    .iter()
                    .map(|array| if array.is_null(row) { "" } else { array.value(row) })
                    .collect();

                let record = parse_row(&fields).map_err(|e| {
                    StoreError::Parse(format!("{}:{}: {}", self.path.display(), line, e))
                })?;

                if engine.contains_key(&record.generate_key()) {
                    summary.updated += 1;
                } else {
                    summary.inserted += 1;
                }
                engine.put(record)?;
                summary.rows_read += 1;
            }
        }

        engine.write_out()?;
        info!(
            path = %self.path.display(),
            rows = summary.rows_read,
            inserted = summary.inserted,
            updated = summary.updated,
            "import finished"
        );
        Ok(summary)
    }

    fn parse_error(&self, line: u64, err: impl std::fmt::Display) -> StoreError {
        StoreError::Parse(format!("{}:{}: {}", self.path.display(), line, err))
    }
}

/// Every column read as nullable text; typing happens in [`parse_row`]
fn raw_schema() -> SchemaRef {
    Arc::new(Schema::new(
        Column::ALL
            .iter()
            .map(|column| Field::new(column.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

/// Build a record from the six text fields of one row
pub fn parse_row(fields: &[&str]) -> Result<Record> {
    if fields.len() != Column::ALL.len() {
        return Err(StoreError::Parse(format!(
            "expected {} fields, got {}",
            Column::ALL.len(),
            fields.len()
        )));
    }

    Ok(Record {
        stb: fields[0].to_string(),
        title: fields[1].to_string(),
        provider: fields[2].to_string(),
        date: parse_date(fields[3])?,
        rev: parse_revenue(fields[4])?,
        view_time: parse_view_time(fields[5])?,
    })
}

/// `YYYY-MM-DD` → Unix seconds at UTC midnight
pub fn parse_date(raw: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| StoreError::Parse(format!("invalid date {:?}: {}", raw, e)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| StoreError::Parse(format!("invalid date {:?}", raw)))?;
    Ok(midnight.and_utc().timestamp())
}

pub fn parse_revenue(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| StoreError::Parse(format!("invalid revenue {:?}: {}", raw, e)))
}

/// `H:MM` → whole minutes, truncated toward zero
///
/// `1:30` is 90, `0:05` is 5, and a bare `45` is 45 minutes.
pub fn parse_view_time(raw: &str) -> Result<i32> {
    let invalid = || StoreError::Parse(format!("invalid view time {:?}", raw));

    let trimmed = raw.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (hours, minutes) = match body.split_once(':') {
        Some((hours, minutes)) => (Some(hours), minutes),
        None => (None, body),
    };

    let number = |part: &str| -> Result<f64> {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(invalid());
        }
        part.parse::<f64>().map_err(|_| invalid())
    };

    let mut total = number(minutes)?;
    if let Some(hours) = hours {
        total += number(hours)? * 60.0;
    }
    if negative {
        total = -total;
    }

    let total = total.trunc();
    if total < i32::MIN as f64 || total > i32::MAX as f64 {
        return Err(StoreError::Parse(format!("view time {:?} is out of range", raw)));
    }
    Ok(total as i32)
}
