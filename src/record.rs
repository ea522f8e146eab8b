//! Record Module
//!
//! The fixed-schema row stored in a segment, its derived key, and
//! by-name field access used by filters and sorts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit hash
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A single viewing record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// Set-top box (station) identifier
    pub stb: String,
    pub title: String,
    pub provider: String,
    /// Event date as an epoch timestamp
    pub date: i64,
    /// Revenue
    pub rev: f64,
    /// View duration
    pub view_time: i32,
}

impl Record {
    pub fn new(
        stb: impl Into<String>,
        title: impl Into<String>,
        provider: impl Into<String>,
        date: i64,
        rev: f64,
        view_time: i32,
    ) -> Self {
        Self {
            stb: stb.into(),
            title: title.into(),
            provider: provider.into(),
            date,
            rev,
            view_time,
        }
    }

    /// Derive the index key: FNV-1a over `stb + title + date`, as lowercase hex.
    ///
    /// Records sharing (stb, title, date) share a key; that collision is the
    /// upsert identity. Provider, revenue and view time do not participate.
    pub fn generate_key(&self) -> String {
        let unique = format!("{}{}{}", self.stb, self.title, self.date);
        format!("{:x}", fnv1a_64(unique.as_bytes()))
    }

    /// Look up a field by column name. Unknown names yield `None`.
    pub fn field_value(&self, name: &str) -> Option<FieldValue> {
        let column = name.parse::<Column>().ok()?;
        Some(column.value_of(self))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}",
            self.stb, self.title, self.provider, self.date, self.rev, self.view_time
        )
    }
}

// =============================================================================
// Field Values
// =============================================================================

/// A typed field value, used as a filter operand
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

// =============================================================================
// Columns
// =============================================================================

/// The six record columns, addressable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Stb,
    Title,
    Provider,
    Date,
    Rev,
    ViewTime,
}

impl Column {
    /// All columns in schema order
    pub const ALL: [Column; 6] = [
        Column::Stb,
        Column::Title,
        Column::Provider,
        Column::Date,
        Column::Rev,
        Column::ViewTime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Stb => "stb",
            Column::Title => "title",
            Column::Provider => "provider",
            Column::Date => "date",
            Column::Rev => "rev",
            Column::ViewTime => "view_time",
        }
    }

    pub fn value_of(&self, record: &Record) -> FieldValue {
        match self {
            Column::Stb => FieldValue::Text(record.stb.clone()),
            Column::Title => FieldValue::Text(record.title.clone()),
            Column::Provider => FieldValue::Text(record.provider.clone()),
            Column::Date => FieldValue::Int(record.date),
            Column::Rev => FieldValue::Float(record.rev),
            Column::ViewTime => FieldValue::Int(record.view_time as i64),
        }
    }

    /// Order two records by this column.
    ///
    /// Strings compare byte-wise, integers numerically, revenue with
    /// `total_cmp` so NaN still yields a total order.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            Column::Stb => a.stb.cmp(&b.stb),
            Column::Title => a.title.cmp(&b.title),
            Column::Provider => a.provider.cmp(&b.provider),
            Column::Date => a.date.cmp(&b.date),
            Column::Rev => a.rev.total_cmp(&b.rev),
            Column::ViewTime => a.view_time.cmp(&b.view_time),
        }
    }

    /// Convert raw text (e.g. a CLI filter) into this column's value type
    pub fn parse_value(&self, raw: &str) -> Result<FieldValue> {
        let raw = raw.trim();
        match self {
            Column::Stb | Column::Title | Column::Provider => Ok(FieldValue::Text(raw.to_string())),
            Column::Date | Column::ViewTime => raw.parse::<i64>().map(FieldValue::Int).map_err(|e| {
                StoreError::Parse(format!("column `{}` expects an integer, got {:?}: {}", self.name(), raw, e))
            }),
            Column::Rev => raw.parse::<f64>().map(FieldValue::Float).map_err(|e| {
                StoreError::Parse(format!("column `{}` expects a number, got {:?}: {}", self.name(), raw, e))
            }),
        }
    }
}

impl FromStr for Column {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| StoreError::Parse(format!("unknown column `{}`", s)))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
