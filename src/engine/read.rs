//! Read path: `get()` and `query()`.

use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::query::Query;
use crate::record::{Column, Record};
use crate::segment::{self, SegmentReader};

use super::Engine;

impl Engine {
    /// Fetch the record stored under `key`
    ///
    /// Rows appended by an unpublished session are served from memory.
    pub fn get(&self, key: &str) -> Result<Record> {
        let offset = self
            .index
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))? as u64;

        if let Some(record) = self.session.as_ref().and_then(|s| s.pending_at(offset)) {
            return Ok(record.clone());
        }
        SegmentReader::open(&self.paths.active)?.read_at(offset)
    }

    /// Every stored record matching the query's filters, in its sort order
    ///
    /// Loads all rows into memory. A read failure is logged and yields an
    /// empty result.
    pub fn query(&self, query: &Query) -> Vec<Record> {
        let rows = match self.load_rows() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "query failed to read rows, returning empty result");
                return Vec::new();
            }
        };

        let mut matched: Vec<Record> = rows
            .into_iter()
            .filter(|record| matches_filters(query, record))
            .collect();
        sort_records(&mut matched, &query.order_columns);

        debug!(
            filters = query.filter_clause.len(),
            orders = query.order_columns.len(),
            matched = matched.len(),
            "query"
        );
        matched
    }

    /// Active segment rows followed by the rows of an open session
    pub(super) fn load_rows(&self) -> Result<Vec<Record>> {
        // A session with no base rows is either writing the active path
        // itself or was opened over an empty segment
        let read_active = self.session.as_ref().map_or(true, |s| s.base_rows > 0);

        let mut rows = if read_active && segment::row_count(&self.paths.active)? > 0 {
            SegmentReader::open(&self.paths.active)?.read_all()?
        } else {
            Vec::new()
        };
        if let Some(session) = &self.session {
            rows.extend(session.pending.iter().cloned());
        }
        Ok(rows)
    }
}

fn matches_filters(query: &Query, record: &Record) -> bool {
    query
        .filter_clause
        .iter()
        .all(|(name, value)| record.field_value(name).as_ref() == Some(value))
}

/// One full stable sort per column, in listed order
fn sort_records(records: &mut [Record], order_columns: &[String]) {
    for name in order_columns {
        match name.parse::<Column>() {
            Ok(column) => records.sort_by(|a, b| column.compare(a, b)),
            Err(_) => debug!(column = %name, "ignoring unknown order column"),
        }
    }
}
