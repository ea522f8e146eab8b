//! Query descriptor
//!
//! Immutable description of a bulk read: selected columns, equality filters
//! and sort columns. Evaluation lives in the engine.

use std::collections::BTreeMap;

use crate::record::FieldValue;

/// Filter/sort request passed to [`Engine::query`](crate::Engine::query)
///
/// - `select_columns` is informational; the engine always returns whole records.
/// - Every `filter_clause` entry must equal the record's field (clauses are ANDed).
/// - Each of `order_columns` is applied as a full stable sort, in order, so the
///   last listed column is the primary sort key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub select_columns: Vec<String>,
    pub order_columns: Vec<String>,
    pub filter_clause: BTreeMap<String, FieldValue>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn order<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the whole filter clause
    pub fn filter_clause(mut self, clause: BTreeMap<String, FieldValue>) -> Self {
        self.filter_clause = clause;
        self
    }

    /// Add one equality clause
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filter_clause.insert(column.into(), value.into());
        self
    }
}
