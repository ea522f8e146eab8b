//! Tests for the Query descriptor builder

use std::collections::BTreeMap;

use viewdb::{FieldValue, Query};

#[test]
fn test_default_query_is_empty() {
    let query = Query::new();
    assert!(query.select_columns.is_empty());
    assert!(query.order_columns.is_empty());
    assert!(query.filter_clause.is_empty());
    assert_eq!(query, Query::default());
}

#[test]
fn test_builder_sets_every_part() {
    let query = Query::new()
        .select(["title", "rev"])
        .order(vec!["rev".to_string(), "title".to_string()])
        .filter("provider", "hbo")
        .filter("view_time", 90i32);

    assert_eq!(query.select_columns, vec!["title", "rev"]);
    assert_eq!(query.order_columns, vec!["rev", "title"]);
    assert_eq!(query.filter_clause.get("provider"), Some(&FieldValue::from("hbo")));
    assert_eq!(query.filter_clause.get("view_time"), Some(&FieldValue::Int(90)));
}

#[test]
fn test_filter_clause_replaces_filters() {
    let mut clause = BTreeMap::new();
    clause.insert("stb".to_string(), FieldValue::from("stb1"));

    let query = Query::new().filter("title", "x").filter_clause(clause.clone());
    assert_eq!(query.filter_clause, clause);
}

#[test]
fn test_repeated_filter_overwrites_column() {
    let query = Query::new().filter("rev", 1.0).filter("rev", 2.0);
    assert_eq!(query.filter_clause.len(), 1);
    assert_eq!(query.filter_clause.get("rev"), Some(&FieldValue::Float(2.0)));
}
