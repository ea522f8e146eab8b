//! Tests for Record
//!
//! These tests verify:
//! - Key derivation (FNV-1a over stb + title + date)
//! - Field lookup by column name
//! - Column comparators and value parsing

use std::cmp::Ordering;

use viewdb::record::fnv1a_64;
use viewdb::{Column, FieldValue, Record};

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_record() -> Record {
    Record::new("stb1", "the matrix", "warner bros", 1_396_310_400, 4.0, 90)
}

// =============================================================================
// Key Derivation Tests
// =============================================================================

#[test]
fn test_fnv1a_known_vectors() {
    assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
    assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
}

#[test]
fn test_key_is_lowercase_hex_of_hash() {
    let record = sample_record();
    let expected = format!("{:x}", fnv1a_64(b"stb1the matrix1396310400"));
    assert_eq!(record.generate_key(), expected);
    assert!(record
        .generate_key()
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}

#[test]
fn test_key_is_deterministic() {
    let a = sample_record();
    let b = sample_record();
    assert_eq!(a.generate_key(), b.generate_key());
}

#[test]
fn test_key_ignores_provider_rev_and_view_time() {
    let a = sample_record();
    let b = Record::new("stb1", "the matrix", "other", 1_396_310_400, 99.5, 5);
    assert_eq!(a.generate_key(), b.generate_key());
}

#[test]
fn test_key_changes_with_identity_fields() {
    let base = sample_record();

    let mut other_stb = base.clone();
    other_stb.stb = "stb2".into();
    let mut other_title = base.clone();
    other_title.title = "the matrix reloaded".into();
    let mut other_date = base.clone();
    other_date.date += 86_400;

    assert_ne!(base.generate_key(), other_stb.generate_key());
    assert_ne!(base.generate_key(), other_title.generate_key());
    assert_ne!(base.generate_key(), other_date.generate_key());
}

// =============================================================================
// Field Access Tests
// =============================================================================

#[test]
fn test_field_value_by_name() {
    let record = sample_record();
    assert_eq!(record.field_value("stb"), Some(FieldValue::from("stb1")));
    assert_eq!(record.field_value("provider"), Some(FieldValue::from("warner bros")));
    assert_eq!(record.field_value("date"), Some(FieldValue::Int(1_396_310_400)));
    assert_eq!(record.field_value("rev"), Some(FieldValue::Float(4.0)));
    assert_eq!(record.field_value("view_time"), Some(FieldValue::Int(90)));
}

#[test]
fn test_field_value_unknown_name() {
    let record = sample_record();
    assert_eq!(record.field_value("nope"), None);
    assert_eq!(record.field_value("STB"), None);
}

#[test]
fn test_display_is_pipe_delimited() {
    let record = sample_record();
    assert_eq!(record.to_string(), "stb1|the matrix|warner bros|1396310400|4|90");
}

// =============================================================================
// Column Tests
// =============================================================================

#[test]
fn test_column_names_round_trip() {
    for column in Column::ALL {
        assert_eq!(column.name().parse::<Column>().unwrap(), column);
    }
    assert!("unknown".parse::<Column>().is_err());
}

#[test]
fn test_compare_per_type() {
    let low = Record::new("a", "b", "c", 1, 1.5, 10);
    let high = Record::new("b", "a", "c", 2, 2.5, 9);

    assert_eq!(Column::Stb.compare(&low, &high), Ordering::Less);
    assert_eq!(Column::Title.compare(&low, &high), Ordering::Greater);
    assert_eq!(Column::Provider.compare(&low, &high), Ordering::Equal);
    assert_eq!(Column::Date.compare(&low, &high), Ordering::Less);
    assert_eq!(Column::Rev.compare(&low, &high), Ordering::Less);
    assert_eq!(Column::ViewTime.compare(&low, &high), Ordering::Greater);
}

#[test]
fn test_rev_compare_total_with_nan() {
    let nan = Record::new("a", "a", "a", 0, f64::NAN, 0);
    let one = Record::new("a", "a", "a", 0, 1.0, 0);
    assert_eq!(Column::Rev.compare(&nan, &nan), Ordering::Equal);
    assert_eq!(Column::Rev.compare(&one, &nan), Ordering::Less);
}

#[test]
fn test_parse_value_types_by_column() {
    assert_eq!(Column::Title.parse_value("x").unwrap(), FieldValue::from("x"));
    assert_eq!(Column::Date.parse_value("42").unwrap(), FieldValue::Int(42));
    assert_eq!(Column::ViewTime.parse_value(" 7 ").unwrap(), FieldValue::Int(7));
    assert_eq!(Column::Rev.parse_value("4.5").unwrap(), FieldValue::Float(4.5));

    let err = Column::Date.parse_value("yesterday").unwrap_err();
    assert!(matches!(err, viewdb::StoreError::Parse(_)));
}
