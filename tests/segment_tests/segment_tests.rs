//! Tests for segment files
//!
//! These tests verify:
//! - Writing records and reading them back by offset and by scan
//! - Row counts for missing, empty and populated files
//! - Active/swap slot selection and swapping

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use viewdb::segment::{
    self, records_to_batch, batch_to_records, SegmentPaths, SegmentReader, SegmentSlot,
    SegmentWriter, ACTIVE_FILENAME,
};
use viewdb::{Config, Record};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_segment() -> (TempDir, PathBuf, Config) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(ACTIVE_FILENAME);
    // Small batches and row groups so multi-group reads are exercised
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .write_batch_rows(7)
        .row_group_size(16)
        .build();
    (temp_dir, path, config)
}

fn record(i: usize) -> Record {
    Record::new(
        format!("stb{}", i % 5),
        format!("title{}", i),
        format!("provider{}", i % 3),
        1_600_000_000 + i as i64 * 86_400,
        i as f64 * 0.25,
        i as i32,
    )
}

fn write_segment(path: &std::path::Path, config: &Config, rows: usize) -> u64 {
    let mut writer = SegmentWriter::create(path, config).unwrap();
    for i in 0..rows {
        writer.append(&record(i)).unwrap();
    }
    writer.finish().unwrap().row_count
}

// =============================================================================
// Batch Conversion Tests
// =============================================================================

#[test]
fn test_batch_conversion_preserves_fields() {
    let records: Vec<Record> = (0..4).map(record).collect();
    let batch = records_to_batch(&records).unwrap();

    assert_eq!(batch.num_rows(), 4);
    assert_eq!(batch.num_columns(), 6);
    assert_eq!(batch_to_records(&batch).unwrap(), records);
}

// =============================================================================
// Writer / Reader Tests
// =============================================================================

#[test]
fn test_write_and_read_at() {
    let (_temp, path, config) = setup_temp_segment();
    assert_eq!(write_segment(&path, &config, 50), 50);

    let reader = SegmentReader::open(&path).unwrap();
    assert_eq!(reader.row_count(), 50);
    for offset in [0u64, 1, 6, 7, 15, 16, 17, 49] {
        assert_eq!(reader.read_at(offset).unwrap(), record(offset as usize));
    }
}

#[test]
fn test_read_at_out_of_range() {
    let (_temp, path, config) = setup_temp_segment();
    write_segment(&path, &config, 3);

    let reader = SegmentReader::open(&path).unwrap();
    assert!(reader.read_at(3).is_err());
}

#[test]
fn test_scan_preserves_order() {
    let (_temp, path, config) = setup_temp_segment();
    write_segment(&path, &config, 40);

    let reader = SegmentReader::open(&path).unwrap();
    let rows: Vec<Record> = reader.scan().unwrap().map(|r| r.unwrap()).collect();
    let expected: Vec<Record> = (0..40).map(record).collect();
    assert_eq!(rows, expected);
    assert_eq!(reader.read_all().unwrap(), expected);
}

#[test]
fn test_finish_reports_meta() {
    let (_temp, path, config) = setup_temp_segment();
    let mut writer = SegmentWriter::create(&path, &config).unwrap();
    writer.append(&record(0)).unwrap();
    writer.append(&record(1)).unwrap();
    assert_eq!(writer.rows_written(), 2);

    let meta = writer.finish().unwrap();
    assert_eq!(meta.row_count, 2);
    assert_eq!(meta.path, path);
    assert_eq!(meta.file_size, fs::metadata(&path).unwrap().len());
}

#[test]
fn test_empty_segment_is_readable() {
    let (_temp, path, config) = setup_temp_segment();
    assert_eq!(write_segment(&path, &config, 0), 0);

    let reader = SegmentReader::open(&path).unwrap();
    assert_eq!(reader.row_count(), 0);
    assert!(reader.read_all().unwrap().is_empty());
    assert_eq!(segment::row_count(&path).unwrap(), 0);
}

#[test]
fn test_open_rejects_garbage() {
    let (_temp, path, _config) = setup_temp_segment();
    fs::write(&path, b"definitely not a parquet file").unwrap();
    assert!(SegmentReader::open(&path).is_err());
}

// =============================================================================
// Row Count Probe Tests
// =============================================================================

#[test]
fn test_row_count_missing_or_tiny_file() {
    let (_temp, path, _config) = setup_temp_segment();
    assert_eq!(segment::row_count(&path).unwrap(), 0);

    fs::write(&path, b"PAR1").unwrap();
    assert_eq!(segment::row_count(&path).unwrap(), 0);
}

#[test]
fn test_row_count_populated() {
    let (_temp, path, config) = setup_temp_segment();
    write_segment(&path, &config, 21);
    assert_eq!(segment::row_count(&path).unwrap(), 21);
}

// =============================================================================
// Slot Tests
// =============================================================================

#[test]
fn test_writable_target_and_swap() {
    let (temp, _path, config) = setup_temp_segment();
    let paths = SegmentPaths::new(temp.path());

    assert_eq!(paths.writable_target(), SegmentSlot::Active);
    write_segment(paths.path(SegmentSlot::Active), &config, 2);
    assert_eq!(paths.writable_target(), SegmentSlot::Swap);

    write_segment(paths.path(SegmentSlot::Swap), &config, 5);
    paths.swap_files().unwrap();

    assert!(!paths.swap.exists());
    assert_eq!(segment::row_count(&paths.active).unwrap(), 5);
}

#[test]
fn test_swap_without_active() {
    let (temp, _path, config) = setup_temp_segment();
    let paths = SegmentPaths::new(temp.path());

    write_segment(&paths.swap, &config, 3);
    paths.swap_files().unwrap();
    assert_eq!(segment::row_count(&paths.active).unwrap(), 3);
}
