//! Tests for Engine startup recovery
//!
//! These tests verify:
//! - Orphaned swap segments are discarded and the index rebuilt
//! - A swap segment left without an active one is promoted
//! - Unfinished active segments are moved aside, damaged finished ones refuse
//!   to open, and I/O errors are returned
//! - Index entries pointing past the segment are repaired
//! - Lost index log frames trigger a rebuild

use std::fs;
use std::mem;
use std::path::Path;

use tempfile::TempDir;
use viewdb::index::{KeyIndex, HEADER_SIZE};
use viewdb::segment::{SegmentPaths, SegmentWriter, ACTIVE_FILENAME, QUARANTINE_INFIX};
use viewdb::{Config, Engine, Query, Record, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(dir: &Path) -> Config {
    Config::builder().data_dir(dir).write_batch_rows(2).build()
}

fn open_engine(dir: &Path) -> Engine {
    Engine::open(config_for(dir)).unwrap()
}

fn numbered(i: usize) -> Record {
    Record::new(
        format!("stb{}", i),
        format!("title{}", i),
        "provider",
        1_700_000_000,
        i as f64,
        i as i32,
    )
}

/// Store rows 0..count and close cleanly
fn populate(dir: &Path, count: usize) {
    let mut engine = open_engine(dir);
    for i in 0..count {
        engine.put(numbered(i)).unwrap();
    }
    engine.close().unwrap();
}

fn assert_consistent(engine: &Engine) {
    let report = engine.check_consistency().unwrap();
    assert!(report.is_consistent(), "inconsistent index: {:?}", report);
}

/// Files in `dir` the active segment was moved aside to
fn quarantined_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let prefix = format!("{}{}", ACTIVE_FILENAME, QUARANTINE_INFIX);
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.starts_with(&prefix))
        })
        .collect()
}

/// Flip the last body byte of the `n`th (1-based) index log frame
fn corrupt_log_frame(dir: &Path, n: usize) {
    let path = dir.join(KeyIndex::LOG_FILENAME);
    let mut bytes = fs::read(&path).unwrap();

    let mut pos = 0;
    for _ in 1..n {
        let len = u32::from_le_bytes(bytes[pos + 12..pos + 16].try_into().unwrap()) as usize;
        pos += HEADER_SIZE + len;
    }
    let len = u32::from_le_bytes(bytes[pos + 12..pos + 16].try_into().unwrap()) as usize;
    bytes[pos + HEADER_SIZE + len - 1] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();
}

// =============================================================================
// Swap File Recovery Tests
// =============================================================================

#[test]
fn test_orphaned_swap_is_removed() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 5);

    let paths = SegmentPaths::new(temp.path());
    let mut writer = SegmentWriter::create(&paths.swap, &config_for(temp.path())).unwrap();
    writer.append(&numbered(99)).unwrap();
    writer.finish().unwrap();

    let engine = open_engine(temp.path());
    assert!(!paths.swap.exists());
    assert_eq!(engine.row_count().unwrap(), 5);
    assert_eq!(engine.index_len(), 5);
    assert!(engine.get(&numbered(99).generate_key()).is_err());
    assert_consistent(&engine);
}

#[test]
fn test_swap_without_active_is_promoted() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 4);

    let paths = SegmentPaths::new(temp.path());
    fs::rename(&paths.active, &paths.swap).unwrap();

    let engine = open_engine(temp.path());
    assert!(paths.active.exists());
    assert!(!paths.swap.exists());
    for i in 0..4 {
        assert_eq!(engine.get(&numbered(i).generate_key()).unwrap(), numbered(i));
    }
    assert_consistent(&engine);
}

#[test]
fn test_interrupted_second_session_is_discarded() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 3);
    {
        let mut engine = open_engine(temp.path());
        engine.put(numbered(10)).unwrap();
        engine.put(numbered(11)).unwrap();
        // Simulate a crash: the session writer is never finished
        mem::forget(engine);
    }

    let engine = open_engine(temp.path());
    assert_eq!(engine.row_count().unwrap(), 3);
    assert_eq!(engine.index_len(), 3);
    assert!(engine.get(&numbered(10).generate_key()).unwrap_err().is_not_found());
    assert_consistent(&engine);
}

// =============================================================================
// Active Segment Recovery Tests
// =============================================================================

#[test]
fn test_unfinished_first_session_is_discarded() {
    let temp = TempDir::new().unwrap();
    {
        let mut engine = open_engine(temp.path());
        for i in 0..5 {
            engine.put(numbered(i)).unwrap();
        }
        mem::forget(engine);
    }

    let mut engine = open_engine(temp.path());
    assert_eq!(engine.index_len(), 0);
    assert_eq!(engine.row_count().unwrap(), 0);
    assert!(engine.query(&Query::new()).is_empty());

    engine.put(numbered(0)).unwrap();
    assert_eq!(engine.get(&numbered(0).generate_key()).unwrap(), numbered(0));
}

#[test]
fn test_garbage_active_is_moved_aside() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 3);

    let paths = SegmentPaths::new(temp.path());
    let garbage = b"this is not a segment file at all";
    fs::write(&paths.active, garbage).unwrap();

    let engine = open_engine(temp.path());
    assert!(!paths.active.exists());
    assert_eq!(engine.index_len(), 0);

    let moved = quarantined_files(temp.path());
    assert_eq!(moved.len(), 1);
    assert_eq!(fs::read(&moved[0]).unwrap(), garbage);
}

#[test]
fn test_segment_missing_trailing_magic_is_kept_aside() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 5);

    let paths = SegmentPaths::new(temp.path());
    let mut bytes = fs::read(&paths.active).unwrap();
    bytes.pop();
    fs::write(&paths.active, &bytes).unwrap();

    let mut engine = open_engine(temp.path());
    assert!(!paths.active.exists());
    assert_eq!(engine.index_len(), 0);

    let moved = quarantined_files(temp.path());
    assert_eq!(moved.len(), 1);
    assert_eq!(fs::read(&moved[0]).unwrap(), bytes);

    engine.put(numbered(0)).unwrap();
    engine.write_out().unwrap();
    assert_eq!(engine.row_count().unwrap(), 1);
}

#[test]
fn test_damaged_finished_segment_refuses_to_open() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 5);

    // Corrupt the footer length but keep the trailing magic
    let paths = SegmentPaths::new(temp.path());
    let mut bytes = fs::read(&paths.active).unwrap();
    let len = bytes.len();
    bytes[len - 8..len - 4].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(&paths.active, &bytes).unwrap();

    let err = Engine::open(config_for(temp.path())).err().unwrap();
    assert!(matches!(err, StoreError::Storage(_)), "unexpected error: {}", err);
    assert_eq!(fs::read(&paths.active).unwrap(), bytes);
    assert!(quarantined_files(temp.path()).is_empty());
}

#[test]
fn test_unreadable_active_path_returns_io_error() {
    let temp = TempDir::new().unwrap();
    let paths = SegmentPaths::new(temp.path());
    fs::create_dir(&paths.active).unwrap();

    let err = Engine::open(config_for(temp.path())).err().unwrap();
    assert!(matches!(err, StoreError::Io(_)), "unexpected error: {}", err);
    assert!(paths.active.is_dir());
}

#[test]
fn test_missing_active_clears_index() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 3);
    fs::remove_file(SegmentPaths::new(temp.path()).active).unwrap();

    let engine = open_engine(temp.path());
    assert_eq!(engine.index_len(), 0);
    assert_eq!(engine.row_count().unwrap(), 0);
}

#[test]
fn test_index_past_segment_is_rebuilt() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 6);

    // Replace the active segment with a shorter one holding rows 0 and 1
    let paths = SegmentPaths::new(temp.path());
    let mut writer = SegmentWriter::create(&paths.active, &config_for(temp.path())).unwrap();
    writer.append(&numbered(0)).unwrap();
    writer.append(&numbered(1)).unwrap();
    writer.finish().unwrap();

    let engine = open_engine(temp.path());
    assert_eq!(engine.index_len(), 2);
    assert_eq!(engine.get(&numbered(1).generate_key()).unwrap(), numbered(1));
    assert!(engine.get(&numbered(5).generate_key()).unwrap_err().is_not_found());
    assert_consistent(&engine);
}

#[test]
fn test_lost_log_frame_rebuilds_index() {
    let temp = TempDir::new().unwrap();
    {
        let mut engine = open_engine(temp.path());
        for i in 0..3 {
            engine.put(numbered(i)).unwrap();
        }
        engine.write_out().unwrap();
        // Frames: put 0, put 1, put 2, then 1 -> 0, 2 -> 1, delete 0
        engine.delete(&numbered(0).generate_key()).unwrap();
        drop(engine);
    }
    corrupt_log_frame(temp.path(), 4);

    let engine = open_engine(temp.path());
    assert_eq!(engine.index().recovery().entries_corrupted, 1);
    assert_eq!(engine.index_len(), 2);
    assert_eq!(engine.get(&numbered(1).generate_key()).unwrap(), numbered(1));
    assert_eq!(engine.get(&numbered(2).generate_key()).unwrap(), numbered(2));
    assert_consistent(&engine);
    drop(engine);

    // The rebuild checkpointed, so the damaged frame is gone
    let engine = open_engine(temp.path());
    assert_eq!(engine.index().recovery().entries_corrupted, 0);
    assert_consistent(&engine);
}

#[test]
fn test_clean_reopen_keeps_everything() {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 7);

    for _ in 0..2 {
        let engine = open_engine(temp.path());
        assert_eq!(engine.index_len(), 7);
        assert_eq!(engine.row_count().unwrap(), 7);
        assert_consistent(&engine);
    }
}
