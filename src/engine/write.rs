//! Write path: `put()`, `delete()`, `write_out()` and the copy-on-write
//! rewrite shared by upsert and delete.

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::record::Record;
use crate::segment::{self, SegmentReader, SegmentSlot, SegmentWriter};

use super::Engine;

/// An open segment writer that inserts stream into between publishes
pub(super) struct AppendSession {
    pub(super) writer: SegmentWriter,
    pub(super) target: SegmentSlot,
    /// Rows copied from the active segment when the session opened
    pub(super) base_rows: u64,
    /// Rows appended since the session opened, kept readable
    pub(super) pending: Vec<Record>,
}

impl AppendSession {
    /// Total rows the published segment will hold
    pub(super) fn row_count(&self) -> u64 {
        self.base_rows + self.pending.len() as u64
    }

    /// The appended row at `offset`, if the session holds it
    pub(super) fn pending_at(&self, offset: u64) -> Option<&Record> {
        offset
            .checked_sub(self.base_rows)
            .and_then(|i| self.pending.get(i as usize))
    }

    fn append(&mut self, record: Record) -> Result<u64> {
        let position = self.row_count();
        self.writer.append(&record)?;
        self.pending.push(record);
        Ok(position)
    }
}

impl Engine {
    /// Store a record under its derived key
    ///
    /// - Key absent: append to the open session and index the new row.
    /// - Key present: rewrite the segment without the old row, append the
    ///   new version last, and swap the rewritten segment in.
    pub fn put(&mut self, record: Record) -> Result<()> {
        let key = record.generate_key();
        match self.index.get(&key) {
            None => self.insert(key, record),
            Some(offset) => self.upsert(key, offset, record),
        }
    }

    /// Remove the record stored under `key`
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let offset = self
            .index
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        self.write_out()?;
        let (writer, original_rows) = self.compact_excluding(&[offset])?;
        let meta = writer.finish()?;
        self.index.delete(key)?;
        self.index.sync()?;
        self.paths.swap_files()?;

        debug!(
            key,
            offset,
            rows_before = original_rows,
            rows_after = meta.row_count,
            "deleted record"
        );
        Ok(())
    }

    /// Finish the open session, if any, making its rows durable
    ///
    /// When the session wrote to the swap file, the swap file replaces the
    /// active segment.
    pub fn write_out(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        let target = session.target;
        let meta = session.writer.finish()?;
        // Offsets must be durable before the segment they point into goes live
        self.index.sync()?;
        if target == SegmentSlot::Swap {
            self.paths.swap_files()?;
        }

        debug!(
            rows = meta.row_count,
            bytes = meta.file_size,
            via_swap = target == SegmentSlot::Swap,
            "published segment"
        );
        Ok(())
    }

    fn insert(&mut self, key: String, record: Record) -> Result<()> {
        let position = self.ensure_session()?.append(record)?;
        self.index.put(&key, position as i64)?;
        debug!(key = %key, offset = position, "inserted record");
        Ok(())
    }

    fn upsert(&mut self, key: String, offset: i64, record: Record) -> Result<()> {
        self.write_out()?;

        let (mut writer, original_rows) = self.compact_excluding(&[offset])?;
        let position = writer.rows_written();
        writer.append(&record)?;
        self.index.put(&key, position as i64)?;
        writer.finish()?;
        self.index.sync()?;
        self.paths.swap_files()?;

        debug!(
            key = %key,
            old_offset = offset,
            new_offset = position,
            rows = original_rows,
            "upserted record"
        );
        Ok(())
    }

    fn ensure_session(&mut self) -> Result<&mut AppendSession> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.open_session()?,
        };
        Ok(self.session.insert(session))
    }

    /// Open a writer on the writable target, seeding it with the active rows
    /// when the target is the swap file
    fn open_session(&self) -> Result<AppendSession> {
        let target = self.paths.writable_target();
        let mut writer = SegmentWriter::create(self.paths.path(target), &self.config)?;

        if target == SegmentSlot::Swap && segment::row_count(&self.paths.active)? > 0 {
            for record in SegmentReader::open(&self.paths.active)?.scan()? {
                writer.append(&record?)?;
            }
        }
        let base_rows = writer.rows_written();

        debug!(?target, base_rows, "opened append session");
        Ok(AppendSession {
            writer,
            target,
            base_rows,
            pending: Vec::new(),
        })
    }

    /// Copy the active segment into the swap file, leaving out the rows at
    /// the `skip` offsets
    ///
    /// Every surviving row that moves is re-indexed at its new position.
    /// Returns the still-open writer and the active segment's row count.
    /// Requires a published state (no open session).
    pub(crate) fn compact_excluding(&mut self, skip: &[i64]) -> Result<(SegmentWriter, u64)> {
        if !self.paths.active.exists() {
            return Err(StoreError::Storage(format!(
                "no active segment at {}",
                self.paths.active.display()
            )));
        }

        let reader = SegmentReader::open(&self.paths.active)?;
        let original_rows = reader.row_count();
        let mut writer = SegmentWriter::create(&self.paths.swap, &self.config)?;

        let mut skipped: i64 = 0;
        for (position, record) in reader.scan()?.enumerate() {
            let record = record?;
            let position = position as i64;
            if skip.contains(&position) {
                skipped += 1;
                continue;
            }
            writer.append(&record)?;
            if skipped > 0 {
                self.index.put(&record.generate_key(), position - skipped)?;
            }
        }

        debug!(
            original_rows,
            skipped,
            survivors = writer.rows_written(),
            "replicated active segment"
        );
        Ok((writer, original_rows))
    }
}
