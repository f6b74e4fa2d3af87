//! Bridges durability's `ReplaySink` contract to the engine's live
//! column-family state: decodes each WAL record's `WriteBatch`, applies
//! it to the right memtable, and performs the incremental flush
//! durability requests when a memtable reports full (spec §4.6 step 5).

use std::collections::HashSet;

use strata_core::error::Result;
use strata_core::SequenceNumber;
use strata_durability::{ApplyResult, ReplaySink};
use strata_storage::{DbPath, TableBuilder, VersionEdit, VersionSet};

use crate::column_family::ColumnFamilyData;
use crate::recovery_flush::flush_column_family;
use crate::write_batch::WriteBatch;

/// Drives replay against a live set of column families, accumulating
/// the `VersionEdit`s produced by incremental flush and tracking which
/// column families were flushed or received any data — both needed by
/// finalization (spec §4.8).
pub struct RecoverySink<'a> {
    column_families: &'a mut Vec<ColumnFamilyData>,
    version_set: &'a mut VersionSet,
    table_builder: &'a dyn TableBuilder,
    db_paths: &'a [DbPath],
    /// Edits produced by incremental flushes during replay.
    pub pending_edits: Vec<VersionEdit>,
    /// Column family ids flushed at least once during replay.
    pub flushed: HashSet<u32>,
    /// Column family ids that received at least one write during replay.
    pub data_seen: HashSet<u32>,
}

impl<'a> RecoverySink<'a> {
    /// Build a sink over the given live column families.
    pub fn new(
        column_families: &'a mut Vec<ColumnFamilyData>,
        version_set: &'a mut VersionSet,
        table_builder: &'a dyn TableBuilder,
        db_paths: &'a [DbPath],
    ) -> Self {
        RecoverySink {
            column_families,
            version_set,
            table_builder,
            db_paths,
            pending_edits: Vec::new(),
            flushed: HashSet::new(),
            data_seen: HashSet::new(),
        }
    }
}

impl ReplaySink for RecoverySink<'_> {
    fn apply_batch(
        &mut self,
        _log_number: u64,
        starting_sequence: SequenceNumber,
        batch: &[u8],
    ) -> Result<ApplyResult> {
        let decoded = WriteBatch::from_bytes(batch)?;
        let mut seq = starting_sequence;
        let mut full = Vec::new();

        for op in decoded.ops {
            if let Some(cf) = self.column_families.iter_mut().find(|cf| cf.id == op.column_family_id) {
                self.data_seen.insert(cf.id);
                if cf.memtable.insert(op.key, op.value, seq) {
                    full.push(cf.id);
                }
            }
            seq = seq.next();
        }

        self.version_set.advance_last_sequence(seq);
        Ok(ApplyResult { next_sequence: seq, full_column_families: full })
    }

    fn flush_full(&mut self, full_column_families: &[u32], current_log_number: u64) -> Result<()> {
        for &cf_id in full_column_families {
            if let Some(cf) = self.column_families.iter_mut().find(|cf| cf.id == cf_id) {
                let file_number = self.version_set.new_file_number();
                if let Some(edit) =
                    flush_column_family(cf, file_number, current_log_number, self.table_builder, self.db_paths)?
                {
                    self.pending_edits.push(edit);
                    self.flushed.insert(cf_id);
                }
            }
        }
        Ok(())
    }

    fn mark_file_number_used(&mut self, n: u64) {
        self.version_set.mark_file_number_used(strata_core::FileNumber(n));
    }

    fn column_family_log_numbers(&self) -> Vec<(u32, u64)> {
        self.version_set.column_families().iter().map(|cf| (cf.id, cf.log_number)).collect()
    }
}
