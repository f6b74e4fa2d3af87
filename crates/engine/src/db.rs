//! `Db::open` — the full open/recover pipeline (spec §2), wiring option
//! sanitization, directory and lock acquisition, bootstrap-or-recover,
//! WAL discovery and replay, recovery-time flush, a single finalizing
//! `LogAndApply`, persistent-stats reconciliation, and the go-live
//! handshake into one sequenced call. Grounded on the teacher's
//! `database/mod.rs::Database::open_with_mode` shape, with the
//! transaction-coordinator and background-flush machinery it carried
//! replaced by this spec's narrower recovery core.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use strata_core::error::{Error, Result};
use strata_core::FileNumber;
use strata_durability::{replay, WALRecoveryMode};
use strata_storage::{
    bootstrap, current_exists, read_identity, reconcile, ColumnFamilyDescriptor, ColumnFamilyOptions,
    DbLock, DirectoryManager, FlatTableBuilder, VersionEdit, VersionSet, PERSISTENT_STATS_CF_NAME,
};

use crate::column_family::{ColumnFamilyData, SuperVersion};
use crate::golive::go_live;
use crate::options::{sanitize, validate, Options};
use crate::persistent_stats::reconcile_persistent_stats_cf;
use crate::recovery::RecoverySink;
use crate::recovery_flush::flush_column_family;

/// A handle to an opened database. Holds the single process-local mutex
/// serializing all recovery-time state changes (spec §5: "the db
/// mutex"); no background work is scheduled from this crate, so once
/// `open` returns, nothing else touches this state concurrently.
pub struct Db {
    state: Mutex<DbState>,
}

struct DbState {
    dbname: PathBuf,
    version_set: VersionSet,
    column_families: Vec<ColumnFamilyData>,
    super_versions: Vec<SuperVersion>,
    #[allow(dead_code)]
    directories: DirectoryManager,
    #[allow(dead_code)]
    lock: DbLock,
    options: Options,
    wal_file_number: u64,
}

impl Db {
    /// Open (bootstrapping if necessary) the database at `dbname` with
    /// `options`, requesting the column families in `descriptors`.
    pub fn open(dbname: &Path, mut options: Options, descriptors: Vec<ColumnFamilyDescriptor>) -> Result<Db> {
        sanitize(&mut options, dbname);
        validate(&options, &descriptors)?;

        let wal_dir = options.wal_dir.clone().expect("sanitize fills wal_dir");

        let directories = DirectoryManager::ensure(dbname, &wal_dir, &options.db_paths)?;
        let lock = DbLock::acquire(dbname)?;

        let exists = current_exists(dbname);
        if !exists {
            if !options.create_if_missing {
                return Err(Error::invalid_argument(format!(
                    "database {} does not exist and create_if_missing is false",
                    dbname.display()
                )));
            }
            bootstrap(dbname, options.write_dbid_to_manifest)?;
        } else if options.error_if_exists {
            return Err(Error::invalid_argument(format!("database {} already exists", dbname.display())));
        }

        let mut version_set = VersionSet::recover(dbname, &descriptors)?;

        let manifest_db_id = version_set.db_id().map(|s| s.to_string());
        if let Some(id_to_persist) = reconcile(dbname, manifest_db_id.as_deref(), options.write_dbid_to_manifest)? {
            let mut edit = VersionEdit::new(0);
            edit.db_id = Some(id_to_persist);
            version_set.log_and_apply(vec![edit], false)?;
        }

        let db_id = version_set
            .db_id()
            .map(|s| s.to_string())
            .or_else(|| read_identity(dbname).ok())
            .unwrap_or_else(|| "00000000-0000-0000-0000-000000000000".to_string());

        let mut column_families: Vec<ColumnFamilyData> = descriptors
            .iter()
            .map(|d| {
                let state = version_set
                    .column_family(&d.name)
                    .expect("validate() already required every descriptor to exist in the manifest");
                ColumnFamilyData::new(state.id, d.name.clone(), d.options.clone(), state.log_number)
            })
            .collect();

        let min_log_number_to_keep = column_families.iter().map(|cf| cf.log_number).min().unwrap_or(0);

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let table_builder = FlatTableBuilder::new(now);

        let replay_stats = {
            let mut sink =
                RecoverySink::new(&mut column_families, &mut version_set, &table_builder, &options.db_paths);
            let stats = replay(
                &wal_dir,
                min_log_number_to_keep,
                options.wal_recovery_mode,
                options.wal_filter.as_deref(),
                &mut sink,
            )?;
            pending_edits_into(stats, sink)
        };

        let (mut pending_edits, flushed, logs_replayed) = replay_stats;

        // Finalization (spec §4.8).
        let max_log_number = logs_replayed.iter().copied().max().unwrap_or(0);
        let new_log_number = version_set.new_file_number().0;

        for cf in column_families.iter_mut() {
            if cf.log_number > max_log_number {
                continue;
            }
            let already_flushed = flushed.contains(&cf.id);
            if !already_flushed && !cf.memtable.is_empty() && !options.avoid_flush_during_recovery {
                let file_number = version_set.new_file_number();
                if let Some(edit) =
                    flush_column_family(cf, file_number, new_log_number, &table_builder, &options.db_paths)?
                {
                    pending_edits.push(edit);
                }
            } else if already_flushed || cf.memtable.is_empty() {
                let mut edit = VersionEdit::new(cf.id);
                edit.log_number = Some(new_log_number);
                pending_edits.push(edit);
                cf.log_number = new_log_number;
            }
            // Else: avoid_flush_during_recovery kept unflushed data in
            // memory; log_number stays put so its WAL is retained.
        }

        version_set.mark_file_number_used(FileNumber(new_log_number));
        version_set.log_and_apply(pending_edits, true)?;

        // A prior open's `__system_stats__` cf, if any, carries no data into
        // this one: recovery never reads SST content back (spec §4.7's
        // `TableBuilder` has no matching reader), so its version keys are
        // only ever visible for the lifetime of the session that wrote
        // them. The probe below is built from the manifest entry alone and
        // so always treats a pre-existing cf as unreadable.
        let existing_stats_cf = version_set.column_family(PERSISTENT_STATS_CF_NAME).map(|state| {
            ColumnFamilyData::new(state.id, PERSISTENT_STATS_CF_NAME, ColumnFamilyOptions::default(), state.log_number)
        });
        if let Some(reconciliation) =
            reconcile_persistent_stats_cf(&version_set, existing_stats_cf.as_ref(), options.persist_stats_to_disk)
        {
            version_set.log_and_apply(reconciliation.edits, false)?;
            let state = version_set.column_family(PERSISTENT_STATS_CF_NAME).expect("just created");
            let mut cf =
                ColumnFamilyData::new(state.id, PERSISTENT_STATS_CF_NAME, ColumnFamilyOptions::default(), state.log_number);
            // Either branch lands here with a brand-new, empty cf (a fresh
            // create, or the old entry just dropped and replaced), so the
            // version keys are seeded unconditionally.
            crate::persistent_stats::seed_version_keys(&mut cf);
            column_families.push(cf);
        }

        let go_live_result = go_live(
            dbname,
            &wal_dir,
            &directories,
            &version_set,
            &column_families,
            &descriptors,
            &options,
            &db_id,
            new_log_number,
        )?;

        // Best-effort deletion of WALs made obsolete by finalization
        // (spec §4.9 "delete obsolete files"). Never fails open.
        let retain_floor = column_families.iter().map(|cf| cf.log_number).min().unwrap_or(new_log_number);
        for number in strata_durability::list_wal_numbers(&wal_dir).unwrap_or_default() {
            if number < retain_floor {
                let path = strata_durability::wal_path(&wal_dir, number);
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove obsolete WAL file");
                }
            }
        }

        Ok(Db {
            state: Mutex::new(DbState {
                dbname: dbname.to_path_buf(),
                version_set,
                column_families,
                super_versions: go_live_result.super_versions,
                directories,
                lock,
                options,
                wal_file_number: go_live_result.wal_file_number,
            }),
        })
    }

    /// The database directory this handle was opened against.
    pub fn dbname(&self) -> PathBuf {
        self.state.lock().dbname.clone()
    }

    /// The `last_sequence` watermark after open.
    pub fn last_sequence(&self) -> strata_core::SequenceNumber {
        self.state.lock().version_set.last_sequence()
    }

    /// Number of column families currently live.
    pub fn column_family_count(&self) -> usize {
        self.state.lock().column_families.len()
    }

    /// The live WAL's file number, as installed at go-live.
    pub fn wal_file_number(&self) -> u64 {
        self.state.lock().wal_file_number
    }

    /// Number of super-versions installed at go-live (one per cf).
    pub fn super_version_count(&self) -> usize {
        self.state.lock().super_versions.len()
    }

    /// The recovery-mode option this database was opened with.
    pub fn wal_recovery_mode(&self) -> WALRecoveryMode {
        self.state.lock().options.wal_recovery_mode
    }
}

type ReplayFold = (Vec<VersionEdit>, std::collections::HashSet<u32>, Vec<u64>);

fn pending_edits_into(stats: strata_durability::ReplayStats, sink: RecoverySink<'_>) -> ReplayFold {
    (sink.pending_edits, sink.flushed, stats.logs_replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_open_bootstraps_and_goes_live() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().join("db");
        let mut options = Options { create_if_missing: true, ..Options::default() };
        sanitize(&mut options, &dbname);

        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let db = Db::open(&dbname, options, descriptors).unwrap();

        assert_eq!(db.last_sequence(), strata_core::SequenceNumber::ZERO);
        assert_eq!(db.column_family_count(), 1);
        assert_eq!(db.super_version_count(), 1);
        assert!(dbname.join("CURRENT").exists());
        assert!(dbname.join("IDENTITY").exists());
        assert!(dbname.join("OPTIONS").exists());
    }

    #[test]
    fn missing_db_without_create_if_missing_fails() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().join("db");
        let options = Options::default();
        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let result = Db::open(&dbname, options, descriptors);
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn reopen_preserves_last_sequence() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().join("db");
        let mut options = Options { create_if_missing: true, ..Options::default() };
        sanitize(&mut options, &dbname);
        {
            let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
            let db = Db::open(&dbname, options.clone(), descriptors).unwrap();
            assert_eq!(db.last_sequence(), strata_core::SequenceNumber::ZERO);
        }

        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let db2 = Db::open(&dbname, options, descriptors).unwrap();
        assert_eq!(db2.last_sequence(), strata_core::SequenceNumber::ZERO);
    }

    #[test]
    fn error_if_exists_rejects_reopen() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().join("db");
        let mut options = Options { create_if_missing: true, ..Options::default() };
        sanitize(&mut options, &dbname);
        {
            let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
            Db::open(&dbname, options.clone(), descriptors).unwrap();
        }

        let mut reopen_options = options;
        reopen_options.error_if_exists = true;
        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let result = Db::open(&dbname, reopen_options, descriptors);
        assert!(result.is_err());
    }
}
