//! End-to-end open/recover scenarios (spec §8): fresh open, clean reopen,
//! a simulated crash with committed-but-unflushed WAL data, a torn WAL
//! tail under the default and strictest recovery modes, and rejection of
//! an option combination the open path cannot honor.

use strata_core::SequenceNumber;
use strata_durability::{wal_path, WALRecoveryMode, WalFile, WalRecord};
use strata_engine::{sanitize, Db, Options, WriteBatch};
use strata_storage::{ColumnFamilyDescriptor, DbPath};
use tempfile::tempdir;

fn default_cf() -> Vec<ColumnFamilyDescriptor> {
    vec![ColumnFamilyDescriptor::default_cf()]
}

fn open_options(dbname: &std::path::Path) -> Options {
    let mut options = Options { create_if_missing: true, ..Options::default() };
    sanitize(&mut options, dbname);
    options
}

#[test]
fn fresh_open_produces_exactly_one_live_wal() {
    let dir = tempdir().unwrap();
    let dbname = dir.path().join("db");
    let options = open_options(&dbname);

    let db = Db::open(&dbname, options, default_cf()).unwrap();
    assert_eq!(db.last_sequence(), SequenceNumber::ZERO);

    let logs: Vec<_> = std::fs::read_dir(&dbname)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".log"))
        .collect();
    assert_eq!(logs.len(), 1, "fresh open should leave exactly one WAL file behind");
}

#[test]
fn clean_reopen_rotates_to_a_single_new_wal() {
    let dir = tempdir().unwrap();
    let dbname = dir.path().join("db");
    let options = open_options(&dbname);

    let first_wal = {
        let db = Db::open(&dbname, options.clone(), default_cf()).unwrap();
        db.wal_file_number()
    };

    let db2 = Db::open(&dbname, options, default_cf()).unwrap();
    assert_ne!(db2.wal_file_number(), first_wal, "reopen must allocate a fresh WAL");
    assert!(!wal_path(&dbname, first_wal).exists(), "the superseded WAL should be cleaned up");
    assert!(wal_path(&dbname, db2.wal_file_number()).exists());

    let logs: Vec<_> = std::fs::read_dir(&dbname)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".log"))
        .collect();
    assert_eq!(logs.len(), 1);
}

/// Simulates a process crash after two committed batches reached the WAL
/// but before the next clean shutdown: append two valid records directly
/// to the WAL the first open installed, then reopen and confirm both are
/// replayed into `last_sequence`.
#[test]
fn crash_after_two_batches_replays_on_reopen() {
    let dir = tempdir().unwrap();
    let dbname = dir.path().join("db");
    let options = open_options(&dbname);

    let wal_number = {
        let db = Db::open(&dbname, options.clone(), default_cf()).unwrap();
        db.wal_file_number()
    };

    {
        let mut batch1 = WriteBatch::empty();
        batch1.put(0, b"k1".to_vec(), b"v1".to_vec());
        let mut batch2 = WriteBatch::empty();
        batch2.put(0, b"k2".to_vec(), b"v2".to_vec());

        let mut wal = WalFile::open_append(&dbname, wal_number).unwrap();
        wal.append_record(&WalRecord::new(SequenceNumber(1), batch1.to_bytes())).unwrap();
        wal.append_record(&WalRecord::new(SequenceNumber(2), batch2.to_bytes())).unwrap();
        wal.sync().unwrap();
    }

    let db2 = Db::open(&dbname, options, default_cf()).unwrap();
    assert_eq!(db2.last_sequence(), SequenceNumber(3));
}

/// A torn tail (a record whose declared length outruns the bytes
/// actually on disk) is tolerated under the default recovery mode: the
/// good prefix is kept and open succeeds.
#[test]
fn torn_tail_tolerated_under_default_mode() {
    let dir = tempdir().unwrap();
    let dbname = dir.path().join("db");
    let options = open_options(&dbname);

    let wal_number = {
        let db = Db::open(&dbname, options.clone(), default_cf()).unwrap();
        db.wal_file_number()
    };

    {
        let mut batch = WriteBatch::empty();
        batch.put(0, b"k".to_vec(), b"v".to_vec());
        let mut wal = WalFile::open_append(&dbname, wal_number).unwrap();
        wal.append_record(&WalRecord::new(SequenceNumber(1), batch.to_bytes())).unwrap();
        wal.sync().unwrap();
    }

    let path = wal_path(&dbname, wal_number);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(&[9, 9, 9, 9]); // declares a length the file doesn't have
    std::fs::write(&path, bytes).unwrap();

    let db2 = Db::open(&dbname, options, default_cf()).unwrap();
    assert_eq!(db2.last_sequence(), SequenceNumber(2));
}

/// The same torn tail is fatal under `AbsoluteConsistency`.
#[test]
fn torn_tail_rejected_under_absolute_consistency() {
    let dir = tempdir().unwrap();
    let dbname = dir.path().join("db");
    let options = open_options(&dbname);

    let wal_number = {
        let db = Db::open(&dbname, options.clone(), default_cf()).unwrap();
        db.wal_file_number()
    };

    {
        let mut batch = WriteBatch::empty();
        batch.put(0, b"k".to_vec(), b"v".to_vec());
        let mut wal = WalFile::open_append(&dbname, wal_number).unwrap();
        wal.append_record(&WalRecord::new(SequenceNumber(1), batch.to_bytes())).unwrap();
        wal.sync().unwrap();
    }

    let path = wal_path(&dbname, wal_number);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(&[9, 9, 9, 9]);
    std::fs::write(&path, bytes).unwrap();

    let mut strict_options = options;
    strict_options.wal_recovery_mode = WALRecoveryMode::AbsoluteConsistency;
    let result = Db::open(&dbname, strict_options, default_cf());
    assert!(result.is_err());
}

/// `db_paths.len() == 4` is accepted; `== 5` is rejected `NotSupported`
/// (spec §8 boundary behavior).
#[test]
fn five_db_paths_rejected_not_supported() {
    let dir = tempdir().unwrap();
    let dbname = dir.path().join("db");
    let mut options = Options { create_if_missing: true, ..Options::default() };
    options.db_paths = (0..5).map(|i| DbPath::new(dir.path().join(format!("p{i}")), u64::MAX)).collect();
    sanitize(&mut options, &dbname);

    let result = Db::open(&dbname, options, default_cf());
    assert!(matches!(result, Err(strata_core::error::Error::NotSupported { .. })));
}

#[test]
fn four_db_paths_accepted() {
    let dir = tempdir().unwrap();
    let dbname = dir.path().join("db");
    let mut options = Options { create_if_missing: true, ..Options::default() };
    options.db_paths = (0..4).map(|i| DbPath::new(dir.path().join(format!("p{i}")), u64::MAX)).collect();
    sanitize(&mut options, &dbname);

    let db = Db::open(&dbname, options, default_cf());
    assert!(db.is_ok());
}
