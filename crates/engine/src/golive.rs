//! Go-Live handshake (spec §4.9): create the new live WAL (spec §4.10),
//! install per-cf super-versions, anchor PIT detection across the open
//! boundary with a dummy record, fsync the db directory, and persist a
//! fresh OPTIONS file.

use std::path::Path;

use strata_core::error::Result;
use strata_core::{FileNumber, SequenceNumber};
use strata_durability::WalFile;
use strata_storage::{ColumnFamilyDescriptor, DirectoryManager, VersionSet};

use crate::column_family::{ColumnFamilyData, SuperVersion};
use crate::options::{write_options_file, Options};
use crate::write_batch::WriteBatch;

/// The outcome of a successful go-live handshake.
pub struct GoLiveResult {
    /// The file number of the freshly created live WAL.
    pub wal_file_number: u64,
    /// One super-version per column family, in the same order as
    /// `column_families`.
    pub super_versions: Vec<SuperVersion>,
}

/// Run the go-live handshake. `new_log_number` must already have been
/// marked used (and, if §4.8 finalization ran, recorded as every
/// non-exempt column family's new `log_number`) — the live WAL this
/// function creates is named with that same number, so the recovered
/// `log_number` floor and the new WAL's file number never diverge.
pub fn go_live(
    dbname: &Path,
    wal_dir: &Path,
    directories: &DirectoryManager,
    version_set: &VersionSet,
    column_families: &[ColumnFamilyData],
    descriptors: &[ColumnFamilyDescriptor],
    options: &Options,
    db_id: &str,
    new_log_number: u64,
) -> Result<GoLiveResult> {
    let database_uuid = uuid_bytes(db_id);
    let mut wal = WalFile::create(wal_dir, new_log_number, database_uuid)?;

    let recovered_seq = version_set.last_sequence();
    if recovered_seq > SequenceNumber::ZERO {
        // Dummy anchor record (spec §4.9): a later open sees the new
        // WAL's first record at exactly `recovered_seq` and knows no
        // record between the two opens is missing. The payload must be a
        // decodable (empty) `WriteBatch`, not a bare empty byte slice —
        // replay still runs `WriteBatch::from_bytes` over it.
        let anchor = strata_durability::WalRecord::new(recovered_seq, WriteBatch::empty().to_bytes());
        wal.append_record(&anchor)?;
    }
    wal.sync()?;

    let mut super_versions = Vec::with_capacity(column_families.len());
    for cf in column_families {
        let files_by_level = version_set
            .column_family(&cf.name)
            .map(|state| state.files.clone())
            .unwrap_or_default();
        let next_hint = FileNumber(version_set.next_file_number());
        super_versions.push(SuperVersion::install(cf, files_by_level, new_log_number, next_hint));
    }

    directories.fsync_db_dir()?;
    directories.fsync_wal_dir()?;

    write_options_file(dbname, options, descriptors)?;

    Ok(GoLiveResult { wal_file_number: new_log_number, super_versions })
}

fn uuid_bytes(db_id: &str) -> [u8; 16] {
    uuid::Uuid::parse_str(db_id).map(|u| *u.as_bytes()).unwrap_or([0u8; 16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_storage::{bootstrap, ColumnFamilyDescriptor};
    use tempfile::tempdir;

    #[test]
    fn go_live_creates_wal_and_options_file() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().join("db");
        std::fs::create_dir_all(&dbname).unwrap();
        let result = bootstrap(&dbname, true).unwrap();

        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let mut version_set = VersionSet::recover(&dbname, &descriptors).unwrap();
        let new_log_number = version_set.new_file_number().0;

        let column_families =
            vec![ColumnFamilyData::new(0, "default", Default::default(), new_log_number)];

        let wal_dir = dbname.clone();
        let directories = DirectoryManager::ensure(&dbname, &wal_dir, &[]).unwrap();
        let mut options = Options::default();
        crate::options::sanitize(&mut options, &dbname);

        let go_live_result = go_live(
            &dbname,
            &wal_dir,
            &directories,
            &version_set,
            &column_families,
            &descriptors,
            &options,
            &result.db_id,
            new_log_number,
        )
        .unwrap();

        assert_eq!(go_live_result.wal_file_number, new_log_number);
        assert_eq!(go_live_result.super_versions.len(), 1);
        assert!(dbname.join("OPTIONS").exists());
        assert!(strata_durability::wal_path(&wal_dir, new_log_number).exists());
    }

    #[test]
    fn anchor_record_decodes_as_an_empty_write_batch() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().join("db");
        std::fs::create_dir_all(&dbname).unwrap();
        let result = bootstrap(&dbname, true).unwrap();

        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let mut version_set = VersionSet::recover(&dbname, &descriptors).unwrap();
        version_set.advance_last_sequence(SequenceNumber(5));
        let new_log_number = version_set.new_file_number().0;

        let column_families =
            vec![ColumnFamilyData::new(0, "default", Default::default(), new_log_number)];

        let wal_dir = dbname.clone();
        let directories = DirectoryManager::ensure(&dbname, &wal_dir, &[]).unwrap();
        let mut options = Options::default();
        crate::options::sanitize(&mut options, &dbname);

        go_live(
            &dbname,
            &wal_dir,
            &directories,
            &version_set,
            &column_families,
            &descriptors,
            &options,
            &result.db_id,
            new_log_number,
        )
        .unwrap();

        let file_bytes = std::fs::read(strata_durability::wal_path(&wal_dir, new_log_number)).unwrap();
        let body = &file_bytes[32..]; // past the fixed WAL file header
        let (record, _) = strata_durability::WalRecord::from_bytes(body).unwrap();
        let decoded = WriteBatch::from_bytes(&record.batch).unwrap();
        assert!(decoded.is_empty());
    }
}
