//! `ColumnFamilyData` and `SuperVersion` — the engine's live per-column-
//! family state, installed atomically at go-live (spec §4.9: "per-CF
//! super-versions").

use strata_core::FileNumber;
use strata_storage::{ColumnFamilyOptions, FileMeta};

use crate::memtable::{BTreeMemTable, MemTable};

/// Default memtable size threshold before recovery-time flush is
/// triggered (spec §4.6 step 5: "incremental flush").
pub const DEFAULT_MEMTABLE_SIZE_THRESHOLD: usize = 64 * 1024 * 1024;

/// One column family's live, mutable recovery-time state: its id,
/// options, active memtable, and the `log_number` floor recovered from
/// the manifest.
pub struct ColumnFamilyData {
    /// Column family id, assigned by the manifest.
    pub id: u32,
    /// Column family name.
    pub name: String,
    /// Column-family-scoped options.
    pub options: ColumnFamilyOptions,
    /// The active memtable absorbing WAL replay and (later) live writes.
    pub memtable: Box<dyn MemTable>,
    /// The recovered `log_number`: WAL files below this are obsolete for
    /// this column family.
    pub log_number: u64,
}

impl ColumnFamilyData {
    /// Construct fresh per-cf state with an empty memtable.
    pub fn new(id: u32, name: impl Into<String>, options: ColumnFamilyOptions, log_number: u64) -> Self {
        ColumnFamilyData {
            id,
            name: name.into(),
            options,
            memtable: Box::new(BTreeMemTable::new(DEFAULT_MEMTABLE_SIZE_THRESHOLD)),
            log_number,
        }
    }
}

/// An immutable, atomically-installed snapshot of one column family's
/// readable state: its on-disk file layout by level, and whether its
/// memtable was empty at install time. Spec §4.9 installs one of these
/// per column family as part of go-live, replacing the ad hoc state used
/// during recovery.
#[derive(Debug, Clone)]
pub struct SuperVersion {
    /// Column family this super-version belongs to.
    pub column_family_id: u32,
    /// On-disk files by level, as of installation.
    pub files_by_level: Vec<Vec<FileMeta>>,
    /// The WAL file number new writes are appended to as of installation.
    pub active_log_number: u64,
    /// Next file number to use for this cf's SST/blob output, fixed at
    /// install time for introspection.
    pub next_file_number_hint: FileNumber,
}

impl SuperVersion {
    /// Build a super-version from a column family's current on-disk
    /// layout and the WAL file just installed at go-live.
    pub fn install(cf: &ColumnFamilyData, files_by_level: Vec<Vec<FileMeta>>, active_log_number: u64, next_file_number_hint: FileNumber) -> Self {
        SuperVersion {
            column_family_id: cf.id,
            files_by_level,
            active_log_number,
            next_file_number_hint,
        }
    }
}
