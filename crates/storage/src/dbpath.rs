//! `DbPath` — one of up to four on-disk locations an SST file may live in.

use std::path::PathBuf;

/// A single data path with a soft target size, used to spread SST files
/// across multiple volumes. Path 0 is always the default (`dbname`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPath {
    /// Filesystem location.
    pub path: PathBuf,
    /// Soft target size in bytes; `u64::MAX` means unbounded.
    pub target_size_bytes: u64,
}

impl DbPath {
    /// Construct a path with an explicit target size.
    pub fn new(path: impl Into<PathBuf>, target_size_bytes: u64) -> Self {
        DbPath { path: path.into(), target_size_bytes }
    }

    /// The default, unbounded path used when `db_paths` is left empty
    /// (spec §4.1: `db_paths: if empty, append {dbname, u64::MAX}`).
    pub fn default_for(dbname: impl Into<PathBuf>) -> Self {
        DbPath { path: dbname.into(), target_size_bytes: u64::MAX }
    }
}

/// Maximum number of `DbPath`s accepted (spec §3, §8: `len == 4` accepted,
/// `== 5` rejected `NotSupported`).
pub const MAX_DB_PATHS: usize = 4;
