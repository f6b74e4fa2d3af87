//! `DirectoryManager` — ensures the db, WAL, and data-path directories
//! exist and owns the directory handles fsynced at go-live (spec §2 step
//! 3, §4.9, §5 "Directory handles").

use std::fs::File;
use std::path::{Path, PathBuf};

use strata_core::error::Result;

use crate::dbpath::DbPath;

/// Owns open directory handles for the db directory, the WAL directory,
/// and each configured data path, so they can be fsynced once at go-live
/// to make newly-created files durably visible in the directory.
pub struct DirectoryManager {
    dbname: PathBuf,
    db_dir: File,
    wal_dir: PathBuf,
    wal_dir_handle: File,
    data_dirs: Vec<File>,
}

impl DirectoryManager {
    /// Ensure the db directory, WAL directory, and every data path exist,
    /// then open directory handles for later fsync.
    pub fn ensure(dbname: &Path, wal_dir: &Path, db_paths: &[DbPath]) -> Result<Self> {
        std::fs::create_dir_all(dbname)?;
        std::fs::create_dir_all(wal_dir)?;

        let db_dir = File::open(dbname)?;
        let wal_dir_handle = File::open(wal_dir)?;

        let mut data_dirs = Vec::with_capacity(db_paths.len());
        for p in db_paths {
            std::fs::create_dir_all(&p.path)?;
            data_dirs.push(File::open(&p.path)?);
        }

        Ok(DirectoryManager {
            dbname: dbname.to_path_buf(),
            db_dir,
            wal_dir: wal_dir.to_path_buf(),
            wal_dir_handle,
            data_dirs,
        })
    }

    /// The db directory path.
    pub fn dbname(&self) -> &Path {
        &self.dbname
    }

    /// The WAL directory path.
    pub fn wal_dir(&self) -> &Path {
        &self.wal_dir
    }

    /// Fsync the db directory handle, making new/renamed entries in it
    /// durable (spec §4.9 "Fsync the db directory handle").
    pub fn fsync_db_dir(&self) -> Result<()> {
        self.db_dir.sync_all()?;
        Ok(())
    }

    /// Fsync the WAL directory handle.
    pub fn fsync_wal_dir(&self) -> Result<()> {
        self.wal_dir_handle.sync_all()?;
        Ok(())
    }

    /// Fsync every data-path directory handle.
    pub fn fsync_data_dirs(&self) -> Result<()> {
        for d in &self.data_dirs {
            d.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().join("db");
        let wal_dir = dir.path().join("db").join("wal");
        let dm = DirectoryManager::ensure(&dbname, &wal_dir, &[]).unwrap();
        assert!(dbname.exists());
        assert!(wal_dir.exists());
        dm.fsync_db_dir().unwrap();
        dm.fsync_wal_dir().unwrap();
    }
}
