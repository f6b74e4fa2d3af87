//! `DbLock` — the exclusive advisory lock on the db directory, held for
//! the database's lifetime (spec §2 step 4, §5 "File lock").

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use strata_core::error::{Error, Result};

/// An exclusive advisory lock on `<dbname>/LOCK`. Released on drop.
pub struct DbLock {
    file: File,
    path: PathBuf,
}

impl DbLock {
    /// Acquire the exclusive lock on `<dbname>/LOCK`, creating it if
    /// necessary. Fails with `Busy` if another process already holds it.
    pub fn acquire(dbname: &Path) -> Result<Self> {
        let path = dbname.join("LOCK");
        let file = OpenOptions::new().create(true).write(true).open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(DbLock { file, path }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(Error::busy(format!("lock held on {}", path.display())))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DbLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_lock_is_busy() {
        let dir = tempdir().unwrap();
        let _first = DbLock::acquire(dir.path()).unwrap();
        let second = DbLock::acquire(dir.path());
        assert!(matches!(second, Err(Error::Busy { .. })));
    }

    #[test]
    fn lock_releases_on_drop() {
        let dir = tempdir().unwrap();
        {
            let _first = DbLock::acquire(dir.path()).unwrap();
        }
        let _second = DbLock::acquire(dir.path()).unwrap();
    }
}
