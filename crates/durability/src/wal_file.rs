//! WAL file discovery (spec §4.5): list the file numbers of `<N>.log`
//! files present in the WAL directory, in ascending order.

use std::path::Path;

use strata_core::error::Result;

/// List the WAL file numbers present in `wal_dir`, ascending. Entries
/// that do not match `<N>.log` are ignored.
pub fn list_wal_numbers(wal_dir: &Path) -> Result<Vec<u64>> {
    let mut numbers = Vec::new();
    if !wal_dir.exists() {
        return Ok(numbers);
    }
    for entry in std::fs::read_dir(wal_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(stem) = name.strip_suffix(".log") {
            if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = stem.parse::<u64>() {
                    numbers.push(n);
                }
            }
        }
    }
    numbers.sort_unstable();
    Ok(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::record::WalFile;
    use tempfile::tempdir;

    #[test]
    fn lists_only_log_files_sorted() {
        let dir = tempdir().unwrap();
        WalFile::create(dir.path(), 3, [0u8; 16]).unwrap();
        WalFile::create(dir.path(), 1, [0u8; 16]).unwrap();
        WalFile::create(dir.path(), 2, [0u8; 16]).unwrap();
        std::fs::write(dir.path().join("IDENTITY"), b"x").unwrap();

        assert_eq!(list_wal_numbers(dir.path()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_dir_returns_empty() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nonexistent");
        assert_eq!(list_wal_numbers(&missing).unwrap(), Vec::<u64>::new());
    }
}
