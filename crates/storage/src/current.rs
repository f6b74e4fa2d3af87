//! `CURRENT` — the one-line pointer file naming the active MANIFEST
//! (spec §3, §6).

use std::io::Write;
use std::path::Path;

use strata_core::error::{Error, Result};

/// Read `<dbname>/CURRENT` and return the MANIFEST number it names.
pub fn read_current(dbname: &Path) -> Result<u64> {
    let path = dbname.join("CURRENT");
    let contents = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::invalid_argument("CURRENT file is missing")
        } else {
            e.into()
        }
    })?;
    parse_current(&contents)
}

fn parse_current(contents: &str) -> Result<u64> {
    let line = contents.trim_end_matches('\n');
    let number = line
        .strip_prefix("MANIFEST-")
        .ok_or_else(|| Error::corruption("CURRENT does not name a MANIFEST file"))?;
    number
        .parse::<u64>()
        .map_err(|e| Error::corruption_with("CURRENT names an unparseable MANIFEST number", e))
}

/// Rename-atomically publish `CURRENT` to point at `MANIFEST-<number>`
/// (spec §4.3 step 5).
pub fn write_current(dbname: &Path, number: u64) -> Result<()> {
    let tmp_path = dbname.join(format!("CURRENT.dbtmp-{number}"));
    let final_path = dbname.join("CURRENT");

    {
        let mut f = std::fs::File::create(&tmp_path)?;
        write!(f, "MANIFEST-{number:06}\n")?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, &final_path)?;

    if let Ok(dir_handle) = std::fs::File::open(dbname) {
        if let Err(e) = dir_handle.sync_all() {
            tracing::warn!(dbname = %dbname.display(), error = %e, "failed to fsync db directory after publishing CURRENT");
        }
    }

    Ok(())
}

/// Whether `CURRENT` exists for the given database directory.
pub fn current_exists(dbname: &Path) -> bool {
    dbname.join("CURRENT").exists()
}
