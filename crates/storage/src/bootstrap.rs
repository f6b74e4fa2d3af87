//! Bootstrap a fresh database (spec §4.3).

use std::path::Path;

use strata_core::error::{Error, Result};

use crate::current::{current_exists, write_current};
use crate::identity::{generate_identity, write_identity};
use crate::version_edit::{ManifestWriter, VersionEdit};
use crate::version_set::manifest_path;

/// Outcome of a successful bootstrap: the identity written and the
/// manifest number published via `CURRENT`.
pub struct BootstrapResult {
    /// The freshly generated database id.
    pub db_id: String,
}

/// Bootstrap steps 1-6 of spec §4.3. Triggered when `CURRENT` does not
/// exist; the caller is responsible for having already checked
/// `create_if_missing`/`error_if_exists` (spec §4.3's two guard clauses),
/// since those are Option-level decisions made in `strata_engine`.
pub fn bootstrap(dbname: &Path, write_dbid_to_manifest: bool) -> Result<BootstrapResult> {
    if current_exists(dbname) {
        return Err(Error::invalid_argument("CURRENT already exists; bootstrap not applicable"));
    }

    // Step 1: IDENTITY.
    let db_id = generate_identity();
    write_identity(dbname, &db_id)?;

    // Step 2: VersionEdit{log_number=0, next_file_number=2, last_sequence=0, db_id?}.
    let mut edit = VersionEdit::new(0);
    edit.set_new_column_family("default");
    edit.log_number = Some(0);
    edit.next_file_number = Some(2);
    edit.last_sequence = Some(0);
    if write_dbid_to_manifest {
        edit.db_id = Some(db_id.clone());
    }

    // Step 3-4: create MANIFEST-000001, emit the edit, sync.
    let path = manifest_path(dbname, 1);
    let result: Result<()> = (|| {
        let mut writer = ManifestWriter::create(&path)?;
        writer.append(&edit)?;
        Ok(())
    })();

    if let Err(e) = result {
        // Step 6: delete the half-written MANIFEST on failure after (3).
        let _ = std::fs::remove_file(&path);
        return Err(e);
    }

    // Step 5: rename-atomically publish CURRENT.
    if let Err(e) = write_current(dbname, 1) {
        let _ = std::fs::remove_file(&path);
        return Err(e);
    }

    Ok(BootstrapResult { db_id })
}
