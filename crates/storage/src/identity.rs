//! `IDENTITY` — the database's UUID, reconciled against whatever `db_id`
//! the MANIFEST carries (spec §3, §4.4).

use std::path::Path;

use strata_core::error::Result;
use uuid::Uuid;

/// Read `<dbname>/IDENTITY`.
pub fn read_identity(dbname: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(dbname.join("IDENTITY"))?.trim().to_string())
}

/// Write `<dbname>/IDENTITY`, replacing any existing contents.
pub fn write_identity(dbname: &Path, id: &str) -> Result<()> {
    std::fs::write(dbname.join("IDENTITY"), id)?;
    Ok(())
}

/// Whether `IDENTITY` exists.
pub fn identity_exists(dbname: &Path) -> bool {
    dbname.join("IDENTITY").exists()
}

/// Generate a fresh 36-character UUID string, as written during bootstrap
/// (spec §4.3 step 1).
pub fn generate_identity() -> String {
    Uuid::new_v4().to_string()
}

/// Reconcile `IDENTITY` against the db id surfaced by manifest replay
/// (spec §4.4): if the manifest carries an id, `IDENTITY` must match it —
/// MANIFEST wins and `IDENTITY` is rewritten on mismatch. If the manifest
/// has no id and `write_dbid_to_manifest` is set, read (creating if
/// missing) `IDENTITY` and return it so the caller can persist it into the
/// manifest via a `LogAndApply`.
pub fn reconcile(dbname: &Path, manifest_db_id: Option<&str>, write_dbid_to_manifest: bool) -> Result<Option<String>> {
    match manifest_db_id {
        Some(id) => {
            let current = if identity_exists(dbname) {
                Some(read_identity(dbname)?)
            } else {
                None
            };
            if current.as_deref() != Some(id) {
                write_identity(dbname, id)?;
            }
            Ok(None)
        }
        None if write_dbid_to_manifest => {
            let id = if identity_exists(dbname) {
                read_identity(dbname)?
            } else {
                let fresh = generate_identity();
                write_identity(dbname, &fresh)?;
                fresh
            };
            Ok(Some(id))
        }
        None => Ok(None),
    }
}
