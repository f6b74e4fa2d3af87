//! Persistent-stats column family reconciliation (spec §4.11): probe the
//! two reserved version keys on an existing `__system_stats__` cf,
//! drop-and-recreate it when the on-disk format has drifted past what
//! this code supports, and seed those keys on first creation.

use strata_core::SequenceNumber;
use strata_storage::{VersionEdit, VersionSet, PERSISTENT_STATS_CF_NAME};

use crate::column_family::ColumnFamilyData;

/// The on-disk format version this code writes and fully understands.
pub const CURRENT_FORMAT_VERSION: u64 = 1;
/// The oldest on-disk format version this code can still read.
pub const COMPATIBLE_VERSION_FLOOR: u64 = 1;

const FORMAT_VERSION_KEY: &[u8] = b"format_version";
const COMPATIBLE_VERSION_KEY: &[u8] = b"compatible_version";

/// What the reconciler decided to do about the persistent-stats cf.
pub struct PersistentStatsReconciliation {
    /// Manifest edit(s) to fold into the finalizing `LogAndApply`.
    pub edits: Vec<VersionEdit>,
    /// Whether a pre-existing `ColumnFamilyData` for this cf (if any) is
    /// now stale and must be replaced with a fresh one.
    pub replaces_existing: bool,
}

/// Reconcile the persistent-stats column family against
/// `persist_stats_to_disk`. `existing` is the live `ColumnFamilyData` for
/// `__system_stats__` if the manifest already carries one post-recovery.
/// Returns `None` if no manifest change is needed.
pub fn reconcile_persistent_stats_cf(
    version_set: &VersionSet,
    existing: Option<&ColumnFamilyData>,
    persist_stats_to_disk: bool,
) -> Option<PersistentStatsReconciliation> {
    if !persist_stats_to_disk {
        return None;
    }

    match existing {
        None => {
            let edit = new_cf_edit(version_set);
            Some(PersistentStatsReconciliation { edits: vec![edit], replaces_existing: false })
        }
        Some(cf) => {
            if !versions_compatible(cf) {
                let mut drop_edit = VersionEdit::new(cf.id);
                drop_edit.dropped = true;
                let create_edit = new_cf_edit(version_set);
                Some(PersistentStatsReconciliation {
                    edits: vec![drop_edit, create_edit],
                    replaces_existing: true,
                })
            } else {
                None
            }
        }
    }
}

fn new_cf_edit(version_set: &VersionSet) -> VersionEdit {
    let next_id = version_set.column_families().iter().map(|cf| cf.id).max().map(|id| id + 1).unwrap_or(0);
    let mut edit = VersionEdit::new(next_id);
    edit.set_new_column_family(PERSISTENT_STATS_CF_NAME);
    edit.log_number = Some(0);
    edit
}

/// Probe the two reserved version keys. A failed read of either one is
/// treated the same as an incompatible version: recreate.
fn versions_compatible(cf: &ColumnFamilyData) -> bool {
    let format_version = read_version(cf, FORMAT_VERSION_KEY);
    let compatible_version = read_version(cf, COMPATIBLE_VERSION_KEY);
    match (format_version, compatible_version) {
        (Some(format_version), Some(compatible_version)) => {
            !(format_version > CURRENT_FORMAT_VERSION && compatible_version > COMPATIBLE_VERSION_FLOOR)
        }
        _ => false,
    }
}

fn read_version(cf: &ColumnFamilyData, key: &[u8]) -> Option<u64> {
    let value = cf.memtable.get(key)??;
    let bytes: [u8; 8] = value.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// Seed the two reserved version keys into a freshly (re)created
/// persistent-stats cf, on first creation only. This crate has no
/// write-scheduling path to honor the `{low_pri, no_slowdown, sync=false}`
/// write options the keys are written with upstream, so they're inserted
/// directly into the cf's memtable.
pub fn seed_version_keys(cf: &mut ColumnFamilyData) {
    cf.memtable.insert(
        FORMAT_VERSION_KEY.to_vec(),
        Some(CURRENT_FORMAT_VERSION.to_le_bytes().to_vec()),
        SequenceNumber::ZERO,
    );
    cf.memtable.insert(
        COMPATIBLE_VERSION_KEY.to_vec(),
        Some(COMPATIBLE_VERSION_FLOOR.to_le_bytes().to_vec()),
        SequenceNumber::ZERO,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_storage::{bootstrap, ColumnFamilyDescriptor, ColumnFamilyOptions};
    use tempfile::tempdir;

    #[test]
    fn disabled_produces_no_edit() {
        let dir = tempdir().unwrap();
        bootstrap(dir.path(), true).unwrap();
        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let vs = VersionSet::recover(dir.path(), &descriptors).unwrap();
        assert!(reconcile_persistent_stats_cf(&vs, None, false).is_none());
    }

    #[test]
    fn enabled_creates_cf_once() {
        let dir = tempdir().unwrap();
        bootstrap(dir.path(), true).unwrap();
        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let mut vs = VersionSet::recover(dir.path(), &descriptors).unwrap();

        let reconciliation = reconcile_persistent_stats_cf(&vs, None, true).unwrap();
        assert!(!reconciliation.replaces_existing);
        vs.log_and_apply(reconciliation.edits, false).unwrap();

        let state = vs.column_family(PERSISTENT_STATS_CF_NAME).unwrap();
        let mut cf = ColumnFamilyData::new(state.id, PERSISTENT_STATS_CF_NAME, ColumnFamilyOptions::default(), state.log_number);
        seed_version_keys(&mut cf);

        assert!(reconcile_persistent_stats_cf(&vs, Some(&cf), true).is_none());
    }

    #[test]
    fn unreadable_version_keys_trigger_recreate() {
        let dir = tempdir().unwrap();
        bootstrap(dir.path(), true).unwrap();
        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let mut vs = VersionSet::recover(dir.path(), &descriptors).unwrap();
        vs.log_and_apply(vec![new_cf_edit(&vs)], false).unwrap();

        let state = vs.column_family(PERSISTENT_STATS_CF_NAME).unwrap();
        let cf = ColumnFamilyData::new(state.id, PERSISTENT_STATS_CF_NAME, ColumnFamilyOptions::default(), state.log_number);

        let reconciliation = reconcile_persistent_stats_cf(&vs, Some(&cf), true).unwrap();
        assert!(reconciliation.replaces_existing);
        assert_eq!(reconciliation.edits.len(), 2);
        assert!(reconciliation.edits[0].dropped);
    }

    #[test]
    fn incompatible_future_format_triggers_recreate() {
        let dir = tempdir().unwrap();
        bootstrap(dir.path(), true).unwrap();
        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let mut vs = VersionSet::recover(dir.path(), &descriptors).unwrap();
        vs.log_and_apply(vec![new_cf_edit(&vs)], false).unwrap();

        let state = vs.column_family(PERSISTENT_STATS_CF_NAME).unwrap();
        let mut cf = ColumnFamilyData::new(state.id, PERSISTENT_STATS_CF_NAME, ColumnFamilyOptions::default(), state.log_number);
        cf.memtable.insert(FORMAT_VERSION_KEY.to_vec(), Some((CURRENT_FORMAT_VERSION + 1).to_le_bytes().to_vec()), SequenceNumber::ZERO);
        cf.memtable.insert(COMPATIBLE_VERSION_KEY.to_vec(), Some((COMPATIBLE_VERSION_FLOOR + 1).to_le_bytes().to_vec()), SequenceNumber::ZERO);

        let reconciliation = reconcile_persistent_stats_cf(&vs, Some(&cf), true).unwrap();
        assert!(reconciliation.replaces_existing);
    }

    #[test]
    fn compatible_old_format_is_kept() {
        let dir = tempdir().unwrap();
        bootstrap(dir.path(), true).unwrap();
        let descriptors = vec![ColumnFamilyDescriptor::default_cf()];
        let mut vs = VersionSet::recover(dir.path(), &descriptors).unwrap();
        vs.log_and_apply(vec![new_cf_edit(&vs)], false).unwrap();

        let state = vs.column_family(PERSISTENT_STATS_CF_NAME).unwrap();
        let mut cf = ColumnFamilyData::new(state.id, PERSISTENT_STATS_CF_NAME, ColumnFamilyOptions::default(), state.log_number);
        // format_version exceeds current, but compatible_version does not:
        // still readable, so no recreate.
        cf.memtable.insert(FORMAT_VERSION_KEY.to_vec(), Some((CURRENT_FORMAT_VERSION + 1).to_le_bytes().to_vec()), SequenceNumber::ZERO);
        cf.memtable.insert(COMPATIBLE_VERSION_KEY.to_vec(), Some(COMPATIBLE_VERSION_FLOOR.to_le_bytes().to_vec()), SequenceNumber::ZERO);

        assert!(reconcile_persistent_stats_cf(&vs, Some(&cf), true).is_none());
    }
}
