//! Recovery-time flush (spec §4.7): synthesize an L0 SST from whatever a
//! column family's memtable holds after replay, so the WAL that produced
//! it can be retired. Calls the narrow `TableBuilder`/`MemTable`
//! contracts named but not specified by the source spec.

use strata_core::error::Result;
use strata_core::FileNumber;
use strata_storage::{DbPath, TableBuilder, VersionEdit};

use crate::column_family::ColumnFamilyData;

/// Flush `cf`'s memtable to a new L0 file, if it holds any entries.
/// Returns the `VersionEdit` recording the new file and `log_number`
/// bump, or `None` if the memtable was empty (spec §4.7: "zero-size
/// outputs are silently dropped").
pub fn flush_column_family(
    cf: &mut ColumnFamilyData,
    file_number: FileNumber,
    new_log_number: u64,
    table_builder: &dyn TableBuilder,
    db_paths: &[DbPath],
) -> Result<Option<VersionEdit>> {
    if cf.memtable.is_empty() {
        return Ok(None);
    }

    let entries = cf.memtable.drain_sorted();
    let mut iter = entries.into_iter();
    let meta = table_builder.build(&mut iter, file_number, 0, db_paths)?;

    let Some(meta) = meta else {
        return Ok(None);
    };

    let mut edit = VersionEdit::new(cf.id);
    edit.add_file(0, meta);
    edit.log_number = Some(new_log_number);
    cf.log_number = new_log_number;

    Ok(Some(edit))
}
