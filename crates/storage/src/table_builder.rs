//! `TableBuilder` — the narrow stand-in for the out-of-scope `BuildTable`
//! contract (spec §1, §4.7). Produces a real `FileMeta` from a sorted
//! iterator of entries without implementing the real SST format
//! (block indexing, compression, bloom filters), which spec.md excludes.

use crc32fast::Hasher;
use std::io::Write;
use std::path::Path;

use strata_core::error::Result;
use strata_core::{FileNumber, SequenceNumber};

use crate::dbpath::DbPath;
use crate::file_meta::FileMeta;

/// One logical write: a key, its value (`None` for a tombstone), and the
/// sequence number it was committed at.
pub struct TableEntry {
    /// User key.
    pub key: Vec<u8>,
    /// `None` marks a deletion.
    pub value: Option<Vec<u8>>,
    /// Sequence number the entry was committed at.
    pub sequence: SequenceNumber,
}

/// The `BuildTable` contract: input a forward iterator over a memtable
/// snapshot, output an on-disk file plus its `FileMeta` (spec §4.7).
pub trait TableBuilder {
    /// Build a table file at `path_id` within `db_paths`, named
    /// `<N>.sst`. Returns `None` if the iterator was empty (spec §4.7:
    /// "zero-size outputs are silently dropped").
    fn build(
        &self,
        entries: &mut dyn Iterator<Item = TableEntry>,
        file_number: FileNumber,
        path_id: u32,
        db_paths: &[DbPath],
    ) -> Result<Option<FileMeta>>;
}

/// A flat, length-prefixed, CRC-framed table: entries sorted by key,
/// written in iteration order. Sufficient to produce a real `FileMeta`
/// without a block-indexed SST format.
pub struct FlatTableBuilder {
    now: u64,
}

impl FlatTableBuilder {
    /// Construct a builder stamping files with `creation_time`/
    /// `oldest_ancester_time` = `now` (seconds since epoch, passed in by
    /// the caller so this stays free of a hidden clock read).
    pub fn new(now: u64) -> Self {
        FlatTableBuilder { now }
    }
}

impl TableBuilder for FlatTableBuilder {
    fn build(
        &self,
        entries: &mut dyn Iterator<Item = TableEntry>,
        file_number: FileNumber,
        path_id: u32,
        db_paths: &[DbPath],
    ) -> Result<Option<FileMeta>> {
        let dir = &db_paths[path_id as usize].path;
        std::fs::create_dir_all(dir)?;
        let path = sst_path(dir, file_number);

        let mut smallest_key: Option<Vec<u8>> = None;
        let mut largest_key: Option<Vec<u8>> = None;
        let mut smallest_seq = SequenceNumber(u64::MAX);
        let mut largest_seq = SequenceNumber(0);
        let mut count = 0u64;

        let mut buf = Vec::new();
        for entry in entries {
            count += 1;
            if smallest_key.as_ref().map(|k| &entry.key < k).unwrap_or(true) {
                smallest_key = Some(entry.key.clone());
            }
            if largest_key.as_ref().map(|k| &entry.key > k).unwrap_or(true) {
                largest_key = Some(entry.key.clone());
            }
            smallest_seq = smallest_seq.min(entry.sequence);
            largest_seq = largest_seq.max(entry.sequence);

            encode_entry(&mut buf, &entry);
        }

        if count == 0 {
            return Ok(None);
        }

        let mut file = std::fs::File::create(&path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        let file_size = buf.len() as u64;

        Ok(Some(FileMeta {
            number: file_number,
            path_id,
            file_size,
            smallest_key: smallest_key.unwrap_or_default(),
            largest_key: largest_key.unwrap_or_default(),
            smallest_seq,
            largest_seq,
            marked_for_compaction: false,
            oldest_blob_file_number: 0,
            oldest_ancester_time: self.now,
            file_creation_time: self.now,
        }))
    }
}

fn encode_entry(buf: &mut Vec<u8>, entry: &TableEntry) {
    let mut payload = Vec::new();
    payload.extend_from_slice(&entry.sequence.0.to_le_bytes());
    payload.extend_from_slice(&(entry.key.len() as u32).to_le_bytes());
    payload.extend_from_slice(&entry.key);
    match &entry.value {
        Some(v) => {
            payload.push(1);
            payload.extend_from_slice(&(v.len() as u32).to_le_bytes());
            payload.extend_from_slice(v);
        }
        None => payload.push(0),
    }

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// `<path>/<N>.sst` (spec §6).
pub fn sst_path(dir: &Path, number: FileNumber) -> std::path::PathBuf {
    dir.join(format!("{}.sst", number.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_with_no_entries_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let db_paths = vec![DbPath::new(dir.path(), u64::MAX)];
        let builder = FlatTableBuilder::new(1000);
        let mut empty = std::iter::empty();
        let result = builder.build(&mut empty, FileNumber(5), 0, &db_paths).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn build_with_entries_produces_file_meta() {
        let dir = tempfile::tempdir().unwrap();
        let db_paths = vec![DbPath::new(dir.path(), u64::MAX)];
        let builder = FlatTableBuilder::new(1000);
        let mut entries = vec![
            TableEntry { key: b"b".to_vec(), value: Some(b"2".to_vec()), sequence: SequenceNumber(2) },
            TableEntry { key: b"a".to_vec(), value: Some(b"1".to_vec()), sequence: SequenceNumber(1) },
        ]
        .into_iter();

        let meta = builder
            .build(&mut entries, FileNumber(7), 0, &db_paths)
            .unwrap()
            .unwrap();

        assert_eq!(meta.smallest_key, b"a".to_vec());
        assert_eq!(meta.largest_key, b"b".to_vec());
        assert_eq!(meta.smallest_seq, SequenceNumber(1));
        assert_eq!(meta.largest_seq, SequenceNumber(2));
        assert!(sst_path(dir.path(), FileNumber(7)).exists());
    }
}
