//! File-level metadata tracked by the `VersionSet` (spec §3).

use strata_core::{FileNumber, SequenceNumber};

/// Metadata for one on-disk SST file, as recorded in a `VersionEdit`'s
/// `added_files` and carried forward by the `VersionSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// File number; unique within the database's file-number space.
    pub number: FileNumber,
    /// Index into `db_paths` this file lives under.
    pub path_id: u32,
    /// Size of the file in bytes.
    pub file_size: u64,
    /// Smallest user key in the file.
    pub smallest_key: Vec<u8>,
    /// Largest user key in the file.
    pub largest_key: Vec<u8>,
    /// Smallest sequence number among the file's entries.
    pub smallest_seq: SequenceNumber,
    /// Largest sequence number among the file's entries.
    pub largest_seq: SequenceNumber,
    /// Whether the file is flagged for future compaction.
    pub marked_for_compaction: bool,
    /// Oldest blob file this SST references (0 if none).
    pub oldest_blob_file_number: u64,
    /// Oldest ancestor time among the file's entries, used for TTL-style
    /// compaction heuristics.
    pub oldest_ancester_time: u64,
    /// Wall-clock time the file was created.
    pub file_creation_time: u64,
}

/// Tracks one live WAL file's number and on-disk size (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFileNumberSize {
    /// WAL file number.
    pub number: FileNumber,
    /// Current size in bytes.
    pub size: u64,
}
