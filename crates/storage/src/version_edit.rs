//! `VersionEdit` and its on-disk encoding.
//!
//! A `VersionEdit` is a delta against the current `Version`: spec §3 lists
//! the fields it may carry. The MANIFEST is an append-only, CRC-framed log
//! of these records (spec §6); this module owns both the type and the
//! framing, the same way the teacher's `format/manifest.rs` owned a single
//! snapshot's framing before this crate generalized it into a log.

use crc32fast::Hasher;
use std::io::{Read, Seek, Write};

use strata_core::error::{Error, Result};
use strata_core::{FileNumber, SequenceNumber};

use crate::file_meta::FileMeta;

/// Magic bytes identifying a MANIFEST file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"VEDT";

/// Current MANIFEST record format version.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// A column-family-scoped delta accumulated during recovery and committed
/// via a single `LogAndApply` (spec §4.8, §4.9, design note on
/// "VersionEdit accumulation").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionEdit {
    /// Column family this edit applies to.
    pub column_family_id: u32,
    /// New `log_number` for the column family, if changed.
    pub log_number: Option<u64>,
    /// New global next-file-number counter, if changed.
    pub next_file_number: Option<u64>,
    /// New global last-sequence watermark, if changed.
    pub last_sequence: Option<u64>,
    /// Database id, if this edit sets/updates it.
    pub db_id: Option<String>,
    /// Set when this edit introduces `column_family_id` for the first
    /// time, naming it. RocksDB's real `VersionEdit` carries the same
    /// "add column family" record; kept here so `VersionSet::recover` can
    /// reconstruct the id→name mapping from the MANIFEST alone.
    pub new_column_family: Option<String>,
    /// Files added at their recorded level.
    pub added_files: Vec<(u32, FileMeta)>,
    /// Files removed, named by level and file number.
    pub deleted_files: Vec<(u32, u64)>,
    /// Set when this edit retires `column_family_id` entirely (e.g. the
    /// persistent-stats cf drop-and-recreate path).
    pub dropped: bool,
}

impl VersionEdit {
    /// A fresh, empty edit for the given column family.
    pub fn new(column_family_id: u32) -> Self {
        VersionEdit { column_family_id, ..Default::default() }
    }

    /// Mark this edit as introducing a new column family with `name`.
    pub fn set_new_column_family(&mut self, name: impl Into<String>) {
        self.new_column_family = Some(name.into());
    }

    /// Record a file addition at `level`.
    pub fn add_file(&mut self, level: u32, meta: FileMeta) {
        self.added_files.push((level, meta));
    }

    /// Record a file deletion at `level`.
    pub fn delete_file(&mut self, level: u32, number: FileNumber) {
        self.deleted_files.push((level, number.0));
    }

    /// Encode this edit to its on-disk byte representation (without the
    /// record framing applied by `ManifestWriter`).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.column_family_id.to_le_bytes());

        write_optional_u64(&mut buf, self.log_number);
        write_optional_u64(&mut buf, self.next_file_number);
        write_optional_u64(&mut buf, self.last_sequence);

        match &self.db_id {
            Some(id) => {
                buf.push(1);
                write_bytes(&mut buf, id.as_bytes());
            }
            None => buf.push(0),
        }

        match &self.new_column_family {
            Some(name) => {
                buf.push(1);
                write_bytes(&mut buf, name.as_bytes());
            }
            None => buf.push(0),
        }

        buf.extend_from_slice(&(self.added_files.len() as u32).to_le_bytes());
        for (level, meta) in &self.added_files {
            buf.extend_from_slice(&level.to_le_bytes());
            encode_file_meta(&mut buf, meta);
        }

        buf.extend_from_slice(&(self.deleted_files.len() as u32).to_le_bytes());
        for (level, number) in &self.deleted_files {
            buf.extend_from_slice(&level.to_le_bytes());
            buf.extend_from_slice(&number.to_le_bytes());
        }

        buf.push(self.dropped as u8);

        buf
    }

    /// Decode an edit from the byte representation produced by
    /// [`VersionEdit::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let column_family_id = cur.read_u32()?;
        let log_number = cur.read_optional_u64()?;
        let next_file_number = cur.read_optional_u64()?;
        let last_sequence = cur.read_optional_u64()?;

        let has_db_id = cur.read_u8()?;
        let db_id = if has_db_id == 1 {
            Some(String::from_utf8(cur.read_bytes()?).map_err(|e| {
                Error::corruption_with("invalid utf-8 in VersionEdit db_id", e)
            })?)
        } else {
            None
        };

        let has_new_cf = cur.read_u8()?;
        let new_column_family = if has_new_cf == 1 {
            Some(String::from_utf8(cur.read_bytes()?).map_err(|e| {
                Error::corruption_with("invalid utf-8 in VersionEdit new_column_family", e)
            })?)
        } else {
            None
        };

        let added_count = cur.read_u32()?;
        let mut added_files = Vec::with_capacity(added_count as usize);
        for _ in 0..added_count {
            let level = cur.read_u32()?;
            let meta = decode_file_meta(&mut cur)?;
            added_files.push((level, meta));
        }

        let deleted_count = cur.read_u32()?;
        let mut deleted_files = Vec::with_capacity(deleted_count as usize);
        for _ in 0..deleted_count {
            let level = cur.read_u32()?;
            let number = cur.read_u64()?;
            deleted_files.push((level, number));
        }

        let dropped = cur.read_u8()? != 0;

        Ok(VersionEdit {
            column_family_id,
            log_number,
            next_file_number,
            last_sequence,
            db_id,
            new_column_family,
            added_files,
            deleted_files,
            dropped,
        })
    }
}

fn write_optional_u64(buf: &mut Vec<u8>, v: Option<u64>) {
    match v {
        Some(x) => {
            buf.push(1);
            buf.extend_from_slice(&x.to_le_bytes());
        }
        None => buf.push(0),
    }
}

fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

fn encode_file_meta(buf: &mut Vec<u8>, meta: &FileMeta) {
    buf.extend_from_slice(&meta.number.0.to_le_bytes());
    buf.extend_from_slice(&meta.path_id.to_le_bytes());
    buf.extend_from_slice(&meta.file_size.to_le_bytes());
    write_bytes(buf, &meta.smallest_key);
    write_bytes(buf, &meta.largest_key);
    buf.extend_from_slice(&meta.smallest_seq.0.to_le_bytes());
    buf.extend_from_slice(&meta.largest_seq.0.to_le_bytes());
    buf.push(meta.marked_for_compaction as u8);
    buf.extend_from_slice(&meta.oldest_blob_file_number.to_le_bytes());
    buf.extend_from_slice(&meta.oldest_ancester_time.to_le_bytes());
    buf.extend_from_slice(&meta.file_creation_time.to_le_bytes());
}

fn decode_file_meta(cur: &mut Cursor<'_>) -> Result<FileMeta> {
    Ok(FileMeta {
        number: FileNumber(cur.read_u64()?),
        path_id: cur.read_u32()?,
        file_size: cur.read_u64()?,
        smallest_key: cur.read_bytes()?,
        largest_key: cur.read_bytes()?,
        smallest_seq: SequenceNumber(cur.read_u64()?),
        largest_seq: SequenceNumber(cur.read_u64()?),
        marked_for_compaction: cur.read_u8()? != 0,
        oldest_blob_file_number: cur.read_u64()?,
        oldest_ancester_time: cur.read_u64()?,
        file_creation_time: cur.read_u64()?,
    })
}

/// Minimal cursor over a byte slice with corruption-as-error reads; avoids
/// pulling in a serialization crate for a format this narrow.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(Error::corruption("truncated VersionEdit"));
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_optional_u64(&mut self) -> Result<Option<u64>> {
        if self.read_u8()? == 1 {
            Ok(Some(self.read_u64()?))
        } else {
            Ok(None)
        }
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

/// Appends length + CRC-framed `VersionEdit` records to a MANIFEST file.
pub struct ManifestWriter {
    file: std::fs::File,
}

impl ManifestWriter {
    /// Create a new MANIFEST file, writing the file header.
    pub fn create(path: &std::path::Path) -> Result<Self> {
        let mut file = std::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .read(true)
            .open(path)?;
        file.write_all(&MANIFEST_MAGIC)?;
        file.write_all(&MANIFEST_FORMAT_VERSION.to_le_bytes())?;
        Ok(ManifestWriter { file })
    }

    /// Open an existing MANIFEST file for appending further records,
    /// without rewriting its header.
    pub fn open_append(path: &std::path::Path) -> Result<Self> {
        let mut file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|e| Error::corruption_with("truncated MANIFEST header", e))?;
        if magic != MANIFEST_MAGIC {
            return Err(Error::corruption("invalid MANIFEST magic"));
        }
        file.seek(std::io::SeekFrom::End(0))?;
        Ok(ManifestWriter { file })
    }

    /// Append one edit as a framed record and fsync the file.
    pub fn append(&mut self, edit: &VersionEdit) -> Result<()> {
        let payload = edit.to_bytes();
        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        self.file.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.file.write_all(&payload)?;
        self.file.write_all(&crc.to_le_bytes())?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Reads a MANIFEST file as a sequence of `VersionEdit` records.
pub struct ManifestReader {
    file: std::fs::File,
}

impl ManifestReader {
    /// Open an existing MANIFEST file and validate its header.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let mut file = std::fs::OpenOptions::new().read(true).open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|e| Error::corruption_with("truncated MANIFEST header", e))?;
        if magic != MANIFEST_MAGIC {
            return Err(Error::corruption("invalid MANIFEST magic"));
        }
        let mut version_buf = [0u8; 4];
        file.read_exact(&mut version_buf)
            .map_err(|e| Error::corruption_with("truncated MANIFEST header", e))?;
        let version = u32::from_le_bytes(version_buf);
        if version != MANIFEST_FORMAT_VERSION {
            return Err(Error::not_supported(format!(
                "unsupported MANIFEST format version {version}"
            )));
        }
        Ok(ManifestReader { file })
    }

    /// Read every remaining record in the file in order.
    pub fn read_all(mut self) -> Result<Vec<VersionEdit>> {
        let mut edits = Vec::new();
        loop {
            let mut len_buf = [0u8; 4];
            match self.file.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut payload = vec![0u8; len];
            self.file
                .read_exact(&mut payload)
                .map_err(|e| Error::corruption_with("truncated MANIFEST record", e))?;

            let mut crc_buf = [0u8; 4];
            self.file
                .read_exact(&mut crc_buf)
                .map_err(|e| Error::corruption_with("truncated MANIFEST record checksum", e))?;
            let stored_crc = u32::from_le_bytes(crc_buf);

            let mut hasher = Hasher::new();
            hasher.update(&payload);
            if hasher.finalize() != stored_crc {
                return Err(Error::corruption("MANIFEST record checksum mismatch"));
            }

            edits.push(VersionEdit::from_bytes(&payload)?);
        }
        Ok(edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_meta(n: u64) -> FileMeta {
        FileMeta {
            number: FileNumber(n),
            path_id: 0,
            file_size: 1024,
            smallest_key: b"a".to_vec(),
            largest_key: b"z".to_vec(),
            smallest_seq: SequenceNumber(1),
            largest_seq: SequenceNumber(10),
            marked_for_compaction: false,
            oldest_blob_file_number: 0,
            oldest_ancester_time: 0,
            file_creation_time: 0,
        }
    }

    #[test]
    fn version_edit_roundtrip() {
        let mut edit = VersionEdit::new(0);
        edit.log_number = Some(5);
        edit.next_file_number = Some(6);
        edit.last_sequence = Some(100);
        edit.db_id = Some("abc-123".to_string());
        edit.add_file(0, sample_meta(7));
        edit.delete_file(0, FileNumber(3));

        let bytes = edit.to_bytes();
        let decoded = VersionEdit::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, edit);
    }

    #[test]
    fn dropped_flag_roundtrips() {
        let mut edit = VersionEdit::new(3);
        edit.dropped = true;
        let decoded = VersionEdit::from_bytes(&edit.to_bytes()).unwrap();
        assert!(decoded.dropped);
    }

    #[test]
    fn manifest_append_and_read_all() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");

        {
            let mut w = ManifestWriter::create(&path).unwrap();
            let mut e1 = VersionEdit::new(0);
            e1.log_number = Some(0);
            e1.next_file_number = Some(2);
            e1.last_sequence = Some(0);
            w.append(&e1).unwrap();

            let mut e2 = VersionEdit::new(0);
            e2.add_file(0, sample_meta(2));
            e2.log_number = Some(3);
            w.append(&e2).unwrap();
        }

        let edits = ManifestReader::open(&path).unwrap().read_all().unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].next_file_number, Some(2));
        assert_eq!(edits[1].added_files.len(), 1);
    }

    #[test]
    fn manifest_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-garbage");
        std::fs::write(&path, b"nope").unwrap();
        assert!(ManifestReader::open(&path).is_err());
    }

    #[test]
    fn manifest_detects_checksum_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        {
            let mut w = ManifestWriter::create(&path).unwrap();
            w.append(&VersionEdit::new(0)).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let result = ManifestReader::open(&path).unwrap().read_all();
        assert!(result.is_err());
    }
}
