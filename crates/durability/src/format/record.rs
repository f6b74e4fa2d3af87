//! On-disk WAL file and record format.
//!
//! WAL files are named `<N>.log`, zero-padded (spec §6). Grounded on the
//! teacher's `format/wal_record.rs` segment framing (magic + length + CRC),
//! with the record payload reshaped from the teacher's
//! `{txn_id, branch_id, timestamp, writeset}` into spec §3's
//! "byte payload of one committed `WriteBatch`... first record of each
//! batch carries its starting sequence number."
//!
//! ```text
//! File header (32 bytes): magic | format_version | file_number | database_uuid
//! Record: Length(4) | FormatVer(1) | StartingSequence(8) | Batch(variable) | CRC32(4)
//! ```

use crc32fast::Hasher;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use strata_core::error::{Error, Result};
use strata_core::SequenceNumber;

/// Magic bytes identifying a WAL file.
pub const WAL_FILE_MAGIC: [u8; 4] = *b"WALF";
/// Current WAL file format version.
pub const WAL_FILE_FORMAT_VERSION: u32 = 1;
/// Size of the WAL file header in bytes.
pub const WAL_FILE_HEADER_SIZE: usize = 32;
/// Current WAL record format version.
pub const WAL_RECORD_FORMAT_VERSION: u8 = 1;

/// Fixed-size header written at the start of every WAL file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalFileHeader {
    /// File number (matches the `<N>` in the filename).
    pub file_number: u64,
    /// Database UUID, for cross-file integrity checking.
    pub database_uuid: [u8; 16],
}

impl WalFileHeader {
    fn to_bytes(self) -> [u8; WAL_FILE_HEADER_SIZE] {
        let mut bytes = [0u8; WAL_FILE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&WAL_FILE_MAGIC);
        bytes[4..8].copy_from_slice(&WAL_FILE_FORMAT_VERSION.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.file_number.to_le_bytes());
        bytes[16..32].copy_from_slice(&self.database_uuid);
        bytes
    }

    fn from_bytes(bytes: &[u8; WAL_FILE_HEADER_SIZE]) -> Result<Self> {
        let magic: [u8; 4] = bytes[0..4].try_into().unwrap();
        if magic != WAL_FILE_MAGIC {
            return Err(Error::corruption("invalid WAL file magic"));
        }
        let file_number = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let database_uuid: [u8; 16] = bytes[16..32].try_into().unwrap();
        Ok(WalFileHeader { file_number, database_uuid })
    }
}

/// An open WAL file handle, used for both sequential writing (go-live,
/// steady state) and sequential reading (recovery).
pub struct WalFile {
    file: File,
    file_number: u64,
    write_position: u64,
    path: PathBuf,
}

impl WalFile {
    /// Create a new WAL file and write its header.
    pub fn create(dir: &Path, file_number: u64, database_uuid: [u8; 16]) -> Result<Self> {
        let path = wal_path(dir, file_number);
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .read(true)
            .open(&path)?;
        let header = WalFileHeader { file_number, database_uuid };
        file.write_all(&header.to_bytes())?;
        Ok(WalFile { file, file_number, write_position: WAL_FILE_HEADER_SIZE as u64, path })
    }

    /// Open an existing WAL file for sequential reading, validating its
    /// header.
    pub fn open_read(dir: &Path, file_number: u64) -> Result<Self> {
        let path = wal_path(dir, file_number);
        let mut file = OpenOptions::new().read(true).open(&path)?;
        let mut header_bytes = [0u8; WAL_FILE_HEADER_SIZE];
        file.read_exact(&mut header_bytes)
            .map_err(|e| Error::corruption_with("truncated WAL file header", e))?;
        let header = WalFileHeader::from_bytes(&header_bytes)?;
        Ok(WalFile {
            file,
            file_number: header.file_number,
            write_position: WAL_FILE_HEADER_SIZE as u64,
            path,
        })
    }

    /// Open an existing WAL file for appending (recycling or resuming).
    pub fn open_append(dir: &Path, file_number: u64) -> Result<Self> {
        let path = wal_path(dir, file_number);
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut header_bytes = [0u8; WAL_FILE_HEADER_SIZE];
        file.read_exact(&mut header_bytes)
            .map_err(|e| Error::corruption_with("truncated WAL file header", e))?;
        WalFileHeader::from_bytes(&header_bytes)?;
        let write_position = file.seek(SeekFrom::End(0))?;
        Ok(WalFile { file, file_number, write_position, path })
    }

    /// This file's number.
    pub fn file_number(&self) -> u64 {
        self.file_number
    }

    /// Path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size in bytes.
    pub fn size(&self) -> u64 {
        self.write_position
    }

    /// Append one record.
    pub fn append_record(&mut self, record: &WalRecord) -> Result<()> {
        let bytes = record.to_bytes();
        self.file.write_all(&bytes)?;
        self.write_position += bytes.len() as u64;
        Ok(())
    }

    /// Fsync this file's data to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Truncate a partially-written file at `position` (used to drop
    /// preallocated slack from the last recovered WAL — spec §4.8
    /// `RestoreAliveLogFiles`).
    pub fn truncate(&mut self, position: u64) -> Result<()> {
        self.file.set_len(position)?;
        self.write_position = position;
        self.file.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Read raw bytes from the current position onward (used by the
    /// sequential WAL reader).
    pub(crate) fn read_to_end_from_header(&mut self) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(WAL_FILE_HEADER_SIZE as u64))?;
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// `<wal_dir>/<N>.log`, zero-padded (spec §6).
pub fn wal_path(dir: &Path, file_number: u64) -> PathBuf {
    dir.join(format!("{file_number:06}.log"))
}

/// One WAL record: the byte payload of one committed `WriteBatch`,
/// framed by length + format version + CRC32 (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// The sequence number of the first logical write in this batch.
    pub starting_sequence: SequenceNumber,
    /// Opaque, engine-owned `WriteBatch` bytes.
    pub batch: Vec<u8>,
}

impl WalRecord {
    /// Construct a record.
    pub fn new(starting_sequence: SequenceNumber, batch: Vec<u8>) -> Self {
        WalRecord { starting_sequence, batch }
    }

    /// Serialize to bytes: length(4) + format_version(1) + sequence(8) +
    /// batch + crc32(4).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(9 + self.batch.len());
        payload.push(WAL_RECORD_FORMAT_VERSION);
        payload.extend_from_slice(&self.starting_sequence.0.to_le_bytes());
        payload.extend_from_slice(&self.batch);

        let crc = crc(&payload);

        let total_len = payload.len() + 4;
        let mut record = Vec::with_capacity(4 + total_len);
        record.extend_from_slice(&(total_len as u32).to_le_bytes());
        record.extend_from_slice(&payload);
        record.extend_from_slice(&crc.to_le_bytes());
        record
    }

    /// Parse one record from the start of `bytes`. Returns
    /// `(record, bytes_consumed)`.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<(Self, usize), RecordParseError> {
        if bytes.len() < 4 {
            return Err(RecordParseError::InsufficientData);
        }
        let length = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        if length < 5 {
            return Err(RecordParseError::InvalidFormat);
        }
        if bytes.len() < 4 + length {
            return Err(RecordParseError::InsufficientData);
        }

        let payload_with_crc = &bytes[4..4 + length];
        let payload = &payload_with_crc[..length - 4];
        let stored_crc = u32::from_le_bytes(payload_with_crc[length - 4..].try_into().unwrap());

        if crc(payload) != stored_crc {
            return Err(RecordParseError::ChecksumMismatch);
        }

        if payload.len() < 9 {
            return Err(RecordParseError::InvalidFormat);
        }
        let format_version = payload[0];
        if format_version != WAL_RECORD_FORMAT_VERSION {
            return Err(RecordParseError::UnsupportedVersion(format_version));
        }
        let starting_sequence = SequenceNumber(u64::from_le_bytes(payload[1..9].try_into().unwrap()));
        let batch = payload[9..].to_vec();

        Ok((WalRecord { starting_sequence, batch }, 4 + length))
    }
}

fn crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Record-level parse failures, classified so the replay loop (spec §4.6)
/// can apply the right `WALRecoveryMode` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordParseError {
    /// Not enough bytes remain — either a torn tail write or truncation.
    InsufficientData,
    /// The record's declared length or shape is nonsensical.
    InvalidFormat,
    /// The CRC did not match — mid-stream corruption.
    ChecksumMismatch,
    /// The record's format version is newer than this build supports.
    UnsupportedVersion(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_roundtrip() {
        let record = WalRecord::new(SequenceNumber(42), vec![1, 2, 3, 4]);
        let bytes = record.to_bytes();
        let (parsed, consumed) = WalRecord::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn record_detects_corruption() {
        let record = WalRecord::new(SequenceNumber(1), vec![9, 9, 9]);
        let mut bytes = record.to_bytes();
        let last = bytes.len() - 5;
        bytes[last] ^= 0xFF;
        assert_eq!(WalRecord::from_bytes(&bytes), Err(RecordParseError::ChecksumMismatch));
    }

    #[test]
    fn file_create_and_reopen() {
        let dir = tempdir().unwrap();
        let uuid = [7u8; 16];
        {
            let mut f = WalFile::create(dir.path(), 3, uuid).unwrap();
            f.append_record(&WalRecord::new(SequenceNumber(1), vec![1, 2, 3])).unwrap();
            f.sync().unwrap();
        }
        let f = WalFile::open_read(dir.path(), 3).unwrap();
        assert_eq!(f.file_number(), 3);
        assert!(f.size() > WAL_FILE_HEADER_SIZE as u64);
    }

    #[test]
    fn wal_path_is_zero_padded() {
        let dir = Path::new("/tmp/wal");
        assert_eq!(wal_path(dir, 3), PathBuf::from("/tmp/wal/000003.log"));
    }
}
