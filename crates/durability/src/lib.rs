//! WAL discovery, framing, and replay (spec §4.5, §4.6, §4.10): the
//! `<N>.log` file format, the four `WALRecoveryMode` corruption
//! policies, the optional `WalFilter` inspection hook, and the replay
//! loop that drives an engine-supplied `ReplaySink`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod format;
pub mod recovery_mode;
pub mod replay;
pub mod sync_policy;
pub mod wal_file;
pub mod wal_filter;

pub use codec::{BatchCodec, OpaqueBatchCodec};
pub use format::record::{
    wal_path, RecordParseError, WalFile, WalFileHeader, WalRecord, WAL_FILE_FORMAT_VERSION,
    WAL_FILE_HEADER_SIZE, WAL_FILE_MAGIC, WAL_RECORD_FORMAT_VERSION,
};
pub use recovery_mode::WALRecoveryMode;
pub use replay::{replay, ApplyResult, ReplaySink, ReplayStats};
pub use sync_policy::SyncPolicy;
pub use wal_file::list_wal_numbers;
pub use wal_filter::{FilterAction, FilterResult, WalFilter};
