//! The open/recover core: wires `strata-core`'s ids and error type,
//! `strata-storage`'s on-disk layout, and `strata-durability`'s WAL
//! replay into the single `Db::open` pipeline (spec §2). Everything
//! outside that pipeline — reads, writes, compaction, background flush
//! — is out of scope; see the column-family and memtable modules for
//! the narrow recovery-time slice of that state this crate does own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod column_family;
pub mod db;
pub mod golive;
pub mod memtable;
pub mod options;
pub mod persistent_stats;
pub mod recovery;
pub mod recovery_flush;
pub mod write_batch;

pub use column_family::{ColumnFamilyData, SuperVersion, DEFAULT_MEMTABLE_SIZE_THRESHOLD};
pub use db::Db;
pub use golive::{go_live, GoLiveResult};
pub use memtable::{BTreeMemTable, MemTable};
pub use options::{
    read_options_file, sanitize, validate, write_options_file, Options, PersistedColumnFamily,
    PersistedDbPath, PersistedOptions,
};
pub use persistent_stats::{reconcile_persistent_stats_cf, seed_version_keys, PersistentStatsReconciliation};
pub use recovery::RecoverySink;
pub use recovery_flush::flush_column_family;
pub use write_batch::{BatchOp, WriteBatch};
