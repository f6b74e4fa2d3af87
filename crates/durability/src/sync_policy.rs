//! Fsync cadence for WAL writes, independent of `WALRecoveryMode` (which
//! governs replay, not steady-state writes). Grounded verbatim on the
//! teacher's `wal/mode.rs` `DurabilityMode`, renamed to avoid colliding
//! with the recovery-mode concept this crate also defines.

/// How aggressively the WAL writer fsyncs after appending records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Never fsync explicitly; rely on the OS page cache. Fastest, least
    /// durable.
    Cache,
    /// Fsync after every append. Slowest, strongest durability.
    Always,
    /// Fsync on a schedule: every `batch_size` appends or every
    /// `interval_ms`, whichever comes first.
    Standard {
        /// Fsync at least this often, in milliseconds.
        interval_ms: u64,
        /// Fsync at least every this many appends.
        batch_size: u32,
    },
}

impl SyncPolicy {
    /// Whether this policy ever calls for an explicit fsync.
    pub fn requires_wal(&self) -> bool {
        !matches!(self, SyncPolicy::Cache)
    }

    /// Whether every single append must be fsynced before returning.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, SyncPolicy::Always)
    }

    /// Human-readable description, used in logs.
    pub fn description(&self) -> String {
        match self {
            SyncPolicy::Cache => "cache".to_string(),
            SyncPolicy::Always => "always".to_string(),
            SyncPolicy::Standard { interval_ms, batch_size } => {
                format!("standard(interval_ms={interval_ms}, batch_size={batch_size})")
            }
        }
    }

    /// The engine's recommended default `Standard` configuration.
    pub fn standard_default() -> Self {
        SyncPolicy::Standard { interval_ms: 1000, batch_size: 128 }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy::Standard { interval_ms: 1000, batch_size: 128 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_never_requires_wal_sync() {
        assert!(!SyncPolicy::Cache.requires_wal());
        assert!(!SyncPolicy::Cache.requires_immediate_fsync());
    }

    #[test]
    fn always_requires_immediate_fsync() {
        assert!(SyncPolicy::Always.requires_immediate_fsync());
    }

    #[test]
    fn default_is_standard() {
        assert_eq!(SyncPolicy::default(), SyncPolicy::standard_default());
    }
}
