//! `WalFilter` — the optional hook invoked for every WAL record during
//! replay (spec §4.6). Modeled on the teacher's `codec/traits.rs` seam
//! style: a small trait object the engine can plug in, with no default
//! implementation baked into the replay loop itself.

/// What the replay loop should do with the record a `WalFilter` just saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Apply the record (or its replacement batch) as normal.
    ContinueProcessing,
    /// Drop this record; do not apply it, but keep replaying.
    IgnoreCurrentRecord,
    /// Stop replay entirely; this and all later WAL files are not
    /// applied.
    StopReplay,
    /// Treat this record as corrupted, subject to the active
    /// `WALRecoveryMode` policy.
    CorruptedRecord,
}

/// The result of inspecting one WAL record.
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// What to do with the record.
    pub action: FilterAction,
    /// A replacement batch, if the filter wants to rewrite the record
    /// in place instead of dropping or passing it through unchanged.
    pub replacement_batch: Option<Vec<u8>>,
}

impl FilterResult {
    /// Continue processing the record unchanged.
    pub fn continue_processing() -> Self {
        FilterResult { action: FilterAction::ContinueProcessing, replacement_batch: None }
    }

    /// Drop this record.
    pub fn ignore() -> Self {
        FilterResult { action: FilterAction::IgnoreCurrentRecord, replacement_batch: None }
    }

    /// Stop replay at this record.
    pub fn stop() -> Self {
        FilterResult { action: FilterAction::StopReplay, replacement_batch: None }
    }

    /// Treat this record as corrupted.
    pub fn corrupted() -> Self {
        FilterResult { action: FilterAction::CorruptedRecord, replacement_batch: None }
    }

    /// Replace the batch and continue processing with the replacement.
    pub fn replace(batch: Vec<u8>) -> Self {
        FilterResult { action: FilterAction::ContinueProcessing, replacement_batch: Some(batch) }
    }
}

/// An engine-supplied hook inspecting (and optionally rewriting) every
/// WAL record before it is applied during replay.
pub trait WalFilter: Send + Sync {
    /// A short name for this filter, surfaced in logs.
    fn name(&self) -> &str;

    /// Called once per record found during replay, in WAL order.
    fn log_record_found(&self, log_number: u64, file_name: &str, batch: &[u8]) -> FilterResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DropEverything;
    impl WalFilter for DropEverything {
        fn name(&self) -> &str {
            "drop-everything"
        }
        fn log_record_found(&self, _log_number: u64, _file_name: &str, _batch: &[u8]) -> FilterResult {
            FilterResult::ignore()
        }
    }

    #[test]
    fn filter_can_ignore_records() {
        let filter = DropEverything;
        let result = filter.log_record_found(1, "000001.log", b"payload");
        assert_eq!(result.action, FilterAction::IgnoreCurrentRecord);
    }
}
