//! WAL replay (spec §4.6): walk every WAL file at or after
//! `min_log_number_to_keep` in ascending order, apply each record's batch
//! through a `ReplaySink`, and enforce the active `WALRecoveryMode`'s
//! corruption policy. Grounded on the teacher's `recovery/replayer.rs`
//! `WalReplayer::replay_after`, extended with the log-number floor, the
//! `WalFilter` hook, and the four-mode policy table this spec adds.

use std::path::Path;

use strata_core::error::{Error, Result};
use strata_core::SequenceNumber;

use crate::format::record::{RecordParseError, WalFile};
use crate::recovery_mode::WALRecoveryMode;
use crate::wal_file::list_wal_numbers;
use crate::wal_filter::{FilterAction, WalFilter};

/// The outcome of applying one batch to the in-memory state.
pub struct ApplyResult {
    /// The sequence cursor after this batch (the starting sequence of
    /// the next expected batch).
    pub next_sequence: SequenceNumber,
    /// Column family ids whose memtable became full as a result of this
    /// batch and should be flushed before replay continues (spec §4.6
    /// step 5, "incremental flush").
    pub full_column_families: Vec<u32>,
}

/// The engine-owned state replay drives. Durability never inspects batch
/// bytes itself; it only frames and sequences them.
pub trait ReplaySink {
    /// Apply one batch recovered from `log_number`, starting at
    /// `starting_sequence`.
    fn apply_batch(
        &mut self,
        log_number: u64,
        starting_sequence: SequenceNumber,
        batch: &[u8],
    ) -> Result<ApplyResult>;

    /// Flush the named column families now, so their memtables can
    /// absorb the rest of replay (spec §4.6 step 5). `current_log_number`
    /// is the WAL file currently being replayed, which becomes the new
    /// `log_number` floor for any column family flushed here.
    fn flush_full(&mut self, full_column_families: &[u32], current_log_number: u64) -> Result<()>;

    /// Record that file number `n` has been observed, so the file-number
    /// allocator never reissues it (spec §4.6 step 2).
    fn mark_file_number_used(&mut self, n: u64);

    /// The `(column_family_id, log_number)` pairs as recovered from the
    /// manifest, used for the post-replay cross-check (spec §4.6 step 7:
    /// no column family may claim data newer than what replay actually
    /// recovered).
    fn column_family_log_numbers(&self) -> Vec<(u32, u64)>;
}

/// Summary of one replay pass.
#[derive(Debug, Default)]
pub struct ReplayStats {
    /// WAL file numbers that were at least partially replayed.
    pub logs_replayed: Vec<u64>,
    /// WAL file numbers skipped entirely (below `min_log_number_to_keep`).
    pub logs_skipped: Vec<u64>,
    /// Highest sequence number observed (0 if nothing was replayed).
    pub last_sequence: SequenceNumber,
    /// Whether a `WalFilter` requested an early stop.
    pub stopped_by_wal_filter: bool,
    /// The log number at which corruption halted replay, if any.
    pub corrupted_at_log_number: Option<u64>,
}

/// Replay every WAL file at or after `min_log_number_to_keep`, applying
/// batches to `sink` under `mode`'s corruption policy, with an optional
/// `filter` inspecting every record.
pub fn replay(
    wal_dir: &Path,
    min_log_number_to_keep: u64,
    mode: WALRecoveryMode,
    filter: Option<&dyn WalFilter>,
    sink: &mut dyn ReplaySink,
) -> Result<ReplayStats> {
    let numbers = list_wal_numbers(wal_dir)?;
    let mut stats = ReplayStats::default();
    let mut cursor = SequenceNumber::ZERO;
    // Set when PointInTimeRecovery stops mid-file: the sequence the next
    // WAL file's first record must match exactly to resume replay.
    let mut pit_pending_resume: Option<SequenceNumber> = None;
    let mut fully_stopped = false;

    for &number in &numbers {
        if fully_stopped {
            stats.logs_skipped.push(number);
            continue;
        }
        if number < min_log_number_to_keep {
            stats.logs_skipped.push(number);
            sink.mark_file_number_used(number);
            continue;
        }
        sink.mark_file_number_used(number);

        let mut file = match WalFile::open_read(wal_dir, number) {
            Ok(f) => f,
            Err(e) => {
                if mode == WALRecoveryMode::AbsoluteConsistency {
                    return Err(e);
                }
                tracing::warn!(log_number = number, error = %e, "skipping unreadable WAL file");
                stats.logs_skipped.push(number);
                continue;
            }
        };
        let file_name = format!("{number:06}.log");
        let bytes = file.read_to_end_from_header()?;

        stats.logs_replayed.push(number);
        let mut offset = 0usize;

        'records: while offset < bytes.len() {
            match crate::format::record::WalRecord::from_bytes(&bytes[offset..]) {
                Ok((record, consumed)) => {
                    if let Some(expected) = pit_pending_resume.take() {
                        if record.starting_sequence != expected {
                            fully_stopped = true;
                            break 'records;
                        }
                    }

                    let mut action = FilterAction::ContinueProcessing;
                    let mut effective_batch = record.batch;
                    if let Some(f) = filter {
                        let result = f.log_record_found(number, &file_name, &effective_batch);
                        action = result.action;
                        if let Some(replacement) = result.replacement_batch {
                            if batch_op_count(&replacement) > batch_op_count(&effective_batch) {
                                return Err(Error::not_supported(format!(
                                    "WalFilter {:?} grew the batch at log {number}: a replacement batch may drop or rewrite records but never add to them",
                                    f.name()
                                )));
                            }
                            effective_batch = replacement;
                        }
                    }

                    match action {
                        FilterAction::IgnoreCurrentRecord => {
                            offset += consumed;
                            continue 'records;
                        }
                        FilterAction::StopReplay => {
                            stats.stopped_by_wal_filter = true;
                            fully_stopped = true;
                            break 'records;
                        }
                        FilterAction::CorruptedRecord => {
                            handle_corruption(
                                mode,
                                number,
                                &mut stats,
                                &mut pit_pending_resume,
                                &mut fully_stopped,
                                cursor,
                                false,
                            )?;
                            if fully_stopped || pit_pending_resume.is_some() {
                                break 'records;
                            }
                            offset += consumed;
                            continue 'records;
                        }
                        FilterAction::ContinueProcessing => {}
                    }

                    let result = sink.apply_batch(number, record.starting_sequence, &effective_batch)?;
                    cursor = cursor.max(result.next_sequence);
                    stats.last_sequence = cursor;
                    if !result.full_column_families.is_empty() {
                        sink.flush_full(&result.full_column_families, number)?;
                    }

                    offset += consumed;
                }
                Err(RecordParseError::InsufficientData) => {
                    // Torn tail: only a legitimate "stop" if it's the
                    // true end of the file, which it is here since we
                    // always read to EOF.
                    let is_tail = true;
                    handle_corruption(
                        mode,
                        number,
                        &mut stats,
                        &mut pit_pending_resume,
                        &mut fully_stopped,
                        cursor,
                        is_tail,
                    )?;
                    break 'records;
                }
                Err(RecordParseError::ChecksumMismatch) | Err(RecordParseError::InvalidFormat) => {
                    handle_corruption(
                        mode,
                        number,
                        &mut stats,
                        &mut pit_pending_resume,
                        &mut fully_stopped,
                        cursor,
                        false,
                    )?;
                    if fully_stopped || pit_pending_resume.is_some() {
                        break 'records;
                    }
                    // SkipAnyCorruptedRecords: resync by scanning forward
                    // one byte at a time for the next record that parses.
                    offset += 1;
                    while offset < bytes.len() {
                        if crate::format::record::WalRecord::from_bytes(&bytes[offset..]).is_ok() {
                            break;
                        }
                        offset += 1;
                    }
                }
                Err(RecordParseError::UnsupportedVersion(v)) => {
                    return Err(Error::not_supported(format!(
                        "WAL record format version {v} is not supported"
                    )));
                }
            }
        }
    }

    if let Some(corrupted_at) = stats.corrupted_at_log_number {
        for (cf_id, log_number) in sink.column_family_log_numbers() {
            if log_number > corrupted_at {
                return Err(Error::corruption(format!(
                    "column family {cf_id} claims log number {log_number}, past the corrupted WAL at {corrupted_at}"
                )));
            }
        }
    }

    Ok(stats)
}

/// The op count a `WriteBatch`'s wire format always carries as its
/// leading 4 bytes (little-endian `u32`). Durability never decodes the
/// engine's batch format, but the `WalFilter` "never grows a batch"
/// contract (spec §4.6 step 3) only needs this one field.
fn batch_op_count(batch: &[u8]) -> u32 {
    if batch.len() < 4 {
        return 0;
    }
    u32::from_le_bytes(batch[0..4].try_into().unwrap())
}

#[allow(clippy::too_many_arguments)]
fn handle_corruption(
    mode: WALRecoveryMode,
    log_number: u64,
    stats: &mut ReplayStats,
    pit_pending_resume: &mut Option<SequenceNumber>,
    fully_stopped: &mut bool,
    cursor: SequenceNumber,
    is_torn_tail: bool,
) -> Result<()> {
    let fatal = if is_torn_tail { mode.torn_tail_is_fatal() } else { mode.mid_stream_corruption_is_fatal() };

    if fatal {
        return Err(Error::corruption(format!(
            "corrupted WAL record in log {log_number} under {mode:?}"
        )));
    }

    stats.corrupted_at_log_number.get_or_insert(log_number);

    match mode {
        WALRecoveryMode::TolerateCorruptedTailRecords => {
            // Torn tail: accept the prefix, stop this file, keep going.
        }
        WALRecoveryMode::PointInTimeRecovery => {
            *pit_pending_resume = Some(cursor);
        }
        WALRecoveryMode::SkipAnyCorruptedRecords => {
            // Caller resyncs and keeps scanning this same file.
        }
        WALRecoveryMode::AbsoluteConsistency => unreachable!("fatal handled above"),
    }

    let _ = fully_stopped;
    Ok(())
}
