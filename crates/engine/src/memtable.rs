//! In-memory write buffer the replay loop and recovery-time flush drain
//! (spec §1, §4.6, §4.7: "MemTable" and "TableBuilder" are named as
//! narrow external contracts, not specified in full). `BTreeMemTable` is
//! the supplemented minimal implementation that satisfies both seams.

use std::collections::BTreeMap;

use strata_core::SequenceNumber;
use strata_storage::TableEntry;

/// The narrow memtable contract recovery needs: insert writes in
/// sequence order, report when a size threshold is crossed, and drain
/// in key order for flushing.
pub trait MemTable: Send {
    /// Apply one write. Returns `true` if the memtable is now considered
    /// full and should be flushed before more writes are applied.
    fn insert(&mut self, key: Vec<u8>, value: Option<Vec<u8>>, sequence: SequenceNumber) -> bool;

    /// Look up a key's current value. `None` if the key was never
    /// written; `Some(None)` if the latest write was a deletion.
    fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>>;

    /// Whether the memtable currently holds no entries.
    fn is_empty(&self) -> bool;

    /// Approximate memory footprint in bytes.
    fn approximate_size(&self) -> usize;

    /// Drain all entries in ascending key order, leaving the memtable
    /// empty.
    fn drain_sorted(&mut self) -> Vec<TableEntry>;
}

/// A `BTreeMap`-backed memtable. Last writer wins per key, matching
/// sequential WAL replay order (spec §4.6: records are applied in the
/// order recovered, so a later write to the same key must shadow an
/// earlier one).
pub struct BTreeMemTable {
    entries: BTreeMap<Vec<u8>, (Option<Vec<u8>>, SequenceNumber)>,
    approximate_size: usize,
    size_threshold: usize,
}

impl BTreeMemTable {
    /// Construct an empty memtable that reports "full" once
    /// `approximate_size()` would exceed `size_threshold` bytes.
    pub fn new(size_threshold: usize) -> Self {
        BTreeMemTable { entries: BTreeMap::new(), approximate_size: 0, size_threshold }
    }

    fn entry_cost(key: &[u8], value: &Option<Vec<u8>>) -> usize {
        key.len() + value.as_ref().map(|v| v.len()).unwrap_or(0) + 16
    }
}

impl MemTable for BTreeMemTable {
    fn insert(&mut self, key: Vec<u8>, value: Option<Vec<u8>>, sequence: SequenceNumber) -> bool {
        let cost = Self::entry_cost(&key, &value);
        if let Some((old_value, _)) = self.entries.insert(key.clone(), (value, sequence)) {
            self.approximate_size =
                self.approximate_size.saturating_sub(Self::entry_cost(&key, &old_value));
        }
        self.approximate_size += cost;
        self.approximate_size >= self.size_threshold
    }

    fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.entries.get(key).map(|(value, _)| value.clone())
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn approximate_size(&self) -> usize {
        self.approximate_size
    }

    fn drain_sorted(&mut self) -> Vec<TableEntry> {
        let drained = std::mem::take(&mut self.entries);
        self.approximate_size = 0;
        drained
            .into_iter()
            .map(|(key, (value, sequence))| TableEntry { key, value, sequence })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_write_shadows_earlier_one() {
        let mut mt = BTreeMemTable::new(1 << 20);
        mt.insert(b"k".to_vec(), Some(b"v1".to_vec()), SequenceNumber(1));
        mt.insert(b"k".to_vec(), Some(b"v2".to_vec()), SequenceNumber(2));
        let drained = mt.drain_sorted();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].value, Some(b"v2".to_vec()));
    }

    #[test]
    fn reports_full_past_threshold() {
        let mut mt = BTreeMemTable::new(16);
        assert!(!mt.insert(b"a".to_vec(), Some(b"1".to_vec()), SequenceNumber(1)));
        let full = mt.insert(b"bbbbbbbbbbbbbbbb".to_vec(), Some(b"2".to_vec()), SequenceNumber(2));
        assert!(full);
    }

    #[test]
    fn get_reflects_latest_write() {
        let mut mt = BTreeMemTable::new(1 << 20);
        assert_eq!(mt.get(b"k"), None);
        mt.insert(b"k".to_vec(), Some(b"v1".to_vec()), SequenceNumber(1));
        assert_eq!(mt.get(b"k"), Some(Some(b"v1".to_vec())));
        mt.insert(b"k".to_vec(), None, SequenceNumber(2));
        assert_eq!(mt.get(b"k"), Some(None));
    }

    #[test]
    fn drain_sorts_by_key() {
        let mut mt = BTreeMemTable::new(1 << 20);
        mt.insert(b"b".to_vec(), Some(b"2".to_vec()), SequenceNumber(1));
        mt.insert(b"a".to_vec(), Some(b"1".to_vec()), SequenceNumber(2));
        let drained = mt.drain_sorted();
        assert_eq!(drained[0].key, b"a".to_vec());
        assert_eq!(drained[1].key, b"b".to_vec());
    }
}
