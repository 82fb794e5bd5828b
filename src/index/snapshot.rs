//! Sorted `(key, address)` snapshot shared by every static index.

use std::ops::Range;

use tracing::debug;

use crate::address::Address;
use crate::table::{TupleKey, TupleTable, TupleValue};

/// One snapshot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry<K> {
    pub key: K,
    pub address: Address,
}

/// Frozen, key-sorted copy of a table's `(key, address)` pairs.
///
/// Equal keys occupy a contiguous run; their relative order is unspecified.
#[derive(Debug, Clone)]
pub struct SortedSnapshot<K> {
    entries: Vec<SnapshotEntry<K>>,
}

impl<K: TupleKey> SortedSnapshot<K> {
    /// Drain `table` through its scan iterator and sort by key.
    pub fn from_table<V: TupleValue>(table: &TupleTable<K, V>) -> Self {
        let iter = table.iter();
        let mut entries = Vec::with_capacity(iter.len());
        entries.extend(iter.map(|(address, key)| SnapshotEntry { key, address }));
        entries.sort_unstable_by_key(|e| e.key);
        debug!(
            entries = entries.len(),
            blocks = table.block_count(),
            "sorted snapshot materialized"
        );
        Self { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[SnapshotEntry<K>] {
        &self.entries
    }

    #[inline]
    pub fn key_at(&self, pos: usize) -> K {
        self.entries[pos].key
    }

    /// Smallest and largest key, or `None` when empty.
    pub fn key_bounds(&self) -> Option<(K, K)> {
        Some((self.entries.first()?.key, self.entries.last()?.key))
    }

    /// Bytes held by the snapshot rows.
    pub fn memory_usage(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<SnapshotEntry<K>>()
    }

    /// First position in `within` whose key is not less than `key`.
    #[inline]
    pub fn lower_bound_in(&self, key: K, within: Range<usize>) -> usize {
        within.start + self.entries[within].partition_point(|e| e.key < key)
    }

    /// Any position in `within` holding `key`.
    #[inline]
    pub fn binary_search_in(&self, key: K, within: Range<usize>) -> Option<usize> {
        let start = within.start;
        self.entries[within]
            .binary_search_by(|e| e.key.cmp(&key))
            .ok()
            .map(|pos| start + pos)
    }

    /// Positions holding `key`, located by binary search.
    pub fn equal_range(&self, key: K) -> Range<usize> {
        let start = self.entries.partition_point(|e| e.key < key);
        let end = start + self.entries[start..].partition_point(|e| e.key <= key);
        start..end
    }

    /// Addresses of every row around `pos` that shares its key.
    ///
    /// Collects the hit first, then walks left, then right, stopping at the
    /// first differing key or at either end of the snapshot.
    pub fn expand_equal(&self, pos: usize) -> Vec<Address> {
        let key = self.entries[pos].key;
        let mut out = vec![self.entries[pos].address];
        out.extend(
            self.entries[..pos]
                .iter()
                .rev()
                .take_while(|e| e.key == key)
                .map(|e| e.address),
        );
        out.extend(
            self.entries[pos + 1..]
                .iter()
                .take_while(|e| e.key == key)
                .map(|e| e.address),
        );
        out
    }

    /// Addresses from `start` onward while keys stay `<= hi`.
    pub fn collect_until(&self, start: usize, hi: K) -> Vec<Address> {
        self.entries[start..]
            .iter()
            .take_while(|e| e.key <= hi)
            .map(|e| e.address)
            .collect()
    }

    pub fn addresses(&self, range: Range<usize>) -> Vec<Address> {
        self.entries[range].iter().map(|e| e.address).collect()
    }

    /// Addresses holding `key`, in snapshot order.
    pub fn scan(&self, key: K) -> Vec<Address> {
        self.addresses(self.equal_range(key))
    }

    /// Addresses holding `key`, in reverse snapshot order.
    pub fn scan_reverse(&self, key: K) -> Vec<Address> {
        self.entries[self.equal_range(key)]
            .iter()
            .rev()
            .map(|e| e.address)
            .collect()
    }

    /// The first `count` addresses in key order.
    pub fn scan_full(&self, count: usize) -> Vec<Address> {
        self.addresses(0..count.min(self.len()))
    }
}
