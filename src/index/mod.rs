//! Static (build-once, query-many) indexes over a [`TupleTable`](crate::TupleTable).
//!
//! Every static index goes through the same lifecycle: it is created empty,
//! [`StaticIndex::reorganize`] drains the table into a [`SortedSnapshot`] and
//! builds the index-specific structure, and from then on it only answers
//! queries. Rebuilding is not supported.

mod fast;
mod simd;
mod snapshot;

pub use fast::{FastIndex, FastStats, CACHELINE_KEYS};
pub use simd::FastKey;
pub use snapshot::{SnapshotEntry, SortedSnapshot};

use crate::address::Address;

/// The build-once/query-many contract shared by static index strategies.
///
/// Query methods require a built index and panic otherwise.
pub trait StaticIndex<K> {
    /// Drain the backing table, sort it and build the search structure.
    ///
    /// Must be called exactly once, after all inserts have finished.
    fn reorganize(&mut self);

    /// Addresses of every tuple whose key equals `key`.
    fn find(&self, key: K) -> Vec<Address>;

    /// Addresses of every tuple with `lo <= key <= hi`.
    ///
    /// Panics if `lo > hi`.
    fn find_range(&self, lo: K, hi: K) -> Vec<Address>;

    /// Addresses whose key equals `key`, in key order.
    fn scan(&self, key: K) -> Vec<Address>;

    /// Addresses whose key equals `key`, in reverse key order.
    fn scan_reverse(&self, key: K) -> Vec<Address>;

    /// Up to `count` addresses in ascending key order.
    fn scan_full(&self, count: usize) -> Vec<Address>;

    /// Number of indexed tuples (zero until built).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_built(&self) -> bool;
}
