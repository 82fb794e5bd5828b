//! Append-only tuple table.
//!
//! A [`TupleTable`] is an unbounded sequence of fixed-capacity
//! [`StorageBlock`]s. It is the only write path of the system: producers call
//! [`TupleTable::insert`] from any number of threads and get back an
//! [`Address`] that stays valid for the lifetime of the table.
//!
//! Insertion is lock-free. Each insert claims a slot on the active block with a
//! single atomic `fetch_add`; the thread that claims a block's last slot
//! allocates the next block, appends it to the directory and then publishes it
//! as active with a release store. Threads that find the active block full
//! spin until that publication lands.
//!
//! ```rust
//! use index_zoo::TupleTable;
//!
//! let table: TupleTable<u32, u64> = TupleTable::new();
//! let a = table.insert(42, 7);
//! assert_eq!(table.resolve_key(a), 42);
//! assert_eq!(table.resolve_value(a), 7);
//! assert_eq!(table.len(), 1);
//! ```

mod block;
mod directory;
mod iter;

pub use block::{SlotClaim, StorageBlock};
pub use iter::TableIter;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytemuck::Pod;
use tracing::trace;

use crate::address::{Address, BlockId};
use crate::config::TableConfig;
use crate::error::Result;
use directory::BlockDirectory;

/// Fixed-size, ordered key type storable in a table.
pub trait TupleKey: Pod + Ord + fmt::Debug {}

impl<T: Pod + Ord + fmt::Debug> TupleKey for T {}

/// Fixed-size value type storable in a table.
pub trait TupleValue: Pod {}

impl<T: Pod> TupleValue for T {}

/// Growing, append-only table of `(K, V)` tuples.
pub struct TupleTable<K, V> {
    config: TableConfig,
    blocks: BlockDirectory<K, V>,
    /// Id of the only block currently accepting inserts.
    active: AtomicU64,
    sealed: AtomicBool,
}

impl<K: TupleKey, V: TupleValue> TupleTable<K, V> {
    /// Create a table with the default block capacity.
    pub fn new() -> Self {
        Self::build(TableConfig::default())
    }

    /// Create a table with the given configuration.
    pub fn with_config(config: TableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a table whose blocks hold `block_capacity` tuples.
    pub fn with_block_capacity(block_capacity: u64) -> Result<Self> {
        Self::with_config(TableConfig::with_block_capacity(block_capacity))
    }

    fn build(config: TableConfig) -> Self {
        let blocks = BlockDirectory::new();
        blocks.push(StorageBlock::new(0, config.block_capacity));
        Self {
            config,
            blocks,
            active: AtomicU64::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    /// Append a tuple and return its address.
    ///
    /// # Panics
    ///
    /// Panics if the table has been sealed by an index build.
    pub fn insert(&self, key: K, value: V) -> Address {
        assert!(
            !self.is_sealed(),
            "insert into a sealed table: an index has already been reorganized over it"
        );

        loop {
            let block = self.active_block();
            let Some(claim) = block.try_claim_slot() else {
                // Another thread is rolling the block over.
                std::hint::spin_loop();
                continue;
            };

            let slot = claim.slot();
            let address = Address::new(block.block_id(), slot);
            block.write(claim, &key, &value);

            if slot == block.capacity() - 1 {
                self.roll_over(block.block_id());
            }
            return address;
        }
    }

    fn roll_over(&self, full_block: BlockId) {
        let next = self
            .blocks
            .push(StorageBlock::new(full_block + 1, self.config.block_capacity));
        // The block is fully constructed and reachable through the directory
        // before any thread can observe it as active.
        self.active.store(next.block_id(), Ordering::Release);
        trace!(block_id = next.block_id(), "storage block rolled over");
    }

    #[inline]
    fn active_block(&self) -> &StorageBlock<K, V> {
        self.block(self.active.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn block(&self, block_id: BlockId) -> &StorageBlock<K, V> {
        self.blocks
            .get(block_id)
            .unwrap_or_else(|| panic!("no storage block with id {block_id}"))
    }

    /// Key of the tuple at `address`.
    ///
    /// # Panics
    ///
    /// Panics if the address names a block or slot that does not exist.
    #[inline]
    pub fn resolve_key(&self, address: Address) -> K {
        self.block(address.block_id()).read_key(address.rel_offset())
    }

    /// Value of the tuple at `address`.
    ///
    /// # Panics
    ///
    /// Panics if the address names a block or slot that does not exist.
    #[inline]
    pub fn resolve_value(&self, address: Address) -> V {
        self.block(address.block_id()).read_value(address.rel_offset())
    }

    /// The tuple at `address`, or `None` if no such tuple has been inserted.
    pub fn get(&self, address: Address) -> Option<(K, V)> {
        let block = self.blocks.get(address.block_id())?;
        let slot = address.rel_offset();
        (slot < block.len()).then(|| (block.read_key(slot), block.read_value(slot)))
    }

    /// Exact number of tuples.
    ///
    /// Every block before the last one is full, so only the last block's
    /// counter needs to be read.
    pub fn len(&self) -> usize {
        let blocks = self.blocks.len();
        let last = self.block(blocks - 1);
        ((blocks - 1) * self.config.block_capacity + last.len()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upper bound on the tuple count: allocated blocks times their capacity.
    pub fn len_approx(&self) -> usize {
        (self.blocks.len() * self.config.block_capacity) as usize
    }

    /// Bytes of tuple storage allocated so far.
    pub fn memory_usage(&self) -> usize {
        self.len_approx() * StorageBlock::<K, V>::TUPLE_SIZE
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len() as usize
    }

    pub fn block_capacity(&self) -> u64 {
        self.config.block_capacity
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Scan every tuple as `(address, key)` in block then slot order.
    ///
    /// The bounds are captured when the iterator is created. Do not insert
    /// while iterating: slots claimed after that point are not visited, and
    /// slots claimed but not yet written may be read.
    pub fn iter(&self) -> TableIter<'_, K, V> {
        TableIter::new(self)
    }

    /// Reject all further inserts.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

impl<K: TupleKey, V: TupleValue> Default for TupleTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K: TupleKey, V: TupleValue> IntoIterator for &'a TupleTable<K, V> {
    type Item = (Address, K);
    type IntoIter = TableIter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: TupleKey, V: TupleValue> fmt::Debug for TupleTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleTable")
            .field("block_capacity", &self.config.block_capacity)
            .field("blocks", &self.blocks.len())
            .field("len", &self.len())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZooError;
    use std::collections::HashSet;

    #[test]
    fn test_insert_and_resolve() {
        let table: TupleTable<u64, u64> = TupleTable::new();
        let a = table.insert(1, 100);
        let b = table.insert(2, 200);
        assert_eq!(a, Address::new(0, 0));
        assert_eq!(b, Address::new(0, 1));
        assert_eq!(table.resolve_key(b), 2);
        assert_eq!(table.resolve_value(b), 200);
        assert_eq!(table.get(a), Some((1, 100)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_roll_over_into_new_blocks() {
        let table: TupleTable<u32, u32> = TupleTable::with_block_capacity(4).unwrap();
        let addresses: Vec<Address> = (0..10).map(|i| table.insert(i, i * 2)).collect();

        let expected: Vec<(u64, u64)> = (0..10).map(|i| (i / 4, i % 4)).collect();
        let got: Vec<(u64, u64)> = addresses.iter().map(|a| a.decode()).collect();
        assert_eq!(got, expected);

        // Filling block 0 and block 1 allocated blocks 1 and 2.
        assert_eq!(table.block_count(), 3);
        assert_eq!(table.len(), 10);
        assert_eq!(table.len_approx(), 12);
        assert_eq!(table.memory_usage(), 12 * 8);

        for (i, a) in addresses.iter().enumerate() {
            assert_eq!(table.resolve_value(*a), i as u32 * 2);
        }
    }

    #[test]
    fn test_exact_fill_allocates_empty_block() {
        let table: TupleTable<u32, u32> = TupleTable::with_block_capacity(5).unwrap();
        for i in 0..5 {
            table.insert(i, i);
        }
        assert_eq!(table.block_count(), 2);
        assert_eq!(table.len(), 5);
        assert_eq!(table.iter().count(), 5);
    }

    #[test]
    fn test_get_unknown_address() {
        let table: TupleTable<u32, u32> = TupleTable::with_block_capacity(8).unwrap();
        table.insert(1, 1);
        assert_eq!(table.get(Address::new(0, 1)), None);
        assert_eq!(table.get(Address::new(9, 0)), None);
    }

    #[test]
    #[should_panic(expected = "no storage block")]
    fn test_resolve_unknown_block_panics() {
        let table: TupleTable<u32, u32> = TupleTable::new();
        table.resolve_key(Address::new(3, 0));
    }

    #[test]
    fn test_invalid_capacity() {
        assert!(matches!(
            TupleTable::<u32, u32>::with_block_capacity(0),
            Err(ZooError::InvalidBlockCapacity { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "sealed")]
    fn test_insert_after_seal_panics() {
        let table: TupleTable<u32, u32> = TupleTable::new();
        table.insert(1, 1);
        table.seal();
        table.insert(2, 2);
    }

    #[test]
    fn test_concurrent_inserts() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 5_000;

        let table: TupleTable<u64, u64> = TupleTable::with_block_capacity(97).unwrap();
        let per_thread: Vec<Vec<(Address, u64, u64)>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|t| {
                    let table = &table;
                    s.spawn(move || {
                        (0..PER_THREAD)
                            .map(|i| {
                                let key = t * PER_THREAD + i;
                                (table.insert(key, key ^ 0xABCD), key, key ^ 0xABCD)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let total = (THREADS * PER_THREAD) as usize;
        let mut seen = HashSet::with_capacity(total);
        for (address, key, value) in per_thread.into_iter().flatten() {
            assert!(seen.insert(address), "address {address} handed out twice");
            assert_eq!(table.resolve_key(address), key);
            assert_eq!(table.resolve_value(address), value);
        }
        assert_eq!(seen.len(), total);
        assert_eq!(table.len(), total);

        // Claims are gap-free: every slot of every block below len is used.
        let mut all: Vec<Address> = seen.into_iter().collect();
        all.sort();
        for (pos, address) in all.iter().enumerate() {
            let pos = pos as u64;
            assert_eq!(address.decode(), (pos / 97, pos % 97));
        }
    }
}
