//! Append-only directory of storage blocks, indexed by block id.
//!
//! Blocks live in segments of doubling size (segment `s` holds ids
//! `2^s - 1 .. 2^(s+1) - 1`), so appending never moves an existing block and
//! lookups need no lock: one `OnceLock` read for the segment and one for the
//! block.
//!
//! There is never more than one appender at a time. A new block is appended only
//! by the thread that claimed the last slot of the current active block, and
//! the next roll-over cannot start before that block is published as active.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::address::{Address, BlockId};
use crate::table::block::StorageBlock;
use crate::table::{TupleKey, TupleValue};

/// Enough segments to cover every encodable block id.
const SEGMENT_COUNT: usize = Address::BLOCK_ID_BITS as usize + 1;

type Segment<K, V> = Box<[OnceLock<StorageBlock<K, V>>]>;

pub(crate) struct BlockDirectory<K, V> {
    segments: [OnceLock<Segment<K, V>>; SEGMENT_COUNT],
    len: AtomicU64,
}

#[inline]
fn locate(block_id: BlockId) -> (usize, usize) {
    let n = block_id + 1;
    let segment = (u64::BITS - 1 - n.leading_zeros()) as usize;
    (segment, (n - (1u64 << segment)) as usize)
}

impl<K: TupleKey, V: TupleValue> BlockDirectory<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            segments: std::array::from_fn(|_| OnceLock::new()),
            len: AtomicU64::new(0),
        }
    }

    /// Number of published blocks.
    #[inline]
    pub(crate) fn len(&self) -> u64 {
        self.len.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn get(&self, block_id: BlockId) -> Option<&StorageBlock<K, V>> {
        if block_id > Address::MAX_BLOCK_ID {
            return None;
        }
        let (segment, index) = locate(block_id);
        self.segments[segment].get()?[index].get()
    }

    /// Append `block`, whose id must equal the current length.
    pub(crate) fn push(&self, block: StorageBlock<K, V>) -> &StorageBlock<K, V> {
        let block_id = block.block_id();
        assert_eq!(
            block_id,
            self.len.load(Ordering::Relaxed),
            "blocks must be appended in id order"
        );
        assert!(block_id <= Address::MAX_BLOCK_ID, "block id space exhausted");

        let (segment, index) = locate(block_id);
        let slots = self.segments[segment]
            .get_or_init(|| (0..1usize << segment).map(|_| OnceLock::new()).collect());
        debug_assert!(slots[index].get().is_none());
        let stored = slots[index].get_or_init(|| block);

        self.len.store(block_id + 1, Ordering::Release);
        stored
    }
}
