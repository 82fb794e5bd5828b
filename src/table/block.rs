//! Fixed-capacity, append-only storage block.
//!
//! A block is a single zero-initialized byte buffer of `capacity` tuples.
//! Slots are handed out by one atomic `fetch_add` on the "next free slot"
//! counter, so concurrent writers always receive distinct slots. Once the
//! counter passes `capacity` the block is full for good; slots are never
//! reused.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::address::{Address, BlockId, RelOffset};
use crate::table::{TupleKey, TupleValue};

/// Exclusive right to write one slot of a block.
///
/// Returned by [`StorageBlock::try_claim_slot`] and consumed by
/// [`StorageBlock::write`]; a slot can therefore be written at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct SlotClaim {
    slot: RelOffset,
}

impl SlotClaim {
    /// Index of the claimed slot.
    #[inline]
    pub fn slot(&self) -> RelOffset {
        self.slot
    }
}

/// Append-only array of `(K, V)` tuples.
pub struct StorageBlock<K, V> {
    block_id: BlockId,
    capacity: u64,
    next_slot: AtomicU64,
    tuples: Box<[UnsafeCell<u8>]>,
    _marker: PhantomData<fn() -> (K, V)>,
}

// SAFETY: the only mutation through `&self` is `write`, which requires a
// `SlotClaim`. Claims come from a single `fetch_add`, so no two threads ever
// write the same bytes, and readers only touch slots whose write happened
// before the address reached them.
unsafe impl<K, V> Sync for StorageBlock<K, V> {}

impl<K: TupleKey, V: TupleValue> StorageBlock<K, V> {
    /// Bytes occupied by one tuple: the key immediately followed by the value.
    pub const TUPLE_SIZE: usize = mem::size_of::<K>() + mem::size_of::<V>();

    /// Allocate an empty, zeroed block.
    pub fn new(block_id: BlockId, capacity: u64) -> Self {
        debug_assert!(capacity > 0 && capacity <= Address::MAX_REL_OFFSET + 1);
        let len = capacity as usize * Self::TUPLE_SIZE;
        let tuples = (0..len).map(|_| UnsafeCell::new(0u8)).collect();
        Self {
            block_id,
            capacity,
            next_slot: AtomicU64::new(0),
            tuples,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Claim the next free slot, or `None` once the block is full.
    #[inline]
    pub fn try_claim_slot(&self) -> Option<SlotClaim> {
        let slot = self.next_slot.fetch_add(1, Ordering::AcqRel);
        (slot < self.capacity).then_some(SlotClaim { slot })
    }

    /// Copy `key` and `value` into the claimed slot.
    #[inline]
    pub fn write(&self, claim: SlotClaim, key: &K, value: &V) {
        let at = claim.slot as usize * Self::TUPLE_SIZE;
        let key_bytes = bytemuck::bytes_of(key);
        let value_bytes = bytemuck::bytes_of(value);
        let dst = &self.tuples[at..at + Self::TUPLE_SIZE];
        // SAFETY: `dst` is in bounds (checked by the slice above) and the claim
        // guarantees this thread is the only writer of these bytes.
        unsafe {
            let base = UnsafeCell::raw_get(dst.as_ptr());
            ptr::copy_nonoverlapping(key_bytes.as_ptr(), base, key_bytes.len());
            ptr::copy_nonoverlapping(
                value_bytes.as_ptr(),
                base.add(key_bytes.len()),
                value_bytes.len(),
            );
        }
    }

    /// Raw bytes of a written slot.
    ///
    /// Only valid for slots whose write has completed; the block does not
    /// track per-slot completion.
    #[inline]
    pub fn tuple_bytes(&self, slot: RelOffset) -> &[u8] {
        assert!(
            slot < self.capacity,
            "slot {slot} out of range for block {} (capacity {})",
            self.block_id,
            self.capacity
        );
        let at = slot as usize * Self::TUPLE_SIZE;
        let cells = &self.tuples[at..at + Self::TUPLE_SIZE];
        // SAFETY: `UnsafeCell<u8>` has the layout of `u8`, and the slot is no
        // longer being written (see above).
        unsafe { std::slice::from_raw_parts(UnsafeCell::raw_get(cells.as_ptr()), cells.len()) }
    }

    #[inline]
    pub fn read_key(&self, slot: RelOffset) -> K {
        bytemuck::pod_read_unaligned(&self.tuple_bytes(slot)[..mem::size_of::<K>()])
    }

    #[inline]
    pub fn read_value(&self, slot: RelOffset) -> V {
        bytemuck::pod_read_unaligned(&self.tuple_bytes(slot)[mem::size_of::<K>()..])
    }

    /// Number of claimed slots.
    #[inline]
    pub fn len(&self) -> u64 {
        self.next_slot.load(Ordering::Acquire).min(self.capacity)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.next_slot.load(Ordering::Acquire) >= self.capacity
    }
}

impl<K, V> std::fmt::Debug for StorageBlock<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBlock")
            .field("block_id", &self.block_id)
            .field("capacity", &self.capacity)
            .field("next_slot", &self.next_slot.load(Ordering::Relaxed))
            .finish()
    }
}
