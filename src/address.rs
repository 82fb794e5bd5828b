//! Stable logical addresses of tuples inside a [`TupleTable`](crate::TupleTable).
//!
//! An address packs the owning block's id into the high 40 bits of a `u64` and
//! the slot index inside that block into the low 24 bits. Blocks never move once
//! allocated, so an address stays valid for the lifetime of the table no matter
//! how much the table grows afterwards. Indexes store addresses, never pointers.

use std::fmt;

/// Identifier of a storage block within a table.
pub type BlockId = u64;

/// Slot index of a tuple within its storage block.
pub type RelOffset = u64;

/// Packed `(block_id, rel_offset)` pair.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address {
    /// Number of bits holding the block id.
    pub const BLOCK_ID_BITS: u32 = 40;

    /// Number of bits holding the slot index.
    pub const REL_OFFSET_BITS: u32 = 64 - Self::BLOCK_ID_BITS;

    /// Largest encodable block id.
    pub const MAX_BLOCK_ID: BlockId = (1 << Self::BLOCK_ID_BITS) - 1;

    /// Largest encodable slot index.
    pub const MAX_REL_OFFSET: RelOffset = (1 << Self::REL_OFFSET_BITS) - 1;

    /// Encode a block id and slot index.
    ///
    /// Values outside their bit budgets are silently truncated; table
    /// configuration keeps block capacity within [`Self::MAX_REL_OFFSET`].
    #[inline]
    pub const fn new(block_id: BlockId, rel_offset: RelOffset) -> Self {
        debug_assert!(block_id <= Self::MAX_BLOCK_ID);
        debug_assert!(rel_offset <= Self::MAX_REL_OFFSET);
        Self((block_id << Self::REL_OFFSET_BITS) | (rel_offset & Self::MAX_REL_OFFSET))
    }

    /// Rebuild an address from its raw `u64` form.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Block id (high bits).
    #[inline]
    pub const fn block_id(&self) -> BlockId {
        self.0 >> Self::REL_OFFSET_BITS
    }

    /// Slot index within the block (low bits).
    #[inline]
    pub const fn rel_offset(&self) -> RelOffset {
        self.0 & Self::MAX_REL_OFFSET
    }

    /// Both halves at once.
    #[inline]
    pub const fn decode(&self) -> (BlockId, RelOffset) {
        (self.block_id(), self.rel_offset())
    }

    /// The packed `u64`.
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("block_id", &self.block_id())
            .field("rel_offset", &self.rel_offset())
            .finish()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.block_id(), self.rel_offset())
    }
}

impl From<u64> for Address {
    #[inline]
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<Address> for u64 {
    #[inline]
    fn from(address: Address) -> Self {
        address.0
    }
}
