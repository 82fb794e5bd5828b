//! Configuration for tables and static indexes.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{Result, ZooError};

/// Default number of tuples per storage block.
pub const DEFAULT_BLOCK_CAPACITY: u64 = 1000;

/// Tree layers covered by one 16-key cacheline block (two SIMD tiers of
/// 2 layers each).
pub const LAYERS_PER_CACHELINE: usize = 4;

/// Upper bound on `num_layers`; 8 cacheline levels already address 16^8
/// leaf ranges.
pub const MAX_FAST_LAYERS: usize = 32;

/// Configuration for a [`TupleTable`](crate::TupleTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Number of tuples each storage block holds.
    pub block_capacity: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            block_capacity: DEFAULT_BLOCK_CAPACITY,
        }
    }
}

impl TableConfig {
    /// Configuration with the given block capacity.
    pub fn with_block_capacity(block_capacity: u64) -> Self {
        Self { block_capacity }
    }

    /// Check that every slot index of a block fits in an [`Address`].
    pub fn validate(&self) -> Result<()> {
        let max = Address::MAX_REL_OFFSET + 1;
        if self.block_capacity == 0 || self.block_capacity > max {
            return Err(ZooError::InvalidBlockCapacity {
                capacity: self.block_capacity,
                max,
            });
        }
        Ok(())
    }
}

/// Configuration for a [`FastIndex`](crate::FastIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FastIndexConfig {
    /// Binary-tree layers encoded by the inner structure. Must be a multiple
    /// of [`LAYERS_PER_CACHELINE`]; `0` disables the inner structure.
    pub num_layers: usize,
}

impl FastIndexConfig {
    /// Configuration with the given layer count.
    pub fn with_layers(num_layers: usize) -> Self {
        Self { num_layers }
    }

    /// Number of 16-way cacheline levels.
    pub fn cacheline_levels(&self) -> usize {
        self.num_layers / LAYERS_PER_CACHELINE
    }

    /// Check the layer count.
    pub fn validate(&self) -> Result<()> {
        if self.num_layers % LAYERS_PER_CACHELINE != 0 || self.num_layers > MAX_FAST_LAYERS {
            return Err(ZooError::InvalidLayerCount {
                num_layers: self.num_layers,
                step: LAYERS_PER_CACHELINE,
                max: MAX_FAST_LAYERS,
            });
        }
        Ok(())
    }
}
