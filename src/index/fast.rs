//! FAST: a cache-conscious static search tree.
//!
//! Based on "FAST: Fast Architecture Sensitive Tree Search on Modern CPUs and
//! GPUs" (SIGMOD 2010, Kim et al.).
//!
//! ## Layout
//!
//! The sorted snapshot of `N` entries is split by rank into `16^L` leaf ranges
//! of `N / 16^L` entries each (the last leaf absorbs the remainder). Above the
//! leaves sit `L` levels of 16-way branching. Each branch point is one
//! 64-byte-aligned cacheline block of 16 keys holding five 3-key SIMD groups:
//!
//! ```text
//! keys:  [ g0 g0 g0 | g1 g1 g1 | g2 g2 g2 | g3 g3 g3 | g4 g4 g4 | pad ]
//! group: [ middle, low, high ]
//! ```
//!
//! Group 0 splits the block's range into quarters; group `q + 1` splits quarter
//! `q` into four children. A splitter is the last key of the child to its left,
//! so descending to the child that holds the first entry `>= probe` needs only
//! "probe > splitter" comparisons.
//!
//! Blocks are stored level by level: level `i` holds `16^i` blocks starting at
//! block `(16^i - 1) / 15`.
//!
//! ## Lookup
//!
//! Two group compares per level yield `child = 4 * c1 + c2`, the running rank
//! becomes `r * 16 + child`, and after `L` levels a binary search confined to
//! leaf `r` finishes the lookup. With `num_layers == 0` the whole snapshot is
//! binary searched.
//!
//! ```rust
//! use std::sync::Arc;
//! use index_zoo::{FastIndex, StaticIndex, TupleTable};
//!
//! let table = Arc::new(TupleTable::<u32, u64>::new());
//! for key in (1..=1000u32).rev() {
//!     table.insert(key, u64::from(key) + 1024);
//! }
//!
//! let mut index = FastIndex::new(Arc::clone(&table), 4).unwrap();
//! index.reorganize();
//!
//! let hits = index.find(599);
//! assert_eq!(hits.len(), 1);
//! assert_eq!(table.resolve_value(hits[0]), 1623);
//! assert_eq!(index.find_range(10, 20).len(), 11);
//! ```

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::address::Address;
use crate::config::FastIndexConfig;
use crate::error::Result;
use crate::index::simd::{FastKey, GROUP_LANES};
use crate::index::snapshot::SortedSnapshot;
use crate::index::StaticIndex;
use crate::table::{TupleTable, TupleValue};

/// Keys per cacheline block.
pub const CACHELINE_KEYS: usize = 16;

/// Fan-out of one cacheline block.
const FANOUT: usize = 16;

/// Keys per SIMD group.
const GROUP_KEYS: usize = 3;

const INVALID_BRANCH: u8 = u8::MAX;

/// Greater-than mask over `[middle, low, high]` to child id. Sorted splitters
/// can only produce masks 0, 0b010, 0b011 and 0b111.
///
/// Bit 0 is `probe > middle`, bit 1 is `probe > low`, bit 2 is `probe > high`.
const BRANCH: [u8; 8] = [
    0,
    INVALID_BRANCH,
    1,
    2,
    INVALID_BRANCH,
    INVALID_BRANCH,
    INVALID_BRANCH,
    3,
];

#[inline]
fn branch(mask: u32) -> usize {
    match BRANCH[(mask & 0b111) as usize] {
        INVALID_BRANCH => {
            panic!("FAST descent produced impossible mask {mask:#05b}: splitters out of order")
        }
        child => child as usize,
    }
}

#[repr(C, align(64))]
#[derive(Clone, Copy)]
struct CachelineBlock<K> {
    keys: [K; CACHELINE_KEYS],
}

impl<K: FastKey> CachelineBlock<K> {
    /// Lanes of group `g`, including the masked fourth lane.
    #[inline]
    fn group(&self, g: usize) -> &[K] {
        let at = g * GROUP_KEYS;
        &self.keys[at..at + GROUP_LANES]
    }

    /// Child (0..16) holding the first entry `>= key`.
    #[inline]
    fn child(&self, key: K) -> usize {
        let c1 = branch(K::gt_mask(self.group(0), key));
        let c2 = branch(K::gt_mask(self.group(c1 + 1), key));
        c1 * 4 + c2
    }
}

/// Statistics of a built [`FastIndex`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastStats {
    /// Number of indexed entries.
    pub entries: usize,
    /// Cacheline levels asked for by the configuration.
    pub requested_levels: usize,
    /// Cacheline levels actually built.
    pub levels: usize,
    /// Number of cacheline blocks.
    pub inner_blocks: usize,
    /// Number of key slots in the inner array.
    pub inner_keys: usize,
    /// Number of leaf ranges.
    pub leaf_count: usize,
    /// Entries per leaf range (the last one may hold more).
    pub leaf_step: usize,
    /// Bytes held by the snapshot and the inner array.
    pub memory_bytes: usize,
}

/// Built state: snapshot plus the inner array.
struct FastTree<K> {
    snapshot: SortedSnapshot<K>,
    bounds: Option<(K, K)>,
    blocks: Vec<CachelineBlock<K>>,
    levels: usize,
    leaf_count: usize,
    leaf_step: usize,
}

impl<K: FastKey> FastTree<K> {
    fn build(snapshot: SortedSnapshot<K>, requested_levels: usize) -> Self {
        let n = snapshot.len();

        // Every leaf range must hold at least one entry.
        let mut levels = requested_levels;
        while levels > 0 && FANOUT.checked_pow(levels as u32).map_or(true, |leaves| leaves > n) {
            levels -= 1;
        }
        if levels < requested_levels {
            warn!(
                entries = n,
                requested_levels, levels, "too few entries for FAST levels, reducing"
            );
        }

        let leaf_count = FANOUT.pow(levels as u32);
        let leaf_step = n / leaf_count;
        let mut blocks = Vec::with_capacity((leaf_count - 1) / (FANOUT - 1));

        for level in 0..levels {
            // Leaves under each child of a block at this level.
            let child_leaves = FANOUT.pow((levels - level - 1) as u32);
            for block in 0..FANOUT.pow(level as u32) {
                let first_leaf = block * FANOUT * child_leaves;
                let splitter = |child: usize| {
                    snapshot.key_at((first_leaf + (child + 1) * child_leaves) * leaf_step - 1)
                };
                blocks.push(Self::cacheline_block(splitter));
            }
        }
        debug_assert_eq!(blocks.len(), (leaf_count - 1) / (FANOUT - 1));

        Self {
            bounds: snapshot.key_bounds(),
            snapshot,
            blocks,
            levels,
            leaf_count,
            leaf_step,
        }
    }

    /// Lay out the 15 splitters of one block. `splitter(c)` is the last key of
    /// child `c`.
    fn cacheline_block(splitter: impl Fn(usize) -> K) -> CachelineBlock<K> {
        let mut keys = [K::zeroed(); CACHELINE_KEYS];
        // Group 0: quarter boundaries.
        keys[0] = splitter(7);
        keys[1] = splitter(3);
        keys[2] = splitter(11);
        for quarter in 0..4 {
            let at = (quarter + 1) * GROUP_KEYS;
            let base = quarter * 4;
            keys[at] = splitter(base + 1);
            keys[at + 1] = splitter(base);
            keys[at + 2] = splitter(base + 2);
        }
        CachelineBlock { keys }
    }

    /// Rank of the leaf range holding the first entry `>= key`.
    ///
    /// `key` must lie within the snapshot's key bounds.
    #[inline]
    fn descend(&self, key: K) -> usize {
        let mut rank = 0;
        let mut level_start = 0;
        let mut level_width = 1;
        for _ in 0..self.levels {
            rank = rank * FANOUT + self.blocks[level_start + rank].child(key);
            level_start += level_width;
            level_width *= FANOUT;
        }
        rank
    }

    #[inline]
    fn leaf_range(&self, rank: usize) -> Range<usize> {
        let start = rank * self.leaf_step;
        let end = if rank + 1 == self.leaf_count {
            self.snapshot.len()
        } else {
            start + self.leaf_step
        };
        start..end
    }

    fn find(&self, key: K) -> Vec<Address> {
        let Some((min, max)) = self.bounds else {
            return Vec::new();
        };
        if key < min || key > max {
            return Vec::new();
        }
        if min == max {
            return self.snapshot.addresses(0..self.snapshot.len());
        }

        let leaf = self.leaf_range(self.descend(key));
        match self.snapshot.binary_search_in(key, leaf) {
            Some(pos) => self.snapshot.expand_equal(pos),
            None => Vec::new(),
        }
    }

    fn find_range(&self, lo: K, hi: K) -> Vec<Address> {
        let Some((min, max)) = self.bounds else {
            return Vec::new();
        };
        if hi < min || lo > max {
            return Vec::new();
        }

        let start = if lo <= min {
            0
        } else {
            let leaf = self.leaf_range(self.descend(lo));
            self.snapshot.lower_bound_in(lo, leaf)
        };
        self.snapshot.collect_until(start, hi)
    }

    fn memory_usage(&self) -> usize {
        self.snapshot.memory_usage()
            + self.blocks.capacity() * std::mem::size_of::<CachelineBlock<K>>()
    }
}

/// FAST static index over a shared [`TupleTable`].
pub struct FastIndex<K, V> {
    table: Arc<TupleTable<K, V>>,
    config: FastIndexConfig,
    tree: Option<FastTree<K>>,
}

impl<K: FastKey, V: TupleValue> FastIndex<K, V> {
    /// Create an empty index with `num_layers` binary layers of inner
    /// structure (a multiple of 4; `0` means plain binary search).
    pub fn new(table: Arc<TupleTable<K, V>>, num_layers: usize) -> Result<Self> {
        Self::with_config(table, FastIndexConfig::with_layers(num_layers))
    }

    pub fn with_config(table: Arc<TupleTable<K, V>>, config: FastIndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table,
            config,
            tree: None,
        })
    }

    pub fn table(&self) -> &Arc<TupleTable<K, V>> {
        &self.table
    }

    pub fn config(&self) -> &FastIndexConfig {
        &self.config
    }

    #[inline]
    fn tree(&self) -> &FastTree<K> {
        match &self.tree {
            Some(tree) => tree,
            None => panic!("FastIndex queried before reorganize()"),
        }
    }

    /// Build statistics; all zero except `requested_levels` until built.
    pub fn stats(&self) -> FastStats {
        let requested_levels = self.config.cacheline_levels();
        let Some(tree) = &self.tree else {
            return FastStats {
                requested_levels,
                ..FastStats::default()
            };
        };
        FastStats {
            entries: tree.snapshot.len(),
            requested_levels,
            levels: tree.levels,
            inner_blocks: tree.blocks.len(),
            inner_keys: tree.blocks.len() * CACHELINE_KEYS,
            leaf_count: tree.leaf_count,
            leaf_step: tree.leaf_step,
            memory_bytes: tree.memory_usage(),
        }
    }

    /// Inner-array keys in storage order (empty until built).
    pub fn inner_keys(&self) -> Vec<K> {
        self.tree
            .iter()
            .flat_map(|tree| tree.blocks.iter().flat_map(|block| block.keys))
            .collect()
    }
}

impl<K: FastKey, V: TupleValue> StaticIndex<K> for FastIndex<K, V> {
    fn reorganize(&mut self) {
        assert!(self.tree.is_none(), "FastIndex::reorganize() called twice");

        let started = Instant::now();
        self.table.seal();
        let snapshot = SortedSnapshot::from_table(&self.table);
        let tree = FastTree::build(snapshot, self.config.cacheline_levels());
        self.tree = Some(tree);

        let stats = self.stats();
        info!(
            entries = stats.entries,
            levels = stats.levels,
            inner_keys = stats.inner_keys,
            leaf_step = stats.leaf_step,
            memory_bytes = stats.memory_bytes,
            elapsed_us = started.elapsed().as_micros() as u64,
            "FAST index built"
        );
    }

    fn find(&self, key: K) -> Vec<Address> {
        self.tree().find(key)
    }

    fn find_range(&self, lo: K, hi: K) -> Vec<Address> {
        assert!(lo <= hi, "find_range requires lo <= hi (got {lo:?} > {hi:?})");
        self.tree().find_range(lo, hi)
    }

    fn scan(&self, key: K) -> Vec<Address> {
        self.tree().snapshot.scan(key)
    }

    fn scan_reverse(&self, key: K) -> Vec<Address> {
        self.tree().snapshot.scan_reverse(key)
    }

    fn scan_full(&self, count: usize) -> Vec<Address> {
        self.tree().snapshot.scan_full(count)
    }

    fn len(&self) -> usize {
        self.tree.as_ref().map_or(0, |tree| tree.snapshot.len())
    }

    fn is_built(&self) -> bool {
        self.tree.is_some()
    }
}

impl<K: FastKey, V: TupleValue> fmt::Debug for FastIndex<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastIndex")
            .field("num_layers", &self.config.num_layers)
            .field("built", &self.is_built())
            .field("stats", &self.stats())
            .finish()
    }
}
