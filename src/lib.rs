//! # index-zoo
//!
//! Static in-memory index structures over a lock-free, append-only tuple
//! table.
//!
//! Tuples are inserted concurrently into a [`TupleTable`], which hands back a
//! packed 64-bit [`Address`] (40-bit block id, 24-bit slot). Once loading is
//! done, a [`StaticIndex`] such as [`FastIndex`] is reorganized over the table
//! and answers point and range lookups with the addresses of matching tuples.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use index_zoo::{FastIndex, StaticIndex, TupleTable};
//!
//! let table = Arc::new(TupleTable::<u64, u64>::new());
//! for key in 0..10_000u64 {
//!     table.insert(key % 100, key);
//! }
//!
//! let mut index = FastIndex::new(Arc::clone(&table), 8).unwrap();
//! index.reorganize();
//!
//! assert_eq!(index.find(42).len(), 100);
//! assert_eq!(index.find_range(10, 19).len(), 1000);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod address;
pub mod config;
pub mod error;
pub mod index;
pub mod table;

pub use address::{Address, BlockId, RelOffset};
pub use config::{FastIndexConfig, TableConfig};
pub use error::{Result, ZooError};
pub use index::{FastIndex, FastKey, FastStats, SortedSnapshot, StaticIndex};
pub use table::{TupleKey, TupleTable, TupleValue};

#[cfg(test)]
mod proptests;
