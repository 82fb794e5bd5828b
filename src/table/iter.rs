use std::iter::FusedIterator;

use crate::address::Address;
use crate::table::{StorageBlock, TupleKey, TupleTable, TupleValue};

/// One-shot scan over a [`TupleTable`], yielding `(address, key)` pairs.
///
/// Created by [`TupleTable::iter`]. The tuple count is captured at creation;
/// all blocks before the last are full, so position `p` maps to
/// block `p / capacity`, slot `p % capacity`. An empty table, or an empty
/// trailing block, yields nothing.
pub struct TableIter<'a, K, V> {
    table: &'a TupleTable<K, V>,
    block: Option<&'a StorageBlock<K, V>>,
    capacity: u64,
    pos: u64,
    end: u64,
}

impl<'a, K: TupleKey, V: TupleValue> TableIter<'a, K, V> {
    pub(crate) fn new(table: &'a TupleTable<K, V>) -> Self {
        Self {
            table,
            block: None,
            capacity: table.block_capacity(),
            pos: 0,
            end: table.len() as u64,
        }
    }
}

impl<'a, K: TupleKey, V: TupleValue> Iterator for TableIter<'a, K, V> {
    type Item = (Address, K);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        let block_id = self.pos / self.capacity;
        let slot = self.pos % self.capacity;
        self.pos += 1;

        let block = match self.block {
            Some(block) if block.block_id() == block_id => block,
            _ => {
                let block = self.table.block(block_id);
                self.block = Some(block);
                block
            }
        };
        Some((Address::new(block_id, slot), block.read_key(slot)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.pos) as usize;
        (remaining, Some(remaining))
    }
}

impl<K: TupleKey, V: TupleValue> ExactSizeIterator for TableIter<'_, K, V> {}

impl<K: TupleKey, V: TupleValue> FusedIterator for TableIter<'_, K, V> {}
