//! Lazy leaf-chain iteration

use super::node::Leaf;
use super::tree::TreeInner;
use crate::base::block::BlockId;
use crate::base::record::Record;
use crate::error::Result;
use std::cmp::Ordering;
use std::sync::Arc;

/// Ascending iterator over `[from, to)`, reading one leaf at a time
///
/// The tree latch is taken only while a leaf is read, never across pulls.
pub struct RangeIter {
    tree: Arc<TreeInner>,
    buffer: std::vec::IntoIter<Record>,
    next_leaf: Option<BlockId>,
    to: Option<Vec<u8>>,
    done: bool,
}

impl RangeIter {
    pub(crate) fn new(
        tree: Arc<TreeInner>,
        first: Leaf,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
    ) -> Self {
        let start = from.map_or(0, |k| {
            first
                .records
                .partition_point(|r| r.compare_key(k) == Ordering::Less)
        });
        let mut records = first.records;
        records.drain(..start);
        Self {
            tree,
            buffer: records.into_iter(),
            next_leaf: first.next,
            to: to.map(<[u8]>::to_vec),
            done: false,
        }
    }
}

impl Iterator for RangeIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(record) = self.buffer.next() {
                if let Some(to) = &self.to {
                    if record.compare_key(to) != Ordering::Less {
                        self.done = true;
                        return None;
                    }
                }
                return Some(Ok(record));
            }
            let Some(id) = self.next_leaf else {
                self.done = true;
                return None;
            };
            let leaf = {
                let _read = self.tree.latch.read();
                self.tree.read_leaf(id)
            };
            match leaf {
                Ok(leaf) => {
                    self.next_leaf = leaf.next;
                    self.buffer = leaf.records.into_iter();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
