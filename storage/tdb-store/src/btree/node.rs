//! B+Tree block layouts
//!
//! Internal nodes live in the `idn` file, leaves in the `dat` file.
//!
//! ```text
//! node block: count:u16 | flags:u8 | 0:u8 | key * count | child:u32 * (count + 1)
//! leaf block: count:u16 | 0:u16 | next:u32 | record * count
//! ```
//!
//! `flags & 1` marks a node whose children are leaves. Keys in nodes are
//! key-only records; `keys[i]` is the smallest key reachable through
//! `children[i + 1]`. A leaf's `next` is `u32::MAX` for the last leaf.

use super::params::{BPlusTreeParams, LEAF_HEADER_SIZE, NODE_HEADER_SIZE};
use crate::base::block::BlockId;
use crate::base::record::Record;
use crate::error::{Result, TdbError};
use bytes::{Buf, BufMut};
use std::cmp::Ordering;

const FLAG_LEAF_CHILDREN: u8 = 1;
const NO_NEXT: u32 = u32::MAX;

/// Internal node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Block holding this node
    pub id: BlockId,
    /// Whether `children` are leaf blocks
    pub leaf_children: bool,
    /// Separator keys
    pub keys: Vec<Record>,
    /// Child block ids, one more than `keys`
    pub children: Vec<BlockId>,
}

impl Node {
    /// Root of an empty tree: no keys, a single leaf child
    pub fn new_root(id: BlockId, leaf: BlockId) -> Self {
        Node {
            id,
            leaf_children: true,
            keys: Vec::new(),
            children: vec![leaf],
        }
    }

    /// Index of the child whose subtree may contain `key`
    pub fn find_child(&self, key: &[u8]) -> usize {
        self.keys
            .partition_point(|k| k.compare_key(key) != Ordering::Greater)
    }

    /// Decode a node block
    pub fn decode(id: BlockId, data: &[u8], params: &BPlusTreeParams) -> Result<Self> {
        let kf = params.key_factory();
        let mut buf = data;
        let count = buf.get_u16() as usize;
        let flags = buf.get_u8();
        buf.advance(1);
        if count > params.max_node_keys()
            || NODE_HEADER_SIZE + count * kf.record_length() + (count + 1) * 4 > data.len()
        {
            return Err(TdbError::CorruptLayout(format!(
                "B+Tree node {id}: bad key count {count}"
            )));
        }
        let mut keys = Vec::with_capacity(count + 1);
        for _ in 0..count {
            keys.push(kf.decode(buf)?);
            buf.advance(kf.record_length());
        }
        let mut children = Vec::with_capacity(count + 2);
        for _ in 0..=count {
            children.push(buf.get_u32());
        }
        Ok(Node {
            id,
            leaf_children: flags & FLAG_LEAF_CHILDREN != 0,
            keys,
            children,
        })
    }

    /// Encode into a full block
    pub fn encode(&self, params: &BPlusTreeParams) -> Result<Vec<u8>> {
        if self.keys.len() > params.max_node_keys() || self.children.len() != self.keys.len() + 1 {
            return Err(TdbError::CorruptLayout(format!(
                "B+Tree node {}: {} keys, {} children",
                self.id,
                self.keys.len(),
                self.children.len()
            )));
        }
        let kf = params.key_factory();
        let mut buf = Vec::with_capacity(params.block_size());
        buf.put_u16(self.keys.len() as u16);
        buf.put_u8(if self.leaf_children { FLAG_LEAF_CHILDREN } else { 0 });
        buf.put_u8(0);
        for key in &self.keys {
            kf.encode_into(key, &mut buf);
        }
        for child in &self.children {
            buf.put_u32(*child);
        }
        buf.resize(params.block_size(), 0);
        Ok(buf)
    }
}

/// Leaf holding records in key order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Block holding this leaf
    pub id: BlockId,
    /// Records, sorted by key
    pub records: Vec<Record>,
    /// Next leaf in key order
    pub next: Option<BlockId>,
}

impl Leaf {
    /// An empty leaf
    pub fn new(id: BlockId) -> Self {
        Leaf {
            id,
            records: Vec::new(),
            next: None,
        }
    }

    /// Binary search by key
    pub fn search(&self, key: &[u8]) -> std::result::Result<usize, usize> {
        self.records.binary_search_by(|r| r.compare_key(key))
    }

    /// Decode a leaf block
    pub fn decode(id: BlockId, data: &[u8], params: &BPlusTreeParams) -> Result<Self> {
        let rf = params.record_factory();
        let mut buf = data;
        let count = buf.get_u16() as usize;
        buf.advance(2);
        let next = buf.get_u32();
        if count > params.max_leaf_records()
            || LEAF_HEADER_SIZE + count * rf.record_length() > data.len()
        {
            return Err(TdbError::CorruptLayout(format!(
                "B+Tree leaf {id}: bad record count {count}"
            )));
        }
        let mut records = Vec::with_capacity(count + 1);
        for _ in 0..count {
            records.push(rf.decode(buf)?);
            buf.advance(rf.record_length());
        }
        Ok(Leaf {
            id,
            records,
            next: (next != NO_NEXT).then_some(next),
        })
    }

    /// Encode into a full block
    pub fn encode(&self, params: &BPlusTreeParams) -> Result<Vec<u8>> {
        if self.records.len() > params.max_leaf_records() {
            return Err(TdbError::CorruptLayout(format!(
                "B+Tree leaf {}: {} records exceeds {}",
                self.id,
                self.records.len(),
                params.max_leaf_records()
            )));
        }
        let rf = params.record_factory();
        let mut buf = Vec::with_capacity(params.block_size());
        buf.put_u16(self.records.len() as u16);
        buf.put_u16(0);
        buf.put_u32(self.next.unwrap_or(NO_NEXT));
        for record in &self.records {
            rf.encode_into(record, &mut buf);
        }
        buf.resize(params.block_size(), 0);
        Ok(buf)
    }
}
