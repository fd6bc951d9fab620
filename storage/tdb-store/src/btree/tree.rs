//! Persistent B+Tree over fixed-length records
//!
//! Node block 0 is always the root. The root is an internal node even when
//! the tree is empty (no keys, a single empty leaf child), so every search
//! descends through at least one node block before reaching a leaf.

use super::iter::RangeIter;
use super::node::{Leaf, Node};
use super::params::BPlusTreeParams;
use crate::base::block::{BlockCache, BlockId, BlockMgr};
use crate::base::location::FileSet;
use crate::base::record::{Record, RecordFactory};
use crate::error::{first_error, Result, TdbError};
use crate::index::{RangeIndex, RecordIter};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error};

/// Extension of the internal node file
pub const EXT_NODES: &str = "idn";
/// Extension of the leaf record file
pub const EXT_LEAVES: &str = "dat";

const ROOT: BlockId = 0;

/// A separator key and the new right sibling produced by a split
type Split = Option<(Record, BlockId)>;

pub(crate) struct TreeInner {
    label: String,
    params: BPlusTreeParams,
    nodes: BlockMgr,
    leaves: BlockMgr,
    /// Held shared by readers and exclusively by structural writes
    pub(crate) latch: RwLock<()>,
}

impl TreeInner {
    fn read_node(&self, id: BlockId) -> Result<Node> {
        Node::decode(id, &self.nodes.read(id)?, &self.params)
    }

    fn write_node(&self, node: &Node) -> Result<()> {
        self.nodes.write(node.id, node.encode(&self.params)?)
    }

    pub(crate) fn read_leaf(&self, id: BlockId) -> Result<Leaf> {
        Leaf::decode(id, &self.leaves.read(id)?, &self.params)
    }

    fn write_leaf(&self, leaf: &Leaf) -> Result<()> {
        self.leaves.write(leaf.id, leaf.encode(&self.params)?)
    }

    /// Leaf whose key range covers `key`, or the leftmost leaf for `None`
    pub(crate) fn find_leaf(&self, key: Option<&[u8]>) -> Result<Leaf> {
        let mut node = self.read_node(ROOT)?;
        loop {
            let idx = key.map_or(0, |k| node.find_child(k));
            let child = node.children[idx];
            if node.leaf_children {
                return self.read_leaf(child);
            }
            node = self.read_node(child)?;
        }
    }

    fn insert_into_node(&self, id: BlockId, record: Record) -> Result<(bool, Split)> {
        let mut node = self.read_node(id)?;
        let idx = node.find_child(record.key());
        let child = node.children[idx];
        let (changed, split) = if node.leaf_children {
            self.insert_into_leaf(child, record)?
        } else {
            self.insert_into_node(child, record)?
        };
        let Some((separator, right)) = split else {
            return Ok((changed, None));
        };
        node.keys.insert(idx, separator);
        node.children.insert(idx + 1, right);
        if node.keys.len() <= self.params.max_node_keys() {
            self.write_node(&node)?;
            return Ok((changed, None));
        }
        Ok((changed, self.split_node(node)?))
    }

    fn insert_into_leaf(&self, id: BlockId, record: Record) -> Result<(bool, Split)> {
        let mut leaf = self.read_leaf(id)?;
        match leaf.search(record.key()) {
            Ok(i) if leaf.records[i].same_contents(&record) => return Ok((false, None)),
            Ok(i) => {
                leaf.records[i] = record;
                self.write_leaf(&leaf)?;
                return Ok((true, None));
            }
            Err(i) => leaf.records.insert(i, record),
        }
        if leaf.records.len() <= self.params.max_leaf_records() {
            self.write_leaf(&leaf)?;
            return Ok((true, None));
        }
        let mid = leaf.records.len() / 2;
        let right = Leaf {
            id: self.leaves.allocate()?,
            records: leaf.records.split_off(mid),
            next: leaf.next,
        };
        leaf.next = Some(right.id);
        let separator = right.records[0].key_only();
        self.write_leaf(&right)?;
        self.write_leaf(&leaf)?;
        Ok((true, Some((separator, right.id))))
    }

    /// Split an overfull node. Splitting the root grows the tree by one level
    /// and keeps the root in block 0.
    fn split_node(&self, mut node: Node) -> Result<Split> {
        let mid = node.keys.len() / 2;
        let right_keys = node.keys.split_off(mid + 1);
        let promoted = node.keys.pop().ok_or_else(|| self.corrupt("split of empty node"))?;
        let right_children = node.children.split_off(mid + 1);
        let right = Node {
            id: self.nodes.allocate()?,
            leaf_children: node.leaf_children,
            keys: right_keys,
            children: right_children,
        };
        self.write_node(&right)?;

        if node.id != ROOT {
            self.write_node(&node)?;
            return Ok(Some((promoted, right.id)));
        }
        let left = Node {
            id: self.nodes.allocate()?,
            ..node
        };
        self.write_node(&left)?;
        let root = Node {
            id: ROOT,
            leaf_children: false,
            keys: vec![promoted],
            children: vec![left.id, right.id],
        };
        self.write_node(&root)?;
        debug!(tree = %self.label, "root split");
        Ok(None)
    }

    /// Returns whether a record was removed and the resulting key count
    fn delete_from_node(&self, id: BlockId, key: &[u8]) -> Result<(bool, usize)> {
        let mut node = self.read_node(id)?;
        let idx = node.find_child(key);
        let child = node.children[idx];
        let (removed, child_len, min) = if node.leaf_children {
            let (removed, len) = self.delete_from_leaf(child, key)?;
            (removed, len, self.params.min_leaf_records())
        } else {
            let (removed, len) = self.delete_from_node(child, key)?;
            (removed, len, self.params.min_node_keys())
        };
        if !removed {
            return Ok((false, node.keys.len()));
        }
        if child_len < min && node.children.len() > 1 {
            if node.leaf_children {
                self.rebalance_leaves(&mut node, idx)?;
            } else {
                self.rebalance_nodes(&mut node, idx)?;
            }
            self.write_node(&node)?;
        }
        if node.id == ROOT && node.keys.is_empty() && !node.leaf_children {
            let only = self.read_node(node.children[0])?;
            let released = only.id;
            node = Node { id: ROOT, ..only };
            self.write_node(&node)?;
            self.nodes.release(released)?;
            debug!(tree = %self.label, "root collapsed");
        }
        Ok((true, node.keys.len()))
    }

    fn delete_from_leaf(&self, id: BlockId, key: &[u8]) -> Result<(bool, usize)> {
        let mut leaf = self.read_leaf(id)?;
        match leaf.search(key) {
            Ok(i) => {
                leaf.records.remove(i);
                self.write_leaf(&leaf)?;
                Ok((true, leaf.records.len()))
            }
            Err(_) => Ok((false, leaf.records.len())),
        }
    }

    fn siblings(idx: usize) -> (usize, usize) {
        if idx > 0 {
            (idx - 1, idx)
        } else {
            (idx, idx + 1)
        }
    }

    fn rebalance_leaves(&self, parent: &mut Node, idx: usize) -> Result<()> {
        let (li, ri) = Self::siblings(idx);
        let mut left = self.read_leaf(parent.children[li])?;
        let mut right = self.read_leaf(parent.children[ri])?;
        if left.records.len() + right.records.len() <= self.params.max_leaf_records() {
            left.records.append(&mut right.records);
            left.next = right.next;
            self.write_leaf(&left)?;
            self.leaves.release(right.id)?;
            parent.keys.remove(li);
            parent.children.remove(ri);
            return Ok(());
        }
        let mut all = std::mem::take(&mut left.records);
        all.append(&mut right.records);
        let half = all.len() / 2;
        right.records = all.split_off(half);
        left.records = all;
        parent.keys[li] = right.records[0].key_only();
        self.write_leaf(&left)?;
        self.write_leaf(&right)
    }

    fn rebalance_nodes(&self, parent: &mut Node, idx: usize) -> Result<()> {
        let (li, ri) = Self::siblings(idx);
        let mut left = self.read_node(parent.children[li])?;
        let mut right = self.read_node(parent.children[ri])?;
        let separator = parent.keys[li].clone();
        if left.keys.len() + 1 + right.keys.len() <= self.params.max_node_keys() {
            left.keys.push(separator);
            left.keys.append(&mut right.keys);
            left.children.append(&mut right.children);
            self.write_node(&left)?;
            self.nodes.release(right.id)?;
            parent.keys.remove(li);
            parent.children.remove(ri);
            return Ok(());
        }
        let mut keys = std::mem::take(&mut left.keys);
        keys.push(separator);
        keys.append(&mut right.keys);
        let mut children = std::mem::take(&mut left.children);
        children.append(&mut right.children);
        let mid = keys.len() / 2;
        right.keys = keys.split_off(mid + 1);
        parent.keys[li] = keys.pop().ok_or_else(|| self.corrupt("empty redistribution"))?;
        left.keys = keys;
        right.children = children.split_off(mid + 1);
        left.children = children;
        self.write_node(&left)?;
        self.write_node(&right)
    }

    fn corrupt(&self, detail: &str) -> TdbError {
        error!(tree = %self.label, detail, "B+Tree structure corrupt");
        TdbError::CorruptLayout(format!("{}: {detail}", self.label))
    }
}

/// B+Tree range index stored as a node file and a leaf file
#[derive(Clone)]
pub struct BPlusTree {
    inner: Arc<TreeInner>,
}

impl BPlusTree {
    /// Open or create the tree stored in `<fileset>.idn` and `<fileset>.dat`
    pub fn open(
        fileset: &FileSet,
        params: BPlusTreeParams,
        write_cache_size: usize,
        cache: Arc<BlockCache>,
    ) -> Result<Self> {
        let nodes = BlockMgr::open(
            fileset,
            EXT_NODES,
            params.block_size(),
            write_cache_size,
            cache.clone(),
        )?;
        let leaves = BlockMgr::open(
            fileset,
            EXT_LEAVES,
            params.block_size(),
            write_cache_size,
            cache,
        )?;
        let inner = TreeInner {
            label: fileset.to_string(),
            params,
            nodes,
            leaves,
            latch: RwLock::new(()),
        };
        match (inner.nodes.is_empty(), inner.leaves.is_empty()) {
            (true, true) => {
                let root = inner.nodes.allocate()?;
                let leaf = inner.leaves.allocate()?;
                inner.write_leaf(&Leaf::new(leaf))?;
                inner.write_node(&Node::new_root(root, leaf))?;
                debug!(tree = %inner.label, order = params.order(), "created B+Tree");
            }
            (false, false) => {
                // Fail now on a root that does not decode
                inner.read_node(ROOT)?;
                debug!(
                    tree = %inner.label,
                    nodes = inner.nodes.num_blocks(),
                    leaves = inner.leaves.num_blocks(),
                    "opened B+Tree"
                );
            }
            _ => return Err(inner.corrupt("node and leaf files disagree about emptiness")),
        }
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Structural parameters
    pub fn params(&self) -> &BPlusTreeParams {
        &self.inner.params
    }

    /// Number of levels of internal nodes
    pub fn depth(&self) -> Result<usize> {
        let _read = self.inner.latch.read();
        let mut node = self.inner.read_node(ROOT)?;
        let mut depth = 1;
        while !node.leaf_children {
            node = self.inner.read_node(node.children[0])?;
            depth += 1;
        }
        Ok(depth)
    }

    /// Lazy ascending scan of `[from, to)` by key
    pub fn range(&self, from: Option<&[u8]>, to: Option<&[u8]>) -> Result<RangeIter> {
        let _read = self.inner.latch.read();
        let leaf = self.inner.find_leaf(from)?;
        Ok(RangeIter::new(self.inner.clone(), leaf, from, to))
    }
}

impl RangeIndex for BPlusTree {
    fn record_factory(&self) -> RecordFactory {
        self.inner.params.record_factory()
    }

    fn find(&self, key: &Record) -> Result<Option<Record>> {
        let _read = self.inner.latch.read();
        let leaf = self.inner.find_leaf(Some(key.key()))?;
        Ok(leaf.search(key.key()).ok().map(|i| leaf.records[i].clone()))
    }

    fn insert(&self, record: Record) -> Result<bool> {
        self.record_factory().check(&record)?;
        let _write = self.inner.latch.write();
        let (changed, _) = self.inner.insert_into_node(ROOT, record)?;
        Ok(changed)
    }

    fn delete(&self, key: &Record) -> Result<bool> {
        let _write = self.inner.latch.write();
        let (removed, _) = self.inner.delete_from_node(ROOT, key.key())?;
        Ok(removed)
    }

    fn iter(&self, from: Option<&Record>, to: Option<&Record>) -> Result<RecordIter> {
        let iter = self.range(from.map(Record::key), to.map(Record::key))?;
        Ok(Box::new(iter))
    }

    fn count(&self) -> Result<u64> {
        let mut n = 0;
        for record in self.range(None, None)? {
            record?;
            n += 1;
        }
        Ok(n)
    }

    fn is_empty(&self) -> Result<bool> {
        match self.range(None, None)?.next() {
            None => Ok(true),
            Some(r) => r.map(|_| false),
        }
    }

    fn sync(&self) -> Result<()> {
        self.inner.nodes.sync()?;
        self.inner.leaves.sync()
    }

    fn close(&self) -> Result<()> {
        first_error([self.inner.nodes.close(), self.inner.leaves.close()])
    }
}

impl std::fmt::Debug for BPlusTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BPlusTree")
            .field("fileset", &self.inner.label)
            .field("order", &self.inner.params.order())
            .field("nodes", &self.inner.nodes)
            .field("leaves", &self.inner.leaves)
            .finish()
    }
}
