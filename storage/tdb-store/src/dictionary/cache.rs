//! Caching layer over a node table
//!
//! Two independent LRU caches (node to id, id to node) and a cache of nodes
//! known to be absent. Entries are only ever copies of what the wrapped
//! table returned, so eviction loses nothing.

use super::{Node, NodeId, NodeTable};
use crate::error::Result;
use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Bounded LRU map, absent when configured with size 0
struct Cache<K: Hash + Eq, V>(Option<Mutex<LruCache<K, V>>>);

impl<K: Hash + Eq, V: Clone> Cache<K, V> {
    fn new(size: usize) -> Self {
        Cache(NonZeroUsize::new(size).map(|n| Mutex::new(LruCache::new(n))))
    }

    fn get(&self, key: &K) -> Option<V> {
        self.0.as_ref()?.lock().get(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        if let Some(cache) = &self.0 {
            cache.lock().put(key, value);
        }
    }

    fn remove(&self, key: &K) {
        if let Some(cache) = &self.0 {
            cache.lock().pop(key);
        }
    }

    fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |c| c.lock().len())
    }
}

/// Hit and miss counts of a [`NodeTableCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub node_to_id_entries: usize,
    pub id_to_node_entries: usize,
}

/// Node table wrapper with LRU caches
pub struct NodeTableCache {
    base: Arc<dyn NodeTable>,
    node_to_id: Cache<Node, NodeId>,
    id_to_node: Cache<NodeId, Node>,
    not_present: Cache<Node, ()>,
    /// Allocation count; a miss is only recorded if no allocation finished
    /// while the base was being asked
    allocations: Mutex<u64>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NodeTableCache {
    /// Wrap `base`; a size of 0 disables that cache
    pub fn new(
        base: Arc<dyn NodeTable>,
        node_to_id_size: usize,
        id_to_node_size: usize,
        miss_size: usize,
    ) -> Self {
        Self {
            base,
            node_to_id: Cache::new(node_to_id_size),
            id_to_node: Cache::new(id_to_node_size),
            not_present: Cache::new(miss_size),
            allocations: Mutex::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache statistics
    pub fn stats(&self) -> NodeCacheStats {
        NodeCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            node_to_id_entries: self.node_to_id.len(),
            id_to_node_entries: self.id_to_node.len(),
        }
    }

    fn remember(&self, node: &Node, id: NodeId) {
        self.node_to_id.put(node.clone(), id);
        self.id_to_node.put(id, node.clone());
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

impl NodeTable for NodeTableCache {
    fn get_alloc_node_id(&self, node: &Node) -> Result<NodeId> {
        if let Some(id) = self.node_to_id.get(node) {
            self.hit();
            return Ok(id);
        }
        self.miss();
        let id = self.base.get_alloc_node_id(node)?;
        {
            let mut allocations = self.allocations.lock();
            *allocations += 1;
            self.not_present.remove(node);
        }
        self.remember(node, id);
        Ok(id)
    }

    fn get_node_id_for_node(&self, node: &Node) -> Result<Option<NodeId>> {
        if let Some(id) = self.node_to_id.get(node) {
            self.hit();
            return Ok(Some(id));
        }
        if self.not_present.get(node).is_some() {
            self.hit();
            return Ok(None);
        }
        self.miss();
        let seen = *self.allocations.lock();
        match self.base.get_node_id_for_node(node)? {
            Some(id) => {
                self.remember(node, id);
                Ok(Some(id))
            }
            None => {
                let allocations = self.allocations.lock();
                if *allocations == seen {
                    self.not_present.put(node.clone(), ());
                }
                Ok(None)
            }
        }
    }

    fn get_node_for_node_id(&self, id: NodeId) -> Result<Node> {
        if let Some(node) = self.id_to_node.get(&id) {
            self.hit();
            return Ok(node);
        }
        self.miss();
        let node = self.base.get_node_for_node_id(id)?;
        self.remember(&node, id);
        Ok(node)
    }

    fn is_empty(&self) -> Result<bool> {
        self.base.is_empty()
    }

    fn sync(&self) -> Result<()> {
        self.base.sync()
    }

    fn close(&self) -> Result<()> {
        self.base.close()
    }
}

impl std::fmt::Debug for NodeTableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTableCache")
            .field("base", &self.base)
            .field("stats", &self.stats())
            .finish()
    }
}
