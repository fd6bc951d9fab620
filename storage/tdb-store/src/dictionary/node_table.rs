//! Node table stored as a hash index plus an object file
//!
//! `node2id` is a range index keyed by the node hash with the node id as
//! value. The object file holds each node's canonical form; a node's id is
//! the offset of its entry.

use super::{Node, NodeId, NodeTable};
use crate::base::object_file::ObjectFile;
use crate::base::record::Record;
use crate::error::{first_error, Result, TdbError};
use crate::index::RangeIndex;
use crate::sys::{LEN_NODE_HASH, SIZE_OF_NODE_ID};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, trace};

/// Persistent node table
pub struct NodeTableNative {
    label: String,
    node_to_id: Arc<dyn RangeIndex>,
    objects: ObjectFile,
    /// Serializes allocation so a node is never written twice
    alloc: Mutex<()>,
}

impl NodeTableNative {
    /// Table over a `hash -> id` index and an object file
    pub fn new(label: impl Into<String>, node_to_id: Arc<dyn RangeIndex>, objects: ObjectFile) -> Result<Self> {
        let label = label.into();
        let rf = node_to_id.record_factory();
        if rf.key_length() != LEN_NODE_HASH || rf.value_length() != SIZE_OF_NODE_ID {
            return Err(TdbError::CorruptLayout(format!(
                "{label}: node index records are {},{} bytes, expected {LEN_NODE_HASH},{SIZE_OF_NODE_ID}",
                rf.key_length(),
                rf.value_length()
            )));
        }
        Ok(Self {
            label,
            node_to_id,
            objects,
            alloc: Mutex::new(()),
        })
    }

    /// Number of nodes stored
    pub fn len(&self) -> Result<u64> {
        self.node_to_id.count()
    }

    /// Every stored node with its id, in allocation order
    pub fn all(&self) -> Result<Vec<(NodeId, Node)>> {
        self.objects
            .all()?
            .into_iter()
            .map(|(offset, bytes)| Ok((NodeId::from_table_offset(offset)?, self.parse(&bytes)?)))
            .collect()
    }

    fn key(&self, node: &Node) -> Result<Record> {
        self.node_to_id.record_factory().create_key(&node.hash_key())
    }

    fn parse(&self, bytes: &[u8]) -> Result<Node> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TdbError::InvalidNode(format!("{}: {e}", self.label)))?;
        Node::parse(text)
    }

    /// Lookup by hash, checking the stored bytes are this node's
    fn lookup(&self, node: &Node) -> Result<Option<NodeId>> {
        let Some(record) = self.node_to_id.find(&self.key(node)?)? else {
            return Ok(None);
        };
        let id = NodeId::from_bytes(record.value())?;
        let offset = id.table_offset().ok_or_else(|| {
            TdbError::CorruptLayout(format!("{}: index holds non-table id {id}", self.label))
        })?;
        let stored = self.objects.read(offset)?;
        let canonical = node.to_canonical();
        if stored != canonical.as_bytes() {
            let existing = String::from_utf8_lossy(&stored).into_owned();
            error!(table = %self.label, %existing, node = %canonical, "node hash collision");
            return Err(TdbError::HashCollision {
                existing,
                node: canonical,
            });
        }
        Ok(Some(id))
    }
}

impl NodeTable for NodeTableNative {
    fn get_alloc_node_id(&self, node: &Node) -> Result<NodeId> {
        node.validate()?;
        let _alloc = self.alloc.lock();
        if let Some(id) = self.lookup(node)? {
            return Ok(id);
        }
        let canonical = node.to_canonical();
        let offset = self.objects.write(canonical.as_bytes())?;
        let id = NodeId::from_table_offset(offset)?;
        let record = self
            .node_to_id
            .record_factory()
            .create(&node.hash_key(), &id.to_bytes())?;
        self.node_to_id.insert(record)?;
        trace!(table = %self.label, %id, node = %canonical, "allocated node id");
        Ok(id)
    }

    fn get_node_id_for_node(&self, node: &Node) -> Result<Option<NodeId>> {
        node.validate()?;
        self.lookup(node)
    }

    fn get_node_for_node_id(&self, id: NodeId) -> Result<Node> {
        let offset = id.table_offset().ok_or(TdbError::UnknownNodeId(id))?;
        let bytes = match self.objects.read(offset) {
            Ok(bytes) => bytes,
            Err(TdbError::InvalidInput(_)) => return Err(TdbError::UnknownNodeId(id)),
            Err(e) => return Err(e),
        };
        let node = self.parse(&bytes).map_err(|_| TdbError::UnknownNodeId(id))?;
        // An offset inside some other entry can decode; the index must agree
        match self.lookup(&node)? {
            Some(found) if found == id => Ok(node),
            _ => Err(TdbError::UnknownNodeId(id)),
        }
    }

    fn is_empty(&self) -> Result<bool> {
        self.node_to_id.is_empty()
    }

    fn sync(&self) -> Result<()> {
        self.objects.sync()?;
        self.node_to_id.sync()
    }

    fn close(&self) -> Result<()> {
        first_error([self.objects.close(), self.node_to_id.close()])
    }
}

impl std::fmt::Debug for NodeTableNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTableNative")
            .field("label", &self.label)
            .field("node_to_id", &self.node_to_id)
            .field("objects", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::block::BlockCache;
    use crate::base::location::{FileSet, Location};
    use crate::base::record::RecordFactory;
    use crate::btree::{BPlusTree, BPlusTreeParams};
    use tempfile::TempDir;

    fn table(location: &Location) -> Result<NodeTableNative> {
        let rf = RecordFactory::new(LEN_NODE_HASH, SIZE_OF_NODE_ID)?;
        let index = BPlusTree::open(
            &FileSet::new(location, "node2id"),
            BPlusTreeParams::new(1024, rf)?,
            0,
            Arc::new(BlockCache::default()),
        )?;
        let objects = ObjectFile::open(&FileSet::new(location, "nodes"))?;
        NodeTableNative::new("nodes", Arc::new(index), objects)
    }

    #[test]
    fn test_alloc_is_idempotent() -> Result<()> {
        let table = table(&Location::mem())?;
        assert!(table.is_empty()?);
        let a = table.get_alloc_node_id(&Node::iri("http://example/a"))?;
        let b = table.get_alloc_node_id(&Node::literal("b"))?;
        assert_ne!(a, b);
        assert_eq!(table.get_alloc_node_id(&Node::iri("http://example/a"))?, a);
        assert_eq!(table.len()?, 2);
        assert_eq!(a.table_offset(), Some(0));
        Ok(())
    }

    #[test]
    fn test_lookup_without_alloc() -> Result<()> {
        let table = table(&Location::mem())?;
        let n = Node::blank_node("b1");
        assert_eq!(table.get_node_id_for_node(&n)?, None);
        assert!(table.is_empty()?);
        let id = table.get_alloc_node_id(&n)?;
        assert_eq!(table.get_node_id_for_node(&n)?, Some(id));
        Ok(())
    }

    #[test]
    fn test_id_to_node() -> Result<()> {
        let table = table(&Location::mem())?;
        let n = Node::lang_literal("chat", "fr");
        let id = table.get_alloc_node_id(&n)?;
        assert_eq!(table.get_node_for_node_id(id)?, n);
        Ok(())
    }

    #[test]
    fn test_unknown_ids() -> Result<()> {
        let table = table(&Location::mem())?;
        let id = table.get_alloc_node_id(&Node::iri("http://example/some/long/iri"))?;
        for bogus in [
            NodeId::from_table_offset(id.table_offset().unwrap_or(0) + 3)?,
            NodeId::from_table_offset(10_000)?,
            NodeId::ANY,
        ] {
            assert!(
                matches!(table.get_node_for_node_id(bogus), Err(TdbError::UnknownNodeId(_))),
                "{bogus}"
            );
        }
        Ok(())
    }

    #[test]
    fn test_ids_straddling_unsynced_entries_unknown() -> Result<()> {
        let dir = TempDir::new()?;
        let table = table(&Location::dir(dir.path()))?;
        let first = table.get_alloc_node_id(&Node::literal("x"))?;
        table.sync()?;
        let second = table.get_alloc_node_id(&Node::iri("http://example/after/sync"))?;
        let file_len = second.table_offset().unwrap_or(0);
        for offset in [file_len - 4, file_len - 1] {
            let bogus = NodeId::from_table_offset(offset)?;
            assert!(
                matches!(table.get_node_for_node_id(bogus), Err(TdbError::UnknownNodeId(_))),
                "{bogus}"
            );
        }
        assert_eq!(table.get_node_for_node_id(first)?, Node::literal("x"));
        Ok(())
    }

    #[test]
    fn test_persists_across_reopen() -> Result<()> {
        let dir = TempDir::new()?;
        let location = Location::dir(dir.path());
        let n = Node::typed_literal("x", "http://example/dt");
        let id = {
            let table = table(&location)?;
            let id = table.get_alloc_node_id(&n)?;
            table.close()?;
            id
        };
        let table = table(&location)?;
        assert_eq!(table.get_node_id_for_node(&n)?, Some(id));
        assert_eq!(table.get_node_for_node_id(id)?, n);
        assert_eq!(table.all()?, vec![(id, n)]);
        Ok(())
    }

    #[test]
    fn test_unreadable_nodes_not_stored() -> Result<()> {
        let table = table(&Location::mem())?;
        let lang = Node::lang_literal("x", "en");
        let id = table.get_alloc_node_id(&lang)?;
        let both = Node::Literal {
            value: "x".into(),
            datatype: Some("http://example/dt".into()),
            language: Some("en".into()),
        };
        for bad in [both, Node::blank_node(""), Node::lang_literal("x", "")] {
            assert!(matches!(table.get_alloc_node_id(&bad), Err(TdbError::InvalidNode(_))));
            assert!(matches!(table.get_node_id_for_node(&bad), Err(TdbError::InvalidNode(_))));
        }
        assert_eq!(table.len()?, 1);
        assert_eq!(table.get_node_for_node_id(id)?, lang);
        Ok(())
    }

    #[test]
    fn test_collision_detected() -> Result<()> {
        let table = table(&Location::mem())?;
        let real = Node::iri("http://example/real");
        let id = table.get_alloc_node_id(&real)?;
        // Point another node's hash at the first node's entry
        let impostor = Node::iri("http://example/impostor");
        let forged = table
            .node_to_id
            .record_factory()
            .create(&impostor.hash_key(), &id.to_bytes())?;
        table.node_to_id.insert(forged)?;
        assert!(matches!(
            table.get_alloc_node_id(&impostor),
            Err(TdbError::HashCollision { .. })
        ));
        Ok(())
    }
}
