//! Dictionary encoding of RDF terms to 8-byte node ids
//!
//! A node table is built in layers, outermost first:
//! [`NodeTableInline`] decodes inline value spaces from the id itself,
//! [`NodeTableCache`] answers repeated lookups from LRU caches, and
//! [`NodeTableNative`] persists everything else.

pub mod cache;
pub mod inline;
pub mod node_id;
pub mod node_table;
pub mod term;

pub use cache::{NodeCacheStats, NodeTableCache};
pub use inline::NodeTableInline;
pub use node_id::{NodeId, NodeIdKind};
pub use node_table::NodeTableNative;
pub use term::{Node, Quad, Triple};

use crate::error::Result;
use std::fmt::Debug;

/// Bidirectional mapping between nodes and node ids
pub trait NodeTable: Send + Sync + Debug {
    /// Id for a node, allocating one if the node is new
    fn get_alloc_node_id(&self, node: &Node) -> Result<NodeId>;

    /// Id for a node if it has one; never allocates
    fn get_node_id_for_node(&self, node: &Node) -> Result<Option<NodeId>>;

    /// Node for an id; `UnknownNodeId` if the id was never issued
    fn get_node_for_node_id(&self, id: NodeId) -> Result<Node>;

    /// Whether no node has been stored
    fn is_empty(&self) -> Result<bool>;

    /// Make allocations durable
    fn sync(&self) -> Result<()>;

    /// Sync and release
    fn close(&self) -> Result<()>;
}
