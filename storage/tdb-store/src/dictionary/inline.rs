//! Inline fast path over a node table

use super::{Node, NodeId, NodeTable};
use crate::error::{Result, TdbError};
use std::sync::Arc;

/// Resolves inline value spaces from the id bits; everything else goes to
/// the wrapped table
#[derive(Debug)]
pub struct NodeTableInline {
    base: Arc<dyn NodeTable>,
}

impl NodeTableInline {
    /// Wrap `base`
    pub fn new(base: Arc<dyn NodeTable>) -> Self {
        Self { base }
    }
}

impl NodeTable for NodeTableInline {
    fn get_alloc_node_id(&self, node: &Node) -> Result<NodeId> {
        match NodeId::inline(node) {
            Some(id) => Ok(id),
            None => self.base.get_alloc_node_id(node),
        }
    }

    fn get_node_id_for_node(&self, node: &Node) -> Result<Option<NodeId>> {
        match NodeId::inline(node) {
            Some(id) => Ok(Some(id)),
            None => self.base.get_node_id_for_node(node),
        }
    }

    fn get_node_for_node_id(&self, id: NodeId) -> Result<Node> {
        if id.is_table() {
            return self.base.get_node_for_node_id(id);
        }
        id.decode_inline().ok_or(TdbError::UnknownNodeId(id))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::term::XSD;

    /// Table that must never be reached
    #[derive(Debug)]
    struct Unreachable;

    impl NodeTable for Unreachable {
        fn get_alloc_node_id(&self, _: &Node) -> Result<NodeId> {
            Err(TdbError::InvalidInput("reached base".into()))
        }
        fn get_node_id_for_node(&self, _: &Node) -> Result<Option<NodeId>> {
            Err(TdbError::InvalidInput("reached base".into()))
        }
        fn get_node_for_node_id(&self, _: NodeId) -> Result<Node> {
            Err(TdbError::InvalidInput("reached base".into()))
        }
        fn is_empty(&self) -> Result<bool> {
            Ok(true)
        }
        fn sync(&self) -> Result<()> {
            Ok(())
        }
        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_inline_values_bypass_base() -> Result<()> {
        let table = NodeTableInline::new(Arc::new(Unreachable));
        let n = Node::typed_literal("17", format!("{XSD}integer"));
        let id = table.get_alloc_node_id(&n)?;
        assert!(id.is_inline());
        assert_eq!(table.get_node_id_for_node(&n)?, Some(id));
        assert_eq!(table.get_node_for_node_id(id)?, n);
        Ok(())
    }

    #[test]
    fn test_other_nodes_reach_base() {
        let table = NodeTableInline::new(Arc::new(Unreachable));
        assert!(table.get_alloc_node_id(&Node::iri("http://example/x")).is_err());
        assert!(table
            .get_node_for_node_id(NodeId::from_raw(5))
            .is_err());
    }

    #[test]
    fn test_sentinels_unknown() {
        let table = NodeTableInline::new(Arc::new(Unreachable));
        assert!(matches!(
            table.get_node_for_node_id(NodeId::ANY),
            Err(TdbError::UnknownNodeId(_))
        ));
    }
}
