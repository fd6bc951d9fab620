//! Namespace prefix mappings stored per graph
//!
//! Each mapping is a row `(graph, prefix, uri)` in a GPU tuple table with
//! its own node table. The graph and uri are IRIs; the prefix is a plain
//! literal so the empty prefix is representable.

use super::node_tuple_table::NodeTupleTable;
use crate::dictionary::{Node, NodeTable};
use crate::error::{first_error, Result, TdbError};
use crate::index::TupleTable;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Graph name used for the default graph's prefixes
pub const DEFAULT_GRAPH: &str = "urn:x-arq:DefaultGraph";

/// Prefix mappings of a dataset
#[derive(Debug, Clone)]
pub struct DatasetPrefixes {
    table: NodeTupleTable,
}

impl DatasetPrefixes {
    /// Prefix store over a 3-column table
    pub fn new(tuples: TupleTable, nodes: Arc<dyn NodeTable>) -> Self {
        Self {
            table: NodeTupleTable::new(tuples, nodes),
        }
    }

    /// The underlying table
    pub fn table(&self) -> &NodeTupleTable {
        &self.table
    }

    /// Map `prefix` to `uri` in `graph`, replacing any earlier mapping
    pub fn insert_prefix(&self, graph: &str, prefix: &str, uri: &str) -> Result<()> {
        self.delete_prefix(graph, prefix)?;
        debug!(graph, prefix, uri, "insert prefix");
        self.table
            .add_row(&[Node::iri(graph), Node::literal(prefix), Node::iri(uri)])?;
        Ok(())
    }

    /// Namespace mapped to `prefix` in `graph`
    pub fn read_prefix(&self, graph: &str, prefix: &str) -> Result<Option<String>> {
        let pattern = [Some(Node::iri(graph)), Some(Node::literal(prefix)), None];
        match self.table.find(&pattern)?.next() {
            Some(row) => Ok(Some(text(&row?[2])?)),
            None => Ok(None),
        }
    }

    /// Remove the mapping for `prefix` in `graph`; false if there was none
    pub fn delete_prefix(&self, graph: &str, prefix: &str) -> Result<bool> {
        let pattern = [Some(Node::iri(graph)), Some(Node::literal(prefix)), None];
        let rows = self.table.find(&pattern)?.collect::<Result<Vec<_>>>()?;
        let mut deleted = false;
        for row in rows {
            deleted |= self.table.delete_row(&row)?;
        }
        Ok(deleted)
    }

    /// Every mapping in `graph`, by prefix
    pub fn read_prefix_map(&self, graph: &str) -> Result<BTreeMap<String, String>> {
        let pattern = [Some(Node::iri(graph)), None, None];
        self.table
            .find(&pattern)?
            .map(|row| -> Result<(String, String)> {
                let row = row?;
                Ok((text(&row[1])?, text(&row[2])?))
            })
            .collect()
    }

    /// Sync the prefix table and its nodes
    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }

    /// Close the prefix table and its nodes
    pub fn close(&self) -> Result<()> {
        first_error([
            self.table.tuple_table().close(),
            self.table.node_table().close(),
        ])
    }
}

fn text(node: &Node) -> Result<String> {
    match node {
        Node::Iri(s) => Ok(s.clone()),
        Node::Literal { value, .. } => Ok(value.clone()),
        Node::BlankNode(_) => Err(TdbError::InvalidNode(format!(
            "unexpected blank node in prefix table: {node}"
        ))),
    }
}
