//! A tuple table addressed by nodes instead of node ids

use crate::dictionary::{Node, NodeId, NodeTable};
use crate::error::Result;
use crate::index::{TupleIter, TupleTable};
use std::sync::Arc;

/// Lazy sequence of node tuples
pub type NodeTupleIter = Box<dyn Iterator<Item = Result<Vec<Node>>> + Send>;

/// Tuple table plus the node table that encodes its columns
#[derive(Debug, Clone)]
pub struct NodeTupleTable {
    tuples: TupleTable,
    nodes: Arc<dyn NodeTable>,
}

impl NodeTupleTable {
    /// Pair a tuple table with a node table
    pub fn new(tuples: TupleTable, nodes: Arc<dyn NodeTable>) -> Self {
        Self { tuples, nodes }
    }

    /// The underlying id table
    pub fn tuple_table(&self) -> &TupleTable {
        &self.tuples
    }

    /// The node table
    pub fn node_table(&self) -> &Arc<dyn NodeTable> {
        &self.nodes
    }

    /// Add a row, allocating ids for new nodes; false if already present
    pub fn add_row(&self, row: &[Node]) -> Result<bool> {
        let ids = row
            .iter()
            .map(|n| self.nodes.get_alloc_node_id(n))
            .collect::<Result<Vec<_>>>()?;
        self.tuples.add(&ids)
    }

    /// Delete a row; false if it was absent or mentions an unknown node
    pub fn delete_row(&self, row: &[Node]) -> Result<bool> {
        match self.lookup_ids(row)? {
            Some(ids) => self.tuples.delete(&ids),
            None => Ok(false),
        }
    }

    /// Whether the row is present
    pub fn contains_row(&self, row: &[Node]) -> Result<bool> {
        match self.lookup_ids(row)? {
            Some(ids) => self.tuples.contains(&ids),
            None => Ok(false),
        }
    }

    /// Id pattern for a node pattern; `None` if a bound node has no id, in
    /// which case nothing can match
    pub fn pattern_ids(&self, pattern: &[Option<Node>]) -> Result<Option<Vec<Option<NodeId>>>> {
        let mut ids = Vec::with_capacity(pattern.len());
        for slot in pattern {
            match slot {
                None => ids.push(None),
                Some(node) => match self.nodes.get_node_id_for_node(node)? {
                    Some(id) => ids.push(Some(id)),
                    None => return Ok(None),
                },
            }
        }
        Ok(Some(ids))
    }

    /// Id tuples matching a node pattern
    pub fn find_ids(&self, pattern: &[Option<Node>]) -> Result<TupleIter> {
        match self.pattern_ids(pattern)? {
            Some(ids) => self.tuples.find(&ids),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    /// Node tuples matching a node pattern
    pub fn find(&self, pattern: &[Option<Node>]) -> Result<NodeTupleIter> {
        let ids = self.find_ids(pattern)?;
        let nodes = self.nodes.clone();
        Ok(Box::new(ids.map(move |tuple| -> Result<Vec<Node>> {
            tuple?
                .into_iter()
                .map(|id| nodes.get_node_for_node_id(id))
                .collect()
        })))
    }

    /// Number of rows
    pub fn count(&self) -> Result<u64> {
        self.tuples.count()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> Result<bool> {
        self.tuples.is_empty()
    }

    /// Sync indexes then nodes
    pub fn sync(&self) -> Result<()> {
        self.tuples.sync()?;
        self.nodes.sync()
    }

    fn lookup_ids(&self, row: &[Node]) -> Result<Option<Vec<NodeId>>> {
        let mut ids = Vec::with_capacity(row.len());
        for node in row {
            match self.nodes.get_node_id_for_node(node)? {
                Some(id) => ids.push(id),
                None => return Ok(None),
            }
        }
        Ok(Some(ids))
    }
}
