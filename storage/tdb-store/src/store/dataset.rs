//! An open dataset: triple, quad and prefix tables over one node table

use super::node_tuple_table::NodeTupleTable;
use super::prefixes::DatasetPrefixes;
use crate::base::block::BlockCache;
use crate::base::location::Location;
use crate::concurrency::{CheckedIter, ConcurrencyPolicy};
use crate::config::SystemConfig;
use crate::dictionary::{Node, NodeId, NodeTable, Quad, Triple};
use crate::error::{first_error, Result, TdbError};
use crate::index::{TupleIter, TupleTable};
use crate::setup::ReorderChoice;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lazy, epoch-checked sequence of triples
pub type TripleIter = CheckedIter<Box<dyn Iterator<Item = Result<Triple>> + Send>>;

/// Lazy, epoch-checked sequence of quads
pub type QuadIter = CheckedIter<Box<dyn Iterator<Item = Result<Quad>> + Send>>;

/// Lazy, epoch-checked sequence of id tuples
pub type IdTupleIter = CheckedIter<TupleIter>;

/// Components assembled by the setup code
pub(crate) struct DatasetParts {
    pub location: Location,
    pub config: SystemConfig,
    pub reorder: ReorderChoice,
    pub node_table: Arc<dyn NodeTable>,
    pub triples: TupleTable,
    pub quads: TupleTable,
    pub prefixes: DatasetPrefixes,
    pub policy: Arc<ConcurrencyPolicy>,
    pub block_cache: Arc<BlockCache>,
}

/// A triple/quad store at one location
///
/// Writes take the dataset's write lock and run inside one update session;
/// finds take the read lock only while choosing an index and positioning,
/// and return iterators that fail once a later write has happened.
pub struct DatasetGraphTdb {
    location: Location,
    config: SystemConfig,
    reorder: ReorderChoice,
    node_table: Arc<dyn NodeTable>,
    triples: NodeTupleTable,
    quads: NodeTupleTable,
    prefixes: DatasetPrefixes,
    policy: Arc<ConcurrencyPolicy>,
    block_cache: Arc<BlockCache>,
    lock: RwLock<()>,
    closed: AtomicBool,
}

impl DatasetGraphTdb {
    pub(crate) fn new(parts: DatasetParts) -> Self {
        Self {
            triples: NodeTupleTable::new(parts.triples, parts.node_table.clone()),
            quads: NodeTupleTable::new(parts.quads, parts.node_table.clone()),
            location: parts.location,
            config: parts.config,
            reorder: parts.reorder,
            node_table: parts.node_table,
            prefixes: parts.prefixes,
            policy: parts.policy,
            block_cache: parts.block_cache,
            lock: RwLock::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Where the dataset lives
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Configuration in effect for this dataset
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Pattern reordering selected for this location
    pub fn reorder(&self) -> &ReorderChoice {
        &self.reorder
    }

    /// Reader/writer accounting
    pub fn policy(&self) -> &Arc<ConcurrencyPolicy> {
        &self.policy
    }

    /// The shared node table
    pub fn node_table(&self) -> &Arc<dyn NodeTable> {
        &self.node_table
    }

    /// Triple table (S, P, O)
    pub fn triple_table(&self) -> &NodeTupleTable {
        &self.triples
    }

    /// Quad table (G, S, P, O)
    pub fn quad_table(&self) -> &NodeTupleTable {
        &self.quads
    }

    /// Prefix mappings
    pub fn prefixes(&self) -> &DatasetPrefixes {
        &self.prefixes
    }

    /// Block read cache (hits, misses)
    pub fn block_cache_stats(&self) -> (u64, u64) {
        self.block_cache.stats()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // Terms

    /// Id for a node, allocating if new
    pub fn id_for(&self, node: &Node) -> Result<NodeId> {
        self.check_open()?;
        self.node_table.get_alloc_node_id(node)
    }

    /// Node for an id
    pub fn node_for(&self, id: NodeId) -> Result<Node> {
        self.check_open()?;
        self.node_table.get_node_for_node_id(id)
    }

    /// Id for a node without allocating
    pub fn lookup_id(&self, node: &Node) -> Result<Option<NodeId>> {
        self.check_open()?;
        self.node_table.get_node_id_for_node(node)
    }

    // Id tuples

    /// Insert an (S, P, O) id tuple; false if already present
    pub fn insert_triple_ids(&self, tuple: &[NodeId]) -> Result<bool> {
        self.update(|| self.triples.tuple_table().add(tuple))
    }

    /// Delete an (S, P, O) id tuple; false if absent
    pub fn delete_triple_ids(&self, tuple: &[NodeId]) -> Result<bool> {
        self.update(|| self.triples.tuple_table().delete(tuple))
    }

    /// Triple id tuples matching a pattern, `None` for unbound columns
    pub fn scan_triples(&self, pattern: &[Option<NodeId>]) -> Result<IdTupleIter> {
        let iter = self.read(|| self.triples.tuple_table().find(pattern))?;
        Ok(self.policy.checked_iter(iter))
    }

    /// Insert a (G, S, P, O) id tuple; false if already present
    pub fn insert_quad_ids(&self, tuple: &[NodeId]) -> Result<bool> {
        self.update(|| self.quads.tuple_table().add(tuple))
    }

    /// Delete a (G, S, P, O) id tuple; false if absent
    pub fn delete_quad_ids(&self, tuple: &[NodeId]) -> Result<bool> {
        self.update(|| self.quads.tuple_table().delete(tuple))
    }

    /// Quad id tuples matching a pattern
    pub fn scan_quads(&self, pattern: &[Option<NodeId>]) -> Result<IdTupleIter> {
        let iter = self.read(|| self.quads.tuple_table().find(pattern))?;
        Ok(self.policy.checked_iter(iter))
    }

    // Nodes

    /// Add a triple; false if already present
    pub fn add_triple(&self, triple: &Triple) -> Result<bool> {
        self.update(|| self.triples.add_row(&triple_row(triple)))
    }

    /// Delete a triple; false if absent
    pub fn delete_triple(&self, triple: &Triple) -> Result<bool> {
        self.update(|| self.triples.delete_row(&triple_row(triple)))
    }

    /// Whether the triple is present
    pub fn contains_triple(&self, triple: &Triple) -> Result<bool> {
        self.read(|| self.triples.contains_row(&triple_row(triple)))
    }

    /// Triples matching a pattern; `None` matches anything
    pub fn find_triples(
        &self,
        subject: Option<&Node>,
        predicate: Option<&Node>,
        object: Option<&Node>,
    ) -> Result<TripleIter> {
        let pattern = [subject.cloned(), predicate.cloned(), object.cloned()];
        let rows = self.read(|| self.triples.find(&pattern))?;
        let triples: Box<dyn Iterator<Item = Result<Triple>> + Send> =
            Box::new(rows.map(|row| -> Result<Triple> {
                let mut row = row?.into_iter();
                match (row.next(), row.next(), row.next()) {
                    (Some(s), Some(p), Some(o)) => Ok(Triple::new(s, p, o)),
                    _ => Err(short_row("triple")),
                }
            }));
        Ok(self.policy.checked_iter(triples))
    }

    /// Add a quad; false if already present
    pub fn add_quad(&self, quad: &Quad) -> Result<bool> {
        self.update(|| self.quads.add_row(&quad_row(quad)))
    }

    /// Delete a quad; false if absent
    pub fn delete_quad(&self, quad: &Quad) -> Result<bool> {
        self.update(|| self.quads.delete_row(&quad_row(quad)))
    }

    /// Whether the quad is present
    pub fn contains_quad(&self, quad: &Quad) -> Result<bool> {
        self.read(|| self.quads.contains_row(&quad_row(quad)))
    }

    /// Quads matching a pattern; `None` matches anything
    pub fn find_quads(
        &self,
        graph: Option<&Node>,
        subject: Option<&Node>,
        predicate: Option<&Node>,
        object: Option<&Node>,
    ) -> Result<QuadIter> {
        let pattern = [
            graph.cloned(),
            subject.cloned(),
            predicate.cloned(),
            object.cloned(),
        ];
        let rows = self.read(|| self.quads.find(&pattern))?;
        let quads: Box<dyn Iterator<Item = Result<Quad>> + Send> = Box::new(rows.map(|row| -> Result<Quad> {
            let mut row = row?.into_iter();
            match (row.next(), row.next(), row.next(), row.next()) {
                (Some(g), Some(s), Some(p), Some(o)) => Ok(Quad::new(g, s, p, o)),
                _ => Err(short_row("quad")),
            }
        }));
        Ok(self.policy.checked_iter(quads))
    }

    /// Number of triples
    pub fn count_triples(&self) -> Result<u64> {
        self.read(|| self.triples.count())
    }

    /// Number of quads
    pub fn count_quads(&self) -> Result<u64> {
        self.read(|| self.quads.count())
    }

    /// Whether both the triple and quad tables are empty
    pub fn is_empty(&self) -> Result<bool> {
        self.read(|| Ok(self.triples.is_empty()? && self.quads.is_empty()?))
    }

    // Lifecycle

    /// Make every change durable
    pub fn sync(&self) -> Result<()> {
        self.check_open()?;
        let _lock = self.lock.write();
        self.triples.tuple_table().sync()?;
        self.quads.tuple_table().sync()?;
        self.prefixes.sync()?;
        self.node_table.sync()?;
        debug!(location = %self.location, "synced");
        Ok(())
    }

    /// Sync and release every file; later calls fail with `Closed`
    pub fn close(&self) -> Result<()> {
        let _lock = self.lock.write();
        if self.is_closed() {
            return Ok(());
        }
        // On failure the dataset stays open and close can be retried
        first_error([
            self.triples.tuple_table().close(),
            self.quads.tuple_table().close(),
            self.prefixes.close(),
            self.node_table.close(),
        ])
        .map_err(|e| {
            warn!(location = %self.location, "dataset close failed: {e}");
            e
        })?;
        self.closed.store(true, Ordering::SeqCst);
        info!(location = %self.location, "dataset closed");
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(TdbError::Closed(format!("dataset {}", self.location)));
        }
        Ok(())
    }

    fn update<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.check_open()?;
        let _lock = self.lock.write();
        let _session = self.policy.start_update()?;
        f()
    }

    fn read<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.check_open()?;
        let _lock = self.lock.read();
        let _session = self.policy.start_read()?;
        f()
    }
}

impl Drop for DatasetGraphTdb {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(location = %self.location, "error closing dataset on drop: {e}");
        }
    }
}

impl std::fmt::Debug for DatasetGraphTdb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetGraphTdb")
            .field("location", &self.location)
            .field("reorder", &self.reorder)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn triple_row(t: &Triple) -> [Node; 3] {
    [t.subject.clone(), t.predicate.clone(), t.object.clone()]
}

fn quad_row(q: &Quad) -> [Node; 4] {
    [
        q.graph.clone(),
        q.subject.clone(),
        q.predicate.clone(),
        q.object.clone(),
    ]
}

fn short_row(kind: &str) -> TdbError {
    TdbError::CorruptLayout(format!("{kind} table returned a short row"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::term::XSD;
    use crate::setup::build_dataset;
    use tempfile::TempDir;

    fn iri(s: &str) -> Node {
        Node::iri(format!("http://example/{s}"))
    }

    fn mem() -> Result<DatasetGraphTdb> {
        build_dataset(&Location::mem(), &SystemConfig::small())
    }

    #[test]
    fn test_subject_and_predicate_scans() -> Result<()> {
        let ds = mem()?;
        let a = ds.id_for(&iri("s"))?;
        let p = ds.id_for(&iri("p"))?;
        let o = ds.id_for(&iri("o"))?;
        assert!(ds.insert_triple_ids(&[a, p, o])?);
        assert!(!ds.insert_triple_ids(&[a, p, o])?);

        let by_subject = ds.scan_triples(&[Some(a), None, None])?.collect::<Result<Vec<_>>>()?;
        assert_eq!(by_subject, vec![vec![a, p, o]]);

        let pos = &ds.triple_table().tuple_table().indexes()[1];
        assert_eq!(pos.name(), "POS");
        let all = pos.all()?.collect::<Result<Vec<_>>>()?;
        assert_eq!(all, vec![vec![a, p, o]]);
        Ok(())
    }

    #[test]
    fn test_node_level_triples() -> Result<()> {
        let ds = mem()?;
        let t1 = Triple::new(iri("s"), iri("p"), Node::literal("one"));
        let t2 = Triple::new(iri("s"), iri("q"), Node::typed_literal("2", format!("{XSD}integer")));
        assert!(ds.add_triple(&t1)?);
        assert!(ds.add_triple(&t2)?);
        assert_eq!(ds.count_triples()?, 2);

        let found = ds
            .find_triples(Some(&iri("s")), None, None)?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(found.len(), 2);
        assert!(found.contains(&t1) && found.contains(&t2));

        let by_object = ds
            .find_triples(None, None, Some(&Node::literal("one")))?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(by_object, vec![t1.clone()]);

        assert!(ds.delete_triple(&t1)?);
        assert!(!ds.delete_triple(&t1)?);
        assert!(!ds.contains_triple(&t1)?);
        assert!(ds.contains_triple(&t2)?);
        Ok(())
    }

    #[test]
    fn test_unknown_nodes_never_allocated() -> Result<()> {
        let ds = mem()?;
        let missing = iri("missing");
        assert_eq!(ds.find_triples(Some(&missing), None, None)?.count(), 0);
        assert!(!ds.delete_triple(&Triple::new(missing.clone(), iri("p"), iri("o")))?);
        assert_eq!(ds.lookup_id(&missing)?, None);
        Ok(())
    }

    #[test]
    fn test_quads() -> Result<()> {
        let ds = mem()?;
        let q = Quad::new(iri("g"), iri("s"), iri("p"), iri("o"));
        assert!(ds.add_quad(&q)?);
        let in_graph = ds
            .find_quads(Some(&iri("g")), None, None, None)?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(in_graph, vec![q.clone()]);
        let by_object = ds
            .find_quads(None, None, None, Some(&iri("o")))?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(by_object, vec![q.clone()]);
        assert_eq!(ds.count_triples()?, 0);
        assert!(ds.delete_quad(&q)?);
        assert!(ds.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_iterator_fails_after_write() -> Result<()> {
        let ds = mem()?;
        for i in 0..3 {
            ds.add_triple(&Triple::new(iri("s"), iri("p"), iri(&i.to_string())))?;
        }
        let mut iter = ds.find_triples(Some(&iri("s")), None, None)?;
        assert!(iter.next().transpose()?.is_some());
        ds.add_triple(&Triple::new(iri("s"), iri("p"), iri("new")))?;
        assert!(matches!(
            iter.next(),
            Some(Err(TdbError::ConcurrentModification { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_closed_dataset_rejects_calls() -> Result<()> {
        let ds = mem()?;
        ds.close()?;
        ds.close()?;
        assert!(matches!(ds.id_for(&iri("s")), Err(TdbError::Closed(_))));
        assert!(matches!(ds.count_triples(), Err(TdbError::Closed(_))));
        assert!(matches!(ds.sync(), Err(TdbError::Closed(_))));
        Ok(())
    }

    #[test]
    fn test_close_finishes_after_partial_close() -> Result<()> {
        let dir = TempDir::new()?;
        let location = Location::dir(dir.path());
        let t = Triple::new(iri("s"), iri("p"), iri("o"));
        {
            let ds = build_dataset(&location, &SystemConfig::small())?;
            ds.add_triple(&t)?;
            ds.add_quad(&Quad::new(iri("g"), iri("s"), iri("p"), iri("o")))?;
            ds.triple_table().tuple_table().close()?;
            assert!(!ds.is_closed());
            ds.close()?;
            assert!(ds.is_closed());
            ds.close()?;
        }
        let ds = build_dataset(&location, &SystemConfig::small())?;
        assert!(ds.contains_triple(&t)?);
        assert_eq!(ds.count_quads()?, 1);
        Ok(())
    }

    #[test]
    fn test_reopen_on_disk() -> Result<()> {
        let dir = TempDir::new()?;
        let location = Location::dir(dir.path());
        let t = Triple::new(iri("s"), iri("p"), Node::lang_literal("hello", "en"));
        let id = {
            let ds = build_dataset(&location, &SystemConfig::small())?;
            ds.add_triple(&t)?;
            let id = ds.id_for(&t.object)?;
            ds.close()?;
            id
        };
        let ds = build_dataset(&location, &SystemConfig::small())?;
        assert_eq!(ds.lookup_id(&t.object)?, Some(id));
        assert!(ds.contains_triple(&t)?);
        assert_eq!(ds.node_for(id)?, t.object);
        Ok(())
    }
}
