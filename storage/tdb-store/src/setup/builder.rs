//! Metadata-driven assembly of a dataset
//!
//! The location metadata (`this.info`) records the logical layout: which
//! tuple indexes exist and what the node table files are called. Each file
//! set records its physical layout in `<name>.info`. On first use the
//! defaults are written; afterwards every value that can be recomputed is
//! recomputed and compared, and any disagreement stops the open.

use super::kinds::{IndexImpl, LayoutVersion, NodeTableImpl};
use super::names::{self, file, location as loc};
use super::reorder::ReorderChoice;
use crate::base::block::BlockCache;
use crate::base::location::{FileSet, Location};
use crate::base::metafile::MetaFile;
use crate::base::object_file::ObjectFile;
use crate::base::record::RecordFactory;
use crate::btree::{calc_order, BPlusTree, BPlusTreeParams};
use crate::concurrency::ConcurrencyPolicy;
use crate::config::{SystemConfig, LOCATION_PROPERTIES};
use crate::dictionary::{NodeTable, NodeTableCache, NodeTableInline, NodeTableNative};
use crate::error::{Result, TdbError};
use crate::index::{RangeIndex, TupleIndex, TupleTable};
use crate::store::dataset::{DatasetGraphTdb, DatasetParts};
use crate::store::prefixes::DatasetPrefixes;
use crate::sys::{
    LEGACY_VERSION, LEN_INDEX_QUAD_RECORD, LEN_INDEX_TRIPLE_RECORD, LEN_NODE_HASH, SIZE_OF_NODE_ID,
    TDB_VERSION,
};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Node table cache sizes
#[derive(Debug, Clone, Copy)]
struct NodeCacheSizes {
    node_to_id: usize,
    id_to_node: usize,
    miss: usize,
}

/// Builds datasets from locations
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    config: SystemConfig,
}

impl DatasetBuilder {
    /// Builder using `config` unless a location overrides it
    pub fn new(config: SystemConfig) -> Self {
        Self { config }
    }

    /// Process-wide configuration in effect
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Open or create the dataset at `location`
    pub fn build(&self, location: &Location) -> Result<DatasetGraphTdb> {
        location.ensure_exists()?;
        let config = resolve_config(location, &self.config)?;
        let mut meta = location_metadata(location)?;

        let layout = LayoutVersion::parse(loc::LAYOUT, meta.require(loc::LAYOUT)?)?;
        let kind = meta.get_or(loc::TYPE, "");
        if kind != loc::TYPE_STANDALONE {
            return Err(incompatible(loc::TYPE, loc::TYPE_STANDALONE, kind));
        }
        check_version(&mut meta, loc::NODEID_SIZE, SIZE_OF_NODE_ID)?;
        check_version(&mut meta, loc::NODE_HASHSIZE, LEN_NODE_HASH)?;
        check_version(&mut meta, loc::RECORD_TRIPLE, LEN_INDEX_TRIPLE_RECORD)?;
        check_version(&mut meta, loc::RECORD_QUAD, LEN_INDEX_QUAD_RECORD)?;

        let setup = Setup {
            location,
            block_cache: Arc::new(BlockCache::new(config.block_read_cache_size)),
            config,
        };
        let node2id = meta.require(loc::NODE2ID)?.to_string();
        let id2node = meta.require(loc::ID2NODE)?.to_string();
        debug!(%location, %node2id, %id2node, "node table");
        let table_impl = meta.get_or_set_default(loc::NODETABLE_TYPE, NodeTableImpl::Dat.as_str());
        NodeTableImpl::parse(loc::NODETABLE_TYPE, &table_impl)?;
        meta.check_or_set(loc::NODETABLE_LAYOUT, loc::NODETABLE_LAYOUT_V1)?;
        let caches = NodeCacheSizes {
            node_to_id: setup.config.node2id_cache_size,
            id_to_node: setup.config.id2node_cache_size,
            miss: setup.config.node_miss_cache_size,
        };
        let node_table = setup.make_node_table(&node2id, &id2node, Some(caches))?;

        let policy = ConcurrencyPolicy::new();
        let triples = setup.make_triple_table(&mut meta)?;
        let quads = setup.make_quad_table(&mut meta)?;
        let prefixes = setup.make_prefixes(&mut meta)?;
        let reorder = ReorderChoice::choose(location);
        meta.flush()?;

        info!(%location, %layout, ?reorder, "dataset opened");
        Ok(DatasetGraphTdb::new(DatasetParts {
            location: location.clone(),
            config: setup.config,
            reorder,
            node_table,
            triples,
            quads,
            prefixes,
            policy,
            block_cache: setup.block_cache,
        }))
    }
}

/// Open or create the dataset at `location` with the given configuration
pub fn build_dataset(location: &Location, config: &SystemConfig) -> Result<DatasetGraphTdb> {
    DatasetBuilder::new(config.clone()).build(location)
}

/// Process-wide configuration overridden by the location's `tdb.properties`
pub fn resolve_config(location: &Location, base: &SystemConfig) -> Result<SystemConfig> {
    match location.path(LOCATION_PROPERTIES).filter(|p| p.exists()) {
        Some(path) => {
            debug!(file = %path.display(), "location settings");
            base.clone().with_properties_file(&path)
        }
        None => Ok(base.clone()),
    }
}

/// Read or establish the location metadata
pub fn location_metadata(location: &Location) -> Result<MetaFile> {
    let new_dataset = location.is_mem() || !location.exists_any_files()?;
    let mut meta = MetaFile::open(location, names::LOCATION_META)?;
    let has_meta = meta.exists_metadata();
    let legacy = !new_dataset && !has_meta && location.exists(names::LEGACY_MARKER);

    if !new_dataset && has_meta {
        debug!(
            %location,
            version = meta.get_or(loc::CREATE_VERSION, "unknown"),
            "existing location"
        );
    }
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    if legacy {
        info!(%location, "location predates metadata, recording version {LEGACY_VERSION}");
        meta.ensure_property_set(loc::CREATE_VERSION, LEGACY_VERSION);
        meta.set(loc::CREATED, &now);
    } else if !has_meta {
        if !new_dataset {
            warn!(%location, "files present but no metadata, treating as a new dataset");
        }
        meta.ensure_property_set(loc::CREATE_VERSION, TDB_VERSION);
        meta.ensure_property_set(loc::CREATED, &now);
    }

    meta.ensure_property_set(loc::LAYOUT, LayoutVersion::V1.as_str());
    meta.ensure_property_set(loc::TYPE, loc::TYPE_STANDALONE);
    let layout = LayoutVersion::parse(loc::LAYOUT, meta.require(loc::LAYOUT)?).map_err(|e| {
        error!(%location, "{e}");
        e
    })?;
    match layout {
        LayoutVersion::V1 => {
            meta.ensure_property_set(loc::TRIPLES_PRIMARY, names::PRIMARY_INDEX_TRIPLES);
            meta.ensure_property_set(loc::TRIPLES, &names::TRIPLE_INDEXES.join(","));
            meta.ensure_property_set(loc::QUADS_PRIMARY, names::PRIMARY_INDEX_QUADS);
            meta.ensure_property_set(loc::QUADS, &names::QUAD_INDEXES.join(","));
            meta.ensure_property_set(loc::NODE2ID, names::INDEX_NODE2ID);
            meta.ensure_property_set(loc::ID2NODE, names::INDEX_ID2NODE);
            meta.ensure_property_set(loc::PREFIX_INDEX_FILE, names::INDEX_PREFIX);
            meta.ensure_property_set(loc::PREFIX_NODE2ID, names::PREFIX_NODE2ID);
            meta.ensure_property_set(loc::PREFIX_ID2NODE, names::PREFIX_ID2NODE);
        }
    }
    meta.flush()?;
    Ok(meta)
}

/// Parse a `key,value` record length description
pub fn parse_record_factory(label: &str, desc: &str) -> Result<RecordFactory> {
    let bad = || corrupt(format!("{label}: bad record length '{desc}'"));
    let (k, v) = desc.split_once(',').ok_or_else(bad)?;
    let k: usize = k.trim().parse().map_err(|_| bad())?;
    let v: usize = v.trim().parse().map_err(|_| bad())?;
    RecordFactory::new(k, v).map_err(|_| bad())
}

/// Component construction for one location
struct Setup<'a> {
    location: &'a Location,
    config: SystemConfig,
    block_cache: Arc<BlockCache>,
}

impl Setup<'_> {
    fn make_triple_table(&self, meta: &mut MetaFile) -> Result<TupleTable> {
        let primary = meta.get_or_set_default(loc::TRIPLES_PRIMARY, names::PRIMARY_INDEX_TRIPLES);
        let indexes = split_list(&meta.get_or_set_default(loc::TRIPLES, &names::TRIPLE_INDEXES.join(",")));
        if indexes.len() != 3 {
            return Err(corrupt(format!(
                "wrong number of triple table indexes: {}",
                indexes.join(",")
            )));
        }
        debug!(%primary, indexes = %indexes.join(","), "triple table");
        let tuple_indexes = self.make_tuple_indexes(&primary, &indexes, &indexes)?;
        TupleTable::new("triples", tuple_indexes)
    }

    fn make_quad_table(&self, meta: &mut MetaFile) -> Result<TupleTable> {
        let primary = meta.get_or_set_default(loc::QUADS_PRIMARY, names::PRIMARY_INDEX_QUADS);
        let indexes = split_list(&meta.get_or_set_default(loc::QUADS, &names::QUAD_INDEXES.join(",")));
        if indexes.len() != 6 {
            return Err(corrupt(format!(
                "wrong number of quad table indexes: {}",
                indexes.join(",")
            )));
        }
        debug!(%primary, indexes = %indexes.join(","), "quad table");
        let tuple_indexes = self.make_tuple_indexes(&primary, &indexes, &indexes)?;
        TupleTable::new("quads", tuple_indexes)
    }

    fn make_prefixes(&self, meta: &mut MetaFile) -> Result<DatasetPrefixes> {
        let index_file = meta.get_or_set_default(loc::PREFIX_INDEX_FILE, names::INDEX_PREFIX);
        let primary = meta.get_or_set_default(loc::PREFIX_PRIMARY, names::PRIMARY_INDEX_PREFIX);
        let indexes = split_list(&meta.get_or_set_default(loc::PREFIX_INDEXES, &names::PREFIX_INDEXES.join(",")));
        if indexes.len() != 1 {
            return Err(corrupt(format!(
                "wrong number of prefix table indexes: {}",
                indexes.join(",")
            )));
        }
        let tuple_indexes = self.make_tuple_indexes(&primary, &indexes, &[index_file])?;
        let node2id = meta.get_or_set_default(loc::PREFIX_NODE2ID, names::PREFIX_NODE2ID);
        let id2node = meta.get_or_set_default(loc::PREFIX_ID2NODE, names::PREFIX_ID2NODE);
        let nodes = self.make_node_table(&node2id, &id2node, None)?;
        debug!(%primary, "prefix table");
        Ok(DatasetPrefixes::new(TupleTable::new("prefixes", tuple_indexes)?, nodes))
    }

    fn make_tuple_indexes(
        &self,
        primary: &str,
        orders: &[String],
        filenames: &[String],
    ) -> Result<Vec<TupleIndex>> {
        if primary.len() != 3 && primary.len() != 4 {
            return Err(corrupt(format!("bad primary key length: {primary}")));
        }
        let key_len = primary.len() * SIZE_OF_NODE_ID;
        orders
            .iter()
            .zip(filenames)
            .map(|(order, filename)| self.make_tuple_index(primary, order, filename, key_len))
            .collect()
    }

    fn make_tuple_index(
        &self,
        primary: &str,
        order: &str,
        filename: &str,
        key_len: usize,
    ) -> Result<TupleIndex> {
        let fileset = FileSet::new(self.location, filename);
        let mut meta = MetaFile::for_fileset(&fileset)?;
        meta.check_or_set(file::TYPE, file::TYPE_RANGE_INDEX)?;
        meta.check_or_set(file::INDEX_ORDER, order)?;
        let index = self.make_range_index(&fileset, &mut meta, key_len, 0)?;
        meta.flush()?;
        TupleIndex::new(primary, order, index)
    }

    fn make_range_index(
        &self,
        fileset: &FileSet,
        meta: &mut MetaFile,
        key_len: usize,
        value_len: usize,
    ) -> Result<Arc<dyn RangeIndex>> {
        meta.check_or_set(file::TYPE, file::TYPE_RANGE_INDEX)?;
        let kind = meta.get_or_set_default(file::IMPL, IndexImpl::BPlusTree.as_str());
        let index: Arc<dyn RangeIndex> = match IndexImpl::parse(file::IMPL, &kind)? {
            IndexImpl::BPlusTree => {
                meta.check_or_set(file::IMPL_VERSION, file::BPT_VERSION)?;
                Arc::new(self.make_bplustree(fileset, meta, key_len, value_len)?)
            }
        };
        meta.flush()?;
        Ok(index)
    }

    fn make_bplustree(
        &self,
        fileset: &FileSet,
        meta: &mut MetaFile,
        key_len: usize,
        value_len: usize,
    ) -> Result<BPlusTree> {
        let desc = meta.get_or_set_default(file::BPT_RECORD, &format!("{key_len},{value_len}"));
        let factory = parse_record_factory(meta.label(), &desc)?;
        let value = meta.get_or_set_default(file::BPT_BLKSIZE, &self.config.block_size.to_string());
        let block_size = parse_number(meta.label(), file::BPT_BLKSIZE, &value)?;
        let calculated = calc_order(block_size, factory.record_length());
        let value = meta.get_or_set_default(file::BPT_ORDER, &calculated.to_string());
        let order = parse_number(meta.label(), file::BPT_ORDER, &value)?;
        let params = BPlusTreeParams::with_order(order, block_size, factory).map_err(|e| {
            error!(file = meta.label(), "{e}");
            e
        })?;
        BPlusTree::open(
            fileset,
            params,
            self.config.block_write_cache_size,
            self.block_cache.clone(),
        )
    }

    fn make_object_file(&self, fileset: &FileSet) -> Result<ObjectFile> {
        let mut meta = MetaFile::for_fileset(fileset)?;
        meta.check_or_set(file::TYPE, file::TYPE_OBJECT)?;
        meta.check_or_set(file::IMPL, NodeTableImpl::Dat.as_str())?;
        meta.check_or_set(file::IMPL_VERSION, file::OBJECT_VERSION)?;
        meta.check_or_set(file::OBJECT_ENCODING, file::ENCODING_NTRIPLES)?;
        let objects = ObjectFile::open(fileset)?;
        meta.flush()?;
        Ok(objects)
    }

    /// Native table, optionally cached, always behind the inline layer
    fn make_node_table(
        &self,
        node2id: &str,
        id2node: &str,
        caches: Option<NodeCacheSizes>,
    ) -> Result<Arc<dyn NodeTable>> {
        let index_fs = FileSet::new(self.location, node2id);
        let mut meta = MetaFile::for_fileset(&index_fs)?;
        let index = self.make_range_index(&index_fs, &mut meta, LEN_NODE_HASH, SIZE_OF_NODE_ID)?;
        let objects = self.make_object_file(&FileSet::new(self.location, id2node))?;
        let native: Arc<dyn NodeTable> = Arc::new(NodeTableNative::new(
            format!("{}/{id2node}", self.location),
            index,
            objects,
        )?);
        let table = match caches {
            Some(c) => Arc::new(NodeTableCache::new(native, c.node_to_id, c.id_to_node, c.miss)),
            None => native,
        };
        Ok(Arc::new(NodeTableInline::new(table)))
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number(label: &str, key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| corrupt(format!("{label}: {key}: bad number '{value}'")))
}

/// Record a structural constant, or fail if a different one is recorded
fn check_version(meta: &mut MetaFile, key: &str, expected: usize) -> Result<()> {
    let expected = expected.to_string();
    match meta.get(key) {
        None => {
            meta.set(key, &expected);
            Ok(())
        }
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(incompatible(key, &expected, found)),
    }
}

fn incompatible(key: &str, expected: &str, found: &str) -> TdbError {
    error!(key, expected, found, "incompatible dataset metadata");
    TdbError::IncompatibleVersion {
        key: key.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn corrupt(msg: String) -> TdbError {
    error!("{msg}");
    TdbError::CorruptLayout(msg)
}
