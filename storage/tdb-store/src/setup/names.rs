//! File names and metadata keys of the on-disk layout

/// Location metadata file
pub const LOCATION_META: &str = "this.info";

/// Primary triple index file; its presence marks a location created before metadata files
pub const LEGACY_MARKER: &str = "SPO.idn";

pub const PRIMARY_INDEX_TRIPLES: &str = "SPO";
pub const TRIPLE_INDEXES: [&str; 3] = ["SPO", "POS", "OSP"];
pub const PRIMARY_INDEX_QUADS: &str = "GSPO";
pub const QUAD_INDEXES: [&str; 6] = ["GSPO", "GPOS", "GOSP", "SPOG", "POSG", "OSPG"];
pub const PRIMARY_INDEX_PREFIX: &str = "GPU";
pub const PREFIX_INDEXES: [&str; 1] = ["GPU"];

pub const INDEX_NODE2ID: &str = "node2id";
pub const INDEX_ID2NODE: &str = "nodes";
pub const INDEX_PREFIX: &str = "prefixIdx";
pub const PREFIX_NODE2ID: &str = "prefix2id";
pub const PREFIX_ID2NODE: &str = "prefixes";

/// Statistics for the pattern reorderer
pub const OPT_STATS: &str = "stats.opt";
/// Fixed pattern reordering
pub const OPT_FIXED: &str = "fixed.opt";
/// No pattern reordering
pub const OPT_NONE: &str = "none.opt";

/// Location metadata keys
pub mod location {
    pub const CREATE_VERSION: &str = "tdb.create.version";
    pub const CREATED: &str = "tdb.created";
    pub const LAYOUT: &str = "tdb.layout";
    pub const TYPE: &str = "tdb.type";
    pub const NODEID_SIZE: &str = "tdb.nodeid.size";
    pub const NODE_HASHSIZE: &str = "tdb.node.hashsize";
    pub const RECORD_TRIPLE: &str = "tdb.record.triple";
    pub const RECORD_QUAD: &str = "tdb.record.quad";
    pub const TRIPLES_PRIMARY: &str = "tdb.indexes.triples.primary";
    pub const TRIPLES: &str = "tdb.indexes.triples";
    pub const QUADS_PRIMARY: &str = "tdb.indexes.quads.primary";
    pub const QUADS: &str = "tdb.indexes.quads";
    pub const NODE2ID: &str = "tdb.nodetable.mapping.node2id";
    pub const ID2NODE: &str = "tdb.nodetable.mapping.id2node";
    pub const NODETABLE_TYPE: &str = "tdb.nodetable.type";
    pub const NODETABLE_LAYOUT: &str = "tdb.nodetable.layout";
    pub const PREFIX_INDEX_FILE: &str = "tdb.prefixes.index.file";
    pub const PREFIX_PRIMARY: &str = "tdb.prefixes.primary";
    pub const PREFIX_INDEXES: &str = "tdb.prefixes.indexes";
    pub const PREFIX_NODE2ID: &str = "tdb.prefixes.nodetable.mapping.node2id";
    pub const PREFIX_ID2NODE: &str = "tdb.prefixes.nodetable.mapping.id2node";

    pub const TYPE_STANDALONE: &str = "standalone";
    pub const NODETABLE_LAYOUT_V1: &str = "1";
}

/// File set metadata keys
pub mod file {
    pub const TYPE: &str = "tdb.file.type";
    pub const IMPL: &str = "tdb.file.impl";
    pub const IMPL_VERSION: &str = "tdb.file.impl.version";
    pub const INDEX_ORDER: &str = "tdb.file.indexorder";
    pub const BPT_RECORD: &str = "tdb.bplustree.record";
    pub const BPT_BLKSIZE: &str = "tdb.bplustree.blksize";
    pub const BPT_ORDER: &str = "tdb.bplustree.order";
    pub const OBJECT_ENCODING: &str = "tdb.object.encoding";

    pub const TYPE_RANGE_INDEX: &str = "rangeindex";
    pub const TYPE_OBJECT: &str = "object";
    pub const BPT_VERSION: &str = "bplustree-v1";
    pub const OBJECT_VERSION: &str = "dat-v1";
    pub const ENCODING_NTRIPLES: &str = "ntriples";
}
