//! Fixed system constants
//!
//! These values are part of the on-disk format. Changing any of them makes
//! existing locations unreadable, which the setup code detects by comparing
//! against what each location recorded when it was created.

/// Bytes in a NodeId
pub const SIZE_OF_NODE_ID: usize = 8;

/// Bytes of term hash used as the node-table key
pub const LEN_NODE_HASH: usize = 16;

/// Record length of a triple index (3 NodeIds, no value)
pub const LEN_INDEX_TRIPLE_RECORD: usize = 3 * SIZE_OF_NODE_ID;

/// Record length of a quad index (4 NodeIds, no value)
pub const LEN_INDEX_QUAD_RECORD: usize = 4 * SIZE_OF_NODE_ID;

/// Bytes of a block pointer inside a B+Tree node block
pub const SIZE_OF_POINTER: usize = 4;

/// Default block size for new indexes
pub const BLOCK_SIZE: usize = 8192;

/// Smallest block size that still yields a usable B+Tree for 32-byte records
pub const MIN_BLOCK_SIZE: usize = 128;

/// Version string written into new locations
pub const TDB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version tag backfilled into locations created before metadata existed
pub const LEGACY_VERSION: &str = "0.8";
