//! B+Tree range index
//!
//! A block-structured tree of fixed-length [`Record`](crate::base::record::Record)s
//! kept in two block files per file set: internal nodes (`idn`) and leaves
//! (`dat`). Leaves are chained for range scans.

pub mod iter;
pub mod node;
pub mod params;
pub mod tree;

pub use iter::RangeIter;
pub use params::{calc_block_size, calc_order, BPlusTreeParams};
pub use tree::{BPlusTree, EXT_LEAVES, EXT_NODES};
