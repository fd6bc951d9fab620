//! Datasets and their lifecycle

pub mod dataset;
pub mod node_tuple_table;
pub mod prefixes;
pub mod registry;

pub use dataset::{DatasetGraphTdb, IdTupleIter, QuadIter, TripleIter};
pub use node_tuple_table::{NodeTupleIter, NodeTupleTable};
pub use prefixes::{DatasetPrefixes, DEFAULT_GRAPH};
pub use registry::DatasetRegistry;
