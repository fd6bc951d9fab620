//! # TDB Store - Persistent Indexed RDF Triple/Quad Storage
//!
//! A dataset is a set of fixed-width tuples of node ids, stored several times
//! under different column orders in B+Tree range indexes, plus a node table
//! that maps RDF terms to 8-byte ids. Everything about the on-disk layout is
//! recorded in metadata files next to the data and checked on every open.
//!
//! ## Quick Start
//!
//! ```rust
//! use tdb_store::{build_dataset, Location, Node, SystemConfig, Triple};
//!
//! # fn example() -> tdb_store::Result<()> {
//! let ds = build_dataset(&Location::mem(), &SystemConfig::default())?;
//!
//! let alice = Node::iri("http://example.org/alice");
//! let name = Node::iri("http://xmlns.com/foaf/0.1/name");
//! ds.add_triple(&Triple::new(alice.clone(), name, Node::literal("Alice")))?;
//!
//! for triple in ds.find_triples(Some(&alice), None, None)? {
//!     println!("{}", triple?);
//! }
//! ds.close()?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Architecture Overview
//!
//! ### Storage Layer
//! - **[`base`]**: locations, metadata files, records, block files and object files
//! - **[`btree`]**: B+Tree over fixed-length records, the one [`RangeIndex`]
//!
//! ### Index Layer
//! - **[`index`]**: column maps, tuple indexes and tuple tables
//! - **[`dictionary`]**: RDF terms, node ids and the layered node table
//!
//! ### Dataset Layer
//! - **[`setup`]**: metadata-driven assembly of a dataset at a location
//! - **[`store`]**: the dataset, its prefix mappings and the dataset registry
//! - **[`concurrency`]**: multiple-reader/single-writer auditing
//!
//! ## Configuration
//!
//! [`SystemConfig`] sizes caches and picks the block size of new indexes. It
//! is read from the file named by `TDB_SETTINGS` and may be overridden per
//! location by a `tdb.properties` file. It never changes existing data.
//!
//! ## Error Handling
//!
//! Every operation returns [`Result`] with a [`TdbError`]. Layout and version
//! mismatches abort opening a dataset; any other error aborts only the
//! operation that raised it.

pub mod base;
pub mod btree;
pub mod concurrency;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod index;
pub mod setup;
pub mod store;
pub mod sys;

pub use base::location::{FileSet, Location};
pub use btree::{BPlusTree, BPlusTreeParams};
pub use concurrency::{CheckedIter, ConcurrencyPolicy, ReadGuard, WriteGuard};
pub use config::SystemConfig;
pub use dictionary::{Node, NodeId, NodeIdKind, NodeTable, Quad, Triple};
pub use error::{Result, TdbError};
pub use index::{RangeIndex, TupleIndex, TupleTable};
pub use setup::{build_dataset, DatasetBuilder, ReorderChoice};
pub use store::{DatasetGraphTdb, DatasetPrefixes, DatasetRegistry};
