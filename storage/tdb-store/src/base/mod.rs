//! Storage primitives shared by every index and table
//!
//! - [`location`]: where a dataset lives and how its files are named
//! - [`properties`] and [`metafile`]: persisted key/value metadata
//! - [`record`]: fixed-length key/value records
//! - [`block`]: block files with a shared read cache
//! - [`object_file`]: append-only length-prefixed objects

pub mod block;
pub mod location;
pub mod metafile;
pub mod object_file;
pub mod properties;
pub mod record;

pub use block::{BlockCache, BlockId, BlockMgr};
pub use location::{FileSet, Location};
pub use metafile::MetaFile;
pub use object_file::ObjectFile;
pub use properties::Properties;
pub use record::{Record, RecordFactory};
