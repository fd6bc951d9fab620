//! Range indexes and the tuple indexes layered over them
//!
//! [`RangeIndex`] is the generic ordered store of fixed-length records; the
//! B+Tree is its one implementation. A [`TupleIndex`] permutes tuples of
//! [`NodeId`]s into one column order before storing them as keys, and a
//! [`TupleTable`] keeps several column orders of one table in step.

pub mod column_map;
pub mod tuple_index;
pub mod tuple_table;

pub use column_map::ColumnMap;
pub use tuple_index::TupleIndex;
pub use tuple_table::TupleTable;

use crate::base::record::{Record, RecordFactory};
use crate::dictionary::NodeId;
use crate::error::Result;
use std::fmt::Debug;

/// Lazy sequence of records in ascending key order
pub type RecordIter = Box<dyn Iterator<Item = Result<Record>> + Send>;

/// A tuple of node ids in a table's primary column order
pub type Tuple = Vec<NodeId>;

/// Lazy sequence of tuples
pub type TupleIter = Box<dyn Iterator<Item = Result<Tuple>> + Send>;

/// Ordered persistent index over fixed-length records
pub trait RangeIndex: Send + Sync + Debug {
    /// Shape of the records stored
    fn record_factory(&self) -> RecordFactory;

    /// Record with the same key, if present
    fn find(&self, key: &Record) -> Result<Option<Record>>;

    /// Whether a record with this key is present
    fn contains(&self, key: &Record) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Insert or replace; false when an identical record was already present
    fn insert(&self, record: Record) -> Result<bool>;

    /// Remove by key; false when absent
    fn delete(&self, key: &Record) -> Result<bool>;

    /// Records with keys in `[from, to)`; `None` leaves that end open
    fn iter(&self, from: Option<&Record>, to: Option<&Record>) -> Result<RecordIter>;

    /// Number of records (a full scan)
    fn count(&self) -> Result<u64>;

    /// Whether there are no records
    fn is_empty(&self) -> Result<bool>;

    /// Write back and sync to stable storage
    fn sync(&self) -> Result<()>;

    /// Sync and release; later calls fail with `Closed`
    fn close(&self) -> Result<()>;
}
