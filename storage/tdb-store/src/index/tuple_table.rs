//! All column orders of one table kept in step

use super::{Tuple, TupleIndex, TupleIter};
use crate::dictionary::NodeId;
use crate::error::{first_error, Result, TdbError};
use tracing::error;

/// A table of fixed-width tuples stored under several column orders
///
/// The first index is the primary. Writes go to the primary first; only when
/// it changes are the other indexes updated, each of which must agree.
#[derive(Debug, Clone)]
pub struct TupleTable {
    name: String,
    indexes: Vec<TupleIndex>,
}

impl TupleTable {
    /// Table over `indexes`, primary first; all must have the same width
    pub fn new(name: impl Into<String>, indexes: Vec<TupleIndex>) -> Result<Self> {
        let name = name.into();
        let Some(width) = indexes.first().map(TupleIndex::column_count) else {
            return Err(TdbError::InvalidConfiguration(format!("{name}: no indexes")));
        };
        if let Some(odd) = indexes.iter().find(|i| i.column_count() != width) {
            return Err(TdbError::InvalidConfiguration(format!(
                "{name}: index {} has {} columns, expected {width}",
                odd.name(),
                odd.column_count()
            )));
        }
        Ok(Self { name, indexes })
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns per tuple
    pub fn width(&self) -> usize {
        self.indexes[0].column_count()
    }

    /// Indexes, primary first
    pub fn indexes(&self) -> &[TupleIndex] {
        &self.indexes
    }

    /// Add a tuple to every index; false if it was already present
    pub fn add(&self, tuple: &[NodeId]) -> Result<bool> {
        let (primary, rest) = self.split();
        if !primary.add(tuple)? {
            return Ok(false);
        }
        for index in rest {
            if !index.add(tuple)? {
                return Err(self.inconsistent(index, tuple, "already present"));
            }
        }
        Ok(true)
    }

    /// Delete a tuple from every index; false if it was absent
    pub fn delete(&self, tuple: &[NodeId]) -> Result<bool> {
        let (primary, rest) = self.split();
        if !primary.delete(tuple)? {
            return Ok(false);
        }
        for index in rest {
            if !index.delete(tuple)? {
                return Err(self.inconsistent(index, tuple, "missing"));
            }
        }
        Ok(true)
    }

    /// Whether the tuple is present
    pub fn contains(&self, tuple: &[NodeId]) -> Result<bool> {
        self.indexes[0].contains(tuple)
    }

    /// Index with the longest bound leading prefix for a pattern (the first on ties)
    pub fn choose_index(&self, pattern: &[Option<NodeId>]) -> &TupleIndex {
        let mut best = &self.indexes[0];
        let mut best_weight = best.weight(pattern);
        for index in &self.indexes[1..] {
            let weight = index.weight(pattern);
            if weight > best_weight {
                best = index;
                best_weight = weight;
            }
        }
        best
    }

    /// Tuples matching a pattern given in primary order
    pub fn find(&self, pattern: &[Option<NodeId>]) -> Result<TupleIter> {
        self.choose_index(pattern).find(pattern)
    }

    /// Every tuple, in primary order
    pub fn all(&self) -> Result<TupleIter> {
        self.indexes[0].all()
    }

    /// Number of tuples
    pub fn count(&self) -> Result<u64> {
        self.indexes[0].count()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> Result<bool> {
        self.indexes[0].is_empty()
    }

    /// Sync every index
    pub fn sync(&self) -> Result<()> {
        self.indexes.iter().try_for_each(TupleIndex::sync)
    }

    /// Close every index
    pub fn close(&self) -> Result<()> {
        first_error(self.indexes.iter().map(TupleIndex::close))
    }

    fn split(&self) -> (&TupleIndex, &[TupleIndex]) {
        (&self.indexes[0], &self.indexes[1..])
    }

    fn inconsistent(&self, index: &TupleIndex, tuple: &[NodeId], detail: &str) -> TdbError {
        let tuple: Tuple = tuple.to_vec();
        error!(table = %self.name, index = index.name(), ?tuple, detail, "tuple indexes disagree");
        TdbError::InconsistentIndexes {
            index: format!("{}/{}", self.name, index.name()),
            detail: format!("{tuple:?} {detail}"),
        }
    }
}
