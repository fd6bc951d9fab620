//! One column order of a tuple table over a shared range index

use super::{ColumnMap, RangeIndex, Tuple, TupleIter};
use crate::base::record::{Record, RecordFactory};
use crate::dictionary::NodeId;
use crate::error::{Result, TdbError};
use crate::sys::SIZE_OF_NODE_ID;
use std::sync::Arc;

/// Tuples of node ids stored as keys in one column order
#[derive(Debug, Clone)]
pub struct TupleIndex {
    name: String,
    column_map: ColumnMap,
    factory: RecordFactory,
    index: Arc<dyn RangeIndex>,
}

impl TupleIndex {
    /// Index over `index` storing tuples of `primary` order as `order`
    pub fn new(primary: &str, order: &str, index: Arc<dyn RangeIndex>) -> Result<Self> {
        let column_map = ColumnMap::new(primary, order)?;
        let factory = index.record_factory();
        let key_len = column_map.len() * SIZE_OF_NODE_ID;
        if factory.key_length() != key_len || factory.has_value() {
            return Err(TdbError::CorruptLayout(format!(
                "index {order}: records of {},{} bytes, expected {key_len},0",
                factory.key_length(),
                factory.value_length()
            )));
        }
        Ok(Self {
            name: order.to_string(),
            column_map,
            factory,
            index,
        })
    }

    /// Column order, e.g. `POS`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns per tuple
    pub fn column_count(&self) -> usize {
        self.column_map.len()
    }

    /// Permutation from primary order
    pub fn column_map(&self) -> &ColumnMap {
        &self.column_map
    }

    /// Underlying range index
    pub fn range_index(&self) -> &Arc<dyn RangeIndex> {
        &self.index
    }

    /// Add a tuple given in primary order; false if already present
    pub fn add(&self, tuple: &[NodeId]) -> Result<bool> {
        let record = self.record(tuple)?;
        self.index.insert(record)
    }

    /// Delete a tuple given in primary order; false if absent
    pub fn delete(&self, tuple: &[NodeId]) -> Result<bool> {
        let record = self.record(tuple)?;
        self.index.delete(&record)
    }

    /// Whether the tuple is present
    pub fn contains(&self, tuple: &[NodeId]) -> Result<bool> {
        let record = self.record(tuple)?;
        self.index.contains(&record)
    }

    /// Number of leading columns of this order a pattern binds
    pub fn weight(&self, pattern: &[Option<NodeId>]) -> usize {
        (0..self.column_count())
            .take_while(|&i| {
                pattern
                    .get(self.column_map.source_of(i))
                    .is_some_and(Option::is_some)
            })
            .count()
    }

    /// Tuples matching a pattern in primary order, ascending in this
    /// index's order. Bound leading columns become a key range; any other
    /// bound column is filtered.
    pub fn find(&self, pattern: &[Option<NodeId>]) -> Result<TupleIter> {
        self.check_width(pattern.len())?;
        let mapped = self.column_map.map(pattern);
        let prefix: Vec<NodeId> = mapped.iter().map_while(|c| *c).collect();

        if prefix.len() == mapped.len() {
            let found = self.index.contains(&self.key(&prefix)?)?;
            let tuple = self.column_map.unmap(&prefix);
            return Ok(Box::new(found.then_some(Ok(tuple)).into_iter()));
        }

        let mut low = Vec::with_capacity(self.factory.key_length());
        for id in &prefix {
            low.extend_from_slice(&id.to_bytes());
        }
        let high = increment(&low);
        low.resize(self.factory.key_length(), 0);
        let from = (!prefix.is_empty()).then(|| self.factory.create_key(&low)).transpose()?;
        let to = match high {
            Some(mut high) if !prefix.is_empty() => {
                high.resize(self.factory.key_length(), 0);
                Some(self.factory.create_key(&high)?)
            }
            _ => None,
        };

        let records = self.index.iter(from.as_ref(), to.as_ref())?;
        let column_map = self.column_map.clone();
        let skip = prefix.len();
        let iter = records.filter_map(move |record| {
            let tuple = match record.and_then(|r| decode_tuple(r.key())) {
                Ok(t) => t,
                Err(e) => return Some(Err(e)),
            };
            let matches = mapped
                .iter()
                .zip(&tuple)
                .skip(skip)
                .all(|(want, got)| want.map_or(true, |w| w == *got));
            matches.then(|| Ok(column_map.unmap(&tuple)))
        });
        Ok(Box::new(iter))
    }

    /// Every tuple, in this index's order
    pub fn all(&self) -> Result<TupleIter> {
        self.find(&vec![None; self.column_count()])
    }

    /// Number of tuples
    pub fn count(&self) -> Result<u64> {
        self.index.count()
    }

    /// Whether the index holds no tuples
    pub fn is_empty(&self) -> Result<bool> {
        self.index.is_empty()
    }

    /// Sync the range index
    pub fn sync(&self) -> Result<()> {
        self.index.sync()
    }

    /// Close the range index
    pub fn close(&self) -> Result<()> {
        self.index.close()
    }

    fn record(&self, tuple: &[NodeId]) -> Result<Record> {
        self.check_width(tuple.len())?;
        self.key(&self.column_map.map(tuple))
    }

    fn key(&self, ordered: &[NodeId]) -> Result<Record> {
        let mut key = Vec::with_capacity(self.factory.key_length());
        for id in ordered {
            key.extend_from_slice(&id.to_bytes());
        }
        self.factory.create_key(&key)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.column_count() {
            return Err(TdbError::InvalidInput(format!(
                "index {}: tuple of width {width}, expected {}",
                self.name,
                self.column_count()
            )));
        }
        Ok(())
    }
}

fn decode_tuple(key: &[u8]) -> Result<Tuple> {
    key.chunks(SIZE_OF_NODE_ID).map(NodeId::from_bytes).collect()
}

/// Smallest byte string of the same length greater than every string with
/// `bytes` as prefix; `None` when `bytes` is all 0xFF
fn increment(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = bytes.to_vec();
    for b in out.iter_mut().rev() {
        if *b == 0xFF {
            *b = 0;
        } else {
            *b += 1;
            return Some(out);
        }
    }
    None
}
