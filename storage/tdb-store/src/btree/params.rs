//! B+Tree structural parameters

use crate::base::record::RecordFactory;
use crate::error::{Result, TdbError};
use crate::sys::SIZE_OF_POINTER;

/// Bytes of header at the start of every node block: count (u16), flags (u8), reserved (u8)
pub const NODE_HEADER_SIZE: usize = 4;

/// Bytes of header at the start of every leaf block: count (u16), reserved (u16), next leaf (u32)
pub const LEAF_HEADER_SIZE: usize = 8;

/// Order of a B+Tree whose blocks hold `2*order - 1` records and `2*order` pointers
///
/// `NODE_HEADER_SIZE + (2N-1)*record_length + 2N*SIZE_OF_POINTER <= block_size`
pub fn calc_order(block_size: usize, record_length: usize) -> usize {
    (block_size + record_length).saturating_sub(NODE_HEADER_SIZE)
        / (2 * (record_length + SIZE_OF_POINTER))
}

/// Smallest block size for a given order and record length
pub fn calc_block_size(order: usize, record_length: usize) -> usize {
    NODE_HEADER_SIZE + (2 * order - 1) * record_length + 2 * order * SIZE_OF_POINTER
}

/// Parameters of one B+Tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BPlusTreeParams {
    order: usize,
    block_size: usize,
    record_factory: RecordFactory,
}

impl BPlusTreeParams {
    /// Parameters for a block size, computing the order
    pub fn new(block_size: usize, record_factory: RecordFactory) -> Result<Self> {
        let order = calc_order(block_size, record_factory.record_length());
        Self::with_order(order, block_size, record_factory)
    }

    /// Parameters for an explicit order, which must match the block size
    pub fn with_order(order: usize, block_size: usize, record_factory: RecordFactory) -> Result<Self> {
        let calculated = calc_order(block_size, record_factory.record_length());
        if order != calculated {
            return Err(TdbError::CorruptLayout(format!(
                "wrong B+Tree order ({order}), calculated = {calculated}"
            )));
        }
        if order < 2 {
            return Err(TdbError::InvalidConfiguration(format!(
                "block size {block_size} too small for records of {} bytes",
                record_factory.record_length()
            )));
        }
        let params = Self {
            order,
            block_size,
            record_factory,
        };
        if params.max_leaf_records() < 3 {
            return Err(TdbError::InvalidConfiguration(format!(
                "block size {block_size} holds fewer than 3 records of {} bytes",
                record_factory.record_length()
            )));
        }
        Ok(params)
    }

    /// Tree order
    pub fn order(&self) -> usize {
        self.order
    }

    /// Block size in bytes
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Factory for leaf records
    pub fn record_factory(&self) -> RecordFactory {
        self.record_factory
    }

    /// Factory for separator keys inside nodes
    pub fn key_factory(&self) -> RecordFactory {
        self.record_factory.key_factory()
    }

    /// Keys an internal node may hold
    pub fn max_node_keys(&self) -> usize {
        2 * self.order - 1
    }

    /// Keys a non-root internal node must hold
    pub fn min_node_keys(&self) -> usize {
        self.order - 1
    }

    /// Records a leaf block can hold
    pub fn max_leaf_records(&self) -> usize {
        (self.block_size - LEAF_HEADER_SIZE) / self.record_factory.record_length()
    }

    /// Records a leaf other than the only leaf must hold
    pub fn min_leaf_records(&self) -> usize {
        self.max_leaf_records() / 2
    }
}
