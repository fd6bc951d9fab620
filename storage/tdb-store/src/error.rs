//! Error types for the TDB storage engine

use crate::dictionary::NodeId;
use thiserror::Error;

/// TDB error type
#[derive(Error, Debug)]
pub enum TdbError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted structural metadata disagrees with the recomputed value,
    /// or an on-disk structure cannot be decoded.
    #[error("Corrupt layout: {0}")]
    CorruptLayout(String),

    /// Persisted layout was written by an incompatible version
    #[error("Incompatible version: {key} expected '{expected}', found '{found}'")]
    IncompatibleVersion {
        /// Metadata key that was checked
        key: String,
        /// Value this build understands
        expected: String,
        /// Value found in the metadata
        found: String,
    },

    /// Metadata names an implementation this build does not provide
    #[error("Unsupported implementation for {key}: '{value}'")]
    UnsupportedImplementation {
        /// Metadata key
        key: String,
        /// Unrecognised value
        value: String,
    },

    /// Lookup of a NodeId that was never allocated
    #[error("Unknown node id: {0}")]
    UnknownNodeId(NodeId),

    /// Two distinct terms hash to the same node-table key
    #[error("Node hash collision: {node} collides with stored {existing}")]
    HashCollision {
        /// Term already stored under the hash
        existing: String,
        /// Term being looked up or inserted
        node: String,
    },

    /// Reader/writer accounting detected an illegal overlap
    #[error("Concurrent access violation: {0}")]
    ConcurrentAccessViolation(String),

    /// An iterator was used after the dataset was modified
    #[error("Concurrent modification: iterator epoch {expected}, dataset epoch {found}")]
    ConcurrentModification {
        /// Epoch captured when the iterator was created
        expected: u64,
        /// Epoch observed on the pull that failed
        found: u64,
    },

    /// The indexes of one tuple table disagree
    #[error("Inconsistent indexes in {index}: {detail}")]
    InconsistentIndexes {
        /// Index that disagreed with the primary
        index: String,
        /// What was observed
        detail: String,
    },

    /// Record does not match its factory's lengths
    #[error("Invalid record: expected {expected} bytes, got {got}")]
    InvalidRecord {
        /// Expected byte length
        expected: usize,
        /// Actual byte length
        got: usize,
    },

    /// A term has no canonical encoding, or stored bytes do not decode
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Operation on a closed dataset or component
    #[error("{0} is closed")]
    Closed(String),
}

impl TdbError {
    /// Whether the dataset must be considered unusable after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TdbError::CorruptLayout(_)
                | TdbError::IncompatibleVersion { .. }
                | TdbError::UnsupportedImplementation { .. }
                | TdbError::HashCollision { .. }
                | TdbError::InconsistentIndexes { .. }
        )
    }
}

/// Result type for TDB operations
pub type Result<T> = std::result::Result<T, TdbError>;

/// Run every step even after a failure, returning the first error
pub(crate) fn first_error(steps: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    steps.into_iter().fold(Ok(()), |first, step| first.and(step))
}
