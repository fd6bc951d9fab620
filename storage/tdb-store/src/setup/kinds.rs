//! Closed sets of layouts and implementations recorded in metadata

use crate::error::{Result, TdbError};
use std::fmt;

/// Layout version of a location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVersion {
    V1,
}

impl LayoutVersion {
    /// Metadata value
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutVersion::V1 => "v1",
        }
    }

    /// Parse the `tdb.layout` value
    pub fn parse(key: &str, value: &str) -> Result<Self> {
        match value {
            "v1" => Ok(LayoutVersion::V1),
            other => Err(TdbError::IncompatibleVersion {
                key: key.to_string(),
                expected: LayoutVersion::V1.as_str().to_string(),
                found: other.to_string(),
            }),
        }
    }
}

/// Range index implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexImpl {
    BPlusTree,
}

impl IndexImpl {
    /// Metadata value
    pub fn as_str(self) -> &'static str {
        match self {
            IndexImpl::BPlusTree => "bplustree",
        }
    }

    /// Parse a `tdb.file.impl` value
    pub fn parse(key: &str, value: &str) -> Result<Self> {
        match value {
            "bplustree" => Ok(IndexImpl::BPlusTree),
            other => Err(unsupported(key, other)),
        }
    }
}

/// Node table implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTableImpl {
    /// Hash index plus object file
    Dat,
}

impl NodeTableImpl {
    /// Metadata value
    pub fn as_str(self) -> &'static str {
        match self {
            NodeTableImpl::Dat => "dat",
        }
    }

    /// Parse a node table type value
    pub fn parse(key: &str, value: &str) -> Result<Self> {
        match value {
            "dat" => Ok(NodeTableImpl::Dat),
            other => Err(unsupported(key, other)),
        }
    }
}

fn unsupported(key: &str, value: &str) -> TdbError {
    TdbError::UnsupportedImplementation {
        key: key.to_string(),
        value: value.to_string(),
    }
}

impl fmt::Display for LayoutVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for IndexImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for NodeTableImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
