//! Process-wide sizing configuration
//!
//! These settings only size in-memory structures and pick the block size of
//! indexes that do not exist yet. They never change the format of data that
//! is already on disk.

use crate::base::properties::{self, Properties};
use crate::error::{Result, TdbError};
use crate::sys;
use serde::de::value::{Error as ValueError, MapDeserializer};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::debug;

/// Environment variable naming a process-wide properties file
pub const SETTINGS_ENV: &str = "TDB_SETTINGS";

/// Per-location properties file
pub const LOCATION_PROPERTIES: &str = "tdb.properties";

/// Property keys
pub mod keys {
    /// Node -> NodeId cache entries
    pub const NODE2ID_CACHE_SIZE: &str = "tdb.cache.node2id.size";
    /// NodeId -> Node cache entries
    pub const ID2NODE_CACHE_SIZE: &str = "tdb.cache.id2node.size";
    /// Negative lookup cache entries
    pub const NODE_MISS_CACHE_SIZE: &str = "tdb.cache.nodemiss.size";
    /// Shared block read cache entries
    pub const BLOCK_READ_CACHE_SIZE: &str = "tdb.cache.blockread.size";
    /// Dirty blocks held per block file before write-back
    pub const BLOCK_WRITE_CACHE_SIZE: &str = "tdb.cache.blockwrite.size";
    /// Block size for newly created indexes
    pub const BLOCK_SIZE: &str = "tdb.block.size";
}

/// Cache sizes and default block size
///
/// Deserializes from a property map keyed by the names in [`keys`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemConfig {
    /// Entries in the Node -> NodeId cache (0 disables)
    #[serde(rename = "tdb.cache.node2id.size", deserialize_with = "number")]
    pub node2id_cache_size: usize,
    /// Entries in the NodeId -> Node cache (0 disables)
    #[serde(rename = "tdb.cache.id2node.size", deserialize_with = "number")]
    pub id2node_cache_size: usize,
    /// Entries in the negative-lookup cache (0 disables)
    #[serde(rename = "tdb.cache.nodemiss.size", deserialize_with = "number")]
    pub node_miss_cache_size: usize,
    /// Entries in the location-wide block read cache (0 disables)
    #[serde(rename = "tdb.cache.blockread.size", deserialize_with = "number")]
    pub block_read_cache_size: usize,
    /// Dirty blocks per file before they are written back (0 = write-through)
    #[serde(rename = "tdb.cache.blockwrite.size", deserialize_with = "number")]
    pub block_write_cache_size: usize,
    /// Block size used when an index is created
    #[serde(rename = "tdb.block.size", deserialize_with = "number")]
    pub block_size: usize,
}

/// Property values are text; numeric fields parse it
fn number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse()
        .map_err(|_| serde::de::Error::custom(format!("not a non-negative integer: {text}")))
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            node2id_cache_size: 100_000,
            id2node_cache_size: 100_000,
            node_miss_cache_size: 100,
            block_read_cache_size: 10_000,
            block_write_cache_size: 2_000,
            block_size: sys::BLOCK_SIZE,
        }
    }
}

impl SystemConfig {
    /// Defaults overridden by the file named in `TDB_SETTINGS`, if set
    pub fn load() -> Result<Self> {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) => {
                debug!(path = ?path, "loading system settings");
                Self::default().with_properties_file(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }

    /// Small caches and blocks, for tests and throwaway in-memory datasets
    pub fn small() -> Self {
        Self {
            node2id_cache_size: 64,
            id2node_cache_size: 64,
            node_miss_cache_size: 16,
            block_read_cache_size: 32,
            block_write_cache_size: 0,
            block_size: 512,
        }
    }

    /// Apply overrides from a properties file
    pub fn with_properties_file(self, path: &Path) -> Result<Self> {
        let props = properties::load(path)?;
        self.with_properties(&props)
    }

    /// Apply overrides from a property map; absent keys keep their value
    /// and unrelated keys are ignored
    pub fn with_properties(self, props: &Properties) -> Result<Self> {
        let mut merged = self.to_properties();
        merged.extend(props.iter().map(|(key, value)| (key.clone(), value.clone())));
        let config = Self::from_properties(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize a complete property map
    pub fn from_properties(props: Properties) -> Result<Self> {
        let map = MapDeserializer::<_, ValueError>::new(props.into_iter());
        Self::deserialize(map).map_err(|e| TdbError::InvalidConfiguration(e.to_string()))
    }

    /// Check the values are usable
    pub fn validate(&self) -> Result<()> {
        if self.block_size < sys::MIN_BLOCK_SIZE {
            return Err(TdbError::InvalidConfiguration(format!(
                "block size {} is below the minimum {}",
                self.block_size,
                sys::MIN_BLOCK_SIZE
            )));
        }
        Ok(())
    }

    /// Render as properties (what a settings file would contain)
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(keys::NODE2ID_CACHE_SIZE.into(), self.node2id_cache_size.to_string());
        props.insert(keys::ID2NODE_CACHE_SIZE.into(), self.id2node_cache_size.to_string());
        props.insert(keys::NODE_MISS_CACHE_SIZE.into(), self.node_miss_cache_size.to_string());
        props.insert(keys::BLOCK_READ_CACHE_SIZE.into(), self.block_read_cache_size.to_string());
        props.insert(keys::BLOCK_WRITE_CACHE_SIZE.into(), self.block_write_cache_size.to_string());
        props.insert(keys::BLOCK_SIZE.into(), self.block_size.to_string());
        props
    }
}
