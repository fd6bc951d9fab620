//! Open datasets by location

use super::dataset::DatasetGraphTdb;
use crate::base::location::Location;
use crate::config::SystemConfig;
use crate::error::Result;
use crate::setup::DatasetBuilder;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Caller-owned cache of open datasets
///
/// Opening a location that is already open returns the same dataset.
/// Anonymous in-memory locations are built fresh every time.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    builder: DatasetBuilder,
    open: Mutex<HashMap<Location, Arc<DatasetGraphTdb>>>,
}

impl DatasetRegistry {
    /// Registry building datasets with `config`
    pub fn new(config: SystemConfig) -> Self {
        Self {
            builder: DatasetBuilder::new(config),
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Configuration used for new datasets
    pub fn config(&self) -> &SystemConfig {
        self.builder.config()
    }

    /// Dataset at `location`, opening it if needed
    pub fn open(&self, location: &Location) -> Result<Arc<DatasetGraphTdb>> {
        if !location.is_shareable() {
            return Ok(Arc::new(self.builder.build(location)?));
        }
        let mut open = self.open.lock();
        if let Some(ds) = open.get(location) {
            if !ds.is_closed() {
                debug!(%location, "reusing open dataset");
                return Ok(ds.clone());
            }
        }
        let ds = Arc::new(self.builder.build(location)?);
        open.insert(location.clone(), ds.clone());
        Ok(ds)
    }

    /// Close and forget the dataset at `location`; false if it was not open
    pub fn close(&self, location: &Location) -> Result<bool> {
        let removed = self.open.lock().remove(location);
        match removed {
            Some(ds) => {
                ds.close()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close every open dataset, reporting the first failure
    pub fn close_all(&self) -> Result<()> {
        let all: Vec<_> = self.open.lock().drain().collect();
        let mut first = None;
        for (location, ds) in all {
            if let Err(e) = ds.close() {
                warn!(%location, "close failed: {e}");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Whether a dataset is open at `location`
    pub fn is_open(&self, location: &Location) -> bool {
        self.open
            .lock()
            .get(location)
            .is_some_and(|ds| !ds.is_closed())
    }

    /// Number of cached datasets
    pub fn len(&self) -> usize {
        self.open.lock().len()
    }

    /// Whether no dataset is cached
    pub fn is_empty(&self) -> bool {
        self.open.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Node;
    use tempfile::TempDir;

    #[test]
    fn test_same_location_shared() -> Result<()> {
        let dir = TempDir::new()?;
        let registry = DatasetRegistry::new(SystemConfig::small());
        let location = Location::dir(dir.path());
        let a = registry.open(&location)?;
        let b = registry.open(&location)?;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.is_open(&location));

        assert!(registry.close(&location)?);
        assert!(a.is_closed());
        assert!(!registry.is_open(&location));
        assert!(!registry.close(&location)?);

        let c = registry.open(&location)?;
        assert!(!Arc::ptr_eq(&a, &c));
        Ok(())
    }

    #[test]
    fn test_anonymous_mem_not_cached() -> Result<()> {
        let registry = DatasetRegistry::new(SystemConfig::small());
        let location = Location::mem();
        let a = registry.open(&location)?;
        a.id_for(&Node::iri("http://example/x"))?;
        assert!(!registry.is_open(&location));
        assert!(registry.is_empty());
        Ok(())
    }

    #[test]
    fn test_named_mem_shared_until_closed() -> Result<()> {
        let registry = DatasetRegistry::new(SystemConfig::small());
        let location = Location::named_mem("shared");
        let a = registry.open(&location)?;
        let id = a.id_for(&Node::iri("http://example/x"))?;
        let b = registry.open(&location)?;
        assert_eq!(b.lookup_id(&Node::iri("http://example/x"))?, Some(id));
        registry.close_all()?;
        assert!(a.is_closed());
        assert_eq!(registry.len(), 0);
        Ok(())
    }
}
