//! Persistent key/value metadata attached to a location or a file set

use super::location::{FileSet, Location};
use super::properties::{self, Properties};
use crate::error::{Result, TdbError};
use std::path::PathBuf;
use tracing::{debug, error};

/// Extension of metadata files
pub const EXT_META: &str = "info";

/// Metadata of one location or file set
///
/// Changes are held in memory until [`MetaFile::flush`]. In-memory locations
/// never touch the file system.
#[derive(Debug)]
pub struct MetaFile {
    label: String,
    path: Option<PathBuf>,
    props: Properties,
    existed: bool,
    dirty: bool,
}

impl MetaFile {
    /// Open (or start) the metadata file `<filename>` in a location
    pub fn open(location: &Location, filename: &str) -> Result<Self> {
        let path = location.path(filename);
        let (props, existed) = match &path {
            Some(p) if p.exists() => (properties::load(p)?, true),
            _ => (Properties::new(), false),
        };
        Ok(Self {
            label: format!("{location}/{filename}"),
            path,
            props,
            existed,
            dirty: false,
        })
    }

    /// Metadata file of a file set (`<basename>.info`)
    pub fn for_fileset(fileset: &FileSet) -> Result<Self> {
        Self::open(fileset.location(), &fileset.filename(EXT_META))
    }

    /// An empty, unattached metadata set
    pub fn mem(label: &str) -> Self {
        Self {
            label: label.to_string(),
            path: None,
            props: Properties::new(),
            existed: false,
            dirty: false,
        }
    }

    /// Whether the file existed when opened
    pub fn exists_metadata(&self) -> bool {
        self.existed
    }

    /// Name used in messages
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get a property
    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Get a property, or a default when absent
    pub fn get_or<'a>(&'a self, key: &str, dft: &'a str) -> &'a str {
        self.get(key).unwrap_or(dft)
    }

    /// Whether the property is present with exactly this value
    pub fn property_equals(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    /// Set a property
    pub fn set(&mut self, key: &str, value: &str) {
        if self.get(key) != Some(value) {
            self.props.insert(key.to_string(), value.to_string());
            self.dirty = true;
        }
    }

    /// Set a property only if absent
    pub fn ensure_property_set(&mut self, key: &str, value: &str) {
        if !self.props.contains_key(key) {
            self.set(key, value);
        }
    }

    /// Get a property, recording the default if it was absent
    pub fn get_or_set_default(&mut self, key: &str, dft: &str) -> String {
        self.ensure_property_set(key, dft);
        self.get(key).unwrap_or(dft).to_string()
    }

    /// Record the expected value, or fail if a different value is recorded
    pub fn check_or_set(&mut self, key: &str, expected: &str) -> Result<()> {
        match self.get(key) {
            None => {
                self.set(key, expected);
                Ok(())
            }
            Some(found) if found == expected => Ok(()),
            Some(found) => {
                let msg = format!(
                    "{}: {key}: expected '{expected}', found '{found}'",
                    self.label
                );
                error!("{msg}");
                Err(TdbError::CorruptLayout(msg))
            }
        }
    }

    /// Read a property that must be present
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            let msg = format!("{}: missing required property {key}", self.label);
            error!("{msg}");
            TdbError::CorruptLayout(msg)
        })
    }

    /// Whether there are unflushed changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All properties
    pub fn properties(&self) -> &Properties {
        &self.props
    }

    /// Write changes out
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = &self.path {
            debug!(file = %path.display(), "writing metadata");
            properties::store(path, &self.props, Some("TDB metadata"))?;
            self.existed = true;
        }
        self.dirty = false;
        Ok(())
    }
}
