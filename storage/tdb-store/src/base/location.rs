//! Dataset locations and per-file naming

use crate::error::Result;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ANON_MEM: AtomicU64 = AtomicU64::new(0);

/// Where a dataset lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// A directory on disk
    Dir(PathBuf),
    /// In-memory storage; `shared` locations can be reopened by name
    Mem {
        /// Name of the in-memory location
        name: String,
        /// Whether the registry may hand out the same dataset again
        shared: bool,
    },
}

impl Location {
    /// A directory location
    pub fn dir<P: AsRef<Path>>(path: P) -> Self {
        Location::Dir(path.as_ref().to_path_buf())
    }

    /// A fresh anonymous in-memory location, never shared
    pub fn mem() -> Self {
        let n = NEXT_ANON_MEM.fetch_add(1, Ordering::Relaxed);
        Location::Mem {
            name: format!("anon-{n}"),
            shared: false,
        }
    }

    /// A named in-memory location that the registry reuses while open
    pub fn named_mem<S: Into<String>>(name: S) -> Self {
        Location::Mem {
            name: name.into(),
            shared: true,
        }
    }

    /// Whether this is an in-memory location
    pub fn is_mem(&self) -> bool {
        matches!(self, Location::Mem { .. })
    }

    /// Whether the registry may cache datasets for this location
    pub fn is_shareable(&self) -> bool {
        match self {
            Location::Dir(_) => true,
            Location::Mem { shared, .. } => *shared,
        }
    }

    /// Directory path, if on disk
    pub fn directory(&self) -> Option<&Path> {
        match self {
            Location::Dir(path) => Some(path),
            Location::Mem { .. } => None,
        }
    }

    /// Path of a file in this location (None for memory)
    pub fn path(&self, filename: &str) -> Option<PathBuf> {
        self.directory().map(|dir| dir.join(filename))
    }

    /// Whether the named file exists in this location
    pub fn exists(&self, filename: &str) -> bool {
        self.path(filename).is_some_and(|p| p.exists())
    }

    /// Whether the location holds any files at all
    pub fn exists_any_files(&self) -> Result<bool> {
        match self.directory() {
            Some(dir) if dir.exists() => Ok(std::fs::read_dir(dir)?.next().is_some()),
            _ => Ok(false),
        }
    }

    /// Create the directory if needed
    pub fn ensure_exists(&self) -> Result<()> {
        if let Some(dir) = self.directory() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Dir(path) => write!(f, "{}", path.display()),
            Location::Mem { name, .. } => write!(f, "mem:{name}"),
        }
    }
}

/// A group of files sharing a basename within a location (`SPO.idn`, `SPO.dat`, `SPO.info`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSet {
    location: Location,
    basename: String,
}

impl FileSet {
    /// Create a file set
    pub fn new<S: Into<String>>(location: &Location, basename: S) -> Self {
        Self {
            location: location.clone(),
            basename: basename.into(),
        }
    }

    /// Owning location
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Basename shared by the files
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// File name with the given extension
    pub fn filename(&self, ext: &str) -> String {
        format!("{}.{}", self.basename, ext)
    }

    /// Full path of the file with the given extension (None for memory)
    pub fn path(&self, ext: &str) -> Option<PathBuf> {
        self.location.path(&self.filename(ext))
    }

    /// Whether the file with the given extension exists
    pub fn exists(&self, ext: &str) -> bool {
        self.location.exists(&self.filename(ext))
    }

    /// Whether this file set is in memory
    pub fn is_mem(&self) -> bool {
        self.location.is_mem()
    }
}

impl Display for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location, self.basename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_anonymous_mem_locations_are_distinct() {
        let a = Location::mem();
        let b = Location::mem();
        assert_ne!(a, b);
        assert!(!a.is_shareable());
        assert!(Location::named_mem("x").is_shareable());
        assert_eq!(Location::named_mem("x"), Location::named_mem("x"));
    }

    #[test]
    fn test_fileset_paths() -> Result<()> {
        let dir = TempDir::new()?;
        let loc = Location::dir(dir.path());
        let fs = FileSet::new(&loc, "SPO");
        assert_eq!(fs.filename("idn"), "SPO.idn");
        assert_eq!(fs.path("dat"), Some(dir.path().join("SPO.dat")));
        assert!(!fs.exists("idn"));
        assert!(!loc.exists_any_files()?);
        std::fs::write(dir.path().join("SPO.idn"), b"")?;
        assert!(fs.exists("idn"));
        assert!(loc.exists_any_files()?);
        Ok(())
    }

    #[test]
    fn test_mem_has_no_paths() {
        let fs = FileSet::new(&Location::mem(), "SPO");
        assert!(fs.path("idn").is_none());
        assert!(!fs.exists("idn"));
    }
}
