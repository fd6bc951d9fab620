//! Fixed-size block storage with a location-wide read cache
//!
//! Every B+Tree file is a sequence of equal-sized blocks addressed by
//! [`BlockId`]. Writes are held back in a per-file dirty map and written out
//! when it grows past the configured size or on [`BlockMgr::sync`]. Reads
//! check the dirty map, then the [`BlockCache`] shared by all files of a
//! location, then the file itself.

use super::location::FileSet;
use crate::error::{Result, TdbError};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Block identifier within one file
pub type BlockId = u32;

/// Shared immutable block contents
pub type BlockData = Arc<[u8]>;

/// Read cache shared by every block file of one location
pub struct BlockCache {
    entries: Option<Mutex<LruCache<(u32, BlockId), BlockData>>>,
    next_file: AtomicU32,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BlockCache {
    /// A cache holding up to `capacity` blocks (0 disables caching)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|n| Mutex::new(LruCache::new(n))),
            next_file: AtomicU32::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn register_file(&self) -> u32 {
        self.next_file.fetch_add(1, Ordering::Relaxed)
    }

    fn get(&self, file: u32, id: BlockId) -> Option<BlockData> {
        let entries = self.entries.as_ref()?;
        let found = entries.lock().get(&(file, id)).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    fn put(&self, file: u32, id: BlockId, data: BlockData) {
        if let Some(entries) = &self.entries {
            entries.lock().put((file, id), data);
        }
    }

    fn invalidate(&self, file: u32, id: BlockId) {
        if let Some(entries) = &self.entries {
            entries.lock().pop(&(file, id));
        }
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(0)
    }
}

enum Storage {
    File { path: PathBuf, file: File },
    Mem { blocks: Vec<BlockData> },
}

struct Inner {
    storage: Storage,
    /// Blocks allocated, whether or not written to the file yet
    num_blocks: u32,
    dirty: HashMap<BlockId, BlockData>,
    free: Vec<BlockId>,
    closed: bool,
}

/// Manager of one block file
pub struct BlockMgr {
    label: String,
    block_size: usize,
    file_key: u32,
    write_cache_size: usize,
    cache: Arc<BlockCache>,
    inner: Mutex<Inner>,
}

impl BlockMgr {
    /// Open the `<basename>.<ext>` block file of a file set
    pub fn open(
        fileset: &FileSet,
        ext: &str,
        block_size: usize,
        write_cache_size: usize,
        cache: Arc<BlockCache>,
    ) -> Result<Self> {
        let label = format!("{}.{}", fileset, ext);
        let (storage, num_blocks) = match fileset.path(ext) {
            None => (Storage::Mem { blocks: Vec::new() }, 0),
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)?;
                let len = file.metadata()?.len();
                if len % block_size as u64 != 0 {
                    return Err(TdbError::CorruptLayout(format!(
                        "{label}: file length {len} is not a multiple of block size {block_size}"
                    )));
                }
                let blocks = u32::try_from(len / block_size as u64).map_err(|_| {
                    TdbError::CorruptLayout(format!("{label}: too many blocks"))
                })?;
                (Storage::File { path, file }, blocks)
            }
        };
        debug!(file = %label, blocks = num_blocks, block_size, "opened block file");
        Ok(Self {
            label,
            block_size,
            file_key: cache.register_file(),
            write_cache_size,
            cache,
            inner: Mutex::new(Inner {
                storage,
                num_blocks,
                dirty: HashMap::new(),
                free: Vec::new(),
                closed: false,
            }),
        })
    }

    /// Block size in bytes
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of allocated blocks
    pub fn num_blocks(&self) -> u32 {
        self.inner.lock().num_blocks
    }

    /// Whether no block was ever allocated
    pub fn is_empty(&self) -> bool {
        self.num_blocks() == 0
    }

    /// Allocate a block, reusing released blocks first
    pub fn allocate(&self) -> Result<BlockId> {
        let mut inner = self.inner.lock();
        self.check_open(&inner)?;
        if let Some(id) = inner.free.pop() {
            return Ok(id);
        }
        let id = inner.num_blocks;
        inner.num_blocks = id
            .checked_add(1)
            .ok_or_else(|| TdbError::CorruptLayout(format!("{}: block space exhausted", self.label)))?;
        if let Storage::Mem { blocks } = &mut inner.storage {
            blocks.push(Arc::from(vec![0u8; self.block_size]));
        }
        Ok(id)
    }

    /// Return a block to the free list for reuse in this session
    pub fn release(&self, id: BlockId) -> Result<()> {
        let mut inner = self.inner.lock();
        self.check_open(&inner)?;
        self.check_range(&inner, id)?;
        inner.free.push(id);
        Ok(())
    }

    /// Read a block
    pub fn read(&self, id: BlockId) -> Result<BlockData> {
        let mut inner = self.inner.lock();
        self.check_open(&inner)?;
        self.check_range(&inner, id)?;
        if let Some(data) = inner.dirty.get(&id) {
            return Ok(data.clone());
        }
        let block_size = self.block_size;
        match &mut inner.storage {
            Storage::Mem { blocks } => Ok(blocks[id as usize].clone()),
            Storage::File { file, .. } => {
                if let Some(data) = self.cache.get(self.file_key, id) {
                    return Ok(data);
                }
                trace!(file = %self.label, block = id, "block read");
                let mut buf = vec![0u8; block_size];
                let offset = u64::from(id) * block_size as u64;
                if offset < file.metadata()?.len() {
                    file.seek(SeekFrom::Start(offset))?;
                    file.read_exact(&mut buf)?;
                }
                let data: BlockData = Arc::from(buf);
                self.cache.put(self.file_key, id, data.clone());
                Ok(data)
            }
        }
    }

    /// Write a whole block
    pub fn write(&self, id: BlockId, data: Vec<u8>) -> Result<()> {
        if data.len() != self.block_size {
            return Err(TdbError::InvalidInput(format!(
                "{}: block of {} bytes, expected {}",
                self.label,
                data.len(),
                self.block_size
            )));
        }
        let mut inner = self.inner.lock();
        self.check_open(&inner)?;
        self.check_range(&inner, id)?;
        let data: BlockData = Arc::from(data);
        if let Storage::Mem { blocks } = &mut inner.storage {
            blocks[id as usize] = data;
            return Ok(());
        }
        self.cache.invalidate(self.file_key, id);
        inner.dirty.insert(id, data);
        if inner.dirty.len() > self.write_cache_size {
            self.write_back(&mut inner)?;
        }
        Ok(())
    }

    /// Write back dirty blocks and sync the file
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        self.write_back(&mut inner)?;
        if let Storage::File { file, .. } = &mut inner.storage {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Sync and refuse further use
    pub fn close(&self) -> Result<()> {
        self.sync()?;
        self.inner.lock().closed = true;
        Ok(())
    }

    fn write_back(&self, inner: &mut Inner) -> Result<()> {
        if inner.dirty.is_empty() {
            return Ok(());
        }
        let mut ids: Vec<BlockId> = inner.dirty.keys().copied().collect();
        ids.sort_unstable();
        if let Storage::File { file, path } = &mut inner.storage {
            debug!(file = %path.display(), blocks = ids.len(), "writing back dirty blocks");
            for id in &ids {
                let data = &inner.dirty[id];
                file.seek(SeekFrom::Start(u64::from(*id) * self.block_size as u64))?;
                file.write_all(data)?;
                self.cache.put(self.file_key, *id, data.clone());
            }
            file.flush()?;
        }
        inner.dirty.clear();
        Ok(())
    }

    fn check_open(&self, inner: &Inner) -> Result<()> {
        if inner.closed {
            return Err(TdbError::Closed(self.label.clone()));
        }
        Ok(())
    }

    fn check_range(&self, inner: &Inner, id: BlockId) -> Result<()> {
        if id >= inner.num_blocks {
            return Err(TdbError::CorruptLayout(format!(
                "{}: block {id} out of range ({} blocks)",
                self.label, inner.num_blocks
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlockMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockMgr")
            .field("file", &self.label)
            .field("block_size", &self.block_size)
            .field("num_blocks", &self.num_blocks())
            .finish()
    }
}
