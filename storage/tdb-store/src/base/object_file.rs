//! Append-only object file addressed by byte offset
//!
//! Each entry is `len:u32 | crc32:u32 | bytes`, big-endian. The offset of an
//! entry's first byte is its address. Appends are buffered until
//! [`ObjectFile::sync`] or until the buffer grows past a threshold.

use super::location::FileSet;
use crate::error::{Result, TdbError};
use bytes::{Buf, BufMut};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Extension of object data files
pub const EXT_OBJECT: &str = "dat";

const ENTRY_HEADER: usize = 8;
const WRITE_BUFFER_LIMIT: usize = 64 * 1024;

enum Storage {
    File { file: File, file_len: u64, pending: Vec<u8> },
    Mem { bytes: Vec<u8> },
}

impl Storage {
    fn len(&self) -> u64 {
        match self {
            Storage::File { file_len, pending, .. } => file_len + pending.len() as u64,
            Storage::Mem { bytes } => bytes.len() as u64,
        }
    }

    /// Whether `len` bytes at `offset` lie wholly in the file or wholly pending
    fn contiguous(&self, offset: u64, len: u64) -> bool {
        match self {
            Storage::File { file_len, .. } => offset >= *file_len || offset + len <= *file_len,
            Storage::Mem { .. } => true,
        }
    }
}

struct Inner {
    storage: Storage,
    closed: bool,
}

/// Append-only store of byte strings
pub struct ObjectFile {
    label: String,
    inner: Mutex<Inner>,
}

impl ObjectFile {
    /// Open the `<basename>.dat` object file of a file set
    pub fn open(fileset: &FileSet) -> Result<Self> {
        let label = format!("{}.{}", fileset, EXT_OBJECT);
        let storage = match fileset.path(EXT_OBJECT) {
            None => Storage::Mem { bytes: Vec::new() },
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
                let file_len = file.metadata()?.len();
                Storage::File {
                    file,
                    file_len,
                    pending: Vec::new(),
                }
            }
        };
        debug!(file = %label, len = storage.len(), "opened object file");
        Ok(Self {
            label,
            inner: Mutex::new(Inner {
                storage,
                closed: false,
            }),
        })
    }

    /// Append bytes, returning the offset they are stored at
    pub fn write(&self, bytes: &[u8]) -> Result<u64> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| TdbError::InvalidInput(format!("object of {} bytes too large", bytes.len())))?;
        let mut entry = Vec::with_capacity(ENTRY_HEADER + bytes.len());
        entry.put_u32(len);
        entry.put_u32(crc32fast::hash(bytes));
        entry.put_slice(bytes);

        let mut inner = self.inner.lock();
        self.check_open(&inner)?;
        let offset = inner.storage.len();
        match &mut inner.storage {
            Storage::Mem { bytes } => bytes.extend_from_slice(&entry),
            Storage::File { pending, .. } => pending.extend_from_slice(&entry),
        }
        if matches!(&inner.storage, Storage::File { pending, .. } if pending.len() > WRITE_BUFFER_LIMIT)
        {
            Self::write_pending(&mut inner.storage)?;
        }
        Ok(offset)
    }

    /// Read the entry at `offset`
    pub fn read(&self, offset: u64) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        self.check_open(&inner)?;
        let total = inner.storage.len();
        if offset.checked_add(ENTRY_HEADER as u64).map_or(true, |end| end > total)
            || !inner.storage.contiguous(offset, ENTRY_HEADER as u64)
        {
            return Err(self.bad_offset(offset));
        }
        let mut header = [0u8; ENTRY_HEADER];
        Self::read_at(&mut inner.storage, offset, &mut header)?;
        let mut h = &header[..];
        let len = h.get_u32() as u64;
        let crc = h.get_u32();
        let start = offset + ENTRY_HEADER as u64;
        if start + len > total || !inner.storage.contiguous(start, len) {
            return Err(self.bad_offset(offset));
        }
        let mut data = vec![0u8; len as usize];
        Self::read_at(&mut inner.storage, start, &mut data)?;
        if crc32fast::hash(&data) != crc {
            return Err(self.bad_offset(offset));
        }
        Ok(data)
    }

    /// All entries in offset order
    pub fn all(&self) -> Result<Vec<(u64, Vec<u8>)>> {
        let total = self.len();
        let mut out = Vec::new();
        let mut offset = 0u64;
        while offset < total {
            let data = self.read(offset)?;
            let next = offset + ENTRY_HEADER as u64 + data.len() as u64;
            out.push((offset, data));
            offset = next;
        }
        Ok(out)
    }

    /// Bytes in the file, including unwritten appends
    pub fn len(&self) -> u64 {
        self.inner.lock().storage.len()
    }

    /// Whether nothing was ever written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write out buffered appends and sync
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        Self::write_pending(&mut inner.storage)?;
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

    fn write_pending(storage: &mut Storage) -> Result<()> {
        if let Storage::File {
            file,
            file_len,
            pending,
        } = storage
        {
            if !pending.is_empty() {
                file.seek(SeekFrom::Start(*file_len))?;
                file.write_all(pending)?;
                file.flush()?;
                *file_len += pending.len() as u64;
                pending.clear();
            }
        }
        Ok(())
    }

    fn read_at(storage: &mut Storage, offset: u64, buf: &mut [u8]) -> Result<()> {
        match storage {
            Storage::Mem { bytes } => {
                let start = offset as usize;
                buf.copy_from_slice(&bytes[start..start + buf.len()]);
            }
            Storage::File {
                file,
                file_len,
                pending,
            } => {
                // An entry is either entirely in the file or entirely pending
                if offset >= *file_len {
                    let start = (offset - *file_len) as usize;
                    buf.copy_from_slice(&pending[start..start + buf.len()]);
                } else {
                    file.seek(SeekFrom::Start(offset))?;
                    file.read_exact(buf)?;
                }
            }
        }
        Ok(())
    }

    fn check_open(&self, inner: &Inner) -> Result<()> {
        if inner.closed {
            return Err(TdbError::Closed(self.label.clone()));
        }
        Ok(())
    }

    fn bad_offset(&self, offset: u64) -> TdbError {
        TdbError::InvalidInput(format!("{}: no object at offset {offset}", self.label))
    }
}
