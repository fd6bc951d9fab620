//! Fixed-length records stored by every range index
//!
//! A record is a key and an optional value, both of a length fixed per index
//! by its [`RecordFactory`]. Records order by key bytes only.

use crate::error::{Result, TdbError};
use bytes::{BufMut, Bytes};
use std::cmp::Ordering;
use std::fmt::{self, Debug};

/// A key(+value) byte record
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Record {
    key: Bytes,
    value: Bytes,
}

impl Record {
    /// Key bytes
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Value bytes (empty for key-only records)
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Compare by key
    pub fn compare(&self, other: &Record) -> Ordering {
        self.key.as_ref().cmp(other.key.as_ref())
    }

    /// Compare the key against raw key bytes
    pub fn compare_key(&self, key: &[u8]) -> Ordering {
        self.key.as_ref().cmp(key)
    }

    /// Same key and same value
    pub fn same_contents(&self, other: &Record) -> bool {
        self.key == other.key && self.value == other.value
    }

    /// A key-only copy
    pub fn key_only(&self) -> Record {
        Record {
            key: self.key.clone(),
            value: Bytes::new(),
        }
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record[")?;
        for b in self.key.iter() {
            write!(f, "{b:02x}")?;
        }
        if !self.value.is_empty() {
            write!(f, ":")?;
            for b in self.value.iter() {
                write!(f, "{b:02x}")?;
            }
        }
        write!(f, "]")
    }
}

/// Creates and (de)serializes records of one fixed shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordFactory {
    key_len: usize,
    value_len: usize,
}

impl RecordFactory {
    /// Factory for `key_len` key bytes and `value_len` value bytes
    pub fn new(key_len: usize, value_len: usize) -> Result<Self> {
        if key_len == 0 {
            return Err(TdbError::InvalidInput("record key length must be positive".into()));
        }
        Ok(Self { key_len, value_len })
    }

    /// Key length in bytes
    pub fn key_length(&self) -> usize {
        self.key_len
    }

    /// Value length in bytes
    pub fn value_length(&self) -> usize {
        self.value_len
    }

    /// Whole record length in bytes
    pub fn record_length(&self) -> usize {
        self.key_len + self.value_len
    }

    /// Whether records carry a value
    pub fn has_value(&self) -> bool {
        self.value_len > 0
    }

    /// Key-only factory with the same key length
    pub fn key_factory(&self) -> RecordFactory {
        RecordFactory {
            key_len: self.key_len,
            value_len: 0,
        }
    }

    /// A key-only record, used for searching and for key-only indexes
    pub fn create_key(&self, key: &[u8]) -> Result<Record> {
        self.check_len(self.key_len, key.len())?;
        Ok(Record {
            key: Bytes::copy_from_slice(key),
            value: Bytes::new(),
        })
    }

    /// A full record
    pub fn create(&self, key: &[u8], value: &[u8]) -> Result<Record> {
        self.check_len(self.key_len, key.len())?;
        self.check_len(self.value_len, value.len())?;
        Ok(Record {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        })
    }

    /// Check a record is a complete record of this factory
    pub fn check(&self, record: &Record) -> Result<()> {
        self.check_len(self.key_len, record.key.len())?;
        self.check_len(self.value_len, record.value.len())
    }

    /// Append the record's bytes (key, then value zero-padded) to `buf`
    pub fn encode_into<B: BufMut>(&self, record: &Record, buf: &mut B) {
        buf.put_slice(&record.key);
        if self.value_len > 0 {
            let n = record.value.len().min(self.value_len);
            buf.put_slice(&record.value[..n]);
            buf.put_bytes(0, self.value_len - n);
        }
    }

    /// Decode one record from the start of `bytes`
    pub fn decode(&self, bytes: &[u8]) -> Result<Record> {
        if bytes.len() < self.record_length() {
            return Err(TdbError::InvalidRecord {
                expected: self.record_length(),
                got: bytes.len(),
            });
        }
        Ok(Record {
            key: Bytes::copy_from_slice(&bytes[..self.key_len]),
            value: Bytes::copy_from_slice(&bytes[self.key_len..self.record_length()]),
        })
    }

    fn check_len(&self, expected: usize, got: usize) -> Result<()> {
        if expected != got {
            return Err(TdbError::InvalidRecord { expected, got });
        }
        Ok(())
    }
}
