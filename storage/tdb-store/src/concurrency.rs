//! Multiple-reader or single-writer auditing
//!
//! [`ConcurrencyPolicy`] counts active read and update sessions and reports
//! overlaps it sees; it does not block. Callers serialize writers with their
//! own lock. Sessions are scoped guards, so a session always ends on every
//! exit path. Each update session bumps an epoch, and iterators wrapped by
//! [`ConcurrencyPolicy::checked_iter`] fail once the epoch has moved on.

use crate::error::{Result, TdbError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Reader/writer accounting shared by every component of one dataset
#[derive(Debug, Default)]
pub struct ConcurrencyPolicy {
    readers: AtomicU64,
    writers: AtomicU64,
    epoch: AtomicU64,
}

impl ConcurrencyPolicy {
    /// A policy with no active sessions
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Begin a read session
    pub fn start_read(self: &Arc<Self>) -> Result<ReadGuard> {
        self.readers.fetch_add(1, Ordering::SeqCst);
        let writers = self.writers.load(Ordering::SeqCst);
        if writers > 0 {
            self.readers.fetch_sub(1, Ordering::SeqCst);
            return Err(self.violation(format!("read started while {writers} writer(s) active")));
        }
        Ok(ReadGuard {
            policy: self.clone(),
        })
    }

    /// Begin an update session and advance the epoch
    pub fn start_update(self: &Arc<Self>) -> Result<WriteGuard> {
        let writers = self.writers.fetch_add(1, Ordering::SeqCst) + 1;
        let readers = self.readers.load(Ordering::SeqCst);
        if writers > 1 || readers > 0 {
            self.writers.fetch_sub(1, Ordering::SeqCst);
            return Err(self.violation(format!(
                "update started with {readers} reader(s) and {} other writer(s) active",
                writers - 1
            )));
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(WriteGuard {
            policy: self.clone(),
        })
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Active read sessions
    pub fn readers(&self) -> u64 {
        self.readers.load(Ordering::SeqCst)
    }

    /// Active update sessions
    pub fn writers(&self) -> u64 {
        self.writers.load(Ordering::SeqCst)
    }

    /// Wrap an iterator so that pulling from it after any later update fails
    pub fn checked_iter<I, T>(self: &Arc<Self>, iter: I) -> CheckedIter<I>
    where
        I: Iterator<Item = Result<T>>,
    {
        CheckedIter {
            policy: self.clone(),
            epoch: self.epoch(),
            inner: iter,
            failed: false,
        }
    }

    fn violation(&self, detail: String) -> TdbError {
        warn!(%detail, "concurrent access violation");
        TdbError::ConcurrentAccessViolation(detail)
    }
}

/// An active read session; ends when dropped
#[derive(Debug)]
#[must_use = "the read session ends when the guard is dropped"]
pub struct ReadGuard {
    policy: Arc<ConcurrencyPolicy>,
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        self.policy.readers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An active update session; ends when dropped
#[derive(Debug)]
#[must_use = "the update session ends when the guard is dropped"]
pub struct WriteGuard {
    policy: Arc<ConcurrencyPolicy>,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.policy.writers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Iterator that fails with `ConcurrentModification` once the dataset has
/// entered an update session after the iterator was created
pub struct CheckedIter<I> {
    policy: Arc<ConcurrencyPolicy>,
    epoch: u64,
    inner: I,
    failed: bool,
}

impl<I> CheckedIter<I> {
    /// Epoch captured at creation
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl<I, T> Iterator for CheckedIter<I>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let now = self.policy.epoch();
        if now != self.epoch {
            self.failed = true;
            return Some(Err(TdbError::ConcurrentModification {
                expected: self.epoch,
                found: now,
            }));
        }
        let item = self.inner.next();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
