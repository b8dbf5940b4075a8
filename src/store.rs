//! Bounded, append-only record store with at-most-once semantics per hash

use crate::proxy::models::ProxyRecord;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default ceiling on stored records
pub const DEFAULT_STORE_CAPACITY: usize = 1_000_000;

/// Result of merging one document's records into the store
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records appended
    pub added: usize,
    /// Records whose hash was already stored
    pub duplicates: usize,
    /// Records dropped because the store was full
    pub dropped: usize,
    /// Store size after the merge
    pub total: usize,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: Vec<Arc<ProxyRecord>>,
    index: HashSet<u64>,
}

/// Globally unique proxy records in discovery order.
///
/// Records are never mutated or removed. A merge runs as one critical
/// section; readers take the lock only long enough to clone `Arc`s.
#[derive(Debug)]
pub struct RecordStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
    len: AtomicUsize,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(StoreInner::default()),
            len: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current size, readable without the lock
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.lock().index.contains(&hash)
    }

    /// Append every record whose hash is new, in order, until capacity
    pub fn merge(&self, batch: Vec<ProxyRecord>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut inner = self.lock();

        for record in batch {
            if inner.records.len() >= self.capacity {
                outcome.dropped += 1;
                continue;
            }
            if !inner.index.insert(record.hash) {
                outcome.duplicates += 1;
                continue;
            }
            inner.records.push(Arc::new(record));
            outcome.added += 1;
        }

        outcome.total = inner.records.len();
        self.len.store(outcome.total, Ordering::Release);
        outcome
    }

    /// The first `count` records in discovery order
    pub fn snapshot(&self, count: usize) -> Vec<Arc<ProxyRecord>> {
        let inner = self.lock();
        let count = count.min(inner.records.len());
        inner.records[..count].to_vec()
    }

    /// Record at `index`, if stored
    pub fn get(&self, index: usize) -> Option<Arc<ProxyRecord>> {
        self.lock().records.get(index).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
