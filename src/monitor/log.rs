//! Bounded event log
//!
//! Append-only ring buffer that keeps the newest `capacity` entries. Used for
//! both request and error events.

use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of retained entries per log.
pub const DEFAULT_RETENTION: usize = 1000;

/// Ring buffer of events, oldest evicted first.
pub struct EventLog<T> {
    entries: RwLock<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> EventLog<T> {
    /// Creates a log retaining at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest if at capacity.
    pub fn append(&self, entry: T) {
        let mut entries = self.write();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The `n` most recent entries, newest first.
    pub fn snapshot_recent(&self, n: usize) -> Vec<T> {
        newest_first(self.read().iter(), n)
    }

    /// All retained entries in chronological order (oldest first).
    pub fn all(&self) -> Vec<T> {
        self.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Poisoned locks are recovered: no code path panics between pop and push.
    fn read(&self) -> RwLockReadGuard<'_, VecDeque<T>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<T>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// The last `n` of a chronological sequence, newest first.
pub fn newest_first<'a, T, I>(entries: I, n: usize) -> Vec<T>
where
    T: Clone + 'a,
    I: IntoIterator<Item = &'a T>,
    I::IntoIter: DoubleEndedIterator,
{
    entries.into_iter().rev().take(n).cloned().collect()
}

impl<T: Clone> Default for EventLog<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RETENTION)
    }
}
