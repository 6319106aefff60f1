use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::snapshot::Snapshot;

/// Bounded, oldest-first series of snapshots shared between the poller and
/// any number of readers.
///
/// Clones share the same buffer. The lock is held only while copying in or
/// out; readers always get owned copies.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    inner: Arc<Mutex<VecDeque<Snapshot>>>,
    capacity: usize,
}

impl HistoryStore {
    /// A capacity of zero is raised to one. Storage grows with the history,
    /// so `capacity` is only an upper bound.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Appends a snapshot, evicting the oldest one when full.
    pub fn push(&self, snapshot: Snapshot) {
        let mut buffer = self.lock();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(snapshot);
    }

    /// `None` until the first sweep has been pushed.
    pub fn latest(&self) -> Option<Snapshot> {
        self.lock().back().cloned()
    }

    /// The most recent `n` snapshots, oldest first. `n` is clamped to
    /// `1..=capacity`.
    pub fn last_n(&self, n: usize) -> Vec<Snapshot> {
        let n = n.clamp(1, self.capacity);
        let buffer = self.lock();
        let skip = buffer.len().saturating_sub(n);
        buffer.iter().skip(skip).cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Snapshot>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
