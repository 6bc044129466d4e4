//! Bounded FIFO history
//!
//! Backs the per-metric reading histories, the prediction history and the
//! persisted readings log. Pushing past capacity evicts the oldest entry.

use std::collections::VecDeque;

/// Default number of entries retained per history
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded, ordered history with oldest-first eviction
#[derive(Debug, Clone)]
pub struct ReadingBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> ReadingBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
        }
    }

    /// Append an entry, evicting from the front so the length never exceeds capacity
    pub fn push(&mut self, entry: T) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Append several entries in order
    pub fn extend(&mut self, entries: impl IntoIterator<Item = T>) {
        for entry in entries {
            self.push(entry);
        }
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> Default for ReadingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
