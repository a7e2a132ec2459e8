//! Fixed-capacity ring buffer with overwrite-oldest semantics.
//!
//! Every element is stamped with a sequence number on insertion. A
//! [`Snapshot`] remembers the newest sequence number it saw, so the caller can
//! later discard exactly the snapshotted elements while keeping anything
//! appended after the snapshot was taken.

use std::collections::VecDeque;

/// A point-in-time copy of a ring buffer's contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Retained elements, oldest first.
    pub items: Vec<T>,
    /// Sequence number of the newest element in `items`, if any.
    pub through: Option<u64>,
}

impl<T> Snapshot<T> {
    /// Number of elements captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the snapshot captured nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Bounded FIFO that evicts its oldest element when full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    entries: VecDeque<(u64, T)>,
    capacity: usize,
    next_seq: u64,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    /// Maximum number of retained elements.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if the next append will evict.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append at the newest end, evicting the oldest element first if full.
    ///
    /// Returns the evicted element, if any.
    pub fn append(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.entries.pop_front().map(|(_, old)| old)
        } else {
            None
        };

        self.entries.push_back((self.next_seq, item));
        self.next_seq += 1;
        evicted
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove retained elements with a sequence number of `seq` or lower.
    ///
    /// Returns how many elements were removed.
    pub fn discard_through(&mut self, seq: u64) -> usize {
        let mut removed = 0;
        while self.entries.front().is_some_and(|(s, _)| *s <= seq) {
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    /// Iterate over retained elements, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, item)| item)
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy out every retained element, oldest first. The buffer is unchanged.
    #[must_use]
    pub fn drain_to_sequence(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Copy out every retained element along with the newest sequence number.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            items: self.drain_to_sequence(),
            through: self.entries.back().map(|(seq, _)| *seq),
        }
    }
}
