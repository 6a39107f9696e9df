//! Time-sorted queue of deferred work on the audio clock.

use alloc::vec::Vec;

/// An item due at an audio-clock time.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheduled<T> {
    pub time: f64,
    pub item: T,
}

/// A priority queue of items sorted by time. Items with equal times keep
/// insertion order.
#[derive(Clone, Debug)]
pub struct EventQueue<T> {
    events: Vec<Scheduled<T>>,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventQueue<T> {
    /// Create a new empty event queue.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Push an item due at `time`.
    pub fn push(&mut self, time: f64, item: T) {
        let pos = self
            .events
            .partition_point(|e| e.time.total_cmp(&time).is_le());
        self.events.insert(pos, Scheduled { time, item });
    }

    /// Time of the earliest item.
    pub fn peek_time(&self) -> Option<f64> {
        self.events.first().map(|e| e.time)
    }

    /// Pop the earliest item if it is due at or before `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<Scheduled<T>> {
        match self.events.first() {
            Some(e) if e.time <= now => Some(self.events.remove(0)),
            _ => None,
        }
    }

    /// Clear all items.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of items in the queue.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Retain only items matching the predicate, removing the rest.
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut f: F) {
        self.events.retain(|e| f(&e.item));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scheduled<T>> {
        self.events.iter()
    }
}
