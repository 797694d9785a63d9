//! Timer heap for sleep deadlines.
//!
//! A min-heap of deadlines plus a side table of callbacks. Cancelling a
//! timer removes only its callback; the stale heap entry is skipped when it
//! surfaces.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::Task;
use crate::services::TimerKey;
use crate::types::Time;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct TimerEntry {
    deadline: Time,
    /// Insertion order; breaks deadline ties first-in first-out.
    generation: u64,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending timers ordered by deadline.
#[derive(Default)]
pub(crate) struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    callbacks: HashMap<u64, Task>,
    next_generation: u64,
}

impl TimerHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of live (not cancelled) timers.
    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub(crate) fn insert(&mut self, deadline: Time, callback: Task) -> TimerKey {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.heap.push(TimerEntry {
            deadline,
            generation,
        });
        self.callbacks.insert(generation, callback);
        TimerKey(generation)
    }

    pub(crate) fn cancel(&mut self, key: TimerKey) -> bool {
        let removed = self.callbacks.remove(&key.0).is_some();
        self.discard_cancelled();
        removed
    }

    /// Earliest live deadline.
    pub(crate) fn peek_deadline(&mut self) -> Option<Time> {
        self.discard_cancelled();
        self.heap.peek().map(|e| e.deadline)
    }

    /// Removes and returns the callbacks of every timer due at `now`, in
    /// deadline order.
    pub(crate) fn pop_expired(&mut self, now: Time) -> Vec<Task> {
        let mut expired = Vec::new();
        while let Some(entry) = self.heap.peek().copied() {
            if entry.deadline > now {
                break;
            }
            self.heap.pop();
            if let Some(callback) = self.callbacks.remove(&entry.generation) {
                expired.push(callback);
            }
        }
        expired
    }

    fn discard_cancelled(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.callbacks.contains_key(&entry.generation) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl std::fmt::Debug for TimerHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHeap")
            .field("live", &self.callbacks.len())
            .field("entries", &self.heap.len())
            .finish()
    }
}
