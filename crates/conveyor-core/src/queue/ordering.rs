//! Pending-work ordering.
//!
//! A single `BinaryHeap` serves both policies. Each entry is keyed by
//! `(rank, seq)`: rank is the task priority when priority ordering is on and
//! 0 otherwise, so with priority off every item sits in one tier and the
//! heap degrades to FIFO by sequence number.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::QueueItem;
use crate::domain::TaskId;

/// Heap entry. Ordering is the dispatch order: the greatest entry runs next.
#[derive(Debug)]
struct Entry {
    rank: i64,
    item: QueueItem,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher rank first, then lower sequence number
        self.rank
            .cmp(&other.rank)
            .then_with(|| other.item.seq.cmp(&self.item.seq))
    }
}

/// Ordered collection of items waiting for a slot.
#[derive(Debug)]
pub struct PendingQueue {
    heap: BinaryHeap<Entry>,
    priority_enabled: bool,
}

impl PendingQueue {
    pub fn new(priority_enabled: bool) -> Self {
        Self {
            heap: BinaryHeap::new(),
            priority_enabled,
        }
    }

    pub fn push(&mut self, item: QueueItem) {
        debug_assert!(item.state.is_runnable(), "only pending items belong in the queue");
        let rank = if self.priority_enabled {
            item.priority()
        } else {
            0
        };
        self.heap.push(Entry { rank, item });
    }

    /// Remove the head of the dispatch order.
    pub fn pop(&mut self) -> Option<QueueItem> {
        self.heap.pop().map(|entry| entry.item)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Ids in dispatch order.
    pub fn ids(&self) -> Vec<TaskId> {
        let mut entries: Vec<&Entry> = self.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| e.item.id().clone()).collect()
    }
}
