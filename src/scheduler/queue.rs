//! Priority queue of task ids.
//!
//! Entries are ordered by priority weight (lower first) and then by a
//! monotonically increasing sequence number, so tasks of the same class come
//! out in submission order. `pop` waits on a `Notify` instead of polling.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::TaskPriority;

/// Entry in the heap; the smallest (weight, seq) is the next to run.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    weight: u8,
    seq: u64,
    priority: TaskPriority,
    task_id: String,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.weight, self.seq).cmp(&(other.weight, other.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Blocking-with-deadline priority queue shared by all workers.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<Reverse<QueueEntry>>>,
    next_seq: AtomicU64,
    available: Notify,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an id at the given priority and wake one waiting worker.
    pub fn push(&self, priority: TaskPriority, task_id: impl Into<String>) {
        let entry = QueueEntry {
            weight: priority.weight(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            priority,
            task_id: task_id.into(),
        };
        self.heap.lock().unwrap_or_else(PoisonError::into_inner).push(Reverse(entry));
        self.available.notify_one();
    }

    /// Pop without waiting
    pub fn try_pop(&self) -> Option<(TaskPriority, String)> {
        self.heap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .map(|Reverse(entry)| (entry.priority, entry.task_id))
    }

    /// Pop the next entry, waiting at most `wait` for one to arrive.
    ///
    /// Returns `None` when the wait budget elapses with the queue still empty.
    pub async fn pop(&self, wait: Duration) -> Option<(TaskPriority, String)> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push in between is not missed
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
