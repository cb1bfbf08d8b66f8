//! State shared between the controller and its workers.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::AbortHandle;

use crate::registry::{CancelHandle, CancelSignal, FunctionRegistry, cancel_pair};
use crate::scheduler::queue::PriorityQueue;
use crate::store::TaskStore;

/// Store, queue, registry and in-flight table, owned behind one `Arc`.
pub(crate) struct Shared {
    pub store: TaskStore,
    pub queue: PriorityQueue,
    pub registry: FunctionRegistry,
    pub in_flight: InFlightTable,
    /// How long a worker waits on an empty queue before re-checking shutdown
    pub poll_interval: Duration,
}

impl Shared {
    pub fn new(default_max_retries: u32, poll_interval: Duration) -> Self {
        Self {
            store: TaskStore::new(default_max_retries),
            queue: PriorityQueue::new(),
            registry: FunctionRegistry::new(),
            in_flight: InFlightTable::default(),
            poll_interval,
        }
    }

    /// Remove terminal tasks created more than `max_age` ago.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return 0;
        };

        let removed = self.store.remove_where(|t| t.is_terminal() && t.created_at < cutoff);
        tracing::info!(count = removed.len(), "Cleaned up old tasks");
        removed.len()
    }
}

/// Cancellation plumbing for one executing task.
struct InFlight {
    cancel: CancelHandle,
    abort: Option<AbortHandle>,
}

/// Executions currently owned by a worker, keyed by task id.
#[derive(Default)]
pub(crate) struct InFlightTable {
    entries: Mutex<HashMap<String, InFlight>>,
}

impl InFlightTable {
    /// Track a task about to run; the returned signal feeds its capability.
    pub fn register(&self, task_id: &str) -> CancelSignal {
        let (cancel, signal) = cancel_pair();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id.to_string(), InFlight { cancel, abort: None });
        signal
    }

    /// Attach the spawned execution. Returns false if cancellation already fired.
    pub fn attach(&self, task_id: &str, abort: AbortHandle) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(task_id) {
            Some(entry) if entry.cancel.is_cancelled() => false,
            Some(entry) => {
                entry.abort = Some(abort);
                true
            }
            None => false,
        }
    }

    /// Signal cancellation without aborting; the owning worker reacts to it.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(task_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, task_id: &str) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(task_id);
    }

    /// Signal and abort everything still tracked; returns the affected ids.
    pub fn cancel_all(&self) -> Vec<String> {
        let drained: Vec<(String, InFlight)> =
            self.entries.lock().unwrap_or_else(PoisonError::into_inner).drain().collect();

        drained
            .into_iter()
            .map(|(id, entry)| {
                entry.cancel.cancel();
                if let Some(abort) = entry.abort {
                    abort.abort();
                }
                id
            })
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTask, TaskStatus};
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_cleanup_removes_only_old_terminal_tasks() {
        let shared = Shared::new(3, Duration::from_millis(10));
        let old_done = shared.store.create(NewTask::new("old", "echo"));
        let young_done = shared.store.create(NewTask::new("young", "echo"));
        let old_pending = shared.store.create(NewTask::new("pending", "echo"));

        for id in [&old_done.id, &old_pending.id] {
            shared
                .store
                .update(id, |t| t.created_at = Utc::now() - ChronoDuration::hours(48))
                .unwrap();
        }
        for id in [&old_done.id, &young_done.id] {
            shared.store.update(id, |t| t.cancel()).unwrap().unwrap();
        }

        let removed = shared.cleanup(Duration::from_secs(24 * 3600));
        assert_eq!(removed, 1);
        assert!(!shared.store.contains(&old_done.id));
        assert!(shared.store.contains(&young_done.id));
        assert_eq!(shared.store.get(&old_pending.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_cleanup_huge_age_removes_nothing() {
        let shared = Shared::new(3, Duration::from_millis(10));
        let t = shared.store.create(NewTask::new("t", "echo"));
        shared.store.update(&t.id, |t| t.cancel()).unwrap().unwrap();
        assert_eq!(shared.cleanup(Duration::MAX), 0);
    }

    #[tokio::test]
    async fn test_in_flight_cancel_before_attach() {
        let table = InFlightTable::default();
        let signal = table.register("t1");
        assert!(table.cancel("t1"));
        assert!(signal.is_cancelled());

        let handle = tokio::spawn(std::future::pending::<()>());
        assert!(!table.attach("t1", handle.abort_handle()));
        handle.abort();
    }

    #[tokio::test]
    async fn test_in_flight_cancel_all_aborts() {
        let table = InFlightTable::default();
        let signal = table.register("t1");
        let handle = tokio::spawn(std::future::pending::<()>());
        assert!(table.attach("t1", handle.abort_handle()));

        assert_eq!(table.cancel_all(), vec!["t1".to_string()]);
        assert!(signal.is_cancelled());
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_in_flight_cancel_unknown() {
        let table = InFlightTable::default();
        assert!(!table.cancel("missing"));
    }
}
