//! TaskStore implementation with per-task locking.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::domain::{NewTask, Task, TaskStatus};
use crate::error::{Result, SchedulerError};
use crate::id::generate_task_id;

/// Number of tasks in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    fn add(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Running => self.running,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Cancelled => self.cancelled,
        }
    }
}

/// TaskStore keeps every task behind its own lock.
///
/// The outer map lock is only held to find, insert or remove an entry; task
/// mutation happens under the per-task mutex alone.
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Arc<Mutex<Task>>>>,
    default_max_retries: u32,
}

impl TaskStore {
    pub fn new(default_max_retries: u32) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            default_max_retries,
        }
    }

    /// Allocate an id and insert a PENDING task; returns its snapshot.
    pub fn create(&self, new: NewTask) -> Task {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        loop {
            let id = generate_task_id();
            if let Entry::Vacant(slot) = tasks.entry(id.clone()) {
                let task = Task::new(id, new, self.default_max_retries);
                slot.insert(Arc::new(Mutex::new(task.clone())));
                return task;
            }
        }
    }

    fn entry(&self, id: &str) -> Result<Arc<Mutex<Task>>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    /// Snapshot of a task
    pub fn get(&self, id: &str) -> Result<Task> {
        let entry = self.entry(id)?;
        let task = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(task.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).contains_key(id)
    }

    /// Atomic read-modify-write of a single task.
    ///
    /// `mutator` runs while the task's lock is held, so it must not call back
    /// into the store for the same id.
    pub fn update<R>(&self, id: &str, mutator: impl FnOnce(&mut Task) -> R) -> Result<R> {
        let entry = self.entry(id)?;
        let mut task = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(mutator(&mut task))
    }

    /// Snapshots of every task (unordered)
    pub fn list(&self) -> Vec<Task> {
        let entries: Vec<Arc<Mutex<Task>>> =
            self.tasks.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect();

        entries
            .iter()
            .map(|e| e.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }

    /// Newest tasks first, by `created_at`
    pub fn recent(&self, limit: usize) -> Vec<Task> {
        let mut tasks = self.list();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time counts; not consistent under concurrent mutation.
    pub fn count_by_status(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for task in self.list() {
            counts.add(task.status);
        }
        counts
    }

    /// Remove every task matching `predicate`; returns the removed ids.
    pub fn remove_where(&self, predicate: impl Fn(&Task) -> bool) -> Vec<String> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let doomed: Vec<String> = tasks
            .iter()
            .filter(|(_, entry)| predicate(&entry.lock().unwrap_or_else(PoisonError::into_inner)))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &doomed {
            tasks.remove(id);
        }
        doomed
    }
}
