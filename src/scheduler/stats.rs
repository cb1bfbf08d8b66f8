use serde::{Deserialize, Serialize};

use crate::store::StatusCounts;

/// Point-in-time scheduler statistics, serializable for dashboards.
///
/// Counts are gathered without a global lock, so under concurrent activity they
/// may not add up exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub running_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
    /// Ids currently waiting in the queue, including inert cancelled entries
    pub queue_size: usize,
    /// Worker count, the cap on concurrently RUNNING tasks
    pub max_concurrent: usize,
    pub is_running: bool,
}

impl SchedulerStats {
    pub fn new(counts: StatusCounts, queue_size: usize, max_concurrent: usize, is_running: bool) -> Self {
        Self {
            total_tasks: counts.total,
            pending_tasks: counts.pending,
            running_tasks: counts.running,
            completed_tasks: counts.completed,
            failed_tasks: counts.failed,
            cancelled_tasks: counts.cancelled,
            queue_size,
            max_concurrent,
            is_running,
        }
    }

    /// Tasks that reached COMPLETED, FAILED or CANCELLED
    pub fn settled_tasks(&self) -> usize {
        self.completed_tasks + self.failed_tasks + self.cancelled_tasks
    }
}
