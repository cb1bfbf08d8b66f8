//! Task record and related types
//!
//! A Task is created PENDING by the scheduler, driven to RUNNING by a worker and
//! ends in exactly one terminal status. Every status change goes through
//! [`Task::transition`], which enforces the state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchedulerError};

/// Default ceiling on automatic retries
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Keyword-style argument bag handed to a capability
pub type TaskArgs = serde_json::Map<String, Value>;

/// Priority class of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl TaskPriority {
    /// Queue weight (lower = dequeued first)
    pub fn weight(&self) -> u8 {
        match self {
            TaskPriority::Urgent => 1,
            TaskPriority::High => 2,
            TaskPriority::Normal => 3,
            TaskPriority::Low => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Urgent => "urgent",
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a task's execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue
    Pending,
    /// Picked up by a worker
    Running,
    /// Capability returned a result
    Completed,
    /// Retries exhausted, timed out, or function unknown
    Failed,
    /// Cancelled by a caller
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Returns true if no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Edges of the task state machine
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task submission, before the scheduler assigns an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub function: String,
    pub args: TaskArgs,
    pub priority: TaskPriority,
    /// Per-attempt budget in seconds (None = unbounded)
    pub timeout: Option<u64>,
    /// None = use the scheduler's configured default
    pub max_retries: Option<u32>,
}

impl NewTask {
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: TaskArgs) -> Self {
        self.args = args;
        self
    }

    /// Add a single argument
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// The lifecycle record of a single unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    //=== Identity ===
    pub id: String,
    pub name: String,
    /// Registry key of the capability to invoke
    pub function: String,
    pub args: TaskArgs,
    pub priority: TaskPriority,

    //=== Runtime State ===
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// Automatic retries consumed so far
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout: Option<u64>,

    //=== Timestamps ===
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a PENDING task from a submission
    pub fn new(id: String, new: NewTask, default_max_retries: u32) -> Self {
        Self {
            id,
            name: new.name,
            function: new.function,
            args: new.args,
            priority: new.priority,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            retry_count: 0,
            max_retries: new.max_retries.unwrap_or(default_max_retries),
            timeout: new.timeout,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, stamping `started_at` / `completed_at` as appropriate
    pub fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulerError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        match next {
            TaskStatus::Running => self.started_at = Some(now),
            s if s.is_terminal() => self.completed_at = Some(now),
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn complete(&mut self, result: Value) -> Result<()> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    /// Terminal failure, no retry
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Record a retryable failure.
    ///
    /// Returns `true` when the task went back to PENDING and must be re-queued,
    /// `false` when retries are exhausted and the task is now FAILED.
    pub fn record_failure(&mut self, error: impl Into<String>) -> Result<bool> {
        if self.retry_count < self.max_retries {
            self.transition(TaskStatus::Pending)?;
            self.retry_count += 1;
            self.error = Some(error.into());
            Ok(true)
        } else {
            self.fail(error)?;
            Ok(false)
        }
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(TaskStatus::Cancelled)
    }

    /// Result value, only once the task completed
    pub fn completed_result(&self) -> Option<&Value> {
        match self.status {
            TaskStatus::Completed => self.result.as_ref(),
            _ => None,
        }
    }
}
