//! Error types for taskqueue
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::domain::TaskStatus;

/// All error types that can surface from the scheduler API
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task references a function that was never registered
    #[error("Function {0} not registered")]
    UnknownFunction(String),

    /// Capability returned an error (or panicked)
    #[error("Execution failed: {0}")]
    ExecutionFailure(String),

    /// Capability did not finish within its budget
    #[error("Task timed out after {0}s")]
    Timeout(u64),

    /// No task with this id in the store
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Status change not allowed by the task state machine
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// Configuration is unusable
    #[error("Config error: {0}")]
    Config(String),
}

impl SchedulerError {
    /// Failures that end a task without consuming a retry
    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerError::UnknownFunction(_) | SchedulerError::Timeout(_))
    }
}

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;
