//! Execution attempt outcome types.

use serde_json::Value;

/// Outcome of one execution attempt of a task.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Capability returned a value
    Succeeded(Value),
    /// Attempt failed; `retryable` is false for failures that must not consume a retry
    Failed { error: String, retryable: bool },
    /// Attempt exceeded its timeout (seconds)
    TimedOut(u64),
    /// Cancellation was requested while the attempt was in flight
    Cancelled,
}

impl AttemptOutcome {
    pub fn retryable(error: impl Into<String>) -> Self {
        AttemptOutcome::Failed {
            error: error.into(),
            retryable: true,
        }
    }

    pub fn terminal(error: impl Into<String>) -> Self {
        AttemptOutcome::Failed {
            error: error.into(),
            retryable: false,
        }
    }

    /// Short label used in log events
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Succeeded(_) => "succeeded",
            AttemptOutcome::Failed { .. } => "failed",
            AttemptOutcome::TimedOut(_) => "timed_out",
            AttemptOutcome::Cancelled => "cancelled",
        }
    }
}
