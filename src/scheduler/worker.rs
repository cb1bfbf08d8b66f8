//! Worker loop: pull ids from the queue and drive tasks through their lifecycle.
//!
//! Each worker:
//! 1. Waits for either a queued id or the shutdown signal
//! 2. Skips ids whose task is gone or no longer PENDING (e.g. cancelled)
//! 3. Moves the task to RUNNING and looks up its capability
//! 4. Runs the capability in its own tokio task, raced against the timeout
//!    and the task's cancellation signal
//! 5. Records the outcome, re-queueing retryable failures

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinError;

use crate::domain::{AttemptOutcome, Task, TaskStatus};
use crate::error::{Result, SchedulerError};
use crate::registry::CancelSignal;
use crate::scheduler::shared::Shared;

pub(crate) struct Worker {
    name: String,
    shared: Arc<Shared>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(name: String, shared: Arc<Shared>, shutdown: watch::Receiver<bool>) -> Self {
        Self { name, shared, shutdown }
    }

    /// Run until shutdown is signalled (or the controller goes away).
    pub async fn run(mut self) {
        tracing::info!(worker = %self.name, "Worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let popped = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                popped = self.shared.queue.pop(self.shared.poll_interval) => popped,
            };

            // Empty poll: go round again
            let Some((_priority, task_id)) = popped else {
                continue;
            };

            self.process(&task_id).await;
        }

        tracing::info!(worker = %self.name, "Worker stopped");
    }

    async fn process(&self, task_id: &str) {
        let task = match self.shared.store.get(task_id) {
            Ok(task) => task,
            Err(_) => {
                tracing::debug!(task_id = %task_id, "Dequeued task no longer exists");
                return;
            }
        };

        if task.status != TaskStatus::Pending {
            tracing::debug!(task_id = %task_id, status = %task.status, "Skipping dequeued task");
            return;
        }

        // Register before RUNNING so a cancel issued right after the transition reaches us
        let signal = self.shared.in_flight.register(task_id);

        let started = self.shared.store.update(task_id, |t| {
            t.transition(TaskStatus::Running)?;
            Ok::<Task, SchedulerError>(t.clone())
        });
        let task = match started {
            Ok(Ok(task)) => task,
            _ => {
                // Cancelled (or removed) between the check and the transition
                self.shared.in_flight.remove(task_id);
                tracing::debug!(task_id = %task_id, "Task left PENDING before it could start");
                return;
            }
        };

        tracing::info!(
            worker = %self.name,
            task_id = %task.id,
            name = %task.name,
            attempt = task.retry_count + 1,
            "Executing task"
        );

        let outcome = self.execute(&task, signal).await;
        self.shared.in_flight.remove(&task.id);
        self.settle(&task, outcome);
    }

    async fn execute(&self, task: &Task, signal: CancelSignal) -> AttemptOutcome {
        let capability = match self.shared.registry.lookup(&task.function) {
            Ok(capability) => capability,
            Err(e) => {
                return AttemptOutcome::Failed {
                    retryable: !e.is_terminal(),
                    error: e.to_string(),
                };
            }
        };

        let args = task.args.clone();
        let watcher = signal.clone();
        let mut handle = tokio::spawn(async move { capability.call(args, signal).await });

        if !self.shared.in_flight.attach(&task.id, handle.abort_handle()) {
            handle.abort();
            return AttemptOutcome::Cancelled;
        }

        let timeout = task.timeout.filter(|secs| *secs > 0);

        tokio::select! {
            joined = &mut handle => outcome_of(joined),
            _ = watcher.cancelled() => {
                handle.abort();
                AttemptOutcome::Cancelled
            }
            _ = expire(timeout) => {
                // Best effort: the capability may keep running until its next await point
                self.shared.in_flight.cancel(&task.id);
                handle.abort();
                AttemptOutcome::TimedOut(timeout.unwrap_or_default())
            }
        }
    }

    /// Record an attempt's outcome; never overwrites a status set by a canceller.
    fn settle(&self, task: &Task, outcome: AttemptOutcome) {
        let id = task.id.as_str();
        let label = outcome.label();

        let settled = self
            .shared
            .store
            .update(id, |t| apply(t, outcome).map(|settled| (settled, t.clone())));

        match settled {
            Ok(Ok((Settled::Completed, _))) => {
                tracing::info!(task_id = %id, "Task completed successfully");
            }
            Ok(Ok((Settled::Requeued, t))) => {
                // Store says PENDING before the id is visible to other workers
                self.shared.queue.push(t.priority, &t.id);
                tracing::warn!(
                    task_id = %id,
                    error = t.error.as_deref().unwrap_or_default(),
                    attempt = t.retry_count + 1,
                    "Retrying task"
                );
            }
            Ok(Ok((Settled::Exhausted, t))) => {
                tracing::error!(
                    task_id = %id,
                    error = t.error.as_deref().unwrap_or_default(),
                    retries = t.retry_count,
                    "Task failed after exhausting retries"
                );
            }
            Ok(Ok((Settled::Failed, t))) | Ok(Ok((Settled::TimedOut, t))) => {
                tracing::error!(task_id = %id, error = t.error.as_deref().unwrap_or_default(), "Task failed");
            }
            Ok(Ok((Settled::Cancelled, _))) => {
                tracing::info!(task_id = %id, "Task execution cancelled");
            }
            Ok(Err(e)) => {
                tracing::debug!(task_id = %id, outcome = label, error = %e, "Outcome discarded");
            }
            Err(e) => {
                tracing::debug!(task_id = %id, outcome = label, error = %e, "Task vanished before outcome was recorded");
            }
        }
    }
}

/// What recording an outcome did to the task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Completed,
    Failed,
    TimedOut,
    /// Back to PENDING, must be pushed again
    Requeued,
    /// Retryable failure with no retries left
    Exhausted,
    Cancelled,
}

/// Apply an outcome to a RUNNING task; errors if the task is no longer RUNNING.
fn apply(task: &mut Task, outcome: AttemptOutcome) -> Result<Settled> {
    match outcome {
        AttemptOutcome::Succeeded(value) => task.complete(value).map(|_| Settled::Completed),
        AttemptOutcome::Failed { error, retryable: false } => task.fail(error).map(|_| Settled::Failed),
        AttemptOutcome::Failed { error, retryable: true } => task
            .record_failure(error)
            .map(|requeue| if requeue { Settled::Requeued } else { Settled::Exhausted }),
        AttemptOutcome::TimedOut(secs) => task
            .fail(SchedulerError::Timeout(secs).to_string())
            .map(|_| Settled::TimedOut),
        AttemptOutcome::Cancelled => Ok(Settled::Cancelled),
    }
}

fn outcome_of(joined: std::result::Result<eyre::Result<serde_json::Value>, JoinError>) -> AttemptOutcome {
    match joined {
        Ok(Ok(value)) => AttemptOutcome::Succeeded(value),
        Ok(Err(e)) => AttemptOutcome::retryable(e.to_string()),
        Err(e) if e.is_cancelled() => AttemptOutcome::Cancelled,
        Err(e) => {
            let error = SchedulerError::ExecutionFailure(format!("capability panicked: {}", e));
            AttemptOutcome::retryable(error.to_string())
        }
    }
}

/// Resolves after `secs` seconds, or never when unset.
async fn expire(timeout: Option<u64>) {
    match timeout {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTask, TaskStatus};
    use serde_json::json;

    fn running_task(max_retries: u32) -> Task {
        let mut task = Task::new("t-1".into(), NewTask::new("Test", "echo").with_max_retries(max_retries), 3);
        task.transition(TaskStatus::Running).unwrap();
        task
    }

    #[test]
    fn test_apply_success() {
        let mut task = running_task(3);
        assert_eq!(apply(&mut task, AttemptOutcome::Succeeded(json!("ok"))).unwrap(), Settled::Completed);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(json!("ok")));
    }

    #[test]
    fn test_apply_retryable_requeues() {
        let mut task = running_task(1);
        assert_eq!(apply(&mut task, AttemptOutcome::retryable("boom")).unwrap(), Settled::Requeued);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);

        task.transition(TaskStatus::Running).unwrap();
        assert_eq!(apply(&mut task, AttemptOutcome::retryable("boom")).unwrap(), Settled::Exhausted);
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[test]
    fn test_apply_terminal_failure_keeps_retry_count() {
        let mut task = running_task(3);
        assert_eq!(
            apply(&mut task, AttemptOutcome::terminal("Function nope not registered")).unwrap(),
            Settled::Failed
        );
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[test]
    fn test_apply_timeout() {
        let mut task = running_task(3);
        assert_eq!(apply(&mut task, AttemptOutcome::TimedOut(2)).unwrap(), Settled::TimedOut);
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 0);
        assert!(task.error.unwrap().contains("timed out after 2s"));
    }

    #[test]
    fn test_apply_does_not_overwrite_cancelled() {
        let mut task = running_task(3);
        task.cancel().unwrap();
        assert!(apply(&mut task, AttemptOutcome::Succeeded(json!(1))).is_err());
        assert!(apply(&mut task, AttemptOutcome::retryable("late")).is_err());
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_outcome_of_panic_is_retryable() {
        let joined = tokio::spawn(async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, eyre::Report>(serde_json::Value::Null)
        })
        .await;
        match outcome_of(joined) {
            AttemptOutcome::Failed { error, retryable } => {
                assert!(retryable);
                assert!(error.contains("panicked"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expire_none_never_fires() {
        let res = tokio::time::timeout(Duration::from_millis(30), expire(None)).await;
        assert!(res.is_err());
    }
}
