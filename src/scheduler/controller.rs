//! Scheduler controller: owns the worker pool and exposes the public API.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::SchedulerConfig;
use crate::domain::{NewTask, Task, TaskArgs, TaskStatus};
use crate::error::{Result, SchedulerError};
use crate::registry::{CancelSignal, Capability, FunctionRegistry};
use crate::scheduler::shared::Shared;
use crate::scheduler::stats::SchedulerStats;
use crate::scheduler::worker::Worker;

/// How often `wait_until_settled` re-reads the task
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// Handles of a started pool; empty while stopped.
#[derive(Default)]
struct Pool {
    shutdown: Option<watch::Sender<bool>>,
    workers: Vec<JoinHandle<()>>,
    janitor: Option<JoinHandle<()>>,
}

/// In-process priority task scheduler.
///
/// Construct one explicitly and share it as `Arc<Scheduler>`. Functions are
/// registered by name; tasks name a function and carry a JSON argument bag.
///
/// # Example
///
/// ```ignore
/// let scheduler = Scheduler::new(SchedulerConfig::default())?;
/// scheduler.register_fn("echo", |args, _cancel| async move { Ok(Value::Object(args)) });
/// let id = scheduler.enqueue(NewTask::new("Say hi", "echo").arg("message", "hi")).await?;
/// let task = scheduler.wait_until_settled(&id, Duration::from_secs(5)).await?;
/// ```
pub struct Scheduler {
    shared: Arc<Shared>,
    config: SchedulerConfig,
    running: AtomicBool,
    pool: Mutex<Pool>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new(config.default_max_retries, config.poll_interval())),
            config,
            running: AtomicBool::new(false),
            pool: Mutex::new(Pool::default()),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.shared.registry
    }

    pub fn register(&self, name: impl Into<String>, capability: Arc<dyn Capability>) {
        self.shared.registry.register(name, capability);
    }

    /// Register an async closure as a capability
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(TaskArgs, CancelSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Value>> + Send + 'static,
    {
        self.shared.registry.register_fn(name, f);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the worker pool (and the janitor, when configured).
    pub async fn start(&self) {
        let mut pool = self.pool.lock().await;
        if pool.shutdown.is_some() {
            tracing::warn!("Scheduler already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        pool.workers = (0..self.config.workers)
            .map(|i| {
                let worker = Worker::new(format!("worker-{}", i), self.shared.clone(), shutdown_rx.clone());
                tokio::spawn(worker.run())
            })
            .collect();

        if let Some(every) = self.config.cleanup.interval() {
            pool.janitor = Some(spawn_janitor(
                self.shared.clone(),
                every,
                self.config.cleanup.max_age(),
                shutdown_rx,
            ));
        }

        pool.shutdown = Some(shutdown_tx);
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(workers = self.config.workers, "Scheduler started");
    }

    /// Signal shutdown and wait up to the grace period for workers to exit.
    ///
    /// Executions still in flight afterwards are signalled and aborted, but
    /// their tasks stay RUNNING in the store.
    pub async fn stop(&self) {
        let mut pool = self.pool.lock().await;
        let Some(shutdown) = pool.shutdown.take() else {
            tracing::debug!("Scheduler not running");
            return;
        };

        self.running.store(false, Ordering::SeqCst);
        shutdown.send_replace(true);

        if let Some(janitor) = pool.janitor.take() {
            janitor.abort();
        }

        let workers = std::mem::take(&mut pool.workers);
        let aborts: Vec<AbortHandle> = workers.iter().map(|h| h.abort_handle()).collect();

        match tokio::time::timeout(self.config.shutdown_grace(), futures::future::join_all(workers)).await {
            Ok(results) => {
                for err in results.into_iter().filter_map(|r| r.err()) {
                    if !err.is_cancelled() {
                        tracing::error!(error = %err, "Worker panicked");
                    }
                }
            }
            Err(_) => {
                tracing::warn!(
                    grace_ms = self.config.shutdown_grace_ms,
                    "Workers did not stop within grace period, aborting"
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        let stranded = self.shared.in_flight.cancel_all();
        if !stranded.is_empty() {
            tracing::warn!(count = stranded.len(), task_ids = ?stranded, "Tasks left RUNNING by stop");
        }

        tracing::info!("Scheduler stopped");
    }

    pub async fn restart(&self) {
        self.stop().await;
        self.start().await;
    }

    /// Submit a task; starts the pool if needed and returns the new id.
    pub async fn enqueue(&self, new: NewTask) -> Result<String> {
        if self.config.strict_functions && !self.shared.registry.contains(&new.function) {
            return Err(SchedulerError::UnknownFunction(new.function));
        }

        if !self.is_running() {
            self.start().await;
        }

        let task = self.shared.store.create(new);
        self.shared.queue.push(task.priority, &task.id);

        tracing::info!(
            task_id = %task.id,
            name = %task.name,
            function = %task.function,
            priority = %task.priority,
            "Task enqueued"
        );
        Ok(task.id)
    }

    /// Cancel a PENDING or RUNNING task. Returns false for terminal or unknown ids.
    pub fn cancel(&self, task_id: &str) -> bool {
        let previous = self.shared.store.update(task_id, |t| {
            let previous = t.status;
            t.cancel().map(|()| previous)
        });

        match previous {
            Ok(Ok(TaskStatus::Running)) => {
                // Marked CANCELLED already; the execution stops when it notices
                self.shared.in_flight.cancel(task_id);
                tracing::info!(task_id = %task_id, "Cancelled running task");
                true
            }
            Ok(Ok(_)) => {
                tracing::info!(task_id = %task_id, "Cancelled pending task");
                true
            }
            Ok(Err(_)) => {
                tracing::debug!(task_id = %task_id, "Task already settled, nothing to cancel");
                false
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, task_id: &str) -> Result<Task> {
        self.shared.store.get(task_id)
    }

    /// The task's result if it COMPLETED, otherwise None.
    pub fn result(&self, task_id: &str) -> Result<Option<Value>> {
        Ok(self.shared.store.get(task_id)?.completed_result().cloned())
    }

    /// Newest tasks first
    pub fn recent(&self, limit: usize) -> Vec<Task> {
        self.shared.store.recent(limit)
    }

    /// Remove terminal tasks created more than `max_age` ago.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        self.shared.cleanup(max_age)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats::new(
            self.shared.store.count_by_status(),
            self.shared.queue.len(),
            self.config.workers,
            self.is_running(),
        )
    }

    /// Poll until the task is terminal or `timeout` elapses; returns the latest snapshot.
    pub async fn wait_until_settled(&self, task_id: &str, timeout: Duration) -> Result<Task> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = self.shared.store.get(task_id)?;
            if task.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(task);
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }
}

/// Periodically remove old terminal tasks until shutdown.
fn spawn_janitor(
    shared: Arc<Shared>,
    every: Duration,
    max_age: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    shared.cleanup(max_age);
                }
            }
        }
        tracing::debug!("Cleanup janitor stopped");
    })
}
