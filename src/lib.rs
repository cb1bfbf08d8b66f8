//! taskqueue - an in-process priority task scheduler
//!
//! Callers register named capabilities, then submit tasks that name a
//! capability and carry a JSON argument bag. A fixed pool of tokio workers
//! executes them in priority order with retries, per-task timeouts and
//! cooperative cancellation, recording every task's lifecycle in memory.

pub mod builtins;
pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use config::{CleanupConfig, Config, SchedulerConfig};
pub use domain::{NewTask, Task, TaskArgs, TaskPriority, TaskStatus};
pub use error::{Result, SchedulerError};
pub use registry::{CancelSignal, Capability};
pub use scheduler::{Scheduler, SchedulerStats};
