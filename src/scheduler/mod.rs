//! Scheduler: priority queue, worker pool and the controller that owns them.
//!
//! # Architecture
//!
//! 1. `Scheduler::enqueue` stores a PENDING task and pushes its id onto the
//!    `PriorityQueue`
//! 2. Workers wait on the queue (or the shutdown signal), move the task to
//!    RUNNING and invoke its capability
//! 3. Outcomes are written back through the `TaskStore`; retryable failures
//!    go back on the queue at their original priority
//!
//! Cancellation marks the task in the store first, then signals the in-flight
//! execution, so a late outcome can never overwrite CANCELLED.

mod controller;
mod queue;
mod shared;
mod stats;
mod worker;

pub use controller::Scheduler;
pub use queue::PriorityQueue;
pub use stats::SchedulerStats;
