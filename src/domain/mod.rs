//! Domain types for taskqueue
//!
//! - Task: the unit of work and its lifecycle record
//! - TaskStatus / TaskPriority: the state machine and the priority classes
//! - NewTask: what a caller submits
//! - AttemptOutcome: how a single execution attempt ended

pub mod outcome;
pub mod task;

pub use outcome::AttemptOutcome;
pub use task::{DEFAULT_MAX_RETRIES, NewTask, Task, TaskArgs, TaskPriority, TaskStatus};
