//! In-memory task store.
//!
//! The authoritative record of every submitted task. Each task sits behind its
//! own mutex so that updates to the same id are serialized while updates to
//! different ids proceed independently. Readers always get cloned snapshots.
//!
//! # Example
//!
//! ```ignore
//! use taskqueue::store::TaskStore;
//! use taskqueue::domain::{NewTask, TaskStatus};
//!
//! let store = TaskStore::new(3);
//! let task = store.create(NewTask::new("Say hi", "echo"));
//! store.update(&task.id, |t| t.transition(TaskStatus::Running))??;
//! ```

mod task_store;

pub use task_store::{StatusCounts, TaskStore};
