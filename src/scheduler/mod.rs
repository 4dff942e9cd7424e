//! Deferred DOM work.
//!
//! ## Contents
//! - [`TaskOptions`], [`TaskState`], [`Operation`] what gets scheduled
//! - [`TaskScheduler`], [`SchedulerStats`] the priority queue and its drain loop
//! - [`SelectorCache`] time-expiring selector results used by batch operations
//!
//! Batch helpers (`append_many`, `remove_many`, `update_many`, `query`) live
//! on [`TaskScheduler`] as well.

mod batch;
mod cache;
mod queue;
#[allow(clippy::module_inception)]
mod scheduler;
mod task;

pub use cache::SelectorCache;
pub use scheduler::{SchedulerStats, TaskScheduler};
pub use task::{Operation, TaskOptions, TaskState};
