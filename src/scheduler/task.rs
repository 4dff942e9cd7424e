//! # Scheduled tasks.
//!
//! A task is owned by the scheduler from `schedule` until it reaches a
//! terminal state; after that its id is free again. The scheduler remembers
//! recent terminal states, so `state_of` still answers for a finished id
//! until it is reused or ages out.
//!
//! ```text
//! Pending ──► Executing ──► Completed
//!    │                  └──► Failed
//!    └──► Cancelled
//! ```

use std::fmt;

use tokio::time::Instant;

use crate::boundary::{FailureContext, FailureKind, Severity};
use crate::error::Failure;
use crate::policies::Priority;

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Queued, not started.
    Pending,
    /// Operation running.
    Executing,
    /// Operation returned `Ok`.
    Completed,
    /// Removed by `cancel` before it started.
    Cancelled,
    /// Operation returned `Err` or panicked.
    Failed,
}

impl TaskState {
    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Executing => "executing",
            TaskState::Completed => "completed",
            TaskState::Cancelled => "cancelled",
            TaskState::Failed => "failed",
        }
    }

    /// True for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Failed
        )
    }
}

/// Deferred side-effecting operation.
pub type Operation = Box<dyn FnOnce() -> Result<(), Failure> + Send>;

type CompleteFn = Box<dyn FnOnce() + Send>;
type ErrorFn = Box<dyn FnOnce(&Failure) + Send>;

/// Options for [`TaskScheduler::schedule`](crate::TaskScheduler::schedule).
///
/// ```
/// use stagehand::{Priority, TaskOptions};
///
/// let opts = TaskOptions::new()
///     .priority(Priority::High)
///     .id("hero-image")
///     .on_error(|e| eprintln!("hero failed: {e}"));
/// # let _ = opts;
/// ```
pub struct TaskOptions {
    pub(crate) priority: Priority,
    pub(crate) batch: bool,
    pub(crate) id: Option<String>,
    pub(crate) on_complete: Option<CompleteFn>,
    pub(crate) on_error: Option<ErrorFn>,
    pub(crate) cancellable: bool,
    pub(crate) context: FailureContext,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            priority: Priority::Normal,
            batch: false,
            id: None,
            on_complete: None,
            on_error: None,
            cancellable: true,
            context: FailureContext::new(FailureKind::Rendering).with_severity(Severity::Low),
        }
    }
}

impl fmt::Debug for TaskOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskOptions")
            .field("priority", &self.priority)
            .field("batch", &self.batch)
            .field("id", &self.id)
            .field("cancellable", &self.cancellable)
            .finish_non_exhaustive()
    }
}

impl TaskOptions {
    /// Normal priority, cancellable, failures reported as `Rendering`/`Low`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the task as part of a batch of grouped DOM work.
    pub fn batch(mut self) -> Self {
        self.batch = true;
        self
    }

    /// Uses `id` instead of a generated one.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Called after the operation returns `Ok`.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called with the failure when the operation errors or panics.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Failure) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Makes `cancel` refuse this task.
    pub fn not_cancellable(mut self) -> Self {
        self.cancellable = false;
        self
    }

    /// Context under which failures are reported to the boundary.
    pub fn failure_context(mut self, context: FailureContext) -> Self {
        self.context = context;
        self
    }
}

/// A queued task.
pub(crate) struct Task {
    pub(crate) id: String,
    pub(crate) op: Operation,
    pub(crate) priority: Priority,
    pub(crate) seq: u64,
    pub(crate) created_at: Instant,
    pub(crate) batch: bool,
    pub(crate) on_complete: Option<CompleteFn>,
    pub(crate) on_error: Option<ErrorFn>,
    pub(crate) context: FailureContext,
}
