//! # Runtime events emitted by the coordination components.
//!
//! The [`EventKind`] enum classifies event types across five groups:
//! - **Scheduler**: task lifecycle and drain passes
//! - **Registry**: effect admission and release
//! - **Navigation**: state changes, locking, reset
//! - **Failure**: boundary decisions
//! - **Animation**: orchestrated enter/exit sequences
//!
//! Every kind maps to a stable topic string ([`EventKind::topic`]) used by
//! [`EventChannel::emit`](super::EventChannel).
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use stagehand::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_subject("task-3")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind.topic(), "scheduler:failed");
//! assert_eq!(ev.subject.as_deref(), Some("task-3"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::policies::Priority;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Scheduler ===
    /// Task accepted into the queue.
    ///
    /// Sets: `subject` (task id), `priority`
    TaskScheduled,
    /// Task operation returned normally.
    ///
    /// Sets: `subject`
    TaskCompleted,
    /// Task operation failed or panicked.
    ///
    /// Sets: `subject`, `reason`
    TaskFailed,
    /// Pending task removed by `cancel`.
    ///
    /// Sets: `subject`
    TaskCancelled,
    /// One drain pass finished.
    ///
    /// Sets: `processed`, `remaining`, `tag` (`"idle"` or `"frame"`)
    SchedulerProcessed,

    // === Registry ===
    /// Effect admitted.
    ///
    /// Sets: `subject` (effect id), `priority`
    EffectRegistered,
    /// Effect refused.
    ///
    /// Sets: `subject`, `priority`, `reason`
    EffectRejected,
    /// Effect left the live set (finished, cancelled, preempted, unregistered).
    ///
    /// Sets: `subject`, `reason`
    EffectUnregistered,
    /// Performance tier changed.
    ///
    /// Sets: `from`, `to`
    TierChanged,

    // === Navigation ===
    /// Successful `set_state`.
    ///
    /// Sets: `from`, `to`
    NavigationChanged,
    /// Machine locked.
    ///
    /// Sets: `reason`
    NavigationLocked,
    /// Machine unlocked.
    ///
    /// Sets: `reason`
    NavigationUnlocked,
    /// Machine reset to idle.
    ///
    /// Sets: `from`, `to`
    NavigationReset,

    // === Failure boundary ===
    /// A failure reached the boundary.
    ///
    /// Sets: `tag` (failure kind), `reason`
    FailureOccurred,
    /// Notification/fallback ran for a failure.
    ///
    /// Sets: `tag` (fallback action), `reason`
    FailureHandled,
    /// A failure exceeded its kind's ceiling; only logged.
    ///
    /// Sets: `tag` (failure kind), `reason`
    FailureSuppressed,

    // === Animation ===
    /// Enter/exit sequence started.
    ///
    /// Sets: `tag` (phase), `processed` (element count)
    AnimationStarted,
    /// Enter/exit sequence resolved.
    ///
    /// Sets: `tag` (phase), `processed` (element count)
    AnimationCompleted,
    /// Tracked effects were cancelled.
    ///
    /// Sets: `reason`, `processed` (cancelled count)
    AnimationCancelled,
}

impl EventKind {
    /// Topic string this kind is published on.
    pub fn topic(self) -> &'static str {
        match self {
            EventKind::TaskScheduled => "scheduler:scheduled",
            EventKind::TaskCompleted => "scheduler:completed",
            EventKind::TaskFailed => "scheduler:failed",
            EventKind::TaskCancelled => "scheduler:cancelled",
            EventKind::SchedulerProcessed => "scheduler:processed",
            EventKind::EffectRegistered => "registry:registered",
            EventKind::EffectRejected => "registry:rejected",
            EventKind::EffectUnregistered => "registry:unregistered",
            EventKind::TierChanged => "registry:tier",
            EventKind::NavigationChanged => "navigation:changed",
            EventKind::NavigationLocked => "navigation:locked",
            EventKind::NavigationUnlocked => "navigation:unlocked",
            EventKind::NavigationReset => "navigation:reset",
            EventKind::FailureOccurred => "failure:occurred",
            EventKind::FailureHandled => "failure:handled",
            EventKind::FailureSuppressed => "failure:suppressed",
            EventKind::AnimationStarted => "animation:started",
            EventKind::AnimationCompleted => "animation:completed",
            EventKind::AnimationCancelled => "animation:cancelled",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Task id, effect id or other subject of the event.
    pub subject: Option<Arc<str>>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Priority of the task/effect concerned.
    pub priority: Option<Priority>,
    /// Processed (or affected) item count.
    pub processed: Option<u32>,
    /// Items still waiting.
    pub remaining: Option<u32>,
    /// Label of the previous state/tier.
    pub from: Option<&'static str>,
    /// Label of the new state/tier.
    pub to: Option<&'static str>,
    /// Short classification label (failure kind, fallback action, phase, drain path).
    pub tag: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subject: None,
            reason: None,
            priority: None,
            processed: None,
            remaining: None,
            from: None,
            to: None,
            tag: None,
        }
    }

    /// Attaches a subject (task id, effect id, ...).
    #[inline]
    pub fn with_subject(mut self, subject: impl Into<Arc<str>>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a priority.
    #[inline]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attaches processed/remaining counters.
    #[inline]
    pub fn with_counts(mut self, processed: usize, remaining: usize) -> Self {
        self.processed = Some(clamp_u32(processed));
        self.remaining = Some(clamp_u32(remaining));
        self
    }

    /// Attaches a single item count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.processed = Some(clamp_u32(n));
        self
    }

    /// Attaches `from → to` labels.
    #[inline]
    pub fn with_change(mut self, from: &'static str, to: &'static str) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Attaches a classification label.
    #[inline]
    pub fn with_tag(mut self, tag: &'static str) -> Self {
        self.tag = Some(tag);
        self
    }
}

fn clamp_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::TaskScheduled);
        let b = Event::new(EventKind::TaskScheduled);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn topics_are_grouped_by_component() {
        assert!(EventKind::SchedulerProcessed.topic().starts_with("scheduler:"));
        assert!(EventKind::TierChanged.topic().starts_with("registry:"));
        assert!(EventKind::FailureSuppressed.topic().starts_with("failure:"));
    }
}
