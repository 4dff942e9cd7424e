//! # Logging subscriber for debugging and demos.
//!
//! [`LogWriter`] renders every event on the channel as one `tracing` line.
//!
//! ## Output format
//! ```text
//! [scheduled] subject=task-3 priority=high
//! [failed] subject=task-3 reason="selector not found"
//! [processed] path=frame processed=10 remaining=4
//! [rejected] subject=enter-0-el-7 priority=normal reason="at capacity"
//! [navigation] from=IDLE to=NAVIGATING
//! [failure] kind=animation reason="keyframes rejected"
//! [animation-started] phase=enter elements=12
//! ```
//!
//! ## Example
//! ```
//! # use stagehand::{Event, EventChannel, EventKind, LogWriter};
//! let bus = EventChannel::new();
//! let sub = LogWriter::attach(&bus);
//! bus.emit(Event::new(EventKind::TaskScheduled).with_subject("task-0"));
//! assert!(sub.unsubscribe());
//! ```

use crate::events::{Event, EventChannel, EventKind, Subscription};

/// Logging subscriber.
///
/// Enabled via the `logging` feature. Failures log at `warn`, rejections and
/// cancellations at `info`, everything else at `debug`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Subscribes a `LogWriter` to every topic of `bus`.
    pub fn attach(bus: &EventChannel) -> Subscription {
        bus.subscribe_all(|e: &Event| LogWriter.handle(e))
    }

    /// Renders one event.
    pub fn handle(&self, e: &Event) {
        let subject = e.subject.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        let priority = e.priority.map(|p| p.as_label()).unwrap_or("-");
        let tag = e.tag.unwrap_or("-");
        let processed = e.processed.unwrap_or(0);

        match e.kind {
            EventKind::TaskScheduled => {
                tracing::debug!(seq = e.seq, "[scheduled] subject={subject} priority={priority}");
            }
            EventKind::TaskCompleted => {
                tracing::debug!(seq = e.seq, "[completed] subject={subject}");
            }
            EventKind::TaskFailed => {
                tracing::warn!(seq = e.seq, "[failed] subject={subject} reason={reason:?}");
            }
            EventKind::TaskCancelled => {
                tracing::info!(seq = e.seq, "[cancelled] subject={subject}");
            }
            EventKind::SchedulerProcessed => {
                tracing::debug!(
                    seq = e.seq,
                    "[processed] path={tag} processed={processed} remaining={}",
                    e.remaining.unwrap_or(0)
                );
            }
            EventKind::EffectRegistered => {
                tracing::debug!(seq = e.seq, "[registered] subject={subject} priority={priority}");
            }
            EventKind::EffectRejected => {
                tracing::info!(
                    seq = e.seq,
                    "[rejected] subject={subject} priority={priority} reason={reason:?}"
                );
            }
            EventKind::EffectUnregistered => {
                tracing::debug!(seq = e.seq, "[unregistered] subject={subject} reason={reason:?}");
            }
            EventKind::TierChanged => {
                tracing::info!(seq = e.seq, "[tier] from={} to={}", from(e), to(e));
            }
            EventKind::NavigationChanged => {
                tracing::debug!(seq = e.seq, "[navigation] from={} to={}", from(e), to(e));
            }
            EventKind::NavigationLocked => {
                tracing::debug!(seq = e.seq, "[navigation-locked] reason={reason:?}");
            }
            EventKind::NavigationUnlocked => {
                tracing::debug!(seq = e.seq, "[navigation-unlocked] reason={reason:?}");
            }
            EventKind::NavigationReset => {
                tracing::info!(seq = e.seq, "[navigation-reset] from={} to={}", from(e), to(e));
            }
            EventKind::FailureOccurred => {
                tracing::warn!(seq = e.seq, "[failure] kind={tag} reason={reason:?}");
            }
            EventKind::FailureHandled => {
                tracing::info!(seq = e.seq, "[failure-handled] action={tag} reason={reason:?}");
            }
            EventKind::FailureSuppressed => {
                tracing::warn!(seq = e.seq, "[failure-suppressed] kind={tag} reason={reason:?}");
            }
            EventKind::AnimationStarted => {
                tracing::debug!(seq = e.seq, "[animation-started] phase={tag} elements={processed}");
            }
            EventKind::AnimationCompleted => {
                tracing::debug!(seq = e.seq, "[animation-completed] phase={tag} elements={processed}");
            }
            EventKind::AnimationCancelled => {
                tracing::info!(
                    seq = e.seq,
                    "[animation-cancelled] reason={reason:?} cancelled={processed}"
                );
            }
        }
    }
}

fn from(e: &Event) -> &'static str {
    e.from.unwrap_or("-")
}

fn to(e: &Event) -> &'static str {
    e.to.unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaches_to_every_topic() {
        let bus = EventChannel::new();
        let sub = LogWriter::attach(&bus);
        assert_eq!(bus.emit(Event::new(EventKind::FailureOccurred).with_tag("network")), 1);
        assert_eq!(bus.emit(Event::new(EventKind::TierChanged).with_change("high", "low")), 1);
        assert!(sub.unsubscribe());
        assert_eq!(bus.emit(Event::new(EventKind::TaskCompleted)), 0);
    }
}
