//! # FailureBoundary: classify, log, rate-limit, notify, fall back.
//!
//! ## Flow
//! ```text
//! handle(error, ctx)
//!   ├─► normalize error → Failure, ctx defaults → Unknown/Medium
//!   ├─► append FailureRecord (oldest evicted past failure_log_limit)
//!   ├─► count[kind] += 1
//!   ├─► publish failure:occurred
//!   ├─► count[kind] > ceiling ? ──► publish failure:suppressed, return Suppressed
//!   ├─► severity >= Medium ? ──► Notifier::notify(toast)
//!   ├─► FallbackAction::select(kind, severity) ──► bound action (errors/panics logged)
//!   └─► publish failure:handled, return Handled
//! ```
//!
//! ## Rules
//! - Nothing raised inside the boundary (fallbacks, recoveries, notifier) escapes it.
//! - Suppressed failures are still recorded and counted.
//! - `guard` / `guard_async` turn errors **and panics** into `None`.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;

use super::{FailureContext, FailureKind, FailureRecord, FallbackAction, Severity};
use crate::config::Config;
use crate::error::Failure;
use crate::events::{Event, EventChannel, EventKind};
use crate::host::{Notifier, Toast};

/// Action bound to a [`FallbackAction`].
pub type FallbackFn = Arc<dyn Fn(&FailureRecord) -> Result<(), Failure> + Send + Sync>;

/// Kind-specific recovery registered with [`FailureBoundary::register_recovery`].
pub type RecoveryFn = Arc<dyn Fn() -> Result<(), Failure> + Send + Sync>;

/// Outcome of [`FailureBoundary::handle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handling {
    /// The kind's ceiling was exceeded: logged only.
    Suppressed,
    /// Notification (if any) and fallback ran.
    Handled {
        /// Selected fallback action.
        action: FallbackAction,
        /// Whether the user was notified.
        notified: bool,
    },
}

struct BoundaryState {
    log: VecDeque<FailureRecord>,
    counts: HashMap<FailureKind, u32>,
    fallbacks: HashMap<FallbackAction, FallbackFn>,
    recoveries: HashMap<FailureKind, RecoveryFn>,
}

/// Error boundary wrapped around every scheduled task, registered effect
/// callback and orchestrated animation step.
pub struct FailureBoundary {
    state: Mutex<BoundaryState>,
    bus: EventChannel,
    notifier: Option<Arc<dyn Notifier>>,
    ceiling: u32,
    log_limit: usize,
}

impl std::fmt::Debug for FailureBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("FailureBoundary")
            .field("records", &st.log.len())
            .field("counts", &st.counts)
            .field("ceiling", &self.ceiling)
            .finish()
    }
}

impl FailureBoundary {
    /// Creates a boundary publishing on `bus`, limits taken from `config`.
    pub fn new(bus: EventChannel, config: &Config) -> Self {
        Self {
            state: Mutex::new(BoundaryState {
                log: VecDeque::new(),
                counts: HashMap::new(),
                fallbacks: HashMap::new(),
                recoveries: HashMap::new(),
            }),
            bus,
            notifier: None,
            ceiling: config.failure_ceiling,
            log_limit: config.failure_log_limit_clamped(),
        }
    }

    /// Attaches a toast surface.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn lock(&self) -> MutexGuard<'_, BoundaryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `f` to `action`, replacing any previous binding.
    pub fn on_fallback<F>(&self, action: FallbackAction, f: F)
    where
        F: Fn(&FailureRecord) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.lock().fallbacks.insert(action, Arc::new(f));
    }

    /// Routes one failure through the boundary.
    pub fn handle(&self, error: impl Into<Failure>, ctx: FailureContext) -> Handling {
        let failure: Failure = error.into();
        let FailureContext {
            kind,
            severity,
            message,
            mut metadata,
        } = ctx;

        metadata.insert("error".into(), failure.as_message().into());
        metadata.insert("label".into(), failure.as_label().into());
        let user_message = message.unwrap_or_else(|| failure.as_message().to_string());
        let record = FailureRecord::now(kind, severity, user_message.clone(), metadata);

        let action = FallbackAction::select(kind, severity);
        let (count, fallback) = {
            let mut st = self.lock();
            st.log.push_back(record.clone());
            while st.log.len() > self.log_limit {
                st.log.pop_front();
            }
            let count = st.counts.entry(kind).or_insert(0);
            *count = count.saturating_add(1);
            let count = *count;
            (count, st.fallbacks.get(&action).cloned())
        };

        log_failure(&record, &failure, count);
        self.bus.emit(
            Event::new(EventKind::FailureOccurred)
                .with_tag(kind.as_label())
                .with_reason(user_message.as_str()),
        );

        if count > self.ceiling {
            tracing::warn!(
                kind = kind.as_label(),
                count,
                ceiling = self.ceiling,
                "failure suppressed: kind exceeded its ceiling"
            );
            self.bus.emit(
                Event::new(EventKind::FailureSuppressed)
                    .with_tag(kind.as_label())
                    .with_reason(user_message.as_str()),
            );
            return Handling::Suppressed;
        }

        let notified = self.notify(&user_message, severity);
        self.run_fallback(action, fallback, &record);

        self.bus.emit(
            Event::new(EventKind::FailureHandled)
                .with_tag(action.as_label())
                .with_reason(user_message),
        );
        Handling::Handled { action, notified }
    }

    fn notify(&self, message: &str, severity: Severity) -> bool {
        let Some(duration) = severity.toast_duration() else {
            return false;
        };
        let Some(notifier) = &self.notifier else {
            return false;
        };
        let toast = Toast {
            message: message.to_string(),
            severity,
            duration,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| notifier.notify(&toast))) {
            Ok(()) => true,
            Err(payload) => {
                let f = Failure::from_panic(payload);
                tracing::error!(error = %f, "notifier panicked");
                false
            }
        }
    }

    fn run_fallback(&self, action: FallbackAction, f: Option<FallbackFn>, record: &FailureRecord) {
        if action == FallbackAction::None {
            return;
        }
        let Some(f) = f else {
            tracing::debug!(action = action.as_label(), "no fallback bound");
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| f(record))) {
            Ok(Ok(())) => {
                tracing::info!(action = action.as_label(), kind = record.kind.as_label(), "fallback applied");
            }
            Ok(Err(e)) => {
                tracing::error!(action = action.as_label(), error = %e, "fallback failed");
            }
            Err(payload) => {
                let e = Failure::from_panic(payload);
                tracing::error!(action = action.as_label(), error = %e, "fallback panicked");
            }
        }
    }

    /// Runs `f`; on error or panic routes the failure through [`handle`](Self::handle)
    /// and returns `None`.
    pub fn guard<T, E, F>(&self, ctx: FailureContext, f: F) -> Option<T>
    where
        E: Into<Failure>,
        F: FnOnce() -> Result<T, E>,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(v)) => Some(v),
            Ok(Err(e)) => {
                self.handle(e, ctx);
                None
            }
            Err(payload) => {
                self.handle(Failure::from_panic(payload), ctx);
                None
            }
        }
    }

    /// Async counterpart of [`guard`](Self::guard).
    pub async fn guard_async<T, E, Fut>(&self, ctx: FailureContext, fut: Fut) -> Option<T>
    where
        E: Into<Failure>,
        Fut: Future<Output = Result<T, E>>,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(v)) => Some(v),
            Ok(Err(e)) => {
                self.handle(e, ctx);
                None
            }
            Err(payload) => {
                self.handle(Failure::from_panic(payload), ctx);
                None
            }
        }
    }

    /// Registers the recovery routine for `kind`.
    pub fn register_recovery<F>(&self, kind: FailureKind, f: F)
    where
        F: Fn() -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.lock().recoveries.insert(kind, Arc::new(f));
    }

    /// Runs the recovery registered for `kind`.
    ///
    /// On success the kind's failure counter is reset and `true` is returned.
    /// Returns `false` when nothing is registered or the recovery failed.
    pub fn recover(&self, kind: FailureKind) -> bool {
        let Some(f) = self.lock().recoveries.get(&kind).cloned() else {
            return false;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| f())) {
            Ok(Ok(())) => {
                self.lock().counts.remove(&kind);
                tracing::info!(kind = kind.as_label(), "recovered");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(kind = kind.as_label(), error = %e, "recovery failed");
                false
            }
            Err(payload) => {
                let e = Failure::from_panic(payload);
                tracing::error!(kind = kind.as_label(), error = %e, "recovery panicked");
                false
            }
        }
    }

    /// Snapshot of the audit log, oldest first.
    pub fn records(&self) -> Vec<FailureRecord> {
        self.lock().log.iter().cloned().collect()
    }

    /// Failures seen for `kind` since the last reset.
    pub fn count(&self, kind: FailureKind) -> u32 {
        self.lock().counts.get(&kind).copied().unwrap_or(0)
    }

    /// Clears every per-kind counter.
    pub fn reset_counts(&self) {
        self.lock().counts.clear();
    }

    /// Clears the audit log.
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }
}

fn log_failure(record: &FailureRecord, failure: &Failure, count: u32) {
    let kind = record.kind.as_label();
    match record.severity {
        Severity::Low => {
            tracing::debug!(kind, count, label = failure.as_label(), error = %failure, "failure");
        }
        Severity::Medium => {
            tracing::warn!(kind, count, label = failure.as_label(), error = %failure, "failure");
        }
        Severity::High | Severity::Critical => {
            tracing::error!(
                kind,
                count,
                severity = record.severity.as_label(),
                label = failure.as_label(),
                error = %failure,
                "failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Toasts(Mutex<Vec<Toast>>);

    impl Notifier for Toasts {
        fn notify(&self, toast: &Toast) {
            self.0.lock().unwrap().push(toast.clone());
        }
    }

    fn boundary() -> (FailureBoundary, Arc<Toasts>) {
        let toasts = Arc::new(Toasts::default());
        let b = FailureBoundary::new(EventChannel::new(), &Config::default())
            .with_notifier(toasts.clone());
        (b, toasts)
    }

    #[test]
    fn sixth_failure_of_a_kind_is_only_logged() {
        let (b, toasts) = boundary();
        let fallbacks = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fallbacks);
        b.on_fallback(FallbackAction::SimplifyAnimations, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let ctx = FailureContext::new(FailureKind::Animation);
        for _ in 0..5 {
            assert!(matches!(b.handle("jank", ctx.clone()), Handling::Handled { .. }));
        }
        assert_eq!(b.handle("jank", ctx), Handling::Suppressed);

        assert_eq!(fallbacks.load(Ordering::SeqCst), 5);
        assert_eq!(toasts.0.lock().unwrap().len(), 5);
        assert_eq!(b.records().len(), 6);
        assert_eq!(b.count(FailureKind::Animation), 6);
    }

    #[test]
    fn low_severity_is_not_shown_to_the_user() {
        let (b, toasts) = boundary();
        let h = b.handle(
            "preload failed",
            FailureContext::new(FailureKind::Network).with_severity(Severity::Low),
        );
        assert_eq!(
            h,
            Handling::Handled {
                action: FallbackAction::ShowOffline,
                notified: false
            }
        );
        assert!(toasts.0.lock().unwrap().is_empty());
    }

    #[test]
    fn critical_toast_lasts_longest() {
        let (b, toasts) = boundary();
        b.handle("a", FailureContext::new(FailureKind::Unknown).with_severity(Severity::High));
        b.handle("b", FailureContext::new(FailureKind::Unknown).with_severity(Severity::Critical));
        let toasts = toasts.0.lock().unwrap();
        assert!(toasts[1].duration > toasts[0].duration);
    }

    #[test]
    fn failing_fallback_is_contained() {
        let (b, _) = boundary();
        b.on_fallback(FallbackAction::ResetState, |_| Err(Failure::new("cannot reset")));
        b.on_fallback(FallbackAction::ShowOffline, |_| panic!("banner missing"));

        let h = b.handle("x", FailureContext::new(FailureKind::State));
        assert!(matches!(h, Handling::Handled { action: FallbackAction::ResetState, .. }));
        let h = b.handle("y", FailureContext::new(FailureKind::Network));
        assert!(matches!(h, Handling::Handled { action: FallbackAction::ShowOffline, .. }));
    }

    #[test]
    fn audit_log_is_capped() {
        let cfg = Config {
            failure_log_limit: 3,
            ..Config::default()
        };
        let b = FailureBoundary::new(EventChannel::new(), &cfg);
        for i in 0..5 {
            b.handle(format!("e{i}"), FailureContext::default());
        }
        let msgs: Vec<_> = b.records().into_iter().map(|r| r.message).collect();
        assert_eq!(msgs, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn guard_turns_errors_and_panics_into_none() {
        let (b, _) = boundary();
        assert_eq!(b.guard(FailureContext::default(), || Ok::<_, Failure>(4)), Some(4));
        assert_eq!(
            b.guard(FailureContext::default(), || Err::<u8, _>("nope")),
            None
        );
        let r: Option<u8> = b.guard(FailureContext::default(), || -> Result<u8, Failure> {
            panic!("inside guard")
        });
        assert_eq!(r, None);
        assert_eq!(b.count(FailureKind::Unknown), 2);
        assert!(b.records()[1].metadata["label"] == "panic");
    }

    #[tokio::test]
    async fn guard_async_catches_rejections() {
        let (b, _) = boundary();
        let ctx = FailureContext::new(FailureKind::Transition);
        let ok = b.guard_async(ctx.clone(), async { Ok::<_, Failure>("done") }).await;
        assert_eq!(ok, Some("done"));
        let failed: Option<()> = b
            .guard_async(ctx, async { Err(Failure::new("sequence broke")) })
            .await;
        assert_eq!(failed, None);
        assert_eq!(b.count(FailureKind::Transition), 1);
    }

    #[test]
    fn recovery_resets_counter_on_success() {
        let (b, _) = boundary();
        assert!(!b.recover(FailureKind::Network));

        b.handle("offline", FailureContext::new(FailureKind::Network));
        b.register_recovery(FailureKind::Network, || Ok(()));
        assert!(b.recover(FailureKind::Network));
        assert_eq!(b.count(FailureKind::Network), 0);

        b.handle("offline", FailureContext::new(FailureKind::Network));
        b.register_recovery(FailureKind::Network, || Err(Failure::new("still offline")));
        assert!(!b.recover(FailureKind::Network));
        assert_eq!(b.count(FailureKind::Network), 1);
    }
}
