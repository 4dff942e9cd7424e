//! Host environment capabilities.
//!
//! The coordination core never paints, measures or animates anything itself.
//! It consumes a handful of primitives from the embedding host:
//!
//! - [`Host`]: monotonic clock, "before next paint" frame callback, optional idle
//!   callback with a deadline, timer.
//! - [`Surface`]: DOM-like mutations and queries over opaque [`ElementId`]s.
//! - [`Notifier`]: toast-style user notification (optional).
//! - [`DeviceProfile`]: performance tier and reduced-motion preference.
//!
//! [`TokioHost`] implements [`Host`] on `tokio::time`, which is what tests and
//! headless embedders use.

mod profile;
mod surface;

pub use profile::{DeviceProfile, Notifier, StaticProfile, Toast};
pub use surface::{ElementId, ElementPatch, Surface};

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::time::Instant;

/// Deadline handed to work running in an idle period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdleDeadline {
    /// Instant at which the idle period ends.
    pub deadline: Instant,
    /// True when the idle callback fired because its timeout elapsed.
    pub did_timeout: bool,
}

impl IdleDeadline {
    /// Creates a deadline ending at `deadline`.
    pub fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            did_timeout: false,
        }
    }

    /// Idle time left at `now` (zero once the deadline passed).
    pub fn time_remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

/// # Frame-driven host environment.
///
/// All suspension points of the runtime go through this trait:
/// waiting for a frame, waiting for an idle period, waiting for a timer.
#[async_trait]
pub trait Host: Send + Sync + 'static {
    /// Monotonic clock.
    fn now(&self) -> Instant;

    /// Resolves once, right before the next paint.
    async fn next_frame(&self);

    /// Requests an idle period.
    ///
    /// Returns `None` when the host has no idle primitive; callers fall back
    /// to [`next_frame`](Host::next_frame).
    fn idle(&self) -> Option<BoxFuture<'static, IdleDeadline>>;

    /// Resolves after `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Host`] backed by `tokio::time`.
///
/// - frames are a fixed `frame_interval` apart (default ~60 Hz);
/// - idle periods, when enabled, start after yielding to other tasks and last
///   `idle_budget`.
#[derive(Clone, Debug)]
pub struct TokioHost {
    frame_interval: Duration,
    idle_budget: Option<Duration>,
}

impl TokioHost {
    /// Creates a host with a 16 ms frame interval and a 50 ms idle budget.
    pub fn new() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            idle_budget: Some(Duration::from_millis(50)),
        }
    }

    /// Overrides the frame interval.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Sets the idle budget; `None` removes the idle primitive entirely.
    pub fn with_idle_budget(mut self, budget: Option<Duration>) -> Self {
        self.idle_budget = budget;
        self
    }
}

impl Default for TokioHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Host for TokioHost {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn next_frame(&self) {
        tokio::time::sleep(self.frame_interval).await;
    }

    fn idle(&self) -> Option<BoxFuture<'static, IdleDeadline>> {
        let budget = self.idle_budget?;
        Some(Box::pin(async move {
            tokio::task::yield_now().await;
            IdleDeadline::new(Instant::now() + budget)
        }))
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
