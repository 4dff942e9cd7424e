//! # Visual effect abstraction.
//!
//! Effects are supplied per element by collaborator modules; the core only
//! controls them (`cancel`/`pause`/`play`) and awaits their outcome.
//!
//! [`TimedEffect`] is a host-independent effect that "plays" for a fixed
//! amount of tokio time; tests and headless embedders use it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::EffectError;

/// How an effect ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectOutcome {
    /// Ran to completion.
    Finished,
    /// Stopped by `cancel` (or dropped by its owner).
    Cancelled,
}

impl EffectOutcome {
    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            EffectOutcome::Finished => "finished",
            EffectOutcome::Cancelled => "cancelled",
        }
    }
}

/// A running visual effect.
pub trait Effect: Send + Sync + 'static {
    /// Stops the effect; its `finished` future resolves with `Cancelled`.
    fn cancel(&self) -> Result<(), EffectError>;

    /// Suspends playback.
    fn pause(&self) -> Result<(), EffectError>;

    /// Resumes playback.
    fn play(&self) -> Result<(), EffectError>;

    /// Resolves once the effect reaches a terminal outcome.
    ///
    /// May be called more than once; every returned future resolves.
    fn finished(&self) -> BoxFuture<'static, EffectOutcome>;

    /// Effects that cannot be cancelled are refused by the registry.
    fn is_cancellable(&self) -> bool {
        true
    }
}

/// Shared handle to an effect.
pub type EffectRef = Arc<dyn Effect>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Playback {
    Running,
    Paused,
    Done(EffectOutcome),
}

/// Effect that plays for a fixed duration of tokio time.
///
/// Paused time does not count towards the duration.
#[derive(Debug)]
pub struct TimedEffect {
    tx: Arc<watch::Sender<Playback>>,
    cancellable: bool,
}

impl TimedEffect {
    /// Starts a cancellable effect lasting `duration`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(duration: Duration) -> Arc<Self> {
        Self::start_with(duration, true)
    }

    /// Starts an effect lasting `duration`, optionally refusing `cancel`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_with(duration: Duration, cancellable: bool) -> Arc<Self> {
        let (tx, rx) = watch::channel(Playback::Running);
        let tx = Arc::new(tx);
        tokio::spawn(drive(Arc::downgrade(&tx), rx, duration));
        Arc::new(Self { tx, cancellable })
    }

    /// Terminal outcome, once reached.
    pub fn outcome(&self) -> Option<EffectOutcome> {
        match *self.tx.borrow() {
            Playback::Done(o) => Some(o),
            _ => None,
        }
    }

    /// True while paused.
    pub fn is_paused(&self) -> bool {
        *self.tx.borrow() == Playback::Paused
    }

    fn switch(&self, from: Playback, to: Playback) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        })
    }
}

async fn drive(
    tx: Weak<watch::Sender<Playback>>,
    mut rx: watch::Receiver<Playback>,
    mut remaining: Duration,
) {
    loop {
        let state = *rx.borrow_and_update();
        match state {
            Playback::Done(_) => return,
            Playback::Paused => {
                if rx.changed().await.is_err() {
                    return;
                }
            }
            Playback::Running => {
                let started = Instant::now();
                tokio::select! {
                    _ = tokio::time::sleep(remaining) => {
                        let Some(tx) = tx.upgrade() else {
                            return;
                        };
                        tx.send_if_modified(|s| {
                            if *s == Playback::Running {
                                *s = Playback::Done(EffectOutcome::Finished);
                                true
                            } else {
                                false
                            }
                        });
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        remaining = remaining.saturating_sub(started.elapsed());
                    }
                }
            }
        }
    }
}

impl Effect for TimedEffect {
    fn cancel(&self) -> Result<(), EffectError> {
        if !self.cancellable {
            return Err(EffectError::Unsupported { op: "cancel" });
        }
        self.tx.send_if_modified(|s| match s {
            Playback::Done(_) => false,
            _ => {
                *s = Playback::Done(EffectOutcome::Cancelled);
                true
            }
        });
        Ok(())
    }

    fn pause(&self) -> Result<(), EffectError> {
        self.switch(Playback::Running, Playback::Paused);
        Ok(())
    }

    fn play(&self) -> Result<(), EffectError> {
        self.switch(Playback::Paused, Playback::Running);
        Ok(())
    }

    fn finished(&self) -> BoxFuture<'static, EffectOutcome> {
        let mut rx = self.tx.subscribe();
        Box::pin(async move {
            loop {
                if let Playback::Done(outcome) = *rx.borrow_and_update() {
                    return outcome;
                }
                if rx.changed().await.is_err() {
                    return EffectOutcome::Cancelled;
                }
            }
        })
    }

    fn is_cancellable(&self) -> bool {
        self.cancellable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn finishes_after_its_duration() {
        let fx = TimedEffect::start(Duration::from_millis(300));
        let t0 = Instant::now();
        assert_eq!(fx.finished().await, EffectOutcome::Finished);
        assert!(t0.elapsed() >= Duration::from_millis(300));
        assert_eq!(fx.outcome(), Some(EffectOutcome::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn paused_time_does_not_count() {
        let fx = TimedEffect::start(Duration::from_millis(100));
        let t0 = Instant::now();
        tokio::time::sleep(Duration::from_millis(40)).await;
        fx.pause().unwrap();
        assert!(fx.is_paused());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fx.outcome(), None);
        fx.play().unwrap();
        assert_eq!(fx.finished().await, EffectOutcome::Finished);
        assert!(t0.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_resolves_waiters() {
        let fx = TimedEffect::start(Duration::from_secs(10));
        let waiter = tokio::spawn(fx.finished());
        fx.cancel().unwrap();
        assert_eq!(waiter.await.unwrap(), EffectOutcome::Cancelled);

        let pinned = TimedEffect::start_with(Duration::from_secs(10), false);
        assert!(!pinned.is_cancellable());
        assert_eq!(
            pinned.cancel(),
            Err(EffectError::Unsupported { op: "cancel" })
        );
    }
}
