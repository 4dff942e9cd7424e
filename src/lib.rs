//! # stagehand
//!
//! **Stagehand** coordinates short-lived visual effects on a frame-driven host.
//!
//! It provides the plumbing around page transitions: a priority task queue
//! drained in idle time or per frame, a concurrency-limited registry of running
//! effects, a guarded navigation state machine, a failure boundary with
//! deterministic fallbacks, and an orchestrator that runs batched, staggered
//! enter/exit sequences on top of all of them. Nothing here paints; the host
//! supplies frames, timers, elements and effects.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                    ┌───────────────────────────────────────┐
//!   play_enter() ──► │         AnimationOrchestrator         │ ◄── DeviceProfile
//!   play_exit()      │  batches · stagger · headroom wait    │
//!                    └──┬──────────────┬──────────────┬──────┘
//!                       │ register     │ reveal       │ Navigating →
//!                       ▼              ▼              ▼ Animating*
//!            ┌────────────────────┐ ┌──────────────┐ ┌───────────────────┐
//!            │ConcurrencyRegistry │ │TaskScheduler │ │ NavigationMachine │
//!            │ tier cap · preempt │ │ idle / frame │ │ table · lock      │
//!            │ auto-deregister    │ │ drain loop   │ │ history · store   │
//!            └─────────┬──────────┘ └──────┬───────┘ └─────────┬─────────┘
//!                      │                   │ task errors       │
//!                      │                   ▼                   │
//!                      │          ┌──────────────────┐         │
//!                      │          │ FailureBoundary  │─────────┤ ResetState
//!                      │          │ log · ceiling ·  │─► Notifier (toast)
//!                      │          │ fallback table   │─► orchestrator (disable/simplify/skip)
//!                      │          └────────┬─────────┘
//!                      ▼                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                 EventChannel (synchronous topics)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                         ┌─────────┴─────────┐
//!                         ▼                   ▼
//!                 topic callbacks      "*" callbacks (LogWriter)
//! ```
//!
//! ### Scheduler drain
//! ```text
//! schedule(op, opts) ──► TaskQueue (priority, then FIFO)
//!
//! loop {
//!   ├─► host.idle() available and registry has room for High?
//!   │       ├─ yes ──► run tasks while time_remaining >= idle_slice_floor
//!   │       │          (at most max_tasks_per_idle)
//!   │       └─ no  ──► next_frame(), run tier.tasks_per_frame tasks
//!   ├─► each task: op() ── Ok ──► on_complete, scheduler:completed
//!   │                   └─ Err/panic ──► on_error, FailureBoundary, scheduler:failed
//!   ├─► publish scheduler:processed{ processed, remaining, path }
//!   └─► queue empty? ──► wake wait_idle(), exit
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types                                   |
//! |-------------------|-------------------------------------------------------------------|---------------------------------------------|
//! | **Events**        | Synchronous pub/sub; panicking callbacks are isolated.            | [`EventChannel`], [`Event`], [`EventKind`]  |
//! | **Scheduling**    | Priority queue drained in idle slots or per frame.                | [`TaskScheduler`], [`TaskOptions`]          |
//! | **Admission**     | Tier-based ceiling, priority floor, preemption of lower work.     | [`ConcurrencyRegistry`], [`PerformanceTier`]|
//! | **Navigation**    | Transition table, lock, history, persistence.                     | [`NavigationMachine`], [`NavState`]         |
//! | **Failures**      | Record, rate-limit, notify, one fallback per (kind, severity).    | [`FailureBoundary`], [`FallbackAction`]     |
//! | **Orchestration** | Batched, staggered enter/exit with reveal fallback.               | [`AnimationOrchestrator`], [`EffectFactory`]|
//! | **Wiring**        | Builds every component and binds default fallbacks.               | [`Stage`], [`StageBuilder`]                 |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], which renders every event through `tracing`.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use stagehand::{
//!     AnimationConfig, AnimationOverrides, EffectFactory, EffectRef, ElementId, Failure,
//!     NavState, Phase, Stage, TaskOptions, TimedEffect,
//! };
//!
//! struct Fade;
//!
//! impl EffectFactory for Fade {
//!     fn create(&self, _: ElementId, _: Phase, cfg: &AnimationConfig) -> Result<EffectRef, Failure> {
//!         Ok(TimedEffect::start(cfg.duration))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stage = Stage::builder().with_effects(Arc::new(Fade)).build()?;
//!
//!     stage.navigation().set_state(NavState::Navigating, Default::default())?;
//!     let cards: Vec<ElementId> = (0..4).map(ElementId).collect();
//!     let report = stage.orchestrator().play_exit(&cards, AnimationOverrides::new()).await;
//!     assert_eq!(report.finished, 4);
//!     assert_eq!(stage.navigation().state(), NavState::AnimatingExit);
//!
//!     stage.scheduler().schedule(|| Ok::<_, Failure>(()), TaskOptions::new())?;
//!     stage.scheduler().wait_idle().await;
//!     Ok(())
//! }
//! ```

mod boundary;
mod config;
mod error;
mod events;
mod host;
mod navigation;
mod orchestrator;
mod policies;
mod registry;
mod scheduler;
mod stage;
mod subscribers;

// ---- Public re-exports ----

pub use boundary::{
    FailureBoundary, FailureContext, FailureKind, FailureRecord, FallbackAction, FallbackFn,
    Handling, RecoveryFn, Severity,
};
pub use config::Config;
pub use error::{BuildError, EffectError, Failure, ScheduleError, StoreError, TransitionError};
pub use events::{Channel, Event, EventChannel, EventKind, Subscription, ALL_TOPICS};
pub use host::{
    DeviceProfile, ElementId, ElementPatch, Host, IdleDeadline, Notifier, StaticProfile, Surface,
    Toast, TokioHost,
};
pub use navigation::{
    MemoryStore, NavState, NavigationMachine, PersistedState, ResetOptions, StateStore,
    Transition, STATE_KEY,
};
pub use orchestrator::{
    should_skip_animation, AnimationConfig, AnimationOrchestrator, AnimationOverrides,
    EffectFactory, OrchestratorDeps, OrchestratorState, Phase, SequenceReport,
};
pub use policies::{PerformanceTier, Priority, TierProfile};
pub use registry::{ConcurrencyRegistry, Effect, EffectOutcome, EffectRef, TimedEffect};
pub use scheduler::{
    Operation, SchedulerStats, SelectorCache, TaskOptions, TaskScheduler, TaskState,
};
pub use stage::{Stage, StageBuilder};

// Optional: expose a simple built-in logging subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
