//! # Composition root.
//!
//! [`StageBuilder`] assembles one isolated instance of every component around
//! a shared [`EventChannel`] and binds the default fallback actions:
//!
//! | action               | bound to                                   |
//! |----------------------|--------------------------------------------|
//! | `ResetState`         | [`NavigationMachine::reset`]               |
//! | `DisableAnimations`  | [`AnimationOrchestrator::disable_animations`] |
//! | `SimplifyAnimations` | [`AnimationOrchestrator::simplify`]        |
//! | `SkipTransition`     | [`AnimationOrchestrator::cancel_all`]      |
//! | `ShowOffline`        | offline toast on the [`Notifier`]          |
//!
//! `Reload` is left to the embedder ([`StageBuilder::on_fallback`]).
//! Bindings hold weak references, so the boundary never keeps the other
//! components alive.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use stagehand::{
//!     AnimationConfig, EffectFactory, EffectRef, ElementId, Failure, Phase, Stage, TimedEffect,
//! };
//!
//! struct Timed;
//!
//! impl EffectFactory for Timed {
//!     fn create(&self, _: ElementId, _: Phase, cfg: &AnimationConfig) -> Result<EffectRef, Failure> {
//!         Ok(TimedEffect::start(cfg.duration))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), stagehand::BuildError> {
//! let stage = Stage::builder().with_effects(Arc::new(Timed)).build()?;
//! assert_eq!(stage.registry().live_count(), 0);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::boundary::{FailureBoundary, FailureRecord, FallbackAction, FallbackFn};
use crate::config::Config;
use crate::error::{BuildError, Failure};
use crate::events::EventChannel;
use crate::host::{DeviceProfile, Host, Notifier, Surface, Toast, TokioHost};
use crate::navigation::{NavigationMachine, ResetOptions, StateStore};
use crate::orchestrator::{AnimationOrchestrator, EffectFactory, OrchestratorDeps};
use crate::policies::PerformanceTier;
use crate::registry::ConcurrencyRegistry;
use crate::scheduler::TaskScheduler;

const OFFLINE_MESSAGE: &str = "You appear to be offline. Some content may be unavailable.";

/// Every coordination component, wired together.
///
/// Built with [`Stage::builder`]. Components are shared handles; clone them
/// out freely.
#[derive(Debug)]
pub struct Stage {
    bus: EventChannel,
    boundary: Arc<FailureBoundary>,
    machine: Arc<NavigationMachine>,
    registry: ConcurrencyRegistry,
    scheduler: TaskScheduler,
    orchestrator: AnimationOrchestrator,
}

impl Stage {
    /// Starts a builder with the default [`Config`].
    pub fn builder() -> StageBuilder {
        StageBuilder::new(Config::default())
    }

    /// Shared event channel.
    pub fn events(&self) -> &EventChannel {
        &self.bus
    }

    /// Failure boundary.
    pub fn boundary(&self) -> &Arc<FailureBoundary> {
        &self.boundary
    }

    /// Navigation state machine.
    pub fn navigation(&self) -> &Arc<NavigationMachine> {
        &self.machine
    }

    /// Concurrency registry.
    pub fn registry(&self) -> &ConcurrencyRegistry {
        &self.registry
    }

    /// Task scheduler.
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Animation orchestrator.
    pub fn orchestrator(&self) -> &AnimationOrchestrator {
        &self.orchestrator
    }

    /// Applies `tier` to the registry, scheduler and orchestrator.
    pub fn set_tier(&self, tier: PerformanceTier) {
        self.orchestrator.set_tier(tier);
    }

    /// Runs every pending task now, then cancels every live effect.
    pub fn teardown(&self) {
        self.orchestrator.cancel_all("teardown");
        self.scheduler.flush();
        self.registry.cancel_all();
    }
}

/// Builder for [`Stage`].
pub struct StageBuilder {
    cfg: Config,
    host: Option<Arc<dyn Host>>,
    store: Option<Arc<dyn StateStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    surface: Option<Arc<dyn Surface>>,
    effects: Option<Arc<dyn EffectFactory>>,
    profile: Option<Arc<dyn DeviceProfile>>,
    fallbacks: Vec<(FallbackAction, FallbackFn)>,
}

impl StageBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            host: None,
            store: None,
            notifier: None,
            surface: None,
            effects: None,
            profile: None,
            fallbacks: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Frame/idle/timer source. Defaults to [`TokioHost`].
    pub fn with_host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Persists navigation state in `store` and restores it on build.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Toast surface for user-facing failures.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Surface used by batch operations and reveals.
    pub fn with_surface(mut self, surface: Arc<dyn Surface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Effect factory. Required.
    pub fn with_effects(mut self, factory: Arc<dyn EffectFactory>) -> Self {
        self.effects = Some(factory);
        self
    }

    /// Device profile read when the orchestrator initializes.
    pub fn with_profile(mut self, profile: Arc<dyn DeviceProfile>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Binds `f` to `action`, replacing the default binding if there is one.
    pub fn on_fallback<F>(mut self, action: FallbackAction, f: F) -> Self
    where
        F: Fn(&FailureRecord) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.fallbacks.push((action, Arc::new(f)));
        self
    }

    /// Builds the stage and initializes the orchestrator.
    pub fn build(self) -> Result<Stage, BuildError> {
        let factory = self.effects.ok_or(BuildError::MissingEffectFactory)?;
        let host = self.host.unwrap_or_else(|| Arc::new(TokioHost::new()));
        let bus = EventChannel::new();

        let mut boundary = FailureBoundary::new(bus.clone(), &self.cfg);
        if let Some(notifier) = self.notifier.clone() {
            boundary = boundary.with_notifier(notifier);
        }
        let boundary = Arc::new(boundary);

        let mut machine = NavigationMachine::new(bus.clone(), &self.cfg);
        if let Some(store) = self.store {
            machine = machine.with_store(store);
        }
        let machine = Arc::new(machine);

        let registry = ConcurrencyRegistry::new(bus.clone(), self.cfg.tier);
        let scheduler = TaskScheduler::new(
            Arc::clone(&host),
            registry.clone(),
            Arc::clone(&boundary),
            bus.clone(),
            self.surface.clone(),
            &self.cfg,
        );
        let orchestrator = AnimationOrchestrator::new(
            OrchestratorDeps {
                host,
                registry: registry.clone(),
                scheduler: scheduler.clone(),
                machine: Arc::clone(&machine),
                boundary: Arc::clone(&boundary),
                bus: bus.clone(),
                factory,
                surface: self.surface,
                profile: self.profile,
            },
            &self.cfg,
        );

        bind_defaults(&boundary, &machine, &orchestrator, self.notifier);
        for (action, f) in self.fallbacks {
            boundary.on_fallback(action, move |record| f(record));
        }

        orchestrator.initialize();
        tracing::debug!(tier = orchestrator.tier().as_label(), "stage built");
        Ok(Stage {
            bus,
            boundary,
            machine,
            registry,
            scheduler,
            orchestrator,
        })
    }
}

fn bind_defaults(
    boundary: &FailureBoundary,
    machine: &Arc<NavigationMachine>,
    orchestrator: &AnimationOrchestrator,
    notifier: Option<Arc<dyn Notifier>>,
) {
    let nav: Weak<NavigationMachine> = Arc::downgrade(machine);
    boundary.on_fallback(FallbackAction::ResetState, move |record| {
        if let Some(machine) = nav.upgrade() {
            let mut metadata = serde_json::Map::new();
            metadata.insert("reason".into(), "failure".into());
            metadata.insert("failure".into(), record.kind.as_label().into());
            machine.reset(ResetOptions {
                clear_history: false,
                metadata,
            });
        }
        Ok(())
    });

    let orch = orchestrator.downgrade();
    boundary.on_fallback(FallbackAction::DisableAnimations, move |_| {
        if let Some(o) = orch.upgrade() {
            o.disable_animations();
        }
        Ok(())
    });

    let orch = orchestrator.downgrade();
    boundary.on_fallback(FallbackAction::SimplifyAnimations, move |_| {
        if let Some(o) = orch.upgrade() {
            o.simplify();
        }
        Ok(())
    });

    let orch = orchestrator.downgrade();
    boundary.on_fallback(FallbackAction::SkipTransition, move |record| {
        if let Some(o) = orch.upgrade() {
            o.cancel_all(&record.message);
        }
        Ok(())
    });

    if let Some(notifier) = notifier {
        boundary.on_fallback(FallbackAction::ShowOffline, move |record| {
            notifier.notify(&Toast {
                message: OFFLINE_MESSAGE.to_string(),
                severity: record.severity,
                duration: record
                    .severity
                    .toast_duration()
                    .unwrap_or(Duration::from_secs(3)),
            });
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{FailureContext, FailureKind, Severity};
    use crate::host::{ElementId, StaticProfile};
    use crate::navigation::{MemoryStore, NavState};
    use crate::orchestrator::{AnimationConfig, AnimationOverrides, Phase};
    use crate::policies::Priority;
    use crate::registry::{EffectRef, TimedEffect};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Timed;

    impl EffectFactory for Timed {
        fn create(&self, _: ElementId, _: Phase, cfg: &AnimationConfig) -> Result<EffectRef, Failure> {
            Ok(TimedEffect::start(cfg.duration))
        }
    }

    #[derive(Default)]
    struct Toasts(Mutex<Vec<Toast>>);

    impl Notifier for Toasts {
        fn notify(&self, toast: &Toast) {
            self.0.lock().unwrap().push(toast.clone());
        }
    }

    fn stage() -> Stage {
        Stage::builder().with_effects(Arc::new(Timed)).build().unwrap()
    }

    #[test]
    fn effect_factory_is_required() {
        assert_eq!(
            Stage::builder().build().unwrap_err(),
            BuildError::MissingEffectFactory
        );
    }

    #[tokio::test]
    async fn state_failures_reset_navigation() {
        let stage = stage();
        stage
            .navigation()
            .set_state(NavState::Navigating, serde_json::Map::new())
            .unwrap();
        stage
            .boundary()
            .handle("corrupt history", FailureContext::new(FailureKind::State));
        assert_eq!(stage.navigation().state(), NavState::Idle);
    }

    #[tokio::test]
    async fn severe_animation_failures_disable_animation() {
        let stage = stage();
        assert!(!stage.orchestrator().should_skip());
        stage.boundary().handle(
            "gpu lost",
            FailureContext::new(FailureKind::Animation).with_severity(Severity::High),
        );
        assert!(stage.orchestrator().should_skip());
    }

    #[tokio::test]
    async fn mild_animation_failures_downgrade_the_tier() {
        let stage = stage();
        stage.boundary().handle(
            "dropped frames",
            FailureContext::new(FailureKind::Animation).with_severity(Severity::Low),
        );
        assert_eq!(stage.registry().tier(), PerformanceTier::Medium);
        assert_eq!(stage.scheduler().tier(), PerformanceTier::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn a_busy_registry_does_not_degrade_the_tier() {
        let stage = stage();
        for i in 0..7 {
            stage.registry().register(
                format!("busy-{i}"),
                TimedEffect::start(Duration::from_millis(100)),
                Priority::Normal,
            );
        }
        let cards: Vec<ElementId> = (0..6).map(ElementId).collect();
        let report = stage
            .orchestrator()
            .play_enter(
                &cards,
                AnimationOverrides::new()
                    .stagger(Duration::ZERO)
                    .duration(Duration::from_millis(50)),
            )
            .await;
        assert_eq!(report.finished, 6);
        assert_eq!(stage.boundary().count(FailureKind::Animation), 0);
        assert_eq!(stage.orchestrator().tier(), PerformanceTier::High);
        assert_eq!(stage.registry().tier(), PerformanceTier::High);
        assert!(!stage.orchestrator().should_skip());

        let again = stage
            .orchestrator()
            .play_enter(&cards, AnimationOverrides::new().stagger(Duration::ZERO))
            .await;
        assert_eq!(again.started, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_flushes_tasks_and_stops_effects() {
        let stage = stage();
        stage.registry().register(
            "loader",
            TimedEffect::start(Duration::from_secs(60)),
            Priority::Low,
        );
        let orch = stage.orchestrator().clone();
        let cards: Vec<ElementId> = (0..3).map(ElementId).collect();
        let play = tokio::spawn(async move {
            orch.play_exit(
                &cards,
                AnimationOverrides::new()
                    .stagger(Duration::ZERO)
                    .duration(Duration::from_secs(30)),
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stage.registry().live_count(), 4);

        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let r = Arc::clone(&ran);
            stage
                .scheduler()
                .schedule(
                    move || {
                        r.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, Failure>(())
                    },
                    crate::scheduler::TaskOptions::new(),
                )
                .unwrap();
        }
        assert_eq!(stage.scheduler().pending_count(), 3);
        stage.teardown();
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(stage.scheduler().pending_count(), 0);
        assert_eq!(stage.registry().live_count(), 0);
        assert_eq!(stage.orchestrator().tracked_count(), 0);

        let report = play.await.unwrap();
        assert_eq!(report.cancelled, 3);
        assert_eq!(stage.orchestrator().state(), crate::orchestrator::OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn network_failures_show_offline_toast() {
        let toasts = Arc::new(Toasts::default());
        let stage = Stage::builder()
            .with_effects(Arc::new(Timed))
            .with_notifier(toasts.clone())
            .build()
            .unwrap();
        stage
            .boundary()
            .handle("fetch failed", FailureContext::new(FailureKind::Network));

        let shown = toasts.0.lock().unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].message, "fetch failed");
        assert_eq!(shown[1].message, OFFLINE_MESSAGE);
        assert_eq!(shown[1].duration, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn custom_fallbacks_replace_defaults() {
        let reloads = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reloads);
        let stage = Stage::builder()
            .with_effects(Arc::new(Timed))
            .on_fallback(FallbackAction::Reload, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();
        stage.boundary().handle(
            "router crashed",
            FailureContext::new(FailureKind::Navigation).with_severity(Severity::Critical),
        );
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn profile_and_store_are_applied_on_build() {
        let store = Arc::new(MemoryStore::new());
        {
            let first = Stage::builder()
                .with_effects(Arc::new(Timed))
                .with_store(store.clone())
                .build()
                .unwrap();
            first
                .navigation()
                .set_state(NavState::Navigating, serde_json::Map::new())
                .unwrap();
        }

        let stage = Stage::builder()
            .with_effects(Arc::new(Timed))
            .with_store(store)
            .with_profile(Arc::new(StaticProfile::new(PerformanceTier::Low)))
            .build()
            .unwrap();
        assert_eq!(stage.navigation().state(), NavState::Navigating);
        assert_eq!(stage.registry().tier(), PerformanceTier::Low);

        stage.set_tier(PerformanceTier::High);
        assert_eq!(stage.scheduler().tier(), PerformanceTier::High);
        assert_eq!(stage.orchestrator().tier(), PerformanceTier::High);
    }
}
