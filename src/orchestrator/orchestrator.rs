//! # AnimationOrchestrator: batched, staggered enter/exit sequences.
//!
//! ## Enter
//! ```text
//! for each batch of `batch_size` elements:
//!   ├─► sleep(batch_delay)                       (not before the first batch)
//!   ├─► wait for registry headroom, once per frame (gives up after headroom_timeout)
//!   └─► spawn one runner per element, delayed by stagger × index, priority Normal
//! await every runner
//! ```
//!
//! ## Exit
//! ```text
//! spawn one runner per element, delayed by stagger × index, priority High
//! await every runner
//! ```
//!
//! ## Runner
//! ```text
//! sleep(delay) ─► wait for a slot ─► factory.create (guarded) ─► registry.register ─► await finished
//!                  │ per frame,           │ error/panic              │ rejected
//!                  │ headroom_timeout     │                          │
//!                  └──────────────────────┴────► reveal element ◄────┘
//! ```
//!
//! ## Rules
//! - Empty input, an uninitialized orchestrator, reduced motion and the
//!   `Reduced` tier all return immediately; the last two reveal the elements.
//! - The navigation machine is moved to the matching animating state only
//!   when it is `Navigating`; otherwise it is left alone.
//! - One element's failure never blocks or fails the others.
//! - Factory errors are reported to the boundary as low-severity animation
//!   failures. Running out of registry slots is not; the element is revealed.
//! - The whole sequence runs inside the boundary; if it fails, every element
//!   is revealed.
//! - Reveals are high-priority batch tasks on the scheduler.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::join_all;
use serde_json::Map;
use tokio_util::sync::CancellationToken;

use super::{AnimationConfig, AnimationOverrides};
use crate::boundary::{FailureBoundary, FailureContext, FailureKind, Severity};
use crate::config::Config;
use crate::error::Failure;
use crate::events::{Event, EventChannel, EventKind};
use crate::host::{DeviceProfile, ElementId, Host, Surface};
use crate::navigation::{NavState, NavigationMachine};
use crate::policies::{PerformanceTier, Priority};
use crate::registry::{ConcurrencyRegistry, EffectOutcome, EffectRef};
use crate::scheduler::{TaskOptions, TaskScheduler};

/// Direction of a sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Incoming content.
    Enter,
    /// Outgoing content.
    Exit,
}

impl Phase {
    /// Returns a short stable label for logs and effect ids.
    pub fn as_label(self) -> &'static str {
        match self {
            Phase::Enter => "enter",
            Phase::Exit => "exit",
        }
    }

    fn nav_state(self) -> NavState {
        match self {
            Phase::Enter => NavState::AnimatingEnter,
            Phase::Exit => NavState::AnimatingExit,
        }
    }

    fn priority(self) -> Priority {
        match self {
            Phase::Enter => Priority::Normal,
            Phase::Exit => Priority::High,
        }
    }
}

/// What the orchestrator is doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrchestratorState {
    /// No sequence running.
    #[default]
    Idle,
    /// An enter sequence is running.
    Entering,
    /// An exit sequence is running.
    Exiting,
    /// `pause_all` was called.
    Paused,
    /// `cancel_all` was called during a sequence.
    Cancelled,
}

/// Builds the visual effect for one element.
pub trait EffectFactory: Send + Sync + 'static {
    /// Starts `phase`'s effect on `element`.
    fn create(
        &self,
        element: ElementId,
        phase: Phase,
        config: &AnimationConfig,
    ) -> Result<EffectRef, Failure>;
}

/// Summary of one `play_enter` / `play_exit` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// Effects admitted and awaited.
    pub started: usize,
    /// Effects that ran to completion.
    pub finished: usize,
    /// Effects that were cancelled.
    pub cancelled: usize,
    /// Elements shown without animation.
    pub revealed: usize,
}

enum ElementOutcome {
    Played(EffectOutcome),
    Revealed,
    Skipped,
}

/// Collaborators of an [`AnimationOrchestrator`].
pub struct OrchestratorDeps {
    /// Frame and timer source.
    pub host: Arc<dyn Host>,
    /// Concurrency registry effects are admitted to.
    pub registry: ConcurrencyRegistry,
    /// Scheduler used for reveal writes.
    pub scheduler: TaskScheduler,
    /// Navigation machine moved into the animating states.
    pub machine: Arc<NavigationMachine>,
    /// Boundary wrapping every step.
    pub boundary: Arc<FailureBoundary>,
    /// Event channel.
    pub bus: EventChannel,
    /// Effect source.
    pub factory: Arc<dyn EffectFactory>,
    /// Surface used to reveal elements.
    pub surface: Option<Arc<dyn Surface>>,
    /// Tier and reduced-motion source read by `initialize`.
    pub profile: Option<Arc<dyn DeviceProfile>>,
}

struct Run {
    phase: Phase,
    token: CancellationToken,
}

struct Tracked {
    effect: EffectRef,
}

struct OrchState {
    state: OrchestratorState,
    resume_to: OrchestratorState,
    initialized: bool,
    reduced_motion: bool,
    disabled: bool,
    tier: PerformanceTier,
    runs: HashMap<u64, Run>,
    tracked: HashMap<String, Tracked>,
    next_run: u64,
}

struct Shared {
    state: Mutex<OrchState>,
    deps: OrchestratorDeps,
    headroom_limit: Option<Duration>,
    root: CancellationToken,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Runs enter/exit sequences across many elements.
///
/// Cheap to clone: clones share the same bookkeeping.
#[derive(Clone)]
pub struct AnimationOrchestrator {
    inner: Arc<Shared>,
}

impl fmt::Debug for AnimationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.lock();
        f.debug_struct("AnimationOrchestrator")
            .field("state", &st.state)
            .field("tier", &st.tier)
            .field("tracked", &st.tracked.len())
            .finish()
    }
}

/// Non-owning handle used by fallback bindings.
#[derive(Clone)]
pub(crate) struct WeakOrchestrator(Weak<Shared>);

impl WeakOrchestrator {
    pub(crate) fn upgrade(&self) -> Option<AnimationOrchestrator> {
        self.0.upgrade().map(|inner| AnimationOrchestrator { inner })
    }
}

/// True when animation should be bypassed entirely.
pub fn should_skip_animation(reduced_motion: bool, tier: PerformanceTier) -> bool {
    reduced_motion || tier == PerformanceTier::Reduced
}

impl AnimationOrchestrator {
    /// Creates an uninitialized orchestrator; call [`initialize`](Self::initialize) before playing.
    pub fn new(deps: OrchestratorDeps, config: &Config) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(OrchState {
                    state: OrchestratorState::Idle,
                    resume_to: OrchestratorState::Idle,
                    initialized: false,
                    reduced_motion: false,
                    disabled: false,
                    tier: config.tier,
                    runs: HashMap::new(),
                    tracked: HashMap::new(),
                    next_run: 0,
                }),
                deps,
                headroom_limit: config.headroom_limit(),
                root: CancellationToken::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakOrchestrator {
        WeakOrchestrator(Arc::downgrade(&self.inner))
    }

    /// Reads the device profile (if any) and enables playback.
    pub fn initialize(&self) {
        if let Some(profile) = self.inner.deps.profile.clone() {
            let reduced = profile.prefers_reduced_motion();
            self.inner.lock().reduced_motion = reduced;
            let tier = if reduced {
                PerformanceTier::Reduced
            } else {
                profile.tier()
            };
            self.set_tier(tier);
        }
        self.inner.lock().initialized = true;
        tracing::debug!(tier = self.tier().as_label(), "orchestrator initialized");
    }

    /// True once [`initialize`](Self::initialize) ran.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    /// Changes the tier here, in the registry and in the scheduler.
    pub fn set_tier(&self, tier: PerformanceTier) {
        self.inner.lock().tier = tier;
        self.inner.deps.registry.set_tier(tier);
        self.inner.deps.scheduler.set_tier(tier);
    }

    /// Current tier.
    pub fn tier(&self) -> PerformanceTier {
        self.inner.lock().tier
    }

    /// Records the reduced-motion preference; `true` also forces the `Reduced` tier.
    pub fn set_reduced_motion(&self, reduced: bool) {
        self.inner.lock().reduced_motion = reduced;
        if reduced {
            self.set_tier(PerformanceTier::Reduced);
        }
    }

    /// Bypasses animation from now on.
    pub fn disable_animations(&self) {
        self.inner.lock().disabled = true;
        tracing::info!("animations disabled");
    }

    /// Lifts [`disable_animations`](Self::disable_animations).
    pub fn enable_animations(&self) {
        self.inner.lock().disabled = false;
    }

    /// Moves one tier down.
    pub fn simplify(&self) {
        let tier = self.tier().downgrade();
        tracing::info!(tier = tier.as_label(), "animations simplified");
        self.set_tier(tier);
    }

    /// True if a `play_*` call would bypass animation right now.
    pub fn should_skip(&self) -> bool {
        let st = self.inner.lock();
        st.disabled || should_skip_animation(st.reduced_motion, st.tier)
    }

    /// Current state.
    pub fn state(&self) -> OrchestratorState {
        self.inner.lock().state
    }

    /// Effects currently admitted by this orchestrator.
    pub fn tracked_count(&self) -> usize {
        self.inner.lock().tracked.len()
    }

    /// Runs the enter sequence over `elements`.
    pub async fn play_enter(
        &self,
        elements: &[ElementId],
        overrides: AnimationOverrides,
    ) -> SequenceReport {
        self.play(Phase::Enter, elements, overrides).await
    }

    /// Runs the exit sequence over `elements`.
    pub async fn play_exit(
        &self,
        elements: &[ElementId],
        overrides: AnimationOverrides,
    ) -> SequenceReport {
        self.play(Phase::Exit, elements, overrides).await
    }

    async fn play(
        &self,
        phase: Phase,
        elements: &[ElementId],
        overrides: AnimationOverrides,
    ) -> SequenceReport {
        if elements.is_empty() {
            return SequenceReport::default();
        }
        if !self.is_initialized() {
            tracing::debug!(phase = phase.as_label(), "orchestrator not initialized; ignoring");
            return SequenceReport::default();
        }
        if self.should_skip() {
            return SequenceReport {
                revealed: self.inner.reveal(elements.to_vec()),
                ..SequenceReport::default()
            };
        }

        let machine = &self.inner.deps.machine;
        if machine.state() == NavState::Navigating && machine.can_transition(phase.nav_state()) {
            if let Err(e) = machine.set_state(phase.nav_state(), Map::new()) {
                tracing::debug!(error = %e, "navigation state left unchanged");
            }
        }

        let (run_id, token, config) = {
            let mut st = self.inner.lock();
            let run_id = st.next_run;
            st.next_run += 1;
            let token = self.inner.root.child_token();
            st.runs.insert(
                run_id,
                Run {
                    phase,
                    token: token.clone(),
                },
            );
            st.state = match phase {
                Phase::Enter => OrchestratorState::Entering,
                Phase::Exit => OrchestratorState::Exiting,
            };
            let config = AnimationConfig::for_tier(st.tier, phase).merge(&overrides);
            (run_id, token, config)
        };

        tracing::debug!(phase = phase.as_label(), run = run_id, elements = elements.len(), "sequence started");
        self.inner.deps.bus.emit(
            Event::new(EventKind::AnimationStarted)
                .with_tag(phase.as_label())
                .with_count(elements.len()),
        );

        let ctx = FailureContext::new(FailureKind::Transition)
            .with_meta("phase", phase.as_label())
            .with_meta("elements", elements.len());
        let sequence = Sequence {
            shared: Arc::clone(&self.inner),
            phase,
            run_id,
            token,
            config,
        };
        let report = match self
            .inner
            .deps
            .boundary
            .guard_async(ctx, sequence.run(elements))
            .await
        {
            Some(report) => report,
            None => SequenceReport {
                revealed: self.inner.reveal(elements.to_vec()),
                ..SequenceReport::default()
            },
        };

        {
            let mut st = self.inner.lock();
            st.runs.remove(&run_id);
            if st.runs.is_empty() {
                st.state = OrchestratorState::Idle;
                st.resume_to = OrchestratorState::Idle;
            }
        }
        tracing::debug!(
            phase = phase.as_label(),
            run = run_id,
            finished = report.finished,
            cancelled = report.cancelled,
            revealed = report.revealed,
            "sequence completed"
        );
        self.inner.deps.bus.emit(
            Event::new(EventKind::AnimationCompleted)
                .with_tag(phase.as_label())
                .with_count(elements.len()),
        );
        report
    }

    /// Cancels every running sequence and tracked effect. Returns how many effects were cancelled.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let (runs, tracked) = {
            let mut st = self.inner.lock();
            let runs: Vec<CancellationToken> = st.runs.values().map(|r| r.token.clone()).collect();
            let tracked: Vec<String> = st.tracked.drain().map(|(id, _)| id).collect();
            if !runs.is_empty() {
                st.state = OrchestratorState::Cancelled;
            }
            (runs, tracked)
        };
        self.cancel(reason, runs, tracked)
    }

    /// Cancels sequences and tracked effects whose phase label starts with `prefix`
    /// (`"enter"`, `"exit"`).
    pub fn cancel_by_type(&self, prefix: &str) -> usize {
        let (runs, tracked) = {
            let mut st = self.inner.lock();
            let runs: Vec<CancellationToken> = st
                .runs
                .values()
                .filter(|r| r.phase.as_label().starts_with(prefix))
                .map(|r| r.token.clone())
                .collect();
            let ids: Vec<String> = st
                .tracked
                .keys()
                .filter(|id| id.starts_with(prefix))
                .cloned()
                .collect();
            for id in &ids {
                st.tracked.remove(id);
            }
            (runs, ids)
        };
        self.cancel(prefix, runs, tracked)
    }

    fn cancel(&self, reason: &str, runs: Vec<CancellationToken>, tracked: Vec<String>) -> usize {
        for token in runs {
            token.cancel();
        }
        let n = tracked
            .iter()
            .filter(|id| self.inner.deps.registry.cancel(id))
            .count();
        tracing::info!(reason, cancelled = n, "animations cancelled");
        self.inner.deps.bus.emit(
            Event::new(EventKind::AnimationCancelled)
                .with_reason(reason)
                .with_count(n),
        );
        n
    }

    /// Pauses every tracked effect. Returns how many paused without error.
    ///
    /// The state only becomes `Paused` while a sequence is running.
    pub fn pause_all(&self) -> usize {
        let effects = self.tracked_effects();
        {
            let mut st = self.inner.lock();
            if !st.runs.is_empty() && st.state != OrchestratorState::Paused {
                st.resume_to = st.state;
                st.state = OrchestratorState::Paused;
            }
        }
        effects
            .into_iter()
            .filter(|(id, fx)| effect_call(id, "pause", || fx.pause().map_err(Failure::from)))
            .count()
    }

    /// Resumes every tracked effect. Returns how many resumed without error.
    pub fn resume_all(&self) -> usize {
        let effects = self.tracked_effects();
        {
            let mut st = self.inner.lock();
            if st.state == OrchestratorState::Paused {
                st.state = st.resume_to;
            }
        }
        effects
            .into_iter()
            .filter(|(id, fx)| effect_call(id, "play", || fx.play().map_err(Failure::from)))
            .count()
    }

    fn tracked_effects(&self) -> Vec<(String, EffectRef)> {
        self.inner
            .lock()
            .tracked
            .iter()
            .map(|(id, t)| (id.clone(), Arc::clone(&t.effect)))
            .collect()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, OrchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedules a high-priority write snapping `elements` to their final state.
    fn reveal(&self, elements: Vec<ElementId>) -> usize {
        let Some(surface) = self.deps.surface.clone() else {
            tracing::debug!(elements = elements.len(), "no surface; nothing to reveal");
            return 0;
        };
        let n = elements.len();
        let fallback = elements.clone();
        let opts = TaskOptions::new()
            .priority(Priority::High)
            .batch()
            .failure_context(FailureContext::new(FailureKind::Rendering));
        let write = Arc::clone(&surface);
        let scheduled = self
            .deps
            .scheduler
            .schedule(move || reveal_now(write.as_ref(), &elements), opts);
        if let Err(e) = scheduled {
            tracing::debug!(error = %e, "reveal not scheduled; writing directly");
            if let Err(f) = reveal_now(surface.as_ref(), &fallback) {
                self.deps
                    .boundary
                    .handle(f, FailureContext::new(FailureKind::Rendering));
            }
        }
        n
    }
}

fn reveal_now(surface: &dyn Surface, elements: &[ElementId]) -> Result<(), Failure> {
    for el in elements {
        surface.reveal(*el)?;
    }
    Ok(())
}

fn effect_call(id: &str, op: &'static str, f: impl FnOnce() -> Result<(), Failure>) -> bool {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(id, op, error = %e, "effect control failed");
            false
        }
        Err(payload) => {
            let e = Failure::from_panic(payload);
            tracing::error!(id, op, error = %e, "effect control panicked");
            false
        }
    }
}

/// One `play_*` call in flight.
struct Sequence {
    shared: Arc<Shared>,
    phase: Phase,
    run_id: u64,
    token: CancellationToken,
    config: AnimationConfig,
}

impl Sequence {
    async fn run(self, elements: &[ElementId]) -> Result<SequenceReport, Failure> {
        let mut runners = Vec::with_capacity(elements.len());
        match self.phase {
            Phase::Exit => {
                for (i, el) in elements.iter().enumerate() {
                    runners.push(self.spawn(*el, self.config.stagger_for(i)));
                }
            }
            Phase::Enter => {
                let size = self.config.batch_size.max(1);
                for (b, batch) in elements.chunks(size).enumerate() {
                    if b > 0 && !self.pause(self.config.batch_delay).await {
                        break;
                    }
                    if !self.wait_headroom().await? {
                        break;
                    }
                    for (i, el) in batch.iter().enumerate() {
                        runners.push(self.spawn(*el, self.config.stagger_for(i)));
                    }
                }
            }
        }

        let mut report = SequenceReport::default();
        for outcome in join_all(runners).await {
            match outcome {
                Ok(ElementOutcome::Played(o)) => {
                    report.started += 1;
                    match o {
                        EffectOutcome::Finished => report.finished += 1,
                        EffectOutcome::Cancelled => report.cancelled += 1,
                    }
                }
                Ok(ElementOutcome::Revealed) => report.revealed += 1,
                Ok(ElementOutcome::Skipped) => {}
                Err(e) => {
                    tracing::error!(error = %e, "animation runner aborted");
                }
            }
        }
        Ok(report)
    }

    /// Sleeps unless the run is cancelled first. `false` on cancellation.
    async fn pause(&self, d: Duration) -> bool {
        if d.is_zero() {
            return !self.token.is_cancelled();
        }
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = self.shared.deps.host.sleep(d) => true,
        }
    }

    /// Polls registry headroom once per frame.
    async fn wait_headroom(&self) -> Result<bool, Failure> {
        let host = &self.shared.deps.host;
        let started = host.now();
        loop {
            if self.token.is_cancelled() {
                return Ok(false);
            }
            if self.shared.deps.registry.has_headroom() {
                return Ok(true);
            }
            if let Some(limit) = self.shared.headroom_limit {
                if host.now().saturating_duration_since(started) >= limit {
                    return Err(Failure::new(format!(
                        "no registry headroom within {}ms",
                        limit.as_millis()
                    )));
                }
            }
            tokio::select! {
                _ = self.token.cancelled() => return Ok(false),
                _ = host.next_frame() => {}
            }
        }
    }

    fn spawn(&self, element: ElementId, delay: Duration) -> tokio::task::JoinHandle<ElementOutcome> {
        let runner = Runner {
            shared: Arc::clone(&self.shared),
            phase: self.phase,
            id: format!("{}-{}-{}", self.phase.as_label(), self.run_id, element),
            element,
            token: self.token.clone(),
            config: self.config.clone(),
        };
        tokio::spawn(runner.run(delay))
    }
}

/// One element's effect.
struct Runner {
    shared: Arc<Shared>,
    phase: Phase,
    id: String,
    element: ElementId,
    token: CancellationToken,
    config: AnimationConfig,
}

impl Runner {
    async fn run(self, delay: Duration) -> ElementOutcome {
        if !delay.is_zero() {
            tokio::select! {
                _ = self.token.cancelled() => return ElementOutcome::Skipped,
                _ = self.shared.deps.host.sleep(delay) => {}
            }
        }
        if self.token.is_cancelled() {
            return ElementOutcome::Skipped;
        }

        match self.wait_admission().await {
            Admission::Ready => {}
            Admission::Cancelled => return ElementOutcome::Skipped,
            Admission::TimedOut => {
                tracing::debug!(id = %self.id, "no registry slot; revealing");
                self.shared.reveal(vec![self.element]);
                return ElementOutcome::Revealed;
            }
        }

        let deps = &self.shared.deps;
        let ctx = FailureContext::new(FailureKind::Animation)
            .with_severity(Severity::Low)
            .with_meta("element", self.element.0)
            .with_meta("phase", self.phase.as_label());

        let factory = Arc::clone(&deps.factory);
        let (element, phase, config) = (self.element, self.phase, &self.config);
        let Some(effect) = deps
            .boundary
            .guard(ctx, || factory.create(element, phase, config))
        else {
            self.shared.reveal(vec![self.element]);
            return ElementOutcome::Revealed;
        };

        if !deps
            .registry
            .register(self.id.clone(), Arc::clone(&effect), phase.priority())
        {
            // Lost the slot to a concurrent registration.
            effect_call(&self.id, "cancel", || effect.cancel().map_err(Failure::from));
            tracing::debug!(id = %self.id, "effect not admitted; revealing");
            self.shared.reveal(vec![self.element]);
            return ElementOutcome::Revealed;
        }

        self.shared.lock().tracked.insert(
            self.id.clone(),
            Tracked {
                effect: Arc::clone(&effect),
            },
        );
        let outcome = tokio::select! {
            outcome = effect.finished() => outcome,
            _ = self.token.cancelled() => {
                deps.registry.cancel(&self.id);
                EffectOutcome::Cancelled
            }
        };
        self.shared.lock().tracked.remove(&self.id);
        ElementOutcome::Played(outcome)
    }

    /// Waits, one frame at a time, until the registry would admit this
    /// element's priority.
    async fn wait_admission(&self) -> Admission {
        let deps = &self.shared.deps;
        let priority = self.phase.priority();
        let started = deps.host.now();
        loop {
            if self.token.is_cancelled() {
                return Admission::Cancelled;
            }
            if deps.registry.can_register(priority) {
                return Admission::Ready;
            }
            if let Some(limit) = self.shared.headroom_limit {
                if deps.host.now().saturating_duration_since(started) >= limit {
                    return Admission::TimedOut;
                }
            }
            tokio::select! {
                _ = self.token.cancelled() => return Admission::Cancelled,
                _ = deps.host.next_frame() => {}
            }
        }
    }
}

enum Admission {
    Ready,
    Cancelled,
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ElementPatch, StaticProfile, TokioHost};
    use crate::registry::TimedEffect;

    #[derive(Default)]
    struct Dom {
        revealed: Mutex<Vec<ElementId>>,
    }

    impl Surface for Dom {
        fn append(&self, _: ElementId, _: ElementId) -> Result<(), Failure> {
            Ok(())
        }
        fn remove(&self, _: ElementId) -> Result<(), Failure> {
            Ok(())
        }
        fn patch(&self, _: ElementId, _: &ElementPatch) -> Result<(), Failure> {
            Ok(())
        }
        fn query(&self, _: &str) -> Result<Vec<ElementId>, Failure> {
            Ok(Vec::new())
        }
        fn reveal(&self, el: ElementId) -> Result<(), Failure> {
            self.revealed.lock().unwrap().push(el);
            Ok(())
        }
    }

    /// Timed effects; refuses elements listed in `broken`.
    struct Effects {
        broken: Vec<ElementId>,
        created: Mutex<Vec<(ElementId, Phase, tokio::time::Instant)>>,
    }

    impl EffectFactory for Effects {
        fn create(
            &self,
            element: ElementId,
            phase: Phase,
            config: &AnimationConfig,
        ) -> Result<EffectRef, Failure> {
            if self.broken.contains(&element) {
                return Err(Failure::new("keyframes rejected"));
            }
            self.created
                .lock()
                .unwrap()
                .push((element, phase, tokio::time::Instant::now()));
            Ok(TimedEffect::start(config.duration))
        }
    }

    struct Fixture {
        orchestrator: AnimationOrchestrator,
        registry: ConcurrencyRegistry,
        scheduler: TaskScheduler,
        machine: Arc<NavigationMachine>,
        boundary: Arc<FailureBoundary>,
        dom: Arc<Dom>,
        effects: Arc<Effects>,
    }

    fn fixture(broken: Vec<ElementId>, profile: Option<StaticProfile>) -> Fixture {
        let cfg = Config::default();
        let bus = EventChannel::new();
        let host: Arc<dyn Host> = Arc::new(TokioHost::new());
        let dom = Arc::new(Dom::default());
        let effects = Arc::new(Effects {
            broken,
            created: Mutex::new(Vec::new()),
        });
        let registry = ConcurrencyRegistry::new(bus.clone(), cfg.tier);
        let boundary = Arc::new(FailureBoundary::new(bus.clone(), &cfg));
        let scheduler = TaskScheduler::new(
            Arc::clone(&host),
            registry.clone(),
            Arc::clone(&boundary),
            bus.clone(),
            Some(dom.clone()),
            &cfg,
        );
        let machine = Arc::new(NavigationMachine::new(bus.clone(), &cfg));
        let orchestrator = AnimationOrchestrator::new(
            OrchestratorDeps {
                host,
                registry: registry.clone(),
                scheduler: scheduler.clone(),
                machine: Arc::clone(&machine),
                boundary: Arc::clone(&boundary),
                bus,
                factory: effects.clone(),
                surface: Some(dom.clone()),
                profile: profile.map(|p| Arc::new(p) as Arc<dyn DeviceProfile>),
            },
            &cfg,
        );
        orchestrator.initialize();
        Fixture {
            orchestrator,
            registry,
            scheduler,
            machine,
            boundary,
            dom,
            effects,
        }
    }

    fn els(ids: std::ops::Range<u64>) -> Vec<ElementId> {
        ids.map(ElementId).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_is_a_no_op() {
        let fx = fixture(Vec::new(), None);
        fx.machine.set_state(NavState::Navigating, Map::new()).unwrap();

        let report = fx.orchestrator.play_enter(&[], AnimationOverrides::new()).await;
        assert_eq!(report, SequenceReport::default());
        assert_eq!(fx.machine.state(), NavState::Navigating);
        assert_eq!(fx.registry.live_count(), 0);
        assert!(fx.effects.created.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn uninitialized_orchestrator_does_nothing() {
        let fx = fixture(Vec::new(), None);
        let fresh = AnimationOrchestrator::new(
            OrchestratorDeps {
                host: Arc::new(TokioHost::new()),
                registry: fx.registry.clone(),
                scheduler: fx.scheduler.clone(),
                machine: Arc::clone(&fx.machine),
                boundary: Arc::clone(&fx.boundary),
                bus: EventChannel::new(),
                factory: fx.effects.clone(),
                surface: None,
                profile: None,
            },
            &Config::default(),
        );
        let report = fresh.play_exit(&els(0..3), AnimationOverrides::new()).await;
        assert_eq!(report, SequenceReport::default());
        assert!(fx.effects.created.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exit_survives_one_broken_element() {
        let fx = fixture(vec![ElementId(1)], None);
        fx.machine.set_state(NavState::Navigating, Map::new()).unwrap();

        let report = fx
            .orchestrator
            .play_exit(&[ElementId(1), ElementId(2)], AnimationOverrides::new())
            .await;
        assert_eq!(report.finished, 1);
        assert_eq!(report.revealed, 1);
        assert_eq!(fx.machine.state(), NavState::AnimatingExit);
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
        assert_eq!(fx.boundary.count(FailureKind::Animation), 1);

        fx.scheduler.wait_idle().await;
        assert_eq!(*fx.dom.revealed.lock().unwrap(), vec![ElementId(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn enter_runs_in_batches_and_leaves_state_alone_unless_navigating() {
        let fx = fixture(Vec::new(), None);
        let report = fx
            .orchestrator
            .play_enter(
                &els(0..10),
                AnimationOverrides::new()
                    .batch_size(4)
                    .stagger(Duration::ZERO)
                    .duration(Duration::from_millis(50)),
            )
            .await;
        assert_eq!(report.started, 10);
        assert_eq!(report.finished, 10);
        assert_eq!(fx.machine.state(), NavState::Idle);
        assert_eq!(fx.registry.live_count(), 0);
        assert_eq!(fx.orchestrator.tracked_count(), 0);

        let created = fx.effects.created.lock().unwrap();
        let mut ids: Vec<u64> = created.iter().map(|(el, _, _)| el.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert!(created.iter().all(|(_, p, _)| *p == Phase::Enter));

        let at = |id: u64| created.iter().find(|(el, _, _)| el.0 == id).map(|c| c.2).unwrap();
        assert_eq!(at(3), at(0));
        assert!(at(4) - at(0) >= Duration::from_millis(100));
        assert!(at(8) - at(4) >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn reduced_motion_reveals_without_animating() {
        let fx = fixture(Vec::new(), Some(StaticProfile::reduced_motion()));
        assert!(fx.orchestrator.should_skip());
        assert_eq!(fx.registry.tier(), PerformanceTier::Reduced);

        let report = fx
            .orchestrator
            .play_enter(&els(0..3), AnimationOverrides::new())
            .await;
        assert_eq!(report.revealed, 3);
        assert!(fx.effects.created.lock().unwrap().is_empty());
        fx.scheduler.wait_idle().await;
        assert_eq!(fx.dom.revealed.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_a_running_sequence() {
        let fx = fixture(Vec::new(), None);
        let orch = fx.orchestrator.clone();
        let play = tokio::spawn(async move {
            orch.play_exit(
                &els(0..3),
                AnimationOverrides::new().duration(Duration::from_secs(30)),
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.orchestrator.tracked_count(), 3);
        assert_eq!(fx.orchestrator.pause_all(), 3);
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Paused);
        assert_eq!(fx.orchestrator.resume_all(), 3);
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Exiting);

        assert_eq!(fx.orchestrator.cancel_all("navigation aborted"), 3);
        let report = play.await.unwrap();
        assert_eq!(report.cancelled, 3);
        assert_eq!(fx.registry.live_count(), 0);
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_headroom_degrades_to_reveal() {
        let fx = fixture(Vec::new(), None);
        for i in 0..8 {
            fx.registry.register(
                format!("busy-{i}"),
                TimedEffect::start(Duration::from_secs(600)),
                Priority::High,
            );
        }
        let report = fx
            .orchestrator
            .play_enter(&els(0..2), AnimationOverrides::new())
            .await;
        assert_eq!(report.revealed, 2);
        assert_eq!(fx.boundary.count(FailureKind::Transition), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn headroom_wait_resumes_once_slots_free() {
        let fx = fixture(Vec::new(), None);
        let began = tokio::time::Instant::now();
        for i in 0..8 {
            fx.registry.register(
                format!("busy-{i}"),
                TimedEffect::start(Duration::from_millis(100)),
                Priority::High,
            );
        }
        let report = fx
            .orchestrator
            .play_enter(
                &els(0..3),
                AnimationOverrides::new()
                    .stagger(Duration::ZERO)
                    .duration(Duration::from_millis(50)),
            )
            .await;
        assert_eq!(report.started, 3);
        assert_eq!(report.finished, 3);
        assert_eq!(report.revealed, 0);
        assert_eq!(fx.boundary.count(FailureKind::Transition), 0);

        let created = fx.effects.created.lock().unwrap();
        assert_eq!(created.len(), 3);
        assert!(created
            .iter()
            .all(|(_, _, at)| *at - began >= Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn runners_wait_for_slots_instead_of_failing() {
        let fx = fixture(Vec::new(), None);
        for i in 0..7 {
            fx.registry.register(
                format!("busy-{i}"),
                TimedEffect::start(Duration::from_millis(100)),
                Priority::Normal,
            );
        }
        let report = fx
            .orchestrator
            .play_enter(
                &els(0..6),
                AnimationOverrides::new()
                    .stagger(Duration::ZERO)
                    .duration(Duration::from_millis(50)),
            )
            .await;
        assert_eq!(report.finished, 6);
        assert_eq!(report.revealed, 0);
        assert_eq!(fx.boundary.count(FailureKind::Animation), 0);
        assert_eq!(fx.orchestrator.tier(), PerformanceTier::High);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_by_type_leaves_other_phases_running() {
        let fx = fixture(Vec::new(), None);
        let orch = fx.orchestrator.clone();
        let exit = tokio::spawn(async move {
            orch.play_exit(
                &els(0..3),
                AnimationOverrides::new()
                    .stagger(Duration::ZERO)
                    .duration(Duration::from_secs(1)),
            )
            .await
        });
        let orch = fx.orchestrator.clone();
        let enter = tokio::spawn(async move {
            orch.play_enter(
                &els(10..13),
                AnimationOverrides::new()
                    .stagger(Duration::ZERO)
                    .duration(Duration::from_secs(30)),
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.orchestrator.tracked_count(), 6);
        assert_eq!(fx.orchestrator.cancel_by_type("enter"), 3);
        assert_eq!(fx.orchestrator.tracked_count(), 3);

        let entered = enter.await.unwrap();
        assert_eq!(entered.cancelled, 3);
        assert_eq!(entered.finished, 0);
        let exited = exit.await.unwrap();
        assert_eq!(exited.finished, 3);
        assert_eq!(exited.cancelled, 0);
        assert_eq!(fx.registry.live_count(), 0);
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_without_a_sequence_keeps_state() {
        let fx = fixture(Vec::new(), None);
        assert_eq!(fx.orchestrator.pause_all(), 0);
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
        assert_eq!(fx.orchestrator.resume_all(), 0);
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
    }

    #[test]
    fn skip_decision_is_pure() {
        assert!(should_skip_animation(true, PerformanceTier::High));
        assert!(should_skip_animation(false, PerformanceTier::Reduced));
        assert!(!should_skip_animation(false, PerformanceTier::Low));
    }
}
