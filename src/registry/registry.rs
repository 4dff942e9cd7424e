//! # ConcurrencyRegistry: bounded, priority-admitted set of running effects.
//!
//! ## Admission
//! ```text
//! register(id, effect, priority)
//!   ├─► effect not cancellable ──────────────────────────────► reject
//!   ├─► live (excluding id) < capacity ──────────────────────► admit
//!   ├─► priority < tier.min_priority ────────────────────────► reject
//!   ├─► no live entry with strictly lower priority ──────────► reject
//!   ├─► still over capacity after one eviction ──────────────► reject
//!   └─► cancel oldest lowest-priority entry, admit
//! ```
//!
//! ## Rules
//! - `live_count() <= capacity()` after every admission, except for entries
//!   admitted under a capacity that `set_tier` has since lowered; those are
//!   never evicted.
//! - Re-registering a live id cancels the previous effect and replaces it.
//! - Each entry owns a watcher task; the effect's own `finished` notification
//!   removes the entry. A generation number keeps a stale watcher from
//!   removing a newer entry under the same id.
//! - Effect control calls (`cancel`/`pause`/`play`) run outside the lock;
//!   their errors and panics are logged, never propagated.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{EffectOutcome, EffectRef};
use crate::error::{EffectError, Failure};
use crate::events::{Event, EventChannel, EventKind};
use crate::policies::{PerformanceTier, Priority};

struct Entry {
    effect: EffectRef,
    priority: Priority,
    registered_at: Instant,
    generation: u64,
    watcher: CancellationToken,
}

struct RegistryState {
    live: HashMap<String, Entry>,
    tier: PerformanceTier,
    next_generation: u64,
}

struct Shared {
    state: Mutex<RegistryState>,
    bus: EventChannel,
    token: CancellationToken,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: &str, generation: u64, outcome: EffectOutcome) {
        let removed = {
            let mut st = self.lock();
            match st.live.get(id) {
                Some(e) if e.generation == generation => st.live.remove(id),
                _ => None,
            }
        };
        if removed.is_some() {
            tracing::debug!(id, outcome = outcome.as_label(), "effect released");
            self.bus.emit(
                Event::new(EventKind::EffectUnregistered)
                    .with_subject(id)
                    .with_reason(outcome.as_label()),
            );
        }
    }
}

/// Registry of running visual effects.
///
/// Cheap to clone: clones share the same live set.
#[derive(Clone)]
pub struct ConcurrencyRegistry {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for ConcurrencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.lock();
        f.debug_struct("ConcurrencyRegistry")
            .field("tier", &st.tier)
            .field("live", &st.live.len())
            .finish()
    }
}

impl ConcurrencyRegistry {
    /// Creates an empty registry for `tier`.
    pub fn new(bus: EventChannel, tier: PerformanceTier) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(RegistryState {
                    live: HashMap::new(),
                    tier,
                    next_generation: 0,
                }),
                bus,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Admits `effect` under `id` if the admission rules allow it.
    ///
    /// Returns `false` (and changes nothing) on rejection.
    pub fn register(&self, id: impl Into<String>, effect: EffectRef, priority: Priority) -> bool {
        let id = id.into();
        if !effect.is_cancellable() {
            self.reject(&id, priority, "not_cancellable");
            return false;
        }

        let admitted = {
            let mut st = self.inner.lock();
            let profile = st.tier.profile();
            let others = st.live.len() - usize::from(st.live.contains_key(&id));

            let mut evicted = None;
            if others >= profile.max_concurrent {
                if priority < profile.min_priority {
                    drop(st);
                    self.reject(&id, priority, "below_min_priority");
                    return false;
                }
                let victim = st
                    .live
                    .iter()
                    .filter(|(k, e)| **k != id && e.priority < priority)
                    .min_by_key(|(_, e)| (e.priority, e.registered_at, e.generation))
                    .map(|(k, _)| k.clone());
                let Some(victim) = victim else {
                    drop(st);
                    self.reject(&id, priority, "at_capacity");
                    return false;
                };
                if others - 1 >= profile.max_concurrent {
                    drop(st);
                    self.reject(&id, priority, "at_capacity");
                    return false;
                }
                evicted = st.live.remove(&victim).map(|e| (victim, e));
            }

            let replaced = st.live.remove(&id);
            let generation = st.next_generation;
            st.next_generation += 1;
            let watcher = self.inner.token.child_token();
            st.live.insert(
                id.clone(),
                Entry {
                    effect: Arc::clone(&effect),
                    priority,
                    registered_at: Instant::now(),
                    generation,
                    watcher: watcher.clone(),
                },
            );
            (generation, watcher, evicted, replaced)
        };
        let (generation, watcher, evicted, replaced) = admitted;

        if let Some((victim, entry)) = evicted {
            tracing::info!(id = %victim, by = %id, "effect preempted");
            self.stop(&victim, entry, "preempted");
        }
        if let Some(entry) = replaced {
            self.stop(&id, entry, "replaced");
        }

        self.watch(id.clone(), generation, &effect, watcher);
        tracing::debug!(id = %id, priority = priority.as_label(), "effect registered");
        self.inner.bus.emit(
            Event::new(EventKind::EffectRegistered)
                .with_subject(id)
                .with_priority(priority),
        );
        true
    }

    fn reject(&self, id: &str, priority: Priority, reason: &'static str) {
        tracing::debug!(id, priority = priority.as_label(), reason, "effect rejected");
        self.inner.bus.emit(
            Event::new(EventKind::EffectRejected)
                .with_subject(id)
                .with_priority(priority)
                .with_reason(reason),
        );
    }

    fn watch(&self, id: String, generation: u64, effect: &EffectRef, token: CancellationToken) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(id = %id, "no tokio runtime; effect will not deregister on finish");
            return;
        };
        let finished = effect.finished();
        let shared: Weak<Shared> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                outcome = finished => {
                    if let Some(shared) = shared.upgrade() {
                        shared.release(&id, generation, outcome);
                    }
                }
            }
        });
    }

    /// Cancels `entry`'s effect and reports it as gone.
    fn stop(&self, id: &str, entry: Entry, reason: &'static str) {
        entry.watcher.cancel();
        control(id, "cancel", || entry.effect.cancel());
        self.inner.bus.emit(
            Event::new(EventKind::EffectUnregistered)
                .with_subject(id)
                .with_reason(reason),
        );
    }

    /// Forgets `id` without cancelling its effect.
    pub fn unregister(&self, id: &str) -> bool {
        let Some(entry) = self.inner.lock().live.remove(id) else {
            return false;
        };
        entry.watcher.cancel();
        self.inner.bus.emit(
            Event::new(EventKind::EffectUnregistered)
                .with_subject(id)
                .with_reason("unregistered"),
        );
        true
    }

    /// Cancels and forgets `id`.
    pub fn cancel(&self, id: &str) -> bool {
        let Some(entry) = self.inner.lock().live.remove(id) else {
            return false;
        };
        self.stop(id, entry, "cancelled");
        true
    }

    /// Cancels every live effect. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(String, Entry)> = self.inner.lock().live.drain().collect();
        let n = drained.len();
        for (id, entry) in drained {
            self.stop(&id, entry, "cancelled");
        }
        n
    }

    /// Cancels every live effect with priority strictly below `threshold`.
    pub fn cancel_below(&self, threshold: Priority) -> usize {
        let drained: Vec<(String, Entry)> = {
            let mut st = self.inner.lock();
            let ids: Vec<String> = st
                .live
                .iter()
                .filter(|(_, e)| e.priority < threshold)
                .map(|(k, _)| k.clone())
                .collect();
            ids.into_iter()
                .filter_map(|k| st.live.remove(&k).map(|e| (k, e)))
                .collect()
        };
        let n = drained.len();
        for (id, entry) in drained {
            self.stop(&id, entry, "cancelled");
        }
        n
    }

    fn snapshot(&self) -> Vec<(String, EffectRef)> {
        self.inner
            .lock()
            .live
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(&e.effect)))
            .collect()
    }

    /// Pauses every live effect. Returns how many paused without error.
    pub fn pause_all(&self) -> usize {
        self.snapshot()
            .into_iter()
            .filter(|(id, fx)| control(id, "pause", || fx.pause()))
            .count()
    }

    /// Resumes every live effect. Returns how many resumed without error.
    pub fn resume_all(&self) -> usize {
        self.snapshot()
            .into_iter()
            .filter(|(id, fx)| control(id, "play", || fx.play()))
            .count()
    }

    /// Changes the tier. Already admitted effects stay.
    pub fn set_tier(&self, tier: PerformanceTier) {
        let prev = std::mem::replace(&mut self.inner.lock().tier, tier);
        if prev != tier {
            tracing::info!(from = prev.as_label(), to = tier.as_label(), "registry tier changed");
            self.inner.bus.emit(
                Event::new(EventKind::TierChanged).with_change(prev.as_label(), tier.as_label()),
            );
        }
    }

    /// Current tier.
    pub fn tier(&self) -> PerformanceTier {
        self.inner.lock().tier
    }

    /// Current concurrency ceiling.
    pub fn capacity(&self) -> usize {
        self.tier().profile().max_concurrent
    }

    /// Number of live effects.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// True if `id` is live.
    pub fn is_live(&self, id: &str) -> bool {
        self.inner.lock().live.contains_key(id)
    }

    /// True if a new effect would be admitted without preemption.
    pub fn has_headroom(&self) -> bool {
        let st = self.inner.lock();
        st.live.len() < st.tier.profile().max_concurrent
    }

    /// True if an effect of `priority` would currently be admitted.
    pub fn can_register(&self, priority: Priority) -> bool {
        let st = self.inner.lock();
        let profile = st.tier.profile();
        let live = st.live.len();
        if live < profile.max_concurrent {
            return true;
        }
        priority >= profile.min_priority
            && live - 1 < profile.max_concurrent
            && st.live.values().any(|e| e.priority < priority)
    }
}

/// Runs one effect control call, logging errors and panics.
fn control<F>(id: &str, op: &'static str, f: F) -> bool
where
    F: FnOnce() -> Result<(), EffectError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(id, op, label = e.as_label(), error = %e, "effect control failed");
            false
        }
        Err(payload) => {
            let f = Failure::from_panic(payload);
            tracing::error!(id, op, error = %f, "effect control panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TimedEffect;
    use std::time::Duration;

    fn long() -> EffectRef {
        TimedEffect::start(Duration::from_secs(60))
    }

    fn registry(tier: PerformanceTier) -> ConcurrencyRegistry {
        ConcurrencyRegistry::new(EventChannel::new(), tier)
    }

    #[tokio::test(start_paused = true)]
    async fn ninth_normal_effect_is_rejected() {
        let reg = registry(PerformanceTier::High);
        for i in 0..8 {
            assert!(reg.register(format!("fx-{i}"), long(), Priority::Normal));
        }
        assert!(!reg.register("fx-8", long(), Priority::Normal));
        assert_eq!(reg.live_count(), 8);
        assert!(!reg.is_live("fx-8"));
    }

    #[tokio::test(start_paused = true)]
    async fn high_priority_preempts_oldest_lower_entry() {
        let reg = registry(PerformanceTier::High);
        let first = TimedEffect::start(Duration::from_secs(60));
        assert!(reg.register("fx-0", first.clone(), Priority::Normal));
        for i in 1..8 {
            assert!(reg.register(format!("fx-{i}"), long(), Priority::Normal));
        }

        assert!(reg.register("exit", long(), Priority::High));
        assert_eq!(reg.live_count(), 8);
        assert!(!reg.is_live("fx-0"));
        assert_eq!(first.outcome(), Some(EffectOutcome::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn low_tier_refuses_normal_at_capacity() {
        let reg = registry(PerformanceTier::Low);
        for i in 0..4 {
            assert!(reg.register(format!("fx-{i}"), long(), Priority::Low));
        }
        assert!(!reg.can_register(Priority::Normal));
        assert!(!reg.register("n", long(), Priority::Normal));
        assert!(reg.can_register(Priority::High));
        assert!(reg.register("h", long(), Priority::High));
    }

    #[tokio::test(start_paused = true)]
    async fn uncancellable_effect_is_refused() {
        let reg = registry(PerformanceTier::High);
        let fx = TimedEffect::start_with(Duration::from_secs(1), false);
        assert!(!reg.register("pinned", fx, Priority::High));
        assert_eq!(reg.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_effects_leave_the_live_set() {
        let reg = registry(PerformanceTier::High);
        reg.register("short", TimedEffect::start(Duration::from_millis(100)), Priority::Normal);
        reg.register("long", long(), Priority::Normal);
        assert_eq!(reg.live_count(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!reg.is_live("short"));
        assert!(reg.is_live("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn lowering_the_tier_keeps_admitted_effects() {
        let reg = registry(PerformanceTier::High);
        for i in 0..6 {
            reg.register(format!("fx-{i}"), long(), Priority::Normal);
        }
        reg.set_tier(PerformanceTier::Reduced);
        assert_eq!(reg.live_count(), 6);
        assert_eq!(reg.capacity(), 2);
        assert!(!reg.has_headroom());
        assert!(!reg.register("h", long(), Priority::High));
        assert_eq!(reg.live_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_an_id_cancels_the_old_effect() {
        let reg = registry(PerformanceTier::High);
        let old = TimedEffect::start(Duration::from_millis(100));
        reg.register("hero", old.clone(), Priority::Normal);
        reg.register("hero", long(), Priority::Normal);
        assert_eq!(old.outcome(), Some(EffectOutcome::Cancelled));

        // The old watcher must not remove the replacement.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(reg.is_live("hero"));
        assert_eq!(reg.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_paths() {
        let reg = registry(PerformanceTier::High);
        let low = TimedEffect::start(Duration::from_secs(60));
        reg.register("low", low.clone(), Priority::Low);
        reg.register("normal", long(), Priority::Normal);
        reg.register("high", long(), Priority::High);

        assert_eq!(reg.cancel_below(Priority::Normal), 1);
        assert_eq!(low.outcome(), Some(EffectOutcome::Cancelled));
        assert!(reg.cancel("normal"));
        assert!(!reg.cancel("normal"));
        assert!(reg.unregister("high"));
        assert_eq!(reg.cancel_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_reach_every_effect() {
        let reg = registry(PerformanceTier::High);
        let a = TimedEffect::start(Duration::from_millis(100));
        let b = TimedEffect::start(Duration::from_millis(100));
        reg.register("a", a.clone(), Priority::Normal);
        reg.register("b", b.clone(), Priority::Normal);

        assert_eq!(reg.pause_all(), 2);
        assert!(a.is_paused() && b.is_paused());
        assert_eq!(reg.resume_all(), 2);
        assert!(!a.is_paused());
    }
}
