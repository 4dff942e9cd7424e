//! # NavigationMachine: guarded state transitions with history and persistence.
//!
//! ## Rules
//! - `set_state` succeeds only when unlocked **and** the table has a `current → target` edge.
//!   A refused call changes nothing and publishes nothing.
//! - `reset` always succeeds, even while locked, and always lands on `Idle`.
//! - Every successful change is persisted (if a store is attached), appended
//!   to the capped history, published as an [`Event`], then handed to direct
//!   subscribers synchronously.
//! - The store and direct subscribers run outside the internal lock; they may
//!   call back into the machine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{NavState, PersistedState, StateStore};
use crate::boundary::unix_millis;
use crate::config::Config;
use crate::error::TransitionError;
use crate::events::{Channel, Event, EventChannel, EventKind, Subscription};

const TRANSITION_TOPIC: &str = "transition";

/// One recorded state change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State before.
    pub from: NavState,
    /// State after.
    pub to: NavState,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Caller metadata.
    pub metadata: Map<String, Value>,
}

/// Options for [`NavigationMachine::reset`].
#[derive(Clone, Debug, Default)]
pub struct ResetOptions {
    /// Drop the transition history before recording the reset.
    pub clear_history: bool,
    /// Metadata attached to the recorded `→ Idle` transition.
    pub metadata: Map<String, Value>,
}

struct MachineState {
    current: NavState,
    previous: Option<NavState>,
    locked: Option<String>,
    history: VecDeque<Transition>,
}

/// Finite-state machine tracking the navigation/animation phase.
pub struct NavigationMachine {
    state: Mutex<MachineState>,
    bus: EventChannel,
    listeners: Channel<Transition>,
    store: Option<Arc<dyn StateStore>>,
    history_limit: usize,
}

impl std::fmt::Debug for NavigationMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock_state();
        f.debug_struct("NavigationMachine")
            .field("current", &st.current)
            .field("previous", &st.previous)
            .field("locked", &st.locked.is_some())
            .finish()
    }
}

impl NavigationMachine {
    /// Machine starting in `Idle`, without persistence.
    pub fn new(bus: EventChannel, config: &Config) -> Self {
        Self {
            state: Mutex::new(MachineState {
                current: NavState::Idle,
                previous: None,
                locked: None,
                history: VecDeque::new(),
            }),
            bus,
            listeners: Channel::new(),
            store: None,
            history_limit: config.history_limit_clamped(),
        }
    }

    /// Attaches durable storage and restores the state a previous instance wrote there.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        if let Some(saved) = PersistedState::read(store.as_ref()) {
            let mut st = self.lock_state();
            st.current = saved.current_state;
            st.previous = saved.previous_state;
            drop(st);
            tracing::debug!(state = %saved.current_state, "navigation state restored");
        }
        self.store = Some(store);
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> NavState {
        self.lock_state().current
    }

    /// State before the last change.
    pub fn previous_state(&self) -> Option<NavState> {
        self.lock_state().previous
    }

    /// True while `lock` is in effect.
    pub fn is_locked(&self) -> bool {
        self.lock_state().locked.is_some()
    }

    /// True if `set_state(target)` would succeed now.
    pub fn can_transition(&self, target: NavState) -> bool {
        let st = self.lock_state();
        st.locked.is_none() && st.current.can_reach(target)
    }

    /// Moves to `target`.
    pub fn set_state(
        &self,
        target: NavState,
        metadata: Map<String, Value>,
    ) -> Result<Transition, TransitionError> {
        let transition = {
            let mut st = self.lock_state();
            if let Some(reason) = &st.locked {
                let err = TransitionError::Locked {
                    reason: reason.clone(),
                };
                tracing::warn!(from = %st.current, to = %target, reason = %reason, "transition refused: locked");
                return Err(err);
            }
            if !st.current.can_reach(target) {
                tracing::warn!(from = %st.current, to = %target, "transition refused: not in table");
                return Err(TransitionError::Illegal {
                    from: st.current.as_str(),
                    to: target.as_str(),
                });
            }
            self.record(&mut st, target, metadata)
        };

        self.persist(&transition);
        self.publish(EventKind::NavigationChanged, &transition);
        Ok(transition)
    }

    /// Moves to the state named `target` (`"NAVIGATING"`, ...).
    pub fn set_state_named(
        &self,
        target: &str,
        metadata: Map<String, Value>,
    ) -> Result<Transition, TransitionError> {
        let target = target.parse::<NavState>().inspect_err(|e| {
            tracing::warn!(error = %e, "transition refused");
        })?;
        self.set_state(target, metadata)
    }

    /// Returns to `Idle` regardless of lock and table.
    pub fn reset(&self, options: ResetOptions) -> Transition {
        let transition = {
            let mut st = self.lock_state();
            if options.clear_history {
                st.history.clear();
            }
            self.record(&mut st, NavState::Idle, options.metadata)
        };
        self.persist(&transition);
        tracing::info!(from = %transition.from, "navigation reset");
        self.publish(EventKind::NavigationReset, &transition);
        transition
    }

    /// Refuses every `set_state` until [`unlock`](Self::unlock).
    pub fn lock(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.lock_state().locked = Some(reason.clone());
        tracing::debug!(reason = %reason, "navigation locked");
        self.bus
            .emit(Event::new(EventKind::NavigationLocked).with_reason(reason));
    }

    /// Lifts a previous [`lock`](Self::lock).
    pub fn unlock(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.lock_state().locked = None;
        tracing::debug!(reason = %reason, "navigation unlocked");
        self.bus
            .emit(Event::new(EventKind::NavigationUnlocked).with_reason(reason));
    }

    /// Recorded transitions, oldest first.
    pub fn history(&self) -> Vec<Transition> {
        self.lock_state().history.iter().cloned().collect()
    }

    /// Calls `callback` with every transition (including resets).
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Transition) + Send + Sync + 'static,
    {
        self.listeners.subscribe(TRANSITION_TOPIC, callback)
    }

    /// Shortest path between two states; see [`NavState::find_path`].
    pub fn find_path(&self, from: NavState, to: NavState) -> Option<Vec<NavState>> {
        NavState::find_path(from, to)
    }

    fn record(
        &self,
        st: &mut MachineState,
        to: NavState,
        metadata: Map<String, Value>,
    ) -> Transition {
        let transition = Transition {
            from: st.current,
            to,
            timestamp: unix_millis(SystemTime::now()),
            metadata,
        };
        st.previous = Some(st.current);
        st.current = to;
        st.history.push_back(transition.clone());
        while st.history.len() > self.history_limit {
            st.history.pop_front();
        }
        transition
    }

    /// Writes `transition` to the store. Called without the state lock held,
    /// so stores may read the machine.
    fn persist(&self, transition: &Transition) {
        let Some(store) = &self.store else {
            return;
        };
        let saved = PersistedState {
            current_state: transition.to,
            previous_state: Some(transition.from),
            timestamp: transition.timestamp,
        };
        if let Err(e) = saved.write(store.as_ref()) {
            tracing::warn!(error = %e, label = e.as_label(), "navigation state not persisted");
        }
    }

    fn publish(&self, kind: EventKind, transition: &Transition) {
        self.bus.emit(
            Event::new(kind).with_change(transition.from.as_str(), transition.to.as_str()),
        );
        self.listeners.publish(TRANSITION_TOPIC, transition);
    }
}
