//! # Cross-reload persistence of the navigation state.
//!
//! The machine writes one small record under the `"navigationState"` key of
//! the host's current history entry, leaving every other key of that entry
//! untouched:
//!
//! ```json
//! { "scrollY": 120, "navigationState": { "currentState": "NAVIGATING", "previousState": "IDLE", "timestamp": 1712000000000 } }
//! ```

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::NavState;
use crate::error::StoreError;

/// Key of the persisted record inside the history entry.
pub const STATE_KEY: &str = "navigationState";

/// Durable storage for the current history entry's data.
pub trait StateStore: Send + Sync + 'static {
    /// Returns the entry data, if any.
    fn load(&self) -> Option<Value>;

    /// Replaces the entry data.
    fn save(&self, entry: Value) -> Result<(), StoreError>;
}

/// Record persisted on every successful transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// State after the transition.
    pub current_state: NavState,
    /// State before the transition.
    pub previous_state: Option<NavState>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    current_state: String,
    #[serde(default)]
    previous_state: Option<String>,
    #[serde(default)]
    timestamp: u64,
}

impl PersistedState {
    /// Merges `self` into `store`'s entry under [`STATE_KEY`].
    pub(crate) fn write(&self, store: &dyn StateStore) -> Result<(), StoreError> {
        let mut entry = match store.load() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        entry.insert(STATE_KEY.to_string(), serde_json::to_value(self)?);
        store.save(Value::Object(entry))
    }

    /// Reads the record back; `None` when absent or naming an unknown state.
    pub(crate) fn read(store: &dyn StateStore) -> Option<Self> {
        let raw = store.load()?.get(STATE_KEY)?.clone();
        let raw: RawState = serde_json::from_value(raw).ok()?;
        let current_state = raw.current_state.parse().ok()?;
        let previous_state = match raw.previous_state {
            Some(name) => Some(name.parse().ok()?),
            None => None,
        };
        Some(Self {
            current_state,
            previous_state,
            timestamp: raw.timestamp,
        })
    }
}

/// In-memory [`StateStore`]; a "reload" is a new machine over the same store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entry: Mutex<Option<Value>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `entry`.
    pub fn with_entry(entry: Value) -> Self {
        Self {
            entry: Mutex::new(Some(entry)),
        }
    }

    /// Current entry data.
    pub fn entry(&self) -> Option<Value> {
        self.entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Option<Value> {
        self.entry()
    }

    fn save(&self, entry: Value) -> Result<(), StoreError> {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_keeps_foreign_keys() {
        let store = MemoryStore::with_entry(json!({ "scrollY": 120 }));
        let rec = PersistedState {
            current_state: NavState::Navigating,
            previous_state: Some(NavState::Idle),
            timestamp: 7,
        };
        rec.write(&store).unwrap();

        let entry = store.entry().unwrap();
        assert_eq!(entry["scrollY"], 120);
        assert_eq!(entry[STATE_KEY]["currentState"], "NAVIGATING");
        assert_eq!(PersistedState::read(&store), Some(rec));
    }

    #[test]
    fn unknown_state_is_not_restored() {
        let store = MemoryStore::with_entry(json!({
            STATE_KEY: { "currentState": "WARPING", "previousState": "IDLE", "timestamp": 1 }
        }));
        assert_eq!(PersistedState::read(&store), None);
    }
}
