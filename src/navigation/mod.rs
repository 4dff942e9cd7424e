//! Navigation phase tracking.
//!
//! ## Contents
//! - [`NavState`] states, transition table and shortest-path search
//! - [`NavigationMachine`], [`Transition`], [`ResetOptions`] the guarded machine
//! - [`StateStore`], [`MemoryStore`], [`PersistedState`] cross-reload persistence

mod machine;
mod state;
mod store;

pub use machine::{NavigationMachine, ResetOptions, Transition};
pub use state::NavState;
pub use store::{MemoryStore, PersistedState, StateStore, STATE_KEY};
