//! Concurrency-limited registry of running visual effects.
//!
//! ## Contents
//! - [`Effect`], [`EffectRef`], [`EffectOutcome`] what the registry controls
//! - [`TimedEffect`] tokio-time effect for tests and headless hosts
//! - [`ConcurrencyRegistry`] admission, auto-deregistration, bulk control

mod effect;
#[allow(clippy::module_inception)]
mod registry;

pub use effect::{Effect, EffectOutcome, EffectRef, TimedEffect};
pub use registry::ConcurrencyRegistry;
