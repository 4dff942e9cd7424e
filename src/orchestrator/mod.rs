//! Enter/exit animation sequences.
//!
//! ## Contents
//! - [`AnimationOrchestrator`] batching, staggering, admission and reveal fallback
//! - [`EffectFactory`] where effects come from
//! - [`AnimationConfig`], [`AnimationOverrides`] tier presets and caller overrides
//! - [`Phase`], [`OrchestratorState`], [`SequenceReport`]

#[allow(clippy::module_inception)]
mod orchestrator;
mod preset;

pub use orchestrator::{
    should_skip_animation, AnimationOrchestrator, EffectFactory, OrchestratorDeps,
    OrchestratorState, Phase, SequenceReport,
};
pub use preset::{AnimationConfig, AnimationOverrides};
