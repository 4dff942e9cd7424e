//! # Fallback selection.
//!
//! Exactly one [`FallbackAction`] is selected per `(kind, severity)` pair:
//!
//! | kind         | Low                  | Medium               | High                | Critical            |
//! |--------------|----------------------|----------------------|---------------------|---------------------|
//! | `Animation`  | `SimplifyAnimations` | `SimplifyAnimations` | `DisableAnimations` | `DisableAnimations` |
//! | `Transition` | `SkipTransition`     | `SkipTransition`     | `SkipTransition`    | `Reload`            |
//! | `Navigation` | `ResetState`         | `ResetState`         | `ResetState`        | `Reload`            |
//! | `Rendering`  | `None`               | `SimplifyAnimations` | `DisableAnimations` | `DisableAnimations` |
//! | `State`      | `ResetState`         | `ResetState`         | `ResetState`        | `ResetState`        |
//! | `Network`    | `ShowOffline`        | `ShowOffline`        | `ShowOffline`       | `ShowOffline`       |
//! | `Unknown`    | `None`               | `None`               | `None`              | `Reload`            |
//!
//! The actions themselves are bound by the embedder (usually the
//! [`Stage`](crate::Stage)) through [`FailureBoundary::on_fallback`](super::FailureBoundary::on_fallback).

use super::{FailureKind, Severity};

/// Degradation routine run for a qualifying failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FallbackAction {
    /// Nothing beyond logging.
    None,
    /// Turn animation off entirely (reduced-motion bypass).
    DisableAnimations,
    /// Downgrade to a more conservative performance tier.
    SimplifyAnimations,
    /// Cancel in-flight transition effects and show final state.
    SkipTransition,
    /// Reset the navigation state machine to idle.
    ResetState,
    /// Show an offline notice.
    ShowOffline,
    /// Reload-class recovery supplied by the embedder.
    Reload,
}

impl FallbackAction {
    /// Selects the action for a failure.
    pub fn select(kind: FailureKind, severity: Severity) -> Self {
        use FailureKind as K;
        use Severity as S;

        match (kind, severity) {
            (K::Animation, S::High | S::Critical) => FallbackAction::DisableAnimations,
            (K::Animation, _) => FallbackAction::SimplifyAnimations,
            (K::Transition | K::Navigation | K::Unknown, S::Critical) => FallbackAction::Reload,
            (K::Transition, _) => FallbackAction::SkipTransition,
            (K::Navigation | K::State, _) => FallbackAction::ResetState,
            (K::Rendering, S::Low) => FallbackAction::None,
            (K::Rendering, S::Medium) => FallbackAction::SimplifyAnimations,
            (K::Rendering, _) => FallbackAction::DisableAnimations,
            (K::Network, _) => FallbackAction::ShowOffline,
            (K::Unknown, _) => FallbackAction::None,
        }
    }

    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            FallbackAction::None => "none",
            FallbackAction::DisableAnimations => "disable_animations",
            FallbackAction::SimplifyAnimations => "simplify_animations",
            FallbackAction::SkipTransition => "skip_transition",
            FallbackAction::ResetState => "reset_state",
            FallbackAction::ShowOffline => "show_offline",
            FallbackAction::Reload => "reload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animation_severity_picks_strength() {
        assert_eq!(
            FallbackAction::select(FailureKind::Animation, Severity::High),
            FallbackAction::DisableAnimations
        );
        for s in [Severity::Low, Severity::Medium] {
            assert_eq!(
                FallbackAction::select(FailureKind::Animation, s),
                FallbackAction::SimplifyAnimations
            );
        }
    }

    #[test]
    fn state_always_resets() {
        for s in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical] {
            assert_eq!(
                FallbackAction::select(FailureKind::State, s),
                FallbackAction::ResetState
            );
        }
    }

    #[test]
    fn network_shows_offline_notice() {
        assert_eq!(
            FallbackAction::select(FailureKind::Network, Severity::Low),
            FallbackAction::ShowOffline
        );
    }
}
