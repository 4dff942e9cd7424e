//! # Collaborator capabilities: device classification and user notification.

use std::time::Duration;

use crate::boundary::Severity;
use crate::policies::PerformanceTier;

/// Performance/device classifier.
pub trait DeviceProfile: Send + Sync + 'static {
    /// Current device tier.
    fn tier(&self) -> PerformanceTier;

    /// User asked the platform for reduced motion.
    fn prefers_reduced_motion(&self) -> bool;
}

/// [`DeviceProfile`] with fixed answers.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticProfile {
    /// Tier reported by [`DeviceProfile::tier`].
    pub tier: PerformanceTier,
    /// Value reported by [`DeviceProfile::prefers_reduced_motion`].
    pub reduced_motion: bool,
}

impl StaticProfile {
    /// Profile reporting `tier` and no reduced-motion preference.
    pub fn new(tier: PerformanceTier) -> Self {
        Self {
            tier,
            reduced_motion: false,
        }
    }

    /// Profile reporting a reduced-motion preference.
    pub fn reduced_motion() -> Self {
        Self {
            tier: PerformanceTier::High,
            reduced_motion: true,
        }
    }
}

impl DeviceProfile for StaticProfile {
    fn tier(&self) -> PerformanceTier {
        self.tier
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion
    }
}

/// A transient user-facing notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    /// Text shown to the user.
    pub message: String,
    /// Severity of the failure behind the toast.
    pub severity: Severity,
    /// How long the toast stays visible.
    pub duration: Duration,
}

/// Toast/notification surface.
///
/// Optional: without one, failures are only logged.
pub trait Notifier: Send + Sync + 'static {
    /// Shows `toast`.
    fn notify(&self, toast: &Toast);
}
