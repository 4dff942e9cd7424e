//! # Performance tiers.
//!
//! A [`PerformanceTier`] fixes, through its [`TierProfile`]:
//! - the registry's concurrency ceiling (`max_concurrent`);
//! - the minimum priority admitted once the registry is full (`min_priority`);
//! - how many queued tasks the scheduler runs per animation frame (`tasks_per_frame`).
//!
//! | tier      | max_concurrent | min_priority | tasks_per_frame |
//! |-----------|----------------|--------------|-----------------|
//! | `High`    | 8              | `Normal`     | 10              |
//! | `Medium`  | 6              | `Normal`     | 6               |
//! | `Low`     | 4              | `High`       | 4               |
//! | `Reduced` | 2              | `High`       | 2               |
//!
//! `Reduced` additionally makes the orchestrator skip animation entirely.

use super::Priority;

/// Device/performance class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PerformanceTier {
    /// Capable device; full effects.
    #[default]
    High,
    /// Mid-range device.
    Medium,
    /// Constrained device; fewer concurrent effects.
    Low,
    /// Reduced motion or very weak device; effects are bypassed.
    Reduced,
}

/// Limits attached to a tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierProfile {
    /// Registry concurrency ceiling.
    pub max_concurrent: usize,
    /// Minimum priority admitted when the registry is at capacity.
    pub min_priority: Priority,
    /// Scheduler tasks per animation frame.
    pub tasks_per_frame: usize,
}

impl PerformanceTier {
    /// Returns the limits for this tier.
    pub fn profile(self) -> TierProfile {
        match self {
            PerformanceTier::High => TierProfile {
                max_concurrent: 8,
                min_priority: Priority::Normal,
                tasks_per_frame: 10,
            },
            PerformanceTier::Medium => TierProfile {
                max_concurrent: 6,
                min_priority: Priority::Normal,
                tasks_per_frame: 6,
            },
            PerformanceTier::Low => TierProfile {
                max_concurrent: 4,
                min_priority: Priority::High,
                tasks_per_frame: 4,
            },
            PerformanceTier::Reduced => TierProfile {
                max_concurrent: 2,
                min_priority: Priority::High,
                tasks_per_frame: 2,
            },
        }
    }

    /// Next more conservative tier (`Reduced` stays `Reduced`).
    pub fn downgrade(self) -> Self {
        match self {
            PerformanceTier::High => PerformanceTier::Medium,
            PerformanceTier::Medium => PerformanceTier::Low,
            PerformanceTier::Low | PerformanceTier::Reduced => PerformanceTier::Reduced,
        }
    }

    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            PerformanceTier::High => "high",
            PerformanceTier::Medium => "medium",
            PerformanceTier::Low => "low",
            PerformanceTier::Reduced => "reduced",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_get_more_conservative() {
        let mut tier = PerformanceTier::High;
        let mut last = tier.profile().max_concurrent;
        for _ in 0..3 {
            tier = tier.downgrade();
            let cap = tier.profile().max_concurrent;
            assert!(cap < last, "{tier:?} should lower the ceiling");
            last = cap;
        }
        assert_eq!(tier, PerformanceTier::Reduced);
        assert_eq!(tier.downgrade(), PerformanceTier::Reduced);
    }
}
