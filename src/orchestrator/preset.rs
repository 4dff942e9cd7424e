//! # Animation timing presets and caller overrides.
//!
//! [`AnimationConfig::for_tier`] picks the base timing for a phase and scales
//! it down for weaker tiers; [`AnimationConfig::merge`] then applies whatever
//! the caller set in [`AnimationOverrides`], field by field.
//!
//! | tier      | time scale | batch size |
//! |-----------|------------|------------|
//! | `High`    | 1.0        | 6          |
//! | `Medium`  | 0.8        | 4          |
//! | `Low`     | 0.6        | 3          |
//! | `Reduced` | 0          | 1          |

use std::time::Duration;

use super::Phase;
use crate::policies::PerformanceTier;

const ENTER_DURATION: Duration = Duration::from_millis(400);
const ENTER_STAGGER: Duration = Duration::from_millis(50);
const EXIT_DURATION: Duration = Duration::from_millis(250);
const EXIT_STAGGER: Duration = Duration::from_millis(30);
const BATCH_DELAY: Duration = Duration::from_millis(100);
const EASE_OUT: &str = "cubic-bezier(0.22, 1, 0.36, 1)";
const EASE_IN: &str = "cubic-bezier(0.64, 0, 0.78, 0)";

/// Fully resolved timing of one enter/exit sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationConfig {
    /// Length of each element's effect.
    pub duration: Duration,
    /// Delay added per element index within a batch.
    pub stagger: Duration,
    /// Elements started per batch (enter only).
    pub batch_size: usize,
    /// Pause between two enter batches.
    pub batch_delay: Duration,
    /// Easing curve handed to the effect factory.
    pub easing: String,
}

/// Caller-supplied replacements; `None` keeps the preset value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimationOverrides {
    /// Replaces [`AnimationConfig::duration`].
    pub duration: Option<Duration>,
    /// Replaces [`AnimationConfig::stagger`].
    pub stagger: Option<Duration>,
    /// Replaces [`AnimationConfig::batch_size`].
    pub batch_size: Option<usize>,
    /// Replaces [`AnimationConfig::batch_delay`].
    pub batch_delay: Option<Duration>,
    /// Replaces [`AnimationConfig::easing`].
    pub easing: Option<String>,
}

impl AnimationOverrides {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the duration.
    pub fn duration(mut self, d: Duration) -> Self {
        self.duration = Some(d);
        self
    }

    /// Overrides the stagger.
    pub fn stagger(mut self, d: Duration) -> Self {
        self.stagger = Some(d);
        self
    }

    /// Overrides the batch size.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }

    /// Overrides the delay between batches.
    pub fn batch_delay(mut self, d: Duration) -> Self {
        self.batch_delay = Some(d);
        self
    }

    /// Overrides the easing curve.
    pub fn easing(mut self, easing: impl Into<String>) -> Self {
        self.easing = Some(easing.into());
        self
    }
}

impl AnimationConfig {
    /// Preset for `phase` on a capable device.
    pub fn base(phase: Phase) -> Self {
        match phase {
            Phase::Enter => Self {
                duration: ENTER_DURATION,
                stagger: ENTER_STAGGER,
                batch_size: 6,
                batch_delay: BATCH_DELAY,
                easing: EASE_OUT.to_string(),
            },
            Phase::Exit => Self {
                duration: EXIT_DURATION,
                stagger: EXIT_STAGGER,
                batch_size: 6,
                batch_delay: Duration::ZERO,
                easing: EASE_IN.to_string(),
            },
        }
    }

    /// Preset for `phase`, scaled for `tier`.
    pub fn for_tier(tier: PerformanceTier, phase: Phase) -> Self {
        let base = Self::base(phase);
        let (scale, batch_size) = match tier {
            PerformanceTier::High => return base,
            PerformanceTier::Medium => (0.8, 4),
            PerformanceTier::Low => (0.6, 3),
            PerformanceTier::Reduced => (0.0, 1),
        };
        Self {
            duration: base.duration.mul_f64(scale),
            stagger: base.stagger.mul_f64(scale),
            batch_size,
            batch_delay: base.batch_delay.mul_f64(scale),
            easing: base.easing,
        }
    }

    /// Applies every set field of `overrides`.
    pub fn merge(self, overrides: &AnimationOverrides) -> Self {
        Self {
            duration: overrides.duration.unwrap_or(self.duration),
            stagger: overrides.stagger.unwrap_or(self.stagger),
            batch_size: overrides.batch_size.unwrap_or(self.batch_size).max(1),
            batch_delay: overrides.batch_delay.unwrap_or(self.batch_delay),
            easing: overrides.easing.clone().unwrap_or(self.easing),
        }
    }

    /// Start delay of the element at `index` within its batch.
    pub fn stagger_for(&self, index: usize) -> Duration {
        self.stagger
            .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weaker_tiers_are_faster_and_smaller() {
        let high = AnimationConfig::for_tier(PerformanceTier::High, Phase::Enter);
        let low = AnimationConfig::for_tier(PerformanceTier::Low, Phase::Enter);
        assert!(low.duration < high.duration);
        assert!(low.batch_size < high.batch_size);
        assert_eq!(
            AnimationConfig::for_tier(PerformanceTier::Reduced, Phase::Exit).duration,
            Duration::ZERO
        );
    }

    #[test]
    fn merge_replaces_only_set_fields() {
        let base = AnimationConfig::base(Phase::Enter);
        let merged = base.clone().merge(
            &AnimationOverrides::new()
                .stagger(Duration::from_millis(10))
                .batch_size(0),
        );
        assert_eq!(merged.stagger, Duration::from_millis(10));
        assert_eq!(merged.batch_size, 1);
        assert_eq!(merged.duration, base.duration);
        assert_eq!(merged.easing, base.easing);
    }

    #[test]
    fn stagger_grows_with_index() {
        let cfg = AnimationConfig::base(Phase::Exit);
        assert_eq!(cfg.stagger_for(0), Duration::ZERO);
        assert_eq!(cfg.stagger_for(3), Duration::from_millis(90));
    }
}
