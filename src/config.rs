//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings a [`Stage`](crate::Stage) hands
//! to each component it builds.
//!
//! ## Sentinel values
//! - `max_tasks_per_idle = 0` → no per-slot cap (only the idle deadline limits a pass)
//! - `headroom_timeout = 0s` → the orchestrator waits for registry headroom indefinitely
//! - `selector_cache_capacity = 0` → selector caching disabled

use std::time::Duration;

use crate::policies::PerformanceTier;

/// Global configuration for the coordination runtime.
///
/// ## Field semantics
/// - `tier`: Initial performance tier for registry, scheduler and orchestrator
/// - `history_limit`: Navigation transitions kept in memory (oldest dropped)
/// - `failure_log_limit`: Failure records kept by the boundary (oldest dropped)
/// - `failure_ceiling`: Failures per kind that still notify/fall back; later ones are suppressed
/// - `idle_slice_floor`: Minimum idle time left before the scheduler starts another task
/// - `max_tasks_per_idle`: Upper bound on tasks run in one idle slot (`0` = unlimited)
/// - `selector_cache_capacity` / `selector_cache_ttl`: bounds of the selector result cache
/// - `headroom_timeout`: How long an enter batch waits for registry headroom (`0s` = forever)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Initial performance tier.
    ///
    /// Usually replaced at start-up by the [`DeviceProfile`](crate::DeviceProfile)
    /// through [`AnimationOrchestrator::initialize`](crate::AnimationOrchestrator::initialize).
    pub tier: PerformanceTier,

    /// Maximum number of navigation transitions kept in history.
    pub history_limit: usize,

    /// Maximum number of failure records kept in the audit log.
    pub failure_log_limit: usize,

    /// Per-kind failure count after which notifications and fallbacks stop.
    ///
    /// With the default `5`, the sixth failure of one kind is logged only.
    pub failure_ceiling: u32,

    /// Minimum remaining idle time required to start a queued task.
    pub idle_slice_floor: Duration,

    /// Maximum tasks executed in a single idle slot.
    ///
    /// - `0` = unlimited (only the deadline stops the pass)
    /// - `n > 0` = stop after `n` tasks and wait for the next slot
    pub max_tasks_per_idle: usize,

    /// Maximum cached selector results (`0` disables the cache).
    pub selector_cache_capacity: usize,

    /// Lifetime of a cached selector result.
    pub selector_cache_ttl: Duration,

    /// How long the orchestrator waits for registry headroom before giving up on a batch.
    pub headroom_timeout: Duration,
}

impl Config {
    /// Per-idle-slot task cap as an `Option` (`None` = unlimited).
    #[inline]
    pub fn idle_task_cap(&self) -> Option<usize> {
        if self.max_tasks_per_idle == 0 {
            None
        } else {
            Some(self.max_tasks_per_idle)
        }
    }

    /// Headroom wait limit as an `Option` (`None` = wait forever).
    #[inline]
    pub fn headroom_limit(&self) -> Option<Duration> {
        if self.headroom_timeout == Duration::ZERO {
            None
        } else {
            Some(self.headroom_timeout)
        }
    }

    /// History limit clamped to at least one entry.
    #[inline]
    pub fn history_limit_clamped(&self) -> usize {
        self.history_limit.max(1)
    }

    /// Failure log limit clamped to at least one entry.
    #[inline]
    pub fn failure_log_limit_clamped(&self) -> usize {
        self.failure_log_limit.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `tier = High`
    /// - `history_limit = 50`, `failure_log_limit = 100`, `failure_ceiling = 5`
    /// - `idle_slice_floor = 1ms`, `max_tasks_per_idle = 50`
    /// - `selector_cache_capacity = 100`, `selector_cache_ttl = 1s`
    /// - `headroom_timeout = 5s`
    fn default() -> Self {
        Self {
            tier: PerformanceTier::High,
            history_limit: 50,
            failure_log_limit: 100,
            failure_ceiling: 5,
            idle_slice_floor: Duration::from_millis(1),
            max_tasks_per_idle: 50,
            selector_cache_capacity: 100,
            selector_cache_ttl: Duration::from_secs(1),
            headroom_timeout: Duration::from_secs(5),
        }
    }
}
