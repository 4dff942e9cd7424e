//! Priority and performance-tier policies.
//!
//! This module groups the knobs that control **what gets admitted** and
//! **how much runs at once**.
//!
//! ## Contents
//! - [`Priority`] ordering of tasks and effects (low / normal / high)
//! - [`PerformanceTier`] device class selecting a [`TierProfile`]
//! - [`TierProfile`] concurrency ceiling, admission floor, per-frame task budget
//!
//! ## Quick wiring
//! ```text
//! PerformanceTier ──► TierProfile
//!      ├─► registry: max_concurrent, min_priority
//!      ├─► scheduler: tasks_per_frame
//!      └─► orchestrator: headroom ceiling, base animation config, bypass (Reduced)
//! ```

mod priority;
mod tier;

pub use priority::Priority;
pub use tier::{PerformanceTier, TierProfile};
