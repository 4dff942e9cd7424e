//! Failure isolation.
//!
//! Every execution path of the runtime (scheduled tasks, effect callbacks,
//! orchestrated animation steps) funnels its failures through one
//! [`FailureBoundary`], which logs them, rate-limits them per kind, notifies
//! the user for `Medium`+ severities and runs exactly one deterministic
//! [`FallbackAction`] per failure.
//!
//! ## Contents
//! - [`FailureKind`], [`Severity`], [`FailureContext`] failure taxonomy
//! - [`FailureRecord`] audit log entry
//! - [`FallbackAction`] degradation routine selected per `(kind, severity)`
//! - [`FailureBoundary`], [`Handling`] the boundary itself

#[allow(clippy::module_inception)]
mod boundary;
mod fallback;
mod record;

pub use boundary::{FailureBoundary, FallbackFn, Handling, RecoveryFn};
pub use fallback::FallbackAction;
pub use record::{FailureContext, FailureKind, FailureRecord, Severity};

pub(crate) use record::unix_millis;
