//! Error types used by the stagehand runtime and its collaborators.
//!
//! This module defines the normalized [`Failure`] that every execution path
//! funnels into, plus one enum per component for the refusals a caller may
//! want to match on:
//!
//! - [`ScheduleError`]: why the scheduler refused a task.
//! - [`TransitionError`]: why the navigation machine refused a transition.
//! - [`EffectError`]: why an effect could not be cancelled/paused/played.
//! - [`StoreError`]: why navigation state could not be persisted.
//! - [`BuildError`]: why a [`Stage`](crate::Stage) could not be assembled.
//!
//! All enums provide `as_label` (stable snake_case, for logs) and `as_message`.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// # Normalized failure.
///
/// Whatever went wrong (an error value, a bare string, a panic payload) is
/// turned into a `Failure` before it reaches the
/// [`FailureBoundary`](crate::FailureBoundary).
///
/// ```
/// use stagehand::Failure;
///
/// let f = Failure::from("selector not found");
/// assert_eq!(f.to_string(), "selector not found");
/// assert_eq!(f.as_label(), "failure");
/// ```
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct Failure {
    message: Arc<str>,
    label: &'static str,
}

impl Failure {
    /// Creates a failure from any message.
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self {
            message: message.into(),
            label: "failure",
        }
    }

    /// Wraps an arbitrary error value, keeping its display text.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(err.to_string())
    }

    /// Converts a caught panic payload into a failure.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(payload.as_ref()).into(),
            label: "panic",
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        self.label
    }

    /// Returns the failure message.
    pub fn as_message(&self) -> &str {
        &self.message
    }

    /// True when the failure originated from a caught panic.
    pub fn is_panic(&self) -> bool {
        self.label == "panic"
    }

    fn labelled(label: &'static str, message: String) -> Self {
        Self {
            message: message.into(),
            label,
        }
    }
}

impl From<&str> for Failure {
    fn from(value: &str) -> Self {
        Failure::new(value)
    }
}

impl From<String> for Failure {
    fn from(value: String) -> Self {
        Failure::new(value)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Failure {
    fn from(value: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Failure::new(value.to_string())
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// # Errors returned by [`TaskScheduler::schedule`](crate::TaskScheduler::schedule).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The scheduler was disabled with `set_enabled(false)`.
    #[error("scheduler is disabled")]
    Disabled,

    /// A live (pending or executing) task already uses this id.
    #[error("task id {id:?} is already live")]
    DuplicateId {
        /// The conflicting id.
        id: String,
    },

    /// A batch operation needs a [`Surface`](crate::Surface) and none was configured.
    #[error("no surface configured for batch operations")]
    NoSurface,
}

impl ScheduleError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScheduleError::Disabled => "schedule_disabled",
            ScheduleError::DuplicateId { .. } => "schedule_duplicate_id",
            ScheduleError::NoSurface => "schedule_no_surface",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

impl From<ScheduleError> for Failure {
    fn from(value: ScheduleError) -> Self {
        Failure::labelled(value.as_label(), value.to_string())
    }
}

/// # Errors returned by [`NavigationMachine::set_state`](crate::NavigationMachine::set_state).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The machine is locked; only `reset` may change state.
    #[error("state machine locked ({reason})")]
    Locked {
        /// Reason passed to `lock`.
        reason: String,
    },

    /// The transition table has no `from → to` edge.
    #[error("illegal transition {from} -> {to}")]
    Illegal {
        /// Current state label.
        from: &'static str,
        /// Requested state label.
        to: &'static str,
    },

    /// The requested state name is not a recognized state.
    #[error("unknown state {name:?}")]
    UnknownState {
        /// The name that failed to parse.
        name: String,
    },
}

impl TransitionError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransitionError::Locked { .. } => "transition_locked",
            TransitionError::Illegal { .. } => "transition_illegal",
            TransitionError::UnknownState { .. } => "transition_unknown_state",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

impl From<TransitionError> for Failure {
    fn from(value: TransitionError) -> Self {
        Failure::labelled(value.as_label(), value.to_string())
    }
}

/// # Errors raised by an [`Effect`](crate::Effect) control call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// The effect does not support this operation.
    #[error("effect does not support {op}")]
    Unsupported {
        /// Operation name (`cancel`, `pause`, `play`).
        op: &'static str,
    },

    /// The operation was attempted and failed.
    #[error("effect {op} failed: {reason}")]
    Failed {
        /// Operation name.
        op: &'static str,
        /// Collaborator-supplied reason.
        reason: String,
    },
}

impl EffectError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EffectError::Unsupported { .. } => "effect_unsupported",
            EffectError::Failed { .. } => "effect_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

impl From<EffectError> for Failure {
    fn from(value: EffectError) -> Self {
        Failure::labelled(value.as_label(), value.to_string())
    }
}

/// # Errors raised by a [`StateStore`](crate::StateStore).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// The record could not be converted to JSON.
    #[error("serialize navigation state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backing storage refused the write.
    #[error("state store unavailable: {reason}")]
    Unavailable {
        /// Collaborator-supplied reason.
        reason: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Serialize(_) => "store_serialize",
            StoreError::Unavailable { .. } => "store_unavailable",
        }
    }
}

/// # Errors returned by [`StageBuilder::build`](crate::StageBuilder::build).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The orchestrator cannot start any effect without a factory.
    #[error("no effect factory configured; call with_effects()")]
    MissingEffectFactory,
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::MissingEffectFactory => "build_missing_effect_factory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_failures() {
        let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        let f = Failure::from_panic(caught);
        assert!(f.is_panic());
        assert_eq!(f.as_message(), "boom");

        let caught = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(Failure::from_panic(caught).as_message(), "formatted 1");
    }

    #[test]
    fn component_errors_keep_their_labels() {
        let f: Failure = ScheduleError::Disabled.into();
        assert_eq!(f.as_label(), "schedule_disabled");

        let f: Failure = TransitionError::Illegal {
            from: "IDLE",
            to: "ANIMATING_ENTER",
        }
        .into();
        assert_eq!(f.as_label(), "transition_illegal");
        assert_eq!(f.as_message(), "illegal transition IDLE -> ANIMATING_ENTER");
    }
}
