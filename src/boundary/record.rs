//! # Failure taxonomy and audit records.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What kind of operation failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// A visual effect failed to start or run.
    Animation,
    /// Page navigation failed.
    Navigation,
    /// A page-transition sequence failed.
    Transition,
    /// A DOM read/write failed.
    Rendering,
    /// Navigation state became inconsistent.
    State,
    /// Network access failed.
    Network,
    /// Anything else.
    #[default]
    Unknown,
}

impl FailureKind {
    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            FailureKind::Animation => "animation",
            FailureKind::Navigation => "navigation",
            FailureKind::Transition => "transition",
            FailureKind::Rendering => "rendering",
            FailureKind::State => "state",
            FailureKind::Network => "network",
            FailureKind::Unknown => "unknown",
        }
    }
}

/// How bad a failure is. Ordered `Low < Medium < High < Critical`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Logged only; invisible to the user.
    Low,
    /// User-notified.
    #[default]
    Medium,
    /// User-notified, stronger fallback.
    High,
    /// User-notified longest, may trigger a reload-class fallback.
    Critical,
}

impl Severity {
    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Toast duration for this severity; `None` means the user is not notified.
    pub fn toast_duration(self) -> Option<Duration> {
        match self {
            Severity::Low => None,
            Severity::Medium => Some(Duration::from_secs(3)),
            Severity::High => Some(Duration::from_secs(5)),
            Severity::Critical => Some(Duration::from_secs(8)),
        }
    }
}

/// Caller-supplied description of where a failure happened.
///
/// Defaults to `Unknown` / `Medium`.
///
/// ```
/// use stagehand::{FailureContext, FailureKind, Severity};
///
/// let ctx = FailureContext::new(FailureKind::Network)
///     .with_severity(Severity::High)
///     .with_message("feed unreachable")
///     .with_meta("url", "/feed.json");
/// assert_eq!(ctx.metadata["url"], "/feed.json");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FailureContext {
    /// Failure kind.
    pub kind: FailureKind,
    /// Failure severity.
    pub severity: Severity,
    /// User-facing message; the failure's own text is used when absent.
    pub message: Option<String>,
    /// Free-form metadata kept in the audit record.
    pub metadata: Map<String, Value>,
}

impl FailureContext {
    /// Context of `kind` with default severity.
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Sets the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the user-facing message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds one metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One entry of the boundary's audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Failure kind.
    pub kind: FailureKind,
    /// Failure severity.
    pub severity: Severity,
    /// Failure message.
    pub message: String,
    /// Caller metadata.
    pub metadata: Map<String, Value>,
}

impl FailureRecord {
    pub(crate) fn now(kind: FailureKind, severity: Severity, message: String, metadata: Map<String, Value>) -> Self {
        Self {
            timestamp: unix_millis(SystemTime::now()),
            kind,
            severity,
            message,
            metadata,
        }
    }
}

pub(crate) fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
