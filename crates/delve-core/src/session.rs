//! Session records and the session state machine.
//!
//! A [`SessionRecord`] tracks one submitted research job from creation to a
//! terminal state. The record is owned exclusively by the session registry;
//! everything outside the orchestrator sees cloned snapshots.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

// ─────────────────────────────────────────────────────────────────────────────
// SessionState — lifecycle state machine
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a research session.
///
/// Legal transitions: `Queued → Running → {Completed, Failed, Cancelled}`,
/// plus `Queued → Cancelled` when a cancel lands before execution begins.
/// Terminal states admit no further transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, execution unit not yet running the remote call.
    Queued,
    /// The remote synthesis call is in flight.
    Running,
    /// Finished successfully; the artifact is persisted.
    Completed,
    /// Finished with a recorded failure.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl SessionState {
    /// Whether this state is terminal (no further transitions).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
        )
    }

    /// Stable snake_case name (matches the serde wire format).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionFailure — structured failure taxonomy
// ─────────────────────────────────────────────────────────────────────────────

/// Why a session failed.
///
/// `Storage` is deliberately distinct from `Remote`: a successfully computed
/// artifact that could not be persisted must be reported as a persistence
/// failure, not a synthesis failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The remote synthesis engine failed.
    Remote,
    /// The session exceeded its configured maximum duration.
    Timeout,
    /// The artifact could not be written to the result store.
    Storage,
}

impl FailureKind {
    /// Stable snake_case name (matches the serde wire format).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Timeout => "timeout",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure recorded on a session that reached `Failed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
}

impl SessionFailure {
    /// A remote synthesis failure.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Remote,
            message: message.into(),
        }
    }

    /// A deadline-expiry failure.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
        }
    }

    /// A result-store persistence failure.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Storage,
            message: message.into(),
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResearchOptions — opaque caller options
// ─────────────────────────────────────────────────────────────────────────────

fn default_enhance() -> bool {
    true
}

/// Caller-supplied options passed through to the synthesis engine.
///
/// The orchestrator treats every field as opaque: nothing here influences
/// scheduling, cancellation, or persistence. The named fields mirror the
/// options the synthesis prompt composer understands; `extra` carries any
/// additional pass-through key/value pairs untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchOptions {
    /// Background context for the research query.
    pub context: Option<String>,
    /// Source focus (e.g. "academic", "business", "news", or free-form).
    pub focus: Option<String>,
    /// Preferred output structure (e.g. "executive summary").
    pub format: Option<String>,
    /// Override the configured synthesis model.
    pub model: Option<String>,
    /// Whether to run the prompt-enhancement pass before submitting.
    #[serde(default = "default_enhance")]
    pub enhance: bool,
    /// Additional opaque key/value options, forwarded verbatim.
    pub extra: BTreeMap<String, String>,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            context: None,
            focus: None,
            format: None,
            model: None,
            enhance: true,
            extra: BTreeMap::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionRecord
// ─────────────────────────────────────────────────────────────────────────────

/// One submitted research job and its tracked lifecycle.
///
/// Field invariants (enforced by the registry's single mutation path):
///
/// - `result_location` is set iff `state == Completed`
/// - `error` is set iff `state == Failed`
/// - `created_at <= started_at <= ended_at` for the timestamps that exist
/// - once `state` is terminal, no field changes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Unique, never-reused session identifier.
    pub id: SessionId,
    /// Immutable snapshot of the caller's query.
    pub query: String,
    /// Immutable snapshot of the caller's options.
    pub options: ResearchOptions,
    /// Current lifecycle state.
    pub state: SessionState,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the execution unit began running (set once).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the session reached a terminal state (set once).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Where the result store persisted the artifact (`Completed` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_location: Option<String>,
    /// Recorded failure (`Failed` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionFailure>,
    /// Whether cancellation has been requested (write-once-true).
    pub cancel_requested: bool,
}

impl SessionRecord {
    /// Create a fresh record in `Queued` with a new ID.
    #[must_use]
    pub fn new(query: impl Into<String>, options: ResearchOptions) -> Self {
        Self {
            id: SessionId::new(),
            query: query.into(),
            options,
            state: SessionState::Queued,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            result_location: None,
            error: None,
            cancel_requested: false,
        }
    }

    /// Whether the session has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
