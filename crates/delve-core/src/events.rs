//! Session lifecycle events published by the notification hub.
//!
//! Every state transition produces one [`SessionEvent`] carrying the session
//! id, the new state, and a snapshot of the record at that transition.
//! [`SessionEvent::Overflow`] is the one synthetic event: it tells a lagging
//! subscriber that intermediate events were dropped and a fresh status query
//! is needed to resynchronize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::session::{SessionRecord, SessionState};

/// Common fields for all session lifecycle events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Session this event belongs to.
    pub session_id: SessionId,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
}

impl BaseEvent {
    /// Create a new base event stamped with the current UTC time.
    #[must_use]
    pub fn now(session_id: SessionId) -> Self {
        Self {
            session_id,
            timestamp: Utc::now(),
        }
    }
}

/// A session lifecycle notification.
///
/// One variant per state the session can enter, plus the overflow marker.
/// Each transition variant carries the record snapshot taken at the moment
/// of the transition, so subscribers never observe torn reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Session created (entered `Queued`).
    #[serde(rename = "session_created")]
    Created {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Record snapshot at creation.
        record: SessionRecord,
    },

    /// Execution began (entered `Running`).
    #[serde(rename = "session_started")]
    Started {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Record snapshot at the transition.
        record: SessionRecord,
    },

    /// Session finished successfully (entered `Completed`).
    #[serde(rename = "session_completed")]
    Completed {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Record snapshot at the transition.
        record: SessionRecord,
    },

    /// Session failed (entered `Failed`).
    #[serde(rename = "session_failed")]
    Failed {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Record snapshot at the transition.
        record: SessionRecord,
    },

    /// Session was cancelled (entered `Cancelled`).
    #[serde(rename = "session_cancelled")]
    Cancelled {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Record snapshot at the transition.
        record: SessionRecord,
    },

    /// The subscriber fell behind and missed `missed` events.
    ///
    /// Delivered once per lag episode; the subscriber should re-query
    /// status rather than rely on the event stream for the gap.
    #[serde(rename = "overflow")]
    Overflow {
        /// Number of dropped events.
        missed: u64,
    },
}

impl SessionEvent {
    /// Build the transition event matching a record's current state.
    #[must_use]
    pub fn for_record(record: &SessionRecord) -> Self {
        let base = BaseEvent::now(record.id.clone());
        let record = record.clone();
        match record.state {
            SessionState::Queued => Self::Created { base, record },
            SessionState::Running => Self::Started { base, record },
            SessionState::Completed => Self::Completed { base, record },
            SessionState::Failed => Self::Failed { base, record },
            SessionState::Cancelled => Self::Cancelled { base, record },
        }
    }

    /// The session this event belongs to (`None` for overflow markers).
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Created { base, .. }
            | Self::Started { base, .. }
            | Self::Completed { base, .. }
            | Self::Failed { base, .. }
            | Self::Cancelled { base, .. } => Some(&base.session_id),
            Self::Overflow { .. } => None,
        }
    }

    /// The record snapshot carried by this event, if any.
    #[must_use]
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            Self::Created { record, .. }
            | Self::Started { record, .. }
            | Self::Completed { record, .. }
            | Self::Failed { record, .. }
            | Self::Cancelled { record, .. } => Some(record),
            Self::Overflow { .. } => None,
        }
    }

    /// The state the session entered, if this is a transition event.
    #[must_use]
    pub fn state(&self) -> Option<SessionState> {
        self.record().map(|r| r.state)
    }

    /// Whether this event announces a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state().is_some_and(SessionState::is_terminal)
    }

    /// Get the event type string (for type discrimination).
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created { .. } => "session_created",
            Self::Started { .. } => "session_started",
            Self::Completed { .. } => "session_completed",
            Self::Failed { .. } => "session_failed",
            Self::Cancelled { .. } => "session_cancelled",
            Self::Overflow { .. } => "overflow",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
