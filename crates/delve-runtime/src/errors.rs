//! Orchestrator error types.

use delve_core::{SessionId, SessionState};

/// Errors returned by the orchestrator's synchronous entry points.
///
/// Failures inside a running execution unit are never surfaced here — they
/// are recorded on the session record and observed via status or subscribe.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// `start` was called with an empty or blank query.
    #[error("query must not be empty")]
    EmptyQuery,

    /// Unknown session id.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// An illegal state transition was attempted. Indicates a defect in the
    /// orchestrator itself (broken single-writer discipline), never caller
    /// misuse.
    #[error("illegal transition {from} -> {to} for session {id}")]
    InvariantViolation {
        /// Session the transition was attempted on.
        id: SessionId,
        /// State the session was in.
        from: SessionState,
        /// State the transition attempted to enter.
        to: SessionState,
    },
}

/// Outcome of a cancel request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The cancel flag was set; the execution unit will honor it at its
    /// next checkpoint.
    Requested,
    /// The session was already terminal; nothing changed.
    AlreadyTerminal,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_display() {
        assert_eq!(
            OrchestratorError::EmptyQuery.to_string(),
            "query must not be empty"
        );
    }

    #[test]
    fn not_found_display() {
        let err = OrchestratorError::SessionNotFound(SessionId::from("sess-1"));
        assert_eq!(err.to_string(), "session not found: sess-1");
    }

    #[test]
    fn invariant_violation_display() {
        let err = OrchestratorError::InvariantViolation {
            id: SessionId::from("sess-1"),
            from: SessionState::Completed,
            to: SessionState::Running,
        };
        assert_eq!(
            err.to_string(),
            "illegal transition completed -> running for session sess-1"
        );
    }

    #[test]
    fn cancel_outcome_equality() {
        assert_eq!(CancelOutcome::Requested, CancelOutcome::Requested);
        assert_ne!(CancelOutcome::Requested, CancelOutcome::AlreadyTerminal);
    }
}
