//! Session registry — the single source of truth for session state.
//!
//! The registry exclusively owns all [`SessionRecord`]s. Mutation happens
//! only through [`SessionRegistry::transition`] and
//! [`SessionRegistry::request_cancel`], both called solely by the
//! orchestrator and the execution unit that owns the session (single active
//! writer per session id). Every read hands out a cloned snapshot, so
//! readers never observe a record mid-mutation.

use chrono::Utc;
use dashmap::DashMap;
use tracing::error;

use delve_core::{SessionId, SessionRecord, SessionState};

use crate::errors::{CancelOutcome, OrchestratorError};

/// In-memory mapping of session id to session record.
///
/// Records are retained for the process lifetime; there is no eviction.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionRecord>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Insert a freshly created record. IDs are UUID v7, so collisions do
    /// not occur by construction.
    pub fn insert(&self, record: SessionRecord) {
        let _ = self.sessions.insert(record.id.clone(), record);
    }

    /// Snapshot of a single session.
    #[must_use]
    pub fn snapshot(&self, id: &SessionId) -> Option<SessionRecord> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    /// Point-in-time snapshot of every session, ordered by creation time.
    ///
    /// The returned vector is independent of the registry: concurrent
    /// starts and transitions never corrupt an iteration over it, and it
    /// can be re-iterated freely.
    #[must_use]
    pub fn list(&self) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> =
            self.sessions.iter().map(|entry| entry.clone()).collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        records
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Set the cancel flag on a non-terminal session (write-once-true).
    ///
    /// Terminal sessions are untouched and report
    /// [`CancelOutcome::AlreadyTerminal`].
    pub fn request_cancel(&self, id: &SessionId) -> Result<CancelOutcome, OrchestratorError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(id.clone()))?;

        if entry.state.is_terminal() {
            return Ok(CancelOutcome::AlreadyTerminal);
        }
        entry.cancel_requested = true;
        Ok(CancelOutcome::Requested)
    }

    /// Apply a state transition — the sole mutation path for session state.
    ///
    /// Enforces the state machine, stamps `started_at`/`ended_at` exactly
    /// once, and runs `apply` to set transition-specific fields (the result
    /// location on `Completed`, the failure on `Failed`). Returns the
    /// post-transition snapshot for notification.
    ///
    /// An illegal transition logs at error level and returns
    /// [`OrchestratorError::InvariantViolation`] — it must never be
    /// silently swallowed, since it signals broken single-writer discipline.
    pub fn transition(
        &self,
        id: &SessionId,
        next: SessionState,
        apply: impl FnOnce(&mut SessionRecord),
    ) -> Result<SessionRecord, OrchestratorError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(id.clone()))?;

        let from = entry.state;
        if !from.can_transition_to(next) {
            error!(
                session_id = %id,
                %from,
                to = %next,
                "illegal session transition attempted"
            );
            return Err(OrchestratorError::InvariantViolation {
                id: id.clone(),
                from,
                to: next,
            });
        }

        let now = Utc::now();
        entry.state = next;
        if next == SessionState::Running {
            entry.started_at = Some(now);
        }
        if next.is_terminal() {
            entry.ended_at = Some(now);
        }
        apply(&mut entry);

        Ok(entry.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
