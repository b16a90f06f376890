//! Job orchestrator — the caller-facing surface of the runtime.
//!
//! `start` creates a session and spawns its execution unit without ever
//! blocking on the remote call; `status`, `cancel`, and `list` are
//! non-blocking snapshot operations; `subscribe` hands out lazy event
//! streams; `wait` drives a subscription until the session is terminal.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, instrument, Instrument};

use delve_core::{ResearchOptions, SessionEvent, SessionId, SessionRecord};
use delve_research::Researcher;
use delve_store::ResultStore;

use crate::errors::{CancelOutcome, OrchestratorError};
use crate::hub::{EventStream, NotificationHub};
use crate::registry::SessionRegistry;
use crate::worker::{self, WorkerContext};

/// Orchestrator tuning knobs.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Maximum wall-clock duration a session may run before it fails with
    /// a timeout.
    pub max_duration: Duration,
    /// Capacity of the notification hub's event buffer.
    pub hub_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(3600),
            hub_capacity: 1024,
        }
    }
}

impl From<&delve_settings::OrchestratorSettings> for OrchestratorConfig {
    fn from(settings: &delve_settings::OrchestratorSettings) -> Self {
        Self {
            max_duration: Duration::from_secs(settings.max_duration_secs),
            hub_capacity: settings.hub_capacity,
        }
    }
}

/// Supervision handle for one session's execution unit.
///
/// The task is never force-aborted; cancellation is cooperative through
/// the token.
struct WorkerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Background job orchestrator.
///
/// Owns the session registry and notification hub exclusively; all record
/// mutation flows through the per-session execution units it spawns.
pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    hub: Arc<NotificationHub>,
    researcher: Arc<dyn Researcher>,
    store: Arc<dyn ResultStore>,
    config: OrchestratorConfig,
    /// Tracked execution units: session id -> supervision handle. Entries
    /// are retained alongside their records (no eviction).
    workers: DashMap<SessionId, WorkerHandle>,
}

impl Orchestrator {
    /// Create an orchestrator over the given engine and store.
    #[must_use]
    pub fn new(
        researcher: Arc<dyn Researcher>,
        store: Arc<dyn ResultStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let hub = Arc::new(NotificationHub::with_capacity(config.hub_capacity));
        Self {
            registry: Arc::new(SessionRegistry::new()),
            hub,
            researcher,
            store,
            config,
            workers: DashMap::new(),
        }
    }

    /// Submit a research job. Returns the session id immediately; the
    /// remote call runs on a detached execution unit.
    ///
    /// Fails only on validation (empty query) — execution-time failures are
    /// recorded on the session and observed via [`status`](Self::status) or
    /// [`subscribe`](Self::subscribe).
    #[instrument(skip(self, query, options))]
    pub fn start(
        &self,
        query: impl Into<String>,
        options: ResearchOptions,
    ) -> Result<SessionId, OrchestratorError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(OrchestratorError::EmptyQuery);
        }

        let record = SessionRecord::new(query, options);
        let id = record.id.clone();

        self.registry.insert(record.clone());
        let _ = self.hub.publish(SessionEvent::for_record(&record));

        let cancel = CancellationToken::new();
        let ctx = WorkerContext {
            registry: self.registry.clone(),
            hub: self.hub.clone(),
            researcher: self.researcher.clone(),
            store: self.store.clone(),
            max_duration: self.config.max_duration,
            cancel: cancel.clone(),
        };

        let span = info_span!("session_worker", session_id = %id);
        let task = tokio::spawn(worker::run_session(ctx, id.clone()).instrument(span));
        let _ = self.workers.insert(id.clone(), WorkerHandle { cancel, task });

        debug!(session_id = %id, "session created");
        Ok(id)
    }

    /// Snapshot of a session's current record.
    pub fn status(&self, id: &SessionId) -> Result<SessionRecord, OrchestratorError> {
        self.registry
            .snapshot(id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(id.clone()))
    }

    /// Request cooperative cancellation of a session.
    ///
    /// Advisory, never preemptive: the execution unit honors the request at
    /// its next checkpoint. Terminal sessions report
    /// [`CancelOutcome::AlreadyTerminal`] and are left untouched.
    #[instrument(skip(self))]
    pub fn cancel(&self, id: &SessionId) -> Result<CancelOutcome, OrchestratorError> {
        let outcome = self.registry.request_cancel(id)?;
        if outcome == CancelOutcome::Requested {
            if let Some(handle) = self.workers.get(id) {
                handle.cancel.cancel();
            }
            debug!(session_id = %id, "cancellation requested");
        }
        Ok(outcome)
    }

    /// Point-in-time snapshot of all sessions, ordered by creation time.
    #[must_use]
    pub fn list(&self) -> Vec<SessionRecord> {
        self.registry.list()
    }

    /// Subscribe to lifecycle events for one session (`Some(id)`) or all
    /// sessions (`None`). Only events published after this call are
    /// delivered; there is no historical replay.
    #[must_use]
    pub fn subscribe(&self, filter: Option<SessionId>) -> EventStream {
        self.hub.subscribe(filter)
    }

    /// Wait until a session reaches a terminal state and return its final
    /// record.
    ///
    /// Event-driven (no polling loop): the subscription is taken before the
    /// status check so no transition can slip between them, and an overflow
    /// marker triggers a status re-check.
    pub async fn wait(&self, id: &SessionId) -> Result<SessionRecord, OrchestratorError> {
        let mut stream = self.subscribe(Some(id.clone()));

        let snapshot = self.status(id)?;
        if snapshot.is_terminal() {
            return Ok(snapshot);
        }

        while let Some(event) = stream.next().await {
            match event {
                SessionEvent::Overflow { .. } => {
                    let snapshot = self.status(id)?;
                    if snapshot.is_terminal() {
                        return Ok(snapshot);
                    }
                }
                event if event.is_terminal() => {
                    // The registry update happens-before the notification,
                    // so the carried snapshot is the final record.
                    if let Some(record) = event.record() {
                        return Ok(record.clone());
                    }
                }
                _ => {}
            }
        }

        // The hub outlives the orchestrator's users in practice; if the
        // stream ever ends, fall back to a direct snapshot.
        self.status(id)
    }

    /// Number of sessions whose execution unit has not yet finished.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|entry| !entry.value().task.is_finished())
            .count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
