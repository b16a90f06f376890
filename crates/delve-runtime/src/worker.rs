//! Per-session execution unit.
//!
//! One `run_session` task is spawned per started session. It owns that
//! session's writes exclusively: it drives the record through
//! `Queued → Running → terminal`, publishes a notification after every
//! transition, and never holds a registry lock across an await.
//!
//! Cancellation is cooperative: the cancel flag is checked at the defined
//! checkpoints (before entering `Running`, before invoking the engine,
//! before persisting), and the in-flight remote call is raced against the
//! session's cancellation token and deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use delve_core::{SessionEvent, SessionFailure, SessionId, SessionRecord, SessionState};
use delve_research::{ResearchArtifact, ResearchError, ResearchRequest, Researcher};
use delve_store::ResultStore;

use crate::hub::NotificationHub;
use crate::registry::SessionRegistry;

/// Everything an execution unit needs, cloned per spawned session.
pub(crate) struct WorkerContext {
    pub registry: Arc<SessionRegistry>,
    pub hub: Arc<NotificationHub>,
    pub researcher: Arc<dyn Researcher>,
    pub store: Arc<dyn ResultStore>,
    pub max_duration: Duration,
    pub cancel: CancellationToken,
}

/// Result of racing the remote call against cancellation and the deadline.
enum RemoteOutcome {
    Artifact(ResearchArtifact),
    RemoteFailed(ResearchError),
    DeadlineExpired,
    Cancelled,
}

/// Drive one session from `Queued` to a terminal state.
pub(crate) async fn run_session(ctx: WorkerContext, id: SessionId) {
    // Checkpoint: cancel that landed before the unit ran at all.
    // Queued -> Cancelled directly; the engine is never invoked.
    let Some(queued) = ctx.registry.snapshot(&id) else {
        error!(session_id = %id, "session vanished before execution started");
        return;
    };
    if queued.cancel_requested || ctx.cancel.is_cancelled() {
        info!(session_id = %id, "cancelled before execution, engine not invoked");
        finish(&ctx, &id, SessionState::Cancelled, |_| {});
        return;
    }

    let Some(running) = transition_and_publish(&ctx, &id, SessionState::Running, |_| {}) else {
        return;
    };

    // Checkpoint: cancel that raced the transition above.
    if running.cancel_requested || ctx.cancel.is_cancelled() {
        info!(session_id = %id, "cancelled before engine invocation");
        finish(&ctx, &id, SessionState::Cancelled, |_| {});
        return;
    }

    // The request is an immutable snapshot; no registry access is needed
    // (or performed) while the remote call is in flight.
    let request = ResearchRequest::new(running.query.clone(), running.options.clone());
    debug!(
        session_id = %id,
        engine = ctx.researcher.engine(),
        max_duration_secs = ctx.max_duration.as_secs(),
        "invoking synthesis engine"
    );

    let outcome = tokio::select! {
        () = ctx.cancel.cancelled() => RemoteOutcome::Cancelled,
        result = tokio::time::timeout(ctx.max_duration, ctx.researcher.submit(&request)) => {
            match result {
                Err(_elapsed) => RemoteOutcome::DeadlineExpired,
                Ok(Ok(artifact)) => RemoteOutcome::Artifact(artifact),
                Ok(Err(e)) => RemoteOutcome::RemoteFailed(e),
            }
        }
    };

    match outcome {
        RemoteOutcome::Cancelled => {
            info!(session_id = %id, "cancelled while synthesis was in flight");
            finish(&ctx, &id, SessionState::Cancelled, |_| {});
        }

        RemoteOutcome::DeadlineExpired => {
            let secs = ctx.max_duration.as_secs_f64();
            warn!(session_id = %id, max_duration_secs = secs, "synthesis deadline expired");
            finish(&ctx, &id, SessionState::Failed, |record| {
                record.error = Some(SessionFailure::timeout(format!(
                    "synthesis did not complete within {secs}s"
                )));
            });
        }

        RemoteOutcome::RemoteFailed(e) => {
            warn!(session_id = %id, category = e.category(), error = %e, "synthesis failed");
            finish(&ctx, &id, SessionState::Failed, |record| {
                record.error = Some(SessionFailure::remote(e.to_string()));
            });
        }

        RemoteOutcome::Artifact(artifact) => {
            // Checkpoint: cancel that arrived while the call was in flight
            // but after the engine finished. The artifact is discarded,
            // never persisted.
            if ctx.cancel.is_cancelled() {
                info!(session_id = %id, "cancelled after synthesis, discarding artifact");
                finish(&ctx, &id, SessionState::Cancelled, |_| {});
                return;
            }

            match ctx.store.put(&id, &artifact.content).await {
                Ok(location) => {
                    info!(session_id = %id, location = %location, "session completed");
                    finish(&ctx, &id, SessionState::Completed, |record| {
                        record.result_location = Some(location);
                    });
                }
                Err(e) => {
                    // A computed artifact that cannot be stored is reported
                    // as a storage failure, distinct from a remote failure.
                    warn!(session_id = %id, error = %e, "artifact persistence failed");
                    finish(&ctx, &id, SessionState::Failed, |record| {
                        record.error = Some(SessionFailure::storage(e.to_string()));
                    });
                }
            }
        }
    }
}

/// Transition, publish the notification, and return the snapshot.
///
/// The registry update happens-before the notification is delivered: the
/// snapshot is taken from the committed transition, so any subscriber that
/// sees the event will also see the terminal record via status.
fn transition_and_publish(
    ctx: &WorkerContext,
    id: &SessionId,
    next: SessionState,
    apply: impl FnOnce(&mut SessionRecord),
) -> Option<SessionRecord> {
    match ctx.registry.transition(id, next, apply) {
        Ok(snapshot) => {
            let _ = ctx.hub.publish(SessionEvent::for_record(&snapshot));
            Some(snapshot)
        }
        Err(e) => {
            // A failed transition here is an orchestrator defect; it must
            // be loud, never swallowed.
            error!(session_id = %id, error = %e, "session transition failed");
            None
        }
    }
}

/// Terminal-transition helper (same as `transition_and_publish`, result
/// intentionally unused — the unit is done either way).
fn finish(
    ctx: &WorkerContext,
    id: &SessionId,
    next: SessionState,
    apply: impl FnOnce(&mut SessionRecord),
) {
    let _ = transition_and_publish(ctx, id, next, apply);
}
