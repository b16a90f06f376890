//! End-to-end orchestrator scenarios with a scripted engine and store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::timeout;

use delve_core::{
    FailureKind, ResearchOptions, SessionEvent, SessionId, SessionState,
};
use delve_research::{
    ResearchArtifact, ResearchError, ResearchRequest, ResearchResult, Researcher,
};
use delve_runtime::{CancelOutcome, Orchestrator, OrchestratorConfig, OrchestratorError};
use delve_store::{ResultStore, StoreError, StoreResult};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ── Scripted engine ──

enum StubOutcome {
    /// Return an artifact echoing the query.
    Echo,
    /// Return a fixed artifact body.
    Succeed(&'static str),
    /// Fail with an API error.
    Fail(&'static str),
}

struct StubResearcher {
    delay: Duration,
    outcome: StubOutcome,
    invocations: AtomicUsize,
}

impl StubResearcher {
    fn instant(content: &'static str) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: StubOutcome::Succeed(content),
            invocations: AtomicUsize::new(0),
        }
    }

    fn echo() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: StubOutcome::Echo,
            invocations: AtomicUsize::new(0),
        }
    }

    fn delayed(content: &'static str, delay: Duration) -> Self {
        Self {
            delay,
            outcome: StubOutcome::Succeed(content),
            invocations: AtomicUsize::new(0),
        }
    }

    fn failing(message: &'static str) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: StubOutcome::Fail(message),
            invocations: AtomicUsize::new(0),
        }
    }

    fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Researcher for StubResearcher {
    fn engine(&self) -> &str {
        "stub"
    }

    async fn submit(&self, request: &ResearchRequest) -> ResearchResult<ResearchArtifact> {
        let _ = self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            StubOutcome::Echo => Ok(ResearchArtifact {
                content: format!("report on {}", request.query),
                model: "stub-model".into(),
                request_id: None,
            }),
            StubOutcome::Succeed(content) => Ok(ResearchArtifact {
                content: (*content).to_owned(),
                model: "stub-model".into(),
                request_id: None,
            }),
            StubOutcome::Fail(message) => Err(ResearchError::Api {
                status: 503,
                message: (*message).to_owned(),
            }),
        }
    }
}

// ── Scripted store ──

struct MemoryStore {
    artifacts: Mutex<HashMap<String, String>>,
    fail_puts: bool,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            artifacts: Mutex::new(HashMap::new()),
            fail_puts: false,
        }
    }

    fn failing() -> Self {
        Self {
            artifacts: Mutex::new(HashMap::new()),
            fail_puts: true,
        }
    }

    fn stored_count(&self) -> usize {
        self.artifacts.lock().len()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn put(&self, id: &SessionId, content: &str) -> StoreResult<String> {
        if self.fail_puts {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        let location = format!("mem://{id}");
        let _ = self
            .artifacts
            .lock()
            .insert(location.clone(), content.to_owned());
        Ok(location)
    }

    async fn get(&self, location: &str) -> StoreResult<String> {
        self.artifacts
            .lock()
            .get(location)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(location.to_owned()))
    }
}

fn orchestrator_with(
    researcher: Arc<StubResearcher>,
    store: Arc<MemoryStore>,
    config: OrchestratorConfig,
) -> Orchestrator {
    Orchestrator::new(researcher, store, config)
}

async fn next_event(stream: &mut delve_runtime::EventStream) -> SessionEvent {
    timeout(RECV_TIMEOUT, stream.next())
        .await
        .expect("timed out waiting for event")
        .expect("event stream ended unexpectedly")
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn completed_session_persists_artifact() {
    let researcher = Arc::new(StubResearcher::instant("X"));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator_with(
        researcher.clone(),
        store.clone(),
        OrchestratorConfig::default(),
    );

    let id = orch.start("topic B", ResearchOptions::default()).unwrap();
    let record = orch.wait(&id).await.unwrap();

    assert_eq!(record.state, SessionState::Completed);
    assert!(record.error.is_none());
    assert!(!record.cancel_requested);

    let location = record.result_location.expect("completed session has a location");
    assert_eq!(store.get(&location).await.unwrap(), "X");

    let started_at = record.started_at.unwrap();
    let ended_at = record.ended_at.unwrap();
    assert!(record.created_at <= started_at);
    assert!(started_at <= ended_at);

    assert_eq!(researcher.invocations(), 1);
}

#[tokio::test]
async fn subscriber_observes_ordered_transitions() {
    let orch = orchestrator_with(
        Arc::new(StubResearcher::instant("X")),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    let mut stream = orch.subscribe(None);
    let id = orch.start("topic", ResearchOptions::default()).unwrap();

    let mut observed = vec![];
    loop {
        let event = next_event(&mut stream).await;
        assert_eq!(event.session_id(), Some(&id));
        let terminal = event.is_terminal();
        observed.push(event.event_type().to_owned());
        if terminal {
            // Registry update happens-before the notification: the record
            // must already be terminal when the event is observed.
            assert!(orch.status(&id).unwrap().is_terminal());
            break;
        }
    }

    assert_eq!(
        observed,
        vec!["session_created", "session_started", "session_completed"]
    );
}

#[tokio::test]
async fn concurrent_starts_yield_independent_sessions() {
    let researcher = Arc::new(StubResearcher::echo());
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator_with(
        researcher.clone(),
        store.clone(),
        OrchestratorConfig::default(),
    );

    let mut ids = vec![];
    for i in 0..16 {
        let id = orch
            .start(format!("query {i}"), ResearchOptions::default())
            .unwrap();
        ids.push((i, id));
    }

    let distinct: HashSet<_> = ids.iter().map(|(_, id)| id.clone()).collect();
    assert_eq!(distinct.len(), 16, "ids must be unique");

    for (i, id) in &ids {
        let record = orch.wait(id).await.unwrap();
        assert_eq!(record.state, SessionState::Completed);
        assert_eq!(record.query, format!("query {i}"));

        // No record was overwritten by another session's updates
        let location = record.result_location.unwrap();
        assert_eq!(
            store.get(&location).await.unwrap(),
            format!("report on query {i}")
        );
    }

    assert_eq!(store.stored_count(), 16);
    assert_eq!(orch.list().len(), 16);
}

#[tokio::test]
async fn pre_cancel_never_invokes_engine() {
    let researcher = Arc::new(StubResearcher::instant("unused"));
    let orch = orchestrator_with(
        researcher.clone(),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    // Current-thread runtime: the worker task cannot run until this test
    // awaits, so the cancel always lands first.
    let id = orch.start("topic A", ResearchOptions::default()).unwrap();
    assert_eq!(orch.cancel(&id).unwrap(), CancelOutcome::Requested);

    let record = orch.wait(&id).await.unwrap();
    assert_eq!(record.state, SessionState::Cancelled);
    assert!(record.cancel_requested);
    assert!(record.started_at.is_none(), "never entered running");
    assert!(record.result_location.is_none());
    assert!(record.error.is_none());

    assert_eq!(researcher.invocations(), 0, "engine must never be invoked");
}

#[tokio::test]
async fn cancel_while_synthesis_in_flight() {
    let researcher = Arc::new(StubResearcher::delayed("late", Duration::from_secs(30)));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator_with(
        researcher.clone(),
        store.clone(),
        OrchestratorConfig::default(),
    );

    let id = orch.start("slow topic", ResearchOptions::default()).unwrap();

    // Let the worker reach the remote call, then cancel.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(orch.cancel(&id).unwrap(), CancelOutcome::Requested);

    let record = timeout(RECV_TIMEOUT, orch.wait(&id))
        .await
        .expect("cancellation must not wait out the full synthesis delay")
        .unwrap();

    assert_eq!(record.state, SessionState::Cancelled);
    assert_eq!(researcher.invocations(), 1);
    assert_eq!(store.stored_count(), 0, "no artifact may be persisted");
}

#[tokio::test]
async fn cancel_completed_session_is_already_terminal() {
    let orch = orchestrator_with(
        Arc::new(StubResearcher::instant("X")),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    let id = orch.start("topic", ResearchOptions::default()).unwrap();
    let final_record = orch.wait(&id).await.unwrap();
    assert_eq!(final_record.state, SessionState::Completed);

    assert_eq!(orch.cancel(&id).unwrap(), CancelOutcome::AlreadyTerminal);

    // The record is byte-for-byte unchanged
    assert_eq!(orch.status(&id).unwrap(), final_record);
}

#[tokio::test]
async fn remote_failure_records_remote_kind() {
    let orch = orchestrator_with(
        Arc::new(StubResearcher::failing("connection reset by peer")),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    let id = orch.start("doomed topic", ResearchOptions::default()).unwrap();
    let record = orch.wait(&id).await.unwrap();

    assert_eq!(record.state, SessionState::Failed);
    let error = record.error.expect("failed session has an error");
    assert_eq!(error.kind, FailureKind::Remote);
    assert!(error.message.contains("connection reset by peer"));
    assert!(record.result_location.is_none());
}

#[tokio::test]
async fn storage_failure_is_distinct_from_remote() {
    let researcher = Arc::new(StubResearcher::instant("computed fine"));
    let orch = orchestrator_with(
        researcher.clone(),
        Arc::new(MemoryStore::failing()),
        OrchestratorConfig::default(),
    );

    let id = orch.start("topic", ResearchOptions::default()).unwrap();
    let record = orch.wait(&id).await.unwrap();

    assert_eq!(record.state, SessionState::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.kind, FailureKind::Storage, "not a remote failure");
    assert!(error.message.contains("disk full"));
    assert!(record.result_location.is_none());
    assert_eq!(researcher.invocations(), 1, "synthesis itself succeeded");
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_fails_with_timeout_kind() {
    let researcher = Arc::new(StubResearcher::delayed("late", Duration::from_millis(500)));
    let orch = orchestrator_with(
        researcher.clone(),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig {
            max_duration: Duration::from_millis(50),
            ..OrchestratorConfig::default()
        },
    );

    let id = orch.start("topic", ResearchOptions::default()).unwrap();
    let record = orch.wait(&id).await.unwrap();

    assert_eq!(record.state, SessionState::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.kind, FailureKind::Timeout);
    assert!(error.message.contains("did not complete"));
    assert!(record.result_location.is_none());

    // The deadline fired at ~50ms, well before the 500ms synthesis delay
    let elapsed = record.ended_at.unwrap() - record.started_at.unwrap();
    assert!(elapsed.num_milliseconds() < 500);
}

#[tokio::test]
async fn stalled_subscriber_does_not_block_completion() {
    let orch = orchestrator_with(
        Arc::new(StubResearcher::echo()),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig {
            hub_capacity: 4,
            ..OrchestratorConfig::default()
        },
    );

    // This subscriber never reads until every session is done.
    let mut stalled = orch.subscribe(None);

    let mut ids = vec![];
    for i in 0..8 {
        ids.push(
            orch.start(format!("q{i}"), ResearchOptions::default())
                .unwrap(),
        );
    }
    for id in &ids {
        let record = orch.wait(id).await.unwrap();
        assert_eq!(record.state, SessionState::Completed);
    }

    // The stalled subscriber lagged far past capacity: it gets one overflow
    // marker, then current events, and resynchronizes via status.
    let first = next_event(&mut stalled).await;
    match first {
        SessionEvent::Overflow { missed } => assert!(missed > 0),
        other => panic!("expected overflow marker, got {other:?}"),
    }
    for record in orch.list() {
        assert!(record.is_terminal());
    }
}

#[tokio::test]
async fn state_sequences_are_prefix_consistent() {
    let researcher = Arc::new(StubResearcher::echo());
    let orch = orchestrator_with(
        researcher.clone(),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );
    let mut stream = orch.subscribe(None);

    // A mix of outcomes: success, pre-cancel.
    let ok_id = orch.start("fine", ResearchOptions::default()).unwrap();
    let cancel_id = orch.start("doomed", ResearchOptions::default()).unwrap();
    let _ = orch.cancel(&cancel_id).unwrap();

    let mut sequences: HashMap<SessionId, Vec<&'static str>> = HashMap::new();
    let mut terminal_count = 0;
    while terminal_count < 2 {
        let event = next_event(&mut stream).await;
        let id = event.session_id().unwrap().clone();
        if event.is_terminal() {
            terminal_count += 1;
        }
        sequences.entry(id).or_default().push(event.event_type());
    }

    assert_eq!(
        sequences[&ok_id],
        vec!["session_created", "session_started", "session_completed"]
    );
    assert_eq!(
        sequences[&cancel_id],
        vec!["session_created", "session_cancelled"]
    );
}

#[tokio::test]
async fn result_location_iff_completed_error_iff_failed() {
    let store = Arc::new(MemoryStore::new());

    // One orchestrator per outcome kind, same assertions across all records.
    let success = orchestrator_with(
        Arc::new(StubResearcher::instant("ok")),
        store.clone(),
        OrchestratorConfig::default(),
    );
    let failure = orchestrator_with(
        Arc::new(StubResearcher::failing("boom")),
        store.clone(),
        OrchestratorConfig::default(),
    );

    let ok_id = success.start("a", ResearchOptions::default()).unwrap();
    let fail_id = failure.start("b", ResearchOptions::default()).unwrap();
    let cancel_id = success.start("c", ResearchOptions::default()).unwrap();
    let _ = success.cancel(&cancel_id).unwrap();

    let _ = success.wait(&ok_id).await.unwrap();
    let _ = failure.wait(&fail_id).await.unwrap();
    let _ = success.wait(&cancel_id).await.unwrap();

    for record in success.list().into_iter().chain(failure.list()) {
        match record.state {
            SessionState::Completed => {
                assert!(record.result_location.is_some());
                assert!(record.error.is_none());
            }
            SessionState::Failed => {
                assert!(record.error.is_some());
                assert!(record.result_location.is_none());
            }
            SessionState::Cancelled => {
                assert!(record.result_location.is_none());
                assert!(record.error.is_none());
            }
            SessionState::Queued | SessionState::Running => {
                panic!("all sessions should be terminal, found {}", record.state)
            }
        }
    }
}

#[tokio::test]
async fn list_is_a_point_in_time_snapshot() {
    let orch = orchestrator_with(
        Arc::new(StubResearcher::instant("ok")),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    let id = orch.start("topic", ResearchOptions::default()).unwrap();
    let before = orch.list();
    assert_eq!(before.len(), 1);

    let _ = orch.wait(&id).await.unwrap();

    // The earlier snapshot is untouched by the completed transition; a
    // fresh one observes it. The snapshot can also be re-iterated freely.
    assert_eq!(before[0].state, SessionState::Queued);
    assert_eq!(before.iter().count(), 1);
    assert_eq!(orch.list()[0].state, SessionState::Completed);
}

#[tokio::test]
async fn wait_on_already_terminal_session_returns_immediately() {
    let orch = orchestrator_with(
        Arc::new(StubResearcher::instant("ok")),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    let id = orch.start("topic", ResearchOptions::default()).unwrap();
    let first = orch.wait(&id).await.unwrap();
    let second = orch.wait(&id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn late_subscriber_gets_no_historical_replay() {
    let orch = orchestrator_with(
        Arc::new(StubResearcher::instant("ok")),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    let id = orch.start("topic", ResearchOptions::default()).unwrap();
    let _ = orch.wait(&id).await.unwrap();

    // Subscribed after every transition: nothing is redelivered.
    let mut stream = orch.subscribe(Some(id));
    assert!(stream.try_next().is_none());
}

#[tokio::test]
async fn options_are_snapshotted_and_opaque() {
    let researcher = Arc::new(StubResearcher::echo());
    let orch = orchestrator_with(
        researcher.clone(),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    let mut options = ResearchOptions {
        focus: Some("academic".into()),
        ..Default::default()
    };
    let _ = options
        .extra
        .insert("researchDepth".into(), "comprehensive".into());

    let id = orch.start("topic", options.clone()).unwrap();

    // Mutating the caller's copy after start must not affect the session.
    options.focus = Some("news".into());

    let record = orch.wait(&id).await.unwrap();
    assert_eq!(record.options.focus.as_deref(), Some("academic"));
    assert_eq!(
        record.options.extra.get("researchDepth").map(String::as_str),
        Some("comprehensive")
    );
}

#[tokio::test]
async fn unknown_ids_propagate_not_found() {
    let orch = orchestrator_with(
        Arc::new(StubResearcher::instant("ok")),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );

    let ghost = SessionId::from("ghost");
    assert!(matches!(
        orch.status(&ghost),
        Err(OrchestratorError::SessionNotFound(_))
    ));
    assert!(matches!(
        orch.cancel(&ghost),
        Err(OrchestratorError::SessionNotFound(_))
    ));
    assert!(matches!(
        orch.wait(&ghost).await,
        Err(OrchestratorError::SessionNotFound(_))
    ));
}
