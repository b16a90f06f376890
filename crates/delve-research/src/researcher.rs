//! The [`Researcher`] trait and its request/artifact/error types.
//!
//! Every synthesis backend implements [`Researcher`] to expose one
//! operation: submit a query with opaque options and wait for the
//! synthesized artifact. The trait is object-safe so the orchestrator can
//! hold `Arc<dyn Researcher>` and tests can substitute hand-written stubs.

use async_trait::async_trait;

use delve_core::{RequestId, ResearchOptions};

/// Result type alias for researcher operations.
pub type ResearchResult<T> = Result<T, ResearchError>;

/// Errors that can occur during a synthesis run.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The engine returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// The background synthesis run finished in a failed state.
    #[error("synthesis run failed: {message}")]
    RunFailed {
        /// Error description reported by the engine.
        message: String,
    },

    /// The engine reported success but returned no output text.
    #[error("synthesis run returned no output")]
    Empty,
}

impl ResearchError {
    /// Error category string for logs and structured failures.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Api { .. } => "api",
            Self::RunFailed { .. } => "run_failed",
            Self::Empty => "empty",
        }
    }
}

/// One research job handed to the synthesis engine.
///
/// Holds the immutable snapshot taken at session creation; the engine never
/// observes later mutation of caller-owned inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResearchRequest {
    /// The research question or topic.
    pub query: String,
    /// Opaque caller options (context, focus, format, ...).
    pub options: ResearchOptions,
}

impl ResearchRequest {
    /// Build a request from a query and options.
    #[must_use]
    pub fn new(query: impl Into<String>, options: ResearchOptions) -> Self {
        Self {
            query: query.into(),
            options,
        }
    }
}

/// Artifact produced by a completed synthesis run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResearchArtifact {
    /// The synthesized report body.
    pub content: String,
    /// Model that produced the artifact.
    pub model: String,
    /// Engine-side handle for the run, when the backend exposes one.
    pub request_id: Option<RequestId>,
}

/// A remote synthesis engine.
///
/// `submit` may run for minutes to tens of minutes. Implementations must be
/// cancel-safe: dropping the returned future aborts any in-flight work the
/// backend can abort (e.g. the HTTP request) and leaks nothing locally.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Engine identifier used in logs and report metadata.
    fn engine(&self) -> &str;

    /// Submit a research job and wait for the synthesized artifact.
    async fn submit(&self, request: &ResearchRequest) -> ResearchResult<ResearchArtifact>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
