//! # delve-store
//!
//! Durable persistence of completed research artifacts.
//!
//! The [`ResultStore`] trait is the narrow contract the orchestrator writes
//! through: `put` an artifact under a session-derived key and get back an
//! opaque location; `get` a previously stored artifact by location. Writes
//! are atomic from the perspective of readers — a partially written artifact
//! is never observable.
//!
//! [`FsResultStore`] is the filesystem implementation (temp file + rename).

#![deny(unsafe_code)]

pub mod fs;

pub use fs::FsResultStore;

use async_trait::async_trait;
use delve_core::SessionId;

/// Errors that can occur in a result store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying I/O failure while writing or reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No artifact exists at the given location.
    #[error("artifact not found: {0}")]
    NotFound(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed, append-only artifact storage.
///
/// Concurrent writers always use distinct keys (derived from session ids),
/// so implementations need no cross-key coordination — only atomic publish
/// per key.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist an artifact under the session's key; returns its location.
    async fn put(&self, id: &SessionId, content: &str) -> StoreResult<String>;

    /// Fetch a previously stored artifact by location.
    async fn get(&self, location: &str) -> StoreResult<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
