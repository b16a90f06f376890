//! Filesystem-backed result store with atomic publish.
//!
//! Artifacts are written to `<root>/<session-id>.md`. Each write goes to a
//! hidden temp file in the same directory, is flushed and fsynced, and is
//! then renamed over the final path — readers either see the whole artifact
//! or nothing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use delve_core::SessionId;

use crate::{ResultStore, StoreError, StoreResult};

/// Result store rooted at a reports directory on the local filesystem.
#[derive(Clone, Debug)]
pub struct FsResultStore {
    root: PathBuf,
}

impl FsResultStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first `put`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The reports directory this store writes into.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final artifact path for a session.
    fn artifact_path(&self, id: &SessionId) -> PathBuf {
        self.root.join(format!("{id}.md"))
    }

    /// Temp path for an in-progress write. Lives in the same directory as
    /// the final path so the rename stays on one filesystem.
    fn temp_path(&self, id: &SessionId) -> PathBuf {
        self.root.join(format!(".{id}.md.tmp"))
    }
}

#[async_trait]
impl ResultStore for FsResultStore {
    async fn put(&self, id: &SessionId, content: &str) -> StoreResult<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let temp = self.temp_path(id);
        let path = self.artifact_path(id);

        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp, &path).await?;
        debug!(session_id = %id, path = %path.display(), bytes = content.len(), "artifact published");

        Ok(path.to_string_lossy().into_owned())
    }

    async fn get(&self, location: &str) -> StoreResult<String> {
        match tokio::fs::read_to_string(location).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(location.to_owned()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
