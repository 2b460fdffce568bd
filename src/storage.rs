//! JSON snapshot persistence
//!
//! Two versionless blobs: the knowledge graph (nodes / embeddings /
//! clusters) and the conversation context (globalContext / recentSessions).
//! The storage medium is deliberately plain files so any other
//! implementation of the same contract can read them.
//!
//! Every call carries a bounded deadline; on timeout or failure the caller's
//! in-memory state is untouched. Writes go through a temp file + rename so a
//! crash mid-save never truncates the previous snapshot.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{MemoryError, Result};
use crate::graph::GraphSnapshot;
use crate::session::ContextSnapshot;

const GRAPH_FILE: &str = "knowledge_graph.json";
const CONTEXT_FILE: &str = "conversation_context.json";

/// File-backed snapshot store
pub struct MemoryStore {
    root: PathBuf,
    io_timeout: Duration,
}

impl MemoryStore {
    pub fn new(root: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            io_timeout,
        }
    }

    pub fn graph_path(&self) -> PathBuf {
        self.root.join(GRAPH_FILE)
    }

    pub fn context_path(&self) -> PathBuf {
        self.root.join(CONTEXT_FILE)
    }

    /// Persist the knowledge graph snapshot
    pub async fn save_graph(&self, snapshot: &GraphSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.write_atomic(&self.graph_path(), bytes).await?;
        debug!(
            nodes = snapshot.nodes.len(),
            embeddings = snapshot.embeddings.len(),
            clusters = snapshot.clusters.len(),
            "graph snapshot saved"
        );
        Ok(())
    }

    /// Load the knowledge graph snapshot; Ok(None) when none exists yet
    pub async fn load_graph(&self) -> Result<Option<GraphSnapshot>> {
        match self.read_all(&self.graph_path()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist the conversation context snapshot
    pub async fn save_context(&self, snapshot: &ContextSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.write_atomic(&self.context_path(), bytes).await?;
        debug!(
            sessions = snapshot.recent_sessions.len(),
            "context snapshot saved"
        );
        Ok(())
    }

    /// Load the conversation context snapshot; Ok(None) when none exists yet
    pub async fn load_context(&self) -> Result<Option<ContextSnapshot>> {
        match self.read_all(&self.context_path()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_atomic(&self, path: &Path, bytes: Vec<u8>) -> Result<()> {
        let root = self.root.clone();
        let path = path.to_path_buf();
        let tmp = path.with_extension("json.tmp");

        self.with_deadline("save", async move {
            tokio::fs::create_dir_all(&root).await?;
            tokio::fs::write(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;
            Ok(())
        })
        .await
    }

    async fn read_all(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        if !path.exists() {
            return Ok(None);
        }
        let path = path.to_path_buf();
        self.with_deadline("load", async move {
            Ok(Some(tokio::fs::read(&path).await?))
        })
        .await
    }

    async fn with_deadline<T>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, "persistence deadline exceeded");
                Err(MemoryError::Timeout {
                    operation: operation.to_string(),
                    limit_ms: self.io_timeout.as_millis() as u64,
                })
            }
        }
    }
}
