//! Top-level memory system facade
//!
//! `SemanticMemory` wires the pieces together: the session manager, the
//! fusion engine, the learning loop, and persistence. It is constructed once
//! at process start and handed by reference to collaborators - there are no
//! ambient singletons in this crate.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::MemoryConfig;
use crate::embeddings::{Embedder, HashEmbedder};
use crate::errors::Result;
use crate::fusion::{
    rules::FusionRule, FusionEngine, FusionMetrics, FusionOutcome, KnowledgeItem, SearchHit,
    SearchOptions,
};
use crate::graph::KnowledgeGraph;
use crate::learning::{self, CycleReport, LearningLoop};
use crate::session::{ConversationView, Message, NewMessage, SessionId, SessionManager};
use crate::storage::MemoryStore;

/// Size counters for the knowledge graph
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub embeddings: usize,
    pub clusters: usize,
}

/// The assembled memory system
pub struct SemanticMemory {
    config: MemoryConfig,
    graph: Arc<RwLock<KnowledgeGraph>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    embedder: Arc<dyn Embedder>,
    fusion: FusionEngine,
    sessions: Arc<SessionManager>,
    store: Arc<MemoryStore>,
    learning: Mutex<Option<LearningLoop>>,
    flush: Mutex<Option<(Arc<Notify>, JoinHandle<()>)>>,
}

impl SemanticMemory {
    /// Open with the built-in deterministic embedder
    pub async fn open(config: MemoryConfig) -> Result<Self> {
        let dim = config.embedding_dim;
        Self::open_with_embedder(config, Arc::new(HashEmbedder::new(dim))).await
    }

    /// Open with a caller-supplied embedder (e.g. a real model)
    ///
    /// Loads persisted snapshots from the configured storage path. A failed
    /// load is logged and the system proceeds with empty defaults - memory
    /// loss is preferable to refusing to start.
    pub async fn open_with_embedder(
        config: MemoryConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let store = Arc::new(MemoryStore::new(
            config.storage_path.clone(),
            Duration::from_secs(config.io_timeout_secs),
        ));

        let graph = match store.load_graph().await {
            Ok(Some(snapshot)) => {
                let graph = KnowledgeGraph::from_snapshot(snapshot);
                info!(nodes = graph.node_count(), "knowledge graph loaded");
                graph
            }
            Ok(None) => KnowledgeGraph::new(),
            Err(err) => {
                warn!(error = %err, "graph load failed, starting empty");
                KnowledgeGraph::new()
            }
        };
        let graph = Arc::new(RwLock::new(graph));

        let sessions = Arc::new(SessionManager::new(&config));
        match store.load_context().await {
            Ok(Some(snapshot)) => {
                info!(
                    sessions = snapshot.recent_sessions.len(),
                    "conversation context loaded"
                );
                sessions.restore(snapshot);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "context load failed, starting empty");
            }
        }

        let gate = Arc::new(tokio::sync::Mutex::new(()));
        let fusion = FusionEngine::new(
            &config,
            Arc::clone(&graph),
            Arc::clone(&embedder),
            Arc::clone(&gate),
        );

        Ok(Self {
            config,
            graph,
            gate,
            embedder,
            fusion,
            sessions,
            store,
            learning: Mutex::new(None),
            flush: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Register an additional fusion rule; runs after the baseline rules
    pub fn register_rule(&mut self, rule: Box<dyn FusionRule>) {
        self.fusion.register_rule(rule);
    }

    // ---- Conversation side -------------------------------------------------

    pub fn start_session(&self) -> SessionId {
        self.sessions.start_session()
    }

    /// Switch the active session; a session switch is a save trigger
    pub async fn switch_session(&self, id: SessionId) -> SessionId {
        let id = self.sessions.switch_session(id);
        if let Err(err) = self.save().await {
            warn!(error = %err, "save on session switch failed");
        }
        id
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.sessions.active_session()
    }

    pub fn add_message(&self, session_id: SessionId, message: NewMessage) -> Result<Message> {
        self.sessions.add_message(session_id, message)
    }

    /// Conversation context for prompt construction; `window` defaults to
    /// the configured context window
    pub fn conversation_context(
        &self,
        session_id: SessionId,
        window: Option<usize>,
        include_analysis: bool,
    ) -> Result<ConversationView> {
        self.sessions.conversation_context(
            session_id,
            window.unwrap_or(self.config.context_window),
            include_analysis,
        )
    }

    pub fn session_count(&self) -> usize {
        self.sessions.session_count()
    }

    /// Clone of a session's current state, mostly for inspection
    pub fn session(&self, id: SessionId) -> Option<crate::session::Session> {
        self.sessions.session(id)
    }

    // ---- Knowledge side ----------------------------------------------------

    pub async fn fuse_knowledge(&self, item: KnowledgeItem) -> Result<FusionOutcome> {
        self.fusion.fuse_knowledge(item).await
    }

    /// Similarity search; `options` defaults to the configured threshold
    /// and limit
    pub async fn semantic_search(
        &self,
        query: &str,
        options: Option<SearchOptions>,
    ) -> Result<Vec<SearchHit>> {
        let options = options.unwrap_or_else(|| self.fusion.default_search_options());
        self.fusion.semantic_search(query, options).await
    }

    pub fn metrics(&self) -> FusionMetrics {
        self.fusion.metrics()
    }

    pub fn graph_stats(&self) -> GraphStats {
        let graph = self.graph.read();
        GraphStats {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            embeddings: graph.embedding_count(),
            clusters: graph.cluster_count(),
        }
    }

    /// Run one learning cycle immediately, outside the timer
    pub async fn run_learning_cycle(&self) -> Result<CycleReport> {
        learning::run_cycle(
            &self.graph,
            &self.gate,
            &self.fusion.metrics_handle(),
            self.embedder.as_ref(),
            self.config.learning_lookback_secs,
        )
        .await
    }

    // ---- Lifecycle ---------------------------------------------------------

    /// Start the learning loop and, if configured, the periodic flush
    pub fn start_background(&self) {
        {
            let mut learning = self.learning.lock();
            if learning.is_none() {
                let mut task = LearningLoop::new(
                    &self.config,
                    Arc::clone(&self.graph),
                    Arc::clone(&self.gate),
                    self.fusion.metrics_handle(),
                    Arc::clone(&self.embedder),
                );
                task.start();
                *learning = Some(task);
            }
        }

        if self.config.flush_interval_secs > 0 {
            let mut flush = self.flush.lock();
            if flush.is_none() {
                let shutdown = Arc::new(Notify::new());
                let handle = spawn_flush_task(
                    Duration::from_secs(self.config.flush_interval_secs),
                    Arc::clone(&self.graph),
                    Arc::clone(&self.sessions),
                    Arc::clone(&self.store),
                    Arc::clone(&shutdown),
                );
                *flush = Some((shutdown, handle));
            }
        }
    }

    /// Persist both snapshots
    pub async fn save(&self) -> Result<()> {
        let graph_snapshot = self.graph.read().snapshot();
        self.store.save_graph(&graph_snapshot).await?;
        let context_snapshot = self.sessions.snapshot();
        self.store.save_context(&context_snapshot).await?;
        Ok(())
    }

    /// Stop background tasks and persist; shutdown is a save trigger
    pub async fn shutdown(&self) -> Result<()> {
        let learning = self.learning.lock().take();
        if let Some(mut task) = learning {
            task.stop().await;
        }

        let flush = self.flush.lock().take();
        if let Some((shutdown, handle)) = flush {
            shutdown.notify_one();
            let _ = handle.await;
        }

        self.save().await
    }
}

fn spawn_flush_task(
    interval: Duration,
    graph: Arc<RwLock<KnowledgeGraph>>,
    sessions: Arc<SessionManager>,
    store: Arc<MemoryStore>,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "periodic flush started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let graph_snapshot = graph.read().snapshot();
                    if let Err(err) = store.save_graph(&graph_snapshot).await {
                        warn!(error = %err, "periodic graph flush failed");
                    }
                    let context_snapshot = sessions.snapshot();
                    if let Err(err) = store.save_context(&context_snapshot).await {
                        warn!(error = %err, "periodic context flush failed");
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    })
}
