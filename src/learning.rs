//! Continuous learning loop
//!
//! A recurring background task that mines recently created graph nodes for
//! patterns and feeds them back into the graph without external input. Each
//! cycle is additive-only - it never deletes or edits nodes it did not
//! create - and takes the same serialization gate as `fuse_knowledge`, so it
//! never races a live fusion.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::constants::{
    CLUSTER_MIN_SIZE, CLUSTER_SIMILARITY_THRESHOLD, EMBED_TIMEOUT_MS, PATTERN_CONFIDENCE,
    PATTERN_MIN_FREQUENCY, PATTERN_MIN_TOKEN_LEN,
};
use crate::embeddings::{l2_normalize, Embedder};
use crate::errors::{MemoryError, Result};
use crate::fusion::FusionMetrics;
use crate::graph::{ClusterId, ConceptCluster, KnowledgeGraph, KnowledgeNode, NodeId, NodeKind};
use crate::similarity::cosine_similarity;

/// What one learning cycle did
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    /// Recent concept nodes considered
    pub scanned: usize,
    /// Pattern nodes created or refreshed
    pub patterns: usize,
    /// New concept clusters formed
    pub clusters: usize,
}

/// Run one learning cycle: mine recent nodes for recurring token patterns
/// and group unclustered recent concepts into clusters.
pub async fn run_cycle(
    graph: &RwLock<KnowledgeGraph>,
    gate: &tokio::sync::Mutex<()>,
    metrics: &Mutex<FusionMetrics>,
    embedder: &dyn Embedder,
    lookback_secs: i64,
) -> Result<CycleReport> {
    let _guard = gate.lock().await;
    let cutoff = Utc::now() - ChronoDuration::seconds(lookback_secs);

    // Snapshot what the cycle needs, then release the read lock before
    // any embedding await
    let (recent, clustered, known_patterns) = {
        let graph = graph.read();

        let recent: Vec<(NodeId, String, Option<Vec<f32>>)> = graph
            .nodes_since(cutoff)
            .into_iter()
            .filter(|n| n.is_concept())
            .map(|n| {
                (
                    n.id,
                    n.label().to_string(),
                    graph.embedding(&n.id).cloned(),
                )
            })
            .collect();

        let clustered: HashSet<NodeId> = graph
            .clusters()
            .flat_map(|c| c.members.iter().copied())
            .collect();

        let known_patterns: HashMap<String, (NodeId, usize, chrono::DateTime<Utc>)> = graph
            .nodes()
            .filter_map(|n| match &n.kind {
                NodeKind::DiscoveredPattern {
                    signature,
                    frequency,
                } => Some((signature.clone(), (n.id, *frequency, n.created_at))),
                _ => None,
            })
            .collect();

        (recent, clustered, known_patterns)
    };

    let mut report = CycleReport {
        scanned: recent.len(),
        ..Default::default()
    };
    if recent.is_empty() {
        return Ok(report);
    }

    // Frequency-based pattern signal over recent concept labels
    let mut token_counts: HashMap<String, usize> = HashMap::new();
    for (_, label, _) in &recent {
        let mut seen_in_label = HashSet::new();
        for token in label
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= PATTERN_MIN_TOKEN_LEN)
        {
            // Count each token once per node so one verbose label
            // cannot fabricate a pattern
            if seen_in_label.insert(token.to_string()) {
                *token_counts.entry(token.to_string()).or_default() += 1;
            }
        }
    }

    let mut new_patterns = Vec::new();
    for (signature, frequency) in token_counts
        .into_iter()
        .filter(|(_, count)| *count >= PATTERN_MIN_FREQUENCY)
    {
        let embedding = match tokio::time::timeout(
            Duration::from_millis(EMBED_TIMEOUT_MS),
            embedder.embed(&signature),
        )
        .await
        {
            Ok(Ok(v)) => v,
            Ok(Err(err)) => {
                warn!(signature, error = %err, "pattern embedding failed, skipping");
                continue;
            }
            Err(_) => {
                return Err(MemoryError::Timeout {
                    operation: "embed".to_string(),
                    limit_ms: EMBED_TIMEOUT_MS,
                })
            }
        };
        new_patterns.push((signature, frequency, embedding));
    }

    // Cluster recent, embedded, not-yet-clustered concepts greedily around
    // the first unassigned seed
    let candidates: Vec<(NodeId, Vec<f32>)> = recent
        .iter()
        .filter(|(id, _, emb)| !clustered.contains(id) && emb.is_some())
        .map(|(id, _, emb)| (*id, emb.clone().unwrap_or_default()))
        .collect();

    let mut assigned: HashSet<NodeId> = HashSet::new();
    let mut new_clusters = Vec::new();
    for (seed_id, seed_emb) in &candidates {
        if assigned.contains(seed_id) {
            continue;
        }
        let members: Vec<&(NodeId, Vec<f32>)> = candidates
            .iter()
            .filter(|(id, emb)| {
                !assigned.contains(id)
                    && (id == seed_id
                        || cosine_similarity(seed_emb, emb) >= CLUSTER_SIMILARITY_THRESHOLD)
            })
            .collect();
        if members.len() < CLUSTER_MIN_SIZE {
            continue;
        }

        let dim = seed_emb.len();
        let mut centroid = vec![0.0f32; dim];
        for (_, emb) in &members {
            for (c, x) in centroid.iter_mut().zip(emb.iter()) {
                *c += x;
            }
        }
        for c in centroid.iter_mut() {
            *c /= members.len() as f32;
        }
        l2_normalize(&mut centroid);

        let member_ids: Vec<NodeId> = members.iter().map(|(id, _)| *id).collect();
        assigned.extend(member_ids.iter().copied());
        new_clusters.push(ConceptCluster {
            id: ClusterId::generate(),
            centroid,
            members: member_ids,
            created_at: Utc::now(),
        });
    }

    // Commit under the write lock; the gate is still held
    {
        let mut graph = graph.write();
        for (signature, frequency, embedding) in new_patterns {
            let (id, created_at, is_new) = match known_patterns.get(&signature) {
                Some((id, _, created_at)) => (*id, *created_at, false),
                None => (NodeId::generate(), Utc::now(), true),
            };
            graph.upsert_node(KnowledgeNode {
                id,
                kind: NodeKind::DiscoveredPattern {
                    signature: signature.clone(),
                    frequency,
                },
                confidence: PATTERN_CONFIDENCE,
                created_at,
                connections: Vec::new(),
            });
            graph.set_embedding(id, embedding);
            report.patterns += 1;
            if is_new {
                metrics.lock().patterns_discovered += 1;
            }
            debug!(signature, frequency, "pattern upserted");
        }

        for cluster in new_clusters {
            debug!(cluster = %cluster.id, members = cluster.members.len(), "cluster formed");
            graph.upsert_cluster(cluster);
            report.clusters += 1;
        }
        metrics.lock().clusters_formed += report.clusters as u64;
    }

    if report.patterns > 0 || report.clusters > 0 {
        info!(
            scanned = report.scanned,
            patterns = report.patterns,
            clusters = report.clusters,
            "learning cycle complete"
        );
    }
    Ok(report)
}

/// Timer-driven wrapper around `run_cycle`
pub struct LearningLoop {
    graph: Arc<RwLock<KnowledgeGraph>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    metrics: Arc<Mutex<FusionMetrics>>,
    embedder: Arc<dyn Embedder>,
    interval: Duration,
    lookback_secs: i64,
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl LearningLoop {
    pub fn new(
        config: &MemoryConfig,
        graph: Arc<RwLock<KnowledgeGraph>>,
        gate: Arc<tokio::sync::Mutex<()>>,
        metrics: Arc<Mutex<FusionMetrics>>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            graph,
            gate,
            metrics,
            embedder,
            interval: Duration::from_secs(config.learning_interval_secs.max(1)),
            lookback_secs: config.learning_lookback_secs,
            shutdown: Arc::new(Notify::new()),
            handle: None,
        }
    }

    /// Spawn the background task; no-op if already running
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let graph = Arc::clone(&self.graph);
        let gate = Arc::clone(&self.gate);
        let metrics = Arc::clone(&self.metrics);
        let embedder = Arc::clone(&self.embedder);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;
        let lookback_secs = self.lookback_secs;

        info!(interval_secs = interval.as_secs(), "learning loop started");
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would scan an empty lookback window
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = run_cycle(
                            &graph,
                            &gate,
                            &metrics,
                            embedder.as_ref(),
                            lookback_secs,
                        )
                        .await
                        {
                            warn!(error = %err, "learning cycle failed");
                        }
                    }
                    _ = shutdown.notified() => break,
                }
            }
        }));
    }

    /// Stop the background task and wait for it to finish the current cycle
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.notify_one();
            let _ = handle.await;
            info!("learning loop stopped");
        }
    }
}
