//! Knowledge fusion engine
//!
//! `fuse_knowledge` turns a raw knowledge item into graph structure:
//! extract concepts, embed them, connect them (to each other and to existing
//! nodes), run the registered fusion rules over the batch, then commit
//! everything to the graph in one synchronous step.
//!
//! At most one fusion is in flight at a time: id generation and graph upsert
//! are not atomic across the awaited embedding step, so all fusions (and the
//! learning loop) serialize on a shared tokio mutex. All graph mutation sits
//! in one synchronous commit block after the last await, so a fusion future
//! dropped mid-embed leaves the graph untouched - never half-applied.

pub mod rules;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MemoryConfig;
use crate::constants::{
    CATEGORY_CONFIDENCE, CONCEPT_LINK_THRESHOLD, EMBED_TIMEOUT_MS, ENTITY_CONFIDENCE,
    GRAPH_LINK_LIMIT, GRAPH_LINK_THRESHOLD, RELEVANCE_CONFIDENCE_WEIGHT,
    RELEVANCE_SIMILARITY_WEIGHT, STATEMENT_CONFIDENCE,
};
use crate::embeddings::Embedder;
use crate::errors::{MemoryError, Result};
use crate::extraction::FeatureExtractor;
use crate::graph::{
    ConceptKind, Connection, KnowledgeGraph, KnowledgeNode, NodeId, NodeKind, Relation,
};
use crate::similarity::{cosine_similarity, top_k_by_score};
use crate::validation;

use rules::{FusionRule, HierarchyRule, MergeSimilarRule, RuleBatch, RuleOutput};

/// A knowledge snippet submitted for fusion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub content: String,
    /// Collaborator-supplied provenance, e.g. "openai" or "user"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl KnowledgeItem {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
            timestamp: None,
        }
    }

    pub fn with_source(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: Some(source.into()),
            timestamp: None,
        }
    }
}

/// Running counters over all fusion activity
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FusionMetrics {
    pub fusion_events: u64,
    pub nodes_created: u64,
    pub edges_created: u64,
    pub edges_dropped: u64,
    pub patterns_discovered: u64,
    pub clusters_formed: u64,
}

/// What one fusion produced
#[derive(Debug, Clone)]
pub struct FusionOutcome {
    pub fusion_id: Uuid,
    pub node_ids: Vec<NodeId>,
    pub edge_count: usize,
}

/// Search parameters; defaults come from configuration
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Minimum cosine similarity for a hit
    pub threshold: f32,
    /// Maximum hits returned
    pub limit: usize,
}

/// One ranked search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub node: KnowledgeNode,
    pub similarity: f32,
    /// similarity and node confidence blended, the ranking key
    pub relevance: f32,
}

/// A concept extracted and embedded but not yet committed
#[derive(Debug, Clone)]
pub struct ConceptDraft {
    pub id: NodeId,
    pub text: String,
    pub kind: ConceptKind,
    pub confidence: f32,
    pub embedding: Vec<f32>,
}

/// The fusion engine: extraction + embedding + rules + graph commit
pub struct FusionEngine {
    graph: Arc<RwLock<KnowledgeGraph>>,
    embedder: Arc<dyn Embedder>,
    extractor: FeatureExtractor,
    rules: Vec<Box<dyn FusionRule>>,
    /// Serializes fuse_knowledge and the learning loop
    gate: Arc<tokio::sync::Mutex<()>>,
    metrics: Arc<Mutex<FusionMetrics>>,
    default_threshold: f32,
    default_limit: usize,
}

impl FusionEngine {
    /// Build an engine with the two baseline rules registered
    pub fn new(
        config: &MemoryConfig,
        graph: Arc<RwLock<KnowledgeGraph>>,
        embedder: Arc<dyn Embedder>,
        gate: Arc<tokio::sync::Mutex<()>>,
    ) -> Self {
        Self {
            graph,
            embedder,
            extractor: FeatureExtractor::new(),
            rules: vec![Box::new(MergeSimilarRule), Box::new(HierarchyRule)],
            gate,
            metrics: Arc::new(Mutex::new(FusionMetrics::default())),
            default_threshold: config.similarity_threshold,
            default_limit: config.search_limit,
        }
    }

    /// Register a further fusion rule; rules run in registration order
    pub fn register_rule(&mut self, rule: Box<dyn FusionRule>) {
        debug!(rule = rule.id(), "registering fusion rule");
        self.rules.push(rule);
    }

    pub fn default_search_options(&self) -> SearchOptions {
        SearchOptions {
            threshold: self.default_threshold,
            limit: self.default_limit,
        }
    }

    /// Snapshot of the running counters
    pub fn metrics(&self) -> FusionMetrics {
        *self.metrics.lock()
    }

    pub(crate) fn metrics_handle(&self) -> Arc<Mutex<FusionMetrics>> {
        Arc::clone(&self.metrics)
    }

    /// Fuse one knowledge item into the graph
    ///
    /// Validation happens before the serialization gate so malformed items
    /// are rejected without blocking anyone. Everything after the gate runs
    /// to completion.
    pub async fn fuse_knowledge(&self, item: KnowledgeItem) -> Result<FusionOutcome> {
        validation::validate_knowledge_item(&item)?;

        let _guard = self.gate.lock().await;
        let fusion_id = Uuid::new_v4();

        let mut drafts = self.draft_concepts(&item).await?;
        if drafts.is_empty() {
            // Cannot happen today (the statement concept always exists),
            // but a future extractor swap should not panic the pipeline.
            return Err(MemoryError::InvalidInput {
                field: "content".to_string(),
                reason: "no concepts extracted".to_string(),
            });
        }
        for draft in &mut drafts {
            draft.embedding = self.embed_with_deadline(&draft.text).await?;
        }

        // Connections within the batch
        let mut connections = Vec::new();
        for i in 0..drafts.len() {
            for j in (i + 1)..drafts.len() {
                let sim = cosine_similarity(&drafts[i].embedding, &drafts[j].embedding);
                if sim >= CONCEPT_LINK_THRESHOLD {
                    connections.push(Connection {
                        from: drafts[i].id,
                        to: drafts[j].id,
                        relation: Relation::SemanticSimilarity,
                        strength: sim.clamp(0.0, 1.0),
                        reason: "batch_similarity".to_string(),
                    });
                }
            }
        }

        // Connections to the existing graph
        let graph_links = {
            let graph = self.graph.read();
            let mut links = Vec::new();
            for draft in &drafts {
                let scored: Vec<(f32, NodeId)> = graph
                    .nodes_with_embeddings()
                    .map(|(node, emb)| (cosine_similarity(&draft.embedding, emb), node.id))
                    .filter(|(sim, _)| *sim >= GRAPH_LINK_THRESHOLD)
                    .collect();
                for (sim, target) in top_k_by_score(scored, GRAPH_LINK_LIMIT) {
                    links.push(Connection {
                        from: draft.id,
                        to: target,
                        relation: Relation::RelatesTo,
                        strength: sim.clamp(0.0, 1.0),
                        reason: "graph_similarity".to_string(),
                    });
                }
            }
            links
        };

        // Rules see the original batch, not each other's output
        connections.extend(graph_links);
        let mut rule_output = RuleOutput::default();
        {
            let batch = RuleBatch {
                concepts: &drafts,
                connections: &connections,
            };
            for rule in &self.rules {
                if rule.applies(&batch) {
                    let out = rule.apply(&batch);
                    debug!(
                        rule = rule.id(),
                        nodes = out.nodes.len(),
                        edges = out.edges.len(),
                        "fusion rule applied"
                    );
                    rule_output.merge(out);
                }
            }
        }

        // Commit: nodes first, then edges, dropping any dangling edge
        let item_created_at = item.timestamp.unwrap_or_else(Utc::now);
        let mut node_ids = Vec::with_capacity(drafts.len() + rule_output.nodes.len());
        let mut edges_created = 0usize;
        let mut edges_dropped = 0usize;
        {
            let mut graph = self.graph.write();
            for draft in drafts {
                node_ids.push(draft.id);
                graph.upsert_node(KnowledgeNode {
                    id: draft.id,
                    kind: NodeKind::Concept {
                        text: draft.text,
                        concept_kind: draft.kind,
                        source: item.source.clone(),
                    },
                    confidence: draft.confidence,
                    created_at: item_created_at,
                    connections: Vec::new(),
                });
                graph.set_embedding(draft.id, draft.embedding);
            }
            for node in rule_output.nodes {
                node_ids.push(node.id);
                graph.upsert_node(node);
            }
            for (id, embedding) in rule_output.embeddings {
                graph.set_embedding(id, embedding);
            }

            for edge in connections.into_iter().chain(rule_output.edges) {
                match graph.add_edge(edge) {
                    Ok(()) => edges_created += 1,
                    Err(err) => {
                        warn!(error = %err, "dropping edge during fusion commit");
                        edges_dropped += 1;
                    }
                }
            }
        }

        {
            let mut metrics = self.metrics.lock();
            metrics.fusion_events += 1;
            metrics.nodes_created += node_ids.len() as u64;
            metrics.edges_created += edges_created as u64;
            metrics.edges_dropped += edges_dropped as u64;
        }

        info!(
            fusion_id = %fusion_id,
            nodes = node_ids.len(),
            edges = edges_created,
            "knowledge fused"
        );

        Ok(FusionOutcome {
            fusion_id,
            node_ids,
            edge_count: edges_created,
        })
    }

    /// Similarity search over all embedded nodes
    ///
    /// Ranks by `0.7 x similarity + 0.3 x confidence`, excludes hits below
    /// the similarity threshold, truncates to the limit.
    pub async fn semantic_search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let query_vector = self.embed_with_deadline(query).await?;

        let graph = self.graph.read();
        let scored: Vec<(f32, SearchHit)> = graph
            .nodes_with_embeddings()
            .filter_map(|(node, emb)| {
                let similarity = cosine_similarity(&query_vector, emb);
                if similarity < options.threshold {
                    return None;
                }
                let relevance = RELEVANCE_SIMILARITY_WEIGHT * similarity
                    + RELEVANCE_CONFIDENCE_WEIGHT * node.confidence;
                Some((
                    relevance,
                    SearchHit {
                        node: node.clone(),
                        similarity,
                        relevance,
                    },
                ))
            })
            .collect();

        Ok(top_k_by_score(scored, options.limit)
            .into_iter()
            .map(|(_, hit)| hit)
            .collect())
    }

    /// Extract the concept batch for one item: the statement itself, every
    /// entity (deduplicated within the batch), and every topic as a category
    async fn draft_concepts(&self, item: &KnowledgeItem) -> Result<Vec<ConceptDraft>> {
        let features = self.extractor.extract(&item.content, false);

        let mut drafts = vec![ConceptDraft {
            id: NodeId::generate(),
            text: item.content.trim().to_string(),
            kind: ConceptKind::Statement,
            confidence: STATEMENT_CONFIDENCE,
            embedding: Vec::new(),
        }];

        let mut seen: HashSet<(ConceptKind, String)> = HashSet::new();
        for entity in features.entities {
            let kind = ConceptKind::from(entity.kind);
            if seen.insert((kind, entity.text.to_lowercase())) {
                drafts.push(ConceptDraft {
                    id: NodeId::generate(),
                    text: entity.text,
                    kind,
                    confidence: ENTITY_CONFIDENCE,
                    embedding: Vec::new(),
                });
            }
        }

        for topic in features.topics {
            drafts.push(ConceptDraft {
                id: NodeId::generate(),
                text: topic.as_str().to_string(),
                kind: ConceptKind::Category,
                confidence: CATEGORY_CONFIDENCE,
                embedding: Vec::new(),
            });
        }

        Ok(drafts)
    }

    async fn embed_with_deadline(&self, text: &str) -> Result<Vec<f32>> {
        match tokio::time::timeout(
            Duration::from_millis(EMBED_TIMEOUT_MS),
            self.embedder.embed(text),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MemoryError::Timeout {
                operation: "embed".to_string(),
                limit_ms: EMBED_TIMEOUT_MS,
            }),
        }
    }
}
