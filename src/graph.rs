//! Knowledge graph store
//!
//! Holds concept nodes, directed weighted edges, and concept clusters,
//! indexed by id. Edges live on the source node's `connections` list, which
//! keeps the persisted snapshot layout (nodes / embeddings / clusters, no
//! separate edge table) trivially round-trippable.
//!
//! The store does no locking: mutations only arrive through the serialized
//! fusion and learning paths, which hold a single gate across their commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::errors::{MemoryError, Result};
use crate::extraction::EntityKind;

/// Unique identifier for knowledge nodes
///
/// UUID v4 rather than a timestamp+suffix scheme: ids stay unique even when
/// two fusions land within the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for concept clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub Uuid);

impl ClusterId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a concept node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptKind {
    /// The whole knowledge item as a single concept
    Statement,
    /// A topic from the fixed taxonomy; hierarchy rules attach children here
    Category,
    Person,
    Location,
    Organization,
    Date,
    Time,
}

impl From<EntityKind> for ConceptKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Person => Self::Person,
            EntityKind::Location => Self::Location,
            EntityKind::Organization => Self::Organization,
            EntityKind::Date => Self::Date,
            EntityKind::Time => Self::Time,
        }
    }
}

/// Node payload, tagged by kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// A concept extracted from a knowledge item
    Concept {
        text: String,
        concept_kind: ConceptKind,
        /// Where the knowledge item came from, if the caller said
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Two near-identical concepts folded together by the merge rule
    MergedConcept {
        text: String,
        merged_from: Vec<NodeId>,
    },
    /// A recurring token signature found by the learning loop
    DiscoveredPattern { signature: String, frequency: usize },
}

/// Relation types for edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    SemanticSimilarity,
    RelatesTo,
    IsA,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SemanticSimilarity => "semantic_similarity",
            Self::RelatesTo => "relates_to",
            Self::IsA => "is_a",
        }
    }
}

/// Directed weighted edge between two nodes
///
/// Both endpoints must exist in the graph; `add_edge` enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
    pub relation: Relation,
    /// Strength in [0, 1]
    pub strength: f32,
    /// Human-readable reason code, e.g. "batch_similarity"
    pub reason: String,
}

/// A node in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Confidence in [0, 1], blended into search relevance
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    /// Outgoing edges
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
}

impl KnowledgeNode {
    /// Display label: concept text, merged text, or pattern signature
    pub fn label(&self) -> &str {
        match &self.kind {
            NodeKind::Concept { text, .. } => text,
            NodeKind::MergedConcept { text, .. } => text,
            NodeKind::DiscoveredPattern { signature, .. } => signature,
        }
    }

    pub fn is_concept(&self) -> bool {
        matches!(self.kind, NodeKind::Concept { .. })
    }
}

/// A group of semantically related concepts sharing a centroid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptCluster {
    pub id: ClusterId,
    pub centroid: Vec<f32>,
    pub members: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
}

/// Persisted graph layout: versionless JSON with id/value pair tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<(NodeId, KnowledgeNode)>,
    pub embeddings: Vec<(NodeId, Vec<f32>)>,
    pub clusters: Vec<(ClusterId, ConceptCluster)>,
}

/// In-memory knowledge graph with id indexes
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    nodes: HashMap<NodeId, KnowledgeNode>,
    embeddings: HashMap<NodeId, Vec<f32>>,
    clusters: HashMap<ClusterId, ConceptCluster>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node, keyed by its id
    pub fn upsert_node(&mut self, node: KnowledgeNode) {
        self.nodes.insert(node.id, node);
    }

    /// Store the embedding for an existing node id
    pub fn set_embedding(&mut self, id: NodeId, embedding: Vec<f32>) {
        self.embeddings.insert(id, embedding);
    }

    /// Add a directed edge, rejecting dangling endpoints
    pub fn add_edge(&mut self, edge: Connection) -> Result<()> {
        if !self.nodes.contains_key(&edge.from) || !self.nodes.contains_key(&edge.to) {
            return Err(MemoryError::DanglingEdge {
                from: edge.from.0,
                to: edge.to.0,
            });
        }
        let strength = edge.strength.clamp(0.0, 1.0);
        if let Some(node) = self.nodes.get_mut(&edge.from) {
            node.connections.push(Connection { strength, ..edge });
        }
        Ok(())
    }

    pub fn get_node(&self, id: &NodeId) -> Option<&KnowledgeNode> {
        self.nodes.get(id)
    }

    pub fn get_mut_node(&mut self, id: &NodeId) -> Option<&mut KnowledgeNode> {
        self.nodes.get_mut(id)
    }

    pub fn embedding(&self, id: &NodeId) -> Option<&Vec<f32>> {
        self.embeddings.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &KnowledgeNode> {
        self.nodes.values()
    }

    /// Nodes that carry an embedding, for similarity scans
    pub fn nodes_with_embeddings(&self) -> impl Iterator<Item = (&KnowledgeNode, &Vec<f32>)> {
        self.embeddings
            .iter()
            .filter_map(|(id, emb)| self.nodes.get(id).map(|n| (n, emb)))
    }

    /// Nodes created at or after the cutoff, for the learning loop
    pub fn nodes_since(&self, cutoff: DateTime<Utc>) -> Vec<&KnowledgeNode> {
        self.nodes
            .values()
            .filter(|n| n.created_at >= cutoff)
            .collect()
    }

    /// Find a discovered-pattern node by signature
    pub fn pattern_by_signature(&self, signature: &str) -> Option<&KnowledgeNode> {
        self.nodes.values().find(|n| {
            matches!(&n.kind, NodeKind::DiscoveredPattern { signature: s, .. } if s == signature)
        })
    }

    pub fn upsert_cluster(&mut self, cluster: ConceptCluster) {
        self.clusters.insert(cluster.id, cluster);
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ConceptCluster> {
        self.clusters.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.connections.len()).sum()
    }

    pub fn embedding_count(&self) -> usize {
        self.embeddings.len()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Export the graph as its persisted pair-table layout
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.iter().map(|(k, v)| (*k, v.clone())).collect(),
            embeddings: self
                .embeddings
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            clusters: self.clusters.iter().map(|(k, v)| (*k, v.clone())).collect(),
        }
    }

    /// Rebuild a graph from a snapshot
    ///
    /// Edges whose endpoints did not survive are dropped with a warning so a
    /// damaged snapshot degrades instead of violating the no-dangling-edge
    /// invariant.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut nodes: HashMap<NodeId, KnowledgeNode> =
            snapshot.nodes.into_iter().collect();

        let known: std::collections::HashSet<NodeId> = nodes.keys().copied().collect();
        for node in nodes.values_mut() {
            let before = node.connections.len();
            node.connections.retain(|c| known.contains(&c.to));
            if node.connections.len() < before {
                warn!(
                    node = %node.id,
                    dropped = before - node.connections.len(),
                    "dropping dangling edges from loaded snapshot"
                );
            }
        }

        Self {
            embeddings: snapshot
                .embeddings
                .into_iter()
                .filter(|(id, _)| nodes.contains_key(id))
                .collect(),
            clusters: snapshot.clusters.into_iter().collect(),
            nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(text: &str) -> KnowledgeNode {
        KnowledgeNode {
            id: NodeId::generate(),
            kind: NodeKind::Concept {
                text: text.to_string(),
                concept_kind: ConceptKind::Statement,
                source: None,
            },
            confidence: 0.9,
            created_at: Utc::now(),
            connections: Vec::new(),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let mut graph = KnowledgeGraph::new();
        let node = concept("rust");
        let id = node.id;
        graph.upsert_node(node);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.get_node(&id).unwrap().label(), "rust");
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut graph = KnowledgeGraph::new();
        let node = concept("only node");
        let id = node.id;
        graph.upsert_node(node);

        let err = graph
            .add_edge(Connection {
                from: id,
                to: NodeId::generate(),
                relation: Relation::RelatesTo,
                strength: 0.5,
                reason: "test".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.code(), "DANGLING_EDGE");
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_edge_strength_clamped() {
        let mut graph = KnowledgeGraph::new();
        let a = concept("a");
        let b = concept("b");
        let (ia, ib) = (a.id, b.id);
        graph.upsert_node(a);
        graph.upsert_node(b);

        graph
            .add_edge(Connection {
                from: ia,
                to: ib,
                relation: Relation::SemanticSimilarity,
                strength: 1.7,
                reason: "clamp".to_string(),
            })
            .unwrap();
        let stored = &graph.get_node(&ia).unwrap().connections[0];
        assert!((stored.strength - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_snapshot_round_trip_counts() {
        let mut graph = KnowledgeGraph::new();
        let a = concept("alpha");
        let b = concept("beta");
        let (ia, ib) = (a.id, b.id);
        graph.upsert_node(a);
        graph.upsert_node(b);
        graph.set_embedding(ia, vec![1.0, 0.0]);
        graph.set_embedding(ib, vec![0.0, 1.0]);
        graph
            .add_edge(Connection {
                from: ia,
                to: ib,
                relation: Relation::RelatesTo,
                strength: 0.6,
                reason: "test".to_string(),
            })
            .unwrap();

        let json = serde_json::to_string(&graph.snapshot()).unwrap();
        let restored = KnowledgeGraph::from_snapshot(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edge_count(), graph.edge_count());
        assert_eq!(restored.embedding_count(), graph.embedding_count());
    }

    #[test]
    fn test_snapshot_drops_dangling_edges() {
        let mut graph = KnowledgeGraph::new();
        let a = concept("alpha");
        let b = concept("beta");
        let (ia, ib) = (a.id, b.id);
        graph.upsert_node(a);
        graph.upsert_node(b);
        graph
            .add_edge(Connection {
                from: ia,
                to: ib,
                relation: Relation::RelatesTo,
                strength: 0.6,
                reason: "test".to_string(),
            })
            .unwrap();

        let mut snapshot = graph.snapshot();
        // Simulate a damaged snapshot missing the edge target
        snapshot.nodes.retain(|(id, _)| *id != ib);

        let restored = KnowledgeGraph::from_snapshot(snapshot);
        assert_eq!(restored.node_count(), 1);
        assert_eq!(restored.edge_count(), 0);
    }
}
