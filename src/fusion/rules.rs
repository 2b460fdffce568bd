//! Fusion rules: pluggable transforms over a fusion batch
//!
//! Rules run in registration order. Each rule sees the ORIGINAL batch of
//! extracted concepts and their connections - never the accumulating output
//! of earlier rules - and its output is concatenated into the commit. Rules
//! are pure over that snapshot, so a failed commit simply does not apply
//! their output.

use chrono::Utc;

use crate::constants::{HIERARCHY_EDGE_STRENGTH, MERGE_SIMILARITY_THRESHOLD};
use crate::embeddings::l2_normalize;
use crate::graph::{Connection, KnowledgeNode, NodeId, NodeKind, Relation};

use super::ConceptDraft;
use crate::graph::ConceptKind;

/// Snapshot of one fusion batch, as seen by every rule
pub struct RuleBatch<'a> {
    pub concepts: &'a [ConceptDraft],
    pub connections: &'a [Connection],
}

impl RuleBatch<'_> {
    fn draft(&self, id: NodeId) -> Option<&ConceptDraft> {
        self.concepts.iter().find(|c| c.id == id)
    }
}

/// Nodes, embeddings, and edges a rule wants added to the graph
#[derive(Default)]
pub struct RuleOutput {
    pub nodes: Vec<KnowledgeNode>,
    pub embeddings: Vec<(NodeId, Vec<f32>)>,
    pub edges: Vec<Connection>,
}

impl RuleOutput {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn merge(&mut self, other: RuleOutput) {
        self.nodes.extend(other.nodes);
        self.embeddings.extend(other.embeddings);
        self.edges.extend(other.edges);
    }
}

/// A named predicate + transform pair
///
/// Open extension point: callers may register further rules without any
/// change to the fusion pipeline.
pub trait FusionRule: Send + Sync {
    /// Stable rule identifier, used in logs
    fn id(&self) -> &'static str;

    /// Whether this rule has anything to do for the batch
    fn applies(&self, batch: &RuleBatch<'_>) -> bool;

    /// Produce additional structure from the batch snapshot
    fn apply(&self, batch: &RuleBatch<'_>) -> RuleOutput;
}

/// Fold pairs of concepts joined by a very strong semantic_similarity edge
/// into a merged_concept node referencing both originals
pub struct MergeSimilarRule;

impl FusionRule for MergeSimilarRule {
    fn id(&self) -> &'static str {
        "merge_similar"
    }

    fn applies(&self, batch: &RuleBatch<'_>) -> bool {
        batch.connections.iter().any(|c| {
            c.relation == Relation::SemanticSimilarity && c.strength > MERGE_SIMILARITY_THRESHOLD
        })
    }

    fn apply(&self, batch: &RuleBatch<'_>) -> RuleOutput {
        let mut out = RuleOutput::default();

        for conn in batch.connections.iter().filter(|c| {
            c.relation == Relation::SemanticSimilarity && c.strength > MERGE_SIMILARITY_THRESHOLD
        }) {
            let (Some(a), Some(b)) = (batch.draft(conn.from), batch.draft(conn.to)) else {
                continue;
            };

            let merged_id = NodeId::generate();
            out.nodes.push(KnowledgeNode {
                id: merged_id,
                kind: NodeKind::MergedConcept {
                    text: format!("{} + {}", a.text, b.text),
                    merged_from: vec![a.id, b.id],
                },
                confidence: (a.confidence + b.confidence) / 2.0,
                created_at: Utc::now(),
                connections: Vec::new(),
            });

            // Merged concepts participate in search via the member mean
            let mut centroid: Vec<f32> = a
                .embedding
                .iter()
                .zip(b.embedding.iter())
                .map(|(x, y)| (x + y) / 2.0)
                .collect();
            l2_normalize(&mut centroid);
            out.embeddings.push((merged_id, centroid));

            for member in [a.id, b.id] {
                out.edges.push(Connection {
                    from: merged_id,
                    to: member,
                    relation: Relation::RelatesTo,
                    strength: 0.95,
                    reason: "merge_member".to_string(),
                });
            }
        }

        out
    }
}

/// Attach non-category concepts to category concepts whose first word they
/// contain, via is_a edges
pub struct HierarchyRule;

impl FusionRule for HierarchyRule {
    fn id(&self) -> &'static str {
        "hierarchy"
    }

    fn applies(&self, batch: &RuleBatch<'_>) -> bool {
        batch
            .concepts
            .iter()
            .any(|c| c.kind == ConceptKind::Category)
            && batch
                .concepts
                .iter()
                .any(|c| c.kind != ConceptKind::Category)
    }

    fn apply(&self, batch: &RuleBatch<'_>) -> RuleOutput {
        let mut out = RuleOutput::default();

        for category in batch
            .concepts
            .iter()
            .filter(|c| c.kind == ConceptKind::Category)
        {
            let Some(first_word) = category.text.split_whitespace().next() else {
                continue;
            };
            let first_word = first_word.to_lowercase();

            for child in batch
                .concepts
                .iter()
                .filter(|c| c.kind != ConceptKind::Category)
            {
                if child.text.to_lowercase().contains(&first_word) {
                    out.edges.push(Connection {
                        from: child.id,
                        to: category.id,
                        relation: Relation::IsA,
                        strength: HIERARCHY_EDGE_STRENGTH,
                        reason: "topic_hierarchy".to_string(),
                    });
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str, kind: ConceptKind, embedding: Vec<f32>) -> ConceptDraft {
        ConceptDraft {
            id: NodeId::generate(),
            text: text.to_string(),
            kind,
            confidence: 0.8,
            embedding,
        }
    }

    #[test]
    fn test_merge_rule_ignores_weak_pairs() {
        let concepts = vec![
            draft("alpha", ConceptKind::Statement, vec![1.0, 0.0]),
            draft("beta", ConceptKind::Statement, vec![0.0, 1.0]),
        ];
        let connections = vec![Connection {
            from: concepts[0].id,
            to: concepts[1].id,
            relation: Relation::SemanticSimilarity,
            strength: 0.85,
            reason: "batch_similarity".to_string(),
        }];
        let batch = RuleBatch {
            concepts: &concepts,
            connections: &connections,
        };
        assert!(!MergeSimilarRule.applies(&batch));
    }

    #[test]
    fn test_merge_rule_emits_merged_concept() {
        let concepts = vec![
            draft("travel plans", ConceptKind::Statement, vec![1.0, 0.0]),
            draft("travel plan", ConceptKind::Statement, vec![0.99, 0.1]),
        ];
        let connections = vec![Connection {
            from: concepts[0].id,
            to: concepts[1].id,
            relation: Relation::SemanticSimilarity,
            strength: 0.97,
            reason: "batch_similarity".to_string(),
        }];
        let batch = RuleBatch {
            concepts: &concepts,
            connections: &connections,
        };

        assert!(MergeSimilarRule.applies(&batch));
        let out = MergeSimilarRule.apply(&batch);
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.embeddings.len(), 1);
        // Edges back to each original
        assert_eq!(out.edges.len(), 2);
        match &out.nodes[0].kind {
            NodeKind::MergedConcept { merged_from, .. } => {
                assert_eq!(merged_from, &vec![concepts[0].id, concepts[1].id]);
            }
            other => panic!("expected merged concept, got {other:?}"),
        }
    }

    #[test]
    fn test_hierarchy_rule_links_by_first_word() {
        let concepts = vec![
            draft("travel", ConceptKind::Category, vec![1.0, 0.0]),
            draft("travel to Paris", ConceptKind::Statement, vec![0.5, 0.5]),
            draft("dinner recipes", ConceptKind::Statement, vec![0.0, 1.0]),
        ];
        let batch = RuleBatch {
            concepts: &concepts,
            connections: &[],
        };

        assert!(HierarchyRule.applies(&batch));
        let out = HierarchyRule.apply(&batch);
        assert_eq!(out.edges.len(), 1);
        assert_eq!(out.edges[0].from, concepts[1].id);
        assert_eq!(out.edges[0].to, concepts[0].id);
        assert_eq!(out.edges[0].relation, Relation::IsA);
        assert!((out.edges[0].strength - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_hierarchy_rule_needs_both_sides() {
        let concepts = vec![draft("travel", ConceptKind::Category, vec![1.0])];
        let batch = RuleBatch {
            concepts: &concepts,
            connections: &[],
        };
        assert!(!HierarchyRule.applies(&batch));
    }
}
