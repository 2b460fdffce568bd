//! Fusion engine integration tests through the `SemanticMemory` facade.

use eva_memory::{KnowledgeItem, MemoryConfig, NodeKind, SearchOptions, SemanticMemory};
use tempfile::TempDir;

fn config(dir: &TempDir) -> MemoryConfig {
    MemoryConfig {
        storage_path: dir.path().to_path_buf(),
        ..MemoryConfig::default()
    }
}

#[tokio::test]
async fn test_fusion_increments_metrics_once_per_item() {
    let dir = TempDir::new().unwrap();
    let memory = SemanticMemory::open(config(&dir)).await.unwrap();

    let before = memory.metrics();
    let outcome = memory
        .fuse_knowledge(KnowledgeItem::new("Paris is the capital of France"))
        .await
        .unwrap();
    let after = memory.metrics();

    assert!(!outcome.node_ids.is_empty());
    assert_eq!(after.fusion_events, before.fusion_events + 1);
    assert_eq!(
        after.nodes_created,
        before.nodes_created + outcome.node_ids.len() as u64
    );
}

#[tokio::test]
async fn test_search_finds_fused_statement() {
    let dir = TempDir::new().unwrap();
    let memory = SemanticMemory::open(config(&dir)).await.unwrap();

    memory
        .fuse_knowledge(KnowledgeItem::new("Paris is the capital of France"))
        .await
        .unwrap();
    memory
        .fuse_knowledge(KnowledgeItem::new("Rust has a strict borrow checker"))
        .await
        .unwrap();

    let hits = memory
        .semantic_search("Paris is the capital of France", None)
        .await
        .unwrap();
    assert!(!hits.is_empty());

    // The fused statement is an exact embedding match and outranks the
    // unrelated statement
    match &hits[0].node.kind {
        NodeKind::Concept { text, .. } => assert!(text.contains("France")),
        other => panic!("unexpected top hit kind: {other:?}"),
    }
    assert!(hits[0].similarity > 0.99);
    // Descending by relevance
    for pair in hits.windows(2) {
        assert!(pair[0].relevance >= pair[1].relevance);
    }
}

#[tokio::test]
async fn test_repeated_fusion_yields_distinct_ids_and_no_dangling_edges() {
    let dir = TempDir::new().unwrap();
    let memory = SemanticMemory::open(config(&dir)).await.unwrap();

    let first = memory
        .fuse_knowledge(KnowledgeItem::new("The sky is blue"))
        .await
        .unwrap();
    let second = memory
        .fuse_knowledge(KnowledgeItem::new("The sky is blue"))
        .await
        .unwrap();

    assert_ne!(first.fusion_id, second.fusion_id);
    for id in &first.node_ids {
        assert!(!second.node_ids.contains(id));
    }

    // Identical content still produces graph structure both times and the
    // commit never records a dropped edge for well-formed batches.
    let stats = memory.graph_stats();
    assert!(stats.nodes >= first.node_ids.len() + second.node_ids.len());
    assert_eq!(memory.metrics().edges_dropped, 0);
}

#[tokio::test]
async fn test_unreachable_threshold_returns_empty() {
    let dir = TempDir::new().unwrap();
    let memory = SemanticMemory::open(config(&dir)).await.unwrap();

    memory
        .fuse_knowledge(KnowledgeItem::new("Paris is the capital of France"))
        .await
        .unwrap();

    let hits = memory
        .semantic_search(
            "capital of France",
            Some(SearchOptions {
                threshold: 1.5,
                limit: 10,
            }),
        )
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_blank_item_rejected() {
    let dir = TempDir::new().unwrap();
    let memory = SemanticMemory::open(config(&dir)).await.unwrap();

    let err = memory
        .fuse_knowledge(KnowledgeItem::new("  \n "))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
    assert_eq!(memory.metrics().fusion_events, 0);
    assert_eq!(memory.graph_stats().nodes, 0);
}

#[tokio::test]
async fn test_source_is_carried_onto_concept_nodes() {
    let dir = TempDir::new().unwrap();
    let memory = SemanticMemory::open(config(&dir)).await.unwrap();

    memory
        .fuse_knowledge(KnowledgeItem::with_source(
            "Gravity bends light",
            "physics_feed",
        ))
        .await
        .unwrap();

    let hits = memory.semantic_search("Gravity bends light", None).await.unwrap();
    let sourced = hits.iter().any(|hit| {
        matches!(
            &hit.node.kind,
            NodeKind::Concept { source: Some(s), .. } if s == "physics_feed"
        )
    });
    assert!(sourced);
}
