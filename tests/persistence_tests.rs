//! Persistence round trips through the `SemanticMemory` facade: what one
//! instance saves, a fresh instance loads.

use eva_memory::{KnowledgeItem, MemoryConfig, NewMessage, SemanticMemory};
use tempfile::TempDir;

fn config(dir: &TempDir) -> MemoryConfig {
    MemoryConfig {
        storage_path: dir.path().to_path_buf(),
        ..MemoryConfig::default()
    }
}

#[tokio::test]
async fn test_graph_survives_restart() {
    let dir = TempDir::new().unwrap();

    let stats_before = {
        let memory = SemanticMemory::open(config(&dir)).await.unwrap();
        memory
            .fuse_knowledge(KnowledgeItem::new("Paris is the capital of France"))
            .await
            .unwrap();
        memory
            .fuse_knowledge(KnowledgeItem::new("Berlin is the capital of Germany"))
            .await
            .unwrap();
        let stats = memory.graph_stats();
        memory.shutdown().await.unwrap();
        stats
    };

    let memory = SemanticMemory::open(config(&dir)).await.unwrap();
    let stats_after = memory.graph_stats();
    assert_eq!(stats_after.nodes, stats_before.nodes);
    assert_eq!(stats_after.edges, stats_before.edges);
    assert_eq!(stats_after.embeddings, stats_before.embeddings);

    // Loaded embeddings are searchable, not just counted
    let hits = memory
        .semantic_search("capital of Germany", None)
        .await
        .unwrap();
    assert!(!hits.is_empty());
}

#[tokio::test]
async fn test_conversation_context_survives_restart() {
    let dir = TempDir::new().unwrap();

    let session = {
        let memory = SemanticMemory::open(config(&dir)).await.unwrap();
        let session = memory.start_session();
        memory
            .add_message(session, NewMessage::user("Hello EVA"))
            .unwrap();
        memory
            .add_message(session, NewMessage::assistant("Hello! How can I help?"))
            .unwrap();
        memory.shutdown().await.unwrap();
        session
    };

    let memory = SemanticMemory::open(config(&dir)).await.unwrap();
    assert_eq!(memory.session_count(), 1);
    assert_eq!(memory.active_session(), Some(session));

    let restored = memory.session(session).unwrap();
    assert_eq!(restored.total_messages, 2);
    // Indices continue where the previous process stopped
    let next = memory
        .add_message(session, NewMessage::user("Still there?"))
        .unwrap();
    assert_eq!(next.context_index, 2);
}

#[tokio::test]
async fn test_snapshots_are_plain_json_files() {
    let dir = TempDir::new().unwrap();
    let memory = SemanticMemory::open(config(&dir)).await.unwrap();

    let session = memory.start_session();
    memory
        .add_message(session, NewMessage::user("write me down"))
        .unwrap();
    memory
        .fuse_knowledge(KnowledgeItem::new("snapshots are plain json"))
        .await
        .unwrap();
    memory.save().await.unwrap();

    let graph_raw = std::fs::read_to_string(dir.path().join("knowledge_graph.json")).unwrap();
    let graph: serde_json::Value = serde_json::from_str(&graph_raw).unwrap();
    assert!(graph["nodes"].is_array());
    assert!(graph["embeddings"].is_array());

    let context_raw =
        std::fs::read_to_string(dir.path().join("conversation_context.json")).unwrap();
    let context: serde_json::Value = serde_json::from_str(&context_raw).unwrap();
    assert!(context["globalContext"].is_object());
    assert_eq!(context["recentSessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_learning_cycle_discovers_recurring_pattern() {
    let dir = TempDir::new().unwrap();
    let memory = SemanticMemory::open(config(&dir)).await.unwrap();

    // The same token recurs across enough distinct concepts to clear the
    // frequency bar.
    memory
        .fuse_knowledge(KnowledgeItem::new("rust ownership model"))
        .await
        .unwrap();
    memory
        .fuse_knowledge(KnowledgeItem::new("rust async runtimes"))
        .await
        .unwrap();
    memory
        .fuse_knowledge(KnowledgeItem::new("rust error handling"))
        .await
        .unwrap();

    let report = memory.run_learning_cycle().await.unwrap();
    assert!(report.patterns >= 1);
    assert!(memory.metrics().patterns_discovered >= 1);

    // A second cycle over the same data must not duplicate the pattern
    let discovered = memory.metrics().patterns_discovered;
    memory.run_learning_cycle().await.unwrap();
    assert_eq!(memory.metrics().patterns_discovered, discovered);
}
