//! # eva-memory
//!
//! Semantic memory for a conversational assistant: a conversation context
//! manager that tracks sessions, topics, entities and mood, and a knowledge
//! fusion engine that distills free text into an embedded concept graph.
//!
//! ## Architecture
//!
//! - **Session side**: [`session::SessionManager`] keeps per-session message
//!   windows with automatic compression, continuation tokens, and global
//!   topic/entity aggregates.
//! - **Knowledge side**: [`fusion::FusionEngine`] extracts concepts from
//!   knowledge items, embeds them, links them by similarity and runs
//!   pluggable fusion rules before committing to the
//!   [`graph::KnowledgeGraph`].
//! - **Learning**: [`learning::LearningLoop`] periodically mines recent
//!   concepts for recurring patterns and clusters.
//! - **Persistence**: [`storage::MemoryStore`] writes both sides as plain
//!   JSON snapshots.
//!
//! [`system::SemanticMemory`] assembles all of the above behind one handle:
//!
//! ```no_run
//! use eva_memory::{MemoryConfig, NewMessage, SemanticMemory};
//!
//! # async fn demo() -> eva_memory::Result<()> {
//! let memory = SemanticMemory::open(MemoryConfig::default()).await?;
//! let session = memory.start_session();
//! memory.add_message(session, NewMessage::user("Hello EVA"))?;
//! memory.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod embeddings;
pub mod errors;
pub mod extraction;
pub mod fusion;
pub mod graph;
pub mod learning;
pub mod session;
pub mod similarity;
pub mod storage;
pub mod system;
pub mod tracing_setup;
pub mod validation;

pub use config::MemoryConfig;
pub use embeddings::{Embedder, HashEmbedder};
pub use errors::{MemoryError, Result};
pub use extraction::{ExtractedFeatures, FeatureExtractor, Intent, Sentiment, Topic};
pub use fusion::{
    FusionEngine, FusionMetrics, FusionOutcome, KnowledgeItem, SearchHit, SearchOptions,
};
pub use graph::{ConceptKind, KnowledgeGraph, KnowledgeNode, NodeId, NodeKind, Relation};
pub use learning::{CycleReport, LearningLoop};
pub use session::{
    Complexity, ConversationView, Message, NewMessage, Role, SessionId, SessionManager,
};
pub use storage::MemoryStore;
pub use system::{GraphStats, SemanticMemory};
pub use tracing_setup::init_tracing;

// Re-export foundational crates so downstream callers share our versions.
pub use chrono;
pub use parking_lot;
pub use uuid;
