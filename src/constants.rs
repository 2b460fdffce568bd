//! Documented constants for the memory core
//!
//! All tunable parameters in one place with justification for their values.
//! Centralizing constants prevents magic numbers and makes tuning easier.

// =============================================================================
// CONTEXT WINDOW & SESSIONS
// =============================================================================

/// Number of most-recent messages kept uncompressed for prompt construction
///
/// Compression triggers when a session holds more than twice this many
/// messages, folding the overflow into the running summary. 10 messages is
/// roughly five user/assistant turns - enough for local coherence without
/// bloating prompts.
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

/// Maximum live sessions before LRU eviction (keyed on last activity)
///
/// 50 concurrent conversation threads is far beyond what a single assistant
/// instance sees in practice; the bound exists to keep restore-from-disk and
/// the global aggregate maps small.
pub const DEFAULT_MAX_SESSIONS: usize = 50;

/// A continuation token checkpoint is written every N messages
///
/// Tokens capture the last few topics, mood, and a short summary so
/// conversational continuity survives window compression.
pub const CONTINUATION_TOKEN_INTERVAL: u64 = 5;

/// Topics captured per continuation token
pub const CONTINUATION_TOPIC_COUNT: usize = 3;

/// Maximum key points retained per session
pub const KEY_POINT_LIMIT: usize = 10;

/// Key points are truncated to this many characters
pub const KEY_POINT_PREVIEW_CHARS: usize = 120;

// =============================================================================
// EMBEDDINGS & SEARCH
// =============================================================================

/// Fixed embedding dimensionality for the deterministic vectorizer
///
/// 100 dimensions gives enough spread for character-fold hashing to separate
/// unrelated texts while staying cheap to store and compare. A real model
/// substituted behind the Embedder trait brings its own dimension.
pub const DEFAULT_EMBEDDING_DIM: usize = 100;

/// Minimum cosine similarity for a search hit
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Maximum results returned by semantic search
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Relevance = similarity-weight x similarity + confidence-weight x confidence
///
/// 70/30 favors semantic closeness but lets a confident exact concept beat a
/// marginally closer low-confidence one.
pub const RELEVANCE_SIMILARITY_WEIGHT: f32 = 0.7;
pub const RELEVANCE_CONFIDENCE_WEIGHT: f32 = 0.3;

/// Deadline for a single embedding call
///
/// The built-in vectorizer is microseconds; the deadline exists for external
/// model implementations behind the Embedder trait.
pub const EMBED_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// FUSION
// =============================================================================

/// Confidence assigned to pattern-matched entities
pub const ENTITY_CONFIDENCE: f32 = 0.8;

/// Confidence assigned to the whole-item statement concept
pub const STATEMENT_CONFIDENCE: f32 = 0.9;

/// Confidence assigned to topic (category) concepts
pub const CATEGORY_CONFIDENCE: f32 = 0.7;

/// Minimum similarity for a semantic_similarity edge inside a fusion batch
pub const CONCEPT_LINK_THRESHOLD: f32 = 0.7;

/// Minimum similarity for a relates_to edge to an existing graph node
pub const GRAPH_LINK_THRESHOLD: f32 = 0.7;

/// Existing-graph neighbors linked per new concept
///
/// Caps edge fan-out so a generic concept does not attach to half the graph.
pub const GRAPH_LINK_LIMIT: usize = 3;

/// Similarity above which the merge rule folds two concepts into one
pub const MERGE_SIMILARITY_THRESHOLD: f32 = 0.9;

/// Strength of is_a edges emitted by the hierarchy rule
pub const HIERARCHY_EDGE_STRENGTH: f32 = 0.8;

// =============================================================================
// CONTINUOUS LEARNING
// =============================================================================

/// Seconds between learning cycles (default 5 minutes)
pub const DEFAULT_LEARNING_INTERVAL_SECS: u64 = 300;

/// Learning cycles consider nodes created within this lookback window
pub const DEFAULT_LEARNING_LOOKBACK_SECS: i64 = 3_600;

/// A token must recur this often among recent concepts to become a pattern
///
/// 3 occurrences within the lookback hour filters one-off mentions while
/// still catching themes early.
pub const PATTERN_MIN_FREQUENCY: usize = 3;

/// Pattern mining ignores tokens shorter than this (articles, pronouns)
pub const PATTERN_MIN_TOKEN_LEN: usize = 4;

/// Confidence assigned to discovered-pattern nodes
///
/// Below entity/statement confidence: a frequency signal is weaker evidence
/// than a direct extraction.
pub const PATTERN_CONFIDENCE: f32 = 0.6;

/// Minimum pairwise similarity for concepts grouped into a cluster
pub const CLUSTER_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Minimum members for a concept cluster
pub const CLUSTER_MIN_SIZE: usize = 3;

// =============================================================================
// COMPLEXITY SCORING
// Coarse tier from accumulated message-length variance, topic/entity richness
// and multimodal flags. Score thresholds picked so a short plain-text session
// stays Low and a long multi-topic multimodal one lands High.
// =============================================================================

pub const COMPLEXITY_MEDIUM_SCORE: u32 = 3;
pub const COMPLEXITY_HIGH_SCORE: u32 = 5;

/// Message-length standard deviation (chars) that counts as uneven pacing
pub const COMPLEXITY_LENGTH_STDDEV: f64 = 20.0;

/// Mean message length (chars) that counts as verbose
pub const COMPLEXITY_MEAN_LENGTH: f64 = 120.0;

// =============================================================================
// VALIDATION & PERSISTENCE
// =============================================================================

/// Maximum content length accepted for a message or knowledge item (64 KB)
pub const MAX_CONTENT_LENGTH: usize = 65_536;

/// Deadline for a persistence load/save call
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 10;

/// Seconds between periodic flushes from the learning loop (0 = disabled)
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 600;
