//! Configuration for the memory core
//!
//! All configurable parameters in one place with environment variable
//! overrides. Follows the principle: sensible defaults, configurable in
//! production.

use std::env;
use std::path::PathBuf;
use tracing::info;

use crate::constants::{
    DEFAULT_CONTEXT_WINDOW, DEFAULT_EMBEDDING_DIM, DEFAULT_FLUSH_INTERVAL_SECS,
    DEFAULT_IO_TIMEOUT_SECS, DEFAULT_LEARNING_INTERVAL_SECS, DEFAULT_LEARNING_LOOKBACK_SECS,
    DEFAULT_MAX_SESSIONS, DEFAULT_SEARCH_LIMIT, DEFAULT_SIMILARITY_THRESHOLD,
};

/// Memory system configuration loaded from environment with defaults
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Storage directory for JSON snapshots (default: ./eva_memory_data)
    pub storage_path: PathBuf,

    /// Messages kept uncompressed per session (default: 10)
    pub context_window: usize,

    /// Live sessions before LRU eviction (default: 50)
    pub max_sessions: usize,

    /// Embedding vector dimensionality (default: 100)
    pub embedding_dim: usize,

    /// Minimum similarity for search hits (default: 0.5)
    pub similarity_threshold: f32,

    /// Maximum search results (default: 10)
    pub search_limit: usize,

    /// Seconds between continuous-learning cycles (default: 300)
    pub learning_interval_secs: u64,

    /// Learning cycles scan nodes created within this many seconds (default: 3600)
    pub learning_lookback_secs: i64,

    /// Deadline for persistence load/save in seconds (default: 10)
    pub io_timeout_secs: u64,

    /// Seconds between periodic snapshot flushes, 0 disables (default: 600)
    pub flush_interval_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./eva_memory_data"),
            context_window: DEFAULT_CONTEXT_WINDOW,
            max_sessions: DEFAULT_MAX_SESSIONS,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            search_limit: DEFAULT_SEARCH_LIMIT,
            learning_interval_secs: DEFAULT_LEARNING_INTERVAL_SECS,
            learning_lookback_secs: DEFAULT_LEARNING_LOOKBACK_SECS,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
        }
    }
}

impl MemoryConfig {
    /// Load configuration from environment variables with defaults
    #[allow(clippy::field_reassign_with_default)] // Environment overrides require mutable config
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("EVA_MEMORY_PATH") {
            config.storage_path = PathBuf::from(val);
        }

        if let Ok(val) = env::var("EVA_CONTEXT_WINDOW") {
            if let Ok(n) = val.parse::<usize>() {
                config.context_window = n.clamp(1, 500);
            }
        }

        if let Ok(val) = env::var("EVA_MAX_SESSIONS") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_sessions = n.max(1);
            }
        }

        if let Ok(val) = env::var("EVA_EMBEDDING_DIM") {
            if let Ok(n) = val.parse::<usize>() {
                config.embedding_dim = n.clamp(8, 4096);
            }
        }

        if let Ok(val) = env::var("EVA_SIMILARITY_THRESHOLD") {
            if let Ok(n) = val.parse::<f32>() {
                config.similarity_threshold = n.clamp(-1.0, 1.0);
            }
        }

        if let Ok(val) = env::var("EVA_SEARCH_LIMIT") {
            if let Ok(n) = val.parse::<usize>() {
                config.search_limit = n.max(1);
            }
        }

        if let Ok(val) = env::var("EVA_LEARNING_INTERVAL") {
            if let Ok(n) = val.parse::<u64>() {
                config.learning_interval_secs = n.max(1);
            }
        }

        if let Ok(val) = env::var("EVA_LEARNING_LOOKBACK") {
            if let Ok(n) = val.parse::<i64>() {
                config.learning_lookback_secs = n.max(60);
            }
        }

        if let Ok(val) = env::var("EVA_IO_TIMEOUT") {
            if let Ok(n) = val.parse::<u64>() {
                config.io_timeout_secs = n.max(1);
            }
        }

        if let Ok(val) = env::var("EVA_FLUSH_INTERVAL") {
            if let Ok(n) = val.parse::<u64>() {
                config.flush_interval_secs = n;
            }
        }

        config
    }

    /// Log the current configuration
    pub fn log(&self) {
        info!("Memory configuration:");
        info!("   Storage: {:?}", self.storage_path);
        info!(
            "   Context window: {} (compression above {})",
            self.context_window,
            self.context_window * 2
        );
        info!("   Max sessions: {}", self.max_sessions);
        info!("   Embedding dim: {}", self.embedding_dim);
        info!(
            "   Search: threshold {:.2}, limit {}",
            self.similarity_threshold, self.search_limit
        );
        info!(
            "   Learning: every {}s, lookback {}s",
            self.learning_interval_secs, self.learning_lookback_secs
        );
        if self.flush_interval_secs > 0 {
            info!("   Flush: every {}s", self.flush_interval_secs);
        } else {
            info!("   Flush: disabled (save on shutdown/switch only)");
        }
    }
}
