//! Structured error types for the memory core
//!
//! Every error carries a machine-readable code plus a human-readable message
//! so callers (the chat layer, test harnesses) can branch on category without
//! string matching. Recoverable failures are explicit: a dangling edge is
//! dropped and fusion continues, a failed load falls back to empty defaults,
//! a timeout leaves in-memory state untouched.

use std::fmt;
use uuid::Uuid;

/// Memory system error types with proper categorization
#[derive(Debug)]
pub enum MemoryError {
    /// Malformed knowledge item or message - rejected before any mutation
    InvalidInput { field: String, reason: String },

    /// An edge named a node that is not in the graph. Recoverable: the caller
    /// drops the edge, logs it, and continues with the rest of the batch.
    DanglingEdge { from: Uuid, to: Uuid },

    /// Persistence load/save failure
    Storage(String),

    /// Snapshot encode/decode failure
    Serialization(String),

    /// Embedding or persistence call exceeded its deadline.
    /// In-memory state is unchanged when this is returned.
    Timeout { operation: String, limit_ms: u64 },

    /// Internal only - callers auto-create the session instead of seeing this
    SessionNotFound(String),

    /// Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl MemoryError {
    /// Get error code for programmatic identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::DanglingEdge { .. } => "DANGLING_EDGE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the operation can be retried or skipped without losing state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DanglingEdge { .. } | Self::Storage(_) | Self::Timeout { .. }
        )
    }

    /// Get detailed error message
    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::DanglingEdge { from, to } => {
                format!("Edge references missing node: {from} -> {to}")
            }
            Self::Storage(msg) => format!("Storage error: {msg}"),
            Self::Serialization(msg) => format!("Serialization error: {msg}"),
            Self::Timeout { operation, limit_ms } => {
                format!("Operation '{operation}' exceeded {limit_ms}ms deadline")
            }
            Self::SessionNotFound(id) => format!("Session not found: {id}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MemoryError {}

impl From<anyhow::Error> for MemoryError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Type alias for Results using MemoryError
pub type Result<T> = std::result::Result<T, MemoryError>;
