//! Type definitions for sessions and conversation context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

use crate::extraction::{Entity, EntityKind, Intent, Sentiment, Topic};

/// Unique identifier for sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message as submitted by the chat layer, before enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    /// Multimodal flags: kinds of attached media ("image", "audio", ...)
    #[serde(default)]
    pub attachment_kinds: Vec<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment_kinds: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachment_kinds: Vec::new(),
        }
    }
}

/// Extraction results attached to a message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageAnalysis {
    pub entities: Vec<Entity>,
    pub topics: Vec<Topic>,
    pub sentiment: Sentiment,
    /// Only present for user-authored messages
    pub intent: Option<Intent>,
}

/// A context-enriched message; immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub attachment_kinds: Vec<String>,
    pub analysis: MessageAnalysis,
    /// Strictly increasing within the session, survives compression
    pub context_index: u64,
    pub created_at: DateTime<Utc>,
}

/// Coarse session complexity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Entity aggregate within one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntity {
    pub text: String,
    pub kind: EntityKind,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Entity aggregate across all sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalEntity {
    pub text: String,
    pub kind: EntityKind,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Which sessions mentioned this entity
    pub sessions: HashSet<SessionId>,
}

/// Topic aggregate across all sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicStats {
    pub count: u64,
    pub first_mention: DateTime<Utc>,
    pub last_mention: DateTime<Utc>,
}

/// Mutable per-session context record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    /// Topics seen, in first-seen order
    pub topics: Vec<Topic>,
    /// Entity frequency map keyed by lowercased entity text
    pub entities: HashMap<String, SessionEntity>,
    /// Running conversation mood
    pub mood: Sentiment,
    pub complexity: Complexity,
    /// Whether any message carried attachments
    pub multimodal: bool,
}

/// Periodic checkpoint for conversational continuity after compression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub created_at: DateTime<Utc>,
    pub context_index: u64,
    /// The most recent topics at checkpoint time (up to 3)
    pub topics: Vec<Topic>,
    pub mood: Sentiment,
    pub summary: String,
}

/// Welford running statistics over message lengths, kept across compression
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LengthStats {
    pub count: u64,
    pub mean: f64,
    m2: f64,
}

impl LengthStats {
    pub fn record(&mut self, length: usize) {
        self.count += 1;
        let value = length as f64;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// A bounded, time-ordered conversation thread with its own context state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Uncompressed tail of the conversation; bounded by 2 x window
    pub messages: Vec<Message>,
    pub context: SessionContext,
    /// Running summary chain built by compression
    pub summary: String,
    pub key_points: Vec<String>,
    /// Last known user intent
    pub user_intent: Option<Intent>,
    pub continuation_tokens: Vec<ContinuationToken>,
    /// Next context index to assign; never reset by compression
    pub next_context_index: u64,
    /// Counters preserved across compression
    pub total_messages: u64,
    pub user_messages: u64,
    #[serde(default)]
    pub length_stats: LengthStats,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            started_at: now,
            last_activity: now,
            messages: Vec::new(),
            context: SessionContext::default(),
            summary: String::new(),
            key_points: Vec::new(),
            user_intent: None,
            continuation_tokens: Vec::new(),
            next_context_index: 0,
            total_messages: 0,
            user_messages: 0,
            length_stats: LengthStats::default(),
        }
    }
}

/// Cross-session aggregate state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalContext {
    pub topics: HashMap<Topic, TopicStats>,
    /// Keyed by lowercased entity text
    pub entities: HashMap<String, GlobalEntity>,
    pub total_messages: u64,
    pub total_sessions: u64,
}

/// One message as handed to the prompt builder
#[derive(Debug, Clone, Serialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<MessageAnalysis>,
}

/// Everything the chat layer needs to build an LLM prompt
///
/// This type is assembled here but consumed externally; the memory core
/// never calls the LLM itself.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub session_id: SessionId,
    pub messages: Vec<ContextMessage>,
    pub context: SessionContext,
    /// Globally most frequent topics, descending
    pub global_topics: Vec<Topic>,
    pub summary: String,
    pub key_points: Vec<String>,
    pub user_intent: Option<Intent>,
    /// Latest continuation token, if any
    pub continuation: Option<ContinuationToken>,
}

/// Persisted conversation state: versionless JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub global_context: GlobalContext,
    pub recent_sessions: Vec<Session>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_stats_welford() {
        let mut stats = LengthStats::default();
        for len in [10usize, 20, 30] {
            stats.record(len);
        }
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 20.0).abs() < 1e-9);
        // Population variance of {10,20,30} is 66.67
        assert!((stats.variance() - 200.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_session_id_serializes_transparent() {
        let id = SessionId::generate();
        let json = serde_json::to_string(&id).unwrap();
        // Plain UUID string, not a struct
        assert!(json.starts_with('"'));
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
