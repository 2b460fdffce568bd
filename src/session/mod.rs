//! Session lifecycle and conversation context management
//!
//! Owns the sliding context window, incremental summarization, per-session
//! and global aggregate state, and LRU eviction. Operations on different
//! sessions may interleave freely; operations on the same session apply in
//! call order because every mutation happens synchronously under one write
//! lock (context index assignment and compression are order-dependent).

pub mod types;

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::MemoryConfig;
use crate::constants::{
    COMPLEXITY_HIGH_SCORE, COMPLEXITY_LENGTH_STDDEV, COMPLEXITY_MEAN_LENGTH,
    COMPLEXITY_MEDIUM_SCORE, CONTINUATION_TOKEN_INTERVAL, CONTINUATION_TOPIC_COUNT,
    KEY_POINT_LIMIT, KEY_POINT_PREVIEW_CHARS,
};
use crate::errors::Result;
use crate::extraction::{FeatureExtractor, Intent, Sentiment, Topic};
use crate::validation;

pub use types::{
    Complexity, ContextMessage, ContextSnapshot, ContinuationToken, ConversationView,
    GlobalContext, GlobalEntity, Message, MessageAnalysis, NewMessage, Role, Session,
    SessionContext, SessionEntity, SessionId, TopicStats,
};

struct ManagerState {
    sessions: HashMap<SessionId, Session>,
    global: GlobalContext,
    active: Option<SessionId>,
}

/// Session store and context manager
pub struct SessionManager {
    context_window: usize,
    max_sessions: usize,
    extractor: FeatureExtractor,
    state: RwLock<ManagerState>,
}

impl SessionManager {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            context_window: config.context_window.max(1),
            max_sessions: config.max_sessions.max(1),
            extractor: FeatureExtractor::new(),
            state: RwLock::new(ManagerState {
                sessions: HashMap::new(),
                global: GlobalContext::default(),
                active: None,
            }),
        }
    }

    /// Create a fresh session and make it active
    pub fn start_session(&self) -> SessionId {
        let id = SessionId::generate();
        let mut state = self.state.write();
        state.sessions.insert(id, Session::new(id));
        state.global.total_sessions += 1;
        state.active = Some(id);
        Self::evict_lru(&mut state, self.max_sessions, Some(id));
        info!(session = %id, "session started");
        id
    }

    /// Make the given session active, creating it if unknown
    ///
    /// Switching counts as activity, so the target session cannot be the
    /// eviction victim.
    pub fn switch_session(&self, id: SessionId) -> SessionId {
        let mut state = self.state.write();
        Self::ensure_session(&mut state, id);
        if let Some(session) = state.sessions.get_mut(&id) {
            session.last_activity = Utc::now();
        }
        state.active = Some(id);
        Self::evict_lru(&mut state, self.max_sessions, Some(id));
        id
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.state.read().active
    }

    pub fn session_count(&self) -> usize {
        self.state.read().sessions.len()
    }

    /// Clone of a session's current state, mostly for inspection and tests
    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.state.read().sessions.get(&id).cloned()
    }

    /// Ingest one message: analyze, enrich, fold into aggregates, compress
    /// if the window bound is crossed. Returns the enriched message.
    pub fn add_message(&self, session_id: SessionId, message: NewMessage) -> Result<Message> {
        validation::validate_message_content(&message.content)?;

        let analysis_features = self
            .extractor
            .extract(&message.content, message.role == Role::User);
        let now = Utc::now();

        let mut state = self.state.write();
        let ManagerState {
            sessions, global, ..
        } = &mut *state;
        let session = match sessions.entry(session_id) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                // SessionNotFound is handled here, not propagated
                debug!(session = %session_id, "unknown session, creating");
                global.total_sessions += 1;
                entry.insert(Session::new(session_id))
            }
        };

        let analysis = MessageAnalysis {
            entities: analysis_features.entities,
            topics: analysis_features.topics,
            sentiment: analysis_features.sentiment,
            intent: analysis_features.intent,
        };

        let enriched = Message {
            role: message.role,
            content: message.content,
            attachment_kinds: message.attachment_kinds,
            analysis: analysis.clone(),
            context_index: session.next_context_index,
            created_at: now,
        };
        session.next_context_index += 1;

        // Session-local aggregates
        for topic in &analysis.topics {
            if !session.context.topics.contains(topic) {
                session.context.topics.push(*topic);
            }
        }
        for entity in &analysis.entities {
            let key = entity.text.to_lowercase();
            session
                .context
                .entities
                .entry(key)
                .and_modify(|e| {
                    e.count += 1;
                    e.last_seen = now;
                })
                .or_insert_with(|| SessionEntity {
                    text: entity.text.clone(),
                    kind: entity.kind,
                    count: 1,
                    first_seen: now,
                    last_seen: now,
                });
        }
        session.context.mood = next_mood(session.context.mood, analysis.sentiment);
        if !enriched.attachment_kinds.is_empty() {
            session.context.multimodal = true;
        }
        session.length_stats.record(enriched.content.chars().count());
        session.total_messages += 1;
        if enriched.role == Role::User {
            session.user_messages += 1;
            if let Some(intent) = analysis.intent {
                session.user_intent = Some(intent);
            }
        }
        session.context.complexity = complexity_tier(session);

        // Global aggregates
        for topic in &analysis.topics {
            global
                .topics
                .entry(*topic)
                .and_modify(|t| {
                    t.count += 1;
                    t.last_mention = now;
                })
                .or_insert_with(|| TopicStats {
                    count: 1,
                    first_mention: now,
                    last_mention: now,
                });
        }
        for entity in &analysis.entities {
            let key = entity.text.to_lowercase();
            global
                .entities
                .entry(key)
                .and_modify(|e| {
                    e.count += 1;
                    e.last_seen = now;
                    e.sessions.insert(session_id);
                })
                .or_insert_with(|| GlobalEntity {
                    text: entity.text.clone(),
                    kind: entity.kind,
                    count: 1,
                    first_seen: now,
                    last_seen: now,
                    sessions: [session_id].into_iter().collect(),
                });
        }
        global.total_messages += 1;

        session.messages.push(enriched.clone());

        if session.total_messages % CONTINUATION_TOKEN_INTERVAL == 0 {
            let token = continuation_token(session, enriched.context_index);
            session.continuation_tokens.push(token);
        }

        // Synchronous compression keeps the window bound an invariant,
        // not an eventual property
        if session.messages.len() > self.context_window * 2 {
            compress_session(session, self.context_window);
        }

        session.last_activity = now;
        Self::evict_lru(&mut state, self.max_sessions, Some(session_id));
        Ok(enriched)
    }

    /// Assemble everything the prompt builder needs: recent messages as
    /// role/content pairs, combined session and global context, the running
    /// summary, and key points
    pub fn conversation_context(
        &self,
        session_id: SessionId,
        window: usize,
        include_analysis: bool,
    ) -> Result<ConversationView> {
        let mut state = self.state.write();
        Self::ensure_session(&mut state, session_id);
        Self::evict_lru(&mut state, self.max_sessions, Some(session_id));

        let session = &state.sessions[&session_id];
        let take = window.min(session.messages.len());
        let messages = session.messages[session.messages.len() - take..]
            .iter()
            .map(|m| ContextMessage {
                role: m.role,
                content: m.content.clone(),
                analysis: include_analysis.then(|| m.analysis.clone()),
            })
            .collect();

        let mut global_topics: Vec<(u64, Topic)> = state
            .global
            .topics
            .iter()
            .map(|(topic, stats)| (stats.count, *topic))
            .collect();
        global_topics.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(ConversationView {
            session_id,
            messages,
            context: session.context.clone(),
            global_topics: global_topics.into_iter().map(|(_, t)| t).collect(),
            summary: session.summary.clone(),
            key_points: session.key_points.clone(),
            user_intent: session.user_intent,
            continuation: session.continuation_tokens.last().cloned(),
        })
    }

    /// Export persisted conversation state, sessions newest-first
    pub fn snapshot(&self) -> ContextSnapshot {
        let state = self.state.read();
        let mut sessions: Vec<Session> = state.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        ContextSnapshot {
            global_context: state.global.clone(),
            recent_sessions: sessions,
        }
    }

    /// Replace in-memory state with a loaded snapshot
    pub fn restore(&self, snapshot: ContextSnapshot) {
        let mut state = self.state.write();
        state.active = snapshot.recent_sessions.first().map(|s| s.id);
        state.sessions = snapshot
            .recent_sessions
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        state.global = snapshot.global_context;
        debug!(sessions = state.sessions.len(), "conversation state restored");
    }

    fn ensure_session(state: &mut ManagerState, id: SessionId) {
        if !state.sessions.contains_key(&id) {
            // SessionNotFound is handled here, not propagated
            debug!(session = %id, "unknown session, creating");
            state.sessions.insert(id, Session::new(id));
            state.global.total_sessions += 1;
        }
    }

    /// Drop oldest-activity sessions until within the configured bound.
    /// Runs under the caller's write lock on every session-creating path;
    /// `keep` is the session the caller is about to use and is never a victim.
    fn evict_lru(state: &mut ManagerState, max_sessions: usize, keep: Option<SessionId>) {
        while state.sessions.len() > max_sessions {
            let oldest = state
                .sessions
                .values()
                .filter(|s| Some(s.id) != keep)
                .min_by_key(|s| s.last_activity)
                .map(|s| s.id);
            let Some(id) = oldest else { break };
            state.sessions.remove(&id);
            if state.active == Some(id) {
                state.active = None;
            }
            info!(session = %id, "evicted LRU session");
        }
    }
}

/// Mood transition table: same-direction sentiment reinforces the current
/// mood, neutral input carries the current mood forward, and an opposite
/// swing is damped to neutral rather than flipping outright.
fn next_mood(current: Sentiment, incoming: Sentiment) -> Sentiment {
    match (current, incoming) {
        (Sentiment::Neutral, s) => s,
        (s, Sentiment::Neutral) => s,
        (Sentiment::Positive, Sentiment::Positive) => Sentiment::Positive,
        (Sentiment::Negative, Sentiment::Negative) => Sentiment::Negative,
        (Sentiment::Positive, Sentiment::Negative)
        | (Sentiment::Negative, Sentiment::Positive) => Sentiment::Neutral,
    }
}

/// Coarse complexity from accumulated length variance, topic and entity
/// richness, and multimodal flags
fn complexity_tier(session: &Session) -> Complexity {
    let mut score = 0u32;

    if session.length_stats.stddev() > COMPLEXITY_LENGTH_STDDEV {
        score += 1;
    }
    if session.length_stats.mean > COMPLEXITY_MEAN_LENGTH {
        score += 1;
    }
    score += match session.context.topics.len() {
        0 => 0,
        1..=2 => 1,
        _ => 2,
    };
    score += match session.context.entities.len() {
        0..=1 => 0,
        2..=4 => 1,
        _ => 2,
    };
    if session.context.multimodal {
        score += 1;
    }

    if score >= COMPLEXITY_HIGH_SCORE {
        Complexity::High
    } else if score >= COMPLEXITY_MEDIUM_SCORE {
        Complexity::Medium
    } else {
        Complexity::Low
    }
}

fn continuation_token(session: &Session, context_index: u64) -> ContinuationToken {
    let topics: Vec<Topic> = session
        .context
        .topics
        .iter()
        .rev()
        .take(CONTINUATION_TOPIC_COUNT)
        .copied()
        .collect();

    let summary = session
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| truncate_chars(&m.content, KEY_POINT_PREVIEW_CHARS))
        .unwrap_or_default();

    ContinuationToken {
        created_at: Utc::now(),
        context_index,
        topics,
        mood: session.context.mood,
        summary,
    }
}

/// Fold the oldest messages beyond the window into the summary chain and
/// key points, then truncate to the most recent `window` entries
fn compress_session(session: &mut Session, window: usize) {
    let cut = session.messages.len() - window;
    let compressed: Vec<Message> = session.messages.drain(..cut).collect();

    let mut topics: Vec<Topic> = Vec::new();
    let mut user_count = 0usize;
    for message in &compressed {
        for topic in &message.analysis.topics {
            if !topics.contains(topic) {
                topics.push(*topic);
            }
        }
        if message.role == Role::User {
            user_count += 1;
        }

        // Messages carrying entities or an open question make key points
        let noteworthy = !message.analysis.entities.is_empty()
            || message.analysis.intent == Some(Intent::Question);
        if noteworthy {
            session
                .key_points
                .push(truncate_chars(&message.content, KEY_POINT_PREVIEW_CHARS));
        }
    }
    if session.key_points.len() > KEY_POINT_LIMIT {
        let overflow = session.key_points.len() - KEY_POINT_LIMIT;
        session.key_points.drain(..overflow);
    }

    let topic_list = if topics.is_empty() {
        "none".to_string()
    } else {
        topics
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let piece = format!(
        "[{} messages] topics: {}; mood: {}; {} from user",
        compressed.len(),
        topic_list,
        session.context.mood.as_str(),
        user_count
    );
    if session.summary.is_empty() {
        session.summary = piece;
    } else {
        session.summary.push_str(" | ");
        session.summary.push_str(&piece);
    }

    debug!(
        session = %session.id,
        compressed = compressed.len(),
        remaining = session.messages.len(),
        "context window compressed"
    );
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(&MemoryConfig::default())
    }

    #[test]
    fn test_mood_transitions() {
        assert_eq!(
            next_mood(Sentiment::Neutral, Sentiment::Positive),
            Sentiment::Positive
        );
        assert_eq!(
            next_mood(Sentiment::Positive, Sentiment::Neutral),
            Sentiment::Positive
        );
        // Opposite swing damps to neutral instead of flipping
        assert_eq!(
            next_mood(Sentiment::Positive, Sentiment::Negative),
            Sentiment::Neutral
        );
        assert_eq!(
            next_mood(Sentiment::Negative, Sentiment::Negative),
            Sentiment::Negative
        );
    }

    #[test]
    fn test_context_index_strictly_increasing() {
        let manager = manager();
        let id = manager.start_session();
        for expected in 0..4u64 {
            let msg = manager
                .add_message(id, NewMessage::user(format!("message {expected}")))
                .unwrap();
            assert_eq!(msg.context_index, expected);
        }
    }

    #[test]
    fn test_unknown_session_created_on_demand() {
        let manager = manager();
        let id = SessionId::generate();
        let msg = manager.add_message(id, NewMessage::user("hello there")).unwrap();
        assert_eq!(msg.context_index, 0);
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 4), "abcd...");
    }
}
