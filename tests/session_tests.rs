//! Session manager integration tests: windowing, compression, continuation
//! tokens, and eviction.

use eva_memory::session::SessionManager;
use eva_memory::{Intent, MemoryConfig, NewMessage, Sentiment};

fn manager(window: usize, max_sessions: usize) -> SessionManager {
    let config = MemoryConfig {
        context_window: window,
        max_sessions,
        ..MemoryConfig::default()
    };
    SessionManager::new(&config)
}

#[test]
fn test_greeting_is_analyzed_and_indexed_from_zero() {
    let manager = manager(10, 50);
    let session = manager.start_session();

    let message = manager
        .add_message(session, NewMessage::user("Hello EVA"))
        .unwrap();

    assert_eq!(message.context_index, 0);
    assert_eq!(message.analysis.intent, Some(Intent::Greeting));
    assert_eq!(message.analysis.sentiment, Sentiment::Neutral);
    assert!(message.analysis.topics.is_empty());

    let view = manager.conversation_context(session, 10, true).unwrap();
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.user_intent, Some(Intent::Greeting));
}

#[test]
fn test_long_conversation_compresses_into_summary() {
    let manager = manager(10, 50);
    let session = manager.start_session();

    for i in 0..25 {
        let content = format!("I keep asking about my python code, question {i}");
        let msg = if i % 2 == 0 {
            NewMessage::user(content)
        } else {
            NewMessage::assistant(content)
        };
        manager.add_message(session, msg).unwrap();
    }

    let state = manager.session(session).unwrap();
    // The uncompressed tail is bounded by the window after compression fires
    assert!(state.messages.len() <= 20);
    assert_eq!(state.total_messages, 25);
    assert!(!state.summary.is_empty());
    assert!(state.summary.contains("messages"));

    // Indices keep counting through compression
    let last = state.messages.last().unwrap();
    assert_eq!(last.context_index, 24);
}

#[test]
fn test_window_bound_holds_after_every_message() {
    let manager = manager(4, 50);
    let session = manager.start_session();

    for i in 0..30 {
        manager
            .add_message(session, NewMessage::user(format!("note {i}")))
            .unwrap();
        let state = manager.session(session).unwrap();
        assert!(
            state.messages.len() <= 8,
            "window bound violated at message {i}: {} messages",
            state.messages.len()
        );
    }
}

#[test]
fn test_continuation_tokens_appear_every_fifth_message() {
    let manager = manager(10, 50);
    let session = manager.start_session();

    for i in 0..12 {
        manager
            .add_message(session, NewMessage::user(format!("checkpoint test {i}")))
            .unwrap();
    }

    let state = manager.session(session).unwrap();
    assert_eq!(state.continuation_tokens.len(), 2);

    let view = manager.conversation_context(session, 10, false).unwrap();
    let token = view.continuation.unwrap();
    assert!(token.context_index <= 11);
    assert!(!token.summary.is_empty());
}

#[test]
fn test_lru_eviction_keeps_most_recent_sessions() {
    let manager = manager(10, 3);

    let mut ids = Vec::new();
    for i in 0..5 {
        let session = manager.start_session();
        manager
            .add_message(session, NewMessage::user(format!("session {i}")))
            .unwrap();
        ids.push(session);
        // last_activity ordering needs distinct timestamps
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    assert_eq!(manager.session_count(), 3);
    assert!(manager.session(ids[0]).is_none());
    assert!(manager.session(ids[1]).is_none());
    assert!(manager.session(ids[4]).is_some());
}

#[test]
fn test_session_bound_holds_when_only_starting_sessions() {
    let manager = manager(10, 3);

    for _ in 0..10 {
        let session = manager.start_session();
        // The freshly started session is never the eviction victim
        assert!(manager.session(session).is_some());
        assert!(
            manager.session_count() <= 3,
            "session count {} exceeds bound",
            manager.session_count()
        );
    }
    assert_eq!(manager.session_count(), 3);
}

#[test]
fn test_session_bound_holds_when_switching_to_unknown_sessions() {
    let manager = manager(10, 3);

    for _ in 0..10 {
        let id = eva_memory::SessionId::generate();
        let active = manager.switch_session(id);
        assert_eq!(active, id);
        assert!(manager.session(id).is_some());
        assert!(manager.session_count() <= 3);
    }
    assert_eq!(manager.session_count(), 3);
}

#[test]
fn test_unknown_session_is_created_on_demand() {
    let manager = manager(10, 50);
    let session = manager.start_session();
    drop(session);

    let phantom = eva_memory::SessionId::generate();
    let message = manager
        .add_message(phantom, NewMessage::user("resuming after restart"))
        .unwrap();
    assert_eq!(message.context_index, 0);
    assert!(manager.session(phantom).is_some());
}

#[test]
fn test_context_view_respects_requested_window() {
    let manager = manager(10, 50);
    let session = manager.start_session();

    for i in 0..8 {
        manager
            .add_message(session, NewMessage::user(format!("line {i}")))
            .unwrap();
    }

    let view = manager.conversation_context(session, 3, false).unwrap();
    assert_eq!(view.messages.len(), 3);
    assert_eq!(view.messages.last().unwrap().content, "line 7");
    // Analysis omitted when not requested
    assert!(view.messages.iter().all(|m| m.analysis.is_none()));
}

#[test]
fn test_snapshot_restore_round_trip() {
    let original = manager(10, 50);
    let session = original.start_session();
    original
        .add_message(session, NewMessage::user("Alice Smith works at Google"))
        .unwrap();

    let snapshot = original.snapshot();
    assert_eq!(snapshot.recent_sessions.len(), 1);
    assert_eq!(snapshot.global_context.total_messages, 1);

    let restored = manager(10, 50);
    restored.restore(snapshot);
    assert_eq!(restored.session_count(), 1);
    let state = restored.session(session).unwrap();
    assert_eq!(state.total_messages, 1);
    assert!(state.context.entities.keys().any(|k| k.contains("alice")));
}
