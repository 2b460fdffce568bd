//! Input validation for messages and knowledge items
//!
//! Validation runs before any mutation: a rejected input leaves every map,
//! session, and graph exactly as it was.

use crate::constants::MAX_CONTENT_LENGTH;
use crate::errors::{MemoryError, Result};
use crate::fusion::KnowledgeItem;

fn validate_content(field: &str, content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(MemoryError::InvalidInput {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if content.len() > MAX_CONTENT_LENGTH {
        return Err(MemoryError::InvalidInput {
            field: field.to_string(),
            reason: format!(
                "length {} exceeds maximum {}",
                content.len(),
                MAX_CONTENT_LENGTH
            ),
        });
    }
    Ok(())
}

/// Validate a knowledge item before fusion
pub fn validate_knowledge_item(item: &KnowledgeItem) -> Result<()> {
    validate_content("content", &item.content)
}

/// Validate message content before it enters a session
pub fn validate_message_content(content: &str) -> Result<()> {
    validate_content("message.content", content)
}
