//! Store-boundary error type.
//!
//! Validation skips (empty message, reserved-default delete, deleting an
//! unknown id) never surface here; only unresolved selections and failed
//! remote collaborators do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("assistant not found: {0}")]
    AssistantNotFound(String),

    #[error("an id is required")]
    EmptyId,

    #[error("storage error: {0}")]
    Storage(anyhow::Error),

    #[error("completion failed: {0}")]
    Completion(anyhow::Error),
}
