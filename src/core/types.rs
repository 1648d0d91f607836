//! Chat Domain Types
//!
//! Information Hiding:
//! - Id and timestamp generation centralized here
//! - Title derivation rule owned by Conversation construction
//! - Serialized field names fixed to the storage format (camelCase)

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum number of characters of the first user message used for a title.
const TITLE_MAX_CHARS: usize = 30;

/// Placeholder title for a conversation created before any message exists.
pub const NEW_CONVERSATION_TITLE: &str = "שיחה חדשה";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single chat message. Immutable once created; ordering within a
/// conversation is insertion order and is replayed verbatim to the
/// completion endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: next_id(),
            role,
            content: content.into(),
            timestamp: now_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// An ordered thread of messages with its own identity, title and
/// timestamps. Owned exclusively by the conversation store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Conversation {
    /// An empty conversation with the placeholder title.
    pub fn empty() -> Self {
        let now = now_millis();
        Self {
            id: next_id(),
            title: NEW_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A conversation started by a first user message. The title is a
    /// one-time snapshot of that message and is never recomputed.
    pub fn started_with(first: Message) -> Self {
        let now = now_millis();
        Self {
            id: next_id(),
            title: derive_title(&first.content),
            messages: vec![first],
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and refresh `updated_at`.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = now_millis();
    }
}

/// A named, reusable system-prompt configuration, independent of any
/// particular conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantProfile {
    pub id: String,
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub created_at: i64,
}

/// Reserved id of the built-in profile. It always exists, cannot be
/// deleted, and is the fallback selection.
pub const DEFAULT_ASSISTANT_ID: &str = "default";

impl AssistantProfile {
    pub fn default_profile() -> Self {
        Self {
            id: DEFAULT_ASSISTANT_ID.to_string(),
            name: "עוזר כללי".to_string(),
            instructions: "עוזר כללי שעונה בעברית".to_string(),
            model: "gpt-4".to_string(),
            created_at: now_millis(),
        }
    }
}

/// First 30 characters of the first user message, with an ellipsis marker
/// when truncated. Counted in characters, not bytes: titles are routinely
/// Hebrew.
pub fn derive_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_MAX_CHARS).collect();
    if content.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

static ID_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque, time-derived unique id. The counter suffix keeps ids created in
/// the same millisecond distinct.
pub fn next_id() -> String {
    let seq = ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", now_millis(), seq)
}
