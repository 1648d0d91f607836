//! Key-Value Persistence Abstraction
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - Allows swapping between memory and filesystem without API changes
//! - Values are opaque strings to the backend; the stores own the JSON shape

use anyhow::Result;
use async_trait::async_trait;

pub mod filesystem;
pub mod memory;

/// Storage key for the serialized conversation list.
pub const CONVERSATIONS_KEY: &str = "conversations";
/// Storage key for the serialized settings record.
pub const SETTINGS_KEY: &str = "settings";
/// Storage key for the serialized assistant profile list.
pub const ASSISTANTS_KEY: &str = "assistants";
/// Storage key for the serialized selected assistant profile.
pub const CURRENT_ASSISTANT_KEY: &str = "currentAssistant";

/// Trait defining the asynchronous key-value persistence interface the
/// stores write through after every mutation.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read a value, `None` if the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
