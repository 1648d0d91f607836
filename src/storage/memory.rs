//! In-Memory Key-Value Storage
//!
//! Information Hiding:
//! - HashMap storage structure hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Suitable for testing and ephemeral sessions

use super::KeyValueStorage;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage using HashMap
/// Data is lost when process terminates
pub struct InMemoryStorage {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            values: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStorage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().await;
        let value = values.get(key).cloned();
        tracing::debug!(
            "[InMemoryStorage] Read key '{}' ({})",
            key,
            if value.is_some() { "hit" } else { "miss" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value.to_string());
        tracing::debug!("[InMemoryStorage] Wrote {} bytes to key '{}'", value.len(), key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().await;
        values.remove(key);
        tracing::debug!("[InMemoryStorage] Removed key '{}'", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let storage = InMemoryStorage::new();
        storage.set("settings", r#"{"darkMode":true}"#).await.unwrap();

        let value = storage.get("settings").await.unwrap();
        assert_eq!(value, Some(r#"{"darkMode":true}"#.to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get("conversations").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let storage = InMemoryStorage::new();
        storage.set("k", "one").await.unwrap();
        storage.set("k", "two").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some("two".to_string()));
    }

    #[tokio::test]
    async fn test_remove() {
        let storage = InMemoryStorage::new();
        storage.set("k", "v").await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);

        // Removing an absent key is fine
        storage.remove("k").await.unwrap();
    }
}
