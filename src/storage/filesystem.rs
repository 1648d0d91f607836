//! File System Key-Value Storage
//!
//! Information Hiding:
//! - File layout hidden from users: one `{key}.json` file per key
//! - Directory creation and I/O details behind the storage trait
//! - Persistence mechanism independent of storage trait users

use super::KeyValueStorage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// File system storage - each key is a file at {base_path}/{key}.json
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub async fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .await
            .context("Failed to create storage directory")?;

        Ok(Self { base_path })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStorage for FileSystemStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);

        if !path.exists() {
            tracing::debug!("[FileSystemStorage] Key '{}' does not exist", key);
            return Ok(None);
        }

        let value = fs::read_to_string(&path)
            .await
            .context(format!("Failed to read storage file: {:?}", path))?;

        tracing::debug!(
            "[FileSystemStorage] Read {} bytes for key '{}' from {:?}",
            value.len(),
            key,
            path
        );
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);

        fs::write(&path, value)
            .await
            .context(format!("Failed to write storage file: {:?}", path))?;

        tracing::debug!(
            "[FileSystemStorage] Wrote {} bytes for key '{}' to {:?}",
            value.len(),
            key,
            path
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);

        if path.exists() {
            fs::remove_file(&path)
                .await
                .context(format!("Failed to delete storage file: {:?}", path))?;
            tracing::debug!("[FileSystemStorage] Removed key '{}' at {:?}", key, path);
        } else {
            tracing::debug!(
                "[FileSystemStorage] Key '{}' does not exist, nothing to remove",
                key
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        storage.set("conversations", "[]").await.unwrap();
        let value = storage.get("conversations").await.unwrap();
        assert_eq!(value, Some("[]".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(storage.get("settings").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_value_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let storage = FileSystemStorage::new(temp_dir.path().to_path_buf())
                .await
                .unwrap();
            storage.set("settings", r#"{"temperature":0.3}"#).await.unwrap();
        }

        let reopened = FileSystemStorage::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(
            reopened.get("settings").await.unwrap(),
            Some(r#"{"temperature":0.3}"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        storage.set("k", "v").await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
        storage.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_hebrew_content_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        let value = r#"[{"title":"שלום","messages":[]}]"#;
        storage.set("conversations", value).await.unwrap();
        assert_eq!(
            storage.get("conversations").await.unwrap(),
            Some(value.to_string())
        );
    }
}
