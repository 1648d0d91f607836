//! Assistant Profile Store
//!
//! Named system-prompt presets, independent of any conversation. The
//! reserved default profile always exists and is the fallback whenever the
//! selected profile goes away.

use crate::core::types::{next_id, now_millis, AssistantProfile, DEFAULT_ASSISTANT_ID};
use crate::error::ChatError;
use crate::storage::{KeyValueStorage, ASSISTANTS_KEY, CURRENT_ASSISTANT_KEY};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Caller-supplied fields of a new profile; id and timestamp are assigned
/// by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssistant {
    pub name: String,
    pub instructions: String,
    pub model: String,
}

struct ProfileState {
    profiles: Vec<AssistantProfile>,
    active_id: String,
}

impl ProfileState {
    fn find(&self, id: &str) -> Option<&AssistantProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }
}

pub struct AssistantStore {
    state: RwLock<ProfileState>,
    storage: Arc<dyn KeyValueStorage>,
}

impl AssistantStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            state: RwLock::new(ProfileState {
                profiles: vec![AssistantProfile::default_profile()],
                active_id: DEFAULT_ASSISTANT_ID.to_string(),
            }),
            storage,
        }
    }

    /// Startup only: read the persisted profile list and selection. The
    /// default profile is re-seeded if a persisted list lost it, and a
    /// selection that no longer resolves falls back to the default.
    pub async fn load(&self) -> Result<()> {
        let mut state = self.state.write().await;

        match self.storage.get(ASSISTANTS_KEY).await {
            Ok(Some(saved)) => match serde_json::from_str::<Vec<AssistantProfile>>(&saved) {
                Ok(profiles) => {
                    state.profiles = profiles;
                    if state.find(DEFAULT_ASSISTANT_ID).is_none() {
                        state.profiles.insert(0, AssistantProfile::default_profile());
                    }
                }
                Err(e) => {
                    tracing::warn!("[AssistantStore] Ignoring unparseable profile list: {}", e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("[AssistantStore] Failed to read profiles: {}", e);
            }
        }

        match self.storage.get(CURRENT_ASSISTANT_KEY).await {
            Ok(Some(saved)) => match serde_json::from_str::<AssistantProfile>(&saved) {
                Ok(selected) if state.find(&selected.id).is_some() => {
                    state.active_id = selected.id;
                }
                Ok(selected) => {
                    tracing::debug!(
                        "[AssistantStore] Selected profile '{}' no longer exists, using default",
                        selected.id
                    );
                    state.active_id = DEFAULT_ASSISTANT_ID.to_string();
                }
                Err(e) => {
                    tracing::warn!("[AssistantStore] Ignoring unparseable selection: {}", e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("[AssistantStore] Failed to read selection: {}", e);
            }
        }

        tracing::debug!(
            "[AssistantStore] Loaded {} profiles, active '{}'",
            state.profiles.len(),
            state.active_id
        );
        Ok(())
    }

    /// Assign a fresh id and creation timestamp, append and persist.
    pub async fn create(&self, new: NewAssistant) -> Result<AssistantProfile, ChatError> {
        let profile = AssistantProfile {
            id: next_id(),
            name: new.name,
            instructions: new.instructions,
            model: new.model,
            created_at: now_millis(),
        };

        {
            let mut state = self.state.write().await;
            state.profiles.push(profile.clone());
        }
        self.persist_profiles().await?;

        tracing::debug!("[AssistantStore] Created profile '{}'", profile.id);
        Ok(profile)
    }

    /// Remove a profile. The reserved default is silently kept; removing
    /// the active profile resets the selection to the default and persists
    /// that selection separately.
    pub async fn delete(&self, id: &str) -> Result<(), ChatError> {
        if id == DEFAULT_ASSISTANT_ID {
            // The built-in profile cannot be deleted
            return Ok(());
        }

        let was_active = {
            let mut state = self.state.write().await;
            state.profiles.retain(|p| p.id != id);
            if state.active_id == id {
                state.active_id = DEFAULT_ASSISTANT_ID.to_string();
                true
            } else {
                false
            }
        };

        self.persist_profiles().await?;
        if was_active {
            self.persist_selection().await?;
        }

        tracing::debug!("[AssistantStore] Deleted profile '{}'", id);
        Ok(())
    }

    /// Select a profile by id and persist the selection. An unknown id is
    /// an error and leaves the current selection untouched, matching the
    /// conversation store's policy.
    pub async fn select(&self, id: &str) -> Result<(), ChatError> {
        {
            let mut state = self.state.write().await;
            if state.find(id).is_none() {
                tracing::warn!("[AssistantStore] Profile not found: {}", id);
                return Err(ChatError::AssistantNotFound(id.to_string()));
            }
            state.active_id = id.to_string();
        }
        self.persist_selection().await
    }

    /// The resolved active profile; falls back to the default when the
    /// selection fails to resolve.
    pub async fn current(&self) -> AssistantProfile {
        let state = self.state.read().await;
        state
            .find(&state.active_id)
            .or_else(|| state.find(DEFAULT_ASSISTANT_ID))
            .cloned()
            .unwrap_or_else(AssistantProfile::default_profile)
    }

    pub async fn assistants(&self) -> Vec<AssistantProfile> {
        self.state.read().await.profiles.clone()
    }

    async fn persist_profiles(&self) -> Result<(), ChatError> {
        let json = {
            let state = self.state.read().await;
            serde_json::to_string(&state.profiles)
                .map_err(|e| ChatError::Storage(anyhow::Error::from(e)))?
        };

        self.storage.set(ASSISTANTS_KEY, &json).await.map_err(|e| {
            tracing::error!("[AssistantStore] Failed to persist profiles: {}", e);
            ChatError::Storage(e)
        })
    }

    async fn persist_selection(&self) -> Result<(), ChatError> {
        let json = {
            let current = self.current().await;
            serde_json::to_string(&current).map_err(|e| ChatError::Storage(anyhow::Error::from(e)))?
        };

        self.storage
            .set(CURRENT_ASSISTANT_KEY, &json)
            .await
            .map_err(|e| {
                tracing::error!("[AssistantStore] Failed to persist selection: {}", e);
                ChatError::Storage(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStorage;

    fn new_assistant(name: &str) -> NewAssistant {
        NewAssistant {
            name: name.to_string(),
            instructions: "עוזר לבדיקות".to_string(),
            model: "gpt-4o".to_string(),
        }
    }

    #[tokio::test]
    async fn test_default_profile_always_present() {
        let store = AssistantStore::new(Arc::new(InMemoryStorage::new()));
        store.load().await.unwrap();

        let profiles = store.assistants().await;
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, DEFAULT_ASSISTANT_ID);
        assert_eq!(store.current().await.id, DEFAULT_ASSISTANT_ID);
    }

    #[tokio::test]
    async fn test_delete_default_is_a_no_op() {
        let store = AssistantStore::new(Arc::new(InMemoryStorage::new()));
        store.create(new_assistant("מתרגם")).await.unwrap();

        store.delete(DEFAULT_ASSISTANT_ID).await.unwrap();
        assert_eq!(store.assistants().await.len(), 2);
        assert_eq!(store.current().await.id, DEFAULT_ASSISTANT_ID);
    }

    #[tokio::test]
    async fn test_delete_active_falls_back_to_default() {
        let storage = Arc::new(InMemoryStorage::new());
        let store = AssistantStore::new(storage.clone());

        let profile = store.create(new_assistant("מתרגם")).await.unwrap();
        store.select(&profile.id).await.unwrap();
        assert_eq!(store.current().await.id, profile.id);

        store.delete(&profile.id).await.unwrap();
        assert_eq!(store.current().await.id, DEFAULT_ASSISTANT_ID);

        // The fallback selection was persisted separately
        let saved = storage.get(CURRENT_ASSISTANT_KEY).await.unwrap().unwrap();
        let selected: AssistantProfile = serde_json::from_str(&saved).unwrap();
        assert_eq!(selected.id, DEFAULT_ASSISTANT_ID);
    }

    #[tokio::test]
    async fn test_select_unknown_id_keeps_selection() {
        let store = AssistantStore::new(Arc::new(InMemoryStorage::new()));
        let err = store.select("missing").await.unwrap_err();
        assert!(matches!(err, ChatError::AssistantNotFound(_)));
        assert_eq!(store.current().await.id, DEFAULT_ASSISTANT_ID);
    }

    #[tokio::test]
    async fn test_profiles_survive_reload() {
        let storage = Arc::new(InMemoryStorage::new());

        let store = AssistantStore::new(storage.clone());
        let profile = store.create(new_assistant("כותב")).await.unwrap();
        store.select(&profile.id).await.unwrap();

        let reloaded = AssistantStore::new(storage);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.assistants().await.len(), 2);
        assert_eq!(reloaded.current().await.id, profile.id);
    }

    #[tokio::test]
    async fn test_load_reseeds_missing_default() {
        let storage = Arc::new(InMemoryStorage::new());
        // A persisted list that somehow lost the built-in profile
        let orphan = AssistantProfile {
            id: "123".to_string(),
            name: "בודד".to_string(),
            instructions: String::new(),
            model: "gpt-4".to_string(),
            created_at: now_millis(),
        };
        storage
            .set(ASSISTANTS_KEY, &serde_json::to_string(&vec![orphan]).unwrap())
            .await
            .unwrap();

        let store = AssistantStore::new(storage);
        store.load().await.unwrap();

        let profiles = store.assistants().await;
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].id, DEFAULT_ASSISTANT_ID);
    }
}
