//! Settings Record and Store
//!
//! One settings record exists per process. Bootstrap layers an optional
//! config file and `SICHA__`-prefixed environment variables over the
//! compiled-in defaults; the persisted user record then shallow-merges on
//! top at load time, so fields added after a user's install keep their
//! defaults.

use crate::error::ChatError;
use crate::storage::{KeyValueStorage, SETTINGS_KEY};
use anyhow::Result;
use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The supported completion model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "o1-preview")]
    O1Preview,
    #[serde(rename = "o1-mini")]
    O1Mini,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-32k")]
    Gpt432k,
    #[serde(rename = "gpt-4-1106-preview")]
    Gpt41106Preview,
    #[serde(rename = "gpt-4-vision-preview")]
    Gpt4VisionPreview,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-3.5-turbo-16k")]
    Gpt35Turbo16k,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Gpt4o => "gpt-4o",
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::O1Preview => "o1-preview",
            Model::O1Mini => "o1-mini",
            Model::Gpt4 => "gpt-4",
            Model::Gpt432k => "gpt-4-32k",
            Model::Gpt41106Preview => "gpt-4-1106-preview",
            Model::Gpt4VisionPreview => "gpt-4-vision-preview",
            Model::Gpt35Turbo => "gpt-3.5-turbo",
            Model::Gpt35Turbo16k => "gpt-3.5-turbo-16k",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_SYSTEM_PROMPT: &str =
    "אתה עוזר מועיל שמדבר עברית רהוטה. אתה עונה בעברית בלבד, אלא אם כן מתבקש אחרת.";

fn default_dark_mode() -> bool {
    true
}
fn default_model() -> Model {
    Model::Gpt4o
}
fn default_voice_input() -> bool {
    false
}
fn default_voice_output() -> bool {
    false
}
fn default_push_notifications() -> bool {
    true
}
fn default_haptics() -> bool {
    true
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

/// User-tunable parameters that gate every completion request.
/// Serialized camelCase to stay compatible with the persisted format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_dark_mode")]
    pub dark_mode: bool,
    #[serde(default = "default_model")]
    pub model: Model,
    #[serde(default = "default_voice_input")]
    pub voice_input: bool,
    #[serde(default = "default_voice_output")]
    pub voice_output: bool,
    #[serde(default = "default_push_notifications")]
    pub push_notifications: bool,
    #[serde(default = "default_haptics")]
    pub haptics: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dark_mode: default_dark_mode(),
            model: default_model(),
            voice_input: default_voice_input(),
            voice_output: default_voice_output(),
            push_notifications: default_push_notifications(),
            haptics: default_haptics(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl Settings {
    /// Compiled-in defaults overlaid with an optional `config/{CONFIG_ENV}`
    /// file and `SICHA__`-prefixed environment variables.
    pub fn bootstrap() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("SICHA").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key() -> Result<String> {
        env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))
    }
}

/// A partial update: every field optional, merged over the current record
/// with shallow field overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub dark_mode: Option<bool>,
    pub model: Option<Model>,
    pub voice_input: Option<bool>,
    pub voice_output: Option<bool>,
    pub push_notifications: Option<bool>,
    pub haptics: Option<bool>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.dark_mode {
            settings.dark_mode = v;
        }
        if let Some(v) = self.model {
            settings.model = v;
        }
        if let Some(v) = self.voice_input {
            settings.voice_input = v;
        }
        if let Some(v) = self.voice_output {
            settings.voice_output = v;
        }
        if let Some(v) = self.push_notifications {
            settings.push_notifications = v;
        }
        if let Some(v) = self.haptics {
            settings.haptics = v;
        }
        if let Some(v) = self.temperature {
            settings.temperature = v;
        }
        if let Some(v) = self.max_tokens {
            settings.max_tokens = v;
        }
        if let Some(v) = self.system_prompt {
            settings.system_prompt = v;
        }
    }
}

/// Single-writer container for the process-wide settings record. Every
/// update persists the full merged record; readers always see a fully
/// merged state.
pub struct SettingsStore {
    current: RwLock<Settings>,
    storage: Arc<dyn KeyValueStorage>,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, defaults: Settings) -> Self {
        Self {
            current: RwLock::new(defaults),
            storage,
        }
    }

    /// Startup only: shallow-merge the persisted record over the current
    /// (default) one. Absent or unreadable records keep the defaults.
    pub async fn load(&self) -> Result<()> {
        let saved = match self.storage.get(SETTINGS_KEY).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!("[SettingsStore] Failed to read persisted settings: {}", e);
                return Ok(());
            }
        };

        let Some(saved) = saved else {
            tracing::debug!("[SettingsStore] No persisted settings, keeping defaults");
            return Ok(());
        };

        let parsed: serde_json::Value = match serde_json::from_str(&saved) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("[SettingsStore] Ignoring unparseable settings record: {}", e);
                return Ok(());
            }
        };

        let mut current = self.current.write().await;
        let mut merged = serde_json::to_value(&*current)?;
        if let (Some(base), Some(overlay)) = (merged.as_object_mut(), parsed.as_object()) {
            for (key, value) in overlay {
                base.insert(key.clone(), value.clone());
            }
        }

        match serde_json::from_value::<Settings>(merged) {
            Ok(settings) => {
                *current = settings;
                tracing::debug!("[SettingsStore] Loaded persisted settings");
            }
            Err(e) => {
                tracing::warn!("[SettingsStore] Ignoring invalid settings record: {}", e);
            }
        }
        Ok(())
    }

    /// Merge a partial update into the current record and persist the full
    /// result. The merged record becomes visible in one step; a failed
    /// write keeps the in-memory value and surfaces the failure.
    pub async fn update(&self, patch: SettingsPatch) -> Result<(), ChatError> {
        let merged = {
            let mut current = self.current.write().await;
            patch.apply(&mut current);
            current.clone()
        };

        let json = serde_json::to_string(&merged)
            .map_err(|e| ChatError::Storage(anyhow::Error::from(e)))?;

        self.storage
            .set(SETTINGS_KEY, &json)
            .await
            .map_err(|e| {
                tracing::error!("[SettingsStore] Failed to persist settings: {}", e);
                ChatError::Storage(e)
            })
    }

    /// Cloned snapshot of the current record.
    pub async fn snapshot(&self) -> Settings {
        self.current.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStorage;

    fn store() -> SettingsStore {
        SettingsStore::new(Arc::new(InMemoryStorage::new()), Settings::default())
    }

    #[tokio::test]
    async fn test_update_merges_single_field() {
        let store = store();
        let before = store.snapshot().await;

        store
            .update(SettingsPatch {
                temperature: Some(0.3),
                ..Default::default()
            })
            .await
            .unwrap();

        let after = store.snapshot().await;
        assert_eq!(after.temperature, 0.3);
        // Every other field byte-identical to its prior value
        assert_eq!(after.dark_mode, before.dark_mode);
        assert_eq!(after.model, before.model);
        assert_eq!(after.max_tokens, before.max_tokens);
        assert_eq!(after.system_prompt, before.system_prompt);
    }

    #[tokio::test]
    async fn test_update_round_trips_through_persistence() {
        let storage = Arc::new(InMemoryStorage::new());
        let store = SettingsStore::new(storage.clone(), Settings::default());

        store
            .update(SettingsPatch {
                temperature: Some(0.3),
                model: Some(Model::Gpt4oMini),
                ..Default::default()
            })
            .await
            .unwrap();

        // A fresh store loading from the same adapter yields the merged record
        let reloaded = SettingsStore::new(storage, Settings::default());
        reloaded.load().await.unwrap();
        let settings = reloaded.snapshot().await;
        assert_eq!(settings.temperature, 0.3);
        assert_eq!(settings.model, Model::Gpt4oMini);
        assert_eq!(settings.max_tokens, default_max_tokens());
    }

    #[tokio::test]
    async fn test_load_fills_missing_fields_from_defaults() {
        let storage = Arc::new(InMemoryStorage::new());
        // A record written by an older install that predates most fields
        storage
            .set(SETTINGS_KEY, r#"{"temperature":0.1,"darkMode":false}"#)
            .await
            .unwrap();

        let store = SettingsStore::new(storage, Settings::default());
        store.load().await.unwrap();

        let settings = store.snapshot().await;
        assert_eq!(settings.temperature, 0.1);
        assert!(!settings.dark_mode);
        assert_eq!(settings.model, Model::Gpt4o);
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_load_keeps_defaults_when_record_absent() {
        let store = store();
        store.load().await.unwrap();
        assert_eq!(store.snapshot().await, Settings::default());
    }

    #[tokio::test]
    async fn test_load_ignores_corrupt_record() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.set(SETTINGS_KEY, "not json").await.unwrap();

        let store = SettingsStore::new(storage, Settings::default());
        store.load().await.unwrap();
        assert_eq!(store.snapshot().await, Settings::default());
    }

    #[test]
    fn test_model_parse_known_and_unknown() {
        assert_eq!(Model::parse("gpt-4o"), Some(Model::Gpt4o));
        assert_eq!(Model::parse("gpt-3.5-turbo-16k"), Some(Model::Gpt35Turbo16k));
        assert_eq!(Model::parse("gpt-5"), None);
    }

    #[test]
    fn test_settings_serialize_camel_case() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("darkMode"));
        assert!(json.contains("maxTokens"));
        assert!(json.contains("systemPrompt"));
        assert!(json.contains("\"model\":\"gpt-4o\""));
    }
}
