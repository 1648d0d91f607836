//! Sicha - conversation-state core for a Hebrew-first LLM chat client
//!
//! This library owns the conversation list, the active selection, the
//! request lifecycle (send, optimistic update, remote call, apply
//! response, persist) and the settings that parameterize every request.
//! Persistence and the completion endpoint are injected collaborators, so
//! the stores are fully testable with mocks.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod store;
pub mod utils;

pub use self::config::{Model, Settings, SettingsPatch, SettingsStore};
pub use self::core::completion::{CompletionClient, CompletionRequest, OpenAiClient, Turn};
pub use self::core::types::{AssistantProfile, Conversation, Message, Role, DEFAULT_ASSISTANT_ID};
pub use error::ChatError;
pub use storage::KeyValueStorage;
pub use store::{AssistantStore, ConversationStore, NewAssistant};

use std::sync::Arc;

/// The three stores wired together over a shared persistence adapter.
/// An owned, injectable bundle rather than process-global state, so tests
/// can run isolated instances side by side.
pub struct ChatApp {
    pub settings: Arc<SettingsStore>,
    pub conversations: Arc<ConversationStore>,
    pub assistants: Arc<AssistantStore>,
}

impl ChatApp {
    /// Construct the stores and load their persisted state.
    ///
    /// # Example
    /// ```no_run
    /// use sicha::{ChatApp, OpenAiClient};
    /// use sicha::storage::memory::InMemoryStorage;
    /// use std::sync::Arc;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let storage = Arc::new(InMemoryStorage::new());
    ///     let client = Arc::new(OpenAiClient::from_env()?);
    ///     let app = ChatApp::init(storage, client).await?;
    ///
    ///     app.conversations.send_message("שלום").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn init(
        storage: Arc<dyn KeyValueStorage>,
        completion: Arc<dyn CompletionClient>,
    ) -> anyhow::Result<Self> {
        let defaults = Settings::bootstrap().unwrap_or_else(|e| {
            tracing::warn!("Config bootstrap failed, using compiled-in defaults: {}", e);
            Settings::default()
        });

        let settings = Arc::new(SettingsStore::new(storage.clone(), defaults));
        settings.load().await?;

        let conversations = Arc::new(ConversationStore::new(
            storage.clone(),
            completion,
            settings.clone(),
        ));
        conversations.load().await?;

        let assistants = Arc::new(AssistantStore::new(storage));
        assistants.load().await?;

        tracing::info!("Sicha stores initialized");
        Ok(Self {
            settings,
            conversations,
            assistants,
        })
    }
}
