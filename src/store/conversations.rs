//! Conversation Store
//!
//! Owns the conversation list and the active selection, mediates every
//! message send, and persists the full list after every mutation so a
//! crash never loses more than the in-flight network call.
//!
//! Overlapping sends are serialized by a store-level gate. A send always
//! targets the active conversation, so the gate is equivalent to a
//! per-conversation queue without the bookkeeping.

use crate::config::SettingsStore;
use crate::core::completion::{CompletionClient, CompletionRequest};
use crate::core::types::{Conversation, Message};
use crate::error::ChatError;
use crate::storage::{KeyValueStorage, CONVERSATIONS_KEY};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

struct ListState {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl ListState {
    fn find_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn active_mut(&mut self) -> Option<&mut Conversation> {
        let id = self.active_id.clone()?;
        // An active id that no longer resolves is treated as none
        self.find_mut(&id)
    }
}

/// Clears the advisory in-flight flag on every exit path.
struct LoadingGuard(Arc<AtomicBool>);

impl LoadingGuard {
    fn engage(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag.clone())
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ConversationStore {
    state: RwLock<ListState>,
    loading: Arc<AtomicBool>,
    send_gate: Mutex<()>,
    storage: Arc<dyn KeyValueStorage>,
    completion: Arc<dyn CompletionClient>,
    settings: Arc<SettingsStore>,
}

impl ConversationStore {
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        completion: Arc<dyn CompletionClient>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            state: RwLock::new(ListState {
                conversations: Vec::new(),
                active_id: None,
            }),
            loading: Arc::new(AtomicBool::new(false)),
            send_gate: Mutex::new(()),
            storage,
            completion,
            settings,
        }
    }

    /// Startup only: read the persisted list. Absent or unreadable data
    /// leaves the list empty.
    pub async fn load(&self) -> Result<()> {
        let saved = match self.storage.get(CONVERSATIONS_KEY).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!("[ConversationStore] Failed to read conversations: {}", e);
                return Ok(());
            }
        };

        if let Some(saved) = saved {
            match serde_json::from_str::<Vec<Conversation>>(&saved) {
                Ok(conversations) => {
                    tracing::debug!(
                        "[ConversationStore] Loaded {} conversations",
                        conversations.len()
                    );
                    self.state.write().await.conversations = conversations;
                }
                Err(e) => {
                    tracing::warn!(
                        "[ConversationStore] Ignoring unparseable conversation list: {}",
                        e
                    );
                }
            }
        }
        Ok(())
    }

    /// Insert a fresh empty conversation at the front, make it active and
    /// persist. Always succeeds; returns the new id.
    pub async fn create_new(&self) -> String {
        let conversation = Conversation::empty();
        let id = conversation.id.clone();

        {
            let mut state = self.state.write().await;
            state.conversations.insert(0, conversation);
            state.active_id = Some(id.clone());
        }
        self.persist_list().await.ok();

        tracing::debug!("[ConversationStore] Created conversation '{}'", id);
        id
    }

    /// Make `id` the active conversation. An unknown id is an error and
    /// leaves the current selection untouched.
    pub async fn select(&self, id: &str) -> Result<(), ChatError> {
        let mut state = self.state.write().await;
        if state.conversations.iter().any(|c| c.id == id) {
            state.active_id = Some(id.to_string());
            Ok(())
        } else {
            tracing::warn!("[ConversationStore] Conversation not found: {}", id);
            Err(ChatError::ConversationNotFound(id.to_string()))
        }
    }

    /// Send a user message in the active conversation (creating one if
    /// none is active) and append the assistant's reply.
    ///
    /// The trimmed user message is appended and persisted before any
    /// network call, so the user turn is durable even when the completion
    /// fails. On failure the error propagates to the caller and the user
    /// message stays in the thread.
    ///
    /// Returns the assistant message on success. `Ok(None)` covers two
    /// quiet outcomes: whitespace-only content (nothing sent), and a
    /// conversation deleted while the completion call was in flight
    /// (the reply is dropped).
    pub async fn send_message(&self, content: &str) -> Result<Option<Message>, ChatError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            // Deliberate UX guard, not an error
            return Ok(None);
        }

        let _gate = self.send_gate.lock().await;
        let _loading = LoadingGuard::engage(&self.loading);

        let user_message = Message::user(trimmed);
        let (conversation_id, history) = {
            let mut state = self.state.write().await;
            match state.active_mut() {
                Some(conversation) => {
                    // A conversation created empty gets its title from the
                    // first user message; after that it is never recomputed.
                    if conversation.messages.is_empty() {
                        conversation.title = crate::core::types::derive_title(&user_message.content);
                    }
                    conversation.push(user_message);
                    (conversation.id.clone(), conversation.messages.clone())
                }
                None => {
                    let conversation = Conversation::started_with(user_message);
                    let id = conversation.id.clone();
                    let history = conversation.messages.clone();
                    state.conversations.insert(0, conversation);
                    state.active_id = Some(id.clone());
                    (id, history)
                }
            }
        };
        // User turn is durable before the completion call
        self.persist_list().await.ok();

        let settings = self.settings.snapshot().await;
        let request = CompletionRequest::from_history(&settings, &history);

        let reply = self
            .completion
            .complete(request)
            .await
            .map_err(ChatError::Completion)?;

        let assistant_message = Message::assistant(reply);
        {
            let mut state = self.state.write().await;
            match state.find_mut(&conversation_id) {
                Some(conversation) => conversation.push(assistant_message.clone()),
                None => {
                    // Deleted while the call was in flight; drop the reply
                    tracing::warn!(
                        "[ConversationStore] Conversation '{}' vanished mid-send",
                        conversation_id
                    );
                    return Ok(None);
                }
            }
        }
        self.persist_list().await.ok();

        Ok(Some(assistant_message))
    }

    /// Remove a conversation. Clears the active selection if it pointed at
    /// the removed entry. Deleting an unknown id is not an error; an empty
    /// id is.
    pub async fn delete(&self, id: &str) -> Result<(), ChatError> {
        if id.is_empty() {
            tracing::warn!("[ConversationStore] Delete called without an id");
            return Err(ChatError::EmptyId);
        }

        {
            let mut state = self.state.write().await;
            state.conversations.retain(|c| c.id != id);
            if state.active_id.as_deref() == Some(id) {
                state.active_id = None;
            }
        }

        // Unlike create/send, a failed delete write surfaces to the caller
        self.persist_list().await.map_err(ChatError::Storage)?;
        tracing::debug!("[ConversationStore] Deleted conversation '{}'", id);
        Ok(())
    }

    /// All conversations, most recently created first.
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.read().await.conversations.clone()
    }

    /// The resolved active conversation, if any.
    pub async fn current_conversation(&self) -> Option<Conversation> {
        let state = self.state.read().await;
        let id = state.active_id.as_deref()?;
        state.conversations.iter().find(|c| c.id == id).cloned()
    }

    /// Advisory flag: a send is awaiting a remote reply.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    async fn persist_list(&self) -> Result<()> {
        let json = {
            let state = self.state.read().await;
            serde_json::to_string(&state.conversations)?
        };

        if let Err(e) = self.storage.set(CONVERSATIONS_KEY, &json).await {
            tracing::error!("[ConversationStore] Failed to persist conversations: {}", e);
            return Err(e);
        }
        Ok(())
    }
}
