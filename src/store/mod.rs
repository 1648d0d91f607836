//! State stores: single-writer containers with an explicit load lifecycle
//! at startup and persistence after every mutation.

mod assistants;
mod conversations;

pub use assistants::{AssistantStore, NewAssistant};
pub use conversations::ConversationStore;
