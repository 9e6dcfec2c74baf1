//! Session model and the conversation store that owns it

mod store;
mod types;

#[cfg(test)]
mod proptests;

pub use store::{ConversationStore, StoreError, StoreResult};
pub use types::{
    AudioClip, Chat, ChatMessage, ChatSummary, Message, Role, Session, Settings,
    DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
};
