//! Edit state

use serde::Serialize;

/// At most one message is being edited across the whole session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditState {
    #[default]
    Viewing,
    Editing {
        chat_id: String,
        message_id: String,
        draft: String,
    },
}

impl EditState {
    pub fn is_editing(&self) -> bool {
        matches!(self, EditState::Editing { .. })
    }

    /// Whether `message_id` in `chat_id` is the message under edit
    pub fn is_editing_message(&self, chat_id: &str, message_id: &str) -> bool {
        match self {
            EditState::Editing {
                chat_id: c,
                message_id: m,
                ..
            } => c == chat_id && m == message_id,
            EditState::Viewing => false,
        }
    }

    /// Chat holding the message under edit
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            EditState::Editing { chat_id, .. } => Some(chat_id),
            EditState::Viewing => None,
        }
    }
}
