//! Effects produced by state transitions

/// Store mutations and turn requests, applied by the controller in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Replace a message's content (clears cached audio on assistant messages)
    EditMessage {
        chat_id: String,
        message_id: String,
        content: String,
    },

    /// Keep messages `0..=index`
    TruncateAfter { chat_id: String, index: usize },

    /// Run one turn against the chat's current history
    RequestTurn { chat_id: String },

    /// Copy the prefix ending at `message_id` into a new, active chat
    BranchChat { chat_id: String, message_id: String },
}

impl Effect {
    pub fn request_turn(chat_id: &str) -> Self {
        Effect::RequestTurn {
            chat_id: chat_id.to_string(),
        }
    }

    pub fn truncate_after(chat_id: &str, index: usize) -> Self {
        Effect::TruncateAfter {
            chat_id: chat_id.to_string(),
            index,
        }
    }

    pub fn is_turn_request(&self) -> bool {
        matches!(self, Effect::RequestTurn { .. })
    }
}
