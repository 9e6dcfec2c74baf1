//! User commands that drive the edit state machine

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartEdit {
        chat_id: String,
        message_id: String,
    },
    UpdateDraft {
        content: String,
    },
    CancelEdit,
    SaveEdit,
    /// Regenerate the last assistant reply
    Redo {
        chat_id: String,
    },
    /// Run a turn for a chat whose last message is an unanswered user message
    Retry {
        chat_id: String,
    },
    Branch {
        chat_id: String,
        message_id: String,
    },
}
