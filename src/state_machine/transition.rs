//! Pure state transition function

use super::{EditState, Effect, Event};
use crate::session::{Chat, Role, Session};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: EditState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: EditState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Whether the effects include a turn request
    pub fn requests_turn(&self) -> bool {
        self.effects.iter().any(Effect::is_turn_request)
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("No message is being edited")]
    NotEditing,
    #[error("Message content must not be empty")]
    EmptyDraft,
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
    #[error("Message not found: {0}")]
    MessageNotFound(String),
}

fn require_chat<'a>(session: &'a Session, chat_id: &str) -> Result<&'a Chat, TransitionError> {
    session
        .chat(chat_id)
        .ok_or_else(|| TransitionError::ChatNotFound(chat_id.to_string()))
}

/// Pure transition function
///
/// Given the same inputs, always produces the same outputs with no I/O.
/// The session is only read; every mutation is expressed as an effect.
pub fn transition(
    state: &EditState,
    session: &Session,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Starting an edit replaces any other edit in progress
        (_, Event::StartEdit { chat_id, message_id }) => {
            let chat = require_chat(session, &chat_id)?;
            let message = chat
                .message(&message_id)
                .ok_or_else(|| TransitionError::MessageNotFound(message_id.clone()))?;
            match message.role {
                Role::System => Ok(TransitionResult::new(state.clone())),
                Role::User | Role::Assistant => Ok(TransitionResult::new(EditState::Editing {
                    draft: message.content.clone(),
                    chat_id,
                    message_id,
                })),
            }
        }

        (EditState::Viewing, Event::UpdateDraft { .. } | Event::SaveEdit) => {
            Err(TransitionError::NotEditing)
        }

        (
            EditState::Editing {
                chat_id,
                message_id,
                ..
            },
            Event::UpdateDraft { content },
        ) => Ok(TransitionResult::new(EditState::Editing {
            chat_id: chat_id.clone(),
            message_id: message_id.clone(),
            draft: content,
        })),

        (_, Event::CancelEdit) => Ok(TransitionResult::new(EditState::Viewing)),

        (
            EditState::Editing {
                chat_id,
                message_id,
                draft,
            },
            Event::SaveEdit,
        ) => save_edit(session, chat_id, message_id, draft),

        (_, Event::Redo { chat_id }) => {
            let chat = require_chat(session, &chat_id)?;
            let len = chat.len();
            let ends_with_reply = chat.last().is_some_and(|m| m.role == Role::Assistant);
            if len < 2 || !ends_with_reply {
                return Ok(TransitionResult::new(state.clone()));
            }

            let keep = len - 2;
            let new_state = match state.chat_id() {
                Some(editing) if editing == chat_id && editing_beyond(state, chat, keep) => {
                    EditState::Viewing
                }
                _ => state.clone(),
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::truncate_after(&chat_id, keep))
                .with_effect(Effect::request_turn(&chat_id)))
        }

        (_, Event::Retry { chat_id }) => {
            let chat = require_chat(session, &chat_id)?;
            let awaiting_reply = chat.last().is_some_and(|m| m.role == Role::User);
            let result = TransitionResult::new(state.clone());
            if awaiting_reply {
                Ok(result.with_effect(Effect::request_turn(&chat_id)))
            } else {
                Ok(result)
            }
        }

        (_, Event::Branch { chat_id, message_id }) => {
            let chat = require_chat(session, &chat_id)?;
            if chat.position(&message_id).is_none() {
                return Err(TransitionError::MessageNotFound(message_id));
            }
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::BranchChat { chat_id, message_id }))
        }
    }
}

/// Whether the message under edit sits after position `keep`
fn editing_beyond(state: &EditState, chat: &Chat, keep: usize) -> bool {
    match state {
        EditState::Editing { message_id, .. } => {
            chat.position(message_id).map_or(true, |pos| pos > keep)
        }
        EditState::Viewing => false,
    }
}

fn save_edit(
    session: &Session,
    chat_id: &str,
    message_id: &str,
    draft: &str,
) -> Result<TransitionResult, TransitionError> {
    let draft = draft.trim();
    if draft.is_empty() {
        return Err(TransitionError::EmptyDraft);
    }
    let chat = require_chat(session, chat_id)?;
    let index = chat
        .position(message_id)
        .ok_or_else(|| TransitionError::MessageNotFound(message_id.to_string()))?;
    let message = &chat.messages()[index];

    if message.content == draft {
        return Ok(TransitionResult::new(EditState::Viewing));
    }

    let edit = Effect::EditMessage {
        chat_id: chat_id.to_string(),
        message_id: message_id.to_string(),
        content: draft.to_string(),
    };
    match message.role {
        Role::System => Ok(TransitionResult::new(EditState::Viewing)),
        // Cached audio is cleared by the edit itself; no new turn
        Role::Assistant => Ok(TransitionResult::new(EditState::Viewing).with_effect(edit)),
        // The new prompt supersedes every later message
        Role::User => Ok(TransitionResult::new(EditState::Viewing)
            .with_effect(edit)
            .with_effect(Effect::truncate_after(chat_id, index))
            .with_effect(Effect::request_turn(chat_id))),
    }
}
