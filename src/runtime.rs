//! Runtime: the chat controller and its I/O seams

mod controller;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use controller::{
    ChatController, ControllerError, ControllerErrorKind, ControllerOptions, SaveEditOutcome,
    SessionSnapshot, SpeakOutcome, TurnReport, FALLBACK_VOICE,
};
pub use traits::*;

use crate::llm::CompletionClient;
use crate::playback::AudioOutput;
use crate::tts::SpeechClient;
use crate::turn::TurnStatus;
use serde::Serialize;
use std::sync::Arc;

/// Type alias for the production controller with concrete implementations
pub type ProductionController = ChatController<
    DatabaseStorage,
    Arc<dyn CompletionClient>,
    Arc<dyn SpeechClient>,
    Arc<dyn AudioOutput>,
>;

/// Non-fatal, user-visible events broadcast to connected clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    SessionChanged,
    TurnStarted {
        chat_id: String,
    },
    TurnCompleted {
        chat_id: String,
        message_id: String,
        status: TurnStatus,
    },
    TurnFailed {
        chat_id: String,
        error: String,
    },
    SpeechFailed {
        chat_id: String,
        message_id: String,
        error: String,
    },
    PlaybackStarted {
        stream_id: u64,
        chat_id: String,
        message_id: String,
    },
    PlaybackFinished {
        stream_id: u64,
    },
    PlaybackFailed {
        stream_id: u64,
        error: String,
    },
}

impl Notice {
    pub fn event_type(&self) -> &'static str {
        match self {
            Notice::SessionChanged => "session_changed",
            Notice::TurnStarted { .. } => "turn_started",
            Notice::TurnCompleted { .. } => "turn_completed",
            Notice::TurnFailed { .. } => "turn_failed",
            Notice::SpeechFailed { .. } => "speech_failed",
            Notice::PlaybackStarted { .. } => "playback_started",
            Notice::PlaybackFinished { .. } => "playback_finished",
            Notice::PlaybackFailed { .. } => "playback_failed",
        }
    }
}
