//! API request and response types

use crate::runtime::{SaveEditOutcome, SpeakOutcome, TurnReport};
use crate::session::{Chat, ChatMessage, ChatSummary, Message, Role, DEFAULT_TEMPERATURE};
use crate::state_machine::EditState;
use crate::tts::VoiceInfo;
use crate::turn::{TurnOutcome, TurnStatus};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Stateless turn request
#[derive(Debug, Deserialize)]
pub struct ChatTurnRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Stateless turn response; `audio` is absent on partial failure
#[derive(Debug, Serialize)]
pub struct ChatTurnResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub model: String,
    pub voice: String,
    pub status: TurnStatus,
}

impl From<TurnOutcome> for ChatTurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            content: outcome.text,
            audio: outcome.audio.map(|clip| BASE64.encode(clip.as_bytes())),
            model: outcome.model,
            voice: outcome.voice,
            status: outcome.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TtsResponse {
    pub audio: String,
    pub voice: String,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<VoiceInfo>,
    pub default: String,
}

/// Request to submit a user message
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub draft: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    pub voice: String,
}

/// A message as shown to clients; audio is fetched separately
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    pub has_audio: bool,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            role: message.role,
            content: message.content.clone(),
            created_at: message.created_at,
            voice: message.voice.clone(),
            has_audio: message.has_audio(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<MessageView>,
    pub pending: bool,
}

impl ChatView {
    pub fn new(chat: &Chat, pending: bool) -> Self {
        Self {
            id: chat.id.clone(),
            title: chat.title.clone(),
            created_at: chat.created_at,
            messages: chat.messages().iter().map(MessageView::from).collect(),
            pending,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub selected: bool,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub chat_id: String,
    pub message: MessageView,
    pub status: TurnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_error: Option<String>,
}

impl From<TurnReport> for TurnResponse {
    fn from(report: TurnReport) -> Self {
        Self {
            message: MessageView::from(&report.message),
            chat_id: report.chat_id,
            status: report.status,
            speech_error: report.speech_error,
        }
    }
}

/// Redo and retry; `turn` is absent when there was nothing to do
#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub turn: Option<TurnResponse>,
}

#[derive(Debug, Serialize)]
pub struct SaveEditResponse {
    pub edit: EditState,
    pub turn: Option<TurnResponse>,
}

impl From<SaveEditOutcome> for SaveEditResponse {
    fn from(outcome: SaveEditOutcome) -> Self {
        Self {
            edit: outcome.edit,
            turn: outcome.turn.map(TurnResponse::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    pub stream_id: u64,
    pub voice: String,
}

impl From<SpeakOutcome> for SpeakResponse {
    fn from(outcome: SpeakOutcome) -> Self {
        Self {
            stream_id: outcome.stream_id,
            voice: outcome.voice,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
