//! Session data model: chats, messages, roles and settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Prompt seeded into every new chat
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly voice assistant. \
Keep replies short and conversational because they will be read aloud.";

/// Title used until a chat has a user message
pub const DEFAULT_CHAT_TITLE: &str = "New chat";

/// Titles longer than this many characters are cut and suffixed with [`TITLE_ELLIPSIS`]
pub const TITLE_MAX_CHARS: usize = 40;
pub const TITLE_ELLIPSIS: &str = "…";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthesized speech for one message.
///
/// Lives only in memory for the current run; there is no serde impl so it
/// cannot leak into the persisted session.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioClip {
    bytes: Arc<[u8]>,
}

impl AudioClip {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioClip({} bytes)", self.bytes.len())
    }
}

/// Role and content only, as sent to the completion provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A message in a chat
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Only ever set on assistant messages
    pub audio: Option<AudioClip>,
    /// Voice the audio was (or should be) rendered with
    pub voice: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            audio: None,
            voice: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, voice: Option<String>) -> Self {
        Self {
            voice,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn with_audio(mut self, audio: Option<AudioClip>) -> Self {
        self.audio = audio;
        self
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.clone())
    }
}

/// One conversation thread
#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub(crate) messages: Vec<Message>,
}

impl Chat {
    /// A fresh chat holding only the default system prompt
    pub fn new() -> Self {
        Self::from_parts(
            uuid::Uuid::new_v4().to_string(),
            Utc::now(),
            vec![Message::system(DEFAULT_SYSTEM_PROMPT)],
        )
    }

    /// Build a chat from existing messages, deriving its title
    pub(crate) fn from_parts(
        id: String,
        created_at: DateTime<Utc>,
        messages: Vec<Message>,
    ) -> Self {
        let title = derive_title(&messages);
        Self {
            id,
            title,
            created_at,
            messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn position(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub(crate) fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Conversation history without ids, timestamps or audio
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::to_chat_message).collect()
    }

    pub(crate) fn refresh_title(&mut self) {
        self.title = derive_title(&self.messages);
    }

    pub fn summary(&self, active: bool) -> ChatSummary {
        ChatSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            message_count: self.messages.len(),
            active,
        }
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing entry for a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
    pub active: bool,
}

/// Title from the first user message, or the default title
pub fn derive_title(messages: &[Message]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| truncate_title(&m.content))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_string())
}

fn truncate_title(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let mut title: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
    title.truncate(title.trim_end().len());
    title.push_str(TITLE_ELLIPSIS);
    title
}

/// Scalar session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub temperature: f32,
    /// `None` picks the first model the provider reports
    #[serde(default)]
    pub model: Option<String>,
    /// `None` uses the speech service's default voice
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub auto_play: bool,
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0 and 1, got {}",
                self.temperature
            ));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err("model must not be blank".to_string());
        }
        if self.voice.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err("voice must not be blank".to_string());
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            model: None,
            voice: None,
            auto_play: false,
        }
    }
}

/// All state owned by one local session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub(crate) chats: Vec<Chat>,
    pub(crate) active_chat_id: String,
    pub(crate) settings: Settings,
}

impl Session {
    /// A session with a single empty chat, selected
    pub fn new(settings: Settings) -> Self {
        let chat = Chat::new();
        Self {
            active_chat_id: chat.id.clone(),
            chats: vec![chat],
            settings,
        }
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub(crate) fn chat_mut(&mut self, chat_id: &str) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| c.id == chat_id)
    }

    pub fn active_chat_id(&self) -> &str {
        &self.active_chat_id
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.chat(&self.active_chat_id)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn summaries(&self) -> Vec<ChatSummary> {
        self.chats
            .iter()
            .map(|c| c.summary(c.id == self.active_chat_id))
            .collect()
    }
}
