//! Database schema and persisted record types

use crate::session::{Chat, Message, Role, Session, Settings, DEFAULT_SYSTEM_PROMPT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS session_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Key holding the serialized [`PersistedSession`]
pub const SESSION_KEY: &str = "session";
/// Key holding the serialized [`Settings`]
pub const SETTINGS_KEY: &str = "settings";

/// Durable form of a session. Audio is intentionally absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub chats: Vec<PersistedChat>,
    pub active_chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedChat {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<PersistedMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            chats: session.chats().iter().map(PersistedChat::from).collect(),
            active_chat_id: session.active_chat_id().to_string(),
        }
    }
}

impl From<&Chat> for PersistedChat {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id.clone(),
            title: chat.title.clone(),
            created_at: chat.created_at,
            messages: chat.messages().iter().map(PersistedMessage::from).collect(),
        }
    }
}

impl From<&Message> for PersistedMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            role: message.role,
            content: message.content.clone(),
            created_at: message.created_at,
            voice: message.voice.clone(),
        }
    }
}

impl PersistedSession {
    /// Rebuild the in-memory session, repairing records that break the
    /// chat invariants instead of refusing to start.
    pub fn into_session(self, settings: Settings) -> Session {
        let mut chats: Vec<Chat> = self
            .chats
            .into_iter()
            .map(PersistedChat::into_chat)
            .collect();

        if chats.is_empty() {
            tracing::warn!("Persisted session had no chats, starting a new one");
            chats.push(Chat::new());
        }

        let active_chat_id = if chats.iter().any(|c| c.id == self.active_chat_id) {
            self.active_chat_id
        } else {
            tracing::warn!(
                active = %self.active_chat_id,
                "Active chat missing, selecting first chat"
            );
            chats[0].id.clone()
        };

        Session {
            chats,
            active_chat_id,
            settings,
        }
    }
}

impl PersistedChat {
    fn into_chat(self) -> Chat {
        let mut messages: Vec<Message> = Vec::with_capacity(self.messages.len() + 1);
        for (index, record) in self.messages.into_iter().enumerate() {
            if record.role == Role::System && index > 0 {
                tracing::warn!(
                    chat_id = %self.id,
                    message_id = %record.id,
                    "Dropping stray system message"
                );
                continue;
            }
            messages.push(Message {
                id: record.id,
                role: record.role,
                content: record.content,
                created_at: record.created_at,
                audio: None,
                voice: record.voice,
            });
        }

        if messages.first().map(|m| m.role) != Some(Role::System) {
            tracing::warn!(chat_id = %self.id, "Chat missing system prompt, restoring default");
            messages.insert(0, Message::system(DEFAULT_SYSTEM_PROMPT));
        }

        let mut chat = Chat::from_parts(self.id, self.created_at, messages);
        if !self.title.is_empty() {
            chat.title = self.title;
        }
        chat
    }
}
