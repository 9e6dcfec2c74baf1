//! Conversation store
//!
//! Every mutation is applied to a copy of the session, persisted, and only
//! then swapped in. A failed write leaves both memory and disk at the
//! previous state.

use super::types::{AudioClip, Chat, ChatSummary, Message, Role, Session, Settings};
use crate::runtime::SessionStorage;
use chrono::Utc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
    #[error("Message not found: {0}")]
    MessageNotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Failed to persist session: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChatNotFound(_) | Self::MessageNotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an edit that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Changed,
    /// The new content equals the old content; nothing was written
    Unchanged,
}

/// Owner of the session and its persistence
pub struct ConversationStore<P: SessionStorage> {
    session: Session,
    storage: P,
}

impl<P: SessionStorage> ConversationStore<P> {
    /// Load the persisted session, or start (and persist) a fresh one.
    ///
    /// `defaults` only seed a fresh session; persisted settings always win.
    pub fn open(storage: P, defaults: Settings) -> StoreResult<Self> {
        match storage.load().map_err(StoreError::Persistence)? {
            Some(session) => {
                tracing::info!(chats = session.chats.len(), "Loaded session");
                Ok(Self { session, storage })
            }
            None => {
                let session = Session::new(defaults);
                storage.save(&session).map_err(StoreError::Persistence)?;
                tracing::info!("Created new session");
                Ok(Self { session, storage })
            }
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn chat(&self, chat_id: &str) -> StoreResult<&Chat> {
        self.session
            .chat(chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))
    }

    pub fn list_chats(&self) -> Vec<ChatSummary> {
        self.session.summaries()
    }

    /// Apply `f` to a copy of the session and commit it atomically
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Session) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut next = self.session.clone();
        let out = f(&mut next)?;
        if next != self.session {
            self.storage.save(&next).map_err(StoreError::Persistence)?;
            self.session = next;
        }
        Ok(out)
    }

    /// Create a chat without selecting it
    pub fn create_chat(&mut self) -> StoreResult<Chat> {
        self.transaction(|s| Ok(s.create_chat()))
    }

    pub fn append_message(&mut self, chat_id: &str, message: Message) -> StoreResult<()> {
        self.transaction(|s| s.append_message(chat_id, message))
    }

    pub fn edit_message(
        &mut self,
        chat_id: &str,
        message_id: &str,
        new_content: &str,
    ) -> StoreResult<EditOutcome> {
        self.transaction(|s| s.edit_message(chat_id, message_id, new_content))
    }

    pub fn truncate_after(&mut self, chat_id: &str, index: usize) -> StoreResult<()> {
        self.transaction(|s| s.truncate_after(chat_id, index))
    }

    pub fn branch_chat(&mut self, chat_id: &str, message_id: &str) -> StoreResult<Chat> {
        self.transaction(|s| s.branch_chat(chat_id, message_id))
    }

    /// Returns `false` (and changes nothing) for an unknown chat
    pub fn select_chat(&mut self, chat_id: &str) -> StoreResult<bool> {
        self.transaction(|s| Ok(s.select_chat(chat_id)))
    }

    pub fn set_audio(
        &mut self,
        chat_id: &str,
        message_id: &str,
        audio: Option<AudioClip>,
        voice: Option<String>,
    ) -> StoreResult<()> {
        self.transaction(|s| s.set_audio(chat_id, message_id, audio, voice))
    }

    pub fn update_settings(&mut self, settings: Settings) -> StoreResult<()> {
        settings.validate().map_err(StoreError::Validation)?;
        self.transaction(|s| {
            s.settings = settings;
            Ok(())
        })
    }
}

// In-memory mutations, only reachable through `ConversationStore::transaction`

impl Session {
    fn require_chat(&mut self, chat_id: &str) -> StoreResult<&mut Chat> {
        self.chat_mut(chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))
    }

    pub(crate) fn create_chat(&mut self) -> Chat {
        let chat = Chat::new();
        self.chats.push(chat.clone());
        chat
    }

    pub(crate) fn append_message(&mut self, chat_id: &str, message: Message) -> StoreResult<()> {
        let chat = self.require_chat(chat_id)?;
        match message.role {
            Role::System => {
                return Err(StoreError::Validation(
                    "system messages cannot be appended".to_string(),
                ))
            }
            Role::User if message.audio.is_some() => {
                return Err(StoreError::Validation(
                    "only assistant messages may carry audio".to_string(),
                ))
            }
            Role::User | Role::Assistant => {}
        }
        if chat.position(&message.id).is_some() {
            return Err(StoreError::Validation(format!(
                "duplicate message id {} in chat {chat_id}",
                message.id
            )));
        }
        chat.messages.push(message);
        chat.refresh_title();
        Ok(())
    }

    pub(crate) fn edit_message(
        &mut self,
        chat_id: &str,
        message_id: &str,
        new_content: &str,
    ) -> StoreResult<EditOutcome> {
        let new_content = new_content.trim();
        if new_content.is_empty() {
            return Err(StoreError::Validation(
                "message content must not be empty".to_string(),
            ));
        }
        let chat = self.require_chat(chat_id)?;
        let message = chat
            .message_mut(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;

        match message.role {
            Role::System => {
                return Err(StoreError::Validation(
                    "the system prompt cannot be edited".to_string(),
                ))
            }
            Role::User | Role::Assistant if message.content == new_content => {
                return Ok(EditOutcome::Unchanged);
            }
            Role::User => {
                message.content = new_content.to_string();
            }
            Role::Assistant => {
                message.content = new_content.to_string();
                // Cached speech no longer matches the text
                message.audio = None;
            }
        }
        chat.refresh_title();
        Ok(EditOutcome::Changed)
    }

    pub(crate) fn truncate_after(&mut self, chat_id: &str, index: usize) -> StoreResult<()> {
        let chat = self.require_chat(chat_id)?;
        if index >= chat.messages.len() {
            return Err(StoreError::Validation(format!(
                "index {index} is out of range for a chat of {} messages",
                chat.messages.len()
            )));
        }
        chat.messages.truncate(index + 1);
        chat.refresh_title();
        Ok(())
    }

    pub(crate) fn branch_chat(&mut self, chat_id: &str, message_id: &str) -> StoreResult<Chat> {
        let source = self
            .chat(chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;
        let end = source
            .position(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;

        // Ids are copied verbatim; they only need to be unique per chat
        let prefix = source.messages.iter().take(end + 1).cloned().collect();
        let branch = Chat::from_parts(uuid::Uuid::new_v4().to_string(), Utc::now(), prefix);

        self.active_chat_id.clone_from(&branch.id);
        self.chats.push(branch.clone());
        Ok(branch)
    }

    pub(crate) fn select_chat(&mut self, chat_id: &str) -> bool {
        if self.chat(chat_id).is_none() {
            return false;
        }
        self.active_chat_id = chat_id.to_string();
        true
    }

    pub(crate) fn set_audio(
        &mut self,
        chat_id: &str,
        message_id: &str,
        audio: Option<AudioClip>,
        voice: Option<String>,
    ) -> StoreResult<()> {
        let chat = self.require_chat(chat_id)?;
        let message = chat
            .message_mut(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        if message.role != Role::Assistant {
            return Err(StoreError::Validation(
                "only assistant messages may carry audio".to_string(),
            ));
        }
        message.audio = audio;
        if voice.is_some() {
            message.voice = voice;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::MemoryStorage;
    use crate::session::types::{DEFAULT_CHAT_TITLE, TITLE_ELLIPSIS};
    use std::sync::Arc;

    fn open_store() -> (ConversationStore<Arc<MemoryStorage>>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = ConversationStore::open(Arc::clone(&storage), Settings::default()).unwrap();
        (store, storage)
    }

    fn active_id<P: SessionStorage>(store: &ConversationStore<P>) -> String {
        store.session().active_chat_id().to_string()
    }

    fn seeded_chat<P: SessionStorage>(store: &mut ConversationStore<P>) -> (String, Vec<String>) {
        let chat_id = active_id(store);
        let user = Message::user("Hello");
        let assistant =
            Message::assistant("Hi there", None).with_audio(Some(AudioClip::new(vec![7u8; 4])));
        let ids = vec![
            store.chat(&chat_id).unwrap().messages()[0].id.clone(),
            user.id.clone(),
            assistant.id.clone(),
        ];
        store.append_message(&chat_id, user).unwrap();
        store.append_message(&chat_id, assistant).unwrap();
        (chat_id, ids)
    }

    #[test]
    fn test_open_creates_and_persists_session() {
        let (store, storage) = open_store();
        assert_eq!(store.session().chats().len(), 1);
        assert_eq!(storage.save_count(), 1);
        assert!(storage.snapshot().is_some());
    }

    #[test]
    fn test_open_keeps_persisted_settings_over_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        drop(ConversationStore::open(Arc::clone(&storage), Settings::default()).unwrap());

        let defaults = Settings {
            auto_play: true,
            temperature: 0.2,
            ..Settings::default()
        };
        let store = ConversationStore::open(Arc::clone(&storage), defaults).unwrap();
        assert_eq!(store.session().settings(), &Settings::default());
    }

    #[test]
    fn test_open_reloads_existing_session() {
        let storage = Arc::new(MemoryStorage::new());
        let chat_id = {
            let mut store =
                ConversationStore::open(Arc::clone(&storage), Settings::default()).unwrap();
            let id = active_id(&store);
            store.append_message(&id, Message::user("Persist me")).unwrap();
            id
        };

        let store = ConversationStore::open(storage, Settings::default()).unwrap();
        let chat = store.chat(&chat_id).unwrap();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat.title, "Persist me");
    }

    #[test]
    fn test_create_chat_does_not_select() {
        let (mut store, _) = open_store();
        let before = active_id(&store);
        let chat = store.create_chat().unwrap();
        assert_ne!(chat.id, before);
        assert_eq!(active_id(&store), before);
        assert_eq!(store.list_chats().len(), 2);
    }

    #[test]
    fn test_append_unknown_chat_is_not_found() {
        let (mut store, _) = open_store();
        let err = store
            .append_message("missing", Message::user("hi"))
            .unwrap_err();
        assert!(matches!(err, StoreError::ChatNotFound(_)));
    }

    #[test]
    fn test_append_updates_title() {
        let (mut store, _) = open_store();
        let chat_id = active_id(&store);
        assert_eq!(store.chat(&chat_id).unwrap().title, DEFAULT_CHAT_TITLE);

        store
            .append_message(&chat_id, Message::user("Hello"))
            .unwrap();
        assert_eq!(store.chat(&chat_id).unwrap().title, "Hello");

        store
            .append_message(&chat_id, Message::user("Later message"))
            .unwrap();
        assert_eq!(store.chat(&chat_id).unwrap().title, "Hello");
    }

    #[test]
    fn test_append_long_message_truncates_title() {
        let (mut store, _) = open_store();
        let chat_id = active_id(&store);
        store
            .append_message(
                &chat_id,
                Message::user("Tell me everything about the history of the printing press"),
            )
            .unwrap();
        assert!(store.chat(&chat_id).unwrap().title.ends_with(TITLE_ELLIPSIS));
    }

    #[test]
    fn test_append_rejects_system_and_user_audio() {
        let (mut store, _) = open_store();
        let chat_id = active_id(&store);

        let err = store
            .append_message(&chat_id, Message::system("another"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let with_audio = Message::user("hi").with_audio(Some(AudioClip::new(vec![1u8])));
        let err = store.append_message(&chat_id, with_audio).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.chat(&chat_id).unwrap().len(), 1);
    }

    #[test]
    fn test_edit_rejects_blank_content() {
        let (mut store, _) = open_store();
        let (chat_id, ids) = seeded_chat(&mut store);
        let err = store.edit_message(&chat_id, &ids[1], "   ").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.chat(&chat_id).unwrap().messages()[1].content, "Hello");
    }

    #[test]
    fn test_edit_unchanged_is_reported_without_write() {
        let (mut store, storage) = open_store();
        let (chat_id, ids) = seeded_chat(&mut store);
        let saves = storage.save_count();
        let outcome = store.edit_message(&chat_id, &ids[1], "Hello").unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
        assert_eq!(storage.save_count(), saves);
    }

    #[test]
    fn test_edit_content_is_trimmed() {
        let (mut store, storage) = open_store();
        let (chat_id, ids) = seeded_chat(&mut store);
        let saves = storage.save_count();

        let outcome = store.edit_message(&chat_id, &ids[1], "Hello  \n").unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
        assert_eq!(storage.save_count(), saves);

        let outcome = store.edit_message(&chat_id, &ids[1], "  Hi again ").unwrap();
        assert_eq!(outcome, EditOutcome::Changed);
        assert_eq!(store.chat(&chat_id).unwrap().messages()[1].content, "Hi again");
    }

    #[test]
    fn test_edit_system_prompt_is_rejected() {
        let (mut store, _) = open_store();
        let (chat_id, ids) = seeded_chat(&mut store);
        let err = store.edit_message(&chat_id, &ids[0], "new prompt").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_edit_assistant_clears_audio() {
        let (mut store, _) = open_store();
        let (chat_id, ids) = seeded_chat(&mut store);
        assert!(store.chat(&chat_id).unwrap().messages()[2].has_audio());

        let outcome = store.edit_message(&chat_id, &ids[2], "Hey!").unwrap();
        assert_eq!(outcome, EditOutcome::Changed);

        let message = &store.chat(&chat_id).unwrap().messages()[2];
        assert_eq!(message.content, "Hey!");
        assert!(!message.has_audio());
    }

    #[test]
    fn test_edit_unknown_message_is_not_found() {
        let (mut store, _) = open_store();
        let chat_id = active_id(&store);
        let err = store.edit_message(&chat_id, "nope", "text").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_truncate_after_drops_tail() {
        let (mut store, _) = open_store();
        let (chat_id, ids) = seeded_chat(&mut store);
        store.truncate_after(&chat_id, 1).unwrap();
        let chat = store.chat(&chat_id).unwrap();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat.messages()[1].id, ids[1]);

        store.truncate_after(&chat_id, 0).unwrap();
        let chat = store.chat(&chat_id).unwrap();
        assert_eq!(chat.len(), 1);
        assert_eq!(chat.title, DEFAULT_CHAT_TITLE);
    }

    #[test]
    fn test_truncate_out_of_range_is_rejected() {
        let (mut store, _) = open_store();
        let (chat_id, _) = seeded_chat(&mut store);
        assert!(matches!(
            store.truncate_after(&chat_id, 3),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.chat(&chat_id).unwrap().len(), 3);
    }

    #[test]
    fn test_branch_copies_prefix_and_activates() {
        let (mut store, _) = open_store();
        let (chat_id, ids) = seeded_chat(&mut store);
        store
            .append_message(&chat_id, Message::user("Another"))
            .unwrap();

        let branch = store.branch_chat(&chat_id, &ids[1]).unwrap();

        assert_ne!(branch.id, chat_id);
        assert_eq!(active_id(&store), branch.id);
        assert_eq!(branch.len(), 2);
        assert_eq!(branch.title, "Hello");
        let source = store.chat(&chat_id).unwrap();
        assert_eq!(source.len(), 4);
        for (copy, original) in branch.messages().iter().zip(source.messages()) {
            assert_eq!(copy.id, original.id);
            assert_eq!(copy.role, original.role);
            assert_eq!(copy.content, original.content);
        }
    }

    #[test]
    fn test_branch_unknown_message_changes_nothing() {
        let (mut store, storage) = open_store();
        let (chat_id, _) = seeded_chat(&mut store);
        let saves = storage.save_count();
        let err = store.branch_chat(&chat_id, "missing").unwrap_err();
        assert!(matches!(err, StoreError::MessageNotFound(_)));
        assert_eq!(store.list_chats().len(), 1);
        assert_eq!(storage.save_count(), saves);
    }

    #[test]
    fn test_select_unknown_chat_is_noop() {
        let (mut store, _) = open_store();
        let before = active_id(&store);
        assert!(!store.select_chat("missing").unwrap());
        assert_eq!(active_id(&store), before);

        let other = store.create_chat().unwrap();
        assert!(store.select_chat(&other.id).unwrap());
        assert_eq!(active_id(&store), other.id);
    }

    #[test]
    fn test_failed_save_leaves_state_untouched() {
        let (mut store, storage) = open_store();
        let (chat_id, _) = seeded_chat(&mut store);
        let before = store.session().clone();
        let persisted_before = storage.snapshot();

        storage.fail_next_save();
        let err = store
            .append_message(&chat_id, Message::user("lost"))
            .unwrap_err();

        assert!(matches!(err, StoreError::Persistence(_)));
        assert_eq!(store.session(), &before);
        assert_eq!(storage.snapshot(), persisted_before);
    }

    #[test]
    fn test_audio_is_never_persisted() {
        let (mut store, storage) = open_store();
        let (chat_id, _) = seeded_chat(&mut store);
        let json = storage.snapshot().unwrap();
        assert!(!json.contains("audio"));

        let reloaded = ConversationStore::open(Arc::clone(&storage), Settings::default()).unwrap();
        let chat = reloaded.chat(&chat_id).unwrap();
        assert!(chat.messages().iter().all(|m| !m.has_audio()));
    }

    #[test]
    fn test_set_audio_only_on_assistant() {
        let (mut store, _) = open_store();
        let (chat_id, ids) = seeded_chat(&mut store);
        let clip = AudioClip::new(vec![9u8; 2]);

        let err = store
            .set_audio(&chat_id, &ids[1], Some(clip.clone()), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        store
            .set_audio(&chat_id, &ids[2], Some(clip.clone()), Some("bf_emma".to_string()))
            .unwrap();
        let message = &store.chat(&chat_id).unwrap().messages()[2];
        assert_eq!(message.audio.as_ref(), Some(&clip));
        assert_eq!(message.voice.as_deref(), Some("bf_emma"));
    }

    #[test]
    fn test_update_settings_validates() {
        let (mut store, _) = open_store();
        let bad = Settings {
            temperature: -0.1,
            ..Settings::default()
        };
        assert!(matches!(
            store.update_settings(bad),
            Err(StoreError::Validation(_))
        ));

        let good = Settings {
            temperature: 0.2,
            model: Some("qwen2.5-7b-instruct".to_string()),
            ..Settings::default()
        };
        store.update_settings(good.clone()).unwrap();
        assert_eq!(store.session().settings(), &good);
    }
}
