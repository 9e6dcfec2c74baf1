//! Chat controller
//!
//! Owns the store, the edit state, the turn orchestrator and playback, and
//! exposes one entry point per user command. Locks are never held across
//! a network call. Turns and synthesis run on their own tasks, so a caller
//! that goes away does not cancel them.

use super::{Notice, SessionStorage};
use crate::llm::{CompletionClient, LlmError, ModelCatalog, MODEL_CACHE_TTL};
use crate::playback::{AudioOutput, PlaybackController, PlaybackSource, PlaybackState};
use crate::session::{
    AudioClip, Chat, ChatMessage, ChatSummary, ConversationStore, Message, Role, Session,
    Settings, StoreError, StoreResult,
};
use crate::state_machine::{transition, EditState, Effect, Event, TransitionError};
use crate::tts::{Speech, SpeechClient, SpeechError, SpeechRequest, VoiceCatalog};
use crate::turn::{TurnError, TurnOrchestrator, TurnOutcome, TurnRequest, TurnStatus};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, OnceCell};

/// Voice used when neither the settings nor the speech service name one
pub const FALLBACK_VOICE: &str = "af_nicole";

const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("Speech synthesis failed: {0}")]
    Speech(#[from] SpeechError),
    #[error("{0}")]
    Validation(String),
    #[error("A turn is already running for chat {0}")]
    TurnInFlight(String),
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Coarse classification used for status codes and notices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerErrorKind {
    Validation,
    NotFound,
    Conflict,
    Upstream,
    Internal,
}

impl ControllerError {
    pub fn kind(&self) -> ControllerErrorKind {
        match self {
            Self::Store(StoreError::ChatNotFound(_) | StoreError::MessageNotFound(_))
            | Self::Transition(
                TransitionError::ChatNotFound(_) | TransitionError::MessageNotFound(_),
            ) => ControllerErrorKind::NotFound,
            Self::Store(StoreError::Validation(_))
            | Self::Transition(TransitionError::EmptyDraft)
            | Self::Turn(TurnError::Validation(_))
            | Self::Validation(_) => ControllerErrorKind::Validation,
            Self::Speech(e) if e.is_validation() => ControllerErrorKind::Validation,
            Self::Transition(TransitionError::NotEditing) | Self::TurnInFlight(_) => {
                ControllerErrorKind::Conflict
            }
            Self::Turn(TurnError::UpstreamUnavailable(_)) | Self::Speech(_) => {
                ControllerErrorKind::Upstream
            }
            Self::Store(StoreError::Persistence(_)) | Self::TaskFailed(_) => {
                ControllerErrorKind::Internal
            }
        }
    }
}

impl From<LlmError> for ControllerError {
    fn from(e: LlmError) -> Self {
        Self::Turn(TurnError::UpstreamUnavailable(e))
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Voice preferred when the settings leave it unset (`KOKORO_VOICE`)
    pub preferred_voice: String,
    /// Always use this model and skip discovery (`LMSTUDIO_MODEL_NAME`)
    pub pinned_model: Option<String>,
    pub model_cache_ttl: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            preferred_voice: FALLBACK_VOICE.to_string(),
            pinned_model: None,
            model_cache_ttl: MODEL_CACHE_TTL,
        }
    }
}

/// A turn folded back into its chat
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub chat_id: String,
    pub message: Message,
    pub status: TurnStatus,
    pub speech_error: Option<String>,
}

#[derive(Debug)]
pub struct SaveEditOutcome {
    pub edit: EditState,
    /// Present when a user edit regenerated the reply
    pub turn: Option<TurnReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakOutcome {
    pub stream_id: u64,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub chats: Vec<ChatSummary>,
    pub active_chat_id: String,
    pub settings: Settings,
    pub edit: EditState,
    pub playback: PlaybackState,
    pub pending: Vec<String>,
}

struct Core<P: SessionStorage> {
    store: ConversationStore<P>,
    edit: EditState,
}

/// Marks a chat as having a turn in flight until dropped
struct TurnGuard {
    pending: Arc<Mutex<HashSet<String>>>,
    chat_id: String,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.chat_id);
    }
}

pub struct ChatController<P, C, S, O>
where
    P: SessionStorage,
    C: CompletionClient,
    S: SpeechClient,
    O: AudioOutput,
{
    core: Mutex<Core<P>>,
    orchestrator: TurnOrchestrator<C, S>,
    models: ModelCatalog<C>,
    voices: OnceCell<VoiceCatalog>,
    preferred_voice: String,
    pending: Arc<Mutex<HashSet<String>>>,
    playback: PlaybackController<O>,
    notices: broadcast::Sender<Notice>,
}

impl<P, C, S, O> ChatController<P, C, S, O>
where
    P: SessionStorage + 'static,
    C: CompletionClient + Clone + 'static,
    S: SpeechClient + 'static,
    O: AudioOutput,
{
    pub fn new(
        store: ConversationStore<P>,
        completions: C,
        speech: S,
        output: O,
        options: ControllerOptions,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            core: Mutex::new(Core {
                store,
                edit: EditState::Viewing,
            }),
            models: ModelCatalog::with_ttl(
                completions.clone(),
                options.pinned_model,
                options.model_cache_ttl,
            ),
            orchestrator: TurnOrchestrator::new(completions, speech),
            voices: OnceCell::new(),
            preferred_voice: options.preferred_voice,
            pending: Arc::new(Mutex::new(HashSet::new())),
            playback: PlaybackController::new(output, notices.clone()),
            notices,
        }
    }

    fn core(&self) -> MutexGuard<'_, Core<P>> {
        // Store mutations swap in a finished copy, so a poisoned lock is still consistent
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Create a chat and make it active
    pub fn new_chat(&self) -> ControllerResult<Chat> {
        let chat = self.core().store.transaction(|s| {
            let chat = s.create_chat();
            s.select_chat(&chat.id);
            Ok(chat)
        })?;
        tracing::info!(chat_id = %chat.id, "Created chat");
        self.notify(Notice::SessionChanged);
        Ok(chat)
    }

    /// Returns `false` for an unknown chat and leaves the active chat alone
    pub fn select_chat(&self, chat_id: &str) -> ControllerResult<bool> {
        let selected = self.core().store.select_chat(chat_id)?;
        if selected {
            self.notify(Notice::SessionChanged);
        }
        Ok(selected)
    }

    pub fn list_chats(&self) -> Vec<ChatSummary> {
        self.core().store.list_chats()
    }

    pub fn chat(&self, chat_id: &str) -> ControllerResult<Chat> {
        Ok(self.core().store.chat(chat_id)?.clone())
    }

    pub fn session(&self) -> Session {
        self.core().store.session().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (chats, active_chat_id, settings, edit) = {
            let core = self.core();
            let session = core.store.session();
            (
                session.summaries(),
                session.active_chat_id().to_string(),
                session.settings().clone(),
                core.edit.clone(),
            )
        };
        let mut pending: Vec<String> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        pending.sort();
        SessionSnapshot {
            chats,
            active_chat_id,
            settings,
            edit,
            playback: self.playback.state(),
            pending,
        }
    }

    pub fn edit_state(&self) -> EditState {
        self.core().edit.clone()
    }

    pub fn is_pending(&self, chat_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(chat_id)
    }

    /// Transient audio cached for a message
    pub fn audio(&self, chat_id: &str, message_id: &str) -> ControllerResult<Option<AudioClip>> {
        let core = self.core();
        let chat = core.store.chat(chat_id)?;
        let message = chat
            .message(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        Ok(message.audio.clone())
    }

    // ------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------

    fn begin_turn(&self, chat_id: &str) -> ControllerResult<TurnGuard> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(chat_id.to_string()) {
            return Err(ControllerError::TurnInFlight(chat_id.to_string()));
        }
        Ok(TurnGuard {
            pending: Arc::clone(&self.pending),
            chat_id: chat_id.to_string(),
        })
    }

    /// Run `work` on its own task; dropping the caller does not cancel it
    async fn detach<T, F, Fut>(self: &Arc<Self>, work: F) -> ControllerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = ControllerResult<T>> + Send + 'static,
    {
        tokio::spawn(work(Arc::clone(self)))
            .await
            .map_err(|e| ControllerError::TaskFailed(e.to_string()))?
    }

    async fn spawn_turn(self: &Arc<Self>, guard: TurnGuard) -> ControllerResult<TurnReport> {
        self.detach(move |this| async move { this.dispatch_turn(guard).await })
            .await
    }

    /// Append a user message and answer it
    pub async fn submit_user_message(
        self: &Arc<Self>,
        chat_id: &str,
        text: &str,
    ) -> ControllerResult<TurnReport> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ControllerError::Validation(
                "message must not be empty".to_string(),
            ));
        }
        let guard = self.begin_turn(chat_id)?;
        self.core()
            .store
            .append_message(chat_id, Message::user(text))?;
        self.notify(Notice::SessionChanged);
        self.spawn_turn(guard).await
    }

    /// Run one turn against the chat's current history and append the reply
    async fn dispatch_turn(&self, guard: TurnGuard) -> ControllerResult<TurnReport> {
        let chat_id = guard.chat_id.clone();
        let (history, settings) = {
            let core = self.core();
            let chat = core.store.chat(&chat_id)?;
            (chat.history(), core.store.session().settings().clone())
        };

        self.notify(Notice::TurnStarted {
            chat_id: chat_id.clone(),
        });
        let result = self.run_turn_for(history, &settings).await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Turn failed");
                self.notify(Notice::TurnFailed {
                    chat_id: chat_id.clone(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let message = Message::assistant(outcome.text, Some(outcome.voice))
            .with_audio(outcome.audio);
        self.core()
            .store
            .append_message(&chat_id, message.clone())?;
        drop(guard);

        let speech_error = outcome.speech_error.map(|e| e.to_string());
        if let Some(error) = &speech_error {
            self.notify(Notice::SpeechFailed {
                chat_id: chat_id.clone(),
                message_id: message.id.clone(),
                error: error.clone(),
            });
        }
        self.notify(Notice::TurnCompleted {
            chat_id: chat_id.clone(),
            message_id: message.id.clone(),
            status: outcome.status,
        });
        tracing::info!(
            chat_id = %chat_id,
            message_id = %message.id,
            model = %outcome.model,
            status = ?outcome.status,
            "Turn completed"
        );

        if settings.auto_play {
            if let Some(clip) = &message.audio {
                self.playback.play(PlaybackSource {
                    chat_id: chat_id.clone(),
                    message_id: message.id.clone(),
                    clip: clip.clone(),
                });
            }
        }

        Ok(TurnReport {
            chat_id,
            message,
            status: outcome.status,
            speech_error,
        })
    }

    async fn run_turn_for(
        &self,
        history: Vec<ChatMessage>,
        settings: &Settings,
    ) -> ControllerResult<TurnOutcome> {
        let model = self.resolve_model(settings.model.as_deref()).await?;
        let voice = self.turn_voice(settings.voice.as_deref()).await;
        let request = TurnRequest::new(history, &model, &voice, settings.temperature)?;
        Ok(self.orchestrator.run_turn(&request).await?)
    }

    /// One turn outside of any chat, for the stateless endpoint
    pub async fn complete_stateless(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        model: Option<&str>,
        voice: Option<&str>,
    ) -> ControllerResult<TurnOutcome> {
        if messages.is_empty() {
            return Err(ControllerError::Validation(
                "messages are required".to_string(),
            ));
        }
        let voice = self.resolve_voice(voice).await?;
        let model = self.resolve_model(model).await?;
        let request = TurnRequest::new(messages, &model, &voice, temperature)?;
        Ok(self.orchestrator.run_turn(&request).await?)
    }

    // ------------------------------------------------------------------
    // Edit / branch / redo
    // ------------------------------------------------------------------

    /// Run the transition and apply its store effects in one transaction.
    ///
    /// A transition that requests a turn first claims the chat's turn slot,
    /// so a refused turn leaves every state untouched.
    fn apply_event(
        &self,
        event: Event,
    ) -> ControllerResult<(EditState, Option<Chat>, Option<TurnGuard>)> {
        let mut core = self.core();
        let result = transition(&core.edit, core.store.session(), event)?;

        let guard = result
            .effects
            .iter()
            .find_map(|effect| match effect {
                Effect::RequestTurn { chat_id } => Some(chat_id.as_str()),
                _ => None,
            })
            .map(|chat_id| self.begin_turn(chat_id))
            .transpose()?;

        let branch = if result.effects.iter().all(Effect::is_turn_request) {
            None
        } else {
            let effects = result.effects;
            let branch = core.store.transaction(|s| apply_effects(s, &effects))?;
            self.notify(Notice::SessionChanged);
            branch
        };
        core.edit = result.new_state.clone();
        Ok((result.new_state, branch, guard))
    }

    pub fn start_edit(&self, chat_id: &str, message_id: &str) -> ControllerResult<EditState> {
        let (state, _, _) = self.apply_event(Event::StartEdit {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
        })?;
        Ok(state)
    }

    pub fn update_draft(&self, content: &str) -> ControllerResult<EditState> {
        let (state, _, _) = self.apply_event(Event::UpdateDraft {
            content: content.to_string(),
        })?;
        Ok(state)
    }

    pub fn cancel_edit(&self) -> ControllerResult<EditState> {
        let (state, _, _) = self.apply_event(Event::CancelEdit)?;
        Ok(state)
    }

    /// Save the draft; a changed user message regenerates the reply
    pub async fn save_edit(self: &Arc<Self>) -> ControllerResult<SaveEditOutcome> {
        let (edit, _, guard) = self.apply_event(Event::SaveEdit)?;
        let turn = match guard {
            Some(guard) => Some(self.spawn_turn(guard).await?),
            None => None,
        };
        Ok(SaveEditOutcome { edit, turn })
    }

    /// Replace the last assistant reply. `None` when there is nothing to redo.
    pub async fn redo(self: &Arc<Self>, chat_id: &str) -> ControllerResult<Option<TurnReport>> {
        let (_, _, guard) = self.apply_event(Event::Redo {
            chat_id: chat_id.to_string(),
        })?;
        match guard {
            Some(guard) => Ok(Some(self.spawn_turn(guard).await?)),
            None => Ok(None),
        }
    }

    /// Answer a user message whose turn failed earlier
    pub async fn retry_turn(
        self: &Arc<Self>,
        chat_id: &str,
    ) -> ControllerResult<Option<TurnReport>> {
        let (_, _, guard) = self.apply_event(Event::Retry {
            chat_id: chat_id.to_string(),
        })?;
        match guard {
            Some(guard) => Ok(Some(self.spawn_turn(guard).await?)),
            None => Ok(None),
        }
    }

    /// Copy a chat's prefix into a new active chat
    pub fn branch(&self, chat_id: &str, message_id: &str) -> ControllerResult<Chat> {
        let (_, branch, _) = self.apply_event(Event::Branch {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
        })?;
        let branch = branch.ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;
        tracing::info!(
            source = %chat_id,
            chat_id = %branch.id,
            messages = branch.len(),
            "Branched chat"
        );
        Ok(branch)
    }

    // ------------------------------------------------------------------
    // Speech and playback
    // ------------------------------------------------------------------

    fn assistant_message(&self, chat_id: &str, message_id: &str) -> ControllerResult<Message> {
        let core = self.core();
        let message = core
            .store
            .chat(chat_id)?
            .message(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        if message.role != Role::Assistant {
            return Err(ControllerError::Validation(
                "only assistant messages can be spoken".to_string(),
            ));
        }
        Ok(message.clone())
    }

    /// Synthesize `message` with `voice` and cache the audio if the text is unchanged
    async fn render(
        &self,
        chat_id: &str,
        message: &Message,
        voice: &str,
    ) -> ControllerResult<Speech> {
        let request = SpeechRequest::new(&message.content, voice)?;
        let speech = match self.orchestrator.speech().synthesize(&request).await {
            Ok(speech) => speech,
            Err(e) => {
                self.notify(Notice::SpeechFailed {
                    chat_id: chat_id.to_string(),
                    message_id: message.id.clone(),
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let mut core = self.core();
        let current = core
            .store
            .chat(chat_id)
            .ok()
            .and_then(|c| c.message(&message.id))
            .map(|m| m.content == message.content);
        if current == Some(true) {
            core.store.set_audio(
                chat_id,
                &message.id,
                Some(speech.audio.clone()),
                Some(speech.voice.clone()),
            )?;
        } else {
            tracing::debug!(
                chat_id = %chat_id,
                message_id = %message.id,
                "Message changed during synthesis, not caching audio"
            );
        }
        Ok(speech)
    }

    fn start_playback(&self, chat_id: &str, message_id: &str, clip: AudioClip) -> u64 {
        self.playback.play(PlaybackSource {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            clip,
        })
    }

    /// Play a reply, synthesizing it first when no audio is cached
    pub async fn speak(
        self: &Arc<Self>,
        chat_id: &str,
        message_id: &str,
    ) -> ControllerResult<SpeakOutcome> {
        let (chat_id, message_id) = (chat_id.to_string(), message_id.to_string());
        self.detach(move |this| async move { this.play_message(&chat_id, &message_id).await })
            .await
    }

    async fn play_message(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> ControllerResult<SpeakOutcome> {
        let message = self.assistant_message(chat_id, message_id)?;
        if let Some(clip) = message.audio.clone() {
            let voice = match message.voice {
                Some(voice) => voice,
                None => self.turn_voice(None).await,
            };
            let stream_id = self.start_playback(chat_id, message_id, clip);
            return Ok(SpeakOutcome { stream_id, voice });
        }

        let configured = self.core().store.session().settings().voice.clone();
        let voice = match &message.voice {
            Some(voice) => voice.clone(),
            None => self.turn_voice(configured.as_deref()).await,
        };
        let speech = self.render(chat_id, &message, &voice).await?;
        let stream_id = self.start_playback(chat_id, message_id, speech.audio);
        Ok(SpeakOutcome {
            stream_id,
            voice: speech.voice,
        })
    }

    /// Re-synthesize a reply with another voice, remember it, and play it
    pub async fn set_message_voice(
        self: &Arc<Self>,
        chat_id: &str,
        message_id: &str,
        voice: &str,
    ) -> ControllerResult<SpeakOutcome> {
        let (chat_id, message_id, voice) =
            (chat_id.to_string(), message_id.to_string(), voice.to_string());
        self.detach(move |this| async move {
            this.revoice_message(&chat_id, &message_id, &voice).await
        })
        .await
    }

    async fn revoice_message(
        &self,
        chat_id: &str,
        message_id: &str,
        voice: &str,
    ) -> ControllerResult<SpeakOutcome> {
        let message = self.assistant_message(chat_id, message_id)?;
        let voice = self.resolve_voice(Some(voice)).await?;
        let speech = self.render(chat_id, &message, &voice).await?;
        let stream_id = self.start_playback(chat_id, message_id, speech.audio);
        Ok(SpeakOutcome {
            stream_id,
            voice: speech.voice,
        })
    }

    /// Single-shot synthesis outside of any chat
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> ControllerResult<Speech> {
        let voice = self.resolve_voice(voice).await?;
        let request = SpeechRequest::new(text, &voice)?;
        Ok(self.orchestrator.speech().synthesize(&request).await?)
    }

    pub fn stop_playback(&self) -> bool {
        self.playback.stop()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    // ------------------------------------------------------------------
    // Settings and catalogs
    // ------------------------------------------------------------------

    pub async fn update_settings(&self, settings: Settings) -> ControllerResult<Settings> {
        settings.validate().map_err(ControllerError::Validation)?;
        if let Some(voice) = settings.voice.as_deref() {
            self.resolve_voice(Some(voice)).await?;
        }
        self.core().store.update_settings(settings.clone())?;
        tracing::info!(
            temperature = settings.temperature,
            model = ?settings.model,
            voice = ?settings.voice,
            auto_play = settings.auto_play,
            "Updated settings"
        );
        self.notify(Notice::SessionChanged);
        Ok(settings)
    }

    pub async fn available_models(&self, force_refresh: bool) -> Vec<String> {
        self.models.available(force_refresh).await
    }

    pub async fn resolve_model(&self, requested: Option<&str>) -> ControllerResult<String> {
        Ok(self.models.resolve(requested).await?)
    }

    /// The speech service's catalog; a failed fetch is retried on the next call
    pub async fn voice_catalog(&self) -> Option<&VoiceCatalog> {
        match self
            .voices
            .get_or_try_init(|| self.orchestrator.speech().voices())
            .await
        {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                tracing::warn!(error = %e, "Voice catalog unavailable");
                None
            }
        }
    }

    fn fallback_voice(&self, catalog: Option<&VoiceCatalog>) -> String {
        match catalog {
            Some(catalog) => catalog.default_voice(Some(&self.preferred_voice)),
            None => self.preferred_voice.clone(),
        }
    }

    /// Validate an explicit voice against the catalog, or pick the default
    pub async fn resolve_voice(&self, requested: Option<&str>) -> ControllerResult<String> {
        let requested = requested.map(str::trim).filter(|v| !v.is_empty());
        let catalog = self.voice_catalog().await;
        match (requested, catalog) {
            (Some(voice), Some(catalog)) if !catalog.contains(voice) => Err(
                ControllerError::Validation(format!("Voice '{voice}' is not available.")),
            ),
            (Some(voice), _) => Ok(voice.to_string()),
            (None, catalog) => Ok(self.fallback_voice(catalog)),
        }
    }

    /// Voice for a turn: the configured one if still offered, else the default
    async fn turn_voice(&self, configured: Option<&str>) -> String {
        match self.resolve_voice(configured).await {
            Ok(voice) => voice,
            Err(e) => {
                tracing::warn!(error = %e, "Configured voice unavailable, using default");
                let catalog = self.voice_catalog().await;
                self.fallback_voice(catalog)
            }
        }
    }
}

/// Apply store effects in order; returns the chat created by a branch
fn apply_effects(session: &mut Session, effects: &[Effect]) -> StoreResult<Option<Chat>> {
    let mut branch = None;
    for effect in effects {
        match effect {
            Effect::EditMessage {
                chat_id,
                message_id,
                content,
            } => {
                session.edit_message(chat_id, message_id, content)?;
            }
            Effect::TruncateAfter { chat_id, index } => {
                session.truncate_after(chat_id, *index)?;
            }
            Effect::BranchChat {
                chat_id,
                message_id,
            } => {
                branch = Some(session.branch_chat(chat_id, message_id)?);
            }
            Effect::RequestTurn { .. } => {}
        }
    }
    Ok(branch)
}
