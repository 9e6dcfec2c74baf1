//! Mock implementations for testing

use super::SessionStorage;
use crate::db::PersistedSession;
use crate::llm::{CompletionClient, CompletionRequest, CompletionResponse, LlmError};
use crate::playback::{AudioOutput, PlaybackError};
use crate::session::{AudioClip, Session, Settings};
use crate::tts::{Speech, SpeechClient, SpeechError, SpeechRequest, VoiceCatalog, VoiceInfo};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Let spawned tasks on the current-thread test runtime make progress
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Mock Completion Client
// ============================================================================

/// Mock completion client that returns queued responses
pub struct MockCompletionClient {
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    models: Mutex<Vec<String>>,
    fail_models: AtomicBool,
    list_calls: AtomicUsize,
    /// When set, `complete` waits for `release` before answering
    held: AtomicBool,
    release: Notify,
}

#[allow(dead_code)]
impl MockCompletionClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
            fail_models: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            held: AtomicBool::new(false),
            release: Notify::new(),
        }
    }

    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_text(&self, text: &str) {
        self.queue_response(CompletionResponse::text(text, "mock-model"));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_models(&self, models: Vec<String>) {
        *self.models.lock().unwrap() = models;
    }

    pub fn fail_models(&self, fail: bool) {
        self.fail_models.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Block completions until `release` is called once per request
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.held.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_models.load(Ordering::SeqCst) {
            return Err(LlmError::network("connection refused"));
        }
        Ok(self.models.lock().unwrap().clone())
    }
}

// ============================================================================
// Mock Speech Client
// ============================================================================

/// Mock speech client. Without queued results it renders `"<voice>:<text>"`.
pub struct MockSpeechClient {
    results: Mutex<VecDeque<Result<AudioClip, SpeechError>>>,
    requests: Mutex<Vec<SpeechRequest>>,
    catalog: Mutex<Option<VoiceCatalog>>,
    voice_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockSpeechClient {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            catalog: Mutex::new(Some(Self::default_catalog())),
            voice_calls: AtomicUsize::new(0),
        }
    }

    fn default_catalog() -> VoiceCatalog {
        let voice = |name: &str| VoiceInfo {
            name: name.to_string(),
            lang_code: "a".to_string(),
        };
        VoiceCatalog {
            voices: vec![voice("af_heart"), voice("af_nicole"), voice("am_adam")],
            default: "af_heart".to_string(),
        }
    }

    pub fn queue_audio(&self, bytes: Vec<u8>) {
        self.results
            .lock()
            .unwrap()
            .push_back(Ok(AudioClip::new(bytes)));
    }

    pub fn queue_error(&self, error: SpeechError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `None` makes the catalog unreachable
    pub fn set_catalog(&self, catalog: Option<VoiceCatalog>) {
        *self.catalog.lock().unwrap() = catalog;
    }

    pub fn voice_calls(&self) -> usize {
        self.voice_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSpeechClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechClient for MockSpeechClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Speech, SpeechError> {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.results.lock().unwrap().pop_front();
        let audio = match queued {
            Some(result) => result?,
            None => AudioClip::new(format!("{}:{}", request.voice(), request.text()).into_bytes()),
        };
        Ok(Speech {
            audio,
            voice: request.voice().to_string(),
        })
    }

    async fn voices(&self) -> Result<VoiceCatalog, SpeechError> {
        self.voice_calls.fetch_add(1, Ordering::SeqCst);
        self.catalog
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SpeechError::network("connection refused"))
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// Session storage that keeps the persisted JSON in memory
pub struct MemoryStorage {
    stored: Mutex<Option<(String, Settings)>>,
    saves: AtomicUsize,
    fail_next: AtomicBool,
}

#[allow(dead_code)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            stored: Mutex::new(None),
            saves: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The persisted session document
    pub fn snapshot(&self) -> Option<String> {
        self.stored.lock().unwrap().as_ref().map(|(json, _)| json.clone())
    }

    pub fn fail_next_save(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Session>, String> {
        let stored = self.stored.lock().unwrap();
        let Some((json, settings)) = stored.as_ref() else {
            return Ok(None);
        };
        let persisted: PersistedSession = serde_json::from_str(json).map_err(|e| e.to_string())?;
        Ok(Some(persisted.into_session(settings.clone())))
    }

    fn save(&self, session: &Session) -> Result<(), String> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err("disk full".to_string());
        }
        let json = serde_json::to_string(&PersistedSession::from(session))
            .map_err(|e| e.to_string())?;
        *self.stored.lock().unwrap() = Some((json, session.settings().clone()));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Mock Audio Output
// ============================================================================

/// Audio output that "plays" until cancelled or released
pub struct MockAudioOutput {
    started: Mutex<Vec<AudioClip>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    cancelled: AtomicUsize,
    /// How long a cancelled stream keeps the device before returning
    stop_delay: Mutex<Option<Duration>>,
    fail_next: Mutex<Option<String>>,
    release: Notify,
}

#[allow(dead_code)]
impl MockAudioOutput {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            stop_delay: Mutex::new(None),
            fail_next: Mutex::new(None),
            release: Notify::new(),
        }
    }

    pub fn started(&self) -> Vec<AudioClip> {
        self.started.lock().unwrap().clone()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Most streams ever playing at the same moment
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn set_stop_delay(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    /// End every stream currently playing
    pub fn finish_all(&self) {
        self.release.notify_waiters();
    }
}

impl Default for MockAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioOutput for MockAudioOutput {
    async fn play(&self, clip: AudioClip, cancel: CancellationToken) -> Result<(), PlaybackError> {
        self.started.lock().unwrap().push(clip);
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(PlaybackError::Player(message));
        }

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        tokio::select! {
            () = cancel.cancelled() => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                let delay = *self.stop_delay.lock().unwrap();
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
            }
            () = self.release.notified() => {}
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
