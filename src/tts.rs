//! Speech synthesis abstraction

mod error;
mod kokoro;
mod types;

pub use error::{SpeechError, SpeechErrorKind};
pub use kokoro::KokoroHttpClient;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for speech providers
#[async_trait]
pub trait SpeechClient: Send + Sync {
    /// Render text with the given voice
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Speech, SpeechError>;

    /// Voices the service can render
    async fn voices(&self) -> Result<VoiceCatalog, SpeechError>;
}

#[async_trait]
impl<T: SpeechClient + ?Sized> SpeechClient for Arc<T> {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Speech, SpeechError> {
        (**self).synthesize(request).await
    }

    async fn voices(&self) -> Result<VoiceCatalog, SpeechError> {
        (**self).voices().await
    }
}

/// Logging wrapper for speech clients
pub struct LoggingSpeech {
    inner: Arc<dyn SpeechClient>,
}

impl LoggingSpeech {
    pub fn new(inner: Arc<dyn SpeechClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SpeechClient for LoggingSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Speech, SpeechError> {
        let start = std::time::Instant::now();
        let result = self.inner.synthesize(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(speech) => {
                tracing::info!(
                    voice = %speech.voice,
                    duration_ms = %duration.as_millis(),
                    chars = request.text().chars().count(),
                    audio_bytes = speech.audio.len(),
                    "Synthesis completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    voice = %request.voice(),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "Synthesis failed"
                );
            }
        }

        result
    }

    async fn voices(&self) -> Result<VoiceCatalog, SpeechError> {
        let result = self.inner.voices().await;
        match &result {
            Ok(catalog) => {
                tracing::info!(
                    count = catalog.voices.len(),
                    default = %catalog.default,
                    "Loaded voice catalog"
                );
            }
            Err(e) => tracing::warn!(error = %e.message, "Voice catalog unavailable"),
        }
        result
    }
}
