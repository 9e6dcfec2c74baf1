//! Completion provider abstraction
//!
//! Talks to an `OpenAI`-compatible chat completion server.

mod catalog;
mod error;
mod openai;
mod types;

pub use catalog::{ModelCatalog, MODEL_CACHE_TTL};
pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAICompatibleClient;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for completion providers
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Produce one reply for the given history
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Ids of the models the provider can currently serve
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        (**self).complete(request).await
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        (**self).list_models().await
    }
}

/// Logging wrapper for completion clients
pub struct LoggingService {
    inner: Arc<dyn CompletionClient>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn CompletionClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CompletionClient for LoggingService {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %response.model,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Completion request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "Completion request failed"
                );
            }
        }

        result
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let result = self.inner.list_models().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e.message, kind = e.kind.as_str(), "Model listing failed");
        }
        result
    }
}
