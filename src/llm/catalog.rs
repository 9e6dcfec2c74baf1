//! Model catalog with a short-lived cache of the provider's loaded models

use super::{CompletionClient, LlmError};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long a fetched model list is trusted
pub const MODEL_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct CachedModels {
    fetched_at: Option<Instant>,
    models: Vec<String>,
}

/// Lists and resolves the models a completion provider can serve
pub struct ModelCatalog<C: CompletionClient> {
    client: C,
    /// When set, discovery is skipped and this model is always used
    pinned: Option<String>,
    ttl: Duration,
    cache: Mutex<CachedModels>,
}

impl<C: CompletionClient> ModelCatalog<C> {
    pub fn new(client: C, pinned: Option<String>) -> Self {
        Self::with_ttl(client, pinned, MODEL_CACHE_TTL)
    }

    pub fn with_ttl(client: C, pinned: Option<String>, ttl: Duration) -> Self {
        Self {
            client,
            pinned: pinned.filter(|m| !m.trim().is_empty()),
            ttl,
            cache: Mutex::new(CachedModels::default()),
        }
    }

    /// Currently loadable model ids.
    ///
    /// A failed refresh falls back to the last list that was fetched.
    pub async fn available(&self, force_refresh: bool) -> Vec<String> {
        if let Some(pinned) = &self.pinned {
            return vec![pinned.clone()];
        }

        let mut cache = self.cache.lock().await;
        let fresh = cache
            .fetched_at
            .is_some_and(|at| at.elapsed() < self.ttl);
        if !force_refresh && fresh && !cache.models.is_empty() {
            return cache.models.clone();
        }

        match self.client.list_models().await {
            Ok(models) if !models.is_empty() => {
                tracing::debug!(count = models.len(), "Refreshed model list");
                cache.models.clone_from(&models);
                cache.fetched_at = Some(Instant::now());
                models
            }
            Ok(_) => {
                tracing::warn!("Provider reported no loaded models");
                cache.models.clone()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch models");
                cache.models.clone()
            }
        }
    }

    /// Pick the model for a turn: the requested one, else the first available
    pub async fn resolve(&self, requested: Option<&str>) -> Result<String, LlmError> {
        if let Some(model) = requested.map(str::trim).filter(|m| !m.is_empty()) {
            return Ok(model.to_string());
        }

        self.available(false)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::no_model("No model is currently loaded"))
    }
}
