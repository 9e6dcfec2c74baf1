//! Turn orchestration
//!
//! One turn is a completion followed by synthesis of its text. The
//! orchestrator holds no session state; the caller folds the outcome back
//! into the store once the turn has resolved.

use crate::llm::{CompletionClient, CompletionRequest, LlmError};
use crate::session::{AudioClip, ChatMessage, Role};
use crate::tts::{SpeechClient, SpeechError, SpeechRequest};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Invalid turn request: {0}")]
    Validation(String),
    #[error("Completion provider unavailable: {0}")]
    UpstreamUnavailable(#[from] LlmError),
}

/// A validated turn request
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    messages: Vec<ChatMessage>,
    model: String,
    voice: String,
    temperature: f32,
}

impl TurnRequest {
    pub fn new(
        messages: Vec<ChatMessage>,
        model: &str,
        voice: &str,
        temperature: f32,
    ) -> Result<Self, TurnError> {
        match messages.last() {
            None => return Err(TurnError::Validation("history is empty".to_string())),
            Some(last) if last.role == Role::Assistant => {
                return Err(TurnError::Validation(
                    "history must not end with an assistant message".to_string(),
                ))
            }
            Some(_) => {}
        }
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(TurnError::Validation(format!(
                "temperature must be between 0 and 1, got {temperature}"
            )));
        }
        let model = model.trim();
        if model.is_empty() {
            return Err(TurnError::Validation("model must not be blank".to_string()));
        }
        let voice = voice.trim();
        if voice.is_empty() {
            return Err(TurnError::Validation("voice must not be blank".to_string()));
        }
        Ok(Self {
            messages,
            model: model.to_string(),
            voice: voice.to_string(),
            temperature,
        })
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Complete,
    /// Text was produced but synthesis failed
    PartialFailure,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub audio: Option<AudioClip>,
    pub voice: String,
    /// Model that served the completion
    pub model: String,
    pub status: TurnStatus,
    pub speech_error: Option<SpeechError>,
}

/// Sequences completion then synthesis
pub struct TurnOrchestrator<C, S> {
    completions: C,
    speech: S,
}

impl<C: CompletionClient, S: SpeechClient> TurnOrchestrator<C, S> {
    pub fn new(completions: C, speech: S) -> Self {
        Self {
            completions,
            speech,
        }
    }

    pub fn speech(&self) -> &S {
        &self.speech
    }

    /// Run one turn. Only a completion failure is an error.
    pub async fn run_turn(&self, request: &TurnRequest) -> Result<TurnOutcome, TurnError> {
        let completion = self
            .completions
            .complete(&CompletionRequest {
                messages: request.messages.clone(),
                model: request.model.clone(),
                temperature: request.temperature,
            })
            .await?;

        let text = completion.content.trim().to_string();
        if text.is_empty() {
            return Err(TurnError::UpstreamUnavailable(LlmError::unknown(
                "Model returned an empty reply",
            )));
        }

        let synthesized = match SpeechRequest::new(&text, &request.voice) {
            Ok(speech_request) => self.speech.synthesize(&speech_request).await,
            Err(e) => Err(e),
        };

        let outcome = match synthesized {
            Ok(speech) => TurnOutcome {
                text,
                audio: Some(speech.audio),
                voice: speech.voice,
                model: completion.model,
                status: TurnStatus::Complete,
                speech_error: None,
            },
            Err(e) => {
                tracing::warn!(
                    voice = %request.voice,
                    error = %e,
                    "Synthesis failed, returning text only"
                );
                TurnOutcome {
                    text,
                    audio: None,
                    voice: request.voice.clone(),
                    model: completion.model,
                    status: TurnStatus::PartialFailure,
                    speech_error: Some(e),
                }
            }
        };
        Ok(outcome)
    }
}
