//! Speech request, response and voice catalog types

use super::SpeechError;
use crate::session::AudioClip;
use serde::{Deserialize, Serialize};

/// Single-shot synthesis request, validated on construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    text: String,
    voice: String,
}

impl SpeechRequest {
    pub fn new(text: &str, voice: &str) -> Result<Self, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::invalid_request("No text provided to synthesize"));
        }
        let voice = voice.trim();
        if voice.is_empty() {
            return Err(SpeechError::invalid_request("No voice selected"));
        }
        Ok(Self {
            text: text.to_string(),
            voice: voice.to_string(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }
}

/// Synthesized audio and the voice the service actually used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speech {
    pub audio: AudioClip,
    pub voice: String,
}

/// One voice offered by the speech service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub lang_code: String,
}

/// Voices offered by the speech service plus its default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceCatalog {
    pub voices: Vec<VoiceInfo>,
    pub default: String,
}

impl VoiceCatalog {
    pub fn contains(&self, name: &str) -> bool {
        self.voices.iter().any(|v| v.name == name)
    }

    /// `preferred` when the catalog offers it, else the service default
    pub fn default_voice(&self, preferred: Option<&str>) -> String {
        preferred
            .filter(|p| self.contains(p))
            .unwrap_or(self.default.as_str())
            .to_string()
    }
}
